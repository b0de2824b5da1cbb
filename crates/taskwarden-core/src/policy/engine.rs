use crate::id::UserId;
use crate::identity::Identity;
use crate::resource::ProjectSnapshot;

use super::{Action, Decision, DenyReason, PolicyError, ProjectFilter, Resource};

/// Stateless decision engine. Zero-sized and `Copy`; share it freely.
#[derive(Debug, Clone, Copy, Default)]
pub struct PolicyEngine;

impl PolicyEngine {
    pub fn new() -> Self {
        Self
    }

    /// Decide one (identity, resource, action) triple.
    ///
    /// An unsupported pair is a caller bug: it panics in debug builds and is
    /// denied with [`DenyReason::UnsupportedAction`] otherwise. Use
    /// [`evaluate`](Self::evaluate) to handle it explicitly.
    pub fn decide(&self, identity: &Identity, resource: Resource<'_>, action: Action) -> Decision {
        match self.evaluate(identity, resource, action) {
            Ok(decision) => decision,
            Err(err) => {
                if cfg!(debug_assertions) {
                    panic!("{err}");
                }
                Decision::Deny(DenyReason::UnsupportedAction)
            }
        }
    }

    pub fn evaluate(
        &self,
        identity: &Identity,
        resource: Resource<'_>,
        action: Action,
    ) -> Result<Decision, PolicyError> {
        if !resource.supports(action) {
            return Err(PolicyError::UnsupportedAction {
                resource: resource.kind(),
                action,
            });
        }

        if identity.is_admin() {
            return Ok(Decision::Allow);
        }

        let user = &identity.id;
        let decision = match resource {
            Resource::Project(project) => match action {
                Action::Read => participant(project, user),
                _ => Decision::Deny(DenyReason::AdminRequired),
            },
            Resource::NewProject | Resource::NewUser => Decision::Deny(DenyReason::AdminRequired),
            Resource::Task(task) => match action {
                Action::Read => participant(&task.project, user),
                Action::Update | Action::AssignTask => Decision::allow_if(
                    task.is_assignee(user) || task.project.is_participant(user),
                    DenyReason::NotTaskParticipant,
                ),
                _ => Decision::Deny(DenyReason::AdminRequired),
            },
            Resource::NewTask { project } => participant(project, user),
            Resource::Comment(comment) => match action {
                Action::Read => participant(&comment.task.project, user),
                _ => Decision::allow_if(comment.is_author(user), DenyReason::NotCommentAuthor),
            },
            Resource::NewComment { task } => participant(&task.project, user),
            Resource::User(target) => match action {
                Action::Read | Action::Update => {
                    Decision::allow_if(target.id == *user, DenyReason::NotSelf)
                }
                _ => Decision::Deny(DenyReason::AdminRequired),
            },
        };

        Ok(decision)
    }

    /// Resource-integrity rule for (re)assignment: the target must be the
    /// project creator or a member. Applies to admins too.
    pub fn check_assignee(&self, project: &ProjectSnapshot, target: &UserId) -> Decision {
        Decision::allow_if(
            project.is_participant(target),
            DenyReason::AssigneeNotMember,
        )
    }

    pub fn visibility(&self, identity: &Identity) -> ProjectFilter {
        if identity.is_admin() {
            ProjectFilter::All
        } else {
            ProjectFilter::AccessibleTo(identity.id)
        }
    }
}

fn participant(project: &ProjectSnapshot, user: &UserId) -> Decision {
    Decision::allow_if(project.is_participant(user), DenyReason::NotProjectMember)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::id::{CommentId, ProjectId, TaskId};
    use crate::resource::{CommentSnapshot, TaskSnapshot, UserSnapshot};

    struct Fixture {
        creator: UserId,
        member: UserId,
        assignee: UserId,
        outsider: UserId,
        project: ProjectSnapshot,
        task: TaskSnapshot,
        comment: CommentSnapshot,
        member_record: UserSnapshot,
    }

    // creator owns the project, member is listed, assignee holds the task but
    // is not a member, member wrote the comment.
    fn fixture() -> Fixture {
        let creator = UserId::generate();
        let member = UserId::generate();
        let assignee = UserId::generate();
        let outsider = UserId::generate();
        let project = ProjectSnapshot::new(ProjectId::generate(), creator, [member]);
        let task = TaskSnapshot::new(TaskId::generate(), project.clone(), Some(assignee));
        let comment = CommentSnapshot::new(CommentId::generate(), member, task.clone());
        Fixture {
            creator,
            member,
            assignee,
            outsider,
            project,
            task,
            comment,
            member_record: UserSnapshot::new(member),
        }
    }

    fn engine() -> PolicyEngine {
        PolicyEngine::new()
    }

    fn valid_pairs(f: &Fixture) -> Vec<(Resource<'_>, Action)> {
        let all = [
            Action::Read,
            Action::Create,
            Action::Update,
            Action::Delete,
            Action::ManageMembers,
            Action::AssignTask,
            Action::Promote,
        ];
        let resources = [
            Resource::Project(&f.project),
            Resource::NewProject,
            Resource::Task(&f.task),
            Resource::NewTask {
                project: &f.project,
            },
            Resource::Comment(&f.comment),
            Resource::NewComment { task: &f.task },
            Resource::User(&f.member_record),
            Resource::NewUser,
        ];
        resources
            .into_iter()
            .flat_map(|r| all.into_iter().filter(move |a| r.supports(*a)).map(move |a| (r, a)))
            .collect()
    }

    #[test]
    fn admin_is_allowed_every_supported_pair() {
        let f = fixture();
        let admin = Identity::admin(UserId::generate());

        for (resource, action) in valid_pairs(&f) {
            assert_eq!(
                engine().decide(&admin, resource, action),
                Decision::Allow,
                "admin denied {action} on {}",
                resource.kind()
            );
        }
    }

    #[test]
    fn unsupported_pair_is_an_error() {
        let f = fixture();
        let admin = Identity::admin(f.creator);

        let err = engine()
            .evaluate(&admin, Resource::Comment(&f.comment), Action::ManageMembers)
            .unwrap_err();
        assert!(matches!(err, PolicyError::UnsupportedAction { .. }));
    }

    #[test]
    #[cfg_attr(debug_assertions, should_panic(expected = "not supported"))]
    fn decide_on_unsupported_pair_asserts_in_debug() {
        let f = fixture();
        let decision = engine().decide(
            &Identity::member(f.creator),
            Resource::Project(&f.project),
            Action::AssignTask,
        );
        assert_eq!(decision, Decision::Deny(DenyReason::UnsupportedAction));
    }

    #[test]
    fn project_read_allows_creator_and_member() {
        let f = fixture();
        for user in [f.creator, f.member] {
            let decision =
                engine().decide(&Identity::member(user), Resource::Project(&f.project), Action::Read);
            assert!(decision.is_allowed());
        }
    }

    #[test]
    fn project_read_denies_assignee_without_membership() {
        let f = fixture();
        let decision = engine().decide(
            &Identity::member(f.assignee),
            Resource::Project(&f.project),
            Action::Read,
        );
        assert_eq!(decision, Decision::Deny(DenyReason::NotProjectMember));
    }

    #[test]
    fn member_creator_cannot_mutate_project_but_can_update_its_tasks() {
        let f = fixture();
        let creator = Identity::member(f.creator);

        for action in [Action::Update, Action::Delete, Action::ManageMembers] {
            assert_eq!(
                engine().decide(&creator, Resource::Project(&f.project), action),
                Decision::Deny(DenyReason::AdminRequired)
            );
        }
        assert!(
            engine()
                .decide(&creator, Resource::Task(&f.task), Action::Update)
                .is_allowed()
        );
    }

    #[test]
    fn members_cannot_create_projects() {
        let f = fixture();
        assert_eq!(
            engine().decide(&Identity::member(f.creator), Resource::NewProject, Action::Create),
            Decision::Deny(DenyReason::AdminRequired)
        );
    }

    #[test]
    fn outsider_is_denied_everything_in_the_project_family() {
        let f = fixture();
        let outsider = Identity::member(f.outsider);

        for (resource, action) in valid_pairs(&f) {
            if matches!(resource, Resource::User(_) | Resource::NewUser) {
                continue;
            }
            let decision = engine().decide(&outsider, resource, action);
            assert!(
                !decision.is_allowed(),
                "outsider allowed {action} on {}",
                resource.kind()
            );
        }
    }

    #[test]
    fn decide_is_idempotent() {
        let f = fixture();
        let identity = Identity::member(f.assignee);

        for (resource, action) in valid_pairs(&f) {
            let first = engine().decide(&identity, resource, action);
            let second = engine().decide(&identity, resource, action);
            assert_eq!(first, second);
        }
    }

    #[test]
    fn assignee_carve_out_grants_update_only() {
        let f = fixture();
        let assignee = Identity::member(f.assignee);

        assert!(
            engine()
                .decide(&assignee, Resource::Task(&f.task), Action::Update)
                .is_allowed()
        );
        assert_eq!(
            engine().decide(&assignee, Resource::Task(&f.task), Action::Delete),
            Decision::Deny(DenyReason::AdminRequired)
        );
        assert_eq!(
            engine().decide(&assignee, Resource::Project(&f.project), Action::Update),
            Decision::Deny(DenyReason::AdminRequired)
        );
        assert_eq!(
            engine().decide(&assignee, Resource::Task(&f.task), Action::Read),
            Decision::Deny(DenyReason::NotProjectMember)
        );
    }

    #[test]
    fn unassigned_task_falls_through_to_membership() {
        let f = fixture();
        let task = TaskSnapshot::new(TaskId::generate(), f.project.clone(), None);

        assert!(
            engine()
                .decide(&Identity::member(f.member), Resource::Task(&task), Action::Update)
                .is_allowed()
        );
        assert_eq!(
            engine().decide(&Identity::member(f.assignee), Resource::Task(&task), Action::Update),
            Decision::Deny(DenyReason::NotTaskParticipant)
        );
    }

    #[test]
    fn creator_listed_as_member_is_evaluated_once() {
        let creator = UserId::generate();
        let project = ProjectSnapshot::new(ProjectId::generate(), creator, [creator]);

        assert!(
            engine()
                .decide(&Identity::member(creator), Resource::Project(&project), Action::Read)
                .is_allowed()
        );
    }

    #[test]
    fn task_create_requires_participation() {
        let f = fixture();
        let target = Resource::NewTask {
            project: &f.project,
        };

        assert!(
            engine()
                .decide(&Identity::member(f.member), target, Action::Create)
                .is_allowed()
        );
        assert_eq!(
            engine().decide(&Identity::member(f.assignee), target, Action::Create),
            Decision::Deny(DenyReason::NotProjectMember)
        );
    }

    #[test]
    fn task_delete_is_admin_only() {
        let f = fixture();
        assert_eq!(
            engine().decide(&Identity::member(f.creator), Resource::Task(&f.task), Action::Delete),
            Decision::Deny(DenyReason::AdminRequired)
        );
    }

    #[test]
    fn comment_author_alone_may_modify() {
        let f = fixture();
        let author = Identity::member(f.member);
        let creator = Identity::member(f.creator);

        for action in [Action::Update, Action::Delete] {
            assert!(
                engine()
                    .decide(&author, Resource::Comment(&f.comment), action)
                    .is_allowed()
            );
            assert_eq!(
                engine().decide(&creator, Resource::Comment(&f.comment), action),
                Decision::Deny(DenyReason::NotCommentAuthor)
            );
        }
        assert!(
            engine()
                .decide(&creator, Resource::Comment(&f.comment), Action::Read)
                .is_allowed()
        );
    }

    #[test]
    fn comment_create_follows_project_membership() {
        let f = fixture();
        let target = Resource::NewComment { task: &f.task };

        assert!(
            engine()
                .decide(&Identity::member(f.creator), target, Action::Create)
                .is_allowed()
        );
        assert_eq!(
            engine().decide(&Identity::member(f.assignee), target, Action::Create),
            Decision::Deny(DenyReason::NotProjectMember)
        );
    }

    #[test]
    fn ex_member_author_keeps_comment_rights_but_loses_read() {
        let f = fixture();
        let project = ProjectSnapshot::new(f.project.id, f.creator, []);
        let task = TaskSnapshot::new(f.task.id, project, None);
        let comment = CommentSnapshot::new(f.comment.id, f.member, task);
        let author = Identity::member(f.member);

        assert!(
            engine()
                .decide(&author, Resource::Comment(&comment), Action::Update)
                .is_allowed()
        );
        assert!(
            !engine()
                .decide(&author, Resource::Comment(&comment), Action::Read)
                .is_allowed()
        );
    }

    #[test]
    fn assignee_only_scenario() {
        // U1 is the assignee, U2 created the project, U3 is its only member.
        let u1 = UserId::generate();
        let u2 = UserId::generate();
        let u3 = UserId::generate();
        let project = ProjectSnapshot::new(ProjectId::generate(), u2, [u3]);
        let task = TaskSnapshot::new(TaskId::generate(), project.clone(), Some(u1));
        let identity = Identity::member(u1);

        assert_eq!(
            engine().decide(&identity, Resource::Task(&task), Action::Update),
            Decision::Allow
        );
        assert!(
            !engine()
                .decide(&identity, Resource::Project(&project), Action::Update)
                .is_allowed()
        );
        assert!(
            !engine()
                .decide(&identity, Resource::Task(&task), Action::Delete)
                .is_allowed()
        );
    }

    #[test]
    fn user_record_is_self_service_for_read_and_update() {
        let me = UserId::generate();
        let other = UserSnapshot::new(UserId::generate());
        let mine = UserSnapshot::new(me);
        let identity = Identity::member(me);

        for action in [Action::Read, Action::Update] {
            assert!(
                engine()
                    .decide(&identity, Resource::User(&mine), action)
                    .is_allowed()
            );
            assert_eq!(
                engine().decide(&identity, Resource::User(&other), action),
                Decision::Deny(DenyReason::NotSelf)
            );
        }
    }

    #[test]
    fn members_cannot_promote_or_delete_even_themselves() {
        let me = UserId::generate();
        let mine = UserSnapshot::new(me);

        for action in [Action::Promote, Action::Delete] {
            assert_eq!(
                engine().decide(&Identity::member(me), Resource::User(&mine), action),
                Decision::Deny(DenyReason::AdminRequired)
            );
        }
    }

    #[test]
    fn only_admins_create_users() {
        let me = UserId::generate();
        assert_eq!(
            engine().decide(&Identity::member(me), Resource::NewUser, Action::Create),
            Decision::Deny(DenyReason::AdminRequired)
        );
        assert!(
            engine()
                .decide(&Identity::admin(me), Resource::NewUser, Action::Create)
                .is_allowed()
        );
    }

    #[test]
    fn assignment_target_must_participate() {
        let f = fixture();

        assert!(engine().check_assignee(&f.project, &f.creator).is_allowed());
        assert!(engine().check_assignee(&f.project, &f.member).is_allowed());
        assert_eq!(
            engine().check_assignee(&f.project, &f.assignee),
            Decision::Deny(DenyReason::AssigneeNotMember)
        );
    }

    #[test]
    fn visibility_is_unconstrained_for_admin() {
        let id = UserId::generate();
        assert_eq!(engine().visibility(&Identity::admin(id)), ProjectFilter::All);
        assert_eq!(
            engine().visibility(&Identity::member(id)),
            ProjectFilter::AccessibleTo(id)
        );
    }
}
