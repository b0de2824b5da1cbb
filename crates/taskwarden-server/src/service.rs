use std::sync::Arc;

use serde::Serialize;

use taskwarden_core::id::{CommentId, ProjectId, TaskId, UserId};
use taskwarden_core::identity::{Identity, Role};
use taskwarden_core::model::{
    Comment, NewComment, NewProject, NewTask, NewUser, Project, ProjectPatch, Task, TaskPatch,
    TaskStatus, User, UserPatch,
};
use taskwarden_core::policy::{Action, ProjectFilter, Resource};
use taskwarden_core::resource::ResourceKind;
use taskwarden_storage::{Store, TaskQuery};

use crate::adapter::StoreSnapshotLoader;
use crate::audit;
use crate::error::ApiError;
use crate::guard::Enforcer;
use crate::metrics::Metrics;

#[derive(Debug, Clone)]
pub struct CreateProjectInput {
    pub name: String,
    pub description: Option<String>,
    pub member_ids: Vec<UserId>,
}

#[derive(Debug, Clone)]
pub struct CreateTaskInput {
    pub project_id: ProjectId,
    pub title: String,
    pub description: Option<String>,
    pub assignee_id: Option<UserId>,
}

#[derive(Debug, Clone)]
pub struct CreateUserInput {
    pub email: String,
    pub first_name: Option<String>,
    pub last_name: Option<String>,
    pub role: Role,
}

#[derive(Debug, Clone, Copy, Default)]
pub struct TaskFilter {
    pub project_id: Option<ProjectId>,
    pub status: Option<TaskStatus>,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct StatusCounts {
    pub todo: usize,
    pub in_progress: usize,
    pub done: usize,
}

impl StatusCounts {
    fn of(tasks: &[Task]) -> Self {
        let count = |status: TaskStatus| tasks.iter().filter(|t| t.status == status).count();
        Self {
            todo: count(TaskStatus::Todo),
            in_progress: count(TaskStatus::InProgress),
            done: count(TaskStatus::Done),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ProjectStats {
    pub project_id: ProjectId,
    pub member_count: usize,
    pub task_count: usize,
    #[serde(flatten)]
    pub by_status: StatusCounts,
}

impl ProjectStats {
    fn tally(project: &Project, tasks: &[Task]) -> Self {
        Self {
            project_id: project.id,
            member_count: project.member_ids.len(),
            task_count: tasks.len(),
            by_status: StatusCounts::of(tasks),
        }
    }
}

/// Activity summary for one user. A creator who is also listed as a member
/// counts in both project columns.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct UserStats {
    pub user_id: UserId,
    pub projects_created: usize,
    pub projects_member_of: usize,
    pub total_projects: usize,
    pub tasks_assigned: usize,
    pub comments_written: usize,
    pub tasks_by_status: StatusCounts,
}

/// Every boundary operation: resolve ids, decide, then touch storage.
pub struct WorkspaceService<S: Store> {
    store: Arc<S>,
    enforcer: Enforcer<StoreSnapshotLoader<S>>,
}

impl<S: Store> WorkspaceService<S> {
    pub fn new(store: Arc<S>) -> Self {
        let enforcer = Enforcer::new(StoreSnapshotLoader::new(Arc::clone(&store)));
        Self { store, enforcer }
    }

    pub fn with_metrics(store: Arc<S>, metrics: Arc<Metrics>) -> Self {
        let enforcer =
            Enforcer::new(StoreSnapshotLoader::new(Arc::clone(&store))).with_metrics(metrics);
        Self { store, enforcer }
    }

    // Projects

    pub async fn create_project(
        &self,
        identity: &Identity,
        input: CreateProjectInput,
    ) -> Result<Project, ApiError> {
        self.enforcer
            .authorize(identity, Resource::NewProject, Action::Create)?;
        let name = required("name", input.name)?;
        self.ensure_users_exist(&input.member_ids).await?;

        let project = self
            .store
            .create_project(&NewProject {
                name,
                description: input.description,
                creator_id: identity.id,
                member_ids: input.member_ids,
            })
            .await?;
        audit::audit_resource_mutated(&identity.id, "project_created", &project.id);
        Ok(project)
    }

    pub async fn list_projects(&self, identity: &Identity) -> Result<Vec<Project>, ApiError> {
        let filter = self.enforcer.visibility(identity);
        Ok(self.store.list_projects(&filter).await?)
    }

    pub async fn get_project(&self, identity: &Identity, id: &ProjectId) -> Result<Project, ApiError> {
        self.enforcer
            .authorize_project(identity, id, Action::Read)
            .await?;
        self.fetch_project(id).await
    }

    pub async fn update_project(
        &self,
        identity: &Identity,
        id: &ProjectId,
        mut patch: ProjectPatch,
    ) -> Result<Project, ApiError> {
        self.enforcer
            .authorize_project(identity, id, Action::Update)
            .await?;
        patch.name = patch.name.map(|n| required("name", n)).transpose()?;

        let project = self.store.update_project(id, &patch).await?;
        audit::audit_resource_mutated(&identity.id, "project_updated", id);
        Ok(project)
    }

    pub async fn delete_project(&self, identity: &Identity, id: &ProjectId) -> Result<(), ApiError> {
        self.enforcer
            .authorize_project(identity, id, Action::Delete)
            .await?;
        self.store.delete_project(id).await?;
        audit::audit_resource_mutated(&identity.id, "project_deleted", id);
        Ok(())
    }

    pub async fn add_members(
        &self,
        identity: &Identity,
        id: &ProjectId,
        member_ids: &[UserId],
    ) -> Result<Project, ApiError> {
        self.enforcer
            .authorize_project(identity, id, Action::ManageMembers)
            .await?;
        non_empty_ids(member_ids)?;
        self.ensure_users_exist(member_ids).await?;

        let project = self.store.add_members(id, member_ids).await?;
        audit::audit_resource_mutated(&identity.id, "project_members_added", id);
        Ok(project)
    }

    /// Assignments held by removed members are left in place.
    pub async fn remove_members(
        &self,
        identity: &Identity,
        id: &ProjectId,
        member_ids: &[UserId],
    ) -> Result<Project, ApiError> {
        self.enforcer
            .authorize_project(identity, id, Action::ManageMembers)
            .await?;
        non_empty_ids(member_ids)?;

        let project = self.store.remove_members(id, member_ids).await?;
        audit::audit_resource_mutated(&identity.id, "project_members_removed", id);
        Ok(project)
    }

    pub async fn list_members(
        &self,
        identity: &Identity,
        id: &ProjectId,
    ) -> Result<Vec<User>, ApiError> {
        let project = self
            .enforcer
            .authorize_project(identity, id, Action::Read)
            .await?;

        let ids: Vec<UserId> = project.member_ids.iter().copied().collect();
        Ok(self.store.get_users(&ids).await?)
    }

    pub async fn project_stats(
        &self,
        identity: &Identity,
        id: &ProjectId,
    ) -> Result<ProjectStats, ApiError> {
        self.enforcer
            .authorize_project(identity, id, Action::Read)
            .await?;
        let project = self.fetch_project(id).await?;

        let mut query = TaskQuery::new(ProjectFilter::All);
        query.project_id = Some(*id);
        let tasks = self.store.list_tasks(&query).await?;
        Ok(ProjectStats::tally(&project, &tasks))
    }

    // Tasks

    pub async fn create_task(
        &self,
        identity: &Identity,
        input: CreateTaskInput,
    ) -> Result<Task, ApiError> {
        let project = self
            .enforcer
            .authorize_new_task(identity, &input.project_id)
            .await?;
        let title = required("title", input.title)?;
        if let Some(assignee) = input.assignee_id {
            self.ensure_users_exist(&[assignee]).await?;
            self.enforcer
                .ensure_assignable(identity, &project, &assignee)?;
        }

        let task = self
            .store
            .create_task(&NewTask {
                project_id: input.project_id,
                title,
                description: input.description,
                assignee_id: input.assignee_id,
            })
            .await?;
        audit::audit_resource_mutated(&identity.id, "task_created", &task.id);
        Ok(task)
    }

    /// Tasks of the projects visible to `identity`, optionally narrowed.
    pub async fn list_tasks(
        &self,
        identity: &Identity,
        filter: TaskFilter,
    ) -> Result<Vec<Task>, ApiError> {
        if let Some(project_id) = filter.project_id {
            self.enforcer
                .authorize_project(identity, &project_id, Action::Read)
                .await?;
        }

        let mut query = TaskQuery::new(self.enforcer.visibility(identity));
        query.project_id = filter.project_id;
        query.status = filter.status;
        Ok(self.store.list_tasks(&query).await?)
    }

    pub async fn get_task(&self, identity: &Identity, id: &TaskId) -> Result<Task, ApiError> {
        self.enforcer
            .authorize_task(identity, id, Action::Read)
            .await?;
        self.fetch_task(id).await
    }

    /// Changing the assignee through an update is held to the same rules as
    /// [`assign_task`](Self::assign_task).
    pub async fn update_task(
        &self,
        identity: &Identity,
        id: &TaskId,
        mut patch: TaskPatch,
    ) -> Result<Task, ApiError> {
        let task = self
            .enforcer
            .authorize_task(identity, id, Action::Update)
            .await?;
        patch.title = patch.title.map(|t| required("title", t)).transpose()?;

        if let Some(assignee) = patch.assignee_id
            && assignee != task.assignee_id
        {
            self.enforcer
                .authorize(identity, Resource::Task(&task), Action::AssignTask)?;
            if let Some(target) = assignee {
                self.ensure_users_exist(&[target]).await?;
                self.enforcer
                    .ensure_assignable(identity, &task.project, &target)?;
            }
        }

        let updated = self.store.update_task(id, &patch).await?;
        audit::audit_resource_mutated(&identity.id, "task_updated", id);
        Ok(updated)
    }

    pub async fn delete_task(&self, identity: &Identity, id: &TaskId) -> Result<(), ApiError> {
        self.enforcer
            .authorize_task(identity, id, Action::Delete)
            .await?;
        self.store.delete_task(id).await?;
        audit::audit_resource_mutated(&identity.id, "task_deleted", id);
        Ok(())
    }

    pub async fn assign_task(
        &self,
        identity: &Identity,
        id: &TaskId,
        assignee: &UserId,
    ) -> Result<Task, ApiError> {
        let task = self
            .enforcer
            .authorize_task(identity, id, Action::AssignTask)
            .await?;
        self.ensure_users_exist(std::slice::from_ref(assignee)).await?;
        self.enforcer
            .ensure_assignable(identity, &task.project, assignee)?;

        let patch = TaskPatch {
            assignee_id: Some(Some(*assignee)),
            ..Default::default()
        };
        let updated = self.store.update_task(id, &patch).await?;
        audit::audit_resource_mutated(&identity.id, "task_assigned", id);
        Ok(updated)
    }

    pub async fn unassign_task(&self, identity: &Identity, id: &TaskId) -> Result<Task, ApiError> {
        self.enforcer
            .authorize_task(identity, id, Action::Update)
            .await?;

        let patch = TaskPatch {
            assignee_id: Some(None),
            ..Default::default()
        };
        let updated = self.store.update_task(id, &patch).await?;
        audit::audit_resource_mutated(&identity.id, "task_unassigned", id);
        Ok(updated)
    }

    // Comments

    pub async fn create_comment(
        &self,
        identity: &Identity,
        task_id: &TaskId,
        content: String,
    ) -> Result<Comment, ApiError> {
        self.enforcer
            .authorize_new_comment(identity, task_id)
            .await?;
        let content = required("content", content)?;

        let comment = self
            .store
            .create_comment(&NewComment {
                task_id: *task_id,
                author_id: identity.id,
                content,
            })
            .await?;
        audit::audit_resource_mutated(&identity.id, "comment_created", &comment.id);
        Ok(comment)
    }

    pub async fn list_comments(
        &self,
        identity: &Identity,
        task_id: &TaskId,
    ) -> Result<Vec<Comment>, ApiError> {
        self.enforcer
            .authorize_task(identity, task_id, Action::Read)
            .await?;
        Ok(self.store.list_comments_by_task(task_id).await?)
    }

    pub async fn get_comment(&self, identity: &Identity, id: &CommentId) -> Result<Comment, ApiError> {
        self.enforcer
            .authorize_comment(identity, id, Action::Read)
            .await?;
        self.store
            .get_comment(id)
            .await?
            .ok_or(ApiError::NotFound(ResourceKind::Comment))
    }

    pub async fn update_comment(
        &self,
        identity: &Identity,
        id: &CommentId,
        content: String,
    ) -> Result<Comment, ApiError> {
        self.enforcer
            .authorize_comment(identity, id, Action::Update)
            .await?;
        let content = required("content", content)?;

        let comment = self.store.update_comment(id, &content).await?;
        audit::audit_resource_mutated(&identity.id, "comment_updated", id);
        Ok(comment)
    }

    pub async fn delete_comment(&self, identity: &Identity, id: &CommentId) -> Result<(), ApiError> {
        self.enforcer
            .authorize_comment(identity, id, Action::Delete)
            .await?;
        self.store.delete_comment(id).await?;
        audit::audit_resource_mutated(&identity.id, "comment_deleted", id);
        Ok(())
    }

    // Users

    /// Admin-only. Duplicate emails surface as `Conflict`.
    pub async fn create_user(
        &self,
        identity: &Identity,
        input: CreateUserInput,
    ) -> Result<User, ApiError> {
        self.enforcer
            .authorize(identity, Resource::NewUser, Action::Create)?;
        let email = required("email", input.email)?;

        let user = self
            .store
            .create_user(&NewUser {
                email,
                first_name: input.first_name,
                last_name: input.last_name,
                role: input.role,
            })
            .await?;
        audit::audit_resource_mutated(&identity.id, "user_created", &user.id);
        Ok(user)
    }

    /// Makes sure an admin with `email` exists, creating or promoting as
    /// needed. Runs at startup, outside any request identity.
    pub async fn bootstrap_admin(&self, email: &str) -> Result<User, ApiError> {
        let email = required("bootstrap_admin_email", email.to_string())?;
        let user = match self.store.find_user_by_email(&email).await? {
            Some(user) if user.role == Role::Admin => return Ok(user),
            Some(user) => self.store.set_role(&user.id, Role::Admin).await?,
            None => {
                self.store
                    .create_user(&NewUser {
                        email,
                        first_name: None,
                        last_name: None,
                        role: Role::Admin,
                    })
                    .await?
            }
        };
        tracing::info!(
            target: "audit",
            event = "admin_bootstrapped",
            user_id = %user.id,
            "bootstrap admin ready"
        );
        Ok(user)
    }

    pub async fn current_user(&self, identity: &Identity) -> Result<User, ApiError> {
        self.fetch_user(&identity.id).await
    }

    pub async fn get_user(&self, identity: &Identity, id: &UserId) -> Result<User, ApiError> {
        self.enforcer
            .authorize_user(identity, id, Action::Read)
            .await?;
        self.fetch_user(id).await
    }

    pub async fn update_user(
        &self,
        identity: &Identity,
        id: &UserId,
        mut patch: UserPatch,
    ) -> Result<User, ApiError> {
        self.enforcer
            .authorize_user(identity, id, Action::Update)
            .await?;
        patch.email = patch.email.map(|e| required("email", e)).transpose()?;

        let user = self.store.update_user(id, &patch).await?;
        audit::audit_resource_mutated(&identity.id, "user_updated", id);
        Ok(user)
    }

    /// Refused with `Conflict` while the user still created projects.
    pub async fn delete_user(&self, identity: &Identity, id: &UserId) -> Result<(), ApiError> {
        self.enforcer
            .authorize_user(identity, id, Action::Delete)
            .await?;
        self.store.delete_user(id).await?;
        audit::audit_resource_mutated(&identity.id, "user_deleted", id);
        Ok(())
    }

    pub async fn promote_user(&self, identity: &Identity, id: &UserId) -> Result<User, ApiError> {
        self.enforcer
            .authorize_user(identity, id, Action::Promote)
            .await?;
        let user = self.store.set_role(id, Role::Admin).await?;
        audit::audit_user_promoted(&identity.id, id);
        Ok(user)
    }

    /// The projects `id` itself would see.
    pub async fn user_projects(
        &self,
        identity: &Identity,
        id: &UserId,
    ) -> Result<Vec<Project>, ApiError> {
        self.enforcer
            .authorize_user(identity, id, Action::Read)
            .await?;
        let user = self.fetch_user(id).await?;
        let filter = self.enforcer.visibility(&Identity::new(user.id, user.role));
        Ok(self.store.list_projects(&filter).await?)
    }

    /// Every task assigned to `id`, including tasks in projects `id` has left.
    pub async fn user_tasks(&self, identity: &Identity, id: &UserId) -> Result<Vec<Task>, ApiError> {
        self.enforcer
            .authorize_user(identity, id, Action::Read)
            .await?;
        let mut query = TaskQuery::new(ProjectFilter::All);
        query.assignee_id = Some(*id);
        Ok(self.store.list_tasks(&query).await?)
    }

    pub async fn user_comments(
        &self,
        identity: &Identity,
        id: &UserId,
    ) -> Result<Vec<Comment>, ApiError> {
        self.enforcer
            .authorize_user(identity, id, Action::Read)
            .await?;
        Ok(self.store.list_comments_by_author(id).await?)
    }

    pub async fn user_stats(&self, identity: &Identity, id: &UserId) -> Result<UserStats, ApiError> {
        self.enforcer
            .authorize_user(identity, id, Action::Read)
            .await?;

        let projects = self
            .store
            .list_projects(&ProjectFilter::AccessibleTo(*id))
            .await?;
        let projects_created = projects.iter().filter(|p| p.creator_id == *id).count();
        let projects_member_of = projects.iter().filter(|p| p.member_ids.contains(id)).count();

        let mut query = TaskQuery::new(ProjectFilter::All);
        query.assignee_id = Some(*id);
        let tasks = self.store.list_tasks(&query).await?;
        let comments = self.store.list_comments_by_author(id).await?;

        Ok(UserStats {
            user_id: *id,
            projects_created,
            projects_member_of,
            total_projects: projects_created + projects_member_of,
            tasks_assigned: tasks.len(),
            comments_written: comments.len(),
            tasks_by_status: StatusCounts::of(&tasks),
        })
    }

    async fn ensure_users_exist(&self, ids: &[UserId]) -> Result<(), ApiError> {
        if ids.is_empty() {
            return Ok(());
        }
        let missing = self.store.missing_users(ids).await?;
        if missing.is_empty() {
            Ok(())
        } else {
            Err(ApiError::NotFound(ResourceKind::User))
        }
    }

    // The snapshot was just loaded; a miss here means a concurrent delete.
    async fn fetch_project(&self, id: &ProjectId) -> Result<Project, ApiError> {
        self.store
            .get_project(id)
            .await?
            .ok_or(ApiError::NotFound(ResourceKind::Project))
    }

    async fn fetch_task(&self, id: &TaskId) -> Result<Task, ApiError> {
        self.store
            .get_task(id)
            .await?
            .ok_or(ApiError::NotFound(ResourceKind::Task))
    }

    async fn fetch_user(&self, id: &UserId) -> Result<User, ApiError> {
        self.store
            .get_user(id)
            .await?
            .ok_or(ApiError::NotFound(ResourceKind::User))
    }
}

fn required(field: &str, value: String) -> Result<String, ApiError> {
    let trimmed = value.trim();
    if trimmed.is_empty() {
        return Err(ApiError::Invalid(format!("{field} must not be empty")));
    }
    Ok(trimmed.to_string())
}

fn non_empty_ids(ids: &[UserId]) -> Result<(), ApiError> {
    if ids.is_empty() {
        return Err(ApiError::Invalid("member_ids must not be empty".to_string()));
    }
    Ok(())
}
