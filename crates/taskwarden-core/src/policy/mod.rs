//! Access-control decisions for projects, tasks, comments and user records.
//!
//! Everything in this module is pure: no I/O, no interior state. Callers load
//! snapshots through a [`SnapshotLoader`](crate::loader::SnapshotLoader) and
//! hand them to [`PolicyEngine`].

mod engine;
mod visibility;

pub use engine::PolicyEngine;
pub use visibility::ProjectFilter;

use std::fmt;

use crate::resource::{
    CommentSnapshot, ProjectSnapshot, ResourceKind, TaskSnapshot, UserSnapshot,
};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Action {
    Read,
    Create,
    Update,
    Delete,
    ManageMembers,
    AssignTask,
    Promote,
}

impl Action {
    pub fn as_str(&self) -> &'static str {
        match self {
            Action::Read => "read",
            Action::Create => "create",
            Action::Update => "update",
            Action::Delete => "delete",
            Action::ManageMembers => "manage_members",
            Action::AssignTask => "assign_task",
            Action::Promote => "promote",
        }
    }
}

impl fmt::Display for Action {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// The target of a decision. `New*` variants stand for a resource that is about
/// to be created; they carry the already-loaded parent.
#[derive(Debug, Clone, Copy)]
pub enum Resource<'a> {
    Project(&'a ProjectSnapshot),
    NewProject,
    Task(&'a TaskSnapshot),
    NewTask { project: &'a ProjectSnapshot },
    Comment(&'a CommentSnapshot),
    NewComment { task: &'a TaskSnapshot },
    User(&'a UserSnapshot),
    NewUser,
}

impl Resource<'_> {
    pub fn kind(&self) -> ResourceKind {
        match self {
            Resource::Project(_) | Resource::NewProject => ResourceKind::Project,
            Resource::Task(_) | Resource::NewTask { .. } => ResourceKind::Task,
            Resource::Comment(_) | Resource::NewComment { .. } => ResourceKind::Comment,
            Resource::User(_) | Resource::NewUser => ResourceKind::User,
        }
    }

    /// Whether `action` is meaningful for this resource at all.
    pub fn supports(&self, action: Action) -> bool {
        use Action::*;

        match self {
            Resource::Project(_) => matches!(action, Read | Update | Delete | ManageMembers),
            Resource::Task(_) => matches!(action, Read | Update | Delete | AssignTask),
            Resource::Comment(_) => matches!(action, Read | Update | Delete),
            Resource::User(_) => matches!(action, Read | Update | Delete | Promote),
            Resource::NewProject
            | Resource::NewTask { .. }
            | Resource::NewComment { .. }
            | Resource::NewUser => action == Create,
        }
    }
}

/// Why a request was denied. Messages never mention other users.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum DenyReason {
    AdminRequired,
    NotProjectMember,
    NotTaskParticipant,
    NotCommentAuthor,
    NotSelf,
    AssigneeNotMember,
    UnsupportedAction,
}

impl DenyReason {
    pub fn code(&self) -> &'static str {
        match self {
            DenyReason::AdminRequired => "admin_required",
            DenyReason::NotProjectMember => "not_project_member",
            DenyReason::NotTaskParticipant => "not_task_participant",
            DenyReason::NotCommentAuthor => "not_comment_author",
            DenyReason::NotSelf => "not_self",
            DenyReason::AssigneeNotMember => "assignee_not_member",
            DenyReason::UnsupportedAction => "unsupported_action",
        }
    }

    pub fn message(&self) -> &'static str {
        match self {
            DenyReason::AdminRequired => "admin role required",
            DenyReason::NotProjectMember => "not a project member",
            DenyReason::NotTaskParticipant => "not the task assignee or a project member",
            DenyReason::NotCommentAuthor => "only the comment author may modify it",
            DenyReason::NotSelf => "you can only access your own user record",
            DenyReason::AssigneeNotMember => "assignee is not a member of this project",
            DenyReason::UnsupportedAction => "action is not supported for this resource",
        }
    }
}

impl fmt::Display for DenyReason {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.message())
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[must_use]
pub enum Decision {
    Allow,
    Deny(DenyReason),
}

impl Decision {
    pub fn is_allowed(&self) -> bool {
        matches!(self, Decision::Allow)
    }

    fn allow_if(condition: bool, reason: DenyReason) -> Self {
        if condition {
            Decision::Allow
        } else {
            Decision::Deny(reason)
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum PolicyError {
    #[error("action '{action}' is not supported on {resource}")]
    UnsupportedAction {
        resource: ResourceKind,
        action: Action,
    },
}
