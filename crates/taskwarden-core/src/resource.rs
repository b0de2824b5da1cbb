use std::collections::BTreeSet;
use std::fmt;

use crate::id::{CommentId, ProjectId, TaskId, UserId};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ResourceKind {
    Project,
    Task,
    Comment,
    User,
}

impl ResourceKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            ResourceKind::Project => "project",
            ResourceKind::Task => "task",
            ResourceKind::Comment => "comment",
            ResourceKind::User => "user",
        }
    }
}

impl fmt::Display for ResourceKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Ownership and membership facts of one project, as read from storage.
///
/// The creator is not required to appear in `member_ids`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ProjectSnapshot {
    pub id: ProjectId,
    pub creator_id: UserId,
    pub member_ids: BTreeSet<UserId>,
}

impl ProjectSnapshot {
    pub fn new(
        id: ProjectId,
        creator_id: UserId,
        member_ids: impl IntoIterator<Item = UserId>,
    ) -> Self {
        Self {
            id,
            creator_id,
            member_ids: member_ids.into_iter().collect(),
        }
    }

    pub fn is_creator(&self, user: &UserId) -> bool {
        self.creator_id == *user
    }

    pub fn is_member(&self, user: &UserId) -> bool {
        self.member_ids.contains(user)
    }

    /// Creator or explicit member.
    pub fn is_participant(&self, user: &UserId) -> bool {
        self.is_creator(user) || self.is_member(user)
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TaskSnapshot {
    pub id: TaskId,
    pub project: ProjectSnapshot,
    pub assignee_id: Option<UserId>,
}

impl TaskSnapshot {
    pub fn new(id: TaskId, project: ProjectSnapshot, assignee_id: Option<UserId>) -> Self {
        Self {
            id,
            project,
            assignee_id,
        }
    }

    pub fn is_assignee(&self, user: &UserId) -> bool {
        self.assignee_id.as_ref() == Some(user)
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CommentSnapshot {
    pub id: CommentId,
    pub author_id: UserId,
    pub task: TaskSnapshot,
}

impl CommentSnapshot {
    pub fn new(id: CommentId, author_id: UserId, task: TaskSnapshot) -> Self {
        Self {
            id,
            author_id,
            task,
        }
    }

    pub fn is_author(&self, user: &UserId) -> bool {
        self.author_id == *user
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct UserSnapshot {
    pub id: UserId,
}

impl UserSnapshot {
    pub fn new(id: UserId) -> Self {
        Self { id }
    }
}
