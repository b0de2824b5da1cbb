use std::future::Future;

use crate::id::{CommentId, ProjectId, TaskId, UserId};
use crate::resource::{
    CommentSnapshot, ProjectSnapshot, ResourceKind, TaskSnapshot, UserSnapshot,
};

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum LoadError {
    #[error("{0} not found")]
    NotFound(ResourceKind),

    #[error("storage error: {0}")]
    Storage(String),
}

/// Produces the facts a decision needs, fresh from persisted state.
///
/// Each call is one logical read: a task or comment snapshot always resolves
/// through to its project's current creator and members.
pub trait SnapshotLoader: Send + Sync {
    fn load_project(
        &self,
        id: &ProjectId,
    ) -> impl Future<Output = Result<ProjectSnapshot, LoadError>> + Send;

    fn load_task(&self, id: &TaskId) -> impl Future<Output = Result<TaskSnapshot, LoadError>> + Send;

    fn load_comment(
        &self,
        id: &CommentId,
    ) -> impl Future<Output = Result<CommentSnapshot, LoadError>> + Send;

    fn load_user(&self, id: &UserId) -> impl Future<Output = Result<UserSnapshot, LoadError>> + Send;
}
