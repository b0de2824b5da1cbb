use std::future::Future;

use taskwarden_core::id::{CommentId, ProjectId, TaskId, UserId};
use taskwarden_core::identity::Role;
use taskwarden_core::model::{
    Comment, NewComment, NewProject, NewTask, NewUser, Project, ProjectPatch, Task, TaskPatch,
    TaskStatus, User, UserPatch,
};
use taskwarden_core::policy::ProjectFilter;
use taskwarden_core::resource::{CommentSnapshot, ProjectSnapshot, ResourceKind, TaskSnapshot};

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum StorageError {
    #[error("{0} not found")]
    NotFound(ResourceKind),
    #[error("conflict: {0}")]
    Conflict(String),
    #[error("internal storage error: {0}")]
    Internal(String),
}

/// Selection for task listings. Every set field narrows the result.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TaskQuery {
    pub projects: ProjectFilter,
    pub project_id: Option<ProjectId>,
    pub status: Option<TaskStatus>,
    pub assignee_id: Option<UserId>,
}

impl TaskQuery {
    pub fn new(projects: ProjectFilter) -> Self {
        Self {
            projects,
            project_id: None,
            status: None,
            assignee_id: None,
        }
    }
}

pub trait UserStore: Send + Sync {
    fn create_user(&self, user: &NewUser) -> impl Future<Output = Result<User, StorageError>> + Send;

    fn get_user(&self, id: &UserId)
    -> impl Future<Output = Result<Option<User>, StorageError>> + Send;

    fn find_user_by_email(
        &self,
        email: &str,
    ) -> impl Future<Output = Result<Option<User>, StorageError>> + Send;

    /// Users among `ids`, ordered by email. Unknown ids are skipped.
    fn get_users(
        &self,
        ids: &[UserId],
    ) -> impl Future<Output = Result<Vec<User>, StorageError>> + Send;

    /// Ids from `ids` that do not resolve to a user.
    fn missing_users(
        &self,
        ids: &[UserId],
    ) -> impl Future<Output = Result<Vec<UserId>, StorageError>> + Send;

    fn update_user(
        &self,
        id: &UserId,
        patch: &UserPatch,
    ) -> impl Future<Output = Result<User, StorageError>> + Send;

    fn set_role(
        &self,
        id: &UserId,
        role: Role,
    ) -> impl Future<Output = Result<User, StorageError>> + Send;

    /// Fails with `Conflict` while the user still created projects. Memberships
    /// and authored comments go with the user; assigned tasks become unassigned.
    fn delete_user(&self, id: &UserId) -> impl Future<Output = Result<(), StorageError>> + Send;
}

pub trait ProjectStore: Send + Sync {
    fn create_project(
        &self,
        project: &NewProject,
    ) -> impl Future<Output = Result<Project, StorageError>> + Send;

    fn get_project(
        &self,
        id: &ProjectId,
    ) -> impl Future<Output = Result<Option<Project>, StorageError>> + Send;

    /// Newest first.
    fn list_projects(
        &self,
        filter: &ProjectFilter,
    ) -> impl Future<Output = Result<Vec<Project>, StorageError>> + Send;

    fn update_project(
        &self,
        id: &ProjectId,
        patch: &ProjectPatch,
    ) -> impl Future<Output = Result<Project, StorageError>> + Send;

    /// Removes the project with its tasks and their comments.
    fn delete_project(&self, id: &ProjectId)
    -> impl Future<Output = Result<(), StorageError>> + Send;

    fn add_members(
        &self,
        id: &ProjectId,
        members: &[UserId],
    ) -> impl Future<Output = Result<Project, StorageError>> + Send;

    /// Does not touch task assignments of the removed members.
    fn remove_members(
        &self,
        id: &ProjectId,
        members: &[UserId],
    ) -> impl Future<Output = Result<Project, StorageError>> + Send;

    fn project_snapshot(
        &self,
        id: &ProjectId,
    ) -> impl Future<Output = Result<Option<ProjectSnapshot>, StorageError>> + Send;
}

pub trait TaskStore: Send + Sync {
    fn create_task(&self, task: &NewTask) -> impl Future<Output = Result<Task, StorageError>> + Send;

    fn get_task(&self, id: &TaskId)
    -> impl Future<Output = Result<Option<Task>, StorageError>> + Send;

    /// Newest first.
    fn list_tasks(
        &self,
        query: &TaskQuery,
    ) -> impl Future<Output = Result<Vec<Task>, StorageError>> + Send;

    fn update_task(
        &self,
        id: &TaskId,
        patch: &TaskPatch,
    ) -> impl Future<Output = Result<Task, StorageError>> + Send;

    fn delete_task(&self, id: &TaskId) -> impl Future<Output = Result<(), StorageError>> + Send;

    fn task_snapshot(
        &self,
        id: &TaskId,
    ) -> impl Future<Output = Result<Option<TaskSnapshot>, StorageError>> + Send;
}

pub trait CommentStore: Send + Sync {
    fn create_comment(
        &self,
        comment: &NewComment,
    ) -> impl Future<Output = Result<Comment, StorageError>> + Send;

    fn get_comment(
        &self,
        id: &CommentId,
    ) -> impl Future<Output = Result<Option<Comment>, StorageError>> + Send;

    /// Oldest first.
    fn list_comments_by_task(
        &self,
        task_id: &TaskId,
    ) -> impl Future<Output = Result<Vec<Comment>, StorageError>> + Send;

    /// Newest first.
    fn list_comments_by_author(
        &self,
        author_id: &UserId,
    ) -> impl Future<Output = Result<Vec<Comment>, StorageError>> + Send;

    fn update_comment(
        &self,
        id: &CommentId,
        content: &str,
    ) -> impl Future<Output = Result<Comment, StorageError>> + Send;

    fn delete_comment(&self, id: &CommentId)
    -> impl Future<Output = Result<(), StorageError>> + Send;

    fn comment_snapshot(
        &self,
        id: &CommentId,
    ) -> impl Future<Output = Result<Option<CommentSnapshot>, StorageError>> + Send;
}

pub trait Store: UserStore + ProjectStore + TaskStore + CommentStore {}

impl<T: UserStore + ProjectStore + TaskStore + CommentStore> Store for T {}
