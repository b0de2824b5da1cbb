pub mod migrations;
mod queries;

use sqlx::PgPool;

use taskwarden_core::id::{CommentId, ProjectId, TaskId, UserId};
use taskwarden_core::identity::Role;
use taskwarden_core::model::{
    Comment, NewComment, NewProject, NewTask, NewUser, Project, ProjectPatch, Task, TaskPatch, User,
    UserPatch,
};
use taskwarden_core::policy::ProjectFilter;
use taskwarden_core::resource::{CommentSnapshot, ProjectSnapshot, ResourceKind, TaskSnapshot};

use crate::traits::{
    CommentStore, ProjectStore, StorageError, TaskQuery, TaskStore, UserStore,
};

use queries::to_storage_error;

#[derive(Debug, Clone)]
pub struct PostgresStore {
    pool: PgPool,
}

impl PostgresStore {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }

    pub async fn run_migrations(&self) -> Result<(), StorageError> {
        migrations::run_migrations(&self.pool)
            .await
            .map_err(to_storage_error)
    }
}

fn found(rows_affected: u64, kind: ResourceKind) -> Result<(), StorageError> {
    if rows_affected == 0 {
        Err(StorageError::NotFound(kind))
    } else {
        Ok(())
    }
}

impl UserStore for PostgresStore {
    async fn create_user(&self, user: &NewUser) -> Result<User, StorageError> {
        queries::insert_user(&self.pool, &UserId::generate(), user).await
    }

    async fn get_user(&self, id: &UserId) -> Result<Option<User>, StorageError> {
        queries::fetch_user(&self.pool, id).await
    }

    async fn find_user_by_email(&self, email: &str) -> Result<Option<User>, StorageError> {
        queries::fetch_user_by_email(&self.pool, email).await
    }

    async fn get_users(&self, ids: &[UserId]) -> Result<Vec<User>, StorageError> {
        queries::fetch_users(&self.pool, ids).await
    }

    async fn missing_users(&self, ids: &[UserId]) -> Result<Vec<UserId>, StorageError> {
        let existing = queries::existing_user_ids(&self.pool, ids).await?;
        Ok(ids
            .iter()
            .filter(|id| !existing.contains(id))
            .copied()
            .collect())
    }

    async fn update_user(&self, id: &UserId, patch: &UserPatch) -> Result<User, StorageError> {
        queries::update_user(&self.pool, id, patch)
            .await?
            .ok_or(StorageError::NotFound(ResourceKind::User))
    }

    async fn set_role(&self, id: &UserId, role: Role) -> Result<User, StorageError> {
        queries::update_role(&self.pool, id, role)
            .await?
            .ok_or(StorageError::NotFound(ResourceKind::User))
    }

    async fn delete_user(&self, id: &UserId) -> Result<(), StorageError> {
        let mut tx = self.pool.begin().await.map_err(to_storage_error)?;
        if queries::count_projects_created_by(&mut *tx, id).await? > 0 {
            return Err(StorageError::Conflict(
                "user still owns projects".to_string(),
            ));
        }
        let deleted = queries::delete_user(&mut *tx, id).await?;
        found(deleted, ResourceKind::User)?;
        tx.commit().await.map_err(to_storage_error)
    }
}

impl ProjectStore for PostgresStore {
    async fn create_project(&self, project: &NewProject) -> Result<Project, StorageError> {
        let id = ProjectId::generate();
        let mut tx = self.pool.begin().await.map_err(to_storage_error)?;
        queries::insert_project(&mut *tx, &id, project).await?;
        queries::insert_members(&mut *tx, &id, &project.member_ids).await?;
        let created = queries::fetch_project(&mut *tx, &id)
            .await?
            .ok_or(StorageError::NotFound(ResourceKind::Project))?;
        tx.commit().await.map_err(to_storage_error)?;
        Ok(created)
    }

    async fn get_project(&self, id: &ProjectId) -> Result<Option<Project>, StorageError> {
        queries::fetch_project(&self.pool, id).await
    }

    async fn list_projects(&self, filter: &ProjectFilter) -> Result<Vec<Project>, StorageError> {
        queries::list_projects(&self.pool, filter).await
    }

    async fn update_project(
        &self,
        id: &ProjectId,
        patch: &ProjectPatch,
    ) -> Result<Project, StorageError> {
        let mut tx = self.pool.begin().await.map_err(to_storage_error)?;
        found(
            queries::update_project(&mut *tx, id, patch).await?,
            ResourceKind::Project,
        )?;
        let updated = queries::fetch_project(&mut *tx, id)
            .await?
            .ok_or(StorageError::NotFound(ResourceKind::Project))?;
        tx.commit().await.map_err(to_storage_error)?;
        Ok(updated)
    }

    async fn delete_project(&self, id: &ProjectId) -> Result<(), StorageError> {
        found(
            queries::delete_project(&self.pool, id).await?,
            ResourceKind::Project,
        )
    }

    async fn add_members(
        &self,
        id: &ProjectId,
        members: &[UserId],
    ) -> Result<Project, StorageError> {
        let mut tx = self.pool.begin().await.map_err(to_storage_error)?;
        found(
            queries::touch_project(&mut *tx, id).await?,
            ResourceKind::Project,
        )?;
        queries::insert_members(&mut *tx, id, members).await?;
        let updated = queries::fetch_project(&mut *tx, id)
            .await?
            .ok_or(StorageError::NotFound(ResourceKind::Project))?;
        tx.commit().await.map_err(to_storage_error)?;
        Ok(updated)
    }

    async fn remove_members(
        &self,
        id: &ProjectId,
        members: &[UserId],
    ) -> Result<Project, StorageError> {
        let mut tx = self.pool.begin().await.map_err(to_storage_error)?;
        found(
            queries::touch_project(&mut *tx, id).await?,
            ResourceKind::Project,
        )?;
        queries::delete_members(&mut *tx, id, members).await?;
        let updated = queries::fetch_project(&mut *tx, id)
            .await?
            .ok_or(StorageError::NotFound(ResourceKind::Project))?;
        tx.commit().await.map_err(to_storage_error)?;
        Ok(updated)
    }

    async fn project_snapshot(
        &self,
        id: &ProjectId,
    ) -> Result<Option<ProjectSnapshot>, StorageError> {
        queries::fetch_project_snapshot(&self.pool, id).await
    }
}

impl TaskStore for PostgresStore {
    async fn create_task(&self, task: &NewTask) -> Result<Task, StorageError> {
        let mut tx = self.pool.begin().await.map_err(to_storage_error)?;
        if queries::fetch_project_snapshot(&mut *tx, &task.project_id)
            .await?
            .is_none()
        {
            return Err(StorageError::NotFound(ResourceKind::Project));
        }
        let created = queries::insert_task(&mut *tx, &TaskId::generate(), task).await?;
        tx.commit().await.map_err(to_storage_error)?;
        Ok(created)
    }

    async fn get_task(&self, id: &TaskId) -> Result<Option<Task>, StorageError> {
        queries::fetch_task(&self.pool, id).await
    }

    async fn list_tasks(&self, query: &TaskQuery) -> Result<Vec<Task>, StorageError> {
        queries::list_tasks(&self.pool, query).await
    }

    async fn update_task(&self, id: &TaskId, patch: &TaskPatch) -> Result<Task, StorageError> {
        queries::update_task(&self.pool, id, patch)
            .await?
            .ok_or(StorageError::NotFound(ResourceKind::Task))
    }

    async fn delete_task(&self, id: &TaskId) -> Result<(), StorageError> {
        found(
            queries::delete_task(&self.pool, id).await?,
            ResourceKind::Task,
        )
    }

    async fn task_snapshot(&self, id: &TaskId) -> Result<Option<TaskSnapshot>, StorageError> {
        queries::fetch_task_snapshot(&self.pool, id).await
    }
}

impl CommentStore for PostgresStore {
    async fn create_comment(&self, comment: &NewComment) -> Result<Comment, StorageError> {
        let mut tx = self.pool.begin().await.map_err(to_storage_error)?;
        if queries::fetch_user(&mut *tx, &comment.author_id)
            .await?
            .is_none()
        {
            return Err(StorageError::NotFound(ResourceKind::User));
        }
        let created = queries::insert_comment(&mut *tx, &CommentId::generate(), comment).await?;
        tx.commit().await.map_err(to_storage_error)?;
        Ok(created)
    }

    async fn get_comment(&self, id: &CommentId) -> Result<Option<Comment>, StorageError> {
        queries::fetch_comment(&self.pool, id).await
    }

    async fn list_comments_by_task(&self, task_id: &TaskId) -> Result<Vec<Comment>, StorageError> {
        queries::list_comments_by_task(&self.pool, task_id).await
    }

    async fn list_comments_by_author(
        &self,
        author_id: &UserId,
    ) -> Result<Vec<Comment>, StorageError> {
        queries::list_comments_by_author(&self.pool, author_id).await
    }

    async fn update_comment(&self, id: &CommentId, content: &str) -> Result<Comment, StorageError> {
        queries::update_comment(&self.pool, id, content)
            .await?
            .ok_or(StorageError::NotFound(ResourceKind::Comment))
    }

    async fn delete_comment(&self, id: &CommentId) -> Result<(), StorageError> {
        found(
            queries::delete_comment(&self.pool, id).await?,
            ResourceKind::Comment,
        )
    }

    async fn comment_snapshot(
        &self,
        id: &CommentId,
    ) -> Result<Option<CommentSnapshot>, StorageError> {
        queries::fetch_comment_snapshot(&self.pool, id).await
    }
}
