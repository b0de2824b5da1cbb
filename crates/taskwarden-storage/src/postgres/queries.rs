use chrono::{DateTime, Utc};
use sqlx::{Postgres, QueryBuilder};
use uuid::Uuid;

use taskwarden_core::id::{CommentId, ProjectId, TaskId, UserId};
use taskwarden_core::identity::Role;
use taskwarden_core::model::{
    Comment, NewComment, NewProject, NewTask, NewUser, Project, ProjectPatch, Task, TaskPatch,
    TaskStatus, User, UserPatch,
};
use taskwarden_core::policy::ProjectFilter;
use taskwarden_core::resource::{CommentSnapshot, ProjectSnapshot, ResourceKind, TaskSnapshot};

use crate::traits::{StorageError, TaskQuery};

const USER_COLUMNS: &str = "u.id, u.email, u.first_name, u.last_name, u.role, u.created_at, u.updated_at";

const PROJECT_COLUMNS: &str = "p.id, p.name, p.description, p.creator_id, \
     ARRAY(SELECT m.user_id FROM project_members m WHERE m.project_id = p.id) AS member_ids, \
     p.created_at, p.updated_at";

const TASK_COLUMNS: &str = "t.id, t.project_id, t.title, t.description, t.status, t.assignee_id, \
     t.created_at, t.updated_at";

const COMMENT_COLUMNS: &str = "c.id, c.task_id, c.author_id, c.content, c.created_at, c.updated_at";

pub(crate) fn to_storage_error(e: sqlx::Error) -> StorageError {
    StorageError::Internal(e.to_string())
}

/// Unique violations become `Conflict`, dangling references `NotFound(referenced)`.
fn to_write_error(e: sqlx::Error, referenced: ResourceKind) -> StorageError {
    if let sqlx::Error::Database(ref db_err) = e {
        if db_err.is_unique_violation() {
            return StorageError::Conflict(db_err.message().to_string());
        }
        if db_err.is_foreign_key_violation() {
            return StorageError::NotFound(referenced);
        }
    }
    to_storage_error(e)
}

#[derive(sqlx::FromRow)]
struct UserRow {
    id: Uuid,
    email: String,
    first_name: Option<String>,
    last_name: Option<String>,
    role: String,
    created_at: DateTime<Utc>,
    updated_at: DateTime<Utc>,
}

impl TryFrom<UserRow> for User {
    type Error = StorageError;

    fn try_from(row: UserRow) -> Result<Self, Self::Error> {
        let role: Role = row
            .role
            .parse()
            .map_err(|e: taskwarden_core::identity::UnknownRole| {
                StorageError::Internal(e.to_string())
            })?;
        Ok(User {
            id: UserId::new(row.id),
            email: row.email,
            first_name: row.first_name,
            last_name: row.last_name,
            role,
            created_at: row.created_at,
            updated_at: row.updated_at,
        })
    }
}

#[derive(sqlx::FromRow)]
struct ProjectRow {
    id: Uuid,
    name: String,
    description: Option<String>,
    creator_id: Uuid,
    member_ids: Vec<Uuid>,
    created_at: DateTime<Utc>,
    updated_at: DateTime<Utc>,
}

impl From<ProjectRow> for Project {
    fn from(row: ProjectRow) -> Self {
        Project {
            id: ProjectId::new(row.id),
            name: row.name,
            description: row.description,
            creator_id: UserId::new(row.creator_id),
            member_ids: row.member_ids.into_iter().map(UserId::new).collect(),
            created_at: row.created_at,
            updated_at: row.updated_at,
        }
    }
}

#[derive(sqlx::FromRow)]
struct TaskRow {
    id: Uuid,
    project_id: Uuid,
    title: String,
    description: Option<String>,
    status: String,
    assignee_id: Option<Uuid>,
    created_at: DateTime<Utc>,
    updated_at: DateTime<Utc>,
}

impl TryFrom<TaskRow> for Task {
    type Error = StorageError;

    fn try_from(row: TaskRow) -> Result<Self, Self::Error> {
        let status: TaskStatus = row
            .status
            .parse()
            .map_err(|e: taskwarden_core::model::UnknownStatus| {
                StorageError::Internal(e.to_string())
            })?;
        Ok(Task {
            id: TaskId::new(row.id),
            project_id: ProjectId::new(row.project_id),
            title: row.title,
            description: row.description,
            status,
            assignee_id: row.assignee_id.map(UserId::new),
            created_at: row.created_at,
            updated_at: row.updated_at,
        })
    }
}

#[derive(sqlx::FromRow)]
struct CommentRow {
    id: Uuid,
    task_id: Uuid,
    author_id: Uuid,
    content: String,
    created_at: DateTime<Utc>,
    updated_at: DateTime<Utc>,
}

impl From<CommentRow> for Comment {
    fn from(row: CommentRow) -> Self {
        Comment {
            id: CommentId::new(row.id),
            task_id: TaskId::new(row.task_id),
            author_id: UserId::new(row.author_id),
            content: row.content,
            created_at: row.created_at,
            updated_at: row.updated_at,
        }
    }
}

#[derive(sqlx::FromRow)]
struct SnapshotRow {
    comment_id: Option<Uuid>,
    author_id: Option<Uuid>,
    task_id: Option<Uuid>,
    assignee_id: Option<Uuid>,
    project_id: Uuid,
    creator_id: Uuid,
    member_ids: Vec<Uuid>,
}

impl SnapshotRow {
    fn project(&self) -> ProjectSnapshot {
        ProjectSnapshot::new(
            ProjectId::new(self.project_id),
            UserId::new(self.creator_id),
            self.member_ids.iter().copied().map(UserId::new),
        )
    }

    fn task(&self) -> Result<TaskSnapshot, StorageError> {
        let id = self
            .task_id
            .ok_or_else(|| StorageError::Internal("snapshot row without task id".to_string()))?;
        Ok(TaskSnapshot::new(
            TaskId::new(id),
            self.project(),
            self.assignee_id.map(UserId::new),
        ))
    }

    fn comment(&self) -> Result<CommentSnapshot, StorageError> {
        let (Some(id), Some(author)) = (self.comment_id, self.author_id) else {
            return Err(StorageError::Internal(
                "snapshot row without comment id".to_string(),
            ));
        };
        Ok(CommentSnapshot::new(
            CommentId::new(id),
            UserId::new(author),
            self.task()?,
        ))
    }
}

// users

pub async fn insert_user<'e>(
    executor: impl sqlx::PgExecutor<'e>,
    id: &UserId,
    user: &NewUser,
) -> Result<User, StorageError> {
    let row: UserRow = sqlx::query_as(
        r#"
        INSERT INTO users AS u (id, email, first_name, last_name, role)
        VALUES ($1, $2, $3, $4, $5)
        RETURNING u.id, u.email, u.first_name, u.last_name, u.role, u.created_at, u.updated_at
        "#,
    )
    .bind(id.as_uuid())
    .bind(&user.email)
    .bind(&user.first_name)
    .bind(&user.last_name)
    .bind(user.role.as_str())
    .fetch_one(executor)
    .await
    .map_err(|e| match to_write_error(e, ResourceKind::User) {
        StorageError::Conflict(_) => {
            StorageError::Conflict(format!("email already in use: {}", user.email))
        }
        other => other,
    })?;
    row.try_into()
}

pub async fn fetch_user<'e>(
    executor: impl sqlx::PgExecutor<'e>,
    id: &UserId,
) -> Result<Option<User>, StorageError> {
    let query = format!("SELECT {USER_COLUMNS} FROM users u WHERE u.id = $1");
    let row: Option<UserRow> = sqlx::query_as(&query)
        .bind(id.as_uuid())
        .fetch_optional(executor)
        .await
        .map_err(to_storage_error)?;
    row.map(User::try_from).transpose()
}

pub async fn fetch_user_by_email<'e>(
    executor: impl sqlx::PgExecutor<'e>,
    email: &str,
) -> Result<Option<User>, StorageError> {
    let query = format!("SELECT {USER_COLUMNS} FROM users u WHERE u.email = $1");
    let row: Option<UserRow> = sqlx::query_as(&query)
        .bind(email)
        .fetch_optional(executor)
        .await
        .map_err(to_storage_error)?;
    row.map(User::try_from).transpose()
}

pub async fn fetch_users<'e>(
    executor: impl sqlx::PgExecutor<'e>,
    ids: &[UserId],
) -> Result<Vec<User>, StorageError> {
    let raw: Vec<Uuid> = ids.iter().map(|id| *id.as_uuid()).collect();
    let query =
        format!("SELECT {USER_COLUMNS} FROM users u WHERE u.id = ANY($1) ORDER BY u.email");
    let rows: Vec<UserRow> = sqlx::query_as(&query)
        .bind(&raw)
        .fetch_all(executor)
        .await
        .map_err(to_storage_error)?;
    rows.into_iter().map(User::try_from).collect()
}

pub async fn existing_user_ids<'e>(
    executor: impl sqlx::PgExecutor<'e>,
    ids: &[UserId],
) -> Result<Vec<UserId>, StorageError> {
    let raw: Vec<Uuid> = ids.iter().map(|id| *id.as_uuid()).collect();
    let rows: Vec<(Uuid,)> = sqlx::query_as("SELECT id FROM users WHERE id = ANY($1)")
        .bind(&raw)
        .fetch_all(executor)
        .await
        .map_err(to_storage_error)?;
    Ok(rows.into_iter().map(|(id,)| UserId::new(id)).collect())
}

pub async fn update_user<'e>(
    executor: impl sqlx::PgExecutor<'e>,
    id: &UserId,
    patch: &UserPatch,
) -> Result<Option<User>, StorageError> {
    let row: Option<UserRow> = sqlx::query_as(
        r#"
        UPDATE users AS u SET
            email = COALESCE($2, u.email),
            first_name = COALESCE($3, u.first_name),
            last_name = COALESCE($4, u.last_name),
            updated_at = now()
        WHERE u.id = $1
        RETURNING u.id, u.email, u.first_name, u.last_name, u.role, u.created_at, u.updated_at
        "#,
    )
    .bind(id.as_uuid())
    .bind(&patch.email)
    .bind(&patch.first_name)
    .bind(&patch.last_name)
    .fetch_optional(executor)
    .await
    .map_err(|e| match to_write_error(e, ResourceKind::User) {
        StorageError::Conflict(_) => StorageError::Conflict(format!(
            "email already in use: {}",
            patch.email.as_deref().unwrap_or_default()
        )),
        other => other,
    })?;
    row.map(User::try_from).transpose()
}

pub async fn update_role<'e>(
    executor: impl sqlx::PgExecutor<'e>,
    id: &UserId,
    role: Role,
) -> Result<Option<User>, StorageError> {
    let row: Option<UserRow> = sqlx::query_as(
        r#"
        UPDATE users AS u SET role = $2, updated_at = now()
        WHERE u.id = $1
        RETURNING u.id, u.email, u.first_name, u.last_name, u.role, u.created_at, u.updated_at
        "#,
    )
    .bind(id.as_uuid())
    .bind(role.as_str())
    .fetch_optional(executor)
    .await
    .map_err(to_storage_error)?;
    row.map(User::try_from).transpose()
}

pub async fn count_projects_created_by<'e>(
    executor: impl sqlx::PgExecutor<'e>,
    id: &UserId,
) -> Result<i64, StorageError> {
    let row: (i64,) = sqlx::query_as("SELECT COUNT(*) FROM projects WHERE creator_id = $1")
        .bind(id.as_uuid())
        .fetch_one(executor)
        .await
        .map_err(to_storage_error)?;
    Ok(row.0)
}

pub async fn delete_user<'e>(
    executor: impl sqlx::PgExecutor<'e>,
    id: &UserId,
) -> Result<u64, StorageError> {
    let result = sqlx::query("DELETE FROM users WHERE id = $1")
        .bind(id.as_uuid())
        .execute(executor)
        .await
        .map_err(|e| match to_write_error(e, ResourceKind::User) {
            StorageError::NotFound(_) => {
                StorageError::Conflict("user still owns projects".to_string())
            }
            other => other,
        })?;
    Ok(result.rows_affected())
}

// projects

pub async fn insert_project<'e>(
    executor: impl sqlx::PgExecutor<'e>,
    id: &ProjectId,
    project: &NewProject,
) -> Result<(), StorageError> {
    sqlx::query("INSERT INTO projects (id, name, description, creator_id) VALUES ($1, $2, $3, $4)")
        .bind(id.as_uuid())
        .bind(&project.name)
        .bind(&project.description)
        .bind(project.creator_id.as_uuid())
        .execute(executor)
        .await
        .map_err(|e| to_write_error(e, ResourceKind::User))?;
    Ok(())
}

pub async fn insert_members<'e>(
    executor: impl sqlx::PgExecutor<'e>,
    id: &ProjectId,
    members: &[UserId],
) -> Result<(), StorageError> {
    let raw: Vec<Uuid> = members.iter().map(|m| *m.as_uuid()).collect();
    sqlx::query(
        r#"
        INSERT INTO project_members (project_id, user_id)
        SELECT $1, UNNEST($2::uuid[])
        ON CONFLICT DO NOTHING
        "#,
    )
    .bind(id.as_uuid())
    .bind(&raw)
    .execute(executor)
    .await
    .map_err(|e| to_write_error(e, ResourceKind::User))?;
    Ok(())
}

pub async fn delete_members<'e>(
    executor: impl sqlx::PgExecutor<'e>,
    id: &ProjectId,
    members: &[UserId],
) -> Result<(), StorageError> {
    let raw: Vec<Uuid> = members.iter().map(|m| *m.as_uuid()).collect();
    sqlx::query("DELETE FROM project_members WHERE project_id = $1 AND user_id = ANY($2)")
        .bind(id.as_uuid())
        .bind(&raw)
        .execute(executor)
        .await
        .map_err(to_storage_error)?;
    Ok(())
}

pub async fn touch_project<'e>(
    executor: impl sqlx::PgExecutor<'e>,
    id: &ProjectId,
) -> Result<u64, StorageError> {
    let result = sqlx::query("UPDATE projects SET updated_at = now() WHERE id = $1")
        .bind(id.as_uuid())
        .execute(executor)
        .await
        .map_err(to_storage_error)?;
    Ok(result.rows_affected())
}

pub async fn fetch_project<'e>(
    executor: impl sqlx::PgExecutor<'e>,
    id: &ProjectId,
) -> Result<Option<Project>, StorageError> {
    let query = format!("SELECT {PROJECT_COLUMNS} FROM projects p WHERE p.id = $1");
    let row: Option<ProjectRow> = sqlx::query_as(&query)
        .bind(id.as_uuid())
        .fetch_optional(executor)
        .await
        .map_err(to_storage_error)?;
    Ok(row.map(Project::from))
}

pub async fn list_projects<'e>(
    executor: impl sqlx::PgExecutor<'e>,
    filter: &ProjectFilter,
) -> Result<Vec<Project>, StorageError> {
    let mut builder: QueryBuilder<'_, Postgres> =
        QueryBuilder::new(format!("SELECT {PROJECT_COLUMNS} FROM projects p"));
    if let ProjectFilter::AccessibleTo(user) = filter {
        push_accessible_to(&mut builder, " WHERE p.id", user);
    }
    builder.push(" ORDER BY p.created_at DESC, p.id DESC");

    let rows: Vec<ProjectRow> = builder
        .build_query_as()
        .fetch_all(executor)
        .await
        .map_err(to_storage_error)?;
    Ok(rows.into_iter().map(Project::from).collect())
}

/// Appends `<column> IN (<projects the user created or joined>)`.
fn push_accessible_to(builder: &mut QueryBuilder<'_, Postgres>, column: &str, user: &UserId) {
    builder.push(column);
    builder.push(" IN (SELECT ap.id FROM projects ap WHERE ap.creator_id = ");
    builder.push_bind(*user.as_uuid());
    builder.push(" UNION SELECT am.project_id FROM project_members am WHERE am.user_id = ");
    builder.push_bind(*user.as_uuid());
    builder.push(")");
}

pub async fn update_project<'e>(
    executor: impl sqlx::PgExecutor<'e>,
    id: &ProjectId,
    patch: &ProjectPatch,
) -> Result<u64, StorageError> {
    let result = sqlx::query(
        r#"
        UPDATE projects SET
            name = COALESCE($2, name),
            description = COALESCE($3, description),
            updated_at = now()
        WHERE id = $1
        "#,
    )
    .bind(id.as_uuid())
    .bind(&patch.name)
    .bind(&patch.description)
    .execute(executor)
    .await
    .map_err(to_storage_error)?;
    Ok(result.rows_affected())
}

pub async fn delete_project<'e>(
    executor: impl sqlx::PgExecutor<'e>,
    id: &ProjectId,
) -> Result<u64, StorageError> {
    let result = sqlx::query("DELETE FROM projects WHERE id = $1")
        .bind(id.as_uuid())
        .execute(executor)
        .await
        .map_err(to_storage_error)?;
    Ok(result.rows_affected())
}

pub async fn fetch_project_snapshot<'e>(
    executor: impl sqlx::PgExecutor<'e>,
    id: &ProjectId,
) -> Result<Option<ProjectSnapshot>, StorageError> {
    let row: Option<SnapshotRow> = sqlx::query_as(
        r#"
        SELECT NULL::uuid AS comment_id, NULL::uuid AS author_id,
               NULL::uuid AS task_id, NULL::uuid AS assignee_id,
               p.id AS project_id, p.creator_id,
               ARRAY(SELECT m.user_id FROM project_members m WHERE m.project_id = p.id) AS member_ids
        FROM projects p
        WHERE p.id = $1
        "#,
    )
    .bind(id.as_uuid())
    .fetch_optional(executor)
    .await
    .map_err(to_storage_error)?;
    Ok(row.map(|r| r.project()))
}

// tasks

pub async fn insert_task<'e>(
    executor: impl sqlx::PgExecutor<'e>,
    id: &TaskId,
    task: &NewTask,
) -> Result<Task, StorageError> {
    let row: TaskRow = sqlx::query_as(
        r#"
        INSERT INTO tasks AS t (id, project_id, title, description, status, assignee_id)
        VALUES ($1, $2, $3, $4, $5, $6)
        RETURNING t.id, t.project_id, t.title, t.description, t.status, t.assignee_id,
                  t.created_at, t.updated_at
        "#,
    )
    .bind(id.as_uuid())
    .bind(task.project_id.as_uuid())
    .bind(&task.title)
    .bind(&task.description)
    .bind(TaskStatus::default().as_str())
    .bind(task.assignee_id.map(|a| *a.as_uuid()))
    .fetch_one(executor)
    .await
    .map_err(|e| to_write_error(e, ResourceKind::User))?;
    row.try_into()
}

pub async fn fetch_task<'e>(
    executor: impl sqlx::PgExecutor<'e>,
    id: &TaskId,
) -> Result<Option<Task>, StorageError> {
    let query = format!("SELECT {TASK_COLUMNS} FROM tasks t WHERE t.id = $1");
    let row: Option<TaskRow> = sqlx::query_as(&query)
        .bind(id.as_uuid())
        .fetch_optional(executor)
        .await
        .map_err(to_storage_error)?;
    row.map(Task::try_from).transpose()
}

pub async fn list_tasks<'e>(
    executor: impl sqlx::PgExecutor<'e>,
    query: &TaskQuery,
) -> Result<Vec<Task>, StorageError> {
    let mut builder: QueryBuilder<'_, Postgres> =
        QueryBuilder::new(format!("SELECT {TASK_COLUMNS} FROM tasks t WHERE TRUE"));
    if let ProjectFilter::AccessibleTo(user) = &query.projects {
        push_accessible_to(&mut builder, " AND t.project_id", user);
    }
    if let Some(project_id) = query.project_id {
        builder.push(" AND t.project_id = ");
        builder.push_bind(*project_id.as_uuid());
    }
    if let Some(status) = query.status {
        builder.push(" AND t.status = ");
        builder.push_bind(status.as_str());
    }
    if let Some(assignee) = query.assignee_id {
        builder.push(" AND t.assignee_id = ");
        builder.push_bind(*assignee.as_uuid());
    }
    builder.push(" ORDER BY t.created_at DESC, t.id DESC");

    let rows: Vec<TaskRow> = builder
        .build_query_as()
        .fetch_all(executor)
        .await
        .map_err(to_storage_error)?;
    rows.into_iter().map(Task::try_from).collect()
}

pub async fn update_task<'e>(
    executor: impl sqlx::PgExecutor<'e>,
    id: &TaskId,
    patch: &TaskPatch,
) -> Result<Option<Task>, StorageError> {
    // $5 selects whether the assignee column is written at all; $6 may be NULL.
    let row: Option<TaskRow> = sqlx::query_as(
        r#"
        UPDATE tasks AS t SET
            title = COALESCE($2, t.title),
            description = COALESCE($3, t.description),
            status = COALESCE($4, t.status),
            assignee_id = CASE WHEN $5 THEN $6 ELSE t.assignee_id END,
            updated_at = now()
        WHERE t.id = $1
        RETURNING t.id, t.project_id, t.title, t.description, t.status, t.assignee_id,
                  t.created_at, t.updated_at
        "#,
    )
    .bind(id.as_uuid())
    .bind(&patch.title)
    .bind(&patch.description)
    .bind(patch.status.map(|s| s.as_str()))
    .bind(patch.assignee_id.is_some())
    .bind(patch.assignee_id.flatten().map(|a| *a.as_uuid()))
    .fetch_optional(executor)
    .await
    .map_err(|e| to_write_error(e, ResourceKind::User))?;
    row.map(Task::try_from).transpose()
}

pub async fn delete_task<'e>(
    executor: impl sqlx::PgExecutor<'e>,
    id: &TaskId,
) -> Result<u64, StorageError> {
    let result = sqlx::query("DELETE FROM tasks WHERE id = $1")
        .bind(id.as_uuid())
        .execute(executor)
        .await
        .map_err(to_storage_error)?;
    Ok(result.rows_affected())
}

pub async fn fetch_task_snapshot<'e>(
    executor: impl sqlx::PgExecutor<'e>,
    id: &TaskId,
) -> Result<Option<TaskSnapshot>, StorageError> {
    let row: Option<SnapshotRow> = sqlx::query_as(
        r#"
        SELECT NULL::uuid AS comment_id, NULL::uuid AS author_id,
               t.id AS task_id, t.assignee_id,
               p.id AS project_id, p.creator_id,
               ARRAY(SELECT m.user_id FROM project_members m WHERE m.project_id = p.id) AS member_ids
        FROM tasks t
        JOIN projects p ON p.id = t.project_id
        WHERE t.id = $1
        "#,
    )
    .bind(id.as_uuid())
    .fetch_optional(executor)
    .await
    .map_err(to_storage_error)?;
    row.map(|r| r.task()).transpose()
}

// comments

pub async fn insert_comment<'e>(
    executor: impl sqlx::PgExecutor<'e>,
    id: &CommentId,
    comment: &NewComment,
) -> Result<Comment, StorageError> {
    let row: CommentRow = sqlx::query_as(
        r#"
        INSERT INTO comments AS c (id, task_id, author_id, content)
        VALUES ($1, $2, $3, $4)
        RETURNING c.id, c.task_id, c.author_id, c.content, c.created_at, c.updated_at
        "#,
    )
    .bind(id.as_uuid())
    .bind(comment.task_id.as_uuid())
    .bind(comment.author_id.as_uuid())
    .bind(&comment.content)
    .fetch_one(executor)
    .await
    .map_err(|e| to_write_error(e, ResourceKind::Task))?;
    Ok(row.into())
}

pub async fn fetch_comment<'e>(
    executor: impl sqlx::PgExecutor<'e>,
    id: &CommentId,
) -> Result<Option<Comment>, StorageError> {
    let query = format!("SELECT {COMMENT_COLUMNS} FROM comments c WHERE c.id = $1");
    let row: Option<CommentRow> = sqlx::query_as(&query)
        .bind(id.as_uuid())
        .fetch_optional(executor)
        .await
        .map_err(to_storage_error)?;
    Ok(row.map(Comment::from))
}

pub async fn list_comments_by_task<'e>(
    executor: impl sqlx::PgExecutor<'e>,
    task_id: &TaskId,
) -> Result<Vec<Comment>, StorageError> {
    let query = format!(
        "SELECT {COMMENT_COLUMNS} FROM comments c WHERE c.task_id = $1 ORDER BY c.created_at, c.id"
    );
    let rows: Vec<CommentRow> = sqlx::query_as(&query)
        .bind(task_id.as_uuid())
        .fetch_all(executor)
        .await
        .map_err(to_storage_error)?;
    Ok(rows.into_iter().map(Comment::from).collect())
}

pub async fn list_comments_by_author<'e>(
    executor: impl sqlx::PgExecutor<'e>,
    author_id: &UserId,
) -> Result<Vec<Comment>, StorageError> {
    let query = format!(
        "SELECT {COMMENT_COLUMNS} FROM comments c WHERE c.author_id = $1 \
         ORDER BY c.created_at DESC, c.id DESC"
    );
    let rows: Vec<CommentRow> = sqlx::query_as(&query)
        .bind(author_id.as_uuid())
        .fetch_all(executor)
        .await
        .map_err(to_storage_error)?;
    Ok(rows.into_iter().map(Comment::from).collect())
}

pub async fn update_comment<'e>(
    executor: impl sqlx::PgExecutor<'e>,
    id: &CommentId,
    content: &str,
) -> Result<Option<Comment>, StorageError> {
    let row: Option<CommentRow> = sqlx::query_as(
        r#"
        UPDATE comments AS c SET content = $2, updated_at = now()
        WHERE c.id = $1
        RETURNING c.id, c.task_id, c.author_id, c.content, c.created_at, c.updated_at
        "#,
    )
    .bind(id.as_uuid())
    .bind(content)
    .fetch_optional(executor)
    .await
    .map_err(to_storage_error)?;
    Ok(row.map(Comment::from))
}

pub async fn delete_comment<'e>(
    executor: impl sqlx::PgExecutor<'e>,
    id: &CommentId,
) -> Result<u64, StorageError> {
    let result = sqlx::query("DELETE FROM comments WHERE id = $1")
        .bind(id.as_uuid())
        .execute(executor)
        .await
        .map_err(to_storage_error)?;
    Ok(result.rows_affected())
}

pub async fn fetch_comment_snapshot<'e>(
    executor: impl sqlx::PgExecutor<'e>,
    id: &CommentId,
) -> Result<Option<CommentSnapshot>, StorageError> {
    let row: Option<SnapshotRow> = sqlx::query_as(
        r#"
        SELECT c.id AS comment_id, c.author_id,
               t.id AS task_id, t.assignee_id,
               p.id AS project_id, p.creator_id,
               ARRAY(SELECT m.user_id FROM project_members m WHERE m.project_id = p.id) AS member_ids
        FROM comments c
        JOIN tasks t ON t.id = c.task_id
        JOIN projects p ON p.id = t.project_id
        WHERE c.id = $1
        "#,
    )
    .bind(id.as_uuid())
    .fetch_optional(executor)
    .await
    .map_err(to_storage_error)?;
    row.map(|r| r.comment()).transpose()
}
