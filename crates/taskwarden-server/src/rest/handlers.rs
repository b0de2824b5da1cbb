use std::str::FromStr;

use axum::Json;
use axum::extract::{Extension, Path, Query, State};
use axum::http::StatusCode;
use axum::response::IntoResponse;

use taskwarden_core::id::{CommentId, ProjectId, TaskId, UserId};
use taskwarden_core::identity::Identity;
use taskwarden_core::model::{Comment, Project, Task, TaskStatus, User};
use taskwarden_storage::Store;

use crate::error::ApiError;
use crate::service::{ProjectStats, TaskFilter, UserStats};

use super::AppState;
use super::types::*;

type HandlerError = (StatusCode, Json<ErrorResponse>);
type HandlerResult<T> = Result<Json<T>, HandlerError>;

pub(crate) fn api_error_to_response(err: ApiError) -> HandlerError {
    let status = match &err {
        ApiError::NotFound(_) => StatusCode::NOT_FOUND,
        ApiError::Denied(_) => StatusCode::FORBIDDEN,
        ApiError::Invalid(_) => StatusCode::BAD_REQUEST,
        ApiError::Conflict(_) => StatusCode::CONFLICT,
        ApiError::Storage(_) => StatusCode::INTERNAL_SERVER_ERROR,
    };

    let error = match &err {
        ApiError::Storage(detail) => {
            tracing::error!(error = %detail, "storage failure");
            "internal server error".to_string()
        }
        other => other.to_string(),
    };

    (
        status,
        Json(ErrorResponse {
            error,
            code: err.code().to_string(),
        }),
    )
}

fn parse_id<T: FromStr>(raw: &str) -> Result<T, HandlerError> {
    raw.parse()
        .map_err(|_| api_error_to_response(ApiError::Invalid(format!("malformed id: {raw}"))))
}

fn respond<T>(result: Result<T, ApiError>) -> HandlerResult<T> {
    result.map(Json).map_err(api_error_to_response)
}

fn created<T>(result: Result<T, ApiError>) -> Result<(StatusCode, Json<T>), HandlerError> {
    result
        .map(|value| (StatusCode::CREATED, Json(value)))
        .map_err(api_error_to_response)
}

fn no_content(result: Result<(), ApiError>) -> Result<StatusCode, HandlerError> {
    result
        .map(|()| StatusCode::NO_CONTENT)
        .map_err(api_error_to_response)
}

pub async fn healthz() -> impl IntoResponse {
    Json(serde_json::json!({"status": "ok"}))
}

// Projects

pub async fn create_project<S: Store + 'static>(
    State(state): State<AppState<S>>,
    Extension(identity): Extension<Identity>,
    Json(req): Json<CreateProjectRequest>,
) -> Result<(StatusCode, Json<Project>), HandlerError> {
    created(state.service.create_project(&identity, req.into()).await)
}

pub async fn list_projects<S: Store + 'static>(
    State(state): State<AppState<S>>,
    Extension(identity): Extension<Identity>,
) -> HandlerResult<Vec<Project>> {
    respond(state.service.list_projects(&identity).await)
}

pub async fn get_project<S: Store + 'static>(
    State(state): State<AppState<S>>,
    Extension(identity): Extension<Identity>,
    Path(id): Path<String>,
) -> HandlerResult<Project> {
    let id: ProjectId = parse_id(&id)?;
    respond(state.service.get_project(&identity, &id).await)
}

pub async fn update_project<S: Store + 'static>(
    State(state): State<AppState<S>>,
    Extension(identity): Extension<Identity>,
    Path(id): Path<String>,
    Json(req): Json<UpdateProjectRequest>,
) -> HandlerResult<Project> {
    let id: ProjectId = parse_id(&id)?;
    respond(state.service.update_project(&identity, &id, req.into()).await)
}

pub async fn delete_project<S: Store + 'static>(
    State(state): State<AppState<S>>,
    Extension(identity): Extension<Identity>,
    Path(id): Path<String>,
) -> Result<StatusCode, HandlerError> {
    let id: ProjectId = parse_id(&id)?;
    no_content(state.service.delete_project(&identity, &id).await)
}

pub async fn list_members<S: Store + 'static>(
    State(state): State<AppState<S>>,
    Extension(identity): Extension<Identity>,
    Path(id): Path<String>,
) -> HandlerResult<Vec<User>> {
    let id: ProjectId = parse_id(&id)?;
    respond(state.service.list_members(&identity, &id).await)
}

pub async fn add_members<S: Store + 'static>(
    State(state): State<AppState<S>>,
    Extension(identity): Extension<Identity>,
    Path(id): Path<String>,
    Json(req): Json<MemberIdsRequest>,
) -> HandlerResult<Project> {
    let id: ProjectId = parse_id(&id)?;
    respond(
        state
            .service
            .add_members(&identity, &id, &req.member_ids)
            .await,
    )
}

pub async fn remove_members<S: Store + 'static>(
    State(state): State<AppState<S>>,
    Extension(identity): Extension<Identity>,
    Path(id): Path<String>,
    Json(req): Json<MemberIdsRequest>,
) -> HandlerResult<Project> {
    let id: ProjectId = parse_id(&id)?;
    respond(
        state
            .service
            .remove_members(&identity, &id, &req.member_ids)
            .await,
    )
}

pub async fn project_stats<S: Store + 'static>(
    State(state): State<AppState<S>>,
    Extension(identity): Extension<Identity>,
    Path(id): Path<String>,
) -> HandlerResult<ProjectStats> {
    let id: ProjectId = parse_id(&id)?;
    respond(state.service.project_stats(&identity, &id).await)
}

// Tasks

pub async fn create_task<S: Store + 'static>(
    State(state): State<AppState<S>>,
    Extension(identity): Extension<Identity>,
    Json(req): Json<CreateTaskRequest>,
) -> Result<(StatusCode, Json<Task>), HandlerError> {
    created(state.service.create_task(&identity, req.into()).await)
}

pub async fn list_tasks<S: Store + 'static>(
    State(state): State<AppState<S>>,
    Extension(identity): Extension<Identity>,
    Query(query): Query<TaskListQuery>,
) -> HandlerResult<Vec<Task>> {
    let project_id = query.project_id.as_deref().map(parse_id).transpose()?;
    let status = query
        .status
        .as_deref()
        .map(TaskStatus::from_str)
        .transpose()
        .map_err(|e| api_error_to_response(ApiError::Invalid(e.to_string())))?;

    respond(
        state
            .service
            .list_tasks(&identity, TaskFilter { project_id, status })
            .await,
    )
}

pub async fn get_task<S: Store + 'static>(
    State(state): State<AppState<S>>,
    Extension(identity): Extension<Identity>,
    Path(id): Path<String>,
) -> HandlerResult<Task> {
    let id: TaskId = parse_id(&id)?;
    respond(state.service.get_task(&identity, &id).await)
}

pub async fn update_task<S: Store + 'static>(
    State(state): State<AppState<S>>,
    Extension(identity): Extension<Identity>,
    Path(id): Path<String>,
    Json(req): Json<UpdateTaskRequest>,
) -> HandlerResult<Task> {
    let id: TaskId = parse_id(&id)?;
    respond(state.service.update_task(&identity, &id, req.into()).await)
}

pub async fn delete_task<S: Store + 'static>(
    State(state): State<AppState<S>>,
    Extension(identity): Extension<Identity>,
    Path(id): Path<String>,
) -> Result<StatusCode, HandlerError> {
    let id: TaskId = parse_id(&id)?;
    no_content(state.service.delete_task(&identity, &id).await)
}

pub async fn assign_task<S: Store + 'static>(
    State(state): State<AppState<S>>,
    Extension(identity): Extension<Identity>,
    Path(id): Path<String>,
    Json(req): Json<AssignRequest>,
) -> HandlerResult<Task> {
    let id: TaskId = parse_id(&id)?;
    respond(
        state
            .service
            .assign_task(&identity, &id, &req.assignee_id)
            .await,
    )
}

pub async fn unassign_task<S: Store + 'static>(
    State(state): State<AppState<S>>,
    Extension(identity): Extension<Identity>,
    Path(id): Path<String>,
) -> HandlerResult<Task> {
    let id: TaskId = parse_id(&id)?;
    respond(state.service.unassign_task(&identity, &id).await)
}

// Comments

pub async fn create_comment<S: Store + 'static>(
    State(state): State<AppState<S>>,
    Extension(identity): Extension<Identity>,
    Path(task_id): Path<String>,
    Json(req): Json<CommentRequest>,
) -> Result<(StatusCode, Json<Comment>), HandlerError> {
    let task_id: TaskId = parse_id(&task_id)?;
    created(
        state
            .service
            .create_comment(&identity, &task_id, req.content)
            .await,
    )
}

pub async fn list_comments<S: Store + 'static>(
    State(state): State<AppState<S>>,
    Extension(identity): Extension<Identity>,
    Path(task_id): Path<String>,
) -> HandlerResult<Vec<Comment>> {
    let task_id: TaskId = parse_id(&task_id)?;
    respond(state.service.list_comments(&identity, &task_id).await)
}

pub async fn get_comment<S: Store + 'static>(
    State(state): State<AppState<S>>,
    Extension(identity): Extension<Identity>,
    Path(id): Path<String>,
) -> HandlerResult<Comment> {
    let id: CommentId = parse_id(&id)?;
    respond(state.service.get_comment(&identity, &id).await)
}

pub async fn update_comment<S: Store + 'static>(
    State(state): State<AppState<S>>,
    Extension(identity): Extension<Identity>,
    Path(id): Path<String>,
    Json(req): Json<CommentRequest>,
) -> HandlerResult<Comment> {
    let id: CommentId = parse_id(&id)?;
    respond(
        state
            .service
            .update_comment(&identity, &id, req.content)
            .await,
    )
}

pub async fn delete_comment<S: Store + 'static>(
    State(state): State<AppState<S>>,
    Extension(identity): Extension<Identity>,
    Path(id): Path<String>,
) -> Result<StatusCode, HandlerError> {
    let id: CommentId = parse_id(&id)?;
    no_content(state.service.delete_comment(&identity, &id).await)
}

// Users

pub async fn create_user<S: Store + 'static>(
    State(state): State<AppState<S>>,
    Extension(identity): Extension<Identity>,
    Json(req): Json<CreateUserRequest>,
) -> Result<(StatusCode, Json<User>), HandlerError> {
    created(state.service.create_user(&identity, req.into()).await)
}

pub async fn current_user<S: Store + 'static>(
    State(state): State<AppState<S>>,
    Extension(identity): Extension<Identity>,
) -> HandlerResult<User> {
    respond(state.service.current_user(&identity).await)
}

pub async fn get_user<S: Store + 'static>(
    State(state): State<AppState<S>>,
    Extension(identity): Extension<Identity>,
    Path(id): Path<String>,
) -> HandlerResult<User> {
    let id: UserId = parse_id(&id)?;
    respond(state.service.get_user(&identity, &id).await)
}

pub async fn update_user<S: Store + 'static>(
    State(state): State<AppState<S>>,
    Extension(identity): Extension<Identity>,
    Path(id): Path<String>,
    Json(req): Json<UpdateUserRequest>,
) -> HandlerResult<User> {
    let id: UserId = parse_id(&id)?;
    respond(state.service.update_user(&identity, &id, req.into()).await)
}

pub async fn delete_user<S: Store + 'static>(
    State(state): State<AppState<S>>,
    Extension(identity): Extension<Identity>,
    Path(id): Path<String>,
) -> Result<StatusCode, HandlerError> {
    let id: UserId = parse_id(&id)?;
    no_content(state.service.delete_user(&identity, &id).await)
}

pub async fn promote_user<S: Store + 'static>(
    State(state): State<AppState<S>>,
    Extension(identity): Extension<Identity>,
    Path(id): Path<String>,
) -> HandlerResult<User> {
    let id: UserId = parse_id(&id)?;
    respond(state.service.promote_user(&identity, &id).await)
}

pub async fn user_projects<S: Store + 'static>(
    State(state): State<AppState<S>>,
    Extension(identity): Extension<Identity>,
    Path(id): Path<String>,
) -> HandlerResult<Vec<Project>> {
    let id: UserId = parse_id(&id)?;
    respond(state.service.user_projects(&identity, &id).await)
}

pub async fn user_tasks<S: Store + 'static>(
    State(state): State<AppState<S>>,
    Extension(identity): Extension<Identity>,
    Path(id): Path<String>,
) -> HandlerResult<Vec<Task>> {
    let id: UserId = parse_id(&id)?;
    respond(state.service.user_tasks(&identity, &id).await)
}

pub async fn user_comments<S: Store + 'static>(
    State(state): State<AppState<S>>,
    Extension(identity): Extension<Identity>,
    Path(id): Path<String>,
) -> HandlerResult<Vec<Comment>> {
    let id: UserId = parse_id(&id)?;
    respond(state.service.user_comments(&identity, &id).await)
}

pub async fn user_stats<S: Store + 'static>(
    State(state): State<AppState<S>>,
    Extension(identity): Extension<Identity>,
    Path(id): Path<String>,
) -> HandlerResult<UserStats> {
    let id: UserId = parse_id(&id)?;
    respond(state.service.user_stats(&identity, &id).await)
}
