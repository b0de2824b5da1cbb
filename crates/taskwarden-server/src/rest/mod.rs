mod handlers;
mod types;

use std::sync::Arc;

use axum::Router;
use axum::extract::{DefaultBodyLimit, State};
use axum::middleware;
use axum::response::Response;
use axum::routing::{get, post};
use taskwarden_storage::Store;

const MAX_REQUEST_BODY_SIZE: usize = 1024 * 1024; // 1 MB

use crate::metrics::{Metrics, metrics_handler};
use crate::middleware::{AuthState, rest_auth_middleware};
use crate::service::WorkspaceService;

pub use types::ErrorResponse;

pub struct AppState<S: Store> {
    pub service: Arc<WorkspaceService<S>>,
    pub metrics: Arc<Metrics>,
}

impl<S: Store> Clone for AppState<S> {
    fn clone(&self) -> Self {
        Self {
            service: self.service.clone(),
            metrics: self.metrics.clone(),
        }
    }
}

async fn metrics_middleware<S: Store + 'static>(
    State(state): State<AppState<S>>,
    request: axum::http::Request<axum::body::Body>,
    next: middleware::Next,
) -> Response {
    state.metrics.record_request();

    let response = next.run(request).await;

    if response.status().is_success() {
        state.metrics.record_success();
    } else {
        state.metrics.record_error();
    }

    response
}

pub fn create_router<S: Store + 'static>(state: AppState<S>, auth: AuthState<S>) -> Router {
    let api = Router::new()
        .route(
            "/v1/projects",
            post(handlers::create_project).get(handlers::list_projects),
        )
        .route(
            "/v1/projects/{id}",
            get(handlers::get_project)
                .patch(handlers::update_project)
                .delete(handlers::delete_project),
        )
        .route(
            "/v1/projects/{id}/members",
            get(handlers::list_members)
                .post(handlers::add_members)
                .delete(handlers::remove_members),
        )
        .route("/v1/projects/{id}/stats", get(handlers::project_stats))
        .route(
            "/v1/tasks",
            post(handlers::create_task).get(handlers::list_tasks),
        )
        .route(
            "/v1/tasks/{id}",
            get(handlers::get_task)
                .patch(handlers::update_task)
                .delete(handlers::delete_task),
        )
        .route(
            "/v1/tasks/{id}/assign",
            post(handlers::assign_task).delete(handlers::unassign_task),
        )
        .route(
            "/v1/tasks/{id}/comments",
            post(handlers::create_comment).get(handlers::list_comments),
        )
        .route(
            "/v1/comments/{id}",
            get(handlers::get_comment)
                .patch(handlers::update_comment)
                .delete(handlers::delete_comment),
        )
        .route("/v1/users", post(handlers::create_user))
        .route("/v1/users/me", get(handlers::current_user))
        .route(
            "/v1/users/{id}",
            get(handlers::get_user)
                .patch(handlers::update_user)
                .delete(handlers::delete_user),
        )
        .route("/v1/users/{id}/promote", post(handlers::promote_user))
        .route("/v1/users/{id}/projects", get(handlers::user_projects))
        .route("/v1/users/{id}/tasks", get(handlers::user_tasks))
        .route("/v1/users/{id}/comments", get(handlers::user_comments))
        .route("/v1/users/{id}/stats", get(handlers::user_stats))
        .route("/healthz", get(handlers::healthz))
        .layer(DefaultBodyLimit::max(MAX_REQUEST_BODY_SIZE))
        .layer(middleware::from_fn_with_state(
            auth,
            rest_auth_middleware::<S>,
        ))
        .layer(middleware::from_fn_with_state(
            state.clone(),
            metrics_middleware::<S>,
        ))
        .with_state(state.clone());

    let metrics = Router::new()
        .route("/metrics", get(metrics_handler))
        .with_state(state.metrics);

    api.merge(metrics)
}
