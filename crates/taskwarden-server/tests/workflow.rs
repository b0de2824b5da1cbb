use std::sync::Arc;

use axum::http::{HeaderName, HeaderValue, StatusCode};
use axum_test::TestServer;
use serde_json::{Value, json};

use taskwarden_core::identity::Role;
use taskwarden_core::model::NewUser;
use taskwarden_server::metrics::Metrics;
use taskwarden_server::middleware::{AuthState, DEV_USER_HEADER};
use taskwarden_server::rest::{self, AppState};
use taskwarden_server::service::WorkspaceService;
use taskwarden_storage::{InMemoryStore, UserStore};

struct Workspace {
    server: TestServer,
    store: Arc<InMemoryStore>,
}

impl Workspace {
    fn new() -> Self {
        let store = Arc::new(InMemoryStore::new());
        let metrics = Arc::new(Metrics::new());
        let state = AppState {
            service: Arc::new(WorkspaceService::with_metrics(
                Arc::clone(&store),
                Arc::clone(&metrics),
            )),
            metrics,
        };
        let app = rest::create_router(state, AuthState::dev_mode(Arc::clone(&store)));
        Self {
            server: TestServer::new(app).unwrap(),
            store,
        }
    }

    async fn user(&self, email: &str, role: Role) -> String {
        self.store
            .create_user(&NewUser {
                email: email.to_string(),
                first_name: None,
                last_name: None,
                role,
            })
            .await
            .unwrap()
            .id
            .to_string()
    }
}

fn user_header() -> HeaderName {
    HeaderName::from_static(DEV_USER_HEADER)
}

fn header_value(value: &str) -> HeaderValue {
    HeaderValue::from_str(value).unwrap()
}

fn id_of(body: &Value) -> String {
    body["id"].as_str().unwrap().to_string()
}

#[tokio::test]
async fn member_assignee_and_outsider_see_different_worlds() {
    let ws = Workspace::new();
    let admin = ws.user("admin@example.com", Role::Admin).await;
    let u1 = ws.user("u1@example.com", Role::Member).await;
    let u2 = ws.user("u2@example.com", Role::Member).await;
    let u3 = ws.user("u3@example.com", Role::Member).await;

    let project: Value = ws
        .server
        .post("/v1/projects")
        .add_header(user_header(), header_value(&admin))
        .json(&json!({"name": "apollo", "member_ids": [u1, u2]}))
        .await
        .json();
    let project_id = id_of(&project);

    let task = ws
        .server
        .post("/v1/tasks")
        .add_header(user_header(), header_value(&u1))
        .json(&json!({"project_id": project_id, "title": "launch", "assignee_id": u2}))
        .await;
    task.assert_status(StatusCode::CREATED);
    let task_id = id_of(&task.json());

    ws.server
        .delete(&format!("/v1/projects/{project_id}/members"))
        .add_header(user_header(), header_value(&admin))
        .json(&json!({"member_ids": [u2]}))
        .await
        .assert_status_ok();

    // U2 was removed but still holds the task.
    let updated = ws
        .server
        .patch(&format!("/v1/tasks/{task_id}"))
        .add_header(user_header(), header_value(&u2))
        .json(&json!({"status": "done"}))
        .await;
    updated.assert_status_ok();
    assert_eq!(updated.json::<Value>()["status"], "done");

    let read = ws
        .server
        .get(&format!("/v1/tasks/{task_id}"))
        .add_header(user_header(), header_value(&u2))
        .await;
    read.assert_status(StatusCode::FORBIDDEN);
    assert_eq!(read.json::<Value>()["code"], "not_project_member");

    let mine: Value = ws
        .server
        .get(&format!("/v1/users/{u2}/tasks"))
        .add_header(user_header(), header_value(&u2))
        .await
        .json();
    assert_eq!(mine.as_array().unwrap().len(), 1);

    // U1 comments; U3 cannot see anything.
    ws.server
        .post(&format!("/v1/tasks/{task_id}/comments"))
        .add_header(user_header(), header_value(&u1))
        .json(&json!({"content": "liftoff"}))
        .await
        .assert_status(StatusCode::CREATED);

    ws.server
        .get(&format!("/v1/projects/{project_id}"))
        .add_header(user_header(), header_value(&u3))
        .await
        .assert_status(StatusCode::FORBIDDEN);
    ws.server
        .get(&format!("/v1/tasks/{task_id}/comments"))
        .add_header(user_header(), header_value(&u3))
        .await
        .assert_status(StatusCode::FORBIDDEN);
    let listed: Value = ws
        .server
        .get("/v1/projects")
        .add_header(user_header(), header_value(&u3))
        .await
        .json();
    assert!(listed.as_array().unwrap().is_empty());

    // Reassigning to U3 fails even for the admin.
    let reassign = ws
        .server
        .post(&format!("/v1/tasks/{task_id}/assign"))
        .add_header(user_header(), header_value(&admin))
        .json(&json!({"assignee_id": u3}))
        .await;
    reassign.assert_status(StatusCode::FORBIDDEN);
    assert_eq!(reassign.json::<Value>()["code"], "assignee_not_member");

    // Promotion takes effect on U3's next request.
    ws.server
        .post(&format!("/v1/users/{u3}/promote"))
        .add_header(user_header(), header_value(&admin))
        .await
        .assert_status_ok();
    ws.server
        .get(&format!("/v1/projects/{project_id}"))
        .add_header(user_header(), header_value(&u3))
        .await
        .assert_status_ok();
}

#[tokio::test]
async fn project_stats_and_members() {
    let ws = Workspace::new();
    let admin = ws.user("admin@example.com", Role::Admin).await;
    let u1 = ws.user("u1@example.com", Role::Member).await;

    let project: Value = ws
        .server
        .post("/v1/projects")
        .add_header(user_header(), header_value(&admin))
        .json(&json!({"name": "apollo", "member_ids": [u1]}))
        .await
        .json();
    let project_id = id_of(&project);

    for title in ["one", "two", "three"] {
        ws.server
            .post("/v1/tasks")
            .add_header(user_header(), header_value(&u1))
            .json(&json!({"project_id": project_id, "title": title}))
            .await
            .assert_status(StatusCode::CREATED);
    }

    let stats: Value = ws
        .server
        .get(&format!("/v1/projects/{project_id}/stats"))
        .add_header(user_header(), header_value(&u1))
        .await
        .json();
    assert_eq!(stats["member_count"], 1);
    assert_eq!(stats["task_count"], 3);
    assert_eq!(stats["todo"], 3);

    let todo: Value = ws
        .server
        .get("/v1/tasks")
        .add_query_param("project_id", &project_id)
        .add_query_param("status", "todo")
        .add_header(user_header(), header_value(&u1))
        .await
        .json();
    assert_eq!(todo.as_array().unwrap().len(), 3);

    let members: Value = ws
        .server
        .get(&format!("/v1/projects/{project_id}/members"))
        .add_header(user_header(), header_value(&u1))
        .await
        .json();
    assert_eq!(members[0]["email"], "u1@example.com");
}

#[tokio::test]
async fn comment_lifecycle_respects_authorship() {
    let ws = Workspace::new();
    let admin = ws.user("admin@example.com", Role::Admin).await;
    let u1 = ws.user("u1@example.com", Role::Member).await;
    let u2 = ws.user("u2@example.com", Role::Member).await;

    let project: Value = ws
        .server
        .post("/v1/projects")
        .add_header(user_header(), header_value(&admin))
        .json(&json!({"name": "apollo", "member_ids": [u1, u2]}))
        .await
        .json();
    let task: Value = ws
        .server
        .post("/v1/tasks")
        .add_header(user_header(), header_value(&u1))
        .json(&json!({"project_id": id_of(&project), "title": "launch"}))
        .await
        .json();
    let comment: Value = ws
        .server
        .post(&format!("/v1/tasks/{}/comments", id_of(&task)))
        .add_header(user_header(), header_value(&u1))
        .json(&json!({"content": "first"}))
        .await
        .json();
    let comment_id = id_of(&comment);

    ws.server
        .get(&format!("/v1/comments/{comment_id}"))
        .add_header(user_header(), header_value(&u2))
        .await
        .assert_status_ok();
    ws.server
        .patch(&format!("/v1/comments/{comment_id}"))
        .add_header(user_header(), header_value(&u2))
        .json(&json!({"content": "hijacked"}))
        .await
        .assert_status(StatusCode::FORBIDDEN);
    ws.server
        .delete(&format!("/v1/comments/{comment_id}"))
        .add_header(user_header(), header_value(&u1))
        .await
        .assert_status(StatusCode::NO_CONTENT);
    ws.server
        .get(&format!("/v1/comments/{comment_id}"))
        .add_header(user_header(), header_value(&u1))
        .await
        .assert_status(StatusCode::NOT_FOUND);
}

#[tokio::test]
async fn users_manage_only_their_own_record() {
    let ws = Workspace::new();
    let u1 = ws.user("u1@example.com", Role::Member).await;
    let u2 = ws.user("u2@example.com", Role::Member).await;

    let patched = ws
        .server
        .patch(&format!("/v1/users/{u1}"))
        .add_header(user_header(), header_value(&u1))
        .json(&json!({"first_name": "Ada"}))
        .await;
    patched.assert_status_ok();
    assert_eq!(patched.json::<Value>()["first_name"], "Ada");

    ws.server
        .patch(&format!("/v1/users/{u2}"))
        .add_header(user_header(), header_value(&u1))
        .json(&json!({"first_name": "Mallory"}))
        .await
        .assert_status(StatusCode::FORBIDDEN);

    ws.server
        .patch(&format!("/v1/users/{u1}"))
        .add_header(user_header(), header_value(&u1))
        .json(&json!({"email": "u2@example.com"}))
        .await
        .assert_status(StatusCode::CONFLICT);

    ws.server
        .delete(&format!("/v1/users/{u2}"))
        .add_header(user_header(), header_value(&u1))
        .await
        .assert_status(StatusCode::FORBIDDEN);
}

#[tokio::test]
async fn fresh_server_reaches_first_users_through_bootstrap_admin() {
    let store = Arc::new(InMemoryStore::new());
    let metrics = Arc::new(Metrics::new());
    let service = Arc::new(WorkspaceService::with_metrics(
        Arc::clone(&store),
        Arc::clone(&metrics),
    ));
    let admin = service.bootstrap_admin("root@example.com").await.unwrap();
    let app = rest::create_router(
        AppState {
            service,
            metrics,
        },
        AuthState::dev_mode(Arc::clone(&store)),
    );
    let server = TestServer::new(app).unwrap();
    let admin = admin.id.to_string();

    let me: Value = server
        .get("/v1/users/me")
        .add_header(user_header(), header_value(&admin))
        .await
        .json();
    assert_eq!(me["role"], "admin");

    let response = server
        .post("/v1/users")
        .add_header(user_header(), header_value(&admin))
        .json(&json!({"email": "first@example.com"}))
        .await;
    response.assert_status(StatusCode::CREATED);
    let member = id_of(&response.json());

    let response = server
        .get("/v1/users/me")
        .add_header(user_header(), header_value(&member))
        .await;
    response.assert_status_ok();
    let body: Value = response.json();
    assert_eq!(body["email"], "first@example.com");
    assert_eq!(body["role"], "member");

    let response = server
        .post("/v1/users")
        .add_header(user_header(), header_value(&member))
        .json(&json!({"email": "second@example.com"}))
        .await;
    response.assert_status(StatusCode::FORBIDDEN);
}
