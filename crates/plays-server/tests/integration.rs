use std::sync::Arc;

use axum::http::StatusCode;
use http_body_util::BodyExt;
use plays_core::config::Config;
use plays_engine::Engine;
use serde_json::json;
use tempfile::TempDir;
use tower::ServiceExt;

const FAKE_TOOL: &str = concat!(
    env!("CARGO_MANIFEST_DIR"),
    "/../plays-engine/testdata/fake-ansible-playbook.sh"
);

const GOOD: &str = "- hosts: all\n  tasks:\n    - ping:\n";
const BAD: &str = "- hosts: all\n  tasks: SYNTAX_ERROR\n";
const FAILING: &str = "- hosts: all\n  tasks:\n    - fail: {}\n# FAIL\n";

// ---------------------------------------------------------------------------
// Helpers
// ---------------------------------------------------------------------------

/// A plays root whose execution tool is the shell stand-in.
fn init_root(dir: &TempDir) {
    let mut config = Config::default();
    config.tool.program = "sh".into();
    config.tool.args = vec![FAKE_TOOL.into()];
    config.save(dir.path()).unwrap();
}

fn app(dir: &TempDir) -> axum::Router {
    init_root(dir);
    let engine = Engine::open(dir.path()).unwrap();
    plays_server::build_router(Arc::new(engine))
}

async fn send(
    app: axum::Router,
    method: &str,
    uri: &str,
    body: Option<serde_json::Value>,
) -> (StatusCode, serde_json::Value) {
    let builder = axum::http::Request::builder().method(method).uri(uri);
    let req = match body {
        Some(body) => builder
            .header("content-type", "application/json")
            .body(axum::body::Body::from(serde_json::to_vec(&body).unwrap()))
            .unwrap(),
        None => builder.body(axum::body::Body::empty()).unwrap(),
    };
    let response = app.oneshot(req).await.unwrap();
    let status = response.status();
    let body = response.into_body().collect().await.unwrap().to_bytes();
    let json: serde_json::Value = serde_json::from_slice(&body).unwrap_or(serde_json::Value::Null);
    (status, json)
}

async fn get(app: axum::Router, uri: &str) -> (StatusCode, serde_json::Value) {
    send(app, "GET", uri, None).await
}

async fn post_json(
    app: axum::Router,
    uri: &str,
    body: serde_json::Value,
) -> (StatusCode, serde_json::Value) {
    send(app, "POST", uri, Some(body)).await
}

async fn patch_json(
    app: axum::Router,
    uri: &str,
    body: serde_json::Value,
) -> (StatusCode, serde_json::Value) {
    send(app, "PATCH", uri, Some(body)).await
}

async fn delete(app: axum::Router, uri: &str) -> StatusCode {
    send(app, "DELETE", uri, None).await.0
}

async fn create_playbook(app: &axum::Router, name: &str, content: &str) -> u64 {
    let (status, body) = post_json(
        app.clone(),
        "/api/playbooks",
        json!({ "name": name, "description": "test", "content": content, "created_by": 1 }),
    )
    .await;
    assert_eq!(status, StatusCode::CREATED, "{body}");
    body["id"].as_u64().unwrap()
}

// ---------------------------------------------------------------------------
// Playbooks
// ---------------------------------------------------------------------------

#[tokio::test]
async fn playbook_lifecycle() {
    let dir = TempDir::new().unwrap();
    let app = app(&dir);

    let id = create_playbook(&app, "web", GOOD).await;
    let stored = dir.path().join(format!("playbooks/playbook_{id}.yml"));
    assert_eq!(std::fs::read_to_string(&stored).unwrap(), GOOD);

    let (status, list) = get(app.clone(), "/api/playbooks").await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(list.as_array().unwrap().len(), 1);

    let (status, body) = get(app.clone(), &format!("/api/playbooks/{id}")).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["name"], "web");
    assert_eq!(body["content"], GOOD);

    let newer = "- hosts: web\n  tasks: []\n";
    let (status, body) = patch_json(
        app.clone(),
        &format!("/api/playbooks/{id}"),
        json!({ "name": "web-2", "content": newer }),
    )
    .await;
    assert_eq!(status, StatusCode::OK, "{body}");
    assert_eq!(body["name"], "web-2");
    assert_eq!(std::fs::read_to_string(&stored).unwrap(), newer);

    assert_eq!(delete(app.clone(), &format!("/api/playbooks/{id}")).await, StatusCode::NO_CONTENT);
    assert!(!stored.exists());
    let (status, _) = get(app.clone(), &format!("/api/playbooks/{id}")).await;
    assert_eq!(status, StatusCode::NOT_FOUND);
    assert_eq!(delete(app, &format!("/api/playbooks/{id}")).await, StatusCode::NOT_FOUND);
}

#[tokio::test]
async fn invalid_playbook_is_rejected_with_400() {
    let dir = TempDir::new().unwrap();
    let app = app(&dir);

    let (status, body) = post_json(
        app.clone(),
        "/api/playbooks",
        json!({ "name": "broken", "content": BAD }),
    )
    .await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert!(body["error"].as_str().unwrap().contains("invalid playbook syntax"));

    let (_, list) = get(app, "/api/playbooks").await;
    assert!(list.as_array().unwrap().is_empty());
}

#[tokio::test]
async fn invalid_update_keeps_previous_content() {
    let dir = TempDir::new().unwrap();
    let app = app(&dir);
    let id = create_playbook(&app, "web", GOOD).await;

    let (status, _) = patch_json(
        app.clone(),
        &format!("/api/playbooks/{id}"),
        json!({ "name": "web", "content": BAD }),
    )
    .await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    let (_, body) = get(app.clone(), &format!("/api/playbooks/{id}")).await;
    assert_eq!(body["content"], GOOD);

    let (status, _) = patch_json(
        app,
        "/api/playbooks/999",
        json!({ "name": "x", "content": GOOD }),
    )
    .await;
    assert_eq!(status, StatusCode::NOT_FOUND);
}

#[tokio::test]
async fn validate_endpoint_reports_without_storing() {
    let dir = TempDir::new().unwrap();
    let app = app(&dir);

    let (status, body) = post_json(app.clone(), "/api/playbooks/validate", json!({ "content": GOOD })).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["valid"], true);

    let (status, body) = post_json(app.clone(), "/api/playbooks/validate", json!({ "content": BAD })).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["valid"], false);
    assert!(body["stderr"].as_str().unwrap().contains("Syntax Error"));

    let (status, _) = post_json(app.clone(), "/api/playbooks/validate", json!({ "content": "  " })).await;
    assert_eq!(status, StatusCode::BAD_REQUEST);

    let (_, list) = get(app, "/api/playbooks").await;
    assert!(list.as_array().unwrap().is_empty());
}

#[tokio::test]
async fn non_numeric_id_is_bad_request() {
    let dir = TempDir::new().unwrap();
    let app = app(&dir);
    let (status, _) = get(app, "/api/playbooks/abc").await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
}

// ---------------------------------------------------------------------------
// Jobs
// ---------------------------------------------------------------------------

#[tokio::test]
async fn job_created_running_comes_back_done() {
    let dir = TempDir::new().unwrap();
    let app = app(&dir);
    let pb = create_playbook(&app, "web", GOOD).await;

    let (status, job) = post_json(
        app.clone(),
        "/api/jobs",
        json!({ "playbook_id": pb, "assigned_to": 2, "status": "running" }),
    )
    .await;
    assert_eq!(status, StatusCode::CREATED, "{job}");
    assert_eq!(job["status"], "done");
    assert_eq!(job["last_run"]["success"], true);
    assert!(job["last_run"]["output"].as_str().unwrap().contains("PLAY RECAP"));

    let (_, stored) = get(app, &format!("/api/jobs/{}", job["id"])).await;
    assert_eq!(stored["status"], "done");
}

#[tokio::test]
async fn failing_playbook_marks_job_failed() {
    let dir = TempDir::new().unwrap();
    let app = app(&dir);
    let pb = create_playbook(&app, "fails", FAILING).await;

    let (status, job) = post_json(
        app,
        "/api/jobs",
        json!({ "playbook_id": pb, "status": "running" }),
    )
    .await;
    assert_eq!(status, StatusCode::CREATED);
    assert_eq!(job["status"], "failed");
    assert!(job["last_run"]["error"].as_str().unwrap().contains("deliberate failure"));
}

#[tokio::test]
async fn status_updates_follow_the_state_machine() {
    let dir = TempDir::new().unwrap();
    let app = app(&dir);
    let pb = create_playbook(&app, "web", GOOD).await;

    let (status, job) = post_json(app.clone(), "/api/jobs", json!({ "playbook_id": pb })).await;
    assert_eq!(status, StatusCode::CREATED);
    assert_eq!(job["status"], "planned");
    let uri = format!("/api/jobs/{}/status", job["id"]);

    let (status, _) = patch_json(app.clone(), &uri, json!({ "status": "paused" })).await;
    assert_eq!(status, StatusCode::BAD_REQUEST);

    let (status, _) = patch_json(app.clone(), &uri, json!({ "status": "done" })).await;
    assert_eq!(status, StatusCode::UNPROCESSABLE_ENTITY);

    let (status, job) = patch_json(app.clone(), &uri, json!({ "status": "running" })).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(job["status"], "done");
    let history: Vec<&str> = job["status_history"]
        .as_array()
        .unwrap()
        .iter()
        .map(|t| t["status"].as_str().unwrap())
        .collect();
    assert_eq!(history, vec!["planned", "running", "done"]);

    let (status, job) = patch_json(app.clone(), &uri, json!({ "status": "archived" })).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(job["status"], "archived");

    let (status, body) = patch_json(app, &uri, json!({ "status": "running" })).await;
    assert_eq!(status, StatusCode::UNPROCESSABLE_ENTITY);
    assert!(body["error"].as_str().unwrap().contains("archived"));
}

#[tokio::test]
async fn planned_job_edits() {
    let dir = TempDir::new().unwrap();
    let app = app(&dir);
    let pb = create_playbook(&app, "web", GOOD).await;
    let (_, job) = post_json(app.clone(), "/api/jobs", json!({ "playbook_id": pb })).await;
    let id = job["id"].as_u64().unwrap();

    let (status, job) = patch_json(
        app.clone(),
        &format!("/api/jobs/{id}/assign"),
        json!({ "assignedTo": 7 }),
    )
    .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(job["assigned_to"], 7);

    let (status, job) = patch_json(
        app.clone(),
        &format!("/api/jobs/{id}/start-time"),
        json!({ "start_time": "2030-01-02T03:04:05Z" }),
    )
    .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(job["start_time"], "2030-01-02T03:04:05Z");

    patch_json(
        app.clone(),
        &format!("/api/jobs/{id}/status"),
        json!({ "status": "archived" }),
    )
    .await;
    let (status, _) = patch_json(
        app,
        &format!("/api/jobs/{id}/assign"),
        json!({ "assigned_to": 8 }),
    )
    .await;
    assert_eq!(status, StatusCode::CONFLICT);
}

#[tokio::test]
async fn job_requires_existing_playbook() {
    let dir = TempDir::new().unwrap();
    let app = app(&dir);
    let (status, body) = post_json(app, "/api/jobs", json!({ "playbook_id": 42 })).await;
    assert_eq!(status, StatusCode::NOT_FOUND);
    assert!(body["error"].as_str().unwrap().contains("42"));
}

#[tokio::test]
async fn deleted_playbook_fails_its_job() {
    let dir = TempDir::new().unwrap();
    let app = app(&dir);
    let pb = create_playbook(&app, "web", GOOD).await;
    let (_, job) = post_json(app.clone(), "/api/jobs", json!({ "playbook_id": pb })).await;
    delete(app.clone(), &format!("/api/playbooks/{pb}")).await;

    let (status, job) = patch_json(
        app,
        &format!("/api/jobs/{}/status", job["id"]),
        json!({ "status": "running" }),
    )
    .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(job["status"], "failed");
    assert!(job["last_run"]["error"]
        .as_str()
        .unwrap()
        .contains("playbook file not found"));
}

#[tokio::test]
async fn delete_job() {
    let dir = TempDir::new().unwrap();
    let app = app(&dir);
    let pb = create_playbook(&app, "web", GOOD).await;
    let (_, job) = post_json(app.clone(), "/api/jobs", json!({ "playbook_id": pb })).await;
    let uri = format!("/api/jobs/{}", job["id"]);

    assert_eq!(delete(app.clone(), &uri).await, StatusCode::NO_CONTENT);
    let (status, _) = get(app.clone(), &uri).await;
    assert_eq!(status, StatusCode::NOT_FOUND);
    assert_eq!(delete(app, &uri).await, StatusCode::NOT_FOUND);
}

#[tokio::test]
async fn records_persist_across_restarts() {
    let dir = TempDir::new().unwrap();
    let pb = create_playbook(&app(&dir), "web", GOOD).await;

    let (status, body) = get(app(&dir), &format!("/api/playbooks/{pb}")).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["name"], "web");
}

// ---------------------------------------------------------------------------
// Server lifecycle
// ---------------------------------------------------------------------------

#[tokio::test]
async fn serve_on_stops_when_cancelled() {
    let dir = TempDir::new().unwrap();
    init_root(&dir);
    let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
    let shutdown = tokio_util::sync::CancellationToken::new();

    let root = dir.path().to_path_buf();
    let token = shutdown.clone();
    let server = tokio::spawn(async move { plays_server::serve_on(&root, listener, token).await });

    shutdown.cancel();
    let result = tokio::time::timeout(std::time::Duration::from_secs(10), server)
        .await
        .expect("server did not stop")
        .unwrap();
    assert!(result.is_ok(), "{result:?}");
}
