mod common;

use std::sync::Arc;

use axum::{
    body::{to_bytes, Body},
    http::{Request, StatusCode},
    Router,
};
use serde_json::{json, Value};
use tower::ServiceExt;

use reviewer_app::api;

fn app() -> Router {
    api::router(Arc::new(common::memory_service(11)))
}

async fn send(app: &Router, method: &str, uri: &str, body: Option<Value>) -> (StatusCode, Value) {
    let mut builder = Request::builder().method(method).uri(uri);
    let body = match body {
        Some(value) => {
            builder = builder.header("content-type", "application/json");
            Body::from(value.to_string())
        }
        None => Body::empty(),
    };

    let response = app
        .clone()
        .oneshot(builder.body(body).unwrap())
        .await
        .unwrap();
    let status = response.status();
    let bytes = to_bytes(response.into_body(), usize::MAX).await.unwrap();
    let value = if bytes.is_empty() {
        Value::Null
    } else {
        serde_json::from_slice(&bytes).unwrap()
    };
    (status, value)
}

async fn add_team(app: &Router, members: &[&str]) -> (StatusCode, Value) {
    let members: Vec<Value> = members
        .iter()
        .map(|id| json!({ "user_id": id, "username": format!("user-{}", id), "is_active": true }))
        .collect();
    send(
        app,
        "POST",
        "/team/add",
        Some(json!({ "team_name": common::TEAM, "members": members })),
    )
    .await
}

async fn create_pr(app: &Router, id: &str) -> (StatusCode, Value) {
    send(
        app,
        "POST",
        "/pullRequest/create",
        Some(json!({
            "pull_request_id": id,
            "pull_request_name": "Add feature",
            "author_id": common::AUTHOR,
        })),
    )
    .await
}

fn error_code(body: &Value) -> &str {
    body["error"]["code"].as_str().unwrap_or_default()
}

#[tokio::test]
async fn health_reports_ok() {
    let (status, body) = send(&app(), "GET", "/healthz", None).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["status"], "OK");
}

#[tokio::test]
async fn team_add_and_get() {
    let app = app();
    let (status, body) = add_team(&app, &["A", "R1", "R2"]).await;
    assert_eq!(status, StatusCode::CREATED);
    assert_eq!(body["team"]["team_name"], common::TEAM);
    assert_eq!(body["team"]["members"].as_array().unwrap().len(), 3);

    let (status, body) = send(&app, "GET", "/team/get?team_name=backend", None).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["members"][0]["user_id"], "A");

    let (status, body) = add_team(&app, &["X"]).await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(error_code(&body), "TEAM_EXISTS");
}

#[tokio::test]
async fn team_add_with_taken_member_id_is_a_plain_conflict() {
    let app = app();
    add_team(&app, &["A", "R1"]).await;

    let (status, body) = send(
        &app,
        "POST",
        "/team/add",
        Some(json!({
            "team_name": "frontend",
            "members": [
                { "user_id": "F1", "username": "fresh", "is_active": true },
                { "user_id": "R1", "username": "taken", "is_active": true },
            ],
        })),
    )
    .await;
    assert_eq!(status, StatusCode::CONFLICT);
    assert_eq!(error_code(&body), "CONFLICT");

    let (status, _) = send(&app, "GET", "/team/get?team_name=frontend", None).await;
    assert_eq!(status, StatusCode::NOT_FOUND);
}

#[tokio::test]
async fn team_add_rejects_bad_payloads() {
    let app = app();

    let (status, body) = send(
        &app,
        "POST",
        "/team/add",
        Some(json!({
            "team_name": "dupes",
            "members": [
                { "user_id": "u1", "username": "one", "is_active": true },
                { "user_id": "u1", "username": "again", "is_active": true },
            ],
        })),
    )
    .await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(error_code(&body), "BAD_REQUEST");

    let (status, _) = send(&app, "POST", "/team/add", Some(json!({ "team_name": "" }))).await;
    assert_eq!(status, StatusCode::BAD_REQUEST);

    let (status, body) = send(&app, "POST", "/team/add", Some(json!("not an object"))).await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(error_code(&body), "BAD_REQUEST");
}

#[tokio::test]
async fn team_get_errors() {
    let app = app();

    let (status, _) = send(&app, "GET", "/team/get", None).await;
    assert_eq!(status, StatusCode::BAD_REQUEST);

    let (status, body) = send(&app, "GET", "/team/get?team_name=nowhere", None).await;
    assert_eq!(status, StatusCode::NOT_FOUND);
    assert_eq!(error_code(&body), "NOT_FOUND");
}

#[tokio::test]
async fn pull_request_lifecycle() {
    let app = app();
    add_team(&app, &["A", "R1", "R2", "R3"]).await;

    let (status, created) = create_pr(&app, "pr-1").await;
    assert_eq!(status, StatusCode::CREATED);
    assert_eq!(created["pr"]["status"], "OPEN");
    assert_eq!(created["pr"]["assigned_reviewers"].as_array().unwrap().len(), 2);
    assert!(created["pr"]["mergedAt"].is_null());

    let (status, body) = create_pr(&app, "pr-1").await;
    assert_eq!(status, StatusCode::CONFLICT);
    assert_eq!(error_code(&body), "PR_EXISTS");

    let old = created["pr"]["assigned_reviewers"][0].as_str().unwrap().to_string();
    let (status, body) = send(
        &app,
        "POST",
        "/pullRequest/reassign",
        Some(json!({ "pull_request_id": "pr-1", "old_reviewer_id": old })),
    )
    .await;
    assert_eq!(status, StatusCode::OK);
    let replaced_by = body["replaced_by"].as_str().unwrap().to_string();
    assert_ne!(replaced_by, old);
    assert!(body["pr"]["assigned_reviewers"]
        .as_array()
        .unwrap()
        .iter()
        .any(|id| id == replaced_by.as_str()));

    let merge = json!({ "pull_request_id": "pr-1" });
    let (status, first) = send(&app, "POST", "/pullRequest/merge", Some(merge.clone())).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(first["pr"]["status"], "MERGED");
    let (status, second) = send(&app, "POST", "/pullRequest/merge", Some(merge)).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(first["pr"]["mergedAt"], second["pr"]["mergedAt"]);

    let (status, body) = send(
        &app,
        "POST",
        "/pullRequest/reassign",
        Some(json!({ "pull_request_id": "pr-1", "old_reviewer_id": replaced_by })),
    )
    .await;
    assert_eq!(status, StatusCode::CONFLICT);
    assert_eq!(error_code(&body), "PR_MERGED");
}

#[tokio::test]
async fn reassign_errors_map_to_codes() {
    let app = app();
    add_team(&app, &["A", "R1", "R2"]).await;
    create_pr(&app, "pr-1").await;

    let (status, body) = send(
        &app,
        "POST",
        "/pullRequest/reassign",
        Some(json!({ "pull_request_id": "pr-1", "old_reviewer_id": "A" })),
    )
    .await;
    assert_eq!(status, StatusCode::CONFLICT);
    assert_eq!(error_code(&body), "NOT_ASSIGNED");

    let (status, body) = send(
        &app,
        "POST",
        "/pullRequest/reassign",
        Some(json!({ "pull_request_id": "pr-1", "old_reviewer_id": "R1" })),
    )
    .await;
    assert_eq!(status, StatusCode::CONFLICT);
    assert_eq!(error_code(&body), "NO_CANDIDATE");

    let (status, body) = send(
        &app,
        "POST",
        "/pullRequest/reassign",
        Some(json!({ "pull_request_id": "missing", "old_reviewer_id": "R1" })),
    )
    .await;
    assert_eq!(status, StatusCode::NOT_FOUND);
    assert_eq!(error_code(&body), "NOT_FOUND");
}

#[tokio::test]
async fn create_with_unknown_author_is_not_found() {
    let app = app();
    let (status, body) = create_pr(&app, "pr-1").await;
    assert_eq!(status, StatusCode::NOT_FOUND);
    assert_eq!(error_code(&body), "NOT_FOUND");
}

#[tokio::test]
async fn users_endpoints() {
    let app = app();
    add_team(&app, &["A", "R1", "R2"]).await;
    create_pr(&app, "pr-1").await;

    let (status, body) = send(&app, "GET", "/users/getReview?user_id=R1", None).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["user_id"], "R1");
    assert_eq!(body["pull_requests"][0]["pull_request_id"], "pr-1");

    let (status, _) = send(&app, "GET", "/users/getReview", None).await;
    assert_eq!(status, StatusCode::BAD_REQUEST);

    let (status, body) = send(
        &app,
        "POST",
        "/users/setIsActive",
        Some(json!({ "user_id": "R2", "is_active": false })),
    )
    .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["user"]["is_active"], false);
    assert_eq!(body["user"]["team_name"], common::TEAM);

    let (status, _) = send(
        &app,
        "POST",
        "/users/setIsActive",
        Some(json!({ "user_id": "ghost", "is_active": true })),
    )
    .await;
    assert_eq!(status, StatusCode::NOT_FOUND);
}

#[tokio::test]
async fn deactivate_team_and_stats() {
    let app = app();
    add_team(&app, &["A", "R1", "R2"]).await;
    create_pr(&app, "pr-1").await;

    let (status, body) = send(&app, "GET", "/stats/assignments", None).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(
        body["stats"],
        json!([
            { "user_id": "R1", "assignment_count": 1 },
            { "user_id": "R2", "assignment_count": 1 },
        ])
    );

    let (status, body) = send(
        &app,
        "POST",
        "/team/deactivate",
        Some(json!({ "team_name": common::TEAM })),
    )
    .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["deactivated_users"].as_array().unwrap().len(), 3);
    assert_eq!(body["affected_prs"][0]["pull_request_id"], "pr-1");

    let (_, body) = send(&app, "GET", "/stats/assignments", None).await;
    assert_eq!(body["stats"], json!([]));

    let (status, _) = send(
        &app,
        "POST",
        "/team/deactivate",
        Some(json!({ "team_name": "nowhere" })),
    )
    .await;
    assert_eq!(status, StatusCode::NOT_FOUND);
}
