use std::path::PathBuf;
use std::sync::Arc;

use axum::{
    Router,
    body::{Body, to_bytes},
    http::{Method, Request, StatusCode, header},
};
use serde_json::{Value, json};
use tower::ServiceExt;

use beads_core::config::ProjectEntry;
use beads_core::persist::MemorySnapshot;
use beads_core::tenant::{MultiTenant, ProjectInfo, SingleTenant};
use beads_core::IssueStore;
use beads_server::{AppState, create_router};

const TOKEN: &str = "test-token";

fn memory_store() -> Arc<IssueStore> {
    Arc::new(IssueStore::from_parts(
        Vec::new(),
        Arc::new(MemorySnapshot::new()),
        "bd",
    ))
}

fn app() -> Router {
    let registry = SingleTenant::new(
        TOKEN,
        ProjectInfo {
            name: "default".into(),
            data_file: PathBuf::from("beads.json"),
        },
        memory_store(),
    );
    create_router(Arc::new(AppState::new(Arc::new(registry))))
}

async fn send_as(
    app: &Router,
    token: Option<&str>,
    method: Method,
    uri: &str,
    body: Option<Value>,
) -> (StatusCode, Value) {
    let mut builder = Request::builder().method(method).uri(uri);
    if let Some(token) = token {
        builder = builder.header(header::AUTHORIZATION, format!("Bearer {token}"));
    }
    let request = match body {
        Some(body) => builder
            .header(header::CONTENT_TYPE, "application/json")
            .body(Body::from(body.to_string()))
            .unwrap(),
        None => builder.body(Body::empty()).unwrap(),
    };
    let response = app.clone().oneshot(request).await.unwrap();
    let status = response.status();
    let bytes = to_bytes(response.into_body(), usize::MAX).await.unwrap();
    let value = if bytes.is_empty() {
        Value::Null
    } else {
        serde_json::from_slice(&bytes).unwrap_or(Value::Null)
    };
    (status, value)
}

async fn send(app: &Router, method: Method, uri: &str, body: Option<Value>) -> (StatusCode, Value) {
    send_as(app, Some(TOKEN), method, uri, body).await
}

async fn create(app: &Router, body: Value) -> String {
    let (status, value) = send(app, Method::POST, "/api/v1/beads", Some(body)).await;
    assert_eq!(status, StatusCode::CREATED, "{value}");
    value["id"].as_str().unwrap().to_string()
}

fn ids(list: &Value) -> Vec<&str> {
    list["items"]
        .as_array()
        .unwrap()
        .iter()
        .map(|row| row["id"].as_str().unwrap())
        .collect()
}

// ---------------------------------------------------------------------------
// Auth
// ---------------------------------------------------------------------------

#[tokio::test]
async fn health_and_version_skip_auth() {
    let app = app();
    let (status, body) = send_as(&app, None, Method::GET, "/api/v1/health", None).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["status"], "ok");
    let (status, body) = send_as(&app, None, Method::GET, "/api/v1/version", None).await;
    assert_eq!(status, StatusCode::OK);
    assert!(body["version"].is_string());
}

#[tokio::test]
async fn missing_or_unknown_token_is_401() {
    let app = app();
    let (status, body) = send_as(&app, None, Method::GET, "/api/v1/beads", None).await;
    assert_eq!(status, StatusCode::UNAUTHORIZED);
    assert_eq!(body["error"]["kind"], "unauthorized");
    let (status, _) = send_as(&app, Some("nope"), Method::GET, "/api/v1/beads", None).await;
    assert_eq!(status, StatusCode::UNAUTHORIZED);
}

#[tokio::test]
async fn tokens_select_their_own_tenant() {
    let entries = vec![
        ProjectEntry {
            name: "alpha".into(),
            token: "tok-a".into(),
            data_file: "alpha.json".into(),
        },
        ProjectEntry {
            name: "beta".into(),
            token: "tok-b".into(),
            data_file: "beta.json".into(),
        },
    ];
    let stores = entries
        .into_iter()
        .map(|entry| (entry, memory_store()))
        .collect();
    let registry = MultiTenant::from_stores(stores).unwrap();
    let app = create_router(Arc::new(AppState::new(Arc::new(registry))));

    let (status, _) = send_as(
        &app,
        Some("tok-a"),
        Method::POST,
        "/api/v1/beads",
        Some(json!({"title": "alpha work"})),
    )
    .await;
    assert_eq!(status, StatusCode::CREATED);

    let (_, alpha) = send_as(&app, Some("tok-a"), Method::GET, "/api/v1/beads", None).await;
    let (_, beta) = send_as(&app, Some("tok-b"), Method::GET, "/api/v1/beads", None).await;
    assert_eq!(alpha["total"], 1);
    assert_eq!(beta["total"], 0);

    let (status, projects) =
        send_as(&app, Some("tok-b"), Method::GET, "/api/v1/projects", None).await;
    assert_eq!(status, StatusCode::OK);
    let rendered = projects.to_string();
    assert!(rendered.contains("alpha") && rendered.contains("beta"));
    assert!(!rendered.contains("tok-a") && !rendered.contains("tok-b"));
}

// ---------------------------------------------------------------------------
// Scenarios
// ---------------------------------------------------------------------------

#[tokio::test]
async fn create_returns_201_with_defaults() {
    let app = app();
    let (status, body) = send(
        &app,
        Method::POST,
        "/api/v1/beads",
        Some(json!({"title": "Login bug", "type": "bug", "priority": "high"})),
    )
    .await;
    assert_eq!(status, StatusCode::CREATED);
    assert_eq!(body["status"], "open");
    assert_eq!(body["priority"], "high");
    assert_eq!(body["type"], "bug");
    let id = body["id"].as_str().unwrap();
    let suffix = id.strip_prefix("bd-").unwrap();
    assert!((4..=8).contains(&suffix.len()));
    assert!(suffix.chars().all(|c| c.is_ascii_lowercase() || c.is_ascii_digit()));
}

#[tokio::test]
async fn malformed_bodies_are_400() {
    let app = app();
    let (status, body) = send(&app, Method::POST, "/api/v1/beads", Some(json!({}))).await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(body["error"]["kind"], "invalid");

    let (status, _) = send(
        &app,
        Method::POST,
        "/api/v1/beads",
        Some(json!({"title": "x", "status": "wontfix"})),
    )
    .await;
    assert_eq!(status, StatusCode::BAD_REQUEST);

    let (status, _) = send(
        &app,
        Method::POST,
        "/api/v1/beads",
        Some(json!({"title": "x", "status": "closed"})),
    )
    .await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
}

#[tokio::test]
async fn dependency_flow_reports_unblocked() {
    let app = app();
    let a = create(&app, json!({"title": "A"})).await;
    let b = create(&app, json!({"title": "B"})).await;

    let (status, _) = send(
        &app,
        Method::POST,
        &format!("/api/v1/beads/{a}/link"),
        Some(json!({"blocked_by": b})),
    )
    .await;
    assert_eq!(status, StatusCode::OK);

    let (_, deps) = send(&app, Method::GET, &format!("/api/v1/beads/{a}/deps"), None).await;
    assert_eq!(deps["active_blockers"][0]["id"], b.as_str());

    let (_, ready) = send(&app, Method::GET, "/api/v1/beads?ready=true", None).await;
    let ready = ids(&ready);
    assert!(ready.contains(&b.as_str()));
    assert!(!ready.contains(&a.as_str()));

    let (status, closed) = send(
        &app,
        Method::PATCH,
        &format!("/api/v1/beads/{b}"),
        Some(json!({"status": "closed"})),
    )
    .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(closed["unblocked"][0]["id"], a.as_str());

    let (_, deps) = send(&app, Method::GET, &format!("/api/v1/beads/{a}/deps"), None).await;
    assert!(deps["active_blockers"].as_array().unwrap().is_empty());
    assert_eq!(deps["resolved_blockers"][0]["id"], b.as_str());
}

#[tokio::test]
async fn cycle_is_400_with_cycle_code() {
    let app = app();
    let a = create(&app, json!({"title": "A"})).await;
    let b = create(&app, json!({"title": "B"})).await;
    let (status, _) = send(
        &app,
        Method::POST,
        &format!("/api/v1/beads/{a}/link"),
        Some(json!({"blocked_by": b})),
    )
    .await;
    assert_eq!(status, StatusCode::OK);
    let (status, body) = send(
        &app,
        Method::POST,
        &format!("/api/v1/beads/{b}/link"),
        Some(json!({"blocked_by": a})),
    )
    .await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(body["error"]["kind"], "invalid");
    assert_eq!(body["error"]["code"], "E2003");
}

#[tokio::test]
async fn epic_lifecycle_over_http() {
    let app = app();
    let epic = create(&app, json!({"title": "E"})).await;
    let c1 = create(&app, json!({"title": "C1", "parent_id": epic})).await;
    let c2 = create(&app, json!({"title": "C2", "parent_id": epic})).await;

    let (_, view) = send(&app, Method::GET, &format!("/api/v1/beads/{epic}"), None).await;
    assert_eq!(view["is_epic"], true);
    assert_eq!(view["status"], "open");
    assert_eq!(view["progress"]["total"], 2);
    assert_eq!(view["progress"]["open"], 2);

    let (_, child) = send(&app, Method::GET, &format!("/api/v1/beads/{c1}"), None).await;
    assert_eq!(child["parent_title"], "E");

    for child in [&c1, &c2] {
        let (status, _) = send(
            &app,
            Method::PATCH,
            &format!("/api/v1/beads/{child}"),
            Some(json!({"status": "closed"})),
        )
        .await;
        assert_eq!(status, StatusCode::OK);
    }
    let (_, view) = send(&app, Method::GET, &format!("/api/v1/beads/{epic}"), None).await;
    assert_eq!(view["status"], "closed");

    let (status, deleted) =
        send(&app, Method::DELETE, &format!("/api/v1/beads/{epic}"), None).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(deleted["status"], "deleted");
    assert!(deleted.get("unblocked").is_none());

    let (status, body) = send(
        &app,
        Method::PATCH,
        &format!("/api/v1/beads/{epic}"),
        Some(json!({"status": "open"})),
    )
    .await;
    assert_eq!(status, StatusCode::CONFLICT);
    assert_eq!(body["error"]["kind"], "conflict");

    let (status, _) = send(
        &app,
        Method::PATCH,
        &format!("/api/v1/beads/{c1}"),
        Some(json!({"status": "open"})),
    )
    .await;
    assert_eq!(status, StatusCode::CONFLICT);
    let (status, _) = send(
        &app,
        Method::POST,
        &format!("/api/v1/beads/{c2}/claim"),
        Some(json!({"user": "alice"})),
    )
    .await;
    assert_eq!(status, StatusCode::CONFLICT);
}

#[tokio::test]
async fn claim_is_idempotent_per_user() {
    let app = app();
    let x = create(&app, json!({"title": "X"})).await;
    let uri = format!("/api/v1/beads/{x}/claim");
    let (status, first) = send(&app, Method::POST, &uri, Some(json!({"user": "alice"}))).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(first["status"], "in_progress");
    assert_eq!(first["assignee"], "alice");
    let (status, second) = send(&app, Method::POST, &uri, Some(json!({"user": "alice"}))).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(first, second);
    let (status, _) = send(&app, Method::POST, &uri, Some(json!({"user": "bob"}))).await;
    assert_eq!(status, StatusCode::CONFLICT);
}

#[tokio::test]
async fn clean_validates_days() {
    let app = app();
    let (status, _) = send(&app, Method::POST, "/api/v1/clean", Some(json!({"days": -1}))).await;
    assert_eq!(status, StatusCode::BAD_REQUEST);

    let done = create(&app, json!({"title": "done"})).await;
    let keep = create(&app, json!({"title": "keep"})).await;
    send(
        &app,
        Method::PATCH,
        &format!("/api/v1/beads/{done}"),
        Some(json!({"status": "closed"})),
    )
    .await;
    let (status, body) = send(&app, Method::POST, "/api/v1/clean", Some(json!({"days": 30}))).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["removed"], 0);

    let (status, body) = send(&app, Method::POST, "/api/v1/clean", Some(json!({"days": 0}))).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["removed"], 1);
    let (status, _) = send(&app, Method::GET, &format!("/api/v1/beads/{done}"), None).await;
    assert_eq!(status, StatusCode::NOT_FOUND);
    let (status, _) = send(&app, Method::GET, &format!("/api/v1/beads/{keep}"), None).await;
    assert_eq!(status, StatusCode::OK);
}

// ---------------------------------------------------------------------------
// Other routes
// ---------------------------------------------------------------------------

#[tokio::test]
async fn prefix_resolution_and_ambiguity() {
    let app = app();
    let id = create(&app, json!({"title": "only"})).await;
    let short = &id[..id.len() - 1];
    let (status, view) = send(&app, Method::GET, &format!("/api/v1/beads/{short}"), None).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(view["id"], id.as_str());

    create(&app, json!({"title": "second"})).await;
    let (status, body) = send(&app, Method::GET, "/api/v1/beads/bd-", None).await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(body["error"]["kind"], "ambiguous");
    assert_eq!(body["error"]["candidates"].as_array().unwrap().len(), 2);

    let (status, body) = send(&app, Method::GET, "/api/v1/beads/bd-zzzzzzzz", None).await;
    assert_eq!(status, StatusCode::NOT_FOUND);
    assert_eq!(body["error"]["kind"], "not_found");
}

#[tokio::test]
async fn patch_parent_id_moves_in_and_out() {
    let app = app();
    let epic = create(&app, json!({"title": "epic"})).await;
    let task = create(&app, json!({"title": "task"})).await;
    let uri = format!("/api/v1/beads/{task}");

    let (status, moved) = send(&app, Method::PATCH, &uri, Some(json!({"parent_id": epic}))).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(moved["parent_id"], epic.as_str());

    let (status, back) = send(&app, Method::PATCH, &uri, Some(json!({"parent_id": ""}))).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(back["parent_id"], "");

    let (status, _) = send(&app, Method::PATCH, &uri, Some(json!({"parent_id": task}))).await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
}

#[tokio::test]
async fn comments_unlink_and_search() {
    let app = app();
    let a = create(&app, json!({"title": "Parser crash", "description": "stack overflow"})).await;
    let b = create(&app, json!({"title": "Lexer"})).await;

    let (status, item) = send(
        &app,
        Method::POST,
        &format!("/api/v1/beads/{a}/comments"),
        Some(json!({"author": "alice", "text": "repro attached"})),
    )
    .await;
    assert_eq!(status, StatusCode::CREATED);
    assert_eq!(item["comments"][0]["author"], "alice");

    send(
        &app,
        Method::POST,
        &format!("/api/v1/beads/{a}/link"),
        Some(json!({"blocked_by": b})),
    )
    .await;
    let (status, item) = send(
        &app,
        Method::DELETE,
        &format!("/api/v1/beads/{a}/link/{b}"),
        None,
    )
    .await;
    assert_eq!(status, StatusCode::OK);
    assert!(item["blocked_by"].as_array().unwrap().is_empty());
    let (status, _) = send(
        &app,
        Method::DELETE,
        &format!("/api/v1/beads/{a}/link/{b}"),
        None,
    )
    .await;
    assert_eq!(status, StatusCode::BAD_REQUEST);

    let (status, hits) = send(&app, Method::GET, "/api/v1/search?q=OVERFLOW", None).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(ids(&hits), vec![a.as_str()]);
    let (status, _) = send(&app, Method::GET, "/api/v1/search?q=", None).await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
}

#[tokio::test]
async fn list_filters_and_pagination() {
    let app = app();
    for n in 0..3 {
        create(&app, json!({"title": format!("t{n}"), "tags": ["api"], "priority": "low"})).await;
    }
    let urgent = create(&app, json!({"title": "urgent", "priority": "critical"})).await;

    let (_, all) = send(&app, Method::GET, "/api/v1/beads", None).await;
    assert_eq!(all["total"], 4);
    assert_eq!(all["items"][0]["id"], urgent.as_str());

    let (_, tagged) = send(&app, Method::GET, "/api/v1/beads?tag=api", None).await;
    assert_eq!(tagged["total"], 3);

    let (_, paged) = send(&app, Method::GET, "/api/v1/beads?per_page=2&page=2", None).await;
    assert_eq!(paged["total"], 4);
    assert_eq!(paged["items"].as_array().unwrap().len(), 2);

    let (status, _) = send(&app, Method::GET, "/api/v1/beads?priority=urgent", None).await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
}
