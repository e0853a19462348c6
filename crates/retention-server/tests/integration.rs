use axum::http::StatusCode;
use chrono::{Duration, Utc};
use http_body_util::BodyExt;
use retention_core::config::Config;
use retention_core::signals::{Booking, BookingStatus, Member, Payment, PaymentStatus};
use retention_core::worker::Worker;
use retention_server::AppState;
use serde_json::{json, Value};
use tempfile::TempDir;
use tower::ServiceExt;
use uuid::Uuid;

// ---------------------------------------------------------------------------
// Helpers
// ---------------------------------------------------------------------------

/// Initialize a project in `dir` and open its state.
fn init_state(dir: &TempDir) -> AppState {
    Config::default().save(dir.path()).unwrap();
    AppState::open(dir.path().to_path_buf()).unwrap()
}

async fn send(
    app: axum::Router,
    method: &str,
    uri: &str,
    body: Option<Value>,
) -> (StatusCode, Value) {
    let builder = axum::http::Request::builder().method(method).uri(uri);
    let req = match body {
        Some(b) => builder
            .header("content-type", "application/json")
            .body(axum::body::Body::from(serde_json::to_vec(&b).unwrap()))
            .unwrap(),
        None => builder.body(axum::body::Body::empty()).unwrap(),
    };
    let response = app.oneshot(req).await.unwrap();
    let status = response.status();
    let body = response.into_body().collect().await.unwrap().to_bytes();
    let json: Value = serde_json::from_slice(&body).unwrap_or(Value::Null);
    (status, json)
}

async fn get(app: axum::Router, uri: &str) -> (StatusCode, Value) {
    send(app, "GET", uri, None).await
}

async fn post_json(app: axum::Router, uri: &str, body: Value) -> (StatusCode, Value) {
    send(app, "POST", uri, Some(body)).await
}

async fn post(app: axum::Router, uri: &str) -> (StatusCode, Value) {
    send(app, "POST", uri, None).await
}

async fn put_json(app: axum::Router, uri: &str, body: Value) -> (StatusCode, Value) {
    send(app, "PUT", uri, Some(body)).await
}

fn add_member(state: &AppState, org: Uuid, name: &str) -> Member {
    let m = Member::new(org, name, "Test");
    state.db.upsert_member(&m).unwrap();
    m
}

async fn create_playbook(state: &AppState, org: Uuid, body: Value) -> String {
    let app = retention_server::build_router(state.clone());
    let (status, json) = post_json(app, &format!("/api/orgs/{org}/playbooks"), body).await;
    assert_eq!(status, StatusCode::CREATED, "{json}");
    json["id"].as_str().unwrap().to_string()
}

// ---------------------------------------------------------------------------
// Risk
// ---------------------------------------------------------------------------

#[tokio::test]
async fn recalculate_then_read_member_risk() {
    let dir = TempDir::new().unwrap();
    let state = init_state(&dir);
    let org = Uuid::new_v4();
    let m = add_member(&state, org, "Ana");
    let now = Utc::now();
    for d in 1..=3 {
        state
            .db
            .record_booking(
                &Booking::new(m.id, "spin", BookingStatus::NoShow, now - Duration::days(d)),
            )
            .unwrap();
    }
    state
        .db
        .record_payment(&Payment::new(m.id, 4900, PaymentStatus::Overdue, None))
        .unwrap();

    let app = retention_server::build_router(state.clone());
    let (status, json) = post(app, &format!("/api/orgs/{org}/risk/recalculate")).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(json["scored"], 1);

    let app = retention_server::build_router(state.clone());
    let (status, json) = get(app, &format!("/api/orgs/{org}/members/{}/risk", m.id)).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(json["score"], 85);
    assert_eq!(json["band"], "high");
    assert_eq!(json["ui_band"], "High");
    assert_eq!(json["reasons"][0]["code"], "streak_break");
    assert_eq!(json["history"].as_array().unwrap().len(), 1);

    let app = retention_server::build_router(state.clone());
    let (status, json) = get(app, &format!("/api/orgs/{org}/risk/roster")).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(json["heatmap"]["high"], 1);
    assert_eq!(json["entries"][0]["first_name"], "Ana");
}

#[tokio::test]
async fn unscored_member_risk_is_404() {
    let dir = TempDir::new().unwrap();
    let state = init_state(&dir);
    let org = Uuid::new_v4();
    let m = add_member(&state, org, "Ana");

    let app = retention_server::build_router(state.clone());
    let (status, json) = get(app, &format!("/api/orgs/{org}/members/{}/risk", m.id)).await;
    assert_eq!(status, StatusCode::NOT_FOUND);
    assert!(json["error"].is_string());
}

// ---------------------------------------------------------------------------
// Settings
// ---------------------------------------------------------------------------

#[tokio::test]
async fn settings_put_get_delete() {
    let dir = TempDir::new().unwrap();
    let state = init_state(&dir);
    let org = Uuid::new_v4();

    let app = retention_server::build_router(state.clone());
    let (status, json) = put_json(
        app,
        &format!("/api/orgs/{org}/settings/processing_sla_seconds"),
        json!(120),
    )
    .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(json["resolved"]["processing_sla_seconds"], 120);
    assert_eq!(json["overrides"]["processing_sla_seconds"], 120);

    let app = retention_server::build_router(state.clone());
    let (status, _) = put_json(
        app,
        &format!("/api/orgs/{org}/settings/favorite_color"),
        json!("red"),
    )
    .await;
    assert_eq!(status, StatusCode::BAD_REQUEST);

    let app = retention_server::build_router(state.clone());
    let (status, json) = put_json(
        app,
        &format!("/api/orgs/{org}/settings/missed_bookings_threshold"),
        json!({ "window_days": 4_000_000_000u32 }),
    )
    .await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert!(json["error"].as_str().unwrap().contains("window_days"));

    let app = retention_server::build_router(state.clone());
    let (status, json) = send(
        app,
        "DELETE",
        &format!("/api/orgs/{org}/settings/processing_sla_seconds"),
        None,
    )
    .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(json["removed"], true);
    assert_eq!(json["resolved"]["processing_sla_seconds"], 300);
}

// ---------------------------------------------------------------------------
// Playbooks
// ---------------------------------------------------------------------------

#[tokio::test]
async fn playbook_lifecycle_and_versions() {
    let dir = TempDir::new().unwrap();
    let state = init_state(&dir);
    let org = Uuid::new_v4();
    let id = create_playbook(
        &state,
        org,
        json!({ "name": "Rescue", "trigger_type": "risk_band", "change_summary": "first cut" }),
    )
    .await;

    let app = retention_server::build_router(state.clone());
    let (status, json) = put_json(
        app,
        &format!("/api/orgs/{org}/playbooks/{id}"),
        json!({ "channel_strategy": { "primary": "email" } }),
    )
    .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(json["version"], 2);
    assert_eq!(json["channel_strategy"]["primary"], "email");

    let app = retention_server::build_router(state.clone());
    let (status, _) = post(app, &format!("/api/orgs/{org}/playbooks/{id}/pause")).await;
    assert_eq!(status, StatusCode::UNPROCESSABLE_ENTITY);

    let app = retention_server::build_router(state.clone());
    let (status, json) = post(app, &format!("/api/orgs/{org}/playbooks/{id}/activate")).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(json["status"], "active");

    let app = retention_server::build_router(state.clone());
    let (_, json) = get(app, &format!("/api/orgs/{org}/playbooks/{id}/versions")).await;
    let versions: Vec<u64> = json
        .as_array()
        .unwrap()
        .iter()
        .map(|v| v["version"].as_u64().unwrap())
        .collect();
    assert_eq!(versions, vec![1, 2]);

    let app = retention_server::build_router(state.clone());
    let (status, _) = post(app, &format!("/api/orgs/{org}/playbooks/{id}/archive")).await;
    assert_eq!(status, StatusCode::OK);

    let app = retention_server::build_router(state.clone());
    let (_, json) = get(app, &format!("/api/orgs/{org}/playbooks")).await;
    assert_eq!(json.as_array().unwrap().len(), 0);

    let app = retention_server::build_router(state.clone());
    let (status, _) = put_json(
        app,
        &format!("/api/orgs/{org}/playbooks/{id}"),
        json!({ "name": "x" }),
    )
    .await;
    assert_eq!(status, StatusCode::CONFLICT);
}

#[tokio::test]
async fn playbook_from_other_org_is_404() {
    let dir = TempDir::new().unwrap();
    let state = init_state(&dir);
    let org = Uuid::new_v4();
    let id = create_playbook(
        &state,
        org,
        json!({ "name": "Rescue", "trigger_type": "manual" }),
    )
    .await;

    let app = retention_server::build_router(state.clone());
    let (status, _) = get(app, &format!("/api/orgs/{}/playbooks/{id}", Uuid::new_v4())).await;
    assert_eq!(status, StatusCode::NOT_FOUND);
}

#[tokio::test]
async fn blank_playbook_name_is_400() {
    let dir = TempDir::new().unwrap();
    let state = init_state(&dir);
    let app = retention_server::build_router(state.clone());
    let (status, json) = post_json(
        app,
        &format!("/api/orgs/{}/playbooks", Uuid::new_v4()),
        json!({ "name": "  ", "trigger_type": "manual" }),
    )
    .await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert!(json["error"].as_str().unwrap().contains("name"));
}

// ---------------------------------------------------------------------------
// Trigger + processing
// ---------------------------------------------------------------------------

#[tokio::test]
async fn trigger_is_accepted_and_processed_once() {
    let dir = TempDir::new().unwrap();
    let state = init_state(&dir);
    let org = Uuid::new_v4();
    let m = add_member(&state, org, "Ana");
    let id = create_playbook(
        &state,
        org,
        json!({ "name": "Nudge", "trigger_type": "manual" }),
    )
    .await;

    let app = retention_server::build_router(state.clone());
    let (status, json) = post_json(
        app,
        &format!("/api/orgs/{org}/playbooks/{id}/trigger"),
        json!({ "member_id": m.id, "context": { "message": "Hey {{first_name}}!" } }),
    )
    .await;
    assert_eq!(status, StatusCode::ACCEPTED);
    assert_eq!(json["status"], "pending");
    let exec_id = json["id"].as_str().unwrap().to_string();

    let worker = Worker::new(state.db.clone(), &state.config);
    let report = worker.drain(Utc::now() + Duration::seconds(1)).unwrap();
    assert_eq!(report.sent, 1);

    let app = retention_server::build_router(state.clone());
    let (status, json) = get(app, &format!("/api/orgs/{org}/executions/{exec_id}")).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(json["status"], "sent");
    assert_eq!(json["outcome"]["sla_met"], true);

    let app = retention_server::build_router(state.clone());
    let (_, json) = get(app, &format!("/api/orgs/{org}/executions?status=pending")).await;
    assert_eq!(json.as_array().unwrap().len(), 0);

    let app = retention_server::build_router(state.clone());
    let (_, json) = get(app, &format!("/api/orgs/{org}/messages")).await;
    assert_eq!(json.as_array().unwrap().len(), 1);
    assert_eq!(json[0]["body"], "Hey Ana!");
    assert_eq!(json[0]["channel"], "sms");
}

#[tokio::test]
async fn trigger_requires_exactly_one_recipient() {
    let dir = TempDir::new().unwrap();
    let state = init_state(&dir);
    let org = Uuid::new_v4();
    let id = create_playbook(
        &state,
        org,
        json!({ "name": "Nudge", "trigger_type": "manual" }),
    )
    .await;

    let app = retention_server::build_router(state.clone());
    let (status, _) = post_json(
        app,
        &format!("/api/orgs/{org}/playbooks/{id}/trigger"),
        json!({}),
    )
    .await;
    assert_eq!(status, StatusCode::BAD_REQUEST);

    let app = retention_server::build_router(state.clone());
    let (status, _) = post_json(
        app,
        &format!("/api/orgs/{org}/playbooks/{id}/trigger"),
        json!({ "member_id": Uuid::new_v4() }),
    )
    .await;
    assert_eq!(status, StatusCode::NOT_FOUND);
}

// ---------------------------------------------------------------------------
// Derived callers
// ---------------------------------------------------------------------------

#[tokio::test]
async fn win_back_without_playbook_triggers_nothing() {
    let dir = TempDir::new().unwrap();
    let state = init_state(&dir);
    let org = Uuid::new_v4();
    let mut m = Member::new(org, "Cal", "");
    m.cancel(Utc::now() - Duration::days(2));
    state.db.upsert_member(&m).unwrap();

    let app = retention_server::build_router(state.clone());
    let (status, json) = post_json(app, &format!("/api/orgs/{org}/win-back"), json!({})).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(json["triggered"], 0);
    assert_eq!(json["days"], 30);
    let app = retention_server::build_router(state.clone());
    let (status, _) = post_json(
        app,
        &format!("/api/orgs/{org}/win-back"),
        json!({ "days": 200_000_000u32 }),
    )
    .await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
}

#[tokio::test]
async fn freeze_intent_with_active_playbook() {
    let dir = TempDir::new().unwrap();
    let state = init_state(&dir);
    let org = Uuid::new_v4();
    let m = add_member(&state, org, "Fay");

    let app = retention_server::build_router(state.clone());
    let (status, json) = post(
        app,
        &format!("/api/orgs/{org}/members/{}/freeze-intent", m.id),
    )
    .await;
    assert_eq!(status, StatusCode::OK);
    assert!(json["execution"].is_null());

    let id = create_playbook(
        &state,
        org,
        json!({ "name": "Keep", "trigger_type": "freeze_request" }),
    )
    .await;
    let app = retention_server::build_router(state.clone());
    post(app, &format!("/api/orgs/{org}/playbooks/{id}/activate")).await;

    let app = retention_server::build_router(state.clone());
    let (_, json) = post(app, &format!("/api/orgs/{org}/members/{}/freeze-intent", m.id)).await;
    assert_eq!(json["execution"]["context"]["reason"], "freeze_intent");
}

// ---------------------------------------------------------------------------
// Policy
// ---------------------------------------------------------------------------

#[tokio::test]
async fn policy_defaults_and_update() {
    let dir = TempDir::new().unwrap();
    let state = init_state(&dir);
    let org = Uuid::new_v4();

    let app = retention_server::build_router(state.clone());
    let (status, mut policy) = get(app, &format!("/api/orgs/{org}/policy")).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(policy["daily_cap"], 3);
    assert_eq!(policy["weekly_cap"], 10);

    policy["daily_cap"] = json!(2);
    let app = retention_server::build_router(state.clone());
    let (status, json) = put_json(app, &format!("/api/orgs/{org}/policy"), policy).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(json["daily_cap"], 2);

    let app = retention_server::build_router(state.clone());
    let (status, json) = put_json(
        app,
        &format!("/api/orgs/{org}/policy"),
        json!({ "weekly_cap": 4, "quiet_hours": null }),
    )
    .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(json["weekly_cap"], 4);
    assert_eq!(json["daily_cap"], 3);
    assert_eq!(json["timezone_strategy"], "member_local");
    assert!(json["quiet_hours"].is_null());

    let app = retention_server::build_router(state.clone());
    let (status, _) = put_json(
        app,
        &format!("/api/orgs/{org}/policy"),
        json!({ "daily_cap": 5, "weekly_cap": 1 }),
    )
    .await;
    assert_eq!(status, StatusCode::BAD_REQUEST);

    let app = retention_server::build_router(state);
    let (_, stored) = get(app, &format!("/api/orgs/{org}/policy")).await;
    assert_eq!(stored["weekly_cap"], 4);
}

#[tokio::test]
async fn malformed_org_id_is_rejected() {
    let dir = TempDir::new().unwrap();
    let state = init_state(&dir);
    let app = retention_server::build_router(state);
    let (status, _) = get(app, "/api/orgs/not-a-uuid/playbooks").await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
}
