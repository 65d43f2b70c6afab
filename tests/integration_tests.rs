use std::sync::{Arc, Mutex};
use std::time::Duration;

use async_trait::async_trait;
use axum::body::Body;
use axum::http::{Request, StatusCode};
use axum::Router;
use tower::ServiceExt;

use service_bookings::config::AppConfig;
use service_bookings::db;
use service_bookings::errors::NotificationError;
use service_bookings::handlers;
use service_bookings::services::notifications::{Notification, NotificationKind, Notifier};
use service_bookings::services::rate_limit::FixedWindowRateLimiter;
use service_bookings::state::AppState;

// ── Mock Notifier ──

struct MockNotifier {
    sent: Arc<Mutex<Vec<Notification>>>,
    fail: bool,
}

#[async_trait]
impl Notifier for MockNotifier {
    async fn send(&self, notification: &Notification) -> Result<(), NotificationError> {
        self.sent.lock().unwrap().push(notification.clone());
        if self.fail {
            return Err(NotificationError::NotConfigured);
        }
        Ok(())
    }
}

// ── Helpers ──

fn test_config() -> AppConfig {
    AppConfig {
        port: 3000,
        database_url: ":memory:".to_string(),
        admin_token: "test-token".to_string(),
        operator_email: "ops@agency.dev".to_string(),
        emailjs_service_id: String::new(),
        emailjs_template_id: String::new(),
        emailjs_public_key: String::new(),
        emailjs_private_key: String::new(),
        rate_limit_max: 100,
        rate_limit_window_secs: 60,
    }
}

fn build_state(fail: bool, rate_limit_max: u32) -> (Arc<AppState>, Arc<Mutex<Vec<Notification>>>) {
    let conn = db::init_db(":memory:").unwrap();
    let sent = Arc::new(Mutex::new(vec![]));
    let notifier = MockNotifier {
        sent: Arc::clone(&sent),
        fail,
    };
    let state = Arc::new(AppState {
        db: Arc::new(Mutex::new(conn)),
        config: test_config(),
        notifier: Box::new(notifier),
        rate_limiter: Box::new(FixedWindowRateLimiter::new(
            rate_limit_max,
            Duration::from_secs(60),
        )),
    });
    (state, sent)
}

fn test_state() -> Arc<AppState> {
    build_state(false, 100).0
}

fn test_app(state: Arc<AppState>) -> Router {
    handlers::router(state)
}

fn booking_body(email: &str, date: &str, time: &str) -> String {
    serde_json::json!({
        "serviceId": "s1",
        "serviceName": "Consult",
        "clientName": "Ana",
        "clientEmail": email,
        "bookingDate": date,
        "preferredTime": time,
    })
    .to_string()
}

fn post_booking(body: String) -> Request<Body> {
    Request::builder()
        .method("POST")
        .uri("/bookings")
        .header("Content-Type", "application/json")
        .body(Body::from(body))
        .unwrap()
}

async fn send(state: &Arc<AppState>, req: Request<Body>) -> (StatusCode, serde_json::Value) {
    let res = test_app(state.clone()).oneshot(req).await.unwrap();
    let status = res.status();
    let body = axum::body::to_bytes(res.into_body(), usize::MAX)
        .await
        .unwrap();
    let json = if body.is_empty() {
        serde_json::Value::Null
    } else {
        serde_json::from_slice(&body).unwrap()
    };
    (status, json)
}

async fn create(state: &Arc<AppState>, email: &str, date: &str, time: &str) -> String {
    let (status, json) = send(state, post_booking(booking_body(email, date, time))).await;
    assert_eq!(status, StatusCode::CREATED, "{json}");
    json["booking"]["id"].as_str().unwrap().to_string()
}

fn put_booking(id: &str, token: Option<&str>, body: serde_json::Value) -> Request<Body> {
    let mut builder = Request::builder()
        .method("PUT")
        .uri(format!("/bookings/{id}"))
        .header("Content-Type", "application/json");
    if let Some(token) = token {
        builder = builder.header("Authorization", format!("Bearer {token}"));
    }
    builder.body(Body::from(body.to_string())).unwrap()
}

fn get(uri: &str) -> Request<Body> {
    Request::builder().uri(uri).body(Body::empty()).unwrap()
}

// ── Health ──

#[tokio::test]
async fn test_health() {
    let state = test_state();
    let (status, json) = send(&state, get("/health")).await;

    assert_eq!(status, StatusCode::OK);
    assert_eq!(json["status"], "healthy");
    assert_eq!(json["services"]["database"], "connected");
}

// ── Create ──

#[tokio::test]
async fn test_create_booking() {
    let (state, sent) = build_state(false, 100);

    let (status, json) = send(
        &state,
        post_booking(booking_body("ANA@x.com", "2099-01-10", "10:00 AM")),
    )
    .await;

    assert_eq!(status, StatusCode::CREATED);
    assert_eq!(json["success"], true);
    assert_eq!(json["booking"]["clientEmail"], "ana@x.com");
    assert_eq!(json["booking"]["status"], "pending");
    assert_eq!(json["booking"]["timezone"], "UTC");
    assert_eq!(json["booking"]["duration"], 60);
    assert_eq!(json["booking"]["reminderSent"], false);

    let sent = sent.lock().unwrap();
    let kinds: Vec<NotificationKind> = sent.iter().map(|n| n.kind).collect();
    assert_eq!(
        kinds,
        vec![NotificationKind::BookingReceived, NotificationKind::NewBooking]
    );
}

#[tokio::test]
async fn test_create_missing_fields() {
    let state = test_state();
    let body = serde_json::json!({
        "serviceId": "s1",
        "clientEmail": "ana@x.com",
        "bookingDate": "2099-01-10",
    })
    .to_string();

    let (status, json) = send(&state, post_booking(body)).await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(json["success"], false);
    assert_eq!(json["error"], "Required fields are missing");
}

#[tokio::test]
async fn test_create_malformed_json() {
    let state = test_state();
    let (status, json) = send(&state, post_booking("{not json".to_string())).await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(json["success"], false);
}

#[tokio::test]
async fn test_create_past_date() {
    let state = test_state();
    let (status, json) = send(
        &state,
        post_booking(booking_body("ana@x.com", "2001-05-01", "10:00 AM")),
    )
    .await;

    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(json["error"], "Booking date cannot be in the past");
}

#[tokio::test]
async fn test_create_slot_conflict() {
    let state = test_state();
    create(&state, "ana@x.com", "2099-01-10", "10:00 AM").await;

    let (status, json) = send(
        &state,
        post_booking(booking_body("bob@x.com", "2099-01-10", "10:00 AM")),
    )
    .await;

    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(
        json["error"],
        "This time slot is already booked. Please choose another time."
    );
}

#[tokio::test]
async fn test_notification_failure_does_not_block_create() {
    let (state, sent) = build_state(true, 100);
    let id = create(&state, "ana@x.com", "2099-01-10", "10:00 AM").await;

    let (status, json) = send(&state, get(&format!("/bookings/{id}"))).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(json["booking"]["id"], id.as_str());
    assert_eq!(sent.lock().unwrap().len(), 2);
}

#[tokio::test]
async fn test_create_rate_limited() {
    let (state, _) = build_state(false, 2);

    for time in ["9:00 AM", "10:00 AM"] {
        let req = Request::builder()
            .method("POST")
            .uri("/bookings")
            .header("Content-Type", "application/json")
            .header("X-Forwarded-For", "198.51.100.4")
            .body(Body::from(booking_body("ana@x.com", "2099-01-10", time)))
            .unwrap();
        let (status, _) = send(&state, req).await;
        assert_eq!(status, StatusCode::CREATED);
    }

    let req = Request::builder()
        .method("POST")
        .uri("/bookings")
        .header("Content-Type", "application/json")
        .header("X-Forwarded-For", "198.51.100.4")
        .body(Body::from(booking_body("ana@x.com", "2099-01-10", "11:00 AM")))
        .unwrap();
    let (status, json) = send(&state, req).await;
    assert_eq!(status, StatusCode::TOO_MANY_REQUESTS);
    assert_eq!(json["success"], false);

    // Another client is unaffected.
    let req = Request::builder()
        .method("POST")
        .uri("/bookings")
        .header("Content-Type", "application/json")
        .header("X-Forwarded-For", "198.51.100.5")
        .body(Body::from(booking_body("bob@x.com", "2099-01-10", "11:00 AM")))
        .unwrap();
    let (status, _) = send(&state, req).await;
    assert_eq!(status, StatusCode::CREATED);
}

// ── Read ──

#[tokio::test]
async fn test_get_unknown_booking() {
    let state = test_state();
    let (status, json) = send(&state, get("/bookings/does-not-exist")).await;

    assert_eq!(status, StatusCode::NOT_FOUND);
    assert_eq!(json["success"], false);
    assert_eq!(json["error"], "Booking not found");
}

#[tokio::test]
async fn test_list_filters_by_email_and_paginates() {
    let state = test_state();
    for time in ["9:00 AM", "10:00 AM", "11:00 AM"] {
        create(&state, "Ana@X.com", "2099-02-01", time).await;
    }
    create(&state, "bob@x.com", "2099-01-01", "9:00 AM").await;

    let (status, json) = send(&state, get("/bookings?email=ANA@x.com&limit=2&page=2")).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(json["success"], true);
    assert_eq!(json["pagination"]["page"], 2);
    assert_eq!(json["pagination"]["limit"], 2);
    assert_eq!(json["pagination"]["total"], 3);
    assert_eq!(json["pagination"]["pages"], 2);

    let bookings = json["bookings"].as_array().unwrap();
    assert_eq!(bookings.len(), 1);
    assert_eq!(bookings[0]["clientEmail"], "ana@x.com");

    // Unfiltered list is sorted by booking date ascending.
    let (_, json) = send(&state, get("/bookings")).await;
    assert_eq!(json["pagination"]["total"], 4);
    assert_eq!(json["bookings"][0]["clientEmail"], "bob@x.com");
}

#[tokio::test]
async fn test_list_invalid_status() {
    let state = test_state();
    let (status, json) = send(&state, get("/bookings?status=archived")).await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(json["error"], "Invalid status");
}

// ── Update / Cancel ──

#[tokio::test]
async fn test_update_requires_admin_token() {
    let state = test_state();
    let id = create(&state, "ana@x.com", "2099-01-10", "10:00 AM").await;

    let body = serde_json::json!({ "status": "confirmed" });
    let (status, _) = send(&state, put_booking(&id, None, body.clone())).await;
    assert_eq!(status, StatusCode::UNAUTHORIZED);

    let (status, _) = send(&state, put_booking(&id, Some("wrong"), body)).await;
    assert_eq!(status, StatusCode::UNAUTHORIZED);
}

#[tokio::test]
async fn test_update_unknown_booking() {
    let state = test_state();
    let body = serde_json::json!({ "status": "confirmed" });
    let (status, _) = send(&state, put_booking("missing", Some("test-token"), body)).await;
    assert_eq!(status, StatusCode::NOT_FOUND);
}

#[tokio::test]
async fn test_booking_lifecycle_scenario() {
    let (state, sent) = build_state(false, 100);

    let first = create(&state, "ANA@x.com", "2099-01-10", "10:00 AM").await;

    // Same slot, different client.
    let (status, _) = send(
        &state,
        post_booking(booking_body("carol@y.com", "2099-01-10", "10:00 AM")),
    )
    .await;
    assert_eq!(status, StatusCode::BAD_REQUEST);

    // Confirm with a meeting link.
    let body = serde_json::json!({ "status": "confirmed", "meetingLink": "https://meet/x" });
    let (status, json) = send(&state, put_booking(&first, Some("test-token"), body)).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(json["booking"]["status"], "confirmed");

    let (_, json) = send(&state, get(&format!("/bookings/{first}"))).await;
    assert_eq!(json["booking"]["status"], "confirmed");
    assert_eq!(json["booking"]["meetingLink"], "https://meet/x");
    assert!(json["booking"]["confirmedAt"].is_string());

    {
        let sent = sent.lock().unwrap();
        let last = sent.last().unwrap();
        assert_eq!(last.kind, NotificationKind::BookingConfirmed);
        assert_eq!(last.to_email, "ana@x.com");
        assert!(last.message.contains("https://meet/x"));
    }

    // Client cancels.
    let req = Request::builder()
        .method("DELETE")
        .uri(format!("/bookings/{first}"))
        .header("Content-Type", "application/json")
        .body(Body::from(r#"{"reason":"client changed mind"}"#))
        .unwrap();
    let (status, json) = send(&state, req).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(json["success"], true);
    assert_eq!(json["message"], "Booking cancelled successfully");

    let (_, json) = send(&state, get(&format!("/bookings/{first}"))).await;
    assert_eq!(json["booking"]["status"], "cancelled");
    assert_eq!(json["booking"]["cancellationReason"], "client changed mind");
    assert!(json["booking"]["cancelledAt"].is_string());

    // The slot is open again.
    create(&state, "carol@y.com", "2099-01-10", "10:00 AM").await;
}

#[tokio::test]
async fn test_cancel_without_body_uses_default_reason() {
    let state = test_state();
    let id = create(&state, "ana@x.com", "2099-01-10", "10:00 AM").await;

    let req = Request::builder()
        .method("DELETE")
        .uri(format!("/bookings/{id}"))
        .body(Body::empty())
        .unwrap();
    let (status, _) = send(&state, req).await;
    assert_eq!(status, StatusCode::OK);

    let (_, json) = send(&state, get(&format!("/bookings/{id}"))).await;
    assert_eq!(json["booking"]["cancellationReason"], "Cancelled by user");
}

#[tokio::test]
async fn test_cancel_unknown_booking() {
    let state = test_state();
    let req = Request::builder()
        .method("DELETE")
        .uri("/bookings/missing")
        .body(Body::empty())
        .unwrap();
    let (status, json) = send(&state, req).await;
    assert_eq!(status, StatusCode::NOT_FOUND);
    assert_eq!(json["error"], "Booking not found");
}

#[tokio::test]
async fn test_admin_cancel_records_supplied_reason() {
    let state = test_state();
    let id = create(&state, "ana@x.com", "2099-01-10", "10:00 AM").await;

    let body = serde_json::json!({ "status": "cancelled", "cancellationReason": "double booked" });
    let (status, json) = send(&state, put_booking(&id, Some("test-token"), body)).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(json["booking"]["status"], "cancelled");
    assert_eq!(json["booking"]["cancellationReason"], "double booked");
}
