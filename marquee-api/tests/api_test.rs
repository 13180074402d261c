use axum::body::Body;
use axum::http::{header, Request, StatusCode};
use axum::Router;
use chrono::{TimeZone, Utc};
use http_body_util::BodyExt;
use jsonwebtoken::{encode, EncodingKey, Header};
use marquee_api::middleware::{AdminClaims, CircuitBreaker};
use marquee_api::{app, AppState, AuthConfig, Resiliency};
use marquee_booking::{
    BookingAdmin, BookingCommitter, ChannelBroadcaster, GatewayRegistry, MockGateway, PaymentOrchestrator,
    SeatLeaseManager,
};
use marquee_core::booking::{ShowSummary, UserSummary};
use marquee_core::events::BookingEventPublisher;
use marquee_core::CoreResult;
use marquee_shared::BookingConfirmedEvent;
use marquee_store::{InMemoryBookingRepository, InMemoryCatalog, MemoryLeaseStore};
use serde_json::{json, Value};
use std::sync::Arc;
use std::time::Duration;
use tower::ServiceExt;

const SHOW: i64 = 7;
const JWT_SECRET: &str = "test-jwt-secret";
const MOCK_SECRET: &str = "mock-secret";

struct NoopPublisher;

#[async_trait::async_trait]
impl BookingEventPublisher for NoopPublisher {
    async fn publish_booking_confirmed(&self, _event: &BookingConfirmedEvent) -> CoreResult<()> {
        Ok(())
    }
}

struct TestApp {
    router: Router,
    mock: Arc<MockGateway>,
}

async fn test_app() -> TestApp {
    let store = Arc::new(MemoryLeaseStore::new());
    let catalog = Arc::new(InMemoryCatalog::new());
    catalog.insert_show(ShowSummary {
        id: SHOW,
        movie_title: "Stalker".to_string(),
        show_date_time: Utc.with_ymd_and_hms(2026, 12, 5, 20, 0, 0).unwrap(),
        price: 75_000,
    }).await;
    catalog.insert_user(UserSummary {
        id: "alice".to_string(),
        email: Some("alice@example.com".to_string()),
        user_name: Some("Alice".to_string()),
    }).await;
    let bookings = Arc::new(InMemoryBookingRepository::new());

    let broadcaster = Arc::new(ChannelBroadcaster::new(64));
    let seat_tx = broadcaster.sender();
    let leases = Arc::new(SeatLeaseManager::new(store.clone(), broadcaster.clone(), Duration::from_secs(120)));
    let committer = Arc::new(BookingCommitter::new(
        store.clone(),
        catalog.clone(),
        bookings.clone(),
        broadcaster,
        Arc::new(NoopPublisher),
    ));
    let mock = Arc::new(MockGateway::new(MOCK_SECRET, "http://localhost/v1/payments/mock/callback"));
    let payments = Arc::new(PaymentOrchestrator::new(
        leases.clone(),
        store,
        catalog,
        committer,
        GatewayRegistry::new().with(mock.clone()),
        Duration::from_secs(20 * 60),
    ));

    let state = AppState {
        leases,
        payments,
        admin: Arc::new(BookingAdmin::new(bookings)),
        seat_tx,
        auth: AuthConfig { secret: JWT_SECRET.to_string() },
        resiliency: Arc::new(Resiliency {
            payment_cb: CircuitBreaker::new("payments", 5, Duration::from_secs(30)),
        }),
    };

    TestApp { router: app(state), mock }
}

async fn send(router: &Router, request: Request<Body>) -> (StatusCode, Value) {
    let response = router.clone().oneshot(request).await.unwrap();
    let status = response.status();
    let bytes = response.into_body().collect().await.unwrap().to_bytes();
    let body = if bytes.is_empty() { Value::Null } else { serde_json::from_slice(&bytes).unwrap() };
    (status, body)
}

fn post_json(uri: &str, body: Value) -> Request<Body> {
    Request::builder()
        .method("POST")
        .uri(uri)
        .header(header::CONTENT_TYPE, "application/json")
        .body(Body::from(body.to_string()))
        .unwrap()
}

fn get(uri: &str) -> Request<Body> {
    Request::builder().uri(uri).body(Body::empty()).unwrap()
}

fn admin_request(method: &str, uri: &str, token: Option<&str>) -> Request<Body> {
    let mut builder = Request::builder().method(method).uri(uri);
    if let Some(token) = token {
        builder = builder.header(header::AUTHORIZATION, format!("Bearer {}", token));
    }
    builder.body(Body::empty()).unwrap()
}

fn token_with_role(role: &str) -> String {
    let claims = AdminClaims {
        sub: "ops@example.com".to_string(),
        role: role.to_string(),
        exp: (Utc::now().timestamp() + 3600) as usize,
    };
    encode(&Header::default(), &claims, &EncodingKey::from_secret(JWT_SECRET.as_bytes())).unwrap()
}

fn hold_body(seat: &str, user: &str) -> Value {
    json!({ "show_id": SHOW, "seat_number": seat, "user_id": user })
}

/// Holds A1 and A2 for alice and pays through the mock gateway.
async fn book_two_seats(test: &TestApp) -> (String, Value) {
    let (status, _) = send(&test.router, post_json(
        "/v1/seats/hold-batch",
        json!({ "show_id": SHOW, "seat_numbers": ["A1", "A2"], "user_id": "alice" }),
    )).await;
    assert_eq!(status, StatusCode::OK);

    let (status, created) = send(&test.router, post_json(
        "/v1/payments",
        json!({ "show_id": SHOW, "seat_numbers": ["A1", "A2"], "user_id": "alice", "payment_method": "mock" }),
    )).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(created["amount"], 150_000);

    let order_id = created["order_id"].as_str().unwrap().to_string();
    let reference = MockGateway::reference_for(&order_id);
    let params = test.mock.callback_params(&reference, true).unwrap();
    let query = format!(
        "reference={}&status={}&signature={}",
        params["reference"], params["status"], params["signature"]
    );
    let (status, result) = send(&test.router, get(&format!("/v1/payments/mock/callback?{}", query))).await;
    assert_eq!(status, StatusCode::OK);
    (query, result)
}

#[tokio::test]
async fn test_second_hold_conflicts() {
    let test = test_app().await;

    let (status, body) = send(&test.router, post_json("/v1/seats/hold", hold_body("B4", "alice"))).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["success"], true);
    assert!(body["expires_at"].as_i64().unwrap() > Utc::now().timestamp_millis());

    let (status, body) = send(&test.router, post_json("/v1/seats/hold", hold_body("B4", "bob"))).await;
    assert_eq!(status, StatusCode::CONFLICT);
    assert_eq!(body["success"], false);
    assert_eq!(body["code"], "ALREADY_HELD");
}

#[tokio::test]
async fn test_release_by_other_user_is_refused() {
    let test = test_app().await;
    send(&test.router, post_json("/v1/seats/hold", hold_body("C1", "alice"))).await;

    let (status, body) = send(&test.router, post_json("/v1/seats/release", hold_body("C1", "bob"))).await;
    assert_eq!(status, StatusCode::CONFLICT);
    assert_eq!(body["code"], "NOT_HOLDER");

    let (status, _) = send(&test.router, post_json("/v1/seats/release", hold_body("C1", "alice"))).await;
    assert_eq!(status, StatusCode::OK);
}

#[tokio::test]
async fn test_invalid_hold_input_is_bad_request() {
    let test = test_app().await;
    let (status, body) = send(&test.router, post_json("/v1/seats/hold", hold_body("", "alice"))).await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(body["code"], "VALIDATION_ERROR");
}

#[tokio::test]
async fn test_occupied_lists_held_seats() {
    let test = test_app().await;
    send(&test.router, post_json("/v1/seats/hold", hold_body("D2", "alice"))).await;
    send(&test.router, post_json("/v1/seats/hold", hold_body("D1", "bob"))).await;

    let (status, body) = send(&test.router, get(&format!("/v1/seats/occupied/{}", SHOW))).await;
    assert_eq!(status, StatusCode::OK);
    let seats: Vec<&str> = body.as_array().unwrap().iter().map(|s| s["seat_number"].as_str().unwrap()).collect();
    assert_eq!(seats, vec!["D1", "D2"]);
}

#[tokio::test]
async fn test_paid_callback_books_seats() {
    let test = test_app().await;
    let (_, result) = book_two_seats(&test).await;
    assert_eq!(result["success"], true);
    assert_eq!(result["booking_id"], 1);

    let (status, body) = send(&test.router, post_json("/v1/seats/hold", hold_body("A1", "bob"))).await;
    assert_eq!(status, StatusCode::CONFLICT);
    assert_eq!(body["code"], "SEAT_NOT_AVAILABLE");
}

#[tokio::test]
async fn test_duplicate_callback_is_not_found() {
    let test = test_app().await;
    let (query, _) = book_two_seats(&test).await;

    let (status, body) = send(&test.router, get(&format!("/v1/payments/mock/callback?{}", query))).await;
    assert_eq!(status, StatusCode::NOT_FOUND);
    assert_eq!(body["code"], "PAYMENT_NOT_FOUND");
}

#[tokio::test]
async fn test_payment_without_hold_is_refused() {
    let test = test_app().await;
    let (status, body) = send(&test.router, post_json(
        "/v1/payments",
        json!({ "show_id": SHOW, "seat_numbers": ["E9"], "user_id": "alice", "payment_method": "mock" }),
    )).await;
    assert_eq!(status, StatusCode::CONFLICT);
    assert_eq!(body["code"], "SEAT_NOT_AVAILABLE");
}

#[tokio::test]
async fn test_forged_callback_is_unauthorized() {
    let test = test_app().await;
    let (status, body) = send(
        &test.router,
        get("/v1/payments/mock/callback?reference=mock_x&status=success&signature=00ff"),
    ).await;
    assert_eq!(status, StatusCode::UNAUTHORIZED);
    assert_eq!(body["code"], "INVALID_SIGNATURE");
}

#[tokio::test]
async fn test_admin_routes_require_admin_token() {
    let test = test_app().await;
    book_two_seats(&test).await;

    let (status, _) = send(&test.router, admin_request("GET", "/v1/admin/bookings/1", None)).await;
    assert_eq!(status, StatusCode::UNAUTHORIZED);

    let customer = token_with_role("CUSTOMER");
    let (status, _) = send(&test.router, admin_request("GET", "/v1/admin/bookings/1", Some(&customer))).await;
    assert_eq!(status, StatusCode::FORBIDDEN);

    let admin = token_with_role("ADMIN");
    let (status, body) = send(&test.router, admin_request("GET", "/v1/admin/bookings/1", Some(&admin))).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["status"], "CONFIRMED");
    assert_eq!(body["items"].as_array().unwrap().len(), 2);

    let order_id = body["order_id"].as_str().unwrap().to_string();
    let (status, body) = send(
        &test.router,
        admin_request("GET", &format!("/v1/admin/orders/{}/booking", order_id), Some(&admin)),
    ).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["id"], 1);
}

#[tokio::test]
async fn test_admin_cancel_twice_conflicts() {
    let test = test_app().await;
    book_two_seats(&test).await;
    let admin = token_with_role("ADMIN");

    let (status, body) = send(&test.router, admin_request("PUT", "/v1/admin/bookings/1/cancel", Some(&admin))).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["status"], "CANCELLED");

    let (status, body) = send(&test.router, admin_request("PUT", "/v1/admin/bookings/1/cancel", Some(&admin))).await;
    assert_eq!(status, StatusCode::CONFLICT);
    assert_eq!(body["code"], "ALREADY_CANCELLED");

    let (status, _) = send(&test.router, admin_request("GET", "/v1/admin/bookings/99", Some(&admin))).await;
    assert_eq!(status, StatusCode::NOT_FOUND);
}

#[tokio::test]
async fn test_seat_stream_only_carries_its_show() {
    let test = test_app().await;

    let response = test.router.clone().oneshot(get("/v1/shows/42/seats/stream")).await.unwrap();
    assert_eq!(response.status(), StatusCode::OK);
    assert_eq!(response.headers()[header::CONTENT_TYPE], "text/event-stream");
    let mut body = response.into_body();

    let other = json!({ "show_id": 43, "seat_number": "Z9", "user_id": "bob" });
    let (status, _) = send(&test.router, post_json("/v1/seats/hold", other)).await;
    assert_eq!(status, StatusCode::OK);
    let watched = json!({ "show_id": 42, "seat_number": "F5", "user_id": "alice" });
    let (status, _) = send(&test.router, post_json("/v1/seats/hold", watched)).await;
    assert_eq!(status, StatusCode::OK);

    let frame = tokio::time::timeout(Duration::from_secs(2), body.frame())
        .await
        .expect("no seat update within 2s")
        .unwrap()
        .unwrap();
    let text = String::from_utf8(frame.into_data().unwrap().to_vec()).unwrap();

    assert!(text.starts_with("event: seat_update\n"));
    let data: Value = serde_json::from_str(text.trim_end().split("data: ").nth(1).unwrap()).unwrap();
    assert_eq!(data["show_id"], 42);
    assert_eq!(data["seat_numbers"], json!(["F5"]));
    assert_eq!(data["status"], "HELD");
    assert!(!text.contains("Z9"));

    // Nothing else is pending for this show
    let next = tokio::time::timeout(Duration::from_millis(200), body.frame()).await;
    assert!(next.is_err());
}
