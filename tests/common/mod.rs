//! Shared helpers for router tests
#![allow(dead_code)]

use axum::{
    body::Body,
    http::{header::CONTENT_TYPE, Request, StatusCode},
    Router,
};
use chrono::{Months, NaiveDate, Utc};
use hmac::{Hmac, Mac};
use jsonwebtoken::{encode, EncodingKey, Header};
use rust_decimal::Decimal;
use sha2::Sha256;
use sqlx::{postgres::PgPoolOptions, PgPool};
use std::time::Duration;
use tower::ServiceExt;
use uuid::Uuid;

use inhalestays_api::{
    auth::Claims,
    build_router,
    config::{Config, RazorpayConfig},
    AppState,
};

pub const KEY_SECRET: &str = "rzp_test_secret";
pub const WEBHOOK_SECRET: &str = "whsec_test_secret";

pub fn test_config() -> Config {
    Config {
        host: "127.0.0.1".to_string(),
        port: 0,
        database_url: "postgres://localhost/inhalestays_test".to_string(),
        database_max_connections: 1,
        jwt_secret: "super-secret-jwt-token-with-at-least-32-characters".to_string(),
        razorpay: RazorpayConfig {
            key_id: "rzp_test_key".to_string(),
            key_secret: KEY_SECRET.to_string(),
            webhook_secret: WEBHOOK_SECRET.to_string(),
            base_url: "http://127.0.0.1:9".to_string(),
        },
        seat_cache_path: None,
        request_timeout: Duration::from_secs(5),
    }
}

/// Router over a pool that never connects; only endpoints that stay away
/// from the database can succeed.
pub fn test_app() -> Router {
    let config = test_config();
    let db = PgPoolOptions::new()
        .max_connections(1)
        .acquire_timeout(Duration::from_secs(1))
        .connect_lazy(&config.database_url)
        .unwrap();
    build_router(AppState::new(db, config))
}

pub async fn send(app: Router, request: Request<Body>) -> (StatusCode, serde_json::Value) {
    let response = app.oneshot(request).await.unwrap();
    let status = response.status();
    let bytes = axum::body::to_bytes(response.into_body(), usize::MAX)
        .await
        .unwrap();
    let body = if bytes.is_empty() {
        serde_json::Value::Null
    } else {
        serde_json::from_slice(&bytes).unwrap()
    };
    (status, body)
}

pub fn get(uri: &str) -> Request<Body> {
    Request::builder().uri(uri).body(Body::empty()).unwrap()
}

pub fn post_json(uri: &str, body: serde_json::Value) -> Request<Body> {
    Request::builder()
        .method("POST")
        .uri(uri)
        .header(CONTENT_TYPE, "application/json")
        .body(Body::from(body.to_string()))
        .unwrap()
}

pub fn sign(secret: &str, payload: &[u8]) -> String {
    let mut mac = Hmac::<Sha256>::new_from_slice(secret.as_bytes()).unwrap();
    mac.update(payload);
    hex::encode(mac.finalize().into_bytes())
}

pub fn webhook(body: &[u8], signature: Option<&str>) -> Request<Body> {
    let mut builder = Request::builder().method("POST").uri("/webhooks/razorpay");
    if let Some(signature) = signature {
        builder = builder.header("x-razorpay-signature", signature);
    }
    builder.body(Body::from(body.to_vec())).unwrap()
}

/// Access token for `user_id`, signed the way Supabase signs them
pub fn bearer(user_id: Uuid) -> String {
    let claims = Claims {
        sub: user_id,
        exp: Utc::now().timestamp() + 3600,
        email: None,
        aud: "authenticated".to_string(),
    };
    let secret = test_config().jwt_secret;
    let token = encode(&Header::default(), &claims, &EncodingKey::from_secret(secret.as_bytes())).unwrap();
    format!("Bearer {}", token)
}

/// Pool on `DATABASE_URL` with the schema applied.
///
/// Returns `None` when the variable is unset so database tests pass as
/// skipped on machines without Postgres.
pub async fn database() -> Option<PgPool> {
    let Ok(url) = std::env::var("DATABASE_URL") else {
        eprintln!("DATABASE_URL not set, skipping database test");
        return None;
    };
    let pool = PgPoolOptions::new()
        .max_connections(5)
        .connect(&url)
        .await
        .unwrap();
    sqlx::migrate!("./migrations").run(&pool).await.unwrap();
    Some(pool)
}

pub fn state(pool: PgPool) -> AppState {
    AppState::new(pool, test_config())
}

pub fn order_id() -> String {
    format!("order_{}", Uuid::new_v4().simple())
}

pub fn today() -> NaiveDate {
    Utc::now().date_naive()
}

/// A fresh cabin with a single seat
pub struct SeatFixture {
    pub cabin_id: Uuid,
    pub seat_id: Uuid,
}

pub async fn seed_seat(pool: &PgPool, partner_id: Option<Uuid>, price: Decimal) -> SeatFixture {
    let cabin_id: Uuid = sqlx::query_scalar(
        "INSERT INTO cabins (name, partner_id) VALUES ($1, $2) RETURNING id",
    )
    .bind(format!("Reading Room {}", Uuid::new_v4().simple()))
    .bind(partner_id)
    .fetch_one(pool)
    .await
    .unwrap();

    let seat_id: Uuid = sqlx::query_scalar(
        "INSERT INTO seats (cabin_id, number, price) VALUES ($1, 1, $2) RETURNING id",
    )
    .bind(cabin_id)
    .bind(price)
    .fetch_one(pool)
    .await
    .unwrap();

    SeatFixture { cabin_id, seat_id }
}

/// Booking row written straight to the table
pub struct SeededBooking {
    pub user_id: Uuid,
    pub status: &'static str,
    pub start: NaiveDate,
    pub months: u32,
    pub total: Decimal,
    pub order_id: Option<String>,
    pub age_minutes: i32,
    pub settled_due_ids: Vec<Uuid>,
    pub renewed_from: Option<Uuid>,
}

impl SeededBooking {
    /// One month from today, 2950 payable, just created
    pub fn pending(user_id: Uuid) -> Self {
        Self {
            user_id,
            status: "pending",
            start: today(),
            months: 1,
            total: Decimal::new(2950, 0),
            order_id: None,
            age_minutes: 0,
            settled_due_ids: Vec::new(),
            renewed_from: None,
        }
    }

    pub async fn insert(self, pool: &PgPool, seat: &SeatFixture) -> Uuid {
        let end = self.start.checked_add_months(Months::new(self.months)).unwrap();
        sqlx::query_scalar(
            r#"
            INSERT INTO bookings (
                user_id, cabin_id, seat_id, start_date, end_date, months,
                total_price, settled_due_ids, renewed_from, status,
                razorpay_order_id, created_at
            ) VALUES (
                $1, $2, $3, $4, $5, $6, $7, $8, $9, $10, $11,
                now() - make_interval(mins => $12)
            )
            RETURNING id
            "#,
        )
        .bind(self.user_id)
        .bind(seat.cabin_id)
        .bind(seat.seat_id)
        .bind(self.start)
        .bind(end)
        .bind(self.months as i32)
        .bind(self.total)
        .bind(&self.settled_due_ids)
        .bind(self.renewed_from)
        .bind(self.status)
        .bind(self.order_id)
        .bind(self.age_minutes)
        .fetch_one(pool)
        .await
        .unwrap()
    }
}

pub async fn booking_status(pool: &PgPool, booking_id: Uuid) -> String {
    sqlx::query_scalar("SELECT status FROM bookings WHERE id = $1")
        .bind(booking_id)
        .fetch_one(pool)
        .await
        .unwrap()
}
