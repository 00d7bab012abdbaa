//! Inhale Stays booking and pricing API
//!
//! Reading-room seat bookings for students: price quotes, renewals with
//! coupons and outstanding dues, Razorpay checkout, vendor onboarding and
//! admin reports.

pub mod auth;
pub mod bookings;
pub mod cache;
pub mod config;
pub mod db;
pub mod error;
pub mod models;
pub mod pagination;
pub mod payments;
pub mod pricing;
pub mod receipts;
pub mod reports;
pub mod routes;

use axum::{
    routing::{get, post},
    Router,
};
use sqlx::PgPool;
use std::sync::Arc;
use tower_http::{
    compression::CompressionLayer,
    cors::{Any, CorsLayer},
    timeout::TimeoutLayer,
    trace::TraceLayer,
};

use crate::auth::TokenVerifier;
use crate::cache::AppCache;
use crate::config::Config;
use crate::payments::RazorpayClient;

/// Application state shared across handlers
#[derive(Clone)]
pub struct AppState {
    pub db: PgPool,
    pub cache: AppCache,
    pub tokens: TokenVerifier,
    pub razorpay: RazorpayClient,
    pub config: Arc<Config>,
}

impl AppState {
    pub fn new(db: PgPool, config: Config) -> Self {
        Self {
            cache: AppCache::new(config.seat_cache_path.clone()),
            tokens: TokenVerifier::new(&config.jwt_secret),
            razorpay: RazorpayClient::new(config.razorpay.clone()),
            config: Arc::new(config),
            db,
        }
    }
}

/// Build the application router
pub fn build_router(state: AppState) -> Router {
    let api_v1 = Router::new()
        .merge(pricing::router())
        .merge(routes::api_router());

    Router::new()
        .nest("/api/v1", api_v1)
        .route("/webhooks/razorpay", post(routes::payments::razorpay_webhook))
        .layer(TimeoutLayer::new(state.config.request_timeout))
        .layer(CompressionLayer::new())
        .layer(
            CorsLayer::new()
                .allow_origin(Any)
                .allow_methods(Any)
                .allow_headers(Any),
        )
        .layer(TraceLayer::new_for_http())
        // Health check stays outside the timeout
        .route("/health", get(routes::health::health))
        .with_state(state)
}
