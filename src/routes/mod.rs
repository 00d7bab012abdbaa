//! HTTP route handlers

pub mod admin;
pub mod bookings;
pub mod health;
pub mod payments;
pub mod seats;
pub mod vendors;

use axum::{
    routing::{get, patch, post},
    Router,
};

use crate::AppState;

/// Authenticated and public JSON API, mounted under `/api/v1`
pub fn api_router() -> Router<AppState> {
    Router::new()
        // Inventory
        .route("/cabins/:id/seats", get(seats::list))
        .route("/seats/:id", patch(seats::update))
        // Bookings
        .route("/bookings", get(bookings::list).post(bookings::create))
        .route("/bookings/:id/renew", post(bookings::renew))
        .route("/payments/verify", post(payments::verify))
        // Vendors
        .route("/vendors", post(vendors::apply))
        .route("/admin/vendors/pending", get(vendors::pending))
        .route("/admin/vendors/:id/approve", post(vendors::approve))
        .route("/admin/vendors/:id/reject", post(vendors::reject))
        // Reports
        .route("/admin/reports/revenue", get(admin::revenue))
        .route("/admin/reports/occupancy", get(admin::occupancy))
        .route("/admin/payments/refunds", get(admin::refunds))
}
