//! Booking handlers

use axum::{
    extract::{Path, Query, State},
    http::StatusCode,
    Json,
};
use chrono::NaiveDate;
use serde::Deserialize;
use uuid::Uuid;

use crate::auth::{AuthUser, Permission};
use crate::bookings::{self, Checkout};
use crate::db;
use crate::error::{ApiResponse, Result};
use crate::models::Booking;
use crate::pagination::{PaginatedResponse, PaginationParams};
use crate::AppState;

#[derive(Debug, Deserialize)]
pub struct CreateBookingRequest {
    pub seat_id: Uuid,
    pub duration_months: u32,
    #[serde(default)]
    pub start_date: Option<NaiveDate>,
}

#[derive(Debug, Deserialize)]
pub struct RenewBookingRequest {
    pub duration_months: u32,
    #[serde(default)]
    pub coupon_code: Option<String>,
}

/// POST /api/v1/bookings
pub async fn create(
    State(state): State<AppState>,
    user: AuthUser,
    Json(req): Json<CreateBookingRequest>,
) -> Result<(StatusCode, Json<ApiResponse<Checkout>>)> {
    let checkout =
        bookings::create_booking(&state, &user, req.seat_id, req.duration_months, req.start_date)
            .await?;

    Ok((StatusCode::CREATED, ApiResponse::ok(checkout)))
}

/// POST /api/v1/bookings/:id/renew
pub async fn renew(
    State(state): State<AppState>,
    user: AuthUser,
    Path(booking_id): Path<Uuid>,
    Json(req): Json<RenewBookingRequest>,
) -> Result<(StatusCode, Json<ApiResponse<Checkout>>)> {
    let checkout = bookings::renew_booking(
        &state,
        &user,
        booking_id,
        req.duration_months,
        req.coupon_code.as_deref(),
    )
    .await?;

    Ok((StatusCode::CREATED, ApiResponse::ok(checkout)))
}

/// GET /api/v1/bookings
pub async fn list(
    State(state): State<AppState>,
    user: AuthUser,
    Query(params): Query<PaginationParams>,
) -> Result<Json<ApiResponse<PaginatedResponse<Booking>>>> {
    user.require(Permission::BookSeat)?;

    let items = db::get_user_bookings(
        &state.db,
        user.user_id,
        params.get_limit() as i64,
        params.get_offset() as i64,
    )
    .await?;
    let total = db::count_user_bookings(&state.db, user.user_id).await?;

    Ok(ApiResponse::ok(PaginatedResponse::new(items, &params, total)))
}
