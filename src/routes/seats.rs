//! Seat map handlers

use axum::{
    extract::{Path, State},
    Json,
};
use rust_decimal::Decimal;
use serde::Deserialize;
use tracing::{debug, info};
use uuid::Uuid;

use crate::auth::{AuthUser, Permission, Role};
use crate::db;
use crate::error::{ApiResponse, AppError, Result};
use crate::models::Seat;
use crate::AppState;

/// GET /api/v1/cabins/:id/seats
///
/// Served from the seat cache; a miss loads the cabin from the database.
pub async fn list(
    State(state): State<AppState>,
    Path(cabin_id): Path<Uuid>,
) -> Result<Json<ApiResponse<Vec<Seat>>>> {
    if let Some(seats) = state.cache.seats.get(&cabin_id).await {
        debug!("Seat cache hit for cabin: {}", cabin_id);
        return Ok(ApiResponse::ok(seats.as_ref().clone()));
    }

    // Unknown or inactive cabins are a 404, not an empty map
    db::get_cabin(&state.db, cabin_id).await?;

    let seats = db::get_cabin_seats(&state.db, cabin_id).await?;
    state.cache.put_seats(cabin_id, seats.clone()).await;

    Ok(ApiResponse::ok(seats))
}

#[derive(Debug, Deserialize)]
pub struct UpdateSeatRequest {
    #[serde(default, with = "rust_decimal::serde::str_option")]
    pub price: Option<Decimal>,
    #[serde(default)]
    pub is_available: Option<bool>,
}

/// PATCH /api/v1/seats/:id
///
/// Vendors reprice or close seats in cabins they own.
pub async fn update(
    State(state): State<AppState>,
    user: AuthUser,
    Path(seat_id): Path<Uuid>,
    Json(req): Json<UpdateSeatRequest>,
) -> Result<Json<ApiResponse<Seat>>> {
    user.require(Permission::ManageOwnProperty)?;

    if req.price.is_none() && req.is_available.is_none() {
        return Err(AppError::Validation("Nothing to update".to_string()));
    }
    if let Some(price) = req.price {
        if price < Decimal::ZERO {
            return Err(AppError::Validation("price must not be negative".to_string()));
        }
    }

    let seat = db::get_seat(&state.db, seat_id).await?;
    if user.role != Role::SuperAdmin && !db::can_manage_cabin(&state.db, seat.cabin_id, user.user_id).await? {
        return Err(AppError::Forbidden);
    }

    let seat = db::update_seat(&state.db, seat_id, req.price, req.is_available).await?;
    info!(
        seat_id = %seat.id,
        cabin_id = %seat.cabin_id,
        price = %seat.price,
        is_available = seat.is_available,
        "Seat updated"
    );

    state.cache.invalidate_cabin(seat.cabin_id).await;
    Ok(ApiResponse::ok(seat))
}
