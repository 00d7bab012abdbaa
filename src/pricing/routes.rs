//! Pricing API route handlers.

use axum::{
    extract::{Path, Query, State},
    routing::{get, post},
    Json, Router,
};
use chrono::NaiveDate;
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use tracing::debug;
use uuid::Uuid;

use crate::auth::AuthUser;
use crate::db;
use crate::error::{ApiResponse, AppError, Result};
use crate::AppState;

use super::calculators::calculate_price;
use super::plans::{BookingPlan, BOOKING_PLANS, RENEWAL_DURATIONS};
use super::requests::{PriceQuoteRequest, RenewalQuoteRequest, ValidateCouponRequest};
use super::responses::{CouponValidationResponse, PriceQuoteResponse, RenewalQuoteResponse};
use super::services;

/// Longest booking or renewal we quote
pub const MAX_DURATION_MONTHS: u32 = 24;

/// Pricing routes, mounted under `/api/v1`
pub fn router() -> Router<AppState> {
    Router::new()
        .route("/plans", get(list_plans))
        .route("/pricing/quote", post(quote))
        .route("/pricing/renewal", post(renewal_quote))
        .route("/coupons/validate", post(validate_coupon))
        .route("/seats/:id/quote", get(seat_quote))
}

pub(crate) fn validate_duration(months: u32) -> Result<()> {
    if months == 0 {
        return Err(AppError::Validation(
            "duration_months must be at least 1".to_string(),
        ));
    }
    if months > MAX_DURATION_MONTHS {
        return Err(AppError::Validation(format!(
            "duration_months must be at most {}",
            MAX_DURATION_MONTHS
        )));
    }
    Ok(())
}

pub(crate) fn validate_amount(field: &str, amount: Decimal) -> Result<()> {
    if amount < Decimal::ZERO {
        return Err(AppError::Validation(format!("{} must not be negative", field)));
    }
    Ok(())
}

#[derive(Debug, Serialize)]
pub struct PlansResponse {
    pub booking_plans: &'static [BookingPlan],
    pub renewal_durations: &'static [u32],
}

/// GET /api/v1/plans
async fn list_plans() -> Json<ApiResponse<PlansResponse>> {
    ApiResponse::ok(PlansResponse {
        booking_plans: &BOOKING_PLANS,
        renewal_durations: &RENEWAL_DURATIONS,
    })
}

/// POST /api/v1/pricing/quote
async fn quote(Json(req): Json<PriceQuoteRequest>) -> Result<Json<ApiResponse<PriceQuoteResponse>>> {
    validate_duration(req.duration_months)?;
    validate_amount("base_price", req.base_price)?;

    let quote = calculate_price(req.base_price, req.duration_months, req.start_date);
    debug!(
        base_price = %req.base_price,
        months = req.duration_months,
        total = %quote.total,
        "Price quoted"
    );

    Ok(ApiResponse::ok(quote.into()))
}

/// POST /api/v1/pricing/renewal
async fn renewal_quote(
    State(state): State<AppState>,
    Json(req): Json<RenewalQuoteRequest>,
) -> Result<Json<ApiResponse<RenewalQuoteResponse>>> {
    validate_duration(req.duration_months)?;
    validate_amount("monthly_rate", req.monthly_rate)?;

    let outstanding_due = req.outstanding_due.unwrap_or(Decimal::ZERO);
    validate_amount("outstanding_due", outstanding_due)?;

    let quote = services::quote_renewal(
        &state.db,
        req.monthly_rate,
        req.duration_months,
        req.coupon_code.as_deref(),
        outstanding_due,
    )
    .await?;

    let code = quote.coupon.map(|c| c.coupon.code);
    Ok(ApiResponse::ok(RenewalQuoteResponse::new(quote.amount, code)))
}

/// POST /api/v1/coupons/validate
async fn validate_coupon(
    State(state): State<AppState>,
    _user: AuthUser,
    Json(req): Json<ValidateCouponRequest>,
) -> Result<Json<ApiResponse<CouponValidationResponse>>> {
    validate_amount("order_amount", req.order_amount)?;

    let validated = services::validate_coupon(&state.db, &req.code, req.order_amount, None).await?;

    Ok(ApiResponse::ok(CouponValidationResponse {
        code: validated.coupon.code,
        discount_type: validated.terms.discount_type,
        value: validated.terms.value,
        discount: validated.discount,
        amount_after_discount: (req.order_amount - validated.discount).max(Decimal::ZERO),
    }))
}

#[derive(Debug, Deserialize)]
struct SeatQuoteQuery {
    #[serde(default = "default_months")]
    duration_months: u32,
    start_date: Option<NaiveDate>,
}

fn default_months() -> u32 {
    1
}

/// GET /api/v1/seats/:id/quote
async fn seat_quote(
    State(state): State<AppState>,
    Path(seat_id): Path<Uuid>,
    Query(query): Query<SeatQuoteQuery>,
) -> Result<Json<ApiResponse<PriceQuoteResponse>>> {
    validate_duration(query.duration_months)?;

    let seat = db::get_seat(&state.db, seat_id).await?;
    let quote = calculate_price(seat.price, query.duration_months, query.start_date);

    Ok(ApiResponse::ok(quote.into()))
}
