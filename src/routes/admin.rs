//! Platform reports for admins

use axum::{
    extract::{Query, State},
    Json,
};
use chrono::{DateTime, Duration, NaiveDate, Utc};
use serde::Deserialize;

use crate::auth::{AuthUser, Permission};
use crate::db;
use crate::error::{ApiResponse, AppError, Result};
use crate::models::Booking;
use crate::pagination::{PaginatedResponse, PaginationParams};
use crate::reports::{occupancy_by_cabin, revenue_by_month, CabinOccupancy, MonthlyRevenue};
use crate::AppState;

#[derive(Debug, Deserialize)]
pub struct RevenueQuery {
    pub from: Option<NaiveDate>,
    pub to: Option<NaiveDate>,
}

impl RevenueQuery {
    /// `[from, to)` as timestamps; defaults to the last 365 days
    fn range(&self, now: DateTime<Utc>) -> Result<(DateTime<Utc>, DateTime<Utc>)> {
        let to = match self.to {
            Some(day) => start_of(day + Duration::days(1)),
            None => now,
        };
        let from = match self.from {
            Some(day) => start_of(day),
            None => to - Duration::days(365),
        };

        if from >= to {
            return Err(AppError::Validation("from must be before to".to_string()));
        }
        Ok((from, to))
    }
}

fn start_of(day: NaiveDate) -> DateTime<Utc> {
    day.and_time(chrono::NaiveTime::MIN).and_utc()
}

#[derive(Debug, Deserialize)]
pub struct OccupancyQuery {
    pub date: Option<NaiveDate>,
    pub page: Option<u32>,
    pub per_page: Option<u32>,
}

/// GET /api/v1/admin/reports/revenue
pub async fn revenue(
    State(state): State<AppState>,
    user: AuthUser,
    Query(query): Query<RevenueQuery>,
) -> Result<Json<ApiResponse<Vec<MonthlyRevenue>>>> {
    user.require(Permission::ViewPlatformReports)?;

    let (from, to) = query.range(Utc::now())?;
    let bookings = db::get_completed_bookings_between(&state.db, from, to).await?;

    Ok(ApiResponse::ok(revenue_by_month(&bookings)))
}

/// GET /api/v1/admin/reports/occupancy
pub async fn occupancy(
    State(state): State<AppState>,
    user: AuthUser,
    Query(query): Query<OccupancyQuery>,
) -> Result<Json<ApiResponse<PaginatedResponse<CabinOccupancy>>>> {
    user.require(Permission::ViewPlatformReports)?;

    let day = query.date.unwrap_or_else(|| Utc::now().date_naive());
    let cabins = db::get_active_cabins(&state.db).await?;
    let seat_counts = db::count_seats_by_cabin(&state.db).await?;
    let active = db::get_bookings_active_on(&state.db, day).await?;

    let rows = occupancy_by_cabin(&cabins, &seat_counts, &active);
    let params = PaginationParams {
        page: query.page,
        per_page: query.per_page,
    };
    Ok(ApiResponse::ok(PaginatedResponse::from_all(rows, &params)))
}

/// GET /api/v1/admin/payments/refunds
///
/// Paid bookings that lost their seat and are waiting for a refund.
pub async fn refunds(
    State(state): State<AppState>,
    user: AuthUser,
) -> Result<Json<ApiResponse<Vec<Booking>>>> {
    user.require(Permission::ViewPlatformReports)?;

    let bookings = db::get_refund_due_bookings(&state.db).await?;
    Ok(ApiResponse::ok(bookings))
}
