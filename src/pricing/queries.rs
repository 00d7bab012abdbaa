//! Database queries for coupons and dues.

use chrono::{DateTime, Utc};
use sqlx::{PgExecutor, PgPool};
use uuid::Uuid;

use crate::error::AppError;

use super::models::{Coupon, Due};

/// Find a coupon by code (case-insensitive)
pub async fn find_coupon_by_code(pool: &PgPool, code: &str) -> Result<Option<Coupon>, AppError> {
    let coupon = sqlx::query_as::<_, Coupon>(
        r#"
        SELECT
            id, code, discount_type, value,
            max_discount_amount, min_order_amount,
            usage_limit, usage_count, is_active,
            start_date, end_date
        FROM coupons
        WHERE upper(code) = upper($1)
        "#,
    )
    .bind(code.trim())
    .fetch_optional(pool)
    .await?;

    Ok(coupon)
}

/// Count one more use of a coupon, unless that would pass its usage limit.
///
/// Returns false when the coupon is already at its limit.
pub async fn increment_coupon_usage<'e>(
    executor: impl PgExecutor<'e>,
    coupon_id: Uuid,
) -> Result<bool, AppError> {
    let result = sqlx::query(
        r#"
        UPDATE coupons
        SET usage_count = usage_count + 1
        WHERE id = $1
          AND (usage_limit IS NULL OR usage_count < usage_limit)
        "#,
    )
    .bind(coupon_id)
    .execute(executor)
    .await?;

    Ok(result.rows_affected() == 1)
}

/// Lock a coupon row and return `(usage_count, usage_limit)`
pub async fn lock_coupon_usage<'e>(
    executor: impl PgExecutor<'e>,
    coupon_id: Uuid,
) -> Result<Option<(i32, Option<i32>)>, AppError> {
    let usage = sqlx::query_as::<_, (i32, Option<i32>)>(
        "SELECT usage_count, usage_limit FROM coupons WHERE id = $1 FOR UPDATE",
    )
    .bind(coupon_id)
    .fetch_optional(executor)
    .await?;

    Ok(usage)
}

/// Unpaid bookings created after `pending_cutoff` that carry a coupon
pub async fn count_pending_coupon_holds<'e>(
    executor: impl PgExecutor<'e>,
    coupon_id: Uuid,
    pending_cutoff: DateTime<Utc>,
) -> Result<i64, AppError> {
    let count: i64 = sqlx::query_scalar(
        r#"
        SELECT COUNT(*)
        FROM bookings
        WHERE coupon_id = $1
          AND status = 'pending'
          AND created_at > $2
        "#,
    )
    .bind(coupon_id)
    .bind(pending_cutoff)
    .fetch_one(executor)
    .await?;

    Ok(count)
}

/// Unpaid dues attached to a booking
pub async fn find_open_dues_for_booking(pool: &PgPool, booking_id: Uuid) -> Result<Vec<Due>, AppError> {
    let dues = sqlx::query_as::<_, Due>(
        r#"
        SELECT id, user_id, booking_id, due_amount, paid_amount, status, due_date
        FROM dues
        WHERE booking_id = $1
          AND status <> 'paid'
        ORDER BY due_date NULLS LAST
        "#,
    )
    .bind(booking_id)
    .fetch_all(pool)
    .await?;

    Ok(dues)
}

/// Mark the given dues as paid in full
pub async fn settle_dues<'e>(
    executor: impl PgExecutor<'e>,
    due_ids: &[Uuid],
) -> Result<u64, AppError> {
    let result = sqlx::query(
        r#"
        UPDATE dues
        SET paid_amount = due_amount, status = 'paid'
        WHERE id = ANY($1)
          AND status <> 'paid'
        "#,
    )
    .bind(due_ids)
    .execute(executor)
    .await?;

    Ok(result.rows_affected())
}
