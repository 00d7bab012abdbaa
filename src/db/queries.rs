//! Database queries for inventory, bookings, receipts and partners

use chrono::{DateTime, NaiveDate, Utc};
use rust_decimal::Decimal;
use sqlx::{PgExecutor, PgPool};
use std::collections::HashMap;
use uuid::Uuid;

use crate::error::{AppError, Result};
use crate::models::{Booking, BookingStatus, Cabin, NewBooking, Partner, PartnerStatus, Receipt, Seat};

const BOOKING_COLUMNS: &str = r#"
    id, user_id, cabin_id, seat_id, start_date, end_date, months,
    total_price, discount_amount, due_amount_included, settled_due_ids,
    coupon_id, renewed_from, status, razorpay_order_id, razorpay_payment_id, created_at
"#;

const PARTNER_COLUMNS: &str = r#"
    id, user_id, business_name, contact_email, phone, address,
    status, rejection_reason, created_at, reviewed_at
"#;

/// Get an active cabin by id
pub async fn get_cabin(pool: &PgPool, cabin_id: Uuid) -> Result<Cabin> {
    sqlx::query_as::<_, Cabin>(
        r#"
        SELECT id, name, partner_id, is_active, created_at
        FROM cabins
        WHERE id = $1 AND is_active = true
        "#,
    )
    .bind(cabin_id)
    .fetch_optional(pool)
    .await?
    .ok_or_else(|| AppError::NotFound("Cabin".to_string()))
}

/// Get all seats of a cabin, ordered by seat number.
///
/// `is_available` is false for seats the vendor disabled and for seats held
/// by a paid booking today.
pub async fn get_cabin_seats(pool: &PgPool, cabin_id: Uuid) -> Result<Vec<Seat>> {
    let seats = sqlx::query_as::<_, Seat>(
        r#"
        SELECT s.id, s.cabin_id, s.number, s.price,
               s.is_available AND NOT EXISTS (
                   SELECT 1 FROM bookings b
                   WHERE b.seat_id = s.id
                     AND b.status = 'completed'
                     AND b.start_date <= CURRENT_DATE
                     AND b.end_date > CURRENT_DATE
               ) AS is_available
        FROM seats s
        WHERE s.cabin_id = $1
        ORDER BY s.number
        "#,
    )
    .bind(cabin_id)
    .fetch_all(pool)
    .await?;

    Ok(seats)
}

/// Get every seat of every active cabin (for cache warming)
pub async fn get_all_active_seats(pool: &PgPool) -> Result<Vec<Seat>> {
    let seats = sqlx::query_as::<_, Seat>(
        r#"
        SELECT s.id, s.cabin_id, s.number, s.price,
               s.is_available AND NOT EXISTS (
                   SELECT 1 FROM bookings b
                   WHERE b.seat_id = s.id
                     AND b.status = 'completed'
                     AND b.start_date <= CURRENT_DATE
                     AND b.end_date > CURRENT_DATE
               ) AS is_available
        FROM seats s
        JOIN cabins c ON c.id = s.cabin_id
        WHERE c.is_active = true
        ORDER BY s.cabin_id, s.number
        "#,
    )
    .fetch_all(pool)
    .await?;

    Ok(seats)
}

/// Get a seat by id
pub async fn get_seat(pool: &PgPool, seat_id: Uuid) -> Result<Seat> {
    sqlx::query_as::<_, Seat>(
        r#"
        SELECT id, cabin_id, number, price, is_available
        FROM seats
        WHERE id = $1
        "#,
    )
    .bind(seat_id)
    .fetch_optional(pool)
    .await?
    .ok_or_else(|| AppError::NotFound("Seat".to_string()))
}

/// Lock a seat row until the surrounding transaction ends.
///
/// Serializes checkouts for the same seat so the overlap check and the
/// insert that follows it see a consistent picture.
pub async fn lock_seat<'e>(executor: impl PgExecutor<'e>, seat_id: Uuid) -> Result<()> {
    sqlx::query("SELECT id FROM seats WHERE id = $1 FOR UPDATE")
        .bind(seat_id)
        .fetch_optional(executor)
        .await?
        .ok_or_else(|| AppError::NotFound("Seat".to_string()))?;

    Ok(())
}

/// Update a seat's price and/or vendor availability flag
pub async fn update_seat(
    pool: &PgPool,
    seat_id: Uuid,
    price: Option<Decimal>,
    is_available: Option<bool>,
) -> Result<Seat> {
    sqlx::query_as::<_, Seat>(
        r#"
        UPDATE seats
        SET price = COALESCE($2, price),
            is_available = COALESCE($3, is_available)
        WHERE id = $1
        RETURNING id, cabin_id, number, price, is_available
        "#,
    )
    .bind(seat_id)
    .bind(price)
    .bind(is_available)
    .fetch_optional(pool)
    .await?
    .ok_or_else(|| AppError::NotFound("Seat".to_string()))
}

/// Number of seats in each active cabin
pub async fn count_seats_by_cabin(pool: &PgPool) -> Result<HashMap<Uuid, i64>> {
    let rows: Vec<(Uuid, i64)> = sqlx::query_as(
        r#"
        SELECT s.cabin_id, COUNT(*)
        FROM seats s
        JOIN cabins c ON c.id = s.cabin_id
        WHERE c.is_active = true
        GROUP BY s.cabin_id
        "#,
    )
    .fetch_all(pool)
    .await?;

    Ok(rows.into_iter().collect())
}

/// Whether `user_id` runs, or works for, the approved partner that owns a cabin
pub async fn can_manage_cabin(pool: &PgPool, cabin_id: Uuid, user_id: Uuid) -> Result<bool> {
    let owned: bool = sqlx::query_scalar(
        r#"
        SELECT EXISTS (
            SELECT 1
            FROM cabins c
            JOIN partners p ON p.id = c.partner_id
            WHERE c.id = $1
              AND p.status = 'approved'
              AND (
                  p.user_id = $2
                  OR EXISTS (
                      SELECT 1 FROM partner_employees e
                      WHERE e.partner_id = p.id AND e.user_id = $2
                  )
              )
        )
        "#,
    )
    .bind(cabin_id)
    .bind(user_id)
    .fetch_one(pool)
    .await?;

    Ok(owned)
}

/// Count bookings holding a seat anywhere in `[start, end)`.
///
/// Completed bookings always hold the seat. Pending ones hold it while they
/// are younger than `pending_cutoff`; with no cutoff they are ignored.
/// `exclude` leaves one booking out of the count.
pub async fn count_overlapping_bookings<'e>(
    executor: impl PgExecutor<'e>,
    seat_id: Uuid,
    start: NaiveDate,
    end: NaiveDate,
    pending_cutoff: Option<DateTime<Utc>>,
    exclude: Option<Uuid>,
) -> Result<i64> {
    let count: i64 = sqlx::query_scalar(
        r#"
        SELECT COUNT(*)
        FROM bookings
        WHERE seat_id = $1
          AND start_date < $3
          AND end_date > $2
          AND (
              status = 'completed'
              OR ($4::timestamptz IS NOT NULL AND status = 'pending' AND created_at > $4)
          )
          AND ($5::uuid IS NULL OR id <> $5)
        "#,
    )
    .bind(seat_id)
    .bind(start)
    .bind(end)
    .bind(pending_cutoff)
    .bind(exclude)
    .fetch_one(executor)
    .await?;

    Ok(count)
}

/// Insert a pending booking
pub async fn insert_booking<'e>(executor: impl PgExecutor<'e>, booking: &NewBooking) -> Result<Booking> {
    let sql = format!(
        r#"
        INSERT INTO bookings (
            user_id, cabin_id, seat_id, start_date, end_date, months,
            total_price, discount_amount, due_amount_included, settled_due_ids,
            coupon_id, renewed_from, status
        ) VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10, $11, $12, $13)
        RETURNING {}
        "#,
        BOOKING_COLUMNS
    );

    let row = sqlx::query_as::<_, Booking>(&sql)
        .bind(booking.user_id)
        .bind(booking.cabin_id)
        .bind(booking.seat_id)
        .bind(booking.start_date)
        .bind(booking.end_date)
        .bind(booking.months as i32)
        .bind(booking.total_price)
        .bind(booking.discount_amount)
        .bind(booking.due_amount_included)
        .bind(&booking.settled_due_ids)
        .bind(booking.coupon_id)
        .bind(booking.renewed_from)
        .bind(BookingStatus::Pending.as_str())
        .fetch_one(executor)
        .await?;

    Ok(row)
}

/// Attach the gateway order to a booking
pub async fn set_booking_order(pool: &PgPool, booking_id: Uuid, order_id: &str) -> Result<()> {
    sqlx::query("UPDATE bookings SET razorpay_order_id = $2 WHERE id = $1")
        .bind(booking_id)
        .bind(order_id)
        .execute(pool)
        .await?;

    Ok(())
}

/// Get a booking by id
pub async fn get_booking<'e>(executor: impl PgExecutor<'e>, booking_id: Uuid) -> Result<Booking> {
    let sql = format!("SELECT {} FROM bookings WHERE id = $1", BOOKING_COLUMNS);

    sqlx::query_as::<_, Booking>(&sql)
        .bind(booking_id)
        .fetch_optional(executor)
        .await?
        .ok_or_else(|| AppError::NotFound("Booking".to_string()))
}

/// Find the booking a gateway order was created for
pub async fn find_booking_by_order<'e>(
    executor: impl PgExecutor<'e>,
    order_id: &str,
) -> Result<Option<Booking>> {
    let sql = format!(
        "SELECT {} FROM bookings WHERE razorpay_order_id = $1",
        BOOKING_COLUMNS
    );

    let booking = sqlx::query_as::<_, Booking>(&sql)
        .bind(order_id)
        .fetch_optional(executor)
        .await?;

    Ok(booking)
}

/// Record a payment against an unpaid booking, moving it to `to`.
///
/// Only pending, failed or cancelled bookings are updated; returns `None`
/// for any other state.
pub async fn record_booking_payment<'e>(
    executor: impl PgExecutor<'e>,
    booking_id: Uuid,
    payment_id: &str,
    to: BookingStatus,
) -> Result<Option<Booking>> {
    let sql = format!(
        r#"
        UPDATE bookings
        SET status = $3, razorpay_payment_id = $2
        WHERE id = $1 AND status IN ('pending', 'failed', 'cancelled')
        RETURNING {}
        "#,
        BOOKING_COLUMNS
    );

    let booking = sqlx::query_as::<_, Booking>(&sql)
        .bind(booking_id)
        .bind(payment_id)
        .bind(to.as_str())
        .fetch_optional(executor)
        .await?;

    Ok(booking)
}

/// Bookings whose payment was captured but could not be honoured
pub async fn get_refund_due_bookings(pool: &PgPool) -> Result<Vec<Booking>> {
    let sql = format!(
        "SELECT {} FROM bookings WHERE status = 'refund_due' ORDER BY created_at",
        BOOKING_COLUMNS
    );

    let bookings = sqlx::query_as::<_, Booking>(&sql).fetch_all(pool).await?;

    Ok(bookings)
}

/// Mark the pending booking behind a gateway order as failed
pub async fn fail_booking_for_order(pool: &PgPool, order_id: &str) -> Result<u64> {
    let result = sqlx::query(
        r#"
        UPDATE bookings
        SET status = 'failed'
        WHERE razorpay_order_id = $1 AND status = 'pending'
        "#,
    )
    .bind(order_id)
    .execute(pool)
    .await?;

    Ok(result.rows_affected())
}

/// Mark a pending booking as failed (gateway order could not be created)
pub async fn fail_booking(pool: &PgPool, booking_id: Uuid) -> Result<()> {
    sqlx::query("UPDATE bookings SET status = 'failed' WHERE id = $1 AND status = 'pending'")
        .bind(booking_id)
        .execute(pool)
        .await?;

    Ok(())
}

/// Get a user's bookings, newest first
pub async fn get_user_bookings(
    pool: &PgPool,
    user_id: Uuid,
    limit: i64,
    offset: i64,
) -> Result<Vec<Booking>> {
    let sql = format!(
        r#"
        SELECT {}
        FROM bookings
        WHERE user_id = $1
        ORDER BY created_at DESC
        LIMIT $2 OFFSET $3
        "#,
        BOOKING_COLUMNS
    );

    let bookings = sqlx::query_as::<_, Booking>(&sql)
        .bind(user_id)
        .bind(limit)
        .bind(offset)
        .fetch_all(pool)
        .await?;

    Ok(bookings)
}

/// Count a user's bookings (for pagination)
pub async fn count_user_bookings(pool: &PgPool, user_id: Uuid) -> Result<i64> {
    let count: i64 = sqlx::query_scalar("SELECT COUNT(*) FROM bookings WHERE user_id = $1")
        .bind(user_id)
        .fetch_one(pool)
        .await?;

    Ok(count)
}

/// Completed bookings created in `[from, to)` (for reports)
pub async fn get_completed_bookings_between(
    pool: &PgPool,
    from: DateTime<Utc>,
    to: DateTime<Utc>,
) -> Result<Vec<Booking>> {
    let sql = format!(
        r#"
        SELECT {}
        FROM bookings
        WHERE status = 'completed'
          AND created_at >= $1
          AND created_at < $2
        ORDER BY created_at
        "#,
        BOOKING_COLUMNS
    );

    let bookings = sqlx::query_as::<_, Booking>(&sql)
        .bind(from)
        .bind(to)
        .fetch_all(pool)
        .await?;

    Ok(bookings)
}

/// Completed bookings covering `day` (for occupancy)
pub async fn get_bookings_active_on(pool: &PgPool, day: NaiveDate) -> Result<Vec<Booking>> {
    let sql = format!(
        r#"
        SELECT {}
        FROM bookings
        WHERE status = 'completed'
          AND start_date <= $1
          AND end_date > $1
        "#,
        BOOKING_COLUMNS
    );

    let bookings = sqlx::query_as::<_, Booking>(&sql)
        .bind(day)
        .fetch_all(pool)
        .await?;

    Ok(bookings)
}

/// Get all active cabins
pub async fn get_active_cabins(pool: &PgPool) -> Result<Vec<Cabin>> {
    let cabins = sqlx::query_as::<_, Cabin>(
        r#"
        SELECT id, name, partner_id, is_active, created_at
        FROM cabins
        WHERE is_active = true
        ORDER BY name
        "#,
    )
    .fetch_all(pool)
    .await?;

    Ok(cabins)
}

/// Insert the receipt for a paid booking
pub async fn insert_receipt<'e>(
    executor: impl PgExecutor<'e>,
    booking_id: Uuid,
    receipt_number: &str,
    amount: Decimal,
    payment_id: &str,
) -> Result<Receipt> {
    let receipt = sqlx::query_as::<_, Receipt>(
        r#"
        INSERT INTO receipts (booking_id, receipt_number, amount, razorpay_payment_id)
        VALUES ($1, $2, $3, $4)
        RETURNING id, booking_id, receipt_number, amount, razorpay_payment_id, created_at
        "#,
    )
    .bind(booking_id)
    .bind(receipt_number)
    .bind(amount)
    .bind(payment_id)
    .fetch_one(executor)
    .await?;

    Ok(receipt)
}

/// Get the receipt issued for a booking
pub async fn get_receipt_for_booking<'e>(
    executor: impl PgExecutor<'e>,
    booking_id: Uuid,
) -> Result<Option<Receipt>> {
    let receipt = sqlx::query_as::<_, Receipt>(
        r#"
        SELECT id, booking_id, receipt_number, amount, razorpay_payment_id, created_at
        FROM receipts
        WHERE booking_id = $1
        "#,
    )
    .bind(booking_id)
    .fetch_optional(executor)
    .await?;

    Ok(receipt)
}

/// Get the role assigned to a user
pub async fn get_user_role(pool: &PgPool, user_id: Uuid) -> Result<Option<String>> {
    let role: Option<String> =
        sqlx::query_scalar("SELECT role FROM user_roles WHERE user_id = $1 LIMIT 1")
            .bind(user_id)
            .fetch_optional(pool)
            .await?;

    Ok(role)
}

/// Store a new partner application
pub async fn insert_partner(
    pool: &PgPool,
    user_id: Uuid,
    business_name: &str,
    contact_email: &str,
    phone: &str,
    address: &str,
) -> Result<Partner> {
    let sql = format!(
        r#"
        INSERT INTO partners (user_id, business_name, contact_email, phone, address, status)
        VALUES ($1, $2, $3, $4, $5, $6)
        RETURNING {}
        "#,
        PARTNER_COLUMNS
    );

    let partner = sqlx::query_as::<_, Partner>(&sql)
        .bind(user_id)
        .bind(business_name)
        .bind(contact_email)
        .bind(phone)
        .bind(address)
        .bind(PartnerStatus::Pending.as_str())
        .fetch_one(pool)
        .await?;

    Ok(partner)
}

/// Get partners in a given review state, oldest first
pub async fn get_partners_by_status(pool: &PgPool, status: PartnerStatus) -> Result<Vec<Partner>> {
    let sql = format!(
        "SELECT {} FROM partners WHERE status = $1 ORDER BY created_at",
        PARTNER_COLUMNS
    );

    let partners = sqlx::query_as::<_, Partner>(&sql)
        .bind(status.as_str())
        .fetch_all(pool)
        .await?;

    Ok(partners)
}

/// Get a partner by id
pub async fn get_partner<'e>(executor: impl PgExecutor<'e>, partner_id: Uuid) -> Result<Partner> {
    let sql = format!("SELECT {} FROM partners WHERE id = $1", PARTNER_COLUMNS);

    sqlx::query_as::<_, Partner>(&sql)
        .bind(partner_id)
        .fetch_optional(executor)
        .await?
        .ok_or_else(|| AppError::NotFound("Partner".to_string()))
}

/// Record a review decision. Only updates if the partner is still in `from`.
pub async fn update_partner_status<'e>(
    executor: impl PgExecutor<'e>,
    partner_id: Uuid,
    from: PartnerStatus,
    to: PartnerStatus,
    rejection_reason: Option<&str>,
) -> Result<Option<Partner>> {
    let sql = format!(
        r#"
        UPDATE partners
        SET status = $3, rejection_reason = $4, reviewed_at = now()
        WHERE id = $1 AND status = $2
        RETURNING {}
        "#,
        PARTNER_COLUMNS
    );

    let partner = sqlx::query_as::<_, Partner>(&sql)
        .bind(partner_id)
        .bind(from.as_str())
        .bind(to.as_str())
        .bind(rejection_reason)
        .fetch_optional(executor)
        .await?;

    Ok(partner)
}

/// Give an approved partner's user the vendor role
pub async fn grant_vendor_role<'e>(executor: impl PgExecutor<'e>, user_id: Uuid) -> Result<()> {
    sqlx::query(
        r#"
        INSERT INTO user_roles (user_id, role)
        VALUES ($1, 'vendor')
        ON CONFLICT (user_id) DO UPDATE SET role = 'vendor'
        "#,
    )
    .bind(user_id)
    .execute(executor)
    .await?;

    Ok(())
}
