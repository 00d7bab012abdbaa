//! Booking checkout and payment settlement
//!
//! A checkout inserts a `pending` booking inside a transaction that holds the
//! seat row lock, then opens a Razorpay order for the amount due. Payment is
//! confirmed either by the checkout callback or by the webhook; whichever
//! arrives first completes the booking and the other sees the same receipt.
//!
//! A payment that arrives after the hold lapsed still completes the booking
//! if no paid booking took the seat meanwhile. Otherwise the payment is kept
//! on the booking and it is flagged `refund_due`.

use chrono::{Months, NaiveDate, Utc};
use rust_decimal::Decimal;
use serde::Serialize;
use sqlx::PgConnection;
use tracing::{error, info, warn};
use uuid::Uuid;

use crate::auth::{AuthUser, Permission};
use crate::db;
use crate::error::{AppError, Result};
use crate::models::{Booking, BookingStatus, NewBooking, Receipt};
use crate::payments::RazorpayOrder;
use crate::pricing::plans::{find_plan, is_renewal_duration, RENEWAL_DURATIONS};
use crate::pricing::responses::{PriceQuoteResponse, RenewalQuoteResponse};
use crate::pricing::services::{
    ensure_seat_available, open_dues, quote_renewal, reserve_coupon, seat_free_for_payment,
};
use crate::pricing::{calculate_price, queries as pricing_queries, to_paise};
use crate::receipts::{receipt_number, ReceiptView};
use crate::AppState;

/// Payment id recorded when nothing was left to pay after discounts
pub const ZERO_AMOUNT_PAYMENT_ID: &str = "zero_amount";

/// Gateway order the client opens the checkout widget with
#[derive(Debug, Serialize)]
pub struct CheckoutOrder {
    pub key_id: String,
    #[serde(flatten)]
    pub order: RazorpayOrder,
}

/// Result of starting a checkout
#[derive(Debug, Serialize)]
pub struct Checkout {
    pub booking: Booking,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub quote: Option<PriceQuoteResponse>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub renewal: Option<RenewalQuoteResponse>,
    /// Present when the student still has to pay
    #[serde(skip_serializing_if = "Option::is_none")]
    pub order: Option<CheckoutOrder>,
    /// Present when the booking was settled without a payment
    #[serde(skip_serializing_if = "Option::is_none")]
    pub receipt: Option<ReceiptView>,
}

/// How a confirmed gateway payment was applied
#[derive(Debug, Serialize)]
#[serde(tag = "outcome", rename_all = "snake_case")]
pub enum PaymentOutcome {
    /// The booking is paid and holds its seat
    Confirmed(ReceiptView),
    /// The seat went to another paid booking; the payment must be refunded
    RefundDue { booking: Booking },
}

/// End date (exclusive) of a booking starting on `start`
pub fn booking_end(start: NaiveDate, months: u32) -> Result<NaiveDate> {
    start
        .checked_add_months(Months::new(months))
        .ok_or_else(|| AppError::Validation("Booking period out of range".to_string()))
}

/// First day of a renewal: the day the current booking ends, or today if it
/// has already lapsed
pub fn renewal_start(current_end: NaiveDate, today: NaiveDate) -> NaiveDate {
    current_end.max(today)
}

/// Start a checkout for a new booking
pub async fn create_booking(
    state: &AppState,
    user: &AuthUser,
    seat_id: Uuid,
    months: u32,
    start_date: Option<NaiveDate>,
) -> Result<Checkout> {
    user.require(Permission::BookSeat)?;

    let plan = find_plan(months).ok_or_else(|| {
        AppError::Validation(format!("No booking plan lasts {} months", months))
    })?;

    let today = Utc::now().date_naive();
    let start = start_date.unwrap_or(today);
    if start < today {
        return Err(AppError::Validation(
            "start_date must not be in the past".to_string(),
        ));
    }
    let end = booking_end(start, plan.months)?;

    let seat = db::get_seat(&state.db, seat_id).await?;
    if !seat.is_available {
        return Err(AppError::Conflict(format!(
            "Seat {} is not open for booking",
            seat.number
        )));
    }

    let quote = calculate_price(seat.price, plan.months, Some(start));

    let mut tx = state.db.begin().await?;
    db::lock_seat(&mut *tx, seat.id).await?;
    ensure_seat_available(&mut tx, seat.id, start, end).await?;

    let booking = db::insert_booking(
        &mut *tx,
        &NewBooking {
            user_id: user.user_id,
            cabin_id: seat.cabin_id,
            seat_id: seat.id,
            start_date: start,
            end_date: end,
            months: plan.months,
            total_price: quote.total,
            discount_amount: quote.discount,
            due_amount_included: Decimal::ZERO,
            settled_due_ids: Vec::new(),
            coupon_id: None,
            renewed_from: None,
        },
    )
    .await?;
    tx.commit().await?;

    info!(
        booking_id = %booking.id,
        user_id = %user.user_id,
        seat_id = %seat.id,
        plan = plan.id,
        total = %booking.total_price,
        "Booking created"
    );

    let (booking, order, receipt) = open_payment(state, booking).await?;

    Ok(Checkout {
        booking,
        quote: Some(quote.into()),
        renewal: None,
        order,
        receipt,
    })
}

/// Start a checkout extending a paid booking
pub async fn renew_booking(
    state: &AppState,
    user: &AuthUser,
    booking_id: Uuid,
    months: u32,
    coupon_code: Option<&str>,
) -> Result<Checkout> {
    user.require(Permission::BookSeat)?;

    if !is_renewal_duration(months) {
        return Err(AppError::Validation(format!(
            "Renewal must be one of {:?} months",
            RENEWAL_DURATIONS
        )));
    }

    let current = db::get_booking(&state.db, booking_id).await?;
    if current.user_id != user.user_id {
        return Err(AppError::Forbidden);
    }
    if current.status() != Some(BookingStatus::Completed) {
        return Err(AppError::Validation(
            "Only paid bookings can be renewed".to_string(),
        ));
    }

    let seat = db::get_seat(&state.db, current.seat_id).await?;
    let start = renewal_start(current.end_date, Utc::now().date_naive());
    let end = booking_end(start, months)?;

    let dues = open_dues(&state.db, current.id).await?;
    let quote = quote_renewal(&state.db, seat.price, months, coupon_code, dues.total).await?;

    let mut tx = state.db.begin().await?;
    db::lock_seat(&mut *tx, seat.id).await?;
    ensure_seat_available(&mut tx, seat.id, start, end).await?;
    if let Some(validated) = &quote.coupon {
        reserve_coupon(&mut tx, &validated.coupon).await?;
    }

    let booking = db::insert_booking(
        &mut *tx,
        &NewBooking {
            user_id: user.user_id,
            cabin_id: current.cabin_id,
            seat_id: seat.id,
            start_date: start,
            end_date: end,
            months,
            total_price: quote.amount.final_amount,
            discount_amount: quote.amount.discount,
            due_amount_included: quote.amount.outstanding_due,
            settled_due_ids: dues.due_ids,
            coupon_id: quote.coupon.as_ref().map(|c| c.coupon.id),
            renewed_from: Some(current.id),
        },
    )
    .await?;
    tx.commit().await?;

    info!(
        booking_id = %booking.id,
        renewed_from = %current.id,
        months,
        %start,
        discount = %booking.discount_amount,
        dues = %booking.due_amount_included,
        total = %booking.total_price,
        "Renewal created"
    );

    let code = quote.coupon.map(|c| c.coupon.code);
    let renewal = RenewalQuoteResponse::new(quote.amount, code);
    let (booking, order, receipt) = open_payment(state, booking).await?;

    Ok(Checkout {
        booking,
        quote: None,
        renewal: Some(renewal),
        order,
        receipt,
    })
}

/// Create the gateway order for a pending booking, or settle it at once when
/// nothing is payable.
async fn open_payment(
    state: &AppState,
    booking: Booking,
) -> Result<(Booking, Option<CheckoutOrder>, Option<ReceiptView>)> {
    let amount = to_paise(booking.total_price);

    if amount == 0 {
        let mut tx = state.db.begin().await?;
        return match settle(&mut tx, &booking, ZERO_AMOUNT_PAYMENT_ID, Some(0)).await? {
            Settlement::Paid(paid, receipt) => {
                tx.commit().await?;
                state.cache.invalidate_cabin(paid.cabin_id).await;
                Ok((paid, None, Some(ReceiptView::new(receipt)?)))
            }
            Settlement::RefundDue(_) => {
                // Nothing was charged, so release the booking instead
                tx.rollback().await?;
                db::fail_booking(&state.db, booking.id).await?;
                Err(AppError::Conflict(format!(
                    "Seat {} was booked by someone else",
                    booking.seat_id
                )))
            }
        };
    }

    let notes = serde_json::json!({
        "booking_id": booking.id,
        "seat_id": booking.seat_id,
    });
    let receipt = booking.id.simple().to_string();

    match state.razorpay.create_order(amount, &receipt, notes).await {
        Ok(order) => {
            db::set_booking_order(&state.db, booking.id, &order.id).await?;
            let mut booking = booking;
            booking.razorpay_order_id = Some(order.id.clone());

            let order = CheckoutOrder {
                key_id: state.razorpay.key_id().to_string(),
                order,
            };
            Ok((booking, Some(order), None))
        }
        Err(e) => {
            warn!(booking_id = %booking.id, "Releasing booking after order failure: {}", e);
            db::fail_booking(&state.db, booking.id).await?;
            Err(e)
        }
    }
}

/// Apply a verified payment to the booking behind a gateway order.
///
/// `owner` restricts completion to that user's bookings (checkout callback);
/// the webhook passes `None`. `captured_amount` is the amount in paise the
/// gateway reports, when known.
pub async fn complete_payment(
    state: &AppState,
    order_id: &str,
    payment_id: &str,
    owner: Option<Uuid>,
    captured_amount: Option<i64>,
) -> Result<PaymentOutcome> {
    let mut tx = state.db.begin().await?;

    let booking = db::find_booking_by_order(&mut *tx, order_id)
        .await?
        .ok_or_else(|| AppError::NotFound("Booking".to_string()))?;

    if let Some(owner) = owner {
        if booking.user_id != owner {
            return Err(AppError::Forbidden);
        }
    }

    match settle(&mut tx, &booking, payment_id, captured_amount).await? {
        Settlement::Paid(paid, receipt) => {
            tx.commit().await?;
            state.cache.invalidate_cabin(paid.cabin_id).await;
            Ok(PaymentOutcome::Confirmed(ReceiptView::new(receipt)?))
        }
        Settlement::RefundDue(booking) => {
            tx.commit().await?;
            Ok(PaymentOutcome::RefundDue { booking })
        }
    }
}

/// Mark the booking behind a failed gateway order as failed
pub async fn fail_payment(state: &AppState, order_id: &str) -> Result<()> {
    let failed = db::fail_booking_for_order(&state.db, order_id).await?;
    if failed == 0 {
        warn!(order_id, "Payment failure for an order with no pending booking");
    } else {
        info!(order_id, "Booking marked failed");
    }
    Ok(())
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum SettleAction {
    /// Mark paid, issue the receipt
    Complete,
    /// Keep the payment, flag the booking for a refund
    FlagRefund,
    /// Same payment seen before; return what it produced
    Replay,
    /// Different payment for a booking that is already paid
    Reject,
}

fn settle_action(
    status: Option<BookingStatus>,
    recorded_payment: Option<&str>,
    payment_id: &str,
    seat_free: bool,
    amount_matches: bool,
) -> SettleAction {
    match status {
        Some(BookingStatus::Pending | BookingStatus::Failed | BookingStatus::Cancelled) => {
            if seat_free && amount_matches {
                SettleAction::Complete
            } else {
                SettleAction::FlagRefund
            }
        }
        Some(BookingStatus::Completed | BookingStatus::RefundDue)
            if recorded_payment == Some(payment_id) =>
        {
            SettleAction::Replay
        }
        _ => SettleAction::Reject,
    }
}

enum Settlement {
    Paid(Booking, Receipt),
    RefundDue(Booking),
}

async fn settle(
    conn: &mut PgConnection,
    booking: &Booking,
    payment_id: &str,
    captured_amount: Option<i64>,
) -> Result<Settlement> {
    db::lock_seat(&mut *conn, booking.seat_id).await?;
    let booking = db::get_booking(&mut *conn, booking.id).await?;
    let status = booking.status();

    let unpaid = matches!(
        status,
        Some(BookingStatus::Pending | BookingStatus::Failed | BookingStatus::Cancelled)
    );
    let seat_free = unpaid && seat_free_for_payment(&mut *conn, &booking).await?;
    let expected = to_paise(booking.total_price);
    let amount_matches = captured_amount.map_or(true, |amount| amount == expected);

    let action = settle_action(
        status,
        booking.razorpay_payment_id.as_deref(),
        payment_id,
        seat_free,
        amount_matches,
    );

    match action {
        SettleAction::Replay => {
            if status == Some(BookingStatus::RefundDue) {
                return Ok(Settlement::RefundDue(booking));
            }
            let receipt = db::get_receipt_for_booking(&mut *conn, booking.id)
                .await?
                .ok_or_else(|| AppError::Internal(format!("Paid booking {} has no receipt", booking.id)))?;
            Ok(Settlement::Paid(booking, receipt))
        }
        SettleAction::Reject => Err(AppError::Conflict(format!(
            "Booking {} is {} with another payment",
            booking.id, booking.status
        ))),
        SettleAction::FlagRefund => {
            let flagged = db::record_booking_payment(&mut *conn, booking.id, payment_id, BookingStatus::RefundDue)
                .await?
                .ok_or_else(|| AppError::Conflict(format!("Booking {} changed during payment", booking.id)))?;

            error!(
                booking_id = %flagged.id,
                payment_id,
                seat_id = %flagged.seat_id,
                seat_free,
                captured = ?captured_amount,
                expected,
                "Payment cannot be honoured, refund due"
            );
            Ok(Settlement::RefundDue(flagged))
        }
        SettleAction::Complete => {
            let paid = db::record_booking_payment(&mut *conn, booking.id, payment_id, BookingStatus::Completed)
                .await?
                .ok_or_else(|| AppError::Conflict(format!("Booking {} changed during payment", booking.id)))?;

            if let Some(coupon_id) = paid.coupon_id {
                if !pricing_queries::increment_coupon_usage(&mut *conn, coupon_id).await? {
                    warn!(booking_id = %paid.id, %coupon_id, "Coupon passed its usage limit, discount honoured");
                }
            }

            if !paid.settled_due_ids.is_empty() {
                let settled = pricing_queries::settle_dues(&mut *conn, &paid.settled_due_ids).await?;
                info!(booking_id = %paid.id, renewed_from = ?paid.renewed_from, settled, "Dues settled");
            }

            let number = receipt_number(paid.id, Utc::now());
            let receipt = db::insert_receipt(&mut *conn, paid.id, &number, paid.total_price, payment_id).await?;

            info!(
                booking_id = %paid.id,
                payment_id,
                receipt = %receipt.receipt_number,
                amount = %paid.total_price,
                "Booking paid"
            );

            Ok(Settlement::Paid(paid, receipt))
        }
    }
}
