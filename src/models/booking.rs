//! Booking models

use chrono::{DateTime, NaiveDate, Utc};
use rust_decimal::Decimal;
use serde::Serialize;
use sqlx::FromRow;
use uuid::Uuid;

/// Lifecycle of a booking row
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum BookingStatus {
    /// Created, waiting for payment
    Pending,
    /// Paid
    Completed,
    /// Payment failed at the gateway
    Failed,
    Cancelled,
    /// Paid, but the seat had been taken in the meantime; owes a refund
    RefundDue,
}

impl BookingStatus {
    pub const fn as_str(&self) -> &'static str {
        match self {
            Self::Pending => "pending",
            Self::Completed => "completed",
            Self::Failed => "failed",
            Self::Cancelled => "cancelled",
            Self::RefundDue => "refund_due",
        }
    }

    /// Whether a booking in this status holds its seat
    pub const fn holds_seat(&self) -> bool {
        matches!(self, Self::Pending | Self::Completed)
    }
}

impl std::str::FromStr for BookingStatus {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "pending" => Ok(Self::Pending),
            "completed" => Ok(Self::Completed),
            "failed" => Ok(Self::Failed),
            "cancelled" => Ok(Self::Cancelled),
            "refund_due" => Ok(Self::RefundDue),
            other => Err(format!("unknown booking status '{}'", other)),
        }
    }
}

/// Booking from bookings
#[derive(Debug, Clone, FromRow, Serialize)]
pub struct Booking {
    pub id: Uuid,
    pub user_id: Uuid,
    pub cabin_id: Uuid,
    pub seat_id: Uuid,
    pub start_date: NaiveDate,
    pub end_date: NaiveDate,
    pub months: i32,
    #[serde(with = "rust_decimal::serde::str")]
    pub total_price: Decimal,
    #[serde(with = "rust_decimal::serde::str")]
    pub discount_amount: Decimal,
    #[serde(with = "rust_decimal::serde::str")]
    pub due_amount_included: Decimal,
    /// Dues this booking pays off once it is paid
    pub settled_due_ids: Vec<Uuid>,
    pub coupon_id: Option<Uuid>,
    pub renewed_from: Option<Uuid>,
    pub status: String,
    pub razorpay_order_id: Option<String>,
    pub razorpay_payment_id: Option<String>,
    pub created_at: DateTime<Utc>,
}

impl Booking {
    pub fn status(&self) -> Option<BookingStatus> {
        self.status.parse().ok()
    }
}

/// Fields needed to insert a booking
#[derive(Debug, Clone)]
pub struct NewBooking {
    pub user_id: Uuid,
    pub cabin_id: Uuid,
    pub seat_id: Uuid,
    pub start_date: NaiveDate,
    pub end_date: NaiveDate,
    pub months: u32,
    pub total_price: Decimal,
    pub discount_amount: Decimal,
    pub due_amount_included: Decimal,
    pub settled_due_ids: Vec<Uuid>,
    pub coupon_id: Option<Uuid>,
    pub renewed_from: Option<Uuid>,
}

/// Receipt from receipts
#[derive(Debug, Clone, FromRow, Serialize)]
pub struct Receipt {
    pub id: Uuid,
    pub booking_id: Uuid,
    pub receipt_number: String,
    #[serde(with = "rust_decimal::serde::str")]
    pub amount: Decimal,
    pub razorpay_payment_id: String,
    pub created_at: DateTime<Utc>,
}
