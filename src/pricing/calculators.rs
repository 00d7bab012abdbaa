//! Core pricing calculation functions.
//!
//! Pure functions for booking math - no database access. Inputs are trusted
//! values that the HTTP layer has already validated.

use chrono::{Datelike, NaiveDate, Utc};
use rust_decimal::prelude::*;
use rust_decimal::Decimal;
use rust_decimal_macros::dec;

use super::models::DiscountType;

/// Flat GST charged on one month's base price.
pub const GST_RATE: Decimal = dec!(0.18);

/// Divisor used for the per-day rate in the month breakdown.
pub const DAYS_PER_BILLING_MONTH: u32 = 30;

/// Round to specified decimal places using banker's rounding (ROUND_HALF_EVEN).
///
/// Banker's rounding rounds to the nearest even number when the value is exactly
/// halfway between two possibilities. This reduces cumulative rounding bias.
///
/// # Examples
/// ```
/// use rust_decimal_macros::dec;
/// use inhalestays_api::pricing::round_money;
///
/// assert_eq!(round_money(dec!(2.5), 0), dec!(2));   // rounds to even
/// assert_eq!(round_money(dec!(3.5), 0), dec!(4));   // rounds to even
/// assert_eq!(round_money(dec!(1.234), 2), dec!(1.23));
/// ```
pub fn round_money(amount: Decimal, places: u32) -> Decimal {
    amount.round_dp_with_strategy(places, RoundingStrategy::MidpointNearestEven)
}

/// Convert a rupee amount to paise (the unit Razorpay orders are created in).
pub fn to_paise(amount: Decimal) -> i64 {
    (round_money(amount, 2) * Decimal::ONE_HUNDRED)
        .to_i64()
        .unwrap_or(0)
}

/// Days left in the calendar month containing `date`, counting `date` itself.
pub fn days_left_in_month(date: NaiveDate) -> u32 {
    let (year, month) = if date.month() == 12 {
        (date.year() + 1, 1)
    } else {
        (date.year(), date.month() + 1)
    };

    let last_day = NaiveDate::from_ymd_opt(year, month, 1)
        .and_then(|first_of_next| first_of_next.pred_opt())
        .unwrap_or(date);

    ((last_day - date).num_days() + 1) as u32
}

/// A slice of the booking period in the month breakdown.
#[derive(Debug, Clone, PartialEq)]
pub struct MonthSlice {
    pub days: u32,
    pub amount: Decimal,
}

/// Whole months after the first two.
#[derive(Debug, Clone, PartialEq)]
pub struct RemainingMonths {
    pub months: u32,
    pub amount: Decimal,
}

/// Price breakdown for a booking.
///
/// `total` is authoritative. The month fields are a display breakdown and do
/// not sum to `total`: the current month is prorated over a fixed 30-day
/// month while `total` charges the full base price per month.
#[derive(Debug, Clone, PartialEq)]
pub struct PriceQuote {
    pub base_price: Decimal,
    pub duration_months: u32,
    pub start_date: NaiveDate,
    pub taxes: Decimal,
    pub discount: Decimal,
    pub total: Decimal,
    pub current_month: MonthSlice,
    pub next_month: MonthSlice,
    pub remaining_months: RemainingMonths,
}

/// Calculate the price quote for booking a seat or bed.
///
/// # Arguments
/// * `base_price` - Monthly price of the seat/bed in rupees
/// * `duration_months` - Number of months booked (callers pass >= 1)
/// * `start_date` - First day of the booking (default: today)
pub fn calculate_price(
    base_price: Decimal,
    duration_months: u32,
    start_date: Option<NaiveDate>,
) -> PriceQuote {
    let start_date = start_date.unwrap_or_else(|| Utc::now().date_naive());

    let taxes = base_price * GST_RATE;
    let discount = Decimal::ZERO;
    let total = base_price * Decimal::from(duration_months) + taxes - discount;

    let current_days = days_left_in_month(start_date);
    let daily_rate = base_price / Decimal::from(DAYS_PER_BILLING_MONTH);
    let current_amount = (daily_rate * Decimal::from(current_days))
        .round_dp_with_strategy(0, RoundingStrategy::MidpointAwayFromZero);

    let remaining = duration_months.saturating_sub(2);

    PriceQuote {
        base_price,
        duration_months,
        start_date,
        taxes,
        discount,
        total,
        current_month: MonthSlice {
            days: current_days,
            amount: current_amount,
        },
        next_month: MonthSlice {
            days: DAYS_PER_BILLING_MONTH,
            amount: base_price,
        },
        remaining_months: RemainingMonths {
            months: remaining,
            amount: base_price * Decimal::from(remaining),
        },
    }
}

/// Discount terms of an applied coupon.
#[derive(Debug, Clone, PartialEq)]
pub struct CouponTerms {
    pub discount_type: DiscountType,
    pub value: Decimal,
    /// Cap for percentage coupons. `None` means uncapped.
    pub max_discount_amount: Option<Decimal>,
}

/// Discount a coupon gives on `original_amount`.
pub fn coupon_discount(terms: &CouponTerms, original_amount: Decimal) -> Decimal {
    match terms.discount_type {
        DiscountType::Percentage => {
            let raw = original_amount * terms.value / Decimal::ONE_HUNDRED;
            match terms.max_discount_amount {
                Some(cap) => raw.min(cap),
                None => raw,
            }
        }
        DiscountType::Fixed => terms.value.min(original_amount),
    }
}

/// Result of a renewal amount calculation
#[derive(Debug, Clone, PartialEq)]
pub struct RenewalAmountResult {
    pub monthly_rate: Decimal,
    pub duration_months: u32,
    pub original_amount: Decimal,
    pub discount: Decimal,
    pub outstanding_due: Decimal,
    pub final_amount: Decimal,
}

/// Calculate the amount payable to renew a booking.
///
/// The coupon applies to the rent only; outstanding dues are added after the
/// discount and are never discounted.
pub fn calculate_renewal_amount(
    monthly_rate: Decimal,
    duration_months: u32,
    coupon: Option<&CouponTerms>,
    outstanding_due: Decimal,
) -> RenewalAmountResult {
    let original_amount = monthly_rate * Decimal::from(duration_months);

    let (discount, discounted) = match coupon {
        Some(terms) => {
            let discount = coupon_discount(terms, original_amount);
            (discount, (original_amount - discount).max(Decimal::ZERO))
        }
        None => (Decimal::ZERO, original_amount),
    };

    RenewalAmountResult {
        monthly_rate,
        duration_months,
        original_amount,
        discount,
        outstanding_due,
        final_amount: discounted + outstanding_due,
    }
}
