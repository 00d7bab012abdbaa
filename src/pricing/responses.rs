//! Response DTOs for pricing API endpoints.

use chrono::NaiveDate;
use rust_decimal::Decimal;
use serde::Serialize;

use super::calculators::{PriceQuote, RenewalAmountResult};
use super::models::DiscountType;

/// A slice of the month breakdown
#[derive(Debug, Clone, Serialize)]
pub struct MonthSliceResponse {
    pub days: u32,
    #[serde(with = "rust_decimal::serde::str")]
    pub amount: Decimal,
}

/// Whole months after the first two
#[derive(Debug, Clone, Serialize)]
pub struct RemainingMonthsResponse {
    pub months: u32,
    #[serde(with = "rust_decimal::serde::str")]
    pub amount: Decimal,
}

/// Response for a booking price quote
#[derive(Debug, Clone, Serialize)]
pub struct PriceQuoteResponse {
    #[serde(with = "rust_decimal::serde::str")]
    pub base_price: Decimal,
    pub duration_months: u32,
    pub start_date: NaiveDate,
    #[serde(with = "rust_decimal::serde::str")]
    pub taxes: Decimal,
    #[serde(with = "rust_decimal::serde::str")]
    pub discount: Decimal,
    #[serde(with = "rust_decimal::serde::str")]
    pub total: Decimal,
    pub current_month: MonthSliceResponse,
    pub next_month: MonthSliceResponse,
    pub remaining_months: RemainingMonthsResponse,
    pub currency: &'static str,
}

impl From<PriceQuote> for PriceQuoteResponse {
    fn from(quote: PriceQuote) -> Self {
        Self {
            base_price: quote.base_price,
            duration_months: quote.duration_months,
            start_date: quote.start_date,
            taxes: quote.taxes,
            discount: quote.discount,
            total: quote.total,
            current_month: MonthSliceResponse {
                days: quote.current_month.days,
                amount: quote.current_month.amount,
            },
            next_month: MonthSliceResponse {
                days: quote.next_month.days,
                amount: quote.next_month.amount,
            },
            remaining_months: RemainingMonthsResponse {
                months: quote.remaining_months.months,
                amount: quote.remaining_months.amount,
            },
            currency: "INR",
        }
    }
}

/// Response for a renewal quote
#[derive(Debug, Clone, Serialize)]
pub struct RenewalQuoteResponse {
    #[serde(with = "rust_decimal::serde::str")]
    pub monthly_rate: Decimal,
    pub duration_months: u32,
    #[serde(with = "rust_decimal::serde::str")]
    pub original_amount: Decimal,
    #[serde(with = "rust_decimal::serde::str")]
    pub discount: Decimal,
    #[serde(with = "rust_decimal::serde::str")]
    pub outstanding_due: Decimal,
    #[serde(with = "rust_decimal::serde::str")]
    pub final_amount: Decimal,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub coupon_code: Option<String>,
    pub currency: &'static str,
}

impl RenewalQuoteResponse {
    pub fn new(result: RenewalAmountResult, coupon_code: Option<String>) -> Self {
        Self {
            monthly_rate: result.monthly_rate,
            duration_months: result.duration_months,
            original_amount: result.original_amount,
            discount: result.discount,
            outstanding_due: result.outstanding_due,
            final_amount: result.final_amount,
            coupon_code,
            currency: "INR",
        }
    }
}

/// Response for a successful coupon validation
#[derive(Debug, Clone, Serialize)]
pub struct CouponValidationResponse {
    pub code: String,
    pub discount_type: DiscountType,
    #[serde(with = "rust_decimal::serde::str")]
    pub value: Decimal,
    #[serde(with = "rust_decimal::serde::str")]
    pub discount: Decimal,
    #[serde(with = "rust_decimal::serde::str")]
    pub amount_after_discount: Decimal,
}
