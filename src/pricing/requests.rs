//! Request DTOs for pricing API endpoints.

use chrono::NaiveDate;
use rust_decimal::Decimal;
use serde::Deserialize;

fn default_duration() -> u32 {
    1
}

/// Request to quote a new booking from a raw monthly price
#[derive(Debug, Deserialize)]
pub struct PriceQuoteRequest {
    #[serde(with = "rust_decimal::serde::str")]
    pub base_price: Decimal,
    #[serde(default = "default_duration")]
    pub duration_months: u32,
    #[serde(default)]
    pub start_date: Option<NaiveDate>,
}

/// Request to quote a renewal
#[derive(Debug, Deserialize)]
pub struct RenewalQuoteRequest {
    #[serde(with = "rust_decimal::serde::str")]
    pub monthly_rate: Decimal,
    pub duration_months: u32,
    #[serde(default)]
    pub coupon_code: Option<String>,
    #[serde(default, with = "rust_decimal::serde::str_option")]
    pub outstanding_due: Option<Decimal>,
}

/// Request to check a coupon against an order amount
#[derive(Debug, Deserialize)]
pub struct ValidateCouponRequest {
    pub code: String,
    #[serde(with = "rust_decimal::serde::str")]
    pub order_amount: Decimal,
}
