//! Database models for pricing queries.
//!
//! These models use sqlx's FromRow derive for direct database deserialization.

use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use sqlx::FromRow;
use uuid::Uuid;

use super::calculators::CouponTerms;

/// How a coupon discount is computed
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum DiscountType {
    Percentage,
    Fixed,
}

impl std::str::FromStr for DiscountType {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "percentage" => Ok(Self::Percentage),
            "fixed" => Ok(Self::Fixed),
            other => Err(format!("unknown discount type '{}'", other)),
        }
    }
}

impl std::fmt::Display for DiscountType {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Percentage => write!(f, "percentage"),
            Self::Fixed => write!(f, "fixed"),
        }
    }
}

/// Coupon from coupons
#[derive(Debug, Clone, FromRow)]
pub struct Coupon {
    pub id: Uuid,
    pub code: String,
    pub discount_type: String,
    pub value: Decimal,
    pub max_discount_amount: Option<Decimal>,
    pub min_order_amount: Option<Decimal>,
    pub usage_limit: Option<i32>,
    pub usage_count: i32,
    pub is_active: bool,
    pub start_date: Option<DateTime<Utc>>,
    pub end_date: Option<DateTime<Utc>>,
}

impl Coupon {
    /// Discount terms, or `None` if the stored type is not one we understand
    pub fn terms(&self) -> Option<CouponTerms> {
        let discount_type = self.discount_type.parse().ok()?;
        Some(CouponTerms {
            discount_type,
            value: self.value,
            max_discount_amount: self.max_discount_amount,
        })
    }

    pub fn has_started(&self, check_time: DateTime<Utc>) -> bool {
        self.start_date.map_or(true, |start| start <= check_time)
    }

    pub fn has_expired(&self, check_time: DateTime<Utc>) -> bool {
        self.end_date.is_some_and(|end| end < check_time)
    }

    pub fn is_used_up(&self) -> bool {
        self.usage_limit
            .is_some_and(|limit| self.usage_count >= limit)
    }
}

/// Due from dues
#[derive(Debug, Clone, FromRow)]
pub struct Due {
    pub id: Uuid,
    pub user_id: Uuid,
    pub booking_id: Uuid,
    pub due_amount: Decimal,
    pub paid_amount: Decimal,
    pub status: String,
    pub due_date: Option<DateTime<Utc>>,
}

impl Due {
    /// Amount still owed on this due
    pub fn outstanding(&self) -> Decimal {
        if self.status == "paid" {
            return Decimal::ZERO;
        }
        (self.due_amount - self.paid_amount).max(Decimal::ZERO)
    }
}

/// Sum of what is still owed across a set of dues
pub fn total_outstanding(dues: &[Due]) -> Decimal {
    dues.iter().map(Due::outstanding).sum()
}
