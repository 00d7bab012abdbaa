//! Pricing service functions with database access.
//!
//! These functions fetch the coupon, due and booking records that gate a
//! price calculation, then hand the numbers to the pure calculators.

use chrono::{DateTime, Duration, NaiveDate, Utc};
use rust_decimal::Decimal;
use sqlx::{PgConnection, PgPool};
use uuid::Uuid;

use crate::db::queries as db;
use crate::error::AppError;
use crate::models::Booking;

use super::calculators::{calculate_renewal_amount, coupon_discount, CouponTerms, RenewalAmountResult};
use super::models::{total_outstanding, Coupon};
use super::queries;

/// How long an unpaid booking keeps its seat
pub const PENDING_HOLD_MINUTES: i64 = 15;

/// Pricing calculation error types
#[derive(Debug, Clone)]
pub enum PricingError {
    CouponNotFound {
        code: String,
    },
    CouponInactive {
        code: String,
    },
    CouponNotStarted {
        code: String,
    },
    CouponExpired {
        code: String,
    },
    CouponUsedUp {
        code: String,
    },
    MinimumOrderNotMet {
        code: String,
        minimum: Decimal,
    },
    CouponMisconfigured {
        code: String,
        discount_type: String,
    },
    SeatUnavailable {
        seat_id: Uuid,
        start: NaiveDate,
        end: NaiveDate,
    },
}

impl std::fmt::Display for PricingError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            PricingError::CouponNotFound { code } => write!(f, "Coupon {} does not exist", code),
            PricingError::CouponInactive { code } => write!(f, "Coupon {} is no longer active", code),
            PricingError::CouponNotStarted { code } => write!(f, "Coupon {} is not valid yet", code),
            PricingError::CouponExpired { code } => write!(f, "Coupon {} has expired", code),
            PricingError::CouponUsedUp { code } => {
                write!(f, "Coupon {} has reached its usage limit", code)
            }
            PricingError::MinimumOrderNotMet { code, minimum } => {
                write!(f, "Coupon {} needs an order of at least {}", code, minimum)
            }
            PricingError::CouponMisconfigured { code, discount_type } => {
                write!(f, "Coupon {} has unknown discount type '{}'", code, discount_type)
            }
            PricingError::SeatUnavailable { seat_id, start, end } => {
                write!(f, "Seat {} is already booked between {} and {}", seat_id, start, end)
            }
        }
    }
}

impl std::error::Error for PricingError {}

impl From<PricingError> for AppError {
    fn from(err: PricingError) -> Self {
        match err {
            PricingError::CouponNotFound { .. } => AppError::NotFound("Coupon".to_string()),
            PricingError::SeatUnavailable { .. } => AppError::Conflict(err.to_string()),
            PricingError::CouponMisconfigured { .. } => AppError::Internal(err.to_string()),
            _ => AppError::Validation(err.to_string()),
        }
    }
}

/// A coupon that passed validation against an order
#[derive(Debug, Clone)]
pub struct ValidatedCoupon {
    pub coupon: Coupon,
    pub terms: CouponTerms,
    pub discount: Decimal,
}

/// Check a fetched coupon against an order amount.
pub fn check_coupon(
    coupon: Coupon,
    order_amount: Decimal,
    check_time: DateTime<Utc>,
) -> Result<ValidatedCoupon, PricingError> {
    let code = coupon.code.clone();

    if !coupon.is_active {
        return Err(PricingError::CouponInactive { code });
    }
    if !coupon.has_started(check_time) {
        return Err(PricingError::CouponNotStarted { code });
    }
    if coupon.has_expired(check_time) {
        return Err(PricingError::CouponExpired { code });
    }
    if coupon.is_used_up() {
        return Err(PricingError::CouponUsedUp { code });
    }
    if let Some(minimum) = coupon.min_order_amount {
        if order_amount < minimum {
            return Err(PricingError::MinimumOrderNotMet { code, minimum });
        }
    }

    let terms = coupon.terms().ok_or_else(|| PricingError::CouponMisconfigured {
        code: code.clone(),
        discount_type: coupon.discount_type.clone(),
    })?;
    let discount = coupon_discount(&terms, order_amount);

    Ok(ValidatedCoupon {
        coupon,
        terms,
        discount,
    })
}

/// Look up a coupon by code and validate it against an order amount.
pub async fn validate_coupon(
    pool: &PgPool,
    code: &str,
    order_amount: Decimal,
    as_of: Option<DateTime<Utc>>,
) -> Result<ValidatedCoupon, AppError> {
    let check_time = as_of.unwrap_or_else(Utc::now);

    let coupon = queries::find_coupon_by_code(pool, code)
        .await?
        .ok_or_else(|| PricingError::CouponNotFound {
            code: code.to_string(),
        })?;

    Ok(check_coupon(coupon, order_amount, check_time)?)
}

/// Renewal amount together with the coupon that produced it
#[derive(Debug, Clone)]
pub struct RenewalQuote {
    pub amount: RenewalAmountResult,
    pub coupon: Option<ValidatedCoupon>,
}

/// Unpaid dues of a booking, as rolled into a renewal
#[derive(Debug, Clone, Default)]
pub struct OpenDues {
    pub total: Decimal,
    pub due_ids: Vec<Uuid>,
}

/// What a student still owes on a booking, and which dues make it up
pub async fn open_dues(pool: &PgPool, booking_id: Uuid) -> Result<OpenDues, AppError> {
    let dues = queries::find_open_dues_for_booking(pool, booking_id).await?;

    Ok(OpenDues {
        total: total_outstanding(&dues),
        due_ids: dues
            .iter()
            .filter(|due| due.outstanding() > Decimal::ZERO)
            .map(|due| due.id)
            .collect(),
    })
}

/// Price a renewal: validate the coupon against the rent, then add the
/// outstanding dues.
///
/// # Arguments
/// * `pool` - Database connection pool
/// * `monthly_rate` - Current monthly price of the seat
/// * `duration_months` - Renewal length
/// * `coupon_code` - Optional coupon the student entered
/// * `outstanding_due` - Unpaid dues rolled into this payment
pub async fn quote_renewal(
    pool: &PgPool,
    monthly_rate: Decimal,
    duration_months: u32,
    coupon_code: Option<&str>,
    outstanding_due: Decimal,
) -> Result<RenewalQuote, AppError> {
    let rent = monthly_rate * Decimal::from(duration_months);

    let coupon = match coupon_code.map(str::trim).filter(|c| !c.is_empty()) {
        Some(code) => Some(validate_coupon(pool, code, rent, None).await?),
        None => None,
    };

    let amount = calculate_renewal_amount(
        monthly_rate,
        duration_months,
        coupon.as_ref().map(|c| &c.terms),
        outstanding_due,
    );

    Ok(RenewalQuote { amount, coupon })
}

/// Creation time before which a pending booking no longer holds its seat
pub fn pending_cutoff(now: DateTime<Utc>) -> DateTime<Utc> {
    now - Duration::minutes(PENDING_HOLD_MINUTES)
}

/// Whether a pending booking created at `created_at` still holds its seat
pub fn hold_is_live(created_at: DateTime<Utc>, now: DateTime<Utc>) -> bool {
    created_at > pending_cutoff(now)
}

/// Fail unless the seat is free for `[start, end)`.
///
/// Call inside the transaction that inserts the booking, after locking the
/// seat row, so two checkouts for the same seat cannot both pass.
pub async fn ensure_seat_available(
    conn: &mut PgConnection,
    seat_id: Uuid,
    start: NaiveDate,
    end: NaiveDate,
) -> Result<(), AppError> {
    let cutoff = pending_cutoff(Utc::now());
    let overlapping =
        db::count_overlapping_bookings(&mut *conn, seat_id, start, end, Some(cutoff), None).await?;

    if overlapping > 0 {
        return Err(PricingError::SeatUnavailable { seat_id, start, end }.into());
    }
    Ok(())
}

/// Whether a booking that has just been paid can still have its seat.
///
/// Only other paid bookings count: a payment outranks an unpaid hold. Call
/// with the seat row locked.
pub async fn seat_free_for_payment(conn: &mut PgConnection, booking: &Booking) -> Result<bool, AppError> {
    let overlapping = db::count_overlapping_bookings(
        &mut *conn,
        booking.seat_id,
        booking.start_date,
        booking.end_date,
        None,
        Some(booking.id),
    )
    .await?;

    Ok(overlapping == 0)
}

/// Whether a coupon can take one more checkout given its live holds
pub fn coupon_has_room(usage_count: i32, usage_limit: Option<i32>, live_holds: i64) -> bool {
    match usage_limit {
        Some(limit) => i64::from(usage_count) + live_holds < i64::from(limit),
        None => true,
    }
}

/// Claim a use of a coupon for a new checkout.
///
/// Locks the coupon row so concurrent checkouts count each other's holds;
/// unpaid bookings younger than the hold window count against the limit.
pub async fn reserve_coupon(conn: &mut PgConnection, coupon: &Coupon) -> Result<(), AppError> {
    let (usage_count, usage_limit) = queries::lock_coupon_usage(&mut *conn, coupon.id)
        .await?
        .ok_or_else(|| PricingError::CouponNotFound {
            code: coupon.code.clone(),
        })?;

    if usage_limit.is_none() {
        return Ok(());
    }

    let holds = queries::count_pending_coupon_holds(&mut *conn, coupon.id, pending_cutoff(Utc::now())).await?;
    if !coupon_has_room(usage_count, usage_limit, holds) {
        return Err(PricingError::CouponUsedUp {
            code: coupon.code.clone(),
        }
        .into());
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::pricing::models::DiscountType;
    use rust_decimal_macros::dec;

    fn coupon() -> Coupon {
        Coupon {
            id: Uuid::new_v4(),
            code: "STUDY20".to_string(),
            discount_type: "percentage".to_string(),
            value: dec!(20),
            max_discount_amount: Some(dec!(100)),
            min_order_amount: Some(dec!(500)),
            usage_limit: Some(5),
            usage_count: 1,
            is_active: true,
            start_date: None,
            end_date: None,
        }
    }

    #[test]
    fn test_check_coupon_success() {
        let validated = check_coupon(coupon(), dec!(1000), Utc::now()).unwrap();
        assert_eq!(validated.terms.discount_type, DiscountType::Percentage);
        assert_eq!(validated.discount, dec!(100));
    }

    #[test]
    fn test_check_coupon_failures() {
        let now = Utc::now();

        let mut c = coupon();
        c.is_active = false;
        assert!(matches!(check_coupon(c, dec!(1000), now), Err(PricingError::CouponInactive { .. })));

        let mut c = coupon();
        c.start_date = Some(now + Duration::days(2));
        assert!(matches!(check_coupon(c, dec!(1000), now), Err(PricingError::CouponNotStarted { .. })));

        let mut c = coupon();
        c.end_date = Some(now - Duration::days(2));
        assert!(matches!(check_coupon(c, dec!(1000), now), Err(PricingError::CouponExpired { .. })));

        let mut c = coupon();
        c.usage_count = 5;
        assert!(matches!(check_coupon(c, dec!(1000), now), Err(PricingError::CouponUsedUp { .. })));

        assert!(matches!(
            check_coupon(coupon(), dec!(499), now),
            Err(PricingError::MinimumOrderNotMet { .. })
        ));

        let mut c = coupon();
        c.discount_type = "bogo".to_string();
        assert!(matches!(check_coupon(c, dec!(1000), now), Err(PricingError::CouponMisconfigured { .. })));
    }

    #[test]
    fn test_pending_hold_lasts_fifteen_minutes() {
        let now = Utc::now();
        assert!(hold_is_live(now - Duration::minutes(1), now));
        assert!(hold_is_live(now - Duration::minutes(14), now));
        assert!(!hold_is_live(now - Duration::minutes(PENDING_HOLD_MINUTES), now));
        assert!(!hold_is_live(now - Duration::minutes(16), now));
        assert_eq!(pending_cutoff(now), now - Duration::minutes(15));
    }

    #[test]
    fn test_coupon_room_counts_live_holds() {
        assert!(coupon_has_room(0, None, 100));
        assert!(coupon_has_room(3, Some(5), 1));
        assert!(!coupon_has_room(3, Some(5), 2));
        assert!(!coupon_has_room(5, Some(5), 0));
        assert!(!coupon_has_room(0, Some(0), 0));
    }

    #[test]
    fn test_pricing_error_display() {
        let err = PricingError::CouponExpired {
            code: "STUDY20".to_string(),
        };
        assert!(err.to_string().contains("STUDY20"));

        let err = PricingError::MinimumOrderNotMet {
            code: "STUDY20".to_string(),
            minimum: dec!(500),
        };
        assert!(err.to_string().contains("500"));
    }

    #[test]
    fn test_pricing_error_maps_to_app_error() {
        let unavailable = PricingError::SeatUnavailable {
            seat_id: Uuid::new_v4(),
            start: NaiveDate::from_ymd_opt(2024, 1, 1).unwrap(),
            end: NaiveDate::from_ymd_opt(2024, 2, 1).unwrap(),
        };
        assert!(matches!(AppError::from(unavailable), AppError::Conflict(_)));

        let missing = PricingError::CouponNotFound {
            code: "NOPE".to_string(),
        };
        assert!(matches!(AppError::from(missing), AppError::NotFound(_)));

        let expired = PricingError::CouponExpired {
            code: "OLD".to_string(),
        };
        assert!(matches!(AppError::from(expired), AppError::Validation(_)));
    }
}
