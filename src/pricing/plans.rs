//! Booking plans offered at checkout.

use serde::Serialize;

/// A bookable plan
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct BookingPlan {
    pub id: &'static str,
    pub months: u32,
    pub description: &'static str,
}

pub const BOOKING_PLANS: [BookingPlan; 3] = [
    BookingPlan {
        id: "monthly",
        months: 1,
        description: "1 month of reserved seat access",
    },
    BookingPlan {
        id: "quarterly",
        months: 3,
        description: "3 months of reserved seat access",
    },
    BookingPlan {
        id: "half_yearly",
        months: 6,
        description: "6 months of reserved seat access",
    },
];

/// Durations a running booking can be extended by.
pub const RENEWAL_DURATIONS: [u32; 4] = [1, 3, 6, 12];

pub fn find_plan(months: u32) -> Option<&'static BookingPlan> {
    BOOKING_PLANS.iter().find(|plan| plan.months == months)
}

pub fn is_renewal_duration(months: u32) -> bool {
    RENEWAL_DURATIONS.contains(&months)
}
