//! Pricing engine for seat bookings and renewals.
//!
//! Quotes a new booking from a seat's monthly price (tax, month breakdown)
//! and prices renewals with coupons and outstanding dues rolled in.

pub mod calculators;
pub mod models;
pub mod plans;
pub mod queries;
pub mod requests;
pub mod responses;
pub mod routes;
pub mod services;

// Re-export commonly used items
pub use calculators::{calculate_price, calculate_renewal_amount, round_money, to_paise};
pub use routes::router;
pub use services::{PricingError, RenewalQuote, ValidatedCoupon};
