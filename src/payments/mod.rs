//! Payment collection through Razorpay.

pub mod razorpay;
pub mod webhook;

pub use razorpay::{RazorpayClient, RazorpayOrder};
pub use webhook::{PaymentEntity, WebhookEvent, WebhookEventType};
