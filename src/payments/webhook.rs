//! Razorpay webhook events

use serde::Deserialize;

use crate::error::{AppError, Result};

/// Webhook event types we handle
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum WebhookEventType {
    PaymentCaptured,
    PaymentFailed,
    OrderPaid,
    Unknown(String),
}

impl From<&str> for WebhookEventType {
    fn from(s: &str) -> Self {
        match s {
            "payment.captured" => Self::PaymentCaptured,
            "payment.failed" => Self::PaymentFailed,
            "order.paid" => Self::OrderPaid,
            other => Self::Unknown(other.to_string()),
        }
    }
}

/// Payment attached to an event
#[derive(Debug, Clone, Deserialize)]
pub struct PaymentEntity {
    pub id: String,
    pub order_id: Option<String>,
    /// Amount in paise
    pub amount: i64,
    pub status: String,
    #[serde(default)]
    pub error_description: Option<String>,
}

/// Parsed webhook event
#[derive(Debug, Clone)]
pub struct WebhookEvent {
    pub event_type: WebhookEventType,
    pub payment: Option<PaymentEntity>,
}

// Raw event for parsing
#[derive(Debug, Deserialize)]
struct RawEvent {
    event: String,
    #[serde(default)]
    payload: RawPayload,
}

#[derive(Debug, Default, Deserialize)]
struct RawPayload {
    payment: Option<RawWrapped<PaymentEntity>>,
}

#[derive(Debug, Deserialize)]
struct RawWrapped<T> {
    entity: T,
}

impl WebhookEvent {
    /// Parse a (signature-verified) webhook body
    pub fn parse(body: &[u8]) -> Result<Self> {
        let raw: RawEvent = serde_json::from_slice(body)
            .map_err(|e| AppError::Validation(format!("Invalid webhook payload: {}", e)))?;

        Ok(Self {
            event_type: WebhookEventType::from(raw.event.as_str()),
            payment: raw.payload.payment.map(|wrapped| wrapped.entity),
        })
    }
}
