//! Payment confirmation: checkout callback and Razorpay webhook

use axum::{
    body::Bytes,
    extract::State,
    http::{HeaderMap, StatusCode},
    Json,
};
use serde::Deserialize;
use tracing::{debug, error, info, warn};

use crate::auth::{AuthUser, Permission};
use crate::bookings::{self, PaymentOutcome};
use crate::error::{ApiResponse, AppError, Result};
use crate::payments::{WebhookEvent, WebhookEventType};
use crate::AppState;

pub const SIGNATURE_HEADER: &str = "x-razorpay-signature";

/// Payment status Razorpay reports once the money is ours
const CAPTURED: &str = "captured";

/// Fields the checkout widget hands back after a successful payment
#[derive(Debug, Deserialize)]
pub struct VerifyPaymentRequest {
    pub razorpay_order_id: String,
    pub razorpay_payment_id: String,
    pub razorpay_signature: String,
}

/// POST /api/v1/payments/verify
pub async fn verify(
    State(state): State<AppState>,
    user: AuthUser,
    Json(req): Json<VerifyPaymentRequest>,
) -> Result<Json<ApiResponse<PaymentOutcome>>> {
    user.require(Permission::BookSeat)?;

    state.razorpay.verify_payment_signature(
        &req.razorpay_order_id,
        &req.razorpay_payment_id,
        &req.razorpay_signature,
    )?;

    let outcome = bookings::complete_payment(
        &state,
        &req.razorpay_order_id,
        &req.razorpay_payment_id,
        Some(user.user_id),
        None,
    )
    .await?;

    Ok(ApiResponse::ok(outcome))
}

/// POST /webhooks/razorpay
///
/// Acknowledges events it does not handle so Razorpay stops retrying them.
/// Payments that conflict with an already paid booking are logged for manual
/// review and acknowledged too; retrying cannot change the outcome.
pub async fn razorpay_webhook(
    State(state): State<AppState>,
    headers: HeaderMap,
    body: Bytes,
) -> Result<StatusCode> {
    let signature = headers
        .get(SIGNATURE_HEADER)
        .and_then(|value| value.to_str().ok())
        .ok_or_else(|| AppError::Unauthorized("missing webhook signature".to_string()))?;

    state
        .razorpay
        .verify_webhook_signature(&body, signature)
        .map_err(|_| AppError::Unauthorized("invalid webhook signature".to_string()))?;

    let event = WebhookEvent::parse(&body)?;

    match (&event.event_type, event.payment) {
        (WebhookEventType::PaymentCaptured | WebhookEventType::OrderPaid, Some(payment)) => {
            let Some(order_id) = payment.order_id.as_deref() else {
                warn!(payment_id = %payment.id, "Captured payment without an order");
                return Ok(StatusCode::OK);
            };
            if payment.status != CAPTURED {
                warn!(order_id, payment_id = %payment.id, status = %payment.status, "Ignoring uncaptured payment");
                return Ok(StatusCode::OK);
            }
            let outcome =
                bookings::complete_payment(&state, order_id, &payment.id, None, Some(payment.amount)).await;
            match outcome {
                Ok(PaymentOutcome::Confirmed(receipt)) => info!(
                    order_id,
                    payment_id = %payment.id,
                    receipt = %receipt.receipt.receipt_number,
                    "Webhook completed booking"
                ),
                Ok(PaymentOutcome::RefundDue { booking }) => warn!(
                    order_id,
                    payment_id = %payment.id,
                    booking_id = %booking.id,
                    "Webhook payment flagged for refund"
                ),
                Err(AppError::Conflict(reason)) => error!(
                    order_id,
                    payment_id = %payment.id,
                    %reason,
                    "Webhook payment needs manual review"
                ),
                Err(e) => return Err(e),
            }
        }
        (WebhookEventType::PaymentFailed, Some(payment)) => {
            if let Some(order_id) = payment.order_id.as_deref() {
                warn!(
                    order_id,
                    payment_id = %payment.id,
                    reason = payment.error_description.as_deref().unwrap_or("unknown"),
                    "Payment failed"
                );
                bookings::fail_payment(&state, order_id).await?;
            }
        }
        (event_type, _) => {
            debug!(?event_type, "Ignoring webhook event");
        }
    }

    Ok(StatusCode::OK)
}
