//! Razorpay Orders API client and signature verification

use hmac::{Hmac, Mac};
use reqwest::Client;
use serde::{Deserialize, Serialize};
use sha2::Sha256;
use tracing::{error, info, instrument, warn};

use crate::config::RazorpayConfig;
use crate::error::{AppError, Result};

#[derive(Debug, Serialize)]
struct CreateOrderRequest<'a> {
    amount: i64,
    currency: &'a str,
    receipt: &'a str,
    notes: serde_json::Value,
}

/// Order as returned by `POST /orders`
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RazorpayOrder {
    pub id: String,
    /// Amount in paise
    pub amount: i64,
    pub currency: String,
    pub receipt: Option<String>,
    pub status: String,
}

/// Razorpay API client
#[derive(Clone)]
pub struct RazorpayClient {
    client: Client,
    config: RazorpayConfig,
}

impl RazorpayClient {
    pub fn new(config: RazorpayConfig) -> Self {
        Self {
            client: Client::new(),
            config,
        }
    }

    /// Public key the checkout widget is opened with
    pub fn key_id(&self) -> &str {
        &self.config.key_id
    }

    /// Create an order for `amount_paise`
    #[instrument(skip(self, notes))]
    pub async fn create_order(
        &self,
        amount_paise: i64,
        receipt: &str,
        notes: serde_json::Value,
    ) -> Result<RazorpayOrder> {
        if amount_paise <= 0 {
            return Err(AppError::Validation(
                "Order amount must be positive".to_string(),
            ));
        }

        let url = format!("{}/orders", self.config.base_url.trim_end_matches('/'));
        let body = CreateOrderRequest {
            amount: amount_paise,
            currency: "INR",
            receipt,
            notes,
        };

        let response = self
            .client
            .post(&url)
            .basic_auth(&self.config.key_id, Some(&self.config.key_secret))
            .json(&body)
            .send()
            .await?;

        if response.status().is_success() {
            let order: RazorpayOrder = response.json().await?;
            info!(order_id = %order.id, amount = order.amount, "Razorpay order created");
            Ok(order)
        } else {
            let status = response.status();
            let error_text = response
                .text()
                .await
                .unwrap_or_else(|_| "unknown error".to_string());
            error!(%status, "Razorpay order creation failed: {}", error_text);
            Err(AppError::Payment(format!(
                "Could not create payment order ({})",
                status
            )))
        }
    }

    /// Verify the signature the checkout widget returns after payment.
    ///
    /// Razorpay signs `"{order_id}|{payment_id}"` with the key secret.
    pub fn verify_payment_signature(
        &self,
        order_id: &str,
        payment_id: &str,
        signature: &str,
    ) -> Result<()> {
        let payload = format!("{}|{}", order_id, payment_id);
        verify(&self.config.key_secret, payload.as_bytes(), signature).map_err(|e| {
            warn!(order_id, payment_id, "Payment signature rejected");
            e
        })
    }

    /// Verify the `X-Razorpay-Signature` header of a webhook delivery
    pub fn verify_webhook_signature(&self, body: &[u8], signature: &str) -> Result<()> {
        verify(&self.config.webhook_secret, body, signature).map_err(|e| {
            warn!("Webhook signature rejected");
            e
        })
    }
}

fn verify(secret: &str, payload: &[u8], signature: &str) -> Result<()> {
    let expected = hex::decode(signature.trim())
        .map_err(|_| AppError::Payment("Malformed payment signature".to_string()))?;

    let mut mac = Hmac::<Sha256>::new_from_slice(secret.as_bytes())
        .map_err(|_| AppError::Internal("HMAC error".to_string()))?;
    mac.update(payload);

    // verify_slice compares in constant time
    mac.verify_slice(&expected)
        .map_err(|_| AppError::Payment("Payment signature verification failed".to_string()))
}
