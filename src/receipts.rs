//! Payment receipts
//!
//! Each paid booking gets a receipt number and a QR code the front desk scans
//! at check-in.

use base64::{engine::general_purpose::STANDARD, Engine as _};
use chrono::{DateTime, Utc};
use image::{DynamicImage, ImageFormat, Luma};
use qrcode::QrCode;
use serde::Serialize;
use std::io::Cursor;
use uuid::Uuid;

use crate::error::{AppError, Result};
use crate::models::Receipt;

/// Human-readable receipt number, e.g. `INH-20240615-3F2A9C1B`
pub fn receipt_number(booking_id: Uuid, issued_at: DateTime<Utc>) -> String {
    let short = booking_id.simple().to_string()[..8].to_uppercase();
    format!("INH-{}-{}", issued_at.format("%Y%m%d"), short)
}

/// Content encoded in a receipt's QR code
pub fn qr_payload(booking_id: Uuid, receipt_number: &str) -> String {
    format!("inhalestays:booking:{}:{}", booking_id, receipt_number)
}

/// Render `content` as a PNG QR code data URL
pub fn qr_data_url(content: &str) -> Result<String> {
    let code = QrCode::new(content.as_bytes())
        .map_err(|e| AppError::Internal(format!("QR encoding failed: {}", e)))?;

    let image = code
        .render::<Luma<u8>>()
        .min_dimensions(240, 240)
        .build();

    let mut png = Vec::new();
    DynamicImage::ImageLuma8(image)
        .write_to(&mut Cursor::new(&mut png), ImageFormat::Png)
        .map_err(|e| AppError::Internal(format!("PNG encoding failed: {}", e)))?;

    Ok(format!("data:image/png;base64,{}", STANDARD.encode(png)))
}

/// Receipt returned to clients
#[derive(Debug, Serialize)]
pub struct ReceiptView {
    #[serde(flatten)]
    pub receipt: Receipt,
    pub qr_code: String,
}

impl ReceiptView {
    pub fn new(receipt: Receipt) -> Result<Self> {
        let qr_code = qr_data_url(&qr_payload(receipt.booking_id, &receipt.receipt_number))?;
        Ok(Self { receipt, qr_code })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    #[test]
    fn test_receipt_number_format() {
        let id = Uuid::parse_str("3f2a9c1b-0000-4000-8000-000000000000").unwrap();
        let issued = Utc.with_ymd_and_hms(2024, 6, 15, 10, 30, 0).unwrap();
        assert_eq!(receipt_number(id, issued), "INH-20240615-3F2A9C1B");
    }

    #[test]
    fn test_qr_data_url_is_png() {
        let url = qr_data_url(&qr_payload(Uuid::new_v4(), "INH-20240615-3F2A9C1B")).unwrap();
        let encoded = url.strip_prefix("data:image/png;base64,").unwrap();
        let bytes = STANDARD.decode(encoded).unwrap();
        assert_eq!(&bytes[..8], b"\x89PNG\r\n\x1a\n");
    }
}
