//! Cabin and seat inventory models

use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use sqlx::FromRow;
use uuid::Uuid;

/// Reading room from cabins
#[derive(Debug, Clone, FromRow, Serialize)]
pub struct Cabin {
    pub id: Uuid,
    pub name: String,
    pub partner_id: Option<Uuid>,
    pub is_active: bool,
    pub created_at: DateTime<Utc>,
}

/// Seat from seats
///
/// Also serialized into the seat cache snapshot, so field changes must keep
/// the snapshot readable (unknown snapshots are discarded on load).
#[derive(Debug, Clone, PartialEq, FromRow, Serialize, Deserialize)]
pub struct Seat {
    pub id: Uuid,
    pub cabin_id: Uuid,
    pub number: i32,
    #[serde(with = "rust_decimal::serde::str")]
    pub price: Decimal,
    pub is_available: bool,
}
