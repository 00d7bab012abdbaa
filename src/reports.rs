//! Admin revenue and occupancy reports.
//!
//! Pure aggregation over already-fetched bookings - the handlers in
//! `routes::admin` do the fetching.

use rust_decimal::Decimal;
use serde::Serialize;
use std::collections::{BTreeMap, HashMap, HashSet};
use uuid::Uuid;

use crate::models::{Booking, Cabin};
use crate::pricing::round_money;

/// Revenue collected in one calendar month
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct MonthlyRevenue {
    /// `YYYY-MM`
    pub month: String,
    pub bookings: usize,
    #[serde(with = "rust_decimal::serde::str")]
    pub revenue: Decimal,
}

/// Seat usage of one cabin on a given day
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct CabinOccupancy {
    pub cabin_id: Uuid,
    pub cabin_name: String,
    pub total_seats: i64,
    pub occupied_seats: i64,
    /// Percentage, two decimal places
    #[serde(with = "rust_decimal::serde::str")]
    pub occupancy_rate: Decimal,
}

/// Group paid bookings by the month they were paid in, oldest month first
pub fn revenue_by_month(bookings: &[Booking]) -> Vec<MonthlyRevenue> {
    let mut months: BTreeMap<String, (usize, Decimal)> = BTreeMap::new();

    for booking in bookings {
        let key = booking.created_at.format("%Y-%m").to_string();
        let entry = months.entry(key).or_insert((0, Decimal::ZERO));
        entry.0 += 1;
        entry.1 += booking.total_price;
    }

    months
        .into_iter()
        .map(|(month, (bookings, revenue))| MonthlyRevenue {
            month,
            bookings,
            revenue,
        })
        .collect()
}

/// Occupancy per cabin, busiest cabin first.
///
/// `seat_counts` maps cabin id to its number of seats; `active` are the paid
/// bookings covering the report day. A seat counts once however many
/// bookings cover it.
pub fn occupancy_by_cabin(
    cabins: &[Cabin],
    seat_counts: &HashMap<Uuid, i64>,
    active: &[Booking],
) -> Vec<CabinOccupancy> {
    let mut occupied: HashMap<Uuid, HashSet<Uuid>> = HashMap::new();
    for booking in active {
        occupied
            .entry(booking.cabin_id)
            .or_default()
            .insert(booking.seat_id);
    }

    let mut rows: Vec<CabinOccupancy> = cabins
        .iter()
        .map(|cabin| {
            let total_seats = seat_counts.get(&cabin.id).copied().unwrap_or(0);
            let occupied_seats = occupied.get(&cabin.id).map_or(0, |seats| seats.len() as i64);
            let occupancy_rate = if total_seats > 0 {
                round_money(
                    Decimal::from(occupied_seats) * Decimal::ONE_HUNDRED / Decimal::from(total_seats),
                    2,
                )
            } else {
                Decimal::ZERO
            };

            CabinOccupancy {
                cabin_id: cabin.id,
                cabin_name: cabin.name.clone(),
                total_seats,
                occupied_seats,
                occupancy_rate,
            }
        })
        .collect();

    rows.sort_by(|a, b| {
        b.occupancy_rate
            .cmp(&a.occupancy_rate)
            .then_with(|| a.cabin_name.cmp(&b.cabin_name))
    });
    rows
}
