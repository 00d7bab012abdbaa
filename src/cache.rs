//! In-memory caching using moka
//!
//! Holds the seat map of each cabin and the role of recently seen users. The
//! seat map can be persisted to a JSON snapshot so a restart serves seats
//! before the first warm-up finishes: it is loaded once on startup and
//! rewritten whenever a cabin is invalidated.

use moka::future::Cache;
use serde::Serialize;
use sqlx::PgPool;
use std::collections::HashMap;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Duration;
use tokio::time::interval;
use tracing::{debug, info, warn};
use uuid::Uuid;

use crate::auth::Role;
use crate::db::queries;
use crate::models::Seat;

/// Application cache holding seat maps and user roles
#[derive(Clone)]
pub struct AppCache {
    /// Seats per cabin (cabin_id -> seats ordered by number)
    pub seats: Cache<Uuid, Arc<Vec<Seat>>>,
    /// Roles (user_id -> role)
    pub roles: Cache<Uuid, Role>,
    snapshot_path: Option<PathBuf>,
}

impl AppCache {
    /// Create a new cache instance with configured TTLs
    pub fn new(snapshot_path: Option<PathBuf>) -> Self {
        Self {
            // Seat maps: 1000 cabins, 30 min TTL
            seats: Cache::builder()
                .max_capacity(1_000)
                .time_to_live(Duration::from_secs(30 * 60))
                .build(),

            // Roles: short TTL so approvals show up quickly
            roles: Cache::builder()
                .max_capacity(10_000)
                .time_to_live(Duration::from_secs(5 * 60))
                .build(),

            snapshot_path,
        }
    }

    /// Get cache statistics for monitoring
    pub fn stats(&self) -> CacheStats {
        CacheStats {
            cabins_cached: self.seats.entry_count(),
            roles_cached: self.roles.entry_count(),
            snapshot_enabled: self.snapshot_path.is_some(),
        }
    }

    /// Replace the seat map of a cabin
    pub async fn put_seats(&self, cabin_id: Uuid, seats: Vec<Seat>) {
        self.seats.insert(cabin_id, Arc::new(seats)).await;
    }

    /// Drop a cabin's seat map after its bookings changed, then flush the snapshot
    pub async fn invalidate_cabin(&self, cabin_id: Uuid) {
        self.seats.invalidate(&cabin_id).await;
        info!("Seat cache invalidated for cabin: {}", cabin_id);
        self.save_snapshot().await;
    }

    /// Load the seat snapshot, if one is configured and readable.
    ///
    /// A missing or unreadable snapshot leaves the cache empty.
    pub async fn load_snapshot(&self) -> usize {
        let Some(path) = &self.snapshot_path else {
            return 0;
        };

        let snapshot = match read_snapshot(path).await {
            Ok(snapshot) => snapshot,
            Err(e) => {
                warn!("Seat snapshot {} not loaded: {}", path.display(), e);
                return 0;
            }
        };

        let cabins = snapshot.len();
        for (cabin_id, seats) in snapshot {
            self.put_seats(cabin_id, seats).await;
        }
        info!("Loaded {} cabins from seat snapshot", cabins);
        cabins
    }

    /// Write the current seat maps to the snapshot file
    pub async fn save_snapshot(&self) {
        let Some(path) = &self.snapshot_path else {
            return;
        };

        let snapshot: HashMap<Uuid, Vec<Seat>> = self
            .seats
            .iter()
            .map(|(cabin_id, seats)| (*cabin_id, seats.as_ref().clone()))
            .collect();

        if let Err(e) = write_snapshot(path, &snapshot).await {
            warn!("Failed to write seat snapshot {}: {}", path.display(), e);
        } else {
            debug!("Seat snapshot written ({} cabins)", snapshot.len());
        }
    }
}

async fn read_snapshot(path: &Path) -> std::io::Result<HashMap<Uuid, Vec<Seat>>> {
    let bytes = tokio::fs::read(path).await?;
    serde_json::from_slice(&bytes).map_err(|e| std::io::Error::new(std::io::ErrorKind::InvalidData, e))
}

async fn write_snapshot(path: &Path, snapshot: &HashMap<Uuid, Vec<Seat>>) -> std::io::Result<()> {
    let bytes = serde_json::to_vec(snapshot)
        .map_err(|e| std::io::Error::new(std::io::ErrorKind::InvalidData, e))?;

    // Write-then-rename so a crash never leaves a truncated snapshot
    let tmp = path.with_extension("tmp");
    tokio::fs::write(&tmp, bytes).await?;
    tokio::fs::rename(&tmp, path).await
}

/// Cache statistics for monitoring endpoint
#[derive(Debug, Clone, Serialize)]
pub struct CacheStats {
    pub cabins_cached: u64,
    pub roles_cached: u64,
    pub snapshot_enabled: bool,
}

/// Start background cache warmer
///
/// Warms the cache on startup and refreshes every 10 minutes.
pub async fn start_cache_warmer(cache: AppCache, db: PgPool) {
    let mut interval = interval(Duration::from_secs(10 * 60));
    loop {
        // First tick completes immediately
        interval.tick().await;
        warm_cache(&cache, &db).await;
    }
}

/// Warm the seat cache from the database
async fn warm_cache(cache: &AppCache, db: &PgPool) {
    info!("Starting cache warm-up...");

    match queries::get_all_active_seats(db).await {
        Ok(seats) => {
            for (cabin_id, seats) in group_by_cabin(seats) {
                cache.put_seats(cabin_id, seats).await;
            }
            cache.save_snapshot().await;
        }
        Err(e) => warn!("Failed to warm seat cache: {}", e),
    }

    info!("Cache warm-up complete. Stats: {:?}", cache.stats());
}

fn group_by_cabin(seats: Vec<Seat>) -> HashMap<Uuid, Vec<Seat>> {
    let mut by_cabin: HashMap<Uuid, Vec<Seat>> = HashMap::new();
    for seat in seats {
        by_cabin.entry(seat.cabin_id).or_default().push(seat);
    }
    by_cabin
}
