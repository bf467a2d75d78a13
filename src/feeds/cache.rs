//! In-memory history cache.
//!
//! Holds fetched price histories only, keyed by instrument id, so repeated
//! quotes and replays do not refetch. Nothing computed is cached.

use crate::state::PriceSeries;
use chrono::{DateTime, Duration, Utc};
use std::collections::HashMap;
use std::sync::{Arc, RwLock};

struct CachedSeries {
    fetched_at: DateTime<Utc>,
    series: Arc<PriceSeries>,
}

pub struct HistoryCache {
    max_age: Duration,
    entries: RwLock<HashMap<String, CachedSeries>>,
}

impl HistoryCache {
    pub fn new(max_age: Duration) -> Self {
        Self {
            max_age,
            entries: RwLock::new(HashMap::new()),
        }
    }

    /// Cached series if present and younger than `max_age`.
    pub fn get(&self, instrument_id: &str) -> Option<Arc<PriceSeries>> {
        let entries = self.entries.read().ok()?;
        let entry = entries.get(instrument_id)?;
        let age = Utc::now() - entry.fetched_at;
        (age < self.max_age).then(|| entry.series.clone())
    }

    pub fn insert(&self, instrument_id: &str, series: Arc<PriceSeries>) {
        // A poisoned lock only costs us the cache
        if let Ok(mut entries) = self.entries.write() {
            entries.insert(
                instrument_id.to_string(),
                CachedSeries {
                    fetched_at: Utc::now(),
                    series,
                },
            );
        }
    }
}
