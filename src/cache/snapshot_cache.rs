//! In-memory catalog cache: one snapshot per country plus the generation
//! counters that decide whether a finished load may still be applied.

use std::collections::{HashMap, VecDeque};
use std::sync::Arc;

use chrono::{DateTime, Utc};
use serde_json::json;
use tokio::sync::RwLock;

use crate::{logging::logger, stations::Snapshot};

#[derive(Debug, Clone)]
pub struct CacheEntry {
    pub snapshot: Arc<Snapshot>,
    pub fingerprint: String,
    pub updated_at: DateTime<Utc>,
    /// Set when the last load for this country failed; the snapshot is the
    /// last good one.
    pub stale: bool,
}

/// Proof that a load started at a given generation for a country.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LoadToken {
    country: String,
    generation: u64,
}

impl LoadToken {
    pub fn country(&self) -> &str {
        &self.country
    }
}

#[derive(Default)]
struct CacheState {
    entries: HashMap<String, CacheEntry>,
    generations: HashMap<String, u64>,
    recent: VecDeque<String>,
}

pub struct SnapshotCache {
    state: RwLock<CacheState>,
    recent_capacity: usize,
}

impl SnapshotCache {
    pub fn new(recent_capacity: usize) -> Self {
        Self {
            state: RwLock::new(CacheState::default()),
            recent_capacity: recent_capacity.max(1),
        }
    }

    pub async fn get(&self, country: &str) -> Option<CacheEntry> {
        self.state.read().await.entries.get(country).cloned()
    }

    pub async fn snapshot(&self, country: &str) -> Option<Arc<Snapshot>> {
        self.state
            .read()
            .await
            .entries
            .get(country)
            .map(|entry| Arc::clone(&entry.snapshot))
    }

    /// Starts a foreground load. Any load for the same country begun earlier
    /// can no longer commit.
    pub async fn begin_load(&self, country: &str) -> LoadToken {
        let mut state = self.state.write().await;
        let generation = state.generations.entry(country.to_string()).or_insert(0);
        *generation += 1;
        LoadToken {
            country: country.to_string(),
            generation: *generation,
        }
    }

    /// Token for a background pass. It does not displace loads already in
    /// flight but is displaced by any load begun after it.
    pub async fn observe(&self, country: &str) -> LoadToken {
        let state = self.state.read().await;
        LoadToken {
            country: country.to_string(),
            generation: state.generations.get(country).copied().unwrap_or(0),
        }
    }

    pub async fn is_current(&self, token: &LoadToken) -> bool {
        let state = self.state.read().await;
        Self::token_matches(&state, token)
    }

    fn token_matches(state: &CacheState, token: &LoadToken) -> bool {
        state.generations.get(&token.country).copied().unwrap_or(0) == token.generation
    }

    /// Replaces the country's snapshot if `token` is still the newest load.
    /// Returns the applied snapshot, or `None` when superseded.
    pub async fn commit(&self, token: &LoadToken, snapshot: Snapshot) -> Option<Arc<Snapshot>> {
        let fingerprint = snapshot.fingerprint();
        let mut state = self.state.write().await;
        if !Self::token_matches(&state, token) {
            logger().debug(
                "cache.commit_superseded",
                json!({ "country": token.country, "generation": token.generation }),
            );
            return None;
        }

        let changed = state
            .entries
            .get(&token.country)
            .map(|entry| entry.fingerprint != fingerprint)
            .unwrap_or(true);
        let snapshot = Arc::new(snapshot);
        state.entries.insert(
            token.country.clone(),
            CacheEntry {
                snapshot: Arc::clone(&snapshot),
                fingerprint,
                updated_at: Utc::now(),
                stale: false,
            },
        );
        logger().debug(
            "cache.committed",
            json!({
                "country": token.country,
                "stations": snapshot.station_count,
                "changed": changed,
            }),
        );
        Some(snapshot)
    }

    /// Flags the cached snapshot as out of date after the load behind `token`
    /// failed; the snapshot itself stays. A token that has been superseded
    /// changes nothing, so a late failure cannot taint a newer snapshot.
    /// Returns whether an entry was flagged.
    pub async fn mark_stale(&self, token: &LoadToken) -> bool {
        let mut state = self.state.write().await;
        if !Self::token_matches(&state, token) {
            return false;
        }
        match state.entries.get_mut(&token.country) {
            Some(entry) => {
                entry.stale = true;
                true
            }
            None => false,
        }
    }

    /// Moves `country` to the front of the recently visited list.
    pub async fn record_visit(&self, country: &str) {
        let mut state = self.state.write().await;
        state.recent.retain(|existing| existing != country);
        state.recent.push_front(country.to_string());
        state.recent.truncate(self.recent_capacity);
    }

    pub async fn recent(&self) -> Vec<String> {
        self.state.read().await.recent.iter().cloned().collect()
    }

    pub async fn countries(&self) -> Vec<String> {
        let mut countries: Vec<String> = self.state.read().await.entries.keys().cloned().collect();
        countries.sort();
        countries
    }
}
