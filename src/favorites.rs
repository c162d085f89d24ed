use std::collections::HashSet;
use std::sync::Arc;

use serde::{Deserialize, Serialize};
use serde_json::Value;
use tokio::sync::Mutex;

use crate::{storage::KeyValueStore, stations::Station};

pub const FAVORITES_KEY: &str = "favorites";
const FAVORITES_STORAGE_VERSION: u32 = 2;

/// Favorite stations persisted through a [`KeyValueStore`]. The in-memory
/// list is authoritative once loaded; every mutation writes it back.
#[derive(Clone)]
pub struct FavoritesStore {
    store: Arc<dyn KeyValueStore>,
    entries: Arc<Mutex<Option<Vec<FavoriteEntry>>>>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct FavoriteEntry {
    pub id: String,
    #[serde(rename = "savedAt")]
    pub saved_at: i64,
    pub station: Station,
}

#[derive(Serialize)]
struct FavoritesPayload<'a> {
    version: u32,
    entries: &'a [FavoriteEntry],
}

#[derive(Deserialize)]
struct StoredEntry {
    #[serde(rename = "savedAt")]
    saved_at: Option<i64>,
    station: Option<Station>,
}

impl FavoritesStore {
    pub fn new(store: Arc<dyn KeyValueStore>) -> Self {
        Self {
            store,
            entries: Arc::new(Mutex::new(None)),
        }
    }

    /// Favorite stations, oldest first.
    pub async fn load(&self) -> anyhow::Result<Vec<Station>> {
        let mut guard = self.entries.lock().await;
        let entries = self.ensure_loaded(&mut guard).await?;
        Ok(entries.iter().map(|entry| entry.station.clone()).collect())
    }

    pub async fn save(&self, stations: &[Station]) -> anyhow::Result<()> {
        let now = current_timestamp();
        let entries = dedupe_entries(
            stations
                .iter()
                .map(|station| FavoriteEntry {
                    id: station.id.clone(),
                    saved_at: now,
                    station: station.clone(),
                })
                .collect(),
        );
        let mut guard = self.entries.lock().await;
        self.write(&entries).await?;
        *guard = Some(entries);
        Ok(())
    }

    pub async fn contains(&self, station_id: &str) -> anyhow::Result<bool> {
        let mut guard = self.entries.lock().await;
        let entries = self.ensure_loaded(&mut guard).await?;
        Ok(entries.iter().any(|entry| entry.id == station_id))
    }

    pub async fn ids(&self) -> anyhow::Result<HashSet<String>> {
        let mut guard = self.entries.lock().await;
        let entries = self.ensure_loaded(&mut guard).await?;
        Ok(entries.iter().map(|entry| entry.id.clone()).collect())
    }

    /// Adds or removes the station. Returns whether it is a favorite now.
    pub async fn toggle(&self, station: &Station) -> anyhow::Result<bool> {
        let mut guard = self.entries.lock().await;
        let mut entries = self.ensure_loaded(&mut guard).await?.clone();
        let now_favorite = match entries.iter().position(|entry| entry.id == station.id) {
            Some(index) => {
                entries.remove(index);
                false
            }
            None => {
                entries.push(FavoriteEntry {
                    id: station.id.clone(),
                    saved_at: current_timestamp(),
                    station: station.clone(),
                });
                true
            }
        };
        self.write(&entries).await?;
        *guard = Some(entries);
        Ok(now_favorite)
    }

    async fn ensure_loaded<'a>(
        &self,
        slot: &'a mut Option<Vec<FavoriteEntry>>,
    ) -> anyhow::Result<&'a Vec<FavoriteEntry>> {
        if slot.is_none() {
            let raw = self.store.load(FAVORITES_KEY).await?;
            let entries = raw
                .map(|value| dedupe_entries(normalize_entries_from_raw(&value)))
                .unwrap_or_default();
            *slot = Some(entries);
        }
        Ok(slot.get_or_insert_with(Vec::new))
    }

    async fn write(&self, entries: &[FavoriteEntry]) -> anyhow::Result<()> {
        let payload = FavoritesPayload {
            version: FAVORITES_STORAGE_VERSION,
            entries,
        };
        let serialized = serde_json::to_value(&payload)?;
        self.store.save(FAVORITES_KEY, &serialized).await
    }
}

/// Accepts the versioned payload as well as older bare arrays of entries or
/// of stations.
fn normalize_entries_from_raw(value: &Value) -> Vec<FavoriteEntry> {
    match value {
        Value::Array(items) => items.iter().filter_map(entry_from_item).collect(),
        Value::Object(map) => map
            .get("entries")
            .map(normalize_entries_from_raw)
            .unwrap_or_default(),
        _ => vec![],
    }
}

fn entry_from_item(item: &Value) -> Option<FavoriteEntry> {
    if item.get("station").is_some() {
        let stored = serde_json::from_value::<StoredEntry>(item.clone()).ok()?;
        let station = stored.station?;
        return Some(FavoriteEntry {
            id: station.id.clone(),
            saved_at: stored.saved_at.unwrap_or_else(current_timestamp),
            station,
        });
    }
    let station = serde_json::from_value::<Station>(item.clone()).ok()?;
    Some(FavoriteEntry {
        id: station.id.clone(),
        saved_at: current_timestamp(),
        station,
    })
}

fn current_timestamp() -> i64 {
    chrono::Utc::now().timestamp_millis()
}

pub fn dedupe_entries(entries: Vec<FavoriteEntry>) -> Vec<FavoriteEntry> {
    let mut seen = HashSet::new();
    entries
        .into_iter()
        .filter(|entry| !entry.id.trim().is_empty() && seen.insert(entry.id.clone()))
        .collect()
}
