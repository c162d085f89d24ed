#![allow(dead_code)]

use std::collections::{HashMap, HashSet};
use std::path::PathBuf;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};

use async_trait::async_trait;
use tokio::sync::{Notify, Semaphore};
use url::Url;

use radio_catalog::{
    config::{
        ArtworkConfig, CacheConfig, CatalogConfig, Config, PlaybackConfig, RadioBrowserConfig,
    },
    playback::{AttemptTicket, AudioOutput},
    radio_browser::{DirectoryService, StationOrder},
    stations::Station,
    DirectoryError,
};

pub fn station(id: &str, name: &str, country: &str) -> Station {
    Station::new(id, name)
        .with_country(country)
        .with_urls(None, &format!("http://stream.example.com/{id}"))
}

/// Numbered stations for one country: `{prefix}-1 .. {prefix}-{count}`.
pub fn stations(prefix: &str, country: &str, count: usize) -> Vec<Station> {
    (1..=count)
        .map(|n| station(&format!("{prefix}-{n}"), &format!("{prefix} Station {n}"), country))
        .collect()
}

pub fn test_config() -> Config {
    Config {
        radio_browser: RadioBrowserConfig::default(),
        catalog: CatalogConfig {
            min_limit: 1,
            max_limit: 100,
            quick_limit: 3,
            expanded_limit: 8,
            search_debounce_ms: 50,
            ..CatalogConfig::default()
        },
        cache: CacheConfig {
            max_attempts: 3,
            country_timeout_ms: 1_000,
            retry_timeout_ms: 2_000,
            seed_countries: 2,
            population_concurrency: 4,
            ..CacheConfig::default()
        },
        playback: PlaybackConfig {
            connect_timeout_ms: 1_000,
        },
        artwork: ArtworkConfig {
            cache_dir: PathBuf::from("unused-artwork"),
            max_cache_bytes: 1024,
            timeout_ms: 1_000,
            user_agent: "radio-catalog-tests".into(),
        },
        state_dir: PathBuf::from("unused-state"),
    }
}

/// In-process stand-in for the station directory.
///
/// Bulk queries answer with the first `limit` stations registered for the
/// country code (or its api name). Individual queries can be made to fail,
/// countries can be held until released, and name searches answer from a
/// fixed table. Whether a query fails is decided when it arrives, so a held
/// query keeps the outcome it was dealt.
#[derive(Default)]
pub struct MockDirectory {
    bulk: Mutex<HashMap<String, Vec<Station>>>,
    searches: Mutex<HashMap<String, Vec<Station>>>,
    failing: Mutex<HashSet<String>>,
    gates: Mutex<HashMap<String, Arc<Semaphore>>>,
    parked: Mutex<Vec<Arc<Semaphore>>>,
    max_limit: Mutex<Option<usize>>,
    pub gate_entered: Notify,
    bulk_calls: AtomicUsize,
    search_calls: AtomicUsize,
}

impl MockDirectory {
    pub fn new() -> Arc<Self> {
        Arc::new(Self::default())
    }

    /// Registers the same list under both the code and the api name.
    pub fn set_country(&self, code: &str, api_name: &str, list: Vec<Station>) {
        let mut bulk = self.bulk.lock().unwrap();
        bulk.insert(code.to_string(), list.clone());
        bulk.insert(api_name.to_string(), list);
    }

    pub fn set_search(&self, query: &str, list: Vec<Station>) {
        self.searches
            .lock()
            .unwrap()
            .insert(query.to_lowercase(), list);
    }

    /// Query keys look like `code:GB:votes` or `name:Germany:name`; a bare
    /// `GB` or `Germany` fails every query for that key.
    pub fn fail(&self, key: &str) {
        self.failing.lock().unwrap().insert(key.to_string());
    }

    /// Every bulk query asking for more than `limit` stations fails.
    pub fn fail_above(&self, limit: usize) {
        *self.max_limit.lock().unwrap() = Some(limit);
    }

    pub fn heal(&self, key: &str) {
        self.failing.lock().unwrap().remove(key);
    }

    /// Holds bulk queries for `key` until `release` is called.
    pub fn hold(&self, key: &str) {
        self.gates
            .lock()
            .unwrap()
            .insert(key.to_string(), Arc::new(Semaphore::new(0)));
    }

    pub fn release(&self, key: &str) {
        if let Some(gate) = self.gates.lock().unwrap().remove(key) {
            gate.close();
        }
    }

    /// Lets new queries for `key` through while the ones already waiting
    /// stay held until `release_parked`.
    pub fn admit(&self, key: &str) {
        if let Some(gate) = self.gates.lock().unwrap().remove(key) {
            self.parked.lock().unwrap().push(gate);
        }
    }

    pub fn release_parked(&self) {
        for gate in self.parked.lock().unwrap().drain(..) {
            gate.close();
        }
    }

    pub fn bulk_calls(&self) -> usize {
        self.bulk_calls.load(Ordering::SeqCst)
    }

    pub fn search_calls(&self) -> usize {
        self.search_calls.load(Ordering::SeqCst)
    }

    async fn bulk(
        &self,
        kind: &str,
        key: &str,
        order: StationOrder,
        limit: usize,
    ) -> Result<Vec<Station>, DirectoryError> {
        self.bulk_calls.fetch_add(1, Ordering::SeqCst);
        let query = format!("{kind}:{key}:{}", order.as_str());
        let fails = {
            let failing = self.failing.lock().unwrap();
            let too_large = self.max_limit.lock().unwrap().is_some_and(|max| limit > max);
            too_large || failing.contains(key) || failing.contains(&query)
        };

        let gate = self.gates.lock().unwrap().get(key).cloned();
        if let Some(gate) = gate {
            self.gate_entered.notify_one();
            // Closing the gate wakes every waiter with an error.
            let _ = gate.acquire().await;
        }

        if fails {
            return Err(DirectoryError::Status(503));
        }
        Ok(self
            .bulk
            .lock()
            .unwrap()
            .get(key)
            .map(|list| list.iter().take(limit).cloned().collect())
            .unwrap_or_default())
    }
}

#[async_trait]
impl DirectoryService for MockDirectory {
    async fn fetch_by_country_code(
        &self,
        code: &str,
        order: StationOrder,
        _descending: bool,
        limit: usize,
    ) -> Result<Vec<Station>, DirectoryError> {
        self.bulk("code", code, order, limit).await
    }

    async fn fetch_by_country_name(
        &self,
        name: &str,
        order: StationOrder,
        _descending: bool,
        limit: usize,
    ) -> Result<Vec<Station>, DirectoryError> {
        self.bulk("name", name, order, limit).await
    }

    async fn search_by_name(
        &self,
        query: &str,
        limit: usize,
    ) -> Result<Vec<Station>, DirectoryError> {
        self.search_calls.fetch_add(1, Ordering::SeqCst);
        Ok(self
            .searches
            .lock()
            .unwrap()
            .get(&query.to_lowercase())
            .map(|list| list.iter().take(limit).cloned().collect())
            .unwrap_or_default())
    }
}

/// Audio output that only records what it was asked to do.
#[derive(Default)]
pub struct RecordingOutput {
    pub loads: Mutex<Vec<(Url, AttemptTicket)>>,
    pub pauses: AtomicUsize,
    pub resumes: AtomicUsize,
    pub volumes: Mutex<Vec<f32>>,
}

impl RecordingOutput {
    pub fn new() -> Arc<Self> {
        Arc::new(Self::default())
    }

    pub fn loads(&self) -> Vec<(Url, AttemptTicket)> {
        self.loads.lock().unwrap().clone()
    }

    pub fn last_ticket(&self) -> AttemptTicket {
        self.loads.lock().unwrap().last().expect("no load yet").1
    }
}

impl AudioOutput for RecordingOutput {
    fn load_and_play(&self, url: &Url, ticket: AttemptTicket) {
        self.loads.lock().unwrap().push((url.clone(), ticket));
    }

    fn pause(&self) {
        self.pauses.fetch_add(1, Ordering::SeqCst);
    }

    fn resume(&self) {
        self.resumes.fetch_add(1, Ordering::SeqCst);
    }

    fn set_volume(&self, volume: f32) {
        self.volumes.lock().unwrap().push(volume);
    }
}
