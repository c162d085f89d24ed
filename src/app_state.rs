use std::collections::HashMap;
use std::sync::{
    atomic::{AtomicU64, Ordering},
    Arc, Mutex, MutexGuard,
};

use anyhow::Context;
use serde_json::json;
use tokio::sync::watch;
use tokio::task::JoinHandle;

use crate::{
    aggregator::CatalogAggregator,
    artwork::{ArtworkProvider, HttpArtworkProvider},
    cache::{LoadToken, RefreshReport, Refresher, RetryLedger, SnapshotCache},
    config::Config,
    error::{CatalogError, Result},
    favorites::FavoritesStore,
    logging::logger,
    playback::{AudioOutput, NullOutput, PlaybackEngine, PlaybackState, PlaybackStatus},
    radio_browser::{DirectoryService, RadioBrowserClient},
    stations::{
        self, all_presets, default_preset, unique_by_id, CountryPreset, Snapshot, Station,
        StationFilter, StationSort,
    },
    storage::{FileStore, KeyValueStore},
};

/// What list screens render for the selected country.
#[derive(Debug, Clone, Default)]
pub struct CatalogView {
    pub country_id: String,
    pub snapshot: Option<Arc<Snapshot>>,
    pub loading: bool,
    /// The snapshot shown is left over from an earlier load that has since
    /// failed to refresh.
    pub stale: bool,
    pub error: Option<String>,
}

#[derive(Debug, Clone)]
pub enum LoadOutcome {
    Applied(Arc<Snapshot>),
    /// A newer selection or load took over; this one's results were dropped.
    Superseded,
}

#[derive(Debug, Clone)]
pub enum SearchOutcome {
    Results(Vec<Station>),
    Superseded,
}

struct Selection {
    country: String,
    generation: u64,
}

/// Ticket for one `load_country` call against the global selection.
struct SelectionTicket {
    country: String,
    generation: u64,
}

#[derive(Clone)]
pub struct AppState {
    pub config: Arc<Config>,
    aggregator: CatalogAggregator,
    cache: Arc<SnapshotCache>,
    refresher: Arc<Refresher>,
    engine: PlaybackEngine,
    favorites: FavoritesStore,
    selection: Arc<Mutex<Selection>>,
    search_generation: Arc<AtomicU64>,
    view: Arc<watch::Sender<CatalogView>>,
    background: Arc<Mutex<Option<JoinHandle<()>>>>,
}

impl AppState {
    /// Wires the production services: Radio Browser, file-backed state,
    /// HTTP artwork cache and a silent audio output.
    pub async fn initialize(config: Config) -> anyhow::Result<Self> {
        let directory = RadioBrowserClient::new(&config.radio_browser)
            .context("failed to build radio browser client")?;
        let store = FileStore::new(config.state_dir.clone());
        let artwork = HttpArtworkProvider::new(&config.artwork)
            .context("failed to build artwork client")?;
        Ok(Self::with_services(
            config,
            Arc::new(directory),
            Arc::new(store),
            Arc::new(NullOutput),
            Some(Arc::new(artwork)),
        )
        .await)
    }

    pub async fn with_services(
        config: Config,
        directory: Arc<dyn DirectoryService>,
        store: Arc<dyn KeyValueStore>,
        output: Arc<dyn AudioOutput>,
        artwork: Option<Arc<dyn ArtworkProvider>>,
    ) -> Self {
        let aggregator = CatalogAggregator::new(directory, config.catalog.clone());
        let cache = Arc::new(SnapshotCache::new(config.cache.recent_capacity));
        let ledger = Arc::new(RetryLedger::open(store.clone()).await);
        let refresher = Arc::new(Refresher::new(
            aggregator.clone(),
            cache.clone(),
            ledger,
            artwork,
            config.cache.clone(),
        ));
        let engine = PlaybackEngine::new(output, &config.playback);
        let favorites = FavoritesStore::new(store);
        let selected = default_preset().id.clone();
        let (view, _) = watch::channel(CatalogView {
            country_id: selected.clone(),
            ..CatalogView::default()
        });

        Self {
            config: Arc::new(config),
            aggregator,
            cache,
            refresher,
            engine,
            favorites,
            selection: Arc::new(Mutex::new(Selection {
                country: selected,
                generation: 0,
            })),
            search_generation: Arc::new(AtomicU64::new(0)),
            view: Arc::new(view),
            background: Arc::new(Mutex::new(None)),
        }
    }

    pub fn catalog_view(&self) -> watch::Receiver<CatalogView> {
        self.view.subscribe()
    }

    pub fn playback_status(&self) -> watch::Receiver<PlaybackStatus> {
        self.engine.subscribe()
    }

    pub fn selected_country(&self) -> String {
        lock(&self.selection).country.clone()
    }

    pub fn cache(&self) -> &Arc<SnapshotCache> {
        &self.cache
    }

    pub fn refresher(&self) -> &Arc<Refresher> {
        &self.refresher
    }

    /// Selects `country` and loads it in two phases: a quick bulk fetch that
    /// is shown as soon as it lands, then the expanded fetch plus brand and
    /// regional discovery merged into the final snapshot.
    pub async fn load_country(&self, country: &CountryPreset) -> Result<LoadOutcome> {
        let ticket = self.select(country);
        self.cache.record_visit(&country.id).await;
        let token = self.cache.begin_load(&country.id).await;

        match self.cache.get(&country.id).await {
            Some(entry) => self.publish(&ticket, Some(entry.snapshot), true, entry.stale, None),
            None => self.publish(&ticket, None, true, false, None),
        }

        let catalog = self.aggregator.config().clone();
        let quick = match self
            .aggregator
            .fetch_country_stations(country, catalog.quick_limit)
            .await
        {
            Ok(stations) => stations,
            Err(error) => return self.fail_load(&ticket, &token, error).await,
        };
        if !self.is_active(&ticket, &token).await {
            return Ok(LoadOutcome::Superseded);
        }
        let snapshot = match self.aggregator.build_snapshot(quick.clone(), country).await {
            Ok(snapshot) => snapshot,
            Err(error) => return self.fail_load(&ticket, &token, error).await,
        };
        if !self.is_active(&ticket, &token).await {
            return Ok(LoadOutcome::Superseded);
        }
        match self.cache.commit(&token, snapshot).await {
            Some(snapshot) => self.publish(&ticket, Some(snapshot), true, false, None),
            None => return Ok(LoadOutcome::Superseded),
        }

        let (expanded, discovered) = tokio::join!(
            self.aggregator
                .fetch_country_stations(country, catalog.expanded_limit),
            self.aggregator.fetch_discovery_stations(country)
        );
        let expanded = expanded.unwrap_or_else(|error| {
            logger().warn(
                "catalog.expanded_fetch_failed",
                json!({ "country": country.id, "error": error.to_string() }),
            );
            Vec::new()
        });
        if !self.is_active(&ticket, &token).await {
            return Ok(LoadOutcome::Superseded);
        }

        let union = unique_by_id(quick.into_iter().chain(expanded).chain(discovered));
        let snapshot = match self.aggregator.build_snapshot(union, country).await {
            Ok(snapshot) => snapshot,
            Err(error) => return self.fail_load(&ticket, &token, error).await,
        };
        if !self.is_active(&ticket, &token).await {
            return Ok(LoadOutcome::Superseded);
        }
        match self.cache.commit(&token, snapshot).await {
            Some(snapshot) => {
                self.publish(&ticket, Some(Arc::clone(&snapshot)), false, false, None);
                logger().info(
                    "catalog.country_loaded",
                    json!({
                        "country": country.id,
                        "stations": snapshot.station_count,
                        "top": snapshot.top_stations.len(),
                    }),
                );
                Ok(LoadOutcome::Applied(snapshot))
            }
            None => Ok(LoadOutcome::Superseded),
        }
    }

    async fn fail_load(
        &self,
        ticket: &SelectionTicket,
        token: &LoadToken,
        error: CatalogError,
    ) -> Result<LoadOutcome> {
        // Only a failure of the newest load for the country may flag its
        // snapshot; an overtaken load is dropped without side effects.
        self.cache.mark_stale(token).await;
        if !self.is_active(ticket, token).await {
            return Ok(LoadOutcome::Superseded);
        }
        let previous = self.cache.snapshot(&ticket.country).await;
        let stale = previous.is_some();
        self.publish(ticket, previous, false, stale, Some(error.to_string()));
        logger().warn(
            "catalog.country_load_failed",
            json!({ "country": ticket.country, "error": error.to_string(), "kind": error.kind() }),
        );
        Err(error)
    }

    fn select(&self, country: &CountryPreset) -> SelectionTicket {
        let mut selection = lock(&self.selection);
        selection.generation += 1;
        selection.country = country.id.clone();
        SelectionTicket {
            country: country.id.clone(),
            generation: selection.generation,
        }
    }

    async fn is_active(&self, ticket: &SelectionTicket, token: &LoadToken) -> bool {
        let selected = {
            let selection = lock(&self.selection);
            selection.generation == ticket.generation && selection.country == ticket.country
        };
        selected && self.cache.is_current(token).await
    }

    fn publish(
        &self,
        ticket: &SelectionTicket,
        snapshot: Option<Arc<Snapshot>>,
        loading: bool,
        stale: bool,
        error: Option<String>,
    ) {
        if let Some(snapshot) = &snapshot {
            self.engine
                .set_variants(Arc::new(snapshot.variants.clone()));
        } else {
            self.engine.set_variants(Arc::new(HashMap::new()));
        }
        self.view.send_replace(CatalogView {
            country_id: ticket.country.clone(),
            snapshot,
            loading,
            stale,
            error,
        });
    }

    /// Debounced name search. Only the most recent call returns results.
    pub async fn search(&self, query: &str) -> Result<SearchOutcome> {
        let generation = self.search_generation.fetch_add(1, Ordering::SeqCst) + 1;
        let query = query.trim().to_string();
        if query.is_empty() {
            return Ok(SearchOutcome::Results(Vec::new()));
        }

        tokio::time::sleep(self.aggregator.config().search_debounce()).await;
        if self.search_generation.load(Ordering::SeqCst) != generation {
            return Ok(SearchOutcome::Superseded);
        }
        let results = self.aggregator.search(&query, None).await?;
        if self.search_generation.load(Ordering::SeqCst) != generation {
            return Ok(SearchOutcome::Superseded);
        }
        Ok(SearchOutcome::Results(results))
    }

    pub async fn discover(&self) -> Vec<Station> {
        self.aggregator.discover(all_presets()).await
    }

    pub fn play(&self, station: &Station, queue: Option<Vec<Station>>) -> Result<u64> {
        self.engine.play(station, queue)
    }

    pub fn play_next(&self) -> Result<Option<u64>> {
        self.engine.play_next()
    }

    pub fn play_previous(&self) -> Result<Option<u64>> {
        self.engine.play_previous()
    }

    pub fn toggle_playback(&self) -> PlaybackState {
        self.engine.toggle_playback()
    }

    pub fn set_volume(&self, volume: f32) -> f32 {
        self.engine.set_volume(volume)
    }

    pub fn set_network_constraints(&self, constrained: bool, expensive: bool) {
        self.engine.set_network_constraints(constrained, expensive);
    }

    pub fn playback(&self) -> &PlaybackEngine {
        &self.engine
    }

    pub async fn toggle_favorite(&self, station: &Station) -> Result<bool> {
        Ok(self.favorites.toggle(station).await?)
    }

    pub async fn favorites(&self) -> Result<Vec<Station>> {
        Ok(self.favorites.load().await?)
    }

    fn current_snapshot(&self) -> Option<Arc<Snapshot>> {
        self.view.borrow().snapshot.clone()
    }

    pub async fn filtered_stations(
        &self,
        filter: StationFilter,
        sort: StationSort,
    ) -> Result<Vec<Station>> {
        let Some(snapshot) = self.current_snapshot() else {
            return Ok(Vec::new());
        };
        let favorites = self.favorites.ids().await?;
        Ok(stations::filtered_stations(&snapshot, filter, sort, &favorites))
    }

    pub async fn stations_for_filter(
        &self,
        filter: StationFilter,
        limit: usize,
    ) -> Result<Vec<Station>> {
        let Some(snapshot) = self.current_snapshot() else {
            return Ok(Vec::new());
        };
        let favorites = self.favorites.ids().await?;
        Ok(stations::stations_for_filter(
            &snapshot, filter, &favorites, limit,
        ))
    }

    pub fn genre_buttons(&self) -> Vec<String> {
        match self.current_snapshot() {
            Some(snapshot) => stations::genre_buttons(&snapshot),
            None => vec![stations::CANONICAL_GENRES[0].to_string()],
        }
    }

    pub fn stations_for_genre(&self, genre: &str) -> Vec<Station> {
        self.current_snapshot()
            .map(|snapshot| stations::stations_for_genre(&snapshot, genre))
            .unwrap_or_default()
    }

    /// Runs the initial population (once per installation), the launch
    /// refresh and then the periodic loop on a background task. Calling it
    /// again replaces the running task.
    pub fn start_background_refresh(&self) {
        let refresher = Arc::clone(&self.refresher);
        let selected = self.selected_country();
        let handle = tokio::spawn(async move {
            refresher.initial_population().await;
            refresher.launch_quick_refresh(&selected).await;
            refresher.run_periodic().await;
        });
        if let Some(previous) = lock(&self.background).replace(handle) {
            previous.abort();
        }
    }

    pub fn stop_background_refresh(&self) {
        if let Some(handle) = lock(&self.background).take() {
            handle.abort();
        }
    }

    /// Launch pass for the current selection, awaited in place.
    pub async fn refresh_now(&self) -> RefreshReport {
        self.refresher
            .launch_quick_refresh(&self.selected_country())
            .await
    }
}

fn lock<T>(mutex: &Mutex<T>) -> MutexGuard<'_, T> {
    mutex.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
}
