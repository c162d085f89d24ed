//! Background passes that keep the snapshot cache warm.

use std::collections::HashSet;
use std::sync::Arc;

use futures_util::{
    future::{BoxFuture, FutureExt},
    stream, StreamExt,
};
use serde::Serialize;
use serde_json::json;

use super::{RetryLedger, SnapshotCache};
use crate::{
    aggregator::CatalogAggregator,
    artwork::ArtworkProvider,
    config::CacheConfig,
    error::{CatalogError, Result},
    logging::logger,
    stations::{all_presets, find_preset, CountryPreset, Snapshot, Station},
};

/// Stations per refreshed country whose artwork is fetched ahead of time.
const ARTWORK_PREFETCH: usize = 12;

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct RefreshReport {
    pub refreshed: Vec<String>,
    pub failed: Vec<String>,
    pub skipped: Vec<String>,
}

impl RefreshReport {
    fn record(&mut self, country: &str, outcome: &CountryOutcome) {
        let bucket = match outcome {
            CountryOutcome::Refreshed => &mut self.refreshed,
            CountryOutcome::Failed => &mut self.failed,
            CountryOutcome::Skipped => &mut self.skipped,
        };
        bucket.push(country.to_string());
    }
}

enum CountryOutcome {
    Refreshed,
    Failed,
    Skipped,
}

#[derive(Clone)]
pub struct Refresher {
    aggregator: CatalogAggregator,
    cache: Arc<SnapshotCache>,
    ledger: Arc<RetryLedger>,
    artwork: Option<Arc<dyn ArtworkProvider>>,
    config: CacheConfig,
}

impl Refresher {
    pub fn new(
        aggregator: CatalogAggregator,
        cache: Arc<SnapshotCache>,
        ledger: Arc<RetryLedger>,
        artwork: Option<Arc<dyn ArtworkProvider>>,
        config: CacheConfig,
    ) -> Self {
        Self {
            aggregator,
            cache,
            ledger,
            artwork,
            config,
        }
    }

    pub fn ledger(&self) -> &Arc<RetryLedger> {
        &self.ledger
    }

    /// One bounded attempt at a single country. Success resets the failure
    /// counter; failure or timeout bumps it and leaves the cached snapshot.
    pub async fn refresh_country(
        &self,
        country: &CountryPreset,
        limit: usize,
    ) -> Result<Option<Arc<Snapshot>>> {
        let previous_failures = self.ledger.failures(&country.id).await;
        let budget = self.config.country_timeout(previous_failures);
        let token = self.cache.observe(&country.id).await;

        let result = match tokio::time::timeout(budget, self.aggregator.aggregate(country, limit))
            .await
        {
            Ok(result) => result,
            Err(_) => Err(CatalogError::timeout(
                format!("refresh {}", country.id),
                budget,
            )),
        };

        match result {
            Ok(snapshot) => {
                self.ledger.record_success(&country.id).await;
                let applied = self.cache.commit(&token, snapshot).await;
                if let Some(snapshot) = &applied {
                    self.prefetch_artwork(snapshot);
                }
                Ok(applied)
            }
            Err(error) => {
                let failures = self.ledger.record_failure(&country.id).await;
                let marked_stale = self.cache.mark_stale(&token).await;
                logger().warn(
                    "cache.country_refresh_failed",
                    json!({
                        "country": country.id,
                        "error": error.to_string(),
                        "kind": error.kind(),
                        "failures": failures,
                        "marked_stale": marked_stale,
                    }),
                );
                Err(error)
            }
        }
    }

    /// Fills the cache for every preset once per installation.
    pub async fn initial_population(&self) -> RefreshReport {
        if self.ledger.initial_complete().await {
            return RefreshReport::default();
        }

        let mut eligible = Vec::new();
        let mut report = RefreshReport::default();
        for country in all_presets() {
            let failures = self.ledger.failures(&country.id).await;
            if failures >= self.config.max_attempts {
                logger().warn(
                    "cache.country_skipped",
                    json!({ "country": country.id, "failures": failures }),
                );
                report.record(&country.id, &CountryOutcome::Skipped);
            } else {
                eligible.push(country);
            }
        }

        self.run_pass(&mut report, eligible, self.config.initial_limit)
            .await;
        self.ledger.mark_initial_complete().await;
        self.log_report("initial", &report);
        report
    }

    /// Re-fetches the countries the user visited recently.
    pub async fn periodic_refresh(&self) -> RefreshReport {
        let countries: Vec<&'static CountryPreset> = self
            .cache
            .recent()
            .await
            .iter()
            .filter_map(|id| find_preset(id))
            .collect();
        let mut report = RefreshReport::default();
        self.run_pass(&mut report, countries, self.config.periodic_limit)
            .await;
        self.log_report("periodic", &report);
        report
    }

    /// Small pass at startup: the selection, a few seed countries and any
    /// country that failed before without reaching the cap.
    pub async fn launch_quick_refresh(&self, selected: &str) -> RefreshReport {
        let countries = self.launch_order(selected).await;
        let mut report = RefreshReport::default();
        self.run_pass(&mut report, countries, self.config.launch_limit)
            .await;
        self.log_report("launch", &report);
        report
    }

    pub async fn launch_order(&self, selected: &str) -> Vec<&'static CountryPreset> {
        let retryable = self.ledger.retryable(self.config.max_attempts).await;
        let ids = std::iter::once(selected.to_string())
            .chain(
                all_presets()
                    .iter()
                    .take(self.config.seed_countries)
                    .map(|preset| preset.id.clone()),
            )
            .chain(retryable);

        let mut ordered: Vec<&'static CountryPreset> = Vec::new();
        for id in ids {
            if let Some(preset) = find_preset(&id) {
                if !ordered.iter().any(|existing| existing.id == preset.id) {
                    ordered.push(preset);
                }
            }
        }
        ordered
    }

    /// Runs the periodic pass on the configured interval until the task is
    /// aborted. The first pass happens one interval after the call.
    pub async fn run_periodic(&self) {
        let period = self.config.refresh_interval();
        let mut interval = tokio::time::interval_at(tokio::time::Instant::now() + period, period);
        interval.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Delay);
        loop {
            interval.tick().await;
            self.periodic_refresh().await;
        }
    }

    async fn run_pass(
        &self,
        report: &mut RefreshReport,
        countries: Vec<&'static CountryPreset>,
        limit: usize,
    ) {
        let concurrency = self.config.population_concurrency.max(1);
        // Each attempt owns its refresher handle so the pass can run inside a
        // spawned task.
        let attempts: Vec<BoxFuture<'static, (&'static CountryPreset, CountryOutcome)>> =
            countries
                .into_iter()
                .map(|country| {
                    let refresher = self.clone();
                    async move {
                        let outcome = match refresher.refresh_country(country, limit).await {
                            Ok(Some(_)) => CountryOutcome::Refreshed,
                            // A foreground load took over; its result is what counts.
                            Ok(None) => CountryOutcome::Skipped,
                            Err(_) => CountryOutcome::Failed,
                        };
                        (country, outcome)
                    }
                    .boxed()
                })
                .collect();
        let outcomes: Vec<(&'static CountryPreset, CountryOutcome)> = stream::iter(attempts)
            .buffer_unordered(concurrency)
            .collect()
            .await;

        for (country, outcome) in outcomes {
            report.record(&country.id, &outcome);
        }
    }

    fn prefetch_artwork(&self, snapshot: &Arc<Snapshot>) {
        let Some(provider) = self.artwork.clone() else {
            return;
        };
        let country = snapshot.country_id.clone();
        let mut seen = HashSet::new();
        let targets: Vec<Station> = snapshot
            .top_stations
            .iter()
            .chain(snapshot.all_stations.iter())
            .filter(|station| seen.insert(station.id.clone()))
            .take(ARTWORK_PREFETCH)
            .cloned()
            .collect();
        tokio::spawn(async move {
            let mut fetched = 0usize;
            for station in &targets {
                if provider.fetch_artwork(station).await.is_some() {
                    fetched += 1;
                }
            }
            logger().debug(
                "artwork.prefetched",
                json!({ "country": country, "fetched": fetched }),
            );
        });
    }

    fn log_report(&self, pass: &str, report: &RefreshReport) {
        logger().info(
            "cache.pass_finished",
            json!({
                "pass": pass,
                "refreshed": report.refreshed,
                "failed": report.failed,
                "skipped": report.skipped,
            }),
        );
    }
}
