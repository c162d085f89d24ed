//! Fans queries out to the directory service and folds the answers into one
//! station list per country.

use std::sync::Arc;

use futures_util::future::join_all;
use serde_json::json;

use crate::{
    config::CatalogConfig,
    error::{CatalogError, Result},
    logging::logger,
    radio_browser::{DirectoryService, StationOrder},
    stations::{
        self, curate_top_stations, regional_search_terms, sanitize_stations,
        station_belongs_to_country, unique_by_id, CountryPreset, Snapshot, Station,
    },
};

/// Bulk query plan: three orderings, each asked by country code and then by
/// country name.
const BULK_ORDERS: [(StationOrder, bool); 3] = [
    (StationOrder::Votes, true),
    (StationOrder::ClickCount, true),
    (StationOrder::Name, false),
];

const DISCOVER_COUNTRIES: usize = 6;
const DISCOVER_PER_COUNTRY: usize = 5;

#[derive(Clone)]
pub struct CatalogAggregator {
    directory: Arc<dyn DirectoryService>,
    config: CatalogConfig,
}

impl CatalogAggregator {
    pub fn new(directory: Arc<dyn DirectoryService>, config: CatalogConfig) -> Self {
        Self { directory, config }
    }

    pub fn config(&self) -> &CatalogConfig {
        &self.config
    }

    /// Six concurrent bulk queries. A failed query contributes nothing; only
    /// when all six come back empty is the country unavailable.
    pub async fn fetch_country_stations(
        &self,
        country: &CountryPreset,
        limit: usize,
    ) -> Result<Vec<Station>> {
        let limit = self.config.clamp_limit(limit);
        let code = country.country_code();

        let mut queries = Vec::with_capacity(BULK_ORDERS.len() * 2);
        for (order, descending) in BULK_ORDERS {
            queries.push(
                self.directory
                    .fetch_by_country_code(&code, order, descending, limit),
            );
        }
        for (order, descending) in BULK_ORDERS {
            queries.push(self.directory.fetch_by_country_name(
                &country.api_name,
                order,
                descending,
                limit,
            ));
        }

        let mut merged = Vec::new();
        let mut failed = 0usize;
        for (index, result) in join_all(queries).await.into_iter().enumerate() {
            match result {
                Ok(stations) => merged.extend(stations),
                Err(error) => {
                    failed += 1;
                    logger().warn(
                        "catalog.bulk_query_failed",
                        json!({
                            "country": country.id,
                            "query": index,
                            "error": error.to_string(),
                        }),
                    );
                }
            }
        }

        if merged.is_empty() {
            logger().warn(
                "catalog.directory_unavailable",
                json!({ "country": country.id, "failed_queries": failed }),
            );
            return Err(CatalogError::DirectoryUnavailable {
                country: country.id.clone(),
            });
        }

        let stations = unique_by_id(merged);
        logger().debug(
            "catalog.bulk_fetched",
            json!({
                "country": country.id,
                "limit": limit,
                "stations": stations.len(),
                "failed_queries": failed,
            }),
        );
        Ok(stations)
    }

    /// Name searches for each flagship brand, kept only when the directory
    /// places the result in this country.
    pub async fn fetch_major_brand_stations(&self, country: &CountryPreset) -> Vec<Station> {
        self.search_within_country(
            country,
            &country.top_brands,
            self.config.brand_search_limit,
            "brand",
        )
        .await
    }

    pub async fn fetch_regional_stations(&self, country: &CountryPreset) -> Vec<Station> {
        let terms = regional_search_terms(country);
        self.search_within_country(
            country,
            &terms,
            self.config.regional_search_limit,
            "regional",
        )
        .await
    }

    /// Brand and regional discovery together, brand results first.
    pub async fn fetch_discovery_stations(&self, country: &CountryPreset) -> Vec<Station> {
        let (brands, regional) = tokio::join!(
            self.fetch_major_brand_stations(country),
            self.fetch_regional_stations(country)
        );
        unique_by_id(brands.into_iter().chain(regional))
    }

    async fn search_within_country(
        &self,
        country: &CountryPreset,
        terms: &[String],
        limit: usize,
        source: &str,
    ) -> Vec<Station> {
        let terms: Vec<&str> = terms
            .iter()
            .map(|term| term.trim())
            .filter(|term| !term.is_empty())
            .collect();
        let searches = terms
            .iter()
            .map(|term| self.directory.search_by_name(term, limit));

        let mut found = Vec::new();
        for (term, result) in terms.iter().zip(join_all(searches).await) {
            match result {
                Ok(stations) => found.extend(
                    stations
                        .into_iter()
                        .filter(|station| station_belongs_to_country(station, country)),
                ),
                Err(error) => logger().debug(
                    "catalog.discovery_search_failed",
                    json!({
                        "country": country.id,
                        "source": source,
                        "term": term,
                        "error": error.to_string(),
                    }),
                ),
            }
        }
        unique_by_id(found)
    }

    /// Runs the merge on the blocking pool; large countries take a while.
    pub async fn build_snapshot(
        &self,
        stations: Vec<Station>,
        country: &CountryPreset,
    ) -> Result<Snapshot> {
        let country = country.clone();
        let snapshot =
            tokio::task::spawn_blocking(move || stations::build_snapshot(stations, &country))
                .await?;
        Ok(snapshot)
    }

    /// Bulk plus both discovery passes, merged into a snapshot.
    pub async fn aggregate(&self, country: &CountryPreset, limit: usize) -> Result<Snapshot> {
        let (bulk, discovered) = tokio::join!(
            self.fetch_country_stations(country, limit),
            self.fetch_discovery_stations(country)
        );
        let union = unique_by_id(bulk?.into_iter().chain(discovered));
        self.build_snapshot(union, country).await
    }

    /// Free-text name search. Blank queries short-circuit to nothing.
    pub async fn search(&self, query: &str, limit: Option<usize>) -> Result<Vec<Station>> {
        let query = query.trim();
        if query.is_empty() {
            return Ok(Vec::new());
        }
        let limit = limit.unwrap_or(self.config.search_limit);
        let found = self.directory.search_by_name(query, limit).await?;
        Ok(unique_by_id(found))
    }

    /// A few curated top stations from each of the first presets. Countries
    /// that fail are skipped.
    pub async fn discover(&self, presets: &[CountryPreset]) -> Vec<Station> {
        let countries = &presets[..presets.len().min(DISCOVER_COUNTRIES)];
        let fetches = countries
            .iter()
            .map(|country| self.fetch_country_stations(country, self.config.discover_limit));

        let mut picks = Vec::new();
        for (country, result) in countries.iter().zip(join_all(fetches).await) {
            match result {
                Ok(stations) => {
                    let sanitized = sanitize_stations(stations);
                    picks.extend(
                        curate_top_stations(&sanitized, country)
                            .into_iter()
                            .take(DISCOVER_PER_COUNTRY),
                    );
                }
                Err(error) => logger().info(
                    "catalog.discover_skipped",
                    json!({ "country": country.id, "error": error.kind() }),
                ),
            }
        }
        unique_by_id(picks)
    }
}
