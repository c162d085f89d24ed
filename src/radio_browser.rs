use std::sync::{
    atomic::{AtomicUsize, Ordering},
    Arc,
};

use async_trait::async_trait;
use reqwest::{Client, Url};
use serde::Deserialize;

use crate::{config::RadioBrowserConfig, error::DirectoryError, logging::logger, stations::Station};

/// Sort key understood by the directory service.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StationOrder {
    Votes,
    ClickCount,
    Name,
}

impl StationOrder {
    pub fn as_str(&self) -> &'static str {
        match self {
            StationOrder::Votes => "votes",
            StationOrder::ClickCount => "clickcount",
            StationOrder::Name => "name",
        }
    }
}

/// Remote station directory. Implementations must be safe to call from many
/// tasks at once.
#[async_trait]
pub trait DirectoryService: Send + Sync {
    async fn fetch_by_country_code(
        &self,
        code: &str,
        order: StationOrder,
        descending: bool,
        limit: usize,
    ) -> Result<Vec<Station>, DirectoryError>;

    async fn fetch_by_country_name(
        &self,
        name: &str,
        order: StationOrder,
        descending: bool,
        limit: usize,
    ) -> Result<Vec<Station>, DirectoryError>;

    async fn search_by_name(&self, query: &str, limit: usize)
        -> Result<Vec<Station>, DirectoryError>;
}

#[derive(Clone)]
pub struct RadioBrowserClient {
    client: Client,
    host_pool: Vec<String>,
    host_cursor: Arc<AtomicUsize>,
}

impl RadioBrowserClient {
    pub fn new(config: &RadioBrowserConfig) -> Result<Self, DirectoryError> {
        let client = Client::builder()
            .user_agent(config.user_agent.clone())
            .timeout(config.timeout())
            .build()?;
        let mut host_pool: Vec<String> = Vec::new();
        for candidate in &config.base_urls {
            let normalized = candidate.trim().trim_end_matches('/');
            if normalized.is_empty() {
                continue;
            }
            if !host_pool
                .iter()
                .any(|existing| existing.eq_ignore_ascii_case(normalized))
            {
                host_pool.push(normalized.to_string());
            }
        }
        if host_pool.is_empty() {
            return Err(DirectoryError::NoHosts);
        }
        Ok(Self {
            client,
            host_pool,
            host_cursor: Arc::new(AtomicUsize::new(0)),
        })
    }

    /// Hosts starting from a rotating offset so consecutive calls spread load.
    fn ordered_hosts(&self) -> Vec<&str> {
        let len = self.host_pool.len();
        let start = self.host_cursor.fetch_add(1, Ordering::Relaxed) % len;
        (0..len)
            .map(|offset| self.host_pool[(start + offset) % len].as_str())
            .collect()
    }

    async fn fetch(&self, request: &StationRequest<'_>) -> Result<Vec<Station>, DirectoryError> {
        let mut last_error = None;
        for base in self.ordered_hosts() {
            match self.fetch_from_host(base, request).await {
                Ok(stations) => return Ok(stations),
                Err(error) => {
                    logger().debug(
                        "directory.host_failed",
                        serde_json::json!({ "host": base, "error": error.to_string() }),
                    );
                    last_error = Some(error);
                }
            }
        }
        Err(last_error.unwrap_or(DirectoryError::NoHosts))
    }

    async fn fetch_from_host(
        &self,
        base_url: &str,
        request: &StationRequest<'_>,
    ) -> Result<Vec<Station>, DirectoryError> {
        let url = request.url(base_url)?;
        let response = self.client.get(url).send().await?;
        if !response.status().is_success() {
            return Err(DirectoryError::Status(response.status().as_u16()));
        }
        let raw: Vec<RadioBrowserStation> = response.json().await?;
        Ok(raw.into_iter().filter_map(normalize_station).collect())
    }
}

#[async_trait]
impl DirectoryService for RadioBrowserClient {
    async fn fetch_by_country_code(
        &self,
        code: &str,
        order: StationOrder,
        descending: bool,
        limit: usize,
    ) -> Result<Vec<Station>, DirectoryError> {
        self.fetch(&StationRequest::CountryCode {
            code,
            order,
            descending,
            limit,
        })
        .await
    }

    async fn fetch_by_country_name(
        &self,
        name: &str,
        order: StationOrder,
        descending: bool,
        limit: usize,
    ) -> Result<Vec<Station>, DirectoryError> {
        self.fetch(&StationRequest::CountryName {
            name,
            order,
            descending,
            limit,
        })
        .await
    }

    async fn search_by_name(
        &self,
        query: &str,
        limit: usize,
    ) -> Result<Vec<Station>, DirectoryError> {
        self.fetch(&StationRequest::Search { query, limit }).await
    }
}

enum StationRequest<'a> {
    CountryCode {
        code: &'a str,
        order: StationOrder,
        descending: bool,
        limit: usize,
    },
    CountryName {
        name: &'a str,
        order: StationOrder,
        descending: bool,
        limit: usize,
    },
    Search {
        query: &'a str,
        limit: usize,
    },
}

impl StationRequest<'_> {
    fn url(&self, base_url: &str) -> Result<Url, DirectoryError> {
        let (path, order, descending, limit) = match self {
            StationRequest::CountryCode {
                code,
                order,
                descending,
                limit,
            } => (
                format!("json/stations/bycountrycodeexact/{}", code.to_ascii_uppercase()),
                Some(*order),
                *descending,
                *limit,
            ),
            StationRequest::CountryName {
                name,
                order,
                descending,
                limit,
            } => (
                format!("json/stations/bycountryexact/{}", urlencoding::encode(name)),
                Some(*order),
                *descending,
                *limit,
            ),
            StationRequest::Search { limit, .. } => {
                ("json/stations/search".to_string(), None, false, *limit)
            }
        };

        // `path` is already percent-encoded; joining keeps it verbatim.
        let base = Url::parse(&format!("{}/", base_url.trim_end_matches('/')))?;
        let mut url = base.join(&path)?;
        {
            let mut query = url.query_pairs_mut();
            if let StationRequest::Search { query: name, .. } = self {
                query.append_pair("name", name);
            }
            query.append_pair("hidebroken", "true");
            if let Some(order) = order {
                query.append_pair("order", order.as_str());
                query.append_pair("reverse", if descending { "true" } else { "false" });
            }
            query.append_pair("limit", &limit.to_string());
        }
        Ok(url)
    }
}

/// Wire shape of a directory entry. Every field is optional because the
/// service omits or nulls them freely.
#[derive(Debug, Deserialize)]
struct RadioBrowserStation {
    stationuuid: Option<String>,
    name: Option<String>,
    country: Option<String>,
    url: Option<String>,
    url_resolved: Option<String>,
    favicon: Option<String>,
    homepage: Option<String>,
    votes: Option<i64>,
    clickcount: Option<i64>,
    language: Option<String>,
    tags: Option<String>,
}

fn non_empty(value: Option<String>) -> Option<String> {
    value
        .map(|value| value.trim().to_string())
        .filter(|value| !value.is_empty())
}

fn normalize_station(raw: RadioBrowserStation) -> Option<Station> {
    let id = non_empty(raw.stationuuid)?;
    let name = non_empty(raw.name)?;
    Some(Station {
        id,
        name,
        country: raw.country.unwrap_or_default().trim().to_string(),
        url: non_empty(raw.url),
        url_resolved: raw.url_resolved.unwrap_or_default().trim().to_string(),
        favicon: non_empty(raw.favicon),
        homepage: non_empty(raw.homepage),
        votes: raw.votes,
        clickcount: raw.clickcount,
        language: non_empty(raw.language),
        tags: non_empty(raw.tags),
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    const BASE: &str = "https://de1.api.radio-browser.info";

    #[test]
    fn country_code_request_url() {
        let url = StationRequest::CountryCode {
            code: "gb",
            order: StationOrder::Votes,
            descending: true,
            limit: 700,
        }
        .url(BASE)
        .unwrap();
        assert_eq!(
            url.as_str(),
            "https://de1.api.radio-browser.info/json/stations/bycountrycodeexact/GB?hidebroken=true&order=votes&reverse=true&limit=700"
        );
    }

    #[test]
    fn country_name_is_percent_encoded() {
        let url = StationRequest::CountryName {
            name: "Korea, Republic of",
            order: StationOrder::Name,
            descending: false,
            limit: 150,
        }
        .url(&format!("{BASE}/"))
        .unwrap();
        assert_eq!(
            url.path(),
            "/json/stations/bycountryexact/Korea%2C%20Republic%20of"
        );
        assert_eq!(url.query(), Some("hidebroken=true&order=name&reverse=false&limit=150"));
    }

    #[test]
    fn search_request_carries_name() {
        let url = StationRequest::Search {
            query: "Heart UK",
            limit: 80,
        }
        .url(BASE)
        .unwrap();
        assert_eq!(url.path(), "/json/stations/search");
        assert_eq!(url.query(), Some("name=Heart+UK&hidebroken=true&limit=80"));
    }

    #[test]
    fn decoding_drops_entries_without_identity() {
        let raw = r#"[
            {"stationuuid": "a1", "name": " Heart London ", "url_resolved": "https://x/heart", "favicon": "", "votes": 4},
            {"stationuuid": "", "name": "Nameless id"},
            {"stationuuid": "b2", "name": null},
            {"stationuuid": "c3", "name": "Capital", "url": "http://x/capital", "url_resolved": null, "clickcount": 9}
        ]"#;
        let decoded: Vec<RadioBrowserStation> = serde_json::from_str(raw).unwrap();
        let stations: Vec<Station> = decoded.into_iter().filter_map(normalize_station).collect();
        assert_eq!(stations.len(), 2);
        assert_eq!(stations[0].name, "Heart London");
        assert_eq!(stations[0].favicon, None);
        assert_eq!(stations[1].url.as_deref(), Some("http://x/capital"));
        assert_eq!(stations[1].url_resolved, "");
        assert!(stations[1].has_stream());
    }

    #[test]
    fn host_pool_is_deduplicated_and_rotates() {
        let config = RadioBrowserConfig {
            base_urls: vec![
                "https://de1.api.radio-browser.info/".into(),
                "https://DE1.api.radio-browser.info".into(),
                "https://nl1.api.radio-browser.info".into(),
            ],
            user_agent: "radio-catalog/test".into(),
            timeout_ms: 1000,
        };
        let client = RadioBrowserClient::new(&config).unwrap();
        assert_eq!(client.host_pool.len(), 2);
        let first = client.ordered_hosts();
        let second = client.ordered_hosts();
        assert_eq!(first[0], second[1]);
    }

    #[test]
    fn empty_host_pool_is_rejected() {
        let config = RadioBrowserConfig {
            base_urls: vec!["  ".into()],
            user_agent: "radio-catalog/test".into(),
            timeout_ms: 1000,
        };
        assert!(matches!(
            RadioBrowserClient::new(&config),
            Err(DirectoryError::NoHosts)
        ));
    }
}
