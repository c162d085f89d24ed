use std::env;
use std::path::PathBuf;
use std::time::Duration;

use serde::Serialize;
use thiserror::Error;
use url::Url;

const APP_DIR_NAME: &str = "radio-catalog";

const DEFAULT_BASE_URLS: &[&str] = &[
    "https://de1.api.radio-browser.info",
    "https://nl1.api.radio-browser.info",
    "https://fr1.api.radio-browser.info",
];

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("{0}")]
    Message(String),
}

#[derive(Debug, Clone, Serialize)]
pub struct Config {
    pub radio_browser: RadioBrowserConfig,
    pub catalog: CatalogConfig,
    pub cache: CacheConfig,
    pub playback: PlaybackConfig,
    pub artwork: ArtworkConfig,
    pub state_dir: PathBuf,
}

#[derive(Debug, Clone, Serialize)]
pub struct RadioBrowserConfig {
    pub base_urls: Vec<String>,
    pub user_agent: String,
    pub timeout_ms: u64,
}

#[derive(Debug, Clone, Serialize)]
pub struct CatalogConfig {
    pub min_limit: usize,
    pub max_limit: usize,
    pub quick_limit: usize,
    pub expanded_limit: usize,
    pub brand_search_limit: usize,
    pub regional_search_limit: usize,
    pub search_limit: usize,
    pub search_debounce_ms: u64,
    pub discover_limit: usize,
}

#[derive(Debug, Clone, Serialize)]
pub struct CacheConfig {
    pub refresh_interval_secs: u64,
    pub recent_capacity: usize,
    pub max_attempts: u32,
    pub country_timeout_ms: u64,
    pub retry_timeout_ms: u64,
    pub initial_limit: usize,
    pub periodic_limit: usize,
    pub launch_limit: usize,
    pub seed_countries: usize,
    pub population_concurrency: usize,
}

#[derive(Debug, Clone, Serialize)]
pub struct PlaybackConfig {
    pub connect_timeout_ms: u64,
}

#[derive(Debug, Clone, Serialize)]
pub struct ArtworkConfig {
    pub cache_dir: PathBuf,
    pub max_cache_bytes: u64,
    pub timeout_ms: u64,
    pub user_agent: String,
}

impl Config {
    pub fn load() -> Result<Self, ConfigError> {
        let radio_browser = RadioBrowserConfig::from_env()?;
        let catalog = CatalogConfig::from_env()?;
        let cache = CacheConfig::from_env()?;
        let playback = PlaybackConfig {
            connect_timeout_ms: env_u64("PLAYBACK_CONNECT_TIMEOUT_MS", 12_000)?.max(1),
        };
        let artwork = ArtworkConfig::from_env(&radio_browser.user_agent)?;
        let state_dir = env_path("RADIO_CATALOG_STATE_DIR")
            .or_else(|| dirs::data_dir().map(|dir| dir.join(APP_DIR_NAME)))
            .ok_or_else(|| {
                ConfigError::Message(
                    "RADIO_CATALOG_STATE_DIR must be set when no data directory is available"
                        .into(),
                )
            })?;

        Ok(Self {
            radio_browser,
            catalog,
            cache,
            playback,
            artwork,
            state_dir,
        })
    }
}

impl RadioBrowserConfig {
    fn from_env() -> Result<Self, ConfigError> {
        let base_urls = match env::var("RADIO_BROWSER_BASE_URLS") {
            Ok(raw) => raw
                .split(',')
                .map(str::trim)
                .filter(|value| !value.is_empty())
                .map(str::to_string)
                .collect(),
            Err(_) => DEFAULT_BASE_URLS.iter().map(|url| url.to_string()).collect(),
        };
        let config = Self {
            base_urls,
            user_agent: env::var("RADIO_BROWSER_USER_AGENT")
                .unwrap_or_else(|_| "radio-catalog/0.1".to_string()),
            timeout_ms: env_u64("RADIO_BROWSER_TIMEOUT_MS", 12_000)?,
        };
        config.validate()?;
        Ok(config)
    }

    fn validate(&self) -> Result<(), ConfigError> {
        if self.user_agent.trim().is_empty() {
            return Err(ConfigError::Message(
                "A Radio Browser user agent must be provided.".into(),
            ));
        }
        if self.timeout_ms == 0 {
            return Err(ConfigError::Message(
                "RADIO_BROWSER_TIMEOUT_MS must be greater than zero.".into(),
            ));
        }
        let mut https_hosts = 0;
        for base in &self.base_urls {
            let url = Url::parse(base).map_err(|err| {
                ConfigError::Message(format!("Invalid Radio Browser base URL {base}: {err}"))
            })?;
            if url.scheme() == "https" {
                https_hosts += 1;
            }
        }
        if https_hosts == 0 {
            return Err(ConfigError::Message(
                "RADIO_BROWSER_BASE_URLS must contain at least one HTTPS endpoint".into(),
            ));
        }
        Ok(())
    }

    pub fn timeout(&self) -> Duration {
        Duration::from_millis(self.timeout_ms)
    }
}

impl Default for RadioBrowserConfig {
    fn default() -> Self {
        Self {
            base_urls: DEFAULT_BASE_URLS.iter().map(|url| url.to_string()).collect(),
            user_agent: "radio-catalog/0.1".to_string(),
            timeout_ms: 12_000,
        }
    }
}

impl CatalogConfig {
    fn from_env() -> Result<Self, ConfigError> {
        let defaults = Self::default();
        let config = Self {
            min_limit: env_usize("CATALOG_MIN_LIMIT", defaults.min_limit)?,
            max_limit: env_usize("CATALOG_MAX_LIMIT", defaults.max_limit)?,
            quick_limit: env_usize("CATALOG_QUICK_LIMIT", defaults.quick_limit)?,
            expanded_limit: env_usize("CATALOG_EXPANDED_LIMIT", defaults.expanded_limit)?,
            brand_search_limit: env_usize(
                "CATALOG_BRAND_SEARCH_LIMIT",
                defaults.brand_search_limit,
            )?,
            regional_search_limit: env_usize(
                "CATALOG_REGIONAL_SEARCH_LIMIT",
                defaults.regional_search_limit,
            )?,
            search_limit: env_usize("CATALOG_SEARCH_LIMIT", defaults.search_limit)?,
            search_debounce_ms: env_u64("CATALOG_SEARCH_DEBOUNCE_MS", defaults.search_debounce_ms)?,
            discover_limit: env_usize("CATALOG_DISCOVER_LIMIT", defaults.discover_limit)?,
        };
        config.validate()?;
        Ok(config)
    }

    fn validate(&self) -> Result<(), ConfigError> {
        if self.min_limit == 0 {
            return Err(ConfigError::Message(
                "CATALOG_MIN_LIMIT must be greater than zero.".into(),
            ));
        }
        if self.min_limit > self.max_limit {
            return Err(ConfigError::Message(
                "CATALOG_MIN_LIMIT cannot exceed CATALOG_MAX_LIMIT.".into(),
            ));
        }
        for (key, value) in [
            ("CATALOG_BRAND_SEARCH_LIMIT", self.brand_search_limit),
            ("CATALOG_REGIONAL_SEARCH_LIMIT", self.regional_search_limit),
            ("CATALOG_SEARCH_LIMIT", self.search_limit),
        ] {
            if value == 0 {
                return Err(ConfigError::Message(format!(
                    "{key} must be greater than zero."
                )));
            }
        }
        Ok(())
    }

    /// Clamps a requested bulk limit into the configured window.
    pub fn clamp_limit(&self, requested: usize) -> usize {
        requested.clamp(self.min_limit, self.max_limit)
    }

    pub fn search_debounce(&self) -> Duration {
        Duration::from_millis(self.search_debounce_ms)
    }
}

impl Default for CatalogConfig {
    fn default() -> Self {
        Self {
            min_limit: 150,
            max_limit: 3000,
            quick_limit: 700,
            expanded_limit: 2400,
            brand_search_limit: 80,
            regional_search_limit: 120,
            search_limit: 120,
            search_debounce_ms: 280,
            discover_limit: 300,
        }
    }
}

impl CacheConfig {
    fn from_env() -> Result<Self, ConfigError> {
        let defaults = Self::default();
        let config = Self {
            refresh_interval_secs: env_u64(
                "CACHE_REFRESH_INTERVAL_SECS",
                defaults.refresh_interval_secs,
            )?,
            recent_capacity: env_usize("CACHE_RECENT_CAPACITY", defaults.recent_capacity)?,
            max_attempts: env_u32("CACHE_MAX_ATTEMPTS", defaults.max_attempts)?,
            country_timeout_ms: env_u64("CACHE_COUNTRY_TIMEOUT_MS", defaults.country_timeout_ms)?,
            retry_timeout_ms: env_u64("CACHE_RETRY_TIMEOUT_MS", defaults.retry_timeout_ms)?,
            initial_limit: env_usize("CACHE_INITIAL_LIMIT", defaults.initial_limit)?,
            periodic_limit: env_usize("CACHE_PERIODIC_LIMIT", defaults.periodic_limit)?,
            launch_limit: env_usize("CACHE_LAUNCH_LIMIT", defaults.launch_limit)?,
            seed_countries: env_usize("CACHE_SEED_COUNTRIES", defaults.seed_countries)?,
            population_concurrency: env_usize(
                "CACHE_POPULATION_CONCURRENCY",
                defaults.population_concurrency,
            )?
            .max(1),
        };
        if config.refresh_interval_secs == 0 {
            return Err(ConfigError::Message(
                "CACHE_REFRESH_INTERVAL_SECS must be greater than zero.".into(),
            ));
        }
        if config.max_attempts == 0 {
            return Err(ConfigError::Message(
                "CACHE_MAX_ATTEMPTS must be greater than zero.".into(),
            ));
        }
        Ok(config)
    }

    pub fn refresh_interval(&self) -> Duration {
        Duration::from_secs(self.refresh_interval_secs)
    }

    /// Countries that failed before get the longer budget.
    pub fn country_timeout(&self, previous_failures: u32) -> Duration {
        if previous_failures > 0 {
            Duration::from_millis(self.retry_timeout_ms)
        } else {
            Duration::from_millis(self.country_timeout_ms)
        }
    }
}

impl Default for CacheConfig {
    fn default() -> Self {
        Self {
            refresh_interval_secs: 30 * 60,
            recent_capacity: 6,
            max_attempts: 5,
            country_timeout_ms: 28_000,
            retry_timeout_ms: 45_000,
            initial_limit: 2000,
            periodic_limit: 600,
            launch_limit: 400,
            seed_countries: 3,
            population_concurrency: 2,
        }
    }
}

impl PlaybackConfig {
    pub fn connect_timeout(&self) -> Duration {
        Duration::from_millis(self.connect_timeout_ms)
    }
}

impl Default for PlaybackConfig {
    fn default() -> Self {
        Self {
            connect_timeout_ms: 12_000,
        }
    }
}

impl ArtworkConfig {
    fn from_env(user_agent: &str) -> Result<Self, ConfigError> {
        let cache_dir = env_path("RADIO_CATALOG_CACHE_DIR")
            .or_else(|| dirs::cache_dir().map(|dir| dir.join(APP_DIR_NAME)))
            .unwrap_or_else(|| env::temp_dir().join(APP_DIR_NAME));
        Ok(Self {
            cache_dir: cache_dir.join("artwork"),
            max_cache_bytes: env_u64("ARTWORK_CACHE_MAX_BYTES", 64 * 1024 * 1024)?,
            timeout_ms: env_u64("ARTWORK_TIMEOUT_MS", 8_000)?,
            user_agent: user_agent.to_string(),
        })
    }

    pub fn timeout(&self) -> Duration {
        Duration::from_millis(self.timeout_ms)
    }
}

fn env_path(key: &str) -> Option<PathBuf> {
    env::var(key)
        .ok()
        .map(|value| value.trim().to_string())
        .filter(|value| !value.is_empty())
        .map(PathBuf::from)
}

fn env_u32(key: &str, default: u32) -> Result<u32, ConfigError> {
    match env::var(key) {
        Ok(value) => value
            .trim()
            .parse()
            .map_err(|_| ConfigError::Message(format!("{key} must be a valid u32"))),
        Err(_) => Ok(default),
    }
}

fn env_u64(key: &str, default: u64) -> Result<u64, ConfigError> {
    match env::var(key) {
        Ok(value) => value
            .trim()
            .parse()
            .map_err(|_| ConfigError::Message(format!("{key} must be a valid u64"))),
        Err(_) => Ok(default),
    }
}

fn env_usize(key: &str, default: usize) -> Result<usize, ConfigError> {
    match env::var(key) {
        Ok(value) => value
            .trim()
            .parse()
            .map_err(|_| ConfigError::Message(format!("{key} must be a valid usize"))),
        Err(_) => Ok(default),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn clamp_limit_respects_window() {
        let config = CatalogConfig::default();
        assert_eq!(config.clamp_limit(10), 150);
        assert_eq!(config.clamp_limit(700), 700);
        assert_eq!(config.clamp_limit(10_000), 3000);
    }

    #[test]
    fn min_limit_above_max_is_rejected() {
        let config = CatalogConfig {
            min_limit: 500,
            max_limit: 100,
            ..CatalogConfig::default()
        };
        assert!(config.validate().is_err());
    }

    #[test]
    fn retry_attempts_get_longer_timeout() {
        let config = CacheConfig::default();
        assert_eq!(config.country_timeout(0), Duration::from_secs(28));
        assert_eq!(config.country_timeout(2), Duration::from_secs(45));
    }

    #[test]
    fn radio_browser_requires_an_https_host() {
        let config = RadioBrowserConfig {
            base_urls: vec!["http://insecure.example".into()],
            ..RadioBrowserConfig::default()
        };
        assert!(config.validate().is_err());
        assert!(RadioBrowserConfig::default().validate().is_ok());
    }
}
