use std::path::{Path, PathBuf};
use std::time::SystemTime;

use async_trait::async_trait;
use bytes::Bytes;
use reqwest::Client;
use serde_json::json;
use url::Url;

use crate::{
    config::ArtworkConfig,
    logging::logger,
    stations::{
        sanitize::{https_upgrade, parse_http_url, public_host},
        Station,
    },
};

/// Anything this small is a placeholder or an error page, not a logo.
const MIN_ARTWORK_BYTES: usize = 256;

#[async_trait]
pub trait ArtworkProvider: Send + Sync {
    async fn fetch_artwork(&self, station: &Station) -> Option<Bytes>;
}

/// Downloads station logos and keeps them in a size-capped disk cache.
#[derive(Clone)]
pub struct HttpArtworkProvider {
    client: Client,
    cache_dir: PathBuf,
    max_cache_bytes: u64,
}

impl HttpArtworkProvider {
    pub fn new(config: &ArtworkConfig) -> anyhow::Result<Self> {
        let client = Client::builder()
            .user_agent(config.user_agent.clone())
            .timeout(config.timeout())
            .build()?;
        Ok(Self {
            client,
            cache_dir: config.cache_dir.clone(),
            max_cache_bytes: config.max_cache_bytes,
        })
    }

    fn cache_path(&self, station: &Station) -> PathBuf {
        let key: String = station
            .id
            .chars()
            .filter(|c| c.is_ascii_alphanumeric() || matches!(c, '-' | '_'))
            .collect();
        self.cache_dir.join(format!("{key}.img"))
    }

    async fn download(&self, url: &Url) -> Option<Bytes> {
        let response = self.client.get(url.clone()).send().await.ok()?;
        if !response.status().is_success() {
            return None;
        }
        let body = response.bytes().await.ok()?;
        (body.len() > MIN_ARTWORK_BYTES).then_some(body)
    }

    async fn store(&self, path: &Path, data: &Bytes) {
        if let Err(error) = write_atomically(&self.cache_dir, path, data).await {
            logger().debug(
                "artwork.cache_write_failed",
                json!({ "path": path.display().to_string(), "error": error.to_string() }),
            );
            return;
        }
        if let Err(error) = evict_oldest(&self.cache_dir, self.max_cache_bytes).await {
            logger().debug(
                "artwork.cache_evict_failed",
                json!({ "error": error.to_string() }),
            );
        }
    }
}

#[async_trait]
impl ArtworkProvider for HttpArtworkProvider {
    async fn fetch_artwork(&self, station: &Station) -> Option<Bytes> {
        let path = self.cache_path(station);
        if let Ok(cached) = tokio::fs::read(&path).await {
            if !cached.is_empty() {
                return Some(Bytes::from(cached));
            }
        }

        for url in candidate_urls(station) {
            if let Some(data) = self.download(&url).await {
                self.store(&path, &data).await;
                return Some(data);
            }
        }
        None
    }
}

/// Favicon first (and its https twin), then icon services for every public
/// host the station mentions.
pub fn candidate_urls(station: &Station) -> Vec<Url> {
    let mut urls = Vec::new();
    if let Some(favicon) = station.favicon.as_deref().and_then(parse_http_url) {
        let upgraded = https_upgrade(&favicon);
        urls.push(favicon);
        urls.extend(upgraded);
    }

    let mut hosts: Vec<String> = Vec::new();
    let sources = [
        station.homepage.as_deref(),
        Some(station.url_resolved.as_str()),
        station.url.as_deref(),
    ];
    for host in sources
        .into_iter()
        .flatten()
        .filter_map(parse_http_url)
        .filter_map(|url| public_host(&url))
    {
        if !hosts.contains(&host) {
            hosts.push(host);
        }
    }

    for host in hosts {
        let services = [
            format!("https://icons.duckduckgo.com/ip3/{host}.ico"),
            format!("https://www.google.com/s2/favicons?domain={host}&sz=256"),
            format!("https://icon.horse/icon/{host}"),
        ];
        urls.extend(services.iter().filter_map(|raw| Url::parse(raw).ok()));
    }

    let mut unique = Vec::with_capacity(urls.len());
    for url in urls {
        if !unique.contains(&url) {
            unique.push(url);
        }
    }
    unique
}

async fn write_atomically(dir: &Path, path: &Path, data: &[u8]) -> std::io::Result<()> {
    tokio::fs::create_dir_all(dir).await?;
    let tmp_path = path.with_extension("img.part");
    tokio::fs::write(&tmp_path, data).await?;
    tokio::fs::rename(&tmp_path, path).await
}

/// Deletes the least recently written files until the cache fits `max_bytes`.
async fn evict_oldest(dir: &Path, max_bytes: u64) -> std::io::Result<()> {
    let mut files: Vec<(SystemTime, u64, PathBuf)> = Vec::new();
    let mut total = 0u64;
    let mut entries = tokio::fs::read_dir(dir).await?;
    while let Some(entry) = entries.next_entry().await? {
        let metadata = entry.metadata().await?;
        if !metadata.is_file() {
            continue;
        }
        let modified = metadata.modified().unwrap_or(SystemTime::UNIX_EPOCH);
        total += metadata.len();
        files.push((modified, metadata.len(), entry.path()));
    }
    if total <= max_bytes {
        return Ok(());
    }

    files.sort_by(|a, b| a.0.cmp(&b.0).then_with(|| a.2.cmp(&b.2)));
    for (_, len, path) in files {
        if total <= max_bytes {
            break;
        }
        tokio::fs::remove_file(&path).await?;
        total = total.saturating_sub(len);
    }
    Ok(())
}
