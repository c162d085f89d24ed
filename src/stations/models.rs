use std::collections::HashMap;
use std::hash::{Hash, Hasher};

use serde::{Deserialize, Serialize};

/// A directory entry. Identity is the source-assigned id only; two records
/// with the same id are the same station even if their metadata drifted.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Station {
    #[serde(rename = "stationuuid")]
    pub id: String,
    pub name: String,
    #[serde(default)]
    pub country: String,
    #[serde(default)]
    pub url: Option<String>,
    #[serde(rename = "url_resolved", default)]
    pub url_resolved: String,
    #[serde(default)]
    pub favicon: Option<String>,
    #[serde(default)]
    pub homepage: Option<String>,
    #[serde(default)]
    pub votes: Option<i64>,
    #[serde(default)]
    pub clickcount: Option<i64>,
    #[serde(default)]
    pub language: Option<String>,
    #[serde(default)]
    pub tags: Option<String>,
}

impl Station {
    pub fn new(id: impl Into<String>, name: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            name: name.into(),
            country: String::new(),
            url: None,
            url_resolved: String::new(),
            favicon: None,
            homepage: None,
            votes: None,
            clickcount: None,
            language: None,
            tags: None,
        }
    }

    pub fn with_country(mut self, country: impl Into<String>) -> Self {
        self.country = country.into();
        self
    }

    pub fn with_urls(mut self, url: Option<&str>, url_resolved: &str) -> Self {
        self.url = url.map(str::to_string);
        self.url_resolved = url_resolved.to_string();
        self
    }

    pub fn with_favicon(mut self, favicon: impl Into<String>) -> Self {
        self.favicon = Some(favicon.into());
        self
    }

    pub fn with_popularity(mut self, votes: i64, clickcount: i64) -> Self {
        self.votes = Some(votes);
        self.clickcount = Some(clickcount);
        self
    }

    pub fn with_tags(mut self, tags: impl Into<String>) -> Self {
        self.tags = Some(tags.into());
        self
    }

    /// Tag string split into genres: comma separated, trimmed, empties dropped.
    pub fn genres(&self) -> Vec<String> {
        self.tags
            .as_deref()
            .unwrap_or_default()
            .split(',')
            .map(str::trim)
            .filter(|tag| !tag.is_empty())
            .map(str::to_string)
            .collect()
    }

    pub fn has_stream(&self) -> bool {
        !self.url_resolved.trim().is_empty()
            || self.url.as_deref().is_some_and(|url| !url.trim().is_empty())
    }

    pub fn has_artwork(&self) -> bool {
        self.favicon.as_deref().is_some_and(|icon| !icon.is_empty())
    }

    /// Catalog popularity: votes plus a third of the click count.
    pub fn popularity(&self) -> i64 {
        self.votes.unwrap_or(0) + self.clickcount.unwrap_or(0) / 3
    }

    /// Raw popularity used when ranking playback candidates.
    pub fn listener_score(&self) -> i64 {
        self.votes.unwrap_or(0) + self.clickcount.unwrap_or(0)
    }
}

impl PartialEq for Station {
    fn eq(&self, other: &Self) -> bool {
        self.id == other.id
    }
}

impl Eq for Station {}

impl Hash for Station {
    fn hash<H: Hasher>(&self, state: &mut H) {
        self.id.hash(state);
    }
}

/// Curated per-country reference data.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct CountryPreset {
    pub id: String,
    pub display_name: String,
    /// The directory service's own spelling of the country.
    pub api_name: String,
    /// Flagship brands in priority order; the index is the rank.
    pub top_brands: Vec<String>,
}

impl CountryPreset {
    pub fn new(id: &str, display_name: &str, api_name: &str, top_brands: &[&str]) -> Self {
        Self {
            id: id.to_string(),
            display_name: display_name.to_string(),
            api_name: api_name.to_string(),
            top_brands: top_brands.iter().map(|brand| brand.to_string()).collect(),
        }
    }

    pub fn country_code(&self) -> String {
        match self.id.as_str() {
            "uk" => "GB".to_string(),
            other => other.to_ascii_uppercase(),
        }
    }
}

/// Stations judged to be the same logical station, best first.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct VariantCluster {
    pub primary: Station,
    pub variants: Vec<Station>,
}

impl VariantCluster {
    pub fn len(&self) -> usize {
        self.variants.len()
    }

    pub fn is_empty(&self) -> bool {
        self.variants.is_empty()
    }
}

/// Merged, scored view of one country's catalog.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Snapshot {
    pub country_id: String,
    pub top_stations: Vec<Station>,
    pub all_stations: Vec<Station>,
    pub station_count: usize,
    pub variants: HashMap<String, VariantCluster>,
    pub brand_scores: HashMap<String, i64>,
}

impl Snapshot {
    pub fn empty(country_id: impl Into<String>) -> Self {
        Self {
            country_id: country_id.into(),
            top_stations: Vec::new(),
            all_stations: Vec::new(),
            station_count: 0,
            variants: HashMap::new(),
            brand_scores: HashMap::new(),
        }
    }

    pub fn is_empty(&self) -> bool {
        self.all_stations.is_empty()
    }

    pub fn brand_score(&self, station: &Station) -> i64 {
        self.brand_scores.get(&station.id).copied().unwrap_or(0)
    }

    pub fn station(&self, id: &str) -> Option<&Station> {
        self.all_stations.iter().find(|station| station.id == id)
    }

    pub fn cluster(&self, id: &str) -> Option<&VariantCluster> {
        self.variants.get(id)
    }

    pub fn fingerprint(&self) -> String {
        super::fingerprint::build_snapshot_fingerprint(self)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn identity_ignores_metadata_drift() {
        let a = Station::new("abc", "Heart London").with_popularity(10, 0);
        let b = Station::new("abc", "Heart London (HQ)").with_popularity(99, 5);
        assert_eq!(a, b);
        assert_ne!(a, Station::new("abd", "Heart London"));
    }

    #[test]
    fn genres_are_split_and_trimmed() {
        let station = Station::new("1", "Jazz FM").with_tags(" jazz, ,smooth jazz ,,news");
        assert_eq!(station.genres(), vec!["jazz", "smooth jazz", "news"]);
        assert!(Station::new("2", "Plain").genres().is_empty());
    }

    #[test]
    fn uk_maps_to_gb() {
        let uk = CountryPreset::new("uk", "United Kingdom", "United Kingdom", &[]);
        let de = CountryPreset::new("de", "Germany", "Germany", &[]);
        assert_eq!(uk.country_code(), "GB");
        assert_eq!(de.country_code(), "DE");
    }

    #[test]
    fn decodes_directory_json() {
        let raw = r#"{
            "stationuuid": "9617a958",
            "name": "BBC Radio 1",
            "country": "United Kingdom",
            "url": "http://example.com/r1",
            "url_resolved": "https://example.com/r1.aac",
            "favicon": "",
            "votes": 120,
            "clickcount": 300,
            "tags": "pop,chart"
        }"#;
        let station: Station = serde_json::from_str(raw).unwrap();
        assert_eq!(station.id, "9617a958");
        assert_eq!(station.popularity(), 220);
        assert_eq!(station.listener_score(), 420);
        assert!(!station.has_artwork());
        assert!(station.has_stream());
    }
}
