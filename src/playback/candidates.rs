//! Ordered stream URLs for one play request.

use std::collections::HashSet;

use once_cell::sync::Lazy;
use regex::Regex;
use url::Url;

use crate::stations::{sanitize::parse_http_url, Station, VariantCluster};

pub const DEFAULT_BITRATE_KBPS: u32 = 128;

static BITRATE: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"(32|48|64|96|112|128|160|192|256|320)\s?(k|kbps)\b").expect("bitrate regex should compile")
});

/// First bitrate hint found in the name, then the resolved URL, then the
/// primary URL.
pub fn infer_bitrate(station: &Station) -> u32 {
    [
        station.name.as_str(),
        station.url_resolved.as_str(),
        station.url.as_deref().unwrap_or_default(),
    ]
    .into_iter()
    .find_map(extract_bitrate)
    .unwrap_or(DEFAULT_BITRATE_KBPS)
}

fn extract_bitrate(text: &str) -> Option<u32> {
    let lowered = text.to_lowercase();
    BITRATE
        .captures(&lowered)
        .and_then(|captures| captures.get(1))
        .and_then(|digits| digits.as_str().parse().ok())
}

/// Stations to try, best first: the cluster (or the station alone), with the
/// requested station guaranteed present, ordered by bitrate then listeners.
pub fn rank_candidate_stations(
    station: &Station,
    cluster: Option<&VariantCluster>,
    prefer_lower_bitrate: bool,
) -> Vec<Station> {
    let mut stations: Vec<Station> = match cluster {
        Some(cluster) if !cluster.is_empty() => cluster.variants.clone(),
        _ => vec![station.clone()],
    };
    if !stations.iter().any(|candidate| candidate.id == station.id) {
        stations.insert(0, station.clone());
    }

    let mut seen = HashSet::new();
    stations.retain(|candidate| seen.insert(candidate.id.clone()));

    stations.sort_by(|lhs, rhs| {
        let (lhs_rate, rhs_rate) = (infer_bitrate(lhs), infer_bitrate(rhs));
        let by_rate = if prefer_lower_bitrate {
            lhs_rate.cmp(&rhs_rate)
        } else {
            rhs_rate.cmp(&lhs_rate)
        };
        by_rate.then_with(|| rhs.listener_score().cmp(&lhs.listener_score()))
    });
    stations
}

/// Resolved then primary URL of every ranked station, unusable and repeated
/// URLs dropped.
pub fn build_candidate_urls(
    station: &Station,
    cluster: Option<&VariantCluster>,
    prefer_lower_bitrate: bool,
) -> Vec<Url> {
    let mut urls: Vec<Url> = Vec::new();
    for candidate in rank_candidate_stations(station, cluster, prefer_lower_bitrate) {
        let sources = [
            Some(candidate.url_resolved.as_str()),
            candidate.url.as_deref(),
        ];
        for url in sources.into_iter().flatten().filter_map(parse_http_url) {
            if !urls.contains(&url) {
                urls.push(url);
            }
        }
    }
    urls
}
