//! Raw station lists in, one country [`Snapshot`] out.

use std::cmp::Ordering;
use std::collections::{HashMap, HashSet};

use super::normalize::{canonical_key, is_variant_label, normalize_name, normalized_brand_matches};
use super::{CountryPreset, Snapshot, Station, VariantCluster};

const NOISE_MARKERS: &[&str] = &["scanner", "test", "localhost"];
const BRAND_SCORE_BASE: i64 = 1_000_000;
const BRAND_SCORE_STEP: i64 = 10_000;

pub struct ConsolidatedStations {
    pub primaries: Vec<Station>,
    pub variants: HashMap<String, VariantCluster>,
}

/// Full merge pass for one country. Never fails; junk entries are dropped.
pub fn build_snapshot(raw: Vec<Station>, country: &CountryPreset) -> Snapshot {
    let sanitized = sanitize_stations(raw);
    let ConsolidatedStations {
        primaries,
        variants,
    } = consolidate_variants(sanitized);
    let top_stations = curate_top_stations(&primaries, country);
    let brand_scores = brand_scores(&primaries, &country.top_brands);

    Snapshot {
        country_id: country.id.clone(),
        top_stations,
        station_count: primaries.len(),
        all_stations: primaries,
        variants,
        brand_scores,
    }
}

/// First occurrence of each id wins; input order is preserved.
pub fn unique_by_id<I>(stations: I) -> Vec<Station>
where
    I: IntoIterator<Item = Station>,
{
    let mut seen = HashSet::new();
    stations
        .into_iter()
        .filter(|station| seen.insert(station.id.clone()))
        .collect()
}

pub fn sanitize_stations(stations: Vec<Station>) -> Vec<Station> {
    unique_by_id(stations)
        .into_iter()
        .filter(|station| station.has_stream() && !is_noise(&station.name))
        .collect()
}

fn is_noise(name: &str) -> bool {
    let lowered = name.to_lowercase();
    NOISE_MARKERS.iter().any(|marker| lowered.contains(marker))
}

/// Ordering inside a variant group: clean names, then artwork, then
/// popularity, then the shorter name.
pub fn compare_variant_preference(lhs: &Station, rhs: &Station) -> Ordering {
    is_variant_label(&lhs.name)
        .cmp(&is_variant_label(&rhs.name))
        .then_with(|| rhs.has_artwork().cmp(&lhs.has_artwork()))
        .then_with(|| rhs.popularity().cmp(&lhs.popularity()))
        .then_with(|| lhs.name.chars().count().cmp(&rhs.name.chars().count()))
}

/// Groups stations by canonical key. Groups come out in order of their first
/// member's position in the input so repeated merges are identical.
pub fn consolidate_variants(stations: Vec<Station>) -> ConsolidatedStations {
    let mut order: Vec<String> = Vec::new();
    let mut groups: HashMap<String, Vec<Station>> = HashMap::new();

    for station in stations {
        let key = canonical_key(&station.name);
        let group = groups.entry(key.clone()).or_insert_with(|| {
            order.push(key);
            Vec::new()
        });
        group.push(station);
    }

    let mut primaries = Vec::with_capacity(order.len());
    let mut variants = HashMap::with_capacity(order.len());

    for key in order {
        let Some(mut group) = groups.remove(&key) else {
            continue;
        };
        group.sort_by(compare_variant_preference);
        let Some(primary) = group.first().cloned() else {
            continue;
        };
        primaries.push(primary.clone());
        variants.insert(
            primary.id.clone(),
            VariantCluster {
                primary,
                variants: group,
            },
        );
    }

    ConsolidatedStations {
        primaries: unique_by_id(primaries),
        variants,
    }
}

/// Brand-matching primaries, earlier-ranked brands first, popularity second.
pub fn curate_top_stations(stations: &[Station], country: &CountryPreset) -> Vec<Station> {
    let brands: Vec<String> = country
        .top_brands
        .iter()
        .map(|brand| normalize_name(brand))
        .collect();

    let mut ranked: Vec<(usize, &Station)> = stations
        .iter()
        .filter_map(|station| {
            let name = normalize_name(&station.name);
            brands
                .iter()
                .position(|brand| normalized_brand_matches(&name, brand))
                .map(|rank| (rank, station))
        })
        .collect();

    ranked.sort_by(|(lhs_rank, lhs), (rhs_rank, rhs)| {
        lhs_rank
            .cmp(rhs_rank)
            .then_with(|| rhs.popularity().cmp(&lhs.popularity()))
    });

    unique_by_id(ranked.into_iter().map(|(_, station)| station.clone()))
}

pub fn brand_score_for_rank(rank: usize) -> i64 {
    BRAND_SCORE_BASE - rank as i64 * BRAND_SCORE_STEP
}

/// Best brand score per station id. Unmatched stations get no entry.
pub fn brand_scores(stations: &[Station], brands: &[String]) -> HashMap<String, i64> {
    let normalized: Vec<String> = brands.iter().map(|brand| normalize_name(brand)).collect();
    if stations.is_empty() || normalized.iter().all(String::is_empty) {
        return HashMap::new();
    }

    let mut scores = HashMap::with_capacity(stations.len());
    for station in stations {
        let name = normalize_name(&station.name);
        let best = normalized
            .iter()
            .enumerate()
            .filter(|(_, brand)| normalized_brand_matches(&name, brand))
            .map(|(rank, _)| brand_score_for_rank(rank))
            .max();
        if let Some(score) = best.filter(|score| *score > 0) {
            scores.insert(station.id.clone(), score);
        }
    }
    scores
}
