//! Read-only views over a snapshot for list screens.

use std::collections::HashSet;

use serde::Serialize;

use super::normalize::normalize_genre;
use super::{Snapshot, Station};

pub const ALL_GENRES: &str = "All";

pub const CANONICAL_GENRES: &[&str] = &[
    ALL_GENRES,
    "Pop",
    "Alternative",
    "Dance",
    "R&B",
    "Hip-Hop",
    "Rock",
    "Classic Rock",
    "Electronic",
    "Jazz",
    "Classical",
    "News",
    "Talk",
];

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Default)]
#[serde(rename_all = "snake_case")]
pub enum StationSort {
    #[default]
    Alphabetical,
    MostPopular,
    MostListened,
    MajorBrandsFirst,
    LeastPopular,
}

impl StationSort {
    pub fn parse(value: &str) -> Option<Self> {
        match value.trim().to_ascii_lowercase().replace(['-', ' '], "_").as_str() {
            "alphabetical" | "name" => Some(Self::Alphabetical),
            "most_popular" | "popular" => Some(Self::MostPopular),
            "most_listened" | "listened" => Some(Self::MostListened),
            "major_brands_first" | "brands" => Some(Self::MajorBrandsFirst),
            "least_popular" => Some(Self::LeastPopular),
            _ => None,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Default)]
#[serde(rename_all = "snake_case")]
pub enum StationFilter {
    #[default]
    All,
    Favorites,
    WithArtwork,
    MajorBrands,
    WithGenres,
}

impl StationFilter {
    fn accepts(self, station: &Station, snapshot: &Snapshot, favorites: &HashSet<String>) -> bool {
        match self {
            Self::All => true,
            Self::Favorites => favorites.contains(&station.id),
            Self::WithArtwork => station.has_artwork(),
            Self::MajorBrands => snapshot.brand_score(station) > 0,
            Self::WithGenres => !station.genres().is_empty(),
        }
    }
}

pub fn sort_stations(stations: &mut [Station], sort: StationSort, snapshot: &Snapshot) {
    match sort {
        StationSort::Alphabetical => {
            stations.sort_by_cached_key(|station| station.name.to_lowercase());
        }
        StationSort::MostPopular => {
            stations.sort_by_key(|station| {
                std::cmp::Reverse(station.popularity() + snapshot.brand_score(station))
            });
        }
        StationSort::MostListened => {
            stations.sort_by_key(|station| std::cmp::Reverse(station.clickcount.unwrap_or(0)));
        }
        StationSort::MajorBrandsFirst => {
            stations.sort_by_key(|station| std::cmp::Reverse(snapshot.brand_score(station)));
        }
        StationSort::LeastPopular => {
            stations.sort_by_key(Station::popularity);
        }
    }
}

pub fn filtered_stations(
    snapshot: &Snapshot,
    filter: StationFilter,
    sort: StationSort,
    favorites: &HashSet<String>,
) -> Vec<Station> {
    let mut stations: Vec<Station> = snapshot
        .all_stations
        .iter()
        .filter(|station| filter.accepts(station, snapshot, favorites))
        .cloned()
        .collect();
    sort_stations(&mut stations, sort, snapshot);
    stations
}

/// Top `limit` stations passing `filter`, most popular first.
pub fn stations_for_filter(
    snapshot: &Snapshot,
    filter: StationFilter,
    favorites: &HashSet<String>,
    limit: usize,
) -> Vec<Station> {
    let mut stations = filtered_stations(snapshot, filter, StationSort::Alphabetical, favorites);
    stations.sort_by_key(|station| std::cmp::Reverse(station.popularity()));
    stations.truncate(limit);
    stations
}

fn genre_key(raw: &str) -> String {
    normalize_genre(raw).to_lowercase()
}

fn station_has_genre(station: &Station, wanted: &str) -> bool {
    station
        .genres()
        .iter()
        .any(|genre| genre_key(genre).contains(wanted))
}

/// "All" plus every canonical genre that at least one station carries.
pub fn genre_buttons(snapshot: &Snapshot) -> Vec<String> {
    let present: HashSet<String> = snapshot
        .all_stations
        .iter()
        .flat_map(|station| station.genres())
        .map(|genre| genre_key(&genre))
        .collect();

    CANONICAL_GENRES
        .iter()
        .filter(|genre| {
            if **genre == ALL_GENRES {
                return true;
            }
            let wanted = genre_key(genre);
            present.iter().any(|tag| tag.contains(&wanted))
        })
        .map(|genre| genre.to_string())
        .collect()
}

pub fn stations_for_genre(snapshot: &Snapshot, genre: &str) -> Vec<Station> {
    let wanted = genre_key(genre);
    let mut stations: Vec<Station> = if wanted.is_empty() || genre.eq_ignore_ascii_case(ALL_GENRES) {
        snapshot.all_stations.clone()
    } else {
        snapshot
            .all_stations
            .iter()
            .filter(|station| station_has_genre(station, &wanted))
            .cloned()
            .collect()
    };
    stations.sort_by_key(|station| std::cmp::Reverse(station.popularity()));
    stations
}
