pub mod browse;
mod fingerprint;
pub mod merge;
mod models;
pub mod normalize;
mod presets;
pub mod sanitize;

pub use browse::{
    filtered_stations, genre_buttons, stations_for_filter, stations_for_genre, StationFilter,
    StationSort, CANONICAL_GENRES,
};
pub use fingerprint::build_snapshot_fingerprint;
pub use merge::{
    build_snapshot, consolidate_variants, curate_top_stations, sanitize_stations, unique_by_id,
};
pub use models::{CountryPreset, Snapshot, Station, VariantCluster};
pub use normalize::{
    brand_matches, canonical_key, is_variant_label, normalize_name, station_belongs_to_country,
};
pub use presets::{all_presets, default_preset, find_preset, regional_search_terms};
