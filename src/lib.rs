pub mod aggregator;
pub mod app_state;
pub mod artwork;
pub mod cache;
pub mod config;
pub mod error;
pub mod favorites;
pub mod logging;
pub mod playback;
pub mod radio_browser;
pub mod stations;
pub mod storage;

pub use app_state::{AppState, CatalogView, LoadOutcome, SearchOutcome};
pub use config::Config;
pub use error::{CatalogError, DirectoryError};
