use std::time::Duration;

use thiserror::Error;

/// Failure of a single directory-service call.
#[derive(Debug, Error)]
pub enum DirectoryError {
    #[error("directory request failed: {0}")]
    Http(#[from] reqwest::Error),
    #[error("directory returned status {0}")]
    Status(u16),
    #[error("invalid directory url: {0}")]
    Url(#[from] url::ParseError),
    #[error("no directory host configured")]
    NoHosts,
}

#[derive(Debug, Error)]
pub enum CatalogError {
    /// Every bulk query for a country failed or came back empty.
    #[error("station directory unavailable for {country}")]
    DirectoryUnavailable { country: String },

    /// Every candidate of a playback session failed or timed out.
    #[error("no playable source for {station}")]
    NoPlayableSource { station: String },

    #[error("{operation} timed out after {elapsed:?}")]
    Timeout {
        operation: String,
        elapsed: Duration,
    },

    #[error(transparent)]
    Directory(#[from] DirectoryError),

    #[error("storage error: {0}")]
    Storage(String),

    #[error("background task failed: {0}")]
    Task(String),
}

impl CatalogError {
    pub fn timeout(operation: impl Into<String>, elapsed: Duration) -> Self {
        CatalogError::Timeout {
            operation: operation.into(),
            elapsed,
        }
    }

    /// Short machine-friendly tag used in log events.
    pub fn kind(&self) -> &'static str {
        match self {
            CatalogError::DirectoryUnavailable { .. } => "directory-unavailable",
            CatalogError::NoPlayableSource { .. } => "no-playable-source",
            CatalogError::Timeout { .. } => "timeout",
            CatalogError::Directory(_) => "directory",
            CatalogError::Storage(_) => "storage",
            CatalogError::Task(_) => "task",
        }
    }
}

impl From<anyhow::Error> for CatalogError {
    fn from(error: anyhow::Error) -> Self {
        CatalogError::Storage(format!("{error:#}"))
    }
}

impl From<tokio::task::JoinError> for CatalogError {
    fn from(error: tokio::task::JoinError) -> Self {
        CatalogError::Task(error.to_string())
    }
}

pub type Result<T, E = CatalogError> = std::result::Result<T, E>;
