//! Error types for mqttauth.

use std::io;

/// Result type alias for mqttauth.
pub type Result<T> = std::result::Result<T, Error>;

/// Error type for mqttauth operations.
///
/// Per-call failures inside the backend never surface as `Error`; they become
/// [`Verdict::Error`](crate::Verdict::Error). This type covers setup only.
#[derive(Debug, thiserror::Error)]
pub enum Error {
    /// A mandatory configuration key is absent or empty.
    #[error("mandatory parameter `{0}` missing")]
    MissingConfig(&'static str),

    /// Invalid configuration.
    #[error("invalid config: {0}")]
    InvalidConfig(String),

    /// SQLite error.
    #[error("sqlite error: {0}")]
    Sqlite(#[from] rusqlite::Error),

    /// IO error.
    #[error("io error: {0}")]
    Io(#[from] io::Error),

    /// YAML config error.
    #[error("yaml error: {0}")]
    Yaml(#[from] serde_yaml::Error),

    /// JSON config error.
    #[error("json error: {0}")]
    Json(#[from] serde_json::Error),
}
