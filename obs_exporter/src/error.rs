//! Error types for a single scrape and for startup configuration.

use thiserror::Error;

pub type Result<T> = std::result::Result<T, ExporterError>;

/// Why a scrape produced no metrics. Each variant maps to the stage that failed.
#[derive(Error, Debug)]
pub enum ExporterError {
    /// The session could not be established (transport or handshake).
    #[error("connection error: {0}")]
    Connection(String),

    /// A request failed after a successful handshake.
    #[error("query error: {0}")]
    Query(String),

    /// A response was missing a field or had the wrong type.
    #[error("mapping error: {0}")]
    Mapping(String),
}

impl ExporterError {
    pub fn connection(msg: impl Into<String>) -> Self {
        Self::Connection(msg.into())
    }

    pub fn query(msg: impl Into<String>) -> Self {
        Self::Query(msg.into())
    }

    pub fn mapping(msg: impl Into<String>) -> Self {
        Self::Mapping(msg.into())
    }

    /// Scrape stage the error came from, for logs.
    pub fn stage(&self) -> &'static str {
        match self {
            Self::Connection(_) | Self::Query(_) => "fetching",
            Self::Mapping(_) => "mapping",
        }
    }
}

/// Fatal at startup; the listener never binds.
#[derive(Error, Debug, PartialEq, Eq)]
pub enum ConfigError {
    #[error("missing required environment variable {0}")]
    Missing(&'static str),

    #[error("invalid value for {var}: {value:?} ({reason})")]
    Invalid {
        var: &'static str,
        value: String,
        reason: String,
    },
}
