use thiserror::Error;

/// Errors surfaced to the host engine. Everything here is fatal to test
/// setup; failures on the emission path are logged instead of returned.
#[derive(Debug, Error)]
pub enum ListenerError {
    #[error("invalid sampler filter regex \"{pattern}\": {source}")]
    InvalidFilter {
        pattern: String,
        #[source]
        source: regex::Error,
    },

    #[error("invalid value \"{value}\" for parameter {key}")]
    InvalidParameter { key: &'static str, value: String },

    #[error("invalid InfluxDB url {url}: {reason}")]
    InvalidUrl { url: String, reason: String },

    #[error("InfluxDB query failed: {0}")]
    Query(String),

    #[error("InfluxDB request failed: {0}")]
    Transport(#[from] reqwest::Error),

    #[error("InfluxDB returned {status}: {body}")]
    StoreStatus {
        status: reqwest::StatusCode,
        body: String,
    },

    #[error("unexpected InfluxDB response: {0}")]
    Decode(#[from] serde_json::Error),

    #[error("invalid measurement point: {0}")]
    Point(#[from] crate::metrics::PointError),
}

pub type Result<T> = std::result::Result<T, ListenerError>;
