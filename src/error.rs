use std::path::PathBuf;

use reqwest::StatusCode;
use thiserror::Error;

/// Upstream conditions that will fail the same way on every cycle.
///
/// These end the process; everything else is scoped to a single location.
#[derive(Debug, Error, PartialEq, Eq)]
pub enum FatalError {
    #[error("IQAir rejected the request for location '{location}'; check its country/state/city")]
    InvalidLocation { location: String },

    #[error("IQAir rejected the API key (HTTP {status}); see https://www.iqair.com/dashboard/api")]
    InvalidApiKey { status: u16 },

    #[error("IQAir endpoint not found (HTTP 404); the API may have changed")]
    ApiChanged,
}

#[derive(Debug, Error)]
pub enum TransportError {
    #[error("request to {url} failed")]
    Request {
        url: String,
        #[source]
        source: reqwest::Error,
    },

    #[error("reading response body from {url} failed")]
    Body {
        url: String,
        #[source]
        source: reqwest::Error,
    },
}

#[derive(Debug, Error)]
pub enum BuildError {
    #[error("unsuccessful call: {message}")]
    Unsuccessful { message: String },

    #[error("unexpected response shape")]
    Malformed(#[from] serde_json::Error),
}

#[derive(Debug, Error)]
pub enum SinkError {
    #[error("write to InfluxDB failed")]
    Request(#[from] reqwest::Error),

    #[error("InfluxDB rejected the write with status {status}: {body}")]
    Status { status: StatusCode, body: String },
}

/// Outcome of a polling cycle that did not complete.
#[derive(Debug, Error)]
pub enum CycleError {
    #[error(transparent)]
    Fatal(#[from] FatalError),

    #[error(transparent)]
    Sink(#[from] SinkError),
}

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("missing configuration file {0}")]
    Missing(PathBuf),

    #[error("failed to read configuration file {0}")]
    Io(PathBuf, #[source] std::io::Error),

    #[error("invalid configuration file")]
    Parse(#[from] serde_yaml::Error),

    #[error("invalid configuration: {0}")]
    Invalid(String),
}
