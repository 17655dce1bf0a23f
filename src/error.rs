// src/error.rs
use reqwest::StatusCode;
use thiserror::Error;

#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum LbError {
    #[error("no instance available for service '{service_id}'")]
    NoInstanceAvailable { service_id: String },
}

#[derive(Debug, Error)]
pub enum FetchError {
    #[error("request failed: {0}")]
    Request(#[from] reqwest::Error),

    #[error("GET {url} returned {status}")]
    Status { url: String, status: StatusCode },

    #[error("failed to decode greeting from {url}: {source}")]
    Decode { url: String, source: serde_json::Error },

    #[error("invalid url '{url}': {source}")]
    InvalidUrl { url: String, source: url::ParseError },

    #[error("url '{0}' has no host to resolve")]
    MissingHost(String),

    #[error("{url} returned no greeting")]
    Empty { url: String },

    #[error(transparent)]
    NoInstance(#[from] LbError),
}

#[derive(Debug, Error)]
pub enum DiscoveryError {
    #[error("catalog request failed: {0}")]
    Request(#[from] reqwest::Error),

    #[error("catalog lookup of '{service_id}' returned {status}")]
    Status { service_id: String, status: StatusCode },
}
