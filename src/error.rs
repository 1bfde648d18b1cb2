use std::path::PathBuf;

use thiserror::Error;

/// Transport failures from the fetch collaborator.
#[derive(Debug, Error)]
pub enum FetchError {
    #[error("request to {url} failed: {source}")]
    Request {
        url: String,
        #[source]
        source: reqwest::Error,
    },

    #[error("request to {url} timed out")]
    Timeout { url: String },

    #[error("{url} returned HTTP {status}")]
    Status { url: String, status: u16 },
}

impl FetchError {
    pub fn from_reqwest(url: &str, source: reqwest::Error) -> Self {
        if source.is_timeout() {
            Self::Timeout {
                url: url.to_string(),
            }
        } else {
            Self::Request {
                url: url.to_string(),
                source,
            }
        }
    }
}

/// Failures that end processing of one entity but not the run.
#[derive(Debug, Error)]
pub enum EntityError {
    #[error("detail fetch failed: {0}")]
    DetailFetch(#[source] FetchError),

    #[error("cannot write document {path:?}: {source}")]
    DocumentWrite {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("task panicked")]
    TaskPanicked,
}

/// Failures that abort the whole run.
#[derive(Debug, Error)]
pub enum PipelineError {
    #[error("listing fetch failed: {0}")]
    ListingFetch(#[source] FetchError),

    #[error("cannot write aggregate {path:?}: {source}")]
    AggregateWrite {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("cannot read aggregate {path:?}: {source}")]
    AggregateRead {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("aggregate serialization failed: {0}")]
    Serialize(#[from] serde_json::Error),
}
