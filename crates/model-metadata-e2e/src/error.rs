//! Error types for the metadata editing helpers

use std::time::Duration;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum HelperError {
    #[error("Element not found after {timeout:?}: {locator}")]
    ElementNotFound { locator: String, timeout: Duration },

    #[error("Expected a single element but found {count}: {locator}")]
    AmbiguousMatch { locator: String, count: usize },

    #[error("Assertion failed: {0}")]
    AssertionFailed(String),

    #[error("Timed out after {timeout:?} waiting for {stage} of @{alias}")]
    Timeout {
        alias: String,
        stage: WaitStage,
        timeout: Duration,
    },

    #[error("No interception registered under alias @{0}")]
    UnknownAlias(String),

    #[error("Invalid pattern `{pattern}`: {reason}")]
    InvalidPattern { pattern: String, reason: String },

    #[error("Request {method} {url} failed: {reason}")]
    NetworkFailure {
        method: String,
        url: String,
        reason: String,
    },

    #[error("HTTP {status} from {url}: {body}")]
    Http { status: u16, url: String, body: String },

    #[error("Card {0} has no result_metadata")]
    MissingMetadata(u64),

    #[error("HTTP request error: {0}")]
    Request(#[from] reqwest::Error),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("Browser driver error: {0}")]
    Driver(String),
}

impl From<chromiumoxide::error::CdpError> for HelperError {
    fn from(e: chromiumoxide::error::CdpError) -> Self {
        HelperError::Driver(e.to_string())
    }
}

/// Which half of an aliased round trip a wait gave up on
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum WaitStage {
    Request,
    Response,
}

impl std::fmt::Display for WaitStage {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            WaitStage::Request => f.write_str("request"),
            WaitStage::Response => f.write_str("response"),
        }
    }
}

pub type Result<T> = std::result::Result<T, HelperError>;
