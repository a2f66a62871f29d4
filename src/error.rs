// src/error.rs
//! Error taxonomy shared by adapters, classifiers and the pipeline.

use std::time::Duration;

use reqwest::StatusCode;
use thiserror::Error;

/// Failure of a single provider call (fetch or classification).
#[derive(Debug, Error)]
pub enum SourceError {
    /// Network timeout, connection reset, 5xx.
    #[error("transient failure: {0}")]
    Transient(String),

    #[error("rate limited (retry after {retry_after:?})")]
    RateLimited { retry_after: Option<Duration> },

    /// Missing or rejected credentials. Never retried.
    #[error("authentication failed: {0}")]
    Auth(String),

    #[error("malformed payload: {0}")]
    Parse(String),

    /// Non-retryable HTTP status (4xx other than 401/403/429).
    #[error("unexpected status {status}")]
    Http { status: u16 },

    #[error("call timed out")]
    Timeout,
}

impl SourceError {
    /// Whether the retry policy may try again.
    pub fn is_retryable(&self) -> bool {
        matches!(
            self,
            SourceError::Transient(_) | SourceError::RateLimited { .. } | SourceError::Timeout
        )
    }

    /// Short machine-friendly label used in metrics and warnings.
    pub fn kind(&self) -> &'static str {
        match self {
            SourceError::Transient(_) => "transient",
            SourceError::RateLimited { .. } => "rate_limited",
            SourceError::Auth(_) => "auth",
            SourceError::Parse(_) => "parse",
            SourceError::Http { .. } => "http",
            SourceError::Timeout => "timeout",
        }
    }

    /// Map a non-success HTTP status into the taxonomy.
    pub fn from_status(status: StatusCode, retry_after: Option<Duration>) -> Self {
        match status.as_u16() {
            401 | 403 => SourceError::Auth(format!("status {status}")),
            429 => SourceError::RateLimited { retry_after },
            408 => SourceError::Timeout,
            s if s >= 500 => SourceError::Transient(format!("status {status}")),
            s => SourceError::Http { status: s },
        }
    }
}

impl From<reqwest::Error> for SourceError {
    fn from(e: reqwest::Error) -> Self {
        if e.is_timeout() {
            return SourceError::Timeout;
        }
        if e.is_decode() {
            return SourceError::Parse(e.to_string());
        }
        if let Some(status) = e.status() {
            return SourceError::from_status(status, None);
        }
        SourceError::Transient(e.to_string())
    }
}

impl From<serde_json::Error> for SourceError {
    fn from(e: serde_json::Error) -> Self {
        SourceError::Parse(e.to_string())
    }
}

impl From<quick_xml::de::DeError> for SourceError {
    fn from(e: quick_xml::de::DeError) -> Self {
        SourceError::Parse(e.to_string())
    }
}

/// Parse a `Retry-After` header given in seconds.
pub fn retry_after_from(headers: &reqwest::header::HeaderMap) -> Option<Duration> {
    headers
        .get(reqwest::header::RETRY_AFTER)
        .and_then(|v| v.to_str().ok())
        .and_then(|s| s.trim().parse::<u64>().ok())
        .map(Duration::from_secs)
}

/// Structurally invalid configuration. Reported at startup, never mid-run.
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("reading {path}: {source}")]
    Io {
        path: String,
        #[source]
        source: std::io::Error,
    },

    #[error("parsing {path}: {message}")]
    Format { path: String, message: String },

    #[error("invalid configuration: {0}")]
    Invalid(String),
}

/// Run-level outcome errors.
#[derive(Debug, Error)]
pub enum PipelineError {
    /// Every adapter returned zero articles for every query.
    #[error("all sources failed: {adapters} adapter(s) x {queries} query(ies) produced no articles")]
    AllSourcesFailed { adapters: usize, queries: usize },

    #[error(transparent)]
    Config(#[from] ConfigError),

    #[error("writing output: {0}")]
    Output(#[from] OutputError),
}

#[derive(Debug, Error)]
pub enum OutputError {
    #[error("io error on {path}: {source}")]
    Io {
        path: String,
        #[source]
        source: std::io::Error,
    },

    #[error("csv error: {0}")]
    Csv(#[from] csv::Error),

    #[error("invalid record in {path} at row {row}: {message}")]
    Record {
        path: String,
        row: usize,
        message: String,
    },
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn status_mapping_follows_taxonomy() {
        assert!(matches!(
            SourceError::from_status(StatusCode::UNAUTHORIZED, None),
            SourceError::Auth(_)
        ));
        assert!(matches!(
            SourceError::from_status(StatusCode::FORBIDDEN, None),
            SourceError::Auth(_)
        ));
        let rl = SourceError::from_status(
            StatusCode::TOO_MANY_REQUESTS,
            Some(Duration::from_secs(3)),
        );
        assert!(matches!(
            rl,
            SourceError::RateLimited { retry_after: Some(d) } if d == Duration::from_secs(3)
        ));
        assert!(SourceError::from_status(StatusCode::BAD_GATEWAY, None).is_retryable());
        assert!(!SourceError::from_status(StatusCode::NOT_FOUND, None).is_retryable());
    }

    #[test]
    fn auth_and_parse_are_not_retryable() {
        assert!(!SourceError::Auth("x".into()).is_retryable());
        assert!(!SourceError::Parse("x".into()).is_retryable());
        assert!(SourceError::Timeout.is_retryable());
    }
}
