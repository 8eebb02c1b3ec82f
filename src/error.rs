//! Application-wide error types.

use thiserror::Error;

#[derive(Debug, Error)]
pub enum AppError {
    #[error("config error: {0}")]
    Config(String),

    #[error("logger error: {0}")]
    Logger(String),

    #[error("document store error: {0}")]
    Store(String),

    #[error("io error: {0}")]
    Io(#[from] std::io::Error),
}

/// Per-source failure taxonomy for the answer-orchestration core.
///
/// Every variant is caught at a fetcher boundary and converted into a
/// descriptive string before it reaches the aggregation step — the join
/// barrier in the orchestrator never sees these escape.
#[derive(Debug, Error)]
pub enum FetchError {
    #[error("document index unavailable: {0}")]
    IndexUnavailable(String),

    #[error("completion failed: {0}")]
    Completion(#[from] crate::llm::ProviderError),

    #[error("web search failed: {0}")]
    Search(String),

    /// Per-URL scrape failure. Always non-fatal: the web fetcher treats the
    /// affected page as contributing no text.
    #[error("scrape failed: {0}")]
    Scrape(String),
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::error::Error;

    #[test]
    fn config_error_display() {
        let e = AppError::Config("missing field".into());
        assert!(e.to_string().contains("missing field"));
    }

    #[test]
    fn store_error_display() {
        let e = AppError::Store("chunks.db locked".into());
        assert!(e.to_string().contains("chunks.db locked"));
    }

    #[test]
    fn io_error_converts() {
        let io_err = std::io::Error::new(std::io::ErrorKind::NotFound, "file missing");
        let e: AppError = io_err.into();
        assert!(e.to_string().contains("io error"));
        // satisfies std::error::Error trait
        let _: &dyn Error = &e;
    }
}
