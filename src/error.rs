// src/error.rs
use thiserror::Error;

/// Errors surfaced by the aggregation engine.
///
/// An unavailable remote is deliberately NOT represented here: it is a
/// permanent empty-result state signaled by the availability check, and
/// `load_more` resolves successfully with no state change.
#[derive(Debug, Error)]
pub enum AggregatorError {
    /// Bad constructor input. Fatal at construction, never recovered.
    #[error("invalid argument: {0}")]
    InvalidArgument(String),

    /// Remote failure during `load_more`. The aggregator state is
    /// unchanged; the caller may retry by calling `load_more` again.
    #[error("transfer fetch failed: {0}")]
    Fetch(eyre::Report),

    /// Corrupt feed data (missing or unparseable block timestamp).
    /// Indicates an upstream integrity violation; not retryable.
    #[error("malformed transfer data: {0}")]
    MalformedData(String),
}
