use thiserror::Error;

use feedsync_feed::{FetchError, ParseError};
use feedsync_store::StoreError;

/// Run-aborting failure: the feed could not be fetched or parsed. Nothing
/// record-level happens after one of these.
#[derive(Debug, Error)]
pub enum RunError {
    #[error("failed to fetch feed: {0}")]
    Fetch(#[from] FetchError),

    #[error("failed to parse feed: {0}")]
    Parse(#[from] ParseError),
}

/// Per-record reconciliation failure. Isolated: rolled back, counted,
/// surfaced in the run summary — never propagated past the record loop.
#[derive(Debug, Error)]
#[error("{0}")]
pub struct RecordError(pub String);

impl RecordError {
    pub fn new(message: impl Into<String>) -> Self {
        Self(message.into())
    }
}

impl From<StoreError> for RecordError {
    fn from(err: StoreError) -> Self {
        Self(err.to_string())
    }
}
