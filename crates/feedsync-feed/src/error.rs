use thiserror::Error;

/// Transport-level failure retrieving a feed source. Run-aborting.
#[derive(Debug, Error)]
pub enum FetchError {
    #[error("HTTP error fetching {url}: {source}")]
    Http {
        url: String,
        #[source]
        source: reqwest::Error,
    },

    #[error("unexpected HTTP status {status} from {url}")]
    UnexpectedStatus { status: u16, url: String },

    #[error("failed to read {path}: {source}")]
    Io {
        path: String,
        #[source]
        source: std::io::Error,
    },

    #[error("failed to build HTTP client: {0}")]
    Client(#[source] reqwest::Error),
}

/// Malformed-XML failure. Run-aborting: a document that does not parse
/// yields zero records, never a partial document.
#[derive(Debug, Error)]
pub enum ParseError {
    #[error("malformed XML at byte {position}: {reason}")]
    Malformed { position: u64, reason: String },

    #[error("document has no root element")]
    NoRoot,

    #[error("unexpected content after the root element at byte {position}")]
    TrailingContent { position: u64 },

    #[error("document ended before the root element was closed")]
    UnexpectedEof,
}
