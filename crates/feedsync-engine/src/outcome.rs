//! Run results: per-record outcomes, advisory progress events, and the
//! summary every run produces — success or failure.

use serde::Serialize;

/// What happened to one record. Explicit values instead of exceptions:
/// only run-aborting fetch/parse failures use the error channel.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum Outcome {
    Created,
    Updated,
    /// The record required no action (already-imported order, cancelled
    /// order, nothing to import).
    Skipped,
}

/// Advisory progress event emitted between records. Purely informational.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Progress {
    /// 1-based index of the record just processed.
    pub index: usize,
    pub total: usize,
    pub percent: f64,
}

impl Progress {
    #[must_use]
    pub fn new(index: usize, total: usize) -> Self {
        #[allow(clippy::cast_precision_loss)]
        let percent = if total == 0 {
            100.0
        } else {
            index as f64 / total as f64 * 100.0
        };
        Self {
            index,
            total,
            percent,
        }
    }
}

/// Bounded number of error messages carried in a summary. All errors are
/// still counted; only the stored messages are capped.
pub const MAX_ERROR_MESSAGES: usize = 10;

/// The structured result of one import run. Always returned, never thrown:
/// a fetch/parse failure yields a failed summary with zero counts.
#[derive(Debug, Clone, Default, Serialize)]
pub struct Summary {
    pub success: bool,
    pub created: u32,
    pub updated: u32,
    pub skipped: u32,
    pub errors: u32,
    /// First [`MAX_ERROR_MESSAGES`] error messages, verbatim.
    pub error_messages: Vec<String>,
    /// Number of records located in the feed.
    pub total: u32,
    /// Run-aborting failure message, when the run never reached records.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub failure: Option<String>,
}

impl Summary {
    /// A successful summary skeleton for a feed with `total` records.
    #[must_use]
    pub fn started(total: usize) -> Self {
        Self {
            success: true,
            total: u32::try_from(total).unwrap_or(u32::MAX),
            ..Self::default()
        }
    }

    /// A failed summary for a run aborted before record processing.
    #[must_use]
    pub fn failed(message: String) -> Self {
        let mut summary = Self {
            success: false,
            failure: Some(message.clone()),
            ..Self::default()
        };
        summary.push_error(message);
        summary
    }

    /// Count an error; keep the message only while under the cap.
    pub fn push_error(&mut self, message: String) {
        self.errors += 1;
        if self.error_messages.len() < MAX_ERROR_MESSAGES {
            self.error_messages.push(message);
        }
    }

    pub fn record(&mut self, outcome: Outcome) {
        match outcome {
            Outcome::Created => self.created += 1,
            Outcome::Updated => self.updated += 1,
            Outcome::Skipped => self.skipped += 1,
        }
    }
}
