//! Run-summary notifications.
//!
//! Delivery is a collaborator behind a trait; the engine only decides when
//! to notify (full-run summaries, never per-record) and what the message
//! says.

use chrono::{DateTime, Utc};
use feedsync_core::FeedKind;

use crate::outcome::Summary;

/// Notification delivery seam. The default implementation logs; a real
/// deployment wires an email/webhook sender here.
pub trait Notifier: Send + Sync {
    fn send(&self, recipients: &[String], subject: &str, body: &str);
}

/// Emits notifications into the log stream.
pub struct LogNotifier;

impl Notifier for LogNotifier {
    fn send(&self, recipients: &[String], subject: &str, body: &str) {
        tracing::info!(recipients = ?recipients, subject, "import notification");
        tracing::debug!(body, "import notification body");
    }
}

#[must_use]
pub fn notification_subject(feed_name: &str, kind: FeedKind, summary: &Summary) -> String {
    let status = if summary.success { "completed" } else { "failed" };
    format!("Feed import {status}: {feed_name} ({kind})")
}

#[must_use]
pub fn notification_body(summary: &Summary, run_at: DateTime<Utc>) -> String {
    let mut body = if summary.success {
        format!(
            "Feed import completed:\n\n\
             - Records created: {}\n\
             - Records updated: {}\n\
             - Records skipped: {}\n\
             - Errors: {}\n\
             - Total processed: {}\n\n\
             Time: {}\n",
            summary.created,
            summary.updated,
            summary.skipped,
            summary.errors,
            summary.total,
            run_at.to_rfc3339()
        )
    } else {
        format!(
            "Feed import failed:\n\n\
             Error: {}\n\
             Time: {}\n",
            summary.failure.as_deref().unwrap_or("unknown error"),
            run_at.to_rfc3339()
        )
    };

    if !summary.error_messages.is_empty() {
        body.push_str("\nFirst few errors:\n");
        for message in &summary.error_messages {
            body.push_str("- ");
            body.push_str(message);
            body.push('\n');
        }
    }

    body
}
