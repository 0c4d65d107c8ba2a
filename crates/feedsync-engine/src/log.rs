//! Import-log bookkeeping: one log entity per completed run, pruned to a
//! bounded history.

use chrono::{DateTime, Utc};
use feedsync_core::FeedKind;
use feedsync_store::{fields, EntityKind, EntityStore, FieldValue};

use crate::outcome::Summary;

/// Retained log entries; older ones are pruned after each write.
pub const MAX_IMPORT_LOGS: usize = 100;

/// Record the outcome of a run as an `ImportLog` entity. Best-effort:
/// logging failures are warned about, never propagated.
pub fn record_import_log(
    store: &mut dyn EntityStore,
    source: &str,
    kind: FeedKind,
    summary: &Summary,
    run_at: DateTime<Utc>,
) {
    let status = if summary.success { "Success" } else { "Failed" };
    let payload = serde_json::to_string(summary).unwrap_or_else(|_| "{}".to_string());

    let log_fields = fields([
        ("import_type", FieldValue::text(kind.to_string())),
        ("source", FieldValue::text(source)),
        ("status", FieldValue::text(status)),
        ("created", FieldValue::Integer(i64::from(summary.created))),
        ("updated", FieldValue::Integer(i64::from(summary.updated))),
        ("skipped", FieldValue::Integer(i64::from(summary.skipped))),
        ("errors", FieldValue::Integer(i64::from(summary.errors))),
        (
            "error_details",
            FieldValue::text(summary.error_messages.join("\n")),
        ),
        ("summary", FieldValue::text(payload)),
        ("run_at", FieldValue::text(run_at.to_rfc3339())),
    ]);

    let key = uuid::Uuid::new_v4().to_string();
    if let Err(e) = store.create(EntityKind::ImportLog, &key, log_fields) {
        tracing::warn!(error = %e, "failed to write import log");
        return;
    }

    prune_import_logs(store);
}

/// Delete the oldest logs beyond [`MAX_IMPORT_LOGS`], ordered by run time.
fn prune_import_logs(store: &mut dyn EntityStore) {
    let mut logs = match store.list(EntityKind::ImportLog) {
        Ok(logs) => logs,
        Err(e) => {
            tracing::warn!(error = %e, "failed to list import logs for pruning");
            return;
        }
    };
    if logs.len() <= MAX_IMPORT_LOGS {
        return;
    }

    logs.sort_by(|a, b| a.text("run_at").cmp(b.text("run_at")));
    let excess = logs.len() - MAX_IMPORT_LOGS;
    for log in logs.into_iter().take(excess) {
        if let Err(e) = store.delete(EntityKind::ImportLog, &log.key) {
            tracing::warn!(log = %log.key, error = %e, "failed to prune import log");
        }
    }
}

#[cfg(test)]
mod tests {
    use chrono::{Duration, TimeZone};
    use feedsync_store::MemoryStore;

    use super::*;

    fn run_at() -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2024, 3, 20, 8, 0, 0).unwrap()
    }

    fn summary() -> Summary {
        let mut summary = Summary::started(5);
        summary.created = 3;
        summary.updated = 1;
        summary.push_error("record 4 failed".to_string());
        summary
    }

    #[test]
    fn writes_a_log_entity_with_counts() {
        let mut store = MemoryStore::new();
        record_import_log(&mut store, "feed.xml", FeedKind::Items, &summary(), run_at());

        let logs = store.list(EntityKind::ImportLog).unwrap();
        assert_eq!(logs.len(), 1);
        let log = &logs[0];
        assert_eq!(log.text("import_type"), "items");
        assert_eq!(log.text("status"), "Success");
        assert!((log.number("created") - 3.0).abs() < f64::EPSILON);
        assert_eq!(log.text("error_details"), "record 4 failed");
        assert!(log.text("summary").contains("\"created\":3"));
    }

    #[test]
    fn failed_runs_are_marked_failed() {
        let mut store = MemoryStore::new();
        let failed = Summary::failed("failed to parse feed".to_string());
        record_import_log(&mut store, "feed.xml", FeedKind::Orders, &failed, run_at());
        let logs = store.list(EntityKind::ImportLog).unwrap();
        assert_eq!(logs[0].text("status"), "Failed");
    }

    #[test]
    fn history_is_pruned_to_the_cap() {
        let mut store = MemoryStore::new();
        let base = run_at();
        for i in 0..(MAX_IMPORT_LOGS + 7) {
            let at = base + Duration::minutes(i64::try_from(i).unwrap());
            record_import_log(&mut store, "feed.xml", FeedKind::Items, &summary(), at);
        }

        let logs = store.list(EntityKind::ImportLog).unwrap();
        assert_eq!(logs.len(), MAX_IMPORT_LOGS);
        // The oldest entries are the ones that were dropped.
        let oldest_kept = base + Duration::minutes(7);
        assert!(logs
            .iter()
            .all(|log| log.text("run_at") >= oldest_kept.to_rfc3339().as_str()));
    }
}
