//! Trigger surface: the manual and scheduled entry points.
//!
//! Nothing here throws to the caller — every import produces a structured
//! [`Summary`], and scheduled runs additionally write import logs and
//! notify configured recipients.

use std::collections::HashMap;

use chrono::{DateTime, Utc};
use feedsync_core::{FeedConfig, FeedKind};
use feedsync_feed::{
    extract_items, extract_orders, parse_document, FeedClient, FeedSignature, OrderTagMatcher,
};
use feedsync_store::EntityStore;

use crate::error::RunError;
use crate::gate::{feed_changed, should_run};
use crate::log::record_import_log;
use crate::notify::{notification_body, notification_subject, Notifier};
use crate::outcome::Summary;
use crate::runner::{ImportRunner, RunOptions};

/// Process-local scheduling state for one feed.
#[derive(Debug, Clone, Default)]
pub struct FeedState {
    pub last_run_at: Option<DateTime<Utc>>,
    pub last_signature: Option<FeedSignature>,
}

/// Scheduling state per feed name, owned by the scheduler loop.
pub type FeedStates = HashMap<String, FeedState>;

/// Manually trigger an import for one configured feed.
///
/// With `dry_run` the feed is fetched, parsed, and extracted but the store
/// is never touched: the summary reports the located records as skipped.
pub async fn run_import(
    client: &FeedClient,
    store: &mut dyn EntityStore,
    feed: &FeedConfig,
    default_company: &str,
    dry_run: bool,
) -> Summary {
    if dry_run {
        return dry_run_summary(client, &feed.source_url, feed.kind).await;
    }

    let options = RunOptions::from_feed(feed, default_company);
    ImportRunner::new(client, options)
        .run(store, &feed.source_url, feed.kind)
        .await
}

async fn dry_run_summary(client: &FeedClient, source: &str, kind: FeedKind) -> Summary {
    match count_records(client, source, kind).await {
        Ok(total) => {
            let mut summary = Summary::started(total);
            summary.skipped = summary.total;
            tracing::info!(source, total, "dry run: no records were written");
            summary
        }
        Err(e) => Summary::failed(e.to_string()),
    }
}

async fn count_records(
    client: &FeedClient,
    source: &str,
    kind: FeedKind,
) -> Result<usize, RunError> {
    let raw = client.fetch(source).await?;
    let root = parse_document(&raw)?;
    Ok(match kind {
        FeedKind::Items => extract_items(&root).len(),
        FeedKind::Orders => extract_orders(&root, &OrderTagMatcher::default()).len(),
    })
}

/// Run every enabled feed that is due, updating the scheduling state,
/// writing import logs, and notifying configured recipients.
pub async fn run_scheduled(
    client: &FeedClient,
    store: &mut dyn EntityStore,
    feeds: &[FeedConfig],
    states: &mut FeedStates,
    notifier: &dyn Notifier,
    default_company: &str,
    now: DateTime<Utc>,
) {
    for feed in feeds.iter().filter(|f| f.enabled) {
        let state = states.entry(feed.name.clone()).or_default();

        if !should_run(state.last_run_at, feed.frequency, now) {
            tracing::debug!(feed = %feed.name, "not due yet; skipping");
            continue;
        }

        // Change detection applies to item feeds over HTTP only; a probe
        // failure assumes the feed changed rather than silently stalling.
        if feed.kind == FeedKind::Items && feed.check_feed_changes && is_remote(&feed.source_url)
        {
            match client.probe(&feed.source_url).await {
                Ok(signature) => {
                    if !feed_changed(&signature, state.last_signature.as_ref()) {
                        tracing::info!(feed = %feed.name, "feed unchanged; skipping run");
                        continue;
                    }
                    state.last_signature = Some(signature);
                }
                Err(e) => {
                    tracing::warn!(feed = %feed.name, error = %e, "probe failed; assuming changed");
                }
            }
        }

        let summary = run_import(client, store, feed, default_company, false).await;
        record_import_log(store, &feed.source_url, feed.kind, &summary, now);
        state.last_run_at = Some(now);

        if !feed.notification_recipients.is_empty() {
            notifier.send(
                &feed.notification_recipients,
                &notification_subject(&feed.name, feed.kind, &summary),
                &notification_body(&summary, now),
            );
        }
    }
}

/// Headline fields of the first record, for connection testing.
#[derive(Debug, Clone)]
pub struct RecordPreview {
    pub key: String,
    pub name: String,
    pub detail: String,
}

/// Result of a feed connection test.
#[derive(Debug, Clone)]
pub struct FeedValidation {
    pub root_tag: String,
    pub total: usize,
    pub sample: Option<RecordPreview>,
}

/// Fetch and parse a feed without importing anything, reporting the record
/// count and a preview of the first record.
///
/// # Errors
///
/// Returns [`RunError`] when the feed cannot be fetched or parsed.
pub async fn validate_feed(
    client: &FeedClient,
    source: &str,
    kind: FeedKind,
) -> Result<FeedValidation, RunError> {
    let raw = client.fetch(source).await?;
    let root = parse_document(&raw)?;

    let (total, sample) = match kind {
        FeedKind::Items => {
            let records = extract_items(&root);
            let sample = records.first().map(|record| RecordPreview {
                key: record.item_code.clone(),
                name: record.name.clone(),
                detail: format!("{} {}", record.price_gross, record.currency),
            });
            (records.len(), sample)
        }
        FeedKind::Orders => {
            let records = extract_orders(&root, &OrderTagMatcher::default());
            let sample = records.first().map(|record| RecordPreview {
                key: record.external_order_id.clone(),
                name: record.billing.name.clone(),
                detail: record.status.clone(),
            });
            (records.len(), sample)
        }
    };

    Ok(FeedValidation {
        root_tag: root.name.clone(),
        total,
        sample,
    })
}

fn is_remote(source: &str) -> bool {
    source.starts_with("http://") || source.starts_with("https://")
}

#[cfg(test)]
mod tests {
    use std::io::Write;
    use std::sync::Mutex;

    use chrono::{Duration, TimeZone};
    use feedsync_core::Frequency;
    use feedsync_store::{EntityKind, MemoryStore};

    use super::*;

    const ITEMS_FEED: &str = "<SHOP>\
        <SHOPITEM id='1'><CODE>A</CODE><NAME>Alpha</NAME><PRICE_VAT>10</PRICE_VAT><CURRENCY>EUR</CURRENCY></SHOPITEM>\
        <SHOPITEM id='2'><CODE>B</CODE><NAME>Beta</NAME></SHOPITEM>\
        </SHOP>";

    struct CaptureNotifier(Mutex<Vec<String>>);

    impl CaptureNotifier {
        fn new() -> Self {
            Self(Mutex::new(Vec::new()))
        }

        fn subjects(&self) -> Vec<String> {
            self.0.lock().unwrap().clone()
        }
    }

    impl Notifier for CaptureNotifier {
        fn send(&self, _recipients: &[String], subject: &str, _body: &str) {
            self.0.lock().unwrap().push(subject.to_string());
        }
    }

    fn client() -> FeedClient {
        FeedClient::new(5, 5, "feedsync-test/0.1").unwrap()
    }

    fn feed_file(content: &str) -> tempfile::NamedTempFile {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        write!(file, "{content}").unwrap();
        file
    }

    fn feed_config(name: &str, source: &str) -> FeedConfig {
        FeedConfig {
            name: name.to_string(),
            enabled: true,
            kind: FeedKind::Items,
            source_url: source.to_string(),
            company: None,
            frequency: Frequency::Hourly,
            check_feed_changes: false,
            auto_submit_orders: false,
            download_images: false,
            update_stock: true,
            notification_recipients: vec!["ops@example.com".to_string()],
        }
    }

    fn now() -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2024, 3, 20, 8, 0, 0).unwrap()
    }

    #[tokio::test]
    async fn dry_run_counts_without_writing() {
        let file = feed_file(ITEMS_FEED);
        let feed = feed_config("catalog", file.path().to_str().unwrap());
        let mut store = MemoryStore::new();

        let summary = run_import(&client(), &mut store, &feed, "Main Company", true).await;

        assert!(summary.success);
        assert_eq!(summary.total, 2);
        assert_eq!(summary.skipped, 2);
        assert_eq!(summary.created, 0);
        assert!(store.list(EntityKind::Item).unwrap().is_empty());
    }

    #[tokio::test]
    async fn validate_feed_reports_count_and_sample() {
        let file = feed_file(ITEMS_FEED);
        let validation = validate_feed(&client(), file.path().to_str().unwrap(), FeedKind::Items)
            .await
            .unwrap();
        assert_eq!(validation.root_tag, "SHOP");
        assert_eq!(validation.total, 2);
        let sample = validation.sample.unwrap();
        assert_eq!(sample.key, "A");
        assert_eq!(sample.name, "Alpha");
        assert!(sample.detail.contains("10"));
    }

    #[tokio::test]
    async fn validate_feed_surfaces_parse_errors() {
        let file = feed_file("<SHOP><SHOPITEM>");
        let result = validate_feed(&client(), file.path().to_str().unwrap(), FeedKind::Items).await;
        assert!(matches!(result, Err(RunError::Parse(_))));
    }

    #[tokio::test]
    async fn scheduled_run_imports_and_respects_frequency() {
        let file = feed_file(ITEMS_FEED);
        let feeds = vec![feed_config("catalog", file.path().to_str().unwrap())];
        let mut store = MemoryStore::new();
        let mut states = FeedStates::new();
        let notifier = CaptureNotifier::new();

        run_scheduled(
            &client(),
            &mut store,
            &feeds,
            &mut states,
            &notifier,
            "Main Company",
            now(),
        )
        .await;

        assert_eq!(store.list(EntityKind::Item).unwrap().len(), 2);
        assert_eq!(store.list(EntityKind::ImportLog).unwrap().len(), 1);
        assert_eq!(states["catalog"].last_run_at, Some(now()));
        assert_eq!(notifier.subjects().len(), 1);

        // Thirty minutes later the hourly feed is not due: nothing happens.
        run_scheduled(
            &client(),
            &mut store,
            &feeds,
            &mut states,
            &notifier,
            "Main Company",
            now() + Duration::minutes(30),
        )
        .await;
        assert_eq!(store.list(EntityKind::ImportLog).unwrap().len(), 1);
        assert_eq!(notifier.subjects().len(), 1);

        // An hour later it runs again and updates every item.
        run_scheduled(
            &client(),
            &mut store,
            &feeds,
            &mut states,
            &notifier,
            "Main Company",
            now() + Duration::hours(1),
        )
        .await;
        assert_eq!(store.list(EntityKind::ImportLog).unwrap().len(), 2);
        assert_eq!(store.list(EntityKind::Item).unwrap().len(), 2);
    }

    #[tokio::test]
    async fn disabled_feeds_are_ignored() {
        let file = feed_file(ITEMS_FEED);
        let mut feed = feed_config("catalog", file.path().to_str().unwrap());
        feed.enabled = false;
        let mut store = MemoryStore::new();
        let mut states = FeedStates::new();
        let notifier = CaptureNotifier::new();

        run_scheduled(
            &client(),
            &mut store,
            &[feed],
            &mut states,
            &notifier,
            "Main Company",
            now(),
        )
        .await;

        assert!(store.list(EntityKind::Item).unwrap().is_empty());
        assert!(states.is_empty());
    }

    #[tokio::test]
    async fn no_notification_without_recipients() {
        let file = feed_file(ITEMS_FEED);
        let mut feed = feed_config("catalog", file.path().to_str().unwrap());
        feed.notification_recipients.clear();
        let mut store = MemoryStore::new();
        let mut states = FeedStates::new();
        let notifier = CaptureNotifier::new();

        run_scheduled(
            &client(),
            &mut store,
            &[feed],
            &mut states,
            &notifier,
            "Main Company",
            now(),
        )
        .await;

        assert!(notifier.subjects().is_empty());
        assert_eq!(store.list(EntityKind::ImportLog).unwrap().len(), 1);
    }
}
