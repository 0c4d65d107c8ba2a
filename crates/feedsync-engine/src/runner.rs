//! The run orchestrator: fetch → parse → extract → strictly ordered
//! per-record reconcile loop.
//!
//! Only fetch and parse failures abort a run. Record failures are counted
//! and the loop continues; the summary caps stored error messages while
//! counting every error.

use chrono::Utc;
use feedsync_core::{FeedConfig, FeedKind};
use feedsync_feed::{extract_items, extract_orders, parse_document, FeedClient, OrderTagMatcher};
use feedsync_store::EntityStore;

use crate::error::RunError;
use crate::item::reconcile_item;
use crate::order::reconcile_order;
use crate::outcome::{Progress, Summary};

/// Per-run behavior switches, derived from the feed configuration.
#[derive(Debug, Clone)]
pub struct RunOptions {
    pub company: String,
    pub download_images: bool,
    pub update_stock: bool,
    pub auto_submit_orders: bool,
}

impl Default for RunOptions {
    fn default() -> Self {
        Self {
            company: "Main Company".to_string(),
            download_images: false,
            update_stock: true,
            auto_submit_orders: false,
        }
    }
}

impl RunOptions {
    /// Options for a configured feed; the feed's company wins over the
    /// process-wide default.
    #[must_use]
    pub fn from_feed(feed: &FeedConfig, default_company: &str) -> Self {
        Self {
            company: feed
                .company
                .clone()
                .unwrap_or_else(|| default_company.to_string()),
            download_images: feed.download_images,
            update_stock: feed.update_stock,
            auto_submit_orders: feed.auto_submit_orders,
        }
    }
}

/// Drives one import run end to end and always produces a [`Summary`].
pub struct ImportRunner<'a> {
    client: &'a FeedClient,
    matcher: OrderTagMatcher,
    options: RunOptions,
}

impl<'a> ImportRunner<'a> {
    #[must_use]
    pub fn new(client: &'a FeedClient, options: RunOptions) -> Self {
        Self {
            client,
            matcher: OrderTagMatcher::default(),
            options,
        }
    }

    /// Replace the order record-tag matcher for vendors with unusual tags.
    #[must_use]
    pub fn with_order_tags(mut self, matcher: OrderTagMatcher) -> Self {
        self.matcher = matcher;
        self
    }

    /// Run an import without progress reporting.
    pub async fn run(
        &self,
        store: &mut dyn EntityStore,
        source: &str,
        kind: FeedKind,
    ) -> Summary {
        self.run_with_progress(store, source, kind, &mut |_| {}).await
    }

    /// Run an import, emitting an advisory [`Progress`] event after each
    /// record. Progress is purely informational.
    pub async fn run_with_progress(
        &self,
        store: &mut dyn EntityStore,
        source: &str,
        kind: FeedKind,
        progress: &mut (dyn FnMut(Progress) + Send),
    ) -> Summary {
        tracing::info!(source, %kind, "starting feed import");

        let raw = match self.client.fetch(source).await {
            Ok(raw) => raw,
            Err(e) => return abort(&RunError::Fetch(e)),
        };
        let root = match parse_document(&raw) {
            Ok(root) => root,
            Err(e) => return abort(&RunError::Parse(e)),
        };

        let summary = match kind {
            FeedKind::Items => self.run_items(store, &root, progress).await,
            FeedKind::Orders => self.run_orders(store, &root, progress),
        };

        tracing::info!(
            created = summary.created,
            updated = summary.updated,
            skipped = summary.skipped,
            errors = summary.errors,
            total = summary.total,
            "feed import finished"
        );
        summary
    }

    async fn run_items(
        &self,
        store: &mut dyn EntityStore,
        root: &feedsync_feed::XmlElement,
        progress: &mut (dyn FnMut(Progress) + Send),
    ) -> Summary {
        let records = extract_items(root);
        tracing::info!(count = records.len(), "located item records");

        let mut summary = Summary::started(records.len());
        for (index, record) in records.iter().enumerate() {
            match reconcile_item(store, self.client, record, &self.options).await {
                Ok(outcome) => summary.record(outcome),
                Err(e) => {
                    tracing::error!(error = %e, "item record failed");
                    summary.push_error(e.to_string());
                }
            }
            progress(Progress::new(index + 1, records.len()));
        }
        summary
    }

    fn run_orders(
        &self,
        store: &mut dyn EntityStore,
        root: &feedsync_feed::XmlElement,
        progress: &mut (dyn FnMut(Progress) + Send),
    ) -> Summary {
        let records = extract_orders(root, &self.matcher);
        tracing::info!(count = records.len(), "located order records");

        let now = Utc::now();
        let mut summary = Summary::started(records.len());
        for (index, record) in records.iter().enumerate() {
            match reconcile_order(store, record, &self.options, now) {
                Ok(outcome) => summary.record(outcome),
                Err(e) => {
                    tracing::error!(error = %e, "order record failed");
                    summary.push_error(e.to_string());
                }
            }
            progress(Progress::new(index + 1, records.len()));
        }
        summary
    }
}

fn abort(error: &RunError) -> Summary {
    tracing::error!(error = %error, "feed import aborted");
    Summary::failed(error.to_string())
}
