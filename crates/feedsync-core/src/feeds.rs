use std::collections::HashSet;
use std::path::Path;

use chrono::Duration;
use serde::{Deserialize, Serialize};

use crate::ConfigError;

/// What kind of records a feed carries.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum FeedKind {
    Items,
    Orders,
}

impl std::fmt::Display for FeedKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            FeedKind::Items => write!(f, "items"),
            FeedKind::Orders => write!(f, "orders"),
        }
    }
}

/// How often a feed is eligible to run.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum Frequency {
    #[serde(rename = "every_5_minutes")]
    Every5Minutes,
    #[serde(rename = "every_10_minutes")]
    Every10Minutes,
    #[serde(rename = "every_15_minutes")]
    Every15Minutes,
    #[serde(rename = "every_30_minutes")]
    Every30Minutes,
    #[serde(rename = "hourly")]
    Hourly,
    #[serde(rename = "every_2_hours")]
    Every2Hours,
    #[serde(rename = "every_6_hours")]
    Every6Hours,
    #[serde(rename = "daily")]
    Daily,
    #[serde(rename = "weekly")]
    Weekly,
}

impl Frequency {
    /// The minimum elapsed time between two runs at this frequency.
    #[must_use]
    pub fn interval(self) -> Duration {
        match self {
            Frequency::Every5Minutes => Duration::minutes(5),
            Frequency::Every10Minutes => Duration::minutes(10),
            Frequency::Every15Minutes => Duration::minutes(15),
            Frequency::Every30Minutes => Duration::minutes(30),
            Frequency::Hourly => Duration::hours(1),
            Frequency::Every2Hours => Duration::hours(2),
            Frequency::Every6Hours => Duration::hours(6),
            Frequency::Daily => Duration::days(1),
            Frequency::Weekly => Duration::weeks(1),
        }
    }
}

/// One configured feed: where it lives, what it carries, when it runs.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct FeedConfig {
    pub name: String,
    pub enabled: bool,
    pub kind: FeedKind,
    pub source_url: String,
    pub company: Option<String>,
    pub frequency: Frequency,
    /// Suppress a run when the feed's cache validators are unchanged.
    /// Only meaningful for item feeds.
    #[serde(default)]
    pub check_feed_changes: bool,
    /// Submit imported orders immediately instead of leaving them as drafts.
    #[serde(default)]
    pub auto_submit_orders: bool,
    #[serde(default)]
    pub download_images: bool,
    /// Post stock adjustments from item feeds.
    #[serde(default = "default_true")]
    pub update_stock: bool,
    #[serde(default)]
    pub notification_recipients: Vec<String>,
}

fn default_true() -> bool {
    true
}

#[derive(Debug, Deserialize)]
pub struct FeedsFile {
    pub feeds: Vec<FeedConfig>,
}

/// Load and validate the feeds configuration from a YAML file.
///
/// # Errors
///
/// Returns `ConfigError` if the file cannot be read, parsed, or fails validation.
pub fn load_feeds(path: &Path) -> Result<FeedsFile, ConfigError> {
    let content = std::fs::read_to_string(path).map_err(|e| ConfigError::FeedsFileIo {
        path: path.display().to_string(),
        source: e,
    })?;

    let feeds_file: FeedsFile = serde_yaml::from_str(&content)?;

    validate_feeds(&feeds_file)?;

    Ok(feeds_file)
}

fn validate_feeds(feeds_file: &FeedsFile) -> Result<(), ConfigError> {
    let mut seen_names = HashSet::new();

    for feed in &feeds_file.feeds {
        if feed.name.trim().is_empty() {
            return Err(ConfigError::Validation(
                "feed name must be non-empty".to_string(),
            ));
        }

        let lower_name = feed.name.to_lowercase();
        if !seen_names.insert(lower_name) {
            return Err(ConfigError::Validation(format!(
                "duplicate feed name: '{}'",
                feed.name
            )));
        }

        if feed.enabled && feed.source_url.trim().is_empty() {
            return Err(ConfigError::Validation(format!(
                "feed '{}' is enabled but has no source_url",
                feed.name
            )));
        }

        for recipient in &feed.notification_recipients {
            if !recipient.contains('@') {
                return Err(ConfigError::Validation(format!(
                    "feed '{}' has an invalid notification recipient: '{recipient}'",
                    feed.name
                )));
            }
        }
    }

    Ok(())
}
