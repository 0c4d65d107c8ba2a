use std::path::PathBuf;

/// Process-wide configuration, read from environment variables.
///
/// Per-feed settings (source URL, schedule, company) live in the feeds
/// file — see [`crate::feeds`]. This struct only carries what applies to
/// the whole process.
#[derive(Debug, Clone)]
pub struct AppConfig {
    pub log_level: String,
    pub feeds_path: PathBuf,
    /// Company assigned to imported records when a feed does not name one.
    pub default_company: String,
    /// Timeout for full feed downloads, in seconds.
    pub fetch_timeout_secs: u64,
    /// Timeout for HEAD probes and image downloads, in seconds.
    pub probe_timeout_secs: u64,
    pub user_agent: String,
}
