pub mod app_config;
pub mod config;
pub mod feeds;

use thiserror::Error;

pub use app_config::AppConfig;
pub use config::{load_app_config, load_app_config_from_env};
pub use feeds::{load_feeds, FeedConfig, FeedKind, FeedsFile, Frequency};

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("missing required environment variable: {0}")]
    MissingEnvVar(String),

    #[error("invalid value for environment variable {var}: {reason}")]
    InvalidEnvVar { var: String, reason: String },

    #[error("failed to read feeds file {path}: {source}")]
    FeedsFileIo {
        path: String,
        #[source]
        source: std::io::Error,
    },

    #[error("failed to parse feeds file: {0}")]
    FeedsFileParse(#[from] serde_yaml::Error),

    #[error("feeds file validation failed: {0}")]
    Validation(String),
}
