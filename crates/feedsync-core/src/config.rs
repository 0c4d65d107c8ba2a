use std::path::PathBuf;

use crate::app_config::AppConfig;
use crate::ConfigError;

/// Load application configuration from environment variables.
///
/// Calls `dotenvy::dotenv().ok()` to load `.env` files before reading env vars.
///
/// # Errors
///
/// Returns `ConfigError` if a configured value cannot be parsed.
pub fn load_app_config() -> Result<AppConfig, ConfigError> {
    dotenvy::dotenv().ok();
    load_app_config_from_env()
}

/// Load application configuration from environment variables already in the process.
///
/// Unlike [`load_app_config`], this does NOT load `.env` files — useful for testing
/// or when the caller manages env setup.
///
/// # Errors
///
/// Returns `ConfigError` if a configured value cannot be parsed.
pub fn load_app_config_from_env() -> Result<AppConfig, ConfigError> {
    build_app_config(|key| std::env::var(key))
}

/// Build application configuration using the provided env-var lookup function.
///
/// This is the core parsing logic, decoupled from the actual environment so
/// it can be tested with a pure `HashMap` lookup — no `set_var`/`remove_var`
/// needed.
fn build_app_config<F>(lookup: F) -> Result<AppConfig, ConfigError>
where
    F: Fn(&str) -> Result<String, std::env::VarError>,
{
    let or_default = |var: &str, default: &str| -> String {
        lookup(var).unwrap_or_else(|_| default.to_string())
    };

    let parse_u64 = |var: &str, default: &str| -> Result<u64, ConfigError> {
        let raw = or_default(var, default);
        raw.parse::<u64>().map_err(|e| ConfigError::InvalidEnvVar {
            var: var.to_string(),
            reason: e.to_string(),
        })
    };

    let log_level = or_default("FEEDSYNC_LOG_LEVEL", "info");
    let feeds_path = PathBuf::from(or_default("FEEDSYNC_FEEDS_PATH", "./config/feeds.yaml"));
    let default_company = or_default("FEEDSYNC_DEFAULT_COMPANY", "Main Company");

    let fetch_timeout_secs = parse_u64("FEEDSYNC_FETCH_TIMEOUT_SECS", "60")?;
    let probe_timeout_secs = parse_u64("FEEDSYNC_PROBE_TIMEOUT_SECS", "30")?;
    let user_agent = or_default("FEEDSYNC_USER_AGENT", "feedsync/0.1 (feed-reconciliation)");

    Ok(AppConfig {
        log_level,
        feeds_path,
        default_company,
        fetch_timeout_secs,
        probe_timeout_secs,
        user_agent,
    })
}

#[cfg(test)]
mod tests {
    use std::collections::HashMap;
    use std::env::VarError;

    use super::*;

    fn lookup_from_map<'a>(
        map: &'a HashMap<&'a str, &'a str>,
    ) -> impl Fn(&str) -> Result<String, VarError> + 'a {
        move |key| {
            map.get(key)
                .map(|v| (*v).to_string())
                .ok_or(VarError::NotPresent)
        }
    }

    #[test]
    fn build_app_config_uses_defaults_with_empty_env() {
        let map: HashMap<&str, &str> = HashMap::new();
        let cfg = build_app_config(lookup_from_map(&map)).unwrap();
        assert_eq!(cfg.log_level, "info");
        assert_eq!(cfg.feeds_path, PathBuf::from("./config/feeds.yaml"));
        assert_eq!(cfg.default_company, "Main Company");
        assert_eq!(cfg.fetch_timeout_secs, 60);
        assert_eq!(cfg.probe_timeout_secs, 30);
        assert_eq!(cfg.user_agent, "feedsync/0.1 (feed-reconciliation)");
    }

    #[test]
    fn build_app_config_honours_overrides() {
        let mut map = HashMap::new();
        map.insert("FEEDSYNC_LOG_LEVEL", "debug");
        map.insert("FEEDSYNC_FEEDS_PATH", "/etc/feedsync/feeds.yaml");
        map.insert("FEEDSYNC_DEFAULT_COMPANY", "Herb s.r.o.");
        map.insert("FEEDSYNC_FETCH_TIMEOUT_SECS", "120");
        let cfg = build_app_config(lookup_from_map(&map)).unwrap();
        assert_eq!(cfg.log_level, "debug");
        assert_eq!(cfg.feeds_path, PathBuf::from("/etc/feedsync/feeds.yaml"));
        assert_eq!(cfg.default_company, "Herb s.r.o.");
        assert_eq!(cfg.fetch_timeout_secs, 120);
    }

    #[test]
    fn build_app_config_rejects_non_numeric_timeout() {
        let mut map = HashMap::new();
        map.insert("FEEDSYNC_FETCH_TIMEOUT_SECS", "soon");
        let result = build_app_config(lookup_from_map(&map));
        assert!(
            matches!(result, Err(ConfigError::InvalidEnvVar { ref var, .. }) if var == "FEEDSYNC_FETCH_TIMEOUT_SECS"),
            "expected InvalidEnvVar(FEEDSYNC_FETCH_TIMEOUT_SECS), got: {result:?}"
        );
    }
}
