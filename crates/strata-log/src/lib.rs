//! Structured logging for strata.
//!
//! Console output goes through a `tracing-subscriber` fmt layer with uptime
//! timestamps and thread names, so pipeline workers are easy to tell apart.
//! Debug builds can also write a JSON log file for post-mortem analysis.

use std::path::Path;

use strata_config::Config;
use tracing_subscriber::{EnvFilter, fmt, layer::SubscriberExt, util::SubscriberInitExt};

/// Name of the JSON log file written inside the log directory.
pub const LOG_FILE_NAME: &str = "strata.log";

const DEFAULT_FILTER: &str = "info";

/// Initialize the global tracing subscriber.
///
/// The filter comes from `RUST_LOG` when set, otherwise from
/// `config.debug.log_level`, otherwise `info`. When `debug_build` is true and
/// a `log_dir` is given, a JSON file layer is added as well. File setup
/// failures fall back to console-only logging.
///
/// ```no_run
/// use strata_config::Config;
/// use strata_log::init_logging;
///
/// let config = Config::default();
/// init_logging(Some(std::path::Path::new("./logs")), true, Some(&config));
/// ```
pub fn init_logging(log_dir: Option<&Path>, debug_build: bool, config: Option<&Config>) {
    let filter_str = filter_directive(config);
    let env_filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(filter_str));

    let console_layer = fmt::layer()
        .with_target(true)
        .with_thread_ids(false)
        .with_thread_names(true)
        .with_level(true)
        .with_timer(fmt::time::uptime());

    let subscriber = tracing_subscriber::registry()
        .with(env_filter)
        .with(console_layer);

    if debug_build
        && let Some(log_dir) = log_dir
        && std::fs::create_dir_all(log_dir).is_ok()
        && let Ok(log_file) = std::fs::File::create(log_dir.join(LOG_FILE_NAME))
    {
        let file_layer = fmt::layer()
            .with_writer(log_file)
            .with_ansi(false)
            .with_target(true)
            .with_thread_names(true)
            .with_timer(fmt::time::uptime())
            .json();

        subscriber.with(file_layer).init();
        return;
    }

    subscriber.init();
}

/// Filter directive taken from the config, or the default when unset.
pub fn filter_directive(config: Option<&Config>) -> &str {
    match config {
        Some(config) if !config.debug.log_level.trim().is_empty() => &config.debug.log_level,
        _ => DEFAULT_FILTER,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_filter_from_config() {
        let mut config = Config::default();
        config.debug.log_level = "warn,strata_world=trace".to_string();
        assert_eq!(filter_directive(Some(&config)), "warn,strata_world=trace");
    }

    #[test]
    fn test_empty_config_level_falls_back() {
        let mut config = Config::default();
        config.debug.log_level = "  ".to_string();
        assert_eq!(filter_directive(Some(&config)), "info");
        assert_eq!(filter_directive(None), "info");
    }

    #[test]
    fn test_subsystem_directives_parse() {
        for directive in [
            "info",
            "debug,strata_world=trace",
            "warn,strata_mesh=debug,strata_voxel=trace",
            "error",
        ] {
            assert!(
                EnvFilter::try_new(directive).is_ok(),
                "failed to parse {directive}"
            );
        }
    }

    #[test]
    fn test_log_dir_is_creatable() {
        let dir = tempfile::tempdir().unwrap();
        let nested = dir.path().join("logs");
        std::fs::create_dir_all(&nested).unwrap();
        let path = nested.join(LOG_FILE_NAME);
        std::fs::File::create(&path).unwrap();
        assert_eq!(path.file_name().unwrap(), "strata.log");
    }
}
