use report_core::settings::AppConfig;
use tracing_subscriber::{fmt, prelude::*, EnvFilter};

// ── Directory bootstrap ────────────────────────────────────────────────────────

/// Ensure the directories a run writes to exist.
///
/// Creates the local report directory, if a local destination is configured,
/// and the cache directory when caching is enabled.
pub fn ensure_directories(config: &AppConfig) -> anyhow::Result<()> {
    if let Some(local) = &config.destinations.local {
        std::fs::create_dir_all(&local.directory)?;
    }
    if config.use_cache {
        std::fs::create_dir_all(config.cache_dir())?;
    }
    Ok(())
}

// ── Logging bootstrap ──────────────────────────────────────────────────────────

/// Map a `LOGGING_LEVEL` style name to a tracing filter directive.
///
/// Level names are matched case-insensitively. Target directives such as
/// `report_data=debug` pass through; anything else is `None`.
fn filter_directive(log_level: &str) -> Option<String> {
    let directive = match log_level.trim().to_uppercase().as_str() {
        "TRACE" => "trace",
        "DEBUG" => "debug",
        "INFO" => "info",
        "WARNING" | "WARN" => "warn",
        "ERROR" | "CRITICAL" => "error",
        _ if log_level.contains('=') => return Some(log_level.trim().to_string()),
        _ => return None,
    };
    Some(directive.to_string())
}

/// Build the filter for `log_level`, falling back to `info`.
fn env_filter(log_level: &str) -> EnvFilter {
    filter_directive(log_level)
        .and_then(|directive| EnvFilter::try_new(directive).ok())
        .unwrap_or_else(|| EnvFilter::new("info"))
}

/// Initialise the global `tracing` subscriber.
///
/// Falls back to `"info"` if the level string is not recognised.
pub fn setup_logging(log_level: &str) -> anyhow::Result<()> {
    let filter = env_filter(log_level);

    let subscriber = fmt::layer().with_target(false).with_thread_ids(false);

    tracing_subscriber::registry()
        .with(filter)
        .with(subscriber)
        .try_init()?;

    Ok(())
}

// ── Tests ──────────────────────────────────────────────────────────────────────

#[cfg(test)]
mod tests {
    use super::*;
    use report_core::settings::{DestinationsConfig, LocalDestinationConfig};
    use tempfile::TempDir;
    use tracing_subscriber::filter::LevelFilter;

    #[test]
    fn test_filter_directive_maps_level_names() {
        assert_eq!(filter_directive("DEBUG").as_deref(), Some("debug"));
        assert_eq!(filter_directive("info").as_deref(), Some("info"));
        assert_eq!(filter_directive("WARNING").as_deref(), Some("warn"));
        assert_eq!(filter_directive("CRITICAL").as_deref(), Some("error"));
    }

    #[test]
    fn test_filter_directive_passes_target_directives_through() {
        assert_eq!(
            filter_directive("report_data=trace").as_deref(),
            Some("report_data=trace")
        );
    }

    #[test]
    fn test_unknown_level_falls_back_to_info() {
        assert_eq!(filter_directive("verbose"), None);
        assert_eq!(filter_directive(""), None);
        assert_eq!(env_filter("verbose").max_level_hint(), Some(LevelFilter::INFO));
        assert_eq!(env_filter("").max_level_hint(), Some(LevelFilter::INFO));
        assert_eq!(env_filter("ERROR").max_level_hint(), Some(LevelFilter::ERROR));
    }

    #[test]
    fn test_ensure_directories_creates_output_and_cache() {
        let tmp = TempDir::new().expect("tempdir");
        let mut config = AppConfig::default();
        config.destinations = DestinationsConfig {
            local: Some(LocalDestinationConfig {
                directory: tmp.path().join("reports"),
            }),
            s3: None,
        };
        config.use_cache = true;
        config.cache_dir = Some(tmp.path().join("cache"));

        ensure_directories(&config).expect("ensure_directories should succeed");

        assert!(tmp.path().join("reports").is_dir());
        assert!(tmp.path().join("cache").is_dir());
    }

    #[test]
    fn test_ensure_directories_skips_disabled_cache() {
        let tmp = TempDir::new().expect("tempdir");
        let mut config = AppConfig::default();
        config.destinations.local = Some(LocalDestinationConfig {
            directory: tmp.path().join("reports"),
        });
        config.cache_dir = Some(tmp.path().join("cache"));

        ensure_directories(&config).unwrap();

        assert!(!tmp.path().join("cache").exists());
    }
}
