mod bootstrap;

use anyhow::{anyhow, Result};
use clap::Parser;
use report_core::settings::{AppConfig, Settings};
use report_core::time_utils::resolve_timezone;
use report_data::cache::FileCache;
use report_data::collector::{CostExplorerCollector, COST_EXPLORER_COLLECTOR};
use report_data::source::JsonDirSource;
use report_runtime::executor::Executor;
use report_runtime::output::OutputManager;
use report_runtime::renderer::renderer_for;

#[tokio::main]
async fn main() -> Result<()> {
    let settings = Settings::parse();

    bootstrap::setup_logging(settings.effective_log_level())?;
    tracing::info!("cost-report v{} starting", env!("CARGO_PKG_VERSION"));

    let config = AppConfig::load_from(&settings.config)?;
    config.validate()?;
    bootstrap::ensure_directories(&config)?;

    let timezone = resolve_timezone(&settings.timezone);
    tracing::info!(
        "Source: {}, Format: {}, Timezone: {}",
        settings.source_dir.display(),
        settings.format,
        timezone
    );

    let cache = FileCache::new(config.use_cache, &config.cache_dir(), COST_EXPLORER_COLLECTOR)?;
    let collector = CostExplorerCollector::new(
        config.clone(),
        timezone,
        JsonDirSource::new(&settings.source_dir),
        cache,
    );
    let renderer = renderer_for(&settings.format)
        .ok_or_else(|| anyhow!("unsupported output format: {}", settings.format))?;
    let output = OutputManager::from_config(&config.destinations);
    let schedule = config.parsed_schedule()?;
    let config_schedule = config.schedule.clone();

    let executor = Executor::new(config, Box::new(collector), renderer, output, timezone)?;

    match schedule {
        Some(schedule) if !settings.once => {
            tracing::info!(
                "Scheduled mode: {}",
                config_schedule.as_deref().unwrap_or_default()
            );
            executor.run_scheduled(&schedule).await;
        }
        _ => {
            let summary = executor.run_once()?;
            tracing::info!(
                "Report {} delivered to {}",
                summary.file_name,
                summary.delivered.join(", ")
            );
        }
    }

    Ok(())
}
