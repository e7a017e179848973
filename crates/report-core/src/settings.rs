use std::collections::BTreeMap;
use std::path::{Path, PathBuf};
use std::str::FromStr;

use clap::Parser;
use cron::Schedule;
use serde::{Deserialize, Serialize};
use tracing::info;

use crate::error::{ReportError, Result};
use crate::models::ChartType;

pub const REPORT_TITLE_DEFAULT: &str = "AWS Costs Report";
pub const MONTHLY_REPORT_MONTHS_BACK_DEFAULT: u32 = 6;
pub const DAILY_REPORT_DAYS_BACK_DEFAULT: u64 = 30;
pub const SERVICES_REPORT_DAYS_BACK_DEFAULT: u64 = 30;
pub const TAGS_REPORT_DAYS_BACK_DEFAULT: u64 = 30;
pub const OUTPUT_DIR_DEFAULT: &str = "generated-reports";

// ── Settings (CLI) ─────────────────────────────────────────────────────────────

/// Generate a cost report from cloud billing data
#[derive(Parser, Debug, Clone)]
#[command(
    name = "cost-report",
    about = "Generate a cost report from cloud billing data",
    version
)]
pub struct Settings {
    /// Configuration file
    #[arg(long, env = "CONFIGURATION_FILE", default_value = "configuration.json")]
    pub config: PathBuf,

    /// Directory holding exported cost API responses
    #[arg(long, env = "COST_SOURCE_DIR", default_value = "cost-data")]
    pub source_dir: PathBuf,

    /// Rendered document format
    #[arg(long, default_value = "json", value_parser = ["json", "text"])]
    pub format: String,

    /// Timezone of the report timestamp (auto-detected if not specified)
    #[arg(long, default_value = "auto")]
    pub timezone: String,

    /// Logging level (DEBUG, INFO, WARNING, ERROR, CRITICAL or a tracing filter)
    #[arg(long, env = "LOGGING_LEVEL", default_value = "INFO")]
    pub log_level: String,

    /// Enable debug logging
    #[arg(long)]
    pub debug: bool,

    /// Generate a single report even when a schedule is configured
    #[arg(long)]
    pub once: bool,
}

impl Settings {
    /// Log level after applying `--debug`.
    pub fn effective_log_level(&self) -> &str {
        if self.debug {
            "DEBUG"
        } else {
            &self.log_level
        }
    }
}

// ── AppConfig (file) ──────────────────────────────────────────────────────────

/// Trailing window lengths per report.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct PeriodsConfig {
    pub monthly_report_months_back: u32,
    pub daily_report_days_back: u64,
    pub services_report_days_back: u64,
    pub tags_report_days_back: u64,
}

impl Default for PeriodsConfig {
    fn default() -> Self {
        Self {
            monthly_report_months_back: MONTHLY_REPORT_MONTHS_BACK_DEFAULT,
            daily_report_days_back: DAILY_REPORT_DAYS_BACK_DEFAULT,
            services_report_days_back: SERVICES_REPORT_DAYS_BACK_DEFAULT,
            tags_report_days_back: TAGS_REPORT_DAYS_BACK_DEFAULT,
        }
    }
}

/// Chart-type tags of the table reports, as written in the configuration.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ChartsConfig {
    pub monthly: String,
    pub daily: String,
    pub services: String,
    pub tags: String,
}

impl Default for ChartsConfig {
    fn default() -> Self {
        Self {
            monthly: ChartType::Stack.as_str().to_string(),
            daily: ChartType::Bar.as_str().to_string(),
            services: ChartType::Line.as_str().to_string(),
            tags: ChartType::Line.as_str().to_string(),
        }
    }
}

/// Parsed chart types of the table reports.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ReportChartTypes {
    pub monthly: ChartType,
    pub daily: ChartType,
    pub services: ChartType,
    pub tags: ChartType,
}

impl Default for ReportChartTypes {
    fn default() -> Self {
        Self {
            monthly: ChartType::Stack,
            daily: ChartType::Bar,
            services: ChartType::Line,
            tags: ChartType::Line,
        }
    }
}

impl ChartsConfig {
    /// Parse every tag; tables can only be drawn as bar, line or stack charts.
    pub fn parse(&self) -> Result<ReportChartTypes> {
        fn table_chart(tag: &str) -> Result<ChartType> {
            match tag.parse::<ChartType>()? {
                t @ (ChartType::Bar | ChartType::Line | ChartType::Stack) => Ok(t),
                other => Err(ReportError::UnsupportedChartType(format!(
                    "'{}' cannot be used for a table report",
                    other
                ))),
            }
        }

        Ok(ReportChartTypes {
            monthly: table_chart(&self.monthly)?,
            daily: table_chart(&self.daily)?,
            services: table_chart(&self.services)?,
            tags: table_chart(&self.tags)?,
        })
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LocalDestinationConfig {
    pub directory: PathBuf,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct S3DestinationConfig {
    #[serde(default)]
    pub bucket_name: String,
    #[serde(default)]
    pub object_key_prefix: Option<String>,
}

/// Where rendered reports are delivered.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DestinationsConfig {
    #[serde(default)]
    pub local: Option<LocalDestinationConfig>,
    #[serde(default)]
    pub s3: Option<S3DestinationConfig>,
}

impl Default for DestinationsConfig {
    fn default() -> Self {
        Self {
            local: Some(LocalDestinationConfig {
                directory: PathBuf::from(OUTPUT_DIR_DEFAULT),
            }),
            s3: None,
        }
    }
}

/// Report configuration loaded from `configuration.json`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct AppConfig {
    pub report_title: String,
    /// Account id → display name.
    pub accounts: BTreeMap<String, String>,
    /// Services left out of the services chart and the top services pie.
    pub filtered_services: Vec<String>,
    /// Cost record types excluded upstream (e.g. `Credit`, `Refund`).
    pub filtered_costs: Vec<String>,
    /// Tags to produce one cost report each for.
    pub resource_tags: Vec<String>,
    pub use_cache: bool,
    pub cache_dir: Option<PathBuf>,
    pub periods: PeriodsConfig,
    pub charts: ChartsConfig,
    pub destinations: DestinationsConfig,
    /// Cron expression of scheduled runs; absent means a single run.
    pub schedule: Option<String>,
}

impl Default for AppConfig {
    fn default() -> Self {
        Self {
            report_title: REPORT_TITLE_DEFAULT.to_string(),
            accounts: BTreeMap::new(),
            filtered_services: Vec::new(),
            filtered_costs: Vec::new(),
            resource_tags: Vec::new(),
            use_cache: false,
            cache_dir: None,
            periods: PeriodsConfig::default(),
            charts: ChartsConfig::default(),
            destinations: DestinationsConfig::default(),
            schedule: None,
        }
    }
}

impl AppConfig {
    /// Load the configuration at `path`.
    ///
    /// A missing file yields the defaults; an unreadable or malformed file is
    /// an error.
    pub fn load_from(path: &Path) -> Result<Self> {
        if !path.exists() {
            info!(
                "configuration file {} was not found, running with defaults",
                path.display()
            );
            return Ok(Self::default());
        }
        let content = std::fs::read_to_string(path)?;
        let config: AppConfig = serde_json::from_str(&content)?;
        info!(path = %path.display(), "configuration loaded");
        Ok(config)
    }

    /// Reject configurations the pipeline cannot run with.
    pub fn validate(&self) -> Result<()> {
        if self.destinations.local.is_none() && self.destinations.s3.is_none() {
            return Err(ReportError::Config(
                "at least one report destination should be configured".to_string(),
            ));
        }
        if let Some(s3) = &self.destinations.s3 {
            if s3.bucket_name.trim().is_empty() {
                return Err(ReportError::Config(
                    "s3 destination is missing the bucket_name property".to_string(),
                ));
            }
        }
        if let Some(local) = &self.destinations.local {
            if local.directory.as_os_str().is_empty() {
                return Err(ReportError::Config(
                    "local destination is missing the directory property".to_string(),
                ));
            }
        }
        if self.periods.monthly_report_months_back == 0
            || self.periods.daily_report_days_back == 0
            || self.periods.services_report_days_back == 0
            || self.periods.tags_report_days_back == 0
        {
            return Err(ReportError::Config(
                "report periods must be at least one month or day".to_string(),
            ));
        }
        self.parsed_schedule()?;
        self.charts.parse()?;
        Ok(())
    }

    /// The configured schedule, if any. A blank expression counts as none.
    pub fn parsed_schedule(&self) -> Result<Option<Schedule>> {
        self.schedule
            .as_deref()
            .map(str::trim)
            .filter(|expr| !expr.is_empty())
            .map(parse_schedule)
            .transpose()
    }

    /// Display name of an upstream key, or the key itself when unmapped.
    pub fn display_name<'a>(&'a self, key: &'a str) -> &'a str {
        self.accounts.get(key).map(String::as_str).unwrap_or(key)
    }

    /// Directory of the raw-payload cache.
    pub fn cache_dir(&self) -> PathBuf {
        self.cache_dir.clone().unwrap_or_else(|| {
            dirs::home_dir()
                .unwrap_or_else(|| PathBuf::from("."))
                .join(".cost-report")
                .join("cache")
        })
    }
}

// ── Schedule ──────────────────────────────────────────────────────────────────

/// Parse a cron expression.
///
/// Classic five-field expressions (`minute hour day month weekday`) fire at
/// second zero; six and seven-field expressions are taken as they are.
///
/// ```
/// use report_core::settings::parse_schedule;
///
/// assert!(parse_schedule("0 6 * * *").is_ok());
/// assert!(parse_schedule("30 0 6 * * Mon-Fri").is_ok());
/// assert!(parse_schedule("every morning").is_err());
/// ```
pub fn parse_schedule(expr: &str) -> Result<Schedule> {
    let expr = expr.trim();
    let normalized = if expr.split_whitespace().count() == 5 {
        format!("0 {}", expr)
    } else {
        expr.to_string()
    };
    Schedule::from_str(&normalized)
        .map_err(|e| ReportError::Config(format!("invalid schedule '{}': {}", expr, e)))
}

// ── Tests ──────────────────────────────────────────────────────────────────────
