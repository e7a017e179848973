//! Upstream cost API boundary.
//!
//! [`CostSource`] is the seam behind which the metering API client lives. The
//! payload types mirror the upstream JSON (`ResultsByTime`, `TimePeriod`,
//! `Groups[].Metrics.UnblendedCost.Amount`, ...). [`JsonDirSource`] serves
//! responses previously exported from the upstream CLI.

use std::collections::BTreeMap;
use std::fmt;
use std::path::{Path, PathBuf};

use report_core::time_utils::DateWindow;
use report_core::{ReportError, Result};
use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::cache::escape_key;

/// Metric every cost request asks for.
pub const COST_METRIC: &str = "UnblendedCost";

// ── Requests ──────────────────────────────────────────────────────────────────

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum Granularity {
    Daily,
    Monthly,
}

impl fmt::Display for Granularity {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Daily => f.write_str("DAILY"),
            Self::Monthly => f.write_str("MONTHLY"),
        }
    }
}

/// Grouping of a cost request.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum GroupBy {
    /// A built-in dimension such as `LINKED_ACCOUNT` or `SERVICE`.
    Dimension(String),
    /// A user-defined cost allocation tag.
    Tag(String),
}

impl fmt::Display for GroupBy {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Dimension(d) => write!(f, "dimension:{}", d),
            Self::Tag(t) => write!(f, "tag:{}", t),
        }
    }
}

/// One cost-and-usage request.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CostRequest {
    /// Report section the request feeds, e.g. `Daily Cost`.
    pub name: String,
    pub window: DateWindow,
    pub granularity: Granularity,
    pub group_by: GroupBy,
    /// Record types excluded upstream.
    pub excluded_record_types: Vec<String>,
}

impl CostRequest {
    /// Cache key identifying this request.
    ///
    /// Covers everything the upstream answer depends on: grouping (with the
    /// exact tag or dimension), granularity, window and the sorted record type
    /// exclusions.
    pub fn fingerprint(&self) -> String {
        let mut excluded = self.excluded_record_types.clone();
        excluded.sort();
        excluded.dedup();
        format!(
            "{}|{}|{}|{}|{}",
            self.group_by,
            self.granularity,
            self.window.start,
            self.window.end,
            excluded.join(",")
        )
    }

    /// Stem of the exported response file answering this request.
    pub fn file_stem(&self) -> String {
        match &self.group_by {
            GroupBy::Tag(tag) => format!("{}_resources_cost", escape_key(tag)),
            GroupBy::Dimension(_) => file_stem(&self.name),
        }
    }
}

/// `Daily Cost` → `daily_cost`.
fn file_stem(request_name: &str) -> String {
    escape_key(&request_name.to_lowercase().replace(' ', "_"))
}

// ── Payloads ──────────────────────────────────────────────────────────────────

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "PascalCase")]
pub struct TimePeriod {
    pub start: String,
    pub end: String,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "PascalCase")]
pub struct MetricValue {
    pub amount: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub unit: Option<String>,
}

impl MetricValue {
    /// The amount parsed as a number.
    pub fn parse_amount(&self) -> std::result::Result<f64, String> {
        self.amount
            .trim()
            .parse::<f64>()
            .map_err(|e| format!("invalid amount '{}': {}", self.amount, e))
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "PascalCase")]
pub struct CostGroup {
    pub keys: Vec<String>,
    pub metrics: BTreeMap<String, MetricValue>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "PascalCase")]
pub struct ResultByTime {
    pub time_period: TimePeriod,
    #[serde(default)]
    pub groups: Vec<CostGroup>,
    #[serde(default)]
    pub total: BTreeMap<String, MetricValue>,
    #[serde(default)]
    pub estimated: bool,
}

/// One page of a cost-and-usage response.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "PascalCase")]
pub struct CostAndUsageResponse {
    pub results_by_time: Vec<ResultByTime>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub next_page_token: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "PascalCase")]
pub struct ForecastResponse {
    pub total: MetricValue,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "PascalCase")]
pub struct TagsResponse {
    pub tags: Vec<String>,
}

// ── CostSource ────────────────────────────────────────────────────────────────

/// The metering API as the collector sees it.
///
/// Implementations own transport, authentication, retries and paging; they
/// return every page of a response concatenated.
pub trait CostSource {
    fn cost_and_usage(&self, request: &CostRequest) -> Result<Vec<ResultByTime>>;

    fn cost_forecast(
        &self,
        window: DateWindow,
        excluded_record_types: &[String],
    ) -> Result<ForecastResponse>;

    fn tags(&self, window: DateWindow) -> Result<Vec<String>>;
}

// ── JsonDirSource ─────────────────────────────────────────────────────────────

/// Request name of the forecast file.
pub const FORECAST_REQUEST: &str = "forecast";
/// Request name of the tag-listing file.
pub const TAGS_REQUEST: &str = "available tags";

/// A file may hold one response or the list of pages of a paginated export.
#[derive(Deserialize)]
#[serde(untagged)]
enum CostPages {
    One(CostAndUsageResponse),
    Many(Vec<CostAndUsageResponse>),
}

/// Serves exported responses from a directory, one `<file stem>.json` file
/// per request (`daily_cost.json`, `forecast.json`, `available_tags.json`,
/// `team_resources_cost.json`, ...). Tag names are escaped with
/// [`escape_key`], so `Team` is read from `%54eam_resources_cost.json`.
#[derive(Debug, Clone)]
pub struct JsonDirSource {
    dir: PathBuf,
}

impl JsonDirSource {
    pub fn new(dir: impl Into<PathBuf>) -> Self {
        Self { dir: dir.into() }
    }

    pub fn dir(&self) -> &Path {
        &self.dir
    }

    fn read<T: serde::de::DeserializeOwned>(
        &self,
        request: &str,
        stem: &str,
        window: DateWindow,
    ) -> Result<T> {
        let path = self.dir.join(format!("{}.json", stem));
        let unavailable = |reason: String| ReportError::DataUnavailable {
            section: request.to_string(),
            window: window.to_string(),
            reason,
        };
        debug!(path = %path.display(), "reading exported cost response");
        let content = std::fs::read_to_string(&path)
            .map_err(|e| unavailable(format!("{}: {}", path.display(), e)))?;
        serde_json::from_str(&content)
            .map_err(|e| unavailable(format!("malformed payload in {}: {}", path.display(), e)))
    }
}

impl CostSource for JsonDirSource {
    fn cost_and_usage(&self, request: &CostRequest) -> Result<Vec<ResultByTime>> {
        if !request.excluded_record_types.is_empty() {
            debug!(
                excluded = ?request.excluded_record_types,
                "exported responses are expected to be filtered already"
            );
        }
        let pages = match self.read::<CostPages>(&request.name, &request.file_stem(), request.window)? {
            CostPages::One(page) => vec![page],
            CostPages::Many(pages) => pages,
        };
        Ok(pages
            .into_iter()
            .flat_map(|page| page.results_by_time)
            .collect())
    }

    fn cost_forecast(
        &self,
        window: DateWindow,
        _excluded_record_types: &[String],
    ) -> Result<ForecastResponse> {
        self.read(FORECAST_REQUEST, &file_stem(FORECAST_REQUEST), window)
    }

    fn tags(&self, window: DateWindow) -> Result<Vec<String>> {
        self.read::<TagsResponse>(TAGS_REQUEST, &file_stem(TAGS_REQUEST), window)
            .map(|r| r.tags)
    }
}

// ── Tests ─────────────────────────────────────────────────────────────────────
