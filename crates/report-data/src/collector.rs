//! Collectors: the source of normalized cost tables.
//!
//! The pipeline depends only on the [`Collector`] trait. The
//! [`CostExplorerCollector`] implementation turns a [`CostSource`] into tables,
//! going through the raw-payload cache first.

use chrono::NaiveDate;
use chrono_tz::Tz;
use report_core::models::{Table, TableBuilder, VALUES_COLUMN};
use report_core::settings::AppConfig;
use report_core::time_utils::{self, DateWindow};
use report_core::{ReportError, Result};
use tracing::{debug, info};

use crate::cache::RawDataCache;
use crate::source::{
    CostRequest, CostSource, ForecastResponse, Granularity, GroupBy, ResultByTime, COST_METRIC,
    FORECAST_REQUEST, TAGS_REQUEST,
};

pub const LINKED_ACCOUNT_DIMENSION: &str = "LINKED_ACCOUNT";
pub const SERVICE_DIMENSION: &str = "SERVICE";

/// Name of the cost explorer collector, also its cache directory.
pub const COST_EXPLORER_COLLECTOR: &str = "cost_explorer";

// ── Collector ─────────────────────────────────────────────────────────────────

/// The six report fetches the pipeline needs.
///
/// Every table returned is rectangular and zero-filled. Any failure to reach
/// the upstream source or to make sense of its payload is a
/// [`ReportError::DataUnavailable`].
pub trait Collector {
    /// Cost per month grouped by account.
    fn get_monthly_report(&self) -> Result<Table>;

    /// Cost per day grouped by account.
    fn get_daily_report(&self) -> Result<Table>;

    /// Cost per day grouped by service.
    fn get_services_report(&self) -> Result<Table>;

    /// Tags that carry cost in the tag report window.
    fn get_available_tags(&self) -> Result<Vec<String>>;

    /// Cost per day grouped by the values of `tag_name`.
    fn get_tag_report(&self, tag_name: &str) -> Result<Table>;

    /// A single-row table whose `values` column holds the current month's
    /// forecast.
    fn get_current_month_forecast(&self) -> Result<Table>;
}

// ── Normalization ─────────────────────────────────────────────────────────────

/// Build a zero-filled table from cost results.
///
/// Dates are the period start labels. Each group's first key becomes a column
/// name, remapped through `display_name`. Amounts are rounded to one decimal.
pub fn table_from_results(
    table: &str,
    results: &[ResultByTime],
    display_name: impl Fn(&str) -> String,
    window: DateWindow,
) -> Result<Table> {
    let unavailable = |reason: String| ReportError::DataUnavailable {
        section: table.to_string(),
        window: window.to_string(),
        reason,
    };

    let mut builder = TableBuilder::new(table);
    for result in results {
        let mut row = Vec::with_capacity(result.groups.len());
        for group in &result.groups {
            let key = group.keys.first().ok_or_else(|| {
                unavailable(format!("group without keys on {}", result.time_period.start))
            })?;
            let metric = group.metrics.get(COST_METRIC).ok_or_else(|| {
                unavailable(format!(
                    "group '{}' on {} has no {} metric",
                    key, result.time_period.start, COST_METRIC
                ))
            })?;
            let amount = metric.parse_amount().map_err(unavailable)?;
            row.push((display_name(key), round1(amount)));
        }
        builder.push_row(result.time_period.start.clone(), row)?;
    }
    Ok(builder.build())
}

fn round1(amount: f64) -> f64 {
    report_core::formatting::round_to(amount, 1)
}

// ── CostExplorerCollector ─────────────────────────────────────────────────────

/// [`Collector`] over a [`CostSource`], with raw-payload caching.
///
/// Report windows end at today's date in `timezone`, looked up on every
/// request unless pinned with [`CostExplorerCollector::at`].
pub struct CostExplorerCollector<S, C> {
    config: AppConfig,
    timezone: Tz,
    today: Option<NaiveDate>,
    source: S,
    cache: C,
}

impl<S: CostSource, C: RawDataCache> CostExplorerCollector<S, C> {
    pub fn new(config: AppConfig, timezone: Tz, source: S, cache: C) -> Self {
        Self {
            config,
            timezone,
            today: None,
            source,
            cache,
        }
    }

    /// Pin the exclusive end of every report window to `today`.
    pub fn at(mut self, today: NaiveDate) -> Self {
        self.today = Some(today);
        self
    }

    fn today(&self) -> NaiveDate {
        self.today
            .unwrap_or_else(|| time_utils::exec_time(self.timezone).date_naive())
    }

    fn days_window(&self, days: u64) -> Result<DateWindow> {
        let today = self.today();
        Ok(DateWindow::new(time_utils::days_back(today, days)?, today))
    }

    fn months_window(&self, months: u32) -> Result<DateWindow> {
        let today = self.today();
        Ok(DateWindow::new(time_utils::months_back(today, months)?, today))
    }

    fn request(
        &self,
        name: &str,
        window: DateWindow,
        granularity: Granularity,
        group_by: GroupBy,
    ) -> CostRequest {
        CostRequest {
            name: name.to_string(),
            window,
            granularity,
            group_by,
            excluded_record_types: self.config.filtered_costs.clone(),
        }
    }

    /// Cached payload for `key` if present and parseable, otherwise `fetch`,
    /// caching what it returns.
    fn cached<T, F>(&self, section: &str, key: &str, window: DateWindow, fetch: F) -> Result<T>
    where
        T: serde::Serialize + serde::de::DeserializeOwned,
        F: FnOnce() -> Result<T>,
    {
        if let Some(raw) = self.cache.get(key) {
            match serde_json::from_str(&raw) {
                Ok(value) => return Ok(value),
                Err(e) => debug!(key, error = %e, "ignoring unparseable cached payload"),
            }
        }

        info!(section, %window, "requesting cost data from upstream");
        let value = fetch()?;
        if self.cache.enabled() {
            self.cache.save(key, &serde_json::to_string(&value)?)?;
        }
        Ok(value)
    }

    fn cost_table(&self, request: CostRequest) -> Result<Table> {
        let results = self.cached(
            &request.name,
            &request.fingerprint(),
            request.window,
            || self.source.cost_and_usage(&request),
        )?;
        // Only account ids are remapped; service and tag values pass through.
        let remap = matches!(
            &request.group_by,
            GroupBy::Dimension(d) if d == LINKED_ACCOUNT_DIMENSION
        );
        table_from_results(
            &request.name,
            &results,
            |key| {
                if remap {
                    self.config.display_name(key).to_string()
                } else {
                    key.to_string()
                }
            },
            request.window,
        )
    }
}

impl<S: CostSource, C: RawDataCache> Collector for CostExplorerCollector<S, C> {
    fn get_monthly_report(&self) -> Result<Table> {
        let window = self.months_window(self.config.periods.monthly_report_months_back)?;
        self.cost_table(self.request(
            "Monthly Cost",
            window,
            Granularity::Monthly,
            GroupBy::Dimension(LINKED_ACCOUNT_DIMENSION.to_string()),
        ))
    }

    fn get_daily_report(&self) -> Result<Table> {
        let window = self.days_window(self.config.periods.daily_report_days_back)?;
        self.cost_table(self.request(
            "Daily Cost",
            window,
            Granularity::Daily,
            GroupBy::Dimension(LINKED_ACCOUNT_DIMENSION.to_string()),
        ))
    }

    fn get_services_report(&self) -> Result<Table> {
        let window = self.days_window(self.config.periods.services_report_days_back)?;
        self.cost_table(self.request(
            "Services Cost",
            window,
            Granularity::Daily,
            GroupBy::Dimension(SERVICE_DIMENSION.to_string()),
        ))
    }

    fn get_available_tags(&self) -> Result<Vec<String>> {
        let window = self.days_window(self.config.periods.tags_report_days_back)?;
        let key = format!("{}|{}|{}", TAGS_REQUEST, window.start, window.end);
        self.cached(TAGS_REQUEST, &key, window, || self.source.tags(window))
    }

    fn get_tag_report(&self, tag_name: &str) -> Result<Table> {
        let window = self.days_window(self.config.periods.tags_report_days_back)?;
        self.cost_table(self.request(
            &report_core::models::tag_report_name(tag_name),
            window,
            Granularity::Daily,
            GroupBy::Tag(tag_name.to_string()),
        ))
    }

    fn get_current_month_forecast(&self) -> Result<Table> {
        let today = self.today();
        let window = DateWindow::new(today, time_utils::first_day_next_month(today)?);
        let mut excluded = self.config.filtered_costs.clone();
        excluded.sort();
        let key = format!(
            "{}|{}|{}|{}",
            FORECAST_REQUEST,
            window.start,
            window.end,
            excluded.join(",")
        );
        let response: ForecastResponse = self.cached(FORECAST_REQUEST, &key, window, || {
            self.source
                .cost_forecast(window, &self.config.filtered_costs)
        })?;
        let amount = response
            .total
            .parse_amount()
            .map_err(|reason| ReportError::DataUnavailable {
                section: FORECAST_REQUEST.to_string(),
                window: window.to_string(),
                reason,
            })?;
        // Forecasts are reported in whole currency units.
        Table::without_dates().with_column(VALUES_COLUMN, vec![amount.trunc()])
    }
}

// ── Tests ─────────────────────────────────────────────────────────────────────
