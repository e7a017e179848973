//! Collection stage: fills a fresh [`DataContainer`] for one report run.

use std::collections::HashSet;

use report_core::container::DataContainer;
use report_core::models::{
    tag_report_name, ItemGroup, ReportItemName, Scalar, Table, VALUES_COLUMN,
};
use report_core::settings::AppConfig;
use report_core::{ReportError, Result};
use tracing::{debug, info, warn};

use crate::collector::Collector;

/// Runs the fixed collection sequence against a [`Collector`].
///
/// Sequence: current date, forecast, daily report (+ row totals), monthly
/// report (+ row totals), services report, tag availability probe, one report
/// per configured resource tag. Any collection failure aborts the run.
pub struct DataProvider<'a> {
    collector: &'a dyn Collector,
    config: &'a AppConfig,
    current_date: String,
}

impl<'a> DataProvider<'a> {
    /// `current_date` is the already formatted execution timestamp.
    pub fn new(
        collector: &'a dyn Collector,
        config: &'a AppConfig,
        current_date: impl Into<String>,
    ) -> Self {
        Self {
            collector,
            config,
            current_date: current_date.into(),
        }
    }

    /// Collect every report section into a new container.
    pub fn generate(&self) -> Result<DataContainer> {
        let mut container = DataContainer::new();

        container.add(
            ReportItemName::CurrentDate,
            Scalar::Text(self.current_date.clone()),
            None,
        )?;
        self.add_forecast(&mut container)?;
        self.add_with_totals(
            &mut container,
            ReportItemName::DailyCost,
            ReportItemName::DailyTotalCost,
            self.collector.get_daily_report()?,
        )?;
        self.add_with_totals(
            &mut container,
            ReportItemName::MonthlyCost,
            ReportItemName::MonthlyTotalCost,
            self.collector.get_monthly_report()?,
        )?;

        info!(section = ReportItemName::ServicesCost.as_str(), "collecting");
        container.add(
            ReportItemName::ServicesCost,
            self.collector.get_services_report()?,
            None,
        )?;

        self.probe_tags();
        self.add_tag_reports(&mut container)?;

        debug!(items = container.len(), "data collection finished");
        Ok(container)
    }

    fn add_forecast(&self, container: &mut DataContainer) -> Result<()> {
        let name = ReportItemName::Forecast.as_str();
        info!(section = name, "collecting");
        let table = self.collector.get_current_month_forecast()?;
        let forecast = match table.values(VALUES_COLUMN) {
            Some([value]) => *value,
            Some(values) => {
                return Err(ReportError::malformed(
                    name,
                    format!("expected one forecast value, found {}", values.len()),
                ))
            }
            None => return Err(ReportError::malformed(name, "missing 'values' column")),
        };
        container.add(name, forecast, None)
    }

    fn add_with_totals(
        &self,
        container: &mut DataContainer,
        name: ReportItemName,
        totals_name: ReportItemName,
        table: Table,
    ) -> Result<()> {
        info!(section = name.as_str(), rows = table.row_count(), "collected");
        let totals = table.row_totals(name.as_str())?;
        container.add(name, table, None)?;
        container.add(totals_name, totals, None)
    }

    /// Informational only: a failing probe is logged and the run goes on.
    fn probe_tags(&self) {
        match self.collector.get_available_tags() {
            Ok(tags) => info!(?tags, "available cost allocation tags"),
            Err(e) => warn!(error = %e, "could not list available tags"),
        }
    }

    fn add_tag_reports(&self, container: &mut DataContainer) -> Result<()> {
        if self.config.resource_tags.is_empty() {
            debug!("no resource tags configured");
            return Ok(());
        }
        let mut seen = HashSet::new();
        for tag in &self.config.resource_tags {
            if !seen.insert(tag.as_str()) {
                warn!(tag = %tag, "resource tag configured more than once, skipping repeat");
                continue;
            }
            info!(tag = %tag, "collecting tag report");
            let table = self.collector.get_tag_report(tag)?;
            container.add(tag_report_name(tag), table, Some(ItemGroup::Tags))?;
        }
        Ok(())
    }
}

// ── Tests ─────────────────────────────────────────────────────────────────────
