//! Derivation stage: statistics computed from collected tables.
//!
//! Each [`Analyzer`] reads named items from the [`DataContainer`] and adds new
//! scalars. [`DataAnalyzer`] runs a fixed, ordered list of them and isolates
//! failures: one failing unit never stops the others.

use report_core::container::DataContainer;
use report_core::formatting::{percentage, round_to};
use report_core::models::{ReportItemName, Scalar, VALUES_COLUMN};
use report_core::{ReportError, Result};
use tracing::{info, warn};

/// One independent derivation over the container.
pub trait Analyzer {
    /// Metric the unit produces, used in logs and errors.
    fn name(&self) -> &str;

    fn run(&self, container: &mut DataContainer) -> Result<()>;
}

// ── ForecastChangeAnalyzer ────────────────────────────────────────────────────

/// Forecast against the last closed month's total.
///
/// The last row of the monthly totals is the month still accruing, so the
/// comparison uses the second-to-last row.
#[derive(Debug, Default)]
pub struct ForecastChangeAnalyzer;

impl Analyzer for ForecastChangeAnalyzer {
    fn name(&self) -> &str {
        ReportItemName::ForecastPercentage.as_str()
    }

    fn run(&self, container: &mut DataContainer) -> Result<()> {
        let forecast = container
            .get_scalar(ReportItemName::Forecast.as_str())?
            .as_number()
            .ok_or_else(|| ReportError::analysis(self.name(), "forecast is not a number"))?;

        let totals = container
            .get_table(ReportItemName::MonthlyTotalCost.as_str())?
            .values(VALUES_COLUMN)
            .ok_or_else(|| ReportError::analysis(self.name(), "monthly totals have no values"))?;
        let last_closed = match totals {
            [.., closed, _current] => *closed,
            _ => {
                return Err(ReportError::analysis(
                    self.name(),
                    format!("need at least two monthly totals, found {}", totals.len()),
                ))
            }
        };
        if forecast == 0.0 && last_closed != 0.0 {
            return Err(ReportError::analysis(self.name(), "forecast is zero"));
        }

        let change = percentage(forecast, last_closed);
        info!(forecast, last_closed, change = %change, "forecast change computed");
        container.add(ReportItemName::ForecastPercentage, Scalar::Text(change), None)
    }
}

// ── DescriptiveStatsAnalyzer ──────────────────────────────────────────────────

/// Min, max, mean and sum of a totals table's `values` column, each rounded
/// to one decimal.
#[derive(Debug)]
pub struct DescriptiveStatsAnalyzer {
    source: ReportItemName,
    min: ReportItemName,
    max: ReportItemName,
    mean: ReportItemName,
    total: ReportItemName,
}

impl DescriptiveStatsAnalyzer {
    pub fn monthly() -> Self {
        Self {
            source: ReportItemName::MonthlyTotalCost,
            min: ReportItemName::MonthlyTotalCostMin,
            max: ReportItemName::MonthlyTotalCostMax,
            mean: ReportItemName::MonthlyTotalCostMean,
            total: ReportItemName::MonthlyTotalCostTotal,
        }
    }

    pub fn daily() -> Self {
        Self {
            source: ReportItemName::DailyTotalCost,
            min: ReportItemName::DailyTotalCostMin,
            max: ReportItemName::DailyTotalCostMax,
            mean: ReportItemName::DailyTotalCostMean,
            total: ReportItemName::DailyTotalCostTotal,
        }
    }
}

impl Analyzer for DescriptiveStatsAnalyzer {
    fn name(&self) -> &str {
        self.source.as_str()
    }

    fn run(&self, container: &mut DataContainer) -> Result<()> {
        let values = container
            .get_table(self.source.as_str())?
            .values(VALUES_COLUMN)
            .ok_or_else(|| ReportError::analysis(self.name(), "no 'values' column"))?;
        if values.is_empty() {
            return Err(ReportError::analysis(self.name(), "no rows"));
        }

        let total: f64 = values.iter().sum();
        let min = values.iter().copied().fold(f64::INFINITY, f64::min);
        let max = values.iter().copied().fold(f64::NEG_INFINITY, f64::max);
        let mean = total / values.len() as f64;

        container.add(self.min, round_to(min, 1), None)?;
        container.add(self.max, round_to(max, 1), None)?;
        container.add(self.mean, round_to(mean, 1), None)?;
        container.add(self.total, round_to(total, 1), None)
    }
}

// ── DataAnalyzer ──────────────────────────────────────────────────────────────

/// Outcome of one analysis pass.
#[derive(Debug, Default)]
pub struct AnalysisReport {
    /// Units that completed.
    pub completed: Vec<String>,
    /// Units that failed, as [`ReportError::AnalysisError`]s.
    pub failures: Vec<ReportError>,
}

impl AnalysisReport {
    pub fn is_degraded(&self) -> bool {
        !self.failures.is_empty()
    }
}

/// Ordered list of analyzer units.
pub struct DataAnalyzer {
    analyzers: Vec<Box<dyn Analyzer>>,
}

impl Default for DataAnalyzer {
    /// Forecast change, then monthly statistics, then daily statistics.
    fn default() -> Self {
        Self::new(vec![
            Box::new(ForecastChangeAnalyzer),
            Box::new(DescriptiveStatsAnalyzer::monthly()),
            Box::new(DescriptiveStatsAnalyzer::daily()),
        ])
    }
}

impl DataAnalyzer {
    /// Units run in the order given.
    pub fn new(analyzers: Vec<Box<dyn Analyzer>>) -> Self {
        Self { analyzers }
    }

    /// Run every unit against `container`.
    ///
    /// A failing unit is logged and recorded; the remaining units still run.
    pub fn analyze(&self, container: &mut DataContainer) -> AnalysisReport {
        let mut report = AnalysisReport::default();
        for analyzer in &self.analyzers {
            info!(analyzer = analyzer.name(), "running analyzer");
            match analyzer.run(container) {
                Ok(()) => report.completed.push(analyzer.name().to_string()),
                Err(e) => {
                    let failure = match e {
                        err @ ReportError::AnalysisError { .. } => err,
                        other => ReportError::analysis(analyzer.name(), other.to_string()),
                    };
                    warn!(metric = analyzer.name(), error = %failure, "analyzer failed");
                    report.failures.push(failure);
                }
            }
        }
        report
    }
}

// ── Tests ─────────────────────────────────────────────────────────────────────
