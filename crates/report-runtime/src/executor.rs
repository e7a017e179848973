//! Report runs: one-shot and on a cron schedule.
//!
//! Every run builds its own [`DataContainer`](report_core::container::DataContainer)
//! and item list; nothing survives from one run to the next.

use std::future::Future;
use std::time::Duration;

use chrono::DateTime;
use chrono_tz::Tz;
use cron::Schedule;
use report_core::models::ReportItemName;
use report_core::settings::{AppConfig, ReportChartTypes};
use report_core::time_utils::{self, PATH_TIME_FORMAT, TIME_FORMAT};
use report_core::{ReportError, Result};
use report_data::analyzer::DataAnalyzer;
use report_data::collector::Collector;
use report_data::provider::DataProvider;
use tokio::time;
use tracing::{error, info, warn};

use crate::generator::ReportGenerator;
use crate::layout::ReportLayout;
use crate::output::{report_file_name, OutputManager};
use crate::renderer::Renderer;

/// What one successful run produced.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RunSummary {
    pub file_name: String,
    /// Destinations that received the report.
    pub delivered: Vec<String>,
    /// Metrics whose analyzer failed and are missing from the report.
    pub missing_metrics: Vec<String>,
}

/// Wires collection, analysis, generation, rendering and output.
pub struct Executor {
    config: AppConfig,
    charts: ReportChartTypes,
    collector: Box<dyn Collector>,
    renderer: Box<dyn Renderer>,
    output: OutputManager,
    timezone: Tz,
}

impl Executor {
    /// Fails if the configured chart types cannot be parsed.
    pub fn new(
        config: AppConfig,
        collector: Box<dyn Collector>,
        renderer: Box<dyn Renderer>,
        output: OutputManager,
        timezone: Tz,
    ) -> Result<Self> {
        let charts = config.charts.parse()?;
        Ok(Self {
            config,
            charts,
            collector,
            renderer,
            output,
            timezone,
        })
    }

    /// Generate and deliver one report stamped with the current time.
    pub fn run_once(&self) -> Result<RunSummary> {
        self.run_at(time_utils::exec_time(self.timezone))
    }

    /// Generate and deliver one report stamped with `exec_time`.
    ///
    /// Collection and generation failures abort the run before anything is
    /// delivered. Analyzer failures only leave their metrics out.
    pub fn run_at(&self, exec_time: DateTime<Tz>) -> Result<RunSummary> {
        info!(time = %exec_time.format(TIME_FORMAT), "starting report run");

        let current_date = exec_time.format(TIME_FORMAT).to_string();
        let mut container =
            DataProvider::new(self.collector.as_ref(), &self.config, current_date).generate()?;

        let analysis = DataAnalyzer::default().analyze(&mut container);
        let missing_metrics: Vec<String> = analysis
            .failures
            .iter()
            .filter_map(|e| match e {
                ReportError::AnalysisError { metric, .. } => Some(metric.clone()),
                _ => None,
            })
            .collect();
        if analysis.is_degraded() {
            warn!(missing = ?missing_metrics, "report is missing derived values");
        }

        let items =
            ReportGenerator::new(&container, self.charts, &self.config.filtered_services)
                .generate()?;
        let layout = ReportLayout::new(items)
            .with_extra(ReportItemName::ReportTitle, self.config.report_title.clone());
        let document = self.renderer.render(&layout)?;

        let stamp = exec_time.format(PATH_TIME_FORMAT).to_string();
        let file_name = report_file_name(&stamp, self.renderer.extension());
        let delivered = self.output.output(&file_name, &document)?;

        info!(file = %file_name, destinations = delivered.len(), "report run finished");
        Ok(RunSummary {
            file_name,
            delivered,
            missing_metrics,
        })
    }

    /// Run on `schedule` until Ctrl+C.
    pub async fn run_scheduled(&self, schedule: &Schedule) {
        self.run_scheduled_until(schedule, async {
            if let Err(e) = tokio::signal::ctrl_c().await {
                error!(error = %e, "could not listen for Ctrl+C");
                std::future::pending::<()>().await;
            }
            info!("Ctrl+C received; stopping scheduled runs");
        })
        .await
    }

    /// Run at every upcoming time of `schedule` until `shutdown` completes.
    ///
    /// The first run waits for the first upcoming time. A failed run is logged
    /// and the schedule continues.
    pub async fn run_scheduled_until<F>(&self, schedule: &Schedule, shutdown: F)
    where
        F: Future<Output = ()>,
    {
        tokio::pin!(shutdown);

        loop {
            let now = time_utils::exec_time(self.timezone);
            let Some(next) = next_run(schedule, &now) else {
                warn!("schedule has no upcoming run, stopping");
                break;
            };
            let wait = (next - now).to_std().unwrap_or(Duration::ZERO);
            info!(next = %next.format(TIME_FORMAT), "waiting for next report run");

            tokio::select! {
                _ = &mut shutdown => break,
                _ = time::sleep(wait) => self.run_logged(),
            }
        }
    }

    fn run_logged(&self) {
        match self.run_once() {
            Ok(_) => {}
            Err(e @ ReportError::PartialDelivery { .. }) => {
                warn!(error = %e, "report produced but not delivered to every destination");
            }
            Err(e) => error!(error = %e, "report run failed, no report produced"),
        }
    }
}

/// First time of `schedule` strictly after `after`, in `after`'s timezone.
pub fn next_run(schedule: &Schedule, after: &DateTime<Tz>) -> Option<DateTime<Tz>> {
    schedule.after(after).next()
}

// ── Tests ─────────────────────────────────────────────────────────────────────

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;
    use report_core::models::{Table, TableBuilder, VALUES_COLUMN};
    use report_core::settings::{
        parse_schedule, DestinationsConfig, LocalDestinationConfig, S3DestinationConfig,
    };
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::sync::Arc;
    use tempfile::TempDir;

    use crate::renderer::JsonRenderer;

    // ── helpers ───────────────────────────────────────────────────────────────

    fn table(rows: &[(&str, &[(&str, f64)])]) -> Table {
        let mut builder = TableBuilder::new("test");
        for (date, entries) in rows {
            builder
                .push_row(*date, entries.iter().map(|(k, v)| (*k, *v)))
                .unwrap();
        }
        builder.build()
    }

    struct FixedCollector {
        monthly: Table,
        calls: Arc<AtomicUsize>,
        fail: bool,
    }

    impl FixedCollector {
        fn new(monthly: Table) -> Self {
            Self {
                monthly,
                calls: Arc::new(AtomicUsize::new(0)),
                fail: false,
            }
        }
    }

    impl Collector for FixedCollector {
        fn get_monthly_report(&self) -> Result<Table> {
            Ok(self.monthly.clone())
        }

        fn get_daily_report(&self) -> Result<Table> {
            self.calls.fetch_add(1, Ordering::SeqCst);
            if self.fail {
                return Err(ReportError::DataUnavailable {
                    section: "Daily Cost".to_string(),
                    window: "-".to_string(),
                    reason: "offline".to_string(),
                });
            }
            Ok(table(&[
                ("2024-03-13", &[("Production", 10.0)]),
                ("2024-03-14", &[("Production", 20.0)]),
            ]))
        }

        fn get_services_report(&self) -> Result<Table> {
            Ok(table(&[("2024-03-13", &[("Amazon EC2", 10.0)])]))
        }

        fn get_available_tags(&self) -> Result<Vec<String>> {
            Ok(Vec::new())
        }

        fn get_tag_report(&self, _tag_name: &str) -> Result<Table> {
            Ok(table(&[("2024-03-13", &[])]))
        }

        fn get_current_month_forecast(&self) -> Result<Table> {
            Table::without_dates().with_column(VALUES_COLUMN, vec![120.0])
        }
    }

    fn monthly() -> Table {
        table(&[
            ("2024-01-01", &[("Production", 100.0)]),
            ("2024-02-01", &[("Production", 100.0)]),
            ("2024-03-01", &[]),
        ])
    }

    fn executor(collector: FixedCollector, out: &TempDir) -> Executor {
        executor_with(collector, out, None)
    }

    fn executor_with(
        collector: FixedCollector,
        out: &TempDir,
        s3: Option<S3DestinationConfig>,
    ) -> Executor {
        let mut config = AppConfig::default();
        config.destinations = DestinationsConfig {
            local: Some(LocalDestinationConfig {
                directory: out.path().to_path_buf(),
            }),
            s3,
        };
        let output = OutputManager::from_config(&config.destinations);
        Executor::new(
            config,
            Box::new(collector),
            Box::new(JsonRenderer),
            output,
            Tz::UTC,
        )
        .unwrap()
    }

    fn exec_time() -> DateTime<Tz> {
        Tz::UTC.with_ymd_and_hms(2024, 3, 15, 10, 0, 0).unwrap()
    }

    // ── tests ─────────────────────────────────────────────────────────────────

    #[test]
    fn test_run_writes_report() {
        let out = TempDir::new().expect("tempdir");
        let summary = executor(FixedCollector::new(monthly()), &out)
            .run_at(exec_time())
            .unwrap();

        assert_eq!(summary.file_name, "cost_report_2024-03-15_10-00-00.json");
        assert!(summary.missing_metrics.is_empty());

        let doc = std::fs::read_to_string(out.path().join(&summary.file_name)).unwrap();
        let json: serde_json::Value = serde_json::from_str(&doc).unwrap();
        assert_eq!(json["Report Title"], "AWS Costs Report");
        assert_eq!(json["Current Date"]["data"], "2024-03-15 10:00:00");
        assert_eq!(json["Forecast Percentage"]["data"], "16.7%");
        assert_eq!(json["account cost"]["Production"]["data"], "$10");
        assert_eq!(json["tags"], serde_json::json!({}));
    }

    #[test]
    fn test_degraded_run_still_produces_report() {
        let out = TempDir::new().expect("tempdir");
        // A single month: no closed month to compare the forecast with.
        let single = table(&[("2024-03-01", &[("Production", 5.0)])]);

        let summary = executor(FixedCollector::new(single), &out)
            .run_at(exec_time())
            .unwrap();

        assert_eq!(summary.missing_metrics, vec!["Forecast Percentage".to_string()]);
        let doc = std::fs::read_to_string(out.path().join(&summary.file_name)).unwrap();
        let json: serde_json::Value = serde_json::from_str(&doc).unwrap();
        assert!(json.get("Forecast Percentage").is_none());
        assert_eq!(json["Monthly Total Cost Total"]["data"], "5");
    }

    #[test]
    fn test_failed_collection_produces_no_artifact() {
        let out = TempDir::new().expect("tempdir");
        let mut collector = FixedCollector::new(monthly());
        collector.fail = true;

        let err = executor(collector, &out).run_at(exec_time()).unwrap_err();

        assert!(matches!(err, ReportError::DataUnavailable { .. }));
        assert_eq!(std::fs::read_dir(out.path()).unwrap().count(), 0);
    }

    #[test]
    fn test_missing_upload_is_partial_delivery() {
        let out = TempDir::new().expect("tempdir");
        let s3 = S3DestinationConfig {
            bucket_name: "reports".to_string(),
            object_key_prefix: None,
        };

        let err = executor_with(FixedCollector::new(monthly()), &out, Some(s3))
            .run_at(exec_time())
            .unwrap_err();

        match err {
            ReportError::PartialDelivery { destination, .. } => {
                assert_eq!(destination, "s3://reports");
            }
            other => panic!("unexpected error: {other}"),
        }
        assert!(out
            .path()
            .join("cost_report_2024-03-15_10-00-00.json")
            .is_file());
    }

    #[test]
    fn test_next_run_follows_cron_expression() {
        let daily = parse_schedule("0 6 * * *").unwrap();
        assert_eq!(
            next_run(&daily, &exec_time()),
            Some(Tz::UTC.with_ymd_and_hms(2024, 3, 16, 6, 0, 0).unwrap())
        );

        let quarterly = parse_schedule("*/15 * * * *").unwrap();
        let after = Tz::UTC.with_ymd_and_hms(2024, 3, 15, 10, 7, 30).unwrap();
        assert_eq!(
            next_run(&quarterly, &after),
            Some(Tz::UTC.with_ymd_and_hms(2024, 3, 15, 10, 15, 0).unwrap())
        );
    }

    #[test]
    fn test_next_run_is_in_report_timezone() {
        let daily = parse_schedule("0 6 * * *").unwrap();
        let berlin = chrono_tz::Europe::Berlin;
        let after = berlin.with_ymd_and_hms(2024, 3, 15, 5, 0, 0).unwrap();
        assert_eq!(
            next_run(&daily, &after),
            Some(berlin.with_ymd_and_hms(2024, 3, 15, 6, 0, 0).unwrap())
        );
    }

    #[test]
    fn test_next_run_is_strictly_after() {
        let daily = parse_schedule("0 6 * * *").unwrap();
        let at = Tz::UTC.with_ymd_and_hms(2024, 3, 15, 6, 0, 0).unwrap();
        assert_eq!(
            next_run(&daily, &at),
            Some(Tz::UTC.with_ymd_and_hms(2024, 3, 16, 6, 0, 0).unwrap())
        );
    }

    #[tokio::test]
    async fn test_scheduled_runs_repeat_and_survive_failures() {
        let out = TempDir::new().expect("tempdir");
        let mut collector = FixedCollector::new(monthly());
        collector.fail = true;
        let calls = Arc::clone(&collector.calls);
        let executor = executor(collector, &out);
        let every_second = parse_schedule("* * * * * *").unwrap();

        executor
            .run_scheduled_until(
                &every_second,
                tokio::time::sleep(Duration::from_millis(2_500)),
            )
            .await;

        assert!(calls.load(Ordering::SeqCst) >= 2);
    }

    #[tokio::test]
    async fn test_shutdown_before_first_run() {
        let out = TempDir::new().expect("tempdir");
        let collector = FixedCollector::new(monthly());
        let calls = Arc::clone(&collector.calls);
        let executor = executor(collector, &out);
        let yearly = parse_schedule("0 0 1 1 *").unwrap();

        executor
            .run_scheduled_until(&yearly, std::future::ready(()))
            .await;

        assert_eq!(calls.load(Ordering::SeqCst), 0);
    }
}
