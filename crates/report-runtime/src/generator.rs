//! Report assembly: container items to render-ready [`ItemDefinition`]s.
//!
//! Value items come first (current date, forecast change, statistics,
//! forecast), then the cost charts, the last closed day's cost per account,
//! the services charts and finally one chart per tag report.

use report_core::container::DataContainer;
use report_core::formatting::format_amount;
use report_core::models::{
    ChartData, ChartType, DataSeries, ItemDefinition, ItemGroup, ItemKind, ReportItemName, Table,
    VALUES_COLUMN,
};
use report_core::settings::ReportChartTypes;
use report_core::{ReportError, Result};
use tracing::{debug, info, warn};

/// Categories kept verbatim in the top services pie.
pub const TOP_SERVICES_COUNT: usize = 6;

/// Label of the bucket holding every category outside the top entries.
pub const OTHERS_LABEL: &str = "others";

/// Derived statistics shown as value items, in report order.
const STATISTICS: [ReportItemName; 9] = [
    ReportItemName::ForecastPercentage,
    ReportItemName::MonthlyTotalCostMin,
    ReportItemName::MonthlyTotalCostMax,
    ReportItemName::MonthlyTotalCostMean,
    ReportItemName::MonthlyTotalCostTotal,
    ReportItemName::DailyTotalCostMin,
    ReportItemName::DailyTotalCostMax,
    ReportItemName::DailyTotalCostMean,
    ReportItemName::DailyTotalCostTotal,
];

// ── Table → chart ─────────────────────────────────────────────────────────────

/// Chart item for `table`: the dates on the x-axis, one series per column not
/// listed in `filtered`.
pub fn item_from_table(
    name: &str,
    table: &Table,
    chart_type: ChartType,
    group: Option<ItemGroup>,
    filtered: &[String],
) -> Result<ItemDefinition> {
    let x = table.require_dates(name)?.to_vec();
    let mut series = Vec::with_capacity(table.columns().len());
    for column in table.columns() {
        if filtered.contains(&column.name) {
            continue;
        }
        if column.values.len() != x.len() {
            return Err(ReportError::malformed(
                name,
                format!(
                    "column '{}' has {} values for {} dates",
                    column.name,
                    column.values.len(),
                    x.len()
                ),
            ));
        }
        series.push(DataSeries {
            name: column.name.clone(),
            values: column.values.clone(),
        });
    }

    Ok(ItemDefinition {
        name: name.to_string(),
        kind: ItemKind::chart(chart_type, ChartData { x, series })?,
        group,
    })
}

// ── Top-N bucketing ───────────────────────────────────────────────────────────

/// Keep the `n` largest totals verbatim and fold the rest into `others`.
///
/// Sorting is stable, so equal totals keep their input order. The `others`
/// bucket is always present and always last, even when it is zero; the
/// segment values sum to the input total.
pub fn top_n_with_others(totals: Vec<(String, f64)>, n: usize) -> Vec<(String, f64)> {
    let mut sorted = totals;
    sorted.sort_by(|a, b| b.1.total_cmp(&a.1));

    let rest: f64 = sorted.iter().skip(n).map(|(_, total)| total).sum();
    sorted.truncate(n);
    sorted.push((OTHERS_LABEL.to_string(), rest));
    sorted
}

// ── ReportGenerator ───────────────────────────────────────────────────────────

/// Maps a populated [`DataContainer`] to the ordered report items.
pub struct ReportGenerator<'a> {
    container: &'a DataContainer,
    charts: ReportChartTypes,
    filtered_services: &'a [String],
}

impl<'a> ReportGenerator<'a> {
    pub fn new(
        container: &'a DataContainer,
        charts: ReportChartTypes,
        filtered_services: &'a [String],
    ) -> Self {
        Self {
            container,
            charts,
            filtered_services,
        }
    }

    /// Produce every report item.
    ///
    /// Collected sections are mandatory. A derived statistic that is missing
    /// (its analyzer failed) is skipped with a warning.
    pub fn generate(&self) -> Result<Vec<ItemDefinition>> {
        info!("generating report items");
        let mut items = Vec::new();

        self.push_values(&mut items)?;

        items.push(item_from_table(
            ReportItemName::MonthlyCost.as_str(),
            self.table(ReportItemName::MonthlyCost)?,
            self.charts.monthly,
            Some(ItemGroup::Charts),
            &[],
        )?);

        let daily = self.table(ReportItemName::DailyCost)?;
        items.push(item_from_table(
            ReportItemName::DailyCost.as_str(),
            daily,
            self.charts.daily,
            Some(ItemGroup::Charts),
            &[],
        )?);
        items.extend(last_closed_day_items(daily)?);

        let services = self.table(ReportItemName::ServicesCost)?;
        items.push(item_from_table(
            ReportItemName::ServicesCost.as_str(),
            services,
            self.charts.services,
            Some(ItemGroup::Charts),
            self.filtered_services,
        )?);
        items.push(self.top_services(services));

        for tag_item in self.container.get_by_group(ItemGroup::Tags) {
            let table = tag_item.value.as_table().ok_or_else(|| {
                ReportError::malformed(&tag_item.name, "tag report is not a table")
            })?;
            items.push(item_from_table(
                &tag_item.name,
                table,
                self.charts.tags,
                Some(ItemGroup::Tags),
                &[],
            )?);
        }

        debug!(items = items.len(), "report items generated");
        Ok(items)
    }

    fn table(&self, name: ReportItemName) -> Result<&'a Table> {
        self.container.get_table(name.as_str())
    }

    fn push_values(&self, items: &mut Vec<ItemDefinition>) -> Result<()> {
        let current_date = self
            .container
            .get_scalar(ReportItemName::CurrentDate.as_str())?;
        items.push(ItemDefinition::value(
            ReportItemName::CurrentDate,
            current_date.to_string(),
        ));

        for name in STATISTICS {
            match self.container.get_scalar(name.as_str()) {
                Ok(value) => items.push(ItemDefinition::value(name, value.to_string())),
                Err(ReportError::ItemNotFound(_)) => {
                    warn!(item = name.as_str(), "derived value missing, leaving it out")
                }
                Err(e) => return Err(e),
            }
        }

        let forecast = self
            .container
            .get_scalar(ReportItemName::Forecast.as_str())?
            .as_number()
            .ok_or_else(|| {
                ReportError::malformed(ReportItemName::Forecast.as_str(), "forecast is not a number")
            })?;
        items.push(ItemDefinition::value(
            ReportItemName::Forecast,
            format_amount(forecast),
        ));
        Ok(())
    }

    fn top_services(&self, services: &Table) -> ItemDefinition {
        let totals = services
            .columns()
            .iter()
            .filter(|c| !self.filtered_services.contains(&c.name))
            .map(|c| (c.name.clone(), c.values.iter().sum()))
            .collect();
        let (labels, values): (Vec<String>, Vec<f64>) =
            top_n_with_others(totals, TOP_SERVICES_COUNT).into_iter().unzip();

        ItemDefinition {
            name: ReportItemName::TopServices.to_string(),
            kind: ItemKind::Pie(ChartData {
                x: labels,
                series: vec![DataSeries {
                    name: VALUES_COLUMN.to_string(),
                    values,
                }],
            }),
            group: Some(ItemGroup::Charts),
        }
    }
}

/// The last closed day's date and per-account cost.
///
/// The last row is still accruing, so the second-to-last row is used.
fn last_closed_day_items(daily: &Table) -> Result<Vec<ItemDefinition>> {
    let table = ReportItemName::DailyCost.as_str();
    let dates = daily.require_dates(table)?;
    if dates.len() < 2 {
        return Err(ReportError::malformed(
            table,
            format!("need at least two days to find a closed day, found {}", dates.len()),
        ));
    }
    let row = dates.len() - 2;

    let mut items = vec![ItemDefinition::value(
        ReportItemName::LastFinalDate,
        dates[row].clone(),
    )];
    for column in daily.columns() {
        let cost = column.values.get(row).ok_or_else(|| {
            ReportError::malformed(table, format!("column '{}' is too short", column.name))
        })?;
        items.push(
            ItemDefinition::value(&column.name, format_amount(*cost))
                .with_group(ItemGroup::AccountCost),
        );
    }
    Ok(items)
}

// ── Tests ─────────────────────────────────────────────────────────────────────

#[cfg(test)]
mod tests {
    use super::*;
    use report_core::models::{Scalar, TableBuilder};

    // ── helpers ───────────────────────────────────────────────────────────────

    fn table(name: &str, rows: &[(&str, &[(&str, f64)])]) -> Table {
        let mut builder = TableBuilder::new(name);
        for (date, entries) in rows {
            builder
                .push_row(*date, entries.iter().map(|(k, v)| (*k, *v)))
                .unwrap();
        }
        builder.build()
    }

    fn totals_of(table: &Table) -> Table {
        table.row_totals("totals").unwrap()
    }

    fn populated(daily: Table, services: Table) -> DataContainer {
        let monthly = table(
            "Monthly Cost",
            &[("2024-02-01", &[("A", 100.0)]), ("2024-03-01", &[("A", 20.0)])],
        );
        let mut c = DataContainer::new();
        c.add(ReportItemName::CurrentDate, Scalar::Text("2024-03-15 10:00:00".into()), None)
            .unwrap();
        c.add(ReportItemName::Forecast, 120.0, None).unwrap();
        c.add(ReportItemName::DailyTotalCost, totals_of(&daily), None)
            .unwrap();
        c.add(ReportItemName::DailyCost, daily, None).unwrap();
        c.add(ReportItemName::MonthlyTotalCost, totals_of(&monthly), None)
            .unwrap();
        c.add(ReportItemName::MonthlyCost, monthly, None).unwrap();
        c.add(ReportItemName::ServicesCost, services, None).unwrap();
        c
    }

    fn default_daily() -> Table {
        table(
            "Daily Cost",
            &[("2024-03-13", &[("A", 10.0)]), ("2024-03-14", &[("A", 20.0)])],
        )
    }

    fn default_services() -> Table {
        table(
            "Services Cost",
            &[("2024-03-13", &[("EC2", 5.0), ("Tax", 1.0)]), ("2024-03-14", &[("EC2", 6.0)])],
        )
    }

    fn find<'i>(items: &'i [ItemDefinition], name: &str) -> &'i ItemDefinition {
        items
            .iter()
            .find(|i| i.name == name)
            .unwrap_or_else(|| panic!("no item named {name}"))
    }

    fn totals(pairs: &[(&str, f64)]) -> Vec<(String, f64)> {
        pairs.iter().map(|(n, v)| (n.to_string(), *v)).collect()
    }

    // ── top_n_with_others ─────────────────────────────────────────────────────

    #[test]
    fn test_top_six_and_others() {
        let input = totals(&[
            ("A", 50.0),
            ("B", 40.0),
            ("C", 30.0),
            ("D", 20.0),
            ("E", 10.0),
            ("F", 5.0),
            ("G", 5.0),
            ("H", 1.0),
        ]);

        let top = top_n_with_others(input, TOP_SERVICES_COUNT);

        let labels: Vec<&str> = top.iter().map(|(n, _)| n.as_str()).collect();
        assert_eq!(labels, vec!["A", "B", "C", "D", "E", "F", "others"]);
        assert_eq!(top[6].1, 6.0);
    }

    #[test]
    fn test_top_n_ties_keep_input_order() {
        let input = totals(&[("X", 1.0), ("Y", 3.0), ("Z", 3.0), ("W", 3.0)]);
        let top = top_n_with_others(input, 2);
        let labels: Vec<&str> = top.iter().map(|(n, _)| n.as_str()).collect();
        assert_eq!(labels, vec!["Y", "Z", "others"]);
        assert_eq!(top[2].1, 4.0);
    }

    #[test]
    fn test_top_n_preserves_sum_and_bounds_segments() {
        for len in 0..12 {
            let input: Vec<(String, f64)> = (0..len)
                .map(|i| (format!("s{i}"), ((i * 7) % 5) as f64 + 0.5))
                .collect();
            let expected: f64 = input.iter().map(|(_, v)| v).sum();

            let top = top_n_with_others(input, TOP_SERVICES_COUNT);

            assert!(top.len() <= TOP_SERVICES_COUNT + 1);
            assert_eq!(top.len(), len.min(TOP_SERVICES_COUNT) + 1);
            let sum: f64 = top.iter().map(|(_, v)| v).sum();
            assert!((sum - expected).abs() < 1e-9);
        }
    }

    #[test]
    fn test_others_present_when_zero() {
        let top = top_n_with_others(totals(&[("A", 1.0)]), TOP_SERVICES_COUNT);
        assert_eq!(top, totals(&[("A", 1.0), ("others", 0.0)]));
    }

    // ── item_from_table ───────────────────────────────────────────────────────

    #[test]
    fn test_item_from_table_uses_dates_and_filters_columns() {
        let services = default_services();
        let item = item_from_table(
            "Services Cost",
            &services,
            ChartType::Line,
            Some(ItemGroup::Charts),
            &["Tax".to_string()],
        )
        .unwrap();

        assert_eq!(item.chart_type(), ChartType::Line);
        let data = item.chart_data().unwrap();
        assert_eq!(data.x, vec!["2024-03-13", "2024-03-14"]);
        assert_eq!(data.series.len(), 1);
        assert_eq!(data.series[0].name, "EC2");
    }

    #[test]
    fn test_item_from_table_without_dates_is_malformed() {
        let forecast = Table::without_dates()
            .with_column(VALUES_COLUMN, vec![1.0])
            .unwrap();
        let err = item_from_table("Forecast", &forecast, ChartType::Bar, None, &[]).unwrap_err();
        assert!(matches!(err, ReportError::MalformedTable { .. }));
    }

    #[test]
    fn test_item_from_table_rejects_value_chart_type() {
        let err = item_from_table("Daily Cost", &default_daily(), ChartType::Value, None, &[])
            .unwrap_err();
        assert!(matches!(err, ReportError::UnsupportedChartType(_)));
    }

    // ── ReportGenerator ───────────────────────────────────────────────────────

    #[test]
    fn test_account_cost_uses_second_to_last_day() {
        let c = populated(default_daily(), default_services());

        let items = ReportGenerator::new(&c, ReportChartTypes::default(), &[])
            .generate()
            .unwrap();

        let account = find(&items, "A");
        assert_eq!(account.group, Some(ItemGroup::AccountCost));
        assert_eq!(account.literal(), Some("$10"));
        assert_eq!(find(&items, "Last Final Date").literal(), Some("2024-03-13"));
    }

    #[test]
    fn test_single_day_is_malformed() {
        let daily = table("Daily Cost", &[("2024-03-14", &[("A", 20.0)])]);
        let c = populated(daily, default_services());
        let err = ReportGenerator::new(&c, ReportChartTypes::default(), &[])
            .generate()
            .unwrap_err();
        assert!(matches!(err, ReportError::MalformedTable { .. }));
    }

    #[test]
    fn test_default_chart_types_and_groups() {
        let c = populated(default_daily(), default_services());
        let items = ReportGenerator::new(&c, ReportChartTypes::default(), &[])
            .generate()
            .unwrap();

        assert_eq!(find(&items, "Monthly Cost").chart_type(), ChartType::Stack);
        assert_eq!(find(&items, "Daily Cost").chart_type(), ChartType::Bar);
        assert_eq!(find(&items, "Services Cost").chart_type(), ChartType::Line);
        assert_eq!(find(&items, "Top Services").chart_type(), ChartType::Pie);
        assert_eq!(find(&items, "Forecast").literal(), Some("$120"));
        assert_eq!(find(&items, "Current Date").literal(), Some("2024-03-15 10:00:00"));
        for name in ["Monthly Cost", "Daily Cost", "Services Cost", "Top Services"] {
            assert_eq!(find(&items, name).group, Some(ItemGroup::Charts));
        }
        assert!(items.iter().all(|i| i.group != Some(ItemGroup::Tags)));
    }

    #[test]
    fn test_missing_statistics_are_left_out() {
        let mut c = populated(default_daily(), default_services());
        c.add(ReportItemName::DailyTotalCostMax, 20.0, None).unwrap();

        let items = ReportGenerator::new(&c, ReportChartTypes::default(), &[])
            .generate()
            .unwrap();

        assert_eq!(find(&items, "Daily Total Cost Max").literal(), Some("20"));
        assert!(!items.iter().any(|i| i.name == "Monthly Total Cost Mean"));
        assert!(!items.iter().any(|i| i.name == "Forecast Percentage"));
    }

    #[test]
    fn test_filtered_services_left_out_of_pie() {
        let c = populated(default_daily(), default_services());
        let filtered = vec!["Tax".to_string()];
        let items = ReportGenerator::new(&c, ReportChartTypes::default(), &filtered)
            .generate()
            .unwrap();

        let pie = find(&items, "Top Services").chart_data().unwrap();
        assert_eq!(pie.x, vec!["EC2", "others"]);
        assert_eq!(pie.series[0].values, vec![11.0, 0.0]);
    }

    #[test]
    fn test_tag_reports_become_tag_charts() {
        let mut c = populated(default_daily(), default_services());
        c.add(
            "'team' Resources Cost",
            table("tag", &[("2024-03-14", &[("team$core", 3.0)])]),
            Some(ItemGroup::Tags),
        )
        .unwrap();
        let charts = ReportChartTypes {
            tags: ChartType::Bar,
            ..ReportChartTypes::default()
        };

        let items = ReportGenerator::new(&c, charts, &[]).generate().unwrap();

        let tag = find(&items, "'team' Resources Cost");
        assert_eq!(tag.group, Some(ItemGroup::Tags));
        assert_eq!(tag.chart_type(), ChartType::Bar);
    }

    #[test]
    fn test_missing_collected_section_is_fatal() {
        let mut c = DataContainer::new();
        c.add(ReportItemName::CurrentDate, Scalar::Text("now".into()), None)
            .unwrap();
        c.add(ReportItemName::Forecast, 1.0, None).unwrap();
        let err = ReportGenerator::new(&c, ReportChartTypes::default(), &[])
            .generate()
            .unwrap_err();
        assert!(matches!(err, ReportError::ItemNotFound(_)));
    }
}
