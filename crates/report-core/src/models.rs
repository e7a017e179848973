use std::collections::HashMap;
use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

use crate::error::{ReportError, Result};

/// Name of the mandatory label column of a time-series table.
pub const DATES_COLUMN: &str = "dates";

/// Name of the single value column of a totals or forecast table.
pub const VALUES_COLUMN: &str = "values";

// ── Report item names ─────────────────────────────────────────────────────────

/// Well-known names of the data items and report items of one run.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ReportItemName {
    ReportTitle,
    CurrentDate,
    LastFinalDate,
    Forecast,
    ForecastPercentage,
    MonthlyCost,
    MonthlyTotalCost,
    MonthlyTotalCostMin,
    MonthlyTotalCostMax,
    MonthlyTotalCostMean,
    MonthlyTotalCostTotal,
    DailyCost,
    DailyTotalCost,
    DailyTotalCostMin,
    DailyTotalCostMax,
    DailyTotalCostMean,
    DailyTotalCostTotal,
    ServicesCost,
    TopServices,
}

impl ReportItemName {
    /// Display name, also used as the data container key.
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::ReportTitle => "Report Title",
            Self::CurrentDate => "Current Date",
            Self::LastFinalDate => "Last Final Date",
            Self::Forecast => "Forecast",
            Self::ForecastPercentage => "Forecast Percentage",
            Self::MonthlyCost => "Monthly Cost",
            Self::MonthlyTotalCost => "Monthly Total Cost",
            Self::MonthlyTotalCostMin => "Monthly Total Cost Min",
            Self::MonthlyTotalCostMax => "Monthly Total Cost Max",
            Self::MonthlyTotalCostMean => "Monthly Total Cost Mean",
            Self::MonthlyTotalCostTotal => "Monthly Total Cost Total",
            Self::DailyCost => "Daily Cost",
            Self::DailyTotalCost => "Daily Total Cost",
            Self::DailyTotalCostMin => "Daily Total Cost Min",
            Self::DailyTotalCostMax => "Daily Total Cost Max",
            Self::DailyTotalCostMean => "Daily Total Cost Mean",
            Self::DailyTotalCostTotal => "Daily Total Cost Total",
            Self::ServicesCost => "Services Cost",
            Self::TopServices => "Top Services",
        }
    }
}

impl fmt::Display for ReportItemName {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl From<ReportItemName> for String {
    fn from(name: ReportItemName) -> Self {
        name.as_str().to_string()
    }
}

/// Item name of the cost report for one resource tag, e.g. `'team' Resources Cost`.
pub fn tag_report_name(tag: &str) -> String {
    format!("'{}' Resources Cost", tag)
}

// ── ItemGroup ─────────────────────────────────────────────────────────────────

/// Layout cluster a data item or report item belongs to.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum ItemGroup {
    #[serde(rename = "charts")]
    Charts,
    #[serde(rename = "tags")]
    Tags,
    #[serde(rename = "account cost")]
    AccountCost,
}

impl ItemGroup {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Charts => "charts",
            Self::Tags => "tags",
            Self::AccountCost => "account cost",
        }
    }
}

impl fmt::Display for ItemGroup {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

// ── Table ─────────────────────────────────────────────────────────────────────

/// One named numeric column of a [`Table`].
#[derive(Debug, Clone, PartialEq)]
pub struct Column {
    pub name: String,
    pub values: Vec<f64>,
}

/// A rectangular time series: an optional `dates` label column plus named
/// value columns that all hold exactly one value per row.
///
/// Columns can only be added through [`Table::push_column`], which rejects any
/// column whose length differs from the row count, so every `Table` in
/// circulation is rectangular.
#[derive(Debug, Clone, PartialEq, Default)]
pub struct Table {
    dates: Option<Vec<String>>,
    columns: Vec<Column>,
}

impl Table {
    /// An empty time-series table over `dates`.
    pub fn with_dates(dates: Vec<String>) -> Self {
        Self {
            dates: Some(dates),
            columns: Vec::new(),
        }
    }

    /// A table without a label column (e.g. a forecast).
    pub fn without_dates() -> Self {
        Self::default()
    }

    /// Append a value column.
    ///
    /// Fails with [`ReportError::MalformedTable`] when the name is `dates`,
    /// already taken, or the length does not match the row count.
    pub fn push_column(&mut self, name: impl Into<String>, values: Vec<f64>) -> Result<()> {
        let name = name.into();
        if name == DATES_COLUMN {
            return Err(ReportError::malformed(
                &name,
                "'dates' is reserved for the label column",
            ));
        }
        if self.column(&name).is_some() {
            return Err(ReportError::malformed(
                &name,
                format!("column '{}' already exists", name),
            ));
        }
        let expected = match (&self.dates, self.columns.first()) {
            (Some(dates), _) => Some(dates.len()),
            (None, Some(first)) => Some(first.values.len()),
            (None, None) => None,
        };
        if let Some(expected) = expected {
            if values.len() != expected {
                return Err(ReportError::malformed(
                    &name,
                    format!(
                        "column '{}' has {} values for {} rows",
                        name,
                        values.len(),
                        expected
                    ),
                ));
            }
        }
        self.columns.push(Column { name, values });
        Ok(())
    }

    /// Builder-style [`Table::push_column`].
    pub fn with_column(mut self, name: impl Into<String>, values: Vec<f64>) -> Result<Self> {
        self.push_column(name, values)?;
        Ok(self)
    }

    /// The label column, if this table has one.
    pub fn dates(&self) -> Option<&[String]> {
        self.dates.as_deref()
    }

    /// The label column, or [`ReportError::MalformedTable`] naming `table`.
    pub fn require_dates(&self, table: &str) -> Result<&[String]> {
        self.dates()
            .ok_or_else(|| ReportError::malformed(table, "missing mandatory 'dates' column"))
    }

    /// Value columns in insertion order.
    pub fn columns(&self) -> &[Column] {
        &self.columns
    }

    pub fn column(&self, name: &str) -> Option<&Column> {
        self.columns.iter().find(|c| c.name == name)
    }

    /// Values of the named column.
    pub fn values(&self, name: &str) -> Option<&[f64]> {
        self.column(name).map(|c| c.values.as_slice())
    }

    pub fn column_names(&self) -> impl Iterator<Item = &str> {
        self.columns.iter().map(|c| c.name.as_str())
    }

    /// Number of rows.
    pub fn row_count(&self) -> usize {
        match (&self.dates, self.columns.first()) {
            (Some(dates), _) => dates.len(),
            (None, Some(first)) => first.values.len(),
            (None, None) => 0,
        }
    }

    pub fn is_empty(&self) -> bool {
        self.row_count() == 0
    }

    /// Row-wise sum of every value column, as a `{dates, values}` table.
    ///
    /// A table without value columns yields a zero for every row.
    pub fn row_totals(&self, table: &str) -> Result<Table> {
        let dates = self.require_dates(table)?;
        let mut totals = vec![0.0; dates.len()];
        for column in &self.columns {
            for (total, value) in totals.iter_mut().zip(&column.values) {
                *total += value;
            }
        }
        Table::with_dates(dates.to_vec()).with_column(VALUES_COLUMN, totals)
    }
}

// ── TableBuilder ──────────────────────────────────────────────────────────────

/// Row-at-a-time construction of a zero-filled [`Table`].
///
/// A key first seen at row `i` gets a column padded with `i` zeros; a known key
/// absent from a row gets a zero at that row. Column order is first-seen order.
#[derive(Debug)]
pub struct TableBuilder {
    table: String,
    dates: Vec<String>,
    columns: Vec<Column>,
    index: HashMap<String, usize>,
}

impl TableBuilder {
    /// Start building the table called `table` (used in error messages).
    pub fn new(table: impl Into<String>) -> Self {
        Self {
            table: table.into(),
            dates: Vec::new(),
            columns: Vec::new(),
            index: HashMap::new(),
        }
    }

    /// Append one row labelled `date`.
    ///
    /// Amounts for the same key within one row are summed (two account ids may
    /// map to one display name).
    pub fn push_row<I, K>(&mut self, date: impl Into<String>, entries: I) -> Result<()>
    where
        I: IntoIterator<Item = (K, f64)>,
        K: Into<String>,
    {
        let date = date.into();
        if self.dates.contains(&date) {
            return Err(ReportError::malformed(
                &self.table,
                format!("duplicate date label '{}'", date),
            ));
        }
        let row = self.dates.len();
        self.dates.push(date);

        for column in &mut self.columns {
            column.values.push(0.0);
        }

        for (key, amount) in entries {
            let key = key.into();
            if key == DATES_COLUMN {
                return Err(ReportError::malformed(
                    &self.table,
                    "group key 'dates' collides with the label column",
                ));
            }
            let idx = match self.index.get(&key) {
                Some(&idx) => idx,
                None => {
                    self.columns.push(Column {
                        name: key.clone(),
                        values: vec![0.0; row + 1],
                    });
                    self.index.insert(key, self.columns.len() - 1);
                    self.columns.len() - 1
                }
            };
            self.columns[idx].values[row] += amount;
        }
        Ok(())
    }

    pub fn build(self) -> Table {
        Table {
            dates: Some(self.dates),
            columns: self.columns,
        }
    }
}

// ── Scalar / DataValue / DataItem ─────────────────────────────────────────────

/// A single named value: a number or a preformatted string.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(untagged)]
pub enum Scalar {
    Number(f64),
    Text(String),
}

impl Scalar {
    pub fn as_number(&self) -> Option<f64> {
        match self {
            Self::Number(n) => Some(*n),
            Self::Text(_) => None,
        }
    }
}

impl fmt::Display for Scalar {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Number(n) => write!(f, "{}", n),
            Self::Text(s) => f.write_str(s),
        }
    }
}

impl From<f64> for Scalar {
    fn from(n: f64) -> Self {
        Self::Number(n)
    }
}

impl From<String> for Scalar {
    fn from(s: String) -> Self {
        Self::Text(s)
    }
}

impl From<&str> for Scalar {
    fn from(s: &str) -> Self {
        Self::Text(s.to_string())
    }
}

/// The payload of a [`DataItem`].
#[derive(Debug, Clone, PartialEq)]
pub enum DataValue {
    Table(Table),
    Scalar(Scalar),
}

impl DataValue {
    pub fn as_table(&self) -> Option<&Table> {
        match self {
            Self::Table(t) => Some(t),
            Self::Scalar(_) => None,
        }
    }

    pub fn as_scalar(&self) -> Option<&Scalar> {
        match self {
            Self::Scalar(s) => Some(s),
            Self::Table(_) => None,
        }
    }
}

impl From<Table> for DataValue {
    fn from(t: Table) -> Self {
        Self::Table(t)
    }
}

impl From<Scalar> for DataValue {
    fn from(s: Scalar) -> Self {
        Self::Scalar(s)
    }
}

impl From<f64> for DataValue {
    fn from(n: f64) -> Self {
        Self::Scalar(Scalar::Number(n))
    }
}

impl From<String> for DataValue {
    fn from(s: String) -> Self {
        Self::Scalar(Scalar::Text(s))
    }
}

/// One named, immutable fact collected or derived during a run.
#[derive(Debug, Clone, PartialEq)]
pub struct DataItem {
    pub name: String,
    pub value: DataValue,
    pub group: Option<ItemGroup>,
}

// ── Chart types and item definitions ──────────────────────────────────────────

/// Chart-type tag of a render-ready item.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ChartType {
    Bar,
    Line,
    Stack,
    Pie,
    Value,
}

impl ChartType {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Bar => "bar",
            Self::Line => "line",
            Self::Stack => "stack",
            Self::Pie => "pie",
            Self::Value => "value",
        }
    }
}

impl FromStr for ChartType {
    type Err = ReportError;

    fn from_str(s: &str) -> Result<Self> {
        match s.trim().to_lowercase().as_str() {
            "bar" => Ok(Self::Bar),
            "line" => Ok(Self::Line),
            "stack" | "stacked-bar" => Ok(Self::Stack),
            "pie" => Ok(Self::Pie),
            "value" | "scalar-value" => Ok(Self::Value),
            other => Err(ReportError::UnsupportedChartType(other.to_string())),
        }
    }
}

impl fmt::Display for ChartType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// One named numeric series of a chart.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct DataSeries {
    pub name: String,
    pub values: Vec<f64>,
}

/// X-axis labels plus the series plotted against them.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ChartData {
    pub x: Vec<String>,
    pub series: Vec<DataSeries>,
}

/// What a render-ready item shows.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "type", content = "data", rename_all = "lowercase")]
pub enum ItemKind {
    Bar(ChartData),
    Line(ChartData),
    Stack(ChartData),
    Pie(ChartData),
    Value(String),
}

impl ItemKind {
    /// Wrap chart data in the variant for `chart_type`.
    ///
    /// `Value` carries a literal, not chart data, and is rejected.
    pub fn chart(chart_type: ChartType, data: ChartData) -> Result<Self> {
        match chart_type {
            ChartType::Bar => Ok(Self::Bar(data)),
            ChartType::Line => Ok(Self::Line(data)),
            ChartType::Stack => Ok(Self::Stack(data)),
            ChartType::Pie => Ok(Self::Pie(data)),
            ChartType::Value => Err(ReportError::UnsupportedChartType(format!(
                "'{}' items carry a literal, not chart data",
                chart_type
            ))),
        }
    }

    pub fn chart_type(&self) -> ChartType {
        match self {
            Self::Bar(_) => ChartType::Bar,
            Self::Line(_) => ChartType::Line,
            Self::Stack(_) => ChartType::Stack,
            Self::Pie(_) => ChartType::Pie,
            Self::Value(_) => ChartType::Value,
        }
    }
}

/// A render-ready report item.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ItemDefinition {
    pub name: String,
    #[serde(flatten)]
    pub kind: ItemKind,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub group: Option<ItemGroup>,
}

impl ItemDefinition {
    /// An ungrouped scalar-value item.
    pub fn value(name: impl Into<String>, literal: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            kind: ItemKind::Value(literal.into()),
            group: None,
        }
    }

    pub fn with_group(mut self, group: ItemGroup) -> Self {
        self.group = Some(group);
        self
    }

    pub fn chart_type(&self) -> ChartType {
        self.kind.chart_type()
    }

    /// The literal of a scalar-value item.
    pub fn literal(&self) -> Option<&str> {
        match &self.kind {
            ItemKind::Value(s) => Some(s),
            _ => None,
        }
    }

    /// The chart data of any chart item.
    pub fn chart_data(&self) -> Option<&ChartData> {
        match &self.kind {
            ItemKind::Bar(d) | ItemKind::Line(d) | ItemKind::Stack(d) | ItemKind::Pie(d) => {
                Some(d)
            }
            ItemKind::Value(_) => None,
        }
    }
}

// ── Tests ─────────────────────────────────────────────────────────────────────
