use thiserror::Error;

/// All errors produced by the cost report pipeline.
#[derive(Error, Debug)]
pub enum ReportError {
    /// The upstream cost source could not be reached or returned a payload
    /// missing expected fields.
    #[error("Data unavailable for {section} ({window}): {reason}")]
    DataUnavailable {
        section: String,
        window: String,
        reason: String,
    },

    /// A data item was added under a name that is already taken.
    #[error("Duplicate data item: {0}")]
    DuplicateItem(String),

    /// A data item was requested that was never added.
    #[error("Data item not found: {0}")]
    ItemNotFound(String),

    /// A single analyzer could not derive its statistic.
    #[error("Analysis of {metric} failed: {reason}")]
    AnalysisError { metric: String, reason: String },

    /// A table violates the rectangular shape contract.
    #[error("Malformed table {table}: {reason}")]
    MalformedTable { table: String, reason: String },

    /// A chart-type tag that does not name a known chart type, or a chart type
    /// that cannot be used in the requested position.
    #[error("Unsupported chart type: {0}")]
    UnsupportedChartType(String),

    /// A configuration value is missing or invalid.
    #[error("Configuration error: {0}")]
    Config(String),

    /// A rendered document could not be delivered.
    #[error("Delivery to {destination} failed: {reason}")]
    Delivery { destination: String, reason: String },

    /// A rendered document reached some destinations but not all of them.
    #[error("Report delivered to {delivered} but not to {destination}: {reason}")]
    PartialDelivery {
        delivered: String,
        destination: String,
        reason: String,
    },

    /// A JSON document could not be parsed.
    #[error("Failed to parse JSON: {0}")]
    JsonParse(#[from] serde_json::Error),

    /// Pass-through for any raw I/O error that does not carry a path.
    #[error(transparent)]
    Io(#[from] std::io::Error),
}

impl ReportError {
    /// Shorthand for a [`ReportError::MalformedTable`].
    pub fn malformed(table: impl Into<String>, reason: impl Into<String>) -> Self {
        ReportError::MalformedTable {
            table: table.into(),
            reason: reason.into(),
        }
    }

    /// Shorthand for a [`ReportError::AnalysisError`].
    pub fn analysis(metric: impl Into<String>, reason: impl Into<String>) -> Self {
        ReportError::AnalysisError {
            metric: metric.into(),
            reason: reason.into(),
        }
    }
}

/// Convenience alias used throughout the report crates.
pub type Result<T> = std::result::Result<T, ReportError>;
