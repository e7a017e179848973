//! Core types of the cost report pipeline.
//!
//! Holds the error taxonomy, the table/scalar data model, the append-only
//! [`container::DataContainer`], formatting and date-window helpers, and the
//! CLI/file configuration.

pub mod container;
pub mod error;
pub mod formatting;
pub mod models;
pub mod settings;
pub mod time_utils;

pub use error::{ReportError, Result};
