//! Data layer of the cost report.
//!
//! Fetches cost time-series through a [`collector::Collector`], normalizes
//! them into tables, fills the per-run data container and derives the summary
//! statistics.

pub mod analyzer;
pub mod cache;
pub mod collector;
pub mod provider;
pub mod source;

pub use report_core as core;
