//! Report assembly and delivery for the cost report.
//!
//! Turns a populated data container into report items, lays them out,
//! renders them and hands the document to the configured destinations.
//! [`executor::Executor`] runs the whole pipeline once or on a schedule.

pub mod executor;
pub mod generator;
pub mod layout;
pub mod output;
pub mod renderer;

pub use report_core as core;
pub use report_data as data;
