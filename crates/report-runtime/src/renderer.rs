//! Rendering boundary: a [`ReportLayout`] in, a document out.

use std::fmt::Write as _;

use report_core::formatting::format_currency;
use report_core::models::{ItemDefinition, ItemKind};
use report_core::Result;

use crate::layout::ReportLayout;

/// Turns a laid-out report into an opaque document.
pub trait Renderer {
    /// File extension of the produced document, without the dot.
    fn extension(&self) -> &str;

    fn render(&self, layout: &ReportLayout) -> Result<String>;
}

/// Pick a renderer by format name (`json` or `text`).
pub fn renderer_for(format: &str) -> Option<Box<dyn Renderer>> {
    match format.to_lowercase().as_str() {
        "json" => Some(Box::new(JsonRenderer)),
        "text" | "txt" => Some(Box::new(TextRenderer)),
        _ => None,
    }
}

// ── JsonRenderer ──────────────────────────────────────────────────────────────

/// Pretty-printed JSON, the input of an external template engine.
#[derive(Debug, Default, Clone, Copy)]
pub struct JsonRenderer;

impl Renderer for JsonRenderer {
    fn extension(&self) -> &str {
        "json"
    }

    fn render(&self, layout: &ReportLayout) -> Result<String> {
        Ok(serde_json::to_string_pretty(layout)?)
    }
}

// ── TextRenderer ──────────────────────────────────────────────────────────────

/// Plain-text summary: values as `name: value`, charts as per-series totals.
#[derive(Debug, Default, Clone, Copy)]
pub struct TextRenderer;

impl TextRenderer {
    fn write_item(out: &mut String, item: &ItemDefinition, indent: &str) {
        match &item.kind {
            ItemKind::Value(literal) => {
                let _ = writeln!(out, "{indent}{}: {literal}", item.name);
            }
            ItemKind::Bar(data) | ItemKind::Line(data) | ItemKind::Stack(data) => {
                let _ = writeln!(
                    out,
                    "{indent}{} ({}, {} → {})",
                    item.name,
                    item.chart_type(),
                    data.x.first().map(String::as_str).unwrap_or("-"),
                    data.x.last().map(String::as_str).unwrap_or("-"),
                );
                for series in &data.series {
                    let total: f64 = series.values.iter().sum();
                    let _ = writeln!(out, "{indent}  {}: {}", series.name, format_currency(total));
                }
            }
            ItemKind::Pie(data) => {
                let _ = writeln!(out, "{indent}{} ({})", item.name, item.chart_type());
                let values = data.series.first().map(|s| s.values.as_slice()).unwrap_or(&[]);
                for (label, value) in data.x.iter().zip(values) {
                    let _ = writeln!(out, "{indent}  {}: {}", label, format_currency(*value));
                }
            }
        }
    }
}

impl Renderer for TextRenderer {
    fn extension(&self) -> &str {
        "txt"
    }

    fn render(&self, layout: &ReportLayout) -> Result<String> {
        let mut out = String::new();
        for (name, value) in layout.extras() {
            let _ = writeln!(out, "{name}: {value}");
        }
        for item in layout.top_level() {
            Self::write_item(&mut out, item, "");
        }
        for (group, members) in layout.groups() {
            let _ = writeln!(out, "\n[{}]", group);
            if members.is_empty() {
                let _ = writeln!(out, "  (none)");
            }
            for item in members {
                Self::write_item(&mut out, item, "  ");
            }
        }
        Ok(out)
    }
}

// ── Tests ─────────────────────────────────────────────────────────────────────
