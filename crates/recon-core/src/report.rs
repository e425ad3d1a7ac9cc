use anyhow::{Context, Result};
use std::path::Path;

use crate::composer::ComposedReport;
use crate::domain::{Diagnostics, VendorMetric};

/// Write the composed report as pretty JSON.
pub fn write_report_json(path: &Path, report: &ComposedReport) -> Result<()> {
    let content = serde_json::to_string_pretty(report).context("serialize composed report")?;
    std::fs::write(path, content).with_context(|| format!("write {:?}", path))?;
    Ok(())
}

/// Read a report previously written by [`write_report_json`].
pub fn read_report_json(path: &Path) -> Result<ComposedReport> {
    let content = std::fs::read_to_string(path).with_context(|| format!("read {:?}", path))?;
    serde_json::from_str(&content).with_context(|| format!("parse {:?}", path))
}

fn money(value: f64) -> String {
    format!("{value:.2}")
}

fn metric_cells(metric: &VendorMetric) -> String {
    format!(
        " {} | {} | {} | {} |",
        metric.assigned_count,
        metric.deployed_count,
        money(metric.current_yearly_cost),
        money(metric.legacy_yearly_cost)
    )
}

/// Render the composed report as a markdown document: one table per segment
/// and a totals table.
pub fn render_report_md(report: &ComposedReport) -> String {
    let mut out = String::new();
    out.push_str("# Vendor Rollup\n\n");
    out.push_str(&format!(
        "- vendors: {}\n- segments: {}\n- input digest: `{}`\n\n",
        report.rows.len(),
        report.segments.len(),
        report.input_digest
    ));

    for segment in &report.segments {
        out.push_str(&format!("## {}\n\n", segment));
        out.push_str("| vendor | assigned | deployed | yearly | legacy yearly |\n");
        out.push_str("|---|---:|---:|---:|---:|\n");
        for row in &report.rows {
            if let Some(metric) = row.segment(segment) {
                out.push_str(&format!("| {} |{}\n", row.vendor, metric_cells(metric)));
            }
        }
        out.push_str(&format!(
            "| **total** |{}\n\n",
            metric_cells(&report.segment_total(segment))
        ));
    }

    out.push_str("## Totals\n\n");
    out.push_str("| vendor | assigned | deployed | yearly | legacy yearly | one-time | last cutover |\n");
    out.push_str("|---|---:|---:|---:|---:|---:|---|\n");
    for row in &report.rows {
        out.push_str(&format!(
            "| {} |{} {} | {} |\n",
            row.vendor,
            metric_cells(&row.total),
            money(row.total.one_time_cost),
            row.total
                .last_cutover
                .map(|d| d.to_string())
                .unwrap_or_else(|| "-".to_string())
        ));
    }
    out
}

/// Render diagnostics as a markdown list, grouped in arrival order.
pub fn render_diagnostics_md(diagnostics: &Diagnostics) -> String {
    let mut out = String::new();
    out.push_str("## Diagnostics\n\n");
    if diagnostics.is_empty() {
        out.push_str("- none\n");
        return out;
    }
    for d in diagnostics.entries() {
        match &d.circuit_id {
            Some(id) => out.push_str(&format!(
                "- `{}` {} ({}): {}\n",
                d.kind.as_str(),
                d.feed,
                id,
                d.detail
            )),
            None => out.push_str(&format!("- `{}` {}: {}\n", d.kind.as_str(), d.feed, d.detail)),
        }
    }
    out
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::composer::compose;
    use crate::domain::{Diagnostic, DiagnosticKind};
    use crate::rollup::SegmentRollup;
    use std::collections::BTreeMap;

    fn sample() -> ComposedReport {
        let metric = VendorMetric {
            assigned_count: 2,
            deployed_count: 1,
            current_yearly_cost: 3600.0,
            legacy_yearly_cost: 4800.0,
            ..VendorMetric::zero("Lumen")
        };
        let seg = SegmentRollup {
            segment: "plant".to_string(),
            metrics: BTreeMap::from([("Lumen".to_string(), metric)]),
            lifecycle: BTreeMap::new(),
            ambiguous: 0,
            unassigned_records: 0,
        };
        compose(&[seg]).unwrap().with_input_digest("abc123")
    }

    #[test]
    fn test_json_roundtrip_through_file() {
        let tmp = tempfile::tempdir().unwrap();
        let path = tmp.path().join("report.json");
        let report = sample();
        write_report_json(&path, &report).unwrap();
        assert_eq!(read_report_json(&path).unwrap(), report);
    }

    #[test]
    fn test_markdown_contains_segment_and_totals() {
        let md = render_report_md(&sample());
        assert!(md.contains("# Vendor Rollup"));
        assert!(md.contains("## plant"));
        assert!(md.contains("| Lumen | 2 | 1 | 3600.00 | 4800.00 |"));
        assert!(md.contains("| **total** | 2 | 1 | 3600.00 | 4800.00 |"));
        assert!(md.contains("input digest: `abc123`"));
        assert!(md.contains("| Lumen | 2 | 1 | 3600.00 | 4800.00 | 0.00 | - |"));
    }

    #[test]
    fn test_diagnostics_markdown() {
        let mut diags = Diagnostics::new();
        assert!(render_diagnostics_md(&diags).contains("- none"));
        diags.push(
            Diagnostic::new(DiagnosticKind::SchemaMismatch, "vendor_status:Hughes", "column status_2 missing")
                .with_circuit("7"),
        );
        let md = render_diagnostics_md(&diags);
        assert!(md.contains("`schema_mismatch` vendor_status:Hughes (7): column status_2 missing"));
    }
}
