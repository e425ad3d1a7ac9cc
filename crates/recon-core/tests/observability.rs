//! Observability tests for reconciliation tracing.
//!
//! These verify that the structured events for pipeline milestones and
//! diagnostics can be emitted under a capturing subscriber.

use recon_core::obs::{
    emit_diagnostic, emit_feed_loaded, emit_merge_completed, emit_report_composed,
    emit_segment_rolled_up, RunSpan,
};
use recon_core::{
    Diagnostic, DiagnosticKind, FeedKind, MemoryFeedSource, PhaseRow, ReconConfig, Reconciler,
    VendorFeedConfig, VendorStatusRow, VendorStatusTable,
};
use tracing_test::traced_test;

/// Test: emit_feed_loaded creates an info-level event
#[traced_test]
#[test]
fn test_emit_feed_loaded_logs_feed_and_rows() {
    emit_feed_loaded(&FeedKind::VendorStatus("Lumen".to_string()), 12);
}

#[traced_test]
#[test]
fn test_emit_merge_and_rollup_events() {
    emit_merge_completed("tracker", 40, 2);
    emit_segment_rolled_up("phase_4", 3, 40, 12);
    emit_report_composed(5, 3, "abc123");
}

/// Test: diagnostics are emitted at warn level
#[traced_test]
#[test]
fn test_emit_diagnostic_logs_warning() {
    let diagnostic = Diagnostic::new(
        DiagnosticKind::SchemaMismatch,
        "vendor_status:Hughes",
        "column status_2 missing; treated as null",
    );
    emit_diagnostic(&diagnostic);
    emit_diagnostic(&diagnostic.with_circuit("1589779"));

    assert!(logs_contain("WARN"));
    assert!(logs_contain("recon.diagnostic"));
    assert!(logs_contain("schema_mismatch"));
    assert!(logs_contain("1589779"));
}

/// Test: a vendor extract missing a status column warns during the run
#[traced_test]
#[test]
fn test_schema_mismatch_during_run_is_logged_as_warning() {
    let source = MemoryFeedSource::new()
        .with_phase_rows(vec![PhaseRow {
            circuit_id: Some("201".to_string()),
            vendor: Some("Hughes".to_string()),
            phase: Some("4".to_string()),
            ..Default::default()
        }])
        .with_vendor_table(
            VendorStatusTable::new(
                "Hughes",
                vec![VendorStatusRow {
                    circuit_id: Some("201".to_string()),
                    status_1: Some("In Progress".to_string()),
                    ..Default::default()
                }],
            )
            .with_missing_column("status_2"),
        );
    let mut config = ReconConfig::default();
    config.feeds.vendors = vec![VendorFeedConfig::new("Hughes", "hughes_site_tracking")];

    let run = Reconciler::new(source, config).unwrap().reconcile().unwrap();
    assert_eq!(run.diagnostics.count(DiagnosticKind::SchemaMismatch), 1);
    assert!(logs_contain("recon.diagnostic"));
    assert!(logs_contain("schema_mismatch"));
    assert!(logs_contain("status_2"));
}

#[traced_test]
#[test]
fn test_run_span_enter_creates_span() {
    let span = RunSpan::enter("2025_06");
    drop(span);
}

/// Test: a full run emits its events inside the run span
#[traced_test]
#[test]
fn test_reconcile_run_emits_events() {
    let source = MemoryFeedSource::new().with_phase_rows(vec![PhaseRow {
        circuit_id: Some("TBD".to_string()),
        vendor: Some("Lumen".to_string()),
        phase: Some("4".to_string()),
        ..Default::default()
    }]);
    let mut config = ReconConfig::default();
    config.feeds.vendors.clear();

    let report = Reconciler::new(source, config)
        .unwrap()
        .final_report()
        .unwrap();
    assert_eq!(report.rows.len(), 1);
}
