//! Structured observability hooks for reconciliation runs.
//!
//! This module provides:
//! - Run-scoped tracing spans via `RunSpan` RAII guard
//! - Emission functions for pipeline milestones: feed load, merge, segment rollup, report compose
//! - Warn-level emission for recoverable diagnostics
//!
//! Events are emitted at `info!` level; filter with `RUST_LOG`.

use tracing::{info, warn};

use crate::domain::Diagnostic;
use crate::feed::FeedKind;

/// RAII guard that enters a run-scoped tracing span for the duration of a run.
///
/// # Example
///
/// ```ignore
/// let _span = RunSpan::enter("2025-03");
/// // tracing calls below carry period = "2025-03"
/// ```
pub struct RunSpan {
    _span: tracing::span::EnteredSpan,
}

impl RunSpan {
    /// Create and enter a span tagged with the reporting period.
    pub fn enter(period: &str) -> Self {
        let span = tracing::info_span!("recon.run", period = %period);
        Self {
            _span: span.entered(),
        }
    }
}

/// Emit event: a feed was fetched.
pub fn emit_feed_loaded(feed: &FeedKind, rows: usize) {
    info!(event = "feed.loaded", feed = %feed, rows = rows);
}

/// Emit event: feeds merged into records.
pub fn emit_merge_completed(scope: &str, records: usize, diagnostics: usize) {
    info!(
        event = "merge.completed",
        scope = %scope,
        records = records,
        diagnostics = diagnostics,
    );
}

/// Emit event: one segment rolled up per vendor.
pub fn emit_segment_rolled_up(segment: &str, vendors: usize, assigned: u64, deployed: u64) {
    info!(
        event = "segment.rolled_up",
        segment = %segment,
        vendors = vendors,
        assigned = assigned,
        deployed = deployed,
    );
}

/// Emit event: final report composed.
pub fn emit_report_composed(segments: usize, vendors: usize, digest: &str) {
    info!(
        event = "report.composed",
        segments = segments,
        vendors = vendors,
        input_digest = %digest,
    );
}

/// Emit a recoverable condition (warning level).
pub fn emit_diagnostic(diagnostic: &Diagnostic) {
    warn!(
        event = "recon.diagnostic",
        kind = diagnostic.kind.as_str(),
        feed = %diagnostic.feed,
        circuit_id = diagnostic.circuit_id.as_deref().unwrap_or(""),
        detail = %diagnostic.detail,
    );
}
