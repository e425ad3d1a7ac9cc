//! Circuit Recon Core Library
//!
//! Reconciles circuit-inventory feeds (site list, phase tracker, vendor
//! status extracts) into one record set and rolls it up into per-vendor
//! metrics by segment.

pub mod classifier;
pub mod composer;
pub mod config;
pub mod cost;
pub mod domain;
pub mod feed;
pub mod merger;
pub mod obs;
pub mod pipeline;
pub mod report;
pub mod rollup;
pub mod segment;
pub mod telemetry;

pub use domain::{
    CircuitCosts, CircuitId, CircuitRecord, Diagnostic, DiagnosticKind, Diagnostics,
    IdNormalizer, LifecycleState, Phase, ReconError, ReconResult, VendorMetric,
};

pub use classifier::{classify, Classifier, PatternTable, StatusPattern, StatusSource};
pub use cost::{normalize_column, normalize_cost, parse_amount, NormalizedColumn, RawCost};

pub use feed::{
    DirectoryFeedSource, FeedKind, FeedSnapshot, FeedSource, MemoryFeedSource, PhaseRow, SiteRow,
    VendorStatusRow, VendorStatusTable,
};

pub use merger::{merge, parse_feed_date, MergeOutput, PreparedFeeds};
pub use segment::{partition, records_by_phase, segment, Partition, SegmentDefinition, SegmentKind};
pub use rollup::{
    count_cutover_complete, rollup, rollup_segment, LifecycleCounts, RollupOptions, SegmentRollup,
};
pub use composer::{compose, compose_with_digest, input_digest, ComposedReport, ComposedRow};

pub use config::{default_segments, FeedConfig, ReconConfig, RosterEntry, VendorFeedConfig};
pub use pipeline::{Reconciler, Reconciliation};

pub use report::{read_report_json, render_diagnostics_md, render_report_md, write_report_json};
