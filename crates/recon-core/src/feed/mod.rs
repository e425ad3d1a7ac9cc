//! Feed source abstraction.
//!
//! The core never reads files itself. It consumes three kinds of tables
//! through [`FeedSource`]:
//!
//! - the site list (costs and site-level vendor),
//! - the phase tracker (vendor assignment, phase and tracker status),
//! - per-vendor status extracts (vendor-reported lifecycle fields).
//!
//! Cells are handed over as raw text; identifier, cost and date parsing
//! belong to the merger so every implementation gets the same policy.
//!
//! Implementations:
//! - [`memory::MemoryFeedSource`]: in-memory tables (tests, embedding)
//! - [`directory::DirectoryFeedSource`]: latest delimited-text file per feed in a directory

pub mod directory;
pub mod memory;

use std::fmt;

use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::classifier::PatternTable;
use crate::domain::ReconResult;
use crate::obs;

pub use directory::DirectoryFeedSource;
pub use memory::MemoryFeedSource;

/// Identifies a feed in errors and diagnostics.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum FeedKind {
    SiteList,
    PhaseTracker,
    VendorStatus(String),
}

impl fmt::Display for FeedKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            FeedKind::SiteList => f.write_str("site_list"),
            FeedKind::PhaseTracker => f.write_str("phase_tracker"),
            FeedKind::VendorStatus(vendor) => write!(f, "vendor_status:{vendor}"),
        }
    }
}

/// Row of the master site list.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct SiteRow {
    pub circuit_id: Option<String>,
    pub vendor: Option<String>,
    pub monthly_cost: Option<String>,
    pub legacy_monthly_cost: Option<String>,
    pub one_time_cost: Option<String>,
}

/// Row of the project-phase tracker.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct PhaseRow {
    pub circuit_id: Option<String>,
    pub vendor: Option<String>,
    pub phase: Option<String>,
    pub status_text: Option<String>,
    pub cutover_completed: Option<String>,
}

/// Row of a vendor status extract, in the common optional-field schema.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct VendorStatusRow {
    pub circuit_id: Option<String>,
    pub status_1: Option<String>,
    pub status_2: Option<String>,
    pub completed_on: Option<String>,
}

impl VendorStatusRow {
    /// Status fields that carry text.
    pub fn statuses(&self) -> impl Iterator<Item = &str> {
        [self.status_1.as_deref(), self.status_2.as_deref()]
            .into_iter()
            .flatten()
            .filter(|s| !s.trim().is_empty())
    }
}

/// Columns every vendor status extract is expected to provide.
pub const VENDOR_STATUS_COLUMNS: &[&str] = &["circuit_id", "status_1", "status_2"];

/// One vendor's status extract.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct VendorStatusTable {
    pub vendor: String,
    pub rows: Vec<VendorStatusRow>,
    /// Expected columns the source file did not carry; read as all-null.
    pub missing_columns: Vec<String>,
}

impl VendorStatusTable {
    pub fn new(vendor: impl Into<String>, rows: Vec<VendorStatusRow>) -> Self {
        Self {
            vendor: vendor.into(),
            rows,
            missing_columns: Vec::new(),
        }
    }

    pub fn with_missing_column(mut self, column: impl Into<String>) -> Self {
        self.missing_columns.push(column.into());
        self
    }

    /// Number of rows with at least one status field that `table` classifies
    /// as deployed.
    pub fn count_deployed(&self, table: &PatternTable) -> usize {
        self.rows
            .iter()
            .filter(|row| table.classify_any(row.statuses().map(Some)).is_deployed())
            .count()
    }
}

/// Read side of the feed collaborator.
///
/// Implementations must fail with
/// [`ReconError::MissingFeed`](crate::domain::ReconError::MissingFeed) when a
/// feed is entirely unavailable, rather than returning an empty table.
pub trait FeedSource {
    fn fetch_site_list(&self) -> ReconResult<Vec<SiteRow>>;

    fn fetch_phase_tracker(&self) -> ReconResult<Vec<PhaseRow>>;

    fn fetch_vendor_status(&self, vendor: &str) -> ReconResult<VendorStatusTable>;
}

/// All feeds for one run, fetched up front.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct FeedSnapshot {
    pub site_list: Vec<SiteRow>,
    pub phase_tracker: Vec<PhaseRow>,
    pub vendor_status: Vec<VendorStatusTable>,
}

impl FeedSnapshot {
    /// Fetch every feed sequentially. Any failure fails the snapshot; there
    /// is no partial snapshot.
    pub fn fetch(source: &dyn FeedSource, vendors: &[String]) -> ReconResult<Self> {
        let site_list = source.fetch_site_list()?;
        obs::emit_feed_loaded(&FeedKind::SiteList, site_list.len());

        let phase_tracker = source.fetch_phase_tracker()?;
        obs::emit_feed_loaded(&FeedKind::PhaseTracker, phase_tracker.len());

        let mut vendor_status = Vec::with_capacity(vendors.len());
        for vendor in vendors {
            let table = source.fetch_vendor_status(vendor)?;
            obs::emit_feed_loaded(&FeedKind::VendorStatus(vendor.clone()), table.rows.len());
            vendor_status.push(table);
        }

        debug!(
            site_rows = site_list.len(),
            tracker_rows = phase_tracker.len(),
            vendor_feeds = vendor_status.len(),
            "feed snapshot complete"
        );

        Ok(Self {
            site_list,
            phase_tracker,
            vendor_status,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::ReconError;

    fn status_row(id: &str, s1: Option<&str>, s2: Option<&str>) -> VendorStatusRow {
        VendorStatusRow {
            circuit_id: Some(id.to_string()),
            status_1: s1.map(str::to_string),
            status_2: s2.map(str::to_string),
            completed_on: None,
        }
    }

    #[test]
    fn test_feed_kind_display() {
        assert_eq!(FeedKind::SiteList.to_string(), "site_list");
        assert_eq!(
            FeedKind::VendorStatus("Hughes".to_string()).to_string(),
            "vendor_status:Hughes"
        );
    }

    #[test]
    fn test_count_deployed_any_field() {
        let table = VendorStatusTable::new(
            "Lumen",
            vec![
                status_row("1", Some("Complete"), None),
                status_row("2", Some("In Progress"), Some("Complete")),
                status_row("3", Some("Pending"), None),
                status_row("4", None, None),
            ],
        );
        assert_eq!(table.count_deployed(&PatternTable::vendor()), 2);
    }

    #[test]
    fn test_snapshot_fails_when_any_vendor_feed_missing() {
        let source = MemoryFeedSource::new()
            .with_vendor_table(VendorStatusTable::new("Lumen", vec![]));
        let vendors = vec!["Lumen".to_string(), "Comcast".to_string()];
        let err = FeedSnapshot::fetch(&source, &vendors).unwrap_err();
        match err {
            ReconError::MissingFeed { feed, .. } => {
                assert_eq!(feed, FeedKind::VendorStatus("Comcast".to_string()))
            }
            other => panic!("unexpected error: {other}"),
        }
    }

    #[test]
    fn test_snapshot_collects_all_feeds_in_order() {
        let source = MemoryFeedSource::new()
            .with_vendor_table(VendorStatusTable::new("Comcast", vec![]))
            .with_vendor_table(VendorStatusTable::new("Lumen", vec![]));
        let vendors = vec!["Lumen".to_string(), "Comcast".to_string()];
        let snapshot = FeedSnapshot::fetch(&source, &vendors).unwrap();
        let names: Vec<&str> = snapshot
            .vendor_status
            .iter()
            .map(|t| t.vendor.as_str())
            .collect();
        assert_eq!(names, vec!["Lumen", "Comcast"]);
    }
}
