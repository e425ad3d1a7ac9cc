//! In-memory feed source.
//!
//! Holds fully-formed tables and hands out clones, so every fetch sees the
//! same snapshot. A feed can be marked unavailable to exercise the
//! missing-feed path.

use std::collections::BTreeMap;

use crate::domain::{ReconError, ReconResult};
use crate::feed::{FeedKind, FeedSource, PhaseRow, SiteRow, VendorStatusTable};

const IN_MEMORY_PERIOD: &str = "in-memory";

/// Feed source backed by in-memory tables.
#[derive(Debug, Clone)]
pub struct MemoryFeedSource {
    site_list: Option<Vec<SiteRow>>,
    phase_tracker: Option<Vec<PhaseRow>>,
    vendor_status: BTreeMap<String, VendorStatusTable>,
}

impl Default for MemoryFeedSource {
    fn default() -> Self {
        Self::new()
    }
}

impl MemoryFeedSource {
    /// Empty site list and tracker, no vendor feeds.
    pub fn new() -> Self {
        Self {
            site_list: Some(Vec::new()),
            phase_tracker: Some(Vec::new()),
            vendor_status: BTreeMap::new(),
        }
    }

    pub fn with_site_rows(mut self, rows: Vec<SiteRow>) -> Self {
        self.site_list = Some(rows);
        self
    }

    pub fn with_phase_rows(mut self, rows: Vec<PhaseRow>) -> Self {
        self.phase_tracker = Some(rows);
        self
    }

    pub fn with_vendor_table(mut self, table: VendorStatusTable) -> Self {
        self.vendor_status.insert(table.vendor.clone(), table);
        self
    }

    /// Make the site list unavailable.
    pub fn without_site_list(mut self) -> Self {
        self.site_list = None;
        self
    }

    /// Make the phase tracker unavailable.
    pub fn without_phase_tracker(mut self) -> Self {
        self.phase_tracker = None;
        self
    }

    /// Vendors with a registered status table, in name order.
    pub fn vendors(&self) -> Vec<String> {
        self.vendor_status.keys().cloned().collect()
    }
}

fn missing(feed: FeedKind) -> ReconError {
    ReconError::MissingFeed {
        feed,
        period: IN_MEMORY_PERIOD.to_string(),
    }
}

impl FeedSource for MemoryFeedSource {
    fn fetch_site_list(&self) -> ReconResult<Vec<SiteRow>> {
        self.site_list
            .clone()
            .ok_or_else(|| missing(FeedKind::SiteList))
    }

    fn fetch_phase_tracker(&self) -> ReconResult<Vec<PhaseRow>> {
        self.phase_tracker
            .clone()
            .ok_or_else(|| missing(FeedKind::PhaseTracker))
    }

    fn fetch_vendor_status(&self, vendor: &str) -> ReconResult<VendorStatusTable> {
        self.vendor_status
            .get(vendor)
            .cloned()
            .ok_or_else(|| missing(FeedKind::VendorStatus(vendor.to_string())))
    }
}
