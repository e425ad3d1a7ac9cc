//! Vendor rollup engine.
//!
//! Counts are over distinct circuit identifiers; costs are plain sums over
//! records. A vendor seen only through costs (records without an identifier)
//! or only through counts still gets a full row with the other fields at zero.

use std::collections::{BTreeMap, BTreeSet};

use chrono::NaiveDate;
use serde::{Deserialize, Serialize};

use crate::classifier::{Classifier, PatternTable, StatusSource};
use crate::domain::{CircuitId, CircuitRecord, LifecycleState, VendorMetric};
use crate::feed::VendorStatusTable;
use crate::obs;

/// How one segment's records are rolled up.
#[derive(Debug, Clone, Copy, Default, PartialEq)]
pub struct RollupOptions {
    pub status_source: StatusSource,
    /// Cutover date assumed for deployed circuits that report none.
    pub cutover_date_fallback: Option<NaiveDate>,
}

/// Distinct circuits per lifecycle state.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct LifecycleCounts {
    pub unknown: u64,
    pub assigned: u64,
    pub in_progress: u64,
    pub deployed: u64,
}

impl LifecycleCounts {
    pub fn record(&mut self, state: LifecycleState) {
        match state {
            LifecycleState::Unknown => self.unknown += 1,
            LifecycleState::Assigned => self.assigned += 1,
            LifecycleState::InProgress => self.in_progress += 1,
            LifecycleState::Deployed => self.deployed += 1,
        }
    }

    pub fn total(&self) -> u64 {
        self.unknown + self.assigned + self.in_progress + self.deployed
    }

    pub fn add(&mut self, other: &LifecycleCounts) {
        self.unknown += other.unknown;
        self.assigned += other.assigned;
        self.in_progress += other.in_progress;
        self.deployed += other.deployed;
    }
}

/// One segment's per-vendor metrics plus the counts that explain them.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SegmentRollup {
    pub segment: String,
    pub metrics: BTreeMap<String, VendorMetric>,
    /// Per-vendor distinct circuits per lifecycle state.
    pub lifecycle: BTreeMap<String, LifecycleCounts>,
    /// Circuits with status text that matched no pattern.
    pub ambiguous: u64,
    /// Records skipped for having no vendor.
    pub unassigned_records: u64,
}

impl SegmentRollup {
    pub fn metric(&self, vendor: &str) -> Option<&VendorMetric> {
        self.metrics.get(vendor)
    }

    pub fn total_assigned(&self) -> u64 {
        self.metrics.values().map(|m| m.assigned_count).sum()
    }

    pub fn total_deployed(&self) -> u64 {
        self.metrics.values().map(|m| m.deployed_count).sum()
    }
}

#[derive(Default)]
struct VendorAccumulator {
    states: BTreeMap<CircuitId, LifecycleState>,
    yearly: f64,
    legacy_yearly: f64,
    one_time: f64,
    last_cutover: Option<NaiveDate>,
}

/// Per-vendor metrics for a segment's records.
pub fn rollup(
    records: &[CircuitRecord],
    classifier: &Classifier,
    options: RollupOptions,
) -> BTreeMap<String, VendorMetric> {
    rollup_segment("", records, classifier, options).metrics
}

/// Roll up one named segment.
pub fn rollup_segment(
    segment: &str,
    records: &[CircuitRecord],
    classifier: &Classifier,
    options: RollupOptions,
) -> SegmentRollup {
    let mut vendors: BTreeMap<String, VendorAccumulator> = BTreeMap::new();
    let mut ambiguous_ids = BTreeSet::new();
    let mut ambiguous_anonymous = 0u64;
    let mut unassigned_records = 0u64;

    for record in records {
        let Some(vendor) = record.vendor.as_deref() else {
            unassigned_records += 1;
            continue;
        };
        let acc = vendors.entry(vendor.to_string()).or_default();
        acc.yearly += record.yearly_cost().unwrap_or(0.0);
        acc.legacy_yearly += record.legacy_yearly_cost().unwrap_or(0.0);
        acc.one_time += record.one_time_cost().unwrap_or(0.0);

        let state = classifier.classify_record(record, options.status_source);
        if classifier.is_ambiguous(record, options.status_source) {
            match &record.circuit_id {
                Some(id) => {
                    ambiguous_ids.insert(id.clone());
                }
                None => ambiguous_anonymous += 1,
            }
        }
        if state.is_deployed() {
            let date = record.cutover_date.or(options.cutover_date_fallback);
            acc.last_cutover = acc.last_cutover.max(date);
        }

        // Records without an identifier carry cost but are never counted.
        if let Some(id) = &record.circuit_id {
            let slot = acc.states.entry(id.clone()).or_default();
            *slot = (*slot).max(state);
        }
    }

    let mut metrics = BTreeMap::new();
    let mut lifecycle = BTreeMap::new();
    for (vendor, acc) in vendors {
        let mut counts = LifecycleCounts::default();
        for state in acc.states.values() {
            counts.record(*state);
        }
        metrics.insert(
            vendor.clone(),
            VendorMetric {
                vendor: vendor.clone(),
                assigned_count: counts.total(),
                deployed_count: counts.deployed,
                current_yearly_cost: acc.yearly,
                legacy_yearly_cost: acc.legacy_yearly,
                one_time_cost: acc.one_time,
                last_cutover: acc.last_cutover,
            },
        );
        lifecycle.insert(vendor, counts);
    }

    let out = SegmentRollup {
        segment: segment.to_string(),
        metrics,
        lifecycle,
        ambiguous: ambiguous_ids.len() as u64 + ambiguous_anonymous,
        unassigned_records,
    };
    obs::emit_segment_rolled_up(
        segment,
        out.metrics.len(),
        out.total_assigned(),
        out.total_deployed(),
    );
    out
}

/// Rows per vendor status feed whose status text classifies deployed.
pub fn count_cutover_complete(
    tables: &[VendorStatusTable],
    patterns: &PatternTable,
) -> BTreeMap<String, usize> {
    tables
        .iter()
        .map(|t| (t.vendor.clone(), t.count_deployed(patterns)))
        .collect()
}
