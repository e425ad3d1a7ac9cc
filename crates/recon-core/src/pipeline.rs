//! Reconciliation pipeline.
//!
//! [`Reconciler`] owns a feed source and a configuration and exposes the
//! three entry points callers use:
//!
//! - [`Reconciler::reconcile`]: merged, deduplicated records
//! - [`Reconciler::rollup_by_segment`]: per-vendor metrics per named segment
//! - [`Reconciler::final_report`]: the composed wide table
//!
//! Every call fetches a fresh snapshot; nothing is cached between runs.

use std::collections::{BTreeMap, BTreeSet};

use chrono::NaiveDate;
use serde::Serialize;
use tracing::info;

use crate::classifier::{Classifier, StatusSource};
use crate::composer::{compose_with_digest, ComposedReport};
use crate::config::{validate_segments, ReconConfig};
use crate::domain::{CircuitId, CircuitRecord, Diagnostics, IdNormalizer, ReconResult};
use crate::feed::{FeedSnapshot, FeedSource};
use crate::merger::PreparedFeeds;
use crate::obs::RunSpan;
use crate::rollup::{count_cutover_complete, rollup_segment, LifecycleCounts, RollupOptions, SegmentRollup};
use crate::segment::{partition, Partition, SegmentDefinition};

/// Result of one reconciliation run.
#[derive(Debug, Clone, Serialize)]
pub struct Reconciliation {
    /// Tracker circuits merged with site costs and vendor statuses.
    pub records: Vec<CircuitRecord>,
    /// Roster circuits reconciled from the site list and vendor extracts.
    pub special_program: Vec<CircuitRecord>,
    pub diagnostics: Diagnostics,
    #[serde(skip)]
    snapshot: FeedSnapshot,
    #[serde(skip)]
    exclusion_ids: BTreeSet<CircuitId>,
    #[serde(skip)]
    classifier: Classifier,
    #[serde(skip)]
    cutover_date_fallback: Option<NaiveDate>,
}

impl Reconciliation {
    pub fn exclusion_ids(&self) -> &BTreeSet<CircuitId> {
        &self.exclusion_ids
    }

    pub fn snapshot(&self) -> &FeedSnapshot {
        &self.snapshot
    }

    /// Partition the merged records over `definitions`.
    pub fn partition(&self, definitions: &[SegmentDefinition]) -> ReconResult<Partition> {
        partition(&self.records, definitions, &self.exclusion_ids)
    }

    fn options(&self, definition: &SegmentDefinition) -> RollupOptions {
        RollupOptions {
            status_source: definition.status_source,
            cutover_date_fallback: self.cutover_date_fallback,
        }
    }

    /// Roll up each segment, in definition order.
    pub fn rollup_by_segment(
        &self,
        definitions: &[SegmentDefinition],
    ) -> ReconResult<Vec<SegmentRollup>> {
        validate_segments(definitions)?;
        let partition = self.partition(definitions)?;

        let rollups = definitions
            .iter()
            .map(|def| {
                let records = if def.is_special_program() {
                    self.special_program.as_slice()
                } else {
                    partition.segment(&def.name).unwrap_or_default()
                };
                rollup_segment(&def.name, records, &self.classifier, self.options(def))
            })
            .collect();
        Ok(rollups)
    }

    /// Roll up and compose `definitions` into the wide vendor table.
    pub fn compose(&self, definitions: &[SegmentDefinition]) -> ReconResult<ComposedReport> {
        let rollups = self.rollup_by_segment(definitions)?;
        compose_with_digest(&rollups, &self.records, &self.special_program)
    }

    /// Per-vendor distinct circuits per lifecycle state, over the merged
    /// records with tracker and vendor fields both considered. Circuits whose
    /// status matched nothing show up under `unknown`, which is the gap
    /// between assigned and the other states.
    pub fn lifecycle_breakdown(&self) -> BTreeMap<String, LifecycleCounts> {
        let options = RollupOptions {
            status_source: StatusSource::Either,
            cutover_date_fallback: self.cutover_date_fallback,
        };
        rollup_segment("lifecycle", &self.records, &self.classifier, options).lifecycle
    }

    /// Vendor status rows classified deployed, per vendor feed.
    pub fn cutover_complete_counts(&self) -> BTreeMap<String, usize> {
        count_cutover_complete(&self.snapshot.vendor_status, &self.classifier.vendor)
    }
}

/// Runs reconciliations against a feed source.
pub struct Reconciler<S: FeedSource> {
    source: S,
    config: ReconConfig,
    classifier: Classifier,
    normalizer: IdNormalizer,
    exclusion_ids: BTreeSet<CircuitId>,
}

impl<S: FeedSource> Reconciler<S> {
    /// Validate `config` and load the exclusion roster.
    pub fn new(source: S, config: ReconConfig) -> ReconResult<Self> {
        config.validate()?;
        let exclusion_ids = config.exclusion_set()?;
        let normalizer = config.id_normalizer();
        Ok(Self {
            source,
            config,
            classifier: Classifier::standard(),
            normalizer,
            exclusion_ids,
        })
    }

    pub fn with_classifier(mut self, classifier: Classifier) -> Self {
        self.classifier = classifier;
        self
    }

    pub fn config(&self) -> &ReconConfig {
        &self.config
    }

    fn period_label(&self) -> String {
        self.config
            .feeds
            .period
            .clone()
            .unwrap_or_else(|| "latest".to_string())
    }

    /// Fetch feeds, merge, and reconcile the special program.
    pub fn reconcile(&self) -> ReconResult<Reconciliation> {
        let _span = RunSpan::enter(&self.period_label());

        let snapshot = FeedSnapshot::fetch(&self.source, &self.config.feeds.vendor_names())?;
        let prepared = PreparedFeeds::prepare(&snapshot, &self.normalizer);
        let records = prepared.merged_records();
        let special_program = prepared.special_program_records(&self.exclusion_ids);

        info!(
            records = records.len(),
            special_program = special_program.len(),
            roster = self.exclusion_ids.len(),
            diagnostics = prepared.diagnostics().len(),
            "reconciliation complete"
        );

        Ok(Reconciliation {
            records,
            special_program,
            diagnostics: prepared.diagnostics().clone(),
            snapshot,
            exclusion_ids: self.exclusion_ids.clone(),
            classifier: self.classifier.clone(),
            cutover_date_fallback: self.config.cutover_date_fallback,
        })
    }

    /// Reconcile and roll up `definitions`.
    pub fn rollup_by_segment(
        &self,
        definitions: &[SegmentDefinition],
    ) -> ReconResult<Vec<SegmentRollup>> {
        self.reconcile()?.rollup_by_segment(definitions)
    }

    /// Reconcile and compose the configured segment layout.
    pub fn final_report(&self) -> ReconResult<ComposedReport> {
        self.reconcile()?.compose(&self.config.segments)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::RosterEntry;
    use crate::domain::ReconError;
    use crate::feed::{MemoryFeedSource, PhaseRow, SiteRow, VendorStatusRow, VendorStatusTable};

    fn s(v: &str) -> Option<String> {
        Some(v.to_string())
    }

    fn tracker(id: &str, vendor: &str, phase: &str, status: &str) -> PhaseRow {
        PhaseRow {
            circuit_id: s(id),
            vendor: s(vendor),
            phase: s(phase),
            status_text: s(status),
            cutover_completed: None,
        }
    }

    fn site(id: &str, vendor: &str, mrc: &str) -> SiteRow {
        SiteRow {
            circuit_id: s(id),
            vendor: s(vendor),
            monthly_cost: s(mrc),
            legacy_monthly_cost: s(mrc),
            one_time_cost: None,
        }
    }

    fn config(vendors: &[&str], roster: &[u64]) -> ReconConfig {
        let mut config = ReconConfig::default();
        config.feeds.vendors = vendors
            .iter()
            .map(|v| crate::config::VendorFeedConfig::new(v, v))
            .collect();
        config.exclusion_roster = roster.iter().map(|n| RosterEntry::Number(*n)).collect();
        config
    }

    fn source() -> MemoryFeedSource {
        MemoryFeedSource::new()
            .with_phase_rows(vec![
                tracker("1", "Lumen", "2", "Cutover Complete"),
                tracker("2", "Lumen", "4", "Pending Install"),
                tracker("3", "Comcast", "LEO", "Scheduled"),
                tracker("4", "Lumen", "4", "Cutover Complete"),
            ])
            .with_site_rows(vec![
                site("1", "Lumen", "100"),
                site("2", "Lumen", "200"),
                site("4", "Lumen", "50"),
                site("9", "Granite", "75"),
            ])
            .with_vendor_table(VendorStatusTable::new(
                "Granite",
                vec![VendorStatusRow {
                    circuit_id: s("9"),
                    status_1: s("Complete"),
                    ..Default::default()
                }],
            ))
    }

    #[test]
    fn test_reconcile_and_special_program() {
        let reconciler = Reconciler::new(source(), config(&["Granite"], &[4, 9])).unwrap();
        let run = reconciler.reconcile().unwrap();
        assert_eq!(run.records.len(), 4);
        let special: Vec<&str> = run
            .special_program
            .iter()
            .map(|r| r.circuit_id.as_ref().unwrap().as_str())
            .collect();
        assert_eq!(special, vec!["4", "9"]);
        assert_eq!(run.cutover_complete_counts()["Granite"], 1);
    }

    #[test]
    fn test_final_report_keeps_roster_out_of_phase_segments() {
        let reconciler = Reconciler::new(source(), config(&["Granite"], &[4, 9])).unwrap();
        let report = reconciler.final_report().unwrap();

        let lumen = report.row("Lumen").unwrap();
        assert_eq!(lumen.segment("plant").unwrap().deployed_count, 1);
        assert_eq!(lumen.segment("phase_4").unwrap().assigned_count, 1);
        assert_eq!(lumen.segment("phase_4").unwrap().deployed_count, 0);
        // Circuit 4 is on the roster: counted under the special program only.
        assert_eq!(lumen.segment("special_program").unwrap().assigned_count, 1);

        let granite = report.row("Granite").unwrap();
        assert_eq!(granite.segment("special_program").unwrap().deployed_count, 1);
        assert_eq!(granite.segment("plant").unwrap().assigned_count, 0);
        assert_eq!(report.input_digest.len(), 64);
    }

    #[test]
    fn test_missing_vendor_feed_fails_run() {
        let reconciler = Reconciler::new(source(), config(&["Granite", "Hughes"], &[])).unwrap();
        match reconciler.final_report() {
            Err(ReconError::MissingFeed { feed, .. }) => {
                assert_eq!(feed.to_string(), "vendor_status:Hughes")
            }
            other => panic!("unexpected result: {other:?}"),
        }
    }

    #[test]
    fn test_unknown_status_surfaces_in_breakdown() {
        let source = MemoryFeedSource::new().with_phase_rows(vec![
            tracker("1", "Verizon", "2", "Awaiting landlord"),
            tracker("2", "Verizon", "2", "Cutover Complete"),
        ]);
        let run = Reconciler::new(source, config(&[], &[]))
            .unwrap()
            .reconcile()
            .unwrap();
        let counts = run.lifecycle_breakdown()["Verizon"];
        assert_eq!(counts.unknown, 1);
        assert_eq!(counts.deployed, 1);
        assert_eq!(counts.total(), 2);
    }

    #[test]
    fn test_rollup_rejects_invalid_layout() {
        let run = Reconciler::new(source(), config(&["Granite"], &[]))
            .unwrap()
            .reconcile()
            .unwrap();
        let defs = vec![
            SegmentDefinition::phases("x", ["2"]),
            SegmentDefinition::phases("x", ["4"]),
        ];
        assert!(matches!(
            run.rollup_by_segment(&defs),
            Err(ReconError::DuplicateSegment(_))
        ));
    }
}
