//! Segmenting merged records by phase and exclusion roster.
//!
//! A circuit on the exclusion roster belongs to the special program and is
//! never counted in a phase segment. Within one layout every record lands in
//! exactly one bucket: a phase segment, the excluded bucket, or the
//! unclassified bucket (no phase, or a phase no segment claims).

use std::collections::{BTreeMap, BTreeSet};

use serde::{Deserialize, Serialize};

use crate::classifier::StatusSource;
use crate::config::validate_segments;
use crate::domain::{CircuitId, CircuitRecord, Phase, ReconResult};

/// How a segment selects its records.
#[derive(Debug, Clone, Copy, Default, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum SegmentKind {
    /// Records whose phase is listed, minus the exclusion roster.
    #[default]
    Phases,
    /// Circuits on the exclusion roster, reconciled from the site list and
    /// vendor status extracts.
    SpecialProgram,
}

/// Named segment of the report.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct SegmentDefinition {
    pub name: String,
    #[serde(default)]
    pub kind: SegmentKind,
    #[serde(default)]
    pub phases: BTreeSet<Phase>,
    /// Status fields that decide deployment for this segment.
    #[serde(default)]
    pub status_source: StatusSource,
}

impl SegmentDefinition {
    /// Phase segment classified from tracker status.
    pub fn phases<I, S>(name: &str, phases: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        Self {
            name: name.to_string(),
            kind: SegmentKind::Phases,
            phases: phases
                .into_iter()
                .filter_map(|p| Phase::parse(p.as_ref()))
                .collect(),
            status_source: StatusSource::Tracker,
        }
    }

    /// Special-program segment classified from vendor status fields.
    pub fn special_program(name: &str) -> Self {
        Self {
            name: name.to_string(),
            kind: SegmentKind::SpecialProgram,
            phases: BTreeSet::new(),
            status_source: StatusSource::Vendor,
        }
    }

    pub fn with_status_source(mut self, source: StatusSource) -> Self {
        self.status_source = source;
        self
    }

    pub fn is_special_program(&self) -> bool {
        self.kind == SegmentKind::SpecialProgram
    }
}

/// Whether the record's identifier is on the exclusion roster.
pub fn is_excluded(record: &CircuitRecord, exclusion_ids: &BTreeSet<CircuitId>) -> bool {
    record
        .circuit_id
        .as_ref()
        .is_some_and(|id| exclusion_ids.contains(id))
}

/// Records whose phase is in `phase_filter` and whose identifier is not in
/// `exclusion_ids`.
pub fn segment(
    records: &[CircuitRecord],
    phase_filter: &BTreeSet<Phase>,
    exclusion_ids: &BTreeSet<CircuitId>,
) -> Vec<CircuitRecord> {
    records
        .iter()
        .filter(|r| r.phase.as_ref().is_some_and(|p| phase_filter.contains(p)))
        .filter(|r| !is_excluded(r, exclusion_ids))
        .cloned()
        .collect()
}

/// Every record assigned to exactly one bucket.
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct Partition {
    /// Phase segments in definition order.
    pub segments: Vec<(String, Vec<CircuitRecord>)>,
    /// Records on the exclusion roster.
    pub excluded: Vec<CircuitRecord>,
    /// Records with no phase or a phase no segment claims.
    pub unclassified: Vec<CircuitRecord>,
}

impl Partition {
    pub fn segment(&self, name: &str) -> Option<&[CircuitRecord]> {
        self.segments
            .iter()
            .find(|(n, _)| n == name)
            .map(|(_, records)| records.as_slice())
    }

    /// Records across all buckets.
    pub fn total(&self) -> usize {
        self.segments.iter().map(|(_, r)| r.len()).sum::<usize>()
            + self.excluded.len()
            + self.unclassified.len()
    }
}

/// Partition merged records over the phase segments of `definitions`.
///
/// Special-program definitions contribute no phase bucket; roster circuits go
/// to [`Partition::excluded`] regardless of phase.
pub fn partition(
    records: &[CircuitRecord],
    definitions: &[SegmentDefinition],
    exclusion_ids: &BTreeSet<CircuitId>,
) -> ReconResult<Partition> {
    validate_segments(definitions)?;

    let phase_segments: Vec<&SegmentDefinition> = definitions
        .iter()
        .filter(|d| d.kind == SegmentKind::Phases)
        .collect();
    let owner: BTreeMap<&Phase, usize> = phase_segments
        .iter()
        .enumerate()
        .flat_map(|(idx, def)| def.phases.iter().map(move |p| (p, idx)))
        .collect();

    let mut buckets: Vec<Vec<CircuitRecord>> = vec![Vec::new(); phase_segments.len()];
    let mut excluded = Vec::new();
    let mut unclassified = Vec::new();

    for record in records {
        if is_excluded(record, exclusion_ids) {
            excluded.push(record.clone());
            continue;
        }
        match record.phase.as_ref().and_then(|p| owner.get(p)) {
            Some(&idx) => buckets[idx].push(record.clone()),
            None => unclassified.push(record.clone()),
        }
    }

    Ok(Partition {
        segments: phase_segments
            .iter()
            .map(|d| d.name.clone())
            .zip(buckets)
            .collect(),
        excluded,
        unclassified,
    })
}

/// Group records by phase tag; records without a phase are keyed `None`.
pub fn records_by_phase(records: &[CircuitRecord]) -> BTreeMap<Option<Phase>, Vec<CircuitRecord>> {
    let mut groups: BTreeMap<Option<Phase>, Vec<CircuitRecord>> = BTreeMap::new();
    for record in records {
        groups
            .entry(record.phase.clone())
            .or_default()
            .push(record.clone());
    }
    groups
}
