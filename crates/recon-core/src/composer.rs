//! Rollup composer: widens per-segment rollups into one vendor table.

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};

use crate::domain::{CircuitRecord, ReconError, ReconResult, VendorMetric};
use crate::obs;
use crate::rollup::SegmentRollup;

/// One vendor across every segment.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ComposedRow {
    pub vendor: String,
    /// Metrics keyed by segment name; every segment of the report is present.
    pub segments: BTreeMap<String, VendorMetric>,
    /// Field-wise sum over segments.
    pub total: VendorMetric,
}

impl ComposedRow {
    pub fn segment(&self, name: &str) -> Option<&VendorMetric> {
        self.segments.get(name)
    }
}

/// Final wide table keyed by vendor.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ComposedReport {
    /// Segment names in composition order.
    pub segments: Vec<String>,
    /// Rows in vendor order.
    pub rows: Vec<ComposedRow>,
    /// SHA-256 over the merged and special-program records the report was
    /// built from.
    pub input_digest: String,
}

impl ComposedReport {
    pub fn row(&self, vendor: &str) -> Option<&ComposedRow> {
        self.rows.iter().find(|r| r.vendor == vendor)
    }

    /// Column totals for one segment.
    pub fn segment_total(&self, segment: &str) -> VendorMetric {
        let mut total = VendorMetric::zero("total");
        for metric in self.rows.iter().filter_map(|r| r.segment(segment)) {
            total.accumulate(metric);
        }
        total
    }

    /// Totals across every segment and vendor.
    pub fn grand_total(&self) -> VendorMetric {
        let mut total = VendorMetric::zero("total");
        for row in &self.rows {
            total.accumulate(&row.total);
        }
        total
    }

    pub fn with_input_digest(mut self, digest: impl Into<String>) -> Self {
        self.input_digest = digest.into();
        self
    }
}

/// Outer-merge segment rollups by vendor.
///
/// Gaps stay unset through every merge step and are zero-filled once at the
/// end, so a vendor present in one segment gets zero metrics in the others.
/// Segment names must be unique.
pub fn compose(rollups: &[SegmentRollup]) -> ReconResult<ComposedReport> {
    let mut names = std::collections::BTreeSet::new();
    if let Some(dup) = rollups.iter().find(|r| !names.insert(r.segment.as_str())) {
        return Err(ReconError::DuplicateSegment(dup.segment.clone()));
    }

    let width = rollups.len();
    let mut wide: BTreeMap<String, Vec<Option<VendorMetric>>> = BTreeMap::new();

    for (idx, rollup) in rollups.iter().enumerate() {
        for (vendor, metric) in &rollup.metrics {
            let slots = wide
                .entry(vendor.clone())
                .or_insert_with(|| vec![None; width]);
            slots[idx] = Some(metric.clone());
        }
    }

    let rows: Vec<ComposedRow> = wide
        .into_iter()
        .map(|(vendor, slots)| {
            let mut total = VendorMetric::zero(vendor.clone());
            let segments = rollups
                .iter()
                .zip(slots)
                .map(|(rollup, slot)| {
                    let metric = slot.unwrap_or_else(|| VendorMetric::zero(vendor.clone()));
                    total.accumulate(&metric);
                    (rollup.segment.clone(), metric)
                })
                .collect();
            ComposedRow {
                vendor,
                segments,
                total,
            }
        })
        .collect();

    Ok(ComposedReport {
        segments: rollups.iter().map(|r| r.segment.clone()).collect(),
        rows,
        input_digest: String::new(),
    })
}

/// Compose and stamp the digest of the merged and special-program records.
pub fn compose_with_digest(
    rollups: &[SegmentRollup],
    records: &[CircuitRecord],
    special_program: &[CircuitRecord],
) -> ReconResult<ComposedReport> {
    let digest = input_digest(records, special_program)?;
    let report = compose(rollups)?.with_input_digest(digest);
    obs::emit_report_composed(report.segments.len(), report.rows.len(), &report.input_digest);
    Ok(report)
}

// Records serialize as JSON objects, so this line never collides with one.
const SET_SEPARATOR: &[u8] = b"--\n";

/// Hex SHA-256 over the merged `records`, a separator, then the
/// `special_program` records. Each set is serialized in identifier order;
/// records without an identifier sort last and keep their relative order.
pub fn input_digest(
    records: &[CircuitRecord],
    special_program: &[CircuitRecord],
) -> ReconResult<String> {
    let mut hasher = Sha256::new();
    hash_records(&mut hasher, records)?;
    hasher.update(SET_SEPARATOR);
    hash_records(&mut hasher, special_program)?;
    Ok(hex::encode(hasher.finalize()))
}

fn hash_records(hasher: &mut Sha256, records: &[CircuitRecord]) -> ReconResult<()> {
    let mut ordered: Vec<&CircuitRecord> = records.iter().collect();
    ordered.sort_by(|a, b| match (&a.circuit_id, &b.circuit_id) {
        (Some(x), Some(y)) => x.cmp(y),
        (Some(_), None) => std::cmp::Ordering::Less,
        (None, Some(_)) => std::cmp::Ordering::Greater,
        (None, None) => std::cmp::Ordering::Equal,
    });
    for record in ordered {
        hasher.update(serde_json::to_vec(record)?);
        hasher.update(b"\n");
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::CircuitId;
    use pretty_assertions::assert_eq;

    fn metric(vendor: &str, assigned: u64, deployed: u64, yearly: f64) -> VendorMetric {
        VendorMetric {
            assigned_count: assigned,
            deployed_count: deployed,
            current_yearly_cost: yearly,
            ..VendorMetric::zero(vendor)
        }
    }

    fn seg(name: &str, metrics: Vec<VendorMetric>) -> SegmentRollup {
        SegmentRollup {
            segment: name.to_string(),
            metrics: metrics.into_iter().map(|m| (m.vendor.clone(), m)).collect(),
            lifecycle: BTreeMap::new(),
            ambiguous: 0,
            unassigned_records: 0,
        }
    }

    #[test]
    fn test_vendor_only_in_special_segment_is_zero_filled() {
        let report = compose(&[
            seg("plant", vec![metric("Lumen", 3, 1, 100.0)]),
            seg("phase_4", vec![metric("Lumen", 2, 2, 50.0)]),
            seg("special_program", vec![metric("Granite", 4, 1, 10.0)]),
        ])
        .unwrap();

        assert_eq!(report.segments, vec!["plant", "phase_4", "special_program"]);
        let granite = report.row("Granite").unwrap();
        assert_eq!(granite.segments.len(), 3);
        assert_eq!(granite.segment("plant").unwrap(), &VendorMetric::zero("Granite"));
        assert_eq!(granite.segment("special_program").unwrap().assigned_count, 4);
        assert_eq!(granite.total.assigned_count, 4);

        let lumen = report.row("Lumen").unwrap();
        assert_eq!(lumen.total.assigned_count, 5);
        assert_eq!(lumen.total.current_yearly_cost, 150.0);
        assert_eq!(lumen.segment("special_program").unwrap().deployed_count, 0);
    }

    #[test]
    fn test_rows_sorted_and_totals() {
        let report = compose(&[
            seg("a", vec![metric("Zeta", 1, 0, 1.0), metric("Alpha", 1, 1, 2.0)]),
            seg("b", vec![metric("Alpha", 2, 0, 3.0)]),
        ])
        .unwrap();
        let vendors: Vec<&str> = report.rows.iter().map(|r| r.vendor.as_str()).collect();
        assert_eq!(vendors, vec!["Alpha", "Zeta"]);
        assert_eq!(report.segment_total("a").assigned_count, 2);
        assert_eq!(report.grand_total().assigned_count, 4);
        assert_eq!(report.grand_total().current_yearly_cost, 6.0);
    }

    #[test]
    fn test_compose_empty() {
        let report = compose(&[]).unwrap();
        assert!(report.rows.is_empty());
        assert!(report.segments.is_empty());
    }

    #[test]
    fn test_digest_ignores_input_order() {
        let a = CircuitRecord::new(Some(CircuitId::new("1"))).with_vendor("A");
        let b = CircuitRecord::new(Some(CircuitId::new("2"))).with_vendor("B");
        let anon = CircuitRecord::new(None).with_vendor("C");

        let forward = input_digest(&[a.clone(), b.clone(), anon.clone()], &[]).unwrap();
        let reverse = input_digest(&[anon, b.clone(), a], &[]).unwrap();
        assert_eq!(forward, reverse);
        assert_eq!(forward.len(), 64);

        let changed = input_digest(&[b], &[]).unwrap();
        assert_ne!(forward, changed);
    }

    #[test]
    fn test_digest_covers_special_program_records() {
        let merged = vec![CircuitRecord::new(Some(CircuitId::new("1"))).with_vendor("A")];
        let special = |mrc: f64| {
            let costs = crate::domain::CircuitCosts::from_monthly(Some(mrc), None, None);
            vec![CircuitRecord::new(Some(CircuitId::new("9")))
                .with_vendor("G")
                .with_costs(costs)]
        };

        let before = input_digest(&merged, &special(100.0)).unwrap();
        let after = input_digest(&merged, &special(5000.0)).unwrap();
        assert_ne!(before, after);

        // The same record counts differently as merged or as special program.
        let as_merged = input_digest(&special(100.0), &[]).unwrap();
        let as_special = input_digest(&[], &special(100.0)).unwrap();
        assert_ne!(as_merged, as_special);
    }

    #[test]
    fn test_compose_rejects_duplicate_segment_names() {
        let err = compose(&[
            seg("plant", vec![metric("Lumen", 1, 0, 1.0)]),
            seg("plant", vec![metric("Lumen", 2, 0, 2.0)]),
        ])
        .unwrap_err();
        assert!(matches!(err, ReconError::DuplicateSegment(name) if name == "plant"));
    }
}
