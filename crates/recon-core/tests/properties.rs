//! Property tests for the reconciliation invariants.

use std::collections::BTreeSet;

use proptest::prelude::*;
use recon_core::{
    default_segments, merge, normalize_column, partition, rollup, CircuitId, Classifier,
    IdNormalizer, PhaseRow, RawCost, RollupOptions, SiteRow, StatusSource, VendorStatusRow,
    VendorStatusTable,
};

const VENDORS: &[&str] = &["Granite", "Lumen", "Comcast"];
const PHASES: &[&str] = &["1", "2", "3", "4", "SP", "LEO", "9", ""];
const STATUSES: &[&str] = &[
    "Cutover Complete",
    "Cutover One Circuit Only - Complete",
    "Pending Install",
    "Scheduled",
    "Awaiting landlord",
    "",
];
const IDS: &[&str] = &["1", "2", "3", "4", "5", "6", " 7 ", "8.0", "TBD", ""];

fn pick(options: &'static [&'static str]) -> impl Strategy<Value = Option<String>> {
    prop::sample::select(options).prop_map(|s| Some(s.to_string()).filter(|s| !s.is_empty()))
}

fn cost_cell() -> impl Strategy<Value = Option<String>> {
    prop_oneof![
        Just(None),
        Just(Some("-".to_string())),
        (0u32..10_000).prop_map(|n| Some(format!("${n}.50"))),
        (0u32..10_000).prop_map(|n| Some(n.to_string())),
    ]
}

fn phase_row() -> impl Strategy<Value = PhaseRow> {
    (pick(IDS), pick(VENDORS), pick(PHASES), pick(STATUSES)).prop_map(
        |(circuit_id, vendor, phase, status_text)| PhaseRow {
            circuit_id,
            vendor,
            phase,
            status_text,
            cutover_completed: None,
        },
    )
}

fn site_row() -> impl Strategy<Value = SiteRow> {
    (pick(IDS), pick(VENDORS), cost_cell(), cost_cell(), cost_cell()).prop_map(
        |(circuit_id, vendor, monthly_cost, legacy_monthly_cost, one_time_cost)| SiteRow {
            circuit_id,
            vendor,
            monthly_cost,
            legacy_monthly_cost,
            one_time_cost,
        },
    )
}

fn status_table() -> impl Strategy<Value = VendorStatusTable> {
    prop::collection::vec(
        (pick(IDS), pick(STATUSES), pick(STATUSES)).prop_map(|(circuit_id, status_1, status_2)| {
            VendorStatusRow {
                circuit_id,
                status_1,
                status_2,
                completed_on: None,
            }
        }),
        0..6,
    )
    .prop_map(|rows| VendorStatusTable::new("Lumen", rows))
}

proptest! {
    /// Property: yearly costs are exactly twelve times the monthly costs.
    #[test]
    fn yearly_is_twelve_times_monthly(
        phases in prop::collection::vec(phase_row(), 0..12),
        sites in prop::collection::vec(site_row(), 0..12),
    ) {
        let out = merge(&phases, &sites, &[], &IdNormalizer::default());
        for record in &out.records {
            prop_assert_eq!(record.yearly_cost(), record.monthly_cost().map(|m| m * 12.0));
            prop_assert_eq!(
                record.legacy_yearly_cost(),
                record.legacy_monthly_cost().map(|m| m * 12.0)
            );
        }
    }

    /// Property: a vendor never has more deployed than assigned circuits.
    #[test]
    fn assigned_at_least_deployed(
        phases in prop::collection::vec(phase_row(), 0..16),
        tables in prop::collection::vec(status_table(), 0..2),
        source in prop::sample::select(vec![StatusSource::Tracker, StatusSource::Vendor, StatusSource::Either]),
    ) {
        let out = merge(&phases, &[], &tables, &IdNormalizer::default());
        let options = RollupOptions { status_source: source, cutover_date_fallback: None };
        for metric in rollup(&out.records, &Classifier::standard(), options).values() {
            prop_assert!(metric.assigned_count >= metric.deployed_count);
        }
    }

    /// Property: every merged record lands in exactly one bucket.
    #[test]
    fn partition_is_exhaustive_and_disjoint(
        phases in prop::collection::vec(phase_row(), 0..16),
        roster in prop::collection::btree_set(prop::sample::select(IDS), 0..3),
    ) {
        let normalizer = IdNormalizer::default();
        let out = merge(&phases, &[], &[], &normalizer);
        let exclusion: BTreeSet<CircuitId> =
            roster.iter().filter_map(|id| normalizer.normalize(id)).collect();
        let part = partition(&out.records, &default_segments(), &exclusion).unwrap();
        prop_assert_eq!(part.total(), out.records.len());

        let mut seen = BTreeSet::new();
        for (_, records) in &part.segments {
            for record in records {
                if let Some(id) = &record.circuit_id {
                    prop_assert!(seen.insert(id.clone()));
                    prop_assert!(!exclusion.contains(id));
                }
            }
        }
    }

    /// Property: merging identical feeds twice yields identical records.
    #[test]
    fn merge_is_deterministic(
        phases in prop::collection::vec(phase_row(), 0..12),
        sites in prop::collection::vec(site_row(), 0..12),
        tables in prop::collection::vec(status_table(), 0..2),
    ) {
        let normalizer = IdNormalizer::default();
        let first = merge(&phases, &sites, &tables, &normalizer);
        let second = merge(&phases, &sites, &tables, &normalizer);
        prop_assert_eq!(first.records.len(), second.records.len());
        prop_assert_eq!(first.records, second.records);
    }

    /// Property: imputed cells take the mean of parsed cells only.
    #[test]
    fn imputation_uses_parsed_mean(
        cells in prop::collection::vec(prop::option::of(0u32..1_000), 1..20),
    ) {
        let texts: Vec<Option<String>> = cells.iter().map(|c| c.map(|n| n.to_string())).collect();
        let column = normalize_column(texts.iter().map(|t| RawCost::from(t.as_deref())));
        let parsed: Vec<f64> = cells.iter().flatten().map(|n| f64::from(*n)).collect();

        if parsed.is_empty() {
            prop_assert!(column.values.iter().all(Option::is_none));
        } else {
            let mean = parsed.iter().sum::<f64>() / parsed.len() as f64;
            for (cell, value) in cells.iter().zip(&column.values) {
                match cell {
                    Some(n) => prop_assert_eq!(*value, Some(f64::from(*n))),
                    None => prop_assert_eq!(*value, Some(mean)),
                }
            }
        }
    }
}
