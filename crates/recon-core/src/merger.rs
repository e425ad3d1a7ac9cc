//! Record merger.
//!
//! Joins the phase tracker, the site list and the unioned vendor status
//! extracts into one record per circuit:
//!
//! 1. identifiers from every feed go through the same [`IdNormalizer`];
//! 2. site-list cost columns are parsed and mean-imputed as whole columns;
//! 3. vendor extracts are unioned into one status index keyed by circuit;
//! 4. tracker rows are collapsed by circuit and left-joined onto the site and
//!    status indexes. Tracker rows without a site entry keep null costs.
//!
//! The special program is reconciled separately from the site list and the
//! vendor extracts, see [`PreparedFeeds::special_program_records`].

use std::collections::{BTreeMap, BTreeSet};

use chrono::NaiveDate;
use tracing::debug;

use crate::cost::{normalize_column, RawCost};
use crate::domain::{
    CircuitCosts, CircuitId, CircuitRecord, Diagnostic, DiagnosticKind, Diagnostics, IdNormalizer,
    Phase,
};
use crate::feed::{FeedKind, FeedSnapshot, PhaseRow, SiteRow, VendorStatusTable};
use crate::obs;

// Two-digit years first: `%Y` would read "25" as year 25.
const DATE_FORMATS: &[&str] = &["%Y-%m-%d", "%m/%d/%y", "%m/%d/%Y", "%Y/%m/%d"];

/// Parse a feed date. Time-of-day suffixes are ignored; unparseable text is `None`.
pub fn parse_feed_date(raw: &str) -> Option<NaiveDate> {
    let date_part = raw.trim().split([' ', 'T']).next()?;
    DATE_FORMATS
        .iter()
        .find_map(|fmt| NaiveDate::parse_from_str(date_part, fmt).ok())
}

fn clean(cell: &Option<String>) -> Option<String> {
    cell.as_deref()
        .map(str::trim)
        .filter(|s| !s.is_empty())
        .map(str::to_string)
}

/// Site-list entry after cost normalization.
#[derive(Debug, Clone, PartialEq)]
struct SiteEntry {
    id: CircuitId,
    vendor: Option<String>,
    costs: CircuitCosts,
}

/// Collapsed tracker entry.
#[derive(Debug, Clone, PartialEq)]
struct TrackerEntry {
    id: Option<CircuitId>,
    vendor: Option<String>,
    phase: Option<Phase>,
    status: Option<String>,
    cutover: Option<NaiveDate>,
}

impl TrackerEntry {
    /// Fill fields this entry lacks from a later duplicate.
    fn absorb(&mut self, other: TrackerEntry) {
        self.vendor = self.vendor.take().or(other.vendor);
        self.phase = self.phase.take().or(other.phase);
        self.status = self.status.take().or(other.status);
        self.cutover = self.cutover.max(other.cutover);
    }
}

/// Union of all vendor status rows for one circuit.
#[derive(Debug, Clone, Default, PartialEq)]
struct StatusEntry {
    statuses: Vec<String>,
    completed_on: Option<NaiveDate>,
}

/// Output of a merge: records plus the recoverable conditions met on the way.
#[derive(Debug, Clone, Default)]
pub struct MergeOutput {
    pub records: Vec<CircuitRecord>,
    pub diagnostics: Diagnostics,
}

/// Feeds normalized and indexed by circuit, ready to be joined.
#[derive(Debug, Clone)]
pub struct PreparedFeeds {
    sites: Vec<SiteEntry>,
    site_index: BTreeMap<CircuitId, usize>,
    tracker: Vec<TrackerEntry>,
    tracker_index: BTreeMap<CircuitId, usize>,
    statuses: BTreeMap<CircuitId, StatusEntry>,
    diagnostics: Diagnostics,
}

impl PreparedFeeds {
    pub fn prepare(snapshot: &FeedSnapshot, normalizer: &IdNormalizer) -> Self {
        Self::from_parts(
            &snapshot.phase_tracker,
            &snapshot.site_list,
            &snapshot.vendor_status,
            normalizer,
        )
    }

    pub fn from_parts(
        phase_rows: &[PhaseRow],
        site_rows: &[SiteRow],
        status_tables: &[VendorStatusTable],
        normalizer: &IdNormalizer,
    ) -> Self {
        let mut diagnostics = Diagnostics::new();
        let (sites, site_index) = prepare_sites(site_rows, normalizer, &mut diagnostics);
        let (tracker, tracker_index) = prepare_tracker(phase_rows, normalizer, &mut diagnostics);
        let statuses = union_vendor_status(status_tables, normalizer, &mut diagnostics);
        Self {
            sites,
            site_index,
            tracker,
            tracker_index,
            statuses,
            diagnostics,
        }
    }

    pub fn diagnostics(&self) -> &Diagnostics {
        &self.diagnostics
    }

    fn site(&self, id: &CircuitId) -> Option<&SiteEntry> {
        self.site_index.get(id).map(|&idx| &self.sites[idx])
    }

    fn tracker_entry(&self, id: &CircuitId) -> Option<&TrackerEntry> {
        self.tracker_index.get(id).map(|&idx| &self.tracker[idx])
    }

    fn attach_statuses(&self, record: &mut CircuitRecord, tracker_cutover: Option<NaiveDate>) {
        let status = record
            .circuit_id
            .as_ref()
            .and_then(|id| self.statuses.get(id));
        if let Some(status) = status {
            record.vendor_statuses = status.statuses.clone();
        }
        record.cutover_date = tracker_cutover.or(status.and_then(|s| s.completed_on));
    }

    /// One record per tracker circuit, left-joined onto site costs and
    /// vendor statuses. Tracker rows without an identifier are kept, one
    /// record each, and join nothing.
    pub fn merged_records(&self) -> Vec<CircuitRecord> {
        let records: Vec<CircuitRecord> = self
            .tracker
            .iter()
            .map(|entry| {
                let mut record = CircuitRecord::new(entry.id.clone());
                record.phase = entry.phase.clone();
                record.status_text = entry.status.clone();

                let site = entry.id.as_ref().and_then(|id| self.site(id));
                record.vendor = entry
                    .vendor
                    .clone()
                    .or_else(|| site.and_then(|s| s.vendor.clone()));
                if let Some(site) = site {
                    record.set_costs(site.costs);
                }
                self.attach_statuses(&mut record, entry.cutover);
                record
            })
            .collect();

        obs::emit_merge_completed("tracker", records.len(), self.diagnostics.len());
        records
    }

    /// Records for circuits on the exclusion roster.
    ///
    /// Starts from the site list (roster circuits are costed there even when
    /// the tracker lags), adds roster circuits only the tracker knows, and
    /// joins vendor statuses directly. Vendor attribution prefers the site
    /// list.
    pub fn special_program_records(&self, exclusion_ids: &BTreeSet<CircuitId>) -> Vec<CircuitRecord> {
        let mut records = Vec::new();
        let mut seen = BTreeSet::new();

        for site in self.sites.iter().filter(|s| exclusion_ids.contains(&s.id)) {
            let tracker = self.tracker_entry(&site.id);
            let mut record = CircuitRecord::new(Some(site.id.clone())).with_costs(site.costs);
            record.vendor = site
                .vendor
                .clone()
                .or_else(|| tracker.and_then(|t| t.vendor.clone()));
            record.phase = tracker.and_then(|t| t.phase.clone());
            record.status_text = tracker.and_then(|t| t.status.clone());
            self.attach_statuses(&mut record, tracker.and_then(|t| t.cutover));
            seen.insert(site.id.clone());
            records.push(record);
        }

        for entry in &self.tracker {
            let Some(id) = entry.id.as_ref() else {
                continue;
            };
            if !exclusion_ids.contains(id) || seen.contains(id) {
                continue;
            }
            let mut record = CircuitRecord::new(Some(id.clone()));
            record.vendor = entry.vendor.clone();
            record.phase = entry.phase.clone();
            record.status_text = entry.status.clone();
            self.attach_statuses(&mut record, entry.cutover);
            records.push(record);
        }

        obs::emit_merge_completed("special_program", records.len(), self.diagnostics.len());
        records
    }
}

/// Merge the three feeds into one record per tracker circuit.
pub fn merge(
    phase_rows: &[PhaseRow],
    site_rows: &[SiteRow],
    status_tables: &[VendorStatusTable],
    normalizer: &IdNormalizer,
) -> MergeOutput {
    let prepared = PreparedFeeds::from_parts(phase_rows, site_rows, status_tables, normalizer);
    MergeOutput {
        records: prepared.merged_records(),
        diagnostics: prepared.diagnostics.clone(),
    }
}

fn summarize_absent_ids(feed: &FeedKind, count: usize, diagnostics: &mut Diagnostics) {
    if count > 0 {
        diagnostics.push(Diagnostic::new(
            DiagnosticKind::AbsentIdentifier,
            feed.to_string(),
            format!("{count} row(s) without a usable circuit identifier"),
        ));
    }
}

fn summarize_duplicates(feed: &FeedKind, count: usize, diagnostics: &mut Diagnostics) {
    if count > 0 {
        diagnostics.push(Diagnostic::new(
            DiagnosticKind::DuplicateCollapsed,
            feed.to_string(),
            format!("{count} duplicate row(s) collapsed by circuit identifier"),
        ));
    }
}

fn prepare_sites(
    rows: &[SiteRow],
    normalizer: &IdNormalizer,
    diagnostics: &mut Diagnostics,
) -> (Vec<SiteEntry>, BTreeMap<CircuitId, usize>) {
    let feed = FeedKind::SiteList;
    let columns = [
        ("monthly_cost", normalize_column(rows.iter().map(|r| RawCost::from(r.monthly_cost.as_deref())))),
        (
            "legacy_monthly_cost",
            normalize_column(rows.iter().map(|r| RawCost::from(r.legacy_monthly_cost.as_deref()))),
        ),
        ("one_time_cost", normalize_column(rows.iter().map(|r| RawCost::from(r.one_time_cost.as_deref())))),
    ];

    for (name, column) in &columns {
        for &idx in &column.unparseable {
            let mut diag = Diagnostic::new(
                DiagnosticKind::UnparseableValue,
                feed.to_string(),
                format!(
                    "{name} {:?} unparseable, imputed {:?}",
                    rows[idx].cost_cell(name),
                    column.fill
                ),
            );
            if let Some(id) = normalizer.normalize_opt(rows[idx].circuit_id.as_deref()) {
                diag = diag.with_circuit(id.as_str());
            }
            diagnostics.push(diag);
        }
        if !column.imputed.is_empty() {
            debug!(column = *name, imputed = column.imputed.len(), fill = ?column.fill, "cost column imputed");
        }
    }
    let [(_, monthly), (_, legacy), (_, one_time)] = columns;

    let mut sites = Vec::new();
    let mut index = BTreeMap::new();
    let mut absent = 0usize;
    let mut duplicates = 0usize;

    for (idx, row) in rows.iter().enumerate() {
        let Some(id) = normalizer.normalize_opt(row.circuit_id.as_deref()) else {
            absent += 1;
            continue;
        };
        if index.contains_key(&id) {
            duplicates += 1;
            continue;
        }
        index.insert(id.clone(), sites.len());
        sites.push(SiteEntry {
            id,
            vendor: clean(&row.vendor),
            costs: CircuitCosts::from_monthly(
                monthly.values[idx],
                legacy.values[idx],
                one_time.values[idx],
            ),
        });
    }

    summarize_absent_ids(&feed, absent, diagnostics);
    summarize_duplicates(&feed, duplicates, diagnostics);
    (sites, index)
}

impl SiteRow {
    fn cost_cell(&self, column: &str) -> Option<&str> {
        match column {
            "monthly_cost" => self.monthly_cost.as_deref(),
            "legacy_monthly_cost" => self.legacy_monthly_cost.as_deref(),
            _ => self.one_time_cost.as_deref(),
        }
    }
}

fn prepare_tracker(
    rows: &[PhaseRow],
    normalizer: &IdNormalizer,
    diagnostics: &mut Diagnostics,
) -> (Vec<TrackerEntry>, BTreeMap<CircuitId, usize>) {
    let feed = FeedKind::PhaseTracker;
    let mut entries: Vec<TrackerEntry> = Vec::new();
    let mut index: BTreeMap<CircuitId, usize> = BTreeMap::new();
    let mut absent = 0usize;
    let mut duplicates = 0usize;

    for row in rows {
        let entry = TrackerEntry {
            id: normalizer.normalize_opt(row.circuit_id.as_deref()),
            vendor: clean(&row.vendor),
            phase: row.phase.as_deref().and_then(Phase::parse),
            status: clean(&row.status_text),
            cutover: row.cutover_completed.as_deref().and_then(parse_feed_date),
        };

        let Some(id) = entry.id.clone() else {
            absent += 1;
            entries.push(entry);
            continue;
        };

        match index.get(&id) {
            Some(&existing) => {
                duplicates += 1;
                let kept = &mut entries[existing];
                if let (Some(a), Some(b)) = (&kept.phase, &entry.phase) {
                    if a != b {
                        diagnostics.push(
                            Diagnostic::new(
                                DiagnosticKind::DuplicateCollapsed,
                                feed.to_string(),
                                format!("conflicting phases {a} and {b}; keeping {a}"),
                            )
                            .with_circuit(id.as_str()),
                        );
                    }
                }
                kept.absorb(entry);
            }
            None => {
                index.insert(id, entries.len());
                entries.push(entry);
            }
        }
    }

    summarize_absent_ids(&feed, absent, diagnostics);
    summarize_duplicates(&feed, duplicates, diagnostics);
    (entries, index)
}

/// Union every vendor extract into one status index.
///
/// Missing columns are reported and read as null; rows with no status text
/// or no usable identifier are dropped; several rows for one circuit pool
/// their statuses.
fn union_vendor_status(
    tables: &[VendorStatusTable],
    normalizer: &IdNormalizer,
    diagnostics: &mut Diagnostics,
) -> BTreeMap<CircuitId, StatusEntry> {
    let mut index: BTreeMap<CircuitId, StatusEntry> = BTreeMap::new();

    for table in tables {
        let feed = FeedKind::VendorStatus(table.vendor.clone());
        for column in &table.missing_columns {
            diagnostics.push(Diagnostic::new(
                DiagnosticKind::SchemaMismatch,
                feed.to_string(),
                format!("column {column} missing; treated as null"),
            ));
        }

        let mut absent = 0usize;
        let mut empty = 0usize;
        for row in &table.rows {
            let statuses: Vec<String> = row.statuses().map(|s| s.trim().to_string()).collect();
            if statuses.is_empty() {
                empty += 1;
                continue;
            }
            let Some(id) = normalizer.normalize_opt(row.circuit_id.as_deref()) else {
                absent += 1;
                continue;
            };
            let entry = index.entry(id).or_default();
            for status in statuses {
                if !entry.statuses.contains(&status) {
                    entry.statuses.push(status);
                }
            }
            let completed = row.completed_on.as_deref().and_then(parse_feed_date);
            entry.completed_on = entry.completed_on.max(completed);
        }

        if empty > 0 {
            debug!(feed = %feed, rows = empty, "vendor rows without status dropped");
        }
        summarize_absent_ids(&feed, absent, diagnostics);
    }

    index
}
