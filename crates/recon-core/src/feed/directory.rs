//! Directory-backed feed source.
//!
//! Each feed is the most recently modified delimited-text file in the feed
//! directory whose name carries the feed's prefix. Files are latin-1 encoded
//! and their headers vary between exports, so headers are normalized and
//! mapped onto canonical column names before rows are built.

use std::collections::BTreeMap;
use std::fs;
use std::path::{Path, PathBuf};
use std::sync::OnceLock;
use std::time::SystemTime;

use regex::Regex;
use tracing::{debug, info};

use crate::config::FeedConfig;
use crate::domain::{ReconError, ReconResult};
use crate::feed::{
    FeedKind, FeedSource, PhaseRow, SiteRow, VendorStatusRow, VendorStatusTable,
    VENDOR_STATUS_COLUMNS,
};

const CIRCUIT_ID: &str = "circuit_id";
const VENDOR: &str = "vendor";
const MONTHLY_COST: &str = "monthly_cost";
const LEGACY_MONTHLY_COST: &str = "legacy_monthly_cost";
const ONE_TIME_COST: &str = "one_time_cost";
const PHASE: &str = "phase";
const STATUS_TEXT: &str = "status_text";
const CUTOVER_COMPLETED: &str = "cutover_completed";
const STATUS_1: &str = "status_1";
const STATUS_2: &str = "status_2";
const COMPLETED_ON: &str = "completed_on";

/// Normalized header to canonical column.
const HEADER_ALIASES: &[(&str, &str)] = &[
    ("fdbid", CIRCUIT_ID),
    ("fdb_id", CIRCUIT_ID),
    ("fdb", CIRCUIT_ID),
    ("circuit_id", CIRCUIT_ID),
    ("new_vendor", VENDOR),
    ("new_provider", VENDOR),
    ("vendor", VENDOR),
    ("provider", VENDOR),
    ("mrc", MONTHLY_COST),
    ("monthly_cost", MONTHLY_COST),
    ("old_mrc", LEGACY_MONTHLY_COST),
    ("legacy_mrc", LEGACY_MONTHLY_COST),
    ("legacy_monthly_cost", LEGACY_MONTHLY_COST),
    ("nrc", ONE_TIME_COST),
    ("one_time_cost", ONE_TIME_COST),
    ("phase", PHASE),
    ("status", STATUS_TEXT),
    ("cutover_completed_date", CUTOVER_COMPLETED),
    ("circuit1_vdr_status", STATUS_1),
    ("vdr_status_1", STATUS_1),
    ("vendor_status", STATUS_1),
    ("vdr_status", STATUS_1),
    ("status_1", STATUS_1),
    ("circuit2_vdr_status", STATUS_2),
    ("vdr_status_2", STATUS_2),
    ("status_2", STATUS_2),
    ("date_truck_roll_2/msp_cmplt", COMPLETED_ON),
    ("completion_date", COMPLETED_ON),
    ("completed_on", COMPLETED_ON),
];

fn header_separators() -> Option<&'static Regex> {
    static SEPARATORS: OnceLock<Option<Regex>> = OnceLock::new();
    SEPARATORS
        .get_or_init(|| Regex::new(r"[\s_\-]+").ok())
        .as_ref()
}

/// Lowercase, trim, and collapse runs of whitespace, underscores and hyphens
/// to a single underscore.
pub fn normalize_header(raw: &str) -> String {
    let lowered = raw.trim().trim_start_matches('\u{feff}').to_lowercase();
    match header_separators() {
        Some(re) => re.replace_all(&lowered, "_").into_owned(),
        None => lowered.replace([' ', '-'], "_"),
    }
}

/// Canonical column for a raw header, if it is one the feeds use.
pub fn canonical_column(raw: &str) -> Option<&'static str> {
    let normalized = normalize_header(raw);
    HEADER_ALIASES
        .iter()
        .find(|(alias, _)| *alias == normalized)
        .map(|(_, canonical)| *canonical)
}

/// Decode latin-1 bytes. Every byte maps to the code point of the same value.
fn decode_latin1(bytes: &[u8]) -> String {
    bytes.iter().map(|&b| char::from(b)).collect()
}

/// Parsed delimited file keyed by canonical column.
#[derive(Debug)]
struct Table {
    columns: BTreeMap<&'static str, usize>,
    rows: Vec<csv::StringRecord>,
}

impl Table {
    fn parse(feed: &FeedKind, path: &Path, text: &str) -> ReconResult<Self> {
        let delimiter = match path.extension().and_then(|e| e.to_str()) {
            Some(ext) if ext.eq_ignore_ascii_case("tsv") => b'\t',
            _ => b',',
        };
        let mut reader = csv::ReaderBuilder::new()
            .delimiter(delimiter)
            .flexible(true)
            .from_reader(text.as_bytes());

        let malformed = |err: csv::Error| ReconError::MalformedFeed {
            feed: feed.clone(),
            detail: format!("{}: {err}", path.display()),
        };

        let mut columns = BTreeMap::new();
        for (idx, header) in reader.headers().map_err(malformed)?.iter().enumerate() {
            match canonical_column(header) {
                // First matching header wins when an export repeats a column.
                Some(column) => {
                    columns.entry(column).or_insert(idx);
                }
                None => debug!(feed = %feed, header = %header, "ignoring unmapped column"),
            }
        }

        let rows = reader
            .records()
            .collect::<Result<Vec<_>, _>>()
            .map_err(malformed)?;
        Ok(Self { columns, rows })
    }

    fn has(&self, column: &str) -> bool {
        self.columns.contains_key(column)
    }

    fn require(&self, feed: &FeedKind, column: &str) -> ReconResult<()> {
        if self.has(column) {
            Ok(())
        } else {
            Err(ReconError::MalformedFeed {
                feed: feed.clone(),
                detail: format!("no {column} column"),
            })
        }
    }

    fn cell(&self, row: &csv::StringRecord, column: &str) -> Option<String> {
        let idx = *self.columns.get(column)?;
        row.get(idx)
            .map(str::trim)
            .filter(|s| !s.is_empty())
            .map(str::to_string)
    }
}

/// Reads feeds from the latest matching files in a directory.
#[derive(Debug, Clone)]
pub struct DirectoryFeedSource {
    config: FeedConfig,
}

impl DirectoryFeedSource {
    pub fn new(config: FeedConfig) -> Self {
        Self { config }
    }

    pub fn dir(&self) -> &Path {
        &self.config.dir
    }

    fn period_label(&self) -> String {
        self.config
            .period
            .clone()
            .unwrap_or_else(|| "latest".to_string())
    }

    fn matches(&self, file_name: &str, prefix: &str) -> bool {
        let name = file_name.to_lowercase();
        let has_extension = [".csv", ".tsv", ".txt"].iter().any(|ext| name.ends_with(ext));
        let has_prefix = name.contains(&prefix.to_lowercase());
        let in_period = self
            .config
            .period
            .as_ref()
            .map_or(true, |p| name.contains(&p.to_lowercase()));
        let excluded = self
            .config
            .excluded_tokens
            .iter()
            .any(|t| name.contains(&t.to_lowercase()));
        has_extension && has_prefix && in_period && !excluded
    }

    /// Most recently modified matching file for `feed`; ties go to the
    /// lexicographically greatest name.
    pub fn latest_file(&self, feed: &FeedKind, prefix: &str) -> ReconResult<PathBuf> {
        let dir = &self.config.dir;
        let entries = fs::read_dir(dir).map_err(|e| ReconError::io(dir, e))?;

        let mut best: Option<(SystemTime, String, PathBuf)> = None;
        for entry in entries {
            let entry = entry.map_err(|e| ReconError::io(dir, e))?;
            let path = entry.path();
            if !path.is_file() {
                continue;
            }
            let Some(name) = path.file_name().and_then(|n| n.to_str()).map(str::to_string) else {
                continue;
            };
            if !self.matches(&name, prefix) {
                continue;
            }
            let modified = entry
                .metadata()
                .and_then(|m| m.modified())
                .map_err(|e| ReconError::io(&path, e))?;
            let candidate = (modified, name, path);
            if best
                .as_ref()
                .map_or(true, |b| (&candidate.0, &candidate.1) > (&b.0, &b.1))
            {
                best = Some(candidate);
            }
        }

        match best {
            Some((_, _, path)) => {
                info!(feed = %feed, path = %path.display(), "selected feed file");
                Ok(path)
            }
            None => Err(ReconError::MissingFeed {
                feed: feed.clone(),
                period: self.period_label(),
            }),
        }
    }

    fn load(&self, feed: &FeedKind, prefix: &str) -> ReconResult<Table> {
        let path = self.latest_file(feed, prefix)?;
        let bytes = fs::read(&path).map_err(|e| ReconError::io(&path, e))?;
        Table::parse(feed, &path, &decode_latin1(&bytes))
    }
}

impl FeedSource for DirectoryFeedSource {
    fn fetch_site_list(&self) -> ReconResult<Vec<SiteRow>> {
        let feed = FeedKind::SiteList;
        let table = self.load(&feed, &self.config.site_list_prefix)?;
        table.require(&feed, CIRCUIT_ID)?;
        Ok(table
            .rows
            .iter()
            .map(|row| SiteRow {
                circuit_id: table.cell(row, CIRCUIT_ID),
                vendor: table.cell(row, VENDOR),
                monthly_cost: table.cell(row, MONTHLY_COST),
                legacy_monthly_cost: table.cell(row, LEGACY_MONTHLY_COST),
                one_time_cost: table.cell(row, ONE_TIME_COST),
            })
            .collect())
    }

    fn fetch_phase_tracker(&self) -> ReconResult<Vec<PhaseRow>> {
        let feed = FeedKind::PhaseTracker;
        let table = self.load(&feed, &self.config.phase_tracker_prefix)?;
        table.require(&feed, CIRCUIT_ID)?;
        table.require(&feed, PHASE)?;
        Ok(table
            .rows
            .iter()
            .map(|row| PhaseRow {
                circuit_id: table.cell(row, CIRCUIT_ID),
                vendor: table.cell(row, VENDOR),
                phase: table.cell(row, PHASE),
                status_text: table.cell(row, STATUS_TEXT),
                cutover_completed: table.cell(row, CUTOVER_COMPLETED),
            })
            .collect())
    }

    fn fetch_vendor_status(&self, vendor: &str) -> ReconResult<VendorStatusTable> {
        let feed = FeedKind::VendorStatus(vendor.to_string());
        let prefix = self
            .config
            .vendors
            .iter()
            .find(|v| v.name == vendor)
            .map(|v| v.prefix.as_str())
            .ok_or_else(|| ReconError::Config(format!("no file prefix configured for vendor {vendor}")))?;
        let table = self.load(&feed, prefix)?;

        let rows = table
            .rows
            .iter()
            .map(|row| VendorStatusRow {
                circuit_id: table.cell(row, CIRCUIT_ID),
                status_1: table.cell(row, STATUS_1),
                status_2: table.cell(row, STATUS_2),
                completed_on: table.cell(row, COMPLETED_ON),
            })
            .collect();

        let mut out = VendorStatusTable::new(vendor, rows);
        for column in VENDOR_STATUS_COLUMNS.iter().filter(|c| !table.has(c)) {
            out = out.with_missing_column(*column);
        }
        Ok(out)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::VendorFeedConfig;
    use std::time::Duration;

    fn write(dir: &Path, name: &str, body: &[u8]) -> PathBuf {
        let path = dir.join(name);
        fs::write(&path, body).unwrap();
        path
    }

    fn touch_at(path: &Path, secs: u64) {
        let file = fs::File::options().write(true).open(path).unwrap();
        file.set_modified(SystemTime::UNIX_EPOCH + Duration::from_secs(secs))
            .unwrap();
    }

    fn source(dir: &Path) -> DirectoryFeedSource {
        DirectoryFeedSource::new(FeedConfig {
            dir: dir.to_path_buf(),
            vendors: vec![
                VendorFeedConfig::new("Hughes", "hughes_site_tracking"),
                VendorFeedConfig::new("Lumen", "lumen_site_tracking"),
            ],
            ..FeedConfig::default()
        })
    }

    #[test]
    fn test_normalize_header() {
        assert_eq!(normalize_header("  FDB ID "), "fdb_id");
        assert_eq!(normalize_header("Circuit1_Vdr_Status"), "circuit1_vdr_status");
        assert_eq!(normalize_header("Cutover - Completed  Date"), "cutover_completed_date");
        assert_eq!(canonical_column("Date_Truck Roll 2/MSP_Cmplt"), Some(COMPLETED_ON));
        assert_eq!(canonical_column("New Provider"), Some(VENDOR));
        assert_eq!(canonical_column("Notes"), None);
    }

    #[test]
    fn test_latest_file_by_mtime_skips_excluded() {
        let tmp = tempfile::tempdir().unwrap();
        let old = write(tmp.path(), "site_list_2025_01.csv", b"FDBID\n1\n");
        let new = write(tmp.path(), "site_list_2025_02.csv", b"FDBID\n2\n");
        let leo = write(tmp.path(), "site_list_leo_2025_03.csv", b"FDBID\n3\n");
        touch_at(&old, 1_000);
        touch_at(&new, 2_000);
        touch_at(&leo, 3_000);

        let src = source(tmp.path());
        assert_eq!(src.latest_file(&FeedKind::SiteList, "site_list").unwrap(), new);
        let rows = src.fetch_site_list().unwrap();
        assert_eq!(rows[0].circuit_id.as_deref(), Some("2"));
    }

    #[test]
    fn test_period_token_restricts_candidates() {
        let tmp = tempfile::tempdir().unwrap();
        let jan = write(tmp.path(), "tipne_2025_01.csv", b"FDBID,Phase\n1,2\n");
        let feb = write(tmp.path(), "tipne_2025_02.csv", b"FDBID,Phase\n2,2\n");
        touch_at(&jan, 1_000);
        touch_at(&feb, 2_000);

        let mut config = source(tmp.path()).config;
        config.period = Some("2025_01".to_string());
        let src = DirectoryFeedSource::new(config);
        assert_eq!(src.latest_file(&FeedKind::PhaseTracker, "tipne").unwrap(), jan);

        let mut config = src.config.clone();
        config.period = Some("2024_12".to_string());
        let err = DirectoryFeedSource::new(config)
            .fetch_phase_tracker()
            .unwrap_err();
        match err {
            ReconError::MissingFeed { feed, period } => {
                assert_eq!(feed, FeedKind::PhaseTracker);
                assert_eq!(period, "2024_12");
            }
            other => panic!("unexpected error: {other}"),
        }
    }

    #[test]
    fn test_site_list_latin1_and_aliases() {
        let tmp = tempfile::tempdir().unwrap();
        let mut body = b"FDB_ID,New_Vendor,MRC,Old_MRC,NRC\n1589779,Soci\xe9t\xe9,\"$1,200.00\",900,\n".to_vec();
        body.extend_from_slice(b"TBD,Lumen,-,,50\n");
        write(tmp.path(), "site_list.csv", &body);

        let rows = source(tmp.path()).fetch_site_list().unwrap();
        assert_eq!(rows.len(), 2);
        assert_eq!(rows[0].vendor.as_deref(), Some("Soci\u{e9}t\u{e9}"));
        assert_eq!(rows[0].monthly_cost.as_deref(), Some("$1,200.00"));
        assert_eq!(rows[0].one_time_cost, None);
        assert_eq!(rows[1].circuit_id.as_deref(), Some("TBD"));
    }

    #[test]
    fn test_site_list_without_id_column_is_malformed() {
        let tmp = tempfile::tempdir().unwrap();
        write(tmp.path(), "site_list.csv", b"Vendor,MRC\nLumen,10\n");
        assert!(matches!(
            source(tmp.path()).fetch_site_list(),
            Err(ReconError::MalformedFeed { .. })
        ));
    }

    #[test]
    fn test_vendor_extract_reports_missing_columns() {
        let tmp = tempfile::tempdir().unwrap();
        write(
            tmp.path(),
            "hughes_site_tracking.csv",
            b"FDB ID,Vendor_Status,Date_Truck Roll 2/MSP_Cmplt\n7,Complete,2025-03-01\n",
        );
        let table = source(tmp.path()).fetch_vendor_status("Hughes").unwrap();
        assert_eq!(table.missing_columns, vec![STATUS_2.to_string()]);
        assert_eq!(table.rows[0].status_1.as_deref(), Some("Complete"));
        assert_eq!(table.rows[0].completed_on.as_deref(), Some("2025-03-01"));
    }

    #[test]
    fn test_missing_vendor_file() {
        let tmp = tempfile::tempdir().unwrap();
        let err = source(tmp.path()).fetch_vendor_status("Lumen").unwrap_err();
        assert!(err.to_string().contains("vendor_status:Lumen"));
        assert!(err.to_string().contains("latest"));
    }

    #[test]
    fn test_unknown_vendor_is_config_error() {
        let tmp = tempfile::tempdir().unwrap();
        assert!(matches!(
            source(tmp.path()).fetch_vendor_status("Nobody"),
            Err(ReconError::Config(_))
        ));
    }
}
