//! Run configuration.
//!
//! Loaded from a TOML file at run start. Resolution order for the feed
//! directory and period: CLI flag > environment variable > config file >
//! built-in default. The exclusion roster is operational data and lives here
//! (inline or in a separate newline-delimited file), never in code.

use std::collections::{BTreeMap, BTreeSet};
use std::path::{Path, PathBuf};

use chrono::NaiveDate;
use serde::{Deserialize, Serialize};
use tracing::{debug, info};

use crate::classifier::StatusSource;
use crate::domain::circuit::DEFAULT_PLACEHOLDER_IDS;
use crate::domain::{CircuitId, IdNormalizer, Phase, ReconError, ReconResult};
use crate::segment::{SegmentDefinition, SegmentKind};

/// Environment variable overriding [`FeedConfig::dir`].
pub const ENV_FEED_DIR: &str = "RECON_FEED_DIR";
/// Environment variable overriding [`FeedConfig::period`].
pub const ENV_PERIOD: &str = "RECON_PERIOD";

/// File-name prefix of one vendor's status extract.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct VendorFeedConfig {
    pub name: String,
    pub prefix: String,
}

impl VendorFeedConfig {
    pub fn new(name: &str, prefix: &str) -> Self {
        Self {
            name: name.to_string(),
            prefix: prefix.to_string(),
        }
    }
}

/// Where and how to find feed files.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(default)]
pub struct FeedConfig {
    pub dir: PathBuf,
    pub site_list_prefix: String,
    pub phase_tracker_prefix: String,
    /// Vendor status extracts, fetched and unioned in this order.
    pub vendors: Vec<VendorFeedConfig>,
    /// File names containing any of these tokens are never picked.
    pub excluded_tokens: Vec<String>,
    /// When set, only files whose name contains this token are picked.
    pub period: Option<String>,
}

impl Default for FeedConfig {
    fn default() -> Self {
        Self {
            dir: PathBuf::from("."),
            site_list_prefix: "site_list".to_string(),
            phase_tracker_prefix: "tipne".to_string(),
            vendors: vec![
                VendorFeedConfig::new("Granite", "Granite_site_tracking_special_projects"),
                VendorFeedConfig::new("Lumen", "Lumen_site_tracking_sp"),
                VendorFeedConfig::new("Comcast", "Comcast_site_tracking"),
                VendorFeedConfig::new("Verizon", "Verizon_site_tracking"),
                VendorFeedConfig::new("Hughes", "Hughes_site_tracking"),
                VendorFeedConfig::new("MSP", "msp"),
            ],
            excluded_tokens: vec!["leo".to_string()],
            period: None,
        }
    }
}

impl FeedConfig {
    pub fn vendor_names(&self) -> Vec<String> {
        self.vendors.iter().map(|v| v.name.clone()).collect()
    }

    /// Vendor name to file prefix.
    pub fn vendor_prefixes(&self) -> BTreeMap<String, String> {
        self.vendors
            .iter()
            .map(|v| (v.name.clone(), v.prefix.clone()))
            .collect()
    }
}

/// Roster entry: rosters are often pasted as bare integers.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(untagged)]
pub enum RosterEntry {
    Number(u64),
    Text(String),
}

impl RosterEntry {
    fn as_text(&self) -> String {
        match self {
            RosterEntry::Number(n) => n.to_string(),
            RosterEntry::Text(s) => s.clone(),
        }
    }
}

/// Top-level configuration.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct ReconConfig {
    pub feeds: FeedConfig,
    /// Circuits handled under the special program.
    pub exclusion_roster: Vec<RosterEntry>,
    /// Newline-delimited roster file, merged with `exclusion_roster`.
    /// Relative paths resolve against the config file's directory.
    pub exclusion_roster_file: Option<PathBuf>,
    /// Identifier markers treated as "no identifier".
    pub placeholder_ids: Vec<String>,
    pub segments: Vec<SegmentDefinition>,
    /// Cutover date given to deployed circuits that report none.
    pub cutover_date_fallback: Option<NaiveDate>,
}

impl Default for ReconConfig {
    fn default() -> Self {
        Self {
            feeds: FeedConfig::default(),
            exclusion_roster: Vec::new(),
            exclusion_roster_file: None,
            placeholder_ids: DEFAULT_PLACEHOLDER_IDS
                .iter()
                .map(|s| s.to_string())
                .collect(),
            segments: default_segments(),
            cutover_date_fallback: NaiveDate::from_ymd_opt(2025, 1, 1),
        }
    }
}

/// Segment layout of the quarterly vendor report.
pub fn default_segments() -> Vec<SegmentDefinition> {
    vec![
        SegmentDefinition::special_program("special_program"),
        SegmentDefinition::phases("plant", ["2"]),
        SegmentDefinition::phases("phase_4", ["4"]),
        SegmentDefinition::phases("leo", ["LEO"]),
        SegmentDefinition::phases("legacy_phases", ["1", "3", "SP"]),
    ]
}

impl ReconConfig {
    /// Parse and validate TOML text. Relative roster paths stay relative.
    pub fn from_toml_str(text: &str) -> ReconResult<Self> {
        let config: ReconConfig = toml::from_str(text)?;
        config.validate()?;
        Ok(config)
    }

    /// Load a config file, resolving a relative roster path against its directory.
    pub fn load(path: &Path) -> ReconResult<Self> {
        let text = std::fs::read_to_string(path).map_err(|e| ReconError::io(path, e))?;
        let mut config = Self::from_toml_str(&text)?;
        if let (Some(roster), Some(parent)) = (&config.exclusion_roster_file, path.parent()) {
            if roster.is_relative() {
                config.exclusion_roster_file = Some(parent.join(roster));
            }
        }
        info!(path = %path.display(), segments = config.segments.len(), "configuration loaded");
        Ok(config)
    }

    /// Apply overrides from a variable lookup (normally `std::env::var`).
    pub fn apply_overrides<F>(&mut self, lookup: F)
    where
        F: Fn(&str) -> Option<String>,
    {
        if let Some(dir) = lookup(ENV_FEED_DIR).filter(|v| !v.trim().is_empty()) {
            debug!(dir = %dir, "feed directory overridden from environment");
            self.feeds.dir = PathBuf::from(dir);
        }
        if let Some(period) = lookup(ENV_PERIOD).filter(|v| !v.trim().is_empty()) {
            debug!(period = %period, "feed period overridden from environment");
            self.feeds.period = Some(period);
        }
    }

    /// Apply `RECON_FEED_DIR` / `RECON_PERIOD` from the process environment.
    pub fn apply_env_overrides(&mut self) {
        self.apply_overrides(|key| std::env::var(key).ok());
    }

    pub fn id_normalizer(&self) -> IdNormalizer {
        IdNormalizer::new(&self.placeholder_ids)
    }

    /// Build the exclusion set: inline roster plus the roster file, each
    /// entry normalized like any feed identifier.
    pub fn exclusion_set(&self) -> ReconResult<BTreeSet<CircuitId>> {
        let normalizer = self.id_normalizer();
        let mut ids: BTreeSet<CircuitId> = self
            .exclusion_roster
            .iter()
            .filter_map(|entry| normalizer.normalize(&entry.as_text()))
            .collect();

        if let Some(path) = &self.exclusion_roster_file {
            let text = std::fs::read_to_string(path).map_err(|e| ReconError::io(path, e))?;
            ids.extend(parse_roster(&text, &normalizer));
        }

        debug!(size = ids.len(), "exclusion roster loaded");
        Ok(ids)
    }

    pub fn segment(&self, name: &str) -> ReconResult<&SegmentDefinition> {
        self.segments
            .iter()
            .find(|s| s.name == name)
            .ok_or_else(|| ReconError::UnknownSegment(name.to_string()))
    }

    /// Check segment layout and feed settings.
    pub fn validate(&self) -> ReconResult<()> {
        if self.segments.is_empty() {
            return Err(ReconError::Config("at least one segment is required".to_string()));
        }
        validate_segments(&self.segments)?;

        let mut vendor_names = BTreeSet::new();
        for vendor in &self.feeds.vendors {
            if vendor.prefix.trim().is_empty() {
                return Err(ReconError::Config(format!(
                    "vendor feed {} has an empty file prefix",
                    vendor.name
                )));
            }
            if !vendor_names.insert(vendor.name.as_str()) {
                return Err(ReconError::Config(format!(
                    "vendor feed {} is listed twice",
                    vendor.name
                )));
            }
        }
        Ok(())
    }
}

/// Segment names must be unique, phase segments must name at least one phase,
/// no phase may belong to two segments, and there is at most one
/// special-program segment.
pub fn validate_segments(segments: &[SegmentDefinition]) -> ReconResult<()> {
    let mut names = BTreeSet::new();
    let mut owners: BTreeMap<&Phase, &str> = BTreeMap::new();
    let mut special = None;

    for segment in segments {
        if !names.insert(segment.name.as_str()) {
            return Err(ReconError::DuplicateSegment(segment.name.clone()));
        }
        match segment.kind {
            SegmentKind::Phases => {
                if segment.phases.is_empty() {
                    return Err(ReconError::Config(format!(
                        "segment {} has no phases",
                        segment.name
                    )));
                }
                for phase in &segment.phases {
                    if let Some(first) = owners.insert(phase, segment.name.as_str()) {
                        return Err(ReconError::OverlappingSegments {
                            phase: phase.to_string(),
                            first: first.to_string(),
                            second: segment.name.clone(),
                        });
                    }
                }
            }
            SegmentKind::SpecialProgram => {
                if let Some(first) = special.replace(segment.name.as_str()) {
                    return Err(ReconError::Config(format!(
                        "only one special-program segment is allowed ({first}, {})",
                        segment.name
                    )));
                }
                if segment.status_source == StatusSource::Tracker {
                    debug!(
                        segment = %segment.name,
                        "special-program segment classifies from tracker status"
                    );
                }
            }
        }
    }
    Ok(())
}

/// Parse a roster file: one identifier per line, `#` comments and commas allowed.
pub fn parse_roster(text: &str, normalizer: &IdNormalizer) -> Vec<CircuitId> {
    text.lines()
        .map(|line| line.split('#').next().unwrap_or(""))
        .flat_map(|line| line.split(','))
        .filter_map(|token| normalizer.normalize(token))
        .collect()
}
