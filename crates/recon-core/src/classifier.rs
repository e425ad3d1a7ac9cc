//! Status classification tables.
//!
//! Free-text status strings are mapped to a [`LifecycleState`] by a
//! [`PatternTable`]: an ordered list of lower-case substrings, each tagged with
//! the state it implies. When several patterns match, the most advanced state
//! wins. The phase tracker and the vendor extracts use different vocabularies,
//! so each has its own table; a [`Classifier`] holds both and ORs them per
//! [`StatusSource`].

use std::sync::OnceLock;

use serde::{Deserialize, Serialize};

use crate::domain::{CircuitRecord, LifecycleState};

/// A single `{pattern -> state}` entry.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct StatusPattern {
    /// Lower-case substring searched for in the normalized status text.
    pub pattern: String,
    pub state: LifecycleState,
}

impl StatusPattern {
    pub fn new(pattern: &str, state: LifecycleState) -> Self {
        Self {
            pattern: pattern.trim().to_lowercase(),
            state,
        }
    }
}

const IN_PROGRESS_VOCABULARY: &[&str] = &[
    "in progress",
    "pending",
    "scheduled",
    "install",
    "ordered",
    "order placed",
    "provisioning",
    "site survey",
    "construction",
    "truck roll",
];

const ASSIGNED_VOCABULARY: &[&str] = &["assigned", "awarded", "not started", "kickoff", "kick off"];

/// Ordered pattern table for one status vocabulary.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct PatternTable {
    pub name: String,
    pub patterns: Vec<StatusPattern>,
}

impl PatternTable {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            patterns: Vec::new(),
        }
    }

    /// Add a pattern (builder pattern).
    pub fn with_pattern(mut self, pattern: &str, state: LifecycleState) -> Self {
        self.patterns.push(StatusPattern::new(pattern, state));
        self
    }

    fn with_vocabulary(self, words: &[&str], state: LifecycleState) -> Self {
        words
            .iter()
            .fold(self, |table, word| table.with_pattern(word, state))
    }

    /// Vocabulary of the phase tracker's `status` column.
    ///
    /// Only the cutover milestones count as deployed; a bare "complete"
    /// elsewhere in tracker text (e.g. "Survey Complete") does not.
    pub fn tracker() -> Self {
        Self::new("tracker")
            .with_pattern("cutover complete", LifecycleState::Deployed)
            .with_pattern("cutover one circuit only", LifecycleState::Deployed)
            .with_pattern("cutover full - complete", LifecycleState::Deployed)
            .with_pattern("cutover mc complete", LifecycleState::Deployed)
            .with_vocabulary(IN_PROGRESS_VOCABULARY, LifecycleState::InProgress)
            .with_vocabulary(ASSIGNED_VOCABULARY, LifecycleState::Assigned)
    }

    /// Vocabulary of the per-vendor status extracts, where vendors mark
    /// finished circuits with a generic "complete".
    pub fn vendor() -> Self {
        Self::new("vendor")
            .with_pattern("complete", LifecycleState::Deployed)
            .with_vocabulary(IN_PROGRESS_VOCABULARY, LifecycleState::InProgress)
            .with_vocabulary(ASSIGNED_VOCABULARY, LifecycleState::Assigned)
    }

    /// The pattern that decides the classification of `status_text`, if any.
    pub fn explain(&self, status_text: &str) -> Option<&StatusPattern> {
        let normalized = status_text.trim().to_lowercase();
        if normalized.is_empty() {
            return None;
        }
        self.patterns
            .iter()
            .filter(|p| normalized.contains(p.pattern.as_str()))
            // first pattern wins among equals so table order stays meaningful
            .fold(None, |best: Option<&StatusPattern>, p| match best {
                Some(b) if b.state >= p.state => Some(b),
                _ => Some(p),
            })
    }

    /// Classify one status string. Empty or unmatched text is `Unknown`.
    pub fn classify(&self, status_text: &str) -> LifecycleState {
        self.explain(status_text)
            .map(|p| p.state)
            .unwrap_or(LifecycleState::Unknown)
    }

    /// OR over several optional fields: the most advanced state wins.
    pub fn classify_any<'a, I>(&self, fields: I) -> LifecycleState
    where
        I: IntoIterator<Item = Option<&'a str>>,
    {
        fields
            .into_iter()
            .flatten()
            .map(|text| self.classify(text))
            .max()
            .unwrap_or(LifecycleState::Unknown)
    }
}

fn default_tracker_table() -> &'static PatternTable {
    static TABLE: OnceLock<PatternTable> = OnceLock::new();
    TABLE.get_or_init(PatternTable::tracker)
}

/// Classify tracker status text with the standard tracker table.
pub fn classify(status_text: &str) -> LifecycleState {
    default_tracker_table().classify(status_text)
}

/// Which status fields decide a circuit's lifecycle state.
#[derive(Debug, Clone, Copy, Default, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum StatusSource {
    /// The phase tracker's status column.
    #[default]
    Tracker,
    /// The vendor extract status fields only.
    Vendor,
    /// Either source; a deployed match on any field suffices.
    Either,
}

/// Pair of pattern tables applied to merged records.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct Classifier {
    pub tracker: PatternTable,
    pub vendor: PatternTable,
}

impl Default for Classifier {
    fn default() -> Self {
        Self::standard()
    }
}

impl Classifier {
    pub fn standard() -> Self {
        Self {
            tracker: PatternTable::tracker(),
            vendor: PatternTable::vendor(),
        }
    }

    pub fn classify_tracker(&self, record: &CircuitRecord) -> LifecycleState {
        self.tracker
            .classify_any(std::iter::once(record.status_text.as_deref()))
    }

    pub fn classify_vendor(&self, record: &CircuitRecord) -> LifecycleState {
        self.vendor
            .classify_any(record.vendor_statuses.iter().map(|s| Some(s.as_str())))
    }

    /// Classify a record using the fields selected by `source`.
    pub fn classify_record(&self, record: &CircuitRecord, source: StatusSource) -> LifecycleState {
        match source {
            StatusSource::Tracker => self.classify_tracker(record),
            StatusSource::Vendor => self.classify_vendor(record),
            StatusSource::Either => self
                .classify_tracker(record)
                .max(self.classify_vendor(record)),
        }
    }

    /// Whether any status text on the record (from the selected source) is
    /// non-empty yet matched nothing.
    pub fn is_ambiguous(&self, record: &CircuitRecord, source: StatusSource) -> bool {
        let present = match source {
            StatusSource::Tracker => has_text(record.status_text.as_deref()),
            StatusSource::Vendor => record.vendor_statuses.iter().any(|s| has_text(Some(s))),
            StatusSource::Either => {
                has_text(record.status_text.as_deref())
                    || record.vendor_statuses.iter().any(|s| has_text(Some(s)))
            }
        };
        present && self.classify_record(record, source) == LifecycleState::Unknown
    }
}

fn has_text(text: Option<&str>) -> bool {
    text.is_some_and(|t| !t.trim().is_empty())
}
