//! Circuit identity and the merged circuit record.

use std::collections::BTreeSet;
use std::fmt;

use chrono::NaiveDate;
use serde::{Deserialize, Serialize};

use crate::cost::yearly;

/// Identifier markers that mean "no identifier yet".
pub const DEFAULT_PLACEHOLDER_IDS: &[&str] = &[
    "tbd",
    "to-be-determined",
    "to be determined",
    "n/a",
    "na",
    "nan",
    "none",
    "null",
    "-",
    "0",
];

/// Normalized circuit identifier.
///
/// Only constructed through [`IdNormalizer`] (or [`CircuitId::new`] for
/// already-canonical text), so two ids compare equal exactly when the feeds
/// refer to the same circuit.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct CircuitId(String);

impl CircuitId {
    /// Wrap canonical identifier text. Surrounding whitespace is removed and
    /// float-rendered integers (`"1589779.0"`) are folded to their integer form.
    pub fn new(raw: &str) -> Self {
        Self(canonical_text(raw.trim()))
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for CircuitId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// Folds `"123.0"` / `"123.00"` to `"123"`; anything else is returned unchanged.
fn canonical_text(s: &str) -> String {
    if let Some((int, frac)) = s.split_once('.') {
        let int_ok = !int.is_empty() && int.bytes().all(|b| b.is_ascii_digit());
        let frac_zero = !frac.is_empty() && frac.bytes().all(|b| b == b'0');
        if int_ok && frac_zero {
            return int.to_string();
        }
    }
    s.to_string()
}

/// Normalizes raw identifier text from any feed to a [`CircuitId`].
#[derive(Debug, Clone)]
pub struct IdNormalizer {
    placeholders: BTreeSet<String>,
}

impl Default for IdNormalizer {
    fn default() -> Self {
        Self::new(DEFAULT_PLACEHOLDER_IDS.iter().copied())
    }
}

impl IdNormalizer {
    pub fn new<I, S>(placeholders: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        Self {
            placeholders: placeholders
                .into_iter()
                .map(|p| p.as_ref().trim().to_lowercase())
                .collect(),
        }
    }

    /// Returns `None` for blank text and placeholder markers. Placeholders are
    /// matched after float folding, so `"0.0"` is the placeholder `"0"`.
    pub fn normalize(&self, raw: &str) -> Option<CircuitId> {
        let folded = canonical_text(raw.trim());
        if folded.is_empty() || self.placeholders.contains(&folded.to_lowercase()) {
            return None;
        }
        Some(CircuitId(folded))
    }

    /// Convenience over optional feed cells.
    pub fn normalize_opt(&self, raw: Option<&str>) -> Option<CircuitId> {
        raw.and_then(|r| self.normalize(r))
    }
}

/// Project phase tag (`"2"`, `"4"`, `"SP"`, `"LEO"`, ...).
///
/// Tags are trimmed, upper-cased and stripped of a leading `"Phase "` so that
/// `"Phase LEO"`, `"leo"` and `"LEO"` are the same phase.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct Phase(String);

impl Phase {
    pub fn parse(raw: &str) -> Option<Self> {
        let trimmed = raw.trim();
        let tag = match trimmed.get(..5) {
            Some(head) if head.eq_ignore_ascii_case("phase") => {
                let rest = &trimmed[5..];
                if rest.is_empty() || rest.starts_with(char::is_whitespace) {
                    rest.trim()
                } else {
                    trimmed
                }
            }
            _ => trimmed,
        };
        if tag.is_empty() {
            None
        } else {
            Some(Self(tag.to_uppercase()))
        }
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl TryFrom<String> for Phase {
    type Error = String;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        Phase::parse(&value).ok_or_else(|| format!("empty phase tag: {value:?}"))
    }
}

impl From<Phase> for String {
    fn from(value: Phase) -> Self {
        value.0
    }
}

impl fmt::Display for Phase {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// Normalized monthly amounts plus their yearly equivalents.
///
/// Yearly fields are derived on construction and never set independently.
#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize)]
pub struct CircuitCosts {
    monthly: Option<f64>,
    legacy_monthly: Option<f64>,
    yearly: Option<f64>,
    legacy_yearly: Option<f64>,
    one_time: Option<f64>,
}

impl CircuitCosts {
    pub fn from_monthly(
        monthly: Option<f64>,
        legacy_monthly: Option<f64>,
        one_time: Option<f64>,
    ) -> Self {
        Self {
            monthly,
            legacy_monthly,
            yearly: monthly.map(yearly),
            legacy_yearly: legacy_monthly.map(yearly),
            one_time,
        }
    }
}

/// One reconciled circuit.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct CircuitRecord {
    /// `None` when every feed carried a blank or placeholder identifier.
    pub circuit_id: Option<CircuitId>,
    pub vendor: Option<String>,
    pub phase: Option<Phase>,
    /// Status from the phase tracker.
    pub status_text: Option<String>,
    /// Status fields from the vendor extracts, in feed order.
    pub vendor_statuses: Vec<String>,
    pub cutover_date: Option<NaiveDate>,
    #[serde(flatten)]
    costs: CircuitCosts,
}

impl CircuitRecord {
    pub fn new(circuit_id: Option<CircuitId>) -> Self {
        Self {
            circuit_id,
            vendor: None,
            phase: None,
            status_text: None,
            vendor_statuses: Vec::new(),
            cutover_date: None,
            costs: CircuitCosts::default(),
        }
    }

    pub fn with_vendor(mut self, vendor: impl Into<String>) -> Self {
        self.vendor = Some(vendor.into());
        self
    }

    pub fn with_phase(mut self, phase: Phase) -> Self {
        self.phase = Some(phase);
        self
    }

    pub fn with_status(mut self, status: impl Into<String>) -> Self {
        self.status_text = Some(status.into());
        self
    }

    pub fn with_vendor_status(mut self, status: impl Into<String>) -> Self {
        self.vendor_statuses.push(status.into());
        self
    }

    pub fn with_costs(mut self, costs: CircuitCosts) -> Self {
        self.costs = costs;
        self
    }

    pub fn set_costs(&mut self, costs: CircuitCosts) {
        self.costs = costs;
    }

    pub fn costs(&self) -> CircuitCosts {
        self.costs
    }

    pub fn monthly_cost(&self) -> Option<f64> {
        self.costs.monthly
    }

    pub fn legacy_monthly_cost(&self) -> Option<f64> {
        self.costs.legacy_monthly
    }

    pub fn yearly_cost(&self) -> Option<f64> {
        self.costs.yearly
    }

    pub fn legacy_yearly_cost(&self) -> Option<f64> {
        self.costs.legacy_yearly
    }

    pub fn one_time_cost(&self) -> Option<f64> {
        self.costs.one_time
    }

    /// Whether the record has the given identifier.
    pub fn has_id(&self, id: &CircuitId) -> bool {
        self.circuit_id.as_ref() == Some(id)
    }
}
