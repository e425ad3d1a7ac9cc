//! Recoverable conditions observed during a reconciliation run.

use serde::{Deserialize, Serialize};

use crate::obs;

/// Kind of recoverable condition.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, PartialOrd, Ord)]
#[serde(rename_all = "snake_case")]
pub enum DiagnosticKind {
    /// A vendor extract lacks an expected column; the column was read as all-null.
    SchemaMismatch,
    /// A cost field failed to parse and was imputed from the column mean.
    UnparseableValue,
    /// An identifier was blank or a placeholder and the row was kept out of joins.
    AbsentIdentifier,
    /// Several rows for one circuit were collapsed into one record.
    DuplicateCollapsed,
}

impl DiagnosticKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::SchemaMismatch => "schema_mismatch",
            Self::UnparseableValue => "unparseable_value",
            Self::AbsentIdentifier => "absent_identifier",
            Self::DuplicateCollapsed => "duplicate_collapsed",
        }
    }
}

/// A single recoverable condition.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct Diagnostic {
    pub kind: DiagnosticKind,

    /// Feed the condition was found in (e.g. `site_list`, `vendor_status:Lumen`).
    pub feed: String,

    /// Human-readable detail.
    pub detail: String,

    /// Circuit the condition applies to, when known.
    pub circuit_id: Option<String>,
}

impl Diagnostic {
    pub fn new(kind: DiagnosticKind, feed: impl Into<String>, detail: impl Into<String>) -> Self {
        Self {
            kind,
            feed: feed.into(),
            detail: detail.into(),
            circuit_id: None,
        }
    }

    /// Attach the affected circuit.
    pub fn with_circuit(mut self, circuit_id: impl Into<String>) -> Self {
        self.circuit_id = Some(circuit_id.into());
        self
    }
}

/// Ordered collection of diagnostics for one run.
///
/// Every pushed diagnostic is also logged at warn level.
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
pub struct Diagnostics {
    entries: Vec<Diagnostic>,
}

impl Diagnostics {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn push(&mut self, diagnostic: Diagnostic) {
        obs::emit_diagnostic(&diagnostic);
        self.entries.push(diagnostic);
    }

    pub fn extend(&mut self, other: Diagnostics) {
        self.entries.extend(other.entries);
    }

    pub fn entries(&self) -> &[Diagnostic] {
        &self.entries
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    /// Number of diagnostics of the given kind.
    pub fn count(&self, kind: DiagnosticKind) -> usize {
        self.entries.iter().filter(|d| d.kind == kind).count()
    }
}
