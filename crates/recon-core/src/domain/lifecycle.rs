//! Circuit lifecycle states.

use serde::{Deserialize, Serialize};

/// Lifecycle classification of a circuit.
///
/// Variants are ordered by progress so the most advanced state wins when
/// several status fields disagree.
#[derive(
    Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, PartialOrd, Ord, Hash, Default,
)]
#[serde(rename_all = "snake_case")]
pub enum LifecycleState {
    /// No status text, or text that matched no known pattern.
    #[default]
    Unknown,
    /// Vendor assigned, work not started.
    Assigned,
    /// Ordering, scheduling or installation under way.
    InProgress,
    /// Cutover complete.
    Deployed,
}

impl LifecycleState {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Unknown => "unknown",
            Self::Assigned => "assigned",
            Self::InProgress => "in_progress",
            Self::Deployed => "deployed",
        }
    }

    pub fn is_deployed(&self) -> bool {
        matches!(self, Self::Deployed)
    }
}

impl std::fmt::Display for LifecycleState {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}
