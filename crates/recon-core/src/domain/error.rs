//! Fatal error taxonomy for reconciliation runs.
//!
//! Only conditions that must abort a run live here. Recoverable conditions
//! (schema gaps in vendor extracts, unparseable values, ambiguous statuses)
//! are recorded as [`Diagnostic`](super::diagnostic::Diagnostic) values instead.

use std::path::PathBuf;

use crate::feed::FeedKind;

/// Reconciliation errors.
#[derive(Debug, thiserror::Error)]
pub enum ReconError {
    #[error("missing feed: no {feed} file found for period {period}")]
    MissingFeed { feed: FeedKind, period: String },

    #[error("malformed {feed} feed: {detail}")]
    MalformedFeed { feed: FeedKind, detail: String },

    #[error("io error on {path:?}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("invalid configuration: {0}")]
    Config(String),

    #[error("configuration parse error: {0}")]
    ConfigParse(#[from] toml::de::Error),

    #[error("phase {phase} is claimed by both segment {first} and segment {second}")]
    OverlappingSegments {
        phase: String,
        first: String,
        second: String,
    },

    #[error("unknown segment: {0}")]
    UnknownSegment(String),

    #[error("duplicate segment name: {0}")]
    DuplicateSegment(String),

    #[error("serialization error: {0}")]
    Serialization(#[from] serde_json::Error),
}

impl ReconError {
    pub(crate) fn io(path: impl Into<PathBuf>, source: std::io::Error) -> Self {
        Self::Io {
            path: path.into(),
            source,
        }
    }
}

/// Result type for reconciliation operations.
pub type ReconResult<T> = std::result::Result<T, ReconError>;
