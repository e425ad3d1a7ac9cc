//! Domain models for circuit reconciliation.
//!
//! - `CircuitRecord`: one reconciled circuit
//! - `LifecycleState`: classification of a circuit's status text
//! - `VendorMetric`: per-vendor rollup row
//! - `ReconError` / `Diagnostic`: fatal and recoverable conditions

pub mod circuit;
pub mod diagnostic;
pub mod error;
pub mod lifecycle;
pub mod metric;

pub use circuit::{CircuitCosts, CircuitId, CircuitRecord, IdNormalizer, Phase};
pub use diagnostic::{Diagnostic, DiagnosticKind, Diagnostics};
pub use error::{ReconError, ReconResult};
pub use lifecycle::LifecycleState;
pub use metric::VendorMetric;
