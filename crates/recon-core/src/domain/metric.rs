//! Per-vendor rollup metrics.

use chrono::NaiveDate;
use serde::{Deserialize, Serialize};

/// Vendor row of a segment rollup.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct VendorMetric {
    pub vendor: String,
    /// Distinct circuits assigned to the vendor.
    pub assigned_count: u64,
    /// Distinct circuits classified deployed.
    pub deployed_count: u64,
    pub current_yearly_cost: f64,
    pub legacy_yearly_cost: f64,
    /// Non-recurring charges.
    pub one_time_cost: f64,
    /// Latest cutover date among deployed circuits.
    pub last_cutover: Option<NaiveDate>,
}

impl VendorMetric {
    /// All-zero metric for a vendor.
    pub fn zero(vendor: impl Into<String>) -> Self {
        Self {
            vendor: vendor.into(),
            assigned_count: 0,
            deployed_count: 0,
            current_yearly_cost: 0.0,
            legacy_yearly_cost: 0.0,
            one_time_cost: 0.0,
            last_cutover: None,
        }
    }

    /// Yearly savings of the current cost over the legacy cost.
    pub fn yearly_savings(&self) -> f64 {
        self.legacy_yearly_cost - self.current_yearly_cost
    }

    /// Assigned circuits not yet deployed.
    pub fn outstanding(&self) -> u64 {
        self.assigned_count.saturating_sub(self.deployed_count)
    }

    /// Field-wise sum of two metrics for the same vendor.
    pub fn accumulate(&mut self, other: &VendorMetric) {
        self.assigned_count += other.assigned_count;
        self.deployed_count += other.deployed_count;
        self.current_yearly_cost += other.current_yearly_cost;
        self.legacy_yearly_cost += other.legacy_yearly_cost;
        self.one_time_cost += other.one_time_cost;
        self.last_cutover = self.last_cutover.max(other.last_cutover);
    }
}
