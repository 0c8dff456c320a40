// SPDX-License-Identifier: Apache-2.0

//! Core value types shared across the decision engine.
//!
//! Everything here is plain data: samples coming in, requests going out, and
//! the records the engine emits to its sinks. All per-feature state is keyed
//! by [`FeatureKey`] so the streak ledger, recent history and timing maps can
//! never drift apart on different identities.

use gaugecomp_catalog::Axis;
use serde::Serialize;

/// Machine group a tool belongs to. Derived from the tool number by domain
/// convention: tools 1-3 run on group 1, everything above on group 2.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
pub enum MachineGroup {
    One,
    Two,
}

impl MachineGroup {
    pub fn from_tool(tool: u8) -> Self {
        if tool <= 3 {
            MachineGroup::One
        } else {
            MachineGroup::Two
        }
    }
}

impl std::fmt::Display for MachineGroup {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            MachineGroup::One => write!(f, "1"),
            MachineGroup::Two => write!(f, "2"),
        }
    }
}

/// Sole index into all per-feature state maps.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize)]
pub struct FeatureKey {
    pub group: MachineGroup,
    pub tool: u8,
    pub feature_id: String,
}

impl FeatureKey {
    pub fn new(tool: u8, feature_id: impl Into<String>) -> Self {
        Self {
            group: MachineGroup::from_tool(tool),
            tool,
            feature_id: feature_id.into(),
        }
    }
}

impl std::fmt::Display for FeatureKey {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "g{}/t{}/{}", self.group, self.tool, self.feature_id)
    }
}

/// One dimensional measurement as delivered by the measurement source.
/// Read-only after ingestion.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct MeasurementSample {
    pub feature_id: String,
    pub tool: u8,
    pub value: f64,
    /// Milliseconds since the Unix epoch, as stamped by the gauge station.
    pub timestamp_ms: u64,
}

/// Tolerance classification of a single measurement.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub enum Judgment {
    Ok,
    High,
    Low,
}

impl Judgment {
    pub fn is_ng(self) -> bool {
        !matches!(self, Judgment::Ok)
    }
}

/// Output of the judgment step: classification plus the correction arithmetic.
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct Verdict {
    pub judgment: Judgment,
    /// measured - target
    pub deviation: f64,
    /// target - measured; the signed offset that would cancel the deviation.
    pub raw_correction: f64,
}

/// Why an emergency action fired.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub enum EmergencyReason {
    /// Fifth consecutive NG without an intervening OK.
    Streak,
    /// Single deviation too large to correct automatically.
    Magnitude,
}

/// What the engine did with one accepted measurement.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub enum ActionTaken {
    /// Judged only: in tolerance, stale re-read, or not a compensation target.
    None,
    /// First NG: hold for a confirming measurement.
    Wait,
    /// Correction emitted to the pending batch.
    Applied,
    /// Post-correction NG: observe before acting again.
    WaitConfirm,
    /// Process halt requested.
    Emergency(EmergencyReason),
}

/// Kind of dispatch a [`CompensationRequest`] asks for.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub enum RequestKind {
    Correction,
    EmergencyStop,
}

/// A correction (or halt) waiting for batched dispatch. Consumed exactly once
/// by the batch scheduler.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct CompensationRequest {
    pub kind: RequestKind,
    pub tool: u8,
    pub feature_id: String,
    pub axis: Axis,
    /// Signed correction in measurement units. Zero for emergency stops.
    pub value: f64,
    pub equipment_address: u32,
    pub width_linked: bool,
}

/// Per-sample result record emitted to the result sink for display/audit.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ResultRecord {
    pub cycle: u64,
    pub feature_id: String,
    pub tool: u8,
    pub measured: f64,
    pub target: f64,
    pub deviation: f64,
    pub judgment: Judgment,
    pub correction: f64,
    pub action: ActionTaken,
    /// Consecutive NG count for the feature after this sample.
    pub ng_sequence: u32,
}

/// Advisory warning from the diameter cross-check monitor.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct DiameterWarning {
    pub cycle: u64,
    pub upper_feature: String,
    pub lower_feature: String,
    /// Windowed average of |upper - lower|.
    pub average_difference: f64,
    pub threshold: f64,
}

/// Dispatch result for one request within a flushed batch.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct RequestOutcome {
    pub kind: RequestKind,
    pub feature_id: String,
    pub tool: u8,
    pub width_linked: bool,
    pub success: bool,
    /// Human-readable failure reason, present when `success` is false.
    pub error: Option<String>,
}

/// Consolidated outcome of one batch flush.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct BatchOutcome {
    pub cycle: u64,
    pub dispatched: usize,
    pub succeeded: usize,
    pub failed: usize,
    pub outcomes: Vec<RequestOutcome>,
}

/// One structured audit record per accepted measurement. Side channel only:
/// audit failures never affect decisions.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct AuditRecord {
    pub cycle: u64,
    pub feature_id: String,
    pub tool: u8,
    pub measured: f64,
    pub target: f64,
    pub judgment: Judgment,
    pub action: ActionTaken,
    pub compensated: bool,
    pub ng_sequence: u32,
    pub timestamp_ms: u64,
    /// Milliseconds since the previous accepted sample for this feature,
    /// absent for the first one.
    pub interval_ms: Option<u64>,
}
