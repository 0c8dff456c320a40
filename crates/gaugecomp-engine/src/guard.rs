// SPDX-License-Identifier: Apache-2.0

//! Emergency magnitude guard.
//!
//! A single deviation at or beyond [`EMERGENCY_MAGNITUDE`] indicates a
//! process fault rather than ordinary drift, and correcting it automatically
//! is itself unsafe. The guard runs before the streak ladder and forces an
//! immediate halt, with the reason tagged as magnitude rather than streak
//! for the audit trail.

/// Absolute raw-correction magnitude (measurement units) at which automatic
/// compensation gives way to an emergency stop.
pub const EMERGENCY_MAGNITUDE: f64 = 0.1;

/// True when the raw correction is too large to apply automatically.
pub fn magnitude_exceeded(raw_correction: f64) -> bool {
    raw_correction.abs() >= EMERGENCY_MAGNITUDE
}
