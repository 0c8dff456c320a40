// SPDX-License-Identifier: Apache-2.0

//! Tolerance judgment.
//!
//! Pure classification of one measurement against its feature's band. No
//! side effects: identical input always produces identical output.

use crate::types::{Judgment, Verdict};
use gaugecomp_catalog::FeatureSpec;

/// Judge one measured value against a feature's tolerance band.
///
/// Band membership is inclusive on both ends: a value exactly on a limit is
/// in tolerance. `raw_correction` is the signed offset that would move the
/// measured value back onto target (`target - measured`).
pub fn judge(measured: f64, spec: &FeatureSpec) -> Verdict {
    let judgment = if measured > spec.upper {
        Judgment::High
    } else if measured < spec.lower {
        Judgment::Low
    } else {
        Judgment::Ok
    };

    Verdict {
        judgment,
        deviation: measured - spec.target,
        raw_correction: spec.target - measured,
    }
}
