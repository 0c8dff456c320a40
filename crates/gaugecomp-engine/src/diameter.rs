// SPDX-License-Identifier: Apache-2.0

//! Diameter cross-check monitor.
//!
//! Advisory consistency check across the two designated diameter features.
//! Keeps a rolling window of |upper - lower| built from the latest value of
//! each side; when the window is full and every entry exceeds the threshold,
//! reports the windowed average. Never gates correction.

use std::collections::VecDeque;

use gaugecomp_catalog::DiameterPairSpec;

/// Persistent |upper - lower| difference above this raises the warning.
pub const DIAMETER_WARN_THRESHOLD: f64 = 0.03;

/// Rolling window length.
pub const DIAMETER_WINDOW: usize = 2;

/// Rolling cross-check over an upper/lower diameter pair.
#[derive(Debug)]
pub struct DiameterMonitor {
    upper_id: String,
    lower_id: String,
    latest_upper: Option<f64>,
    latest_lower: Option<f64>,
    window: VecDeque<f64>,
}

impl DiameterMonitor {
    pub fn new(pair: &DiameterPairSpec) -> Self {
        Self {
            upper_id: pair.upper.clone(),
            lower_id: pair.lower.clone(),
            latest_upper: None,
            latest_lower: None,
            window: VecDeque::with_capacity(DIAMETER_WINDOW),
        }
    }

    pub fn upper_id(&self) -> &str {
        &self.upper_id
    }

    pub fn lower_id(&self) -> &str {
        &self.lower_id
    }

    /// Feed one measurement. Returns the windowed average difference when
    /// the window is full and every entry exceeds the threshold.
    ///
    /// Features outside the pair are ignored, so the engine can route every
    /// sample through here unconditionally.
    pub fn observe(&mut self, feature_id: &str, value: f64) -> Option<f64> {
        if feature_id == self.upper_id {
            self.latest_upper = Some(value);
        } else if feature_id == self.lower_id {
            self.latest_lower = Some(value);
        } else {
            return None;
        }

        let (upper, lower) = (self.latest_upper?, self.latest_lower?);
        if self.window.len() == DIAMETER_WINDOW {
            self.window.pop_front();
        }
        self.window.push_back((upper - lower).abs());

        if self.window.len() == DIAMETER_WINDOW
            && self.window.iter().all(|d| *d > DIAMETER_WARN_THRESHOLD)
        {
            Some(self.window.iter().sum::<f64>() / self.window.len() as f64)
        } else {
            None
        }
    }
}
