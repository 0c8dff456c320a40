// SPDX-License-Identifier: Apache-2.0

//! NG streak ledger.
//!
//! One state record per [`FeatureKey`], tracking consecutive out-of-tolerance
//! judgments and deciding the escalation step:
//!
//! - count 1: wait for a confirming measurement (noise suppression)
//! - count 2: apply one correction
//! - count 3-4: observe whether the correction converged
//! - count 5: the strategy is not converging, halt the process
//!
//! Any in-tolerance judgment resets the key to idle. The ledger also owns
//! the recent-history window used to tell genuine new measurements from
//! re-reads of stale store contents: a sample whose value sits within
//! [`DEDUP_EPSILON`] of the last recorded one and whose timestamp has not
//! advanced must not move the streak. The first observation for a key is
//! always treated as a re-read so leftover store state from before engine
//! start can never escalate.
//!
//! State is volatile by design: a restart begins at idle for every key,
//! since stale escalation state across restarts would itself be unsafe.

use ahash::AHashMap;
use std::collections::VecDeque;

use crate::types::FeatureKey;

/// Two values within this distance are numerically indistinguishable for
/// re-read detection.
pub const DEDUP_EPSILON: f64 = 0.0001;

/// Consecutive NG count at which the ladder escalates to an emergency stop.
pub const EMERGENCY_STREAK: u32 = 5;

/// Recent-history window length per key.
const HISTORY_WINDOW: usize = 2;

/// Whether an incoming sample is a genuine new measurement.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Freshness {
    /// New measurement; may advance the streak.
    Fresh,
    /// First observation for this key since engine start.
    FirstObservation,
    /// Indistinguishable from the last recorded value with no newer
    /// timestamp; a re-read of stale data.
    DuplicateValue,
}

impl Freshness {
    pub fn is_fresh(self) -> bool {
        matches!(self, Freshness::Fresh)
    }
}

/// Escalation step decided for one fresh NG judgment.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StreakStep {
    /// First NG: display pending, no write.
    Wait,
    /// Second consecutive NG confirms drift: emit one correction.
    ApplyCorrection,
    /// Third/fourth NG: correction already attempted, observe.
    WaitConfirm,
    /// Halt. `dispatch` is true only the first time per unresolved streak;
    /// the armed latch suppresses duplicate emergency dispatches until the
    /// key returns to idle.
    Emergency { dispatch: bool },
}

#[derive(Debug, Clone, Default)]
struct KeyState {
    consecutive_ng: u32,
    macro_armed: bool,
    /// Set once the key has ever been observed; survives history clears.
    seen: bool,
    /// Last fresh (value, timestamp) pairs, newest at the back.
    history: VecDeque<(f64, u64)>,
}

/// Per-key NG streak state machine plus recent-history windows.
///
/// All mutation goes through one owner; the engine serializes ingestion so
/// two measurement cycles can never interleave their updates.
#[derive(Debug, Default)]
pub struct StreakLedger {
    states: AHashMap<FeatureKey, KeyState>,
}

impl StreakLedger {
    pub fn new() -> Self {
        Self::default()
    }

    /// Classify an incoming sample as fresh or a re-read, recording it into
    /// the history window when fresh.
    pub fn observe(&mut self, key: &FeatureKey, value: f64, timestamp_ms: u64) -> Freshness {
        let state = self.states.entry(key.clone()).or_default();

        if !state.seen {
            state.seen = true;
            push_bounded(&mut state.history, (value, timestamp_ms));
            return Freshness::FirstObservation;
        }

        if let Some(&(last_value, last_ts)) = state.history.back() {
            if (value - last_value).abs() < DEDUP_EPSILON && timestamp_ms <= last_ts {
                return Freshness::DuplicateValue;
            }
        }

        push_bounded(&mut state.history, (value, timestamp_ms));
        Freshness::Fresh
    }

    /// In-tolerance judgment: reset the key to idle and clear its history.
    pub fn record_ok(&mut self, key: &FeatureKey) {
        if let Some(state) = self.states.get_mut(key) {
            state.consecutive_ng = 0;
            state.macro_armed = false;
            state.history.clear();
        }
    }

    /// Fresh NG judgment: advance the streak and decide the escalation step.
    ///
    /// `forced_emergency` is set by the magnitude guard; it jumps the ladder
    /// regardless of the count. Once the emergency latch is armed every
    /// subsequent NG stays an emergency (without re-dispatch) until an OK
    /// resets the key.
    pub fn record_ng(&mut self, key: &FeatureKey, forced_emergency: bool) -> StreakStep {
        let state = self.states.entry(key.clone()).or_default();
        state.consecutive_ng = state.consecutive_ng.saturating_add(1);

        if state.macro_armed {
            return StreakStep::Emergency { dispatch: false };
        }

        if forced_emergency || state.consecutive_ng >= EMERGENCY_STREAK {
            state.macro_armed = true;
            return StreakStep::Emergency { dispatch: true };
        }

        match state.consecutive_ng {
            1 => StreakStep::Wait,
            2 => StreakStep::ApplyCorrection,
            // 3 and 4 are deliberately identical: the correction from count 2
            // is given two measurements to converge before the halt at 5.
            _ => StreakStep::WaitConfirm,
        }
    }

    /// Clear the history window after a correction is applied, so the next
    /// genuinely new measurement is never mistaken for a re-read of the
    /// pre-correction value.
    pub fn clear_history(&mut self, key: &FeatureKey) {
        if let Some(state) = self.states.get_mut(key) {
            state.history.clear();
        }
    }

    /// Current consecutive NG count for a key (0 for unknown keys).
    pub fn ng_count(&self, key: &FeatureKey) -> u32 {
        self.states.get(key).map_or(0, |s| s.consecutive_ng)
    }

    /// Whether the emergency latch is armed for a key.
    pub fn is_armed(&self, key: &FeatureKey) -> bool {
        self.states.get(key).is_some_and(|s| s.macro_armed)
    }
}

fn push_bounded(history: &mut VecDeque<(f64, u64)>, entry: (f64, u64)) {
    if history.len() == HISTORY_WINDOW {
        history.pop_front();
    }
    history.push_back(entry);
}

#[cfg(test)]
mod tests {
    use super::*;

    fn key() -> FeatureKey {
        FeatureKey::new(7, "bottom-height")
    }

    /// Prime a key past the first-observation rule with an in-tolerance read.
    fn warmed() -> (StreakLedger, FeatureKey) {
        let mut ledger = StreakLedger::new();
        let k = key();
        ledger.observe(&k, 21.70, 1_000);
        ledger.record_ok(&k);
        (ledger, k)
    }

    #[test]
    fn first_observation_is_a_re_read() {
        let mut ledger = StreakLedger::new();
        assert_eq!(ledger.observe(&key(), 21.60, 1_000), Freshness::FirstObservation);
    }

    #[test]
    fn duplicate_value_without_newer_timestamp_is_stale() {
        let (mut ledger, k) = warmed();
        assert!(ledger.observe(&k, 21.60, 2_000).is_fresh());
        assert_eq!(ledger.observe(&k, 21.60, 2_000), Freshness::DuplicateValue);
        assert_eq!(ledger.observe(&k, 21.60005, 2_000), Freshness::DuplicateValue);
    }

    #[test]
    fn same_value_with_newer_timestamp_is_a_new_measurement() {
        let (mut ledger, k) = warmed();
        assert!(ledger.observe(&k, 21.60, 2_000).is_fresh());
        assert!(ledger.observe(&k, 21.60, 3_000).is_fresh());
    }

    #[test]
    fn distinct_value_is_fresh() {
        let (mut ledger, k) = warmed();
        assert!(ledger.observe(&k, 21.60, 2_000).is_fresh());
        assert!(ledger.observe(&k, 21.62, 2_000).is_fresh());
    }

    #[test]
    fn escalation_ladder_runs_wait_apply_confirm_emergency() {
        let mut ledger = StreakLedger::new();
        let k = key();
        assert_eq!(ledger.record_ng(&k, false), StreakStep::Wait);
        assert_eq!(ledger.record_ng(&k, false), StreakStep::ApplyCorrection);
        assert_eq!(ledger.record_ng(&k, false), StreakStep::WaitConfirm);
        assert_eq!(ledger.record_ng(&k, false), StreakStep::WaitConfirm);
        assert_eq!(ledger.record_ng(&k, false), StreakStep::Emergency { dispatch: true });
        assert_eq!(ledger.ng_count(&k), 5);
    }

    #[test]
    fn emergency_dispatches_only_once_per_streak() {
        let mut ledger = StreakLedger::new();
        let k = key();
        for _ in 0..4 {
            ledger.record_ng(&k, false);
        }
        assert_eq!(ledger.record_ng(&k, false), StreakStep::Emergency { dispatch: true });
        assert_eq!(ledger.record_ng(&k, false), StreakStep::Emergency { dispatch: false });
        assert_eq!(ledger.record_ng(&k, false), StreakStep::Emergency { dispatch: false });
    }

    #[test]
    fn ok_resets_count_latch_and_history() {
        let mut ledger = StreakLedger::new();
        let k = key();
        for _ in 0..5 {
            ledger.record_ng(&k, false);
        }
        assert!(ledger.is_armed(&k));

        ledger.record_ok(&k);
        assert_eq!(ledger.ng_count(&k), 0);
        assert!(!ledger.is_armed(&k));
        // Ladder restarts from the beginning.
        assert_eq!(ledger.record_ng(&k, false), StreakStep::Wait);
    }

    #[test]
    fn forced_emergency_bypasses_the_ladder() {
        let mut ledger = StreakLedger::new();
        let k = key();
        assert_eq!(ledger.record_ng(&k, true), StreakStep::Emergency { dispatch: true });
        assert_eq!(ledger.ng_count(&k), 1);
        // Latch holds for subsequent ordinary NGs.
        assert_eq!(ledger.record_ng(&k, false), StreakStep::Emergency { dispatch: false });
    }

    #[test]
    fn history_clear_after_correction_makes_next_read_fresh() {
        let (mut ledger, k) = warmed();
        assert!(ledger.observe(&k, 21.60, 2_000).is_fresh());
        ledger.clear_history(&k);
        // Same value, same timestamp: still a new measurement because the
        // pre-correction history is gone.
        assert!(ledger.observe(&k, 21.60, 2_000).is_fresh());
    }

    #[test]
    fn keys_are_independent() {
        let mut ledger = StreakLedger::new();
        let a = FeatureKey::new(7, "bottom-height");
        let b = FeatureKey::new(9, "outer-diameter-top");
        ledger.record_ng(&a, false);
        ledger.record_ng(&a, false);
        assert_eq!(ledger.ng_count(&a), 2);
        assert_eq!(ledger.ng_count(&b), 0);
        assert_eq!(ledger.record_ng(&b, false), StreakStep::Wait);
    }
}
