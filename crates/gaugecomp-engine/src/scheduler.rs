// SPDX-License-Identifier: Apache-2.0

//! Compensation batch scheduler.
//!
//! Corrections produced within one measurement cycle are coalesced and
//! dispatched as a single unit. A debounce deadline opens on the first
//! pending request and restarts on every subsequent one; when it expires
//! the whole batch is flushed through the correction writer, one request at
//! a time, and the per-request results are consolidated into one
//! [`BatchOutcome`].
//!
//! The deadline is data checked against the injected clock, not a live
//! timer, and the in-flight flag keeps a flush from overlapping itself:
//! batches never overlap in time for one engine instance.

use std::time::{Duration, Instant};

use tracing::{info, warn};

use crate::interfaces::CorrectionWriter;
use crate::slots::{slot_base_address, SlotPool};
use crate::types::{BatchOutcome, CompensationRequest, RequestKind, RequestOutcome};

/// Quiet period after the last enqueued request before the batch flushes.
pub const FLUSH_DEBOUNCE: Duration = Duration::from_millis(500);

/// Convert a correction in measurement units to controller milli-units.
fn to_milli(value: f64) -> i32 {
    (value * 1000.0).round() as i32
}

/// Pending-batch collector with a restartable debounce deadline.
#[derive(Debug, Default)]
pub struct BatchScheduler {
    pending: Vec<CompensationRequest>,
    deadline: Option<Instant>,
    in_flight: bool,
}

impl BatchScheduler {
    pub fn new() -> Self {
        Self::default()
    }

    /// Add a request to the pending batch and restart the debounce deadline.
    pub fn enqueue(&mut self, request: CompensationRequest, now: Instant) {
        self.pending.push(request);
        self.deadline = Some(now + FLUSH_DEBOUNCE);
    }

    pub fn pending_len(&self) -> usize {
        self.pending.len()
    }

    /// Whether the debounce deadline has expired.
    pub fn due(&self, now: Instant) -> bool {
        self.deadline.map_or(false, |d| now >= d)
    }

    /// Flush the batch if its deadline has expired.
    ///
    /// Writes are synchronous from the engine's perspective; each failure is
    /// captured in the outcome (no retry here, that policy belongs to the
    /// transport). Returns `None` when nothing was due.
    pub fn flush_due(
        &mut self,
        now: Instant,
        writer: &mut dyn CorrectionWriter,
        slots: &mut SlotPool,
        cycle: u64,
    ) -> Option<BatchOutcome> {
        if self.in_flight || !self.due(now) {
            return None;
        }
        self.in_flight = true;
        self.deadline = None;
        let batch = std::mem::take(&mut self.pending);

        let mut outcomes = Vec::with_capacity(batch.len());
        for request in &batch {
            let result = dispatch(request, now, writer, slots);
            if let Err(err) = &result {
                warn!(
                    feature = %request.feature_id,
                    tool = request.tool,
                    code = err.code,
                    reason = err.reason,
                    "dispatch failed"
                );
            }
            outcomes.push(RequestOutcome {
                kind: request.kind,
                feature_id: request.feature_id.clone(),
                tool: request.tool,
                width_linked: request.width_linked,
                success: result.is_ok(),
                error: result.err().map(|e| e.to_string()),
            });
        }

        self.in_flight = false;

        let succeeded = outcomes.iter().filter(|o| o.success).count();
        let outcome = BatchOutcome {
            cycle,
            dispatched: outcomes.len(),
            succeeded,
            failed: outcomes.len() - succeeded,
            outcomes,
        };
        info!(
            cycle,
            dispatched = outcome.dispatched,
            failed = outcome.failed,
            "batch flushed"
        );
        Some(outcome)
    }
}

fn dispatch(
    request: &CompensationRequest,
    now: Instant,
    writer: &mut dyn CorrectionWriter,
    slots: &mut SlotPool,
) -> Result<(), crate::interfaces::WriteError> {
    match request.kind {
        RequestKind::EmergencyStop => writer.write_emergency_stop(request.equipment_address),
        RequestKind::Correction => {
            let index = slots.allocate(request.tool, now);
            slots.record_correction(index, request.axis, request.value);
            let (x, z) = slots.cached_values(index);
            let x_milli = to_milli(x.unwrap_or(0.0));
            let z_milli = to_milli(z.unwrap_or(0.0));
            writer.write_correction(
                request.equipment_address,
                slot_base_address(index),
                request.tool,
                x_milli,
                z_milli,
            )
        }
    }
}
