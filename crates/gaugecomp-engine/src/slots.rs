// SPDX-License-Identifier: Apache-2.0

//! Macro slot pool.
//!
//! The controller reserves four macro-variable register blocks (labelled
//! A-D) for passing correction values. This pool assigns those blocks to
//! in-flight corrections:
//!
//! - allocation is idempotent per tool within a cycle (same tool, same slot)
//! - when all four are taken, the least-recently-used slot is evicted
//! - a gap longer than [`CYCLE_IDLE_RESET`] since the previous allocation
//!   ends the cycle and releases every slot
//!
//! Each slot caches the last X and Z values written for its tool, so a
//! correction on one axis re-writes the other axis's last known value into
//! the same register block instead of zeroing it.

use std::time::{Duration, Instant};

use gaugecomp_catalog::Axis;

/// Number of reserved macro register blocks.
pub const SLOT_POOL_SIZE: usize = 4;

/// Idle gap after which the pool starts a fresh cycle.
pub const CYCLE_IDLE_RESET: Duration = Duration::from_secs(300);

/// Conventional labels for the four register blocks.
pub const SLOT_LABELS: [char; SLOT_POOL_SIZE] = ['A', 'B', 'C', 'D'];

/// First macro register of slot 0; subsequent slots are stride apart.
const MACRO_SLOT_BASE: u16 = 500;
const MACRO_SLOT_STRIDE: u16 = 20;

/// Base register address of a slot's block.
pub fn slot_base_address(index: usize) -> u16 {
    MACRO_SLOT_BASE + MACRO_SLOT_STRIDE * index as u16
}

/// One live register block assignment.
#[derive(Debug, Clone)]
pub struct MacroSlot {
    pub tool: u8,
    pub last_used: Instant,
    pub cached_x: Option<f64>,
    pub cached_z: Option<f64>,
}

/// Fixed pool of four macro slots with LRU reuse.
#[derive(Debug, Default)]
pub struct SlotPool {
    slots: [Option<MacroSlot>; SLOT_POOL_SIZE],
    last_allocation: Option<Instant>,
}

impl SlotPool {
    pub fn new() -> Self {
        Self::default()
    }

    /// Assign a slot to a tool.
    ///
    /// Releases the whole pool first when the idle interval has elapsed.
    /// Returns the slot index (0..4).
    pub fn allocate(&mut self, tool: u8, now: Instant) -> usize {
        if let Some(previous) = self.last_allocation {
            if now.duration_since(previous) > CYCLE_IDLE_RESET {
                self.release_all();
            }
        }
        self.last_allocation = Some(now);

        // Idempotent within a cycle: the tool keeps its slot.
        if let Some(index) = self.index_of_tool(tool) {
            if let Some(slot) = &mut self.slots[index] {
                slot.last_used = now;
            }
            return index;
        }

        if let Some(index) = self.slots.iter().position(Option::is_none) {
            self.slots[index] = Some(MacroSlot {
                tool,
                last_used: now,
                cached_x: None,
                cached_z: None,
            });
            return index;
        }

        // Pool exhausted: evict the least-recently-used block. The cached
        // axis values belong to the evicted tool and are dropped with it.
        let index = self.lru_index();
        self.slots[index] = Some(MacroSlot {
            tool,
            last_used: now,
            cached_x: None,
            cached_z: None,
        });
        index
    }

    /// Record the correction value written on one axis of a slot.
    pub fn record_correction(&mut self, index: usize, axis: Axis, value: f64) {
        if let Some(slot) = self.slots.get_mut(index).and_then(Option::as_mut) {
            match axis {
                Axis::X => slot.cached_x = Some(value),
                Axis::Z => slot.cached_z = Some(value),
            }
        }
    }

    /// Cached (X, Z) values for a slot; `None` per axis if never written.
    pub fn cached_values(&self, index: usize) -> (Option<f64>, Option<f64>) {
        match self.slots.get(index).and_then(Option::as_ref) {
            Some(slot) => (slot.cached_x, slot.cached_z),
            None => (None, None),
        }
    }

    pub fn slot(&self, index: usize) -> Option<&MacroSlot> {
        self.slots.get(index).and_then(Option::as_ref)
    }

    pub fn live_count(&self) -> usize {
        self.slots.iter().filter(|s| s.is_some()).count()
    }

    /// End the cycle: release every slot.
    pub fn release_all(&mut self) {
        self.slots = Default::default();
    }

    fn index_of_tool(&self, tool: u8) -> Option<usize> {
        self.slots
            .iter()
            .position(|s| s.as_ref().is_some_and(|slot| slot.tool == tool))
    }

    fn lru_index(&self) -> usize {
        let mut oldest = 0;
        let mut oldest_used = None;
        for (index, slot) in self.slots.iter().enumerate() {
            if let Some(slot) = slot {
                if oldest_used.map_or(true, |t| slot.last_used < t) {
                    oldest = index;
                    oldest_used = Some(slot.last_used);
                }
            }
        }
        oldest
    }
}
