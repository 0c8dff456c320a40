// SPDX-License-Identifier: Apache-2.0

//! # Gaugecomp Decision Engine
//!
//! Stateful core of the measurement compensation system. Periodic
//! dimensional measurements of machined parts come in; per measured
//! feature the engine decides whether the part is in tolerance, whether a
//! compensating offset must be sent to the CNC controller, or whether the
//! process must halt.
//!
//! Pipeline per sample:
//!
//! 1. [`judgment`] classifies the value against its tolerance band
//! 2. [`guard`] forces an immediate halt on deviations too large to correct
//! 3. [`streak`] tracks consecutive NG judgments and picks the escalation
//!    step (wait, correct, confirm, emergency)
//! 4. [`linkage`] derives the coupled width correction when applicable
//! 5. [`slots`] assigns one of four reserved macro register blocks
//! 6. [`scheduler`] coalesces the cycle's corrections into one atomic batch
//!
//! The [`engine::CompensationEngine`] owns all of it behind a single
//! ingestion entry point; collaborators (measurement store, controller
//! transport, display, audit log) plug in through [`interfaces`].
//!
//! ## Usage
//!
//! ```rust,no_run
//! use std::sync::Arc;
//! use gaugecomp_engine::clock::SystemClock;
//! use gaugecomp_engine::engine::CompensationEngine;
//! use gaugecomp_engine::interfaces::{CollectingResultSink, RecordingWriter, TracingAuditSink};
//!
//! let catalog = gaugecomp_catalog::load_catalog(None).expect("catalog must load");
//! let mut engine = CompensationEngine::new(
//!     catalog,
//!     Arc::new(SystemClock),
//!     Box::new(RecordingWriter::new()),
//!     Box::new(CollectingResultSink::new()),
//!     Some(Box::new(TracingAuditSink)),
//! );
//! engine.ingest(&[]).expect("ingest");
//! engine.tick();
//! ```

/// Crate version from Cargo.toml
pub const VERSION: &str = env!("CARGO_PKG_VERSION");

pub mod clock;
pub mod diameter;
pub mod engine;
pub mod error;
pub mod guard;
pub mod interfaces;
pub mod judgment;
pub mod linkage;
pub mod scheduler;
pub mod slots;
pub mod streak;
pub mod types;

pub use clock::{Clock, ManualClock, SystemClock};
pub use diameter::{DiameterMonitor, DIAMETER_WARN_THRESHOLD, DIAMETER_WINDOW};
pub use engine::{CompensationEngine, IngestOutcome};
pub use error::{EngineError, EngineResult};
pub use guard::{magnitude_exceeded, EMERGENCY_MAGNITUDE};
pub use interfaces::{
    AuditError, AuditSink, CorrectionWriter, EquipmentResolver, MeasurementSource, ResultSink,
    SourceError, WriteError,
};
pub use judgment::judge;
pub use scheduler::{BatchScheduler, FLUSH_DEBOUNCE};
pub use slots::{slot_base_address, MacroSlot, SlotPool, CYCLE_IDLE_RESET, SLOT_POOL_SIZE};
pub use streak::{Freshness, StreakLedger, StreakStep, DEDUP_EPSILON, EMERGENCY_STREAK};
pub use types::*;

/// Re-export of the catalog crate the engine is configured from.
pub use gaugecomp_catalog as catalog;
