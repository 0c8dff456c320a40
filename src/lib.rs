// SPDX-License-Identifier: Apache-2.0

//! # Gaugecomp - In-Process Measurement Compensation
//!
//! Gaugecomp ingests periodic dimensional measurements of machined parts
//! and decides, per measured feature, whether the part is in tolerance,
//! whether a compensating offset must be sent to the CNC controller, or
//! whether the process must be halted.
//!
//! This umbrella crate re-exports the workspace components:
//!
//! - [`catalog`]: static feature catalog and equipment table (TOML-loaded,
//!   validated at startup)
//! - [`engine`]: the stateful decision core (judgment, NG streak
//!   escalation, emergency guard, macro slot pool, batched dispatch)
//!
//! ## Quick Start
//!
//! ```rust,no_run
//! use std::sync::Arc;
//! use gaugecomp::prelude::*;
//!
//! let catalog = gaugecomp::catalog::load_catalog(None).expect("catalog must load");
//! let mut engine = CompensationEngine::new(
//!     catalog,
//!     Arc::new(SystemClock),
//!     Box::new(RecordingWriter::new()),
//!     Box::new(CollectingResultSink::new()),
//!     Some(Box::new(TracingAuditSink)),
//! );
//!
//! // Driven by the external scheduler: ingest the latest samples, then
//! // poll the debounce deadline until the pending batch flushes.
//! engine.ingest(&[]).expect("ingest");
//! engine.tick();
//! ```
//!
//! Display, persistence of the data-source location, store polling, the
//! raw controller transport and file audit logging are collaborator
//! concerns: implement the traits in [`engine::interfaces`] and hand them
//! to the engine.

pub use gaugecomp_catalog as catalog;
pub use gaugecomp_engine as engine;

/// Commonly used types in one import.
pub mod prelude {
    pub use gaugecomp_catalog::{load_catalog, Axis, Catalog, FeatureSpec};
    pub use gaugecomp_engine::clock::{Clock, ManualClock, SystemClock};
    pub use gaugecomp_engine::engine::{CompensationEngine, IngestOutcome};
    pub use gaugecomp_engine::interfaces::{
        AuditSink, CollectingAuditSink, CollectingResultSink, CorrectionWriter,
        MeasurementSource, RecordingWriter, ResultSink, ScriptedSource, TracingAuditSink,
    };
    pub use gaugecomp_engine::types::{
        ActionTaken, BatchOutcome, CompensationRequest, FeatureKey, Judgment, MeasurementSample,
        ResultRecord,
    };
}
