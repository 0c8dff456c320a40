// SPDX-License-Identifier: Apache-2.0

//! Collaborator interfaces.
//!
//! The engine consumes and produces these abstract boundaries; concrete I/O
//! (database polling, controller transport, UI, files) lives outside the
//! core. In-memory implementations are provided for tests and headless use.

use parking_lot::Mutex;
use std::collections::VecDeque;
use std::sync::Arc;
use thiserror::Error;
use tracing::info;

use crate::types::{AuditRecord, BatchOutcome, DiameterWarning, MeasurementSample, ResultRecord};

/// Measurement source failure. Both variants mean "no new sample this
/// cycle"; neither is fatal to the engine.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Error)]
pub enum SourceError {
    #[error("measurement source unavailable")]
    Unavailable,
    #[error("measurement source busy, retry later")]
    Transient,
}

/// Controller write rejection, carrying the domain error code and its
/// human-readable translation.
#[derive(Debug, Clone, Error)]
#[error("controller write rejected: code {code} ({reason})")]
pub struct WriteError {
    pub code: u16,
    pub reason: &'static str,
}

impl WriteError {
    pub fn new(code: u16) -> Self {
        Self {
            code,
            reason: reason_for_code(code),
        }
    }
}

/// Translate a controller error code to a human-readable reason.
pub fn reason_for_code(code: u16) -> &'static str {
    match code {
        1 => "controller offline",
        2 => "register block locked",
        3 => "value out of register range",
        4 => "controller in manual mode",
        5 => "communication timeout",
        _ => "unknown controller error",
    }
}

/// Audit sink failure. Reported but never allowed to affect decisions.
#[derive(Debug, Error)]
#[error("audit sink failure: {0}")]
pub struct AuditError(pub String);

/// Produces, on demand, the most recent sample for each known feature.
pub trait MeasurementSource {
    fn latest_samples(&mut self) -> Result<Vec<MeasurementSample>, SourceError>;
}

/// Raw write transport to the CNC controller.
///
/// A correction supplies three register writes per dispatch (tool id, X
/// value in milli-units, Z value in milli-units) into the slot's register
/// block. The emergency stop is a dedicated flag register.
pub trait CorrectionWriter {
    fn write_correction(
        &mut self,
        equipment_address: u32,
        slot_base: u16,
        tool: u8,
        x_milli: i32,
        z_milli: i32,
    ) -> Result<(), WriteError>;

    fn write_emergency_stop(&mut self, equipment_address: u32) -> Result<(), WriteError>;
}

/// Static lookup from tool number to target hardware address.
pub trait EquipmentResolver {
    fn resolve(&self, tool: u8) -> Option<u32>;
}

impl EquipmentResolver for gaugecomp_catalog::Catalog {
    fn resolve(&self, tool: u8) -> Option<u32> {
        self.resolve_tool(tool).ok()
    }
}

/// Receives per-sample results, advisory warnings and batch outcomes for
/// display/audit. Presentation is entirely a collaborator concern.
pub trait ResultSink {
    fn on_result(&mut self, record: &ResultRecord);
    fn on_diameter_warning(&mut self, warning: &DiameterWarning);
    fn on_batch_outcome(&mut self, outcome: &BatchOutcome);
}

/// Append-only audit channel, one record per accepted measurement.
pub trait AuditSink {
    fn append(&mut self, record: &AuditRecord) -> Result<(), AuditError>;
}

/// Audit sink that forwards records to the `tracing` subscriber.
#[derive(Debug, Default, Clone, Copy)]
pub struct TracingAuditSink;

impl AuditSink for TracingAuditSink {
    fn append(&mut self, record: &AuditRecord) -> Result<(), AuditError> {
        info!(
            cycle = record.cycle,
            feature = %record.feature_id,
            tool = record.tool,
            measured = record.measured,
            target = record.target,
            judgment = ?record.judgment,
            action = ?record.action,
            compensated = record.compensated,
            ng_sequence = record.ng_sequence,
            interval_ms = record.interval_ms,
            "measurement audited"
        );
        Ok(())
    }
}

// ============================================================================
// IN-MEMORY IMPLEMENTATIONS
// ============================================================================

/// Scripted measurement source: hands out pre-loaded batches in order, then
/// reports unavailable.
#[derive(Debug, Default)]
pub struct ScriptedSource {
    batches: VecDeque<Result<Vec<MeasurementSample>, SourceError>>,
}

impl ScriptedSource {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn push_batch(&mut self, samples: Vec<MeasurementSample>) {
        self.batches.push_back(Ok(samples));
    }

    pub fn push_failure(&mut self, error: SourceError) {
        self.batches.push_back(Err(error));
    }
}

impl MeasurementSource for ScriptedSource {
    fn latest_samples(&mut self) -> Result<Vec<MeasurementSample>, SourceError> {
        self.batches.pop_front().unwrap_or(Err(SourceError::Unavailable))
    }
}

/// One recorded correction write.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CorrectionWrite {
    pub equipment_address: u32,
    pub slot_base: u16,
    pub tool: u8,
    pub x_milli: i32,
    pub z_milli: i32,
}

#[derive(Debug, Default)]
struct WriterLog {
    corrections: Vec<CorrectionWrite>,
    emergency_stops: Vec<u32>,
    fail_tools: Vec<(u8, u16)>,
}

/// Recording writer for tests. Cloning shares the underlying log, so a test
/// can keep a handle while the engine owns the boxed writer.
#[derive(Debug, Default, Clone)]
pub struct RecordingWriter {
    log: Arc<Mutex<WriterLog>>,
}

impl RecordingWriter {
    pub fn new() -> Self {
        Self::default()
    }

    /// Make every correction write for `tool` fail with `code`.
    pub fn fail_tool(&self, tool: u8, code: u16) {
        self.log.lock().fail_tools.push((tool, code));
    }

    pub fn corrections(&self) -> Vec<CorrectionWrite> {
        self.log.lock().corrections.clone()
    }

    pub fn emergency_stops(&self) -> Vec<u32> {
        self.log.lock().emergency_stops.clone()
    }
}

impl CorrectionWriter for RecordingWriter {
    fn write_correction(
        &mut self,
        equipment_address: u32,
        slot_base: u16,
        tool: u8,
        x_milli: i32,
        z_milli: i32,
    ) -> Result<(), WriteError> {
        let mut log = self.log.lock();
        if let Some(&(_, code)) = log.fail_tools.iter().find(|(t, _)| *t == tool) {
            return Err(WriteError::new(code));
        }
        log.corrections.push(CorrectionWrite {
            equipment_address,
            slot_base,
            tool,
            x_milli,
            z_milli,
        });
        Ok(())
    }

    fn write_emergency_stop(&mut self, equipment_address: u32) -> Result<(), WriteError> {
        self.log.lock().emergency_stops.push(equipment_address);
        Ok(())
    }
}

#[derive(Debug, Default)]
struct ResultLog {
    results: Vec<ResultRecord>,
    warnings: Vec<DiameterWarning>,
    outcomes: Vec<BatchOutcome>,
}

/// Collecting result sink for tests; clones share the log.
#[derive(Debug, Default, Clone)]
pub struct CollectingResultSink {
    log: Arc<Mutex<ResultLog>>,
}

impl CollectingResultSink {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn results(&self) -> Vec<ResultRecord> {
        self.log.lock().results.clone()
    }

    pub fn warnings(&self) -> Vec<DiameterWarning> {
        self.log.lock().warnings.clone()
    }

    pub fn outcomes(&self) -> Vec<BatchOutcome> {
        self.log.lock().outcomes.clone()
    }

    /// Result records for one feature, in ingestion order.
    pub fn results_for(&self, feature_id: &str) -> Vec<ResultRecord> {
        self.log
            .lock()
            .results
            .iter()
            .filter(|r| r.feature_id == feature_id)
            .cloned()
            .collect()
    }
}

impl ResultSink for CollectingResultSink {
    fn on_result(&mut self, record: &ResultRecord) {
        self.log.lock().results.push(record.clone());
    }

    fn on_diameter_warning(&mut self, warning: &DiameterWarning) {
        self.log.lock().warnings.push(warning.clone());
    }

    fn on_batch_outcome(&mut self, outcome: &BatchOutcome) {
        self.log.lock().outcomes.push(outcome.clone());
    }
}

/// Collecting audit sink; clones share the log. Can be told to fail to
/// verify audit failures never affect decisions.
#[derive(Debug, Default, Clone)]
pub struct CollectingAuditSink {
    records: Arc<Mutex<Vec<AuditRecord>>>,
    fail: Arc<Mutex<bool>>,
}

impl CollectingAuditSink {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn set_failing(&self, failing: bool) {
        *self.fail.lock() = failing;
    }

    pub fn records(&self) -> Vec<AuditRecord> {
        self.records.lock().clone()
    }
}

impl AuditSink for CollectingAuditSink {
    fn append(&mut self, record: &AuditRecord) -> Result<(), AuditError> {
        if *self.fail.lock() {
            return Err(AuditError("scripted audit failure".to_string()));
        }
        self.records.lock().push(record.clone());
        Ok(())
    }
}
