// SPDX-License-Identifier: Apache-2.0

//! Compensation engine orchestrator.
//!
//! One [`CompensationEngine`] owns every piece of mutable per-feature state:
//! the streak ledger, recent-history windows, the macro slot pool and the
//! pending batch. No ambient statics, so multiple independent engines (one
//! per production line) can coexist and tests stay deterministic.
//!
//! Ingestion is the single entry point. External triggers (change
//! notification, periodic poll) can race; the atomic ingestion guard drops a
//! second trigger that arrives while one is in progress rather than queueing
//! it, so one physical measurement event can never double-increment an NG
//! streak.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Instant;

use ahash::AHashMap;
use tracing::{debug, error, info, warn};

use crate::clock::Clock;
use crate::diameter::{DiameterMonitor, DIAMETER_WARN_THRESHOLD};
use crate::error::EngineResult;
use crate::guard::magnitude_exceeded;
use crate::interfaces::{AuditSink, CorrectionWriter, MeasurementSource, ResultSink};
use crate::judgment::judge;
use crate::scheduler::BatchScheduler;
use crate::slots::SlotPool;
use crate::streak::{StreakLedger, StreakStep};
use crate::types::{
    ActionTaken, AuditRecord, CompensationRequest, DiameterWarning, EmergencyReason, FeatureKey,
    MeasurementSample, RequestKind, ResultRecord,
};
use gaugecomp_catalog::Catalog;

/// What happened to one ingestion trigger.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum IngestOutcome {
    /// The trigger was processed.
    Processed { accepted: usize, skipped: usize },
    /// Another ingestion was in progress; this trigger was dropped.
    Busy,
}

/// Stateful measurement compensation decision engine.
pub struct CompensationEngine {
    catalog: Catalog,
    clock: Arc<dyn Clock>,
    writer: Box<dyn CorrectionWriter>,
    result_sink: Box<dyn ResultSink>,
    audit_sink: Option<Box<dyn AuditSink>>,
    streaks: StreakLedger,
    diameter: Option<DiameterMonitor>,
    slots: SlotPool,
    scheduler: BatchScheduler,
    ingesting: AtomicBool,
    cycle: u64,
    last_accept: AHashMap<FeatureKey, Instant>,
}

impl CompensationEngine {
    /// Build an engine over a validated catalog.
    ///
    /// The catalog has already failed fast on configuration errors; by the
    /// time an engine exists every compensation-target tool resolves to an
    /// equipment address.
    pub fn new(
        catalog: Catalog,
        clock: Arc<dyn Clock>,
        writer: Box<dyn CorrectionWriter>,
        result_sink: Box<dyn ResultSink>,
        audit_sink: Option<Box<dyn AuditSink>>,
    ) -> Self {
        let diameter = catalog.diameter_pair().map(DiameterMonitor::new);
        Self {
            catalog,
            clock,
            writer,
            result_sink,
            audit_sink,
            streaks: StreakLedger::new(),
            diameter,
            slots: SlotPool::new(),
            scheduler: BatchScheduler::new(),
            ingesting: AtomicBool::new(false),
            cycle: 0,
            last_accept: AHashMap::new(),
        }
    }

    /// Pull the latest samples from a measurement source and ingest them.
    ///
    /// Source failures (unavailable, transient lock) mean "no new sample
    /// this cycle" and are never fatal.
    pub fn ingest_from_source(
        &mut self,
        source: &mut dyn MeasurementSource,
    ) -> EngineResult<IngestOutcome> {
        match source.latest_samples() {
            Ok(samples) => self.ingest(&samples),
            Err(err) => {
                debug!(%err, "no samples this cycle");
                Ok(IngestOutcome::Processed { accepted: 0, skipped: 0 })
            }
        }
    }

    /// Ingest one batch of measurement samples.
    ///
    /// Returns [`IngestOutcome::Busy`] without touching any state when
    /// another ingestion is already in progress. An unknown feature id
    /// aborts the cycle with an error; malformed samples are skipped with a
    /// warning.
    pub fn ingest(&mut self, samples: &[MeasurementSample]) -> EngineResult<IngestOutcome> {
        if self
            .ingesting
            .compare_exchange(false, true, Ordering::AcqRel, Ordering::Acquire)
            .is_err()
        {
            debug!("ingestion trigger dropped: already in progress");
            return Ok(IngestOutcome::Busy);
        }

        let result = self.ingest_guarded(samples);
        self.ingesting.store(false, Ordering::Release);
        result
    }

    fn ingest_guarded(&mut self, samples: &[MeasurementSample]) -> EngineResult<IngestOutcome> {
        self.cycle += 1;
        let now = self.clock.now();
        let mut accepted = 0usize;
        let mut skipped = 0usize;

        for sample in samples {
            if !sample.value.is_finite() || sample.timestamp_ms == 0 {
                warn!(
                    feature = %sample.feature_id,
                    value = sample.value,
                    timestamp_ms = sample.timestamp_ms,
                    "malformed sample skipped"
                );
                skipped += 1;
                continue;
            }
            self.process_sample(sample, now)?;
            accepted += 1;
        }

        self.flush_if_due(now);
        Ok(IngestOutcome::Processed { accepted, skipped })
    }

    /// Deadline poll: flush the pending batch if its debounce has expired.
    ///
    /// The external scheduler is expected to call this periodically; the
    /// engine holds no live timers.
    pub fn tick(&mut self) {
        let now = self.clock.now();
        self.flush_if_due(now);
    }

    /// Current consecutive NG count for a feature (by catalog spec).
    pub fn ng_count(&self, feature_id: &str) -> u32 {
        match self.catalog.spec(feature_id) {
            Ok(spec) => self.streaks.ng_count(&FeatureKey::new(spec.tool, feature_id)),
            Err(_) => 0,
        }
    }

    /// Number of corrections waiting for the next flush.
    pub fn pending_corrections(&self) -> usize {
        self.scheduler.pending_len()
    }

    fn flush_if_due(&mut self, now: Instant) {
        if let Some(outcome) =
            self.scheduler
                .flush_due(now, self.writer.as_mut(), &mut self.slots, self.cycle)
        {
            self.result_sink.on_batch_outcome(&outcome);
        }
    }

    fn process_sample(&mut self, sample: &MeasurementSample, now: Instant) -> EngineResult<()> {
        let spec = self.catalog.spec(&sample.feature_id)?.clone();
        let key = FeatureKey::new(spec.tool, spec.id.clone());
        let verdict = judge(sample.value, &spec);

        if let Some(monitor) = &mut self.diameter {
            if let Some(average) = monitor.observe(&sample.feature_id, sample.value) {
                let warning = DiameterWarning {
                    cycle: self.cycle,
                    upper_feature: monitor.upper_id().to_string(),
                    lower_feature: monitor.lower_id().to_string(),
                    average_difference: average,
                    threshold: DIAMETER_WARN_THRESHOLD,
                };
                warn!(
                    average_difference = average,
                    "diameter cross-check above threshold"
                );
                self.result_sink.on_diameter_warning(&warning);
            }
        }

        let action = if !spec.compensation_target {
            // Diagnostic-only dimension: judged and displayed, never acted on.
            ActionTaken::None
        } else {
            let freshness = self
                .streaks
                .observe(&key, sample.value, sample.timestamp_ms);

            if !verdict.judgment.is_ng() {
                self.streaks.record_ok(&key);
                ActionTaken::None
            } else if !freshness.is_fresh() {
                // Stale re-read: refresh the display, never the streak.
                debug!(key = %key, ?freshness, "stale re-read, streak unchanged");
                ActionTaken::None
            } else {
                let forced = magnitude_exceeded(verdict.raw_correction);
                match self.streaks.record_ng(&key, forced) {
                    StreakStep::Wait => ActionTaken::Wait,
                    StreakStep::WaitConfirm => ActionTaken::WaitConfirm,
                    StreakStep::ApplyCorrection => {
                        self.accept_correction(&key, &spec, verdict.raw_correction, now)?;
                        ActionTaken::Applied
                    }
                    StreakStep::Emergency { dispatch } => {
                        let reason = if forced {
                            EmergencyReason::Magnitude
                        } else {
                            EmergencyReason::Streak
                        };
                        if dispatch {
                            self.dispatch_emergency(&key, &spec, reason, now)?;
                        }
                        ActionTaken::Emergency(reason)
                    }
                }
            }
        };

        let ng_sequence = self.streaks.ng_count(&key);
        let record = ResultRecord {
            cycle: self.cycle,
            feature_id: spec.id.clone(),
            tool: spec.tool,
            measured: sample.value,
            target: spec.target,
            deviation: verdict.deviation,
            judgment: verdict.judgment,
            correction: verdict.raw_correction,
            action,
            ng_sequence,
        };
        self.result_sink.on_result(&record);
        self.audit(sample, &record, now);
        Ok(())
    }

    fn accept_correction(
        &mut self,
        key: &FeatureKey,
        spec: &gaugecomp_catalog::FeatureSpec,
        correction: f64,
        now: Instant,
    ) -> EngineResult<()> {
        let address = self.catalog.resolve_tool(spec.tool)?;
        let request = CompensationRequest {
            kind: RequestKind::Correction,
            tool: spec.tool,
            feature_id: spec.id.clone(),
            axis: spec.axis,
            value: correction,
            equipment_address: address,
            width_linked: false,
        };
        info!(
            key = %key,
            correction,
            axis = %spec.axis,
            "correction accepted"
        );

        // A linked width correction rides in the same batch as its primary.
        let linked = match self.catalog.linkage() {
            Some(linkage) if linkage.primary == spec.id => {
                let width_spec = self.catalog.spec(&linkage.linked)?.clone();
                let width_address = self.catalog.resolve_tool(width_spec.tool)?;
                Some(crate::linkage::derive_linked_request(
                    &request,
                    &width_spec,
                    width_address,
                ))
            }
            _ => None,
        };

        self.scheduler.enqueue(request, now);
        if let Some(linked) = linked {
            info!(
                feature = %linked.feature_id,
                value = linked.value,
                "width-linked correction derived"
            );
            self.scheduler.enqueue(linked, now);
        }

        // The pre-correction values must not shadow the next real read.
        self.streaks.clear_history(key);
        Ok(())
    }

    fn dispatch_emergency(
        &mut self,
        key: &FeatureKey,
        spec: &gaugecomp_catalog::FeatureSpec,
        reason: EmergencyReason,
        now: Instant,
    ) -> EngineResult<()> {
        let address = self.catalog.resolve_tool(spec.tool)?;
        error!(key = %key, ?reason, "emergency stop requested");
        self.scheduler.enqueue(
            CompensationRequest {
                kind: RequestKind::EmergencyStop,
                tool: spec.tool,
                feature_id: spec.id.clone(),
                axis: spec.axis,
                value: 0.0,
                equipment_address: address,
                width_linked: false,
            },
            now,
        );
        Ok(())
    }

    fn audit(&mut self, sample: &MeasurementSample, record: &ResultRecord, now: Instant) {
        let Some(sink) = &mut self.audit_sink else {
            return;
        };
        let key = FeatureKey::new(record.tool, record.feature_id.clone());
        let interval_ms = self
            .last_accept
            .insert(key, now)
            .map(|previous| now.duration_since(previous).as_millis() as u64);

        let audit = AuditRecord {
            cycle: record.cycle,
            feature_id: record.feature_id.clone(),
            tool: record.tool,
            measured: record.measured,
            target: record.target,
            judgment: record.judgment,
            action: record.action,
            compensated: record.action == ActionTaken::Applied,
            ng_sequence: record.ng_sequence,
            timestamp_ms: sample.timestamp_ms,
            interval_ms,
        };
        if let Err(err) = sink.append(&audit) {
            // Side channel only: a failing audit log never affects decisions.
            warn!(%err, "audit append failed");
        }
    }
}
