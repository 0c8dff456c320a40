// SPDX-License-Identifier: Apache-2.0

//! End-to-end tests for the compensation decision engine: judgment feeding
//! the NG streak ladder, the magnitude guard, width linkage, debounced batch
//! dispatch and the audit side channel, all driven through a manual clock.

use std::sync::Arc;
use std::time::Duration;

use gaugecomp::engine::types::EmergencyReason;
use gaugecomp::prelude::*;

const CATALOG: &str = r#"
    [[feature]]
    id = "bottom-height"
    tool = 7
    axis = "Z"
    target = 21.70
    lower = 21.65
    upper = 21.75
    compensation_target = true

    [[feature]]
    id = "width"
    tool = 9
    axis = "X"
    target = 12.40
    lower = 12.35
    upper = 12.45
    compensation_target = true

    [[feature]]
    id = "outer-diameter-top"
    tool = 9
    axis = "X"
    target = 23.050
    lower = 23.020
    upper = 23.080
    compensation_target = true

    [[feature]]
    id = "outer-diameter-bottom"
    tool = 4
    axis = "X"
    target = 23.050
    lower = 23.020
    upper = 23.080
    compensation_target = false

    [[equipment]]
    tool = 7
    address = 4001

    [[equipment]]
    tool = 9
    address = 4002

    [linkage]
    primary = "bottom-height"
    linked = "width"

    [diameter_pair]
    upper = "outer-diameter-top"
    lower = "outer-diameter-bottom"
"#;

struct Rig {
    engine: CompensationEngine,
    clock: Arc<ManualClock>,
    writer: RecordingWriter,
    sink: CollectingResultSink,
    audit: CollectingAuditSink,
}

impl Rig {
    fn new() -> Self {
        let catalog = gaugecomp::catalog::load_catalog_str(CATALOG).expect("catalog loads");
        let clock = Arc::new(ManualClock::new());
        let writer = RecordingWriter::new();
        let sink = CollectingResultSink::new();
        let audit = CollectingAuditSink::new();
        let engine = CompensationEngine::new(
            catalog,
            clock.clone(),
            Box::new(writer.clone()),
            Box::new(sink.clone()),
            Some(Box::new(audit.clone())),
        );
        Self { engine, clock, writer, sink, audit }
    }

    fn ingest_one(&mut self, feature: &str, tool: u8, value: f64, timestamp_ms: u64) {
        let outcome = self
            .engine
            .ingest(&[MeasurementSample {
                feature_id: feature.to_string(),
                tool,
                value,
                timestamp_ms,
            }])
            .expect("ingest succeeds");
        assert!(matches!(outcome, IngestOutcome::Processed { .. }));
    }

    /// Prime a feature past the first-observation rule with an on-target read.
    fn warm(&mut self, feature: &str, tool: u8, target: f64) {
        self.ingest_one(feature, tool, target, 1);
    }

    /// Let the debounce expire and flush whatever is pending.
    fn settle(&mut self) {
        self.clock.advance(Duration::from_millis(600));
        self.engine.tick();
    }

    fn actions_for(&self, feature: &str) -> Vec<ActionTaken> {
        self.sink
            .results_for(feature)
            .iter()
            .map(|r| r.action)
            .collect()
    }
}

#[test]
fn in_tolerance_measurements_reset_the_streak() {
    let mut rig = Rig::new();
    rig.warm("bottom-height", 7, 21.70);
    rig.ingest_one("bottom-height", 7, 21.60, 1_000); // NG
    rig.ingest_one("bottom-height", 7, 21.71, 2_000); // OK again
    rig.ingest_one("bottom-height", 7, 21.60, 3_000); // NG, ladder restarted

    assert_eq!(
        rig.actions_for("bottom-height"),
        vec![ActionTaken::None, ActionTaken::Wait, ActionTaken::None, ActionTaken::Wait]
    );
    let sequences: Vec<u32> = rig
        .sink
        .results_for("bottom-height")
        .iter()
        .map(|r| r.ng_sequence)
        .collect();
    assert_eq!(sequences, vec![0, 1, 0, 1]);
}

#[test]
fn second_consecutive_ng_emits_exactly_one_correction_with_width_linkage() {
    let mut rig = Rig::new();
    rig.warm("bottom-height", 7, 21.70);
    rig.ingest_one("bottom-height", 7, 21.60, 1_000); // Wait, no write
    rig.ingest_one("bottom-height", 7, 21.60, 2_000); // confirmed drift
    assert_eq!(
        rig.actions_for("bottom-height"),
        vec![ActionTaken::None, ActionTaken::Wait, ActionTaken::Applied]
    );
    assert_eq!(rig.engine.pending_corrections(), 2);

    rig.settle();

    let writes = rig.writer.corrections();
    assert_eq!(writes.len(), 2);

    // Primary: tool 7, Z axis, +0.100 (milli-units).
    assert_eq!(writes[0].tool, 7);
    assert_eq!(writes[0].equipment_address, 4001);
    assert_eq!(writes[0].z_milli, 100);
    assert_eq!(writes[0].x_milli, 0);

    // Linked width correction: same signed magnitude on tool 9, X axis.
    assert_eq!(writes[1].tool, 9);
    assert_eq!(writes[1].equipment_address, 4002);
    assert_eq!(writes[1].x_milli, 100);

    let outcomes = rig.sink.outcomes();
    assert_eq!(outcomes.len(), 1);
    assert_eq!(outcomes[0].dispatched, 2);
    assert_eq!(outcomes[0].succeeded, 2);
    assert!(outcomes[0].outcomes[1].width_linked);

    // Nothing further pending; a later tick must not re-dispatch.
    rig.settle();
    assert_eq!(rig.writer.corrections().len(), 2);
}

#[test]
fn five_consecutive_ng_yield_exactly_one_emergency() {
    let mut rig = Rig::new();
    rig.warm("bottom-height", 7, 21.70);
    for (i, value) in [21.60, 21.601, 21.602, 21.603, 21.604].iter().enumerate() {
        rig.ingest_one("bottom-height", 7, *value, 1_000 + i as u64 * 1_000);
    }
    assert_eq!(
        rig.actions_for("bottom-height"),
        vec![
            ActionTaken::None,
            ActionTaken::Wait,
            ActionTaken::Applied,
            ActionTaken::WaitConfirm,
            ActionTaken::WaitConfirm,
            ActionTaken::Emergency(EmergencyReason::Streak),
        ]
    );

    rig.settle();
    assert_eq!(rig.writer.emergency_stops(), vec![4001]);

    // A sixth NG keeps the state but never re-dispatches the halt.
    rig.ingest_one("bottom-height", 7, 21.605, 7_000);
    rig.settle();
    assert_eq!(rig.writer.emergency_stops().len(), 1);
}

#[test]
fn large_deviation_forces_emergency_on_the_first_ng() {
    let mut rig = Rig::new();
    rig.warm("outer-diameter-top", 9, 23.050);
    rig.ingest_one("outer-diameter-top", 9, 23.150, 1_000);

    let records = rig.sink.results_for("outer-diameter-top");
    let last = records.last().expect("record emitted");
    assert_eq!(last.judgment, Judgment::High);
    assert_eq!(last.action, ActionTaken::Emergency(EmergencyReason::Magnitude));
    assert_eq!(last.ng_sequence, 1);
    assert!(last.correction <= -0.1);

    rig.settle();
    assert_eq!(rig.writer.emergency_stops(), vec![4002]);
    assert!(rig.writer.corrections().is_empty());
}

#[test]
fn duplicate_resubmission_never_advances_the_streak() {
    let mut rig = Rig::new();
    rig.warm("bottom-height", 7, 21.70);
    rig.ingest_one("bottom-height", 7, 21.60, 1_000);
    assert_eq!(rig.engine.ng_count("bottom-height"), 1);

    // Same value, same timestamp: a re-read, not a new measurement.
    rig.ingest_one("bottom-height", 7, 21.60, 1_000);
    rig.ingest_one("bottom-height", 7, 21.60, 1_000);
    assert_eq!(rig.engine.ng_count("bottom-height"), 1);
    assert_eq!(rig.engine.pending_corrections(), 0);

    // The display still refreshes on every read.
    assert_eq!(rig.sink.results_for("bottom-height").len(), 4);
}

#[test]
fn debounce_restarts_on_each_addition_and_flushes_once() {
    let mut rig = Rig::new();
    rig.warm("bottom-height", 7, 21.70);
    rig.warm("width", 9, 12.40);
    rig.ingest_one("bottom-height", 7, 21.60, 1_000);
    rig.ingest_one("width", 9, 12.33, 1_000);

    // t=0: bottom-height correction accepted (plus its linked width request).
    rig.ingest_one("bottom-height", 7, 21.60, 2_000);
    assert_eq!(rig.engine.pending_corrections(), 2);

    // t=0.2s: width's own correction joins the batch, restarting the window.
    rig.clock.advance(Duration::from_millis(200));
    rig.ingest_one("width", 9, 12.33, 2_000);
    assert_eq!(rig.engine.pending_corrections(), 3);

    // t=0.6s: past the first request's debounce but not the restarted one.
    rig.clock.advance(Duration::from_millis(400));
    rig.engine.tick();
    assert!(rig.sink.outcomes().is_empty());
    assert_eq!(rig.engine.pending_corrections(), 3);

    // t=0.8s: the restarted window has expired; one batch, one flush.
    rig.clock.advance(Duration::from_millis(200));
    rig.engine.tick();
    let outcomes = rig.sink.outcomes();
    assert_eq!(outcomes.len(), 1);
    assert_eq!(outcomes[0].dispatched, 3);
    assert_eq!(rig.engine.pending_corrections(), 0);
}

#[test]
fn failed_write_surfaces_in_outcome_and_leaves_the_streak_intact() {
    let mut rig = Rig::new();
    rig.writer.fail_tool(7, 5);
    rig.warm("bottom-height", 7, 21.70);
    rig.ingest_one("bottom-height", 7, 21.60, 1_000);
    rig.ingest_one("bottom-height", 7, 21.60, 2_000); // correction accepted
    rig.settle();

    let outcomes = rig.sink.outcomes();
    assert_eq!(outcomes.len(), 1);
    assert_eq!(outcomes[0].failed, 1);
    assert_eq!(outcomes[0].succeeded, 1); // linked width write went through
    let failed = outcomes[0].outcomes.iter().find(|o| !o.success).expect("failed entry");
    assert_eq!(failed.tool, 7);
    assert!(failed.error.as_deref().expect("reason").contains("communication timeout"));

    // The failed write did not consume the correction attempt: the streak
    // continues per the ladder, eligible for re-escalation.
    assert_eq!(rig.engine.ng_count("bottom-height"), 2);
    rig.ingest_one("bottom-height", 7, 21.60, 3_000);
    assert_eq!(
        rig.actions_for("bottom-height").last(),
        Some(&ActionTaken::WaitConfirm)
    );
}

#[test]
fn diameter_cross_check_warns_on_persistent_difference() {
    let mut rig = Rig::new();
    rig.ingest_one("outer-diameter-top", 9, 23.10, 1_000);
    rig.ingest_one("outer-diameter-bottom", 4, 23.05, 1_000); // diff 0.05, window not full
    assert!(rig.sink.warnings().is_empty());

    rig.ingest_one("outer-diameter-bottom", 4, 23.06, 2_000); // diff 0.04
    let warnings = rig.sink.warnings();
    assert_eq!(warnings.len(), 1);
    assert!((warnings[0].average_difference - 0.045).abs() < 1e-9);
    assert_eq!(warnings[0].upper_feature, "outer-diameter-top");

    // Advisory only: no correction or halt resulted.
    assert_eq!(rig.engine.pending_corrections(), 0);
}

#[test]
fn non_compensation_targets_are_judged_but_never_acted_on() {
    let mut rig = Rig::new();
    rig.ingest_one("outer-diameter-bottom", 4, 23.50, 1_000); // far out of band
    rig.ingest_one("outer-diameter-bottom", 4, 23.51, 2_000);

    let records = rig.sink.results_for("outer-diameter-bottom");
    assert_eq!(records.len(), 2);
    assert!(records.iter().all(|r| r.judgment == Judgment::High));
    assert!(records.iter().all(|r| r.action == ActionTaken::None));
    assert!(records.iter().all(|r| r.ng_sequence == 0));
    assert_eq!(rig.engine.pending_corrections(), 0);
}

#[test]
fn audit_records_carry_cycle_and_interval_timings() {
    let mut rig = Rig::new();
    rig.warm("bottom-height", 7, 21.70);
    rig.clock.advance(Duration::from_millis(250));
    rig.ingest_one("bottom-height", 7, 21.60, 1_000);
    rig.clock.advance(Duration::from_millis(250));
    rig.ingest_one("bottom-height", 7, 21.60, 2_000);

    let records = rig.audit.records();
    assert_eq!(records.len(), 3);
    assert_eq!(records[0].cycle, 1);
    assert_eq!(records[2].cycle, 3);
    assert_eq!(records[0].interval_ms, None);
    assert_eq!(records[1].interval_ms, Some(250));
    assert_eq!(records[2].interval_ms, Some(250));
    assert!(!records[1].compensated);
    assert!(records[2].compensated);
    assert_eq!(records[2].ng_sequence, 2);
}

#[test]
fn result_records_serialize_for_downstream_sinks() {
    let mut rig = Rig::new();
    rig.warm("bottom-height", 7, 21.70);
    rig.ingest_one("bottom-height", 7, 21.60, 1_000);

    let record = rig.sink.results_for("bottom-height").pop().expect("record");
    let json = serde_json::to_string(&record).expect("serializes");
    assert!(json.contains("\"bottom-height\""));
    assert!(json.contains("\"Wait\""));
}
