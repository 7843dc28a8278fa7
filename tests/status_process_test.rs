//! Integration tests for the status aggregator.
//!
//! Exercises the partial-result contract: per-role failures stay isolated,
//! every run rebuilds the snapshot from scratch, and progress notifications
//! follow the fixed role order.

use probe_daq::instrument::mock::{
    MockElectrometer, MockEnvironmentBox, MockLcrMeter, MockMotionTable, MockSourceMeter,
    MockSwitchingMatrix,
};
use probe_daq::instrument::LcrReading;
use probe_daq::registry::InstrumentRegistry;
use probe_daq::state::ProcessState;
use probe_daq::status::{StatusProcess, STATUS_STEPS};
use serde_json::json;
use std::sync::Arc;
use tokio::sync::mpsc;

fn full_registry() -> InstrumentRegistry {
    let mut registry = InstrumentRegistry::new();
    registry.set_matrix(Box::new(
        MockSwitchingMatrix::new("Keithley 707B").with_closed(&["1A01", "1B02"]),
    ));
    registry.set_hvsrc(Box::new(MockSourceMeter::new("Keithley 2410")));
    registry.set_vsrc(Box::new(MockSourceMeter::new("Keithley 2657A")));
    registry.set_lcr(Box::new(MockLcrMeter::new(
        "Keysight E4980A",
        LcrReading {
            primary: 2e-12,
            secondary: 1e6,
        },
    )));
    registry.set_elm(Box::new(MockElectrometer::new("Keithley 6517B", 1e-12)));
    registry.set_table(Box::new(MockMotionTable::new("Corvus TT", (3, 3, 3))));
    registry.set_environ(Box::new(MockEnvironmentBox::new(
        "HEPHY EnvironBox",
        json!({"box_temperature": 24.5, "box_humidity": 41.2}),
    )));
    registry
}

#[tokio::test]
async fn test_all_roles_populate() {
    let state = ProcessState::new();
    let process = StatusProcess::new(Arc::new(full_registry()), state.clone());

    let snapshot = process.run().await;

    assert_eq!(snapshot.matrix_model, "Keithley 707B");
    assert_eq!(snapshot.matrix_channels, "1A01, 1B02");
    assert_eq!(snapshot.hvsrc_model, "Keithley 2410");
    assert_eq!(snapshot.vsrc_model, "Keithley 2657A");
    assert_eq!(snapshot.lcr_model, "Keysight E4980A");
    assert_eq!(snapshot.elm_model, "Keithley 6517B");
    assert_eq!(snapshot.table_model, "Corvus TT");
    assert_eq!(snapshot.table_state, "CALIBRATED");
    assert_eq!(snapshot.env_model, "HEPHY EnvironBox");
    assert_eq!(
        snapshot.env_pc_data,
        Some(json!({"box_temperature": 24.5, "box_humidity": 41.2}))
    );
    // The snapshot lands in shared state as well.
    assert_eq!(state.status(), snapshot);
}

#[tracing_test::traced_test]
#[tokio::test]
async fn test_one_failing_role_is_isolated() {
    let mut registry = full_registry();
    registry.set_hvsrc(Box::new(
        MockSourceMeter::new("Keithley 2410").failing_identify(),
    ));
    let process = StatusProcess::new(Arc::new(registry), ProcessState::new());

    let snapshot = process.run().await;

    assert!(logs_contain("status query failed"));
    assert_eq!(snapshot.hvsrc_model, "", "failed role stays at default");
    assert_eq!(snapshot.matrix_model, "Keithley 707B");
    assert_eq!(snapshot.vsrc_model, "Keithley 2657A");
    assert_eq!(snapshot.lcr_model, "Keysight E4980A");
    assert_eq!(snapshot.elm_model, "Keithley 6517B");
    assert_eq!(snapshot.table_model, "Corvus TT");
    assert_eq!(snapshot.env_model, "HEPHY EnvironBox");
}

#[tokio::test]
async fn test_unconfigured_roles_leave_defaults() {
    // Only the LCR is configured; every other role fails acquisition.
    let mut registry = InstrumentRegistry::new();
    registry.set_lcr(Box::new(MockLcrMeter::new(
        "Keysight E4980A",
        LcrReading {
            primary: 0.0,
            secondary: 0.0,
        },
    )));
    let process = StatusProcess::new(Arc::new(registry), ProcessState::new());

    let snapshot = process.run().await;

    assert_eq!(snapshot.lcr_model, "Keysight E4980A");
    assert_eq!(snapshot.matrix_model, "");
    assert_eq!(snapshot.hvsrc_model, "");
    assert_eq!(snapshot.table_state, "");
    assert!(snapshot.env_pc_data.is_none());
}

#[tokio::test]
async fn test_partially_calibrated_table() {
    let mut registry = full_registry();
    registry.set_table(Box::new(MockMotionTable::new("Corvus TT", (3, 1, 3))));
    let process = StatusProcess::new(Arc::new(registry), ProcessState::new());

    let snapshot = process.run().await;
    assert_eq!(snapshot.table_state, "NOT CALIBRATED");
}

#[tokio::test]
async fn test_progress_notifications() {
    let (tx, mut rx) = mpsc::unbounded_channel();
    let process =
        StatusProcess::new(Arc::new(full_registry()), ProcessState::new()).with_progress(tx);

    process.run().await;

    let mut events = Vec::new();
    while let Ok(event) = rx.try_recv() {
        events.push(event);
    }

    assert_eq!(events.len(), STATUS_STEPS + 1);
    for (index, event) in events.iter().take(STATUS_STEPS).enumerate() {
        assert_eq!(event.step, index);
        assert_eq!(event.total, STATUS_STEPS);
        assert!(!event.message.is_empty());
    }
    let last = events.last().expect("final event");
    assert_eq!((last.step, last.total), (STATUS_STEPS, STATUS_STEPS));
    assert!(last.message.is_empty());
}

#[tokio::test]
async fn test_snapshot_fields_reset_between_runs() {
    let state = ProcessState::new();
    let process = StatusProcess::new(Arc::new(full_registry()), state.clone());
    let first = process.run().await;
    assert_eq!(first.hvsrc_model, "Keithley 2410");

    // Second run against a registry whose hvsrc now fails: the stale model
    // string from the first run must not survive.
    let mut registry = full_registry();
    registry.set_hvsrc(Box::new(
        MockSourceMeter::new("Keithley 2410").failing_identify(),
    ));
    let process = StatusProcess::new(Arc::new(registry), state.clone());
    let second = process.run().await;
    assert_eq!(second.hvsrc_model, "");
    assert_eq!(state.status().hvsrc_model, "");
}
