// SPDX-License-Identifier: MIT OR Apache-2.0
//! Crane and belt sequencing scenarios driven through the public API.
use parking_lot::Mutex;
use robolab_sequencer::{
    Command, CommandOutcome, Conveyor, ConveyorConfig, Crane, CraneConfig, CraneSnapshot,
    MachineState, Phase, PhaseDurations, RunEnd, Slot,
};
use std::sync::{mpsc, Arc};
use std::time::Duration;

/// Crane plus a log of every snapshot it publishes
fn recorded_crane(config: CraneConfig) -> (Crane, Arc<Mutex<Vec<CraneSnapshot>>>) {
    let crane = Crane::new(config).unwrap();
    let log = Arc::new(Mutex::new(Vec::new()));
    let sink = Arc::clone(&log);
    crane.subscribe(move |snap| sink.lock().push(snap.clone())).detach();
    (crane, log)
}

fn trace(log: &Mutex<Vec<CraneSnapshot>>) -> Vec<Option<Phase>> {
    log.lock().iter().map(|s| s.state.sub_state).collect()
}

#[tokio::test(start_paused = true)]
async fn test_grab_at_pickup_slot_trace() {
    let (crane, log) = recorded_crane(CraneConfig::default());

    crane.issue_command(Command::PowerOff);
    crane.issue_command(Command::PowerOn);
    crane.issue_command(Command::MoveLeft);
    log.lock().clear();

    let end = crane.issue_command(Command::GrabItem).finished().await;
    assert_eq!(end, Some(RunEnd::Completed));
    assert_eq!(
        trace(&log),
        vec![
            Some(Phase::OpenClaw),
            Some(Phase::LowerCable),
            Some(Phase::CloseClaw),
            Some(Phase::RaiseCable),
            None,
        ]
    );

    let state = crane.state();
    assert!(state.is_holding_item);
    assert_eq!(state.sub_state, None);
    assert_eq!(state.cable_extension, 0.0);
    assert_eq!(state.command_state, Command::GrabItem);
}

#[tokio::test(start_paused = true)]
async fn test_held_item_stays_on_ground_until_lift_finishes() {
    let config = CraneConfig::default();
    let ground = config.ground_level();
    let base = config.base_height;
    let (crane, log) = recorded_crane(config);

    crane.issue_command(Command::PowerOn);
    crane.issue_command(Command::GrabItem).finished().await;

    let snapshots = log.lock().clone();
    let (last, during) = snapshots.split_last().unwrap();
    assert!(during.iter().all(|s| s.item.y == ground));
    assert_eq!(last.item.y, base);

    let raise = during
        .iter()
        .find(|s| s.state.sub_state == Some(Phase::RaiseCable))
        .unwrap();
    assert!(raise.state.is_holding_item);
    assert!(raise.state.grabbed_at_ground);
    assert_eq!(raise.state.cable_extension, 0.0);
}

#[tokio::test(start_paused = true)]
async fn test_drop_trace_and_resting_position() {
    let config = CraneConfig::default();
    let dropoff_x = config.slots.right;
    let ground = config.ground_level();
    let (crane, log) = recorded_crane(config);

    crane.issue_command(Command::PowerOn);
    crane.issue_command(Command::GrabItem).finished().await;
    log.lock().clear();

    let end = crane.issue_command(Command::DropItem).finished().await;
    assert_eq!(end, Some(RunEnd::Completed));
    assert_eq!(
        trace(&log),
        vec![
            Some(Phase::MoveToDropoff),
            Some(Phase::OpenClaw),
            Some(Phase::CloseClaw),
            None,
        ]
    );

    let snap = crane.snapshot();
    assert!(!snap.state.is_holding_item);
    assert_eq!(snap.state.item_slot, Slot::Right);
    assert_eq!(snap.item.x, dropoff_x);
    assert_eq!(snap.item.y, ground);
}

#[tokio::test(start_paused = true)]
async fn test_power_off_mid_lower_cable_resets() {
    let config = CraneConfig::default();
    let d = config.durations;
    let (crane, log) = recorded_crane(config);

    crane.issue_command(Command::PowerOn);
    let CommandOutcome::Started(run) = crane.issue_command(Command::GrabItem) else {
        panic!("grab should start a sequence");
    };

    let mid_lower = d.move_ms + d.open_claw_ms + d.lower_cable_ms / 2;
    tokio::time::sleep(Duration::from_millis(mid_lower)).await;
    assert_eq!(crane.state().sub_state, Some(Phase::LowerCable));

    assert!(crane.issue_command(Command::PowerOff).is_accepted());
    let published = log.lock().len();
    let revision = crane.snapshot().revision;

    // Let every timer of the cancelled run fire.
    tokio::time::sleep(Duration::from_secs(10)).await;
    assert_eq!(run.finished().await, RunEnd::Cancelled);

    assert_eq!(crane.state(), MachineState::powered_off(crane.config()));
    assert_eq!(log.lock().len(), published);
    assert_eq!(crane.snapshot().revision, revision);
}

#[tokio::test(flavor = "multi_thread", worker_threads = 2)]
async fn test_power_off_from_another_thread_is_seen_last() {
    let crane = Crane::new(CraneConfig::new("CR-MT").with_durations(PhaseDurations {
        move_ms: 5,
        open_claw_ms: 5,
        lower_cable_ms: 50,
        close_claw_ms: 5,
        raise_cable_ms: 5,
    }))
    .unwrap();

    // First subscriber stalls the LowerCable delivery until released.
    let (entered_tx, entered_rx) = mpsc::channel::<()>();
    let (release_tx, release_rx) = mpsc::channel::<()>();
    let gate = Mutex::new((entered_tx, release_rx));
    crane
        .subscribe(move |snap| {
            if snap.state.sub_state == Some(Phase::LowerCable) {
                let gate = gate.lock();
                let _ = gate.0.send(());
                let _ = gate.1.recv();
            }
        })
        .detach();

    let last = Arc::new(Mutex::new(None));
    let sink = Arc::clone(&last);
    crane
        .subscribe(move |snap| *sink.lock() = Some(snap.clone()))
        .detach();

    crane.issue_command(Command::PowerOn);
    let run = crane.issue_command(Command::GrabItem);
    entered_rx
        .recv_timeout(Duration::from_secs(5))
        .expect("LowerCable was never published");

    let remote = crane.clone();
    let accepted = std::thread::spawn(move || remote.issue_command(Command::PowerOff).is_accepted())
        .join()
        .unwrap();
    assert!(accepted);
    release_tx.send(()).unwrap();

    assert_eq!(run.finished().await, Some(RunEnd::Cancelled));
    let seen = last.lock().clone().unwrap();
    assert_eq!(seen, crane.snapshot());
    assert!(!seen.state.power);
    assert_eq!(seen.state.sub_state, None);
}

#[tokio::test(start_paused = true)]
async fn test_stale_run_does_not_touch_new_run() {
    let (crane, log) = recorded_crane(CraneConfig::default());

    crane.issue_command(Command::PowerOn);
    let stale = crane.issue_command(Command::GrabItem);
    tokio::time::sleep(Duration::from_millis(1200)).await;
    crane.issue_command(Command::PowerOff);
    crane.issue_command(Command::PowerOn);
    log.lock().clear();

    let fresh = crane.issue_command(Command::GrabItem);
    assert_eq!(fresh.finished().await, Some(RunEnd::Completed));
    assert_eq!(stale.finished().await, Some(RunEnd::Cancelled));

    assert_eq!(
        trace(&log),
        vec![
            Some(Phase::MoveToPickup),
            Some(Phase::OpenClaw),
            Some(Phase::LowerCable),
            Some(Phase::CloseClaw),
            Some(Phase::RaiseCable),
            None,
        ]
    );
    assert!(crane.state().is_holding_item);
}

#[tokio::test(start_paused = true)]
async fn test_unpowered_grab_runs_nothing() {
    let (crane, log) = recorded_crane(CraneConfig::default());
    let before = crane.snapshot();

    assert!(crane.issue_command(Command::GrabItem).is_ignored());
    tokio::time::sleep(Duration::from_secs(10)).await;

    assert_eq!(crane.snapshot(), before);
    assert!(log.lock().is_empty());
}

#[tokio::test(start_paused = true)]
async fn test_cranes_run_independently() {
    let (a, _) = recorded_crane(CraneConfig::new("CR-A"));
    let (b, _) = recorded_crane(CraneConfig::new("CR-B"));
    a.issue_command(Command::PowerOn);
    b.issue_command(Command::PowerOn);

    let run_a = a.issue_command(Command::GrabItem);
    let run_b = b.issue_command(Command::GrabItem);
    tokio::time::sleep(Duration::from_millis(500)).await;
    b.issue_command(Command::PowerOff);

    assert_eq!(run_a.finished().await, Some(RunEnd::Completed));
    assert_eq!(run_b.finished().await, Some(RunEnd::Cancelled));
    assert!(a.state().is_holding_item);
    assert!(!b.state().power);
}

#[test]
fn test_belt_wraps_exactly_to_entry() {
    let config = ConveyorConfig {
        serial: "CB-W".to_string(),
        entry_bound: 20.0,
        exit_bound: 220.0,
        speed: 50.0,
        tokens: vec![20.0],
        ..Default::default()
    };
    let belt = Conveyor::new(config).unwrap();
    belt.issue_command(Command::PowerOn);

    // T = (exit - entry) / speed
    belt.tick(Duration::from_secs(4));
    assert_eq!(belt.state().tokens[0].position, 20.0);
}
