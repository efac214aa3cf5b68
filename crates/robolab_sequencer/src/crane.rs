// SPDX-License-Identifier: MIT OR Apache-2.0
//! Crane/claw machine sequencer.
//!
//! This module handles:
//! - Power, move, grab and drop commands
//! - Running grab/drop phase plans with timed suspension
//! - Cancelling in-flight runs on power-off
//! - Publishing a snapshot after every mutation

use crate::config::{self, CraneConfig};
use crate::observer::{Subscribers, Subscription};
use crate::outcome::{CommandOutcome, IgnoreReason, RunEnd, SequenceRun};
use crate::phase::{Mutation, PhasePlan};
use crate::position::compute_item_coordinates;
use crate::state::{Command, CraneSnapshot, MachineState, Slot};
use parking_lot::Mutex;
use std::sync::Arc;

/// Mutable part of a crane, guarded by one lock
struct Core {
    state: MachineState,
    /// Bumped by every sequence start and every power-off
    generation: u64,
    /// Bumped by every publish
    revision: u64,
}

impl Core {
    fn snapshot(&self, config: &CraneConfig) -> CraneSnapshot {
        CraneSnapshot {
            serial: config.serial.clone(),
            revision: self.revision,
            state: self.state.clone(),
            item: compute_item_coordinates(&self.state, config),
        }
    }

    fn publish(&mut self, config: &CraneConfig) -> CraneSnapshot {
        self.revision += 1;
        self.snapshot(config)
    }
}

struct Shared {
    config: CraneConfig,
    core: Mutex<Core>,
    subscribers: Subscribers<CraneSnapshot>,
}

/// Handle to a crane instance.
///
/// Clones share the same machine. Sequences run as tokio tasks, so grab and
/// drop must be issued from within a runtime.
#[derive(Clone)]
pub struct Crane {
    shared: Arc<Shared>,
}

impl Crane {
    /// Create a powered-off crane
    pub fn new(config: CraneConfig) -> config::Result<Self> {
        config.validate()?;
        let state = MachineState::powered_off(&config);
        tracing::debug!("Created crane {}", config.serial);

        Ok(Self {
            shared: Arc::new(Shared {
                config,
                core: Mutex::new(Core {
                    state,
                    generation: 0,
                    revision: 0,
                }),
                subscribers: Subscribers::new(),
            }),
        })
    }

    /// Get the configuration
    pub fn config(&self) -> &CraneConfig {
        &self.shared.config
    }

    /// Get the serial number
    pub fn serial(&self) -> &str {
        &self.shared.config.serial
    }

    /// Current snapshot
    pub fn snapshot(&self) -> CraneSnapshot {
        self.shared.core.lock().snapshot(&self.shared.config)
    }

    /// Current machine state
    pub fn state(&self) -> MachineState {
        self.shared.core.lock().state.clone()
    }

    /// Whether a grab or drop sequence is running
    pub fn is_busy(&self) -> bool {
        self.shared.core.lock().state.is_busy()
    }

    /// Register a callback invoked with every published snapshot
    pub fn subscribe(
        &self,
        on_change: impl Fn(&CraneSnapshot) + Send + Sync + 'static,
    ) -> Subscription {
        self.shared.subscribers.subscribe(on_change)
    }

    /// Issue a command.
    ///
    /// Power-off is always accepted. Everything else is ignored while a
    /// sequence runs or when it does not fit the current state.
    pub fn issue_command(&self, command: Command) -> CommandOutcome {
        let outcome = match command {
            Command::PowerOff => self.power_off(),
            Command::PowerOn => self.power_on(),
            Command::MoveLeft => self.step(command, Slot::step_left),
            Command::MoveRight => self.step(command, Slot::step_right),
            Command::GrabItem | Command::DropItem => self.start_sequence(command),
        };

        if let Some(reason) = outcome.ignore_reason() {
            tracing::debug!(
                "Crane {} ignored {command}: {}",
                self.serial(),
                reason.describe()
            );
        }
        outcome
    }

    fn notify(&self, snapshot: &CraneSnapshot) {
        self.shared.subscribers.notify(snapshot.revision, snapshot);
    }

    fn power_off(&self) -> CommandOutcome {
        let config = &self.shared.config;
        let snapshot = {
            let mut core = self.shared.core.lock();
            let reset = MachineState::powered_off(config);
            if core.state == reset {
                return CommandOutcome::Ignored(IgnoreReason::AlreadyInPowerState);
            }

            core.generation += 1;
            if let Some(phase) = core.state.sub_state {
                tracing::info!("Crane {} powered off during {phase}", config.serial);
            } else {
                tracing::info!("Crane {} powered off", config.serial);
            }
            core.state = reset;
            core.publish(config)
        };

        self.notify(&snapshot);
        CommandOutcome::Applied
    }

    fn power_on(&self) -> CommandOutcome {
        let config = &self.shared.config;
        let snapshot = {
            let mut core = self.shared.core.lock();
            if let Some(phase) = core.state.sub_state {
                return CommandOutcome::Ignored(IgnoreReason::Busy(phase));
            }
            if core.state.power {
                return CommandOutcome::Ignored(IgnoreReason::AlreadyInPowerState);
            }
            if config.broken {
                return CommandOutcome::Ignored(IgnoreReason::Broken);
            }

            let mut state = MachineState::powered_off(config);
            state.power = true;
            state.command_state = Command::PowerOn;
            core.state = state;
            tracing::info!("Crane {} powered on", config.serial);
            core.publish(config)
        };

        self.notify(&snapshot);
        CommandOutcome::Applied
    }

    /// Move one slot over; at the edge the command is ignored
    fn step(&self, command: Command, neighbour: fn(Slot) -> Option<Slot>) -> CommandOutcome {
        let config = &self.shared.config;
        let snapshot = {
            let mut core = self.shared.core.lock();
            if let Err(reason) = check_ready(&core.state) {
                return CommandOutcome::Ignored(reason);
            }
            let Some(slot) = neighbour(core.state.slot) else {
                return CommandOutcome::Ignored(IgnoreReason::AlreadyAtSlot);
            };

            Mutation::MoveTo(slot).apply(&mut core.state, config);
            core.state.command_state = command;
            core.publish(config)
        };

        self.notify(&snapshot);
        CommandOutcome::Applied
    }

    fn start_sequence(&self, command: Command) -> CommandOutcome {
        let config = &self.shared.config;
        let (plan, token, snapshot) = {
            let mut core = self.shared.core.lock();
            if let Err(reason) = check_ready(&core.state) {
                return CommandOutcome::Ignored(reason);
            }

            let plan = match command {
                Command::GrabItem if core.state.is_holding_item => {
                    return CommandOutcome::Ignored(IgnoreReason::AlreadyHolding);
                }
                Command::GrabItem => PhasePlan::grab(config, &core.state),
                Command::DropItem if !core.state.is_holding_item => {
                    return CommandOutcome::Ignored(IgnoreReason::NotHolding);
                }
                Command::DropItem => PhasePlan::release(config, &core.state),
                _ => return CommandOutcome::Ignored(IgnoreReason::Unsupported),
            };
            let Some(first) = plan.step(0) else {
                return CommandOutcome::Ignored(IgnoreReason::Unsupported);
            };

            core.generation += 1;
            core.state.command_state = command;
            first.apply_enter(&mut core.state, config);
            tracing::debug!(
                "Crane {} started {command} run {}: {:?}",
                config.serial,
                core.generation,
                plan.phases()
            );
            (plan, core.generation, core.publish(config))
        };

        self.notify(&snapshot);
        let handle = tokio::spawn(self.clone().drive(plan, token));
        CommandOutcome::Started(SequenceRun::new(token, handle))
    }

    /// Walk the plan: wait out each phase, then apply its exit mutations
    /// together with the next phase's entry mutations and publish once.
    async fn drive(self, plan: PhasePlan, token: u64) -> RunEnd {
        let config = &self.shared.config;

        for (index, step) in plan.steps().iter().enumerate() {
            tokio::time::sleep(step.duration).await;

            let snapshot = {
                let mut core = self.shared.core.lock();
                if core.generation != token {
                    tracing::debug!(
                        "Crane {} run {token} cancelled before leaving {}",
                        config.serial,
                        step.phase
                    );
                    return RunEnd::Cancelled;
                }

                step.apply_exit(&mut core.state, config);
                match plan.step(index + 1) {
                    Some(next) => {
                        tracing::debug!("Crane {} {} -> {}", config.serial, step.phase, next.phase);
                        next.apply_enter(&mut core.state, config);
                    }
                    None => core.state.sub_state = None,
                }
                core.publish(config)
            };
            self.notify(&snapshot);
        }

        tracing::debug!("Crane {} run {token} completed", config.serial);
        RunEnd::Completed
    }
}

impl std::fmt::Debug for Crane {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Crane")
            .field("serial", &self.serial())
            .field("state", &self.state())
            .finish()
    }
}

fn check_ready(state: &MachineState) -> Result<(), IgnoreReason> {
    if let Some(phase) = state.sub_state {
        return Err(IgnoreReason::Busy(phase));
    }
    if !state.power {
        return Err(IgnoreReason::Unpowered);
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::PhaseDurations;
    use crate::state::Phase;
    use std::time::Duration;

    fn crane() -> Crane {
        Crane::new(CraneConfig::default()).unwrap()
    }

    #[test]
    fn test_power_off_is_idempotent() {
        let crane = crane();
        let before = crane.snapshot();
        let outcome = crane.issue_command(Command::PowerOff);
        assert_eq!(outcome.ignore_reason(), Some(IgnoreReason::AlreadyInPowerState));
        assert_eq!(crane.snapshot(), before);
    }

    #[test]
    fn test_commands_ignored_while_unpowered() {
        let crane = crane();
        for command in [Command::MoveLeft, Command::MoveRight, Command::GrabItem, Command::DropItem] {
            let outcome = crane.issue_command(command);
            assert_eq!(outcome.ignore_reason(), Some(IgnoreReason::Unpowered));
        }
        assert_eq!(crane.state(), MachineState::powered_off(crane.config()));
    }

    #[test]
    fn test_move_sets_slot_immediately() {
        let crane = crane();
        assert!(crane.issue_command(Command::PowerOn).is_accepted());
        assert!(crane.issue_command(Command::MoveRight).is_accepted());

        let state = crane.state();
        assert_eq!(state.slot, Slot::Right);
        assert_eq!(state.position, crane.config().slots.right);
        assert_eq!(state.command_state, Command::MoveRight);
        assert_eq!(
            crane.issue_command(Command::MoveRight).ignore_reason(),
            Some(IgnoreReason::AlreadyAtSlot)
        );
    }

    #[test]
    fn test_move_left_steps_through_center() {
        let crane = crane();
        crane.issue_command(Command::PowerOn);
        crane.issue_command(Command::MoveRight);
        let slots = crane.config().slots;

        assert!(crane.issue_command(Command::MoveLeft).is_accepted());
        assert_eq!(crane.state().slot, Slot::Center);
        assert_eq!(crane.state().position, slots.center);

        assert!(crane.issue_command(Command::MoveLeft).is_accepted());
        assert_eq!(crane.state().slot, Slot::Left);
        assert_eq!(crane.state().position, slots.left);

        let before = crane.snapshot();
        assert_eq!(
            crane.issue_command(Command::MoveLeft).ignore_reason(),
            Some(IgnoreReason::AlreadyAtSlot)
        );
        assert_eq!(crane.snapshot(), before);
    }

    #[test]
    fn test_drop_without_item_is_noop() {
        let crane = crane();
        crane.issue_command(Command::PowerOn);
        let before = crane.snapshot();
        assert_eq!(
            crane.issue_command(Command::DropItem).ignore_reason(),
            Some(IgnoreReason::NotHolding)
        );
        assert_eq!(crane.snapshot(), before);
    }

    #[test]
    fn test_broken_crane_stays_off() {
        let crane = Crane::new(CraneConfig::new("CR-666").broken()).unwrap();
        assert_eq!(
            crane.issue_command(Command::PowerOn).ignore_reason(),
            Some(IgnoreReason::Broken)
        );
        assert!(!crane.state().power);
    }

    #[tokio::test(start_paused = true)]
    async fn test_grab_publishes_each_phase() {
        let crane = crane();
        let trace = Arc::new(Mutex::new(Vec::new()));
        let _sub = {
            let trace = Arc::clone(&trace);
            crane.subscribe(move |snap| trace.lock().push(snap.state.sub_state))
        };

        crane.issue_command(Command::PowerOn);
        let outcome = crane.issue_command(Command::GrabItem);
        assert_eq!(outcome.finished().await, Some(RunEnd::Completed));

        assert_eq!(
            *trace.lock(),
            vec![
                None,
                Some(Phase::MoveToPickup),
                Some(Phase::OpenClaw),
                Some(Phase::LowerCable),
                Some(Phase::CloseClaw),
                Some(Phase::RaiseCable),
                None,
            ]
        );
        let state = crane.state();
        assert!(state.is_holding_item);
        assert!(!state.grabbed_at_ground);
        assert_eq!(state.cable_extension, 0.0);
    }

    #[tokio::test(start_paused = true)]
    async fn test_busy_rejects_commands() {
        let crane = Crane::new(CraneConfig::default().with_durations(PhaseDurations {
            move_ms: 100,
            open_claw_ms: 100,
            lower_cable_ms: 100,
            close_claw_ms: 100,
            raise_cable_ms: 100,
        }))
        .unwrap();
        crane.issue_command(Command::PowerOn);
        let run = crane.issue_command(Command::GrabItem);
        assert!(crane.is_busy());

        for command in [Command::PowerOn, Command::MoveLeft, Command::GrabItem, Command::DropItem] {
            assert!(matches!(
                crane.issue_command(command).ignore_reason(),
                Some(IgnoreReason::Busy(_))
            ));
        }

        run.finished().await;
        assert!(!crane.is_busy());
        assert_eq!(
            crane.issue_command(Command::GrabItem).ignore_reason(),
            Some(IgnoreReason::AlreadyHolding)
        );
    }

    #[tokio::test(start_paused = true)]
    async fn test_power_off_cancels_run() {
        let crane = crane();
        crane.issue_command(Command::PowerOn);
        let CommandOutcome::Started(run) = crane.issue_command(Command::GrabItem) else {
            panic!("grab should start a sequence");
        };

        tokio::time::sleep(Duration::from_millis(250)).await;
        assert!(crane.issue_command(Command::PowerOff).is_accepted());
        assert_eq!(run.finished().await, RunEnd::Cancelled);
        assert_eq!(crane.state(), MachineState::powered_off(crane.config()));
    }
}
