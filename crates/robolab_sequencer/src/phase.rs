// SPDX-License-Identifier: MIT OR Apache-2.0
//! Declarative phase plans for crane sequences.
//!
//! A plan is an ordered list of steps. Each step names its phase, the field
//! mutations applied when it starts and when it ends, and how long it lasts.
//! The crane driver walks any plan the same way, so grab and drop are pure data.

use crate::config::CraneConfig;
use crate::state::{ItemCoordinates, MachineState, Phase, Slot};
use std::time::Duration;

/// A single field mutation on the machine state
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum Mutation {
    /// Move the actor to a slot
    MoveTo(Slot),
    /// Set the cable extension
    Cable(f32),
    /// Set the claw angle
    Claw(f32),
    /// Set whether the item is held
    Holding(bool),
    /// Set the anti-jump flag
    GrabbedAtGround(bool),
    /// Put the item on the ground below the actor
    RestItemBelowActor,
}

impl Mutation {
    /// Apply the mutation
    pub fn apply(&self, state: &mut MachineState, config: &CraneConfig) {
        match *self {
            Mutation::MoveTo(slot) => {
                state.slot = slot;
                state.position = config.slots.x(slot);
            }
            Mutation::Cable(extension) => state.cable_extension = extension,
            Mutation::Claw(angle) => state.claw_angle = angle,
            Mutation::Holding(holding) => state.is_holding_item = holding,
            Mutation::GrabbedAtGround(flag) => state.grabbed_at_ground = flag,
            Mutation::RestItemBelowActor => {
                state.item_slot = state.slot;
                state.item_position = ItemCoordinates::new(state.position, config.ground_level());
            }
        }
    }
}

/// One step of a plan
#[derive(Debug, Clone, PartialEq)]
pub struct PhaseStep {
    /// Phase name published as the sub-state
    pub phase: Phase,
    /// Mutations applied when the phase starts
    pub enter: Vec<Mutation>,
    /// Mutations applied when the phase ends
    pub exit: Vec<Mutation>,
    /// How long the phase lasts
    pub duration: Duration,
}

impl PhaseStep {
    fn new(phase: Phase, config: &CraneConfig) -> Self {
        Self {
            phase,
            enter: Vec::new(),
            exit: Vec::new(),
            duration: config.durations.for_phase(phase),
        }
    }

    fn on_enter(mut self, mutation: Mutation) -> Self {
        self.enter.push(mutation);
        self
    }

    fn on_exit(mut self, mutation: Mutation) -> Self {
        self.exit.push(mutation);
        self
    }

    /// Apply the entry mutations and publish this phase as the sub-state
    pub fn apply_enter(&self, state: &mut MachineState, config: &CraneConfig) {
        state.sub_state = Some(self.phase);
        for mutation in &self.enter {
            mutation.apply(state, config);
        }
    }

    /// Apply the exit mutations
    pub fn apply_exit(&self, state: &mut MachineState, config: &CraneConfig) {
        for mutation in &self.exit {
            mutation.apply(state, config);
        }
    }
}

/// Ordered list of phase steps
#[derive(Debug, Clone, PartialEq, Default)]
pub struct PhasePlan {
    steps: Vec<PhaseStep>,
}

impl PhasePlan {
    /// Plan for picking up the item from where it rests
    pub fn grab(config: &CraneConfig, state: &MachineState) -> Self {
        let mut steps = Vec::with_capacity(5);
        if state.slot != state.item_slot {
            steps.push(
                PhaseStep::new(Phase::MoveToPickup, config)
                    .on_enter(Mutation::MoveTo(state.item_slot)),
            );
        }
        steps.push(
            PhaseStep::new(Phase::OpenClaw, config)
                .on_enter(Mutation::Claw(config.claw_open_angle)),
        );
        steps.push(
            PhaseStep::new(Phase::LowerCable, config)
                .on_enter(Mutation::Cable(config.max_cable_extension)),
        );
        steps.push(
            PhaseStep::new(Phase::CloseClaw, config)
                .on_enter(Mutation::Claw(config.claw_closed_angle))
                .on_exit(Mutation::Holding(true))
                .on_exit(Mutation::GrabbedAtGround(true)),
        );
        steps.push(
            PhaseStep::new(Phase::RaiseCable, config)
                .on_enter(Mutation::Cable(0.0))
                .on_exit(Mutation::GrabbedAtGround(false)),
        );
        Self { steps }
    }

    /// Plan for releasing the held item over the dropoff slot
    pub fn release(config: &CraneConfig, state: &MachineState) -> Self {
        let mut steps = Vec::with_capacity(3);
        if state.slot != config.dropoff_slot {
            steps.push(
                PhaseStep::new(Phase::MoveToDropoff, config)
                    .on_enter(Mutation::MoveTo(config.dropoff_slot)),
            );
        }
        steps.push(
            PhaseStep::new(Phase::OpenClaw, config)
                .on_enter(Mutation::Claw(config.claw_open_angle))
                .on_exit(Mutation::Holding(false))
                .on_exit(Mutation::RestItemBelowActor),
        );
        steps.push(
            PhaseStep::new(Phase::CloseClaw, config)
                .on_enter(Mutation::Claw(config.claw_closed_angle)),
        );
        Self { steps }
    }

    /// Get a step by index
    pub fn step(&self, index: usize) -> Option<&PhaseStep> {
        self.steps.get(index)
    }

    /// Get all steps
    pub fn steps(&self) -> &[PhaseStep] {
        &self.steps
    }

    /// Phase names in execution order
    pub fn phases(&self) -> Vec<Phase> {
        self.steps.iter().map(|s| s.phase).collect()
    }

    /// Number of steps
    pub fn len(&self) -> usize {
        self.steps.len()
    }

    /// Whether the plan has no steps
    pub fn is_empty(&self) -> bool {
        self.steps.is_empty()
    }

    /// Sum of all step durations
    pub fn total_duration(&self) -> Duration {
        self.steps.iter().map(|s| s.duration).sum()
    }
}
