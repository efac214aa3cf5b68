// SPDX-License-Identifier: MIT OR Apache-2.0
//! Robot sequencer for RoboLab.
//!
//! This crate drives the animated robots of the lab:
//! - Crane/claw machines with timed grab and drop sequences
//! - Conveyor belts with continuously moving item tokens
//! - Item coordinate derivation for the presentation layer
//! - Factories owning many independent robots
//!
//! ## Architecture
//!
//! The sequencer is built on:
//! - Declarative phase plans walked by one cancellable driver
//! - Generation tokens so power-off invalidates in-flight runs
//! - Snapshot subscriptions pushed after every mutation
//! - Per-instance configuration (durations, slot layout, broken flag) loaded from RON

pub mod config;
pub mod conveyor;
pub mod crane;
pub mod factory;
pub mod observer;
pub mod outcome;
pub mod phase;
pub mod position;
pub mod state;

pub use config::{ConfigError, ConveyorConfig, CraneConfig, PhaseDurations, SlotLayout};
pub use conveyor::{BeltDriver, BeltSnapshot, BeltState, BeltToken, Conveyor, Direction, TokenId};
pub use crane::Crane;
pub use factory::{Factory, Robot, RobotId};
pub use observer::{SubscriberId, Subscribers, Subscription};
pub use outcome::{CommandOutcome, IgnoreReason, RunEnd, SequenceRun};
pub use phase::{Mutation, PhasePlan, PhaseStep};
pub use position::compute_item_coordinates;
pub use state::{Command, CraneSnapshot, ItemCoordinates, MachineState, Phase, Slot};
