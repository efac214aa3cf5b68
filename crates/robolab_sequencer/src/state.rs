// SPDX-License-Identifier: MIT OR Apache-2.0
//! Machine state published by the robot sequencers.

use crate::config::CraneConfig;
use serde::{Deserialize, Serialize};

/// Top-level command accepted by a robot
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Default)]
#[serde(rename_all = "kebab-case")]
pub enum Command {
    /// Emergency stop and full reset
    #[default]
    PowerOff,
    /// Power the machine on
    PowerOn,
    /// Move the actor to the left slot
    MoveLeft,
    /// Move the actor to the right slot
    MoveRight,
    /// Pick up the item
    GrabItem,
    /// Release the held item
    DropItem,
}

impl Command {
    /// Get the display name
    pub fn name(&self) -> &'static str {
        match self {
            Self::PowerOff => "power-off",
            Self::PowerOn => "power-on",
            Self::MoveLeft => "move-left",
            Self::MoveRight => "move-right",
            Self::GrabItem => "grab-item",
            Self::DropItem => "drop-item",
        }
    }

    /// Get all commands
    pub fn all() -> &'static [Command] {
        &[
            Self::PowerOff,
            Self::PowerOn,
            Self::MoveLeft,
            Self::MoveRight,
            Self::GrabItem,
            Self::DropItem,
        ]
    }
}

impl std::fmt::Display for Command {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.name())
    }
}

/// One step of a grab or drop sequence
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum Phase {
    /// Travel to the slot the item rests in
    MoveToPickup,
    /// Travel to the dropoff slot
    MoveToDropoff,
    /// Open the claw
    OpenClaw,
    /// Extend the cable down to the ground
    LowerCable,
    /// Close the claw
    CloseClaw,
    /// Retract the cable
    RaiseCable,
}

impl Phase {
    /// Get the display name
    pub fn name(&self) -> &'static str {
        match self {
            Self::MoveToPickup => "move-to-pickup-slot",
            Self::MoveToDropoff => "move-to-dropoff-slot",
            Self::OpenClaw => "open-claw",
            Self::LowerCable => "lower-cable",
            Self::CloseClaw => "close-claw",
            Self::RaiseCable => "raise-cable",
        }
    }
}

impl std::fmt::Display for Phase {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.name())
    }
}

/// Fixed horizontal position an actor or item can occupy
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Default)]
#[serde(rename_all = "kebab-case")]
pub enum Slot {
    /// Left slot
    Left,
    /// Center slot
    #[default]
    Center,
    /// Right slot
    Right,
}

impl Slot {
    /// Get the display name
    pub fn name(&self) -> &'static str {
        match self {
            Self::Left => "left",
            Self::Center => "center",
            Self::Right => "right",
        }
    }

    /// Get all slots from left to right
    pub fn all() -> &'static [Slot] {
        &[Self::Left, Self::Center, Self::Right]
    }

    /// Neighbouring slot to the left, `None` at the edge
    pub fn step_left(self) -> Option<Slot> {
        match self {
            Self::Left => None,
            Self::Center => Some(Self::Left),
            Self::Right => Some(Self::Center),
        }
    }

    /// Neighbouring slot to the right, `None` at the edge
    pub fn step_right(self) -> Option<Slot> {
        match self {
            Self::Left => Some(Self::Center),
            Self::Center => Some(Self::Right),
            Self::Right => None,
        }
    }
}

/// 2D coordinates of the item in widget space (y grows downward)
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize, Default)]
pub struct ItemCoordinates {
    /// Horizontal offset
    pub x: f32,
    /// Vertical offset
    pub y: f32,
}

impl ItemCoordinates {
    /// Create coordinates
    pub fn new(x: f32, y: f32) -> Self {
        Self { x, y }
    }
}

/// State of a crane instance
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MachineState {
    /// Whether the machine is powered
    pub power: bool,
    /// Last accepted command
    pub command_state: Command,
    /// Phase currently executing, `None` when idle
    pub sub_state: Option<Phase>,
    /// Slot the actor occupies
    pub slot: Slot,
    /// Horizontal actor offset
    pub position: f32,
    /// Cable extension, 0 is fully raised
    pub cable_extension: f32,
    /// Claw angle in degrees
    pub claw_angle: f32,
    /// Whether the claw holds the item
    pub is_holding_item: bool,
    /// Slot the item last rested in
    pub item_slot: Slot,
    /// Last resting coordinates of the item
    pub item_position: ItemCoordinates,
    /// Set between the claw closing on the ground and the cable finishing its lift
    pub grabbed_at_ground: bool,
}

impl MachineState {
    /// Canonical power-off state for a crane
    pub fn powered_off(config: &CraneConfig) -> Self {
        let item_slot = config.pickup_slot;
        Self {
            power: false,
            command_state: Command::PowerOff,
            sub_state: None,
            slot: Slot::Center,
            position: config.slots.x(Slot::Center),
            cable_extension: 0.0,
            claw_angle: config.claw_closed_angle,
            is_holding_item: false,
            item_slot,
            item_position: ItemCoordinates::new(config.slots.x(item_slot), config.ground_level()),
            grabbed_at_ground: false,
        }
    }

    /// Whether a grab or drop sequence is running
    pub fn is_busy(&self) -> bool {
        self.sub_state.is_some()
    }
}

/// Read-only view of a crane pushed to observers after every mutation
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct CraneSnapshot {
    /// Serial number of the machine
    pub serial: String,
    /// Monotonic publish counter
    pub revision: u64,
    /// Machine state
    pub state: MachineState,
    /// Derived item coordinates
    pub item: ItemCoordinates,
}
