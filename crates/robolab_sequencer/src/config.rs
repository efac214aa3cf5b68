// SPDX-License-Identifier: MIT OR Apache-2.0
//! Per-instance robot configuration.
//!
//! Every crane and conveyor is parametrised by one of these structs instead of
//! carrying its own copy of the sequencing logic. Configurations are plain
//! serde types so they can live in the lab settings file.

use crate::state::{Phase, Slot};
use serde::{Deserialize, Serialize};
use std::time::Duration;

/// Configuration errors
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    /// RON parse error
    #[error("Failed to parse config: {0}")]
    Parse(#[from] ron::error::SpannedError),

    /// RON serialization error
    #[error("Failed to serialize config: {0}")]
    Serialize(#[from] ron::Error),

    /// Values that cannot drive a machine
    #[error("Invalid config for {serial}: {reason}")]
    Invalid {
        /// Serial number of the offending machine
        serial: String,
        /// What is wrong
        reason: String,
    },
}

/// Result type for configuration operations
pub type Result<T> = std::result::Result<T, ConfigError>;

fn invalid<T>(serial: &str, reason: impl Into<String>) -> Result<T> {
    Err(ConfigError::Invalid {
        serial: serial.to_string(),
        reason: reason.into(),
    })
}

/// Horizontal offsets of the three slots
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct SlotLayout {
    /// Left slot x
    pub left: f32,
    /// Center slot x
    pub center: f32,
    /// Right slot x
    pub right: f32,
}

impl SlotLayout {
    /// Get the x offset of a slot
    pub fn x(&self, slot: Slot) -> f32 {
        match slot {
            Slot::Left => self.left,
            Slot::Center => self.center,
            Slot::Right => self.right,
        }
    }
}

impl Default for SlotLayout {
    fn default() -> Self {
        Self {
            left: -120.0,
            center: 0.0,
            right: 120.0,
        }
    }
}

/// Phase durations in milliseconds
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct PhaseDurations {
    /// Travel between slots
    pub move_ms: u64,
    /// Opening the claw
    pub open_claw_ms: u64,
    /// Lowering the cable
    pub lower_cable_ms: u64,
    /// Closing the claw
    pub close_claw_ms: u64,
    /// Raising the cable
    pub raise_cable_ms: u64,
}

impl PhaseDurations {
    /// Get the duration of a phase
    pub fn for_phase(&self, phase: Phase) -> Duration {
        let ms = match phase {
            Phase::MoveToPickup | Phase::MoveToDropoff => self.move_ms,
            Phase::OpenClaw => self.open_claw_ms,
            Phase::LowerCable => self.lower_cable_ms,
            Phase::CloseClaw => self.close_claw_ms,
            Phase::RaiseCable => self.raise_cable_ms,
        };
        Duration::from_millis(ms)
    }
}

impl Default for PhaseDurations {
    fn default() -> Self {
        Self {
            move_ms: 1000,
            open_claw_ms: 500,
            lower_cable_ms: 1000,
            close_claw_ms: 500,
            raise_cable_ms: 1000,
        }
    }
}

/// Configuration of a crane/claw machine
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct CraneConfig {
    /// Serial number shown on the machine
    pub serial: String,
    /// A broken machine never powers on
    pub broken: bool,
    /// Slot offsets
    pub slots: SlotLayout,
    /// Slot the item starts in
    pub pickup_slot: Slot,
    /// Slot the item is dropped in
    pub dropoff_slot: Slot,
    /// Vertical offset of the claw when the cable is fully raised
    pub base_height: f32,
    /// Cable length when fully lowered
    pub max_cable_extension: f32,
    /// Fraction of the max extension at which a held item is drawn on the ground
    pub ground_snap_ratio: f32,
    /// Claw angle when open
    pub claw_open_angle: f32,
    /// Claw angle when closed
    pub claw_closed_angle: f32,
    /// Phase timings
    pub durations: PhaseDurations,
}

impl CraneConfig {
    /// Create a default crane with a serial number
    pub fn new(serial: impl Into<String>) -> Self {
        Self {
            serial: serial.into(),
            ..Default::default()
        }
    }

    /// Set phase durations
    pub fn with_durations(mut self, durations: PhaseDurations) -> Self {
        self.durations = durations;
        self
    }

    /// Mark the machine as broken
    pub fn broken(mut self) -> Self {
        self.broken = true;
        self
    }

    /// Vertical offset of an item resting on the ground
    pub fn ground_level(&self) -> f32 {
        self.base_height + self.max_cable_extension
    }

    /// Check that the values can drive a machine
    pub fn validate(&self) -> Result<()> {
        if self.max_cable_extension <= 0.0 {
            return invalid(&self.serial, "max_cable_extension must be positive");
        }
        if !(self.ground_snap_ratio > 0.0 && self.ground_snap_ratio <= 1.0) {
            return invalid(&self.serial, "ground_snap_ratio must be in (0, 1]");
        }
        if self.pickup_slot == self.dropoff_slot {
            return invalid(&self.serial, "pickup and dropoff slots must differ");
        }
        let xs = [self.slots.left, self.slots.center, self.slots.right];
        if !(xs[0] < xs[1] && xs[1] < xs[2]) {
            return invalid(&self.serial, "slots must be ordered left < center < right");
        }
        Ok(())
    }

    /// Parse from a RON string
    pub fn from_ron(source: &str) -> Result<Self> {
        let config: Self = ron::from_str(source)?;
        config.validate()?;
        Ok(config)
    }

    /// Serialize to a pretty RON string
    pub fn to_ron(&self) -> Result<String> {
        Ok(ron::ser::to_string_pretty(self, ron::ser::PrettyConfig::default())?)
    }
}

impl Default for CraneConfig {
    fn default() -> Self {
        Self {
            serial: "CR-001".to_string(),
            broken: false,
            slots: SlotLayout::default(),
            pickup_slot: Slot::Left,
            dropoff_slot: Slot::Right,
            base_height: 40.0,
            max_cable_extension: 120.0,
            ground_snap_ratio: 0.9,
            claw_open_angle: 35.0,
            claw_closed_angle: 0.0,
            durations: PhaseDurations::default(),
        }
    }
}

/// Configuration of a conveyor belt
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ConveyorConfig {
    /// Serial number shown on the machine
    pub serial: String,
    /// A broken belt never powers on
    pub broken: bool,
    /// Position where tokens enter the belt
    pub entry_bound: f32,
    /// Position where tokens leave the belt and wrap
    pub exit_bound: f32,
    /// Belt speed in units per second
    pub speed: f32,
    /// Starting position of each item token
    pub tokens: Vec<f32>,
    /// Integration interval of the belt driver
    pub frame_ms: u64,
}

impl ConveyorConfig {
    /// Create a default conveyor with a serial number
    pub fn new(serial: impl Into<String>) -> Self {
        Self {
            serial: serial.into(),
            ..Default::default()
        }
    }

    /// Length of the belt between its bounds
    pub fn span(&self) -> f32 {
        self.exit_bound - self.entry_bound
    }

    /// Integration interval
    pub fn frame_interval(&self) -> Duration {
        Duration::from_millis(self.frame_ms)
    }

    /// Check that the values can drive a belt
    pub fn validate(&self) -> Result<()> {
        if self.span() <= 0.0 {
            return invalid(&self.serial, "exit_bound must be greater than entry_bound");
        }
        if self.speed < 0.0 {
            return invalid(&self.serial, "speed must not be negative, direction is separate");
        }
        if self.frame_ms == 0 {
            return invalid(&self.serial, "frame_ms must be positive");
        }
        if let Some(pos) = self
            .tokens
            .iter()
            .find(|p| **p < self.entry_bound || **p >= self.exit_bound)
        {
            return invalid(&self.serial, format!("token at {pos} is outside the belt"));
        }
        Ok(())
    }

    /// Parse from a RON string
    pub fn from_ron(source: &str) -> Result<Self> {
        let config: Self = ron::from_str(source)?;
        config.validate()?;
        Ok(config)
    }
}

impl Default for ConveyorConfig {
    fn default() -> Self {
        Self {
            serial: "CB-001".to_string(),
            broken: false,
            entry_bound: 0.0,
            exit_bound: 400.0,
            speed: 80.0,
            tokens: vec![0.0, 100.0, 200.0, 300.0],
            frame_ms: 16,
        }
    }
}
