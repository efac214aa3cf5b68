// SPDX-License-Identifier: MIT OR Apache-2.0
//! Factory owning a line of independent robots.

use crate::config::{self, ConveyorConfig, CraneConfig};
use crate::conveyor::{BeltDriver, Conveyor};
use crate::crane::Crane;
use crate::outcome::CommandOutcome;
use crate::state::Command;
use indexmap::IndexMap;
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// Unique identifier for a robot in a factory
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct RobotId(pub Uuid);

impl RobotId {
    /// Create a new random robot ID
    pub fn new() -> Self {
        Self(Uuid::new_v4())
    }
}

impl Default for RobotId {
    fn default() -> Self {
        Self::new()
    }
}

/// A robot owned by a factory
#[derive(Debug)]
pub enum Robot {
    /// Crane/claw machine
    Crane(Crane),
    /// Conveyor belt with its integration task, if started
    Conveyor {
        /// The belt
        belt: Conveyor,
        /// Running driver
        driver: Option<BeltDriver>,
    },
}

impl Robot {
    /// Get the serial number
    pub fn serial(&self) -> &str {
        match self {
            Self::Crane(crane) => crane.serial(),
            Self::Conveyor { belt, .. } => belt.serial(),
        }
    }

    /// Issue a command to the robot
    pub fn issue_command(&self, command: Command) -> CommandOutcome {
        match self {
            Self::Crane(crane) => crane.issue_command(command),
            Self::Conveyor { belt, .. } => belt.issue_command(command),
        }
    }

    /// Whether the robot is powered
    pub fn is_powered(&self) -> bool {
        match self {
            Self::Crane(crane) => crane.state().power,
            Self::Conveyor { belt, .. } => belt.state().power,
        }
    }
}

/// Ordered collection of robots, each with private state
#[derive(Debug, Default)]
pub struct Factory {
    robots: IndexMap<RobotId, Robot>,
}

impl Factory {
    /// Create an empty factory
    pub fn new() -> Self {
        Self::default()
    }

    fn insert(&mut self, robot: Robot) -> RobotId {
        let id = RobotId::new();
        tracing::info!("Factory added {} as {:?}", robot.serial(), id.0);
        self.robots.insert(id, robot);
        id
    }

    /// Add a crane
    pub fn spawn_crane(&mut self, config: CraneConfig) -> config::Result<RobotId> {
        let crane = Crane::new(config)?;
        Ok(self.insert(Robot::Crane(crane)))
    }

    /// Add a conveyor; `drive` starts its integration task (needs a tokio runtime)
    pub fn spawn_conveyor(&mut self, config: ConveyorConfig, drive: bool) -> config::Result<RobotId> {
        let belt = Conveyor::new(config)?;
        let driver = drive.then(|| belt.spawn_driver());
        Ok(self.insert(Robot::Conveyor { belt, driver }))
    }

    /// Get a robot
    pub fn get(&self, id: RobotId) -> Option<&Robot> {
        self.robots.get(&id)
    }

    /// Get a crane
    pub fn crane(&self, id: RobotId) -> Option<&Crane> {
        match self.robots.get(&id)? {
            Robot::Crane(crane) => Some(crane),
            Robot::Conveyor { .. } => None,
        }
    }

    /// Get a conveyor
    pub fn conveyor(&self, id: RobotId) -> Option<&Conveyor> {
        match self.robots.get(&id)? {
            Robot::Conveyor { belt, .. } => Some(belt),
            Robot::Crane(_) => None,
        }
    }

    /// Iterate robots in insertion order
    pub fn robots(&self) -> impl Iterator<Item = (RobotId, &Robot)> {
        self.robots.iter().map(|(id, robot)| (*id, robot))
    }

    /// Number of robots
    pub fn robot_count(&self) -> usize {
        self.robots.len()
    }

    /// Power the robot off, stop its driver and remove it
    pub fn destroy(&mut self, id: RobotId) -> Option<Robot> {
        let mut robot = self.robots.shift_remove(&id)?;
        // Invalidates any in-flight crane run.
        robot.issue_command(Command::PowerOff);
        if let Robot::Conveyor { driver, .. } = &mut robot {
            if let Some(driver) = driver.take() {
                driver.stop();
            }
        }
        tracing::info!("Factory removed {}", robot.serial());
        Some(robot)
    }

    /// Send a power command to every robot; returns how many accepted it
    pub fn power_all(&self, on: bool) -> usize {
        let command = if on { Command::PowerOn } else { Command::PowerOff };
        self.robots
            .values()
            .filter(|robot| robot.issue_command(command).is_accepted())
            .count()
    }
}

impl Drop for Factory {
    fn drop(&mut self) {
        for robot in self.robots.values() {
            robot.issue_command(Command::PowerOff);
        }
    }
}
