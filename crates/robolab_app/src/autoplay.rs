// SPDX-License-Identifier: MIT OR Apache-2.0
//! Autoplay loop for the factory floor.
//!
//! Every crane powers on and repeats grab/drop cycles on its own task while
//! the conveyors run. When all cranes are done everything powers off.

use crate::settings::AutoplaySettings;
use indexmap::IndexMap;
use robolab_sequencer::{Command, Crane, Factory, Robot, RunEnd};
use std::time::Duration;
use tokio::task::JoinSet;

/// Completed cycles per crane serial number, in factory order
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct AutoplayReport {
    /// Completed grab/drop cycles per crane
    pub cycles: IndexMap<String, u32>,
}

impl AutoplayReport {
    /// Total completed cycles
    pub fn total(&self) -> u32 {
        self.cycles.values().sum()
    }
}

/// Run the autoplay loop on every robot in the factory
pub async fn run(factory: &Factory, settings: &AutoplaySettings) -> AutoplayReport {
    let mut report = AutoplayReport::default();
    let mut cranes = JoinSet::new();

    for (_, robot) in factory.robots() {
        match robot {
            Robot::Crane(crane) => {
                report.cycles.insert(crane.serial().to_string(), 0);
                cranes.spawn(cycle_crane(crane.clone(), settings.clone()));
            }
            Robot::Conveyor { belt, .. } => {
                if let Some(reason) = belt.issue_command(Command::PowerOn).ignore_reason() {
                    tracing::warn!("Conveyor {} stays off: {}", belt.serial(), reason.describe());
                }
            }
        }
    }

    while let Some(result) = cranes.join_next().await {
        match result {
            Ok((serial, completed)) => {
                report.cycles.insert(serial, completed);
            }
            Err(e) => tracing::error!("Crane autoplay task failed: {e}"),
        }
    }

    factory.power_all(false);
    tracing::info!("Autoplay finished: {} cycles", report.total());
    report
}

async fn cycle_crane(crane: Crane, settings: AutoplaySettings) -> (String, u32) {
    let serial = crane.serial().to_string();
    if let Some(reason) = crane.issue_command(Command::PowerOn).ignore_reason() {
        tracing::warn!("Crane {serial} stays off: {}", reason.describe());
        return (serial, 0);
    }

    let pause = Duration::from_millis(settings.pause_ms);
    let mut completed = 0;
    for cycle in 0..settings.cycles {
        let grabbed = crane.issue_command(Command::GrabItem).finished().await;
        if grabbed != Some(RunEnd::Completed) {
            tracing::warn!("Crane {serial} grab ended as {grabbed:?} in cycle {cycle}");
            break;
        }
        let dropped = crane.issue_command(Command::DropItem).finished().await;
        if dropped != Some(RunEnd::Completed) {
            tracing::warn!("Crane {serial} drop ended as {dropped:?} in cycle {cycle}");
            break;
        }

        completed += 1;
        tracing::debug!("Crane {serial} finished cycle {cycle}");
        tokio::time::sleep(pause).await;
    }

    crane.issue_command(Command::PowerOff);
    (serial, completed)
}
