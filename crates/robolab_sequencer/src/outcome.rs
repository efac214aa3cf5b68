// SPDX-License-Identifier: MIT OR Apache-2.0
//! Results of issuing commands to a robot.
//!
//! Commands never fail. A command that does not apply to the current state is
//! ignored and the reason is reported back.

use crate::state::Phase;
use tokio::task::JoinHandle;

/// Why a command left the robot unchanged
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum IgnoreReason {
    /// The robot is not powered
    Unpowered,
    /// The robot is already in the requested power state
    AlreadyInPowerState,
    /// A sequence is running
    Busy(Phase),
    /// Drop requested without a held item
    NotHolding,
    /// Grab requested while already holding
    AlreadyHolding,
    /// The actor is already at the outermost slot in that direction
    AlreadyAtSlot,
    /// The belt already runs in the requested direction
    AlreadyInDirection,
    /// The robot is broken and cannot power on
    Broken,
    /// The robot has no behavior for this command
    Unsupported,
}

impl IgnoreReason {
    /// Human readable description
    pub fn describe(&self) -> &'static str {
        match self {
            Self::Unpowered => "machine is powered off",
            Self::AlreadyInPowerState => "machine is already in that power state",
            Self::Busy(_) => "a sequence is in progress",
            Self::NotHolding => "no item is held",
            Self::AlreadyHolding => "an item is already held",
            Self::AlreadyAtSlot => "already at the edge slot",
            Self::AlreadyInDirection => "already running that way",
            Self::Broken => "machine is broken",
            Self::Unsupported => "command not supported by this machine",
        }
    }
}

/// How a sequence run ended
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RunEnd {
    /// Every phase ran
    Completed,
    /// A power-off invalidated the run before it finished
    Cancelled,
}

/// Handle to a running grab or drop sequence
#[derive(Debug)]
pub struct SequenceRun {
    generation: u64,
    handle: JoinHandle<RunEnd>,
}

impl SequenceRun {
    pub(crate) fn new(generation: u64, handle: JoinHandle<RunEnd>) -> Self {
        Self { generation, handle }
    }

    /// Cancellation token of this run
    pub fn generation(&self) -> u64 {
        self.generation
    }

    /// Whether the driver task has returned
    pub fn is_finished(&self) -> bool {
        self.handle.is_finished()
    }

    /// Wait for the run to end
    pub async fn finished(self) -> RunEnd {
        match self.handle.await {
            Ok(end) => end,
            Err(err) => {
                tracing::warn!("Sequence driver {} did not finish: {err}", self.generation);
                RunEnd::Cancelled
            }
        }
    }
}

/// Result of issuing a command
#[derive(Debug)]
pub enum CommandOutcome {
    /// The command took effect immediately
    Applied,
    /// The command started a phase sequence
    Started(SequenceRun),
    /// The command was a no-op
    Ignored(IgnoreReason),
}

impl CommandOutcome {
    /// Whether the command changed the robot
    pub fn is_accepted(&self) -> bool {
        !self.is_ignored()
    }

    /// Whether the command was a no-op
    pub fn is_ignored(&self) -> bool {
        matches!(self, Self::Ignored(_))
    }

    /// Reason the command was ignored, if it was
    pub fn ignore_reason(&self) -> Option<IgnoreReason> {
        match self {
            Self::Ignored(reason) => Some(*reason),
            Self::Applied | Self::Started(_) => None,
        }
    }

    /// Wait for a started sequence; immediate outcomes resolve at once
    pub async fn finished(self) -> Option<RunEnd> {
        match self {
            Self::Started(run) => Some(run.finished().await),
            Self::Applied => Some(RunEnd::Completed),
            Self::Ignored(_) => None,
        }
    }
}
