// SPDX-License-Identifier: MIT OR Apache-2.0
//! Conveyor belt sequencer.
//!
//! Unlike the crane, the belt has no phase list. While powered, every item
//! token advances at the belt speed and wraps back to the entry bound when it
//! passes the exit bound. Powering off freezes the tokens where they are.

use crate::config::{self, ConveyorConfig};
use crate::observer::{Subscribers, Subscription};
use crate::outcome::{CommandOutcome, IgnoreReason};
use crate::state::Command;
use parking_lot::Mutex;
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use std::time::Duration;
use tokio::task::JoinHandle;
use tokio::time::{Instant, MissedTickBehavior};
use uuid::Uuid;

/// Unique identifier for an item token
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct TokenId(pub Uuid);

impl TokenId {
    /// Create a new random token ID
    pub fn new() -> Self {
        Self(Uuid::new_v4())
    }
}

impl Default for TokenId {
    fn default() -> Self {
        Self::new()
    }
}

/// Travel direction of the belt
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "kebab-case")]
pub enum Direction {
    /// Toward the entry bound
    Left,
    /// Toward the exit bound
    #[default]
    Right,
}

impl Direction {
    /// Sign applied to the belt speed
    pub fn sign(&self) -> f32 {
        match self {
            Self::Left => -1.0,
            Self::Right => 1.0,
        }
    }
}

/// An item riding the belt
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct BeltToken {
    /// Token ID
    pub id: TokenId,
    /// Position along the belt
    pub position: f32,
}

/// State of a conveyor instance
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct BeltState {
    /// Whether the belt is powered
    pub power: bool,
    /// Last accepted command
    pub command_state: Command,
    /// Travel direction
    pub direction: Direction,
    /// Item tokens
    pub tokens: Vec<BeltToken>,
}

/// Read-only view of a conveyor pushed to observers
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct BeltSnapshot {
    /// Serial number of the belt
    pub serial: String,
    /// Monotonic publish counter
    pub revision: u64,
    /// Belt state
    pub state: BeltState,
}

/// Advance a position and wrap it into `[entry, entry + span)`
pub fn wrap_position(position: f32, delta: f32, entry: f32, span: f32) -> f32 {
    let wrapped = entry + (position + delta - entry).rem_euclid(span);
    // rem_euclid of a tiny negative offset rounds up to `span`
    if wrapped >= entry + span {
        entry
    } else {
        wrapped
    }
}

struct BeltCore {
    state: BeltState,
    revision: u64,
}

struct BeltShared {
    config: ConveyorConfig,
    core: Mutex<BeltCore>,
    subscribers: Subscribers<BeltSnapshot>,
}

/// Handle to a conveyor instance
#[derive(Clone)]
pub struct Conveyor {
    shared: Arc<BeltShared>,
}

impl Conveyor {
    /// Create a powered-off belt with tokens at their configured positions
    pub fn new(config: ConveyorConfig) -> config::Result<Self> {
        config.validate()?;
        let tokens = config
            .tokens
            .iter()
            .map(|&position| BeltToken {
                id: TokenId::new(),
                position,
            })
            .collect();
        tracing::debug!("Created conveyor {}", config.serial);

        Ok(Self {
            shared: Arc::new(BeltShared {
                config,
                core: Mutex::new(BeltCore {
                    state: BeltState {
                        power: false,
                        command_state: Command::PowerOff,
                        direction: Direction::Right,
                        tokens,
                    },
                    revision: 0,
                }),
                subscribers: Subscribers::new(),
            }),
        })
    }

    /// Get the configuration
    pub fn config(&self) -> &ConveyorConfig {
        &self.shared.config
    }

    /// Get the serial number
    pub fn serial(&self) -> &str {
        &self.shared.config.serial
    }

    /// Current snapshot
    pub fn snapshot(&self) -> BeltSnapshot {
        let core = self.shared.core.lock();
        BeltSnapshot {
            serial: self.shared.config.serial.clone(),
            revision: core.revision,
            state: core.state.clone(),
        }
    }

    /// Current belt state
    pub fn state(&self) -> BeltState {
        self.shared.core.lock().state.clone()
    }

    /// Register a callback invoked with every published snapshot
    pub fn subscribe(
        &self,
        on_change: impl Fn(&BeltSnapshot) + Send + Sync + 'static,
    ) -> Subscription {
        self.shared.subscribers.subscribe(on_change)
    }

    /// Issue a command
    pub fn issue_command(&self, command: Command) -> CommandOutcome {
        let applied = self.update(|state, config| match command {
            Command::PowerOff if !state.power => Err(IgnoreReason::AlreadyInPowerState),
            Command::PowerOff => {
                state.power = false;
                state.command_state = command;
                tracing::info!("Conveyor {} powered off", config.serial);
                Ok(())
            }
            Command::PowerOn if state.power => Err(IgnoreReason::AlreadyInPowerState),
            Command::PowerOn if config.broken => Err(IgnoreReason::Broken),
            Command::PowerOn => {
                state.power = true;
                state.command_state = command;
                tracing::info!("Conveyor {} powered on", config.serial);
                Ok(())
            }
            Command::MoveLeft | Command::MoveRight => {
                let direction = if command == Command::MoveLeft {
                    Direction::Left
                } else {
                    Direction::Right
                };
                if !state.power {
                    Err(IgnoreReason::Unpowered)
                } else if state.direction == direction {
                    Err(IgnoreReason::AlreadyInDirection)
                } else {
                    state.direction = direction;
                    state.command_state = command;
                    Ok(())
                }
            }
            Command::GrabItem | Command::DropItem => Err(IgnoreReason::Unsupported),
        });

        match applied {
            Ok(()) => CommandOutcome::Applied,
            Err(reason) => {
                tracing::debug!(
                    "Conveyor {} ignored {command}: {}",
                    self.serial(),
                    reason.describe()
                );
                CommandOutcome::Ignored(reason)
            }
        }
    }

    fn update(
        &self,
        change: impl FnOnce(&mut BeltState, &ConveyorConfig) -> Result<(), IgnoreReason>,
    ) -> Result<(), IgnoreReason> {
        let snapshot = {
            let mut core = self.shared.core.lock();
            change(&mut core.state, &self.shared.config)?;
            core.revision += 1;
            BeltSnapshot {
                serial: self.shared.config.serial.clone(),
                revision: core.revision,
                state: core.state.clone(),
            }
        };
        self.shared.subscribers.notify(snapshot.revision, &snapshot);
        Ok(())
    }

    /// Integrate the belt over `elapsed`. Returns whether anything moved.
    pub fn tick(&self, elapsed: Duration) -> bool {
        let config = &self.shared.config;
        if config.speed == 0.0 || config.tokens.is_empty() {
            return false;
        }
        let moved = self.update(|state, config| {
            if !state.power {
                return Err(IgnoreReason::Unpowered);
            }
            let delta = config.speed * state.direction.sign() * elapsed.as_secs_f32();
            let span = config.span();
            for token in &mut state.tokens {
                token.position = wrap_position(token.position, delta, config.entry_bound, span);
            }
            Ok(())
        });
        if moved.is_ok() {
            tracing::trace!("Conveyor {} advanced {:?}", config.serial, elapsed);
        }
        moved.is_ok()
    }

    /// Spawn a task integrating the belt at the configured frame interval
    pub fn spawn_driver(&self) -> BeltDriver {
        let belt = self.clone();
        let frame = self.shared.config.frame_interval();
        tracing::debug!("Conveyor {} driver started at {:?} per frame", self.serial(), frame);

        let handle = tokio::spawn(async move {
            let mut interval = tokio::time::interval(frame);
            interval.set_missed_tick_behavior(MissedTickBehavior::Delay);
            interval.tick().await;
            let mut last = Instant::now();
            loop {
                interval.tick().await;
                let now = Instant::now();
                belt.tick(now - last);
                last = now;
            }
        });
        BeltDriver { handle }
    }
}

impl std::fmt::Debug for Conveyor {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Conveyor")
            .field("serial", &self.serial())
            .field("state", &self.state())
            .finish()
    }
}

/// Running belt integration task; dropping it stops the task
#[derive(Debug)]
pub struct BeltDriver {
    handle: JoinHandle<()>,
}

impl BeltDriver {
    /// Stop integrating
    pub fn stop(self) {
        drop(self);
    }

    /// Whether the task has stopped
    pub fn is_stopped(&self) -> bool {
        self.handle.is_finished()
    }
}

impl Drop for BeltDriver {
    fn drop(&mut self) {
        self.handle.abort();
    }
}
