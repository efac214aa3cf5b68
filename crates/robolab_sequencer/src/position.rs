// SPDX-License-Identifier: MIT OR Apache-2.0
//! Item coordinate derivation.

use crate::config::CraneConfig;
use crate::state::{ItemCoordinates, MachineState};

/// Compute where the item is drawn for a given machine state.
///
/// A resting item stays where it was dropped. A held item follows the actor
/// horizontally and the cable vertically, except that it stays on the ground
/// while the cable is still (nearly) fully lowered or while the grab has not
/// finished lifting. That keeps the item from jumping up the moment the claw
/// closes.
pub fn compute_item_coordinates(state: &MachineState, config: &CraneConfig) -> ItemCoordinates {
    if !state.is_holding_item {
        return state.item_position;
    }

    let snap_threshold = config.max_cable_extension * config.ground_snap_ratio;
    let y = if state.grabbed_at_ground || state.cable_extension >= snap_threshold {
        config.ground_level()
    } else {
        config.base_height + state.cable_extension
    };

    ItemCoordinates::new(state.position, y)
}
