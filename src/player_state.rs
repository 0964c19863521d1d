//! `PlayerState`: the per-player resource data shared by CooldownManager and
//! EnergyManager. Modelled as a plain value — both managers are modules of
//! pure functions over this value, not stateful objects (§9: "class-based
//! static helpers").

use std::collections::HashMap;

use serde::{Deserialize, Serialize};

pub const INITIAL_ENERGY: f64 = 6.0;
pub const MAX_ENERGY: f64 = 25.0;
pub const INITIAL_REGEN: f64 = 0.5;

/// Resource state for one side of one game.
///
/// `piece_cooldowns` maps piece id to an absolute millisecond deadline. It
/// is a keyed mapping at runtime and serialises to a plain object at the
/// persistence boundary (the native mapping type is not otherwise portable
/// through JSON — §6).
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PlayerState {
    pub energy: f64,
    pub energy_regen_rate: f64,
    pub last_energy_update: i64,
    pub piece_cooldowns: HashMap<String, i64>,
}

impl PlayerState {
    pub fn fresh(now: i64) -> Self {
        PlayerState {
            energy: INITIAL_ENERGY,
            energy_regen_rate: INITIAL_REGEN,
            last_energy_update: now,
            piece_cooldowns: HashMap::new(),
        }
    }
}
