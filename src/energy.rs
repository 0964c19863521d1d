//! EnergyManager (C5): continuous energy regeneration, regen-rate growth,
//! and atomic consumption. Plain functions over [`PlayerState`], mirroring
//! CooldownManager's module-of-pure-functions shape (§9).

use crate::player_state::{MAX_ENERGY, PlayerState};

pub const REGEN_INCREASE: f64 = 0.5;
pub const REGEN_INTERVAL_MS: i64 = 15_000;
pub const MAX_REGEN: f64 = 10.0;

fn round_to_2dp(value: f64) -> f64 {
    (value * 100.0).round() / 100.0
}

/// Effective energy at `now`, given the last materialised value and regen
/// rate. The elapsed-time factor is deliberately NOT clamped to
/// non-negative: a `now` earlier than `last_energy_update` lowers the
/// result. This is intentional round-trip fidelity with the source, not a
/// bug to "fix" — see SPEC_FULL.md's Open Questions.
pub fn current_energy(state: &PlayerState, now: i64) -> f64 {
    let elapsed_secs = (now - state.last_energy_update) as f64 / 1000.0;
    round_to_2dp((state.energy + elapsed_secs * state.energy_regen_rate).min(MAX_ENERGY))
}

/// Regen rate at `now` given the game's start time: grows by
/// `REGEN_INCREASE` every `REGEN_INTERVAL_MS`, capped at `MAX_REGEN`.
/// Monotone non-decreasing in `now`.
pub fn update_regen_rate(game_started_at: i64, now: i64) -> f64 {
    let intervals = ((now - game_started_at) / REGEN_INTERVAL_MS).max(0) as f64;
    (crate::player_state::INITIAL_REGEN + intervals * REGEN_INCREASE).min(MAX_REGEN)
}

pub struct ConsumeOutcome {
    pub ok: bool,
    pub energy: f64,
}

/// Attempts to spend `amount` energy at `now`. On success, mutates
/// `state.energy`/`state.last_energy_update` (materialising). On failure,
/// `state` is left untouched.
pub fn consume(state: &mut PlayerState, amount: f64, now: i64) -> ConsumeOutcome {
    let e = current_energy(state, now);
    if e < amount {
        return ConsumeOutcome { ok: false, energy: e };
    }
    state.energy = e - amount;
    state.last_energy_update = now;
    ConsumeOutcome { ok: true, energy: state.energy }
}
