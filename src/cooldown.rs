//! CooldownManager (C4): per-piece cooldown end-timestamps over a
//! [`PlayerState`]. Plain functions, no instance state — the source's
//! class-with-only-static-methods pattern (§9) modelled idiomatically.

use crate::player_state::PlayerState;
use crate::types::PieceKind;

/// True iff `id` has a cooldown deadline strictly in the future of `now`.
/// Expiry is effective at equality: `deadline == now` is NOT on cooldown.
pub fn is_on_cooldown(id: &str, state: &PlayerState, now: i64) -> bool {
    state.piece_cooldowns.get(id).is_some_and(|&deadline| deadline > now)
}

/// Milliseconds remaining until `id`'s cooldown clears, floored at zero.
pub fn get_remaining(id: &str, state: &PlayerState, now: i64) -> i64 {
    state
        .piece_cooldowns
        .get(id)
        .map(|&deadline| (deadline - now).max(0))
        .unwrap_or(0)
}

/// Sets `id`'s cooldown deadline to `now + baseCooldown(kind) * 1000`.
pub fn set_cooldown(id: &str, kind: PieceKind, state: &mut PlayerState, now: i64) {
    let deadline = now + kind.base_cooldown_ms() as i64;
    state.piece_cooldowns.insert(id.to_string(), deadline);
}

/// Writes an explicit absolute deadline, used by special effects that
/// compute a new deadline directly rather than via `set_cooldown`'s
/// kind-based formula (pawnGeneral relief, iceBishop extension).
pub fn set_deadline(id: &str, state: &mut PlayerState, deadline: i64) {
    state.piece_cooldowns.insert(id.to_string(), deadline);
}

pub fn clear_cooldown(id: &str, state: &mut PlayerState) {
    state.piece_cooldowns.remove(id);
}

/// Erases all cooldowns whose deadline has passed. The to-delete keys are
/// materialised up front so callers never observe iterator invalidation
/// (§9).
pub fn sweep(state: &mut PlayerState, now: i64) {
    let expired: Vec<String> = state
        .piece_cooldowns
        .iter()
        .filter(|&(_, &deadline)| deadline <= now)
        .map(|(id, _)| id.clone())
        .collect();
    for id in expired {
        state.piece_cooldowns.remove(&id);
    }
}
