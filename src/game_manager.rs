//! GameManager (C7): owns active `GameEngine` instances, runs the 1s tick
//! loop with periodic checkpoints, and applies ELO updates on game end.

use std::collections::HashMap;
use std::sync::Arc;
use std::sync::atomic::{AtomicU64, Ordering};

use tokio::sync::{Mutex, RwLock};
use uuid::Uuid;

use crate::engine::{AttemptMoveError, AttemptMoveSuccess, GameEngine, GameState, GameStatus, MoveRequest};
use crate::errors::{CoreError, ResourceError};
use crate::persistence::Store;
use crate::types::Color;

pub const ELO_K: f64 = 32.0;
pub const INITIAL_RATING: i32 = 1000;
const CHECKPOINT_EVERY_N_TICKS: u64 = 5;

/// Standard Elo expected score for `rating_s` against `rating_o`.
pub fn expected_score(rating_s: i32, rating_o: i32) -> f64 {
    1.0 / (1.0 + 10f64.powf((rating_o - rating_s) as f64 / 400.0))
}

/// New rating after a single result; `actual` is 1.0 for the winner, 0.0
/// for the loser.
pub fn new_rating(old_rating: i32, actual: f64, expected: f64) -> i32 {
    (old_rating as f64 + ELO_K * (actual - expected)).round() as i32
}

pub struct GameManager {
    store: Arc<dyn Store>,
    engines: RwLock<HashMap<String, Arc<Mutex<GameEngine>>>>,
    tick_count: AtomicU64,
}

impl GameManager {
    pub fn new(store: Arc<dyn Store>) -> Self {
        GameManager { store, engines: RwLock::new(HashMap::new()), tick_count: AtomicU64::new(0) }
    }

    pub fn create_game(&self, white_id: &str, black_id: &str, rated: bool, room_code: Option<String>) -> Result<String, CoreError> {
        let id = Uuid::new_v4().to_string();
        let now = now_ms();
        let mut state = GameState::new(id.clone(), white_id.to_string(), black_id.to_string(), rated, now);
        state.room_code = room_code;
        self.store.create_game(state)?;
        log::info!("created game {id} (white={white_id}, black={black_id}, rated={rated})");
        Ok(id)
    }

    pub async fn start_game(&self, id: &str) -> Result<(), CoreError> {
        let mut state = self.store.fetch_game(id)?.ok_or_else(|| ResourceError::GameNotFound(id.to_string()))?;
        if state.status != GameStatus::Waiting {
            return Err(ResourceError::GameNotActive(id.to_string()).into());
        }
        let now = now_ms();
        state.status = GameStatus::Active;
        state.started_at = Some(now);
        self.store.update_game(state.clone())?;
        let engine = GameEngine::new(state, now);
        self.engines.write().await.insert(id.to_string(), Arc::new(Mutex::new(engine)));
        log::info!("started game {id}");
        Ok(())
    }

    /// Lazily rehydrates an engine from persistence if it's not already
    /// resident in memory. Only valid for games in `active` status.
    async fn engine_handle(&self, id: &str) -> Result<Arc<Mutex<GameEngine>>, CoreError> {
        if let Some(handle) = self.engines.read().await.get(id) {
            return Ok(handle.clone());
        }
        let state = self.store.fetch_game(id)?.ok_or_else(|| ResourceError::GameNotFound(id.to_string()))?;
        if state.status != GameStatus::Active {
            return Err(ResourceError::GameNotActive(id.to_string()).into());
        }
        let started_at = state.started_at.unwrap_or_else(now_ms);
        let engine = Arc::new(Mutex::new(GameEngine::new(state, started_at)));
        self.engines.write().await.insert(id.to_string(), engine.clone());
        Ok(engine)
    }

    /// Returns the current state of a game, preferring the live in-memory
    /// engine (for active games) over the persisted snapshot.
    pub async fn fetch_state(&self, id: &str) -> Option<GameState> {
        if let Some(handle) = self.engines.read().await.get(id) {
            return Some(handle.lock().await.state.clone());
        }
        self.store.fetch_game(id).ok().flatten()
    }

    /// A user's current rating, defaulting to [`INITIAL_RATING`] for a user
    /// with no persisted record.
    pub async fn rating_for(&self, user_id: &str) -> i32 {
        self.store.fetch_user(user_id).ok().flatten().map(|u| u.rating).unwrap_or(INITIAL_RATING)
    }

    pub async fn attempt_move(&self, id: &str, request: MoveRequest) -> Result<AttemptMoveSuccess, CoreError> {
        let handle = self.engine_handle(id).await?;
        let mut engine = handle.lock().await;

        let now = now_ms();
        engine.tick(now);
        let result = engine.attempt_move(request, now).map_err(|e| match e {
            AttemptMoveError::Resource(r) => CoreError::from(r),
            AttemptMoveError::Validation(v) => CoreError::from(v),
        })?;

        let finished = self.finalize_after_move(&mut engine, now)?;
        drop(engine);
        if finished {
            self.engines.write().await.remove(id);
        }
        Ok(result)
    }

    /// End-of-game detection (§4.7): after a successful move, scan for
    /// surviving kings and resolve the outcome. Subsumes the direct-capture
    /// path `GameEngine::execute` already marks, and also covers the
    /// (degenerate) case where neither king survives. Returns whether the
    /// game just finished, so the caller can evict it from the registry.
    fn finalize_after_move(&self, engine: &mut GameEngine, now: i64) -> Result<bool, CoreError> {
        let white_alive = engine.state.board.find_king(Color::White).is_some();
        let black_alive = engine.state.board.find_king(Color::Black).is_some();

        let winner = if white_alive && black_alive {
            None
        } else {
            engine.resolve_simultaneous_king_capture(!white_alive, !black_alive)
        };

        if let Some(winner) = winner {
            if engine.state.status != GameStatus::Finished {
                engine.state.status = GameStatus::Finished;
                engine.state.winner = Some(winner);
                engine.state.ended_at = Some(now);
            }
            if engine.state.rated {
                if let Err(e) = self.apply_elo_update(&engine.state, winner) {
                    log::warn!("elo update failed for game {}: {e}", engine.state.id);
                }
            }
        }

        if let Err(e) = self.store.update_game(engine.state.clone()) {
            log::warn!("persistence failure for game {}: {e} (will retry on next checkpoint)", engine.state.id);
        }

        Ok(winner.is_some())
    }

    fn apply_elo_update(&self, state: &GameState, winner: Color) -> Result<(), CoreError> {
        let white_user = self.store.fetch_user(&state.white_id)?.unwrap_or_else(|| crate::persistence::UserRecord::new(&state.white_id));
        let black_user = self.store.fetch_user(&state.black_id)?.unwrap_or_else(|| crate::persistence::UserRecord::new(&state.black_id));

        let white_actual = if winner == Color::White { 1.0 } else { 0.0 };
        let black_actual = 1.0 - white_actual;

        let white_expected = expected_score(white_user.rating, black_user.rating);
        let black_expected = expected_score(black_user.rating, white_user.rating);

        let white_new = new_rating(white_user.rating, white_actual, white_expected);
        let black_new = new_rating(black_user.rating, black_actual, black_expected);

        self.store.update_user_rating(&state.white_id, white_new)?;
        self.store.update_user_rating(&state.black_id, black_new)?;
        Ok(())
    }

    /// Runs forever, ticking every active game once per second and
    /// persisting a checkpoint every 5th iteration. Intended to be spawned
    /// as a background task from the process entry point (§5).
    pub async fn run_tick_loop(&self) {
        let mut interval = tokio::time::interval(std::time::Duration::from_secs(1));
        loop {
            interval.tick().await;
            self.tick_once().await;
        }
    }

    async fn tick_once(&self) {
        let now = now_ms();
        // Snapshot ids so per-game work never holds the registry lock.
        let ids: Vec<String> = self.engines.read().await.keys().cloned().collect();

        for id in &ids {
            let Some(handle) = self.engines.read().await.get(id).cloned() else { continue };
            let mut engine = handle.lock().await;
            engine.tick(now);
        }

        let count = self.tick_count.fetch_add(1, Ordering::Relaxed) + 1;
        if count % CHECKPOINT_EVERY_N_TICKS == 0 {
            for id in &ids {
                let Some(handle) = self.engines.read().await.get(id).cloned() else { continue };
                let engine = handle.lock().await;
                if let Err(e) = self.store.update_game(engine.state.clone()) {
                    log::warn!("checkpoint persistence failed for game {id}: {e}; will retry next cycle");
                }
            }
        }
    }
}

pub(crate) fn now_ms() -> i64 {
    std::time::SystemTime::now()
        .duration_since(std::time::UNIX_EPOCH)
        .expect("system clock before epoch")
        .as_millis() as i64
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::persistence::MemoryStore;

    fn manager() -> GameManager {
        GameManager::new(Arc::new(MemoryStore::new()))
    }

    #[test]
    fn elo_expected_score_is_symmetric_around_half() {
        assert!((expected_score(1000, 1000) - 0.5).abs() < 1e-9);
        assert!(expected_score(1200, 1000) > 0.5);
        assert!(expected_score(1000, 1200) < 0.5);
    }

    #[test]
    fn elo_winner_gains_loser_loses() {
        let expected = expected_score(1000, 1000);
        assert_eq!(new_rating(1000, 1.0, expected), 1016);
        assert_eq!(new_rating(1000, 0.0, expected), 984);
    }

    #[tokio::test]
    async fn create_and_start_game_transitions_to_active() {
        let manager = manager();
        let id = manager.create_game("w", "b", false, None).unwrap();
        manager.start_game(&id).await.unwrap();
        let handle = manager.engine_handle(&id).await.unwrap();
        assert_eq!(handle.lock().await.state.status, GameStatus::Active);
    }

    #[tokio::test]
    async fn attempt_move_on_unstarted_game_fails() {
        let manager = manager();
        let id = manager.create_game("w", "b", false, None).unwrap();
        let result = manager
            .attempt_move(&id, MoveRequest { player_id: "w".into(), from_row: 6, from_col: 4, to_row: 4, to_col: 4 })
            .await;
        assert!(result.is_err());
    }

    #[tokio::test]
    async fn successful_move_persists_state() {
        let manager = manager();
        let id = manager.create_game("w", "b", false, None).unwrap();
        manager.start_game(&id).await.unwrap();
        {
            let handle = manager.engine_handle(&id).await.unwrap();
            handle.lock().await.state.white_state.energy = 10.0;
        }
        manager
            .attempt_move(&id, MoveRequest { player_id: "w".into(), from_row: 6, from_col: 4, to_row: 4, to_col: 4 })
            .await
            .unwrap();
        let persisted = manager.store.fetch_game(&id).unwrap().unwrap();
        assert!(persisted.board.get(4, 4).is_some());
    }
}
