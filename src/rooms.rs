//! RoomManager (C8): short-code friend rooms — code generation, join
//! arbitration, and TTL expiry. Code-generation's bounded retry loop is
//! grounded in the collision-retry pattern used for numeric room codes in
//! large-scale room registries, adapted here to the spec's explicit
//! 100-attempt bound (most such registries retry unboundedly).

use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;

use rand::Rng;
use tokio::sync::RwLock;

use crate::engine::GameStatus;
use crate::errors::{CoreError, ResourceError};
use crate::game_manager::GameManager;
use crate::persistence::Store;

const CODE_ALPHABET: &[u8] = b"0123456789ABCDEFGHIJKLMNOPQRSTUVWXYZ";
const CODE_LENGTH: usize = 6;
const MAX_CODE_ATTEMPTS: usize = 100;
const ROOM_TTL: Duration = Duration::from_secs(24 * 60 * 60);
const SWEEP_INTERVAL: Duration = Duration::from_secs(30 * 60);

#[derive(Debug, Clone)]
pub struct RoomInfo {
    pub code: String,
    pub host_id: String,
    pub game_id: String,
    pub player_count: u8,
    pub created_at: i64,
}

pub struct RoomManager {
    store: Arc<dyn Store>,
    game_manager: Arc<GameManager>,
    rooms: RwLock<HashMap<String, RoomInfo>>,
}

fn generate_code() -> String {
    let mut rng = rand::thread_rng();
    (0..CODE_LENGTH).map(|_| CODE_ALPHABET[rng.gen_range(0..CODE_ALPHABET.len())] as char).collect()
}

impl RoomManager {
    pub fn new(store: Arc<dyn Store>, game_manager: Arc<GameManager>) -> Self {
        RoomManager { store, game_manager, rooms: RwLock::new(HashMap::new()) }
    }

    async fn code_in_use(&self, code: &str) -> Result<bool, CoreError> {
        if self.rooms.read().await.contains_key(code) {
            return Ok(true);
        }
        Ok(self.store.fetch_game_by_room_code(code)?.is_some_and(|g| g.status != GameStatus::Finished))
    }

    async fn generate_unique_code(&self) -> Result<String, CoreError> {
        for _ in 0..MAX_CODE_ATTEMPTS {
            let candidate = generate_code();
            if !self.code_in_use(&candidate).await? {
                return Ok(candidate);
            }
        }
        Err(ResourceError::RoomCodeExhausted.into())
    }

    /// Creates an unrated, `waiting` game with `host_id` as both color
    /// placeholders (the second player overwrites one color on join).
    pub async fn create_room(&self, host_id: &str) -> Result<RoomInfo, CoreError> {
        let code = self.generate_unique_code().await?;
        let game_id = self.game_manager.create_game(host_id, host_id, false, Some(code.clone()))?;
        let info = RoomInfo {
            code: code.clone(),
            host_id: host_id.to_string(),
            game_id,
            player_count: 1,
            created_at: crate::game_manager::now_ms(),
        };
        self.rooms.write().await.insert(code.clone(), info.clone());
        log::info!("room {code} created by {host_id}");
        Ok(info)
    }

    /// Rehydrates from persistence if the code is unknown in memory.
    /// Rejects an unknown code, a non-waiting game, a full room, or the
    /// host re-joining their own room.
    pub async fn join_room(&self, code: &str, user_id: &str) -> Result<RoomInfo, CoreError> {
        if !self.rooms.read().await.contains_key(code) {
            if let Some(state) = self.store.fetch_game_by_room_code(code)? {
                if state.status == GameStatus::Waiting {
                    let info = RoomInfo {
                        code: code.to_string(),
                        host_id: state.white_id.clone(),
                        game_id: state.id.clone(),
                        player_count: 1,
                        created_at: state.started_at.unwrap_or_else(crate::game_manager::now_ms),
                    };
                    self.rooms.write().await.insert(code.to_string(), info);
                }
            }
        }

        let mut rooms = self.rooms.write().await;
        let room = rooms.get_mut(code).ok_or_else(|| ResourceError::RoomNotFound(code.to_string()))?;

        if room.host_id == user_id {
            return Err(ResourceError::JoinerIsHost.into());
        }
        if room.player_count >= 2 {
            return Err(ResourceError::RoomFull(code.to_string()).into());
        }

        let mut state = self
            .store
            .fetch_game(&room.game_id)?
            .ok_or_else(|| ResourceError::GameNotFound(room.game_id.clone()))?;
        if state.status != GameStatus::Waiting {
            return Err(ResourceError::RoomFull(code.to_string()).into());
        }

        // Host occupies both color slots until a second player arrives;
        // assign the joiner the opposite color.
        if state.white_id == room.host_id {
            state.black_id = user_id.to_string();
        } else {
            state.white_id = user_id.to_string();
        }
        self.store.update_game(state)?;

        room.player_count = 2;
        log::info!("user {user_id} joined room {code}");
        Ok(room.clone())
    }

    /// Every 30 minutes: abandon rooms still `waiting` with one occupant
    /// and older than 24h.
    pub async fn run_sweep_loop(&self) {
        let mut interval = tokio::time::interval(SWEEP_INTERVAL);
        loop {
            interval.tick().await;
            self.sweep_once().await;
        }
    }

    async fn sweep_once(&self) {
        let now = crate::game_manager::now_ms();
        let ttl_ms = ROOM_TTL.as_millis() as i64;
        let expired: Vec<String> = self
            .rooms
            .read()
            .await
            .values()
            .filter(|r| r.player_count == 1 && now - r.created_at >= ttl_ms)
            .map(|r| r.code.clone())
            .collect();

        for code in expired {
            let mut rooms = self.rooms.write().await;
            let Some(room) = rooms.get(&code) else { continue };
            if room.player_count != 1 {
                continue;
            }
            match self.store.fetch_game(&room.game_id) {
                Ok(Some(mut state)) if state.status == GameStatus::Waiting => {
                    state.status = GameStatus::Abandoned;
                    if let Err(e) = self.store.update_game(state) {
                        log::warn!("failed to abandon expired room {code}: {e}");
                        continue;
                    }
                    log::info!("room {code} expired and was abandoned");
                    rooms.remove(&code);
                }
                Ok(_) => {
                    rooms.remove(&code);
                }
                Err(e) => log::warn!("failed to load game for expired room {code}: {e}"),
            }
        }
    }

    /// Closes a room on the host's request, marking the underlying game
    /// `abandoned`.
    pub async fn close_room(&self, code: &str, host_id: &str) -> Result<(), CoreError> {
        let mut rooms = self.rooms.write().await;
        let room = rooms.get(code).ok_or_else(|| ResourceError::RoomNotFound(code.to_string()))?;
        if room.host_id != host_id {
            return Err(ResourceError::JoinerIsHost.into());
        }
        let mut state = self.store.fetch_game(&room.game_id)?.ok_or_else(|| ResourceError::GameNotFound(room.game_id.clone()))?;
        state.status = GameStatus::Abandoned;
        self.store.update_game(state)?;
        rooms.remove(code);
        Ok(())
    }
}
