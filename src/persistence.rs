//! Persistence (C11): the §6 CRUD contract, expressed as a trait so the
//! game-state core never depends on a concrete store. The in-process
//! `MemoryStore` is a reference adapter for tests and single-process
//! deployments; a real relational store sits behind the same trait without
//! touching C1-C10.

use std::collections::HashMap;
use std::sync::RwLock;

use serde::{Deserialize, Serialize};

use crate::engine::GameState;
use crate::errors::InfraError;
use crate::types::PieceKind;

/// A user's persisted rating, fetched for ELO updates (§4.7) and written
/// back after a rated game concludes.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct UserRecord {
    pub id: String,
    pub rating: i32,
}

impl UserRecord {
    pub fn new(id: impl Into<String>) -> Self {
        UserRecord { id: id.into(), rating: 1000 }
    }
}

/// A custom board layout saved by a user (referenced by the Constraints
/// component's custom-board validation at creation time).
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CustomBoard {
    pub id: String,
    pub owner_id: String,
    pub name: String,
    pub grid: Vec<Vec<Option<PieceKind>>>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Friendship {
    pub id: String,
    pub user_a: String,
    pub user_b: String,
}

/// The persistence contract (§6). All operations are fallible only with
/// [`InfraError`] — resource-not-found is represented as `Ok(None)`, since
/// "not found" is a normal outcome the caller (GameManager, RoomManager)
/// maps onto its own [`crate::errors::ResourceError`].
pub trait Store: Send + Sync {
    fn create_game(&self, state: GameState) -> Result<(), InfraError>;
    fn fetch_game(&self, id: &str) -> Result<Option<GameState>, InfraError>;
    fn fetch_game_by_room_code(&self, room_code: &str) -> Result<Option<GameState>, InfraError>;
    fn update_game(&self, state: GameState) -> Result<(), InfraError>;
    fn delete_game(&self, id: &str) -> Result<(), InfraError>;
    fn list_unfinished_game_ids(&self) -> Result<Vec<String>, InfraError>;

    fn fetch_user(&self, id: &str) -> Result<Option<UserRecord>, InfraError>;
    fn update_user_rating(&self, id: &str, rating: i32) -> Result<(), InfraError>;

    fn create_custom_board(&self, board: CustomBoard) -> Result<(), InfraError>;
    fn fetch_custom_board(&self, id: &str) -> Result<Option<CustomBoard>, InfraError>;
    fn delete_custom_board(&self, id: &str) -> Result<(), InfraError>;
    fn update_custom_board(&self, board: CustomBoard) -> Result<(), InfraError>;

    fn create_friendship(&self, friendship: Friendship) -> Result<(), InfraError>;
    fn fetch_friendship(&self, id: &str) -> Result<Option<Friendship>, InfraError>;
    fn delete_friendship(&self, id: &str) -> Result<(), InfraError>;
}

/// In-process reference adapter. Guarded by a single `RwLock` per table;
/// real deployments swap this for a client against the durable store
/// without the core noticing.
#[derive(Default)]
pub struct MemoryStore {
    games: RwLock<HashMap<String, GameState>>,
    users: RwLock<HashMap<String, UserRecord>>,
    boards: RwLock<HashMap<String, CustomBoard>>,
    friendships: RwLock<HashMap<String, Friendship>>,
}

impl MemoryStore {
    pub fn new() -> Self {
        MemoryStore::default()
    }
}

impl Store for MemoryStore {
    fn create_game(&self, state: GameState) -> Result<(), InfraError> {
        self.games
            .write()
            .map_err(|_| InfraError::Persistence("games lock poisoned".into()))?
            .insert(state.id.clone(), state);
        Ok(())
    }

    fn fetch_game(&self, id: &str) -> Result<Option<GameState>, InfraError> {
        Ok(self
            .games
            .read()
            .map_err(|_| InfraError::Persistence("games lock poisoned".into()))?
            .get(id)
            .cloned())
    }

    fn fetch_game_by_room_code(&self, room_code: &str) -> Result<Option<GameState>, InfraError> {
        Ok(self
            .games
            .read()
            .map_err(|_| InfraError::Persistence("games lock poisoned".into()))?
            .values()
            .find(|g| g.room_code.as_deref() == Some(room_code))
            .cloned())
    }

    fn update_game(&self, state: GameState) -> Result<(), InfraError> {
        self.games
            .write()
            .map_err(|_| InfraError::Persistence("games lock poisoned".into()))?
            .insert(state.id.clone(), state);
        Ok(())
    }

    fn delete_game(&self, id: &str) -> Result<(), InfraError> {
        self.games
            .write()
            .map_err(|_| InfraError::Persistence("games lock poisoned".into()))?
            .remove(id);
        Ok(())
    }

    fn list_unfinished_game_ids(&self) -> Result<Vec<String>, InfraError> {
        use crate::engine::GameStatus;
        Ok(self
            .games
            .read()
            .map_err(|_| InfraError::Persistence("games lock poisoned".into()))?
            .values()
            .filter(|g| !matches!(g.status, GameStatus::Finished | GameStatus::Abandoned))
            .map(|g| g.id.clone())
            .collect())
    }

    fn fetch_user(&self, id: &str) -> Result<Option<UserRecord>, InfraError> {
        Ok(self
            .users
            .read()
            .map_err(|_| InfraError::Persistence("users lock poisoned".into()))?
            .get(id)
            .cloned())
    }

    fn update_user_rating(&self, id: &str, rating: i32) -> Result<(), InfraError> {
        let mut users = self.users.write().map_err(|_| InfraError::Persistence("users lock poisoned".into()))?;
        users
            .entry(id.to_string())
            .and_modify(|u| u.rating = rating)
            .or_insert_with(|| UserRecord { id: id.to_string(), rating });
        Ok(())
    }

    fn create_custom_board(&self, board: CustomBoard) -> Result<(), InfraError> {
        self.boards
            .write()
            .map_err(|_| InfraError::Persistence("boards lock poisoned".into()))?
            .insert(board.id.clone(), board);
        Ok(())
    }

    fn fetch_custom_board(&self, id: &str) -> Result<Option<CustomBoard>, InfraError> {
        Ok(self
            .boards
            .read()
            .map_err(|_| InfraError::Persistence("boards lock poisoned".into()))?
            .get(id)
            .cloned())
    }

    fn delete_custom_board(&self, id: &str) -> Result<(), InfraError> {
        self.boards
            .write()
            .map_err(|_| InfraError::Persistence("boards lock poisoned".into()))?
            .remove(id);
        Ok(())
    }

    fn update_custom_board(&self, board: CustomBoard) -> Result<(), InfraError> {
        self.boards
            .write()
            .map_err(|_| InfraError::Persistence("boards lock poisoned".into()))?
            .insert(board.id.clone(), board);
        Ok(())
    }

    fn create_friendship(&self, friendship: Friendship) -> Result<(), InfraError> {
        self.friendships
            .write()
            .map_err(|_| InfraError::Persistence("friendships lock poisoned".into()))?
            .insert(friendship.id.clone(), friendship);
        Ok(())
    }

    fn fetch_friendship(&self, id: &str) -> Result<Option<Friendship>, InfraError> {
        Ok(self
            .friendships
            .read()
            .map_err(|_| InfraError::Persistence("friendships lock poisoned".into()))?
            .get(id)
            .cloned())
    }

    fn delete_friendship(&self, id: &str) -> Result<(), InfraError> {
        self.friendships
            .write()
            .map_err(|_| InfraError::Persistence("friendships lock poisoned".into()))?
            .remove(id);
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::engine::GameState;

    #[test]
    fn round_trips_a_game() {
        let store = MemoryStore::new();
        let state = GameState::new("g1".into(), "w".into(), "b".into(), true, 0);
        store.create_game(state.clone()).unwrap();
        let fetched = store.fetch_game("g1").unwrap().unwrap();
        assert_eq!(fetched.id, state.id);
        assert!(store.fetch_game("missing").unwrap().is_none());
    }

    #[test]
    fn fetches_game_by_room_code() {
        let store = MemoryStore::new();
        let mut state = GameState::new("g1".into(), "w".into(), "b".into(), false, 0);
        state.room_code = Some("ABC123".into());
        store.create_game(state).unwrap();
        assert!(store.fetch_game_by_room_code("ABC123").unwrap().is_some());
        assert!(store.fetch_game_by_room_code("ZZZZZZ").unwrap().is_none());
    }

    #[test]
    fn user_rating_defaults_and_updates() {
        let store = MemoryStore::new();
        assert!(store.fetch_user("u1").unwrap().is_none());
        store.update_user_rating("u1", 1032).unwrap();
        assert_eq!(store.fetch_user("u1").unwrap().unwrap().rating, 1032);
    }
}
