//! MatchmakingManager (C9): rating-based queue with a widening rating
//! window, matched either immediately on enqueue or by a background loop.

use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;

use rand::Rng;
use tokio::sync::RwLock;

use crate::errors::{CoreError, ResourceError};
use crate::game_manager::{self, GameManager};
use crate::persistence::Store;

const DEFAULT_RANGE: i32 = 200;
const MAX_RANGE: i32 = 500;
const EXPANSION_RATE: i32 = 50;
const EXPANSION_INTERVAL_MS: i64 = 30_000;

#[derive(Debug, Clone)]
pub struct QueueEntry {
    pub user_id: String,
    pub rating: i32,
    pub joined_at: i64,
}

/// The two matched players and the freshly-created rated game.
#[derive(Debug, Clone)]
pub struct MatchFound {
    pub game_id: String,
    pub white_id: String,
    pub black_id: String,
}

type MatchHandler = Box<dyn Fn(&MatchFound) + Send + Sync>;

/// Effective rating window for a player who joined at `joined_at`, at `now`.
pub fn rating_window(joined_at: i64, now: i64) -> i32 {
    let intervals = ((now - joined_at) / EXPANSION_INTERVAL_MS).max(0) as i32;
    (DEFAULT_RANGE + EXPANSION_RATE * intervals).min(MAX_RANGE)
}

pub struct MatchmakingManager {
    game_manager: Arc<GameManager>,
    store: Arc<dyn Store>,
    queue: RwLock<HashMap<String, QueueEntry>>,
    handlers: RwLock<Vec<MatchHandler>>,
}

impl MatchmakingManager {
    pub fn new(store: Arc<dyn Store>, game_manager: Arc<GameManager>) -> Self {
        MatchmakingManager { game_manager, store, queue: RwLock::new(HashMap::new()), handlers: RwLock::new(Vec::new()) }
    }

    pub async fn on_match_found<F>(&self, handler: F)
    where
        F: Fn(&MatchFound) + Send + Sync + 'static,
    {
        self.handlers.write().await.push(Box::new(handler));
    }

    /// Enqueues `user_id`. Duplicate enqueues are rejected. Attempts an
    /// immediate match against the rest of the queue.
    pub async fn enqueue(&self, user_id: &str, rating: i32) -> Result<Option<MatchFound>, CoreError> {
        {
            let mut queue = self.queue.write().await;
            if queue.contains_key(user_id) {
                return Err(ResourceError::DuplicateQueueEntry(user_id.to_string()).into());
            }
            queue.insert(
                user_id.to_string(),
                QueueEntry { user_id: user_id.to_string(), rating, joined_at: game_manager::now_ms() },
            );
        }
        self.try_match(user_id).await
    }

    pub async fn dequeue(&self, user_id: &str) {
        self.queue.write().await.remove(user_id);
    }

    pub async fn status(&self, user_id: &str) -> (bool, usize) {
        let queue = self.queue.read().await;
        (queue.contains_key(user_id), queue.len())
    }

    /// Attempts to match `user_id` against the rest of the queue. Tolerates
    /// the player having disappeared between scan and match-creation by
    /// treating that as "no partner found" rather than erroring.
    async fn try_match(&self, user_id: &str) -> Result<Option<MatchFound>, CoreError> {
        let now = game_manager::now_ms();

        let best_match = {
            let queue = self.queue.read().await;
            let Some(player) = queue.get(user_id) else { return Ok(None) };
            let window = rating_window(player.joined_at, now);

            queue
                .values()
                .filter(|candidate| candidate.user_id != player.user_id)
                .filter(|candidate| (candidate.rating - player.rating).abs() <= window)
                .min_by_key(|candidate| ((candidate.rating - player.rating).abs(), candidate.joined_at))
                .cloned()
        };

        let Some(opponent) = best_match else { return Ok(None) };

        // Remove both before creating the game so concurrent callers can't
        // re-match the same pair.
        let removed_self;
        let removed_opponent;
        {
            let mut queue = self.queue.write().await;
            removed_self = queue.remove(user_id).is_some();
            removed_opponent = queue.remove(&opponent.user_id).is_some();
        }
        if !removed_self || !removed_opponent {
            // One side vanished concurrently; treat as no match and let the
            // surviving player be re-evaluated on the next pass.
            return Ok(None);
        }

        let coin_flip_white_is_user = rand::thread_rng().gen_bool(0.5);
        let (white_id, black_id) = if coin_flip_white_is_user {
            (user_id.to_string(), opponent.user_id.clone())
        } else {
            (opponent.user_id.clone(), user_id.to_string())
        };

        let game_id = self.game_manager.create_game(&white_id, &black_id, true, None)?;
        self.game_manager.start_game(&game_id).await?;

        let found = MatchFound { game_id, white_id, black_id };
        for handler in self.handlers.read().await.iter() {
            handler(&found);
        }
        log::info!(
            "matched {} vs {} into game {} (white={})",
            user_id,
            opponent.user_id,
            found.game_id,
            found.white_id
        );
        Ok(Some(found))
    }

    /// Every second, attempts to match every currently queued player.
    pub async fn run_match_loop(&self) {
        let mut interval = tokio::time::interval(Duration::from_secs(1));
        loop {
            interval.tick().await;
            let user_ids: Vec<String> = self.queue.read().await.keys().cloned().collect();
            for user_id in user_ids {
                if let Err(e) = self.try_match(&user_id).await {
                    log::warn!("matchmaking pass failed for {user_id}: {e}");
                }
            }
        }
    }
}
