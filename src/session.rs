//! SessionHub (C10): per-player socket registry plus batched per-game
//! broadcast. Batching is a trailing 100ms debounce with a 500ms hard cap
//! (§4.10, §9 "Broadcast batching") — newer state always supersedes older,
//! never queues.

use std::collections::{HashMap, HashSet};
use std::sync::Arc;
use std::time::Duration;

use tokio::sync::RwLock;

use crate::game_manager::now_ms;

pub type SessionId = String;
pub type UserId = String;
pub type GameId = String;

const DEBOUNCE_MS: u64 = 100;
const HARD_CAP_MS: i64 = 500;

/// Anything that can receive an outbound wire event (§6). The concrete
/// implementation is a thin wrapper around a WebSocket actor address; the
/// hub itself knows nothing about the transport.
pub trait SessionSink: Send + Sync {
    fn send_event(&self, payload: serde_json::Value);
}

struct PendingBroadcast {
    latest: Option<serde_json::Value>,
    first_pending_at: Option<i64>,
    generation: u64,
}

impl PendingBroadcast {
    fn new() -> Self {
        PendingBroadcast { latest: None, first_pending_at: None, generation: 0 }
    }
}

#[derive(Default)]
struct Registry {
    sinks: HashMap<SessionId, Arc<dyn SessionSink>>,
    user_sessions: HashMap<UserId, HashSet<SessionId>>,
    session_user: HashMap<SessionId, UserId>,
    subscriptions: HashMap<GameId, HashSet<SessionId>>,
}

pub struct SessionHub {
    registry: RwLock<Registry>,
    broadcasts: RwLock<HashMap<GameId, PendingBroadcast>>,
}

impl SessionHub {
    pub fn new() -> Arc<Self> {
        Arc::new(SessionHub { registry: RwLock::new(Registry::default()), broadcasts: RwLock::new(HashMap::new()) })
    }

    pub async fn register(&self, session_id: SessionId, user_id: UserId, sink: Arc<dyn SessionSink>) {
        let mut registry = self.registry.write().await;
        registry.sinks.insert(session_id.clone(), sink);
        registry.user_sessions.entry(user_id.clone()).or_default().insert(session_id.clone());
        registry.session_user.insert(session_id, user_id);
    }

    pub async fn unregister(&self, session_id: &SessionId) {
        let mut registry = self.registry.write().await;
        registry.sinks.remove(session_id);
        if let Some(user_id) = registry.session_user.remove(session_id) {
            if let Some(sessions) = registry.user_sessions.get_mut(&user_id) {
                sessions.remove(session_id);
                if sessions.is_empty() {
                    registry.user_sessions.remove(&user_id);
                }
            }
        }
        for subscribers in registry.subscriptions.values_mut() {
            subscribers.remove(session_id);
        }
    }

    pub async fn subscribe(&self, session_id: &SessionId, game_id: &str) {
        self.registry.write().await.subscriptions.entry(game_id.to_string()).or_default().insert(session_id.clone());
    }

    pub async fn unsubscribe(&self, session_id: &SessionId, game_id: &str) {
        if let Some(subscribers) = self.registry.write().await.subscriptions.get_mut(game_id) {
            subscribers.remove(session_id);
        }
    }

    pub async fn sessions_for_user(&self, user_id: &str) -> Vec<SessionId> {
        self.registry.read().await.user_sessions.get(user_id).map(|s| s.iter().cloned().collect()).unwrap_or_default()
    }

    pub async fn all_users(&self) -> Vec<UserId> {
        self.registry.read().await.user_sessions.keys().cloned().collect()
    }

    /// Sends `payload` directly to every session of `user_id`, bypassing
    /// batching — used for events that are not per-game state pushes
    /// (`roomCreated`, `moveRejected`, matchmaking events, etc).
    pub async fn send_to_user(&self, user_id: &str, payload: serde_json::Value) {
        let registry = self.registry.read().await;
        let Some(sessions) = registry.user_sessions.get(user_id) else { return };
        for session_id in sessions {
            if let Some(sink) = registry.sinks.get(session_id) {
                sink.send_event(payload.clone());
            }
        }
    }

    async fn broadcast_to_subscribers(&self, game_id: &str, payload: serde_json::Value) {
        let registry = self.registry.read().await;
        let Some(subscribers) = registry.subscriptions.get(game_id) else { return };
        for session_id in subscribers {
            if let Some(sink) = registry.sinks.get(session_id) {
                sink.send_event(payload.clone());
            }
        }
    }

    /// Queues `payload` as the latest state for `game_id`. Supersedes any
    /// still-pending payload. Schedules a debounced flush, or flushes
    /// immediately if the 500ms hard cap has already elapsed since the
    /// first pending update.
    pub async fn queue_update(self: &Arc<Self>, game_id: GameId, payload: serde_json::Value) {
        let now = now_ms();
        let (flush_immediately, scheduled_generation) = {
            let mut broadcasts = self.broadcasts.write().await;
            let entry = broadcasts.entry(game_id.clone()).or_insert_with(PendingBroadcast::new);
            entry.latest = Some(payload);
            let first_pending_at = *entry.first_pending_at.get_or_insert(now);
            entry.generation += 1;
            let elapsed = now - first_pending_at;
            if elapsed >= HARD_CAP_MS {
                (true, None)
            } else {
                (false, Some(entry.generation))
            }
        };

        if flush_immediately {
            self.flush(&game_id).await;
        } else if let Some(generation) = scheduled_generation {
            let hub = self.clone();
            let game_id = game_id.clone();
            tokio::spawn(async move {
                tokio::time::sleep(Duration::from_millis(DEBOUNCE_MS)).await;
                hub.flush_if_current(&game_id, generation).await;
            });
        }
    }

    async fn flush_if_current(&self, game_id: &str, generation: u64) {
        let still_current = {
            let broadcasts = self.broadcasts.read().await;
            broadcasts.get(game_id).is_some_and(|entry| entry.generation == generation)
        };
        if still_current {
            self.flush(game_id).await;
        }
    }

    /// Emits the currently-pending state for `game_id`, if any, and clears
    /// the pending slot. Available for explicit flush outside the normal
    /// debounce/hard-cap schedule.
    pub async fn flush(&self, game_id: &str) {
        let payload = {
            let mut broadcasts = self.broadcasts.write().await;
            let Some(entry) = broadcasts.get_mut(game_id) else { return };
            entry.first_pending_at = None;
            entry.latest.take()
        };
        if let Some(payload) = payload {
            self.broadcast_to_subscribers(game_id, payload).await;
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Mutex as StdMutex;

    struct RecordingSink(Arc<StdMutex<Vec<serde_json::Value>>>);
    impl SessionSink for RecordingSink {
        fn send_event(&self, payload: serde_json::Value) {
            self.0.lock().unwrap().push(payload);
        }
    }

    #[tokio::test]
    async fn register_and_lookup_by_user() {
        let hub = SessionHub::new();
        let received = Arc::new(StdMutex::new(Vec::new()));
        hub.register("s1".into(), "u1".into(), Arc::new(RecordingSink(received.clone()))).await;
        assert_eq!(hub.sessions_for_user("u1").await, vec!["s1".to_string()]);
        assert_eq!(hub.all_users().await, vec!["u1".to_string()]);
    }

    #[tokio::test]
    async fn unregister_clears_all_indexes() {
        let hub = SessionHub::new();
        let received = Arc::new(StdMutex::new(Vec::new()));
        hub.register("s1".into(), "u1".into(), Arc::new(RecordingSink(received))).await;
        hub.unregister(&"s1".to_string()).await;
        assert!(hub.sessions_for_user("u1").await.is_empty());
        assert!(hub.all_users().await.is_empty());
    }

    #[tokio::test]
    async fn multiple_sessions_per_user_allowed() {
        let hub = SessionHub::new();
        let received = Arc::new(StdMutex::new(Vec::new()));
        hub.register("s1".into(), "u1".into(), Arc::new(RecordingSink(received.clone()))).await;
        hub.register("s2".into(), "u1".into(), Arc::new(RecordingSink(received))).await;
        let mut sessions = hub.sessions_for_user("u1").await;
        sessions.sort();
        assert_eq!(sessions, vec!["s1".to_string(), "s2".to_string()]);
    }

    #[tokio::test]
    async fn subscribers_receive_flushed_broadcast() {
        let hub = SessionHub::new();
        let received = Arc::new(StdMutex::new(Vec::new()));
        hub.register("s1".into(), "u1".into(), Arc::new(RecordingSink(received.clone()))).await;
        hub.subscribe(&"s1".to_string(), "g1").await;
        hub.queue_update("g1".into(), serde_json::json!({"board": "first"})).await;
        hub.flush("g1").await;
        assert_eq!(received.lock().unwrap().len(), 1);
    }

    #[tokio::test]
    async fn later_update_supersedes_pending_one() {
        let hub = SessionHub::new();
        let received = Arc::new(StdMutex::new(Vec::new()));
        hub.register("s1".into(), "u1".into(), Arc::new(RecordingSink(received.clone()))).await;
        hub.subscribe(&"s1".to_string(), "g1").await;
        hub.queue_update("g1".into(), serde_json::json!({"n": 1})).await;
        hub.queue_update("g1".into(), serde_json::json!({"n": 2})).await;
        hub.flush("g1").await;
        let events = received.lock().unwrap();
        assert_eq!(events.len(), 1);
        assert_eq!(events[0]["n"], 2);
    }

    #[tokio::test]
    async fn debounced_flush_eventually_delivers() {
        let hub = SessionHub::new();
        let received = Arc::new(StdMutex::new(Vec::new()));
        hub.register("s1".into(), "u1".into(), Arc::new(RecordingSink(received.clone()))).await;
        hub.subscribe(&"s1".to_string(), "g1").await;
        hub.queue_update("g1".into(), serde_json::json!({"n": 1})).await;
        tokio::time::sleep(Duration::from_millis(150)).await;
        assert_eq!(received.lock().unwrap().len(), 1);
    }

    #[tokio::test]
    async fn send_to_user_bypasses_batching() {
        let hub = SessionHub::new();
        let received = Arc::new(StdMutex::new(Vec::new()));
        hub.register("s1".into(), "u1".into(), Arc::new(RecordingSink(received.clone()))).await;
        hub.send_to_user("u1", serde_json::json!({"error": "roomFull"})).await;
        assert_eq!(received.lock().unwrap().len(), 1);
    }
}
