//! End-to-end matchmaking: two distinct players enqueue, get matched into a
//! rated game, and the game is immediately playable.

use std::sync::Arc;

use chronochess::engine::{GameStatus, MoveRequest};
use chronochess::game_manager::GameManager;
use chronochess::matchmaking::MatchmakingManager;
use chronochess::persistence::{MemoryStore, Store};

fn wired() -> (Arc<GameManager>, MatchmakingManager) {
    let store: Arc<dyn Store> = Arc::new(MemoryStore::new());
    let game_manager = Arc::new(GameManager::new(store.clone()));
    let matchmaking = MatchmakingManager::new(store, game_manager.clone());
    (game_manager, matchmaking)
}

#[tokio::test]
async fn two_close_ratings_are_matched_into_a_started_game() {
    let (game_manager, matchmaking) = wired();

    let first = matchmaking.enqueue("alice", 1000).await.unwrap();
    assert!(first.is_none(), "lone queue entry should not match itself");

    let found = matchmaking.enqueue("bob", 1020).await.unwrap().expect("close ratings should match immediately");
    assert!(found.white_id == "alice" || found.white_id == "bob");
    assert!(found.black_id == "alice" || found.black_id == "bob");
    assert_ne!(found.white_id, found.black_id);

    // Both players left the queue.
    let (alice_queued, _) = matchmaking.status("alice").await;
    let (bob_queued, _) = matchmaking.status("bob").await;
    assert!(!alice_queued && !bob_queued);

    // The created game is already active and accepts a move from white.
    let state = game_manager.fetch_state(&found.game_id).await.expect("matched game should exist");
    assert_eq!(state.status, GameStatus::Active);
    assert!(state.rated);

    let request = MoveRequest { player_id: found.white_id.clone(), from_row: 6, from_col: 4, to_row: 4, to_col: 4 };
    let outcome = game_manager.attempt_move(&found.game_id, request).await;
    assert!(outcome.is_ok());
}

#[tokio::test]
async fn distant_ratings_stay_queued_until_the_window_widens() {
    let (_game_manager, matchmaking) = wired();

    matchmaking.enqueue("p1", 1000).await.unwrap();
    let result = matchmaking.enqueue("p2", 5000).await.unwrap();
    assert!(result.is_none());

    let (p1_queued, size) = matchmaking.status("p1").await;
    assert!(p1_queued);
    assert_eq!(size, 2);
}

#[tokio::test]
async fn unrated_rooms_never_enter_the_matchmaking_queue() {
    // Matchmaking only ever sees players who explicitly enqueue; creating a
    // room elsewhere in the same store has no effect on matching.
    let (game_manager, matchmaking) = wired();
    let id = game_manager.create_game("solo-host", "solo-host", false, Some("AAAAAA".into())).unwrap();
    game_manager.start_game(&id).await.unwrap();

    matchmaking.enqueue("alice", 1000).await.unwrap();
    let (alice_queued, size) = matchmaking.status("alice").await;
    assert!(alice_queued);
    assert_eq!(size, 1);
}
