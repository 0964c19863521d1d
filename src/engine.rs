//! GameEngine (C6): orchestrates exactly one game — move attempt, execution,
//! special effects, and win detection.

use serde::{Deserialize, Serialize};

use crate::cooldown;
use crate::energy;
use crate::errors::{ResourceError, ValidationError};
use crate::move_validator::{self, Move};
use crate::player_state::PlayerState;
use crate::types::{Board, Color, PieceKind};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum GameStatus {
    Waiting,
    Active,
    Paused,
    Finished,
    Abandoned,
}

/// The full persisted/in-memory state of one game (§3).
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct GameState {
    pub id: String,
    pub board: Board,
    pub white_state: PlayerState,
    pub black_state: PlayerState,
    pub white_id: String,
    pub black_id: String,
    pub status: GameStatus,
    pub winner: Option<Color>,
    pub started_at: Option<i64>,
    pub last_move_at: Option<i64>,
    pub ended_at: Option<i64>,
    pub rated: bool,
    pub room_code: Option<String>,
}

impl GameState {
    pub fn new(id: String, white_id: String, black_id: String, rated: bool, now: i64) -> Self {
        GameState {
            id,
            board: Board::starting_position(),
            white_state: PlayerState::fresh(now),
            black_state: PlayerState::fresh(now),
            white_id,
            black_id,
            status: GameStatus::Waiting,
            winner: None,
            started_at: None,
            last_move_at: None,
            ended_at: None,
            rated,
            room_code: None,
        }
    }

    pub fn player_state(&self, color: Color) -> &PlayerState {
        match color {
            Color::White => &self.white_state,
            Color::Black => &self.black_state,
        }
    }

    pub fn player_state_mut(&mut self, color: Color) -> &mut PlayerState {
        match color {
            Color::White => &mut self.white_state,
            Color::Black => &mut self.black_state,
        }
    }

    pub fn color_of(&self, player_id: &str) -> Option<Color> {
        if player_id == self.white_id {
            Some(Color::White)
        } else if player_id == self.black_id {
            Some(Color::Black)
        } else {
            None
        }
    }
}

/// A move request as received from the real-time channel (§6): coordinates
/// are 0..7 integers, player identified by id rather than color.
#[derive(Debug, Clone)]
pub struct MoveRequest {
    pub player_id: String,
    pub from_row: i32,
    pub from_col: i32,
    pub to_row: i32,
    pub to_col: i32,
}

#[derive(Debug, Clone)]
pub enum AttemptMoveError {
    Resource(ResourceError),
    Validation(ValidationError),
}

impl std::fmt::Display for AttemptMoveError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            AttemptMoveError::Resource(e) => write!(f, "{e}"),
            AttemptMoveError::Validation(e) => write!(f, "{e}"),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AttemptMoveSuccess {
    pub captured_king: bool,
    pub game_finished: bool,
    pub winner: Option<Color>,
}

/// Orchestrates exactly one game. Holds the moment the underlying game was
/// started, needed by the energy regen-rate curve (§4.5).
pub struct GameEngine {
    pub state: GameState,
    pub game_started_at: i64,
}

impl GameEngine {
    pub fn new(state: GameState, game_started_at: i64) -> Self {
        GameEngine { state, game_started_at }
    }

    /// Materialises both player states (regen rate, energy, cooldown sweep)
    /// without evaluating a move. Safe to call at any frequency.
    pub fn tick(&mut self, now: i64) {
        self.materialise(Color::White, now);
        self.materialise(Color::Black, now);
    }

    fn materialise(&mut self, color: Color, now: i64) {
        let game_started_at = self.game_started_at;
        let state = self.state.player_state_mut(color);
        state.energy_regen_rate = energy::update_regen_rate(game_started_at, now);
        state.energy = energy::current_energy(state, now);
        state.last_energy_update = now;
        cooldown::sweep(state, now);
    }

    pub fn attempt_move(&mut self, request: MoveRequest, now: i64) -> Result<AttemptMoveSuccess, AttemptMoveError> {
        if self.state.status != GameStatus::Active {
            return Err(AttemptMoveError::Resource(ResourceError::GameNotActive(self.state.id.clone())));
        }
        let color = self
            .state
            .color_of(&request.player_id)
            .ok_or_else(|| AttemptMoveError::Resource(ResourceError::PlayerNotInGame(request.player_id.clone(), self.state.id.clone())))?;

        self.materialise(color, now);

        let mv = Move {
            from_row: request.from_row,
            from_col: request.from_col,
            to_row: request.to_row,
            to_col: request.to_col,
        };
        move_validator::validate(&self.state.board, mv, color, self.state.player_state(color), now)
            .map_err(AttemptMoveError::Validation)?;

        Ok(self.execute(mv, color, now))
    }

    fn execute(&mut self, mv: Move, color: Color, now: i64) -> AttemptMoveSuccess {
        let src = self.state.board.get(mv.from_row, mv.from_col).cloned().expect("validated source piece");
        let dst = self.state.board.get(mv.to_row, mv.to_col).cloned();

        let is_prince_shield = dst.as_ref().is_some_and(|d| {
            d.color != color && d.kind == PieceKind::Prince && d.prince_ability_remaining == Some(true)
        });

        if is_prince_shield {
            self.state.board.consume_prince_shield(mv.to_row as u8, mv.to_col as u8);
            let state = self.state.player_state_mut(color);
            // Defensive, as the normal-move path is: validation already
            // gated on energy, so consumption is not expected to fail here.
            let _ = energy::consume(state, move_validator::energy_cost(src.kind), now);
            cooldown::set_cooldown(&src.id, src.kind, state, now);
            if let Some(piece) = self.state.board.get_mut(mv.from_row, mv.from_col) {
                piece.has_moved = true;
            }
            self.apply_special_effects(src.kind, color, mv.from_row, mv.from_col, now);
            self.state.last_move_at = Some(now);
            return AttemptMoveSuccess { captured_king: false, game_finished: false, winner: None };
        }

        let state = self.state.player_state_mut(color);
        let outcome = energy::consume(state, move_validator::energy_cost(src.kind), now);
        if !outcome.ok {
            // Should not occur: validation already gated on energy.
            return AttemptMoveSuccess { captured_king: false, game_finished: false, winner: None };
        }
        cooldown::set_cooldown(&src.id, src.kind, state, now);

        self.state
            .board
            .move_piece(mv.from_row as u8, mv.from_col as u8, mv.to_row as u8, mv.to_col as u8)
            .expect("validated source piece");

        let captured_king = dst.as_ref().is_some_and(|d| d.kind == PieceKind::King);
        if captured_king {
            self.state.status = GameStatus::Finished;
            self.state.winner = Some(color);
            self.state.ended_at = Some(now);
        }

        self.apply_special_effects(src.kind, color, mv.to_row, mv.to_col, now);
        self.state.last_move_at = Some(now);

        AttemptMoveSuccess { captured_king, game_finished: captured_king, winner: self.state.winner }
    }

    fn apply_special_effects(&mut self, kind: PieceKind, mover_color: Color, row: i32, col: i32, now: i64) {
        match kind {
            PieceKind::PawnGeneral => self.apply_pawn_general_relief(mover_color, row, col, now),
            PieceKind::IceBishop => self.apply_ice_bishop_extension(mover_color, row, col, now),
            _ => {}
        }
    }

    fn apply_pawn_general_relief(&mut self, mover_color: Color, row: i32, col: i32, now: i64) {
        for (nr, nc) in chebyshev_neighbours(row, col) {
            let Some(neighbour) = self.state.board.get(nr, nc) else { continue };
            if neighbour.color != mover_color {
                continue;
            }
            let id = neighbour.id.clone();
            let state = self.state.player_state_mut(mover_color);
            let remaining = cooldown::get_remaining(&id, state, now);
            if remaining > 0 {
                cooldown::set_deadline(&id, state, now + (remaining - 2000).max(0));
            }
        }
    }

    fn apply_ice_bishop_extension(&mut self, mover_color: Color, row: i32, col: i32, now: i64) {
        let enemy_color = mover_color.opposite();
        for (nr, nc) in chebyshev_neighbours(row, col) {
            let Some(neighbour) = self.state.board.get(nr, nc) else { continue };
            if neighbour.color != enemy_color {
                continue;
            }
            let id = neighbour.id.clone();
            let kind = neighbour.kind;
            let state = self.state.player_state_mut(enemy_color);
            let remaining = cooldown::get_remaining(&id, state, now);
            let cap = kind.base_cooldown_ms() as i64;
            let new_deadline = if remaining > 0 {
                now + (remaining + 3000).min(cap)
            } else {
                now + 3000
            };
            cooldown::set_deadline(&id, state, new_deadline);
        }
    }

    /// Sum of surviving material for `color` (§4.6).
    pub fn calculate_points(&self, color: Color) -> u32 {
        self.state.board.find_by_color(color).iter().map(|p| p.kind.point_value()).sum()
    }

    /// Resolves a tied simultaneous king capture (or single capture) by
    /// material, white breaking ties.
    pub fn resolve_simultaneous_king_capture(&self, white_captured: bool, black_captured: bool) -> Option<Color> {
        match (white_captured, black_captured) {
            (true, true) => {
                let white_points = self.calculate_points(Color::White);
                let black_points = self.calculate_points(Color::Black);
                Some(if black_points > white_points { Color::Black } else { Color::White })
            }
            (true, false) => Some(Color::Black),
            (false, true) => Some(Color::White),
            (false, false) => None,
        }
    }
}

fn chebyshev_neighbours(row: i32, col: i32) -> impl Iterator<Item = (i32, i32)> {
    (-1..=1).flat_map(move |dr| (-1..=1).filter_map(move |dc| (dr != 0 || dc != 0).then_some((row + dr, col + dc))))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::Piece;

    fn engine_with(white_id: &str, black_id: &str, now: i64) -> GameEngine {
        let mut state = GameState::new("g1".into(), white_id.into(), black_id.into(), false, now);
        state.status = GameStatus::Active;
        state.started_at = Some(now);
        GameEngine::new(state, now)
    }

    #[test]
    fn pawn_double_push_sets_cooldown_and_consumes_energy() {
        let mut engine = engine_with("w", "b", 1_000_000);
        engine.state.white_state.energy = 10.0;
        let result = engine
            .attempt_move(MoveRequest { player_id: "w".into(), from_row: 6, from_col: 4, to_row: 4, to_col: 4 }, 1_000_000)
            .unwrap();
        assert!(!result.game_finished);
        assert!(engine.state.board.get(6, 4).is_none());
        let pawn = engine.state.board.get(4, 4).unwrap();
        assert!(pawn.has_moved);
        assert!(engine.state.white_state.energy <= 8.5);
        assert_eq!(engine.state.white_state.piece_cooldowns[&pawn.id], 1_004_000);
    }

    #[test]
    fn prince_shield_blocks_first_capture_then_falls() {
        let mut state = GameState::new("g1".into(), "w".into(), "b".into(), false, 0);
        state.status = GameStatus::Active;
        state.board = Board::empty();
        state.board.set(6, 0, Some(Piece::new("wp", PieceKind::Pawn, Color::White, 6, 0)));
        state.board.set(5, 1, Some(Piece::new("bpr", PieceKind::Prince, Color::Black, 5, 1)));
        state.white_state.energy = 10.0;
        let mut engine = GameEngine::new(state, 0);

        let result = engine
            .attempt_move(MoveRequest { player_id: "w".into(), from_row: 6, from_col: 0, to_row: 5, to_col: 1 }, 0)
            .unwrap();
        assert!(!result.captured_king);
        assert!(engine.state.board.get(6, 0).unwrap().has_moved);
        let prince = engine.state.board.get(5, 1).unwrap();
        assert_eq!(prince.prince_ability_remaining, Some(false));

        cooldown::clear_cooldown("wp", &mut engine.state.white_state);
        engine.state.white_state.energy = 10.0;
        engine
            .attempt_move(MoveRequest { player_id: "w".into(), from_row: 6, from_col: 0, to_row: 5, to_col: 1 }, 5000)
            .unwrap();
        assert!(engine.state.board.find_by_id("bpr").is_none());
        assert_eq!(engine.state.board.get(5, 1).unwrap().id, "wp");
    }

    #[test]
    fn ice_bishop_extends_adjacent_enemy_cooldown() {
        let mut state = GameState::new("g1".into(), "w".into(), "b".into(), false, 0);
        state.status = GameStatus::Active;
        state.board = Board::empty();
        state.board.set(4, 4, Some(Piece::new("ib", PieceKind::IceBishop, Color::White, 4, 4)));
        state.board.set(3, 4, Some(Piece::new("bp", PieceKind::Pawn, Color::Black, 3, 4)));
        state.white_state.energy = 10.0;
        state.black_state.piece_cooldowns.insert("bp".into(), 2000);
        let mut engine = GameEngine::new(state, 0);

        engine
            .attempt_move(MoveRequest { player_id: "w".into(), from_row: 4, from_col: 4, to_row: 3, to_col: 3 }, 0)
            .unwrap();
        assert_eq!(engine.state.black_state.piece_cooldowns["bp"], 4000);
    }

    #[test]
    fn pawn_general_relieves_adjacent_ally_cooldown() {
        let mut state = GameState::new("g1".into(), "w".into(), "b".into(), false, 0);
        state.status = GameStatus::Active;
        state.board = Board::empty();
        state.board.set(4, 4, Some(Piece::new("pg", PieceKind::PawnGeneral, Color::White, 4, 4)));
        state.board.set(4, 3, Some(Piece::new("wp", PieceKind::Pawn, Color::White, 4, 3)));
        state.white_state.energy = 10.0;
        state.white_state.piece_cooldowns.insert("wp".into(), 5000);
        let mut engine = GameEngine::new(state, 0);

        engine
            .attempt_move(MoveRequest { player_id: "w".into(), from_row: 4, from_col: 4, to_row: 3, to_col: 4 }, 0)
            .unwrap();
        assert_eq!(engine.state.white_state.piece_cooldowns["wp"], 3000);
    }

    #[test]
    fn king_capture_finishes_game() {
        let mut state = GameState::new("g1".into(), "w".into(), "b".into(), false, 0);
        state.status = GameStatus::Active;
        state.board = Board::empty();
        state.board.set(4, 4, Some(Piece::new("wq", PieceKind::Queen, Color::White, 4, 4)));
        state.board.set(4, 5, Some(Piece::new("bk", PieceKind::King, Color::Black, 4, 5)));
        state.white_state.energy = 10.0;
        let mut engine = GameEngine::new(state, 0);

        let result = engine
            .attempt_move(MoveRequest { player_id: "w".into(), from_row: 4, from_col: 4, to_row: 4, to_col: 5 }, 0)
            .unwrap();
        assert!(result.game_finished);
        assert_eq!(engine.state.winner, Some(Color::White));
        assert_eq!(engine.state.status, GameStatus::Finished);
    }

    #[test]
    fn finished_game_rejects_further_moves() {
        let mut engine = engine_with("w", "b", 0);
        engine.state.status = GameStatus::Finished;
        engine.state.white_state.energy = 10.0;
        let result = engine.attempt_move(
            MoveRequest { player_id: "w".into(), from_row: 6, from_col: 4, to_row: 5, to_col: 4 },
            0,
        );
        assert!(matches!(result, Err(AttemptMoveError::Resource(ResourceError::GameNotActive(_)))));
    }

    #[test]
    fn unknown_player_is_rejected() {
        let mut engine = engine_with("w", "b", 0);
        let result = engine.attempt_move(
            MoveRequest { player_id: "intruder".into(), from_row: 6, from_col: 4, to_row: 5, to_col: 4 },
            0,
        );
        assert!(matches!(result, Err(AttemptMoveError::Resource(ResourceError::PlayerNotInGame(_, _)))));
    }

    #[test]
    fn tie_break_favours_white_on_equal_points() {
        let engine = engine_with("w", "b", 0);
        assert_eq!(engine.resolve_simultaneous_king_capture(true, true), Some(Color::White));
    }

    #[test]
    fn single_capture_favours_the_surviving_side() {
        let engine = engine_with("w", "b", 0);
        assert_eq!(engine.resolve_simultaneous_king_capture(true, false), Some(Color::Black));
        assert_eq!(engine.resolve_simultaneous_king_capture(false, true), Some(Color::White));
        assert_eq!(engine.resolve_simultaneous_king_capture(false, false), None);
    }
}
