//! MoveValidator (C3): fixed-order legality predicate plus per-kind
//! geometry. This is the single site of per-kind dispatch (§9) — no other
//! module scatters kind-specific move-shape checks.

use crate::cooldown;
use crate::errors::ValidationError;
use crate::player_state::PlayerState;
use crate::types::{Board, Color, PieceKind};

/// A proposed move, identified purely by coordinates — the validator looks
/// up the moving piece itself from the board.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Move {
    pub from_row: i32,
    pub from_col: i32,
    pub to_row: i32,
    pub to_col: i32,
}

fn in_bounds(row: i32, col: i32) -> bool {
    (0..8).contains(&row) && (0..8).contains(&col)
}

/// Energy cost of moving a piece of this kind. Derived as half the kind's
/// base cooldown in seconds — the only formula consistent with the pawn
/// cost of 2.0 implied by the double-push scenario, applied uniformly
/// across kinds since the distilled contract does not spell out a
/// per-kind cost table directly.
pub fn energy_cost(kind: PieceKind) -> f64 {
    kind.base_cooldown_secs() as f64 / 2.0
}

/// Validates `mv` for `player_color` against `board`/`player_state` at
/// `now`. Evaluation order is fixed and short-circuits on the first failing
/// predicate (§4.3).
pub fn validate(
    board: &Board,
    mv: Move,
    player_color: Color,
    player_state: &PlayerState,
    now: i64,
) -> Result<(), ValidationError> {
    if !in_bounds(mv.from_row, mv.from_col) {
        return Err(ValidationError::InvalidPiece);
    }
    let src = board
        .get(mv.from_row, mv.from_col)
        .filter(|p| p.color == player_color)
        .ok_or(ValidationError::InvalidPiece)?;

    if !in_bounds(mv.to_row, mv.to_col) || (mv.from_row, mv.from_col) == (mv.to_row, mv.to_col) {
        return Err(ValidationError::IllegalMove);
    }

    if cooldown::is_on_cooldown(&src.id, player_state, now) {
        return Err(ValidationError::PieceOnCooldown);
    }

    if player_state.energy < energy_cost(src.kind) {
        return Err(ValidationError::InsufficientEnergy);
    }

    let dst = board.get(mv.to_row, mv.to_col);
    if dst.is_some_and(|p| p.color == player_color) {
        return Err(ValidationError::IllegalMove);
    }

    if geometry_legal(board, mv, src.kind, player_color) {
        Ok(())
    } else {
        Err(ValidationError::IllegalMove)
    }
}

fn forward_for(color: Color) -> i32 {
    match color {
        Color::White => -1,
        Color::Black => 1,
    }
}

fn starting_row_for(color: Color) -> i32 {
    match color {
        Color::White => 6,
        Color::Black => 1,
    }
}

fn between_cells_empty(board: &Board, from_row: i32, from_col: i32, to_row: i32, to_col: i32) -> bool {
    let steps = (to_row - from_row).abs().max((to_col - from_col).abs());
    let step_r = (to_row - from_row).signum();
    let step_c = (to_col - from_col).signum();
    (1..steps).all(|i| board.is_empty(from_row + step_r * i, from_col + step_c * i))
}

fn count_occupied_between(board: &Board, from_row: i32, from_col: i32, to_row: i32, to_col: i32) -> usize {
    let steps = (to_row - from_row).abs().max((to_col - from_col).abs());
    let step_r = (to_row - from_row).signum();
    let step_c = (to_col - from_col).signum();
    (1..steps)
        .filter(|&i| !board.is_empty(from_row + step_r * i, from_col + step_c * i))
        .count()
}

fn geometry_legal(board: &Board, mv: Move, kind: PieceKind, color: Color) -> bool {
    let dr = mv.to_row - mv.from_row;
    let dc = mv.to_col - mv.from_col;
    let dest_occupied = !board.is_empty(mv.to_row, mv.to_col);
    let forward = forward_for(color);

    match kind {
        PieceKind::Pawn | PieceKind::PawnGeneral => {
            if dc == 0 {
                if dest_occupied {
                    return false;
                }
                if dr == forward {
                    return true;
                }
                if dr == 2 * forward {
                    return mv.from_row == starting_row_for(color)
                        && board.is_empty(mv.from_row + forward, mv.from_col);
                }
                false
            } else if dc.abs() == 1 && dr == forward {
                dest_occupied
            } else {
                false
            }
        }
        PieceKind::TwistedPawn => {
            if dc.abs() == 1 && dr == forward {
                !dest_occupied
            } else if dc == 0 && dr == forward {
                dest_occupied
            } else {
                false
            }
        }
        PieceKind::Knight | PieceKind::Prince => {
            matches!((dr.abs(), dc.abs()), (1, 2) | (2, 1))
        }
        PieceKind::Bishop | PieceKind::IceBishop => {
            dr.abs() == dc.abs()
                && dr != 0
                && between_cells_empty(board, mv.from_row, mv.from_col, mv.to_row, mv.to_col)
        }
        PieceKind::Rook => {
            (dr == 0) != (dc == 0)
                && between_cells_empty(board, mv.from_row, mv.from_col, mv.to_row, mv.to_col)
        }
        PieceKind::Queen => {
            let rook_like = (dr == 0) != (dc == 0);
            let bishop_like = dr.abs() == dc.abs() && dr != 0;
            (rook_like || bishop_like)
                && between_cells_empty(board, mv.from_row, mv.from_col, mv.to_row, mv.to_col)
        }
        PieceKind::King => dr.abs().max(dc.abs()) == 1,
        PieceKind::FlyingCastle => {
            (dr == 0) != (dc == 0)
                && count_occupied_between(board, mv.from_row, mv.from_col, mv.to_row, mv.to_col) <= 1
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::Piece;

    fn state_with_energy(energy: f64) -> PlayerState {
        PlayerState {
            energy,
            energy_regen_rate: 0.5,
            last_energy_update: 0,
            piece_cooldowns: Default::default(),
        }
    }

    #[test]
    fn queen_energy_gate_scenario() {
        let board = Board::starting_position();
        let state = PlayerState {
            energy: 1.0,
            energy_regen_rate: 0.5,
            last_energy_update: 1_000_000,
            piece_cooldowns: Default::default(),
        };
        let mv = Move { from_row: 7, from_col: 3, to_row: 6, to_col: 3 };
        let result = validate(&board, mv, Color::White, &state, 1_000_000);
        assert_eq!(result, Err(ValidationError::InsufficientEnergy));
    }

    #[test]
    fn pawn_double_push_legal_from_start() {
        let board = Board::starting_position();
        let state = state_with_energy(10.0);
        let mv = Move { from_row: 6, from_col: 4, to_row: 4, to_col: 4 };
        assert!(validate(&board, mv, Color::White, &state, 1_000_000).is_ok());
    }

    #[test]
    fn pawn_double_push_blocked_by_intermediate_occupant() {
        let mut board = Board::empty();
        board.set(6, 4, Some(Piece::new("p", PieceKind::Pawn, Color::White, 6, 4)));
        board.set(5, 4, Some(Piece::new("blocker", PieceKind::Pawn, Color::Black, 5, 4)));
        let state = state_with_energy(10.0);
        let mv = Move { from_row: 6, from_col: 4, to_row: 4, to_col: 4 };
        assert_eq!(
            validate(&board, mv, Color::White, &state, 0),
            Err(ValidationError::IllegalMove)
        );
    }

    #[test]
    fn pawn_cannot_capture_straight() {
        let mut board = Board::empty();
        board.set(6, 4, Some(Piece::new("p", PieceKind::Pawn, Color::White, 6, 4)));
        board.set(5, 4, Some(Piece::new("e", PieceKind::Pawn, Color::Black, 5, 4)));
        let state = state_with_energy(10.0);
        let mv = Move { from_row: 6, from_col: 4, to_row: 5, to_col: 4 };
        assert_eq!(
            validate(&board, mv, Color::White, &state, 0),
            Err(ValidationError::IllegalMove)
        );
    }

    #[test]
    fn pawn_diagonal_requires_enemy() {
        let mut board = Board::empty();
        board.set(6, 4, Some(Piece::new("p", PieceKind::Pawn, Color::White, 6, 4)));
        let state = state_with_energy(10.0);
        let mv = Move { from_row: 6, from_col: 4, to_row: 5, to_col: 5 };
        assert_eq!(
            validate(&board, mv, Color::White, &state, 0),
            Err(ValidationError::IllegalMove)
        );
    }

    #[test]
    fn twisted_pawn_diagonal_is_non_capturing() {
        let mut board = Board::empty();
        board.set(4, 4, Some(Piece::new("t", PieceKind::TwistedPawn, Color::White, 4, 4)));
        board.set(3, 5, Some(Piece::new("e", PieceKind::Pawn, Color::Black, 3, 5)));
        let state = state_with_energy(10.0);
        let mv = Move { from_row: 4, from_col: 4, to_row: 3, to_col: 5 };
        assert_eq!(
            validate(&board, mv, Color::White, &state, 0),
            Err(ValidationError::IllegalMove)
        );
    }

    #[test]
    fn twisted_pawn_captures_straight() {
        let mut board = Board::empty();
        board.set(4, 4, Some(Piece::new("t", PieceKind::TwistedPawn, Color::White, 4, 4)));
        board.set(3, 4, Some(Piece::new("e", PieceKind::Pawn, Color::Black, 3, 4)));
        let state = state_with_energy(10.0);
        let mv = Move { from_row: 4, from_col: 4, to_row: 3, to_col: 4 };
        assert!(validate(&board, mv, Color::White, &state, 0).is_ok());
    }

    #[test]
    fn flying_castle_jumps_exactly_one() {
        let mut board = Board::empty();
        board.set(4, 0, Some(Piece::new("fc", PieceKind::FlyingCastle, Color::White, 4, 0)));
        board.set(4, 2, Some(Piece::new("x", PieceKind::Pawn, Color::Black, 4, 2)));
        let state = state_with_energy(10.0);
        let mv = Move { from_row: 4, from_col: 0, to_row: 4, to_col: 4 };
        assert!(validate(&board, mv, Color::White, &state, 0).is_ok());
    }

    #[test]
    fn flying_castle_rejects_two_occupied_between() {
        let mut board = Board::empty();
        board.set(4, 0, Some(Piece::new("fc", PieceKind::FlyingCastle, Color::White, 4, 0)));
        board.set(4, 1, Some(Piece::new("x", PieceKind::Pawn, Color::Black, 4, 1)));
        board.set(4, 2, Some(Piece::new("y", PieceKind::Pawn, Color::Black, 4, 2)));
        let state = state_with_energy(10.0);
        let mv = Move { from_row: 4, from_col: 0, to_row: 4, to_col: 4 };
        assert_eq!(
            validate(&board, mv, Color::White, &state, 0),
            Err(ValidationError::IllegalMove)
        );
    }

    #[test]
    fn cooldown_blocks_move_before_energy_check() {
        let mut board = Board::empty();
        board.set(4, 4, Some(Piece::new("q", PieceKind::Queen, Color::White, 4, 4)));
        let mut state = state_with_energy(0.0);
        cooldown::set_cooldown("q", PieceKind::Queen, &mut state, 0);
        let mv = Move { from_row: 4, from_col: 4, to_row: 4, to_col: 5 };
        assert_eq!(
            validate(&board, mv, Color::White, &state, 0),
            Err(ValidationError::PieceOnCooldown)
        );
    }

    #[test]
    fn source_owned_by_other_color_is_invalid_piece() {
        let board = Board::starting_position();
        let state = state_with_energy(10.0);
        let mv = Move { from_row: 1, from_col: 4, to_row: 2, to_col: 4 };
        assert_eq!(
            validate(&board, mv, Color::White, &state, 0),
            Err(ValidationError::InvalidPiece)
        );
    }

    #[test]
    fn cannot_capture_own_piece() {
        let board = Board::starting_position();
        let state = state_with_energy(10.0);
        let mv = Move { from_row: 7, from_col: 0, to_row: 6, to_col: 0 };
        assert_eq!(
            validate(&board, mv, Color::White, &state, 0),
            Err(ValidationError::IllegalMove)
        );
    }

    #[test]
    fn knight_geometry() {
        let board = Board::starting_position();
        let state = state_with_energy(10.0);
        let mv = Move { from_row: 7, from_col: 1, to_row: 5, to_col: 2 };
        assert!(validate(&board, mv, Color::White, &state, 0).is_ok());
    }
}
