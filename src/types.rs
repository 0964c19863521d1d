//! Core board and piece model (Board component).
//!
//! A board is a finite mapping from `(row, col)` in `0..8²` to an optional
//! [`Piece`]. Unlike classical chess, legality does not depend on check or
//! checkmate — the sole win condition is capturing the enemy king — so this
//! module carries no notion of attack detection, only placement and identity.

use serde::{Deserialize, Serialize};

/// Board side. White starts on rows 6-7, black on rows 0-1.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Color {
    White,
    Black,
}

impl Color {
    pub fn opposite(self) -> Color {
        match self {
            Color::White => Color::Black,
            Color::Black => Color::White,
        }
    }
}

/// Every piece kind playable on the board, including the variant's custom
/// pieces. Kind drives cooldown duration, point value, and move geometry.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum PieceKind {
    Pawn,
    Knight,
    Bishop,
    Rook,
    Queen,
    King,
    TwistedPawn,
    PawnGeneral,
    FlyingCastle,
    Prince,
    IceBishop,
}

impl PieceKind {
    /// Point value used by [`crate::engine`]'s material tie-break.
    pub fn point_value(self) -> u32 {
        match self {
            PieceKind::Pawn | PieceKind::TwistedPawn | PieceKind::PawnGeneral => 1,
            PieceKind::Knight | PieceKind::Bishop | PieceKind::Prince | PieceKind::IceBishop => 3,
            PieceKind::Rook | PieceKind::FlyingCastle => 5,
            PieceKind::Queen => 9,
            PieceKind::King => 0,
        }
    }

    /// Base cooldown in whole seconds, before conversion to milliseconds.
    pub fn base_cooldown_secs(self) -> u64 {
        match self {
            PieceKind::Pawn | PieceKind::TwistedPawn => 4,
            PieceKind::Knight | PieceKind::Prince => 5,
            PieceKind::Bishop | PieceKind::IceBishop => 6,
            PieceKind::Rook | PieceKind::FlyingCastle => 7,
            PieceKind::Queen => 9,
            PieceKind::King => 11,
            PieceKind::PawnGeneral => 5,
        }
    }

    pub fn base_cooldown_ms(self) -> u64 {
        self.base_cooldown_secs() * 1000
    }
}

/// A single piece on the board. Its `row`/`col` MUST always equal the cell
/// it occupies on its owning [`Board`] — see the board-integrity invariant.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Piece {
    pub id: String,
    pub kind: PieceKind,
    pub color: Color,
    pub row: u8,
    pub col: u8,
    pub has_moved: bool,
    /// Only ever `Some` for [`PieceKind::Prince`]. `Some(true)` means the
    /// prince shield has not yet been spent.
    pub prince_ability_remaining: Option<bool>,
}

impl Piece {
    pub fn new(id: impl Into<String>, kind: PieceKind, color: Color, row: u8, col: u8) -> Self {
        let prince_ability_remaining = matches!(kind, PieceKind::Prince).then_some(true);
        Piece {
            id: id.into(),
            kind,
            color,
            row,
            col,
            has_moved: false,
            prince_ability_remaining,
        }
    }
}

/// 8x8 grid of optional pieces, addressed by `(row, col)` with both axes in
/// `0..8`.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Board {
    squares: [Option<Piece>; 64],
}

fn in_bounds(row: i32, col: i32) -> bool {
    (0..8).contains(&row) && (0..8).contains(&col)
}

fn index(row: u8, col: u8) -> usize {
    row as usize * 8 + col as usize
}

impl Board {
    /// An empty board with no pieces placed.
    pub fn empty() -> Self {
        Board {
            squares: std::array::from_fn(|_| None),
        }
    }

    /// The standard initial setup: pawns on rows 1/6, the back rank on rows
    /// 0/7 in file order rook-knight-bishop-queen-king-bishop-knight-rook.
    pub fn starting_position() -> Self {
        let mut board = Board::empty();
        let back_rank = [
            PieceKind::Rook,
            PieceKind::Knight,
            PieceKind::Bishop,
            PieceKind::Queen,
            PieceKind::King,
            PieceKind::Bishop,
            PieceKind::Knight,
            PieceKind::Rook,
        ];
        for col in 0..8u8 {
            board.set(
                1,
                col,
                Some(Piece::new(format!("b-pawn-{col}"), PieceKind::Pawn, Color::Black, 1, col)),
            );
            board.set(
                6,
                col,
                Some(Piece::new(format!("w-pawn-{col}"), PieceKind::Pawn, Color::White, 6, col)),
            );
            let kind = back_rank[col as usize];
            board.set(
                0,
                col,
                Some(Piece::new(format!("b-{kind:?}-{col}").to_lowercase(), kind, Color::Black, 0, col)),
            );
            board.set(
                7,
                col,
                Some(Piece::new(format!("w-{kind:?}-{col}").to_lowercase(), kind, Color::White, 7, col)),
            );
        }
        board
    }

    /// Returns `None` both for an empty cell and for out-of-bounds
    /// coordinates (invariant of C1).
    pub fn get(&self, row: i32, col: i32) -> Option<&Piece> {
        if !in_bounds(row, col) {
            return None;
        }
        self.squares[index(row as u8, col as u8)].as_ref()
    }

    pub fn get_mut(&mut self, row: i32, col: i32) -> Option<&mut Piece> {
        if !in_bounds(row, col) {
            return None;
        }
        self.squares[index(row as u8, col as u8)].as_mut()
    }

    /// Places `piece` at `(row, col)`, overwriting any stored row/col on the
    /// piece itself so the board-integrity invariant holds by construction.
    pub fn set(&mut self, row: u8, col: u8, piece: Option<Piece>) {
        let piece = piece.map(|mut p| {
            p.row = row;
            p.col = col;
            p
        });
        self.squares[index(row, col)] = piece;
    }

    pub fn is_empty(&self, row: i32, col: i32) -> bool {
        self.get(row, col).is_none()
    }

    pub fn find_by_id(&self, id: &str) -> Option<&Piece> {
        self.squares.iter().flatten().find(|p| p.id == id)
    }

    pub fn find_by_color(&self, color: Color) -> Vec<&Piece> {
        self.squares.iter().flatten().filter(|p| p.color == color).collect()
    }

    pub fn find_king(&self, color: Color) -> Option<&Piece> {
        self.squares
            .iter()
            .flatten()
            .find(|p| p.color == color && p.kind == PieceKind::King)
    }

    /// Moves the piece at `(from_r, from_c)` to `(to_r, to_c)`. Fails if the
    /// source is empty. Any previous occupant of the destination is
    /// overwritten (a capture). The moved piece's `has_moved` flag is set.
    pub fn move_piece(&mut self, from_r: u8, from_c: u8, to_r: u8, to_c: u8) -> Result<(), BoardError> {
        let mut piece = self.squares[index(from_r, from_c)]
            .take()
            .ok_or(BoardError::EmptySource { row: from_r, col: from_c })?;
        piece.has_moved = true;
        piece.row = to_r;
        piece.col = to_c;
        self.squares[index(to_r, to_c)] = Some(piece);
        Ok(())
    }

    /// Clears a prince's shield in place via the board API rather than
    /// relying on aliased references into a cloned piece.
    pub fn consume_prince_shield(&mut self, row: u8, col: u8) {
        if let Some(piece) = self.squares[index(row, col)].as_mut() {
            piece.prince_ability_remaining = Some(false);
        }
    }

    /// Deep, independent copy (no shared references to pieces across boards).
    pub fn deep_clone(&self) -> Board {
        self.clone()
    }

    /// Validates the board-integrity invariant: every stored piece's row/col
    /// matches its cell and identifiers are unique. A violation indicates a
    /// programmer bug, not a user-facing validation failure.
    pub fn check_integrity(&self) -> Result<(), crate::errors::InvariantError> {
        let mut seen = std::collections::HashSet::new();
        for row in 0..8u8 {
            for col in 0..8u8 {
                if let Some(piece) = &self.squares[index(row, col)] {
                    if piece.row != row || piece.col != col {
                        return Err(crate::errors::InvariantError::PieceCellMismatch {
                            id: piece.id.clone(),
                            stored_row: piece.row,
                            stored_col: piece.col,
                            cell_row: row,
                            cell_col: col,
                        });
                    }
                    if !seen.insert(piece.id.clone()) {
                        return Err(crate::errors::InvariantError::DuplicateId { id: piece.id.clone() });
                    }
                }
            }
        }
        Ok(())
    }
}

#[derive(Debug, Clone, thiserror::Error)]
pub enum BoardError {
    #[error("no piece at ({row}, {col})")]
    EmptySource { row: u8, col: u8 },
}
