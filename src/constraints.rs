//! Piece-kind taxonomy and custom-board validation (Constraints component).

use crate::types::PieceKind;

/// The three replacement-compatible categories a piece kind belongs to.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PieceCategory {
    PawnLike,
    NonPawnNonKing,
    King,
}

pub fn category_of(kind: PieceKind) -> PieceCategory {
    match kind {
        PieceKind::Pawn | PieceKind::TwistedPawn | PieceKind::PawnGeneral => PieceCategory::PawnLike,
        PieceKind::King => PieceCategory::King,
        PieceKind::Knight
        | PieceKind::Bishop
        | PieceKind::Rook
        | PieceKind::Queen
        | PieceKind::Prince
        | PieceKind::FlyingCastle
        | PieceKind::IceBishop => PieceCategory::NonPawnNonKing,
    }
}

/// Two kinds may replace one another in a custom board setup only if they
/// share a category.
pub fn same_category(a: PieceKind, b: PieceKind) -> bool {
    category_of(a) == category_of(b)
}

#[derive(Debug, thiserror::Error)]
pub enum CustomBoardError {
    #[error("custom board must be 8x8, got {rows}x{cols}")]
    WrongDimensions { rows: usize, cols: usize },
    #[error("king at ({row}, {col}) is not on its home square")]
    KingNotOnHomeSquare { row: usize, col: usize },
}

/// Validates an 8x8 grid of optional piece kinds (color is irrelevant to the
/// structural checks): correct dimensions, and every king placed on row 0 or
/// 7 at column 4. Unrecognised kinds cannot occur once the grid is already
/// typed as `PieceKind`, so that rejection happens at deserialization time.
pub fn validate_custom_board(grid: &[Vec<Option<PieceKind>>]) -> Result<(), CustomBoardError> {
    if grid.len() != 8 || grid.iter().any(|row| row.len() != 8) {
        return Err(CustomBoardError::WrongDimensions {
            rows: grid.len(),
            cols: grid.first().map(|r| r.len()).unwrap_or(0),
        });
    }
    for (row, cells) in grid.iter().enumerate() {
        for (col, kind) in cells.iter().enumerate() {
            if *kind == Some(PieceKind::King) && !((row == 0 || row == 7) && col == 4) {
                return Err(CustomBoardError::KingNotOnHomeSquare { row, col });
            }
        }
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn pawn_like_kinds_share_a_category() {
        assert!(same_category(PieceKind::Pawn, PieceKind::TwistedPawn));
        assert!(same_category(PieceKind::Pawn, PieceKind::PawnGeneral));
        assert!(!same_category(PieceKind::Pawn, PieceKind::Knight));
    }

    #[test]
    fn king_is_its_own_category() {
        assert!(!same_category(PieceKind::King, PieceKind::Queen));
    }

    #[test]
    fn rejects_wrong_dimensions() {
        let grid = vec![vec![None; 8]; 7];
        assert!(matches!(
            validate_custom_board(&grid),
            Err(CustomBoardError::WrongDimensions { rows: 7, cols: 0 })
        ));
    }

    #[test]
    fn rejects_king_off_home_square() {
        let mut grid = vec![vec![None; 8]; 8];
        grid[3][3] = Some(PieceKind::King);
        assert!(matches!(
            validate_custom_board(&grid),
            Err(CustomBoardError::KingNotOnHomeSquare { row: 3, col: 3 })
        ));
    }

    #[test]
    fn accepts_king_on_either_home_row() {
        let mut grid = vec![vec![None; 8]; 8];
        grid[0][4] = Some(PieceKind::King);
        grid[7][4] = Some(PieceKind::King);
        assert!(validate_custom_board(&grid).is_ok());
    }
}
