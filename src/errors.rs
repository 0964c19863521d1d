//! Error taxonomies (§7). Each recoverability class is its own enum so call
//! sites can match on the class they actually expect, rather than stringly
//! distinguishing "this kind of failure" after the fact.

use thiserror::Error;

/// Per-request failures produced while validating a move. Recoverable: the
/// originating request fails, state is unchanged.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Error)]
pub enum ValidationError {
    #[error("source does not hold a piece owned by the moving player")]
    InvalidPiece,
    #[error("piece is on cooldown")]
    PieceOnCooldown,
    #[error("insufficient energy")]
    InsufficientEnergy,
    #[error("illegal move for this piece kind")]
    IllegalMove,
}

/// Per-request failures about the existence or state of a named resource.
/// Recoverable: surfaced to the caller, no in-memory or persisted mutation.
#[derive(Debug, Clone, Error)]
pub enum ResourceError {
    #[error("game {0} not found")]
    GameNotFound(String),
    #[error("game {0} is not active")]
    GameNotActive(String),
    #[error("player {0} is not in game {1}")]
    PlayerNotInGame(String, String),
    #[error("room {0} not found")]
    RoomNotFound(String),
    #[error("room {0} is full")]
    RoomFull(String),
    #[error("joiner is the room host")]
    JoinerIsHost,
    #[error("user {0} already queued")]
    DuplicateQueueEntry(String),
    #[error("failed to generate unique room code")]
    RoomCodeExhausted,
}

/// Transient infrastructure failures. Recoverable but internal: logged and
/// retried, must never interrupt live play.
#[derive(Debug, Error)]
pub enum InfraError {
    #[error("persistence failure: {0}")]
    Persistence(String),
}

/// Programmer-invariant violations. Fatal for the affected game: abort with
/// full diagnostic capture rather than attempt recovery.
#[derive(Debug, Clone, Error)]
pub enum InvariantError {
    #[error("piece {id} stored at ({stored_row},{stored_col}) but occupies cell ({cell_row},{cell_col})")]
    PieceCellMismatch {
        id: String,
        stored_row: u8,
        stored_col: u8,
        cell_row: u8,
        cell_col: u8,
    },
    #[error("duplicate piece id {id} on board")]
    DuplicateId { id: String },
    #[error("negative remaining cooldown for piece {id} after sweep")]
    NegativeRemainingCooldown { id: String },
    #[error("energy {energy} exceeds maximum after materialisation")]
    EnergyAboveMax { energy: f64 },
}

/// Sum of the four taxonomies, for call sites that may fail in more than one
/// way and need to propagate whichever occurred.
#[derive(Debug, Error)]
pub enum CoreError {
    #[error(transparent)]
    Validation(#[from] ValidationError),
    #[error(transparent)]
    Resource(#[from] ResourceError),
    #[error(transparent)]
    Infra(#[from] InfraError),
    #[error(transparent)]
    Invariant(#[from] InvariantError),
}
