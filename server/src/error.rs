use skyjo_protocol::{ErrorKind, GridError};
use thiserror::Error;

/// Rejected moves. None of these change engine state.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum TurnError {
    #[error("Not your turn")]
    NotYourTurn,
    #[error("No round is being played")]
    NotPlaying,
    #[error("You already hold a card this turn")]
    AlreadyHolding,
    #[error("Draw a card or take the discard first")]
    NothingHeld,
    #[error("A card taken from the discard pile must be placed")]
    MustPlaceDiscard,
    #[error("Invalid grid position {0}")]
    InvalidPosition(usize),
    #[error("Card at position {0} is already face up")]
    AlreadyRevealed(usize),
    #[error("No cards left to draw")]
    EmptyPile,
}

impl From<GridError> for TurnError {
    fn from(err: GridError) -> Self {
        match err {
            GridError::OutOfRange(p) | GridError::Cleared(p) => TurnError::InvalidPosition(p),
            GridError::AlreadyRevealed(p) => TurnError::AlreadyRevealed(p),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum PreconditionError {
    #[error("Room is full")]
    RoomFull,
    #[error("Wrong password")]
    WrongPassword,
    #[error("Color {0} is already taken")]
    ColorTaken(String),
    #[error("Need at least 2 players to start")]
    NotEnoughPlayers,
    #[error("Only the host can do that")]
    NotHost,
    #[error("You are already in a room")]
    AlreadyInRoom,
    #[error("Cannot join while a round is being played")]
    RoundInProgress,
    #[error("The game is over; start a new game")]
    GameOver,
    #[error("The game is not over yet")]
    GameNotOver,
}

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum NotFoundError {
    #[error("Room {0} not found")]
    Room(String),
    #[error("Player not found in this room")]
    Player,
    #[error("Not in a room")]
    NotInRoom,
}

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ActionError {
    #[error("{0}")]
    Validation(String),
    #[error(transparent)]
    Precondition(#[from] PreconditionError),
    #[error(transparent)]
    Turn(#[from] TurnError),
    #[error(transparent)]
    NotFound(#[from] NotFoundError),
    #[error("Internal server error")]
    Internal,
}

impl ActionError {
    pub fn validation(msg: impl Into<String>) -> Self {
        ActionError::Validation(msg.into())
    }

    pub fn kind(&self) -> ErrorKind {
        match self {
            ActionError::Validation(_) => ErrorKind::Validation,
            ActionError::Precondition(_) => ErrorKind::Precondition,
            ActionError::Turn(_) => ErrorKind::Turn,
            ActionError::NotFound(_) => ErrorKind::NotFound,
            ActionError::Internal => ErrorKind::Internal,
        }
    }
}

impl From<GridError> for ActionError {
    fn from(err: GridError) -> Self {
        ActionError::Turn(err.into())
    }
}
