//! Error types for the game server

use shared::{Card, GameState};
use thiserror::Error;

/// Rule violations raised by the game engine
///
/// Engine operations are pure, so any of these leaves the aggregate exactly
/// as it was before the attempted move.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum GameError {
    #[error("Can't play that card")]
    IllegalPlay { card: Card, top: Card },

    #[error("Player cannot play, they must draw")]
    MustDraw,

    #[error("Invalid card index")]
    InvalidCardIndex(usize),

    #[error("Game is not in progress")]
    NotPlaying,

    #[error("Game can't be started while {0:?}")]
    CannotStart(GameState),

    #[error("At least {need} players are needed, the game has {have}")]
    NotEnoughPlayers { have: usize, need: usize },

    #[error("Game is full")]
    TableFull,

    #[error("Game has already started")]
    AlreadyStarted,

    #[error("Player already exists")]
    PlayerExists,

    #[error("There are no players in the game")]
    NoPlayers,

    #[error("There are no cards left to draw")]
    DeckExhausted,

    #[error("Game has ended")]
    GameOver,
}

/// Failures of the aggregate store
#[derive(Debug, Error)]
pub enum StoreError {
    #[error("Version conflict on '{key}': expected {expected}, found {found}")]
    Conflict {
        key: String,
        expected: u64,
        found: u64,
    },

    #[error("Unable to decode stored record: {0}")]
    Codec(#[from] bincode::Error),
}

/// Everything a single command can fail with
///
/// The `Display` text is what the requesting connection sees in the
/// `message` field of its error response.
#[derive(Debug, Error)]
pub enum CommandError {
    #[error("Something went wrong loading your session")]
    NoSession,

    #[error("Unrecognized command")]
    UnknownVerb(String),

    #[error("Expected {0} to be supplied")]
    MissingField(&'static str),

    #[error("Invalid {field}: '{value}'")]
    InvalidField { field: &'static str, value: String },

    #[error("Game not found")]
    GameNotFound(String),

    #[error("You are not in a game")]
    NotInGame,

    #[error("Only the game host can {0} the game")]
    NotHost(&'static str),

    #[error("It's not your turn")]
    NotYourTurn,

    #[error("The game is busy, try again")]
    Contention,

    #[error(transparent)]
    Game(#[from] GameError),

    #[error(transparent)]
    Store(#[from] StoreError),

    #[error("Malformed command: {0}")]
    Malformed(#[from] serde_json::Error),
}
