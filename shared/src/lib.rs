//! Wire protocol and value types shared by the game server and clients.
//!
//! Every message is a JSON object. Clients send [`Command`] envelopes, the
//! server answers each one with exactly one [`Response`] on the same
//! connection and pushes [`GameUpdate`]s to every connection watching a game.

pub mod card;

pub use card::{sort_hand, Card, CardParseError, Color, Modifier};

use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::fmt;
use std::str::FromStr;

pub const DECK_SIZE: usize = 108;
pub const HAND_SIZE: usize = 7;
pub const MIN_PLAYERS: usize = 2;
pub const MAX_PLAYERS: usize = 10;
pub const GAME_CODE_LEN: usize = 4;

/// Verb used for server pushes
pub const GAME_STATE_VERB: &str = "gameState";

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum GameState {
    Created,
    Playing,
    Complete,
    Abandoned,
}

impl GameState {
    pub fn is_terminal(self) -> bool {
        matches!(self, GameState::Complete | GameState::Abandoned)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum Direction {
    #[serde(rename = "clockwise")]
    Clockwise,
    #[serde(rename = "counter-clockwise")]
    CounterClockwise,
}

impl Direction {
    pub fn step(self) -> i64 {
        match self {
            Direction::Clockwise => 1,
            Direction::CounterClockwise => -1,
        }
    }

    pub fn reversed(self) -> Self {
        match self {
            Direction::Clockwise => Direction::CounterClockwise,
            Direction::CounterClockwise => Direction::Clockwise,
        }
    }
}

/// Commands a client may issue
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Verb {
    OpenSession,
    CreateGame,
    JoinGame,
    LeaveGame,
    StartGame,
    RestartGame,
    EndGame,
    PlayCard,
    DrawCard,
    DoneDrawing,
}

impl Verb {
    pub const ALL: [Verb; 10] = [
        Verb::OpenSession,
        Verb::CreateGame,
        Verb::JoinGame,
        Verb::LeaveGame,
        Verb::StartGame,
        Verb::RestartGame,
        Verb::EndGame,
        Verb::PlayCard,
        Verb::DrawCard,
        Verb::DoneDrawing,
    ];

    pub fn as_str(self) -> &'static str {
        match self {
            Verb::OpenSession => "openSession",
            Verb::CreateGame => "createGame",
            Verb::JoinGame => "joinGame",
            Verb::LeaveGame => "leaveGame",
            Verb::StartGame => "startGame",
            Verb::RestartGame => "restartGame",
            Verb::EndGame => "endGame",
            Verb::PlayCard => "playCard",
            Verb::DrawCard => "drawCard",
            Verb::DoneDrawing => "doneDrawing",
        }
    }
}

impl fmt::Display for Verb {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Verb {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Verb::ALL
            .into_iter()
            .find(|verb| verb.as_str() == s)
            .ok_or_else(|| s.to_string())
    }
}

/// Client to server envelope
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Command {
    #[serde(rename = "reqId", default)]
    pub req_id: String,
    #[serde(rename = "v")]
    pub verb: String,
    #[serde(rename = "d", default)]
    pub data: HashMap<String, String>,
}

impl Command {
    pub fn new(req_id: impl Into<String>, verb: Verb) -> Self {
        Self {
            req_id: req_id.into(),
            verb: verb.as_str().to_string(),
            data: HashMap::new(),
        }
    }

    pub fn with(mut self, key: &str, value: impl Into<String>) -> Self {
        self.data.insert(key.to_string(), value.into());
        self
    }

    pub fn field(&self, key: &str) -> Option<&str> {
        self.data.get(key).map(String::as_str)
    }
}

/// Payload of a [`Response`]
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum ResponseData {
    Game(GameStatus),
    Fields(HashMap<String, String>),
}

/// Server to client reply, routed to the connection that sent the command
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Response {
    #[serde(rename = "reqId")]
    pub req_id: String,
    #[serde(rename = "v")]
    pub verb: String,
    #[serde(rename = "d")]
    pub data: ResponseData,
    #[serde(rename = "err", default)]
    pub error: bool,
}

impl Response {
    pub fn fields(cmd: &Command, fields: HashMap<String, String>) -> Self {
        Self {
            req_id: cmd.req_id.clone(),
            verb: cmd.verb.clone(),
            data: ResponseData::Fields(fields),
            error: false,
        }
    }

    pub fn game(cmd: &Command, status: GameStatus) -> Self {
        Self {
            req_id: cmd.req_id.clone(),
            verb: cmd.verb.clone(),
            data: ResponseData::Game(status),
            error: false,
        }
    }

    pub fn error(req_id: &str, verb: &str, message: impl Into<String>) -> Self {
        let mut data = HashMap::new();
        data.insert("message".to_string(), message.into());
        Self {
            req_id: req_id.to_string(),
            verb: verb.to_string(),
            data: ResponseData::Fields(data),
            error: true,
        }
    }

    pub fn message(&self) -> Option<&str> {
        match &self.data {
            ResponseData::Fields(fields) => fields.get("message").map(String::as_str),
            ResponseData::Game(_) => None,
        }
    }

    pub fn status(&self) -> Option<&GameStatus> {
        match &self.data {
            ResponseData::Game(status) => Some(status),
            ResponseData::Fields(_) => None,
        }
    }
}

/// Unsolicited state push to every connection watching a game
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct GameUpdate {
    #[serde(rename = "v")]
    pub verb: String,
    #[serde(rename = "d")]
    pub status: GameStatus,
}

impl GameUpdate {
    pub fn new(status: GameStatus) -> Self {
        Self {
            verb: GAME_STATE_VERB.to_string(),
            status,
        }
    }
}

/// Anything the server may write to a connection
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum ServerMessage {
    Response(Response),
    Update(GameUpdate),
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct GameStatus {
    pub game_id: String,
    pub game_pneumonic: String,
    pub is_host: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub game: Option<PlayerView>,
    pub abandoned: bool,
}

impl GameStatus {
    pub fn active(game_id: &str, pneumonic: &str, is_host: bool, view: PlayerView) -> Self {
        Self {
            game_id: game_id.to_string(),
            game_pneumonic: pneumonic.to_string(),
            is_host,
            game: Some(view),
            abandoned: false,
        }
    }

    pub fn abandoned(game_id: &str, is_host: bool) -> Self {
        Self {
            game_id: game_id.to_string(),
            game_pneumonic: String::new(),
            is_host,
            game: None,
            abandoned: true,
        }
    }
}

/// A player's own seat, with the full hand
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct OwnHand {
    pub name: String,
    pub cards: Vec<Card>,
}

/// Any seat at the table, reduced to its hand size
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Seat {
    pub name: String,
    pub num_cards: usize,
}

/// What one player is allowed to see of a game
///
/// `other_players` lists every seat in turn order, the viewer included, so
/// `active_player` indexes straight into it.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PlayerView {
    pub state: GameState,
    pub active_player: usize,
    pub direction: Direction,
    pub you: OwnHand,
    pub other_players: Vec<Seat>,
    pub must_draw: u8,
    pub wild_color: Color,
    pub draw_pile_count: usize,
    pub discard_pile_top: Option<Card>,
    pub discard_pile_count: usize,
}
