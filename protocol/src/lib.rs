use serde::{Deserialize, Serialize};
use std::fmt;
use uuid::Uuid;

pub mod cards;
pub mod grid;

pub use cards::{Card, Deck, DiscardPile, DECK_SIZE, MAX_CARD, MIN_CARD};
pub use grid::{Grid, GridError, Slot, GRID_COLUMNS, GRID_ROWS, GRID_SLOTS, INITIAL_REVEALS};

/// ---- Table limits ----
pub const MIN_PLAYERS: usize = 2;
pub const MAX_PLAYERS: usize = 8;
/// A game ends after the round in which someone reaches this total.
pub const GAME_END_SCORE: i32 = 100;
pub const ROOM_CODE_LEN: usize = 6;
pub const MAX_CHAT_LEN: usize = 200;
pub const MAX_NAME_LEN: usize = 24;

/// True for exactly six ASCII digits.
pub fn is_valid_room_code(code: &str) -> bool {
    code.len() == ROOM_CODE_LEN && code.bytes().all(|b| b.is_ascii_digit())
}

/// ---- Game lifecycle ----
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Default)]
#[serde(rename_all = "snake_case")]
pub enum Phase {
    /// Players gathering; no cards dealt yet.
    #[default]
    Waiting,
    Playing,
    /// Scores for the finished round are in; the host may deal again.
    RoundEnd,
    GameEnd,
}

impl fmt::Display for Phase {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Phase::Waiting => write!(f, "waiting"),
            Phase::Playing => write!(f, "playing"),
            Phase::RoundEnd => write!(f, "round end"),
            Phase::GameEnd => write!(f, "game end"),
        }
    }
}

/// Where the card held during a turn came from.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum CardSource {
    DrawPile,
    DiscardPile,
}

/// ---- Snapshot ----
///
/// One grid slot as other players may see it: face-down slots carry no value.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(tag = "state", rename_all = "snake_case")]
pub enum PublicSlot {
    Hidden,
    Revealed { value: Card },
    Cleared,
}

impl From<Option<&Slot>> for PublicSlot {
    fn from(slot: Option<&Slot>) -> Self {
        match slot {
            None => PublicSlot::Cleared,
            Some(s) if s.revealed => PublicSlot::Revealed { value: s.value },
            Some(_) => PublicSlot::Hidden,
        }
    }
}

pub fn public_grid(grid: &Grid) -> Vec<PublicSlot> {
    grid.slots().iter().map(|s| PublicSlot::from(s.as_ref())).collect()
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct PublicPlayer {
    pub id: Uuid,
    pub name: String,
    pub color: String,
    pub grid: Vec<PublicSlot>,
    /// Score of the last completed round.
    pub score: i32,
    pub total_score: i32,
    pub is_host: bool,
}

/// What the player to act is holding, if anything. The value of a card drawn
/// from the pile is only sent to the drawer.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
pub struct PublicHeld {
    pub source: CardSource,
    pub card: Option<Card>,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct PublicRoom {
    pub room: String,
    pub max_players: usize,
    pub has_password: bool,
    pub players: Vec<PublicPlayer>,
    pub current_player_id: Option<Uuid>,
    pub round_number: u32,
    pub phase: Phase,
    pub draw_pile_count: usize,
    pub discard_top: Option<Card>,
    pub held: Option<PublicHeld>,
    pub winner_id: Option<Uuid>,
}

/// ---- Errors on the wire ----
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum ErrorKind {
    Validation,
    Precondition,
    Turn,
    NotFound,
    Internal,
}

/// ---- Messages ----
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum ClientToServer {
    HostRoom {
        name: String,
        color: String,
        max_players: Option<usize>,
        password: Option<String>,
    },
    JoinRoom {
        room: String,
        name: String,
        color: String,
        password: Option<String>,
    },
    StartGame,
    DrawCard,
    TakeDiscard,
    PlaceCard { position: usize },
    DiscardAndReveal { position: usize },
    NewGame,
    GetState,
    Chat { message: String },
    LeaveRoom,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum ServerToClient {
    Hello {
        your_id: Uuid,
    },
    RoomCreated {
        room: String,
        player_id: Uuid,
        snapshot: PublicRoom,
    },
    Joined {
        room: String,
        player_id: Uuid,
        snapshot: PublicRoom,
    },
    UpdateState {
        snapshot: PublicRoom,
    },
    /// Private to the drawer.
    CardDrawn {
        card: Card,
    },
    RoundEnded {
        round_number: u32,
        scores: Vec<(Uuid, i32)>,
    },
    GameEnded {
        winner_id: Uuid,
        winner_name: String,
        total_scores: Vec<(Uuid, i32)>,
    },
    ChatMessage {
        player_id: Uuid,
        player_name: String,
        player_color: String,
        message: String,
        timestamp: String,
    },
    Info {
        message: String,
    },
    Error {
        kind: ErrorKind,
        message: String,
    },
    Left,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn room_codes_are_six_digits() {
        assert!(is_valid_room_code("012345"));
        assert!(!is_valid_room_code("12345"));
        assert!(!is_valid_room_code("1234567"));
        assert!(!is_valid_room_code("12a456"));
        assert!(!is_valid_room_code("１２３４５６"));
    }

    #[test]
    fn public_slot_hides_face_down_values() {
        let mut grid = Grid::from_cards([Card::new(5).unwrap(); GRID_SLOTS]);
        grid.reveal(2);
        let public = public_grid(&grid);
        assert_eq!(public[0], PublicSlot::Hidden);
        assert_eq!(public[2], PublicSlot::Revealed { value: Card::new(5).unwrap() });
        let json = serde_json::to_value(public[0]).unwrap();
        assert_eq!(json, serde_json::json!({"state": "hidden"}));
    }

    #[test]
    fn client_messages_use_tagged_json() {
        let msg: ClientToServer =
            serde_json::from_str(r#"{"type":"place_card","position":7}"#).unwrap();
        assert!(matches!(msg, ClientToServer::PlaceCard { position: 7 }));
        let msg: ClientToServer = serde_json::from_str(
            r#"{"type":"join_room","room":"123456","name":"Ann","color":"red"}"#,
        )
        .unwrap();
        assert!(matches!(msg, ClientToServer::JoinRoom { password: None, .. }));
    }

    #[test]
    fn snapshot_field_names_are_stable() {
        let snapshot = PublicRoom {
            room: "004217".into(),
            max_players: 4,
            has_password: false,
            players: vec![PublicPlayer {
                id: Uuid::nil(),
                name: "Ann".into(),
                color: "red".into(),
                grid: vec![PublicSlot::Cleared],
                score: -3,
                total_score: 41,
                is_host: true,
            }],
            current_player_id: None,
            round_number: 2,
            phase: Phase::RoundEnd,
            draw_pile_count: 99,
            discard_top: Card::new(-2),
            held: None,
            winner_id: None,
        };
        let json = serde_json::to_value(&snapshot).unwrap();
        assert_eq!(json["phase"], "round_end");
        assert_eq!(json["discard_top"], -2);
        assert_eq!(json["draw_pile_count"], 99);
        assert_eq!(json["players"][0]["total_score"], 41);
        assert_eq!(json["players"][0]["is_host"], true);
        assert_eq!(json["players"][0]["grid"][0]["state"], "cleared");
        assert!(json["current_player_id"].is_null());
    }
}
