// Wire types of the JSON protocol. The server is not ours, so parsing is lenient: every field
// except the `type` tag is optional, and anything the client does not understand is dropped
// further down the line rather than failing the whole frame.

use enum_map::{EnumMap, enum_map};
use serde::{Deserialize, Deserializer, Serialize};

use crate::force::Force;


#[derive(Clone, Debug, PartialEq, Deserialize)]
#[serde(tag = "type")]
pub enum ServerEvent {
    Assigned {
        #[serde(default)]
        role: Option<String>,
    },
    #[serde(rename = "state")]
    State(StateSnapshot),
    MoveMsg {
        #[serde(default)]
        board: Option<BoardPayload>,
        #[serde(default)]
        turn: Option<String>,
    },
    ConsoleMsg {
        #[serde(default)]
        text: String,
    },
}

// The only phases the server reports. Countdown and game over are client-side notions.
#[derive(Clone, Copy, PartialEq, Eq, Debug, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ServerPhase {
    Lobby,
    Chess,
    Quiz,
    #[serde(other)]
    Unknown,
}

// Full or partial authoritative state. Also returned by the pull endpoint.
#[derive(Clone, Debug, Default, PartialEq, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct StateSnapshot {
    #[serde(default)]
    pub phase: Option<ServerPhase>,
    #[serde(default)]
    pub board: Option<BoardPayload>,
    #[serde(default)]
    pub players: Option<PlayersPayload>,
    #[serde(default)]
    pub turn: Option<String>,
    #[serde(default)]
    pub in_check_side: Option<String>,
    #[serde(default)]
    pub in_check_king: Option<CoordPayload>,
    #[serde(default)]
    pub quiz: Option<QuizPayload>,
    #[serde(default, deserialize_with = "deserialize_game_over")]
    pub game_over: Option<GameOverPayload>,
    #[serde(default)]
    pub timer: Option<TimerPayload>,
}

// `MoveMsg` boards may omit the dimensions, in which case the current ones are kept.
#[derive(Clone, Debug, PartialEq, Deserialize)]
pub struct BoardPayload {
    #[serde(default)]
    pub cells: Option<Vec<Option<String>>>,
    #[serde(default)]
    pub width: Option<u32>,
    #[serde(default)]
    pub height: Option<u32>,
}

#[derive(Clone, Copy, PartialEq, Eq, Debug, Deserialize)]
pub struct CoordPayload {
    pub x: u8,
    pub y: u8,
}

#[derive(Clone, Debug, Default, PartialEq, Deserialize)]
pub struct PlayerSlot {
    #[serde(default)]
    pub name: Option<String>,
}

// Older pull endpoints reported players as an object keyed by color.
#[derive(Clone, Debug, Default, PartialEq, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct NamedPlayers {
    #[serde(default)]
    pub white_name: Option<String>,
    #[serde(default)]
    pub black_name: Option<String>,
    #[serde(default)]
    pub p1: Option<String>,
    #[serde(default)]
    pub p2: Option<String>,
}

#[derive(Clone, Debug, PartialEq, Deserialize)]
#[serde(untagged)]
pub enum PlayersPayload {
    List(Vec<Option<PlayerSlot>>),
    Named(NamedPlayers),
}

#[derive(Clone, Debug, Default, PartialEq, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct QuizPayload {
    #[serde(default)]
    pub question: Option<String>,
    #[serde(default)]
    pub choices: Vec<String>,
    // Seconds allotted to the current question.
    #[serde(default)]
    pub timer: Option<f64>,
    #[serde(default)]
    pub current_side: Option<String>,
    #[serde(default)]
    pub correct_index: Option<usize>,
}

#[derive(Clone, Debug, Default, PartialEq, Deserialize)]
pub struct GameOverPayload {
    #[serde(default)]
    pub winner: Option<String>,
    #[serde(default)]
    pub reason: Option<String>,
    #[serde(flatten)]
    pub extra: serde_json::Map<String, serde_json::Value>,
}

// Per-turn clock anchor. `turn_started_at` is a server timestamp that is only ever compared for
// equality; its unit does not matter to the client.
#[derive(Clone, Debug, PartialEq, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TimerPayload {
    pub side: String,
    pub turn_started_at: f64,
    pub bank_seconds: f64,
    pub remaining_at_anchor: f64,
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum ClientEvent {
    Join {
        name: String,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        color: Option<Force>,
    },
    Move {
        from: [u8; 2],
        to: [u8; 2],
    },
    Resign,
    QuizAnswer {
        answer: String,
    },
}

impl PlayersPayload {
    // Player slot names by side: index 0 is white, index 1 is black. Blank names are treated as
    // empty slots.
    pub fn names(&self) -> EnumMap<Force, Option<String>> {
        let clean = |name: Option<&String>| {
            name.map(|n| n.trim()).filter(|n| !n.is_empty()).map(str::to_owned)
        };
        match self {
            PlayersPayload::List(slots) => {
                let slot_name = |idx: usize| {
                    clean(slots.get(idx).and_then(|s| s.as_ref()).and_then(|s| s.name.as_ref()))
                };
                enum_map! {
                    Force::White => slot_name(0),
                    Force::Black => slot_name(1),
                }
            }
            PlayersPayload::Named(named) => enum_map! {
                Force::White => clean(named.white_name.as_ref().or(named.p1.as_ref())),
                Force::Black => clean(named.black_name.as_ref().or(named.p2.as_ref())),
            },
        }
    }
}

#[derive(Deserialize)]
#[serde(untagged)]
enum GameOverField {
    Flag(bool),
    Details(GameOverPayload),
}

// `gameOver` comes either as a boolean flag or as a details object.
fn deserialize_game_over<'de, D>(deserializer: D) -> Result<Option<GameOverPayload>, D::Error>
where
    D: Deserializer<'de>,
{
    Ok(match Option::<GameOverField>::deserialize(deserializer)? {
        None | Some(GameOverField::Flag(false)) => None,
        Some(GameOverField::Flag(true)) => Some(GameOverPayload::default()),
        Some(GameOverField::Details(details)) => Some(details),
    })
}
