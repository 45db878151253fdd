use std::fmt;

use enum_map::Enum;
use serde::{Deserialize, Serialize};
use strum::EnumIter;


#[derive(
    Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Debug, Enum, EnumIter, Serialize, Deserialize,
)]
#[serde(rename_all = "lowercase")]
pub enum Force {
    White,
    Black,
}

impl Force {
    pub fn opponent(self) -> Force {
        match self {
            Force::White => Force::Black,
            Force::Black => Force::White,
        }
    }

    // Server sends full names, older pages used single letters.
    pub fn from_wire(s: &str) -> Option<Force> {
        match s {
            "white" | "w" => Some(Force::White),
            "black" | "b" => Some(Force::Black),
            _ => None,
        }
    }

    // Looser than `from_wire`: also accepts what people put in URLs by hand.
    pub fn from_color_hint(s: &str) -> Option<Force> {
        match s.trim().to_lowercase().as_str() {
            "white" | "w" | "brancas" => Some(Force::White),
            "black" | "b" | "pretas" => Some(Force::Black),
            _ => None,
        }
    }

    pub fn to_wire(self) -> &'static str {
        match self {
            Force::White => "white",
            Force::Black => "black",
        }
    }

    pub fn to_letter(self) -> char {
        match self {
            Force::White => 'w',
            Force::Black => 'b',
        }
    }

    pub fn from_letter(ch: char) -> Option<Force> {
        match ch {
            'w' => Some(Force::White),
            'b' => Some(Force::Black),
            _ => None,
        }
    }
}

impl fmt::Display for Force {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result { f.write_str(self.to_wire()) }
}
