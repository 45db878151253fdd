use std::fmt;

use enum_map::Enum;
use serde::{Deserialize, Serialize};
use strum::EnumIter;

use crate::force::Force;


#[derive(Clone, Copy, PartialEq, Eq, Hash, Debug, Enum, EnumIter, Serialize, Deserialize)]
pub enum PieceKind {
    Pawn,
    Knight,
    Bishop,
    Rook,
    Queen,
    King,
}

// Wire form is a two-letter code: force letter followed by kind letter, e.g. "wP" or "bK".
#[derive(Clone, Copy, PartialEq, Eq, Hash, Debug)]
pub struct Piece {
    pub force: Force,
    pub kind: PieceKind,
}

impl PieceKind {
    pub fn to_full_algebraic(self) -> char {
        match self {
            PieceKind::Pawn => 'P',
            PieceKind::Knight => 'N',
            PieceKind::Bishop => 'B',
            PieceKind::Rook => 'R',
            PieceKind::Queen => 'Q',
            PieceKind::King => 'K',
        }
    }

    pub fn from_algebraic_char(notation: char) -> Option<Self> {
        match notation {
            'P' => Some(PieceKind::Pawn),
            'N' => Some(PieceKind::Knight),
            'B' => Some(PieceKind::Bishop),
            'R' => Some(PieceKind::Rook),
            'Q' => Some(PieceKind::Queen),
            'K' => Some(PieceKind::King),
            _ => None,
        }
    }

    pub fn slides_diagonally(self) -> bool { matches!(self, PieceKind::Bishop | PieceKind::Queen) }
    pub fn slides_orthogonally(self) -> bool { matches!(self, PieceKind::Rook | PieceKind::Queen) }
}

impl Piece {
    pub fn new(force: Force, kind: PieceKind) -> Self { Piece { force, kind } }

    pub fn from_code(code: &str) -> Option<Self> {
        let mut chars = code.chars();
        let force = Force::from_letter(chars.next()?)?;
        let kind = PieceKind::from_algebraic_char(chars.next()?)?;
        if chars.next().is_some() {
            return None;
        }
        Some(Piece { force, kind })
    }

    pub fn to_code(self) -> String {
        format!("{}{}", self.force.to_letter(), self.kind.to_full_algebraic())
    }
}

impl fmt::Display for Piece {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}{}", self.force.to_letter(), self.kind.to_full_algebraic())
    }
}

pub fn piece_to_pictogram(piece: Piece) -> char {
    use self::Force::*;
    use self::PieceKind::*;
    match (piece.force, piece.kind) {
        (White, Pawn) => '♙',
        (White, Knight) => '♘',
        (White, Bishop) => '♗',
        (White, Rook) => '♖',
        (White, Queen) => '♕',
        (White, King) => '♔',
        (Black, Pawn) => '♟',
        (Black, Knight) => '♞',
        (Black, Bishop) => '♝',
        (Black, Rook) => '♜',
        (Black, Queen) => '♛',
        (Black, King) => '♚',
    }
}
