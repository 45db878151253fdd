use std::{fmt, ops};

use ndarray::{Array, Array2};

use crate::coord::{BoardShape, Coord, MAX_BOARD_SIDE};
use crate::force::Force;
use crate::piece::{Piece, PieceKind};


#[derive(Clone, PartialEq, Eq, Debug)]
pub enum GridItem<T> {
    Piece(T),
    Empty,
    OutOfBounds,
}

impl<T> GridItem<T> {
    pub fn is_free(&self) -> bool { matches!(self, GridItem::Empty) }
}

#[derive(Clone, PartialEq, Eq, Debug)]
pub enum BoardError {
    ShapeMismatch { width: u8, height: u8, num_cells: usize },
    BadPieceCode { index: usize, code: String },
    TooLarge { width: u8, height: u8 },
}

impl fmt::Display for BoardError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            BoardError::ShapeMismatch { width, height, num_cells } => {
                write!(f, "{width}x{height} board cannot hold {num_cells} cells")
            }
            BoardError::BadPieceCode { index, code } => {
                write!(f, "unknown piece code {code:?} in cell {index}")
            }
            BoardError::TooLarge { width, height } => {
                write!(f, "{width}x{height} board exceeds the {MAX_BOARD_SIDE} cell side limit")
            }
        }
    }
}

// Dimensions come with every full snapshot and may differ between games (variant boards),
// so the shape is a property of the grid rather than a constant.
#[derive(Clone, PartialEq, Eq, Hash)]
pub struct Grid {
    data: Array2<Option<Piece>>,
}

impl Grid {
    pub fn new(shape: BoardShape) -> Self {
        Grid {
            data: Array::from_elem((shape.height as usize, shape.width as usize), None),
        }
    }

    // Builds a grid from the wire representation: row-major, `None` for empty cells.
    pub fn from_cells(shape: BoardShape, cells: &[Option<String>]) -> Result<Self, BoardError> {
        if shape.width > MAX_BOARD_SIDE || shape.height > MAX_BOARD_SIDE {
            return Err(BoardError::TooLarge { width: shape.width, height: shape.height });
        }
        if cells.len() != shape.num_cells() {
            return Err(BoardError::ShapeMismatch {
                width: shape.width,
                height: shape.height,
                num_cells: cells.len(),
            });
        }
        let mut grid = Grid::new(shape);
        for (index, cell) in cells.iter().enumerate() {
            let Some(code) = cell else {
                continue;
            };
            // Some server revisions send "" instead of null for an empty square.
            if code.is_empty() {
                continue;
            }
            let piece = Piece::from_code(code)
                .ok_or_else(|| BoardError::BadPieceCode { index, code: code.clone() })?;
            grid[shape.coord_of(index)] = Some(piece);
        }
        Ok(grid)
    }

    pub fn to_cells(&self) -> Vec<Option<String>> {
        self.shape().coords().map(|coord| self[coord].map(Piece::to_code)).collect()
    }

    pub fn shape(&self) -> BoardShape {
        BoardShape {
            width: self.data.shape()[1] as u8,
            height: self.data.shape()[0] as u8,
        }
    }

    pub fn contains_coord(&self, coord: Coord) -> bool { self.shape().contains_coord(coord) }

    pub fn get(&self, pos: Coord) -> GridItem<Piece> {
        match self.data.get(coord_to_index(pos)) {
            None => GridItem::OutOfBounds,
            Some(None) => GridItem::Empty,
            Some(Some(piece)) => GridItem::Piece(*piece),
        }
    }

    pub fn piece_at(&self, pos: Coord) -> Option<Piece> {
        match self.get(pos) {
            GridItem::Piece(piece) => Some(piece),
            GridItem::Empty | GridItem::OutOfBounds => None,
        }
    }

    pub fn pieces(&self) -> impl Iterator<Item = (Coord, Piece)> + '_ {
        self.shape().coords().filter_map(|coord| self[coord].map(|piece| (coord, piece)))
    }

    pub fn find_king(&self, force: Force) -> Option<Coord> {
        self.pieces()
            .find(|(_, piece)| piece.force == force && piece.kind == PieceKind::King)
            .map(|(coord, _)| coord)
    }

    pub fn signature(&self, max_samples: usize) -> BoardSignature {
        let shape = self.shape();
        let samples = sample_indices(shape.num_cells(), max_samples)
            .map(|index| self[shape.coord_of(index)])
            .collect();
        BoardSignature { shape, samples }
    }
}

impl ops::Index<Coord> for Grid {
    type Output = Option<Piece>;
    #[track_caller]
    fn index(&self, pos: Coord) -> &Self::Output {
        let shape = self.shape();
        self.data
            .get(coord_to_index(pos))
            .unwrap_or_else(|| panic!("{}", out_of_bound_message(pos, shape)))
    }
}

impl ops::IndexMut<Coord> for Grid {
    #[track_caller]
    fn index_mut(&mut self, pos: Coord) -> &mut Self::Output {
        let shape = self.shape();
        self.data
            .get_mut(coord_to_index(pos))
            .unwrap_or_else(|| panic!("{}", out_of_bound_message(pos, shape)))
    }
}

impl fmt::Debug for Grid {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        let shape = self.shape();
        write!(f, "Grid {}x{} ", shape.width, shape.height)?;
        f.debug_map()
            .entries(self.pieces().map(|(coord, piece)| ((coord.x, coord.y), piece.to_code())))
            .finish()
    }
}

fn coord_to_index(pos: Coord) -> [usize; 2] { [pos.y as usize, pos.x as usize] }

fn out_of_bound_message(pos: Coord, shape: BoardShape) -> String {
    format!(
        "Coord ({}, {}) is out of bound for {}x{} board",
        pos.x, pos.y, shape.width, shape.height
    )
}


// Cheap "did anything change" detector for incoming boards. Only a bounded subset of cells is
// looked at, picked at evenly spaced row-major positions, so:
//   - equal signatures mean equal shape and equal sampled cells (samples are stored verbatim,
//     there are no hash collisions);
//   - different signatures always mean different boards;
//   - two boards that differ only in unsampled cells get the same signature. This is an accepted
//     false negative: the reconciler then keeps the local selection, and the next turn change
//     clears it anyway.
#[derive(Clone, PartialEq, Eq, Debug)]
pub struct BoardSignature {
    shape: BoardShape,
    samples: Vec<Option<Piece>>,
}

impl BoardSignature {
    pub fn shape(&self) -> BoardShape { self.shape }
    pub fn num_samples(&self) -> usize { self.samples.len() }
}

// Deterministic, strictly increasing, and always includes the first cell. When the board is
// small enough every cell is sampled.
pub fn sample_indices(num_cells: usize, max_samples: usize) -> impl Iterator<Item = usize> {
    let num_samples = num_cells.min(max_samples);
    (0..num_samples).map(move |i| i * num_cells / num_samples)
}
