use std::fmt;

use itertools::Itertools;
use serde::{Deserialize, Serialize};


// Boards are small: the server hands out 5x6 by default and never more than this.
pub const MAX_BOARD_SIDE: u8 = 32;

// Board coordinates as the server sees them: `x` is the column, `y` is the row counting
// from the top of the server's grid (row-major cells, index `y * width + x`).
#[derive(Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct Coord {
    pub x: u8,
    pub y: u8,
}

#[derive(Clone, Copy, PartialEq, Eq, Hash, Debug, Serialize, Deserialize)]
pub struct BoardShape {
    pub width: u8,
    pub height: u8,
}

impl Coord {
    pub const fn new(x: u8, y: u8) -> Self { Coord { x, y } }

    // Returns `None` if the result leaves the board.
    pub fn offset(self, (dx, dy): (i8, i8), shape: BoardShape) -> Option<Coord> {
        let x = self.x as i16 + dx as i16;
        let y = self.y as i16 + dy as i16;
        if x < 0 || y < 0 || x >= shape.width as i16 || y >= shape.height as i16 {
            return None;
        }
        Some(Coord { x: x as u8, y: y as u8 })
    }

    pub fn to_pair(self) -> [u8; 2] { [self.x, self.y] }
    pub fn from_pair([x, y]: [u8; 2]) -> Self { Coord { x, y } }
}

impl fmt::Debug for Coord {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "Coord({}, {})", self.x, self.y)
    }
}

impl BoardShape {
    pub fn new(width: u8, height: u8) -> Self { BoardShape { width, height } }

    pub fn num_cells(self) -> usize { self.width as usize * self.height as usize }

    pub fn contains_coord(self, coord: Coord) -> bool {
        coord.x < self.width && coord.y < self.height
    }

    pub fn index_of(self, coord: Coord) -> usize {
        coord.y as usize * self.width as usize + coord.x as usize
    }

    pub fn coord_of(self, index: usize) -> Coord {
        let width = self.width as usize;
        Coord::new((index % width) as u8, (index / width) as u8)
    }

    // Row-major order, same as the wire `cells` array.
    pub fn coords(self) -> impl Iterator<Item = Coord> {
        (0..self.height)
            .cartesian_product(0..self.width)
            .map(|(y, x)| Coord::new(x, y))
    }
}
