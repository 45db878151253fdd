// Board orientation and the mapping between server coordinates and what is drawn.
//
// Unlike regular chess, the server does not promise which side starts at the top of its grid
// (the default board puts white at row 0). Orientation is therefore derived from where the
// viewer's pieces actually are.

use strum::EnumIter;

use crate::coord::{BoardShape, Coord};
use crate::force::Force;
use crate::grid::Grid;


#[derive(Clone, Copy, PartialEq, Eq, Debug)]
pub enum BoardOrientation {
    Normal,  // Server row 0 at the top
    Flipped, // Server row 0 at the bottom
}

#[derive(Clone, Copy, PartialEq, Eq, Debug, EnumIter)]
pub enum DisplayPlayer {
    Top,
    Bottom,
}

// These coords describe board squares, like `Coord`, but row 0 is always the top-most row on
// screen.
#[derive(Clone, Copy, PartialEq, Eq, Debug)]
pub struct DisplayCoord {
    pub x: u8,
    pub y: u8,
}

impl BoardOrientation {
    pub fn is_flipped(self) -> bool { self == BoardOrientation::Flipped }
}

// Flips the board when the viewer's pieces are, on average, in the upper half of the server grid,
// so that they end up near the bottom of the screen. Total: no color or no own pieces on the
// board means no flip.
pub fn resolve_orientation(grid: &Grid, my_color: Option<Force>) -> BoardOrientation {
    let Some(force) = my_color else {
        return BoardOrientation::Normal;
    };
    let (count, row_sum) = grid
        .pieces()
        .filter(|(_, piece)| piece.force == force)
        .fold((0_u32, 0_u32), |(count, sum), (coord, _)| (count + 1, sum + coord.y as u32));
    if count == 0 {
        return BoardOrientation::Normal;
    }
    // Average row is `row_sum / count`, the middle is `(height - 1) / 2`. Compared in integers.
    let height = grid.shape().height as u32;
    if row_sum * 2 < count * (height - 1) {
        BoardOrientation::Flipped
    } else {
        BoardOrientation::Normal
    }
}

pub fn to_display_coord(
    coord: Coord, shape: BoardShape, orientation: BoardOrientation,
) -> DisplayCoord {
    match orientation {
        BoardOrientation::Normal => DisplayCoord { x: coord.x, y: coord.y },
        BoardOrientation::Flipped => DisplayCoord { x: coord.x, y: shape.height - 1 - coord.y },
    }
}

// Exact inverse of `to_display_coord`. Returns `None` for squares outside the board, e.g. a click
// that landed outside the drawn grid.
pub fn from_display_coord(
    display_coord: DisplayCoord, shape: BoardShape, orientation: BoardOrientation,
) -> Option<Coord> {
    let DisplayCoord { x, y } = display_coord;
    if x >= shape.width || y >= shape.height {
        return None;
    }
    Some(match orientation {
        BoardOrientation::Normal => Coord::new(x, y),
        BoardOrientation::Flipped => Coord::new(x, shape.height - 1 - y),
    })
}

// Where player names go. Own name is at the bottom; spectators see white at the bottom.
pub fn get_display_player(force: Force, viewer: Option<Force>) -> DisplayPlayer {
    let bottom = viewer.unwrap_or(Force::White);
    if force == bottom {
        DisplayPlayer::Bottom
    } else {
        DisplayPlayer::Top
    }
}

pub fn get_display_force(player: DisplayPlayer, viewer: Option<Force>) -> Force {
    let bottom = viewer.unwrap_or(Force::White);
    match player {
        DisplayPlayer::Bottom => bottom,
        DisplayPlayer::Top => bottom.opponent(),
    }
}
