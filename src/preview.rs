// Advisory move preview. Generates plausible destinations for highlighting only: no checks,
// pins, castling, en passant or promotion. The server is free to reject any of these, and the
// client learns the outcome from the next snapshot.

use std::cmp::Ordering;
use std::collections::BTreeSet;

use crate::coord::{BoardShape, Coord};
use crate::force::Force;
use crate::grid::{Grid, GridItem};
use crate::piece::PieceKind;


const KNIGHT_LEAPS: [(i8, i8); 8] =
    [(1, 2), (2, 1), (2, -1), (1, -2), (-1, -2), (-2, -1), (-2, 1), (-1, 2)];
const DIAGONALS: [(i8, i8); 4] = [(1, 1), (1, -1), (-1, 1), (-1, -1)];
const ORTHOGONALS: [(i8, i8); 4] = [(1, 0), (-1, 0), (0, 1), (0, -1)];
const KING_STEPS: [(i8, i8); 8] =
    [(-1, -1), (0, -1), (1, -1), (-1, 0), (1, 0), (-1, 1), (0, 1), (1, 1)];

// Destinations for the piece at `origin`. Empty if there is no piece.
pub fn preview_moves(grid: &Grid, origin: Coord) -> BTreeSet<Coord> {
    let mut moves = BTreeSet::new();
    let GridItem::Piece(piece) = grid.get(origin) else {
        return moves;
    };
    let shape = grid.shape();
    let force = piece.force;
    let admissible = |to: Coord| match grid.get(to) {
        GridItem::Empty => true,
        GridItem::Piece(other) => other.force != force,
        GridItem::OutOfBounds => false,
    };
    match piece.kind {
        PieceKind::Pawn => {
            let dy = pawn_forward(grid, force);
            if let Some(to) = origin.offset((0, dy), shape) {
                if grid.get(to).is_free() {
                    moves.insert(to);
                }
            }
            for dx in [-1, 1] {
                if let Some(to) = origin.offset((dx, dy), shape) {
                    if matches!(grid.get(to), GridItem::Piece(other) if other.force != force) {
                        moves.insert(to);
                    }
                }
            }
        }
        PieceKind::Knight => {
            moves.extend(leaps(origin, &KNIGHT_LEAPS, shape).filter(|&to| admissible(to)));
        }
        PieceKind::King => {
            moves.extend(leaps(origin, &KING_STEPS, shape).filter(|&to| admissible(to)));
        }
        PieceKind::Bishop | PieceKind::Rook | PieceKind::Queen => {
            if piece.kind.slides_diagonally() {
                for dir in DIAGONALS {
                    slide(grid, origin, dir, force, &mut moves);
                }
            }
            if piece.kind.slides_orthogonally() {
                for dir in ORTHOGONALS {
                    slide(grid, origin, dir, force, &mut moves);
                }
            }
        }
    }
    moves
}

// Row delta of a pawn step for `force`. Boards come in different sizes and the server may put
// either side on top, so the direction is inferred from the position:
//   1. where most of the side's pawns are relative to the middle row (they move away from it);
//   2. otherwise, which half the side's king is in;
//   3. otherwise, classic orientation: white moves towards row 0.
pub fn pawn_forward(grid: &Grid, force: Force) -> i8 {
    let shape = grid.shape();
    let (mut above, mut below) = (0, 0);
    for (coord, piece) in grid.pieces() {
        if piece.force == force && piece.kind == PieceKind::Pawn {
            match half_of(coord, shape) {
                Ordering::Less => above += 1,
                Ordering::Greater => below += 1,
                Ordering::Equal => {}
            }
        }
    }
    match above.cmp(&below) {
        Ordering::Greater => return 1,
        Ordering::Less => return -1,
        Ordering::Equal => {}
    }
    if let Some(king) = grid.find_king(force) {
        match half_of(king, shape) {
            Ordering::Less => return 1,
            Ordering::Greater => return -1,
            Ordering::Equal => {}
        }
    }
    match force {
        Force::White => -1,
        Force::Black => 1,
    }
}

// Compares the row to the middle line: `Less` is the upper half (smaller `y`).
fn half_of(coord: Coord, shape: BoardShape) -> Ordering {
    // Doubled to stay in integers: the middle of rows 0..h is at (h - 1) / 2.
    (coord.y as i32 * 2).cmp(&(shape.height as i32 - 1))
}

fn leaps(
    origin: Coord, deltas: &'static [(i8, i8)], shape: BoardShape,
) -> impl Iterator<Item = Coord> {
    deltas.iter().filter_map(move |&delta| origin.offset(delta, shape))
}

fn slide(grid: &Grid, origin: Coord, dir: (i8, i8), force: Force, moves: &mut BTreeSet<Coord>) {
    let shape = grid.shape();
    let mut pos = origin;
    while let Some(next) = pos.offset(dir, shape) {
        match grid.get(next) {
            GridItem::Empty => {
                moves.insert(next);
            }
            GridItem::Piece(other) => {
                if other.force != force {
                    moves.insert(next);
                }
                break;
            }
            GridItem::OutOfBounds => break,
        }
        pos = next;
    }
}


#[cfg(test)]
mod tests {
    use super::*;
    use crate::piece::Piece;
    use crate::test_util::{default_board, grid_from_ascii};
    use pretty_assertions::assert_eq;

    fn coords(v: &[(u8, u8)]) -> BTreeSet<Coord> {
        v.iter().map(|&(x, y)| Coord::new(x, y)).collect()
    }

    fn lone_rook() -> Grid {
        grid_from_ascii(
            "
            . . .  . .
            . . .  . .
            . . wR . .
            . . .  . .
            . . .  . .
            ",
        )
    }

    #[test]
    fn rook_on_empty_board() {
        assert_eq!(
            preview_moves(&lone_rook(), Coord::new(2, 2)),
            coords(&[(2, 0), (2, 1), (2, 3), (2, 4), (0, 2), (1, 2), (3, 2), (4, 2)])
        );
    }

    #[test]
    fn rook_blocked_by_opponent_includes_capture() {
        let mut grid = lone_rook();
        grid[Coord::new(2, 3)] = Piece::from_code("bP");
        assert_eq!(
            preview_moves(&grid, Coord::new(2, 2)),
            coords(&[(2, 0), (2, 1), (2, 3), (0, 2), (1, 2), (3, 2), (4, 2)])
        );
    }

    #[test]
    fn rook_blocked_at_edge() {
        let mut grid = lone_rook();
        grid[Coord::new(2, 4)] = Piece::from_code("bP");
        let moves = preview_moves(&grid, Coord::new(2, 2));
        assert!(moves.contains(&Coord::new(2, 4)));
        assert_eq!(moves.len(), 8);

        grid[Coord::new(2, 4)] = Piece::from_code("wP");
        let moves = preview_moves(&grid, Coord::new(2, 2));
        assert!(!moves.contains(&Coord::new(2, 4)));
        assert!(moves.contains(&Coord::new(2, 3)));
        assert_eq!(moves.len(), 7);
    }

    #[test]
    fn bishop_and_queen() {
        let grid = grid_from_ascii(
            "
            bP . .  . .
            .  . .  . .
            .  . wB . wP
            .  . .  . .
            .  . .  . .
            ",
        );
        assert_eq!(
            preview_moves(&grid, Coord::new(2, 2)),
            coords(&[(1, 1), (0, 0), (3, 1), (4, 0), (1, 3), (0, 4), (3, 3), (4, 4)])
        );
        let mut grid = grid;
        grid[Coord::new(2, 2)] = Piece::from_code("wQ");
        let moves = preview_moves(&grid, Coord::new(2, 2));
        assert_eq!(moves.len(), 8 + 4 + 2 + 1);
        assert!(!moves.contains(&Coord::new(4, 2)));
        assert!(moves.contains(&Coord::new(3, 2)));
    }

    #[test]
    fn knight_and_king_skip_own_pieces() {
        let grid = grid_from_ascii(
            "
            .  . .  . .
            .  . .  . wP
            .  . wN . .
            .  . .  . bP
            .  . .  . .
            ",
        );
        let moves = preview_moves(&grid, Coord::new(2, 2));
        assert_eq!(moves.len(), 7);
        assert!(!moves.contains(&Coord::new(4, 1)));
        assert!(moves.contains(&Coord::new(4, 3)));

        let grid = grid_from_ascii(
            "
            wK bP
            wP .
            ",
        );
        assert_eq!(preview_moves(&grid, Coord::new(0, 0)), coords(&[(1, 0), (1, 1)]));
    }

    #[test]
    fn pawn_direction_from_pawn_majority() {
        let grid = default_board();
        // White starts at the top of the server grid, so white pawns move down.
        assert_eq!(pawn_forward(&grid, Force::White), 1);
        assert_eq!(pawn_forward(&grid, Force::Black), -1);
        assert_eq!(preview_moves(&grid, Coord::new(0, 1)), coords(&[(0, 2)]));
        assert_eq!(preview_moves(&grid, Coord::new(3, 4)), coords(&[(3, 3)]));
    }

    #[test]
    fn pawn_direction_falls_back_to_king_then_classic() {
        // One pawn on the middle row carries no evidence; the king does.
        let grid = grid_from_ascii(
            "
            .  . .  . .
            .  . .  . .
            .  . wP . .
            .  . .  . .
            .  . wK . .
            ",
        );
        assert_eq!(pawn_forward(&grid, Force::White), -1);
        let grid = grid_from_ascii(
            "
            .  . .  . .
            .  . bP . .
            .  . .  . .
            ",
        );
        assert_eq!(pawn_forward(&grid, Force::White), -1);
        assert_eq!(pawn_forward(&grid, Force::Black), 1);
    }

    #[test]
    fn pawn_captures_diagonally_only() {
        let grid = grid_from_ascii(
            "
            wK .  .  .  .
            .  bP bP wP .
            .  .  wP .  .
            .  .  .  .  .
            wP .  .  .  wP
            ",
        );
        // White pawns are mostly below the middle, so they move up.
        assert_eq!(pawn_forward(&grid, Force::White), -1);
        assert_eq!(preview_moves(&grid, Coord::new(2, 2)), coords(&[(1, 1)]));
    }

    #[test]
    fn empty_origin() {
        assert!(preview_moves(&lone_rook(), Coord::new(0, 0)).is_empty());
        assert!(preview_moves(&lone_rook(), Coord::new(9, 9)).is_empty());
    }
}
