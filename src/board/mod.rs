//! The board model (§4.1): cell markers, piece extraction, move legality,
//! and maximum-slide computation.
//!
//! A `Board` is split into an immutable `Layout` (dimensions, walls, exit
//! region -- none of which ever change over the lifetime of a search) and
//! the mutable occupancy that differs from one search node to the next.
//! Successor boards share the same `Arc<Layout>`, so expanding a node never
//! re-walks the wall/exit geometry.

pub mod parser;

use std::collections::BTreeMap;
use std::collections::BTreeSet;
use std::sync::Arc;

use crate::basetypes::{Direction, PieceId, Position};
use crate::error::{Result, SolverError};

/// The fixed id every board's target piece is stored under.
pub const TARGET_ID: PieceId = '*';

/// A single cell marker, as read from or written to the board's text
/// format (§E of `SPEC_FULL.md`).
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Marker {
    Wall,
    Empty,
    Exit,
    Piece(PieceId),
}

/// A connected group of cells that moves as a rigid unit.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Piece {
    pub id: PieceId,
    /// Occupied positions, row-major ordered (the `BTreeSet` iteration
    /// order matches §3's shape-normalization ordering).
    pub positions: BTreeSet<Position>,
}

impl Piece {
    pub fn size(&self) -> usize {
        self.positions.len()
    }

    pub fn min_row(&self) -> i32 {
        self.positions.iter().map(|p| p.row).min().unwrap_or(0)
    }

    pub fn max_row(&self) -> i32 {
        self.positions.iter().map(|p| p.row).max().unwrap_or(0)
    }

    pub fn min_col(&self) -> i32 {
        self.positions.iter().map(|p| p.col).min().unwrap_or(0)
    }

    pub fn max_col(&self) -> i32 {
        self.positions.iter().map(|p| p.col).max().unwrap_or(0)
    }

    /// The center of the piece's bounding box, used by the heuristic's
    /// Manhattan-distance term.
    pub fn center(&self) -> (f64, f64) {
        let row = (self.min_row() + self.max_row()) as f64 / 2.0;
        let col = (self.min_col() + self.max_col()) as f64 / 2.0;
        (row, col)
    }

    /// This piece's shape: its positions translated so that the bounding
    /// box starts at `(0, 0)`. Row-major ordered.
    pub fn shape(&self) -> Vec<Position> {
        let (min_row, min_col) = (self.min_row(), self.min_col());
        self.positions
            .iter()
            .map(|p| Position::new(p.row - min_row, p.col - min_col))
            .collect()
    }
}

/// The part of a board that never changes across a search: dimensions,
/// walls, and the exit region.
#[derive(Debug, PartialEq, Eq)]
pub struct Layout {
    pub height: i32,
    pub width: i32,
    pub walls: BTreeSet<Position>,
    pub exit: BTreeSet<Position>,
}

impl Layout {
    #[inline]
    pub fn in_bounds(&self, pos: Position) -> bool {
        pos.row >= 0 && pos.row < self.height && pos.col >= 0 && pos.col < self.width
    }

    #[inline]
    pub fn is_wall(&self, pos: Position) -> bool {
        self.walls.contains(&pos)
    }

    #[inline]
    pub fn is_exit(&self, pos: Position) -> bool {
        self.exit.contains(&pos)
    }
}

/// A rectangular grid of cells, §3.
#[derive(Debug, Clone)]
pub struct Board {
    layout: Arc<Layout>,
    /// `None` = empty cell, `Some(id)` = the cell is occupied by piece `id`.
    /// Row-major, length `height * width`.
    occupancy: Vec<Option<PieceId>>,
    pieces: BTreeMap<PieceId, Piece>,
}

impl Board {
    /// Builds a board from a layout and an explicit occupancy grid,
    /// deriving the piece table by connected-component analysis (§4.1).
    /// This is the sole entry point that establishes §3's invariants; every
    /// other constructor (the parser, `apply`) goes through it or through
    /// `with_pieces` below.
    pub fn from_occupancy(layout: Layout, occupancy: Vec<Option<PieceId>>) -> Result<Board> {
        if occupancy.len() != (layout.height * layout.width) as usize {
            return Err(SolverError::malformed("occupancy size does not match board dimensions"));
        }
        let layout = Arc::new(layout);
        let pieces = extract_pieces(&layout, &occupancy)?;
        let board = Board { layout, occupancy, pieces };
        board.validate()?;
        Ok(board)
    }

    fn with_pieces(layout: Arc<Layout>, occupancy: Vec<Option<PieceId>>, pieces: BTreeMap<PieceId, Piece>) -> Board {
        Board { layout, occupancy, pieces }
    }

    fn validate(&self) -> Result<()> {
        let target_count = self.pieces.keys().filter(|&&id| id == TARGET_ID).count();
        if target_count != 1 {
            return Err(SolverError::malformed(format!(
                "expected exactly one target piece '{}', found {}",
                TARGET_ID, target_count
            )));
        }
        if self.layout.exit.is_empty() {
            return Err(SolverError::malformed("board has no exit region"));
        }
        if !is_single_region(&self.layout.exit) {
            return Err(SolverError::malformed("exit region is not a single connected region"));
        }
        Ok(())
    }

    pub fn height(&self) -> i32 {
        self.layout.height
    }

    pub fn width(&self) -> i32 {
        self.layout.width
    }

    pub fn layout(&self) -> &Layout {
        &self.layout
    }

    #[inline]
    fn index(&self, pos: Position) -> usize {
        (pos.row * self.layout.width + pos.col) as usize
    }

    /// The occupant of `pos`, or `None` if `pos` is empty. Panics (as a
    /// programmer error, not a runtime condition) if `pos` is out of bounds
    /// or a wall cell -- callers are expected to check `is_wall`/bounds
    /// first, the way the rest of this module does.
    pub fn occupant(&self, pos: Position) -> Option<PieceId> {
        debug_assert!(self.layout.in_bounds(pos));
        self.occupancy[self.index(pos)]
    }

    pub fn is_wall(&self, pos: Position) -> bool {
        self.layout.is_wall(pos)
    }

    pub fn is_exit(&self, pos: Position) -> bool {
        self.layout.is_exit(pos)
    }

    pub fn in_bounds(&self, pos: Position) -> bool {
        self.layout.in_bounds(pos)
    }

    pub fn pieces(&self) -> &BTreeMap<PieceId, Piece> {
        &self.pieces
    }

    pub fn piece(&self, id: PieceId) -> Option<&Piece> {
        self.pieces.get(&id)
    }

    /// The target piece. Present by construction (`validate` rejects any
    /// board without exactly one).
    pub fn target(&self) -> &Piece {
        self.pieces
            .get(&TARGET_ID)
            .expect("board invariant: exactly one target piece was validated at construction")
    }

    pub fn exit_positions(&self) -> &BTreeSet<Position> {
        &self.layout.exit
    }

    /// True iff the target piece's position set equals the exit region
    /// (§4.1).
    pub fn is_goal(&self) -> bool {
        &self.target().positions == self.exit_positions()
    }

    /// The largest `k >= 0` such that translating every cell of `piece_id`
    /// by `k` steps in `direction` lands on cells that are each either
    /// empty, part of the piece's own current footprint, or (only for the
    /// target piece) an exit cell, and stays in bounds (§4.1).
    pub fn max_slide(&self, piece_id: PieceId, direction: Direction) -> i32 {
        let piece = match self.pieces.get(&piece_id) {
            Some(p) => p,
            None => return 0,
        };
        let (drow, dcol) = direction.delta();
        let is_target = piece_id == TARGET_ID;
        let mut k = 0;
        loop {
            let next_k = k + 1;
            let mut all_ok = true;
            for pos in &piece.positions {
                let dest = pos.translate(drow * next_k, dcol * next_k);
                if !self.is_destination_cell_free(dest, piece, is_target) {
                    all_ok = false;
                    break;
                }
            }
            if !all_ok {
                return k;
            }
            k = next_k;
        }
    }

    fn is_destination_cell_free(&self, dest: Position, piece: &Piece, is_target: bool) -> bool {
        if !self.layout.in_bounds(dest) || self.layout.is_wall(dest) {
            return false;
        }
        match self.occupant(dest) {
            Some(id) if id == piece.id => true,
            Some(_) => false,
            None => !self.layout.is_exit(dest) || is_target,
        }
    }

    /// True iff sliding `piece_id` by `distance` cells in `direction` is
    /// legal, i.e. `distance` is between `1` and `max_slide` inclusive.
    pub fn is_legal_slide(&self, piece_id: PieceId, direction: Direction, distance: i32) -> bool {
        distance >= 1 && distance <= self.max_slide(piece_id, direction)
    }

    /// Produces the board obtained by sliding `piece_id` by `distance`
    /// cells in `direction`. The caller must have established legality
    /// (normally via `max_slide`); this method only `debug_assert`s it,
    /// matching this crate's policy of trusting internally-derived calls.
    pub fn apply(&self, piece_id: PieceId, direction: Direction, distance: i32) -> Result<Board> {
        debug_assert!(self.is_legal_slide(piece_id, direction, distance));
        let piece = self
            .pieces
            .get(&piece_id)
            .ok_or_else(|| SolverError::invariant(format!("apply: unknown piece '{}'", piece_id)))?;
        let (drow, dcol) = direction.delta();
        let (drow, dcol) = (drow * distance, dcol * distance);

        let mut occupancy = self.occupancy.clone();
        for pos in &piece.positions {
            occupancy[self.index(*pos)] = None;
        }
        let new_positions: BTreeSet<Position> =
            piece.positions.iter().map(|p| p.translate(drow, dcol)).collect();
        for pos in &new_positions {
            let idx = (pos.row * self.layout.width + pos.col) as usize;
            if occupancy[idx].is_some() {
                return Err(SolverError::invariant(format!(
                    "apply: piece '{}' collided with another piece at {}",
                    piece_id, pos
                )));
            }
            occupancy[idx] = Some(piece_id);
        }

        let mut pieces = self.pieces.clone();
        pieces.insert(piece_id, Piece { id: piece_id, positions: new_positions });

        Ok(Board::with_pieces(Arc::clone(&self.layout), occupancy, pieces))
    }
}

/// 4-connected flood fill over occupied cells, producing one `Piece` per
/// distinct id and rejecting boards where a single id spans two
/// disconnected regions (§3's "exactly one 4-connected region" invariant).
fn extract_pieces(layout: &Layout, occupancy: &[Option<PieceId>]) -> Result<BTreeMap<PieceId, Piece>> {
    let mut by_id: BTreeMap<PieceId, Vec<Position>> = BTreeMap::new();
    for row in 0..layout.height {
        for col in 0..layout.width {
            let pos = Position::new(row, col);
            let idx = (row * layout.width + col) as usize;
            if let Some(id) = occupancy[idx] {
                by_id.entry(id).or_default().push(pos);
            }
        }
    }

    let mut pieces = BTreeMap::new();
    for (id, positions) in by_id {
        let set: BTreeSet<Position> = positions.into_iter().collect();
        if !is_single_region(&set) {
            return Err(SolverError::malformed(format!(
                "piece '{}' is not a single connected region",
                id
            )));
        }
        pieces.insert(id, Piece { id, positions: set });
    }
    Ok(pieces)
}

/// True iff `positions` forms exactly one 4-connected region.
fn is_single_region(positions: &BTreeSet<Position>) -> bool {
    let mut it = positions.iter();
    let start = match it.next() {
        Some(&p) => p,
        None => return false,
    };
    let mut seen: BTreeSet<Position> = BTreeSet::new();
    let mut stack = vec![start];
    seen.insert(start);
    while let Some(pos) = stack.pop() {
        for (drow, dcol) in [(-1, 0), (1, 0), (0, -1), (0, 1)] {
            let neighbor = pos.translate(drow, dcol);
            if positions.contains(&neighbor) && seen.insert(neighbor) {
                stack.push(neighbor);
            }
        }
    }
    seen.len() == positions.len()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::board::parser::parse_board;

    #[test]
    fn already_solved_board_reports_goal() {
        // The text format has no notation for a piece sitting on an exit
        // cell (§E of `SPEC_FULL.md`), so an already-solved board has to be
        // built directly rather than parsed.
        let exit: BTreeSet<Position> = [Position::new(0, 0)].into_iter().collect();
        let layout = Layout { height: 1, width: 2, walls: BTreeSet::new(), exit };
        let board = Board::from_occupancy(layout, vec![Some(TARGET_ID), None]).unwrap();
        assert!(board.is_goal());
    }

    #[test]
    fn one_move_board_slides_onto_exit() {
        let board = parse_board("*.@\n...\n").unwrap();
        assert_eq!(board.max_slide(TARGET_ID, Direction::Right), 2);
        let moved = board.apply(TARGET_ID, Direction::Right, 2).unwrap();
        assert!(moved.is_goal());
    }

    #[test]
    fn non_target_piece_cannot_enter_exit() {
        let board = parse_board("A.@\n...\n*..\n").unwrap();
        assert_eq!(board.max_slide('A', Direction::Right), 1);
    }

    #[test]
    fn max_slide_is_blocked_by_walls() {
        let board = parse_board("*#\n..\n").unwrap();
        assert_eq!(board.max_slide(TARGET_ID, Direction::Right), 0);
    }

    #[test]
    fn applying_beyond_max_slide_is_illegal() {
        let board = parse_board("*.@\n...\n").unwrap();
        let k = board.max_slide(TARGET_ID, Direction::Right);
        assert!(board.is_legal_slide(TARGET_ID, Direction::Right, k));
        assert!(!board.is_legal_slide(TARGET_ID, Direction::Right, k + 1));
    }

    #[test]
    fn moves_are_reversible() {
        let board = parse_board("*.@\n...\n").unwrap();
        let k = board.max_slide(TARGET_ID, Direction::Right);
        let moved = board.apply(TARGET_ID, Direction::Right, k).unwrap();
        let back_k = moved.max_slide(TARGET_ID, Direction::Left);
        assert!(back_k >= k);
        let restored = moved.apply(TARGET_ID, Direction::Left, k).unwrap();
        assert_eq!(restored.target().positions, board.target().positions);
    }

    #[test]
    fn disconnected_piece_is_rejected() {
        let err = parse_board("A.A\n...\n*@.\n");
        assert!(err.is_err());
    }
}
