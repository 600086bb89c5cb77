//! The board text format (§E of `SPEC_FULL.md`): one line per row, `#` for
//! walls, `.` for empty cells, `@` for the exit region, `*` for the target
//! piece, and any other non-whitespace ASCII graphic character as a
//! non-target piece id.

use std::collections::BTreeSet;
use std::fmt;

use log::warn;

use crate::basetypes::Position;
use crate::board::{Board, Layout, Marker, TARGET_ID};
use crate::error::{Result, SolverError};

fn marker_for(ch: char) -> Result<Marker> {
    match ch {
        '#' => Ok(Marker::Wall),
        '.' => Ok(Marker::Empty),
        '@' => Ok(Marker::Exit),
        '*' => Ok(Marker::Piece(TARGET_ID)),
        c if c.is_ascii_graphic() => Ok(Marker::Piece(c)),
        c => Err(SolverError::malformed(format!("unrecognized marker '{}'", c))),
    }
}

fn marker_char(marker: Marker) -> char {
    match marker {
        Marker::Wall => '#',
        Marker::Empty => '.',
        Marker::Exit => '@',
        Marker::Piece(id) => id,
    }
}

/// Parses a board in the text format described above. Short rows are padded
/// with empty cells out to the longest row's width (§E of `SPEC_FULL.md`);
/// parsing only fails on unknown markers, disconnected pieces, or a
/// missing/duplicate target piece or exit region (§7, "Malformed input").
pub fn parse_board(text: &str) -> Result<Board> {
    parse_board_inner(text).map_err(|err| {
        warn!("rejected malformed board: {}", err);
        err
    })
}

fn parse_board_inner(text: &str) -> Result<Board> {
    let rows: Vec<&str> = text
        .lines()
        .map(|line| line.trim_end_matches(['\r', '\n']))
        .filter(|line| !line.is_empty())
        .collect();
    if rows.is_empty() {
        return Err(SolverError::malformed("board text is empty"));
    }
    let width = rows.iter().map(|r| r.chars().count()).max().unwrap_or(0);
    if width == 0 {
        return Err(SolverError::malformed("board has zero width"));
    }
    let height = rows.len() as i32;

    let mut walls = BTreeSet::new();
    let mut exit = BTreeSet::new();
    let mut occupancy = vec![None; rows.len() * width];

    for (row_idx, row) in rows.iter().enumerate() {
        // Rows shorter than `width` are padded with empty cells; `chars()`
        // simply runs dry before `width` and `unwrap_or('.')` fills the
        // rest, so no row can ever end up wider or narrower than the grid.
        let mut chars = row.chars();
        for col_idx in 0..width {
            let ch = chars.next().unwrap_or('.');
            let pos = Position::new(row_idx as i32, col_idx as i32);
            match marker_for(ch)? {
                Marker::Wall => {
                    walls.insert(pos);
                }
                Marker::Empty => {}
                Marker::Exit => {
                    exit.insert(pos);
                }
                Marker::Piece(id) => {
                    occupancy[row_idx * width + col_idx] = Some(id);
                }
            }
        }
    }

    let layout = Layout { height, width: width as i32, walls, exit };
    Board::from_occupancy(layout, occupancy)
}

/// Renders `board` back to the text format `parse_board` reads, with the
/// target piece always printed as `*` for legibility. This is the only
/// "pretty-printing" this crate does; richer board diagrams and
/// step-by-step playback remain the out-of-scope interactive-shell concern
/// named in `spec.md` §1.
pub fn format_board(board: &Board) -> String {
    let height = board.height();
    let width = board.width();
    let mut out = String::with_capacity(((height + 1) * (width + 1)) as usize);
    for row in 0..height {
        for col in 0..width {
            let pos = Position::new(row, col);
            let marker = if board.is_wall(pos) {
                Marker::Wall
            } else if let Some(id) = board.occupant(pos) {
                Marker::Piece(id)
            } else if board.is_exit(pos) {
                Marker::Exit
            } else {
                Marker::Empty
            };
            out.push(marker_char(marker));
        }
        out.push('\n');
    }
    out
}

/// A `Display` wrapper so `format_board` can be used via `{}` without
/// allocating at the call site unnecessarily.
pub struct DisplayBoard<'a>(pub &'a Board);

impl<'a> fmt::Display for DisplayBoard<'a> {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        write!(f, "{}", format_board(self.0))
    }
}
