//! Shape normalization and the shape-group-based board digest (§4.2, first
//! half). The digest collapses boards that differ only by a permutation of
//! same-shape pieces onto a single 64-bit value -- the property that makes
//! the search tractable (§1).

use std::collections::BTreeMap;

use crate::basetypes::{Digest, Position};
use crate::board::{Board, Piece};

const FNV_OFFSET_BASIS: u64 = 0xcbf2_9ce4_8422_2325;
const FNV_PRIME: u64 = 0x0000_0100_0000_01b3;

const SHAPE_FRAME_TAG: u8 = 0xA5;
const BOARD_FRAME_TAG: u8 = 0x5A;
const GROUP_FRAME_TAG: u8 = 0xC3;

/// A small FNV-1a accumulator. Framing bytes (length prefixes and tag
/// bytes) are written around every variable-length sequence so that, for
/// example, one shape group of two pieces can never hash the same as two
/// groups of one piece each.
struct FnvAccumulator(u64);

impl FnvAccumulator {
    fn new() -> FnvAccumulator {
        FnvAccumulator(FNV_OFFSET_BASIS)
    }

    #[inline]
    fn write_u8(&mut self, byte: u8) {
        self.0 = (self.0 ^ byte as u64).wrapping_mul(FNV_PRIME);
    }

    fn write_bytes(&mut self, bytes: &[u8]) {
        for &b in bytes {
            self.write_u8(b);
        }
    }

    fn write_u32(&mut self, v: u32) {
        self.write_bytes(&v.to_le_bytes());
    }

    fn write_u64(&mut self, v: u64) {
        self.write_bytes(&v.to_le_bytes());
    }

    fn write_position(&mut self, p: Position) {
        self.write_u32(p.row as u32);
        self.write_u32(p.col as u32);
    }

    fn finish(&self) -> Digest {
        self.0
    }
}

/// The 64-bit digest of a piece's shape: its positions translated to the
/// origin, row-major ordered, framed, and folded.
pub fn shape_digest(shape: &[Position]) -> Digest {
    let mut acc = FnvAccumulator::new();
    acc.write_u8(SHAPE_FRAME_TAG);
    acc.write_u32(shape.len() as u32);
    for &p in shape {
        acc.write_position(p);
    }
    acc.finish()
}

/// The 64-bit board digest (§3): pieces are partitioned into shape groups,
/// each group's member position sets are sorted lexicographically, groups
/// are emitted in ascending shape-digest order, and everything is folded
/// into one accumulator.
///
/// Two boards that differ only by a permutation of same-shape pieces
/// share a digest; any board where at least one piece's position set
/// differs does not (modulo the residual collision risk inherent to any
/// 64-bit non-cryptographic hash).
pub fn board_digest(board: &Board) -> Digest {
    let mut groups: BTreeMap<Digest, Vec<&Piece>> = BTreeMap::new();
    for piece in board.pieces().values() {
        let digest = shape_digest(&piece.shape());
        groups.entry(digest).or_default().push(piece);
    }

    let mut acc = FnvAccumulator::new();
    acc.write_u8(BOARD_FRAME_TAG);
    acc.write_u32(groups.len() as u32);
    for (shape_digest, members) in groups {
        acc.write_u8(GROUP_FRAME_TAG);
        acc.write_u64(shape_digest);
        acc.write_u32(members.len() as u32);

        let mut position_lists: Vec<Vec<Position>> =
            members.iter().map(|p| p.positions.iter().cloned().collect()).collect();
        position_lists.sort();

        for positions in position_lists {
            acc.write_u32(positions.len() as u32);
            for p in positions {
                acc.write_position(p);
            }
        }
    }
    acc.finish()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::board::parser::parse_board;

    #[test]
    fn permuting_same_shape_pieces_preserves_digest() {
        let a = parse_board("A.B\n...\n*.@\n").unwrap();
        let b = parse_board("B.A\n...\n*.@\n").unwrap();
        assert_eq!(board_digest(&a), board_digest(&b));
    }

    #[test]
    fn translating_a_piece_changes_digest() {
        let a = parse_board("A.@\n...\n*..\n").unwrap();
        let b = parse_board(".A@\n...\n*..\n").unwrap();
        assert_ne!(board_digest(&a), board_digest(&b));
    }

    #[test]
    fn shape_digest_ignores_absolute_position() {
        let shape_a = vec![Position::new(0, 0), Position::new(0, 1)];
        let shape_b = vec![Position::new(0, 0), Position::new(0, 1)];
        assert_eq!(shape_digest(&shape_a), shape_digest(&shape_b));
    }

    #[test]
    fn shape_digest_distinguishes_different_shapes() {
        let horizontal = vec![Position::new(0, 0), Position::new(0, 1)];
        let vertical = vec![Position::new(0, 0), Position::new(1, 0)];
        assert_ne!(shape_digest(&horizontal), shape_digest(&vertical));
    }
}
