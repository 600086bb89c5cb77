//! The search node and move descriptor (§3).

use std::fmt;

use crate::basetypes::{Cost, Digest, Direction, PieceId};

/// A single slide of one piece in one direction; counts as exactly one
/// move regardless of `distance` (§3, §6.2).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct MoveDescriptor {
    pub piece_id: PieceId,
    pub direction: Direction,
    pub distance: i32,
}

impl MoveDescriptor {
    pub fn new(piece_id: PieceId, direction: Direction, distance: i32) -> MoveDescriptor {
        MoveDescriptor { piece_id, direction, distance }
    }

    /// The textual form `"move <piece_id> <direction_word> <distance>"`
    /// (§6.3), used for logging and round-trip.
    pub fn to_text(&self) -> String {
        format!("move {} {} {}", self.piece_id, self.direction.as_word(), self.distance)
    }

    /// Parses the textual form produced by `to_text`.
    pub fn from_text(text: &str) -> Option<MoveDescriptor> {
        let mut parts = text.split_whitespace();
        if parts.next()? != "move" {
            return None;
        }
        let piece_id = parts.next()?.chars().next()?;
        let direction = Direction::from_word(parts.next()?)?;
        let distance: i32 = parts.next()?.parse().ok()?;
        if parts.next().is_some() {
            return None;
        }
        Some(MoveDescriptor::new(piece_id, direction, distance))
    }
}

impl fmt::Display for MoveDescriptor {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        write!(f, "{}", self.to_text())
    }
}

/// `(digest, g, h, f = g + h, parent_digest, incoming_move)` (§3).
///
/// `h` is a pure function of the digest alone and is never rewritten once
/// set. `g` and the parent link may be overwritten when a cheaper path to
/// the same digest is discovered (§4.4); see `search::table`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SearchNode {
    pub digest: Digest,
    pub g: Cost,
    pub h: Cost,
    pub parent_digest: Option<Digest>,
    pub incoming_move: Option<MoveDescriptor>,
}

impl SearchNode {
    pub fn root(digest: Digest, h: Cost) -> SearchNode {
        SearchNode { digest, g: 0, h, parent_digest: None, incoming_move: None }
    }

    pub fn successor(
        digest: Digest,
        g: Cost,
        h: Cost,
        parent_digest: Digest,
        incoming_move: MoveDescriptor,
    ) -> SearchNode {
        SearchNode { digest, g, h, parent_digest: Some(parent_digest), incoming_move: Some(incoming_move) }
    }

    #[inline]
    pub fn f(&self) -> Cost {
        self.g + self.h
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn move_descriptor_round_trips_through_text() {
        let mv = MoveDescriptor::new('A', Direction::Left, 3);
        assert_eq!(MoveDescriptor::from_text(&mv.to_text()), Some(mv));
    }

    #[test]
    fn malformed_text_does_not_parse() {
        assert_eq!(MoveDescriptor::from_text("move A sideways 3"), None);
        assert_eq!(MoveDescriptor::from_text("move A left"), None);
        assert_eq!(MoveDescriptor::from_text("shove A left 3"), None);
    }

    #[test]
    fn f_is_g_plus_h() {
        let node = SearchNode { digest: 1, g: 4, h: 5, parent_digest: None, incoming_move: None };
        assert_eq!(node.f(), 9);
    }
}
