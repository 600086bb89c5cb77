//! The shared search node table (§4.4): a map from board digest to the
//! best-known node, plus a representative board for that digest (needed to
//! generate successors -- any board sharing a digest is an equally valid
//! representative of it, since canonicalization only ever collapses
//! boards that are interchangeable for search purposes).
//!
//! Lookups take the shared (read) lock; `insert_or_improve` takes the
//! exclusive (write) lock, matching §5's reader/writer discipline.

use std::collections::HashMap;
use std::sync::RwLock;

use crate::basetypes::Digest;
use crate::board::Board;
use crate::search::node::SearchNode;

/// The outcome of an `insert_or_improve` call.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum InsertOutcome {
    Inserted,
    Improved,
    Ignored,
}

struct Entry {
    node: SearchNode,
    board: Board,
}

/// A map from board digest to the best-known search node, shared by all
/// workers for the lifetime of one search. Entries are never removed --
/// parent links (§9) point into this table rather than owning their
/// parents directly, so the table must outlive every node that names it.
pub struct NodeTable {
    entries: RwLock<HashMap<Digest, Entry>>,
}

impl NodeTable {
    pub fn new() -> NodeTable {
        NodeTable { entries: RwLock::new(HashMap::new()) }
    }

    /// Looks up the best-known node and its representative board for
    /// `digest`, under shared access.
    pub fn lookup(&self, digest: Digest) -> Option<(SearchNode, Board)> {
        self.entries.read().unwrap().get(&digest).map(|e| (e.node, e.board.clone()))
    }

    /// Inserts `node`/`board` if `node.digest` is absent; otherwise
    /// overwrites `g`, the parent link, and the incoming move iff
    /// `node.g` is strictly smaller than the stored `g`. `h` is never
    /// rewritten -- it is a pure function of the digest (§4.4, §9).
    pub fn insert_or_improve(&self, node: SearchNode, board: Board) -> InsertOutcome {
        let mut entries = self.entries.write().unwrap();
        match entries.get_mut(&node.digest) {
            None => {
                entries.insert(node.digest, Entry { node, board });
                InsertOutcome::Inserted
            }
            Some(existing) => {
                if node.g < existing.node.g {
                    existing.node.g = node.g;
                    existing.node.parent_digest = node.parent_digest;
                    existing.node.incoming_move = node.incoming_move;
                    existing.board = board;
                    InsertOutcome::Improved
                } else {
                    InsertOutcome::Ignored
                }
            }
        }
    }

    pub fn len(&self) -> usize {
        self.entries.read().unwrap().len()
    }
}

impl Default for NodeTable {
    fn default() -> NodeTable {
        NodeTable::new()
    }
}
