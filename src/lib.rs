//! A parallel A* solver for Klotski-style sliding-block puzzles.
//!
//! The board model (`board`), canonicalization (`canonical`), and
//! heuristic (`heuristic`) are pure and single-threaded; `search` layers a
//! concurrent scheduler on top of them. See `config::SolverConfig` for the
//! tunables and `search::Solver` for the entry point.

pub mod basetypes;
pub mod board;
pub mod canonical;
pub mod config;
pub mod error;
pub mod heuristic;
pub mod search;

pub use basetypes::{Cost, Digest, Direction, NodeCount, PieceId, Position};
pub use board::{parser, Board};
pub use config::SolverConfig;
pub use error::{Result, SolverError};
pub use search::{CancellationToken, MoveDescriptor, SolveOutcome, Solver};
