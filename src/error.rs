//! The crate's error taxonomy (see `SPEC_FULL.md` §C).
//!
//! Malformed input is surfaced here. "No solution" and "cancelled" are not
//! errors -- they are ordinary values of `search::scheduler::SolveOutcome`.

use thiserror::Error;

/// Errors this crate can return.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum SolverError {
    /// The board text failed a §3 structural invariant: non-rectangular
    /// grid, unknown marker, a disconnected piece region, or a missing /
    /// duplicate target piece or exit region.
    #[error("malformed board: {reason}")]
    MalformedBoard { reason: String },

    /// A search-time invariant was violated: a popped digest absent from
    /// the node table, or a piece-id collision after applying a move. This
    /// indicates a bug in the solver itself, not bad input.
    #[error("internal invariant violation: {reason}")]
    InvariantViolation { reason: String },
}

impl SolverError {
    pub fn malformed<S: Into<String>>(reason: S) -> SolverError {
        SolverError::MalformedBoard { reason: reason.into() }
    }

    pub fn invariant<S: Into<String>>(reason: S) -> SolverError {
        SolverError::InvariantViolation { reason: reason.into() }
    }
}

/// The crate's fallible-result alias.
pub type Result<T> = std::result::Result<T, SolverError>;
