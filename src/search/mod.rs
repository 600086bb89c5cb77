//! The search subsystem (§4.3-4.5): the open set, the node table, and the
//! scheduler that drives workers across both.

pub mod node;
pub mod queue;
pub mod scheduler;
pub mod table;

pub use node::{MoveDescriptor, SearchNode};
pub use queue::{PriorityQueue, QueueItem};
pub use scheduler::{CancellationToken, SolveOutcome, Solver};
pub use table::{InsertOutcome, NodeTable};
