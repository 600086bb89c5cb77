//! The parallel A* scheduler (§4.5): N worker threads share the open set,
//! a closed set, and the node table; the first worker to observe a goal
//! state wins and signals the others to stop.

use std::collections::HashSet;
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::mpsc::{sync_channel, RecvError};
use std::sync::{Arc, Mutex};
use std::thread;
use std::time::{Duration, Instant};

use log::{debug, error, info, warn};

use crate::basetypes::{Cost, Digest, Direction, NodeCount};
use crate::board::Board;
use crate::canonical;
use crate::config::SolverConfig;
use crate::error::{Result, SolverError};
use crate::heuristic;
use crate::search::node::{MoveDescriptor, SearchNode};
use crate::search::queue::{PriorityQueue, QueueItem};
use crate::search::table::{InsertOutcome, NodeTable};

/// An externally-controlled stop signal, independent of the solution-found
/// flag. Cloning shares the same underlying flag; `cancel()` from any
/// clone is visible to every worker (§5, "Cancellation & timeout").
#[derive(Debug, Clone)]
pub struct CancellationToken(Arc<AtomicBool>);

impl CancellationToken {
    pub fn new() -> CancellationToken {
        CancellationToken(Arc::new(AtomicBool::new(false)))
    }

    pub fn cancel(&self) {
        self.0.store(true, Ordering::SeqCst);
    }

    pub fn is_cancelled(&self) -> bool {
        self.0.load(Ordering::SeqCst)
    }
}

impl Default for CancellationToken {
    fn default() -> CancellationToken {
        CancellationToken::new()
    }
}

/// The digests already expanded. Check-and-insert is a single atomic
/// operation under one lock (§5: "must be atomic; cannot be split into
/// separate read and write phases").
struct ClosedSet {
    digests: Mutex<HashSet<Digest>>,
}

impl ClosedSet {
    fn new() -> ClosedSet {
        ClosedSet { digests: Mutex::new(HashSet::new()) }
    }

    /// Returns `true` iff this call performed the insertion, i.e. this
    /// worker won the right to expand `digest`.
    fn try_close(&self, digest: Digest) -> bool {
        self.digests.lock().unwrap().insert(digest)
    }

    fn contains(&self, digest: Digest) -> bool {
        self.digests.lock().unwrap().contains(&digest)
    }
}

#[derive(Default)]
struct Counters {
    nodes_explored: AtomicU64,
    nodes_generated: AtomicU64,
    max_open_size: AtomicU64,
}

impl Counters {
    fn sample_open_size(&self, size: u64) {
        let mut current = self.max_open_size.load(Ordering::Relaxed);
        while size > current {
            match self.max_open_size.compare_exchange_weak(
                current,
                size,
                Ordering::Relaxed,
                Ordering::Relaxed,
            ) {
                Ok(_) => break,
                Err(observed) => current = observed,
            }
        }
    }
}

struct Shared {
    queue: PriorityQueue,
    table: NodeTable,
    closed: ClosedSet,
    counters: Counters,
    solution_found: AtomicBool,
    fatal: Mutex<Option<SolverError>>,
    config: SolverConfig,
    start: Instant,
}

impl Shared {
    fn report_fatal(&self, err: SolverError) {
        error!("search aborted on invariant violation: {}", err);
        let mut slot = self.fatal.lock().unwrap();
        if slot.is_none() {
            *slot = Some(err);
        }
    }

    fn deadline_exceeded(&self) -> bool {
        match self.config.timeout_ms {
            Some(ms) => self.start.elapsed() >= Duration::from_millis(ms),
            None => false,
        }
    }
}

/// The result of a `Solver::solve` call (§6.3).
#[derive(Debug, Clone)]
pub struct SolveOutcome {
    pub found: bool,
    pub moves: Vec<MoveDescriptor>,
    pub nodes_explored: NodeCount,
    pub nodes_generated: NodeCount,
    pub max_open_set_size: NodeCount,
    pub elapsed: Duration,
    pub message: String,
}

/// Drives the parallel A* search described in §4.5 / §5.
///
/// Stateless between calls: every mutable piece of search state (queue,
/// closed set, node table, counters) is created fresh inside `solve`, so a
/// single `Solver` can run any number of independent searches, sequentially
/// or (via separate `Solver` values) concurrently.
pub struct Solver;

impl Solver {
    pub fn new() -> Solver {
        Solver
    }

    /// Runs the search to completion or exhaustion, with no external
    /// cancellation other than `config.timeout_ms`.
    pub fn solve(&self, board: Board, config: SolverConfig) -> Result<SolveOutcome> {
        self.solve_cancellable(board, config, CancellationToken::new())
    }

    /// Runs the search, additionally honoring `token`: if the caller flips
    /// it (from any thread, at any time), every worker stops at its next
    /// poll point and the result reports `message = "cancelled"`.
    pub fn solve_cancellable(
        &self,
        board: Board,
        config: SolverConfig,
        token: CancellationToken,
    ) -> Result<SolveOutcome> {
        let start = Instant::now();
        let worker_count = config.resolved_worker_count().max(1);

        let root_digest = canonical::board_digest(&board);
        let (root_h, _) = heuristic::evaluate(&board, &config);
        let root_node = SearchNode::root(root_digest, root_h);

        let shared = Arc::new(Shared {
            queue: PriorityQueue::new(),
            table: NodeTable::new(),
            closed: ClosedSet::new(),
            counters: Counters::default(),
            solution_found: AtomicBool::new(false),
            fatal: Mutex::new(None),
            config,
            start,
        });

        shared.table.insert_or_improve(root_node, board);
        shared.queue.add(QueueItem { priority: root_node.f(), digest: root_digest, incoming_move: None });

        info!(
            "search starting: {} worker(s), root digest {:#x}, root h {}",
            worker_count, root_digest, root_h
        );

        let (solution_tx, solution_rx) = sync_channel::<SearchNode>(1);
        let mut handles = Vec::with_capacity(worker_count);
        for worker_id in 0..worker_count {
            let shared = Arc::clone(&shared);
            let token = token.clone();
            let solution_tx = solution_tx.clone();
            handles.push(thread::spawn(move || worker_loop(worker_id, shared, token, solution_tx)));
        }
        // Drop our own sender so the channel disconnects once every worker
        // has dropped its clone, letting `recv()` signal exhaustion.
        drop(solution_tx);

        let goal = match solution_rx.recv() {
            Ok(node) => Some(node),
            Err(RecvError) => None,
        };

        // Captured before our own shutdown `cancel()` below, so a genuinely
        // exhausted search (nobody ever cancelled) is not misreported as
        // "cancelled" just because we ask stragglers to stop promptly.
        let was_cancelled = token.is_cancelled();
        token.cancel();
        shared.queue.close();
        for handle in handles {
            // A panicking worker would be a bug in this module, not a
            // recoverable search outcome; surface it rather than hide it.
            handle.join().expect("search worker thread panicked");
        }

        if let Some(err) = shared.fatal.lock().unwrap().clone() {
            return Err(err);
        }

        let elapsed = start.elapsed();
        let nodes_explored = shared.counters.nodes_explored.load(Ordering::Relaxed);
        let nodes_generated = shared.counters.nodes_generated.load(Ordering::Relaxed);
        let max_open_set_size = shared.counters.max_open_size.load(Ordering::Relaxed);

        match goal {
            Some(goal_node) => {
                let moves = reconstruct_path(&shared.table, goal_node.digest)?;
                info!(
                    "search solved in {:?}: {} move(s), {} nodes explored",
                    elapsed,
                    moves.len(),
                    nodes_explored
                );
                Ok(SolveOutcome {
                    found: true,
                    moves,
                    nodes_explored,
                    nodes_generated,
                    max_open_set_size,
                    elapsed,
                    message: "solved".to_string(),
                })
            }
            None => {
                let message = if was_cancelled { "cancelled" } else { "exhausted open set" };
                warn!("search ended without a solution: {}", message);
                Ok(SolveOutcome {
                    found: false,
                    moves: Vec::new(),
                    nodes_explored,
                    nodes_generated,
                    max_open_set_size,
                    elapsed,
                    message: message.to_string(),
                })
            }
        }
    }
}

impl Default for Solver {
    fn default() -> Solver {
        Solver::new()
    }
}

/// Reports `finish_task` to the queue exactly once, on whichever exit path
/// this worker takes for the item it just popped -- `continue`, an early
/// `return`, or simply falling through to the next loop iteration. This is
/// what lets the queue notice true open-set exhaustion (§4.5, §5): once the
/// last in-flight pop finishes with nothing left behind, nobody can ever
/// add more work, and the queue closes itself.
struct TaskGuard<'a> {
    shared: &'a Shared,
}

impl<'a> Drop for TaskGuard<'a> {
    fn drop(&mut self) {
        self.shared.queue.finish_task();
    }
}

fn worker_loop(
    worker_id: usize,
    shared: Arc<Shared>,
    token: CancellationToken,
    solution_tx: std::sync::mpsc::SyncSender<SearchNode>,
) {
    let mut pops_since_sample: u64 = 0;
    loop {
        if shared.solution_found.load(Ordering::SeqCst) || token.is_cancelled() {
            return;
        }
        if shared.deadline_exceeded() {
            token.cancel();
            return;
        }

        let item = match shared.queue.pop_min_blocking() {
            Some(item) => item,
            None => return,
        };
        let _task_guard = TaskGuard { shared: &*shared };

        pops_since_sample += 1;
        if pops_since_sample >= shared.config.max_open_size_sample_interval.max(1) {
            pops_since_sample = 0;
            shared.counters.sample_open_size(shared.queue.len() as u64);
        }

        let (node, board) = match shared.table.lookup(item.digest) {
            Some(found) => found,
            None => {
                shared.report_fatal(SolverError::invariant(format!(
                    "worker {}: digest {:#x} popped from queue but absent from node table",
                    worker_id, item.digest
                )));
                shared.queue.close();
                return;
            }
        };

        if !shared.closed.try_close(item.digest) {
            continue;
        }
        shared.counters.nodes_explored.fetch_add(1, Ordering::Relaxed);

        if board.is_goal() {
            if shared
                .solution_found
                .compare_exchange(false, true, Ordering::SeqCst, Ordering::SeqCst)
                .is_ok()
            {
                debug!("worker {}: found goal at digest {:#x}", worker_id, item.digest);
                // Capacity is 1 and only the CAS winner ever sends, so this
                // cannot block or fail.
                let _ = solution_tx.send(node);
            }
            return;
        }

        if let Err(err) = expand(&shared, &board, &node) {
            shared.report_fatal(err);
            shared.queue.close();
            return;
        }

        if shared.solution_found.load(Ordering::SeqCst) || token.is_cancelled() {
            return;
        }
    }
}

fn expand(shared: &Shared, board: &Board, node: &SearchNode) -> Result<()> {
    let piece_ids: Vec<_> = board.pieces().keys().copied().collect();
    for piece_id in piece_ids {
        for &direction in Direction::ALL.iter() {
            let distance = board.max_slide(piece_id, direction);
            if distance == 0 {
                continue;
            }
            let successor = board.apply(piece_id, direction, distance)?;
            let digest = canonical::board_digest(&successor);
            if shared.closed.contains(digest) {
                continue;
            }

            let (h, _) = heuristic::evaluate(&successor, &shared.config);
            let g: Cost = node.g + 1;
            let mv = MoveDescriptor::new(piece_id, direction, distance);
            let successor_node = SearchNode::successor(digest, g, h, node.digest, mv);

            let outcome = shared.table.insert_or_improve(successor_node, successor);
            if outcome == InsertOutcome::Inserted {
                shared.counters.nodes_generated.fetch_add(1, Ordering::Relaxed);
            }
            shared.queue.add(QueueItem { priority: successor_node.f(), digest, incoming_move: Some(mv) });
        }
    }
    Ok(())
}

/// Follows `parent_digest` links from the goal node to the root, reversing
/// the collected moves into root-to-goal order (§4.5, scheduler driver
/// step (a); §9's design note on table-indexed parent pointers).
fn reconstruct_path(table: &NodeTable, goal_digest: Digest) -> Result<Vec<MoveDescriptor>> {
    let mut moves = Vec::new();
    let mut current = goal_digest;
    loop {
        let (node, _board) = table.lookup(current).ok_or_else(|| {
            SolverError::invariant(format!("path reconstruction: digest {:#x} missing from node table", current))
        })?;
        match (node.parent_digest, node.incoming_move) {
            (Some(parent), Some(mv)) => {
                moves.push(mv);
                current = parent;
            }
            (None, None) => break,
            _ => {
                return Err(SolverError::invariant(format!(
                    "digest {:#x} has an inconsistent parent/incoming-move pair",
                    current
                )))
            }
        }
    }
    moves.reverse();
    Ok(moves)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::basetypes::Position;
    use crate::board::parser::parse_board;
    use crate::board::{Layout, TARGET_ID};
    use std::collections::BTreeSet;

    // The text format has no notation for a piece sitting on an exit cell
    // (§E of `SPEC_FULL.md`), so an already-solved board has to be built
    // directly rather than parsed.
    fn already_solved_board() -> Board {
        let exit: BTreeSet<Position> = [Position::new(0, 0)].into_iter().collect();
        let layout = Layout { height: 1, width: 2, walls: BTreeSet::new(), exit };
        Board::from_occupancy(layout, vec![Some(TARGET_ID), None]).unwrap()
    }

    #[test]
    fn already_solved_board_returns_empty_move_list() {
        let board = already_solved_board();
        let outcome = Solver::new().solve(board, SolverConfig::default()).unwrap();
        assert!(outcome.found);
        assert!(outcome.moves.is_empty());
    }

    #[test]
    fn one_move_board_returns_single_move_solution() {
        let board = parse_board("*.@\n...\n").unwrap();
        let outcome = Solver::new().solve(board, SolverConfig::default()).unwrap();
        assert!(outcome.found);
        assert_eq!(outcome.moves.len(), 1);
        assert_eq!(outcome.moves[0].piece_id, crate::board::TARGET_ID);
        assert_eq!(outcome.moves[0].direction, Direction::Right);
    }

    #[test]
    fn unsolvable_board_reports_exhaustion() {
        // The exit cell's only neighbors are walls, so it can never be
        // entered no matter how the target piece moves within the rest of
        // the (small, finite) free region.
        let board = parse_board("@#.\n##.\n..*\n").unwrap();
        let mut config = SolverConfig::default();
        config.worker_count = 2;
        let outcome = Solver::new().solve(board, config).unwrap();
        assert!(!outcome.found);
        assert_eq!(outcome.message, "exhausted open set");
    }

    #[test]
    fn single_worker_and_multi_worker_agree_on_move_count() {
        let text = "A.@\nA..\n*..\n";
        let board_1 = parse_board(text).unwrap();
        let board_8 = parse_board(text).unwrap();

        let mut cfg_1 = SolverConfig::default();
        cfg_1.worker_count = 1;
        let mut cfg_8 = SolverConfig::default();
        cfg_8.worker_count = 8;

        let outcome_1 = Solver::new().solve(board_1, cfg_1).unwrap();
        let outcome_8 = Solver::new().solve(board_8, cfg_8).unwrap();

        assert_eq!(outcome_1.found, outcome_8.found);
        assert_eq!(outcome_1.moves.len(), outcome_8.moves.len());
    }

    #[test]
    fn cancellation_stops_workers_promptly() {
        let board = parse_board("@#.\n##.\n..*\n").unwrap();
        let mut config = SolverConfig::default();
        config.worker_count = 4;
        let token = CancellationToken::new();
        token.cancel();
        let outcome = Solver::new().solve_cancellable(board, config, token).unwrap();
        assert!(!outcome.found);
        assert_eq!(outcome.message, "cancelled");
    }
}
