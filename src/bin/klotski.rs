//! A thin CLI driver over `klotski_solver`: the only place in this crate
//! allowed to do I/O, set process exit codes, or format stdout (§G of
//! `SPEC_FULL.md`).

use std::fs;
use std::process::exit;

use clap::{Parser, Subcommand};
use log::info;

use klotski_solver::board::parser::parse_board;
use klotski_solver::{SolverConfig, Solver};

#[derive(Parser)]
#[command(name = "klotski", about = "A parallel A* solver for sliding-block puzzles")]
struct Cli {
    #[command(subcommand)]
    command: Command,

    /// Number of worker threads (0 = use all available cores).
    #[arg(long, global = true, default_value_t = 0)]
    workers: usize,

    /// Divisor applied to the heuristic's constraint penalty term.
    #[arg(long, global = true, default_value_t = 3)]
    divisor: u32,

    /// Abandon the search after this many milliseconds, reporting "cancelled".
    #[arg(long = "timeout-ms", global = true)]
    timeout_ms: Option<u64>,

    /// Log verbosity passed through to `env_logger`.
    #[arg(long = "log-level", global = true, default_value = "info")]
    log_level: String,
}

#[derive(Subcommand)]
enum Command {
    /// Solve the puzzle described by a board text file.
    Solve {
        /// Path to a board text file (§E of `SPEC_FULL.md`).
        path: String,
    },
}

fn main() {
    let cli = Cli::parse();
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or(&cli.log_level)).init();

    let code = match &cli.command {
        Command::Solve { path } => run_solve(path, &cli),
    };
    exit(code);
}

fn run_solve(path: &str, cli: &Cli) -> i32 {
    let text = match fs::read_to_string(path) {
        Ok(text) => text,
        Err(err) => {
            eprintln!("error: could not read '{}': {}", path, err);
            return 1;
        }
    };

    let board = match parse_board(&text) {
        Ok(board) => board,
        Err(err) => {
            eprintln!("error: {}", err);
            return 1;
        }
    };

    let mut config = SolverConfig { heuristic_divisor: cli.divisor, ..SolverConfig::default() };
    config.worker_count = cli.workers;
    config.timeout_ms = cli.timeout_ms;

    info!("solving '{}' with {} worker(s)", path, config.resolved_worker_count());
    let outcome = match Solver::new().solve(board, config) {
        Ok(outcome) => outcome,
        Err(err) => {
            eprintln!("error: {}", err);
            return 1;
        }
    };

    if outcome.found {
        println!("solved in {} move(s):", outcome.moves.len());
        for mv in &outcome.moves {
            println!("  {}", mv);
        }
    } else {
        println!("no solution: {}", outcome.message);
    }
    println!(
        "nodes_explored={} nodes_generated={} max_open_set_size={} elapsed={:?}",
        outcome.nodes_explored, outcome.nodes_generated, outcome.max_open_set_size, outcome.elapsed
    );

    if outcome.found {
        0
    } else {
        2
    }
}
