//! Implements `perft`, `divide`, and the benchmark.

use std::time::Instant;
use crate::depth::Depth;
use crate::movegen::MoveList;
use crate::position::{fens, Position};
use crate::search::{run_search, Limits};
use crate::tt::TranspositionTable;
use crate::uci;


/// Performs move path enumeration.
///
/// `perft` is a debugging function that walks the tree of strictly
/// legal moves and counts the leaf nodes at a certain depth. The
/// counts can be compared to predetermined values to isolate move
/// generation bugs. Draws by repetition, the fifty-move rule, and
/// higher terminal nodes (mate or stalemate) are ignored.
pub fn perft(position: &Position, depth: Depth) -> u64 {
    if depth == 0 {
        return 1;
    }
    let move_list = MoveList::new(position);
    if depth == 1 {
        return move_list.len() as u64;
    }
    let mut nodes = 0;
    for m in move_list.iter() {
        let mut next = *position;
        next.do_move(m);
        nodes += perft(&next, depth - 1);
    }
    nodes
}

/// Like `perft`, but prints the node count under each root move.
pub fn divide(position: &Position, depth: Depth) -> u64 {
    if depth == 0 {
        return 1;
    }
    let move_list = MoveList::new(position);
    let mut nodes = 0;
    for m in move_list.iter() {
        let mut next = *position;
        next.do_move(m);
        let count = if depth == 1 {
            1
        } else {
            perft(&next, depth - 1)
        };
        nodes += count;
        println!("{}: {}", uci::format_move(m), count);
    }
    nodes
}

/// Resolves the `startpos` and `kiwipete` FEN aliases.
pub fn resolve_fen_alias(fen: &str) -> &str {
    match fen {
        "" | "startpos" => fens::STARTPOS,
        "kiwipete" => fens::KIWIPETE,
        other => other,
    }
}

/// Runs the `perft` or `divide` CLI command.
pub fn perft_command(depth: Depth, fen: &str, divided: bool) -> Result<(), String> {
    let fen = resolve_fen_alias(fen);
    let position = Position::from_fen(fen).map_err(|e| format!("illegal FEN: {}", e))?;
    println!("{}", position);

    let t0 = Instant::now();
    let nodes = if divided {
        divide(&position, depth)
    } else {
        perft(&position, depth)
    };
    let elapsed_micros = t0.elapsed().as_micros().max(1) as u64;

    println!("nodes:      {}", nodes);
    println!("knodes/sec: {}", 1000 * nodes / elapsed_micros);
    println!("time taken: {} ms", elapsed_micros / 1000);
    Ok(())
}

/// Positions the benchmark searches.
const BENCH_FENS: [&str; 5] = [
    fens::STARTPOS,
    fens::KIWIPETE,
    "8/2p5/3p4/KP5r/1R3p1k/8/4P1P1/8 w - - 0 1",
    "rnbq1k1r/pp1Pbppp/2p5/8/2B5/8/PPP1NnPP/RNBQK2R w KQ - 0 8",
    "n1n5/PPPk4/8/8/8/8/4Kppp/5N1N b - - 0 1",
];

const BENCH_DEPTH: Depth = 6;

/// Searches a fixed set of positions to a fixed depth and reports the
/// summed node count and speed.
pub fn bench() {
    let tt = TranspositionTable::new(TranspositionTable::DEFAULT_SIZE);
    let mut total_nodes = 0;
    let t0 = Instant::now();

    for fen in BENCH_FENS {
        let position = Position::from_fen(fen).ok().unwrap();
        let limits = Limits {
            depth: BENCH_DEPTH,
            ..Limits::default()
        };
        let result = run_search(&position, &[position.key()], limits, &tt);
        println!("bestmove {}",
                 uci::format_move(result.pv.first().copied().unwrap_or_default()));
        total_nodes += result.nodes;
    }

    let elapsed_millis = t0.elapsed().as_millis().max(1) as u64;
    println!("===========================");
    println!("total time (ms) : {}", elapsed_millis);
    println!("nodes searched  : {}", total_nodes);
    println!("nodes/second    : {}", 1000 * total_nodes / elapsed_millis);
}
