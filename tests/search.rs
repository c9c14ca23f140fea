//! End-to-end scenarios against the search pool and the synchronous
//! searcher.

use std::thread;
use std::time::{Duration, Instant};
use lysander::movegen::MoveList;
use lysander::position::{fens, Position};
use lysander::search::{run_search, KeyHistory, Limits, SearchPool, TimeControl};
use lysander::tt::TranspositionTable;
use lysander::uci;
use lysander::value::is_mate;

fn fixed_depth(fen: &str, depth: u8) -> lysander::search::SearchResult {
    let tt = TranspositionTable::new(TranspositionTable::DEFAULT_SIZE);
    let position = Position::from_fen(fen).unwrap();
    let limits = Limits {
        depth,
        ..Limits::default()
    };
    run_search(&position, &[position.key()], limits, &tt)
}

#[test]
fn depth_one_picks_a_legal_opening_move() {
    let result = fixed_depth(fens::STARTPOS, 1);
    assert!(result.depth >= 1);
    let position = Position::from_fen(fens::STARTPOS).unwrap();
    let legal = MoveList::new(&position);
    assert_eq!(legal.len(), 20);
    assert!(legal.contains(result.pv[0]));
}

#[test]
fn lone_pawn_is_winning_but_not_mate() {
    let result = fixed_depth("4k3/8/8/8/8/8/4P3/4K3 w - - 0 1", 10);
    assert!(result.value > 0);
    assert!(!is_mate(result.value));
}

#[test]
fn threefold_shuffle_scores_a_draw() {
    let mut position = Position::from_fen(fens::STARTPOS).unwrap();
    let mut key_history: KeyHistory = vec![position.key()];
    for m in ["g1f3", "g8f6", "f3g1", "f6g8", "g1f3", "g8f6", "f3g1", "f6g8"] {
        let m = uci::parse_move(m);
        assert!(MoveList::new(&position).contains(m));
        position.do_move(m);
        key_history.push(position.key());
    }
    let tt = TranspositionTable::new(TranspositionTable::DEFAULT_SIZE);
    let result = run_search(&position,
                            &key_history,
                            Limits { depth: 8, ..Limits::default() },
                            &tt);
    assert!((-1..=1).contains(&result.value));
}

#[test]
fn pool_runs_a_fixed_depth_search() {
    let pool = SearchPool::new();
    let position = Position::from_fen(fens::STARTPOS).unwrap();
    pool.start_thinking(position,
                        vec![position.key()],
                        Limits { depth: 5, ..Limits::default() });
    pool.wait_until_idle();
}

#[test]
fn pool_with_helpers_stops_promptly_from_infinite() {
    let pool = SearchPool::new();
    pool.resize_helpers(2);
    let position = Position::from_fen(fens::KIWIPETE).unwrap();
    pool.start_thinking(position,
                        vec![position.key()],
                        Limits { infinite: true, ..Limits::default() });
    thread::sleep(Duration::from_millis(200));

    let t0 = Instant::now();
    pool.stop();
    pool.wait_until_idle();
    // Stop latency is bounded by the node-count cadence of the time
    // check; on any machine this is far below a second.
    assert!(t0.elapsed() < Duration::from_secs(2));
}

#[test]
fn pool_survives_consecutive_searches_and_resizes() {
    let pool = SearchPool::new();
    let position = Position::from_fen(fens::STARTPOS).unwrap();
    for helpers in [0, 1, 2, 0] {
        pool.resize_helpers(helpers);
        pool.start_thinking(position,
                            vec![position.key()],
                            Limits { depth: 4, ..Limits::default() });
        pool.wait_until_idle();
    }
    pool.resize_tt(16);
    pool.tt().clear();
}

#[test]
fn movetime_is_honored() {
    let pool = SearchPool::new();
    let position = Position::from_fen(fens::KIWIPETE).unwrap();
    let limits = Limits {
        tc: TimeControl {
            movetime: 150,
            ..TimeControl::default()
        },
        ..Limits::default()
    };
    let t0 = Instant::now();
    pool.start_thinking(position, vec![position.key()], limits);
    pool.wait_until_idle();
    assert!(t0.elapsed() < Duration::from_secs(5));
}

#[test]
fn single_reply_on_the_clock_answers_instantly() {
    // The king in the corner has exactly one legal move.
    let fen = "7k/5K2/8/6Q1/8/8/8/8 b - - 0 1";
    let position = Position::from_fen(fen).unwrap();
    assert_eq!(MoveList::new(&position).len(), 1);

    let pool = SearchPool::new();
    let limits = Limits {
        tc: TimeControl {
            btime: 60_000,
            wtime: 60_000,
            ..TimeControl::default()
        },
        ..Limits::default()
    };
    let t0 = Instant::now();
    pool.start_thinking(position, vec![position.key()], limits);
    pool.wait_until_idle();
    assert!(t0.elapsed() < Duration::from_secs(1));
}
