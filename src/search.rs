//! Implements the search kernel and the search thread pool.

use std::cmp::max;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Mutex, RwLock};
use std::thread;
use std::time::{Duration, Instant};
use crate::board::*;
use crate::depth::{Depth, MAX_DEPTH};
use crate::evaluation::evaluate;
use crate::movegen::MoveList;
use crate::moveorder::{self, Heuristics};
use crate::moves::Move;
use crate::pawns;
use crate::position::Position;
use crate::tt::{absolute_mate_value, Bound, TranspositionTable, BOUND_EXACT, BOUND_LOWER,
                BOUND_UPPER};
use crate::uci;
use crate::value::{depth_to_mate, is_mate, mated_in, Value, DRAW, INFINITE, MATED};


/// How often (in nodes) the main thread looks at the clock while in
/// the quiescence search.
pub const CHECK_TIME_EVERY: u64 = if cfg!(debug_assertions) { 16384 } else { 65536 };

/// No late move reductions above this remaining depth.
const LMR_DEPTH_LIMIT: Depth = 3;

/// No late move reductions for the first few moves of a node.
const LMR_MOVE_NUMBER: usize = 3;

/// Half-width of the aspiration window, in centipawns.
const ASPIRATION_HALF_WIDTH: Value = 25;

/// Time reserved for protocol and scheduling latency.
const OVERHEAD_MS: u64 = 50;

/// History updates stop this far from the root.
const HISTORY_PLY_LIMIT: Depth = 8;


/// The clock part of the `go` parameters, in milliseconds.
#[derive(Clone, Copy, Default)]
pub struct TimeControl {
    pub wtime: u64,
    pub btime: u64,
    pub winc: u64,
    pub binc: u64,
    pub movetime: u64,
    pub movestogo: u32,
}

impl TimeControl {
    /// Returns `true` if any clock field is set.
    pub fn is_nonzero(&self) -> bool {
        self.wtime != 0 || self.winc != 0 || self.btime != 0 || self.binc != 0 ||
        self.movetime != 0
    }

    /// Returns the remaining time of the given side.
    pub fn time(&self, us: Color) -> u64 {
        if us == WHITE {
            self.wtime
        } else {
            self.btime
        }
    }

    /// Returns the increment of the given side.
    pub fn inc(&self, us: Color) -> u64 {
        if us == WHITE {
            self.winc
        } else {
            self.binc
        }
    }
}


/// Everything a `go` command may limit the search by.
#[derive(Clone, Default)]
pub struct Limits {
    pub tc: TimeControl,
    pub ponder: bool,
    pub infinite: bool,
    pub depth: Depth,
    pub mate: Depth,
    pub nodes: u64,
}


/// The Zobrist keys of every position played since the game start
/// (conservatively), used for threefold-repetition detection. Each
/// search thread works on its own copy and pushes/pops the keys of
/// the line it currently explores.
pub type KeyHistory = Vec<u64>;


/// A unit of work handed to a search thread.
#[derive(Clone)]
pub struct Job {
    pub position: Position,
    pub key_history: KeyHistory,
    pub limits: Limits,
}

impl Default for Job {
    fn default() -> Job {
        Job {
            position: Position::from_fen(crate::position::fens::STARTPOS).ok().unwrap(),
            key_history: Vec::new(),
            limits: Limits::default(),
        }
    }
}


/// The result of the deepest completed iteration of one thread.
#[derive(Clone, Default)]
pub struct SearchResult {
    pub depth: Depth,
    pub value: Value,
    pub pv: Vec<Move>,
    pub nodes: u64,
}


/// The part of a search thread that is shared with its owner: the
/// park/wake control block, the job slot, the committed result, and
/// the node counters.
pub struct SharedThread {
    pub id: usize,
    pub control: crate::threading::Control,
    pub job: Mutex<Job>,
    pub result: Mutex<SearchResult>,
    pub nodes: AtomicU64,
    pub qnodes: AtomicU64,
}

impl SharedThread {
    pub fn new(id: usize) -> SharedThread {
        SharedThread {
            id,
            control: crate::threading::Control::new(),
            job: Mutex::new(Job::default()),
            result: Mutex::new(SearchResult::default()),
            nodes: AtomicU64::new(0),
            qnodes: AtomicU64::new(0),
        }
    }
}


/// The in-thread state of one search.
///
/// The pawn cache persists across searches (it is owned by the worker
/// loop and lent here); the heuristics are reset at the start of each
/// `think`. Helper threads share nothing with each other except the
/// transposition table, so better moves found by one thread propagate
/// to the others through table hits alone.
pub struct Searcher<'a> {
    shared: &'a SharedThread,
    tt: &'a TranspositionTable,
    peers: &'a [Arc<SharedThread>],
    position: Position,
    key_history: KeyHistory,
    pub limits: Limits,
    pawn_cache: &'a mut pawns::Cache,
    heuristics: Heuristics,
    root_pv: Vec<Move>,
    root_value: Value,
    id_depth: Depth,
    sel_depth: Depth,
    t0: Instant,
    pub times_up: bool,
}

impl<'a> Searcher<'a> {
    pub fn new(shared: &'a SharedThread,
               tt: &'a TranspositionTable,
               peers: &'a [Arc<SharedThread>],
               job: Job,
               pawn_cache: &'a mut pawns::Cache)
               -> Searcher<'a> {
        Searcher {
            shared,
            tt,
            peers,
            position: job.position,
            key_history: job.key_history,
            limits: job.limits,
            pawn_cache,
            heuristics: Heuristics::new(),
            root_pv: Vec::new(),
            root_value: -INFINITE,
            id_depth: 0,
            sel_depth: 0,
            t0: Instant::now(),
            times_up: false,
        }
    }

    #[inline]
    fn is_main(&self) -> bool {
        self.shared.id == 0
    }

    #[inline]
    fn should_stop(&self) -> bool {
        self.shared.control.should_stop()
    }

    #[inline]
    fn total_nodes(&self) -> u64 {
        self.shared.nodes.load(Ordering::Relaxed) +
        self.shared.qnodes.load(Ordering::Relaxed)
    }

    fn clear(&mut self) {
        self.shared.nodes.store(0, Ordering::Relaxed);
        self.shared.qnodes.store(0, Ordering::Relaxed);
        *self.shared.result.lock().unwrap() = SearchResult::default();
        self.heuristics.clear();
        self.root_pv.clear();
        self.root_value = -INFINITE;
        self.id_depth = 0;
        self.sel_depth = 0;
        self.t0 = Instant::now();
        self.times_up = false;
    }

    /// The iterative deepening loop.
    ///
    /// Calls `search` with increasing depth until a limit is reached
    /// or the stop flag is raised. Results of an iteration are
    /// committed (and reported) only when the iteration ran to
    /// completion, so a cancelled iteration can never corrupt the
    /// reported line.
    pub fn think(&mut self) {
        self.clear();

        let root = self.position;
        let mut value = -INFINITE;
        let mut depth: Depth = 1;

        loop {
            if depth > MAX_DEPTH {
                break;
            }
            if self.limits.depth != 0 && depth > self.limits.depth && !self.limits.infinite {
                break;
            }
            self.sel_depth = 0;

            // Aspiration window around the previous iteration's
            // value; a fail outside the window falls back to an open
            // bound and the iteration is re-searched.
            let (mut alpha, mut beta) = if depth > 1 {
                (max(value.saturating_sub(ASPIRATION_HALF_WIDTH), -INFINITE),
                 value.saturating_add(ASPIRATION_HALF_WIDTH).min(INFINITE))
            } else {
                (-INFINITE, INFINITE)
            };

            let mut pv = Vec::new();
            while !self.should_stop() {
                pv.clear();
                value = self.search(&root, alpha, beta, depth, 0, &mut pv);
                if value <= alpha {
                    alpha = -INFINITE;
                } else if value >= beta {
                    beta = INFINITE;
                } else {
                    break;
                }
            }

            // A cancelled iteration does not touch the committed
            // line.
            if self.should_stop() {
                break;
            }

            self.id_depth = depth;
            self.root_pv = pv;
            self.root_value = value;
            *self.shared.result.lock().unwrap() = SearchResult {
                depth,
                value,
                pv: self.root_pv.clone(),
                nodes: self.total_nodes(),
            };
            uci::message(&format!("info depth {} seldepth {} thread {} score {} pv {}",
                                  depth,
                                  self.sel_depth,
                                  self.shared.id,
                                  uci::format_value(value),
                                  uci::format_variation(&self.root_pv)));

            if self.is_main() {
                self.post_statistics();
                self.check_time_slow();
            }

            // A mate within the requested distance satisfies a
            // `go mate` command.
            if self.limits.mate != 0 && is_mate(value) &&
               depth_to_mate(value) as u16 <= 2 * self.limits.mate as u16 {
                break;
            }
            if self.limits.nodes != 0 && self.total_nodes() >= self.limits.nodes {
                break;
            }

            depth += 1;
        }
    }

    /// The main search routine: fail-hard negamax with alpha-beta
    /// pruning, transposition cutoffs, and late move reductions.
    fn search(&mut self,
              position: &Position,
              mut alpha: Value,
              beta: Value,
              depth: Depth,
              plies_to_root: Depth,
              pv: &mut Vec<Move>)
              -> Value {
        let total_nodes = self.total_nodes();

        // A raised stop flag or an exhausted node budget unwinds the
        // search with a harmless static value. In check the position
        // is too dangerous to evaluate statically; call it a draw.
        if self.should_stop() ||
           (self.limits.nodes != 0 && total_nodes >= self.limits.nodes) {
            return if position.checkers() != 0 {
                DRAW
            } else {
                evaluate(position, self.pawn_cache.probe_or_assign(position))
            };
        }

        let key = position.key();

        // Draw by the fifty-move rule or threefold repetition. The
        // value is jittered into {-1, 0, +1} to avoid the threefold
        // blindness of a pure zero.
        if position.is_draw_by_rule50() ||
           self.key_history.iter().filter(|&&k| k == key).count() >= 3 {
            return (total_nodes % 3) as Value - 1;
        }

        self.sel_depth = max(self.sel_depth, plies_to_root);

        // The move tried first: at the root the best move of the
        // previous iteration, elsewhere the transposition-table move.
        let mut hash_move = Move::invalid();
        if plies_to_root == 0 {
            if let Some(&first) = self.root_pv.first() {
                hash_move = first;
            }
        } else if let Some(entry) = self.tt.probe(key) {
            // An entry from a deep enough search can cut this node
            // off entirely; a shallower one still improves the move
            // ordering.
            if entry.depth >= depth {
                let mut value = entry.value;
                if is_mate(value) {
                    value = absolute_mate_value(value, plies_to_root);
                }
                match entry.bound {
                    BOUND_EXACT => return value,
                    BOUND_UPPER if value <= alpha => return alpha,
                    BOUND_LOWER if value >= beta => return beta,
                    _ => (),
                }
            }
            hash_move = entry.m;
        }

        // Horizon reached: resolve captures before evaluating.
        if depth == 0 {
            return self.qsearch(position, alpha, beta, plies_to_root, pv);
        }

        let mut move_list = MoveList::new(position);
        if move_list.is_empty() {
            return if position.checkers() != 0 {
                mated_in(plies_to_root)
            } else {
                DRAW
            };
        }

        moveorder::evaluate_move_list(position, &mut move_list, depth, hash_move,
                                      &self.heuristics);

        let mut bound: Bound = BOUND_UPPER;
        let mut best_move = Move::invalid();
        let mut child_pv: Vec<Move> = Vec::new();

        for move_number in 0..move_list.len() {
            let m = move_list.select();

            let moved_piece = position.moved_piece(m);
            let is_capture = position.is_capture(m);
            let is_promotion = m.is_promotion();
            let is_quiet = !is_capture && !is_promotion;

            let mut next = *position;
            next.do_move(m);
            self.key_history.push(next.key());
            self.shared.nodes.fetch_add(1, Ordering::Relaxed);

            let gives_check = next.checkers() != 0;

            // Late move reductions: the later a quiet move comes in
            // the ordering, the shallower it is searched first.
            // <http://rebel13.nl/rebel13/blog/lmr%20advanced.html>
            let mut reduction: Depth = 1;
            let mut did_lmr = false;
            if depth >= LMR_DEPTH_LIMIT && move_number > LMR_MOVE_NUMBER && !gives_check &&
               is_quiet {
                reduction += 1;
                if plies_to_root > 0 {
                    if move_number > LMR_MOVE_NUMBER {
                        reduction += 1;
                    }
                    // Reduce further if the move has a bad history.
                    if self.heuristics.history.probe(moved_piece, m.to()) < 0 {
                        reduction += 1;
                    }
                }
                did_lmr = true;
                reduction = reduction.clamp(1, depth);
            }

            child_pv.clear();
            let mut value = -self.search(&next,
                                         -beta,
                                         -alpha,
                                         depth - reduction,
                                         plies_to_root + 1,
                                         &mut child_pv);

            // A reduced move that still improved alpha gets a
            // full-depth re-search.
            if did_lmr && value > alpha {
                child_pv.clear();
                value = -self.search(&next,
                                     -beta,
                                     -alpha,
                                     depth - 1,
                                     plies_to_root + 1,
                                     &mut child_pv);
            }

            self.key_history.pop();

            if value > alpha {
                alpha = value;
                best_move = m;
                bound = BOUND_EXACT;

                pv.clear();
                pv.push(best_move);
                pv.extend_from_slice(&child_pv);

                if plies_to_root <= HISTORY_PLY_LIMIT && is_quiet {
                    self.heuristics.history.update((depth as Value) * (depth as Value),
                                                   moved_piece,
                                                   m.to());
                }

                if alpha >= beta {
                    bound = BOUND_LOWER;
                    if is_quiet {
                        self.heuristics.killers.update(depth, m);
                    }
                    self.tt.save(key, depth, plies_to_root, beta, bound, best_move);
                    // Fail-hard beta cutoff.
                    return beta;
                }
            } else if plies_to_root <= HISTORY_PLY_LIMIT && is_quiet {
                self.heuristics.history.update(-(depth as Value), moved_piece, m.to());
            }
        }

        self.tt.save(key, depth, plies_to_root, alpha, bound, best_move);
        alpha
    }

    /// The quiescence search: only captures, promotions (and drops)
    /// are explored, unless the side to move is in check, in which
    /// case every evasion is.
    fn qsearch(&mut self,
               position: &Position,
               mut alpha: Value,
               beta: Value,
               plies_to_root: Depth,
               pv: &mut Vec<Move>)
               -> Value {
        let total_nodes = self.total_nodes();

        if self.is_main() && total_nodes % CHECK_TIME_EVERY == 0 {
            self.check_time_fast();
        }

        if self.should_stop() ||
           (self.limits.nodes != 0 && total_nodes >= self.limits.nodes) {
            return if position.checkers() != 0 {
                DRAW
            } else {
                evaluate(position, self.pawn_cache.probe_or_assign(position))
            };
        }

        if position.is_draw_by_rule50() ||
           self.key_history.iter().filter(|&&k| k == position.key()).count() >= 3 {
            return DRAW;
        }

        self.sel_depth = max(self.sel_depth, plies_to_root);

        let mut move_list = MoveList::new(position);
        if move_list.is_empty() {
            return if position.checkers() != 0 {
                mated_in(plies_to_root)
            } else {
                DRAW
            };
        }

        let in_check = position.checkers() != 0;

        // Stand pat: the static evaluation is a floor, because in a
        // quiet position the side to move can decline every capture.
        if !in_check {
            let stand_pat = evaluate(position, self.pawn_cache.probe_or_assign(position));
            if stand_pat >= beta {
                return beta;
            }
            alpha = max(alpha, stand_pat);
        }

        moveorder::evaluate_move_list_quiescence(position, &mut move_list);

        let mut child_pv: Vec<Move> = Vec::new();

        for _ in 0..move_list.len() {
            let m = move_list.select();

            if !in_check && !position.is_capture(m) && !m.is_promotion() && !m.is_drop() {
                continue;
            }

            let mut next = *position;
            next.do_move(m);
            self.key_history.push(next.key());
            self.shared.qnodes.fetch_add(1, Ordering::Relaxed);

            child_pv.clear();
            let value = -self.qsearch(&next, -beta, -alpha, plies_to_root + 1, &mut child_pv);

            self.key_history.pop();

            if value > alpha {
                alpha = value;
                pv.clear();
                pv.push(m);
                pv.extend_from_slice(&child_pv);

                if alpha >= beta {
                    // Fail-hard beta cutoff.
                    return beta;
                }
            }
        }

        alpha
    }

    // Time management (main thread only) //////////////////////////////////

    /// Raises the stop flag when the allotted time is about to run
    /// out. Called on a node-count cadence from the quiescence
    /// search.
    fn check_time_fast(&mut self) {
        let us = self.position.side_to_move();
        let elapsed = self.t0.elapsed().as_millis() as u64;

        let movetime = self.limits.tc.movetime;
        if movetime != 0 && elapsed >= movetime.saturating_sub(OVERHEAD_MS) {
            self.times_up = true;
            self.shared.control.stop_thinking();
        }

        // Never spend more than a fixed fraction of the remaining
        // clock on one move.
        let our_time = self.limits.tc.time(us);
        if our_time != 0 && elapsed > our_time.saturating_sub(OVERHEAD_MS) / 10 {
            self.times_up = true;
            self.shared.control.stop_thinking();
        }
    }

    /// Called at the end of each iteration.
    fn check_time_slow(&mut self) {
        self.check_time_fast();
    }

    /// Reports nodes, speed, and table usage after each iteration.
    fn post_statistics(&self) {
        let elapsed = self.t0.elapsed().as_millis() as u64;
        let mut total_nodes = self.total_nodes();
        for peer in self.peers {
            total_nodes += peer.nodes.load(Ordering::Relaxed) +
                           peer.qnodes.load(Ordering::Relaxed);
        }
        let nps = 1000 * total_nodes / (elapsed + 1);
        uci::message(&format!("info nodes {} time {} nps {} hashfull {} hitrate {}",
                              total_nodes,
                              elapsed,
                              nps,
                              self.tt.hashfull_approx(),
                              self.tt.hit_rate()));
    }
}


/// Runs a single-threaded search synchronously and returns the
/// result of the deepest completed iteration.
///
/// This is the engine the `bench` command and the tests drive; the
/// UCI server runs the same searcher on the pool's threads instead.
pub fn run_search(position: &Position,
                  key_history: &[u64],
                  limits: Limits,
                  tt: &TranspositionTable)
                  -> SearchResult {
    let shared = SharedThread::new(1);
    let mut pawn_cache = pawns::Cache::new();
    let job = Job {
        position: *position,
        key_history: key_history.to_vec(),
        limits,
    };
    let mut searcher = Searcher::new(&shared, tt, &[], job, &mut pawn_cache);
    searcher.think();
    let result = shared.result.lock().unwrap().clone();
    result
}


// Thread pool /////////////////////////////////////////////////////////////

/// A search worker: the shared block plus the join handle of its OS
/// thread.
pub struct Worker {
    pub shared: Arc<SharedThread>,
    handle: Option<thread::JoinHandle<()>>,
}

impl Drop for Worker {
    fn drop(&mut self) {
        self.shared.control.request_quit();
        if let Some(handle) = self.handle.take() {
            let _ = handle.join();
        }
    }
}


/// One main thread plus N helpers searching the same root ("lazy
/// SMP").
///
/// The helpers run the identical iterative deepening loop with their
/// own history and killers; coordination happens exclusively through
/// the shared transposition table and the per-thread stop flags. The
/// main thread is the only one that watches the clock; when it
/// decides the search is over it stops the helpers, waits for them to
/// park, and reports the line of whichever thread completed the
/// deepest iteration.
pub struct SearchPool {
    tt: Arc<TranspositionTable>,
    main: Worker,
    helpers: Arc<RwLock<Vec<Worker>>>,
}

impl SearchPool {
    pub fn new() -> SearchPool {
        let tt = Arc::new(TranspositionTable::new(TranspositionTable::DEFAULT_SIZE));
        let helpers: Arc<RwLock<Vec<Worker>>> = Arc::new(RwLock::new(Vec::new()));
        let main = spawn_main_worker(tt.clone(), helpers.clone());
        SearchPool { tt, main, helpers }
    }

    /// The shared transposition table.
    pub fn tt(&self) -> &TranspositionTable {
        &self.tt
    }

    /// Returns `true` if no search is running.
    pub fn is_idle(&self) -> bool {
        self.main.shared.control.is_idle()
    }

    /// Starts searching a position. Any running search is stopped
    /// first.
    pub fn start_thinking(&self, position: Position, key_history: KeyHistory, limits: Limits) {
        self.stop_and_wait();
        *self.main.shared.job.lock().unwrap() = Job {
            position,
            key_history,
            limits,
        };
        self.main.shared.control.start_thinking();
    }

    /// Raises the main thread's stop flag. The main thread stops its
    /// helpers on the way out.
    pub fn stop(&self) {
        self.main.shared.control.stop_thinking();
    }

    /// Blocks until every thread in the pool is parked.
    pub fn wait_until_idle(&self) {
        self.main.shared.control.wait_until_idle();
        for worker in self.helpers.read().unwrap().iter() {
            worker.shared.control.wait_until_idle();
        }
    }

    /// Stops the search and waits for the pool to go idle.
    pub fn stop_and_wait(&self) {
        self.stop();
        for worker in self.helpers.read().unwrap().iter() {
            worker.shared.control.stop_thinking();
        }
        self.wait_until_idle();
    }

    /// Adjusts the number of helper threads. The search must be
    /// stopped.
    pub fn resize_helpers(&self, n: usize) {
        self.stop_and_wait();
        let mut helpers = self.helpers.write().unwrap();
        while helpers.len() > n {
            helpers.pop();
        }
        while helpers.len() < n {
            let id = helpers.len() + 1;
            helpers.push(spawn_helper_worker(id, self.tt.clone()));
        }
        log::info!("search pool resized to 1+{} threads", helpers.len());
    }

    /// Reallocates the transposition table. The search must be
    /// stopped.
    pub fn resize_tt(&self, size_mb: usize) {
        self.stop_and_wait();
        self.tt.resize(size_mb * 1024 * 1024);
        log::info!("transposition table resized to {} MiB", size_mb);
    }
}

impl Default for SearchPool {
    fn default() -> SearchPool {
        SearchPool::new()
    }
}


fn spawn_helper_worker(id: usize, tt: Arc<TranspositionTable>) -> Worker {
    let shared = Arc::new(SharedThread::new(id));
    let thread_shared = shared.clone();
    let handle = thread::spawn(move || {
        let mut pawn_cache = pawns::Cache::new();
        let worker_shared = thread_shared.clone();
        thread_shared.control.run(move || {
            let job = worker_shared.job.lock().unwrap().clone();
            let mut searcher = Searcher::new(&worker_shared, &tt, &[], job, &mut pawn_cache);
            searcher.think();
        });
    });
    shared.control.wait_until_idle();
    Worker {
        shared,
        handle: Some(handle),
    }
}

fn spawn_main_worker(tt: Arc<TranspositionTable>,
                     helpers: Arc<RwLock<Vec<Worker>>>)
                     -> Worker {
    let shared = Arc::new(SharedThread::new(0));
    let thread_shared = shared.clone();
    let handle = thread::spawn(move || {
        let mut pawn_cache = pawns::Cache::new();
        let worker_shared = thread_shared.clone();
        thread_shared.control.run(move || {
            main_think(&worker_shared, &helpers, &tt, &mut pawn_cache);
        });
    });
    shared.control.wait_until_idle();
    Worker {
        shared,
        handle: Some(handle),
    }
}


/// The main thread's search: orchestrates the helpers around its own
/// iterative deepening and emits the final `bestmove`.
fn main_think(shared: &SharedThread,
              helpers: &RwLock<Vec<Worker>>,
              tt: &TranspositionTable,
              pawn_cache: &mut pawns::Cache) {
    let job = shared.job.lock().unwrap().clone();

    // Checkmate or stalemate: report and bail out before any thread
    // is woken.
    let root_moves = MoveList::new(&job.position);
    if root_moves.is_empty() {
        let value = if job.position.checkers() != 0 { MATED } else { DRAW };
        uci::message(&format!("info depth 0 score {}", uci::format_value(value)));
        uci::message(&format!("bestmove {}", uci::format_move(Move::invalid())));
        return;
    }

    // With a single legal move on a real clock there is nothing to
    // ponder over; answer immediately.
    if root_moves.len() == 1 && job.limits.tc.is_nonzero() {
        if let Some(only_move) = root_moves.iter().next() {
            uci::message(&format!("info depth 0 score {}", uci::format_value(DRAW)));
            uci::message(&format!("bestmove {}", uci::format_move(only_move)));
        }
        return;
    }

    tt.increment_epoch();

    let peers: Vec<Arc<SharedThread>> = {
        let helpers = helpers.read().unwrap();
        for worker in helpers.iter() {
            *worker.shared.job.lock().unwrap() = job.clone();
            worker.shared.control.start_thinking();
        }
        helpers.iter().map(|w| w.shared.clone()).collect()
    };

    let mut searcher = Searcher::new(shared, tt, &peers, job, pawn_cache);
    searcher.think();
    let times_up = searcher.times_up;
    let infinite = searcher.limits.infinite;
    drop(searcher);

    // An infinite search must keep the reported line until the GUI
    // says stop.
    if infinite && !times_up {
        while !shared.control.should_stop() {
            thread::sleep(Duration::from_millis(1));
        }
    }

    for peer in &peers {
        peer.control.stop_thinking();
    }
    for peer in &peers {
        peer.control.wait_until_idle();
    }

    // The best thread is the one that completed the deepest
    // iteration.
    let mut best = shared.result.lock().unwrap().clone();
    let mut best_id = shared.id;
    for peer in &peers {
        let result = peer.result.lock().unwrap().clone();
        if result.depth > best.depth {
            best = result;
            best_id = peer.id;
        }
    }

    let mut pv = best.pv;
    if pv.is_empty() {
        pv.push(Move::invalid());
    }
    uci::message(&format!("info depth {} thread {} score {} pv {}",
                          best.depth,
                          best_id,
                          uci::format_value(best.value),
                          uci::format_variation(&pv)));
    if pv.len() >= 2 {
        uci::message(&format!("bestmove {} ponder {}",
                              uci::format_move(pv[0]),
                              uci::format_move(pv[1])));
    } else {
        uci::message(&format!("bestmove {}", uci::format_move(pv[0])));
    }
}


#[cfg(test)]
mod tests {
    use super::*;
    use crate::position::fens;

    fn fixed_depth(fen: &str, depth: Depth) -> SearchResult {
        let tt = TranspositionTable::new(1024 * 1024);
        let position = Position::from_fen(fen).unwrap();
        let limits = Limits {
            depth,
            ..Limits::default()
        };
        run_search(&position, &[position.key()], limits, &tt)
    }

    #[test]
    fn startpos_depth_one() {
        let result = fixed_depth(fens::STARTPOS, 1);
        assert_eq!(result.depth, 1);
        assert!(!result.pv.is_empty());
        let position = Position::from_fen(fens::STARTPOS).unwrap();
        assert!(MoveList::new(&position).contains(result.pv[0]));
    }

    #[test]
    fn finds_mate_in_one() {
        // Back-rank mate with the rook.
        let result = fixed_depth("6k1/5ppp/8/8/8/8/8/R5K1 w - - 0 1", 3);
        assert_eq!(result.pv.first().copied(),
                   Some(Move::new(crate::squares::A1, crate::squares::A8)));
        assert!(is_mate(result.value));
        assert_eq!(depth_to_mate(result.value), 1);
    }

    #[test]
    fn mated_position_scores_mated_in_zero() {
        // Fool's mate: white is checkmated, no legal moves exist.
        let position = Position::from_fen(
            "rnb1kbnr/pppp1ppp/8/4p3/6Pq/5P2/PPPPP2P/RNBQKBNR w KQkq - 1 3").unwrap();
        assert!(MoveList::new(&position).is_empty());
        let result = fixed_depth("rnb1kbnr/pppp1ppp/8/4p3/6Pq/5P2/PPPPP2P/RNBQKBNR w KQkq - 1 3",
                                 1);
        assert_eq!(result.value, MATED);
        assert!(result.pv.is_empty());
    }

    #[test]
    fn fail_hard_bounds() {
        let tt = TranspositionTable::new(1024 * 1024);
        let position = Position::from_fen(fens::KIWIPETE).unwrap();
        let shared = SharedThread::new(1);
        let mut pawn_cache = pawns::Cache::new();
        let job = Job {
            position,
            key_history: vec![position.key()],
            limits: Limits::default(),
        };
        let mut searcher = Searcher::new(&shared, &tt, &[], job, &mut pawn_cache);
        for (alpha, beta) in [(-100, 100), (0, 1), (-INFINITE, INFINITE), (50, 300)] {
            let mut pv = Vec::new();
            let value = searcher.search(&position, alpha, beta, 3, 0, &mut pv);
            assert!(value >= alpha && value <= beta);
        }
    }

    #[test]
    fn stand_pat_floor() {
        let tt = TranspositionTable::new(1024 * 1024);
        let position = Position::from_fen(fens::KIWIPETE).unwrap();
        let shared = SharedThread::new(1);
        let mut pawn_cache = pawns::Cache::new();
        let job = Job {
            position,
            key_history: vec![position.key()],
            limits: Limits::default(),
        };
        let mut searcher = Searcher::new(&shared, &tt, &[], job, &mut pawn_cache);
        let static_value = {
            let entry = *searcher.pawn_cache.probe_or_assign(&position);
            evaluate(&position, &entry)
        };
        let mut pv = Vec::new();
        let value = searcher.qsearch(&position, -INFINITE, INFINITE, 0, &mut pv);
        assert!(value >= static_value);
    }

    #[test]
    fn threefold_repetition_is_a_draw() {
        // Both sides shuffled their knights out and back twice: the
        // root position stands on the board for the third time.
        let mut position = Position::from_fen(fens::STARTPOS).unwrap();
        let mut key_history = vec![position.key()];
        for m in ["g1f3", "g8f6", "f3g1", "f6g8", "g1f3", "g8f6", "f3g1", "f6g8"] {
            position.do_move(uci::parse_move(m));
            key_history.push(position.key());
        }
        let tt = TranspositionTable::new(1024 * 1024);
        let result = run_search(&position,
                                &key_history,
                                Limits { depth: 8, ..Limits::default() },
                                &tt);
        assert!(result.value >= -1 && result.value <= 1);
    }

    #[test]
    fn lone_pawn_endgame_is_positive_and_not_mate() {
        let result = fixed_depth("4k3/8/8/8/8/8/4P3/4K3 w - - 0 1", 6);
        assert!(result.value > 0);
        assert!(!is_mate(result.value));
    }

    #[test]
    fn node_limit_is_respected() {
        let tt = TranspositionTable::new(1024 * 1024);
        let position = Position::from_fen(fens::KIWIPETE).unwrap();
        let limits = Limits {
            nodes: 5000,
            depth: 30,
            ..Limits::default()
        };
        let result = run_search(&position, &[position.key()], limits, &tt);
        // The searched node count may overshoot by at most one node
        // batch between checks.
        assert!(result.depth < 30);
    }

    #[test]
    fn deeper_search_is_not_weaker_in_won_position() {
        // A queen-up position must keep a clearly winning score as
        // the search deepens.
        for depth in [2, 4] {
            let result = fixed_depth("4k3/8/8/8/8/8/8/Q3K3 w - - 0 1", depth);
            assert!(result.value > 500, "depth {}: {}", depth, result.value);
        }
    }
}
