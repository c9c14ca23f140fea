//! Implements the move ordering heuristics.
//!
//! See <https://www.chessprogramming.org/History_Heuristic> and
//! <https://www.chessprogramming.org/Killer_Heuristic>.

use crate::board::*;
use crate::depth::{Depth, MAX_DEPTH};
use crate::evaluation::piece_value;
use crate::movegen::MoveList;
use crate::moves::Move;
use crate::position::Position;
use crate::value::Value;


const HASH_MOVE_OFFSET: Value = 30000;
const PROMOTIONS_OFFSET: Value = 20000;
const CAPTURES_OFFSET: Value = 20000;
const KILLER_MOVES_OFFSET: Value = 20000;
const QUIETS_OFFSET: Value = 10000;

/// History values are halved when their magnitude reaches this bound.
pub const MAX_HISTORY_VALUE: Value = 2000;


/// The two killer slots of a single depth.
#[derive(Clone, Copy, Default)]
struct Killers([Move; 2]);

impl Killers {
    fn update(&mut self, m: Move) {
        if self.0[0] != m {
            self.0[1] = self.0[0];
        }
        self.0[0] = m;
    }

    fn is_killer(&self, m: Move) -> bool {
        m == self.0[0] || m == self.0[1]
    }
}


/// Quiet moves that caused a beta cutoff, two per depth.
pub struct KillerHeuristic {
    slots: [Killers; MAX_DEPTH as usize + 1],
}

impl KillerHeuristic {
    pub fn new() -> KillerHeuristic {
        KillerHeuristic { slots: [Killers::default(); MAX_DEPTH as usize + 1] }
    }

    /// Registers a cutoff move at a given depth.
    pub fn update(&mut self, depth: Depth, m: Move) {
        self.slots[depth as usize].update(m);
    }

    /// Returns `true` if the move occupies a killer slot at the given
    /// depth.
    pub fn is_killer(&self, depth: Depth, m: Move) -> bool {
        self.slots[depth as usize].is_killer(m)
    }

    pub fn clear(&mut self) {
        self.slots = [Killers::default(); MAX_DEPTH as usize + 1];
    }
}


/// Per (piece, destination square) statistic of how often quiet moves
/// improved alpha or failed to.
pub struct HistoryHeuristic {
    table: [[Value; 64]; 12],
}

impl HistoryHeuristic {
    pub fn new() -> HistoryHeuristic {
        HistoryHeuristic { table: [[0; 64]; 12] }
    }

    /// Adds `value` to the statistic of (piece, to). Halves the whole
    /// cell when it grows too large, so old information decays
    /// instead of saturating.
    pub fn update(&mut self, value: Value, piece: Piece, to: Square) {
        let cell = &mut self.table[piece][to];
        *cell += value;
        if cell.abs() >= MAX_HISTORY_VALUE {
            *cell /= 2;
        }
    }

    #[inline]
    pub fn probe(&self, piece: Piece, to: Square) -> Value {
        self.table[piece][to]
    }

    pub fn clear(&mut self) {
        self.table = [[0; 64]; 12];
    }
}


/// The per-thread move ordering state.
pub struct Heuristics {
    pub killers: KillerHeuristic,
    pub history: HistoryHeuristic,
}

impl Heuristics {
    pub fn new() -> Heuristics {
        Heuristics {
            killers: KillerHeuristic::new(),
            history: HistoryHeuristic::new(),
        }
    }

    pub fn clear(&mut self) {
        self.killers.clear();
        self.history.clear();
    }
}

impl Default for Heuristics {
    fn default() -> Heuristics {
        Heuristics::new()
    }
}


/// Assigns an ordering value to every move in the list.
///
/// The classes, from best to worst: the hash move; promotions and
/// captures (graded inside the class by the exchange evaluation, so
/// losing captures sink to the bottom of it); killer moves of this
/// depth; quiet moves graded by history.
pub fn evaluate_move_list(position: &Position,
                          move_list: &mut MoveList,
                          depth: Depth,
                          hash_move: Move,
                          heuristics: &Heuristics) {
    for entry in move_list.entries_mut() {
        let m = entry.m;
        entry.value = if m == hash_move {
            HASH_MOVE_OFFSET
        } else if m.is_promotion() {
            let captured = if position.is_capture(m) {
                piece_value(position.type_of_piece_on(m.to()))
            } else {
                0
            };
            PROMOTIONS_OFFSET + piece_value(m.promotion()) + captured
        } else if position.is_capture(m) {
            CAPTURES_OFFSET + position.see(m)
        } else if heuristics.killers.is_killer(depth, m) {
            KILLER_MOVES_OFFSET
        } else {
            QUIETS_OFFSET + heuristics.history.probe(position.moved_piece(m), m.to())
        };
    }
}

/// Assigns ordering values for the quiescence search.
///
/// Only captures and promotions matter there, so a plain
/// most-valuable-victim, least-valuable-attacker grading suffices;
/// neither the hash move nor the killers are involved.
pub fn evaluate_move_list_quiescence(position: &Position, move_list: &mut MoveList) {
    for entry in move_list.entries_mut() {
        let m = entry.m;
        entry.value = if m.is_promotion() {
            PROMOTIONS_OFFSET + piece_value(m.promotion())
        } else if position.is_capture(m) {
            let victim = piece_value(position.type_of_piece_on(m.to()));
            let attacker = piece_value(type_of(position.moved_piece(m)));
            CAPTURES_OFFSET + victim - attacker
        } else {
            0
        };
    }
}


#[cfg(test)]
mod tests {
    use super::*;
    use crate::movegen::MoveList;
    use crate::position::Position;
    use crate::squares::*;

    #[test]
    fn killer_slots() {
        let mut killers = KillerHeuristic::new();
        let a = Move::new(E2, E4);
        let b = Move::new(D2, D4);
        let c = Move::new(C2, C4);
        killers.update(3, a);
        assert!(killers.is_killer(3, a));
        assert!(!killers.is_killer(2, a));
        killers.update(3, b);
        assert!(killers.is_killer(3, a));
        assert!(killers.is_killer(3, b));
        killers.update(3, c);
        assert!(killers.is_killer(3, b));
        assert!(killers.is_killer(3, c));
        assert!(!killers.is_killer(3, a));
        // Re-storing the front killer must not clobber the second
        // slot.
        killers.update(3, c);
        assert!(killers.is_killer(3, b));
    }

    #[test]
    fn history_decays() {
        let mut history = HistoryHeuristic::new();
        let piece = make_piece(WHITE, KNIGHT);
        history.update(64, piece, E4);
        assert_eq!(history.probe(piece, E4), 64);
        history.update(-8, piece, E4);
        assert_eq!(history.probe(piece, E4), 56);
        for _ in 0..100 {
            history.update(400, piece, E4);
        }
        assert!(history.probe(piece, E4) < MAX_HISTORY_VALUE);
        assert!(history.probe(piece, E4) > 0);
    }

    #[test]
    fn ordering_classes() {
        // The queen on D5 is defended, so taking it with the pawn
        // wins more than taking it with the rook.
        let position =
            Position::from_fen("4k3/8/2p5/3q4/4P3/8/8/3RK3 w - - 0 1").unwrap();
        let mut list = MoveList::new(&position);
        let hash_move = Move::new(E4, E5);
        let heuristics = Heuristics::new();
        evaluate_move_list(&position, &mut list, 1, hash_move, &heuristics);

        assert_eq!(list.select(), hash_move);
        let pawn_takes_queen = list.select();
        assert_eq!(pawn_takes_queen, Move::new(E4, D5));
        let rook_takes_queen = list.select();
        assert_eq!(rook_takes_queen, Move::new(D1, D5));
    }

    #[test]
    fn promotions_rank_above_quiets() {
        let position = Position::from_fen("4k3/P7/8/8/8/8/8/4K3 w - - 0 1").unwrap();
        let mut list = MoveList::new(&position);
        let heuristics = Heuristics::new();
        evaluate_move_list(&position, &mut list, 1, Move::invalid(), &heuristics);
        assert_eq!(list.select(), Move::with_promotion(A7, A8, QUEEN));
    }

    #[test]
    fn quiescence_ordering_is_mvv_lva() {
        // Both the pawn and the rook can capture the queen; the pawn
        // capture must come first.
        let position =
            Position::from_fen("4k3/8/8/3q4/4P3/8/8/3RK3 w - - 0 1").unwrap();
        let mut list = MoveList::new(&position);
        evaluate_move_list_quiescence(&position, &mut list);
        assert_eq!(list.select(), Move::new(E4, D5));
        assert_eq!(list.select(), Move::new(D1, D5));
    }
}
