//! Implements the static evaluation.

use crate::board::*;
use crate::bitsets::*;
use crate::board_geometry::BoardGeometry;
use crate::pawns;
use crate::position::Position;
use crate::value::Value;


pub const PAWN_VALUE: Value = 100;
pub const KNIGHT_VALUE: Value = 300;
pub const BISHOP_VALUE: Value = 325;
pub const ROOK_VALUE: Value = 550;
pub const QUEEN_VALUE: Value = 1000;

/// The bonus for having the move.
pub const TEMPO_BONUS: Value = 29;

/// Evaluations are clamped into this range, well clear of the mate
/// scores.
pub const EVAL_MAX: Value = 29999;

/// Returns the material value of a piece type.
///
/// The king's value is only meaningful for move ordering and exchange
/// evaluation; it is never summed into an evaluation.
#[inline]
pub fn piece_value(piece_type: PieceType) -> Value {
    const VALUES: [Value; 6] =
        [PAWN_VALUE, KNIGHT_VALUE, BISHOP_VALUE, ROOK_VALUE, QUEEN_VALUE, 20000];
    VALUES[piece_type]
}


/// Statically evaluates a position, relative to the side to move.
///
/// The caller supplies the pawn-structure entry obtained from its
/// pawn cache. The position must not be in check -- the quiescence
/// search only stands pat on quiet positions, and evaluating a check
/// would produce nonsense.
pub fn evaluate(position: &Position, pawn_entry: &pawns::Entry) -> Value {
    debug_assert_eq!(position.checkers(), 0);

    let us = position.side_to_move();
    let them = 1 ^ us;
    let mut total: i32 = 0;

    // Material.
    for piece_type in PAWN..=QUEEN {
        let balance = position.count(us, piece_type) as i32 -
                      position.count(them, piece_type) as i32;
        total += balance * piece_value(piece_type) as i32;
    }

    // Pawn structure.
    total += pawn_entry.eval(us) as i32 - pawn_entry.eval(them) as i32;

    // Mobility of the minor and rook pieces, counting attacks into
    // squares that are neither occupied by friends nor covered by
    // enemy pawns.
    total += mobility(position, us) - mobility(position, them);

    total += TEMPO_BONUS as i32;

    total.clamp(-EVAL_MAX as i32, EVAL_MAX as i32) as Value
}


/// Weights per attacked square for knight, bishop, and rook mobility.
const MOBILITY_WEIGHT: [i32; 4] = [0, 4, 3, 2];

fn mobility(position: &Position, us: Color) -> i32 {
    let g = BoardGeometry::get();
    let them = 1 ^ us;
    let occupied = position.occupied();
    let safe = !position.by_color(us) &
               !pawn_attacks_bb(them, position.pieces(them, PAWN));

    let mut count = 0;
    for piece_type in [KNIGHT, BISHOP, ROOK] {
        let mut pieces = position.pieces(us, piece_type);
        while pieces != 0 {
            let from = bsf_reset(&mut pieces);
            let attacks = g.attacks_from(piece_type, from, occupied) & safe;
            count += pop_count(attacks) as i32 * MOBILITY_WEIGHT[piece_type];
        }
    }
    count
}


#[cfg(test)]
mod tests {
    use super::*;
    use crate::pawns::Cache;
    use crate::position::{fens, Position};

    fn eval(fen: &str) -> Value {
        let position = Position::from_fen(fen).unwrap();
        let mut cache = Cache::new();
        let entry = *cache.probe_or_assign(&position);
        evaluate(&position, &entry)
    }

    #[test]
    fn startpos_evaluates_to_tempo() {
        assert_eq!(eval(fens::STARTPOS), TEMPO_BONUS);
    }

    #[test]
    fn material_dominates() {
        // White is a queen up.
        let value = eval("4k3/8/8/8/8/8/8/Q3K3 w - - 0 1");
        assert!(value > QUEEN_VALUE / 2);

        // Same position from black's perspective is symmetric up to
        // the tempo bonus.
        let value_black = eval("4k3/8/8/8/8/8/8/Q3K3 b - - 0 1");
        assert_eq!(value + value_black, 2 * TEMPO_BONUS);
    }

    #[test]
    fn extra_pawn_is_an_advantage() {
        let value = eval("4k3/8/8/8/8/8/4P3/4K3 w - - 0 1");
        assert!(value > 0);
    }

    #[test]
    fn mirrored_positions_evaluate_symmetrically() {
        // Mirroring swaps colors and flips ranks; the evaluation
        // relative to the side to move must be unchanged.
        let value = eval("6k1/6pp/8/8/8/8/5PPP/6K1 w - - 0 1");
        let mirrored = eval("6k1/5ppp/8/8/8/8/6PP/6K1 b - - 0 1");
        assert_eq!(value, mirrored);
    }
}
