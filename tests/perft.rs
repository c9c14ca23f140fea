//! Move path enumeration against the published node counts.

use lysander::perft::perft;
use lysander::position::{fens, Position};

fn assert_counts(fen: &str, expected: &[u64]) {
    let position = Position::from_fen(fen).unwrap();
    for (i, &nodes) in expected.iter().enumerate() {
        let depth = (i + 1) as u8;
        assert_eq!(perft(&position, depth), nodes, "{} at depth {}", fen, depth);
    }
}

#[test]
fn startpos() {
    assert_counts(fens::STARTPOS, &[20, 400, 8_902, 197_281]);
}

#[test]
fn kiwipete() {
    assert_counts(fens::KIWIPETE, &[48, 2_039, 97_862]);
}

#[test]
fn endgame_position() {
    assert_counts("8/2p5/3p4/KP5r/1R3p1k/8/4P1P1/8 w - - 0 1",
                  &[14, 191, 2_812, 43_238, 674_624]);
}

#[test]
fn promotion_heavy_position() {
    assert_counts("r3k2r/Pppp1ppp/1b3nbN/nP6/BBP1P3/q4N2/Pp1P2PP/R2Q1RK1 w kq - 0 1",
                  &[6, 264, 9_467, 422_333]);
}

#[test]
fn castling_and_checks_position() {
    assert_counts("rnbq1k1r/pp1Pbppp/2p5/8/2B5/8/PPP1NnPP/RNBQK2R w KQ - 0 8",
                  &[44, 1_486, 62_379]);
}

#[test]
fn underpromotion_position() {
    assert_counts("n1n5/PPPk4/8/8/8/8/4Kppp/5N1N b - - 0 1",
                  &[24, 496, 9_483, 182_838]);
}

// The full-depth counts from the standard corpus. Expensive; run
// with `cargo test --release -- --ignored`.

#[test]
#[ignore]
fn startpos_deep() {
    assert_counts(fens::STARTPOS, &[20, 400, 8_902, 197_281, 4_865_609, 119_060_324]);
}

#[test]
#[ignore]
fn kiwipete_deep() {
    assert_counts(fens::KIWIPETE, &[48, 2_039, 97_862, 4_085_603, 193_690_690]);
}

#[test]
#[ignore]
fn endgame_position_deep() {
    assert_counts("8/2p5/3p4/KP5r/1R3p1k/8/4P1P1/8 w - - 0 1",
                  &[14, 191, 2_812, 43_238, 674_624, 11_030_083, 178_633_661]);
}

#[test]
#[ignore]
fn promotion_heavy_position_deep() {
    assert_counts("r3k2r/Pppp1ppp/1b3nbN/nP6/BBP1P3/q4N2/Pp1P2PP/R2Q1RK1 w kq - 0 1",
                  &[6, 264, 9_467, 422_333, 15_833_292, 706_045_033]);
}

#[test]
#[ignore]
fn castling_and_checks_position_deep() {
    assert_counts("rnbq1k1r/pp1Pbppp/2p5/8/2B5/8/PPP1NnPP/RNBQK2R w KQ - 0 8",
                  &[44, 1_486, 62_379, 2_103_487, 89_941_194]);
}

#[test]
#[ignore]
fn underpromotion_position_deep() {
    assert_counts("n1n5/PPPk4/8/8/8/8/4Kppp/5N1N b - - 0 1",
                  &[24, 496, 9_483, 182_838, 3_605_103, 71_179_139]);
}
