//! Handles the "Universal Chess Interface" protocol communication.

use lazy_static::lazy_static;
use regex::Regex;
use std::io::{self, BufRead, Write};
use crate::board::*;
use crate::depth::MAX_DEPTH;
use crate::movegen::MoveList;
use crate::moves::Move;
use crate::position::{fens, parse_square, Position};
use crate::search::{KeyHistory, Limits, SearchPool, TimeControl};
use crate::value::{depth_to_mate, is_mate, Value};


pub const NAME: &str = "Lysander";
pub const VERSION: &str = env!("CARGO_PKG_VERSION");


/// Writes one line to the GUI.
///
/// Every protocol line goes through here, from whichever thread
/// produced it; a single write keeps lines whole, and the explicit
/// flush keeps a piped GUI from waiting on a buffer.
pub fn message(line: &str) {
    let stdout = io::stdout();
    let mut handle = stdout.lock();
    let _ = writeln!(handle, "{}", line);
    let _ = handle.flush();
}


// Move and value notation /////////////////////////////////////////////////

/// Formats a value to UCI notation (`cp 25` or `mate -3`).
pub fn format_value(value: Value) -> String {
    if is_mate(value) {
        let moves = (depth_to_mate(value) as i32 + 1) / 2;
        format!("mate {}", if value > 0 { moves } else { -moves })
    } else {
        format!("cp {}", value)
    }
}

/// Formats a move to UCI notation.
///
/// Examples: `e2e4`, `e1g1` (white short castling), `e7e8q` (for
/// promotion), `0000` (the null move). Crazyhouse drops read
/// `N@f3`.
pub fn format_move(m: Move) -> String {
    if !m.is_valid() {
        return "0000".to_string();
    }
    let square = |square: Square| {
        format!("{}{}",
                (b'a' + file_of(square) as u8) as char,
                (b'1' + rank_of(square) as u8) as char)
    };
    if m.is_drop() {
        return format!("{}@{}",
                       piece_type_to_char(m.drop_piece(), true),
                       square(m.to()));
    }
    if m.is_promotion() {
        format!("{}{}{}",
                square(m.from()),
                square(m.to()),
                piece_type_to_char(m.promotion(), false))
    } else {
        format!("{}{}", square(m.from()), square(m.to()))
    }
}

/// Formats a sequence of moves to UCI notation.
pub fn format_variation(moves: &[Move]) -> String {
    moves.iter()
         .map(|&m| format_move(m))
         .collect::<Vec<_>>()
         .join(" ")
}

/// Parses a move from UCI notation.
///
/// Returns the invalid move on malformed input; the caller reports
/// and ignores it.
pub fn parse_move(s: &str) -> Move {
    if s == "0000" || !s.is_ascii() || (s.len() != 4 && s.len() != 5) {
        return Move::invalid();
    }

    #[cfg(feature = "crazyhouse")]
    {
        let bytes = s.as_bytes();
        if s.len() == 4 && bytes[1] == b'@' {
            if let (Some(piece_type), Some(to)) =
                (PIECE_TYPE_CHARS_UPPER.find(bytes[0] as char), parse_square(&s[2..4])) {
                return Move::with_drop(to, piece_type);
            }
            return Move::invalid();
        }
    }

    let from = match parse_square(&s[0..2]) {
        Some(square) => square,
        None => return Move::invalid(),
    };
    let to = match parse_square(&s[2..4]) {
        Some(square) => square,
        None => return Move::invalid(),
    };
    let mut promotion = PIECE_TYPE_NONE;
    if s.len() == 5 {
        match PIECE_TYPE_CHARS.find(&s[4..5]) {
            Some(piece_type) if piece_type != PAWN && piece_type != KING => {
                promotion = piece_type;
            }
            _ => return Move::invalid(),
        }
    }
    Move::with_promotion(from, to, promotion)
}


// Command parsing /////////////////////////////////////////////////////////

/// A command from the GUI to the engine.
pub enum UciCommand {
    SetOption(SetOptionParams),
    IsReady,
    UciNewGame,
    Position(PositionParams),
    Go(GoParams),
    Stop,
    PonderHit,
    Quit,
}

/// Parameters for `UciCommand::SetOption`.
pub struct SetOptionParams {
    pub name: String,
    pub value: String,
}

/// Parameters for `UciCommand::Position`.
pub struct PositionParams {
    pub fen: Option<String>,
    pub moves: Vec<String>,
}

/// Parameters for `UciCommand::Go`.
#[derive(Default)]
pub struct GoParams {
    pub searchmoves: Option<Vec<String>>,
    pub ponder: bool,
    pub wtime: Option<u64>,
    pub btime: Option<u64>,
    pub winc: Option<u64>,
    pub binc: Option<u64>,
    pub movestogo: Option<u64>,
    pub depth: Option<u64>,
    pub nodes: Option<u64>,
    pub mate: Option<u64>,
    pub movetime: Option<u64>,
    pub infinite: bool,
}

pub struct ParseError;

#[cfg(not(feature = "crazyhouse"))]
const MOVE_PATTERN: &str = r"[a-h][1-8][a-h][1-8][qrbn]?";
#[cfg(feature = "crazyhouse")]
const MOVE_PATTERN: &str = r"(?:[a-h][1-8][a-h][1-8][qrbn]?|[PNBRQ]@[a-h][1-8])";

#[cfg(not(feature = "crazyhouse"))]
const PLACEMENT_PATTERN: &str = r"[1-8KQRBNPkqrbnp/]+";
#[cfg(feature = "crazyhouse")]
const PLACEMENT_PATTERN: &str = r"[1-8KQRBNPkqrbnp/~\[\]\-]+";

/// Tries to interpret a string as a UCI command.
pub fn parse_uci_command(s: &str) -> Result<UciCommand, ParseError> {
    lazy_static! {
        static ref RE: Regex = Regex::new(
            r"\b(setoption|isready|ucinewgame|position|go|stop|ponderhit|quit)\s*(?:\s(.*)|$)"
        ).unwrap();
    }
    let captures = RE.captures(s).ok_or(ParseError)?;
    let command = captures.get(1).map_or("", |m| m.as_str());
    let params = captures.get(2).map_or("", |m| m.as_str());
    match command {
        "stop" => Ok(UciCommand::Stop),
        "quit" => Ok(UciCommand::Quit),
        "isready" => Ok(UciCommand::IsReady),
        "ponderhit" => Ok(UciCommand::PonderHit),
        "ucinewgame" => Ok(UciCommand::UciNewGame),
        "setoption" => Ok(UciCommand::SetOption(parse_setoption_params(params)?)),
        "position" => Ok(UciCommand::Position(parse_position_params(params)?)),
        "go" => Ok(UciCommand::Go(parse_go_params(params))),
        _ => Err(ParseError),
    }
}

// A helper function for `parse_uci_command`. It parses parameters for
// the "setoption" command.
fn parse_setoption_params(s: &str) -> Result<SetOptionParams, ParseError> {
    lazy_static! {
        static ref RE: Regex = Regex::new(r"^name\s+(.*?)(?:\s+value\s+(.*?))?\s*$").unwrap();
    }
    let captures = RE.captures(s).ok_or(ParseError)?;
    Ok(SetOptionParams {
        name: captures.get(1).map_or("", |m| m.as_str()).to_string(),
        value: captures.get(2).map_or("", |m| m.as_str()).to_string(),
    })
}

// A helper function for `parse_uci_command`. It parses parameters for
// the "position" command.
fn parse_position_params(s: &str) -> Result<PositionParams, ParseError> {
    lazy_static! {
        static ref RE: Regex = Regex::new(
            format!(
                r"^(?:fen\s+(?P<fen>{}\s+[wb]\s+(?:[KQkq]{{1,4}}|-)\s+(?:[a-h][1-8]|-)(?:\s+\d+(?:\s+\d+)?)?)|startpos)(?:\s+moves(?P<moves>(?:\s+{})*))?\s*$",
                PLACEMENT_PATTERN,
                MOVE_PATTERN,
            ).as_str()
        ).unwrap();
    }
    let captures = RE.captures(s).ok_or(ParseError)?;
    Ok(PositionParams {
        fen: captures.name("fen").map(|m| m.as_str().to_string()),
        moves: captures.name("moves")
                       .map_or("", |m| m.as_str())
                       .split_whitespace()
                       .map(|x| x.to_string())
                       .collect(),
    })
}

// A helper function for `parse_uci_command`. It parses parameters for
// the "go" command.
fn parse_go_params(s: &str) -> GoParams {
    lazy_static! {
        static ref RE: Regex = Regex::new(
            format!(
                r"\b(?P<keyword>{})(?:\s+(?P<number>\d+)|(?P<moves>{}))?(?:\s+|$)",
                "wtime|btime|winc|binc|movestogo|depth|\
                 nodes|mate|movetime|ponder|infinite|searchmoves",
                format!(r"(?:\s+{})+", MOVE_PATTERN),
            ).as_str()
        ).unwrap();
    }
    let mut params = GoParams::default();
    for captures in RE.captures_iter(s) {
        let keyword = captures.name("keyword").map_or("", |m| m.as_str());
        match keyword {
            "searchmoves" => {
                params.searchmoves = captures.name("moves").map(|m| {
                    m.as_str().split_whitespace().map(|x| x.to_string()).collect()
                });
            }
            "infinite" => params.infinite = true,
            "ponder" => params.ponder = true,
            _ => {
                if let Some(number) = captures.name("number") {
                    let number = number.as_str().parse::<u64>().ok();
                    match keyword {
                        "wtime" => params.wtime = number,
                        "btime" => params.btime = number,
                        "winc" => params.winc = number,
                        "binc" => params.binc = number,
                        "movestogo" => params.movestogo = number,
                        "depth" => params.depth = number,
                        "nodes" => params.nodes = number,
                        "mate" => params.mate = number,
                        "movetime" => params.movetime = number,
                        _ => (),
                    }
                }
            }
        }
    }
    params
}

impl GoParams {
    /// Converts the parsed parameters into search limits.
    fn to_limits(&self) -> Limits {
        Limits {
            tc: TimeControl {
                wtime: self.wtime.unwrap_or(0),
                btime: self.btime.unwrap_or(0),
                winc: self.winc.unwrap_or(0),
                binc: self.binc.unwrap_or(0),
                movetime: self.movetime.unwrap_or(0),
                movestogo: self.movestogo.unwrap_or(0) as u32,
            },
            ponder: self.ponder,
            infinite: self.infinite,
            depth: self.depth.unwrap_or(0).min(MAX_DEPTH as u64) as u8,
            mate: self.mate.unwrap_or(0).min(MAX_DEPTH as u64) as u8,
            nodes: self.nodes.unwrap_or(0),
        }
    }
}


// The serving loop ////////////////////////////////////////////////////////

fn hardware_threads() -> usize {
    std::thread::available_parallelism().map(|n| n.get()).unwrap_or(1)
}

fn startpos_fen() -> &'static str {
    #[cfg(feature = "crazyhouse")]
    {
        if VARIANT_IS_CRAZYHOUSE.load(std::sync::atomic::Ordering::Relaxed) {
            return fens::STARTPOS_CRAZYHOUSE;
        }
    }
    fens::STARTPOS
}

#[cfg(feature = "crazyhouse")]
static VARIANT_IS_CRAZYHOUSE: std::sync::atomic::AtomicBool =
    std::sync::atomic::AtomicBool::new(false);

/// The main UCI serving loop.
///
/// Expects the `uci` handshake line to have been consumed already;
/// introduces the engine, then executes commands from standard input
/// until `quit`.
pub fn run() {
    message(&format!("id name {} {}", NAME, VERSION));
    message(&format!("id author the {} developers", NAME));
    message(&format!("option name Threads type spin default 1 min 1 max {}",
                     hardware_threads()));
    message("option name Hash type spin default 8 min 1 max 16384");
    #[cfg(feature = "crazyhouse")]
    message("option name UCI_Variant type combo default standard var standard var crazyhouse");
    message("uciok");

    let pool = SearchPool::new();
    let mut position = Position::from_fen(fens::STARTPOS).ok().unwrap();
    let mut key_history: KeyHistory = vec![position.key()];
    let mut last_limits = Limits::default();

    let stdin = io::stdin();
    for line in stdin.lock().lines() {
        let line = match line {
            Ok(line) => line,
            Err(_) => break,
        };
        let command = match parse_uci_command(&line) {
            Ok(command) => command,
            Err(_) => {
                if !line.trim().is_empty() {
                    message("info string Unknown command");
                    log::debug!("rejected command: {}", line);
                }
                continue;
            }
        };
        match command {
            UciCommand::IsReady => message("readyok"),

            UciCommand::UciNewGame => {
                pool.stop_and_wait();
                pool.tt().clear();
            }

            UciCommand::SetOption(params) => {
                let was_thinking = !pool.is_idle();
                pool.stop_and_wait();
                handle_setoption(&pool, &params);
                if was_thinking {
                    pool.start_thinking(position, key_history.clone(), last_limits.clone());
                }
            }

            UciCommand::Position(params) => {
                pool.stop_and_wait();
                let fen: &str = match params.fen.as_deref() {
                    Some(f) => f,
                    None => startpos_fen(),
                };
                let mut new_position = match Position::from_fen(fen) {
                    Ok(new_position) => new_position,
                    Err(error) => {
                        message(&format!("info string Illegal FEN: {}", error));
                        continue;
                    }
                };
                let mut new_history = vec![new_position.key()];
                let mut bad = false;
                for move_str in &params.moves {
                    let m = parse_move(move_str);
                    if !m.is_valid() || !MoveList::new(&new_position).contains(m) {
                        message(&format!("info string Illegal move '{}'", move_str));
                        bad = true;
                        break;
                    }
                    new_position.do_move(m);
                    new_history.push(new_position.key());
                }
                if !bad {
                    position = new_position;
                    key_history = new_history;
                }
            }

            UciCommand::Go(params) => {
                last_limits = params.to_limits();
                pool.start_thinking(position, key_history.clone(), last_limits.clone());
            }

            UciCommand::Stop => pool.stop(),

            // Pondering is parsed but not implemented; a ponder hit
            // simply lets the running search continue.
            UciCommand::PonderHit => (),

            UciCommand::Quit => break,
        }
    }

    pool.stop_and_wait();
}

fn handle_setoption(pool: &SearchPool, params: &SetOptionParams) {
    match params.name.as_str() {
        "Threads" => {
            if let Ok(threads) = params.value.parse::<usize>() {
                let threads = threads.clamp(1, hardware_threads());
                pool.resize_helpers(threads - 1);
            }
        }
        "Hash" => {
            if let Ok(size_mb) = params.value.parse::<usize>() {
                pool.resize_tt(size_mb.clamp(1, 16384));
            }
        }
        #[cfg(feature = "crazyhouse")]
        "UCI_Variant" => {
            VARIANT_IS_CRAZYHOUSE.store(params.value == "crazyhouse",
                                        std::sync::atomic::Ordering::Relaxed);
        }
        _ => {
            message(&format!("info string Invalid option \"{}\"", params.name));
        }
    }
}


#[cfg(test)]
mod tests {
    use super::*;
    use crate::squares::*;

    #[test]
    fn test_format_move() {
        assert_eq!(format_move(Move::new(E2, E4)), "e2e4");
        assert_eq!(format_move(Move::new(E1, G1)), "e1g1");
        assert_eq!(format_move(Move::with_promotion(E7, E8, QUEEN)), "e7e8q");
        assert_eq!(format_move(Move::invalid()), "0000");
    }

    #[test]
    fn test_parse_move() {
        assert_eq!(parse_move("e2e4"), Move::new(E2, E4));
        assert_eq!(parse_move("e7e8q"), Move::with_promotion(E7, E8, QUEEN));
        assert_eq!(parse_move("a7a8n"), Move::with_promotion(A7, A8, KNIGHT));
        assert_eq!(parse_move("0000"), Move::invalid());
        assert_eq!(parse_move("e9e4"), Move::invalid());
        assert_eq!(parse_move("e2e4k"), Move::invalid());
        assert_eq!(parse_move("xyzzy"), Move::invalid());
    }

    #[test]
    fn move_notation_round_trip() {
        for m in [Move::new(E2, E4),
                  Move::new(A1, H8),
                  Move::with_promotion(B7, A8, ROOK),
                  Move::with_promotion(H2, H1, BISHOP)] {
            assert_eq!(parse_move(&format_move(m)), m);
        }
    }

    #[cfg(feature = "crazyhouse")]
    #[test]
    fn drop_notation() {
        assert_eq!(format_move(Move::with_drop(F3, KNIGHT)), "N@f3");
        assert_eq!(parse_move("N@f3"), Move::with_drop(F3, KNIGHT));
        assert_eq!(parse_move("P@e4"), Move::with_drop(E4, PAWN));
    }

    #[test]
    fn test_format_value() {
        use crate::value::{mate_in, mated_in};
        assert_eq!(format_value(150), "cp 150");
        assert_eq!(format_value(-25), "cp -25");
        assert_eq!(format_value(mate_in(1)), "mate 1");
        assert_eq!(format_value(mate_in(7)), "mate 4");
        assert_eq!(format_value(mated_in(2)), "mate -1");
    }

    #[test]
    fn test_parse_go_params() {
        assert_eq!(parse_go_params(" wtime22000  ").wtime, None);
        assert_eq!(parse_go_params(" wtime    22000  ").wtime, Some(22000));
        assert_eq!(parse_go_params("wtime 22000").wtime, Some(22000));
        assert!(!parse_go_params("wtime 22000").infinite);
        assert_eq!(parse_go_params("searchmoves   e2e4  c7c8q  ").searchmoves,
                   Some(vec!["e2e4".to_string(), "c7c8q".to_string()]));
        assert!(parse_go_params("infinite wtime 22000").infinite);
        assert_eq!(parse_go_params("infinite wtime 22000").wtime, Some(22000));
        assert_eq!(parse_go_params("wtime 22000 infinite btime 11000 ponder").btime,
                   Some(11000));
        assert_eq!(parse_go_params("depth 7").depth, Some(7));
        assert_eq!(parse_go_params("go depth 900").to_limits().depth, MAX_DEPTH);
        assert_eq!(parse_go_params("movetime 150").to_limits().tc.movetime, 150);
    }

    #[test]
    fn test_parse_setoption_params() {
        assert_eq!(parse_setoption_params("name   xxx  value   yyy  ").ok().unwrap().name,
                   "xxx");
        assert_eq!(parse_setoption_params("name xxx value yyy").ok().unwrap().value,
                   "yyy");
        assert_eq!(parse_setoption_params("name xxx").ok().unwrap().value, "");
        assert!(parse_setoption_params("namexxx").is_err());
    }

    #[test]
    fn test_parse_position_params() {
        let params = parse_position_params("startpos").ok().unwrap();
        assert!(params.fen.is_none());
        assert!(params.moves.is_empty());

        let params = parse_position_params("startpos   moves   e2e4   d2d4").ok().unwrap();
        assert_eq!(params.moves.len(), 2);

        let params =
            parse_position_params("fen 4k3/8/8/8/8/8/8/4K3 w - - 0 1 moves e1e2").ok().unwrap();
        assert_eq!(params.fen.as_deref(), Some("4k3/8/8/8/8/8/8/4K3 w - - 0 1"));
        assert_eq!(params.moves, vec!["e1e2".to_string()]);

        assert!(parse_position_params("fen banana").is_err());
        assert!(parse_position_params("startpos moves e2e4 xxxx").is_err());
    }

    #[test]
    fn test_parse_uci_command() {
        assert!(matches!(parse_uci_command("isready"), Ok(UciCommand::IsReady)));
        assert!(matches!(parse_uci_command("  stop  "), Ok(UciCommand::Stop)));
        assert!(matches!(parse_uci_command("ucinewgame"), Ok(UciCommand::UciNewGame)));
        assert!(matches!(parse_uci_command("ponderhit"), Ok(UciCommand::PonderHit)));
        assert!(matches!(parse_uci_command("quit"), Ok(UciCommand::Quit)));
        assert!(matches!(parse_uci_command("go infinite"), Ok(UciCommand::Go(_))));
        assert!(matches!(parse_uci_command("position startpos"),
                         Ok(UciCommand::Position(_))));
        assert!(matches!(parse_uci_command("setoption name Hash value 64"),
                         Ok(UciCommand::SetOption(_))));
        assert!(parse_uci_command("banana").is_err());
    }
}
