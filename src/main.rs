//! The `lysander` binary: UCI server and test harness commands.

use std::fs::File;
use std::io::{self, BufRead};
use clap::{Arg, ArgAction, Command};
use simplelog::{Config, LevelFilter, WriteLogger};
use lysander::perft::{bench, perft_command};
use lysander::uci;

fn main() {
    let matches = Command::new("lysander")
        .version(uci::VERSION)
        .about("A UCI chess engine. Without a subcommand it speaks the UCI protocol \
                on standard input and output.")
        .arg(Arg::new("log")
            .long("log")
            .value_name("FILE")
            .global(true)
            .action(ArgAction::Set)
            .help("Write a debug log to the given file"))
        .subcommand(Command::new("perft")
            .about("Counts the leaf nodes of the legal move tree")
            .arg(Arg::new("depth").required(true))
            .arg(Arg::new("fen")
                .num_args(0..)
                .trailing_var_arg(true)
                .help("Position to search (FEN, 'startpos', or 'kiwipete')")))
        .subcommand(Command::new("divide")
            .about("Like perft, with per-root-move counts")
            .arg(Arg::new("depth").required(true))
            .arg(Arg::new("fen").num_args(0..).trailing_var_arg(true)))
        .subcommand(Command::new("bench")
            .about("Searches a fixed position set to a fixed depth"))
        .get_matches();

    if let Some(path) = matches.get_one::<String>("log") {
        match File::create(path) {
            Ok(file) => {
                let _ = WriteLogger::init(LevelFilter::Debug, Config::default(), file);
            }
            Err(error) => eprintln!("cannot open log file: {}", error),
        }
    }

    match matches.subcommand() {
        Some(("perft", sub)) | Some(("divide", sub)) => {
            let divided = matches.subcommand_name() == Some("divide");
            let depth = sub.get_one::<String>("depth")
                           .and_then(|s| s.parse().ok())
                           .unwrap_or(1);
            let fen = sub.get_many::<String>("fen")
                         .map(|values| values.cloned().collect::<Vec<_>>().join(" "))
                         .unwrap_or_default();
            if let Err(error) = perft_command(depth, &fen, divided) {
                eprintln!("{}", error);
                std::process::exit(1);
            }
        }
        Some(("bench", _)) => bench(),
        _ => {
            // Wait for the protocol handshake, then hand over to the
            // serving loop.
            println!("{} {}", uci::NAME, uci::VERSION);
            let stdin = io::stdin();
            for line in stdin.lock().lines() {
                let line = match line {
                    Ok(line) => line,
                    Err(_) => break,
                };
                match line.trim() {
                    "uci" => {
                        uci::run();
                        break;
                    }
                    "quit" => break,
                    _ => (),
                }
            }
        }
    }
}
