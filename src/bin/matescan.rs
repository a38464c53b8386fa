// Copyright 2026 the matescan developers.
//
// Licensed under the Apache License, Version 2.0 <LICENSE-APACHE or
// http://www.apache.org/licenses/LICENSE-2.0> or the MIT license
// <LICENSE-MIT or http://opensource.org/licenses/MIT>, at your
// option. This file may not be copied, modified, or distributed
// except according to those terms.

#[macro_use]
extern crate clap;
#[macro_use]
extern crate log;
#[macro_use]
extern crate serde_derive;

use std::fs::File;
use std::process;

use clap::{App, Arg, ArgMatches, SubCommand};
use csv::Reader;
use rayon::prelude::*;

use matescan::{classify, MateReport, Position};

/// One finished game from a CSV export. Only the final position is needed
/// for classification; the remaining columns just label the output.
#[derive(Clone, Deserialize)]
struct GameRecord {
    fen: String,
    #[serde(default)]
    white: Option<String>,
    #[serde(default)]
    black: Option<String>,
    #[serde(default)]
    date: Option<String>,
}

fn main() {
    env_logger::init();
    let matches = App::new(crate_name!())
        .version(crate_version!())
        .about(crate_description!())
        .subcommand(
            SubCommand::with_name("classify")
                .about("Classify a single checkmate position")
                .arg(
                    Arg::with_name("FEN")
                        .help("FEN string for the final position")
                        .required(true)
                        .index(1),
                )
                .arg(
                    Arg::with_name("json")
                        .help("Emit the full report as JSON")
                        .long("--json"),
                ),
        )
        .subcommand(
            SubCommand::with_name("batch")
                .about("Classify every finished game in a CSV file")
                .arg(
                    Arg::with_name("FILE")
                        .help("CSV file with a fen column (white, black and date columns optional)")
                        .required(true)
                        .index(1),
                )
                .arg(
                    Arg::with_name("json")
                        .help("Emit one JSON report per game instead of pattern lines")
                        .long("--json"),
                ),
        )
        .get_matches();

    if let Some(matches) = matches.subcommand_matches("classify") {
        run_classify(matches);
    }

    if let Some(matches) = matches.subcommand_matches("batch") {
        run_batch(matches);
    }

    println!("{}", matches.usage());
    process::exit(2);
}

fn run_classify(matches: &ArgMatches) -> ! {
    let fen = matches.value_of("FEN").unwrap();
    let pos = match Position::from_fen(fen) {
        Ok(pos) => pos,
        Err(err) => {
            println!("invalid fen: {}", err);
            process::exit(1);
        }
    };

    let report = match classify(&pos) {
        Ok(report) => report,
        Err(err) => {
            println!("analysis failed: {}", err);
            process::exit(1);
        }
    };

    if matches.is_present("json") {
        println!("{}", serde_json::to_string_pretty(&report).unwrap());
        process::exit(0);
    }

    println!("{}", pos);
    println!("fen:     {}", report.fen);
    println!("king:    {}", report.king);
    match report.pattern {
        Some(pattern) => println!("pattern: {}", pattern),
        None => println!("pattern: (none)"),
    }
    let checkers: Vec<_> = report.checkers.iter().map(|sq| sq.to_string()).collect();
    println!("checked by: {}", checkers.join(", "));
    for pin in &report.important_pins {
        println!("pinned:  {} (by {})", pin.pinned, pin.attacker);
    }
    process::exit(0);
}

fn run_batch(matches: &ArgMatches) -> ! {
    let file = File::open(matches.value_of("FILE").unwrap()).unwrap();
    let json = matches.is_present("json");

    let mut games: Vec<(usize, GameRecord)> = Vec::new();
    let mut reader = Reader::from_reader(&file);
    for (number, result) in reader.deserialize().enumerate() {
        match result {
            Ok(record) => games.push((number, record)),
            Err(err) => warn!("skipping unreadable row {}: {}", number, err),
        }
    }
    info!("analyzing {} finished games", games.len());

    // Every position is analyzed independently; nothing is shared between
    // games, so the batch fans out freely.
    let reports: Vec<(usize, GameRecord, Result<MateReport, String>)> = games
        .into_par_iter()
        .map(|(number, record)| {
            let outcome = analyze_record(&record);
            (number, record, outcome)
        })
        .collect();

    for (number, record, outcome) in reports {
        let report = match outcome {
            Ok(report) => report,
            Err(err) => {
                warn!("skipping game {}: {}", number, err);
                continue;
            }
        };

        if json {
            println!("{}", serde_json::to_string(&report).unwrap());
        } else if let Some(pattern) = report.pattern {
            println!(
                "{} -- {} vs {} {} ({})",
                pattern,
                record.white.as_ref().map(String::as_str).unwrap_or("?"),
                record.black.as_ref().map(String::as_str).unwrap_or("?"),
                record.date.as_ref().map(String::as_str).unwrap_or(""),
                number
            );
        }
    }
    process::exit(0);
}

fn analyze_record(record: &GameRecord) -> Result<MateReport, String> {
    let pos = Position::from_fen(&record.fen).map_err(|err| err.to_string())?;
    classify(&pos).map_err(|err| err.to_string())
}
