use clap::Parser;
use colored::Colorize;
use env_logger::Env;
use log::{debug, warn};
use rand::rngs::StdRng;
use rand::SeedableRng;
use std::io;
use std::path::PathBuf;
use std::time::Duration;
use thiserror::Error;

mod cli;
mod libkaruta;

use crate::libkaruta::db::{self, PoemRecord};
use crate::libkaruta::session::{QuizSession, QuizSettings};
use crate::libkaruta::shitsumon::{QuizError, QuizKind, CHOICES_COUNT};
use crate::libkaruta::uta::validate_record;

#[derive(Debug, PartialEq)]
enum Choice {
    Option(usize),
    Hint,
    DontKnow,
    Quit,
}

#[derive(Parser, Debug)]
#[command(name = "歌かるた (Utakaruta)")]
#[command(version, about, long_about = None)]
struct Args {
    #[arg(short, long, value_name = "FILE", default_value = "hyakunin_isshu.db")]
    db: PathBuf,
    #[arg(short, long, value_enum, default_value_t = QuizKind::UpperToLower)]
    mode: QuizKind,
    #[arg(short, long, default_value = "10")]
    question_count: usize,
    #[arg(short, long, value_name = "SECONDS")]
    time_limit: Option<u64>,
    /// Replay the same questions by reusing a seed.
    #[arg(long)]
    seed: Option<u64>,
    #[arg(short, long, default_value = "error")]
    log_level: String,
}

impl Choice {
    fn from_str(choices_count: usize, input: &str) -> Choice {
        match input.trim() {
            "q" => Choice::Quit,
            "h" => Choice::Hint,
            input => match input.parse::<usize>() {
                Ok(num) if (1..=choices_count).contains(&num) => Choice::Option(num - 1),
                Ok(_) => {
                    println!(
                        "{}",
                        format!("There are only {} options available!", choices_count)
                            .bright_red()
                    );
                    Choice::DontKnow
                }
                Err(_) => Choice::DontKnow,
            },
        }
    }
}

#[derive(Debug, Error)]
enum Error {
    #[error("database error: {0}")]
    Db(#[from] rusqlite::Error),
    #[error(transparent)]
    Quiz(#[from] QuizError),
    #[error("cannot read answer: {0}")]
    Input(#[from] io::Error),
}

fn main() -> Result<(), Error> {
    //INIT START
    let args = Args::parse();
    env_logger::Builder::from_env(Env::default().default_filter_or(&args.log_level)).init();

    let conn = db::create_or_open(&args.db)?;
    debug!("[DB] Database Connection Successful!");
    let loaded = PoemRecord::get_all(&conn);
    db::close_db(conn)?;

    let records: Vec<PoemRecord> = loaded?
        .into_iter()
        .filter(|record| {
            let problems = validate_record(record);
            for problem in &problems {
                warn!("[Setup] Skipping poem: {}", problem);
            }
            problems.is_empty()
        })
        .collect();
    debug!("[Setup] Loaded {} poems", records.len());

    if records.len() < CHOICES_COUNT {
        warn!("[Setup] Only {} usable poems found.", records.len());
        println!(
            "{}",
            format!(
                "Need at least {} poems to start. Import some with `nyuushutsuryokusha import <file>` first!",
                CHOICES_COUNT
            )
            .yellow()
        );
        return Err(QuizError::InsufficientData {
            available: records.len(),
        }
        .into());
    }

    let mut rng = match args.seed {
        Some(seed) => StdRng::seed_from_u64(seed),
        None => StdRng::from_rng(&mut rand::rng()),
    };
    let mut session = QuizSession::new(QuizSettings {
        kind: args.mode,
        question_count: args.question_count,
        time_limit: args.time_limit.map(Duration::from_secs),
    });
    // INIT DONE

    println!(
        "{}",
        format!(
            "==========> {} ({} questions) <==========",
            args.mode.label(),
            args.question_count
        )
        .cyan()
    );

    let outcome = cli::cli_loop(&records, &mut session, &mut rng);
    cli::print_summary(&session);
    outcome
}
