use colored::Colorize;
use env_logger::Env;
use log::{error, info, warn};
use std::collections::HashSet;
use std::fs::File;
use std::io::{self, BufReader, BufWriter};
use std::path::{Path, PathBuf};

use clap::{Parser, Subcommand};
use rusqlite::Connection;
use thiserror::Error;
mod libkaruta;
use crate::libkaruta::db::{self, PoemRecord};
use crate::libkaruta::uta::{validate_record, validate_records, Problem};

#[derive(Parser, Debug)]
#[command(name = "入出力者 (Nyūshutsuryokusha)")]
#[command(version, about, long_about = None)]
struct Args {
    #[command(subcommand)]
    command: Commands,

    #[arg(short, long, default_value = "info")]
    log_level: String,
    /// Delete the database before importing.
    #[arg(short, long, default_value = "false")]
    refresh_db: bool,
    #[arg(short, long, value_name = "FILE", default_value = "hyakunin_isshu.db")]
    db: PathBuf,
}

#[derive(Subcommand, Debug)]
enum Commands {
    /// Load poems from a JSON file into the database.
    Import { json: PathBuf },
    /// Write every poem in the database to a JSON file.
    Export { json: PathBuf },
    /// Show poems, optionally filtered by author or keyword.
    List {
        #[arg(short, long)]
        author: Option<String>,
        keyword: Option<String>,
    },
    /// Delete one poem by number.
    Remove { id: i32 },
}

#[derive(Debug, Error)]
enum Error {
    #[error("cannot access file: {0}")]
    Io(#[from] io::Error),
    #[error("malformed JSON: {0}")]
    Json(#[from] serde_json::Error),
    #[error("database error: {0}")]
    Db(#[from] rusqlite::Error),
}

#[derive(Debug, Default, PartialEq)]
struct ImportReport {
    added: usize,
    existing: usize,
    rejected: usize,
}

fn main() {
    let args = Args::parse();
    env_logger::Builder::from_env(Env::default().default_filter_or(&args.log_level)).init();

    if args.refresh_db && args.db.exists() {
        info!("{}", format!("Removing {:?}", args.db).cyan());
        if let Err(e) = std::fs::remove_file(&args.db) {
            error!("{}{}", "Unable to remove Database: ".red(), e);
            std::process::exit(1);
        }
    }

    let conn = match db::create_or_open(&args.db) {
        Ok(d) => d,
        Err(e) => {
            error!("{}{}", "Unable to open Database: ".red(), e);
            std::process::exit(1);
        }
    };

    let result = match &args.command {
        Commands::Import { json } => {
            info!(
                "{}",
                format!("Importing {:?} into {:?}", json, args.db).cyan()
            );
            read_poems(json).and_then(|poems| import_poems(&conn, &poems).map(|_| ()))
        }
        Commands::Export { json } => {
            info!(
                "{}",
                format!("Exporting {:?} to {:?}", args.db, json).cyan()
            );
            export_poems(&conn, json).map(|count| {
                info!("{}", format!("Wrote {} poems.", count).green());
            })
        }
        Commands::List { author, keyword } => {
            list_poems(&conn, author.as_deref(), keyword.as_deref()).map(|poems| {
                for poem in &poems {
                    println!(
                        "{} {} / {} {}",
                        format!("{:>3}.", poem.id).cyan(),
                        poem.upper,
                        poem.lower,
                        format!("({})", poem.author).dimmed()
                    );
                }
                info!("{}", format!("{} poems.", poems.len()).green());
            })
        }
        Commands::Remove { id } => remove_poem(&conn, *id).map(|removed| {
            if removed {
                info!("{}", format!("Removed poem {}.", id).green());
            } else {
                warn!("{}", format!("No poem {} in the database.", id).yellow());
            }
        }),
    };

    let closed = db::close_db(conn);
    if let Err(e) = result {
        error!("{}", e.to_string().red());
        std::process::exit(1);
    }
    if let Err(e) = closed {
        error!("{}{}", "Unable to close Database: ".red(), e);
        std::process::exit(1);
    }
}

fn read_poems(path: &Path) -> Result<Vec<PoemRecord>, Error> {
    let reader = BufReader::new(File::open(path)?);
    Ok(serde_json::from_reader(reader)?)
}

fn import_poems(conn: &Connection, poems: &[PoemRecord]) -> Result<ImportReport, Error> {
    info!("{}", format!("Importing data... ({} Poems)", poems.len()).blue());

    for problem in validate_records(poems).iter().filter(|p| !p.is_fatal()) {
        warn!("{}", format!("⚠ {}", problem).yellow());
    }

    let mut report = ImportReport::default();
    let mut seen = HashSet::with_capacity(poems.len());
    for poem in poems {
        let mut problems = validate_record(poem);
        if !seen.insert(poem.id) {
            problems.push(Problem::DuplicateId(poem.id));
        }
        if !problems.is_empty() {
            let reasons: Vec<String> = problems.iter().map(Problem::to_string).collect();
            error!(
                "{}",
                format!("├ ✘ Poem {}: {}", poem.id, reasons.join(", "))
                    .red()
                    .strikethrough()
            );
            report.rejected += 1;
            continue;
        }

        if PoemRecord::exists(conn, poem.id)? {
            info!("{}", format!("├ Poem {} already present", poem.id).blue());
            report.existing += 1;
            continue;
        }

        PoemRecord::add(conn, poem)?;
        info!(
            "{}",
            format!("├ Poem {}: {} / {}", poem.id, poem.author, poem.upper).green()
        );
        report.added += 1;
    }

    info!(
        "{}",
        format!(
            "└ Added {}, already present {}, rejected {}",
            report.added, report.existing, report.rejected
        )
        .blue()
    );
    Ok(report)
}

fn export_poems(conn: &Connection, path: &Path) -> Result<usize, Error> {
    let poems = PoemRecord::get_all(conn)?;
    let writer = BufWriter::new(File::create(path)?);
    serde_json::to_writer_pretty(writer, &poems)?;
    Ok(poems.len())
}

fn list_poems(
    conn: &Connection,
    author: Option<&str>,
    keyword: Option<&str>,
) -> Result<Vec<PoemRecord>, Error> {
    let mut poems = match author {
        Some(author) => PoemRecord::get_by_author(conn, author)?,
        None => PoemRecord::get_all(conn)?,
    };
    if let Some(keyword) = keyword {
        let matching: HashSet<i32> = PoemRecord::search(conn, keyword)?
            .into_iter()
            .map(|p| p.id)
            .collect();
        poems.retain(|p| matching.contains(&p.id));
    }
    Ok(poems)
}

fn remove_poem(conn: &Connection, id: i32) -> Result<bool, Error> {
    if !PoemRecord::exists(conn, id)? {
        return Ok(false);
    }
    PoemRecord::delete(conn, id)?;
    Ok(true)
}
