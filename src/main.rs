use flashcards_review::database::db;
use flashcards_review::error::Result;
use flashcards_review::export::json::export_history_to_path;
use flashcards_review::models::{CardId, DeckId, SystemClock};
use serde::Serialize;
use std::path::PathBuf;
use std::process::ExitCode;
use tracing::{error, info};
use tracing_subscriber::EnvFilter;

const USAGE: &str = "Usage: flashcards [OPTIONS] <COMMAND> [ARGS]";
const DEFAULT_LOG_FILTER: &str = "warn";

#[derive(Debug, PartialEq)]
enum Command {
    AddDeck { name: String },
    AddCard { deck_id: DeckId, front: String, back: String },
    Review { card_id: CardId, quality: i32 },
    Due { deck_id: Option<DeckId>, limit: Option<i64> },
    Stats { deck_id: Option<DeckId> },
    History { card_id: CardId },
    ExportHistory { card_id: CardId, path: PathBuf },
    AdvanceDay,
    Today,
}

#[derive(Debug, PartialEq)]
struct Config {
    db_path: PathBuf,
    user_id: String,
    command: Command,
}

fn print_help() {
    println!("flashcards v{}", env!("CARGO_PKG_VERSION"));
    println!();
    println!("SM-2 spaced repetition review store.");
    println!();
    println!("{USAGE}");
    println!();
    println!("OPTIONS:");
    println!("    -h, --help              Print help information");
    println!("    -V, --version           Print version information");
    println!("    --db <PATH>             Database file (default: db.sqlite3)");
    println!("    --user <ID>             Reviewer id (default: local)");
    println!();
    println!("COMMANDS:");
    println!("    add-deck <NAME>");
    println!("    add-card <DECK_ID> <FRONT> <BACK>");
    println!("    review <CARD_ID> <QUALITY 0-5>");
    println!("    due [--deck <DECK_ID>] [--limit <N>]");
    println!("    stats [--deck <DECK_ID>]");
    println!("    history <CARD_ID>");
    println!("    export-history <CARD_ID> <PATH>");
    println!("    advance-day");
    println!("    today");
    println!();
    println!("ENVIRONMENT:");
    println!("    FLASHCARDS_DB          Database file");
    println!("    FLASHCARDS_USER        Reviewer id");
    println!("    RUST_LOG               Log level filter (e.g., debug, info, warn, error)");
}

fn parse_number<T: std::str::FromStr>(
    name: &str,
    value: Option<&String>,
) -> std::result::Result<T, String> {
    let value = value.ok_or_else(|| format!("missing <{name}>"))?;
    value
        .parse()
        .map_err(|_| format!("invalid <{name}>: '{value}'"))
}

fn required(name: &str, value: Option<&String>) -> std::result::Result<String, String> {
    value.cloned().ok_or_else(|| format!("missing <{name}>"))
}

/// Parses `--deck` / `--limit` flags following a listing command.
fn parse_filters(rest: &[String]) -> std::result::Result<(Option<DeckId>, Option<i64>), String> {
    let mut deck_id = None;
    let mut limit = None;
    let mut i = 0;

    while i < rest.len() {
        match rest[i].as_str() {
            "--deck" => {
                deck_id = Some(parse_number("DECK_ID", rest.get(i + 1))?);
                i += 1;
            }
            "--limit" => {
                limit = Some(parse_number("N", rest.get(i + 1))?);
                i += 1;
            }
            arg => return Err(format!("unknown argument '{arg}'")),
        }
        i += 1;
    }

    Ok((deck_id, limit))
}

fn parse_command(args: &[String]) -> std::result::Result<Command, String> {
    let (name, rest) = args.split_first().ok_or("missing command")?;

    let command = match name.as_str() {
        "add-deck" => Command::AddDeck {
            name: required("NAME", rest.first())?,
        },
        "add-card" => Command::AddCard {
            deck_id: parse_number("DECK_ID", rest.first())?,
            front: required("FRONT", rest.get(1))?,
            back: required("BACK", rest.get(2))?,
        },
        "review" => Command::Review {
            card_id: parse_number("CARD_ID", rest.first())?,
            quality: parse_number("QUALITY", rest.get(1))?,
        },
        "due" => {
            let (deck_id, limit) = parse_filters(rest)?;
            Command::Due { deck_id, limit }
        }
        "stats" => {
            let (deck_id, limit) = parse_filters(rest)?;
            if limit.is_some() {
                return Err("stats does not take --limit".to_string());
            }
            Command::Stats { deck_id }
        }
        "history" => Command::History {
            card_id: parse_number("CARD_ID", rest.first())?,
        },
        "export-history" => Command::ExportHistory {
            card_id: parse_number("CARD_ID", rest.first())?,
            path: PathBuf::from(required("PATH", rest.get(1))?),
        },
        "advance-day" => Command::AdvanceDay,
        "today" => Command::Today,
        other => return Err(format!("unknown command '{other}'")),
    };

    Ok(command)
}

/// Parses command-line arguments (without the program name).
/// Returns `Ok(None)` when help or version output was requested.
fn parse_args(args: &[String]) -> std::result::Result<Option<Config>, String> {
    let mut db_path = std::env::var("FLASHCARDS_DB")
        .map(PathBuf::from)
        .unwrap_or_else(|_| PathBuf::from("db.sqlite3"));
    let mut user_id = std::env::var("FLASHCARDS_USER").unwrap_or_else(|_| "local".to_string());
    let mut i = 0;

    while i < args.len() {
        match args[i].as_str() {
            "--help" | "-h" => {
                print_help();
                return Ok(None);
            }
            "--version" | "-V" => {
                println!("flashcards {}", env!("CARGO_PKG_VERSION"));
                return Ok(None);
            }
            "--db" => {
                db_path = PathBuf::from(required("PATH", args.get(i + 1))?);
                i += 1;
            }
            "--user" => {
                user_id = required("ID", args.get(i + 1))?;
                i += 1;
            }
            _ => break,
        }
        i += 1;
    }

    let command = parse_command(&args[i..])?;
    Ok(Some(Config {
        db_path,
        user_id,
        command,
    }))
}

/// Log filter from `RUST_LOG`, or `warn` when it is unset or unparsable.
fn log_filter(rust_log: Option<&str>) -> EnvFilter {
    rust_log
        .filter(|directives| !directives.trim().is_empty())
        .and_then(|directives| EnvFilter::try_new(directives).ok())
        .unwrap_or_else(|| EnvFilter::new(DEFAULT_LOG_FILTER))
}

fn print_json<T: Serialize + ?Sized>(value: &T) -> Result<()> {
    println!("{}", serde_json::to_string_pretty(value)?);
    Ok(())
}

fn run(config: Config) -> Result<()> {
    let conn = db::init_database(&config.db_path, &SystemClock)?;
    let user = config.user_id.as_str();
    // Scheduling runs against the simulated date so schedules can be walked day by day
    let today = db::get_current_date(&conn)?;

    match config.command {
        Command::AddDeck { name } => {
            let deck_id = db::new_deck(user, &name, &conn)?;
            print_json(&serde_json::json!({ "deckId": deck_id, "name": name }))
        }
        Command::AddCard {
            deck_id,
            front,
            back,
        } => {
            let card_id = db::add_card(deck_id, user, &front, &back, &conn)?;
            print_json(&serde_json::json!({ "cardId": card_id, "deckId": deck_id }))
        }
        Command::Review { card_id, quality } => {
            let event = db::submit_review(card_id, user, quality, today, &conn)?;
            print_json(&event)
        }
        Command::Due { deck_id, limit } => {
            let due = db::get_due_cards(user, deck_id, limit, today, &conn)?;
            print_json(&due)
        }
        Command::Stats { deck_id } => {
            let stats = db::get_stats(user, deck_id, today, &conn)?;
            print_json(&stats)
        }
        Command::History { card_id } => {
            let history = db::get_review_history(card_id, user, &conn)?;
            print_json(&history)
        }
        Command::ExportHistory { card_id, path } => {
            let history = db::get_review_history(card_id, user, &conn)?;
            export_history_to_path(&history, &path)
        }
        Command::AdvanceDay => {
            let date = db::advance_day(&conn)?;
            print_json(&date)
        }
        Command::Today => print_json(&today),
    }
}

fn main() -> ExitCode {
    let args: Vec<String> = std::env::args().skip(1).collect();
    let config = match parse_args(&args) {
        Ok(Some(config)) => config,
        Ok(None) => return ExitCode::SUCCESS,
        Err(message) => {
            eprintln!("error: {message}");
            eprintln!("{USAGE}");
            eprintln!("Try 'flashcards --help' for more information.");
            return ExitCode::FAILURE;
        }
    };

    tracing_subscriber::fmt()
        .with_env_filter(log_filter(std::env::var("RUST_LOG").ok().as_deref()))
        .with_writer(std::io::stderr)
        .with_target(false)
        .init();

    info!(db = %config.db_path.display(), user = %config.user_id, "Starting");

    match run(config) {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            error!("{e}");
            eprintln!("error: {e}");
            ExitCode::FAILURE
        }
    }
}
