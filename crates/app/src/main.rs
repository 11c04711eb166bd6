mod console;
mod walkthrough;

use std::fmt;
use std::sync::Arc;

use lab_core::Clock;
use lab_core::labs::{LabKind, catalog};
use services::AppServices;

use console::ConsoleFeedback;

#[derive(Debug)]
enum ArgsError {
    MissingValue { flag: &'static str },
    MissingLab,
    UnknownArg(String),
    InvalidLab { raw: String, reason: String },
    InvalidDbUrl { raw: String },
}

impl fmt::Display for ArgsError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ArgsError::MissingValue { flag } => write!(f, "{flag} requires a value"),
            ArgsError::MissingLab => write!(f, "run requires a lab id"),
            ArgsError::UnknownArg(arg) => write!(f, "unknown argument: {arg}"),
            ArgsError::InvalidLab { raw, reason } => write!(f, "invalid lab {raw}: {reason}"),
            ArgsError::InvalidDbUrl { raw } => write!(f, "invalid --db value: {raw}"),
        }
    }
}

impl std::error::Error for ArgsError {}

fn require_value(
    args: &mut impl Iterator<Item = String>,
    flag: &'static str,
) -> Result<String, ArgsError> {
    args.next().ok_or(ArgsError::MissingValue { flag })
}

fn print_usage() {
    eprintln!("Usage:");
    eprintln!("  cargo run -p app -- list     [--db <sqlite_url>]");
    eprintln!("  cargo run -p app -- run <lab-id> [--db <sqlite_url>]");
    eprintln!("  cargo run -p app -- progress [--db <sqlite_url>] [--json]");
    eprintln!();
    eprintln!("Defaults:");
    eprintln!("  --db sqlite://labs.sqlite3");
    eprintln!();
    eprintln!("Environment:");
    eprintln!("  LABS_DB_URL, RUST_LOG");
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Command {
    List,
    Run,
    Progress,
}

impl Command {
    fn from_arg(arg: &str) -> Option<Self> {
        match arg {
            "list" => Some(Self::List),
            "run" => Some(Self::Run),
            "progress" => Some(Self::Progress),
            _ => None,
        }
    }
}

struct Args {
    db_url: String,
    lab: Option<LabKind>,
    json: bool,
}

impl Args {
    fn parse(cmd: Command, args: &mut impl Iterator<Item = String>) -> Result<Self, ArgsError> {
        let mut db_url = std::env::var("LABS_DB_URL")
            .ok()
            .map_or_else(|| "sqlite://labs.sqlite3".into(), normalize_sqlite_url);
        let mut lab = None;
        let mut json = false;

        while let Some(arg) = args.next() {
            match arg.as_str() {
                "--db" => {
                    let value = require_value(args, "--db")?;
                    if value.trim().is_empty() {
                        return Err(ArgsError::InvalidDbUrl { raw: value });
                    }
                    db_url = normalize_sqlite_url(value);
                }
                "--json" if cmd == Command::Progress => json = true,
                "--help" | "-h" => {
                    print_usage();
                    std::process::exit(0);
                }
                raw if cmd == Command::Run && lab.is_none() && !raw.starts_with("--") => {
                    let kind = LabKind::find(raw).map_err(|err| ArgsError::InvalidLab {
                        raw: raw.to_string(),
                        reason: err.to_string(),
                    })?;
                    lab = Some(kind);
                }
                _ => return Err(ArgsError::UnknownArg(arg)),
            }
        }

        if cmd == Command::Run && lab.is_none() {
            return Err(ArgsError::MissingLab);
        }
        Ok(Self { db_url, lab, json })
    }
}

fn normalize_sqlite_url(raw: String) -> String {
    if raw == "sqlite::memory:" || raw.starts_with("sqlite://") {
        return raw;
    }

    let trimmed = raw.trim();
    let path_str = trimmed.strip_prefix("sqlite:").unwrap_or(trimmed);
    let path = std::path::Path::new(path_str);
    let absolute = if path.is_absolute() {
        path.to_path_buf()
    } else {
        std::env::current_dir()
            .unwrap_or_else(|_| std::path::PathBuf::from("."))
            .join(path)
    };
    format!("sqlite://{}", absolute.display())
}

fn prepare_sqlite_file(db_url: &str) -> Result<(), Box<dyn std::error::Error>> {
    if db_url == "sqlite::memory:" {
        return Ok(());
    }

    let path = db_url
        .strip_prefix("sqlite://")
        .ok_or_else(|| ArgsError::InvalidDbUrl {
            raw: db_url.to_string(),
        })?;
    let path = path.split('?').next().unwrap_or(path);
    if path.is_empty() {
        return Err(ArgsError::InvalidDbUrl {
            raw: db_url.to_string(),
        }
        .into());
    }

    let path = std::path::Path::new(path);
    if let Some(parent) = path.parent() {
        std::fs::create_dir_all(parent)?;
    }

    if !path.exists() {
        std::fs::OpenOptions::new()
            .create(true)
            .write(true)
            .truncate(false)
            .open(path)?;
    }

    Ok(())
}

fn init_tracing() {
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("warn")),
        )
        .with_writer(std::io::stderr)
        .init();
}

async fn run() -> Result<(), Box<dyn std::error::Error>> {
    let mut argv = std::env::args().skip(1);

    let cmd = match argv.next() {
        None => {
            print_usage();
            return Ok(());
        }
        Some(first) if first == "--help" || first == "-h" => {
            print_usage();
            return Ok(());
        }
        Some(first) => Command::from_arg(&first).ok_or_else(|| {
            eprintln!("unknown subcommand: {first}");
            print_usage();
            std::io::Error::new(std::io::ErrorKind::InvalidInput, "unknown subcommand")
        })?,
    };

    let parsed = Args::parse(cmd, &mut argv).map_err(|e| {
        eprintln!("{e}");
        print_usage();
        e
    })?;

    // Open + migrate SQLite here so the service crates never touch the filesystem.
    prepare_sqlite_file(&parsed.db_url)?;
    let clock = Clock::default_clock();
    let services =
        AppServices::new_sqlite(&parsed.db_url, clock, Arc::new(ConsoleFeedback::default()))
            .await?;

    match cmd {
        Command::List => {
            let overview = services.progress().overview().await?;
            for definition in catalog::definitions() {
                let mark = if overview.is_completed(&definition.id) {
                    "x"
                } else {
                    " "
                };
                println!(
                    "[{mark}] {:<26} {:<10} {}",
                    definition.id.as_str(),
                    definition.subject.as_str(),
                    definition.title
                );
            }
            Ok(())
        }
        Command::Run => {
            let Some(kind) = parsed.lab else {
                return Err(ArgsError::MissingLab.into());
            };
            // Timers run on a simulated clock so the walkthrough finishes instantly.
            let start = Clock::fixed(clock.now());
            let report = walkthrough::run(kind, &services.lab_loop(), start).await?;
            println!();
            println!(
                "{} ({}) finished at step {}",
                report.title, report.lab_id, report.final_step
            );
            println!("quiz attempts: {}", report.quiz_attempts);
            match report.receipt {
                Some(receipt) if receipt.newly_completed => println!(
                    "completed with score {} (+{} XP)",
                    receipt.record.score(),
                    receipt.xp_awarded
                ),
                Some(receipt) => println!(
                    "already completed on {}; no XP awarded",
                    receipt.record.completed_at().format("%Y-%m-%d")
                ),
                None => println!("completion was not recorded"),
            }
            Ok(())
        }
        Command::Progress => {
            let overview = services.progress().overview().await?;
            if parsed.json {
                println!("{}", serde_json::to_string_pretty(&overview)?);
                return Ok(());
            }
            println!(
                "{} of {} labs complete, {} XP",
                overview.completed_labs,
                LabKind::ALL.len(),
                overview.total_xp
            );
            for record in &overview.completions {
                println!(
                    "  {:<26} score {:>3}  xp {:>3}  {}s  {}",
                    record.lab_id().as_str(),
                    record.score(),
                    record.xp_earned(),
                    record.time_spent_secs(),
                    record.completed_at().format("%Y-%m-%d %H:%M")
                );
            }
            Ok(())
        }
    }
}

#[tokio::main]
async fn main() {
    init_tracing();
    if let Err(err) = run().await {
        eprintln!("{err}");
        std::process::exit(2);
    }
}
