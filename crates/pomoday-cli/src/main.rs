use clap::{Parser, Subcommand};
use tracing_subscriber::EnvFilter;

mod commands;

#[derive(Parser)]
#[command(name = "pomoday", version, about = "Perpetual day schedule for focus intervals")]
struct Cli {
    /// Run on the accelerated clock in the separate test namespace
    #[arg(long, global = true, env = "POMODAY_TEST_MODE")]
    test_mode: bool,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// One-line summary of the current interval and score
    Status {
        #[arg(long)]
        json: bool,
    },
    /// Every interval of the day with its intention and outcome
    List {
        #[arg(long)]
        json: bool,
    },
    /// Set the intention for a focus interval
    Intend {
        /// Interval number (defaults to the current one)
        #[arg(long)]
        id: Option<u32>,
        /// What you plan to do
        description: String,
        /// Estimated pomodoros
        #[arg(long)]
        estimate: Option<u32>,
    },
    /// Record the verdict for an ended focus interval
    Evaluate {
        id: u32,
        #[arg(value_enum)]
        outcome: commands::day::Verdict,
    },
    /// Change an earlier verdict
    Revise {
        id: u32,
        #[arg(value_enum)]
        outcome: commands::day::Verdict,
    },
    /// Mark a running focus interval as distracted
    Abandon {
        /// Interval number (defaults to the current one)
        id: Option<u32>,
    },
    /// Move an interval's start and end (HH:MM); later intervals follow
    Edit {
        id: u32,
        start: String,
        end: String,
    },
    /// Append a bonus focus/break pair after the last interval
    Bonus,
    /// Remove an interval that has not started
    Remove { id: u32 },
    /// Scores of archived days
    History {
        #[arg(long)]
        json: bool,
    },
    /// Keep running and print interval changes as they happen
    Watch {
        #[arg(long)]
        json: bool,
    },
    /// Configuration management
    Config {
        #[command(subcommand)]
        action: commands::config::ConfigAction,
    },
}

fn init_tracing() {
    let filter = EnvFilter::try_from_env("POMODAY_LOG").unwrap_or_else(|_| EnvFilter::new("warn"));
    let _ = tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .try_init();
}

fn main() {
    init_tracing();
    let cli = Cli::parse();
    let test_mode = cli.test_mode;
    let result = match cli.command {
        Commands::Status { json } => commands::day::status(test_mode, json),
        Commands::List { json } => commands::day::list(test_mode, json),
        Commands::Intend {
            id,
            description,
            estimate,
        } => commands::day::intend(test_mode, id, &description, estimate),
        Commands::Evaluate { id, outcome } => commands::day::evaluate(test_mode, id, outcome),
        Commands::Revise { id, outcome } => commands::day::revise(test_mode, id, outcome),
        Commands::Abandon { id } => commands::day::abandon(test_mode, id),
        Commands::Edit { id, start, end } => commands::day::edit(test_mode, id, &start, &end),
        Commands::Bonus => commands::day::bonus(test_mode),
        Commands::Remove { id } => commands::day::remove(test_mode, id),
        Commands::History { json } => commands::day::history(test_mode, json),
        Commands::Watch { json } => commands::watch::run(test_mode, json),
        Commands::Config { action } => commands::config::run(action),
    };

    if let Err(e) = result {
        eprintln!("error: {e}");
        std::process::exit(1);
    }
}
