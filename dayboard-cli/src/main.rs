//! Dayboard: daily fixed-task board CLI.
//!
//! # Usage
//!
//! ```text
//! dayboard init
//! dayboard tasks [--date D] [--json]
//! dayboard state [--date D] [--json]
//! dayboard set <task_id> [--completed] [--reviewed] [--date D]
//! dayboard watch [--date D]
//! dayboard export templates|state [--date D] [--output FILE]
//! dayboard daemon start|stop|status
//! ```

mod commands;

use anyhow::Result;
use clap::{Parser, Subcommand};

use commands::{
    daemon::DaemonCommand, export::ExportCommand, init::InitArgs, set::SetArgs, state::StateArgs,
    tasks::TasksArgs, watch::WatchArgs,
};

// ---------------------------------------------------------------------------
// CLI entry point
// ---------------------------------------------------------------------------

#[derive(Parser, Debug)]
#[command(
    name = "dayboard",
    version,
    about = "Track completion and review of recurring daily tasks",
    long_about = None,
)]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand, Debug)]
enum Commands {
    /// Seed the store with the sample board if it is empty.
    Init(InitArgs),

    /// Show the task templates projected onto a date.
    Tasks(TasksArgs),

    /// Show every task's status on a date, with summary stats.
    State(StateArgs),

    /// Record completion/review flags for one task.
    Set(SetArgs),

    /// Print live status changes pushed by the daemon.
    Watch(WatchArgs),

    /// Export templates or one day's status as CSV.
    Export {
        #[command(subcommand)]
        command: ExportCommand,
    },

    /// Manage the Dayboard background daemon.
    Daemon {
        #[command(subcommand)]
        command: DaemonCommand,
    },
}

// ---------------------------------------------------------------------------
// Main
// ---------------------------------------------------------------------------

fn main() -> Result<()> {
    let cli = Cli::parse();
    match cli.command {
        Commands::Init(args) => args.run(),
        Commands::Tasks(args) => args.run(),
        Commands::State(args) => args.run(),
        Commands::Set(args) => args.run(),
        Commands::Watch(args) => args.run(),
        Commands::Export { command } => commands::export::run(command),
        Commands::Daemon { command } => commands::daemon::run(command),
    }
}
