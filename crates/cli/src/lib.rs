pub mod commands;

use clap::{Parser, Subcommand};
use std::process::ExitCode;

#[derive(Debug, Parser)]
#[command(
    name = "parkbot",
    about = "Parkbot operator CLI",
    long_about = "Operate the booking-intake bot: migrations, readiness checks, config inspection, and store maintenance.",
    after_help = "Examples:\n  parkbot doctor --json\n  parkbot config\n  parkbot merge-clients"
)]
pub struct Cli {
    #[command(subcommand)]
    command: Command,
}

#[derive(Debug, Subcommand)]
enum Command {
    #[command(about = "Apply pending database migrations and return structured status output")]
    Migrate,
    #[command(
        about = "Inspect effective configuration values with source attribution and redaction"
    )]
    Config,
    #[command(about = "Validate config, channel token readiness, and DB connectivity checks")]
    Doctor {
        #[arg(long, help = "Emit machine-readable JSON output")]
        json: bool,
    },
    #[command(about = "Reset one conversation back to the neutral dialogue mode")]
    ResetSession {
        #[arg(help = "Channel key, e.g. tg_42 or vk_777")]
        channel_key: String,
    },
    #[command(about = "Rebuild per-client lead counters from the leads table")]
    RecountLeads,
    #[command(about = "Merge client records that share a phone number")]
    MergeClients,
}

pub fn run() -> ExitCode {
    let cli = Cli::parse();

    let result = match cli.command {
        Command::Migrate => commands::migrate::run(),
        Command::Config => {
            commands::CommandResult { exit_code: 0, output: commands::config::run() }
        }
        Command::Doctor { json } => {
            commands::CommandResult { exit_code: 0, output: commands::doctor::run(json) }
        }
        Command::ResetSession { channel_key } => commands::reset_session::run(&channel_key),
        Command::RecountLeads => commands::recount_leads::run(),
        Command::MergeClients => commands::merge_clients::run(),
    };

    println!("{}", result.output);
    ExitCode::from(result.exit_code)
}
