//! CLI command definitions and dispatch for the `foundry` binary.
//!
//! Uses clap derive macros for argument parsing. Resource commands follow a
//! noun-verb pattern (e.g., `foundry workers list`, `foundry providers test`).

pub mod build;
pub mod capabilities;
pub mod providers;
pub mod status;
pub mod worker_run;
pub mod workers;

use clap::{Parser, Subcommand};
use clap_complete::Shell;

/// Turn plain-language instructions into running workers.
#[derive(Parser)]
#[command(name = "foundry", version, about, long_about = None)]
#[command(propagate_version = true)]
pub struct Cli {
    /// Output machine-readable JSON instead of styled text.
    #[arg(long, global = true)]
    pub json: bool,

    /// Suppress all output except errors.
    #[arg(long, global = true)]
    pub quiet: bool,

    /// Detailed output (-v for debug, -vv for trace).
    #[arg(short, long, action = clap::ArgAction::Count, global = true)]
    pub verbose: u8,

    /// Export spans through OpenTelemetry (stdout exporter).
    #[arg(
        long,
        global = true,
        env = "FOUNDRY_OTEL",
        action = clap::ArgAction::SetTrue,
        value_parser = clap::builder::FalseyValueParser::new()
    )]
    pub otel: bool,

    #[command(subcommand)]
    pub command: Commands,
}

#[derive(Subcommand)]
pub enum Commands {
    /// Plan, synthesize and materialize a worker from an instruction.
    Build {
        /// What the worker should do. Prompted for when omitted.
        instruction: Option<String>,

        /// Launch the worker without asking.
        #[arg(short, long, conflicts_with = "no_launch")]
        yes: bool,

        /// Leave the worker ready without launching it.
        #[arg(long)]
        no_launch: bool,
    },

    /// Inspect workers.
    Workers {
        #[command(subcommand)]
        action: workers::WorkersCommand,
    },

    /// Show recent runs of a worker.
    Runs {
        /// Worker id (e.g. worker_001).
        id: String,

        /// Maximum number of runs to show.
        #[arg(short, long, default_value = "10")]
        limit: u32,
    },

    /// Launch a ready worker as a detached process.
    Launch {
        /// Worker id (e.g. worker_001).
        id: String,
    },

    /// Inspect the capability registry.
    #[command(alias = "caps")]
    Capabilities {
        #[command(subcommand)]
        action: capabilities::CapabilitiesCommand,
    },

    /// Inspect and test text-generation providers.
    Providers {
        #[command(subcommand)]
        action: providers::ProvidersCommand,
    },

    /// System status dashboard.
    Status,

    /// Generate shell completions.
    Completions {
        /// Shell to generate completions for.
        shell: Shell,
    },

    /// Entry point executed by generated worker programs.
    #[command(hide = true)]
    Worker {
        #[command(subcommand)]
        action: worker_run::WorkerCommand,
    },
}

#[cfg(test)]
mod tests {
    use super::*;
    use clap::CommandFactory;

    #[test]
    fn test_cli_definition_is_valid() {
        Cli::command().debug_assert();
    }

    #[test]
    fn test_parses_build_flags() {
        let cli = Cli::try_parse_from(["foundry", "build", "watch the news", "--yes", "--json"]).unwrap();
        assert!(cli.json);
        match cli.command {
            Commands::Build {
                instruction,
                yes,
                no_launch,
            } => {
                assert_eq!(instruction.as_deref(), Some("watch the news"));
                assert!(yes);
                assert!(!no_launch);
            }
            _ => panic!("expected build"),
        }
    }

    #[test]
    fn test_yes_conflicts_with_no_launch() {
        assert!(Cli::try_parse_from(["foundry", "build", "x", "--yes", "--no-launch"]).is_err());
    }

    #[test]
    fn test_parses_hidden_worker_run() {
        let cli = Cli::try_parse_from([
            "foundry",
            "worker",
            "run",
            "worker_007",
            "--role",
            "You summarize news.",
            "--goal",
            "Summarize tech news",
            "--interval-hours",
            "24",
            "--capabilities",
            "web_search,rss_reader",
        ])
        .unwrap();
        match cli.command {
            Commands::Worker {
                action: worker_run::WorkerCommand::Run(args),
            } => {
                assert_eq!(args.id, "worker_007");
                assert_eq!(args.interval_hours, 24);
                assert_eq!(args.capability_names(), vec!["web_search", "rss_reader"]);
            }
            _ => panic!("expected worker run"),
        }
    }
}
