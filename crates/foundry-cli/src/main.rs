//! Foundry CLI entry point.
//!
//! Binary name: `foundry`
//!
//! Parses CLI arguments, initializes tracing, the database and the pipeline
//! components, then dispatches to the command handler. Generated worker
//! programs re-enter through the hidden `worker run` command.

mod cli;
mod state;

use clap::Parser;
use clap_complete::generate;

use cli::{Cli, Commands};
use state::AppState;

/// Default log directive for a verbosity level.
fn log_directive(verbose: u8, quiet: bool) -> &'static str {
    match verbose {
        0 if quiet => "error",
        0 => "foundry=info",
        1 => "foundry=debug",
        _ => "trace",
    }
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();

    if let Err(e) = foundry_observe::init_tracing(log_directive(cli.verbose, cli.quiet), cli.otel) {
        eprintln!("Warning: tracing setup failed: {e}");
    }

    let result = run(cli).await;
    foundry_observe::shutdown_tracing();
    result
}

async fn run(cli: Cli) -> anyhow::Result<()> {
    // Shell completions don't need app state
    if let Commands::Completions { shell } = &cli.command {
        let mut cmd = <Cli as clap::CommandFactory>::command();
        generate(*shell, &mut cmd, "foundry", &mut std::io::stdout());
        return Ok(());
    }

    let state = AppState::init().await?;

    match cli.command {
        Commands::Build {
            instruction,
            yes,
            no_launch,
        } => {
            cli::build::build(&state, instruction, yes, no_launch, cli.json, cli.quiet).await?;
        }

        Commands::Workers { action } => {
            cli::workers::handle(&state, action, cli.json).await?;
        }

        Commands::Runs { id, limit } => {
            cli::workers::list_runs(&state, &id, limit, cli.json).await?;
        }

        Commands::Launch { id } => {
            cli::workers::launch(&state, &id, cli.json, cli.quiet).await?;
        }

        Commands::Capabilities { action } => {
            cli::capabilities::handle(&state, action, cli.json).await?;
        }

        Commands::Providers { action } => {
            cli::providers::handle(&state, action, cli.json).await?;
        }

        Commands::Status => {
            cli::status::status(&state, cli.json).await?;
        }

        Commands::Worker { action } => match action {
            cli::worker_run::WorkerCommand::Run(args) => {
                cli::worker_run::run(&state, args).await?;
            }
        },

        Commands::Completions { .. } => {}
    }

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_verbosity_maps_to_directives() {
        assert_eq!(log_directive(0, true), "error");
        assert_eq!(log_directive(0, false), "foundry=info");
        assert_eq!(log_directive(1, false), "foundry=debug");
        assert_eq!(log_directive(3, false), "trace");
    }
}
