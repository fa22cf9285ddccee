//! Hidden `worker run` entry point exec'd by generated worker programs.
//!
//! Owns the run/record/reschedule loop for one worker until the interval
//! schedule ends or the process receives Ctrl+C / SIGTERM.

use anyhow::{Result, bail};
use clap::{Args, Subcommand};
use tokio_util::sync::CancellationToken;

use foundry_core::runtime::{WorkerRuntime, WorkerSpec};
use foundry_infra::capability::LocalCapabilityInvoker;
use foundry_types::worker::{WorkerId, WorkerStatus};

use crate::state::AppState;

#[derive(Subcommand)]
pub enum WorkerCommand {
    /// Run a worker in the foreground.
    Run(WorkerRunArgs),
}

#[derive(Args, Debug)]
pub struct WorkerRunArgs {
    /// Worker id (e.g. worker_001).
    pub id: String,

    /// Role text used as the system prompt.
    #[arg(long)]
    pub role: String,

    /// Goal executed on every run.
    #[arg(long)]
    pub goal: String,

    /// Hours between runs; 0 runs once.
    #[arg(long, default_value = "0")]
    pub interval_hours: u32,

    /// Comma-separated capability names.
    #[arg(long, default_value = "")]
    pub capabilities: String,
}

impl WorkerRunArgs {
    pub fn capability_names(&self) -> Vec<String> {
        self.capabilities
            .split(',')
            .map(str::trim)
            .filter(|name| !name.is_empty())
            .map(str::to_string)
            .collect()
    }
}

pub async fn run(state: &AppState, args: WorkerRunArgs) -> Result<()> {
    let id: WorkerId = args.id.parse().map_err(anyhow::Error::msg)?;
    let names = args.capability_names();

    let runtime = WorkerRuntime::new(
        state.gateway.clone(),
        state.workers.clone(),
        state.runs.clone(),
        LocalCapabilityInvoker::from_env(&state.config.sandbox, &state.config.email),
        state.config.worker.max_steps,
    );

    let spec = WorkerSpec::bind(
        id.clone(),
        args.role,
        args.goal,
        args.interval_hours,
        &names,
        &state.registry,
    )
    .await;

    if !names.is_empty() && spec.capabilities.is_empty() {
        runtime.finish(&id, WorkerStatus::Failed).await;
        bail!("none of the capabilities bound to {id} are available: {}", names.join(", "));
    }

    let shutdown = CancellationToken::new();
    let signal_token = shutdown.clone();
    tokio::spawn(async move {
        shutdown_signal().await;
        signal_token.cancel();
    });

    tracing::info!(
        worker_id = %id,
        interval_hours = spec.interval_hours,
        capabilities = spec.capabilities.len(),
        "Worker starting"
    );
    let status = runtime.run(&spec, shutdown).await;
    tracing::info!(worker_id = %id, %status, "Worker exited");
    Ok(())
}

/// Wait for Ctrl+C or SIGTERM.
async fn shutdown_signal() {
    let ctrl_c = async {
        if let Err(e) = tokio::signal::ctrl_c().await {
            tracing::warn!(error = %e, "Failed to install Ctrl+C handler");
            std::future::pending::<()>().await;
        }
    };

    #[cfg(unix)]
    let terminate = async {
        match tokio::signal::unix::signal(tokio::signal::unix::SignalKind::terminate()) {
            Ok(mut signal) => {
                signal.recv().await;
            }
            Err(e) => {
                tracing::warn!(error = %e, "Failed to install SIGTERM handler");
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => {},
        _ = terminate => {},
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn args(capabilities: &str) -> WorkerRunArgs {
        WorkerRunArgs {
            id: "worker_001".to_string(),
            role: "role".to_string(),
            goal: "goal".to_string(),
            interval_hours: 0,
            capabilities: capabilities.to_string(),
        }
    }

    #[test]
    fn test_capability_names_skip_blanks() {
        assert_eq!(
            args(" web_search , ,rss_reader,").capability_names(),
            vec!["web_search", "rss_reader"]
        );
        assert!(args("").capability_names().is_empty());
    }
}
