//! System status dashboard command.

use anyhow::Result;
use console::style;

use foundry_core::repository::trace::TraceRepository;
use foundry_core::repository::worker::WorkerRepository;
use foundry_types::capability::{CapabilityOrigin, CapabilityStatus};
use foundry_types::worker::WorkerStatus;

use crate::state::AppState;

/// Display system status dashboard.
///
/// Shows worker counts by status, capability counts, provider load state,
/// recent generation calls, and data directory info.
pub async fn status(state: &AppState, json: bool) -> Result<()> {
    let workers = state.workers.list().await?;
    let count = |status: WorkerStatus| workers.iter().filter(|w| w.status == status).count();
    let total_runs: i64 = workers.iter().map(|w| w.run_count).sum();

    let capabilities = state.registry.all_records().await;
    let builtin = capabilities
        .iter()
        .filter(|c| c.origin == CapabilityOrigin::BuiltIn)
        .count();
    let synthesized_active = capabilities
        .iter()
        .filter(|c| c.origin == CapabilityOrigin::Synthesized && c.status == CapabilityStatus::Active)
        .count();
    let synthesized_inactive = capabilities
        .iter()
        .filter(|c| c.origin == CapabilityOrigin::Synthesized && c.status == CapabilityStatus::Inactive)
        .count();

    let loaded_providers = state.gateway.provider_names();
    let recent_calls = state
        .trace
        .recent_generation_calls(20)
        .await
        .unwrap_or_default();
    let recent_failures = recent_calls.iter().filter(|c| !c.success).count();

    if json {
        let status = serde_json::json!({
            "version": env!("CARGO_PKG_VERSION"),
            "data_dir": state.data_dir.display().to_string(),
            "database": state.db_path().display().to_string(),
            "workers": {
                "total": workers.len(),
                "starting": count(WorkerStatus::Starting),
                "ready": count(WorkerStatus::Ready),
                "running": count(WorkerStatus::Running),
                "stopped": count(WorkerStatus::Stopped),
                "failed": count(WorkerStatus::Failed),
                "total_runs": total_runs,
            },
            "capabilities": {
                "built_in": builtin,
                "synthesized_active": synthesized_active,
                "synthesized_inactive": synthesized_inactive,
            },
            "providers": loaded_providers,
            "recent_generation_calls": {
                "total": recent_calls.len(),
                "failed": recent_failures,
            },
        });
        println!("{}", serde_json::to_string_pretty(&status)?);
        return Ok(());
    }

    println!();
    println!(
        "  {} Foundry v{}",
        style("⚒").bold(),
        env!("CARGO_PKG_VERSION")
    );
    println!();

    // Worker counts
    println!("  {}", style("── Workers ──").dim());
    println!("  Total:    {}", style(workers.len()).bold());
    println!("  Running:  {}", style(count(WorkerStatus::Running)).green());
    let ready = count(WorkerStatus::Ready);
    if ready > 0 {
        println!("  Ready:    {}", style(ready).blue());
    }
    let starting = count(WorkerStatus::Starting);
    if starting > 0 {
        println!("  Starting: {}", style(starting).yellow());
    }
    let stopped = count(WorkerStatus::Stopped);
    if stopped > 0 {
        println!("  Stopped:  {}", style(stopped).dim());
    }
    let failed = count(WorkerStatus::Failed);
    if failed > 0 {
        println!("  Failed:   {}", style(failed).red());
    }
    println!("  Runs:     {total_runs}");
    println!();

    println!("  {}", style("── Capabilities ──").dim());
    println!("  Built-in:    {builtin}");
    println!("  Synthesized: {}", style(synthesized_active).green());
    if synthesized_inactive > 0 {
        println!("  Inactive:    {}", style(synthesized_inactive).red());
    }
    println!();

    println!("  {}", style("── Providers ──").dim());
    if loaded_providers.is_empty() {
        println!("  {}", style("none loaded").red());
    } else {
        println!("  Loaded: {}", loaded_providers.join(", "));
    }
    if !recent_calls.is_empty() {
        println!(
            "  Recent calls: {} ({} failed)",
            recent_calls.len(),
            recent_failures
        );
    }
    println!();

    // System
    println!("  {}", style("── System ──").dim());
    println!("  Data dir: {}", style(state.data_dir.display()).dim());
    println!("  Database: {}", style(state.db_path().display()).dim());
    if state.registry.is_degraded() {
        println!("  {}", style("Capability store unavailable").yellow());
    }
    println!();

    Ok(())
}
