//! Worker inspection commands: list, show, runs, launch.

use anyhow::{Context, Result};
use clap::Subcommand;
use comfy_table::{Cell, Color, ContentArrangement, Table, presets};
use console::style;

use foundry_core::repository::worker::{RunRepository, WorkerRepository};
use foundry_types::worker::{RunOutcome, Worker, WorkerId, WorkerStatus};

use super::build::describe_interval;
use crate::state::AppState;

/// Longest goal shown in the worker table.
const GOAL_COLUMN_LIMIT: usize = 45;

#[derive(Subcommand)]
pub enum WorkersCommand {
    /// List all workers.
    #[command(alias = "ls")]
    List,

    /// Show details of a worker.
    Show {
        /// Worker id (e.g. worker_001).
        id: String,
    },
}

pub async fn handle(state: &AppState, action: WorkersCommand, json: bool) -> Result<()> {
    match action {
        WorkersCommand::List => list_workers(state, json).await,
        WorkersCommand::Show { id } => show_worker(state, &id, json).await,
    }
}

fn parse_id(id: &str) -> Result<WorkerId> {
    id.parse().map_err(anyhow::Error::msg)
}

async fn load_worker(state: &AppState, id: &WorkerId) -> Result<Worker> {
    state
        .workers
        .get(id)
        .await?
        .with_context(|| format!("worker '{id}' not found"))
}

pub async fn list_workers(state: &AppState, json: bool) -> Result<()> {
    let workers = state.workers.list().await?;

    if json {
        println!("{}", serde_json::to_string_pretty(&workers)?);
        return Ok(());
    }

    if workers.is_empty() {
        println!();
        println!(
            "  No workers yet. Build one with {}",
            style("foundry build \"...\"").cyan()
        );
        println!();
        return Ok(());
    }

    let mut table = Table::new();
    table.load_preset(presets::UTF8_FULL_CONDENSED);
    table.set_content_arrangement(ContentArrangement::Dynamic);

    table.set_header(vec![
        Cell::new("ID").fg(Color::White),
        Cell::new("Status").fg(Color::White),
        Cell::new("Runs").fg(Color::White),
        Cell::new("Last Run").fg(Color::White),
        Cell::new("Goal").fg(Color::White),
    ]);

    for worker in &workers {
        let last_run = worker
            .last_run_at
            .map(|t| t.format("%Y-%m-%d %H:%M").to_string())
            .unwrap_or_else(|| "never".to_string());

        table.add_row(vec![
            Cell::new(&worker.id).fg(Color::Cyan),
            status_cell(worker.status),
            Cell::new(worker.run_count),
            Cell::new(last_run).fg(Color::DarkGrey),
            Cell::new(truncate(&worker.goal, GOAL_COLUMN_LIMIT)),
        ]);
    }

    println!("{table}");
    Ok(())
}

pub async fn show_worker(state: &AppState, id: &str, json: bool) -> Result<()> {
    let id = parse_id(id)?;
    let worker = load_worker(state, &id).await?;

    if json {
        println!("{}", serde_json::to_string_pretty(&worker)?);
        return Ok(());
    }

    println!();
    println!("  {} {}", style("Worker").bold(), style(&worker.id).cyan().bold());
    println!();
    println!("  Status:       {}", worker.status);
    println!("  Goal:         {}", worker.goal);
    println!("  Schedule:     {}", describe_interval(worker.schedule_interval));
    println!(
        "  Capabilities: {}",
        if worker.capabilities.is_empty() {
            "(none)".to_string()
        } else {
            worker.capabilities.join(", ")
        }
    );
    println!("  Runs:         {}", worker.run_count);
    println!(
        "  Last run:     {}",
        worker
            .last_run_at
            .map(|t| t.to_rfc3339())
            .unwrap_or_else(|| "never".to_string())
    );
    println!("  Created:      {}", worker.created_at.to_rfc3339());
    println!("  Program:      {}", style(&worker.program_location).dim());
    println!();
    println!("  {}", style("── Instruction ──").dim());
    println!("  {}", worker.instruction);
    println!();
    println!("  {}", style("── Role ──").dim());
    for line in worker.role_text.lines() {
        println!("  {line}");
    }
    println!();

    Ok(())
}

pub async fn list_runs(state: &AppState, id: &str, limit: u32, json: bool) -> Result<()> {
    let id = parse_id(id)?;
    // Fail clearly on an unknown worker instead of printing an empty table.
    load_worker(state, &id).await?;
    let runs = state.runs.list_for_worker(&id, i64::from(limit.max(1))).await?;

    if json {
        println!("{}", serde_json::to_string_pretty(&runs)?);
        return Ok(());
    }

    if runs.is_empty() {
        println!();
        println!("  {} has not run yet.", style(&id).cyan());
        println!();
        return Ok(());
    }

    let mut table = Table::new();
    table.load_preset(presets::UTF8_FULL_CONDENSED);
    table.set_content_arrangement(ContentArrangement::Dynamic);

    table.set_header(vec![
        Cell::new("Run").fg(Color::White),
        Cell::new("Started").fg(Color::White),
        Cell::new("Duration").fg(Color::White),
        Cell::new("Outcome").fg(Color::White),
        Cell::new("Result").fg(Color::White),
    ]);

    for run in &runs {
        let duration = (run.completed_at - run.started_at).num_seconds().max(0);
        let outcome = match run.outcome {
            RunOutcome::Success => Cell::new("success").fg(Color::Green),
            RunOutcome::Failed => Cell::new("failed").fg(Color::Red),
        };
        let text = run
            .error_excerpt
            .as_deref()
            .filter(|_| run.outcome == RunOutcome::Failed)
            .unwrap_or(&run.result_excerpt);

        table.add_row(vec![
            Cell::new(run.run_number).fg(Color::Cyan),
            Cell::new(run.started_at.format("%Y-%m-%d %H:%M:%S").to_string()),
            Cell::new(format!("{duration}s")).fg(Color::DarkGrey),
            outcome,
            Cell::new(truncate(text, 80)),
        ]);
    }

    println!("{table}");
    Ok(())
}

pub async fn launch(state: &AppState, id: &str, json: bool, quiet: bool) -> Result<()> {
    let id = parse_id(id)?;

    // A worker left `starting` by an interrupted build is checked first.
    let worker = load_worker(state, &id).await?;
    if worker.status == WorkerStatus::Starting {
        state.launcher.prepare(&id).await?;
    }

    let pid = state.launcher.launch(&id).await?;

    if json {
        println!(
            "{}",
            serde_json::json!({"worker_id": id, "launched": true, "pid": pid})
        );
    } else if !quiet {
        println!(
            "  {} Worker {} launched (pid {})",
            style("✓").green().bold(),
            style(&id).cyan(),
            pid
        );
    }
    Ok(())
}

fn status_cell(status: WorkerStatus) -> Cell {
    let color = match status {
        WorkerStatus::Starting => Color::Yellow,
        WorkerStatus::Ready => Color::Blue,
        WorkerStatus::Running => Color::Green,
        WorkerStatus::Stopped => Color::DarkGrey,
        WorkerStatus::Failed => Color::Red,
    };
    Cell::new(status.to_string()).fg(color)
}

/// Cut to `max` characters, marking the cut with an ellipsis.
fn truncate(text: &str, max: usize) -> String {
    let single_line = text.replace('\n', " ");
    if single_line.chars().count() <= max {
        return single_line;
    }
    let cut: String = single_line.chars().take(max.saturating_sub(1)).collect();
    format!("{cut}…")
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_truncate_keeps_short_text() {
        assert_eq!(truncate("Summarize news", 45), "Summarize news");
    }

    #[test]
    fn test_truncate_cuts_long_text_to_limit() {
        let goal = "a".repeat(60);
        let cut = truncate(&goal, GOAL_COLUMN_LIMIT);
        assert_eq!(cut.chars().count(), GOAL_COLUMN_LIMIT);
        assert!(cut.ends_with('…'));
    }

    #[test]
    fn test_truncate_flattens_newlines() {
        assert_eq!(truncate("line one\nline two", 45), "line one line two");
    }

    #[test]
    fn test_parse_id_rejects_garbage() {
        assert!(parse_id("worker_012").is_ok());
        assert!(parse_id("bot_1").is_err());
    }
}
