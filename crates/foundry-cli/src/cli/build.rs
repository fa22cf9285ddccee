//! `foundry build`: instruction -> plan -> capabilities -> ready worker -> launch.

use anyhow::{Result, bail};
use console::style;
use dialoguer::{Confirm, Input};

use foundry_core::pipeline::{BuildEvent, BuildOutcome};

use crate::state::AppState;

pub async fn build(
    state: &AppState,
    instruction: Option<String>,
    yes: bool,
    no_launch: bool,
    json: bool,
    quiet: bool,
) -> Result<()> {
    let instruction = match instruction {
        Some(text) => text,
        None if json => bail!("an instruction is required with --json"),
        None => Input::<String>::new()
            .with_prompt("What should the worker do?")
            .interact_text()?,
    };
    let instruction = instruction.trim().to_string();
    if instruction.is_empty() {
        bail!("instruction cannot be empty");
    }

    let show_progress = !json && !quiet;
    if show_progress {
        println!();
        println!("  {} Building a worker", style("⚒").bold());
        println!();
    }

    let progress = move |event: &BuildEvent| {
        if show_progress {
            print_event(event);
        }
    };
    let outcome = state.pipeline().build(&instruction, &progress).await?;

    if show_progress {
        print_summary(&outcome);
    }

    let launch = if !outcome.ready || no_launch {
        false
    } else if yes {
        true
    } else if json || quiet {
        false
    } else {
        Confirm::new()
            .with_prompt(format!("Launch worker {} now?", outcome.worker_id))
            .default(true)
            .interact()?
    };

    let pid = if launch {
        let pid = state.launcher.launch(&outcome.worker_id).await?;
        if !json && !quiet {
            println!(
                "  {} Worker {} launched (pid {})",
                style("✓").green().bold(),
                style(&outcome.worker_id).cyan(),
                pid
            );
            println!();
        }
        Some(pid)
    } else {
        if show_progress && outcome.ready {
            println!(
                "  Launch it later with: {}",
                style(format!("foundry launch {}", outcome.worker_id)).cyan()
            );
            println!();
        }
        None
    };

    if json {
        let report = serde_json::json!({
            "outcome": outcome,
            "launched": pid.is_some(),
            "pid": pid,
        });
        println!("{}", serde_json::to_string_pretty(&report)?);
    }

    Ok(())
}

fn print_event(event: &BuildEvent) {
    match event {
        BuildEvent::Planning => {
            println!("  {} Planning...", style("→").dim());
        }
        BuildEvent::Planned {
            goal,
            schedule_interval,
            required,
            gaps,
        } => {
            println!("  {} Goal: {}", style("✓").green(), goal);
            println!("    Schedule: {}", describe_interval(*schedule_interval));
            println!("    Uses:     {}", list_or_none(required));
            println!("    Missing:  {}", list_or_none(gaps));
        }
        BuildEvent::Synthesizing { name, attempt } => {
            println!(
                "  {} Writing capability {} (attempt {attempt})",
                style("→").dim(),
                style(name).cyan()
            );
        }
        BuildEvent::SynthesisFailed {
            name,
            attempt,
            error,
        } => {
            println!(
                "  {} Could not write {} (attempt {attempt}): {}",
                style("✗").red(),
                name,
                style(error).dim()
            );
        }
        BuildEvent::Validating { name, attempt } => {
            println!(
                "  {} Testing {} (attempt {attempt})",
                style("→").dim(),
                style(name).cyan()
            );
        }
        BuildEvent::Validated {
            name,
            passed,
            detail,
        } => {
            if *passed {
                println!("  {} {} passed", style("✓").green(), name);
            } else {
                println!(
                    "  {} {} failed: {}",
                    style("✗").red(),
                    name,
                    style(detail).dim()
                );
            }
        }
        BuildEvent::Registered { name } => {
            println!("  {} Registered {}", style("✓").green(), style(name).cyan());
        }
        BuildEvent::Abandoned { name, reason } => {
            println!(
                "  {} Skipping {}: {}",
                style("!").yellow().bold(),
                name,
                style(reason).dim()
            );
        }
        BuildEvent::Materialized {
            worker_id,
            program_location,
        } => {
            println!(
                "  {} Created {} at {}",
                style("✓").green(),
                style(worker_id).cyan(),
                style(program_location.display()).dim()
            );
        }
        BuildEvent::Prepared {
            worker_id,
            ready,
            detail,
        } => {
            if *ready {
                println!("  {} {} is ready", style("✓").green(), worker_id);
            } else {
                println!(
                    "  {} {} is not ready: {}",
                    style("✗").red(),
                    worker_id,
                    detail.as_deref().unwrap_or("unknown reason")
                );
            }
        }
    }
}

fn print_summary(outcome: &BuildOutcome) {
    println!();
    println!("  {}", style("── Summary ──").dim());
    println!("  Worker:       {}", style(&outcome.worker_id).cyan().bold());
    println!("  Goal:         {}", outcome.plan.goal);
    println!(
        "  Schedule:     {}",
        describe_interval(outcome.plan.schedule_interval)
    );
    println!("  Capabilities: {}", list_or_none(&outcome.capabilities));
    if !outcome.abandoned.is_empty() {
        let names: Vec<String> = outcome.abandoned.iter().map(|a| a.name.clone()).collect();
        println!("  Abandoned:    {}", style(names.join(", ")).yellow());
    }
    println!();
}

pub(crate) fn describe_interval(hours: u32) -> String {
    match hours {
        0 => "once".to_string(),
        1 => "every hour".to_string(),
        n => format!("every {n} hours"),
    }
}

fn list_or_none(names: &[String]) -> String {
    if names.is_empty() {
        "(none)".to_string()
    } else {
        names.join(", ")
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_interval_descriptions() {
        assert_eq!(describe_interval(0), "once");
        assert_eq!(describe_interval(1), "every hour");
        assert_eq!(describe_interval(24), "every 24 hours");
    }

    #[test]
    fn test_empty_lists_read_none() {
        assert_eq!(list_or_none(&[]), "(none)");
        assert_eq!(
            list_or_none(&["web_search".to_string(), "send_email".to_string()]),
            "web_search, send_email"
        );
    }
}
