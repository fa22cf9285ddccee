//! Provider commands: list configured backends and test them.
//!
//! Providers come from `[[providers]]` in `config.toml`. An OpenAI-compatible
//! provider whose key variable is unset is configured but not loaded.

use anyhow::{Result, bail};
use clap::Subcommand;
use comfy_table::{Cell, Color, ContentArrangement, Table, presets};
use console::style;
use indicatif::{ProgressBar, ProgressStyle};

use foundry_types::llm::{ProviderConfig, TaskKind};

use crate::state::AppState;

#[derive(Subcommand)]
pub enum ProvidersCommand {
    /// List configured providers, their load state and the route per task kind.
    #[command(alias = "ls")]
    List,

    /// Send a one-line prompt to each loaded provider (or just one).
    Test {
        /// Provider name; all loaded providers when omitted.
        name: Option<String>,
    },
}

pub async fn handle(state: &AppState, action: ProvidersCommand, json: bool) -> Result<()> {
    match action {
        ProvidersCommand::List => list_providers(state, json),
        ProvidersCommand::Test { name } => test_providers(state, name.as_deref(), json).await,
    }
}

/// Whether the provider's key variable is set: `None` for keyless backends.
fn key_present(config: &ProviderConfig) -> Option<bool> {
    config.api_key_env.as_ref().map(|var| {
        std::env::var(var)
            .map(|v| !v.trim().is_empty())
            .unwrap_or(false)
    })
}

pub fn list_providers(state: &AppState, json: bool) -> Result<()> {
    let loaded = state.gateway.provider_names();
    let statuses = state.gateway.provider_status();

    if json {
        let providers: Vec<serde_json::Value> = state
            .config
            .providers
            .iter()
            .map(|p| {
                serde_json::json!({
                    "name": p.name,
                    "kind": p.kind.to_string(),
                    "model": p.model,
                    "base_url": p.base_url,
                    "enabled": p.enabled,
                    "key_present": key_present(p),
                    "loaded": loaded.contains(&p.name),
                })
            })
            .collect();
        let routes: serde_json::Map<String, serde_json::Value> = TaskKind::ALL
            .iter()
            .map(|kind| {
                (
                    kind.to_string(),
                    serde_json::json!(state.gateway.resolved_route(*kind)),
                )
            })
            .collect();
        let output = serde_json::json!({
            "providers": providers,
            "status": statuses,
            "routes": routes,
        });
        println!("{}", serde_json::to_string_pretty(&output)?);
        return Ok(());
    }

    let mut table = Table::new();
    table.load_preset(presets::UTF8_FULL_CONDENSED);
    table.set_content_arrangement(ContentArrangement::Dynamic);

    table.set_header(vec![
        Cell::new("Name").fg(Color::White),
        Cell::new("Kind").fg(Color::White),
        Cell::new("Model").fg(Color::White),
        Cell::new("Key").fg(Color::White),
        Cell::new("Loaded").fg(Color::White),
        Cell::new("Calls").fg(Color::White),
        Cell::new("Cooldown").fg(Color::White),
    ]);

    for config in &state.config.providers {
        let key_cell = match key_present(config) {
            None => Cell::new("n/a").fg(Color::DarkGrey),
            Some(true) => Cell::new("set").fg(Color::Green),
            Some(false) => Cell::new("missing").fg(Color::Red),
        };
        let loaded_cell = if loaded.contains(&config.name) {
            Cell::new("yes").fg(Color::Green)
        } else if !config.enabled {
            Cell::new("disabled").fg(Color::DarkGrey)
        } else {
            Cell::new("no").fg(Color::Red)
        };
        let status = statuses.iter().find(|s| s.name == config.name);
        let calls = status
            .map(|s| format!("{}/{}", s.total_calls.saturating_sub(s.total_failures), s.total_calls))
            .unwrap_or_else(|| "-".to_string());
        let cooldown = status
            .and_then(|s| s.cooldown_remaining_secs)
            .map(|secs| format!("{secs}s"))
            .unwrap_or_else(|| "-".to_string());

        table.add_row(vec![
            Cell::new(&config.name).fg(Color::Cyan),
            Cell::new(config.kind.to_string()).fg(Color::DarkGrey),
            Cell::new(&config.model),
            key_cell,
            loaded_cell,
            Cell::new(calls),
            Cell::new(cooldown).fg(Color::Yellow),
        ]);
    }

    println!("{table}");
    println!();
    println!("  {}", style("── Routes ──").dim());
    for kind in TaskKind::ALL {
        let route = state.gateway.resolved_route(kind);
        let route = if route.is_empty() {
            style("(no loaded provider)".to_string()).red().to_string()
        } else {
            route.join(" → ")
        };
        println!("  {:<20} {}", kind.to_string(), route);
    }
    if let Some(preferred) = &state.config.gateway.preferred_provider {
        println!("  {:<20} {}", "preferred", style(preferred).cyan());
    }
    println!();

    Ok(())
}

pub async fn test_providers(state: &AppState, name: Option<&str>, json: bool) -> Result<()> {
    let names = match name {
        Some(name) => {
            if !state.gateway.provider_names().iter().any(|n| n == name) {
                bail!("provider '{name}' is not loaded (check its API key variable and `enabled`)");
            }
            vec![name.to_string()]
        }
        None => state.gateway.provider_names(),
    };

    if names.is_empty() {
        bail!("no providers are loaded");
    }

    let mut results = Vec::with_capacity(names.len());
    for name in &names {
        let spinner = (!json).then(|| {
            let spinner = ProgressBar::new_spinner();
            if let Ok(spinner_style) = ProgressStyle::default_spinner().template("{spinner:.cyan} {msg}") {
                spinner.set_style(spinner_style);
            }
            spinner.set_message(format!("Testing {name}..."));
            spinner.enable_steady_tick(std::time::Duration::from_millis(80));
            spinner
        });

        let started = std::time::Instant::now();
        let result = state.gateway.ping(name).await;
        let elapsed_ms = u64::try_from(started.elapsed().as_millis()).unwrap_or(u64::MAX);

        if let Some(spinner) = spinner {
            spinner.finish_and_clear();
        }

        match &result {
            Ok(reply) if !json => println!(
                "  {} {:<12} {} {}",
                style("✓").green().bold(),
                name,
                style(format!("{elapsed_ms}ms")).dim(),
                reply.trim()
            ),
            Err(e) if !json => println!(
                "  {} {:<12} {}",
                style("✗").red().bold(),
                name,
                style(e).red()
            ),
            _ => {}
        }

        results.push(serde_json::json!({
            "name": name,
            "ok": result.is_ok(),
            "reply": result.as_ref().ok(),
            "error": result.as_ref().err().map(|e| e.to_string()),
            "latency_ms": elapsed_ms,
        }));
    }

    if json {
        println!("{}", serde_json::to_string_pretty(&results)?);
    }
    Ok(())
}
