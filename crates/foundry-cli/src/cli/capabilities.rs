//! Capability registry inspection.

use anyhow::Result;
use clap::Subcommand;
use comfy_table::{Cell, Color, ContentArrangement, Table, presets};

use foundry_types::capability::{Capability, CapabilityOrigin, CapabilityStatus, TestVerdict};

use crate::state::AppState;

#[derive(Subcommand)]
pub enum CapabilitiesCommand {
    /// List built-in and synthesized capabilities in any status.
    #[command(alias = "ls")]
    List {
        /// Only show active capabilities.
        #[arg(long)]
        active: bool,
    },
}

pub async fn handle(state: &AppState, action: CapabilitiesCommand, json: bool) -> Result<()> {
    match action {
        CapabilitiesCommand::List { active } => list_capabilities(state, active, json).await,
    }
}

pub async fn list_capabilities(state: &AppState, active_only: bool, json: bool) -> Result<()> {
    let capabilities: Vec<Capability> = if active_only {
        state.registry.snapshot().await
    } else {
        state.registry.all_records().await
    };

    if json {
        println!("{}", serde_json::to_string_pretty(&capabilities)?);
        return Ok(());
    }

    let mut table = Table::new();
    table.load_preset(presets::UTF8_FULL_CONDENSED);
    table.set_content_arrangement(ContentArrangement::Dynamic);

    table.set_header(vec![
        Cell::new("Name").fg(Color::White),
        Cell::new("Origin").fg(Color::White),
        Cell::new("Status").fg(Color::White),
        Cell::new("Verdict").fg(Color::White),
        Cell::new("Description").fg(Color::White),
    ]);

    for cap in &capabilities {
        let origin = match cap.origin {
            CapabilityOrigin::BuiltIn => Cell::new(cap.origin.to_string()).fg(Color::DarkGrey),
            CapabilityOrigin::Synthesized => Cell::new(cap.origin.to_string()).fg(Color::Magenta),
        };
        let status = match cap.status {
            CapabilityStatus::Active => Cell::new(cap.status.to_string()).fg(Color::Green),
            CapabilityStatus::Inactive => Cell::new(cap.status.to_string()).fg(Color::Red),
        };
        let verdict = match cap.test_verdict {
            TestVerdict::Passed => Cell::new(cap.test_verdict.to_string()).fg(Color::Green),
            TestVerdict::Failed => Cell::new(cap.test_verdict.to_string()).fg(Color::Red),
            TestVerdict::Untested => Cell::new(cap.test_verdict.to_string()).fg(Color::Yellow),
        };

        table.add_row(vec![
            Cell::new(&cap.name).fg(Color::Cyan),
            origin,
            status,
            verdict,
            Cell::new(&cap.description),
        ]);
    }

    println!("{table}");
    Ok(())
}
