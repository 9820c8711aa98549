//! Status command

use anyhow::{Context, Result};
use camino::Utf8Path;
use satchel_ledger::{StatusEvent, StatusLog};
use tabled::{settings::Style, Table, Tabled};

use crate::cli::StatusArgs;
use crate::commands::{load_config, open_status_log};
use crate::output;

#[derive(Tabled)]
struct EventRow {
    #[tabled(rename = "bag")]
    identifier: String,
    status: String,
    #[tabled(rename = "recorded")]
    timestamp: String,
    note: String,
}

impl From<&StatusEvent> for EventRow {
    fn from(event: &StatusEvent) -> Self {
        Self {
            identifier: event.bag_identifier.clone(),
            status: output::status(event.status),
            timestamp: event.timestamp.format("%Y-%m-%d %H:%M:%S UTC").to_string(),
            note: event.note.clone().unwrap_or_default(),
        }
    }
}

pub fn run(args: StatusArgs, config_path: Option<&Utf8Path>) -> Result<()> {
    let config = load_config(config_path)?;
    let log = open_status_log(&config);

    let mut events = match &args.identifier {
        Some(identifier) => log
            .get_all_for(identifier)
            .with_context(|| format!("Failed to read status of {}", identifier))?,
        None => log
            .get_latest_for_all(args.since)
            .context("Failed to read status log")?,
    };
    if args.pending {
        events.retain(|event| !event.status.is_terminal());
    }
    events.sort_by(|a, b| {
        a.bag_identifier
            .cmp(&b.bag_identifier)
            .then(a.timestamp.cmp(&b.timestamp))
    });

    if args.json {
        println!("{}", serde_json::to_string_pretty(&events)?);
        return Ok(());
    }

    if events.is_empty() {
        output::warning("No status events recorded");
        return Ok(());
    }

    let rows: Vec<EventRow> = events.iter().map(EventRow::from).collect();
    let table = Table::new(&rows).with(Style::rounded()).to_string();
    println!("{}", table);
    Ok(())
}
