//! Verify command

use anyhow::{Context, Result};
use camino::Utf8Path;
use satchel_delivery::{HttpIngestApi, VerificationJob, VerificationReport};
use std::sync::Arc;
use std::time::Duration;

use crate::cli::VerifyArgs;
use crate::commands::{load_config, open_status_log};
use crate::output;

pub async fn run(args: VerifyArgs, config_path: Option<&Utf8Path>) -> Result<()> {
    let config = load_config(config_path)?;
    let ingest = config
        .ingest
        .clone()
        .context("No ingest API configured; add an `ingest` section to the configuration")?;

    let api = HttpIngestApi::new(ingest, config.retry.clone())?;
    let job = VerificationJob::new(Arc::new(api), Arc::new(open_status_log(&config)));

    let reports = match args.interval {
        Some(seconds) => {
            output::info(&format!("Verifying deposits every {}s", seconds));
            job.run_periodically(Duration::from_secs(seconds), args.runs)
                .await?
        }
        None => vec![job.run_once().await?],
    };

    if let Some(report) = reports.last() {
        print_report(report);
    }
    Ok(())
}

fn print_report(report: &VerificationReport) {
    output::header("Verification");
    output::kv("Checked", &report.checked.to_string());
    output::kv("Verified", &report.verified.to_string());
    output::kv("Failed", &report.failed.to_string());
    output::kv("Cancelled", &report.cancelled.to_string());
    output::kv("Still processing", &report.pending.to_string());
    output::kv("Not yet ingested", &report.not_found.to_string());

    for (identifier, message) in &report.errors {
        output::warning(&format!("{}: {}", identifier, message));
    }
}
