//! Ingest verification
//!
//! Deposits are confirmed asynchronously by the remote. [`VerificationJob`]
//! picks every identifier whose latest event is `deposited` and asks the
//! [`IngestApi`] how ingest went. Once a `verified` or `verify_failed` event
//! is appended the identifier is no longer `deposited`, so later runs skip it.

use crate::ingest::{IngestApi, IngestRecord};
use chrono::{DateTime, Duration, Utc};
use satchel_core::Result;
use satchel_ledger::{BagStatus, StatusLog};
use std::fmt;
use std::sync::Arc;
use tracing::{debug, info, warn};

/// Clock-skew allowance subtracted from the deposit time when querying ingest results
pub const LOOKBACK_SECS: i64 = 60;

/// Classified result of a remote ingest
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum IngestOutcome {
    Success,
    Failed,
    Cancelled,
    Processing,
    NotFound,
}

impl IngestOutcome {
    pub fn as_str(&self) -> &'static str {
        match self {
            IngestOutcome::Success => "success",
            IngestOutcome::Failed => "failed",
            IngestOutcome::Cancelled => "cancelled",
            IngestOutcome::Processing => "processing",
            IngestOutcome::NotFound => "not_found",
        }
    }
}

impl fmt::Display for IngestOutcome {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Classify a raw ingest status and stage
///
/// Case-insensitive substring match with precedence
/// failed > cancelled > success-at-cleanup > processing.
pub fn classify_ingest(status: &str, stage: &str) -> IngestOutcome {
    let status = status.to_lowercase();
    let stage = stage.to_lowercase();

    if status.contains("failed") {
        IngestOutcome::Failed
    } else if status.contains("cancel") {
        IngestOutcome::Cancelled
    } else if status.contains("success") && stage.contains("cleanup") {
        IngestOutcome::Success
    } else {
        IngestOutcome::Processing
    }
}

/// Classify an optional query result; no result means [`IngestOutcome::NotFound`]
pub fn classify_result(record: Option<&IngestRecord>) -> IngestOutcome {
    match record {
        Some(record) => classify_ingest(&record.status, &record.stage),
        None => IngestOutcome::NotFound,
    }
}

/// Confirms one deposit against the ingest API
pub struct IngestVerifier {
    api: Arc<dyn IngestApi>,
    status_log: Arc<dyn StatusLog>,
}

impl IngestVerifier {
    pub fn new(api: Arc<dyn IngestApi>, status_log: Arc<dyn StatusLog>) -> Self {
        Self { api, status_log }
    }

    /// Look up the ingest result for a deposit and record its outcome
    ///
    /// `processing` and `not_found` append nothing, leaving the identifier
    /// for the next run.
    pub async fn verify(
        &self,
        identifier: &str,
        deposited_at: DateTime<Utc>,
    ) -> Result<IngestOutcome> {
        let since = deposited_at - Duration::seconds(LOOKBACK_SECS);
        let record = self.api.latest_ingest(identifier, since).await?;
        let outcome = classify_result(record.as_ref());

        match outcome {
            IngestOutcome::Success => {
                self.status_log
                    .record(identifier, BagStatus::Verified, Some("ingest verified"))?;
                info!("{}: ingest verified", identifier);
            }
            IngestOutcome::Failed | IngestOutcome::Cancelled => {
                let note = format!("ingest {}", outcome);
                self.status_log
                    .record(identifier, BagStatus::VerifyFailed, Some(&note))?;
                warn!("{}: {}", identifier, note);
            }
            IngestOutcome::Processing | IngestOutcome::NotFound => {
                debug!("{}: ingest {}, will check again", identifier, outcome);
            }
        }

        Ok(outcome)
    }
}

/// Counts from one verification run
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct VerificationReport {
    pub checked: usize,
    pub verified: usize,
    pub failed: usize,
    pub cancelled: usize,
    pub pending: usize,
    pub not_found: usize,
    /// Identifiers whose check errored, with the error message
    pub errors: Vec<(String, String)>,
}

impl VerificationReport {
    fn count(&mut self, outcome: IngestOutcome) {
        match outcome {
            IngestOutcome::Success => self.verified += 1,
            IngestOutcome::Failed => self.failed += 1,
            IngestOutcome::Cancelled => self.cancelled += 1,
            IngestOutcome::Processing => self.pending += 1,
            IngestOutcome::NotFound => self.not_found += 1,
        }
    }
}

/// Scheduler side of verification
pub struct VerificationJob {
    verifier: IngestVerifier,
    status_log: Arc<dyn StatusLog>,
}

impl VerificationJob {
    pub fn new(api: Arc<dyn IngestApi>, status_log: Arc<dyn StatusLog>) -> Self {
        Self {
            verifier: IngestVerifier::new(api, Arc::clone(&status_log)),
            status_log,
        }
    }

    /// Verify every identifier whose latest event is `deposited`, once
    ///
    /// A failing check is logged and counted; the run continues with the
    /// next identifier.
    pub async fn run_once(&self) -> Result<VerificationReport> {
        let mut report = VerificationReport::default();

        let pending: Vec<_> = self
            .status_log
            .get_latest_for_all(None)?
            .into_iter()
            .filter(|event| event.status == BagStatus::Deposited)
            .collect();

        for event in pending {
            report.checked += 1;
            match self
                .verifier
                .verify(&event.bag_identifier, event.timestamp)
                .await
            {
                Ok(outcome) => report.count(outcome),
                Err(e) => {
                    warn!("Verification of {} failed: {}", event.bag_identifier, e);
                    report.errors.push((event.bag_identifier, e.to_string()));
                }
            }
        }

        info!(
            "Verification run: {} checked, {} verified, {} failed, {} pending",
            report.checked,
            report.verified,
            report.failed + report.cancelled,
            report.pending + report.not_found
        );
        Ok(report)
    }

    /// Run every `interval` until `runs` runs have completed, or forever when `None`
    pub async fn run_periodically(
        &self,
        interval: std::time::Duration,
        runs: Option<u32>,
    ) -> Result<Vec<VerificationReport>> {
        let mut ticker = tokio::time::interval(interval);
        let mut reports = Vec::new();
        loop {
            ticker.tick().await;
            reports.push(self.run_once().await?);
            if runs.is_some_and(|runs| reports.len() >= runs as usize) {
                return Ok(reports);
            }
        }
    }
}
