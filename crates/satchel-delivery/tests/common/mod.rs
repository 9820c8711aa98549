//! Shared helpers for delivery integration tests

#![allow(dead_code)]

pub mod mock_server;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use satchel_bag::{ChecksumAlgorithm, RepositoryMetadata};
use satchel_core::{Error, Result};
use satchel_delivery::{DeliveryConfig, DeliveryRequest, IngestApi, IngestRecord};
use satchel_ledger::{BagStatus, StatusLog};
use satchel_transport::{RemoteHandle, Transport};
use std::collections::HashMap;
use std::fs;
use std::path::{Path, PathBuf};
use std::sync::Mutex;
use tempfile::TempDir;

/// Transport that records sends instead of touching a remote
#[derive(Default)]
pub struct MockTransport {
    pub sent: Mutex<Vec<(PathBuf, Option<String>)>>,
    pub fail_with: Option<String>,
}

impl MockTransport {
    pub fn failing(message: &str) -> Self {
        Self {
            sent: Mutex::new(Vec::new()),
            fail_with: Some(message.to_string()),
        }
    }

    pub fn sent_count(&self) -> usize {
        self.sent.lock().unwrap().len()
    }
}

#[async_trait]
impl Transport for MockTransport {
    fn name(&self) -> &'static str {
        "mock"
    }

    async fn send_file(&self, local_path: &Path, remote_dir: Option<&str>) -> Result<RemoteHandle> {
        if let Some(message) = &self.fail_with {
            return Err(Error::transport(
                format!("put {}", local_path.display()),
                message.clone(),
            ));
        }
        assert!(local_path.is_file(), "archive must exist when sent");
        self.sent
            .lock()
            .unwrap()
            .push((local_path.to_path_buf(), remote_dir.map(str::to_string)));
        Ok(RemoteHandle::Object {
            bucket: "deposits".to_string(),
            key: format!(
                "{}/{}",
                remote_dir.unwrap_or("root"),
                local_path.file_name().unwrap().to_string_lossy()
            ),
        })
    }

    async fn retrieve_file(&self, _remote_path: &str, _local_dir: &Path) -> Result<PathBuf> {
        Err(Error::unsupported("mock", "retrieve_file"))
    }

    async fn retrieve_from_path(&self, _local_path: &Path, _remote_path: Option<&str>) -> Result<()> {
        Err(Error::unsupported("mock", "retrieve_from_path"))
    }
}

/// Ingest API answering from a fixed table and recording every query
#[derive(Default)]
pub struct MockIngestApi {
    pub results: HashMap<String, std::result::Result<Option<IngestRecord>, String>>,
    pub queries: Mutex<Vec<(String, DateTime<Utc>)>>,
}

impl MockIngestApi {
    pub fn with_result(mut self, identifier: &str, status: &str, stage: &str) -> Self {
        self.results.insert(
            identifier.to_string(),
            Ok(Some(IngestRecord {
                status: status.to_string(),
                stage: stage.to_string(),
                object_identifier: None,
                date_processed: None,
            })),
        );
        self
    }

    pub fn with_error(mut self, identifier: &str, message: &str) -> Self {
        self.results
            .insert(identifier.to_string(), Err(message.to_string()));
        self
    }

    pub fn query_count(&self) -> usize {
        self.queries.lock().unwrap().len()
    }
}

#[async_trait]
impl IngestApi for MockIngestApi {
    async fn latest_ingest(
        &self,
        identifier: &str,
        processed_since: DateTime<Utc>,
    ) -> Result<Option<IngestRecord>> {
        self.queries
            .lock()
            .unwrap()
            .push((identifier.to_string(), processed_since));
        match self.results.get(identifier) {
            Some(Ok(record)) => Ok(record.clone()),
            Some(Err(message)) => Err(Error::transport("ingest", message.clone())),
            None => Ok(None),
        }
    }
}

/// Scratch directories for one pipeline
pub struct TestDirs {
    pub temp: TempDir,
}

impl TestDirs {
    pub fn new() -> Self {
        Self {
            temp: TempDir::new().unwrap(),
        }
    }

    pub fn working_dir(&self) -> PathBuf {
        self.temp.path().join("work")
    }

    pub fn export_dir(&self) -> PathBuf {
        self.temp.path().join("export")
    }

    pub fn source_dir(&self) -> PathBuf {
        self.temp.path().join("source")
    }

    pub fn config(&self, dry_run: bool) -> DeliveryConfig {
        DeliveryConfig {
            working_dir: self.working_dir(),
            export_dir: self.export_dir(),
            repository: "rac".to_string(),
            source_organization: "Rockefeller Archive Center".to_string(),
            algorithms: vec![ChecksumAlgorithm::Md5],
            dry_run,
            remove_export: false,
            remote_dir: Some("incoming".to_string()),
        }
    }

    /// Write a small payload into the source directory
    pub fn write_payload(&self) -> PathBuf {
        let source = self.source_dir();
        fs::create_dir_all(source.join("letters")).unwrap();
        fs::write(source.join("letters/1950-01-02.txt"), "Dear colleague").unwrap();
        fs::write(source.join("finding-aid.xml"), "<ead/>").unwrap();
        source
    }
}

pub fn sample_request() -> DeliveryRequest {
    DeliveryRequest::new(
        "5494124",
        RepositoryMetadata::new("Correspondence, 1950").with_creator("Program Office"),
    )
}

/// Statuses recorded for `identifier`, in append order
pub fn statuses(log: &dyn StatusLog, identifier: &str) -> Vec<BagStatus> {
    log.get_all_for(identifier)
        .unwrap()
        .into_iter()
        .map(|event| event.status)
        .collect()
}
