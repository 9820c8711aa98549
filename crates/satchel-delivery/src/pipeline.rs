//! Delivery pipeline
//!
//! One delivery turns a payload into a deposited archive:
//!
//! ```text
//! bagging → copying → copied → (validating → validated | validation_skipped)
//!         → bagged → packing → packed → (depositing → deposited | deposit_skipped)
//! ```
//!
//! Transport, archive and validation errors are recorded as a `failed` event
//! and reported as [`DeliveryOutcome::Failed`]; every other error is returned
//! to the caller. Nothing is retried here: a failed delivery is re-run from
//! scratch by the caller.

use satchel_bag::{archive, Bag, BagInfo, ChecksumAlgorithm, PayloadValidator, RepositoryMetadata};
use satchel_core::{BagIdentifier, Error, Result, SatchelConfig};
use satchel_ledger::{BagStatus, StatusLog};
use satchel_transport::{RemoteHandle, Transport};
use std::fs;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tracing::{error, info, warn};

use crate::source::DataSource;

/// Settings for a [`DeliveryPipeline`]
#[derive(Debug, Clone)]
pub struct DeliveryConfig {
    pub working_dir: PathBuf,
    pub export_dir: PathBuf,
    pub repository: String,
    pub source_organization: String,
    pub algorithms: Vec<ChecksumAlgorithm>,
    /// Package locally but skip the deposit
    pub dry_run: bool,
    /// Delete the exported archive after a successful deposit
    pub remove_export: bool,
    /// Directory on the remote that receives archives
    pub remote_dir: Option<String>,
}

impl DeliveryConfig {
    pub fn from_config(config: &SatchelConfig) -> Result<Self> {
        let algorithms = config
            .manifest_algorithms
            .iter()
            .map(|name| name.parse::<ChecksumAlgorithm>())
            .collect::<Result<Vec<_>>>()
            .map_err(|e| Error::invalid_config(e.to_string()))?;

        Ok(Self {
            working_dir: config.working_dir.clone().into_std_path_buf(),
            export_dir: config.export_dir.clone().into_std_path_buf(),
            repository: config.repository.clone(),
            source_organization: config.source_organization.clone(),
            algorithms,
            dry_run: config.dry_run,
            remove_export: config.remove_export,
            remote_dir: config.remote_dir.clone(),
        })
    }
}

/// A caller-supplied tag file written at the bag root
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TagFile {
    pub file_name: String,
    pub text: String,
}

/// One object to deliver
#[derive(Debug, Clone)]
pub struct DeliveryRequest {
    pub object_id: String,
    pub context: Option<String>,
    pub part_id: Option<String>,
    pub metadata: RepositoryMetadata,
    pub extra_tags: Vec<TagFile>,
    /// Defaults to the metadata title
    pub internal_sender_description: Option<String>,
}

impl DeliveryRequest {
    pub fn new(object_id: impl Into<String>, metadata: RepositoryMetadata) -> Self {
        Self {
            object_id: object_id.into(),
            context: None,
            part_id: None,
            metadata,
            extra_tags: Vec::new(),
            internal_sender_description: None,
        }
    }

    pub fn with_context(mut self, context: impl Into<String>) -> Self {
        self.context = Some(context.into());
        self
    }

    pub fn with_part_id(mut self, part_id: impl Into<String>) -> Self {
        self.part_id = Some(part_id.into());
        self
    }

    pub fn with_tag_file(mut self, file_name: impl Into<String>, text: impl Into<String>) -> Self {
        self.extra_tags.push(TagFile {
            file_name: file_name.into(),
            text: text.into(),
        });
        self
    }

    pub fn identifier(&self, repository: &str) -> BagIdentifier {
        let mut identifier = BagIdentifier::new(repository, self.object_id.as_str());
        if let Some(context) = &self.context {
            identifier = identifier.with_context(context.as_str());
        }
        if let Some(part_id) = &self.part_id {
            identifier = identifier.with_part_id(part_id.as_str());
        }
        identifier
    }
}

/// How a delivery attempt ended
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum DeliveryOutcome {
    /// Archive sent to the remote
    Deposited(RemoteHandle),
    /// Dry run: archive left in the export directory
    Skipped(PathBuf),
    /// Recorded as `failed` with this note
    Failed(String),
}

pub struct DeliveryPipeline {
    config: DeliveryConfig,
    status_log: Arc<dyn StatusLog>,
    transport: Arc<dyn Transport>,
    validator: Option<Arc<dyn PayloadValidator>>,
}

impl DeliveryPipeline {
    pub fn new(
        config: DeliveryConfig,
        status_log: Arc<dyn StatusLog>,
        transport: Arc<dyn Transport>,
    ) -> Self {
        Self {
            config,
            status_log,
            transport,
            validator: None,
        }
    }

    /// Validate each payload before bagging it
    pub fn with_validator(mut self, validator: Arc<dyn PayloadValidator>) -> Self {
        self.validator = Some(validator);
        self
    }

    pub fn config(&self) -> &DeliveryConfig {
        &self.config
    }

    /// Deliver one object
    pub async fn deliver(
        &self,
        request: &DeliveryRequest,
        source: &dyn DataSource,
    ) -> Result<DeliveryOutcome> {
        let identifier = request.identifier(&self.config.repository).to_string();
        let work_root = self.config.working_dir.join(&identifier);

        self.record(&identifier, BagStatus::Bagging, None)?;

        match self.run(&identifier, &work_root, request, source).await {
            Ok(outcome) => Ok(outcome),
            Err(e) if e.is_delivery_failure() => {
                let note = format!("{}: {}", e.kind(), e);
                error!("Delivery of {} failed: {}", identifier, note);
                self.record(&identifier, BagStatus::Failed, Some(&note))?;
                remove_working_dir(&work_root);
                Ok(DeliveryOutcome::Failed(note))
            }
            Err(e) => Err(e),
        }
    }

    async fn run(
        &self,
        identifier: &str,
        work_root: &Path,
        request: &DeliveryRequest,
        source: &dyn DataSource,
    ) -> Result<DeliveryOutcome> {
        if work_root.exists() {
            warn!("Removing stale working directory {}", work_root.display());
            fs::remove_dir_all(work_root)?;
        }
        let mut bag = Bag::create(work_root)?;

        self.record(identifier, BagStatus::Copying, None)?;
        source.transfer(&bag.payload_dir()).await?;
        self.record(identifier, BagStatus::Copied, None)?;

        match &self.validator {
            Some(validator) => {
                self.record(identifier, BagStatus::Validating, None)?;
                validator.validate(&bag.payload_dir())?;
                self.record(identifier, BagStatus::Validated, None)?;
            }
            None => self.record(identifier, BagStatus::ValidationSkipped, None)?,
        }

        bag.add_metadata(&request.metadata)?;
        for tag in &request.extra_tags {
            bag.add_tag_file(&tag.text, &tag.file_name)?;
        }
        let description = request
            .internal_sender_description
            .as_deref()
            .unwrap_or(request.metadata.title());
        bag.add_bag_info(&BagInfo::new(
            &self.config.source_organization,
            &request.object_id,
            description,
        ))?;
        bag.add_manifests(&self.config.algorithms)?;
        let bag_path = work_root.display().to_string();
        self.record(identifier, BagStatus::Bagged, Some(&bag_path))?;

        self.record(identifier, BagStatus::Packing, None)?;
        let archive_path = self.config.export_dir.join(format!("{}.tar", identifier));
        let (src, dest) = (work_root.to_path_buf(), archive_path.clone());
        tokio::task::spawn_blocking(move || archive::create(&src, &dest))
            .await
            .map_err(|e| Error::archive(e.to_string()))??;
        let archive_note = archive_path.display().to_string();
        self.record(identifier, BagStatus::Packed, Some(&archive_note))?;

        fs::remove_dir_all(work_root)?;

        if self.config.dry_run {
            self.record(identifier, BagStatus::DepositSkipped, Some("dry run"))?;
            info!("Dry run: {} left at {}", identifier, archive_path.display());
            return Ok(DeliveryOutcome::Skipped(archive_path));
        }

        self.record(identifier, BagStatus::Depositing, None)?;
        let handle = self
            .transport
            .send_file(&archive_path, self.config.remote_dir.as_deref())
            .await?;
        let handle_note = handle.to_string();
        self.record(identifier, BagStatus::Deposited, Some(&handle_note))?;

        if self.config.remove_export {
            fs::remove_file(&archive_path)?;
        }

        info!("Delivered {} to {}", identifier, handle);
        Ok(DeliveryOutcome::Deposited(handle))
    }

    fn record(&self, identifier: &str, status: BagStatus, note: Option<&str>) -> Result<()> {
        self.status_log.record(identifier, status, note)?;
        info!("{}: {}", identifier, status);
        Ok(())
    }
}

fn remove_working_dir(work_root: &Path) {
    if work_root.exists() {
        if let Err(e) = fs::remove_dir_all(work_root) {
            warn!(
                "Failed to remove working directory {}: {}",
                work_root.display(),
                e
            );
        }
    }
}
