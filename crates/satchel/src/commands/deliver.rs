//! Deliver command

use anyhow::{anyhow, bail, Context, Result};
use camino::Utf8Path;
use satchel_bag::{InnerBagValidator, RepositoryMetadata};
use satchel_core::SatchelConfig;
use satchel_delivery::{
    DataSource, DeliveryConfig, DeliveryOutcome, DeliveryPipeline, DeliveryRequest,
    LocalDirectorySource, RemoteSource,
};
use satchel_transport::create_transport;
use std::sync::Arc;
use tracing::debug;
use walkdir::WalkDir;

use crate::cli::DeliverArgs;
use crate::commands::{load_config, open_status_log};
use crate::output;

pub async fn run(args: DeliverArgs, config_path: Option<&Utf8Path>) -> Result<()> {
    let config = load_config(config_path)?;

    if let (Some(source), Some(threshold)) = (&args.source, config.size_threshold_bytes) {
        let size = directory_size(source)?;
        if size > threshold {
            output::warning(&format!(
                "Skipping {}: {} bytes exceeds the {} byte threshold",
                source, size, threshold
            ));
            return Ok(());
        }
    }

    let mut delivery = DeliveryConfig::from_config(&config)?;
    delivery.dry_run |= args.dry_run;

    let (remote_name, remote) = match &args.remote {
        Some(name) => config
            .remotes
            .get_key_value(name)
            .map(|(k, v)| (k.as_str(), v))
            .ok_or_else(|| anyhow!("Unknown remote '{}'", name))?,
        None => config.deposit_remote()?,
    };
    debug!("Depositing to remote '{}' ({})", remote_name, remote.type_name());
    let transport = create_transport(remote, &config.retry)
        .await
        .with_context(|| format!("Failed to set up remote '{}'", remote_name))?;

    let source = data_source(&args, &config).await?;
    let request = build_request(&args, &config)?;

    let mut pipeline = DeliveryPipeline::new(delivery, Arc::new(open_status_log(&config)), transport);
    if let Some(inner) = &config.inner_bag {
        pipeline = pipeline.with_validator(Arc::new(InnerBagValidator::new(inner)));
    }

    let identifier = request.identifier(&config.repository);
    match pipeline.deliver(&request, source.as_ref()).await? {
        DeliveryOutcome::Deposited(handle) => {
            output::success(&format!("Deposited {} to {}", identifier, handle));
            Ok(())
        }
        DeliveryOutcome::Skipped(archive) => {
            output::info(&format!(
                "Dry run: {} packed at {}",
                identifier,
                archive.display()
            ));
            Ok(())
        }
        DeliveryOutcome::Failed(note) => {
            output::error(&format!("Delivery of {} failed", identifier));
            bail!(note)
        }
    }
}

async fn data_source(args: &DeliverArgs, config: &SatchelConfig) -> Result<Box<dyn DataSource>> {
    if let Some(name) = &args.from_remote {
        let remote = config
            .remotes
            .get(name)
            .ok_or_else(|| anyhow!("Unknown remote '{}'", name))?;
        let transport = create_transport(remote, &config.retry)
            .await
            .with_context(|| format!("Failed to set up remote '{}'", name))?;
        return Ok(Box::new(RemoteSource::new(
            transport,
            args.remote_path.clone(),
        )));
    }

    match &args.source {
        Some(source) => Ok(Box::new(LocalDirectorySource::new(source.as_std_path()))),
        None => bail!("Either --source or --from-remote is required"),
    }
}

fn build_request(args: &DeliverArgs, config: &SatchelConfig) -> Result<DeliveryRequest> {
    let mut metadata = RepositoryMetadata::new(&args.title)
        .with_access(&config.metadata.access)
        .with_storage_option(&config.metadata.storage_option);
    if let Some(description) = &args.description {
        metadata = metadata.with_description(description);
    }
    if let Some(creator) = &args.creator {
        metadata = metadata.with_creator(creator);
    }

    let mut request = DeliveryRequest::new(args.object_id.as_str(), metadata);
    if let Some(context) = &args.context {
        request = request.with_context(context.as_str());
    }
    if let Some(part_id) = &args.part_id {
        request = request.with_part_id(part_id.as_str());
    }
    for path in &args.tag_files {
        let text = std::fs::read_to_string(path)
            .with_context(|| format!("Failed to read tag file {}", path))?;
        let name = path
            .file_name()
            .ok_or_else(|| anyhow!("Tag file path {} has no file name", path))?;
        request = request.with_tag_file(name, text);
    }
    Ok(request)
}

/// Total size in bytes of the regular files under `dir`
fn directory_size(dir: &Utf8Path) -> Result<u64> {
    let mut total = 0;
    for entry in WalkDir::new(dir) {
        let entry = entry.with_context(|| format!("Failed to scan {}", dir))?;
        if entry.file_type().is_file() {
            total += entry.metadata()?.len();
        }
    }
    Ok(total)
}
