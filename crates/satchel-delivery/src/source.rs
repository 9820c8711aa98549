//! Payload sources for the delivery pipeline

use async_trait::async_trait;
use satchel_core::{Error, Result};
use satchel_transport::filesystem::copy_tree;
use satchel_transport::Transport;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tracing::debug;

/// Populates a payload directory
///
/// Errors are passed to the pipeline unchanged.
#[async_trait]
pub trait DataSource: Send + Sync {
    async fn transfer(&self, target_dir: &Path) -> Result<()>;
}

/// Copies a local directory tree into the payload
#[derive(Debug, Clone)]
pub struct LocalDirectorySource {
    root: PathBuf,
}

impl LocalDirectorySource {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into() }
    }
}

#[async_trait]
impl DataSource for LocalDirectorySource {
    async fn transfer(&self, target_dir: &Path) -> Result<()> {
        if !self.root.is_dir() {
            return Err(Error::not_found(format!(
                "source directory {}",
                self.root.display()
            )));
        }

        let src = self.root.clone();
        let dest = target_dir.to_path_buf();
        let copied = tokio::task::spawn_blocking(move || copy_tree(&src, &dest))
            .await
            .map_err(|e| Error::Io(std::io::Error::other(e)))??;

        debug!("Copied {} files from {}", copied, self.root.display());
        Ok(())
    }
}

/// Pulls the payload from a remote through its transport
pub struct RemoteSource {
    transport: Arc<dyn Transport>,
    remote_path: Option<String>,
}

impl RemoteSource {
    pub fn new(transport: Arc<dyn Transport>, remote_path: Option<String>) -> Self {
        Self {
            transport,
            remote_path,
        }
    }
}

#[async_trait]
impl DataSource for RemoteSource {
    async fn transfer(&self, target_dir: &Path) -> Result<()> {
        self.transport
            .retrieve_from_path(target_dir, self.remote_path.as_deref())
            .await
    }
}
