//! Remote transports for satchel
//!
//! Every configured remote resolves once, at startup, into an
//! `Arc<dyn Transport>`:
//!
//! - [`filesystem::FilesystemTransport`] copies under a base directory
//! - [`s3::S3Transport`] puts and gets objects in an S3-compatible bucket
//! - [`sftp::SftpTransport`] pulls files over a key-based SFTP session
//!
//! Remote operations run under the configured [`RetryPolicy`]; exhausted
//! retries surface as [`satchel_core::Error::Transport`].

pub mod filesystem;
pub mod s3;
pub mod sftp;
pub mod traits;
mod utils;

pub use traits::{RemoteHandle, Transport};

use satchel_core::{Result, RetryPolicy, TransportConfig};
use std::collections::BTreeMap;
use std::sync::Arc;
use tracing::debug;

/// Create the transport described by `config`
pub async fn create_transport(
    config: &TransportConfig,
    policy: &RetryPolicy,
) -> Result<Arc<dyn Transport>> {
    let transport: Arc<dyn Transport> = match config {
        TransportConfig::Filesystem(settings) => {
            Arc::new(filesystem::FilesystemTransport::new(settings.base_dir.as_std_path()))
        }
        TransportConfig::S3(settings) => {
            Arc::new(s3::S3Transport::new(settings, policy.clone()).await?)
        }
        TransportConfig::Sftp(settings) => {
            Arc::new(sftp::SftpTransport::new(settings, policy.clone()))
        }
    };
    debug!("Created {} transport", transport.name());
    Ok(transport)
}

/// Create one transport per configured remote, keyed by remote name
pub async fn create_transports(
    remotes: &BTreeMap<String, TransportConfig>,
    policy: &RetryPolicy,
) -> Result<BTreeMap<String, Arc<dyn Transport>>> {
    let mut transports = BTreeMap::new();
    for (name, config) in remotes {
        transports.insert(name.clone(), create_transport(config, policy).await?);
    }
    Ok(transports)
}
