//! Transport capability trait

use async_trait::async_trait;
use satchel_core::Result;
use std::fmt;
use std::path::{Path, PathBuf};

/// Where a deposited file ended up
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RemoteHandle {
    /// Path on a locally mounted filesystem
    Local(PathBuf),
    /// Object in a bucket
    Object { bucket: String, key: String },
    /// File on an SFTP host
    Sftp { host: String, path: String },
}

impl fmt::Display for RemoteHandle {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            RemoteHandle::Local(path) => write!(f, "{}", path.display()),
            RemoteHandle::Object { bucket, key } => write!(f, "s3://{}/{}", bucket, key),
            RemoteHandle::Sftp { host, path } => write!(f, "sftp://{}/{}", host, path.trim_start_matches('/')),
        }
    }
}

/// Moves files between local disk and one configured remote
///
/// Remote paths are relative to the remote's configured root (base
/// directory, key prefix or SFTP base dir). `None` means the root itself.
#[async_trait]
pub trait Transport: Send + Sync {
    /// Transport type name (`filesystem`, `s3`, `sftp`)
    fn name(&self) -> &'static str;

    /// Upload `local_path` into `remote_dir`
    async fn send_file(&self, local_path: &Path, remote_dir: Option<&str>) -> Result<RemoteHandle>;

    /// Download a single file into `local_dir`, returning the local path
    async fn retrieve_file(&self, remote_path: &str, local_dir: &Path) -> Result<PathBuf>;

    /// Download everything under `remote_path` into `local_path`,
    /// recreating intermediate directories
    async fn retrieve_from_path(&self, local_path: &Path, remote_path: Option<&str>) -> Result<()>;
}
