//! Transport to a locally mounted filesystem

use crate::traits::{RemoteHandle, Transport};
use crate::utils::{file_name, join_under};
use async_trait::async_trait;
use satchel_core::{Error, Result};
use std::fs;
use std::io;
use std::path::{Path, PathBuf};
use tracing::{debug, info};
use walkdir::WalkDir;

/// Copies files to and from a base directory
#[derive(Debug, Clone)]
pub struct FilesystemTransport {
    base_dir: PathBuf,
}

impl FilesystemTransport {
    pub fn new(base_dir: impl Into<PathBuf>) -> Self {
        Self {
            base_dir: base_dir.into(),
        }
    }

    pub fn base_dir(&self) -> &Path {
        &self.base_dir
    }
}

#[async_trait]
impl Transport for FilesystemTransport {
    fn name(&self) -> &'static str {
        "filesystem"
    }

    async fn send_file(&self, local_path: &Path, remote_dir: Option<&str>) -> Result<RemoteHandle> {
        let dest_dir = join_under(&self.base_dir, remote_dir)?;
        let dest = dest_dir.join(file_name(local_path)?);
        let context = format!("copy {} to {}", local_path.display(), dest.display());

        tokio::fs::create_dir_all(&dest_dir)
            .await
            .map_err(|e| Error::transport(&context, e.to_string()))?;
        tokio::fs::copy(local_path, &dest)
            .await
            .map_err(|e| Error::transport(&context, e.to_string()))?;

        info!("Copied {} to {}", local_path.display(), dest.display());
        Ok(RemoteHandle::Local(dest))
    }

    async fn retrieve_file(&self, remote_path: &str, local_dir: &Path) -> Result<PathBuf> {
        let source = join_under(&self.base_dir, Some(remote_path))?;
        if !source.is_file() {
            return Err(Error::not_found(format!("remote file {}", source.display())));
        }
        let dest = local_dir.join(file_name(&source)?);
        let context = format!("copy {} to {}", source.display(), dest.display());

        tokio::fs::create_dir_all(local_dir)
            .await
            .map_err(|e| Error::transport(&context, e.to_string()))?;
        tokio::fs::copy(&source, &dest)
            .await
            .map_err(|e| Error::transport(&context, e.to_string()))?;

        debug!("Retrieved {}", dest.display());
        Ok(dest)
    }

    async fn retrieve_from_path(&self, local_path: &Path, remote_path: Option<&str>) -> Result<()> {
        let source = join_under(&self.base_dir, remote_path)?;
        if !source.is_dir() {
            return Err(Error::not_found(format!("remote directory {}", source.display())));
        }
        let dest = local_path.to_path_buf();
        let context = format!("copy tree {} to {}", source.display(), dest.display());

        let copied = tokio::task::spawn_blocking(move || copy_tree(&source, &dest))
            .await
            .map_err(|e| Error::transport(&context, e.to_string()))?
            .map_err(|e| Error::transport(&context, e.to_string()))?;

        info!("Retrieved {} files into {}", copied, local_path.display());
        Ok(())
    }
}

/// Recursively copy the contents of `src` into `dest`, returning the number of files copied
///
/// Symlinks are recreated as links on unix and copied as files elsewhere.
pub fn copy_tree(src: &Path, dest: &Path) -> io::Result<u64> {
    fs::create_dir_all(dest)?;
    let mut copied = 0;

    for entry in WalkDir::new(src).min_depth(1).follow_links(false) {
        let entry = entry?;
        let relative = entry
            .path()
            .strip_prefix(src)
            .map_err(|e| io::Error::new(io::ErrorKind::Other, e))?;
        let target = dest.join(relative);
        let file_type = entry.file_type();

        if file_type.is_dir() {
            fs::create_dir_all(&target)?;
        } else if file_type.is_symlink() {
            copy_symlink(entry.path(), &target)?;
            copied += 1;
        } else {
            fs::copy(entry.path(), &target)?;
            copied += 1;
        }
    }

    Ok(copied)
}

#[cfg(unix)]
fn copy_symlink(link: &Path, target: &Path) -> io::Result<()> {
    let points_to = fs::read_link(link)?;
    std::os::unix::fs::symlink(points_to, target)
}

#[cfg(not(unix))]
fn copy_symlink(link: &Path, target: &Path) -> io::Result<()> {
    fs::copy(link, target).map(|_| ())
}
