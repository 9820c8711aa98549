//! Tar packaging of finished bags
//!
//! Archives are uncompressed tar files whose only top-level entry is the bag
//! directory itself, so extracting `rac.5494124.tar` yields `rac.5494124/`.
//! Failures are reported as [`Error::Archive`] and are never retried.

use satchel_core::{Error, Result};
use std::fs::{self, File};
use std::io::{BufWriter, Write};
use std::path::{Path, PathBuf};
use tar::{Archive, Builder as TarBuilder};
use tracing::{debug, info};

/// Pack `src_dir` into the tar file `dest_file`
pub fn create(src_dir: &Path, dest_file: &Path) -> Result<PathBuf> {
    if !src_dir.is_dir() {
        return Err(Error::archive(format!(
            "source directory {} does not exist",
            src_dir.display()
        )));
    }
    ensure_not_inside(src_dir, dest_file)?;

    let top_level = src_dir.file_name().ok_or_else(|| {
        Error::archive(format!("{} has no directory name", src_dir.display()))
    })?;

    if let Some(parent) = dest_file.parent() {
        fs::create_dir_all(parent).map_err(|e| {
            Error::archive(format!("failed to create {}: {}", parent.display(), e))
        })?;
    }

    let result = (|| -> std::io::Result<()> {
        let file = File::create(dest_file)?;
        let mut tar = TarBuilder::new(BufWriter::new(file));
        tar.follow_symlinks(false);
        tar.append_dir_all(top_level, src_dir)?;
        let mut writer = tar.into_inner()?;
        writer.flush()?;
        Ok(())
    })();

    if let Err(e) = result {
        // Never leave a truncated archive behind
        let _ = fs::remove_file(dest_file);
        return Err(Error::archive(format!(
            "failed to pack {} into {}: {}",
            src_dir.display(),
            dest_file.display(),
            e
        )));
    }

    info!("Packed {} into {}", src_dir.display(), dest_file.display());
    Ok(dest_file.to_path_buf())
}

/// Extract every entry of `src_file` into `dest_dir`
pub fn open(src_file: &Path, dest_dir: &Path) -> Result<()> {
    if !src_file.is_file() {
        return Err(Error::archive(format!(
            "archive {} does not exist",
            src_file.display()
        )));
    }
    ensure_not_inside(src_file, dest_dir)?;

    let result = (|| -> std::io::Result<()> {
        fs::create_dir_all(dest_dir)?;
        let mut archive = Archive::new(File::open(src_file)?);
        archive.unpack(dest_dir)
    })();

    result.map_err(|e| {
        Error::archive(format!(
            "failed to extract {} into {}: {}",
            src_file.display(),
            dest_dir.display(),
            e
        ))
    })?;

    debug!("Extracted {} into {}", src_file.display(), dest_dir.display());
    Ok(())
}

fn ensure_not_inside(source: &Path, destination: &Path) -> Result<()> {
    let source = resolve(source);
    let destination = resolve(destination);
    if destination.starts_with(&source) {
        return Err(Error::archive(format!(
            "destination {} lies inside source {}",
            destination.display(),
            source.display()
        )));
    }
    Ok(())
}

/// Canonicalise the longest existing ancestor and re-append the remainder,
/// so paths that do not exist yet still compare against symlink-free sources.
fn resolve(path: &Path) -> PathBuf {
    let absolute = std::path::absolute(path).unwrap_or_else(|_| path.to_path_buf());
    let mut existing = absolute.as_path();
    let mut remainder = Vec::new();

    loop {
        if let Ok(canonical) = existing.canonicalize() {
            return remainder
                .iter()
                .rev()
                .fold(canonical, |acc: PathBuf, part| acc.join(part));
        }
        match (existing.parent(), existing.file_name()) {
            (Some(parent), Some(name)) => {
                remainder.push(name.to_os_string());
                existing = parent;
            }
            _ => return absolute,
        }
    }
}
