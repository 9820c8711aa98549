//! File-backed status log
//!
//! Each bag identifier gets its own JSONL shard under the log root:
//!
//! ```text
//! status/
//! ├── rac.5494124.jsonl
//! └── rac.c-5494125-4.jsonl
//! ```
//!
//! Appends take an exclusive `fs4` lock on that shard only, so deliveries
//! of different bags never wait on each other.

use crate::events::StatusEvent;
use crate::store::{latest, StatusLog};
use fs4::fs_std::FileExt;
use satchel_core::Result;
use std::fs::{self, File, OpenOptions};
use std::io::{self, BufRead, BufReader, Write};
use std::path::{Path, PathBuf};
use tracing::{debug, warn};

const SHARD_EXTENSION: &str = "jsonl";

/// Status log persisted as one append-only JSONL file per identifier
#[derive(Debug, Clone)]
pub struct JsonlStatusLog {
    root: PathBuf,
}

impl JsonlStatusLog {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into() }
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    fn shard_path(&self, identifier: &str) -> PathBuf {
        self.root
            .join(format!("{}.{}", shard_stem(identifier), SHARD_EXTENSION))
    }

    /// Open a shard for appending, creating it on first use
    fn open_for_append(&self, path: &Path) -> io::Result<File> {
        match OpenOptions::new().append(true).create_new(true).open(path) {
            Ok(file) => {
                debug!("Created status shard {}", path.display());
                Ok(file)
            }
            Err(e) if e.kind() == io::ErrorKind::AlreadyExists => {
                // Lost the first-append race, or the shard simply exists already
                debug!("Status shard {} already exists", path.display());
                OpenOptions::new().append(true).open(path)
            }
            Err(e) => Err(e),
        }
    }

    fn read_shard(path: &Path) -> Result<Vec<StatusEvent>> {
        let file = match File::open(path) {
            Ok(file) => file,
            Err(e) if e.kind() == io::ErrorKind::NotFound => return Ok(Vec::new()),
            Err(e) => return Err(e.into()),
        };
        file.lock_shared()?;

        let mut events = Vec::new();
        for (index, line) in BufReader::new(&file).lines().enumerate() {
            let line = line?;
            if line.trim().is_empty() {
                continue;
            }
            match serde_json::from_str::<StatusEvent>(&line) {
                Ok(event) => events.push(event),
                Err(e) => warn!(
                    "Skipping unreadable line {} of {}: {}",
                    index + 1,
                    path.display(),
                    e
                ),
            }
        }

        Ok(events)
    }

    fn shard_paths(&self) -> Result<Vec<PathBuf>> {
        let entries = match fs::read_dir(&self.root) {
            Ok(entries) => entries,
            Err(e) if e.kind() == io::ErrorKind::NotFound => return Ok(Vec::new()),
            Err(e) => return Err(e.into()),
        };

        let mut paths = Vec::new();
        for entry in entries {
            let path = entry?.path();
            if path.extension().is_some_and(|ext| ext == SHARD_EXTENSION) {
                paths.push(path);
            }
        }
        paths.sort();
        Ok(paths)
    }
}

impl StatusLog for JsonlStatusLog {
    fn append(&self, event: StatusEvent) -> Result<()> {
        fs::create_dir_all(&self.root)?;

        let path = self.shard_path(&event.bag_identifier);
        let mut file = self.open_for_append(&path)?;

        // Released when `file` is dropped
        file.lock_exclusive()?;

        let json_line = serde_json::to_string(&event)?;
        writeln!(file, "{}", json_line)?;
        file.sync_all()?;

        debug!(
            "Recorded {} for {} ({})",
            event.status, event.bag_identifier, event.id
        );
        Ok(())
    }

    fn get_all(&self) -> Result<Vec<StatusEvent>> {
        let mut events = Vec::new();
        for path in self.shard_paths()? {
            events.extend(Self::read_shard(&path)?);
        }
        Ok(events)
    }

    fn get_all_for(&self, identifier: &str) -> Result<Vec<StatusEvent>> {
        Self::read_shard(&self.shard_path(identifier))
    }

    fn get_latest_for_all(
        &self,
        since: Option<chrono::DateTime<chrono::Utc>>,
    ) -> Result<Vec<StatusEvent>> {
        let mut latest_events = Vec::new();
        for path in self.shard_paths()? {
            if let Some(event) = latest(Self::read_shard(&path)?) {
                if since.map_or(true, |since| event.timestamp >= since) {
                    latest_events.push(event);
                }
            }
        }
        latest_events.sort_by(|a, b| a.bag_identifier.cmp(&b.bag_identifier));
        Ok(latest_events)
    }
}

/// File-name-safe form of an identifier; anything outside `[A-Za-z0-9._-]` is percent-encoded
fn shard_stem(identifier: &str) -> String {
    let mut stem = String::with_capacity(identifier.len());
    for byte in identifier.bytes() {
        match byte {
            b'A'..=b'Z' | b'a'..=b'z' | b'0'..=b'9' | b'.' | b'_' | b'-' => stem.push(byte as char),
            _ => stem.push_str(&format!("%{:02X}", byte)),
        }
    }
    if stem.starts_with('.') {
        stem.replace_range(..1, "%2E");
    }
    stem
}
