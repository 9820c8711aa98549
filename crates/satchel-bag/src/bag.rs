//! Bag assembly and validation
//!
//! A [`Bag`] owns a directory on disk. Tag files are written at its root and
//! remembered so the tag manifest can cover them; payload lives under
//! [`PAYLOAD_DIR`].

use crate::checksum::ChecksumAlgorithm;
use crate::tags::{BagInfo, RepositoryMetadata};
use satchel_core::{Error, Result};
use std::collections::{BTreeSet, HashSet};
use std::fs;
use std::path::{Component, Path, PathBuf};
use tracing::{debug, warn};
use walkdir::WalkDir;

/// Payload directory name inside a bag
pub const PAYLOAD_DIR: &str = "data";

/// Bag declaration file
pub const BAG_DECLARATION: &str = "bagit.txt";

/// Descriptor tag file
pub const BAG_INFO_FILENAME: &str = "bag-info.txt";

/// Repository metadata tag file
pub const METADATA_TAG_FILENAME: &str = "repository-info.txt";

const BAG_DECLARATION_TEXT: &str = "BagIt-Version: 0.97\nTag-File-Character-Encoding: UTF-8\n";
const PAYLOAD_MANIFEST_PREFIX: &str = "manifest-";
const TAG_MANIFEST_PREFIX: &str = "tagmanifest-";

/// Outcome of [`Bag::validate`]
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ValidationResult {
    pub is_valid: bool,
    /// Newline-joined description of every problem found; empty when valid
    pub error_message: String,
}

impl ValidationResult {
    fn from_problems(problems: Vec<String>) -> Self {
        Self {
            is_valid: problems.is_empty(),
            error_message: problems.join("\n"),
        }
    }

    /// Convert an invalid result into a [`Error::Validation`]
    pub fn into_result(self) -> Result<()> {
        if self.is_valid {
            Ok(())
        } else {
            Err(Error::validation(self.error_message))
        }
    }
}

/// A bag directory under construction or inspection
#[derive(Debug)]
pub struct Bag {
    root: PathBuf,
    tag_files: BTreeSet<String>,
}

impl Bag {
    /// Create `root` and its empty payload directory
    pub fn create(root: impl Into<PathBuf>) -> Result<Self> {
        let root = root.into();
        fs::create_dir_all(root.join(PAYLOAD_DIR))?;
        debug!("Created bag at {}", root.display());
        Ok(Self {
            root,
            tag_files: BTreeSet::new(),
        })
    }

    /// Open an existing bag, picking up the tag files already at its root
    pub fn open(root: impl Into<PathBuf>) -> Result<Self> {
        let root = root.into();
        if !root.is_dir() {
            return Err(Error::not_found(format!("bag {}", root.display())));
        }

        let mut tag_files = BTreeSet::new();
        for entry in fs::read_dir(&root)? {
            let entry = entry?;
            if !entry.file_type()?.is_file() {
                continue;
            }
            let name = entry.file_name().to_string_lossy().into_owned();
            if !is_manifest_name(&name) {
                tag_files.insert(name);
            }
        }

        Ok(Self { root, tag_files })
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    pub fn payload_dir(&self) -> PathBuf {
        self.root.join(PAYLOAD_DIR)
    }

    /// Tag files that the next tag manifest will cover
    pub fn tag_files(&self) -> impl Iterator<Item = &str> {
        self.tag_files.iter().map(String::as_str)
    }

    /// Write a tag file at the bag root and record it for the tag manifest
    pub fn add_tag_file(&mut self, text: &str, file_name: &str) -> Result<PathBuf> {
        if file_name.is_empty()
            || file_name.contains(['/', '\\'])
            || file_name == PAYLOAD_DIR
            || is_manifest_name(file_name)
        {
            return Err(Error::validation(format!(
                "invalid tag file name: {:?}",
                file_name
            )));
        }

        let path = self.root.join(file_name);
        fs::write(&path, text)?;
        self.tag_files.insert(file_name.to_string());
        debug!("Wrote tag file {}", path.display());
        Ok(path)
    }

    /// Write the bag declaration and the descriptor tag
    pub fn add_bag_info(&mut self, info: &BagInfo) -> Result<()> {
        self.add_tag_file(BAG_DECLARATION_TEXT, BAG_DECLARATION)?;
        self.add_tag_file(&info.serialize(), BAG_INFO_FILENAME)?;
        Ok(())
    }

    /// Write the repository metadata tag
    pub fn add_metadata(&mut self, metadata: &RepositoryMetadata) -> Result<()> {
        self.add_tag_file(&metadata.serialize(), METADATA_TAG_FILENAME)?;
        Ok(())
    }

    /// Relative paths (`data/...`, forward slashes) of every payload file, sorted
    pub fn payload_files(&self) -> Result<Vec<String>> {
        let payload_dir = self.payload_dir();
        if !payload_dir.is_dir() {
            return Err(Error::not_found(format!(
                "payload directory {}",
                payload_dir.display()
            )));
        }

        let mut files = Vec::new();
        for entry in WalkDir::new(&payload_dir).follow_links(false) {
            let entry = entry.map_err(|e| Error::Io(e.into()))?;
            if entry.file_type().is_dir() {
                continue;
            }
            let relative = entry
                .path()
                .strip_prefix(&self.root)
                .unwrap_or(entry.path());
            files.push(to_manifest_path(relative));
        }
        files.sort();
        Ok(files)
    }

    /// Write payload and tag manifests for `algorithms`
    ///
    /// An empty slice means the default algorithm. Manifests from earlier
    /// calls are replaced. No tag manifest is written for an algorithm that
    /// [`ChecksumAlgorithm::allowed_in_tag_manifest`] rejects.
    pub fn add_manifests(&mut self, algorithms: &[ChecksumAlgorithm]) -> Result<()> {
        let algorithms: BTreeSet<ChecksumAlgorithm> = if algorithms.is_empty() {
            BTreeSet::from([ChecksumAlgorithm::default()])
        } else {
            algorithms.iter().copied().collect()
        };

        self.remove_manifests()?;

        let payload = self.payload_files()?;
        let mut manifest_names = Vec::new();
        for algorithm in &algorithms {
            let mut text = String::new();
            for relative in &payload {
                let digest = algorithm.file_digest(&self.root.join(relative))?;
                push_manifest_line(&mut text, &digest, relative);
            }
            let name = algorithm.payload_manifest_name();
            fs::write(self.root.join(&name), text)?;
            debug!("Wrote {} ({} entries)", name, payload.len());
            manifest_names.push(name);
        }

        let mut covered: Vec<&str> = self.tag_files.iter().map(String::as_str).collect();
        covered.extend(manifest_names.iter().map(String::as_str));
        covered.sort_unstable();

        for algorithm in &algorithms {
            if !algorithm.allowed_in_tag_manifest() {
                warn!("Skipping {} tag manifest", algorithm);
                continue;
            }
            let mut text = String::new();
            for name in &covered {
                let digest = algorithm.file_digest(&self.root.join(name))?;
                push_manifest_line(&mut text, &digest, name);
            }
            fs::write(self.root.join(algorithm.tag_manifest_name()), text)?;
        }

        Ok(())
    }

    fn remove_manifests(&self) -> Result<()> {
        for entry in fs::read_dir(&self.root)? {
            let entry = entry?;
            let name = entry.file_name().to_string_lossy().into_owned();
            if is_manifest_name(&name) && entry.file_type()?.is_file() {
                fs::remove_file(entry.path())?;
            }
        }
        Ok(())
    }

    /// Check structure and recompute every manifest checksum
    ///
    /// Problems are collected into the returned [`ValidationResult`]; `Err`
    /// is reserved for I/O failures such as an unreadable manifest.
    pub fn validate(&self, strict: bool) -> Result<ValidationResult> {
        let mut problems = Vec::new();

        if !self.root.join(BAG_DECLARATION).is_file() {
            problems.push(format!("bag declaration {} is missing", BAG_DECLARATION));
        }
        if !self.payload_dir().is_dir() {
            problems.push(format!("payload directory {}/ is missing", PAYLOAD_DIR));
            return Ok(ValidationResult::from_problems(problems));
        }

        let payload_manifests = self.manifests(PAYLOAD_MANIFEST_PREFIX)?;
        if payload_manifests.is_empty() {
            problems.push("no payload manifest found".to_string());
        }

        let mut declared = HashSet::new();
        for (name, algorithm) in &payload_manifests {
            for path in self.check_manifest(name, *algorithm, &mut problems)? {
                if !path.starts_with(&format!("{}/", PAYLOAD_DIR)) {
                    problems.push(format!("{}: {} is outside the payload directory", name, path));
                }
                declared.insert(path);
            }
        }

        for (name, algorithm) in &self.manifests(TAG_MANIFEST_PREFIX)? {
            self.check_manifest(name, *algorithm, &mut problems)?;
        }

        if strict {
            for path in self.payload_files()? {
                if !declared.contains(&path) {
                    problems.push(format!("{} is not listed in any payload manifest", path));
                }
            }
        }

        Ok(ValidationResult::from_problems(problems))
    }

    /// Manifests with the given prefix, sorted by name
    fn manifests(&self, prefix: &str) -> Result<Vec<(String, Option<ChecksumAlgorithm>)>> {
        let mut found = Vec::new();
        for entry in fs::read_dir(&self.root)? {
            let entry = entry?;
            let name = entry.file_name().to_string_lossy().into_owned();
            let Some(algorithm) = name
                .strip_prefix(prefix)
                .and_then(|rest| rest.strip_suffix(".txt"))
            else {
                continue;
            };
            let algorithm = algorithm.parse().ok();
            found.push((name, algorithm));
        }
        found.sort();
        Ok(found)
    }

    /// Verify one manifest and return the paths it declares
    fn check_manifest(
        &self,
        name: &str,
        algorithm: Option<ChecksumAlgorithm>,
        problems: &mut Vec<String>,
    ) -> Result<Vec<String>> {
        let Some(algorithm) = algorithm else {
            problems.push(format!("{}: unsupported checksum algorithm", name));
            return Ok(Vec::new());
        };

        let Ok(text) = String::from_utf8(fs::read(self.root.join(name))?) else {
            problems.push(format!("{}: not valid UTF-8", name));
            return Ok(Vec::new());
        };
        let mut declared = Vec::new();

        for (line_number, line) in text.lines().enumerate() {
            if line.trim().is_empty() {
                continue;
            }
            let Some((expected, path)) = line.split_once(char::is_whitespace) else {
                problems.push(format!("{}: line {} is malformed", name, line_number + 1));
                continue;
            };
            let path = decode_manifest_path(path.trim_start());
            if !is_safe_relative(&path) {
                problems.push(format!("{}: unsafe path {}", name, path));
                continue;
            }

            let file = self.root.join(&path);
            if !file.is_file() {
                problems.push(format!("{}: {} does not exist", name, path));
            } else {
                let actual = algorithm.file_digest(&file)?;
                if !actual.eq_ignore_ascii_case(expected) {
                    problems.push(format!(
                        "{}: checksum mismatch for {} (expected {}, found {})",
                        name, path, expected, actual
                    ));
                }
            }
            declared.push(path);
        }

        Ok(declared)
    }
}

fn is_manifest_name(name: &str) -> bool {
    (name.starts_with(PAYLOAD_MANIFEST_PREFIX) || name.starts_with(TAG_MANIFEST_PREFIX))
        && name.ends_with(".txt")
}

fn is_safe_relative(path: &str) -> bool {
    !path.is_empty()
        && Path::new(path)
            .components()
            .all(|component| matches!(component, Component::Normal(_)))
}

fn to_manifest_path(relative: &Path) -> String {
    relative
        .components()
        .map(|component| component.as_os_str().to_string_lossy())
        .collect::<Vec<_>>()
        .join("/")
}

fn push_manifest_line(text: &mut String, digest: &str, path: &str) {
    text.push_str(digest);
    text.push_str("  ");
    text.push_str(&encode_manifest_path(path));
    text.push('\n');
}

// Line breaks in file names would split a manifest entry
fn encode_manifest_path(path: &str) -> String {
    path.replace('%', "%25")
        .replace('\n', "%0A")
        .replace('\r', "%0D")
}

fn decode_manifest_path(path: &str) -> String {
    path.replace("%0A", "\n")
        .replace("%0D", "\r")
        .replace("%25", "%")
}
