//! Checksum algorithms used in payload and tag manifests

use md5::Md5;
use satchel_core::{Error, Result};
use sha1::Sha1;
use sha2::{Digest, Sha256, Sha512};
use std::fmt;
use std::fs::File;
use std::io::{self, Write};
use std::path::Path;
use std::str::FromStr;

/// Digest algorithm of a manifest
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum ChecksumAlgorithm {
    #[default]
    Md5,
    Sha1,
    Sha256,
    Sha512,
}

impl ChecksumAlgorithm {
    pub const ALL: [ChecksumAlgorithm; 4] = [
        ChecksumAlgorithm::Md5,
        ChecksumAlgorithm::Sha1,
        ChecksumAlgorithm::Sha256,
        ChecksumAlgorithm::Sha512,
    ];

    /// Lowercase name used in `manifest-<name>.txt`
    pub fn name(&self) -> &'static str {
        match self {
            ChecksumAlgorithm::Md5 => "md5",
            ChecksumAlgorithm::Sha1 => "sha1",
            ChecksumAlgorithm::Sha256 => "sha256",
            ChecksumAlgorithm::Sha512 => "sha512",
        }
    }

    /// Whether a tag manifest may be written with this algorithm.
    /// SHA-1 tag manifests are rejected by downstream repositories.
    pub fn allowed_in_tag_manifest(&self) -> bool {
        !matches!(self, ChecksumAlgorithm::Sha1)
    }

    pub fn payload_manifest_name(&self) -> String {
        format!("manifest-{}.txt", self.name())
    }

    pub fn tag_manifest_name(&self) -> String {
        format!("tagmanifest-{}.txt", self.name())
    }

    /// Lowercase hex digest of a file, streamed from disk
    pub fn file_digest(&self, path: &Path) -> Result<String> {
        let mut file = File::open(path)?;
        let digest = match self {
            ChecksumAlgorithm::Md5 => digest_reader::<Md5>(&mut file)?,
            ChecksumAlgorithm::Sha1 => digest_reader::<Sha1>(&mut file)?,
            ChecksumAlgorithm::Sha256 => digest_reader::<Sha256>(&mut file)?,
            ChecksumAlgorithm::Sha512 => digest_reader::<Sha512>(&mut file)?,
        };
        Ok(digest)
    }

    /// Lowercase hex digest of an in-memory buffer
    pub fn digest_bytes(&self, bytes: &[u8]) -> String {
        match self {
            ChecksumAlgorithm::Md5 => hex::encode(Md5::digest(bytes)),
            ChecksumAlgorithm::Sha1 => hex::encode(Sha1::digest(bytes)),
            ChecksumAlgorithm::Sha256 => hex::encode(Sha256::digest(bytes)),
            ChecksumAlgorithm::Sha512 => hex::encode(Sha512::digest(bytes)),
        }
    }
}

fn digest_reader<D: Digest + Write>(reader: &mut impl io::Read) -> io::Result<String> {
    let mut hasher = D::new();
    io::copy(reader, &mut hasher)?;
    Ok(hex::encode(hasher.finalize()))
}

impl fmt::Display for ChecksumAlgorithm {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

impl FromStr for ChecksumAlgorithm {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        let normalized = s.trim().to_ascii_lowercase().replace('-', "");
        ChecksumAlgorithm::ALL
            .into_iter()
            .find(|algorithm| algorithm.name() == normalized)
            .ok_or_else(|| Error::validation(format!("unsupported checksum algorithm: {}", s)))
    }
}
