//! Package assembly for satchel
//!
//! A bag is a directory holding a `data/` payload, tag files at its root and
//! one payload manifest plus one tag manifest per checksum algorithm:
//!
//! ```text
//! rac.5494124/
//! ├── bagit.txt
//! ├── bag-info.txt
//! ├── repository-info.txt
//! ├── manifest-md5.txt
//! ├── tagmanifest-md5.txt
//! └── data/
//!     └── ...
//! ```
//!
//! This crate builds the tag files ([`tags`]), writes and checks manifests
//! ([`bag`]), validates nested bags ([`inner`]) and tars finished bags ([`archive`]).

pub mod archive;
pub mod bag;
pub mod checksum;
pub mod inner;
pub mod tags;

pub use bag::{Bag, ValidationResult, BAG_INFO_FILENAME, METADATA_TAG_FILENAME, PAYLOAD_DIR};
pub use checksum::ChecksumAlgorithm;
pub use inner::{InnerBagValidator, PayloadValidator};
pub use tags::{squish, BagInfo, RepositoryMetadata, TagData, DEFAULT_DESCRIPTION};
