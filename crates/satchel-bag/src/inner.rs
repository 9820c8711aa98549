//! Validation of payloads that carry a nested bag

use crate::bag::Bag;
use satchel_core::{Error, Result};
use std::path::{Path, PathBuf};
use tracing::debug;

/// Check run against a payload directory before it is bagged
pub trait PayloadValidator: Send + Sync {
    /// Short name used in logs
    fn name(&self) -> &str;

    fn validate(&self, data_dir: &Path) -> Result<()>;
}

/// Validates a previously assembled bag found at `relative_path` inside the payload
#[derive(Debug, Clone)]
pub struct InnerBagValidator {
    relative_path: PathBuf,
    strict: bool,
}

impl InnerBagValidator {
    pub fn new(relative_path: impl Into<PathBuf>) -> Self {
        Self {
            relative_path: relative_path.into(),
            strict: false,
        }
    }

    /// Also reject payload files the nested bag's manifests do not list
    pub fn strict(mut self, strict: bool) -> Self {
        self.strict = strict;
        self
    }
}

impl PayloadValidator for InnerBagValidator {
    fn name(&self) -> &str {
        "inner-bag"
    }

    fn validate(&self, data_dir: &Path) -> Result<()> {
        let nested = data_dir.join(&self.relative_path);
        if !nested.is_dir() {
            return Err(Error::not_found(format!("nested bag {}", nested.display())));
        }

        debug!("Validating nested bag at {}", nested.display());
        Bag::open(nested)?.validate(self.strict)?.into_result()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::tags::BagInfo;
    use std::fs;
    use tempfile::TempDir;

    fn nested_bag(data_dir: &Path) -> PathBuf {
        let mut bag = Bag::create(data_dir.join("inner")).unwrap();
        fs::write(bag.payload_dir().join("scan.tif"), "pixels").unwrap();
        bag.add_bag_info(&BagInfo::new("Org", "1", "nested")).unwrap();
        bag.add_manifests(&[]).unwrap();
        bag.root().to_path_buf()
    }

    #[test]
    fn test_valid_nested_bag() {
        let temp = TempDir::new().unwrap();
        nested_bag(temp.path());

        let validator = InnerBagValidator::new("inner").strict(true);
        assert!(validator.validate(temp.path()).is_ok());
    }

    #[test]
    fn test_absent_nested_bag_is_not_found() {
        let temp = TempDir::new().unwrap();
        let err = InnerBagValidator::new("inner")
            .validate(temp.path())
            .unwrap_err();
        assert!(matches!(err, Error::NotFound { .. }));
    }

    #[test]
    fn test_invalid_nested_bag_carries_message() {
        let temp = TempDir::new().unwrap();
        let root = nested_bag(temp.path());
        fs::write(root.join("data/scan.tif"), "corrupted").unwrap();

        let err = InnerBagValidator::new("inner")
            .validate(temp.path())
            .unwrap_err();
        match err {
            Error::Validation { message } => {
                assert!(message.contains("checksum mismatch for data/scan.tif"))
            }
            other => panic!("expected validation error, got {:?}", other),
        }
    }
}
