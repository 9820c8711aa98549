//! Bag identifiers
//!
//! A [`BagIdentifier`] is the natural key for every status event and the
//! filename stem of working directories and exported archives.

use std::fmt;

/// Identifier of one package: `repository.{context-}object_id{-part_id}`
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct BagIdentifier {
    repository: String,
    object_id: String,
    context: Option<String>,
    part_id: Option<String>,
}

impl BagIdentifier {
    pub fn new(repository: impl Into<String>, object_id: impl Into<String>) -> Self {
        Self {
            repository: repository.into(),
            object_id: object_id.into(),
            context: None,
            part_id: None,
        }
    }

    /// Sets the context segment. Empty strings contribute no segment.
    pub fn with_context(mut self, context: impl Into<String>) -> Self {
        self.context = non_empty(context.into());
        self
    }

    /// Sets the part segment. Empty strings contribute no segment.
    pub fn with_part_id(mut self, part_id: impl Into<String>) -> Self {
        self.part_id = non_empty(part_id.into());
        self
    }

    pub fn repository(&self) -> &str {
        &self.repository
    }

    pub fn object_id(&self) -> &str {
        &self.object_id
    }

    pub fn context(&self) -> Option<&str> {
        self.context.as_deref()
    }

    pub fn part_id(&self) -> Option<&str> {
        self.part_id.as_deref()
    }
}

fn non_empty(value: String) -> Option<String> {
    if value.is_empty() {
        None
    } else {
        Some(value)
    }
}

impl fmt::Display for BagIdentifier {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}.", self.repository)?;
        if let Some(context) = &self.context {
            write!(f, "{}-", context)?;
        }
        f.write_str(&self.object_id)?;
        if let Some(part_id) = &self.part_id {
            write!(f, "-{}", part_id)?;
        }
        Ok(())
    }
}
