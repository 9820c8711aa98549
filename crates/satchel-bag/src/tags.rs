//! Tag file builders
//!
//! Tag files are newline-terminated `Key: Value` lines. Field order is part of
//! the output format, so every builder renders its fields in a fixed sequence
//! followed by any extra fields in insertion order.

use chrono::{DateTime, SubsecRound, Utc};

/// Maximum length, in characters, of a squished tag value
pub const MAX_FIELD_LENGTH: usize = 255;

/// Description used when a metadata tag is built without one
pub const DEFAULT_DESCRIPTION: &str = "Digital object packaged for preservation";

/// Default access level of the metadata tag
pub const DEFAULT_ACCESS: &str = "Institution";

/// Default storage tier of the metadata tag
pub const DEFAULT_STORAGE_OPTION: &str = "Standard";

const BAGGING_DATE_FORMAT: &str = "%Y-%m-%dT%H:%M:%SZ";

/// Normalise free text for a tag value
///
/// Trims the text, collapses every whitespace run (newlines included) into a
/// single space and truncates the result to [`MAX_FIELD_LENGTH`] characters.
pub fn squish(text: &str) -> String {
    let collapsed = text.split_whitespace().collect::<Vec<_>>().join(" ");
    match collapsed.char_indices().nth(MAX_FIELD_LENGTH) {
        Some((byte_index, _)) => collapsed[..byte_index].to_string(),
        None => collapsed,
    }
}

/// Ordered key/value fields of one tag file
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct TagData {
    fields: Vec<(String, String)>,
}

impl TagData {
    pub fn new() -> Self {
        Self::default()
    }

    /// Set a field. An existing key keeps its position and takes the new value.
    pub fn insert(&mut self, key: impl Into<String>, value: impl Into<String>) {
        let key = key.into();
        let value = value.into();
        match self.fields.iter_mut().find(|(existing, _)| *existing == key) {
            Some(field) => field.1 = value,
            None => self.fields.push((key, value)),
        }
    }

    pub fn get(&self, key: &str) -> Option<&str> {
        self.fields
            .iter()
            .find(|(existing, _)| existing == key)
            .map(|(_, value)| value.as_str())
    }

    pub fn len(&self) -> usize {
        self.fields.len()
    }

    pub fn is_empty(&self) -> bool {
        self.fields.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, &str)> {
        self.fields.iter().map(|(k, v)| (k.as_str(), v.as_str()))
    }

    /// Append every field of `other`, overriding keys already present
    pub fn merge(&mut self, other: &TagData) {
        for (key, value) in other.iter() {
            self.insert(key, value);
        }
    }

    /// Render as `Key: Value\n` lines
    pub fn serialize(&self) -> String {
        let mut out = String::new();
        for (key, value) in &self.fields {
            out.push_str(key);
            out.push_str(": ");
            out.push_str(value);
            out.push('\n');
        }
        out
    }
}

impl<K: Into<String>, V: Into<String>> FromIterator<(K, V)> for TagData {
    fn from_iter<I: IntoIterator<Item = (K, V)>>(iter: I) -> Self {
        let mut data = TagData::new();
        for (key, value) in iter {
            data.insert(key, value);
        }
        data
    }
}

/// Descriptor tag (`bag-info.txt`)
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BagInfo {
    source_organization: String,
    bag_count: (u32, u32),
    bagging_date: DateTime<Utc>,
    internal_sender_identifier: String,
    internal_sender_description: String,
    extra: TagData,
}

impl BagInfo {
    /// Descriptor stamped with the current instant
    pub fn new(
        source_organization: &str,
        internal_sender_identifier: &str,
        internal_sender_description: &str,
    ) -> Self {
        Self::at(
            source_organization,
            internal_sender_identifier,
            internal_sender_description,
            Utc::now(),
        )
    }

    /// Descriptor stamped with a fixed instant. Sub-second precision is dropped.
    pub fn at(
        source_organization: &str,
        internal_sender_identifier: &str,
        internal_sender_description: &str,
        instant: DateTime<Utc>,
    ) -> Self {
        Self {
            source_organization: squish(source_organization),
            bag_count: (1, 1),
            bagging_date: instant.trunc_subsecs(0),
            internal_sender_identifier: squish(internal_sender_identifier),
            internal_sender_description: squish(internal_sender_description),
            extra: TagData::new(),
        }
    }

    pub fn with_bag_count(mut self, index: u32, total: u32) -> Self {
        self.bag_count = (index, total);
        self
    }

    /// Add a field rendered after the fixed ones
    pub fn with_field(mut self, key: &str, value: &str) -> Self {
        self.extra.insert(key, squish(value));
        self
    }

    pub fn bagging_date(&self) -> DateTime<Utc> {
        self.bagging_date
    }

    pub fn to_tag_data(&self) -> TagData {
        let mut data = TagData::new();
        data.insert("Source-Organization", self.source_organization.as_str());
        data.insert(
            "Bag-Count",
            format!("{} of {}", self.bag_count.0, self.bag_count.1),
        );
        data.insert(
            "Bagging-Date",
            self.bagging_date.format(BAGGING_DATE_FORMAT).to_string(),
        );
        data.insert(
            "Internal-Sender-Identifier",
            self.internal_sender_identifier.as_str(),
        );
        data.insert(
            "Internal-Sender-Description",
            self.internal_sender_description.as_str(),
        );
        data.merge(&self.extra);
        data
    }

    pub fn serialize(&self) -> String {
        self.to_tag_data().serialize()
    }
}

/// Repository metadata tag (`repository-info.txt`)
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RepositoryMetadata {
    title: String,
    description: String,
    item_description: Option<String>,
    creator: Option<String>,
    access: String,
    storage_option: String,
    extra: TagData,
}

impl RepositoryMetadata {
    pub fn new(title: &str) -> Self {
        Self {
            title: squish(title),
            description: DEFAULT_DESCRIPTION.to_string(),
            item_description: None,
            creator: None,
            access: DEFAULT_ACCESS.to_string(),
            storage_option: DEFAULT_STORAGE_OPTION.to_string(),
            extra: TagData::new(),
        }
    }

    pub fn with_description(mut self, description: &str) -> Self {
        self.description = squish(description);
        self
    }

    pub fn with_item_description(mut self, item_description: &str) -> Self {
        self.item_description = Some(squish(item_description));
        self
    }

    pub fn with_creator(mut self, creator: &str) -> Self {
        self.creator = Some(squish(creator));
        self
    }

    pub fn with_access(mut self, access: &str) -> Self {
        self.access = squish(access);
        self
    }

    pub fn with_storage_option(mut self, storage_option: &str) -> Self {
        self.storage_option = squish(storage_option);
        self
    }

    pub fn with_field(mut self, key: &str, value: &str) -> Self {
        self.extra.insert(key, squish(value));
        self
    }

    pub fn title(&self) -> &str {
        &self.title
    }

    pub fn to_tag_data(&self) -> TagData {
        let mut data = TagData::new();
        data.insert("Title", self.title.as_str());
        data.insert("Description", self.description.as_str());
        if let Some(item_description) = &self.item_description {
            data.insert("Item-Description", item_description.as_str());
        }
        if let Some(creator) = &self.creator {
            data.insert("Creator", creator.as_str());
        }
        data.insert("Access", self.access.as_str());
        data.insert("Storage-Option", self.storage_option.as_str());
        data.merge(&self.extra);
        data
    }

    pub fn serialize(&self) -> String {
        self.to_tag_data().serialize()
    }
}
