//! Sparse, field-level patches to a single [`ResourceEntry`].
//!
//! A [`ChangeSet`] is an immutable value: each builder method consumes the set
//! and returns a new one, so a partially built patch is never shared.
//!
//! ```rust
//! use bundlesync::{ChangeSet, ResourceEntry, config::Limits};
//!
//! let mut entry = ResourceEntry::source("Hello");
//! entry.metadata.insert("owner".to_string(), "alice".to_string());
//!
//! let change = ChangeSet::new()
//!     .with_reviewed(true)
//!     .without_metadata_key("owner");
//! let updated = bundlesync::change_set::apply(&entry, &change, &Limits::default())?;
//!
//! assert_eq!(updated.reviewed, Some(true));
//! assert!(updated.metadata.is_empty());
//! assert_eq!(updated.value.as_deref(), Some("Hello"));
//! # Ok::<(), bundlesync::Error>(())
//! ```

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

use crate::{
    config::Limits,
    error::Error,
    types::{ResourceEntry, validate_entry_value},
};

/// Metadata edits keyed by metadata key. `None` removes the key.
pub type MetadataChanges = BTreeMap<String, Option<String>>;

#[derive(Debug, Clone, PartialEq, Eq, Default, Deserialize, Serialize)]
pub struct ChangeSet {
    #[serde(skip_serializing_if = "Option::is_none", default)]
    value: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none", default)]
    reviewed: Option<bool>,
    #[serde(skip_serializing_if = "Option::is_none", default)]
    notes: Option<Vec<String>>,
    #[serde(skip_serializing_if = "Option::is_none", default)]
    metadata: Option<MetadataChanges>,
    #[serde(skip_serializing_if = "Option::is_none", default)]
    partner_status: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none", default)]
    sequence_number: Option<i64>,
}

/// Result of applying a change set to an entry.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AppliedChange {
    pub entry: ResourceEntry,
    /// The patch carried a value different from the current one.
    pub value_changed: bool,
}

impl ChangeSet {
    /// An empty change set; applying it is the identity.
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_value(mut self, value: impl Into<String>) -> Self {
        self.value = Some(value.into());
        self
    }

    pub fn with_reviewed(mut self, reviewed: bool) -> Self {
        self.reviewed = Some(reviewed);
        self
    }

    /// Replaces the whole notes list, even with an empty one.
    pub fn with_notes<I, S>(mut self, notes: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.notes = Some(notes.into_iter().map(Into::into).collect());
        self
    }

    /// Inserts or overwrites one metadata key.
    pub fn with_metadata_entry(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.metadata
            .get_or_insert_with(BTreeMap::new)
            .insert(key.into(), Some(value.into()));
        self
    }

    /// Removes one metadata key.
    pub fn without_metadata_key(mut self, key: impl Into<String>) -> Self {
        self.metadata
            .get_or_insert_with(BTreeMap::new)
            .insert(key.into(), None);
        self
    }

    /// Merges a plain string map where an empty value removes the key.
    pub fn with_metadata<I, K, V>(mut self, metadata: I) -> Self
    where
        I: IntoIterator<Item = (K, V)>,
        K: Into<String>,
        V: Into<String>,
    {
        let changes = self.metadata.get_or_insert_with(BTreeMap::new);
        for (key, value) in metadata {
            let value: String = value.into();
            changes.insert(key.into(), (!value.is_empty()).then_some(value));
        }
        self
    }

    pub fn with_partner_status(mut self, partner_status: impl Into<String>) -> Self {
        self.partner_status = Some(partner_status.into());
        self
    }

    pub fn with_sequence_number(mut self, sequence_number: i64) -> Self {
        self.sequence_number = Some(sequence_number);
        self
    }

    pub fn value(&self) -> Option<&str> {
        self.value.as_deref()
    }

    pub fn reviewed(&self) -> Option<bool> {
        self.reviewed
    }

    pub fn notes(&self) -> Option<&[String]> {
        self.notes.as_deref()
    }

    pub fn metadata(&self) -> Option<&MetadataChanges> {
        self.metadata.as_ref()
    }

    pub fn partner_status(&self) -> Option<&str> {
        self.partner_status.as_deref()
    }

    pub fn sequence_number(&self) -> Option<i64> {
        self.sequence_number
    }

    /// True when no field is present.
    pub fn is_empty(&self) -> bool {
        self.value.is_none()
            && self.reviewed.is_none()
            && self.notes.is_none()
            && self.metadata.is_none()
            && self.partner_status.is_none()
            && self.sequence_number.is_none()
    }

    /// Applies this patch to `current` without mutating it.
    ///
    /// Metadata is merged first, then scalar fields are overwritten, and the
    /// merged result is validated as a whole.
    pub fn apply_to(
        &self,
        current: &ResourceEntry,
        limits: &Limits,
    ) -> Result<AppliedChange, Error> {
        let mut entry = current.clone();

        if let Some(changes) = &self.metadata {
            merge_metadata(&mut entry.metadata, changes);
        }

        let value_changed = match &self.value {
            Some(value) => {
                let changed = entry.value.as_deref() != Some(value.as_str());
                entry.value = Some(value.clone());
                changed
            }
            None => false,
        };
        if let Some(reviewed) = self.reviewed {
            entry.reviewed = Some(reviewed);
        }
        if let Some(partner_status) = &self.partner_status {
            entry.partner_status = Some(partner_status.clone());
        }
        if let Some(sequence_number) = self.sequence_number {
            entry.sequence_number = Some(sequence_number);
        }
        if let Some(notes) = &self.notes {
            entry.notes = notes.clone();
        }

        if let Some(value) = &entry.value {
            validate_entry_value(value, limits)?;
        }

        Ok(AppliedChange {
            entry,
            value_changed,
        })
    }
}

/// Applies `change` to `current`, returning the new entry.
pub fn apply(
    current: &ResourceEntry,
    change: &ChangeSet,
    limits: &Limits,
) -> Result<ResourceEntry, Error> {
    change.apply_to(current, limits).map(|applied| applied.entry)
}

/// Merges metadata edits key by key. Keys not mentioned are left untouched.
pub(crate) fn merge_metadata(metadata: &mut BTreeMap<String, String>, changes: &MetadataChanges) {
    for (key, value) in changes {
        match value {
            Some(value) if !value.is_empty() => {
                metadata.insert(key.clone(), value.clone());
            }
            _ => {
                metadata.remove(key);
            }
        }
    }
}
