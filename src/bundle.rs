//! Bundle and language state: the entity graph the reconciler operates on.
//!
//! A [`Bundle`] owns one source language, a set of target languages, and one
//! entry set per configured language. No entry set exists for a language that
//! is not configured on the bundle.

use std::collections::{BTreeMap, BTreeSet};

use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::{
    change_set::{MetadataChanges, merge_metadata},
    config::Limits,
    error::Error,
    translation::TranslationRequest,
    types::{LanguageRole, ResourceEntry, normalize_language, validate_bundle_id},
};

/// Entries of one language, keyed by resource key.
pub type EntrySet = BTreeMap<String, ResourceEntry>;

/// Configuration for a new bundle.
#[derive(Debug, Clone, PartialEq, Eq, Default, Deserialize, Serialize)]
pub struct NewBundleData {
    pub source_language: String,
    #[serde(default)]
    pub target_languages: Vec<String>,
    #[serde(default)]
    pub notes: Vec<String>,
    #[serde(default)]
    pub metadata: BTreeMap<String, String>,
    #[serde(default)]
    pub partner: Option<String>,
}

impl NewBundleData {
    pub fn new(source_language: impl Into<String>) -> Self {
        Self {
            source_language: source_language.into(),
            ..Self::default()
        }
    }

    pub fn with_target_languages<I, S>(mut self, languages: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.target_languages = languages.into_iter().map(Into::into).collect();
        self
    }

    pub fn with_notes<I, S>(mut self, notes: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.notes = notes.into_iter().map(Into::into).collect();
        self
    }

    pub fn with_metadata_entry(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.metadata.insert(key.into(), value.into());
        self
    }

    pub fn with_partner(mut self, partner: impl Into<String>) -> Self {
        self.partner = Some(partner.into());
        self
    }
}

/// Sparse change to a bundle's configuration. Absent fields are left as is.
#[derive(Debug, Clone, PartialEq, Eq, Default, Deserialize, Serialize)]
pub struct BundleChangeSet {
    /// Replaces the whole target language set.
    #[serde(skip_serializing_if = "Option::is_none", default)]
    pub target_languages: Option<Vec<String>>,
    #[serde(skip_serializing_if = "Option::is_none", default)]
    pub notes: Option<Vec<String>>,
    /// Merged key by key; `None` or an empty value removes the key.
    #[serde(skip_serializing_if = "Option::is_none", default)]
    pub metadata: Option<MetadataChanges>,
    /// An empty string clears the partner.
    #[serde(skip_serializing_if = "Option::is_none", default)]
    pub partner: Option<String>,
}

impl BundleChangeSet {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_target_languages<I, S>(mut self, languages: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.target_languages = Some(languages.into_iter().map(Into::into).collect());
        self
    }

    pub fn with_notes<I, S>(mut self, notes: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.notes = Some(notes.into_iter().map(Into::into).collect());
        self
    }

    pub fn with_metadata_entry(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.metadata
            .get_or_insert_with(BTreeMap::new)
            .insert(key.into(), Some(value.into()));
        self
    }

    pub fn without_metadata_key(mut self, key: impl Into<String>) -> Self {
        self.metadata
            .get_or_insert_with(BTreeMap::new)
            .insert(key.into(), None);
        self
    }

    pub fn with_partner(mut self, partner: impl Into<String>) -> Self {
        self.partner = Some(partner.into());
        self
    }
}

/// Read view of a bundle's configuration.
///
/// The detail fields are `None` when the caller may only see the basics.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize, Serialize)]
pub struct BundleData {
    pub source_language: String,
    pub target_languages: BTreeSet<String>,
    #[serde(skip_serializing_if = "Option::is_none", default)]
    pub notes: Option<Vec<String>>,
    #[serde(skip_serializing_if = "Option::is_none", default)]
    pub metadata: Option<BTreeMap<String, String>>,
    #[serde(skip_serializing_if = "Option::is_none", default)]
    pub partner: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none", default)]
    pub updated_by: Option<String>,
}

/// A named collection of resource keys across one source and many targets.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Bundle {
    id: String,
    source_language: String,
    target_languages: BTreeSet<String>,
    notes: Vec<String>,
    metadata: BTreeMap<String, String>,
    partner: Option<String>,
    updated_by: Option<String>,
    entries: BTreeMap<String, EntrySet>,
}

impl Bundle {
    /// Validates `data` and creates an empty bundle.
    pub fn new(id: &str, data: NewBundleData, limits: &Limits) -> Result<Self, Error> {
        validate_bundle_id(id, limits)?;
        let source_language = normalize_language(&data.source_language)?;
        let target_languages = normalize_targets(&source_language, &data.target_languages)?;

        let mut entries = BTreeMap::new();
        entries.insert(source_language.clone(), EntrySet::new());
        for language in &target_languages {
            entries.insert(language.clone(), EntrySet::new());
        }

        Ok(Self {
            id: id.to_string(),
            source_language,
            target_languages,
            notes: data.notes,
            metadata: data.metadata,
            partner: data.partner.filter(|p| !p.is_empty()),
            updated_by: None,
            entries,
        })
    }

    pub fn id(&self) -> &str {
        &self.id
    }

    pub fn source_language(&self) -> &str {
        &self.source_language
    }

    pub fn target_languages(&self) -> &BTreeSet<String> {
        &self.target_languages
    }

    pub fn updated_by(&self) -> Option<&str> {
        self.updated_by.as_deref()
    }

    /// Role of an already normalized language tag, if configured.
    pub fn role_of(&self, language: &str) -> Option<LanguageRole> {
        if language == self.source_language {
            Some(LanguageRole::Source)
        } else if self.target_languages.contains(language) {
            Some(LanguageRole::Target)
        } else {
            None
        }
    }

    /// Configured languages, source first.
    pub fn languages(&self) -> impl Iterator<Item = &str> {
        std::iter::once(self.source_language.as_str())
            .chain(self.target_languages.iter().map(String::as_str))
    }

    pub fn entries(&self, language: &str) -> Option<&EntrySet> {
        self.entries.get(language)
    }

    pub fn source_entries(&self) -> &EntrySet {
        // The source entry set is created with the bundle and never removed.
        self.entries
            .get(&self.source_language)
            .unwrap_or(&EMPTY_ENTRY_SET)
    }

    pub(crate) fn entries_mut(&mut self, language: &str) -> Option<&mut EntrySet> {
        self.entries.get_mut(language)
    }

    /// Source entries and one target's entries, borrowed together.
    pub(crate) fn source_and_target_mut(
        &mut self,
        target_language: &str,
    ) -> Option<(&EntrySet, &mut EntrySet)> {
        if target_language == self.source_language {
            return None;
        }
        let mut source = None;
        let mut target = None;
        for (language, set) in self.entries.iter_mut() {
            if *language == self.source_language {
                source = Some(&*set);
            } else if language == target_language {
                target = Some(set);
            }
        }
        source.zip(target)
    }

    /// Adds a target language and seeds it with a pending entry per source key.
    ///
    /// Returns the translation requests for the seeded entries; the caller is
    /// responsible for dispatching them. Adding a configured language is a no-op.
    pub fn add_target_language(
        &mut self,
        language: &str,
    ) -> Result<Vec<TranslationRequest>, Error> {
        let language = normalize_language(language)?;
        if language == self.source_language {
            return Err(Error::validation_error(format!(
                "`{}` is the source language of bundle `{}`",
                language, self.id
            )));
        }
        if !self.target_languages.insert(language.clone()) {
            return Ok(Vec::new());
        }

        let mut seeded = EntrySet::new();
        let mut requests = Vec::new();
        for (key, source) in self.source_entries() {
            let Some(source_value) = source.value.as_deref() else {
                continue;
            };
            seeded.insert(key.clone(), ResourceEntry::pending(source_value));
            requests.push(TranslationRequest::new(
                &self.id,
                &self.source_language,
                &language,
                key,
                source_value,
            ));
        }
        debug!(bundle = %self.id, %language, seeded = seeded.len(), "added target language");
        self.entries.insert(language, seeded);
        Ok(requests)
    }

    /// Removes a target language together with all of its entries.
    /// Returns `false` for a tag that is not a configured target.
    pub fn remove_target_language(&mut self, language: &str) -> bool {
        let Ok(language) = normalize_language(language) else {
            return false;
        };
        let removed = self.target_languages.remove(&language);
        if removed {
            self.entries.remove(&language);
            debug!(bundle = %self.id, %language, "removed target language");
        }
        removed
    }

    /// Applies a configuration change and returns translation requests for any
    /// newly added target languages.
    pub fn apply_change_set(
        &mut self,
        change: &BundleChangeSet,
    ) -> Result<Vec<TranslationRequest>, Error> {
        // Validate everything before the first mutation.
        let targets = match &change.target_languages {
            Some(languages) => Some(normalize_targets(&self.source_language, languages)?),
            None => None,
        };

        let mut requests = Vec::new();
        if let Some(targets) = targets {
            let removed: Vec<String> = self
                .target_languages
                .difference(&targets)
                .cloned()
                .collect();
            for language in removed {
                self.remove_target_language(&language);
            }
            for language in targets {
                requests.extend(self.add_target_language(&language)?);
            }
        }
        if let Some(notes) = &change.notes {
            self.notes = notes.clone();
        }
        if let Some(metadata) = &change.metadata {
            merge_metadata(&mut self.metadata, metadata);
        }
        if let Some(partner) = &change.partner {
            self.partner = (!partner.is_empty()).then(|| partner.clone());
        }
        Ok(requests)
    }

    pub(crate) fn set_updated_by(&mut self, user: &str) {
        self.updated_by = Some(user.to_string());
    }

    /// Read view; `detailed = false` keeps only the language configuration.
    pub fn info(&self, detailed: bool) -> BundleData {
        BundleData {
            source_language: self.source_language.clone(),
            target_languages: self.target_languages.clone(),
            notes: detailed.then(|| self.notes.clone()),
            metadata: detailed.then(|| self.metadata.clone()),
            partner: if detailed { self.partner.clone() } else { None },
            updated_by: if detailed {
                self.updated_by.clone()
            } else {
                None
            },
        }
    }
}

static EMPTY_ENTRY_SET: EntrySet = BTreeMap::new();

fn normalize_targets(
    source_language: &str,
    languages: &[String],
) -> Result<BTreeSet<String>, Error> {
    let mut targets = BTreeSet::new();
    for language in languages {
        let language = normalize_language(language)?;
        if language == source_language {
            return Err(Error::validation_error(format!(
                "source language `{}` cannot also be a target language",
                language
            )));
        }
        targets.insert(language);
    }
    Ok(targets)
}

/// All bundles of one service instance, keyed by bundle ID.
#[derive(Debug, Clone, Default)]
pub struct BundleStore {
    bundles: BTreeMap<String, Bundle>,
}

impl BundleStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn ids(&self) -> impl Iterator<Item = &str> {
        self.bundles.keys().map(String::as_str)
    }

    pub fn get(&self, bundle_id: &str) -> Result<&Bundle, Error> {
        self.bundles
            .get(bundle_id)
            .ok_or_else(|| Error::not_found(format!("bundle `{}`", bundle_id)))
    }

    pub fn get_mut(&mut self, bundle_id: &str) -> Result<&mut Bundle, Error> {
        self.bundles
            .get_mut(bundle_id)
            .ok_or_else(|| Error::not_found(format!("bundle `{}`", bundle_id)))
    }

    /// Inserts a new bundle; an existing ID is rejected.
    pub fn insert(&mut self, bundle: Bundle) -> Result<(), Error> {
        if self.bundles.contains_key(bundle.id()) {
            return Err(Error::validation_error(format!(
                "bundle `{}` already exists",
                bundle.id()
            )));
        }
        self.bundles.insert(bundle.id().to_string(), bundle);
        Ok(())
    }

    /// Removes a bundle with all of its languages and entries.
    pub fn remove(&mut self, bundle_id: &str) -> Result<Bundle, Error> {
        self.bundles
            .remove(bundle_id)
            .ok_or_else(|| Error::not_found(format!("bundle `{}`", bundle_id)))
    }
}
