//! Core entry types and identifier rules shared by every layer.

use std::{collections::BTreeMap, fmt::Display, str::FromStr};

use lazy_static::lazy_static;
use regex::Regex;
use serde::{Deserialize, Serialize};
use unic_langid::LanguageIdentifier;

use crate::{config::Limits, error::Error};

lazy_static! {
    static ref IDENTIFIER_REGEX: Regex = Regex::new(r"^[a-zA-Z0-9][a-zA-Z0-9_.-]*$").unwrap();
}

/// Who wrote an entry's current value.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Deserialize, Serialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum Origin {
    /// Written directly by a caller.
    Authoritative,
    /// Produced by machine translation from the source entry.
    Derived,
}

/// Translation progress of a single entry.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Deserialize, Serialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum TranslationStatus {
    /// The entry belongs to the bundle's source language.
    SourceLanguage,
    /// A translation request is outstanding; the value (if any) is stale.
    InProgress,
    /// The value is current with respect to the source value.
    Translated,
    /// The translation request could not be enqueued or resolved.
    Failed,
}

impl Display for TranslationStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let s = match self {
            TranslationStatus::SourceLanguage => "SOURCE_LANGUAGE",
            TranslationStatus::InProgress => "IN_PROGRESS",
            TranslationStatus::Translated => "TRANSLATED",
            TranslationStatus::Failed => "FAILED",
        };
        write!(f, "{}", s)
    }
}

impl FromStr for TranslationStatus {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_uppercase().replace('-', "_").as_str() {
            "SOURCE_LANGUAGE" => Ok(TranslationStatus::SourceLanguage),
            "IN_PROGRESS" => Ok(TranslationStatus::InProgress),
            "TRANSLATED" => Ok(TranslationStatus::Translated),
            "FAILED" => Ok(TranslationStatus::Failed),
            _ => Err(format!("Unknown translation status: {}", s)),
        }
    }
}

/// Role of a language relative to its bundle.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize, Serialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum LanguageRole {
    Source,
    Target,
}

/// One resource string in one language of a bundle.
///
/// The resource key is not stored here; entries are always held in a map keyed
/// by it, and the key never changes after creation.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize, Serialize)]
pub struct ResourceEntry {
    /// Current value. `None` for a derived entry whose first translation is
    /// still pending.
    #[serde(skip_serializing_if = "Option::is_none")]
    #[serde(default)]
    pub value: Option<String>,

    /// Source-language value this entry is synchronized against.
    /// Always `None` in the source language.
    #[serde(skip_serializing_if = "Option::is_none")]
    #[serde(default)]
    pub source_value: Option<String>,

    /// Review state; `None` means never set.
    #[serde(skip_serializing_if = "Option::is_none")]
    #[serde(default)]
    pub reviewed: Option<bool>,

    #[serde(skip_serializing_if = "Vec::is_empty")]
    #[serde(default)]
    pub notes: Vec<String>,

    #[serde(skip_serializing_if = "BTreeMap::is_empty")]
    #[serde(default)]
    pub metadata: BTreeMap<String, String>,

    /// Free-form status reserved for translation partners.
    #[serde(skip_serializing_if = "Option::is_none")]
    #[serde(default)]
    pub partner_status: Option<String>,

    /// Optional sort hint.
    #[serde(skip_serializing_if = "Option::is_none")]
    #[serde(default)]
    pub sequence_number: Option<i64>,

    pub origin: Origin,

    pub translation_status: TranslationStatus,
}

impl ResourceEntry {
    /// A source-language entry written by a caller.
    pub fn source(value: impl Into<String>) -> Self {
        Self {
            value: Some(value.into()),
            source_value: None,
            reviewed: None,
            notes: Vec::new(),
            metadata: BTreeMap::new(),
            partner_status: None,
            sequence_number: None,
            origin: Origin::Authoritative,
            translation_status: TranslationStatus::SourceLanguage,
        }
    }

    /// A target-language entry awaiting its first machine translation.
    pub fn pending(source_value: impl Into<String>) -> Self {
        Self {
            value: None,
            source_value: Some(source_value.into()),
            reviewed: None,
            notes: Vec::new(),
            metadata: BTreeMap::new(),
            partner_status: None,
            sequence_number: None,
            origin: Origin::Derived,
            translation_status: TranslationStatus::InProgress,
        }
    }

    /// Whether this target entry reflects the given source value.
    pub fn is_in_sync_with(&self, source_value: &str) -> bool {
        self.translation_status != TranslationStatus::Failed
            && self.source_value.as_deref() == Some(source_value)
    }

    /// Marks the entry as awaiting re-translation of `source_value`.
    /// The previous value is kept as a stale placeholder.
    pub(crate) fn mark_derived(&mut self, source_value: &str) {
        self.origin = Origin::Derived;
        self.translation_status = TranslationStatus::InProgress;
        self.source_value = Some(source_value.to_string());
        self.reviewed = None;
    }

    /// Records a caller-written target value synchronized with `source_value`.
    pub(crate) fn mark_authoritative(&mut self, value: &str, source_value: &str) {
        self.value = Some(value.to_string());
        self.origin = Origin::Authoritative;
        self.translation_status = TranslationStatus::Translated;
        self.source_value = Some(source_value.to_string());
    }
}

impl Display for ResourceEntry {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(
            f,
            "ResourceEntry {{ value: {}, origin: {:?}, status: {} }}",
            self.value.as_deref().unwrap_or("<pending>"),
            self.origin,
            self.translation_status
        )
    }
}

/// Checks a bundle ID against the identifier pattern and length limit.
pub fn validate_bundle_id(bundle_id: &str, limits: &Limits) -> Result<(), Error> {
    validate_identifier("bundle ID", bundle_id, limits.max_bundle_id_length)
}

/// Checks a resource key against the identifier pattern and length limit.
pub fn validate_resource_key(key: &str, limits: &Limits) -> Result<(), Error> {
    validate_identifier("resource key", key, limits.max_key_length)
}

/// Checks a resource value against the length limit.
pub fn validate_resource_value(key: &str, value: &str, limits: &Limits) -> Result<(), Error> {
    value_length_within(value, limits).map_err(|length| {
        Error::validation_error(format!(
            "value of `{}` is {} characters long; the limit is {}",
            key, length, limits.max_value_length
        ))
    })
}

/// Checks a value against the length limit when its key is not known.
pub fn validate_entry_value(value: &str, limits: &Limits) -> Result<(), Error> {
    value_length_within(value, limits).map_err(|length| {
        Error::validation_error(format!(
            "resource value is {} characters long; the limit is {}",
            length, limits.max_value_length
        ))
    })
}

/// The value's length in characters as the error when over the limit.
fn value_length_within(value: &str, limits: &Limits) -> Result<(), usize> {
    let length = value.chars().count();
    if length > limits.max_value_length {
        return Err(length);
    }
    Ok(())
}

fn validate_identifier(kind: &str, id: &str, max_length: usize) -> Result<(), Error> {
    if !IDENTIFIER_REGEX.is_match(id) {
        return Err(Error::validation_error(format!(
            "{} `{}` must match [a-zA-Z0-9][a-zA-Z0-9_.-]*",
            kind, id
        )));
    }
    let length = id.chars().count();
    if length > max_length {
        return Err(Error::validation_error(format!(
            "{} is {} characters long; the limit is {}",
            kind, length, max_length
        )));
    }
    Ok(())
}

/// Parses a BCP 47 tag and returns its canonical form (`en-us` -> `en-US`).
pub fn normalize_language(tag: &str) -> Result<String, Error> {
    let trimmed = tag.trim();
    if trimmed.is_empty() {
        return Err(Error::validation_error("language tag cannot be empty"));
    }
    trimmed
        .parse::<LanguageIdentifier>()
        .map(|id| id.to_string())
        .map_err(|_| {
            Error::validation_error(format!(
                "invalid language tag `{}`; expected a BCP 47 language identifier",
                tag
            ))
        })
}
