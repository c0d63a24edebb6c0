//! Resource set reconciliation: how a write to one language of a bundle
//! propagates to the bundle's other languages.
//!
//! Three write paths are supported:
//!
//! - [`Reconciler::upload`]: full replace of one language's key set.
//! - [`Reconciler::update`]: partial write of the given keys, with optional
//!   resync of a target language against the source.
//! - [`Reconciler::update_entry`]: a [`ChangeSet`] applied to one entry.
//!
//! Every path validates its whole input before the first mutation, so a
//! failing call leaves the bundle untouched. Machine translation is never
//! invoked directly; the returned [`SyncOutcome`] lists the requests to
//! dispatch.

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};
use tracing::{debug, info};

use crate::{
    bundle::{Bundle, EntrySet},
    change_set::ChangeSet,
    config::Limits,
    error::Error,
    translation::TranslationRequest,
    types::{
        LanguageRole, Origin, ResourceEntry, normalize_language, validate_resource_key,
        validate_resource_value,
    },
};

/// Key/value strings of one language.
pub type ResourceStrings = BTreeMap<String, String>;

/// What a write did, and the translation work it left behind.
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct SyncOutcome {
    /// Keys written directly in the addressed language.
    pub stored: Vec<String>,
    /// Keys whose entry already held the written state.
    pub unchanged: Vec<String>,
    /// Keys removed from the source and every target language.
    pub deleted: Vec<String>,
    /// Input keys with no counterpart in the source language.
    pub ignored: Vec<String>,
    /// Target languages added to the bundle as a side effect.
    pub languages_added: Vec<String>,
    /// Requests to hand to the translation sink, one per derived entry.
    pub translation_requests: Vec<TranslationRequest>,
}

impl SyncOutcome {
    /// True when the write changed nothing and requested no translation.
    pub fn is_noop(&self) -> bool {
        self.stored.is_empty()
            && self.deleted.is_empty()
            && self.languages_added.is_empty()
            && self.translation_requests.is_empty()
    }
}

/// Which omitted target keys get re-derived from the source.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Reconcile {
    /// Leave omitted keys alone.
    Nothing,
    /// Re-derive keys whose entry is missing, stale, or failed.
    OutOfSync,
    /// Re-derive every omitted key that is not already a derived, in-sync entry.
    FullKeySet,
}

/// Applies writes to a [`Bundle`] under the configured [`Limits`].
#[derive(Debug, Clone, Copy)]
pub struct Reconciler<'a> {
    limits: &'a Limits,
}

impl<'a> Reconciler<'a> {
    pub fn new(limits: &'a Limits) -> Self {
        Self { limits }
    }

    /// Replaces the full key set of `language`.
    ///
    /// In the source language, omitted keys are deleted everywhere and new or
    /// changed values are forwarded to every target. In a target language,
    /// the language is added to the bundle if needed, given keys become
    /// authoritative, and omitted source keys are re-derived.
    pub fn upload(
        &self,
        bundle: &mut Bundle,
        language: &str,
        strings: &ResourceStrings,
    ) -> Result<SyncOutcome, Error> {
        let language = normalize_language(language)?;
        self.validate_strings(strings)?;

        let outcome = if language == bundle.source_language() {
            self.write_source(bundle, strings, true)?
        } else {
            let mut outcome = SyncOutcome::default();
            if bundle.role_of(&language).is_none() {
                outcome.translation_requests = bundle.add_target_language(&language)?;
                outcome.languages_added.push(language.clone());
            }
            self.write_target(bundle, &language, strings, Reconcile::FullKeySet, &mut outcome);
            outcome
        };
        Ok(finish(bundle, &language, "upload", outcome))
    }

    /// Writes only the given keys of `language`.
    ///
    /// A target language must already be configured. `resync` compares every
    /// source key against the target and re-derives stale entries; it has no
    /// effect on the source language.
    pub fn update(
        &self,
        bundle: &mut Bundle,
        language: &str,
        strings: &ResourceStrings,
        resync: bool,
    ) -> Result<SyncOutcome, Error> {
        let language = normalize_language(language)?;
        let role = bundle.role_of(&language);
        if role.is_none() {
            return Err(Error::NotConfigured {
                bundle_id: bundle.id().to_string(),
                language,
            });
        }
        self.validate_strings(strings)?;

        let outcome = if role == Some(LanguageRole::Source) {
            if resync {
                debug!(bundle = %bundle.id(), "resync ignored for the source language");
            }
            self.write_source(bundle, strings, false)?
        } else {
            let reconcile = if resync {
                Reconcile::OutOfSync
            } else {
                Reconcile::Nothing
            };
            let mut outcome = SyncOutcome::default();
            self.write_target(bundle, &language, strings, reconcile, &mut outcome);
            outcome
        };
        Ok(finish(bundle, &language, "update", outcome))
    }

    /// Applies `change` to one existing entry.
    ///
    /// A value change on a source entry re-derives that key in every target.
    /// A value written to a target entry makes it authoritative.
    pub fn update_entry(
        &self,
        bundle: &mut Bundle,
        language: &str,
        key: &str,
        change: &ChangeSet,
    ) -> Result<SyncOutcome, Error> {
        let language = normalize_language(language)?;
        let role = bundle.role_of(&language).ok_or_else(|| {
            Error::not_found(format!(
                "language `{}` in bundle `{}`",
                language,
                bundle.id()
            ))
        })?;
        let current = bundle
            .entries(&language)
            .and_then(|set| set.get(key))
            .ok_or_else(|| {
                Error::not_found(format!(
                    "resource key `{}` in bundle `{}` language `{}`",
                    key,
                    bundle.id(),
                    language
                ))
            })?;
        if let Some(value) = change.value() {
            validate_resource_value(key, value, self.limits)?;
        }
        let applied = change.apply_to(current, self.limits)?;

        // A value written to a target entry claims it, even when the text
        // matches what machine translation produced.
        let claims_target = role == LanguageRole::Target
            && change.value().is_some()
            && current.origin != Origin::Authoritative;

        let mut outcome = SyncOutcome::default();
        if applied.entry == *current && !claims_target {
            outcome.unchanged.push(key.to_string());
            return Ok(finish(bundle, &language, "entry update", outcome));
        }

        let mut entry = applied.entry;
        match role {
            LanguageRole::Source => {
                let cascade_value = applied
                    .value_changed
                    .then(|| entry.value.clone())
                    .flatten();
                insert_entry(bundle, &language, key, entry);
                if let Some(value) = cascade_value {
                    cascade_to_targets(bundle, key, &value, &mut outcome);
                }
            }
            LanguageRole::Target => {
                if let Some(value) = change.value() {
                    let source_value = bundle
                        .source_entries()
                        .get(key)
                        .and_then(|source| source.value.clone());
                    if let Some(source_value) = source_value {
                        entry.mark_authoritative(value, &source_value);
                    } else {
                        entry.origin = Origin::Authoritative;
                    }
                }
                insert_entry(bundle, &language, key, entry);
            }
        }
        outcome.stored.push(key.to_string());
        Ok(finish(bundle, &language, "entry update", outcome))
    }

    fn validate_strings(&self, strings: &ResourceStrings) -> Result<(), Error> {
        for (key, value) in strings {
            validate_resource_key(key, self.limits)?;
            validate_resource_value(key, value, self.limits)?;
        }
        Ok(())
    }

    fn write_source(
        &self,
        bundle: &mut Bundle,
        strings: &ResourceStrings,
        delete_missing: bool,
    ) -> Result<SyncOutcome, Error> {
        let source = bundle.source_entries();
        let deletions: Vec<String> = if delete_missing {
            source
                .keys()
                .filter(|key| !strings.contains_key(*key))
                .cloned()
                .collect()
        } else {
            Vec::new()
        };
        let resulting = if delete_missing {
            strings.len()
        } else {
            source.len()
                + strings
                    .keys()
                    .filter(|key| !source.contains_key(*key))
                    .count()
        };
        if resulting > self.limits.max_entries_per_bundle {
            return Err(Error::validation_error(format!(
                "bundle `{}` would hold {} resource keys; the limit is {}",
                bundle.id(),
                resulting,
                self.limits.max_entries_per_bundle
            )));
        }

        let languages: Vec<String> = bundle.languages().map(str::to_string).collect();
        let mut outcome = SyncOutcome::default();
        for key in deletions {
            for language in &languages {
                if let Some(set) = bundle.entries_mut(language) {
                    set.remove(&key);
                }
            }
            debug!(bundle = %bundle.id(), %key, "deleted key from every language");
            outcome.deleted.push(key);
        }

        let source_language = bundle.source_language().to_string();
        for (key, value) in strings {
            let current = bundle
                .source_entries()
                .get(key)
                .and_then(|entry| entry.value.as_deref());
            if current == Some(value.as_str()) {
                outcome.unchanged.push(key.clone());
                continue;
            }
            if let Some(set) = bundle.entries_mut(&source_language) {
                set.entry(key.clone())
                    .and_modify(|entry| entry.value = Some(value.clone()))
                    .or_insert_with(|| ResourceEntry::source(value.as_str()));
            }
            outcome.stored.push(key.clone());
            cascade_to_targets(bundle, key, value, &mut outcome);
        }
        Ok(outcome)
    }

    fn write_target(
        &self,
        bundle: &mut Bundle,
        language: &str,
        strings: &ResourceStrings,
        reconcile: Reconcile,
        outcome: &mut SyncOutcome,
    ) {
        let bundle_id = bundle.id().to_string();
        let source_language = bundle.source_language().to_string();
        let Some((source, target)) = bundle.source_and_target_mut(language) else {
            return;
        };

        for (key, value) in strings {
            let Some(source_value) = source.get(key).and_then(|entry| entry.value.as_deref())
            else {
                debug!(bundle = %bundle_id, %language, %key, "ignored key missing from source");
                outcome.ignored.push(key.clone());
                continue;
            };
            match target.get_mut(key) {
                Some(entry)
                    if entry.origin == Origin::Authoritative
                        && entry.value.as_deref() == Some(value.as_str())
                        && entry.is_in_sync_with(source_value) =>
                {
                    outcome.unchanged.push(key.clone());
                }
                Some(entry) => {
                    entry.mark_authoritative(value, source_value);
                    outcome.stored.push(key.clone());
                }
                None => {
                    let mut entry = ResourceEntry::pending(source_value);
                    entry.mark_authoritative(value, source_value);
                    target.insert(key.clone(), entry);
                    outcome.stored.push(key.clone());
                }
            }
        }

        if reconcile == Reconcile::Nothing {
            return;
        }
        for (key, source_entry) in source {
            if strings.contains_key(key) {
                continue;
            }
            let Some(source_value) = source_entry.value.as_deref() else {
                continue;
            };
            let rederive = match target.get(key) {
                None => true,
                Some(entry) => {
                    !entry.is_in_sync_with(source_value)
                        || (reconcile == Reconcile::FullKeySet
                            && entry.origin == Origin::Authoritative)
                }
            };
            if !rederive {
                continue;
            }
            target
                .entry(key.clone())
                .or_insert_with(|| ResourceEntry::pending(source_value))
                .mark_derived(source_value);
            outcome.translation_requests.push(TranslationRequest::new(
                &bundle_id,
                &source_language,
                language,
                key,
                source_value,
            ));
        }
    }
}

/// Re-derives `key` in every target language from the new source `value`.
fn cascade_to_targets(bundle: &mut Bundle, key: &str, value: &str, outcome: &mut SyncOutcome) {
    let bundle_id = bundle.id().to_string();
    let source_language = bundle.source_language().to_string();
    let targets: Vec<String> = bundle.target_languages().iter().cloned().collect();
    for target in targets {
        if let Some(set) = bundle.entries_mut(&target) {
            set.entry(key.to_string())
                .or_insert_with(|| ResourceEntry::pending(value))
                .mark_derived(value);
            outcome.translation_requests.push(TranslationRequest::new(
                &bundle_id,
                &source_language,
                &target,
                key,
                value,
            ));
        }
    }
}

fn insert_entry(bundle: &mut Bundle, language: &str, key: &str, entry: ResourceEntry) {
    if let Some(set) = bundle.entries_mut(language) {
        set.insert(key.to_string(), entry);
    }
}

/// Drops requests whose entry is no longer derived from the requested value,
/// e.g. seeded entries overwritten by the same upload.
fn prune_superseded(bundle: &Bundle, requests: &mut Vec<TranslationRequest>) {
    requests.retain(|request| {
        bundle
            .entries(&request.target_language)
            .and_then(|set: &EntrySet| set.get(&request.key))
            .is_some_and(|entry| {
                entry.origin == Origin::Derived && entry.is_in_sync_with(&request.source_value)
            })
    });
}

fn finish(bundle: &Bundle, language: &str, mode: &str, mut outcome: SyncOutcome) -> SyncOutcome {
    prune_superseded(bundle, &mut outcome.translation_requests);
    info!(
        bundle = %bundle.id(),
        %language,
        mode,
        stored = outcome.stored.len(),
        unchanged = outcome.unchanged.len(),
        deleted = outcome.deleted.len(),
        ignored = outcome.ignored.len(),
        translations = outcome.translation_requests.len(),
        "reconciled resource strings"
    );
    outcome
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{bundle::NewBundleData, types::TranslationStatus};

    fn strings(pairs: &[(&str, &str)]) -> ResourceStrings {
        pairs
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect()
    }

    fn bundle(targets: &[&str]) -> Bundle {
        Bundle::new(
            "app",
            NewBundleData::new("en").with_target_languages(targets.iter().copied()),
            &Limits::default(),
        )
        .unwrap()
    }

    fn entry<'b>(bundle: &'b Bundle, language: &str, key: &str) -> &'b ResourceEntry {
        &bundle.entries(language).unwrap()[key]
    }

    #[test]
    fn test_source_upload_creates_and_cascades() {
        let limits = Limits::default();
        let reconciler = Reconciler::new(&limits);
        let mut bundle = bundle(&["fr", "de"]);

        let outcome = reconciler
            .upload(&mut bundle, "en", &strings(&[("greeting", "Hello")]))
            .unwrap();

        assert_eq!(outcome.stored, vec!["greeting".to_string()]);
        assert_eq!(outcome.translation_requests.len(), 2);
        let source = entry(&bundle, "en", "greeting");
        assert_eq!(source.origin, Origin::Authoritative);
        assert_eq!(source.translation_status, TranslationStatus::SourceLanguage);
        for target in ["fr", "de"] {
            let derived = entry(&bundle, target, "greeting");
            assert_eq!(derived.origin, Origin::Derived);
            assert_eq!(derived.value, None);
            assert_eq!(derived.translation_status, TranslationStatus::InProgress);
        }
    }

    #[test]
    fn test_source_upload_unchanged_value_does_not_retranslate() {
        let limits = Limits::default();
        let reconciler = Reconciler::new(&limits);
        let mut bundle = bundle(&["fr"]);
        let input = strings(&[("greeting", "Hello")]);
        reconciler.upload(&mut bundle, "en", &input).unwrap();

        let outcome = reconciler.upload(&mut bundle, "en", &input).unwrap();
        assert!(outcome.is_noop());
        assert_eq!(outcome.unchanged, vec!["greeting".to_string()]);
    }

    #[test]
    fn test_source_upload_deletes_missing_keys_everywhere() {
        let limits = Limits::default();
        let reconciler = Reconciler::new(&limits);
        let mut bundle = bundle(&["fr"]);
        reconciler
            .upload(
                &mut bundle,
                "en",
                &strings(&[("greeting", "Hello"), ("farewell", "Bye")]),
            )
            .unwrap();

        let outcome = reconciler
            .upload(&mut bundle, "en", &strings(&[("greeting", "Hello")]))
            .unwrap();
        assert_eq!(outcome.deleted, vec!["farewell".to_string()]);
        assert!(!bundle.entries("en").unwrap().contains_key("farewell"));
        assert!(!bundle.entries("fr").unwrap().contains_key("farewell"));
        assert!(bundle.entries("fr").unwrap().contains_key("greeting"));
    }

    #[test]
    fn test_source_value_change_overrides_target_override() {
        let limits = Limits::default();
        let reconciler = Reconciler::new(&limits);
        let mut bundle = bundle(&["fr"]);
        reconciler
            .upload(&mut bundle, "en", &strings(&[("greeting", "Hello")]))
            .unwrap();
        reconciler
            .update(&mut bundle, "fr", &strings(&[("greeting", "Salut")]), false)
            .unwrap();
        assert_eq!(entry(&bundle, "fr", "greeting").origin, Origin::Authoritative);

        let outcome = reconciler
            .update(&mut bundle, "en", &strings(&[("greeting", "Hello there")]), false)
            .unwrap();
        assert_eq!(outcome.translation_requests.len(), 1);
        let fr = entry(&bundle, "fr", "greeting");
        assert_eq!(fr.origin, Origin::Derived);
        assert_eq!(fr.value.as_deref(), Some("Salut"));
        assert_eq!(fr.source_value.as_deref(), Some("Hello there"));
    }

    #[test]
    fn test_target_upload_adds_language_and_derives_missing_keys() {
        let limits = Limits::default();
        let reconciler = Reconciler::new(&limits);
        let mut bundle = bundle(&[]);
        reconciler
            .upload(
                &mut bundle,
                "en",
                &strings(&[("greeting", "Hello"), ("farewell", "Bye")]),
            )
            .unwrap();

        let outcome = reconciler
            .upload(
                &mut bundle,
                "fr",
                &strings(&[("greeting", "Bonjour"), ("unknown", "Inconnu")]),
            )
            .unwrap();

        assert_eq!(outcome.languages_added, vec!["fr".to_string()]);
        assert_eq!(outcome.ignored, vec!["unknown".to_string()]);
        assert_eq!(outcome.stored, vec!["greeting".to_string()]);
        // The seeded request for `greeting` was superseded by the authoritative write.
        assert_eq!(outcome.translation_requests.len(), 1);
        assert_eq!(outcome.translation_requests[0].key, "farewell");

        assert!(bundle.target_languages().contains("fr"));
        let greeting = entry(&bundle, "fr", "greeting");
        assert_eq!(greeting.origin, Origin::Authoritative);
        assert_eq!(greeting.value.as_deref(), Some("Bonjour"));
        assert_eq!(entry(&bundle, "fr", "farewell").origin, Origin::Derived);
        assert!(!bundle.entries("fr").unwrap().contains_key("unknown"));
    }

    #[test]
    fn test_target_upload_rederives_omitted_authoritative_entries() {
        let limits = Limits::default();
        let reconciler = Reconciler::new(&limits);
        let mut bundle = bundle(&["fr"]);
        reconciler
            .upload(
                &mut bundle,
                "en",
                &strings(&[("greeting", "Hello"), ("farewell", "Bye")]),
            )
            .unwrap();
        reconciler
            .upload(
                &mut bundle,
                "fr",
                &strings(&[("greeting", "Bonjour"), ("farewell", "Salut")]),
            )
            .unwrap();

        let outcome = reconciler
            .upload(&mut bundle, "fr", &strings(&[("greeting", "Bonjour")]))
            .unwrap();
        assert_eq!(outcome.unchanged, vec!["greeting".to_string()]);
        assert_eq!(outcome.translation_requests.len(), 1);
        assert_eq!(entry(&bundle, "fr", "farewell").origin, Origin::Derived);
    }

    #[test]
    fn test_target_upload_is_idempotent() {
        let limits = Limits::default();
        let reconciler = Reconciler::new(&limits);
        let mut bundle = bundle(&["fr"]);
        reconciler
            .upload(
                &mut bundle,
                "en",
                &strings(&[("greeting", "Hello"), ("farewell", "Bye")]),
            )
            .unwrap();
        let input = strings(&[("greeting", "Bonjour")]);
        reconciler.upload(&mut bundle, "fr", &input).unwrap();
        let snapshot = bundle.clone();

        let outcome = reconciler.upload(&mut bundle, "fr", &input).unwrap();
        assert!(outcome.translation_requests.is_empty());
        assert!(outcome.stored.is_empty());
        assert_eq!(bundle, snapshot);
    }

    #[test]
    fn test_update_unconfigured_target_fails() {
        let limits = Limits::default();
        let reconciler = Reconciler::new(&limits);
        let mut bundle = bundle(&[]);
        reconciler
            .upload(&mut bundle, "en", &strings(&[("greeting", "Hello")]))
            .unwrap();
        let before = bundle.clone();

        let input = strings(&[("greeting", "Bonjour")]);
        let result = reconciler.update(&mut bundle, "fr", &input, false);
        assert!(matches!(result, Err(Error::NotConfigured { .. })));
        assert_eq!(bundle, before);
    }

    #[test]
    fn test_source_update_keeps_omitted_keys() {
        let limits = Limits::default();
        let reconciler = Reconciler::new(&limits);
        let mut bundle = bundle(&["fr"]);
        reconciler
            .upload(
                &mut bundle,
                "en",
                &strings(&[("greeting", "Hello"), ("farewell", "Bye")]),
            )
            .unwrap();

        let outcome = reconciler
            .update(&mut bundle, "en", &strings(&[("title", "Welcome")]), true)
            .unwrap();
        assert!(outcome.deleted.is_empty());
        assert_eq!(outcome.translation_requests.len(), 1);
        assert_eq!(bundle.entries("en").unwrap().len(), 3);
    }

    #[test]
    fn test_resync_rederives_only_stale_entries() {
        let limits = Limits::default();
        let reconciler = Reconciler::new(&limits);
        let mut bundle = bundle(&["fr"]);
        reconciler
            .upload(
                &mut bundle,
                "en",
                &strings(&[("greeting", "Hello"), ("farewell", "Bye")]),
            )
            .unwrap();
        // Simulate a translation that completed and one that failed.
        {
            let fr = bundle.entries_mut("fr").unwrap();
            let greeting = fr.get_mut("greeting").unwrap();
            greeting.value = Some("Bonjour".to_string());
            greeting.translation_status = TranslationStatus::Translated;
            fr.get_mut("farewell").unwrap().translation_status = TranslationStatus::Failed;
        }

        let without_resync = reconciler
            .update(&mut bundle, "fr", &ResourceStrings::new(), false)
            .unwrap();
        assert!(without_resync.translation_requests.is_empty());

        let outcome = reconciler
            .update(&mut bundle, "fr", &ResourceStrings::new(), true)
            .unwrap();
        assert_eq!(outcome.translation_requests.len(), 1);
        assert_eq!(outcome.translation_requests[0].key, "farewell");
        assert_eq!(
            entry(&bundle, "fr", "farewell").translation_status,
            TranslationStatus::InProgress
        );
        assert_eq!(
            entry(&bundle, "fr", "greeting").translation_status,
            TranslationStatus::Translated
        );
    }

    #[test]
    fn test_entry_limit_is_atomic() {
        let limits = Limits {
            max_entries_per_bundle: 2,
            ..Limits::default()
        };
        let reconciler = Reconciler::new(&limits);
        let mut bundle = bundle(&["fr"]);
        reconciler
            .upload(&mut bundle, "en", &strings(&[("a", "1"), ("b", "2")]))
            .unwrap();
        let before = bundle.clone();

        let result = reconciler.update(&mut bundle, "en", &strings(&[("c", "3")]), false);
        assert!(matches!(result, Err(Error::Validation(_))));
        assert_eq!(bundle, before);

        // Replacing keys within the limit is fine.
        reconciler
            .upload(&mut bundle, "en", &strings(&[("a", "1"), ("c", "3")]))
            .unwrap();
    }

    #[test]
    fn test_invalid_key_rejects_whole_upload() {
        let limits = Limits::default();
        let reconciler = Reconciler::new(&limits);
        let mut bundle = bundle(&["fr"]);
        let before = bundle.clone();
        let result = reconciler.upload(
            &mut bundle,
            "en",
            &strings(&[("greeting", "Hello"), ("bad key", "x")]),
        );
        assert!(matches!(result, Err(Error::Validation(_))));
        assert_eq!(bundle, before);
    }

    #[test]
    fn test_update_entry_source_value_cascades_one_key() {
        let limits = Limits::default();
        let reconciler = Reconciler::new(&limits);
        let mut bundle = bundle(&["fr", "de"]);
        reconciler
            .upload(
                &mut bundle,
                "en",
                &strings(&[("greeting", "Hello"), ("farewell", "Bye")]),
            )
            .unwrap();

        let outcome = reconciler
            .update_entry(&mut bundle, "en", "greeting", &ChangeSet::new().with_value("Hi"))
            .unwrap();
        assert_eq!(outcome.translation_requests.len(), 2);
        assert!(outcome.translation_requests.iter().all(|r| r.key == "greeting"));
        assert_eq!(entry(&bundle, "en", "greeting").value.as_deref(), Some("Hi"));
    }

    #[test]
    fn test_update_entry_metadata_only_does_not_cascade() {
        let limits = Limits::default();
        let reconciler = Reconciler::new(&limits);
        let mut bundle = bundle(&["fr"]);
        reconciler
            .upload(&mut bundle, "en", &strings(&[("greeting", "Hello")]))
            .unwrap();

        let outcome = reconciler
            .update_entry(
                &mut bundle,
                "en",
                "greeting",
                &ChangeSet::new().with_metadata_entry("owner", "alice"),
            )
            .unwrap();
        assert!(outcome.translation_requests.is_empty());
        assert_eq!(outcome.stored, vec!["greeting".to_string()]);
    }

    #[test]
    fn test_update_entry_target_value_becomes_authoritative() {
        let limits = Limits::default();
        let reconciler = Reconciler::new(&limits);
        let mut bundle = bundle(&["fr"]);
        reconciler
            .upload(&mut bundle, "en", &strings(&[("greeting", "Hello")]))
            .unwrap();

        reconciler
            .update_entry(
                &mut bundle,
                "fr",
                "greeting",
                &ChangeSet::new().with_value("Bonjour").with_reviewed(true),
            )
            .unwrap();
        let fr = entry(&bundle, "fr", "greeting");
        assert_eq!(fr.origin, Origin::Authoritative);
        assert_eq!(fr.translation_status, TranslationStatus::Translated);
        assert_eq!(fr.reviewed, Some(true));
        assert_eq!(fr.source_value.as_deref(), Some("Hello"));
        assert_eq!(entry(&bundle, "en", "greeting").value.as_deref(), Some("Hello"));
    }

    #[test]
    fn test_update_entry_same_value_claims_derived_target() {
        let limits = Limits::default();
        let reconciler = Reconciler::new(&limits);
        let mut bundle = bundle(&["fr"]);
        reconciler
            .upload(&mut bundle, "en", &strings(&[("greeting", "Hello")]))
            .unwrap();
        {
            let greeting = bundle
                .entries_mut("fr")
                .unwrap()
                .get_mut("greeting")
                .unwrap();
            greeting.value = Some("Bonjour".to_string());
            greeting.translation_status = TranslationStatus::Translated;
        }

        let outcome = reconciler
            .update_entry(
                &mut bundle,
                "fr",
                "greeting",
                &ChangeSet::new().with_value("Bonjour"),
            )
            .unwrap();
        assert_eq!(outcome.stored, vec!["greeting".to_string()]);
        let fr = entry(&bundle, "fr", "greeting");
        assert_eq!(fr.origin, Origin::Authoritative);
        assert_eq!(fr.value.as_deref(), Some("Bonjour"));

        // Writing it again is a no-op once the entry is authoritative.
        let again = reconciler
            .update_entry(
                &mut bundle,
                "fr",
                "greeting",
                &ChangeSet::new().with_value("Bonjour"),
            )
            .unwrap();
        assert_eq!(again.unchanged, vec!["greeting".to_string()]);
        assert!(again.is_noop());
    }

    #[test]
    fn test_update_entry_value_error_names_key() {
        let limits = Limits {
            max_value_length: 3,
            ..Limits::default()
        };
        let reconciler = Reconciler::new(&limits);
        let mut bundle = bundle(&["fr"]);
        reconciler
            .upload(&mut bundle, "en", &strings(&[("greeting", "Hi")]))
            .unwrap();

        let err = reconciler
            .update_entry(
                &mut bundle,
                "en",
                "greeting",
                &ChangeSet::new().with_value("Hello"),
            )
            .unwrap_err();
        assert!(err.to_string().contains("value of `greeting`"));
    }

    #[test]
    fn test_update_entry_missing_key_or_language() {
        let limits = Limits::default();
        let reconciler = Reconciler::new(&limits);
        let mut bundle = bundle(&["fr"]);
        let change = ChangeSet::new().with_value("x");
        assert!(matches!(
            reconciler.update_entry(&mut bundle, "en", "missing", &change),
            Err(Error::NotFound(_))
        ));
        assert!(matches!(
            reconciler.update_entry(&mut bundle, "ja", "missing", &change),
            Err(Error::NotFound(_))
        ));
    }
}
