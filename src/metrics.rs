//! Per-language and per-bundle progress counters.

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

use crate::{bundle::{Bundle, EntrySet}, types::TranslationStatus};

/// Counters for one language of a bundle.
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct LanguageMetrics {
    /// Entry counts keyed by translation status.
    pub translation_status: BTreeMap<TranslationStatus, usize>,
    pub reviewed: usize,
    pub unreviewed: usize,
    /// Entry counts keyed by partner status; entries without one are not counted.
    pub partner_status: BTreeMap<String, usize>,
}

impl LanguageMetrics {
    pub fn from_entries(entries: &EntrySet) -> Self {
        let mut metrics = Self::default();
        for entry in entries.values() {
            *metrics
                .translation_status
                .entry(entry.translation_status)
                .or_insert(0) += 1;
            if entry.reviewed == Some(true) {
                metrics.reviewed += 1;
            } else {
                metrics.unreviewed += 1;
            }
            if let Some(status) = &entry.partner_status {
                *metrics.partner_status.entry(status.clone()).or_insert(0) += 1;
            }
        }
        metrics
    }

    /// Total number of entries counted.
    pub fn total(&self) -> usize {
        self.translation_status.values().sum()
    }

    pub fn count(&self, status: TranslationStatus) -> usize {
        self.translation_status.get(&status).copied().unwrap_or(0)
    }
}

/// Counters for every configured language of a bundle.
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct BundleMetrics {
    pub languages: BTreeMap<String, LanguageMetrics>,
}

impl BundleMetrics {
    pub fn from_bundle(bundle: &Bundle) -> Self {
        let languages = bundle
            .languages()
            .filter_map(|language| {
                bundle
                    .entries(language)
                    .map(|entries| (language.to_string(), LanguageMetrics::from_entries(entries)))
            })
            .collect();
        Self { languages }
    }
}
