//! Service limits and retry settings.

use std::{fs, path::Path};

use serde::{Deserialize, Serialize};

use crate::error::Error;

/// Count and length limits enforced on every write.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct Limits {
    /// Maximum number of resource keys in a bundle's source language.
    pub max_entries_per_bundle: usize,
    /// Maximum resource key length, in characters.
    pub max_key_length: usize,
    /// Maximum resource value length, in characters.
    pub max_value_length: usize,
    /// Maximum bundle ID length, in characters.
    pub max_bundle_id_length: usize,
}

impl Default for Limits {
    fn default() -> Self {
        Self {
            max_entries_per_bundle: 500,
            max_key_length: 255,
            max_value_length: 2047,
            max_bundle_id_length: 255,
        }
    }
}

/// Configuration for a [`crate::Service`].
///
/// Every field is optional when loading from TOML; missing fields keep their
/// defaults.
///
/// ```rust
/// use bundlesync::ServiceConfig;
///
/// let config = ServiceConfig::from_toml_str("max_enqueue_attempts = 5")?;
/// assert_eq!(config.max_enqueue_attempts, 5);
/// assert_eq!(config.limits.max_entries_per_bundle, 500);
/// # Ok::<(), bundlesync::Error>(())
/// ```
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct ServiceConfig {
    pub limits: Limits,
    /// Attempts made to enqueue one translation request before giving up.
    pub max_enqueue_attempts: u32,
}

impl Default for ServiceConfig {
    fn default() -> Self {
        Self {
            limits: Limits::default(),
            max_enqueue_attempts: 3,
        }
    }
}

impl ServiceConfig {
    /// Creates the default configuration.
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_max_entries_per_bundle(mut self, max: usize) -> Self {
        self.limits.max_entries_per_bundle = max;
        self
    }

    pub fn with_max_value_length(mut self, max: usize) -> Self {
        self.limits.max_value_length = max;
        self
    }

    pub fn with_max_key_length(mut self, max: usize) -> Self {
        self.limits.max_key_length = max;
        self
    }

    /// Sets the enqueue attempt budget. Zero is treated as one attempt.
    pub fn with_max_enqueue_attempts(mut self, attempts: u32) -> Self {
        self.max_enqueue_attempts = attempts;
        self
    }

    /// Parses a configuration from TOML text.
    pub fn from_toml_str(s: &str) -> Result<Self, Error> {
        Ok(toml::from_str(s)?)
    }

    /// Reads a TOML configuration file.
    pub fn read_from<P: AsRef<Path>>(path: P) -> Result<Self, Error> {
        let text = fs::read_to_string(path)?;
        Self::from_toml_str(&text)
    }
}
