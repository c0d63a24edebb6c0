#![forbid(unsafe_code)]
//! Resource bundle synchronization for a translation-management service.
//!
//! A bundle holds one source language and any number of target languages.
//! Writes to the source propagate to every target as machine-translation
//! requests; writes to a target become authoritative overrides. All of it is
//! exposed through a role-checked service contract.
//!
//! # Quick Start
//!
//! ```rust
//! use std::collections::BTreeMap;
//! use bundlesync::{Caller, ChangeSet, NewBundleData, Role, Service, ServiceConfig};
//!
//! let (service, queue) = Service::with_queue(ServiceConfig::default());
//! let admin = service.client(Caller::new("admin", Role::Administrator))?;
//! admin.create_bundle("app", NewBundleData::new("en").with_target_languages(["fr", "de"]))?;
//!
//! let strings = BTreeMap::from([
//!     ("greeting".to_string(), "Hello".to_string()),
//!     ("farewell".to_string(), "Bye".to_string()),
//! ]);
//! admin.upload_resource_strings("app", "en", &strings)?;
//! assert_eq!(queue.len(), 4);
//!
//! // A translator fixes one French string by hand.
//! let translator = service.client(Caller::new("t1", Role::Translator))?;
//! let fix = ChangeSet::new().with_value("Salut");
//! translator.update_resource_entry("app", "fr", "greeting", &fix)?;
//! # Ok::<(), bundlesync::Error>(())
//! ```
//!
//! # Layers
//!
//! - [`ChangeSet`]: sparse patch applied to a single [`ResourceEntry`]
//! - [`Reconciler`]: propagation rules for upload, update, and single-entry writes
//! - [`Bundle`] / [`BundleStore`]: language configuration and entry sets
//! - [`Service`] / [`ServiceClient`]: authorization and translation dispatch

pub mod access;
pub mod bundle;
pub mod change_set;
pub mod config;
pub mod error;
pub mod metrics;
pub mod reconciler;
pub mod service;
pub mod translation;
pub mod types;
pub mod users;

// Re-export most used types for easy consumption
pub use crate::{
    access::{AuthScheme, Caller, Operation, Role},
    bundle::{Bundle, BundleChangeSet, BundleData, BundleStore, EntrySet, NewBundleData},
    change_set::{ChangeSet, apply},
    config::{Limits, ServiceConfig},
    error::Error,
    metrics::{BundleMetrics, LanguageMetrics},
    reconciler::{Reconciler, ResourceStrings, SyncOutcome},
    service::{Service, ServiceClient},
    translation::{
        TranslationQueue, TranslationRequest, TranslationSink, TranslationWorker, Translator,
        WorkerReport,
    },
    types::{LanguageRole, Origin, ResourceEntry, TranslationStatus},
    users::{NewUserData, UserChangeSet, UserData},
};
