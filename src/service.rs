//! The service contract: role-checked operations over bundle state.
//!
//! [`Service`] owns all bundles and users behind one lock and the sink that
//! receives translation requests. Callers interact through a
//! [`ServiceClient`], which checks the capability table once per operation
//! before any state is touched.
//!
//! ```rust
//! use std::collections::BTreeMap;
//! use bundlesync::{Caller, NewBundleData, Role, Service, ServiceConfig};
//!
//! let (service, queue) = Service::with_queue(ServiceConfig::default());
//! let admin = service.client(Caller::new("admin", Role::Administrator))?;
//!
//! admin.create_bundle("app", NewBundleData::new("en").with_target_languages(["fr"]))?;
//! let strings = BTreeMap::from([("greeting".to_string(), "Hello".to_string())]);
//! admin.upload_resource_strings("app", "en", &strings)?;
//!
//! // One request per target language is waiting for the translator.
//! assert_eq!(queue.len(), 1);
//! # Ok::<(), bundlesync::Error>(())
//! ```

use std::sync::Arc;

use parking_lot::RwLock;
use tracing::{info, warn};

use crate::{
    access::{Caller, Operation, Role},
    bundle::{Bundle, BundleChangeSet, BundleData, BundleStore, EntrySet, NewBundleData},
    change_set::ChangeSet,
    config::ServiceConfig,
    error::Error,
    metrics::{BundleMetrics, LanguageMetrics},
    reconciler::{Reconciler, ResourceStrings, SyncOutcome},
    translation::{TranslationQueue, TranslationRequest, TranslationSink, enqueue_with_retry},
    types::{LanguageRole, Origin, ResourceEntry, TranslationStatus, normalize_language},
    users::{NewUserData, UserChangeSet, UserData, UserRegistry},
};

#[derive(Debug, Default)]
struct State {
    bundles: BundleStore,
    users: UserRegistry,
}

/// One translation-management service instance.
pub struct Service {
    config: ServiceConfig,
    state: RwLock<State>,
    sink: Arc<dyn TranslationSink>,
}

impl Service {
    pub fn new(config: ServiceConfig, sink: Arc<dyn TranslationSink>) -> Self {
        Self {
            config,
            state: RwLock::new(State::default()),
            sink,
        }
    }

    /// A service backed by a fresh in-memory [`TranslationQueue`].
    pub fn with_queue(config: ServiceConfig) -> (Self, Arc<TranslationQueue>) {
        let queue = Arc::new(TranslationQueue::new());
        (Self::new(config, queue.clone()), queue)
    }

    pub fn config(&self) -> &ServiceConfig {
        &self.config
    }

    /// Opens a client for an authenticated caller.
    pub fn client(&self, caller: Caller) -> Result<ServiceClient<'_>, Error> {
        caller.check_scheme()?;
        Ok(ServiceClient {
            service: self,
            caller,
        })
    }

    /// Writes the outcome of a translation request back to its entry.
    ///
    /// Returns `false` when the result no longer applies: the bundle, language
    /// or key is gone, the entry was overwritten by a caller, or it is now
    /// derived from a different source value.
    pub fn resolve_translation(
        &self,
        request: &TranslationRequest,
        result: Result<String, Error>,
    ) -> bool {
        let mut state = self.state.write();
        let Ok(bundle) = state.bundles.get_mut(&request.bundle_id) else {
            return false;
        };
        let Some(entry) = bundle
            .entries_mut(&request.target_language)
            .and_then(|set| set.get_mut(&request.key))
        else {
            return false;
        };
        if entry.origin != Origin::Derived
            || entry.translation_status != TranslationStatus::InProgress
            || entry.source_value.as_deref() != Some(request.source_value.as_str())
        {
            return false;
        }
        match result {
            Ok(text) => {
                entry.value = Some(text);
                entry.translation_status = TranslationStatus::Translated;
            }
            Err(_) => entry.translation_status = TranslationStatus::Failed,
        }
        true
    }

    /// Hands requests to the sink. Entries whose request could not be
    /// enqueued are marked failed; committed writes stay in place.
    fn dispatch(&self, bundle: &mut Bundle, requests: &[TranslationRequest]) -> Result<(), Error> {
        let mut failed = 0;
        let mut first_error = None;
        for request in requests {
            if let Err(err) =
                enqueue_with_retry(self.sink.as_ref(), request, self.config.max_enqueue_attempts)
            {
                warn!(
                    bundle = %request.bundle_id,
                    language = %request.target_language,
                    key = %request.key,
                    error = %err,
                    "giving up on translation request"
                );
                if let Some(entry) = bundle
                    .entries_mut(&request.target_language)
                    .and_then(|set| set.get_mut(&request.key))
                {
                    entry.translation_status = TranslationStatus::Failed;
                }
                failed += 1;
                first_error.get_or_insert(err);
            }
        }
        match first_error {
            None => Ok(()),
            Some(err) => Err(Error::service_error(
                format!(
                    "{} of {} translation requests could not be enqueued",
                    failed,
                    requests.len()
                ),
                Some(Box::new(err)),
            )),
        }
    }
}

/// A [`Service`] handle bound to one caller.
pub struct ServiceClient<'a> {
    service: &'a Service,
    caller: Caller,
}

impl ServiceClient<'_> {
    pub fn caller(&self) -> &Caller {
        &self.caller
    }

    pub fn get_bundle_ids(&self) -> Result<Vec<String>, Error> {
        self.caller.authorize(Operation::GetBundleIds)?;
        let state = self.service.state.read();
        Ok(state.bundles.ids().map(str::to_string).collect())
    }

    pub fn create_bundle(&self, bundle_id: &str, data: NewBundleData) -> Result<(), Error> {
        self.caller.authorize(Operation::CreateBundle)?;
        let mut bundle = Bundle::new(bundle_id, data, &self.service.config.limits)?;
        bundle.set_updated_by(&self.caller.user_id);
        self.service.state.write().bundles.insert(bundle)?;
        info!(bundle = %bundle_id, user = %self.caller.user_id, "created bundle");
        Ok(())
    }

    /// Bundle configuration; READER callers only see the languages.
    pub fn get_bundle_info(&self, bundle_id: &str) -> Result<BundleData, Error> {
        self.caller.authorize(Operation::GetBundleInfo)?;
        let state = self.service.state.read();
        let bundle = state.bundles.get(bundle_id)?;
        Ok(bundle.info(self.caller.role != Role::Reader))
    }

    pub fn get_bundle_metrics(&self, bundle_id: &str) -> Result<BundleMetrics, Error> {
        self.caller.authorize(Operation::GetBundleMetrics)?;
        let state = self.service.state.read();
        Ok(BundleMetrics::from_bundle(state.bundles.get(bundle_id)?))
    }

    pub fn update_bundle(&self, bundle_id: &str, change: &BundleChangeSet) -> Result<(), Error> {
        self.caller.authorize(Operation::UpdateBundle)?;
        let mut state = self.service.state.write();
        let bundle = state.bundles.get_mut(bundle_id)?;
        let requests = bundle.apply_change_set(change)?;
        bundle.set_updated_by(&self.caller.user_id);
        info!(bundle = %bundle_id, translations = requests.len(), "updated bundle");
        self.service.dispatch(bundle, &requests)
    }

    pub fn delete_bundle(&self, bundle_id: &str) -> Result<(), Error> {
        self.caller.authorize(Operation::DeleteBundle)?;
        self.service.state.write().bundles.remove(bundle_id)?;
        info!(bundle = %bundle_id, "deleted bundle");
        Ok(())
    }

    /// Key/value strings of one language.
    ///
    /// With `fallback`, a target key whose translation is still pending
    /// reports the source value instead of being omitted.
    pub fn get_resource_strings(
        &self,
        bundle_id: &str,
        language: &str,
        fallback: bool,
    ) -> Result<ResourceStrings, Error> {
        self.caller.authorize(Operation::GetResourceStrings)?;
        let state = self.service.state.read();
        let bundle = state.bundles.get(bundle_id)?;
        let entries = configured_entries(bundle, language)?;
        let source = bundle.source_entries();

        let mut strings = ResourceStrings::new();
        for (key, entry) in entries {
            let value = entry.value.clone().or_else(|| {
                fallback
                    .then(|| source.get(key).and_then(|s| s.value.clone()))
                    .flatten()
            });
            if let Some(value) = value {
                strings.insert(key.clone(), value);
            }
        }
        Ok(strings)
    }

    pub fn get_resource_entries(&self, bundle_id: &str, language: &str) -> Result<EntrySet, Error> {
        self.caller.authorize(Operation::GetResourceEntries)?;
        let state = self.service.state.read();
        let bundle = state.bundles.get(bundle_id)?;
        configured_entries(bundle, language).cloned()
    }

    pub fn get_resource_entry(
        &self,
        bundle_id: &str,
        language: &str,
        key: &str,
    ) -> Result<ResourceEntry, Error> {
        self.caller.authorize(Operation::GetResourceEntry)?;
        let state = self.service.state.read();
        let bundle = state.bundles.get(bundle_id)?;
        configured_entries(bundle, language)?
            .get(key)
            .cloned()
            .ok_or_else(|| {
                Error::not_found(format!(
                    "resource key `{}` in bundle `{}` language `{}`",
                    key, bundle_id, language
                ))
            })
    }

    pub fn get_language_metrics(
        &self,
        bundle_id: &str,
        language: &str,
    ) -> Result<LanguageMetrics, Error> {
        self.caller.authorize(Operation::GetLanguageMetrics)?;
        let state = self.service.state.read();
        let bundle = state.bundles.get(bundle_id)?;
        Ok(LanguageMetrics::from_entries(configured_entries(bundle, language)?))
    }

    /// Full replace of one language's strings. See [`Reconciler::upload`].
    pub fn upload_resource_strings(
        &self,
        bundle_id: &str,
        language: &str,
        strings: &ResourceStrings,
    ) -> Result<SyncOutcome, Error> {
        self.caller.authorize(Operation::UploadResourceStrings)?;
        self.write(bundle_id, |reconciler, bundle| {
            reconciler.upload(bundle, language, strings)
        })
    }

    /// Partial write of one language's strings. See [`Reconciler::update`].
    pub fn update_resource_strings(
        &self,
        bundle_id: &str,
        language: &str,
        strings: &ResourceStrings,
        resync: bool,
    ) -> Result<SyncOutcome, Error> {
        self.caller.authorize(Operation::UpdateTargetStrings)?;
        self.write(bundle_id, |reconciler, bundle| {
            if is_source(bundle, language) {
                self.caller.authorize(Operation::UpdateSourceStrings)?;
            }
            reconciler.update(bundle, language, strings, resync)
        })
    }

    /// Patch of one entry. See [`Reconciler::update_entry`].
    pub fn update_resource_entry(
        &self,
        bundle_id: &str,
        language: &str,
        key: &str,
        change: &ChangeSet,
    ) -> Result<SyncOutcome, Error> {
        self.caller.authorize(Operation::UpdateTargetEntry)?;
        self.write(bundle_id, |reconciler, bundle| {
            if is_source(bundle, language) {
                self.caller.authorize(Operation::UpdateSourceEntry)?;
            }
            reconciler.update_entry(bundle, language, key, change)
        })
    }

    pub fn get_users(&self) -> Result<std::collections::BTreeMap<String, UserData>, Error> {
        self.caller.authorize(Operation::GetUsers)?;
        Ok(self.service.state.read().users.list())
    }

    pub fn get_user(&self, user_id: &str) -> Result<UserData, Error> {
        self.caller.authorize(Operation::GetUser)?;
        self.service.state.read().users.get(user_id)
    }

    pub fn create_user(&self, data: NewUserData) -> Result<UserData, Error> {
        self.caller.authorize(Operation::CreateUser)?;
        let user = self.service.state.write().users.create(data);
        info!(user = %user.id, role = %user.role, "created user");
        Ok(user)
    }

    pub fn update_user(
        &self,
        user_id: &str,
        change: &UserChangeSet,
        reset_password: bool,
    ) -> Result<UserData, Error> {
        self.caller.authorize(Operation::UpdateUser)?;
        self.service
            .state
            .write()
            .users
            .update(user_id, change, reset_password)
    }

    pub fn delete_user(&self, user_id: &str) -> Result<(), Error> {
        self.caller.authorize(Operation::DeleteUser)?;
        self.service.state.write().users.delete(user_id)
    }

    /// Runs one reconciler write and dispatches its translation requests,
    /// all under the state write lock.
    ///
    /// A dispatch failure carries the committed [`SyncOutcome`]; see
    /// [`Error::committed_outcome`].
    fn write<F>(&self, bundle_id: &str, op: F) -> Result<SyncOutcome, Error>
    where
        F: FnOnce(&Reconciler<'_>, &mut Bundle) -> Result<SyncOutcome, Error>,
    {
        let mut state = self.service.state.write();
        let bundle = state.bundles.get_mut(bundle_id)?;
        let reconciler = Reconciler::new(&self.service.config.limits);
        let outcome = op(&reconciler, bundle)?;
        if !outcome.is_noop() {
            bundle.set_updated_by(&self.caller.user_id);
        }
        match self.service.dispatch(bundle, &outcome.translation_requests) {
            Ok(()) => Ok(outcome),
            Err(err) => Err(err.with_outcome(outcome)),
        }
    }
}

fn is_source(bundle: &Bundle, language: &str) -> bool {
    normalize_language(language)
        .map(|language| bundle.role_of(&language) == Some(LanguageRole::Source))
        .unwrap_or(false)
}

fn configured_entries<'b>(bundle: &'b Bundle, language: &str) -> Result<&'b EntrySet, Error> {
    let language = normalize_language(language)?;
    bundle.entries(&language).ok_or_else(|| {
        Error::not_found(format!(
            "language `{}` in bundle `{}`",
            language,
            bundle.id()
        ))
    })
}
