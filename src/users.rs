//! Service users managed by administrators.

use std::collections::{BTreeMap, BTreeSet};

use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::{
    access::Role,
    change_set::{MetadataChanges, merge_metadata},
    error::Error,
};

/// A service user. `password` is only populated in the response that
/// generated it.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize, Serialize)]
pub struct UserData {
    pub id: String,
    pub role: Role,
    #[serde(skip_serializing_if = "Option::is_none", default)]
    pub display_name: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none", default)]
    pub comment: Option<String>,
    /// Bundles this user works on; empty means all bundles.
    #[serde(skip_serializing_if = "BTreeSet::is_empty", default)]
    pub bundles: BTreeSet<String>,
    #[serde(skip_serializing_if = "BTreeMap::is_empty", default)]
    pub metadata: BTreeMap<String, String>,
    #[serde(skip_serializing_if = "Option::is_none", default)]
    pub password: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Eq, Deserialize, Serialize)]
pub struct NewUserData {
    pub role: Role,
    #[serde(default)]
    pub display_name: Option<String>,
    #[serde(default)]
    pub comment: Option<String>,
    #[serde(default)]
    pub bundles: BTreeSet<String>,
    #[serde(default)]
    pub metadata: BTreeMap<String, String>,
}

impl NewUserData {
    pub fn new(role: Role) -> Self {
        Self {
            role,
            display_name: None,
            comment: None,
            bundles: BTreeSet::new(),
            metadata: BTreeMap::new(),
        }
    }

    pub fn with_display_name(mut self, name: impl Into<String>) -> Self {
        self.display_name = Some(name.into());
        self
    }

    pub fn with_bundles<I, S>(mut self, bundles: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.bundles = bundles.into_iter().map(Into::into).collect();
        self
    }
}

/// Sparse change to a user. The role cannot be changed.
#[derive(Debug, Clone, PartialEq, Eq, Default, Deserialize, Serialize)]
pub struct UserChangeSet {
    #[serde(skip_serializing_if = "Option::is_none", default)]
    pub display_name: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none", default)]
    pub comment: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none", default)]
    pub bundles: Option<BTreeSet<String>>,
    #[serde(skip_serializing_if = "Option::is_none", default)]
    pub metadata: Option<MetadataChanges>,
}

impl UserChangeSet {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_display_name(mut self, name: impl Into<String>) -> Self {
        self.display_name = Some(name.into());
        self
    }

    pub fn with_comment(mut self, comment: impl Into<String>) -> Self {
        self.comment = Some(comment.into());
        self
    }

    pub fn with_metadata_entry(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.metadata
            .get_or_insert_with(BTreeMap::new)
            .insert(key.into(), Some(value.into()));
        self
    }
}

/// In-memory user table keyed by user ID.
#[derive(Debug, Clone, Default)]
pub struct UserRegistry {
    users: BTreeMap<String, UserData>,
}

impl UserRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn list(&self) -> BTreeMap<String, UserData> {
        self.users.clone()
    }

    pub fn get(&self, user_id: &str) -> Result<UserData, Error> {
        self.users
            .get(user_id)
            .cloned()
            .ok_or_else(|| Error::not_found(format!("user `{}`", user_id)))
    }

    /// Creates a user with a generated ID and returns it with its password.
    pub fn create(&mut self, data: NewUserData) -> UserData {
        let user = UserData {
            id: Uuid::new_v4().simple().to_string(),
            role: data.role,
            display_name: data.display_name,
            comment: data.comment,
            bundles: data.bundles,
            metadata: data.metadata,
            password: None,
        };
        self.users.insert(user.id.clone(), user.clone());
        UserData {
            password: Some(generate_password()),
            ..user
        }
    }

    /// Applies `change`; with `reset_password` the result carries a new password.
    pub fn update(
        &mut self,
        user_id: &str,
        change: &UserChangeSet,
        reset_password: bool,
    ) -> Result<UserData, Error> {
        let user = self
            .users
            .get_mut(user_id)
            .ok_or_else(|| Error::not_found(format!("user `{}`", user_id)))?;
        if let Some(name) = &change.display_name {
            user.display_name = (!name.is_empty()).then(|| name.clone());
        }
        if let Some(comment) = &change.comment {
            user.comment = (!comment.is_empty()).then(|| comment.clone());
        }
        if let Some(bundles) = &change.bundles {
            user.bundles = bundles.clone();
        }
        if let Some(metadata) = &change.metadata {
            merge_metadata(&mut user.metadata, metadata);
        }
        let mut result = user.clone();
        if reset_password {
            result.password = Some(generate_password());
        }
        Ok(result)
    }

    pub fn delete(&mut self, user_id: &str) -> Result<(), Error> {
        self.users
            .remove(user_id)
            .map(|_| ())
            .ok_or_else(|| Error::not_found(format!("user `{}`", user_id)))
    }
}

fn generate_password() -> String {
    Uuid::new_v4().simple().to_string()
}
