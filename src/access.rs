//! Caller roles and the capability table checked at the service boundary.

use std::fmt::Display;

use serde::{Deserialize, Serialize};

use crate::error::Error;

/// Kind of service user.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Deserialize, Serialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum Role {
    Administrator,
    Translator,
    Reader,
}

impl Display for Role {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let s = match self {
            Role::Administrator => "ADMINISTRATOR",
            Role::Translator => "TRANSLATOR",
            Role::Reader => "READER",
        };
        write!(f, "{}", s)
    }
}

/// Credential scheme attached to every request.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Deserialize, Serialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum AuthScheme {
    #[default]
    Hmac,
    /// Only accepted for [`Role::Reader`].
    Basic,
}

/// Every operation exposed by the service contract.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Deserialize, Serialize)]
#[serde(rename_all = "camelCase")]
pub enum Operation {
    GetBundleIds,
    CreateBundle,
    GetBundleInfo,
    UpdateBundle,
    DeleteBundle,
    GetBundleMetrics,
    GetLanguageMetrics,
    UploadResourceStrings,
    /// `updateResourceStrings` addressed to the source language.
    UpdateSourceStrings,
    /// `updateResourceStrings` addressed to a target language.
    UpdateTargetStrings,
    GetResourceStrings,
    GetResourceEntries,
    GetResourceEntry,
    /// `updateResourceEntry` addressed to the source language.
    UpdateSourceEntry,
    /// `updateResourceEntry` addressed to a target language.
    UpdateTargetEntry,
    GetUsers,
    GetUser,
    CreateUser,
    UpdateUser,
    DeleteUser,
}

impl Operation {
    /// Name of the operation in the service catalog.
    pub fn as_str(self) -> &'static str {
        match self {
            Operation::GetBundleIds => "getBundleIds",
            Operation::CreateBundle => "createBundle",
            Operation::GetBundleInfo => "getBundleInfo",
            Operation::UpdateBundle => "updateBundle",
            Operation::DeleteBundle => "deleteBundle",
            Operation::GetBundleMetrics => "getBundleMetrics",
            Operation::GetLanguageMetrics => "getLanguageMetrics",
            Operation::UploadResourceStrings => "uploadResourceStrings",
            Operation::UpdateSourceStrings | Operation::UpdateTargetStrings => {
                "updateResourceStrings"
            }
            Operation::GetResourceStrings => "getResourceStrings",
            Operation::GetResourceEntries => "getResourceEntries",
            Operation::GetResourceEntry => "getResourceEntry",
            Operation::UpdateSourceEntry | Operation::UpdateTargetEntry => "updateResourceEntry",
            Operation::GetUsers => "getUsers",
            Operation::GetUser => "getUser",
            Operation::CreateUser => "createUser",
            Operation::UpdateUser => "updateUser",
            Operation::DeleteUser => "deleteUser",
        }
    }
}

impl Display for Operation {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

const ADMIN_ONLY: &[Role] = &[Role::Administrator];
const ADMIN_AND_TRANSLATOR: &[Role] = &[Role::Administrator, Role::Translator];
const ALL_ROLES: &[Role] = &[Role::Administrator, Role::Translator, Role::Reader];

/// Roles allowed to perform `operation`.
pub fn permitted_roles(operation: Operation) -> &'static [Role] {
    match operation {
        Operation::GetBundleIds
        | Operation::CreateBundle
        | Operation::UpdateBundle
        | Operation::DeleteBundle
        | Operation::UploadResourceStrings
        | Operation::UpdateSourceStrings
        | Operation::UpdateSourceEntry
        | Operation::GetUsers
        | Operation::GetUser
        | Operation::CreateUser
        | Operation::UpdateUser
        | Operation::DeleteUser => ADMIN_ONLY,
        Operation::UpdateTargetStrings
        | Operation::UpdateTargetEntry
        | Operation::GetBundleMetrics
        | Operation::GetLanguageMetrics => ADMIN_AND_TRANSLATOR,
        Operation::GetBundleInfo
        | Operation::GetResourceStrings
        | Operation::GetResourceEntries
        | Operation::GetResourceEntry => ALL_ROLES,
    }
}

/// Whether `role` may perform `operation`.
pub fn is_permitted(role: Role, operation: Operation) -> bool {
    permitted_roles(operation).contains(&role)
}

/// The authenticated identity behind a request.
///
/// Credential verification happens outside this crate; a `Caller` is what is
/// left once it succeeded.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize, Serialize)]
pub struct Caller {
    pub user_id: String,
    pub role: Role,
    #[serde(default)]
    pub scheme: AuthScheme,
}

impl Caller {
    /// A caller using the default HMAC scheme.
    pub fn new(user_id: impl Into<String>, role: Role) -> Self {
        Self {
            user_id: user_id.into(),
            role,
            scheme: AuthScheme::default(),
        }
    }

    pub fn with_scheme(mut self, scheme: AuthScheme) -> Self {
        self.scheme = scheme;
        self
    }

    /// Rejects scheme/role combinations the service never accepts.
    pub fn check_scheme(&self) -> Result<(), Error> {
        if self.scheme == AuthScheme::Basic && self.role != Role::Reader {
            return Err(Error::Authorization {
                role: self.role,
                reason: "BASIC authentication is only available to READER users".to_string(),
            });
        }
        Ok(())
    }

    /// Fails with [`Error::Authorization`] unless the table allows `operation`.
    pub fn authorize(&self, operation: Operation) -> Result<(), Error> {
        if is_permitted(self.role, operation) {
            Ok(())
        } else {
            Err(Error::Authorization {
                role: self.role,
                reason: format!("not permitted to perform {}", operation),
            })
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_admin_only_operations() {
        for operation in [
            Operation::CreateBundle,
            Operation::DeleteBundle,
            Operation::UploadResourceStrings,
            Operation::UpdateSourceStrings,
            Operation::CreateUser,
        ] {
            assert!(is_permitted(Role::Administrator, operation));
            assert!(!is_permitted(Role::Translator, operation));
            assert!(!is_permitted(Role::Reader, operation));
        }
    }

    #[test]
    fn test_translator_operations() {
        for operation in [
            Operation::UpdateTargetStrings,
            Operation::UpdateTargetEntry,
            Operation::GetBundleMetrics,
            Operation::GetLanguageMetrics,
        ] {
            assert!(is_permitted(Role::Translator, operation));
            assert!(!is_permitted(Role::Reader, operation));
        }
    }

    #[test]
    fn test_read_operations_open_to_all() {
        for role in [Role::Administrator, Role::Translator, Role::Reader] {
            assert!(is_permitted(role, Operation::GetBundleInfo));
            assert!(is_permitted(role, Operation::GetResourceStrings));
            assert!(is_permitted(role, Operation::GetResourceEntries));
            assert!(is_permitted(role, Operation::GetResourceEntry));
        }
    }

    #[test]
    fn test_authorize_error() {
        let caller = Caller::new("r1", Role::Reader);
        let err = caller.authorize(Operation::UpdateTargetStrings).unwrap_err();
        assert!(matches!(err, Error::Authorization { role: Role::Reader, .. }));
        assert_eq!(
            err.to_string(),
            "READER is not authorized: not permitted to perform updateResourceStrings"
        );
    }

    #[test]
    fn test_basic_scheme_is_reader_only() {
        assert!(
            Caller::new("r1", Role::Reader)
                .with_scheme(AuthScheme::Basic)
                .check_scheme()
                .is_ok()
        );
        let result = Caller::new("t1", Role::Translator)
            .with_scheme(AuthScheme::Basic)
            .check_scheme();
        assert!(matches!(result, Err(Error::Authorization { .. })));
        assert!(Caller::new("a1", Role::Administrator).check_scheme().is_ok());
    }
}
