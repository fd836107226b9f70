//! NewType wrappers for strong typing throughout the roster service.
//!
//! These types prevent accidental mixing of semantically different values
//! (e.g., passing a context id where a course id is expected).

use serde::{Deserialize, Serialize};
use std::fmt;

/// Macro to generate a NewType wrapper around a `String`.
macro_rules! newtype_string {
    (
        $(#[$meta:meta])*
        $name:ident
    ) => {
        $(#[$meta])*
        #[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
        #[serde(transparent)]
        pub struct $name(String);

        impl $name {
            /// Create a new instance.
            pub fn new(value: impl Into<String>) -> Self {
                Self(value.into())
            }

            /// Get the inner value as a string slice.
            pub fn as_str(&self) -> &str {
                &self.0
            }

            /// Consume and return the inner String.
            pub fn into_inner(self) -> String {
                self.0
            }
        }

        impl From<String> for $name {
            fn from(s: String) -> Self {
                Self(s)
            }
        }

        impl From<&str> for $name {
            fn from(s: &str) -> Self {
                Self(s.to_string())
            }
        }

        impl AsRef<str> for $name {
            fn as_ref(&self) -> &str {
                &self.0
            }
        }

        impl fmt::Display for $name {
            fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
                write!(f, "{}", self.0)
            }
        }

        impl std::borrow::Borrow<str> for $name {
            fn borrow(&self) -> &str {
                &self.0
            }
        }
    };
}

/// Macro to generate a NewType wrapper around an integer row id.
macro_rules! newtype_id {
    (
        $(#[$meta:meta])*
        $name:ident
    ) => {
        $(#[$meta])*
        #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
        #[serde(transparent)]
        pub struct $name(i64);

        impl $name {
            /// Create a new instance.
            pub const fn new(value: i64) -> Self {
                Self(value)
            }

            /// Get the raw integer value.
            pub const fn get(self) -> i64 {
                self.0
            }
        }

        impl From<i64> for $name {
            fn from(value: i64) -> Self {
                Self(value)
            }
        }

        impl fmt::Display for $name {
            fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
                write!(f, "{}", self.0)
            }
        }
    };
}

newtype_id!(
    /// Host identifier of a course (`course` table).
    CourseId
);

newtype_id!(
    /// Host identifier of a context. Role assignments are scoped by context,
    /// and every course owns exactly one course-level context.
    ContextId
);

newtype_id!(
    /// Host identifier of a user (`user` table).
    UserId
);

newtype_id!(
    /// Host identifier of a custom profile field definition.
    FieldId
);

newtype_string!(
    /// Stable textual identifier of a role, e.g. "student" or "editingteacher".
    ///
    /// Comparison is case-sensitive: "Student" and "student" are different
    /// roles.
    RoleShortName
);

newtype_string!(
    /// Capability string granted to callers, e.g. "course:view".
    ///
    /// The wildcard capability `*` grants everything.
    Capability
);

newtype_string!(
    /// External caller identifier from the authentication layer.
    ///
    /// This is an API key hash, `api_key:<prefix>`, or "anonymous".
    ExternalUserId
);

newtype_string!(
    /// Identity provider that authenticated the caller.
    ///
    /// Common values: "api_key", "anonymous", "local".
    IdentityProvider
);

newtype_string!(
    /// SHA-256 hex digest of an API key. Raw keys are never stored.
    ApiKeyHash
);

newtype_string!(
    /// Public prefix of an API key, used to identify it in listings
    /// (e.g., "cr_1a2b3c4d").
    ApiKeyPrefix
);

impl Capability {
    /// The wildcard capability.
    pub const WILDCARD: &'static str = "*";

    /// Whether this capability grants `required`.
    pub fn grants(&self, required: &Capability) -> bool {
        self.0 == Self::WILDCARD || self.0 == required.0
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_capability_grants_exact_and_wildcard() {
        let view = Capability::new("course:view");
        assert!(Capability::new("course:view").grants(&view));
        assert!(Capability::new("*").grants(&view));
        assert!(!Capability::new("course:update").grants(&view));
        assert!(!Capability::new("Course:View").grants(&view));
    }

    #[test]
    fn test_id_serializes_as_plain_integer() {
        let id = CourseId::new(10);
        assert_eq!(serde_json::to_string(&id).unwrap(), "10");
        let back: CourseId = serde_json::from_str("10").unwrap();
        assert_eq!(back, id);
        assert_eq!(id.to_string(), "10");
    }

    #[test]
    fn test_role_short_name_is_case_sensitive() {
        assert_ne!(RoleShortName::new("ta"), RoleShortName::new("TA"));
        assert_eq!(RoleShortName::from("ta").as_str(), "ta");
    }
}
