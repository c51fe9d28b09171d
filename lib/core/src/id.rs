//! Strongly-typed identifiers.
//!
//! Internally generated IDs use ULID format, providing both uniqueness and
//! temporal ordering. Session keys are opaque caller-supplied strings.

use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;
use ulid::Ulid;

/// Error returned when parsing an ID from a string fails.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ParseIdError {
    /// The type of ID that failed to parse.
    pub id_type: &'static str,
    /// The reason for the parse failure.
    pub reason: String,
}

impl fmt::Display for ParseIdError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "failed to parse {}: {}", self.id_type, self.reason)
    }
}

impl std::error::Error for ParseIdError {}

/// Macro to generate a strongly-typed ID wrapper around ULID.
macro_rules! define_id {
    ($(#[$meta:meta])* $name:ident, $prefix:expr) => {
        $(#[$meta])*
        #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
        #[serde(transparent)]
        pub struct $name(Ulid);

        impl $name {
            /// Creates a new ID with a randomly generated ULID.
            #[must_use]
            pub fn new() -> Self {
                Self(Ulid::new())
            }

            /// Creates an ID from a ULID.
            #[must_use]
            pub const fn from_ulid(ulid: Ulid) -> Self {
                Self(ulid)
            }

            /// Returns the underlying ULID.
            #[must_use]
            pub const fn as_ulid(&self) -> Ulid {
                self.0
            }

            /// Returns the prefix used for display formatting.
            #[must_use]
            pub const fn prefix() -> &'static str {
                $prefix
            }
        }

        impl Default for $name {
            fn default() -> Self {
                Self::new()
            }
        }

        impl fmt::Display for $name {
            fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
                write!(f, "{}_{}", $prefix, self.0)
            }
        }

        impl FromStr for $name {
            type Err = ParseIdError;

            fn from_str(s: &str) -> Result<Self, Self::Err> {
                // Try with prefix first
                let prefix_with_underscore = concat!($prefix, "_");
                let ulid_str = if let Some(stripped) = s.strip_prefix(prefix_with_underscore) {
                    stripped
                } else {
                    // Try parsing as raw ULID
                    s
                };

                Ulid::from_str(ulid_str)
                    .map(Self)
                    .map_err(|e| ParseIdError {
                        id_type: stringify!($name),
                        reason: e.to_string(),
                    })
            }
        }

        impl From<Ulid> for $name {
            fn from(ulid: Ulid) -> Self {
                Self(ulid)
            }
        }

        impl From<$name> for Ulid {
            fn from(id: $name) -> Self {
                id.0
            }
        }
    };
}

define_id!(
    /// Unique identifier for one started conversation within a session.
    ///
    /// A fresh value is assigned every time a session is (re)started, so a
    /// reply generated for an earlier conversation can be recognised as stale.
    ConversationId,
    "conv"
);

define_id!(
    /// Unique identifier for a single turn in a transcript.
    TurnId,
    "turn"
);

/// Opaque key identifying a session.
///
/// Keys are supplied by the caller. The server issues them with
/// [`SessionKey::issue`], but any non-empty string is accepted; uniqueness is
/// the caller's responsibility.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct SessionKey(String);

impl SessionKey {
    /// Prefix used for keys issued by [`SessionKey::issue`].
    pub const ISSUED_PREFIX: &'static str = "sess";

    /// Wraps a caller-supplied key.
    ///
    /// # Errors
    ///
    /// Returns an error if the key is empty or only whitespace.
    pub fn new(key: impl Into<String>) -> Result<Self, ParseIdError> {
        let key = key.into();
        if key.trim().is_empty() {
            return Err(ParseIdError {
                id_type: "SessionKey",
                reason: "session key must not be empty".to_string(),
            });
        }
        Ok(Self(key))
    }

    /// Issues a new, globally unique session key.
    #[must_use]
    pub fn issue() -> Self {
        Self(format!("{}_{}", Self::ISSUED_PREFIX, Ulid::new()))
    }

    /// Returns the key as a string slice.
    #[must_use]
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for SessionKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl FromStr for SessionKey {
    type Err = ParseIdError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::new(s)
    }
}

impl TryFrom<String> for SessionKey {
    type Error = ParseIdError;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        Self::new(value)
    }
}

impl From<SessionKey> for String {
    fn from(key: SessionKey) -> Self {
        key.0
    }
}
