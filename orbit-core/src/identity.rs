//! Identity types for Orbit content
//!
//! Every identifier is an opaque string that is safe to use as a map key or a
//! persisted document key. Content IDs (prompts, action logs, attachments) are
//! base58btc CIDs produced by [`crate::codec`]; they can only be built by the
//! codec or by [`parse`](ActionLogId::parse), which validates the string.
//! Distinct newtypes keep a prompt ID from ever being passed where a log ID is
//! expected.

use crate::codec;
use crate::error::CodecError;
use serde::{Deserialize, Deserializer, Serialize, Serializer};
use std::fmt;

/// Timestamp in milliseconds since the Unix epoch.
pub type TimestampMillis = i64;

/// Duration in milliseconds.
pub type DurationMillis = i64;

macro_rules! content_id {
    ($(#[$meta:meta])* $name:ident) => {
        $(#[$meta])*
        #[derive(Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
        pub struct $name(String);

        impl $name {
            /// Parse and validate a base58btc CID string.
            pub fn parse(id: &str) -> Result<Self, CodecError> {
                codec::validate_cid_string(id)?;
                Ok(Self(id.to_string()))
            }

            pub(crate) fn from_encoded(encoded: String) -> Self {
                Self(encoded)
            }

            pub fn as_str(&self) -> &str {
                &self.0
            }

            /// Binary CID this identifier encodes, as used in DAG links.
            pub fn to_cid_bytes(&self) -> Result<Vec<u8>, CodecError> {
                codec::decode_cid_string(&self.0)
            }
        }

        impl fmt::Display for $name {
            fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
                f.write_str(&self.0)
            }
        }

        impl fmt::Debug for $name {
            fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
                write!(f, "{}({})", stringify!($name), self.0)
            }
        }

        impl std::str::FromStr for $name {
            type Err = CodecError;

            fn from_str(s: &str) -> Result<Self, Self::Err> {
                Self::parse(s)
            }
        }

        impl AsRef<str> for $name {
            fn as_ref(&self) -> &str {
                &self.0
            }
        }

        impl Serialize for $name {
            fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
                serializer.serialize_str(&self.0)
            }
        }

        impl<'de> Deserialize<'de> for $name {
            fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
                let raw = String::deserialize(deserializer)?;
                Self::parse(&raw).map_err(serde::de::Error::custom)
            }
        }
    };
}

content_id!(
    /// Content-derived identifier of a [`crate::Prompt`].
    PromptId
);

content_id!(
    /// Content-derived identifier of an [`crate::ActionLog`], committing to its parents.
    ActionLogId
);

content_id!(
    /// Content-derived identifier of raw attachment bytes.
    AttachmentId
);

/// Encoded identity of a prompt task: `<promptID>/<promptType>[/<clozeIndex>]`.
///
/// Not validated on construction; [`PromptTaskId::decode`](crate::PromptTaskId::decode)
/// reports malformed IDs, and that failure is a transition error.
#[derive(Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct PromptTaskId(String);

impl PromptTaskId {
    /// Wrap a raw task ID string, e.g. one read back from storage.
    pub fn new(raw: impl Into<String>) -> Self {
        Self(raw.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for PromptTaskId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl fmt::Debug for PromptTaskId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "PromptTaskId({})", self.0)
    }
}

impl AsRef<str> for PromptTaskId {
    fn as_ref(&self) -> &str {
        &self.0
    }
}
