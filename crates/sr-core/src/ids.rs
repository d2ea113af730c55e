//! Typed ID wrappers for job identifiers supplied by upstream producers.
//!
//! Both IDs are opaque strings chosen by the requester. Because a job ID names
//! directories and the final artifact, it must be usable as a single path
//! component; construction validates that.

use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

use crate::error::Error;

/// Generate a newtype ID wrapper over `String`.
///
/// The macro produces a struct with:
/// - `parse()` validating the value as a safe single path component
/// - `Debug`, `Clone`, `PartialEq`, `Eq`, `Hash`, `Ord`, `Serialize`, `Deserialize`
/// - `Display` and `FromStr`
/// - `as_str()` borrowing the inner value
macro_rules! typed_id {
    ($($(#[doc = $doc:expr])* $name:ident),+ $(,)?) => {
        $(
            $(#[doc = $doc])*
            #[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
            #[serde(try_from = "String", into = "String")]
            pub struct $name(String);

            impl $name {
                /// Validate and wrap an identifier.
                pub fn parse(value: impl Into<String>) -> crate::Result<Self> {
                    let value = value.into();
                    validate_component(stringify!($name), &value)?;
                    Ok(Self(value))
                }

                /// Borrow the identifier as a string slice.
                #[must_use]
                pub fn as_str(&self) -> &str {
                    &self.0
                }
            }

            impl fmt::Display for $name {
                fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
                    f.write_str(&self.0)
                }
            }

            impl FromStr for $name {
                type Err = Error;

                fn from_str(s: &str) -> std::result::Result<Self, Self::Err> {
                    Self::parse(s)
                }
            }

            impl TryFrom<String> for $name {
                type Error = Error;

                fn try_from(value: String) -> std::result::Result<Self, Self::Error> {
                    Self::parse(value)
                }
            }

            impl From<$name> for String {
                fn from(id: $name) -> Self {
                    id.0
                }
            }
        )+
    };
}

typed_id! {
    /// Identifier of one slide-deck-to-video conversion.
    JobId,
    /// Identifier of the requester's download handle for the finished video.
    FileId,
}

fn validate_component(kind: &str, value: &str) -> crate::Result<()> {
    if value.is_empty() {
        return Err(Error::Validation(format!("{kind} must not be empty")));
    }
    if value == "." || value == ".." {
        return Err(Error::Validation(format!("{kind} must not be '{value}'")));
    }
    if value
        .chars()
        .any(|c| c == '/' || c == '\\' || c == '\0' || c.is_control())
    {
        return Err(Error::Validation(format!(
            "{kind} contains characters not allowed in a path component: {value:?}"
        )));
    }
    Ok(())
}
