//! Strongly-typed object name wrapper.

use serde::{Deserialize, Serialize};
use std::borrow::Borrow;
use std::fmt;
use std::ops::Deref;

/// Display name of a model object.
///
/// Names are mutable and never used as identity (see [`ObjectId`](crate::ObjectId)).
/// A name is never blank. Formula references resolve names case-insensitively,
/// so comparisons in lookups go through [`ObjectName::matches`].
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize)]
#[serde(transparent)]
pub struct ObjectName(String);

impl<'de> Deserialize<'de> for ObjectName {
    fn deserialize<D>(deserializer: D) -> Result<Self, D::Error>
    where
        D: serde::Deserializer<'de>,
    {
        let s = String::deserialize(deserializer)?;
        ObjectName::try_new(s).ok_or_else(|| serde::de::Error::custom("ObjectName must not be blank"))
    }
}

impl ObjectName {
    /// Create a new `ObjectName`, panicking in debug builds if the name is blank.
    ///
    /// Prefer [`try_new`](Self::try_new) when handling untrusted input.
    pub fn new(name: impl Into<String>) -> Self {
        let s = name.into();
        debug_assert!(!s.trim().is_empty(), "ObjectName must not be blank");
        Self(s)
    }

    /// Try to create a new `ObjectName`, returning `None` if the name is blank.
    pub fn try_new(name: impl Into<String>) -> Option<Self> {
        let s = name.into();
        if s.trim().is_empty() {
            None
        } else {
            Some(Self(s))
        }
    }

    /// Return the underlying name as a string slice.
    pub fn as_str(&self) -> &str {
        &self.0
    }

    /// Consume the wrapper and return the inner `String`.
    pub fn into_inner(self) -> String {
        self.0
    }

    /// Case-insensitive comparison used by name resolution.
    pub fn matches(&self, other: &str) -> bool {
        names_match(&self.0, other)
    }
}

/// Compare two object names the way formula references resolve them.
pub fn names_match(a: &str, b: &str) -> bool {
    a.eq_ignore_ascii_case(b) || a.to_lowercase() == b.to_lowercase()
}

impl fmt::Display for ObjectName {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl AsRef<str> for ObjectName {
    fn as_ref(&self) -> &str {
        &self.0
    }
}

impl Deref for ObjectName {
    type Target = str;
    fn deref(&self) -> &str {
        &self.0
    }
}

impl Borrow<str> for ObjectName {
    fn borrow(&self) -> &str {
        &self.0
    }
}

impl PartialEq<str> for ObjectName {
    fn eq(&self, other: &str) -> bool {
        self.0 == other
    }
}

impl PartialEq<&str> for ObjectName {
    fn eq(&self, other: &&str) -> bool {
        self.0 == *other
    }
}

impl PartialEq<String> for ObjectName {
    fn eq(&self, other: &String) -> bool {
        self.0 == *other
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_object_name_creation() {
        let name = ObjectName::new("Total Sales");
        assert_eq!(name.as_str(), "Total Sales");
        assert_eq!(format!("{}", name), "Total Sales");
    }

    #[test]
    fn test_blank_names_rejected() {
        assert!(ObjectName::try_new("").is_none());
        assert!(ObjectName::try_new("   ").is_none());
        assert!(ObjectName::try_new("x").is_some());
    }

    #[test]
    fn test_matches_is_case_insensitive() {
        let name = ObjectName::new("Amount");
        assert!(name.matches("amount"));
        assert!(name.matches("AMOUNT"));
        assert!(!name.matches("Amounts"));
    }

    #[test]
    fn test_deserialize_rejects_blank() {
        let ok: ObjectName = serde_json::from_str(r#""Sales""#).unwrap();
        assert_eq!(ok, "Sales");
        assert!(serde_json::from_str::<ObjectName>(r#""  ""#).is_err());
    }
}
