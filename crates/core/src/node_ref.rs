//! Opaque node references.
//!
//! A [`NodeRef`] names one node of a submitted graph and, after compilation,
//! the action derived from it. Refs are chosen by the editor, not by the
//! engine — the engine treats them as opaque strings, bounded to
//! [`MAX_NODE_REF_LEN`](crate::limits::MAX_NODE_REF_LEN) characters.

use std::borrow::Borrow;
use std::fmt;

use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::limits::MAX_NODE_REF_LEN;

/// Error produced when constructing a [`NodeRef`] from an invalid string.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum NodeRefError {
    /// The ref string was empty.
    #[error("node ref must not be empty")]
    Empty,

    /// The ref string exceeded the maximum length.
    #[error("node ref exceeds {MAX_NODE_REF_LEN} chars: {len}")]
    TooLong {
        /// Actual length of the rejected ref.
        len: usize,
    },
}

/// An opaque reference naming a node within one workflow.
///
/// Unique within a graph (the compiler enforces this), not globally.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct NodeRef(String);

impl NodeRef {
    /// Create a node ref, validating the bounds.
    pub fn new(value: impl Into<String>) -> Result<Self, NodeRefError> {
        let value = value.into();
        if value.is_empty() {
            return Err(NodeRefError::Empty);
        }
        if value.chars().count() > MAX_NODE_REF_LEN {
            return Err(NodeRefError::TooLong {
                len: value.chars().count(),
            });
        }
        Ok(Self(value))
    }

    /// The underlying string.
    #[must_use]
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for NodeRef {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl TryFrom<String> for NodeRef {
    type Error = NodeRefError;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        Self::new(value)
    }
}

impl TryFrom<&str> for NodeRef {
    type Error = NodeRefError;

    fn try_from(value: &str) -> Result<Self, Self::Error> {
        Self::new(value)
    }
}

impl From<NodeRef> for String {
    fn from(value: NodeRef) -> Self {
        value.0
    }
}

impl Borrow<str> for NodeRef {
    fn borrow(&self) -> &str {
        &self.0
    }
}

impl PartialEq<str> for NodeRef {
    fn eq(&self, other: &str) -> bool {
        self.0 == other
    }
}

impl PartialEq<&str> for NodeRef {
    fn eq(&self, other: &&str) -> bool {
        self.0 == *other
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    #[test]
    fn new_accepts_plain_ref() {
        let r = NodeRef::new("loader").unwrap();
        assert_eq!(r.as_str(), "loader");
        assert_eq!(r.to_string(), "loader");
    }

    #[test]
    fn new_rejects_empty() {
        assert_eq!(NodeRef::new("").unwrap_err(), NodeRefError::Empty);
    }

    #[test]
    fn new_rejects_overlong() {
        let long = "x".repeat(MAX_NODE_REF_LEN + 1);
        let err = NodeRef::new(long).unwrap_err();
        assert_eq!(err, NodeRefError::TooLong { len: 129 });
    }

    #[test]
    fn new_accepts_exact_limit() {
        let at_limit = "x".repeat(MAX_NODE_REF_LEN);
        assert!(NodeRef::new(at_limit).is_ok());
    }

    #[test]
    fn serde_roundtrip() {
        let r = NodeRef::new("webhook-1").unwrap();
        let json = serde_json::to_string(&r).unwrap();
        assert_eq!(json, r#""webhook-1""#);
        let back: NodeRef = serde_json::from_str(&json).unwrap();
        assert_eq!(r, back);
    }

    #[test]
    fn serde_rejects_invalid() {
        let long = format!("\"{}\"", "x".repeat(MAX_NODE_REF_LEN + 1));
        assert!(serde_json::from_str::<NodeRef>(&long).is_err());
        assert!(serde_json::from_str::<NodeRef>("\"\"").is_err());
    }

    #[test]
    fn compares_with_str() {
        let r = NodeRef::new("probe").unwrap();
        assert_eq!(r, "probe");
    }

    #[test]
    fn usable_as_map_key_via_borrow() {
        use std::collections::HashMap;
        let mut map = HashMap::new();
        map.insert(NodeRef::new("a").unwrap(), 1);
        assert_eq!(map.get("a"), Some(&1));
    }
}
