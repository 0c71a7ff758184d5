//! Hierarchical graph identities.

use crate::ParseError;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

/// A stable hierarchical path naming an object in the policy graph.
///
/// An identity is an ordered sequence of non-empty path elements,
/// rendered as `/element/element/...`. Identities are opaque to the
/// store but positional to the engine: class-tag elements alternate
/// with instance names, and the engine's session back-walk relies on a
/// fixed marker element appearing in local-endpoint identities.
///
/// The derived `Ord` is element-wise lexicographic, so all descendants
/// of an identity sort as a contiguous range.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct Identity {
    elements: Vec<String>,
}

impl Identity {
    /// Builds an identity from path elements.
    ///
    /// Returns an error if any element is empty.
    pub fn from_elements<I, S>(elements: I) -> Result<Self, ParseError>
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        let elements: Vec<String> = elements.into_iter().map(Into::into).collect();
        for element in &elements {
            if element.is_empty() {
                return Err(ParseError::InvalidIdentityElement(element.clone()));
            }
        }
        Ok(Self { elements })
    }

    /// The root identity (`/`), parent of all top-level objects.
    pub fn root() -> Self {
        Self { elements: Vec::new() }
    }

    /// Returns the path elements.
    pub fn elements(&self) -> &[String] {
        &self.elements
    }

    /// Returns the number of path elements.
    pub fn depth(&self) -> usize {
        self.elements.len()
    }

    /// Returns true if this is the root identity.
    pub fn is_root(&self) -> bool {
        self.elements.is_empty()
    }

    /// Returns the last path element, if any.
    pub fn leaf(&self) -> Option<&str> {
        self.elements.last().map(String::as_str)
    }

    /// Returns a new identity with `element` appended.
    pub fn child(&self, element: impl Into<String>) -> Self {
        let mut elements = self.elements.clone();
        elements.push(element.into());
        Self { elements }
    }

    /// Returns the identity one element shorter, or `None` at the root.
    pub fn parent(&self) -> Option<Self> {
        if self.elements.is_empty() {
            return None;
        }
        Some(Self {
            elements: self.elements[..self.elements.len() - 1].to_vec(),
        })
    }

    /// Returns true if `self` equals `prefix` or lies beneath it.
    pub fn starts_with(&self, prefix: &Identity) -> bool {
        self.elements.len() >= prefix.elements.len()
            && self.elements[..prefix.elements.len()] == prefix.elements[..]
    }
}

impl fmt::Display for Identity {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.elements.is_empty() {
            return write!(f, "/");
        }
        for element in &self.elements {
            write!(f, "/{}", element)?;
        }
        Ok(())
    }
}

impl FromStr for Identity {
    type Err = ParseError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        if !s.starts_with('/') {
            return Err(ParseError::InvalidIdentity(s.to_string()));
        }
        if s == "/" {
            return Ok(Self::root());
        }
        // A trailing slash is tolerated; empty interior elements are not.
        let trimmed = s.strip_suffix('/').unwrap_or(s);
        let elements: Vec<&str> = trimmed[1..].split('/').collect();
        if elements.iter().any(|e| e.is_empty()) {
            return Err(ParseError::InvalidIdentity(s.to_string()));
        }
        Self::from_elements(elements)
    }
}
