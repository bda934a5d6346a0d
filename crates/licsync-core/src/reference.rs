//! Host reference parsing
//!
//! A server record points at its host through an opaque identifier. Two
//! layouts are accepted:
//!
//! ```text
//! /subscriptions/<sub>/resourceGroups/<rg>/providers/<namespace>/<type>/<name>
//! <rg>/<name>
//! ```
//!
//! Anything else fails with [`ReferenceError::Malformed`] instead of
//! guessing at segments.

use crate::error::ReferenceError;
use std::fmt;
use std::str::FromStr;

/// Typed pointer to a host registration
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct HostReference {
    /// Subscription named in the identifier, if any
    pub subscription: Option<String>,
    /// Host resource group
    pub resource_group: String,
    /// Host name
    pub name: String,
}

impl HostReference {
    /// Create reference in the session's subscription
    #[inline]
    #[must_use]
    pub fn new(resource_group: impl Into<String>, name: impl Into<String>) -> Self {
        Self {
            subscription: None,
            resource_group: resource_group.into(),
            name: name.into(),
        }
    }

    /// Parse a container reference
    ///
    /// # Errors
    /// - [`ReferenceError::Empty`] for blank input
    /// - [`ReferenceError::Malformed`] when the segment layout is not recognized
    pub fn parse(reference: &str) -> Result<Self, ReferenceError> {
        let trimmed = reference.trim();
        if trimmed.is_empty() {
            return Err(ReferenceError::Empty);
        }

        let segments: Vec<&str> = trimmed.split('/').filter(|s| !s.is_empty()).collect();
        let malformed = |reason| ReferenceError::Malformed {
            reference: trimmed.to_string(),
            reason,
        };

        if segments.len() == 2 && !trimmed.starts_with('/') {
            return Ok(Self::new(segments[0], segments[1]));
        }

        let rg_index = segments
            .iter()
            .position(|s| s.eq_ignore_ascii_case("resourceGroups"))
            .ok_or_else(|| malformed("no resourceGroups segment"))?;

        // resourceGroups/<rg>/providers/<namespace>/<type>/<name>
        if segments.len() != rg_index + 6 {
            return Err(malformed("expected exactly one provider type and name after the resource group"));
        }
        if !segments[rg_index + 2].eq_ignore_ascii_case("providers") {
            return Err(malformed("no providers segment after the resource group"));
        }

        let subscription = match rg_index {
            0 => None,
            2 if segments[0].eq_ignore_ascii_case("subscriptions") => {
                Some(segments[1].to_string())
            }
            _ => return Err(malformed("unexpected segments before resourceGroups")),
        };

        Ok(Self {
            subscription,
            resource_group: segments[rg_index + 1].to_string(),
            name: segments[rg_index + 5].to_string(),
        })
    }
}

impl FromStr for HostReference {
    type Err = ReferenceError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::parse(s)
    }
}

impl fmt::Display for HostReference {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}/{}", self.resource_group, self.name)
    }
}
