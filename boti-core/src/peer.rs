// ABOUTME: Peer identity type for remote chat participants
// ABOUTME: Handles the optional /resource suffix and the bare identity used for replies

use serde::{Deserialize, Serialize};
use std::fmt;

/// Identifier of a remote chat participant, e.g. `user@domain/resource`.
///
/// The *bare* form (`user@domain`) is the identity used for allow-listing
/// and as the reply target.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct PeerId(String);

impl PeerId {
    pub fn new(id: impl Into<String>) -> Self {
        Self(id.into())
    }

    /// The full identifier as received
    pub fn as_str(&self) -> &str {
        &self.0
    }

    /// The identifier with any `/resource` suffix removed
    pub fn bare_str(&self) -> &str {
        match self.0.split_once('/') {
            Some((bare, _)) => bare,
            None => &self.0,
        }
    }

    /// Owned bare form of this peer
    pub fn bare(&self) -> PeerId {
        PeerId(self.bare_str().to_string())
    }

    /// Resource suffix, if present
    pub fn resource(&self) -> Option<&str> {
        self.0.split_once('/').map(|(_, resource)| resource)
    }

    pub fn is_bare(&self) -> bool {
        self.resource().is_none()
    }
}

impl fmt::Display for PeerId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl From<&str> for PeerId {
    fn from(value: &str) -> Self {
        Self::new(value)
    }
}

impl From<String> for PeerId {
    fn from(value: String) -> Self {
        Self(value)
    }
}

impl AsRef<str> for PeerId {
    fn as_ref(&self) -> &str {
        &self.0
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_bare_strips_resource() {
        let peer = PeerId::from("alice@example.com/phone");
        assert_eq!(peer.bare_str(), "alice@example.com");
        assert_eq!(peer.resource(), Some("phone"));
        assert!(!peer.is_bare());
    }

    #[test]
    fn test_bare_without_resource_is_identity() {
        let peer = PeerId::from("alice@example.com");
        assert_eq!(peer.bare(), peer);
        assert_eq!(peer.resource(), None);
        assert!(peer.is_bare());
    }

    #[test]
    fn test_resource_may_contain_slashes() {
        // Only the first slash separates the resource
        let peer = PeerId::from("bob@example.com/desk/top");
        assert_eq!(peer.bare_str(), "bob@example.com");
        assert_eq!(peer.resource(), Some("desk/top"));
    }

    #[test]
    fn test_display_keeps_full_form() {
        let peer = PeerId::from("bob@example.com/boti");
        assert_eq!(peer.to_string(), "bob@example.com/boti");
    }
}
