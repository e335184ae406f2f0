// ABOUTME: Allow-list policy deciding which peers may befriend and command the bot
// ABOUTME: Pure set membership over bare peer identities

use crate::peer::PeerId;
use std::collections::HashSet;

/// Immutable set of bare peer identities allowed to interact with the bot.
#[derive(Debug, Clone, Default)]
pub struct AllowList {
    peers: HashSet<String>,
}

impl AllowList {
    /// Build from configured identifiers. Entries are normalized to their bare
    /// form and blank entries are dropped.
    pub fn new<I, S>(peers: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        let peers = peers
            .into_iter()
            .map(|p| PeerId::new(p.as_ref().trim()).bare_str().to_string())
            .filter(|p| !p.is_empty())
            .collect();
        Self { peers }
    }

    /// Whether `peer` may interact with the bot. Always checks the bare form.
    pub fn is_allowed(&self, peer: &PeerId) -> bool {
        self.peers.contains(peer.bare_str())
    }

    pub fn len(&self) -> usize {
        self.peers.len()
    }

    pub fn is_empty(&self) -> bool {
        self.peers.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn policy() -> AllowList {
        AllowList::new(["alice@example.com", "bob@example.com"])
    }

    #[test]
    fn test_allows_listed_bare_peer() {
        assert!(policy().is_allowed(&PeerId::from("alice@example.com")));
    }

    #[test]
    fn test_resource_suffix_does_not_matter() {
        let policy = policy();
        for peer in [
            "alice@example.com",
            "alice@example.com/phone",
            "alice@example.com/desk/top",
            "mallory@example.com",
            "mallory@example.com/alice@example.com",
        ] {
            let peer = PeerId::from(peer);
            assert_eq!(policy.is_allowed(&peer), policy.is_allowed(&peer.bare()));
        }
    }

    #[test]
    fn test_rejects_unlisted_peer() {
        assert!(!policy().is_allowed(&PeerId::from("mallory@example.com/boti")));
    }

    #[test]
    fn test_configured_entries_are_normalized() {
        let policy = AllowList::new([" carol@example.com/laptop ", "", "  "]);
        assert_eq!(policy.len(), 1);
        assert!(policy.is_allowed(&PeerId::from("carol@example.com/phone")));
    }

    #[test]
    fn test_empty_policy_allows_nobody() {
        let policy = AllowList::default();
        assert!(policy.is_empty());
        assert!(!policy.is_allowed(&PeerId::from("alice@example.com")));
    }

    #[test]
    fn test_match_is_exact() {
        assert!(!policy().is_allowed(&PeerId::from("Alice@example.com")));
        assert!(!policy().is_allowed(&PeerId::from("alice@example.co")));
    }
}
