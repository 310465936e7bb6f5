// Copyright 2024 UniSphere Overlay Project.
//
// This library is free software: you can redistribute it and/or modify
// it under the terms of the GNU General Public License as published by
// the Free Software Foundation, either version 3 of the License, or
// (at your option) any later version.

//! A peer's contact information (spec §3: `Contact = (peer_key,
//! multiset<(priority, address)>)`).

use crate::identity::{NodeId, PeerPublicKey};
use serde::{Deserialize, Serialize};
use std::net::SocketAddr;

/// A reachable address for a contact: either a transport-level IP
/// endpoint or a local-socket path (the original source's `Address`
/// variant type; design note §9.2 flags its `operator<` as non-total —
/// here the ordering is made total explicitly by tagging IP before Local).
#[derive(Debug, Clone, Eq, PartialEq, Serialize, Deserialize)]
pub enum ContactAddress {
    Ip(SocketAddr),
    Local(String),
}

impl PartialOrd for ContactAddress {
    fn partial_cmp(&self, other: &Self) -> Option<std::cmp::Ordering> {
        Some(self.cmp(other))
    }
}

impl Ord for ContactAddress {
    fn cmp(&self, other: &Self) -> std::cmp::Ordering {
        use std::cmp::Ordering::*;
        match (self, other) {
            (ContactAddress::Ip(a), ContactAddress::Ip(b)) => a.cmp(b),
            (ContactAddress::Local(a), ContactAddress::Local(b)) => a.cmp(b),
            (ContactAddress::Ip(_), ContactAddress::Local(_)) => Less,
            (ContactAddress::Local(_), ContactAddress::Ip(_)) => Greater,
        }
    }
}

/// A peer's identity key plus its prioritized address list. Two contacts
/// compare equal iff their derived node ID is equal, regardless of the
/// addresses currently on file.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Contact {
    peer_key: PeerPublicKey,
    addresses: Vec<(i32, ContactAddress)>,
}

impl Contact {
    pub fn new(peer_key: PeerPublicKey, addresses: Vec<(i32, ContactAddress)>) -> Self {
        let mut addresses = addresses;
        addresses.sort_by(|a, b| a.0.cmp(&b.0).then_with(|| a.1.cmp(&b.1)));
        Self { peer_key, addresses }
    }

    pub fn peer_key(&self) -> &PeerPublicKey {
        &self.peer_key
    }

    pub fn node_id(&self) -> NodeId {
        self.peer_key.node_id()
    }

    pub fn addresses(&self) -> &[(i32, ContactAddress)] {
        &self.addresses
    }

    /// Adds an address to the multiset, keeping it sorted by priority.
    pub fn add_address(&mut self, priority: i32, address: ContactAddress) {
        let entry = (priority, address);
        let pos = self
            .addresses
            .binary_search_by(|a| a.0.cmp(&entry.0).then_with(|| a.1.cmp(&entry.1)))
            .unwrap_or_else(|e| e);
        self.addresses.insert(pos, entry);
    }
}

impl PartialEq for Contact {
    fn eq(&self, other: &Self) -> bool {
        self.node_id() == other.node_id()
    }
}
impl Eq for Contact {}

#[cfg(test)]
mod tests {
    use super::*;
    use rand::SeedableRng;
    use rand_chacha::ChaChaRng;

    fn key(seed: u64) -> PeerPublicKey {
        let mut rng = ChaChaRng::seed_from_u64(seed);
        crate::identity::PeerPrivateKey::generate(&mut rng).public_key()
    }

    #[test]
    fn equality_ignores_addresses() {
        let k = key(1);
        let a = Contact::new(k, vec![(0, ContactAddress::Local("/tmp/a".into()))]);
        let b = Contact::new(k, vec![(5, ContactAddress::Local("/tmp/b".into()))]);
        assert_eq!(a, b);
    }

    #[test]
    fn different_keys_are_not_equal() {
        let a = Contact::new(key(1), vec![]);
        let b = Contact::new(key(2), vec![]);
        assert_ne!(a, b);
    }

    #[test]
    fn addresses_stay_priority_sorted() {
        let mut c = Contact::new(key(3), vec![]);
        c.add_address(5, ContactAddress::Local("b".into()));
        c.add_address(1, ContactAddress::Local("a".into()));
        let priorities: Vec<_> = c.addresses().iter().map(|(p, _)| *p).collect();
        assert_eq!(priorities, vec![1, 5]);
    }
}
