// Copyright 2024 UniSphere Overlay Project.
//
// This library is free software: you can redistribute it and/or modify
// it under the terms of the GNU General Public License as published by
// the Free Software Foundation, either version 3 of the License, or
// (at your option) any later version.

//! Component D: the locally-approved peer set (spec §4.D).
//!
//! Locking follows spec §5: one recursive mutex for the identity as a
//! whole (the peer set membership), and a separate recursive mutex per
//! `Peer` for its contact/SA state, so a long-running per-peer operation
//! never blocks unrelated peer lookups.

use super::contact::Contact;
use super::peer::Peer;
use crate::error::Error;
use crate::identity::{NodeId, SigningPublicKey, SigningSecretKey};
use crate::rng::MainRng;
use parking_lot::ReentrantMutex;
use std::cell::RefCell;
use std::collections::HashMap;
use std::sync::Arc;

type PeerHandle = Arc<ReentrantMutex<RefCell<Peer>>>;

struct Inner {
    peers: HashMap<NodeId, PeerHandle>,
}

/// The local node's approved social peer set.
pub struct SocialIdentity {
    local_id: NodeId,
    inner: ReentrantMutex<RefCell<Inner>>,
}

impl SocialIdentity {
    pub fn new(local_id: NodeId) -> Self {
        Self {
            local_id,
            inner: ReentrantMutex::new(RefCell::new(Inner {
                peers: HashMap::new(),
            })),
        }
    }

    pub fn local_id(&self) -> NodeId {
        self.local_id
    }

    pub fn is_peer(&self, id: &NodeId) -> bool {
        let guard = self.inner.lock();
        guard.borrow().peers.contains_key(id)
    }

    pub fn add_peer(&self, contact: Contact) {
        let id = contact.node_id();
        let guard = self.inner.lock();
        guard
            .borrow_mut()
            .peers
            .entry(id)
            .or_insert_with(|| Arc::new(ReentrantMutex::new(RefCell::new(Peer::new(contact.clone())))))
            .lock()
            .borrow_mut()
            .set_contact(contact);
    }

    pub fn remove_peer(&self, id: &NodeId) {
        let guard = self.inner.lock();
        guard.borrow_mut().peers.remove(id);
    }

    pub fn get_peer_contact(&self, id: &NodeId) -> Option<Contact> {
        self.with_peer(id, |p| p.contact().clone())
    }

    pub fn peer_ids(&self) -> Vec<NodeId> {
        let guard = self.inner.lock();
        guard.borrow().peers.keys().copied().collect()
    }

    fn handle(&self, id: &NodeId) -> Option<PeerHandle> {
        let guard = self.inner.lock();
        guard.borrow().peers.get(id).cloned()
    }

    /// Runs `f` against the peer's state under its own per-peer mutex,
    /// without holding the identity-wide mutex.
    pub fn with_peer<R>(&self, id: &NodeId, f: impl FnOnce(&Peer) -> R) -> Option<R> {
        let handle = self.handle(id)?;
        let guard = handle.lock();
        Some(f(&guard.borrow()))
    }

    pub fn with_peer_mut<R>(&self, id: &NodeId, f: impl FnOnce(&mut Peer) -> R) -> Option<R> {
        let handle = self.handle(id)?;
        let guard = handle.lock();
        Some(f(&mut guard.borrow_mut()))
    }

    pub fn add_peer_sa(&self, id: &NodeId, key: SigningPublicKey) -> Option<()> {
        self.with_peer_mut(id, |p| p.add_peer_sa(key))
    }

    pub fn remove_peer_sa(&self, id: &NodeId, key: &SigningPublicKey) -> Result<(), Error> {
        self.with_peer_mut(id, |p| p.remove_peer_sa(key))
            .unwrap_or(Err(Error::InvalidSa))
    }

    pub fn has_peer_sa(&self, id: &NodeId, key: &SigningPublicKey) -> bool {
        self.with_peer(id, |p| p.has_peer_sa(key)).unwrap_or(false)
    }

    pub fn select_peer_sa(&self, id: &NodeId, rng: &mut MainRng) -> Option<SigningPublicKey> {
        self.with_peer(id, |p| p.select_peer_sa(rng)).flatten()
    }

    pub fn create_private_sa(&self, id: &NodeId, rng: &mut MainRng) -> Option<SigningSecretKey> {
        self.with_peer_mut(id, |p| p.create_private_sa(rng))
    }

    pub fn get_private_sa(&self, id: &NodeId, public_key: &SigningPublicKey) -> Option<SigningSecretKey> {
        self.with_peer(id, |p| p.get_private_sa(public_key)).flatten()
    }

    pub fn list_private_sas(&self, id: &NodeId) -> Vec<SigningPublicKey> {
        self.with_peer(id, |p| p.list_private_sas()).unwrap_or_default()
    }

    pub fn remove_private_sa(&self, id: &NodeId, public_key: &SigningPublicKey) {
        self.with_peer_mut(id, |p| p.remove_private_sa(public_key));
    }

    /// Whether `key` is currently held as a peer SA on *any* link — used
    /// by the announce verifier's routing-loop check (spec §4.H step 2).
    pub fn any_peer_has_peer_sa(&self, key: &SigningPublicKey) -> bool {
        let handles: Vec<_> = {
            let guard = self.inner.lock();
            guard.borrow().peers.values().cloned().collect()
        };
        handles.into_iter().any(|h| {
            let guard = h.lock();
            guard.borrow().has_peer_sa(key)
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::identity::PeerPrivateKey;
    use crate::rng::new_seeded;

    fn contact(seed: u64) -> Contact {
        let mut rng = new_seeded(seed);
        let key = PeerPrivateKey::generate(&mut rng).public_key();
        Contact::new(key, vec![])
    }

    #[test]
    fn add_and_query_peer() {
        let identity = SocialIdentity::new(NodeId::default());
        let c = contact(1);
        let id = c.node_id();
        identity.add_peer(c);
        assert!(identity.is_peer(&id));
        assert!(identity.get_peer_contact(&id).is_some());
    }

    #[test]
    fn remove_peer_drops_its_state() {
        let identity = SocialIdentity::new(NodeId::default());
        let c = contact(2);
        let id = c.node_id();
        identity.add_peer(c);
        identity.remove_peer(&id);
        assert!(!identity.is_peer(&id));
    }

    #[test]
    fn any_peer_has_peer_sa_scans_all_links() {
        let identity = SocialIdentity::new(NodeId::default());
        let c1 = contact(3);
        let c2 = contact(4);
        let id1 = c1.node_id();
        identity.add_peer(c1);
        identity.add_peer(c2);
        let mut rng = new_seeded(9);
        let sa = SigningSecretKey::generate(&mut rng).public_key();
        identity.add_peer_sa(&id1, sa);
        assert!(identity.any_peer_has_peer_sa(&sa));
    }

    #[test]
    fn remove_unknown_peer_sa_on_unknown_peer_is_invalid_sa() {
        let identity = SocialIdentity::new(NodeId::default());
        let mut rng = new_seeded(10);
        let sa = SigningSecretKey::generate(&mut rng).public_key();
        assert!(matches!(
            identity.remove_peer_sa(&NodeId::default(), &sa),
            Err(Error::InvalidSa)
        ));
    }
}
