// Copyright 2024 UniSphere Overlay Project.
//
// This library is free software: you can redistribute it and/or modify
// it under the terms of the GNU General Public License as published by
// the Free Software Foundation, either version 3 of the License, or
// (at your option) any later version.

//! A single approved peer and its security-association lifecycle
//! (spec §3, §4.D), grounded on the SA cap/FIFO-eviction rules and the
//! "remove unknown SA fails" contract.

use super::contact::Contact;
use crate::error::Error;
use crate::identity::{SigningPublicKey, SigningSecretKey};
use crate::rng::MainRng;
use rand::Rng;
use std::collections::VecDeque;

/// Public keys the peer has announced to us; one verifies each incoming
/// announcement from that neighbor.
const MAX_PEER_SAS: usize = 10;
/// Keypairs we generated for outgoing announcements on this link.
const MAX_PRIVATE_SAS: usize = 13;

/// One approved social peer: its contact information plus the peer-SA and
/// private-SA sets scoped to the link with it.
pub struct Peer {
    contact: Contact,
    peer_sas: VecDeque<SigningPublicKey>,
    private_sas: VecDeque<(SigningPublicKey, SigningSecretKey)>,
}

impl Peer {
    pub fn new(contact: Contact) -> Self {
        Self {
            contact,
            peer_sas: VecDeque::new(),
            private_sas: VecDeque::new(),
        }
    }

    pub fn contact(&self) -> &Contact {
        &self.contact
    }

    pub fn set_contact(&mut self, contact: Contact) {
        self.contact = contact;
    }

    /// Records a public key the peer announced to us. Past the cap, the
    /// oldest peer SA is silently evicted (spec §4.D failure semantics).
    pub fn add_peer_sa(&mut self, key: SigningPublicKey) {
        if self.peer_sas.contains(&key) {
            return;
        }
        if self.peer_sas.len() >= MAX_PEER_SAS {
            self.peer_sas.pop_front();
        }
        self.peer_sas.push_back(key);
    }

    /// Removes a peer SA by public key: the "invalid SA" signal from the
    /// peer. Fails if the key is unknown.
    pub fn remove_peer_sa(&mut self, key: &SigningPublicKey) -> Result<(), Error> {
        let before = self.peer_sas.len();
        self.peer_sas.retain(|k| k != key);
        if self.peer_sas.len() == before {
            return Err(Error::InvalidSa);
        }
        Ok(())
    }

    pub fn has_peer_sa(&self, key: &SigningPublicKey) -> bool {
        self.peer_sas.contains(key)
    }

    /// Uniformly selects one of the peer's currently-held SAs.
    pub fn select_peer_sa(&self, rng: &mut MainRng) -> Option<SigningPublicKey> {
        if self.peer_sas.is_empty() {
            return None;
        }
        let idx = rng.gen_range(0..self.peer_sas.len());
        self.peer_sas.get(idx).copied()
    }

    pub fn peer_sa_count(&self) -> usize {
        self.peer_sas.len()
    }

    /// Generates a fresh private SA for signing outgoing announcements on
    /// this link. Past the cap, the oldest private SA is evicted.
    pub fn create_private_sa(&mut self, rng: &mut MainRng) -> SigningSecretKey {
        let secret = SigningSecretKey::generate(rng);
        let public = secret.public_key();
        if self.private_sas.len() >= MAX_PRIVATE_SAS {
            self.private_sas.pop_front();
        }
        self.private_sas.push_back((public, secret.clone()));
        secret
    }

    pub fn get_private_sa(&self, public_key: &SigningPublicKey) -> Option<SigningSecretKey> {
        self.private_sas
            .iter()
            .find(|(pk, _)| pk == public_key)
            .map(|(_, sk)| sk.clone())
    }

    pub fn list_private_sas(&self) -> Vec<SigningPublicKey> {
        self.private_sas.iter().map(|(pk, _)| *pk).collect()
    }

    pub fn has_private_sa(&self) -> bool {
        !self.private_sas.is_empty()
    }

    /// Removes a private SA (e.g. in response to a peer's `SA_Invalid`).
    pub fn remove_private_sa(&mut self, public_key: &SigningPublicKey) {
        self.private_sas.retain(|(pk, _)| pk != public_key);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::identity::PeerPrivateKey;
    use crate::rng::new_seeded;
    use crate::social::contact::Contact;

    fn peer() -> Peer {
        let mut rng = new_seeded(1);
        let key = PeerPrivateKey::generate(&mut rng).public_key();
        Peer::new(Contact::new(key, vec![]))
    }

    #[test]
    fn peer_sa_cap_evicts_oldest() {
        let mut p = peer();
        let mut rng = new_seeded(2);
        let mut keys = Vec::new();
        for _ in 0..MAX_PEER_SAS + 2 {
            let k = SigningSecretKey::generate(&mut rng).public_key();
            keys.push(k);
            p.add_peer_sa(k);
        }
        assert_eq!(p.peer_sa_count(), MAX_PEER_SAS);
        assert!(!p.has_peer_sa(&keys[0]));
        assert!(p.has_peer_sa(&keys[keys.len() - 1]));
    }

    #[test]
    fn remove_unknown_peer_sa_is_invalid_sa() {
        let mut p = peer();
        let mut rng = new_seeded(3);
        let unknown = SigningSecretKey::generate(&mut rng).public_key();
        assert!(matches!(p.remove_peer_sa(&unknown), Err(Error::InvalidSa)));
    }

    #[test]
    fn private_sa_cap_evicts_oldest() {
        let mut p = peer();
        let mut rng = new_seeded(4);
        let mut publics = Vec::new();
        for _ in 0..MAX_PRIVATE_SAS + 3 {
            let sk = p.create_private_sa(&mut rng);
            publics.push(sk.public_key());
        }
        assert_eq!(p.list_private_sas().len(), MAX_PRIVATE_SAS);
        assert!(p.get_private_sa(&publics[0]).is_none());
        assert!(p.get_private_sa(&publics[publics.len() - 1]).is_some());
    }

    #[test]
    fn select_peer_sa_none_when_empty() {
        let p = peer();
        let mut rng = new_seeded(5);
        assert!(p.select_peer_sa(&mut rng).is_none());
    }
}
