// Copyright 2024 UniSphere Overlay Project.
//
// This library is free software: you can redistribute it and/or modify
// it under the terms of the GNU General Public License as published by
// the Free Software Foundation, either version 3 of the License, or
// (at your option) any later version.

//! Signing and boxing keypairs, and the peer key / node-identity derivation
//! built on top of them (spec §3, §4.A).

use super::node_id::{NodeId, NODE_ID_LEN};
use ed25519_dalek::{Signer, SigningKey, Verifier, VerifyingKey};
use rand::{CryptoRng, RngCore};
use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha512};
use std::cmp::Ordering;
use std::fmt;
use thiserror::Error;

/// Error returned by [`SigningPublicKey::sign_open`].
#[derive(Debug, Error, Clone, Eq, PartialEq)]
#[error("signature verification failed")]
pub struct InvalidSignature;

/// Wrapper around `ed25519_dalek::VerifyingKey` adding the `Hash`/`Ord`
/// impls the routing table's multi-index needs (the original source ties
/// sign-subkey identity directly into `std::map` ordering; see
/// `original_source/src/identity/sign_key.h`).
#[derive(Clone, Copy, Serialize, Deserialize)]
pub struct SigningPublicKey(VerifyingKey);

impl SigningPublicKey {
    /// Verifies a detached signature produced by [`SigningSecretKey::sign`].
    pub fn verify(&self, message: &[u8], signature: &Signature) -> Result<(), InvalidSignature> {
        self.0.verify(message, &signature.0).map_err(|_| InvalidSignature)
    }

    /// Raw 32-byte encoding, used as the SA "public key" bytes exchanged on
    /// the wire (`SA_Create`/`SA_Invalid`) and as delegation-chain entries.
    pub fn to_bytes(&self) -> [u8; 32] {
        self.0.to_bytes()
    }

    pub fn from_bytes(bytes: &[u8; 32]) -> Result<Self, InvalidSignature> {
        VerifyingKey::from_bytes(bytes)
            .map(Self)
            .map_err(|_| InvalidSignature)
    }
}

impl PartialEq for SigningPublicKey {
    fn eq(&self, other: &Self) -> bool {
        self.0.as_bytes() == other.0.as_bytes()
    }
}
impl Eq for SigningPublicKey {}

impl std::hash::Hash for SigningPublicKey {
    fn hash<H: std::hash::Hasher>(&self, state: &mut H) {
        self.0.as_bytes().hash(state)
    }
}

impl Ord for SigningPublicKey {
    fn cmp(&self, other: &Self) -> Ordering {
        self.0.as_bytes().cmp(other.0.as_bytes())
    }
}
impl PartialOrd for SigningPublicKey {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

impl fmt::Debug for SigningPublicKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "SigningPublicKey({})", hex_fmt::HexFmt(self.0.as_bytes()))
    }
}

/// Detached Ed25519 signature, wrapped for `Hash`/`Ord`/serde.
#[derive(Clone, Copy, Serialize, Deserialize)]
pub struct Signature(ed25519_dalek::Signature);

impl PartialEq for Signature {
    fn eq(&self, other: &Self) -> bool {
        self.0.to_bytes() == other.0.to_bytes()
    }
}
impl Eq for Signature {}

impl fmt::Debug for Signature {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "Signature({})", hex_fmt::HexFmt(self.0.to_bytes()))
    }
}

/// A signing secret key, scoped to one directed link when used as a
/// security association, or to the whole node identity when it is the root
/// keypair.
pub struct SigningSecretKey(SigningKey);

impl SigningSecretKey {
    /// Generates a fresh keypair from the given CSPRNG.
    pub fn generate<R: RngCore + CryptoRng>(rng: &mut R) -> Self {
        Self(SigningKey::generate(rng))
    }

    pub fn public_key(&self) -> SigningPublicKey {
        SigningPublicKey(self.0.verifying_key())
    }

    /// Signs a message, producing a detached signature.
    pub fn sign(&self, message: &[u8]) -> Signature {
        Signature(self.0.sign(message))
    }
}

impl Clone for SigningSecretKey {
    fn clone(&self) -> Self {
        Self(SigningKey::from_bytes(&self.0.to_bytes()))
    }
}

/// `sign_open`: verifies a detached signature against a known public key and
/// returns the message bytes back, matching the `PathDelegation` chain-walk
/// contract of spec §4.H ("knownKey.sign_open(d_i)").
pub fn sign_open<'a>(
    key: &SigningPublicKey,
    signed_payload: &'a [u8],
    signature: &Signature,
) -> Result<&'a [u8], InvalidSignature> {
    key.verify(signed_payload, signature)?;
    Ok(signed_payload)
}

/// Placeholder asymmetric keypair reserved for future transport-payload
/// confidentiality. The routing core never encrypts or decrypts with these
/// keys itself (spec §4.A, Non-goals: "does not provide confidentiality of
/// payloads") — they are carried only so a `PeerKey` round-trips the shape
/// the original `PeerPublicKey`/`PeerPrivateKey` product type had
/// (`original_source/src/identity/peer_key.h`).
#[derive(Clone, Copy, Eq, PartialEq, Hash, Serialize, Deserialize)]
pub struct BoxPublicKey([u8; 32]);

impl fmt::Debug for BoxPublicKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "BoxPublicKey({})", hex_fmt::HexFmt(self.0))
    }
}

#[derive(Clone)]
pub struct BoxSecretKey([u8; 32]);

impl BoxSecretKey {
    pub fn generate<R: RngCore + CryptoRng>(rng: &mut R) -> Self {
        let mut bytes = [0u8; 32];
        rng.fill_bytes(&mut bytes);
        Self(bytes)
    }

    pub fn public_key(&self) -> BoxPublicKey {
        // Out of scope for the routing core: the public half is derived by
        // the transport/crypto layer that actually performs key exchange.
        // The core only needs a stable, comparable placeholder.
        let mut digest = Sha512::new();
        digest.update(b"unisphere-box-public");
        digest.update(self.0);
        let hash = digest.finalize();
        let mut out = [0u8; 32];
        out.copy_from_slice(&hash[..32]);
        BoxPublicKey(out)
    }
}

/// `(public_sign_subkey, public_box_subkey)` concatenation (spec §3).
#[derive(Clone, Copy, Eq, PartialEq, Hash, Serialize, Deserialize, Debug)]
pub struct PeerPublicKey {
    pub sign_subkey: SigningPublicKeyBytes,
    pub box_subkey: BoxPublicKey,
}

/// `SigningPublicKey` does not impl `Eq`/`Hash` via its `VerifyingKey`
/// directly in a way serde likes for embedding in other derives without
/// friction, so `PeerPublicKey` stores the raw bytes and reconstructs
/// a `SigningPublicKey` on demand via [`PeerPublicKey::signing_key`].
pub type SigningPublicKeyBytes = [u8; 32];

impl PeerPublicKey {
    pub fn new(sign_subkey: SigningPublicKey, box_subkey: BoxPublicKey) -> Self {
        Self {
            sign_subkey: sign_subkey.to_bytes(),
            box_subkey,
        }
    }

    pub fn signing_key(&self) -> SigningPublicKey {
        SigningPublicKey::from_bytes(&self.sign_subkey).expect("roundtrip of validated key")
    }

    /// `node_id(key) = first_160_bits(SHA-512(public_key_raw))` (spec §3).
    pub fn node_id(&self) -> NodeId {
        let mut digest = Sha512::new();
        digest.update(self.sign_subkey);
        digest.update(self.box_subkey.0);
        let hash = digest.finalize();
        let mut bytes = [0u8; NODE_ID_LEN];
        bytes.copy_from_slice(&hash[..NODE_ID_LEN]);
        NodeId(bytes)
    }
}

/// Private half of a [`PeerPublicKey`]: the local node's full identity.
pub struct PeerPrivateKey {
    pub signing: SigningSecretKey,
    pub boxing: BoxSecretKey,
}

impl PeerPrivateKey {
    pub fn generate<R: RngCore + CryptoRng>(rng: &mut R) -> Self {
        Self {
            signing: SigningSecretKey::generate(rng),
            boxing: BoxSecretKey::generate(rng),
        }
    }

    pub fn public_key(&self) -> PeerPublicKey {
        PeerPublicKey::new(self.signing.public_key(), self.boxing.public_key())
    }

    pub fn sign(&self, message: &[u8]) -> Signature {
        self.signing.sign(message)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rand::SeedableRng;
    use rand_chacha::ChaChaRng;

    #[test]
    fn sign_and_verify_round_trip() {
        let mut rng = ChaChaRng::seed_from_u64(1);
        let key = SigningSecretKey::generate(&mut rng);
        let msg = b"hello overlay";
        let sig = key.sign(msg);
        assert!(key.public_key().verify(msg, &sig).is_ok());
    }

    #[test]
    fn tampered_message_fails_verification() {
        let mut rng = ChaChaRng::seed_from_u64(2);
        let key = SigningSecretKey::generate(&mut rng);
        let sig = key.sign(b"hello");
        assert!(key.public_key().verify(b"goodbye", &sig).is_err());
    }

    #[test]
    fn node_id_is_deterministic_function_of_public_key() {
        let mut rng = ChaChaRng::seed_from_u64(3);
        let priv_key = PeerPrivateKey::generate(&mut rng);
        let pub_key = priv_key.public_key();
        assert_eq!(pub_key.node_id(), pub_key.node_id());
    }

    #[test]
    fn different_keys_give_different_ids() {
        let mut rng = ChaChaRng::seed_from_u64(4);
        let a = PeerPrivateKey::generate(&mut rng).public_key().node_id();
        let b = PeerPrivateKey::generate(&mut rng).public_key().node_id();
        assert_ne!(a, b);
    }
}
