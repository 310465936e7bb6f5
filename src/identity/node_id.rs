// Copyright 2024 UniSphere Overlay Project.
//
// This library is free software: you can redistribute it and/or modify
// it under the terms of the GNU General Public License as published by
// the Free Software Foundation, either version 3 of the License, or
// (at your option) any later version.

//! 160-bit node identifiers: XOR metric, longest-common-prefix, prefix
//! extraction and the big-integer arithmetic used by the sloppy-group
//! consistent-hashing ring.

use num_bigint::BigUint;
use serde::{Deserialize, Serialize};
use std::fmt;
use thiserror::Error;

/// Length of a [`NodeId`] in bytes (160 bits).
pub const NODE_ID_LEN: usize = 20;
/// Length of a [`NodeId`] in bits.
pub const NODE_ID_BITS: usize = NODE_ID_LEN * 8;

/// A 160-bit overlay node identifier.
///
/// The all-zero value is a perfectly ordinary identifier (not a sentinel);
/// only parsing from malformed input fails.
#[derive(Clone, Copy, Eq, PartialEq, Ord, PartialOrd, Hash, Serialize, Deserialize, Default)]
pub struct NodeId(pub [u8; NODE_ID_LEN]);

/// Errors raised when parsing an identifier from an external representation.
#[derive(Debug, Error, Clone, Eq, PartialEq)]
pub enum IdParseError {
    #[error("expected {NODE_ID_LEN} raw bytes, got {0}")]
    WrongLength(usize),
    #[error("invalid hex encoding")]
    InvalidHex,
    #[error("invalid base64 encoding")]
    InvalidBase64,
}

impl NodeId {
    /// Constructs an identifier from a raw 20-byte buffer.
    pub fn from_bytes(bytes: &[u8]) -> Result<Self, IdParseError> {
        if bytes.len() != NODE_ID_LEN {
            return Err(IdParseError::WrongLength(bytes.len()));
        }
        let mut buf = [0u8; NODE_ID_LEN];
        buf.copy_from_slice(bytes);
        Ok(Self(buf))
    }

    /// Constructs an identifier from a hex string (40 hex digits).
    pub fn from_hex(s: &str) -> Result<Self, IdParseError> {
        if s.len() != NODE_ID_LEN * 2 {
            return Err(IdParseError::InvalidHex);
        }
        let mut buf = [0u8; NODE_ID_LEN];
        for (i, chunk) in s.as_bytes().chunks(2).enumerate() {
            let hi = hex_val(chunk[0]).ok_or(IdParseError::InvalidHex)?;
            let lo = hex_val(chunk[1]).ok_or(IdParseError::InvalidHex)?;
            buf[i] = (hi << 4) | lo;
        }
        Ok(Self(buf))
    }

    /// Constructs an identifier from standard base64.
    pub fn from_base64(s: &str) -> Result<Self, IdParseError> {
        let bytes = base64_decode(s).ok_or(IdParseError::InvalidBase64)?;
        Self::from_bytes(&bytes)
    }

    /// Hex representation.
    pub fn to_hex(&self) -> String {
        self.0.iter().map(|b| format!("{:02x}", b)).collect()
    }

    /// Raw bytes.
    pub fn as_bytes(&self) -> &[u8; NODE_ID_LEN] {
        &self.0
    }

    /// XOR metric between two identifiers (used by the routing table).
    pub fn xor(&self, other: &Self) -> Self {
        let mut out = [0u8; NODE_ID_LEN];
        for i in 0..NODE_ID_LEN {
            out[i] = self.0[i] ^ other.0[i];
        }
        Self(out)
    }

    /// Length, in bits, of the longest common prefix between two identifiers.
    pub fn longest_common_prefix(&self, other: &Self) -> usize {
        let mut lcp = 0;
        for i in 0..NODE_ID_LEN {
            let xored = self.0[i] ^ other.0[i];
            if xored == 0 {
                lcp += 8;
                continue;
            }
            lcp += xored.leading_zeros() as usize;
            break;
        }
        lcp
    }

    /// Returns a prefix of `bits` bits of this identifier, with the
    /// remaining bits set from `fill` (e.g. `0xFF` for an inclusive upper
    /// range bound, `0x00` for a lower one).
    pub fn prefix(&self, bits: usize, fill: u8) -> Self {
        assert!(bits <= NODE_ID_BITS, "prefix length exceeds identifier width");
        let mut out = [fill; NODE_ID_LEN];
        let full_bytes = bits / 8;
        out[..full_bytes].copy_from_slice(&self.0[..full_bytes]);

        let rem = bits % 8;
        if rem != 0 {
            let mask: u8 = !0u8 << (8 - rem);
            out[full_bytes] = (self.0[full_bytes] & mask) | (fill & !mask);
        }
        Self(out)
    }

    /// Returns a [`xor_name::Prefix`]-like matches check: whether `self`
    /// shares `bits` leading bits with `other`.
    pub fn matches_prefix(&self, other: &Self, bits: usize) -> bool {
        self.longest_common_prefix(other) >= bits
    }

    fn to_biguint(self) -> BigUint {
        BigUint::from_bytes_be(&self.0)
    }

    fn from_biguint(mut value: BigUint) -> Self {
        let modulus = BigUint::from(1u8) << NODE_ID_BITS;
        value %= &modulus;
        let bytes = value.to_bytes_be();
        let mut out = [0u8; NODE_ID_LEN];
        let start = NODE_ID_LEN - bytes.len();
        out[start..].copy_from_slice(&bytes);
        Self(out)
    }

    /// Arithmetic increment modulo 2^160 (GMP-style big-integer addition),
    /// used to walk the consistent-hashing ring.
    pub fn add_scalar(&self, x: f64) -> Self {
        let delta = if x < 0.0 {
            // wrap backwards: add (2^160 - round(-x))
            let magnitude = BigUint::from((-x).round() as u128);
            let modulus = BigUint::from(1u8) << NODE_ID_BITS;
            (&modulus - (magnitude % &modulus)) % &modulus
        } else {
            BigUint::from(x.round() as u128)
        };
        Self::from_biguint(self.to_biguint() + delta)
    }

    /// Arithmetic (not XOR) absolute distance between two identifiers, used
    /// by the sloppy-group consistent-hashing ring.
    pub fn distance(&self, other: &Self) -> Self {
        let a = self.to_biguint();
        let b = other.to_biguint();
        let diff = if a > b { a - b } else { b - a };
        Self::from_biguint(diff)
    }

    /// Same as [`NodeId::distance`] but returned as an (inexact) `f64` for
    /// fast consistent-hashing placement comparisons.
    pub fn distance_as_double(&self, other: &Self) -> f64 {
        // BigUint has no direct `to_f64`; approximate via the leading bytes,
        // which is all placement decisions need.
        let diff = self.distance(other);
        let mut acc = 0f64;
        for &byte in diff.0.iter() {
            acc = acc * 256.0 + byte as f64;
        }
        acc
    }
}

fn hex_val(c: u8) -> Option<u8> {
    match c {
        b'0'..=b'9' => Some(c - b'0'),
        b'a'..=b'f' => Some(c - b'a' + 10),
        b'A'..=b'F' => Some(c - b'A' + 10),
        _ => None,
    }
}

const B64_ALPHABET: &[u8] = b"ABCDEFGHIJKLMNOPQRSTUVWXYZabcdefghijklmnopqrstuvwxyz0123456789+/";

fn base64_decode(s: &str) -> Option<Vec<u8>> {
    let s = s.trim_end_matches('=');
    let mut out = Vec::with_capacity(s.len() * 3 / 4);
    let mut buf = 0u32;
    let mut bits = 0u32;
    for c in s.bytes() {
        let val = B64_ALPHABET.iter().position(|&b| b == c)? as u32;
        buf = (buf << 6) | val;
        bits += 6;
        if bits >= 8 {
            bits -= 8;
            out.push((buf >> bits) as u8);
        }
    }
    Some(out)
}

impl fmt::Debug for NodeId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "NodeId({})", self.to_hex())
    }
}

impl fmt::Display for NodeId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.to_hex())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn id(byte0: u8) -> NodeId {
        let mut b = [0u8; NODE_ID_LEN];
        b[0] = byte0;
        NodeId(b)
    }

    #[test]
    fn xor_is_self_inverse() {
        let a = id(0x12);
        let b = id(0x34);
        assert_eq!(a.xor(&b).xor(&b), a);
        assert_eq!(a.xor(&a), NodeId::default());
    }

    #[test]
    fn lcp_full_match() {
        let a = NodeId([0xAAu8; NODE_ID_LEN]);
        assert_eq!(a.longest_common_prefix(&a), NODE_ID_BITS);
    }

    #[test]
    fn lcp_first_bit_differs() {
        let a = NodeId([0x00u8; NODE_ID_LEN]);
        let b = NodeId([0x80u8; NODE_ID_LEN]);
        assert_eq!(a.longest_common_prefix(&b), 0);
    }

    #[test]
    fn prefix_preserves_leading_bits_and_fills_rest() {
        let a = NodeId([0xFFu8; NODE_ID_LEN]);
        let p = a.prefix(4, 0x00);
        assert_eq!(p.0[0], 0xF0);
        assert_eq!(p.0[1], 0x00);
    }

    #[test]
    fn hex_round_trip() {
        let a = id(0x5A);
        let hex = a.to_hex();
        assert_eq!(NodeId::from_hex(&hex).unwrap(), a);
    }

    #[test]
    fn from_bytes_rejects_wrong_length() {
        assert!(matches!(
            NodeId::from_bytes(&[0u8; 3]),
            Err(IdParseError::WrongLength(3))
        ));
    }

    #[test]
    fn distance_is_symmetric() {
        let a = id(10);
        let b = id(20);
        assert_eq!(a.distance(&b), b.distance(&a));
    }

    #[test]
    fn add_scalar_wraps_modulo_2_160() {
        let max = NodeId([0xFFu8; NODE_ID_LEN]);
        let wrapped = max.add_scalar(1.0);
        assert_eq!(wrapped, NodeId::default());
    }
}
