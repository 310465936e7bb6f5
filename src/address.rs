// Copyright 2024 UniSphere Overlay Project.
//
// This library is free software: you can redistribute it and/or modify
// it under the terms of the GNU General Public License as published by
// the Free Software Foundation, either version 3 of the License, or
// (at your option) any later version.

//! Component B: landmark-relative addresses (spec §4.B), grounded on
//! `original_source/src/social/address.h`/`.cpp`.

use crate::identity::NodeId;
use serde::{Deserialize, Serialize};
use std::collections::VecDeque;
use std::fmt;

/// A small-integer hop identifier within one node's vport table.
pub type Vport = u32;

/// A reverse routing path: the sequence of vports a message takes walking
/// from the landmark towards the addressed node.
pub type RoutingPath = VecDeque<Vport>;

/// A landmark-relative address: a landmark identifier plus the reverse
/// source route from that landmark to the addressed node. An address with
/// an empty path designates the landmark itself.
#[derive(Clone, Eq, PartialEq, Serialize, Deserialize, Default)]
pub struct LandmarkAddress {
    landmark_id: NodeId,
    path: RoutingPath,
}

impl LandmarkAddress {
    /// Constructs an address designating the landmark itself (empty path).
    pub fn landmark(landmark_id: NodeId) -> Self {
        Self {
            landmark_id,
            path: RoutingPath::new(),
        }
    }

    /// Constructs an address with an explicit reverse routing path.
    pub fn with_path(landmark_id: NodeId, path: RoutingPath) -> Self {
        Self { landmark_id, path }
    }

    /// True for the default-constructed (all-zero landmark id, empty path)
    /// null address, used as a sentinel for "no local address yet".
    pub fn is_null(&self) -> bool {
        self.landmark_id == NodeId::default() && self.path.is_empty()
    }

    pub fn landmark_id(&self) -> NodeId {
        self.landmark_id
    }

    pub fn path(&self) -> &RoutingPath {
        &self.path
    }

    /// Length of the L-R source route.
    pub fn size(&self) -> usize {
        self.path.len()
    }

    /// Shifts the address one hop forward by removing the first element of
    /// the reverse routing path, i.e. the step taken so far when forwarding
    /// a message from the landmark towards this address.
    pub fn shift(&mut self) {
        self.path.pop_front();
    }

    /// Prepends a vport, i.e. extends the reverse path by one hop closer to
    /// the landmark. Used when a peer re-exports its own address through a
    /// neighbor relationship (spec §4.H path re-export).
    pub fn prepended(&self, vport: Vport) -> Self {
        let mut path = RoutingPath::with_capacity(self.path.len() + 1);
        path.push_back(vport);
        path.extend(self.path.iter().copied());
        Self {
            landmark_id: self.landmark_id,
            path,
        }
    }
}

impl fmt::Debug for LandmarkAddress {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "[{}, <", self.landmark_id.to_hex())?;
        let mut first = true;
        for hop in &self.path {
            if !first {
                write!(f, "-")?;
            }
            write!(f, "{}", hop)?;
            first = false;
        }
        write!(f, ">]")
    }
}

impl fmt::Display for LandmarkAddress {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        fmt::Debug::fmt(self, f)
    }
}

/// A list of L-R addresses, ordered most-preferred first (spec §3:
/// `Contact.addresses`' priority ordering is external to this type; this is
/// just the plain collection used for e.g. NDB-stored address lists).
pub type LandmarkAddressList = Vec<LandmarkAddress>;

#[cfg(test)]
mod tests {
    use super::*;

    fn id(byte: u8) -> NodeId {
        NodeId::from_bytes(&[byte; 20]).unwrap()
    }

    #[test]
    fn landmark_address_has_empty_path() {
        let addr = LandmarkAddress::landmark(id(1));
        assert_eq!(addr.size(), 0);
        assert!(!addr.is_null());
    }

    #[test]
    fn default_address_is_null() {
        assert!(LandmarkAddress::default().is_null());
    }

    #[test]
    fn shift_removes_first_hop() {
        let mut path = RoutingPath::new();
        path.push_back(3);
        path.push_back(7);
        let mut addr = LandmarkAddress::with_path(id(2), path);
        addr.shift();
        assert_eq!(addr.path().iter().copied().collect::<Vec<_>>(), vec![7]);
    }

    #[test]
    fn shift_on_empty_path_is_a_no_op() {
        let mut addr = LandmarkAddress::landmark(id(3));
        addr.shift();
        assert_eq!(addr.size(), 0);
    }

    #[test]
    fn prepended_extends_path_from_the_front() {
        let mut path = RoutingPath::new();
        path.push_back(9);
        let addr = LandmarkAddress::with_path(id(4), path);
        let extended = addr.prepended(2);
        assert_eq!(extended.path().iter().copied().collect::<Vec<_>>(), vec![2, 9]);
    }

    #[test]
    fn equality_compares_landmark_and_path() {
        let a = LandmarkAddress::landmark(id(5));
        let b = LandmarkAddress::landmark(id(5));
        let c = LandmarkAddress::landmark(id(6));
        assert_eq!(a, b);
        assert_ne!(a, c);
    }
}
