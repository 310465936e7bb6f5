// Copyright 2024 UniSphere Overlay Project.
//
// This library is free software: you can redistribute it and/or modify
// it under the terms of the GNU General Public License as published by
// the Free Software Foundation, either version 3 of the License, or
// (at your option) any later version.

//! The landmark consistent-hashing ring (spec §4.F), grounded on
//! `original_source/src/social/name_database.h`'s landmark registry.
//!
//! Landmark selection for address caching uses *numeric* (arithmetic)
//! distance along the identifier ring, not the XOR/longest-common-prefix
//! metric the routing table uses for vicinity selection — the two
//! distance functions serve different purposes and are kept distinct
//! per the design note on ambiguous source behaviors.

use crate::identity::NodeId;
use std::collections::BTreeSet;

/// The set of node IDs currently acting as landmarks, ordered for ring
/// placement.
#[derive(Default)]
pub struct LandmarkRing {
    landmarks: BTreeSet<NodeId>,
}

impl LandmarkRing {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn register(&mut self, landmark_id: NodeId) {
        self.landmarks.insert(landmark_id);
    }

    pub fn unregister(&mut self, landmark_id: &NodeId) {
        self.landmarks.remove(landmark_id);
    }

    pub fn len(&self) -> usize {
        self.landmarks.len()
    }

    pub fn is_empty(&self) -> bool {
        self.landmarks.is_empty()
    }

    /// Returns up to `count` registered landmarks matching `node_id`'s
    /// leading `sg_prefix_len` bits, ordered by increasing arithmetic ring
    /// distance to `node_id`. An `sg_prefix_len` of `0` considers every
    /// registered landmark.
    pub fn closest(&self, node_id: &NodeId, sg_prefix_len: usize, count: usize) -> Vec<NodeId> {
        let mut candidates: Vec<NodeId> = self
            .landmarks
            .iter()
            .filter(|l| l.matches_prefix(node_id, sg_prefix_len))
            .copied()
            .collect();
        candidates.sort_by(|a, b| {
            a.distance_as_double(node_id)
                .partial_cmp(&b.distance_as_double(node_id))
                .unwrap_or(std::cmp::Ordering::Equal)
        });
        candidates.truncate(count);
        candidates
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn id(byte: u8) -> NodeId {
        NodeId::from_bytes(&[byte; 20]).unwrap()
    }

    #[test]
    fn closest_orders_by_arithmetic_distance() {
        let mut ring = LandmarkRing::new();
        ring.register(id(10));
        ring.register(id(200));
        ring.register(id(12));
        let closest = ring.closest(&id(11), 0, 2);
        assert_eq!(closest, vec![id(10), id(12)]);
    }

    #[test]
    fn prefix_filter_excludes_mismatched_landmarks() {
        let mut ring = LandmarkRing::new();
        ring.register(id(0b0000_0000));
        ring.register(id(0b1000_0000));
        let closest = ring.closest(&id(0b0000_0001), 1, 10);
        assert_eq!(closest, vec![id(0b0000_0000)]);
    }

    #[test]
    fn unregister_removes_from_future_selections() {
        let mut ring = LandmarkRing::new();
        ring.register(id(5));
        ring.unregister(&id(5));
        assert!(ring.closest(&id(5), 0, 10).is_empty());
    }
}
