// Copyright 2024 UniSphere Overlay Project.
//
// This library is free software: you can redistribute it and/or modify
// it under the terms of the GNU General Public License as published by
// the Free Software Foundation, either version 3 of the License, or
// (at your option) any later version.

//! Component C: the vport map (spec §4.C), grounded on
//! `original_source/src/social/routing_table.h`'s `getVportForNeighbor`/
//! `getNeighborForVport`. Assigns small monotonically increasing integers
//! to neighbor node identifiers so routing paths don't need to carry full
//! 160-bit identifiers hop by hop.

use crate::address::Vport;
use crate::identity::NodeId;
use std::collections::HashMap;

/// Bidirectional neighbor-id <-> vport map with monotonic allocation.
#[derive(Default)]
pub struct VportMap {
    by_neighbor: HashMap<NodeId, Vport>,
    by_vport: HashMap<Vport, NodeId>,
    next_vport: Vport,
}

impl VportMap {
    pub fn new() -> Self {
        Self::default()
    }

    /// Returns the vport for `neighbor`, allocating a fresh one if this is
    /// the first time this neighbor has been seen.
    pub fn get_or_assign(&mut self, neighbor: NodeId) -> Vport {
        if let Some(&vport) = self.by_neighbor.get(&neighbor) {
            return vport;
        }
        let vport = self.next_vport;
        self.next_vport += 1;
        self.by_neighbor.insert(neighbor, vport);
        self.by_vport.insert(vport, neighbor);
        vport
    }

    /// Looks up an already-assigned vport without allocating one.
    pub fn vport_for_neighbor(&self, neighbor: &NodeId) -> Option<Vport> {
        self.by_neighbor.get(neighbor).copied()
    }

    pub fn neighbor_for_vport(&self, vport: Vport) -> Option<NodeId> {
        self.by_vport.get(&vport).copied()
    }

    /// Removes a neighbor's mapping, e.g. when a link goes down. The
    /// vport number is not reused.
    pub fn remove_neighbor(&mut self, neighbor: &NodeId) {
        if let Some(vport) = self.by_neighbor.remove(neighbor) {
            self.by_vport.remove(&vport);
        }
    }

    pub fn len(&self) -> usize {
        self.by_neighbor.len()
    }

    pub fn is_empty(&self) -> bool {
        self.by_neighbor.is_empty()
    }

    pub fn clear(&mut self) {
        self.by_neighbor.clear();
        self.by_vport.clear();
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn id(byte: u8) -> NodeId {
        NodeId::from_bytes(&[byte; 20]).unwrap()
    }

    #[test]
    fn assigns_monotonically_increasing_vports() {
        let mut map = VportMap::new();
        assert_eq!(map.get_or_assign(id(1)), 0);
        assert_eq!(map.get_or_assign(id(2)), 1);
        assert_eq!(map.get_or_assign(id(1)), 0, "repeat lookups are stable");
    }

    #[test]
    fn resolves_both_directions() {
        let mut map = VportMap::new();
        let vport = map.get_or_assign(id(7));
        assert_eq!(map.vport_for_neighbor(&id(7)), Some(vport));
        assert_eq!(map.neighbor_for_vport(vport), Some(id(7)));
    }

    #[test]
    fn unknown_lookups_return_none() {
        let map = VportMap::new();
        assert_eq!(map.vport_for_neighbor(&id(9)), None);
        assert_eq!(map.neighbor_for_vport(42), None);
    }

    #[test]
    fn removing_a_neighbor_does_not_reuse_its_vport() {
        let mut map = VportMap::new();
        let first = map.get_or_assign(id(1));
        map.remove_neighbor(&id(1));
        let second = map.get_or_assign(id(2));
        assert_ne!(first, second);
        assert_eq!(map.vport_for_neighbor(&id(1)), None);
    }
}
