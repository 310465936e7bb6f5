// Copyright 2024 UniSphere Overlay Project.
//
// This library is free software: you can redistribute it and/or modify
// it under the terms of the GNU General Public License as published by
// the Free Software Foundation, either version 3 of the License, or
// (at your option) any later version.

//! The Feasible-Distance rule (spec §3 "Route originator", design note
//! "Cyclic ownership"): one originator per destination, shared by every
//! entry for that destination, outliving any particular entry.

use crate::identity::NodeId;
use parking_lot::Mutex;
use std::time::Instant;

struct OriginatorState {
    latest_seqno: u16,
    smallest_cost_seen: u32,
    last_update: Instant,
}

/// `(destination, latest_seqno, smallest_cost_seen, last_update)`, shared
/// by every [`crate::rib::RoutingEntry`] for `destination`.
pub struct RouteOriginator {
    destination: NodeId,
    state: Mutex<OriginatorState>,
}

/// Sequence-number comparison under 16-bit wraparound: `a` is "strictly
/// newer" than `b` iff the signed difference is positive.
fn seq_newer(a: u16, b: u16) -> bool {
    (a.wrapping_sub(b) as i16) > 0
}

impl RouteOriginator {
    pub fn new(destination: NodeId, seqno: u16, cost: u32, now: Instant) -> Self {
        Self {
            destination,
            state: Mutex::new(OriginatorState {
                latest_seqno: seqno,
                smallest_cost_seen: cost,
                last_update: now,
            }),
        }
    }

    pub fn destination(&self) -> NodeId {
        self.destination
    }

    pub fn latest_seqno(&self) -> u16 {
        self.state.lock().latest_seqno
    }

    pub fn smallest_cost_seen(&self) -> u32 {
        self.state.lock().smallest_cost_seen
    }

    pub fn last_update(&self) -> Instant {
        self.state.lock().last_update
    }

    /// An entry is feasible iff its seqno is strictly newer than the
    /// originator's, or its cost is strictly smaller than the smallest
    /// cost ever observed for this destination.
    pub fn is_feasible(&self, seqno: u16, cost: u32) -> bool {
        let state = self.state.lock();
        seq_newer(seqno, state.latest_seqno) || cost < state.smallest_cost_seen
    }

    /// Folds a newly-seen `(seqno, cost)` pair into this originator's
    /// bookkeeping. Called whenever any entry for this destination is
    /// imported, independent of whether that entry is admitted.
    pub fn observe(&self, seqno: u16, cost: u32, now: Instant) {
        let mut state = self.state.lock();
        if seq_newer(seqno, state.latest_seqno) {
            state.latest_seqno = seqno;
        }
        if cost < state.smallest_cost_seen {
            state.smallest_cost_seen = cost;
        }
        state.last_update = now;
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn newer_seqno_is_feasible() {
        let o = RouteOriginator::new(NodeId::default(), 5, 3, Instant::now());
        assert!(o.is_feasible(6, 10));
    }

    #[test]
    fn lower_cost_is_feasible_even_with_stale_seqno() {
        let o = RouteOriginator::new(NodeId::default(), 5, 3, Instant::now());
        assert!(o.is_feasible(4, 2));
    }

    #[test]
    fn equal_seqno_and_higher_cost_is_not_feasible() {
        let o = RouteOriginator::new(NodeId::default(), 5, 3, Instant::now());
        assert!(!o.is_feasible(5, 3));
        assert!(!o.is_feasible(5, 4));
    }

    #[test]
    fn seqno_wraparound_is_handled() {
        let o = RouteOriginator::new(NodeId::default(), u16::MAX, 3, Instant::now());
        assert!(o.is_feasible(0, 10));
    }

    #[test]
    fn observe_tracks_minimum_cost_seen() {
        let o = RouteOriginator::new(NodeId::default(), 1, 10, Instant::now());
        o.observe(2, 4, Instant::now());
        assert_eq!(o.smallest_cost_seen(), 4);
        o.observe(3, 20, Instant::now());
        assert_eq!(o.smallest_cost_seen(), 4, "must not increase");
    }
}
