// Copyright 2024 UniSphere Overlay Project.
//
// This library is free software: you can redistribute it and/or modify
// it under the terms of the GNU General Public License as published by
// the Free Software Foundation, either version 3 of the License, or
// (at your option) any later version.

//! Routing entries (spec §3): immutable except for `active`,
//! `vicinity`/`extended_vicinity` (flipped by the admission algorithm on
//! *other* entries when a bucket fills up) and `last_update`. Any other
//! change is modeled as installing a whole new entry rather than mutating
//! one in place.

use super::originator::RouteOriginator;
use crate::address::{RoutingPath, Vport};
use crate::identity::{PeerPublicKey, SigningPublicKey};
use parking_lot::Mutex;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Instant;

/// Entries are shared through [`Signal`](crate::signal::Signal), whose
/// deferred dispatch requires `Send + Sync` payloads, so the explicitly
/// mutable fields use atomics/a small mutex rather than `Cell`/`RefCell`.
pub struct RoutingEntry {
    pub destination: crate::identity::NodeId,
    pub public_key: PeerPublicKey,
    pub forward_path: Vec<Vport>,
    pub reverse_path: RoutingPath,
    pub delegations: Vec<Vec<u8>>,
    pub sa_key: SigningPublicKey,
    pub landmark: bool,
    pub seqno: u16,
    pub cost: u32,
    pub vicinity: AtomicBool,
    pub extended_vicinity: AtomicBool,
    pub active: AtomicBool,
    pub last_update: Mutex<Instant>,
    pub originator: Arc<RouteOriginator>,
}

impl RoutingEntry {
    pub fn is_vicinity(&self) -> bool {
        self.vicinity.load(Ordering::Relaxed)
    }

    pub fn set_vicinity(&self, value: bool) {
        self.vicinity.store(value, Ordering::Relaxed)
    }

    pub fn is_extended_vicinity(&self) -> bool {
        self.extended_vicinity.load(Ordering::Relaxed)
    }

    pub fn set_extended_vicinity(&self, value: bool) {
        self.extended_vicinity.store(value, Ordering::Relaxed)
    }

    pub fn is_active(&self) -> bool {
        self.active.load(Ordering::Relaxed)
    }

    pub fn set_active(&self, value: bool) {
        self.active.store(value, Ordering::Relaxed)
    }

    pub fn last_update(&self) -> Instant {
        *self.last_update.lock()
    }

    pub fn touch(&self, now: Instant) {
        *self.last_update.lock() = now;
    }

    /// `forward_path.front()`: the vport of the neighbor that announced
    /// this entry (invariant I6).
    pub fn origin_vport(&self) -> Vport {
        self.forward_path[0]
    }

    pub fn is_feasible(&self) -> bool {
        self.originator.is_feasible(self.seqno, self.cost)
    }

    /// Whether two announcements describe byte-identical routing state
    /// (spec §4.E step 4, R1): everything except `last_update`.
    pub fn announces_same_route_as(
        &self,
        public_key: &PeerPublicKey,
        forward_path: &[Vport],
        reverse_path: &RoutingPath,
        landmark: bool,
        seqno: u16,
        sa_key: &SigningPublicKey,
    ) -> bool {
        &self.public_key == public_key
            && self.forward_path.as_slice() == forward_path
            && &self.reverse_path == reverse_path
            && self.landmark == landmark
            && self.seqno == seqno
            && &self.sa_key == sa_key
    }
}

pub type EntryRef = Arc<RoutingEntry>;
