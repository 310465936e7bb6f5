// Copyright 2024 UniSphere Overlay Project.
//
// This library is free software: you can redistribute it and/or modify
// it under the terms of the GNU General Public License as published by
// the Free Software Foundation, either version 3 of the License, or
// (at your option) any later version.

//! Name records (spec §3, §4.F), grounded on
//! `original_source/src/social/name_database.h`'s record variants. Each
//! record type carries its own TTL: short-lived opportunistic caches decay
//! fast, while records this node is itself authoritative for (its own
//! address, or a sloppy-group peer's) live much longer.

use crate::address::LandmarkAddressList;
use crate::identity::NodeId;
use std::time::{Duration, Instant};

/// Cache entries learned opportunistically while relaying traffic.
pub const CACHE_TTL: Duration = Duration::from_secs(300);
/// Entries this node holds with direct knowledge: its own published
/// address, or a sloppy-group peer's.
pub const AUTHORITY_TTL: Duration = Duration::from_secs(1200);

/// What role this node plays with respect to the recorded address.
#[derive(Debug, Clone, Copy, Eq, PartialEq)]
pub enum RecordType {
    /// Learned opportunistically; short TTL, freely evicted under pressure.
    Cache,
    /// This node's own address, held with authority.
    Authority,
    /// A sloppy-group peer's address, held as its consistent-hashing
    /// landmark cache.
    SloppyGroup,
}

impl RecordType {
    pub fn ttl(self) -> Duration {
        match self {
            RecordType::Cache => CACHE_TTL,
            RecordType::Authority | RecordType::SloppyGroup => AUTHORITY_TTL,
        }
    }
}

/// One entry in the name database: `node_id`'s landmark-relative
/// addresses as of `seqno`, with bookkeeping for expiry and re-gossip.
#[derive(Debug, Clone)]
pub struct NameRecord {
    pub node_id: NodeId,
    pub record_type: RecordType,
    pub addresses: LandmarkAddressList,
    pub seqno: u16,
    pub origin_id: NodeId,
    pub last_update: Instant,
    /// The peer this record was last received from, if any (used to avoid
    /// echoing a record straight back to its source).
    pub received_from: Option<NodeId>,
}

impl NameRecord {
    pub fn new(
        node_id: NodeId,
        record_type: RecordType,
        addresses: LandmarkAddressList,
        seqno: u16,
        origin_id: NodeId,
        now: Instant,
        received_from: Option<NodeId>,
    ) -> Self {
        Self {
            node_id,
            record_type,
            addresses,
            seqno,
            origin_id,
            last_update: now,
            received_from,
        }
    }

    pub fn is_expired(&self, now: Instant) -> bool {
        now.duration_since(self.last_update) >= self.record_type.ttl()
    }

    pub fn refresh(&mut self, now: Instant) {
        self.last_update = now;
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn cache_record_expires_before_authority_record() {
        let now = Instant::now();
        let cache = NameRecord::new(NodeId::default(), RecordType::Cache, vec![], 1, NodeId::default(), now, None);
        let authority = NameRecord::new(NodeId::default(), RecordType::Authority, vec![], 1, NodeId::default(), now, None);
        assert!(cache.record_type.ttl() < authority.record_type.ttl());
    }

    #[test]
    fn refresh_resets_expiry_clock() {
        let now = Instant::now();
        let mut r = NameRecord::new(NodeId::default(), RecordType::Cache, vec![], 1, NodeId::default(), now, None);
        r.last_update = now - Duration::from_secs(400);
        assert!(r.is_expired(now));
        r.refresh(now);
        assert!(!r.is_expired(now));
    }
}
