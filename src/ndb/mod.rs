// Copyright 2024 UniSphere Overlay Project.
//
// This library is free software: you can redistribute it and/or modify
// it under the terms of the GNU General Public License as published by
// the Free Software Foundation, either version 3 of the License, or
// (at your option) any later version.

//! Component F: the name database (spec §4.F), grounded on
//! `original_source/src/social/name_database.h`/`.cpp`. Stores landmark-
//! relative addresses this node is authoritative for, has cached while
//! relaying, or holds on behalf of a sloppy-group peer, and answers
//! lookups either locally or (conceptually) via the sloppy-group gossip
//! path.

mod record;
mod ring;

pub use record::{NameRecord, RecordType, AUTHORITY_TTL, CACHE_TTL};
pub use ring::LandmarkRing;

use crate::address::LandmarkAddressList;
use crate::config::RouterConfig;
use crate::identity::NodeId;
use crate::router::rpc::{RpcClient, RpcRequest, RpcResponse};
use parking_lot::{Mutex, ReentrantMutex};
use std::cell::RefCell;
use std::collections::HashMap;
use std::sync::Arc;
use std::time::Instant;

/// Which shape of answer [`NameDatabase::lookup_sloppy_group`] should
/// produce.
#[derive(Debug, Clone, Copy, Eq, PartialEq)]
pub enum LookupType {
    /// The single record numerically closest to the queried ID.
    Closest,
    /// Up to `cache_redundancy` records numerically closest to the
    /// queried ID, for redundant address publication.
    ClosestNeighbors,
}

struct Inner {
    records: HashMap<NodeId, NameRecord>,
    ring: LandmarkRing,
}

/// The local name database: a bounded cache of landmark-relative address
/// records plus the landmark consistent-hashing ring used to pick
/// redundant publication targets.
pub struct NameDatabase {
    config: RouterConfig,
    inner: ReentrantMutex<RefCell<Inner>>,
    rpc_client: Mutex<Option<Arc<dyn RpcClient>>>,
}

impl NameDatabase {
    pub fn new(config: RouterConfig) -> Self {
        Self {
            config,
            inner: ReentrantMutex::new(RefCell::new(Inner {
                records: HashMap::new(),
                ring: LandmarkRing::new(),
            })),
            rpc_client: Mutex::new(None),
        }
    }

    /// Wires in the embedder's RPC client, used by
    /// [`Self::remote_lookup_sloppy_group`] to query the landmarks caching
    /// a node outside the caller's own view.
    pub fn set_rpc_client(&self, client: Arc<dyn RpcClient>) {
        *self.rpc_client.lock() = Some(client);
    }

    /// Stores or refreshes a record. Returns `true` if the record was new
    /// or its sequence number advanced (spec R2: stale re-announcements of
    /// a stored record are a no-op besides refreshing `last_update`).
    pub fn store(&self, record: NameRecord) -> bool {
        let guard = self.inner.lock();
        let mut inner = guard.borrow_mut();
        match inner.records.get_mut(&record.node_id) {
            Some(existing) => {
                if record.seqno == existing.seqno {
                    existing.refresh(record.last_update);
                    false
                } else if (record.seqno.wrapping_sub(existing.seqno) as i16) > 0 {
                    *existing = record;
                    true
                } else {
                    false
                }
            }
            None => {
                inner.records.insert(record.node_id, record);
                true
            }
        }
    }

    pub fn remove(&self, node_id: &NodeId) {
        let guard = self.inner.lock();
        guard.borrow_mut().records.remove(node_id);
    }

    pub fn clear(&self) {
        let guard = self.inner.lock();
        guard.borrow_mut().records.clear();
    }

    pub fn lookup(&self, node_id: &NodeId) -> Option<LandmarkAddressList> {
        let guard = self.inner.lock();
        let inner = guard.borrow();
        let record = inner.records.get(node_id)?;
        if record.is_expired(Instant::now()) {
            return None;
        }
        Some(record.addresses.clone())
    }

    /// Evicts every record past its type-specific TTL. Call periodically
    /// from the router's maintenance timer.
    pub fn expire(&self, now: Instant) {
        let guard = self.inner.lock();
        guard.borrow_mut().records.retain(|_, r| !r.is_expired(now));
    }

    /// Answers a sloppy-group-scoped lookup: among stored records sharing
    /// `prefix_len` leading bits with `node_id` (excluding `origin`
    /// itself), returns either the single numerically closest record or
    /// up to `cache_redundancy` of them, per `lookup_type`.
    pub fn lookup_sloppy_group(
        &self,
        node_id: &NodeId,
        prefix_len: usize,
        origin: &NodeId,
        lookup_type: LookupType,
    ) -> Vec<NameRecord> {
        let guard = self.inner.lock();
        let inner = guard.borrow();
        let now = Instant::now();
        let mut candidates: Vec<NameRecord> = inner
            .records
            .values()
            .filter(|r| !r.is_expired(now))
            .filter(|r| &r.node_id != origin)
            .filter(|r| r.node_id.matches_prefix(node_id, prefix_len))
            .cloned()
            .collect();
        candidates.sort_by(|a, b| {
            a.node_id
                .distance_as_double(node_id)
                .partial_cmp(&b.node_id.distance_as_double(node_id))
                .unwrap_or(std::cmp::Ordering::Equal)
        });
        let take = match lookup_type {
            LookupType::Closest => 1,
            LookupType::ClosestNeighbors => self.config.cache_redundancy,
        };
        candidates.truncate(take);
        candidates
    }

    /// Answers a sloppy-group-scoped query for a node that is not itself a
    /// member of the group (spec §8 scenario 6): fans the query out, via
    /// the registered [`RpcClient`], to every landmark
    /// [`Self::get_landmark_caches`] returns for `node_id`, and merges
    /// whatever records each landmark's own database answers with. Returns
    /// empty if no RPC client has been wired in, rather than silently
    /// falling back to the local store, which would answer "closest
    /// record" against the caller's own (irrelevant) records instead of
    /// the group's, grounded on
    /// `original_source/src/social/name_database.cpp`'s
    /// `remoteLookupSloppyGroup`.
    pub fn remote_lookup_sloppy_group(
        &self,
        node_id: &NodeId,
        prefix_len: usize,
        origin: &NodeId,
        lookup_type: LookupType,
    ) -> Vec<NameRecord> {
        let client = match self.rpc_client.lock().clone() {
            Some(client) => client,
            None => return Vec::new(),
        };
        let mut merged = Vec::new();
        for landmark in self.get_landmark_caches(node_id, prefix_len) {
            let request = RpcRequest::LookupSloppyGroup {
                node_id: *node_id,
                prefix_len,
                origin: *origin,
                lookup_type,
            };
            match client.call(landmark, request) {
                Ok(RpcResponse::Records(records)) => merged.extend(records),
                Ok(_) => {}
                Err(e) => tracing::warn!("sloppy-group lookup on landmark {} failed: {}", landmark, e),
            }
        }
        merged
    }

    pub fn register_landmark(&self, landmark_id: NodeId) {
        let guard = self.inner.lock();
        guard.borrow_mut().ring.register(landmark_id);
    }

    pub fn unregister_landmark(&self, landmark_id: &NodeId) {
        let guard = self.inner.lock();
        guard.borrow_mut().ring.unregister(landmark_id);
    }

    /// The landmarks that should cache `node_id`'s address, for redundant
    /// publication (spec §4.F).
    pub fn get_landmark_caches(&self, node_id: &NodeId, sg_prefix_len: usize) -> Vec<NodeId> {
        let guard = self.inner.lock();
        let inner = guard.borrow();
        inner.ring.closest(node_id, sg_prefix_len, self.config.cache_redundancy)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn id(byte: u8) -> NodeId {
        NodeId::from_bytes(&[byte; 20]).unwrap()
    }

    fn record(node_id: NodeId, seqno: u16, record_type: RecordType) -> NameRecord {
        NameRecord::new(node_id, record_type, vec![], seqno, node_id, Instant::now(), None)
    }

    #[test]
    fn store_then_lookup_round_trips() {
        let db = NameDatabase::new(RouterConfig::default());
        let n = id(1);
        assert!(db.store(record(n, 1, RecordType::Cache)));
        assert!(db.lookup(&n).is_some());
    }

    #[test]
    fn stale_seqno_does_not_overwrite() {
        let db = NameDatabase::new(RouterConfig::default());
        let n = id(2);
        db.store(record(n, 5, RecordType::Cache));
        assert!(!db.store(record(n, 3, RecordType::Cache)));
    }

    #[test]
    fn remove_drops_the_record() {
        let db = NameDatabase::new(RouterConfig::default());
        let n = id(3);
        db.store(record(n, 1, RecordType::Cache));
        db.remove(&n);
        assert!(db.lookup(&n).is_none());
    }

    #[test]
    fn lookup_sloppy_group_excludes_origin() {
        let db = NameDatabase::new(RouterConfig::default());
        let origin = id(4);
        let other = id(6);
        db.store(record(origin, 1, RecordType::SloppyGroup));
        db.store(record(other, 1, RecordType::SloppyGroup));
        let found = db.lookup_sloppy_group(&id(5), 0, &origin, LookupType::Closest);
        assert_eq!(found.len(), 1);
        assert_eq!(found[0].node_id, other);
    }

    #[test]
    fn get_landmark_caches_uses_registered_landmarks() {
        let db = NameDatabase::new(RouterConfig::default());
        db.register_landmark(id(10));
        db.register_landmark(id(200));
        let caches = db.get_landmark_caches(&id(11), 0);
        assert_eq!(caches.first(), Some(&id(10)));
    }

    #[test]
    fn remote_lookup_sloppy_group_without_a_client_returns_empty() {
        let db = NameDatabase::new(RouterConfig::default());
        db.register_landmark(id(10));
        let found = db.remote_lookup_sloppy_group(&id(20), 0, &id(20), LookupType::Closest);
        assert!(found.is_empty());
    }

    #[test]
    fn remote_lookup_sloppy_group_fans_out_through_the_rpc_client() {
        use crate::router::rpc::MockRpcClient;
        use std::sync::Arc;

        let landmark_id = id(10);
        let member = id(6);
        let querier = NameDatabase::new(RouterConfig::default());
        querier.register_landmark(landmark_id);

        let landmark_db = Arc::new(NameDatabase::new(RouterConfig::default()));
        landmark_db.store(record(member, 1, RecordType::SloppyGroup));

        let client = Arc::new(MockRpcClient::new());
        client.register(landmark_id, landmark_db);
        querier.set_rpc_client(client);

        let found = querier.remote_lookup_sloppy_group(&id(7), 0, &id(7), LookupType::Closest);
        assert_eq!(found.len(), 1);
        assert_eq!(found[0].node_id, member);
    }
}
