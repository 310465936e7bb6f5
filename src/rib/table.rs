// Copyright 2024 UniSphere Overlay Project.
//
// This library is free software: you can redistribute it and/or modify
// it under the terms of the GNU General Public License as published by
// the Free Software Foundation, either version 3 of the License, or
// (at your option) any later version.

//! Component E: the routing table (spec §4.E), grounded on
//! `original_source/src/social/routing_table.h`/`.cpp`.
//!
//! The multi-index container design note (§9) allows either incrementally
//! maintained secondary `BTreeMap` indexes or a purpose-built structure
//! updated inside one critical section. This implementation takes the
//! latter route in simplified form: a primary map keyed by
//! `(origin_vport, destination)` plus two derived multimaps
//! (`by_destination`, `by_vport`) that are kept in sync on every mutation;
//! ordering by cost, hops, or landmark status is computed on demand from
//! these rather than maintained as standing `BTreeMap` indexes, since the
//! per-destination and per-vport entry counts are bounded by the vicinity
//! and bucket caps (`O(sqrt(n ln n))` and `O(ln n)` respectively).

use super::entry::{EntryRef, RoutingEntry};
use super::originator::RouteOriginator;
use crate::address::{LandmarkAddress, LandmarkAddressList, RoutingPath, Vport};
use crate::config::RouterConfig;
use crate::identity::{NodeId, PeerPublicKey, SigningPublicKey};
use crate::signal::Signal;
use crate::time::Executor;
use crate::vport::VportMap;
use parking_lot::ReentrantMutex;
use std::cell::RefCell;
use std::collections::{HashMap, HashSet};
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::Arc;
use std::time::{Duration, Instant};

/// The fields of a freshly-verified announcement, ready for import.
pub struct Announcement {
    pub destination: NodeId,
    pub public_key: PeerPublicKey,
    pub forward_path: Vec<Vport>,
    pub reverse_path: RoutingPath,
    pub delegations: Vec<Vec<u8>>,
    pub sa_key: SigningPublicKey,
    pub landmark: bool,
    pub seqno: u16,
}

type Key = (Vport, NodeId);

struct Inner {
    primary: HashMap<Key, EntryRef>,
    by_destination: HashMap<NodeId, Vec<Vport>>,
    by_vport: HashMap<Vport, Vec<NodeId>>,
    originators: HashMap<NodeId, Arc<RouteOriginator>>,
    vports: VportMap,
    local_addresses: LandmarkAddressList,
}

impl Inner {
    fn entries_for_destination(&self, destination: &NodeId) -> Vec<EntryRef> {
        self.by_destination
            .get(destination)
            .into_iter()
            .flatten()
            .filter_map(|vport| self.primary.get(&(*vport, *destination)).cloned())
            .collect()
    }

    fn vicinity_count(&self) -> usize {
        self.primary
            .values()
            .filter(|e| e.is_vicinity())
            .map(|e| e.destination)
            .collect::<HashSet<_>>()
            .len()
    }

    fn largest_vicinity_key(&self) -> Option<Key> {
        self.primary
            .iter()
            .filter(|(_, e)| e.is_vicinity() && !e.landmark)
            .max_by_key(|(_, e)| e.cost)
            .map(|(k, _)| *k)
    }

    fn extended_vicinity_bucket_count(&self, bucket: &NodeId, bits: usize) -> usize {
        self.primary
            .values()
            .filter(|e| e.is_extended_vicinity() && e.destination.matches_prefix(bucket, bits))
            .map(|e| e.destination)
            .collect::<HashSet<_>>()
            .len()
    }

    fn largest_extended_vicinity_in_bucket(&self, bucket: &NodeId, bits: usize) -> Option<Key> {
        self.primary
            .iter()
            .filter(|(_, e)| e.is_extended_vicinity() && e.destination.matches_prefix(bucket, bits) && !e.landmark)
            .max_by_key(|(_, e)| e.cost)
            .map(|(k, _)| *k)
    }

    fn insert(&mut self, key: Key, entry: EntryRef) {
        self.by_destination.entry(key.1).or_default().push(key.0);
        self.by_vport.entry(key.0).or_default().push(key.1);
        self.primary.insert(key, entry);
    }

    fn remove(&mut self, key: &Key) -> Option<EntryRef> {
        let removed = self.primary.remove(key);
        if removed.is_some() {
            if let Some(list) = self.by_destination.get_mut(&key.1) {
                list.retain(|v| v != &key.0);
            }
            if let Some(list) = self.by_vport.get_mut(&key.0) {
                list.retain(|d| d != &key.1);
            }
        }
        removed
    }
}

type ImportFilter = Box<dyn Fn(&Announcement) -> bool + Send + Sync>;

/// The routing table (RIB): multi-indexed routing-entry store plus
/// active-route and local-address selection.
pub struct RoutingTable {
    local_id: NodeId,
    config: RouterConfig,
    network_size: AtomicU64,
    is_landmark: AtomicBool,
    inner: ReentrantMutex<RefCell<Inner>>,
    filters: ReentrantMutex<RefCell<Vec<ImportFilter>>>,
    /// Fires with the entry that should be (re-)exported to other neighbors.
    pub export: Signal<EntryRef>,
    /// Fires with the destination that lost its last active route.
    pub retraction: Signal<NodeId>,
    /// Fires with the new local address list whenever it changes.
    pub address_changed: Signal<LandmarkAddressList>,
}

impl RoutingTable {
    pub fn new(local_id: NodeId, config: RouterConfig) -> Self {
        Self {
            local_id,
            config,
            network_size: AtomicU64::new(1),
            is_landmark: AtomicBool::new(false),
            inner: ReentrantMutex::new(RefCell::new(Inner {
                primary: HashMap::new(),
                by_destination: HashMap::new(),
                by_vport: HashMap::new(),
                originators: HashMap::new(),
                vports: VportMap::new(),
                local_addresses: LandmarkAddressList::new(),
            })),
            filters: ReentrantMutex::new(RefCell::new(Vec::new())),
            export: Signal::new(),
            retraction: Signal::new(),
            address_changed: Signal::new(),
        }
    }

    pub fn register_import_filter<F>(&self, f: F)
    where
        F: Fn(&Announcement) -> bool + Send + Sync + 'static,
    {
        self.filters.lock().borrow_mut().push(Box::new(f));
    }

    pub fn set_network_size(&self, n: u64) {
        self.network_size.store(n.max(1), Ordering::Relaxed);
    }

    pub fn network_size(&self) -> u64 {
        self.network_size.load(Ordering::Relaxed)
    }

    fn sloppy_prefix_bits(n: f64) -> usize {
        if n <= 1.0 {
            return 0;
        }
        let l = (n / n.ln()).sqrt().log2().floor();
        if l.is_finite() && l > 0.0 {
            l as usize
        } else {
            0
        }
    }

    pub fn get_vport_for_neighbor(&self, neighbor: NodeId) -> Vport {
        let guard = self.inner.lock();
        guard.borrow_mut().vports.get_or_assign(neighbor)
    }

    pub fn get_neighbor_for_vport(&self, vport: Vport) -> Option<NodeId> {
        let guard = self.inner.lock();
        guard.borrow().vports.neighbor_for_vport(vport)
    }

    /// `import(entry)`: returns whether the table changed.
    pub fn import(&self, ann: Announcement, executor: &dyn Executor) -> bool {
        if ann.destination == self.local_id {
            return false; // B1
        }
        if ann.forward_path.is_empty() {
            return false;
        }
        {
            let filters = self.filters.lock();
            for f in filters.borrow().iter() {
                if !f(&ann) {
                    return false;
                }
            }
        }

        let now = Instant::now();
        let cost = ann.forward_path.len() as u32;
        let origin_vport = ann.forward_path[0];
        let key: Key = (origin_vport, ann.destination);

        let guard = self.inner.lock();
        let mut inner = guard.borrow_mut();

        // Seeded one tick stale / maximally costly so that the very first
        // announcement for a destination is judged against a baseline it
        // has not yet contributed to, rather than against itself.
        let originator = inner
            .originators
            .entry(ann.destination)
            .or_insert_with(|| {
                Arc::new(RouteOriginator::new(ann.destination, ann.seqno.wrapping_sub(1), u32::MAX, now))
            })
            .clone();

        if let Some(existing) = inner.primary.get(&key).cloned() {
            if existing.announces_same_route_as(
                &ann.public_key,
                &ann.forward_path,
                &ann.reverse_path,
                ann.landmark,
                ann.seqno,
                &ann.sa_key,
            ) {
                existing.touch(now);
                return false; // R1
            }

            let new_entry = Arc::new(RoutingEntry {
                destination: ann.destination,
                public_key: ann.public_key,
                forward_path: ann.forward_path,
                reverse_path: ann.reverse_path,
                delegations: ann.delegations,
                sa_key: ann.sa_key,
                landmark: ann.landmark,
                seqno: ann.seqno,
                cost,
                vicinity: AtomicBool::new(existing.is_vicinity()),
                extended_vicinity: AtomicBool::new(existing.is_extended_vicinity()),
                active: AtomicBool::new(existing.is_active()),
                last_update: parking_lot::Mutex::new(now),
                originator: originator.clone(),
            });
            inner.primary.insert(key, new_entry);
            self.reselect_active(&mut inner, ann.destination, executor);
            // Folded in only after this entry has been judged against the
            // pre-update baseline, or it would always tie its own bar.
            originator.observe(ann.seqno, cost, now);
            return true;
        }

        let (vicinity, extended_vicinity) = match self.admit(&mut inner, &ann, cost, executor) {
            Some(flags) => flags,
            None => return false,
        };

        let entry = Arc::new(RoutingEntry {
            destination: ann.destination,
            public_key: ann.public_key,
            forward_path: ann.forward_path,
            reverse_path: ann.reverse_path,
            delegations: ann.delegations,
            sa_key: ann.sa_key,
            landmark: ann.landmark,
            seqno: ann.seqno,
            cost,
            vicinity: AtomicBool::new(vicinity),
            extended_vicinity: AtomicBool::new(extended_vicinity),
            active: AtomicBool::new(false),
            last_update: parking_lot::Mutex::new(now),
            originator: originator.clone(),
        });
        inner.insert(key, entry);
        self.reselect_active(&mut inner, ann.destination, executor);
        originator.observe(ann.seqno, cost, now);
        true
    }

    /// Decides vicinity/extended-vicinity admission for a brand-new
    /// `(vport, destination)` pair (spec §4.E "new (V, D)" branch).
    /// Landmark admission is unconditional.
    fn admit(&self, inner: &mut Inner, ann: &Announcement, cost: u32, executor: &dyn Executor) -> Option<(bool, bool)> {
        if ann.landmark {
            return Some((false, false));
        }

        let n = self.network_size() as f64;
        let v_max = ((n * n.ln()).sqrt() * self.config.vicinity_size_scale).floor().max(0.0) as usize;
        let bucket_max = (n.ln().round().max(0.0) as usize).max(self.config.bucket_size_floor);
        let bits = Self::sloppy_prefix_bits(n);
        let dest_bucket = ann.destination.prefix(bits, 0);

        if inner.vicinity_count() < v_max {
            return Some((true, false));
        }

        if let Some(demote_key) = inner.largest_vicinity_key() {
            let demote_cost = inner.primary[&demote_key].cost;
            if cost < demote_cost {
                let demoted = inner.primary[&demote_key].clone();
                let demoted_bucket = demoted.destination.prefix(bits, 0);
                let bucket_count = inner.extended_vicinity_bucket_count(&demoted_bucket, bits);
                if bucket_count >= bucket_max {
                    if let Some(evict_key) = inner.largest_extended_vicinity_in_bucket(&demoted_bucket, bits) {
                        if evict_key != demote_key {
                            self.remove_entry(inner, evict_key, executor);
                        }
                    }
                }
                demoted.set_vicinity(false);
                demoted.set_extended_vicinity(true);
                return Some((true, false));
            }
        }

        let bucket_count = inner.extended_vicinity_bucket_count(&dest_bucket, bits);
        if bucket_count < bucket_max {
            return Some((false, true));
        }

        if let Some(evict_key) = inner.largest_extended_vicinity_in_bucket(&dest_bucket, bits) {
            let evict_cost = inner.primary[&evict_key].cost;
            if cost < evict_cost {
                self.remove_entry(inner, evict_key, executor);
                return Some((false, true));
            }
        }

        None
    }

    fn remove_entry(&self, inner: &mut Inner, key: Key, executor: &dyn Executor) {
        let destination = key.1;
        if let Some(removed) = inner.remove(&key) {
            if removed.is_active() {
                self.reselect_active(inner, destination, executor);
            }
        }
    }

    fn reselect_active(&self, inner: &mut Inner, destination: NodeId, executor: &dyn Executor) {
        let entries = inner.entries_for_destination(&destination);
        let old_active = entries.iter().find(|e| e.is_active()).cloned();
        let mut feasible: Vec<_> = entries.into_iter().filter(|e| e.is_feasible()).collect();
        feasible.sort_by_key(|e| e.cost);
        let new_active = feasible.into_iter().next();

        let changed = match (&old_active, &new_active) {
            (Some(a), Some(b)) => !Arc::ptr_eq(a, b),
            (None, Some(_)) | (Some(_), None) => true,
            (None, None) => false,
        };

        if !changed {
            return;
        }

        if let Some(old) = &old_active {
            old.set_active(false);
        }
        match &new_active {
            Some(new) => {
                new.set_active(true);
                self.export.emit(executor, new.clone());
            }
            None => {
                self.retraction.emit(executor, destination);
            }
        }

        let landmark_relevant = new_active.as_ref().map(|e| e.landmark).unwrap_or(false)
            || old_active.as_ref().map(|e| e.landmark).unwrap_or(false);
        if landmark_relevant {
            self.recompute_local_addresses(inner, executor);
        }
    }

    fn recompute_local_addresses(&self, inner: &mut Inner, executor: &dyn Executor) {
        let list = if self.is_landmark.load(Ordering::Relaxed) {
            vec![LandmarkAddress::landmark(self.local_id)]
        } else {
            let mut landmarks: Vec<EntryRef> = inner
                .primary
                .values()
                .filter(|e| e.is_active() && e.landmark)
                .cloned()
                .collect();
            landmarks.sort_by_key(|e| e.cost);
            landmarks.truncate(3);
            landmarks
                .into_iter()
                .map(|e| LandmarkAddress::with_path(e.destination, e.reverse_path.clone()))
                .collect()
        };

        if inner.local_addresses != list {
            inner.local_addresses = list.clone();
            self.address_changed.emit(executor, list);
        }
    }

    pub fn retract_destination(&self, destination: NodeId, executor: &dyn Executor) {
        let guard = self.inner.lock();
        let mut inner = guard.borrow_mut();
        let vports = inner.by_destination.remove(&destination).unwrap_or_default();
        let mut had_active = false;
        for vport in vports {
            if let Some(e) = inner.primary.remove(&(vport, destination)) {
                if let Some(list) = inner.by_vport.get_mut(&vport) {
                    list.retain(|d| d != &destination);
                }
                if e.is_active() {
                    had_active = true;
                }
            }
        }
        inner.originators.remove(&destination);
        if had_active {
            self.retraction.emit(executor, destination);
        }
    }

    pub fn retract_vport(&self, vport: Vport, destination: Option<NodeId>, executor: &dyn Executor) {
        let guard = self.inner.lock();
        let mut inner = guard.borrow_mut();
        let destinations = match destination {
            Some(d) => vec![d],
            None => inner.by_vport.get(&vport).cloned().unwrap_or_default(),
        };
        let mut affected = Vec::new();
        for d in destinations {
            if let Some(removed) = inner.remove(&(vport, d)) {
                if removed.is_active() {
                    affected.push(d);
                }
            }
        }
        for d in affected {
            self.reselect_active(&mut inner, d, executor);
        }
    }

    pub fn get_active_route(&self, destination: &NodeId) -> Option<Vport> {
        let guard = self.inner.lock();
        let inner = guard.borrow();
        inner
            .entries_for_destination(destination)
            .into_iter()
            .find(|e| e.is_active())
            .map(|e| e.origin_vport())
    }

    /// Among active entries whose destination shares `prefix_bits` with
    /// `destination`, returns the one with fewest hops.
    pub fn get_sloppy_group_relay(&self, destination: &NodeId, prefix_bits: usize) -> Option<(NodeId, Vport)> {
        let guard = self.inner.lock();
        let inner = guard.borrow();
        inner
            .primary
            .values()
            .filter(|e| e.is_active() && e.destination.matches_prefix(destination, prefix_bits))
            .min_by_key(|e| e.cost)
            .map(|e| (e.destination, e.origin_vport()))
    }

    /// All currently-active entries, used to refresh a single peer with
    /// every route it should know about (spec §4.H `full_update`).
    pub fn active_entries(&self) -> Vec<EntryRef> {
        let guard = self.inner.lock();
        let inner = guard.borrow();
        inner.primary.values().filter(|e| e.is_active()).cloned().collect()
    }

    /// Active entries suitable for a `full_update` towards `exclude_vport`:
    /// everything this node would otherwise re-export, minus whatever was
    /// learned from that peer's own link (split-horizon).
    pub fn active_entries_excluding_origin(&self, exclude_vport: Vport) -> Vec<EntryRef> {
        let guard = self.inner.lock();
        let inner = guard.borrow();
        inner
            .primary
            .values()
            .filter(|e| e.is_active() && e.origin_vport() != exclude_vport)
            .cloned()
            .collect()
    }

    pub fn set_landmark(&self, landmark: bool, executor: &dyn Executor) {
        self.is_landmark.store(landmark, Ordering::Relaxed);
        let guard = self.inner.lock();
        let mut inner = guard.borrow_mut();
        self.recompute_local_addresses(&mut inner, executor);
    }

    pub fn is_landmark(&self) -> bool {
        self.is_landmark.load(Ordering::Relaxed)
    }

    pub fn get_local_addresses(&self) -> LandmarkAddressList {
        let guard = self.inner.lock();
        guard.borrow().local_addresses.clone()
    }

    /// Per-entry expiry sweep (spec §4.E, `neighbor_expiry_secs`): a route
    /// that has not been refreshed by a re-announcement within the expiry
    /// window is treated as if its neighbor had gone silent, same as an
    /// explicit retraction. Call periodically from the router's
    /// maintenance timer.
    pub fn expire(&self, now: Instant, executor: &dyn Executor) {
        let ttl = Duration::from_secs(self.config.neighbor_expiry_secs);
        let guard = self.inner.lock();
        let mut inner = guard.borrow_mut();
        let expired: Vec<Key> = inner
            .primary
            .iter()
            .filter(|(_, e)| now.duration_since(e.last_update()) >= ttl)
            .map(|(k, _)| *k)
            .collect();
        let mut affected = HashSet::new();
        for key in expired {
            let destination = key.1;
            if let Some(removed) = inner.remove(&key) {
                if removed.is_active() {
                    affected.insert(destination);
                }
            }
        }
        for destination in affected {
            self.reselect_active(&mut inner, destination, executor);
        }
        let stale_after = Duration::from_secs(self.config.origin_expiry_secs);
        inner
            .originators
            .retain(|_, o| now.duration_since(o.last_update()) < stale_after);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::rng::new_seeded;
    use crate::time::ManualExecutor;

    fn key(seed: u64) -> (PeerPublicKey, NodeId) {
        let mut rng = new_seeded(seed);
        let pk = crate::identity::PeerPrivateKey::generate(&mut rng).public_key();
        let id = pk.node_id();
        (pk, id)
    }

    fn sa(seed: u64) -> SigningPublicKey {
        let mut rng = new_seeded(seed);
        crate::identity::SigningSecretKey::generate(&mut rng).public_key()
    }

    fn announcement(dest: NodeId, pk: PeerPublicKey, forward: Vec<Vport>, seqno: u16, landmark: bool) -> Announcement {
        Announcement {
            destination: dest,
            public_key: pk,
            forward_path: forward,
            reverse_path: RoutingPath::new(),
            delegations: vec![],
            sa_key: sa(99),
            landmark,
            seqno,
        }
    }

    #[test]
    fn import_sets_active_route_for_new_destination() {
        let table = RoutingTable::new(NodeId::default(), RouterConfig::default());
        table.set_network_size(50);
        let exec = ManualExecutor::new();
        let (pk, dest) = key(1);
        let changed = table.import(announcement(dest, pk, vec![1], 1, false), &exec);
        assert!(changed);
        assert_eq!(table.get_active_route(&dest), Some(1));
    }

    #[test]
    fn import_rejects_local_destination() {
        let table = RoutingTable::new(NodeId::default(), RouterConfig::default());
        let exec = ManualExecutor::new();
        let (pk, _) = key(1);
        let changed = table.import(announcement(NodeId::default(), pk, vec![1], 1, false), &exec);
        assert!(!changed);
    }

    #[test]
    fn reimporting_identical_announcement_is_a_no_op() {
        let table = RoutingTable::new(NodeId::default(), RouterConfig::default());
        table.set_network_size(50);
        let exec = ManualExecutor::new();
        let (pk, dest) = key(2);
        assert!(table.import(announcement(dest, pk, vec![1], 1, false), &exec));
        assert!(!table.import(announcement(dest, pk, vec![1], 1, false), &exec));
    }

    #[test]
    fn lower_cost_route_becomes_active() {
        let table = RoutingTable::new(NodeId::default(), RouterConfig::default());
        table.set_network_size(50);
        let exec = ManualExecutor::new();
        let (pk, dest) = key(3);
        table.import(announcement(dest, pk.clone(), vec![1, 2], 1, false), &exec);
        assert_eq!(table.get_active_route(&dest), Some(1));
        table.import(announcement(dest, pk, vec![9], 2, false), &exec);
        assert_eq!(table.get_active_route(&dest), Some(9));
    }

    #[test]
    fn retract_destination_clears_active_route() {
        let table = RoutingTable::new(NodeId::default(), RouterConfig::default());
        table.set_network_size(50);
        let exec = ManualExecutor::new();
        let (pk, dest) = key(4);
        table.import(announcement(dest, pk, vec![1], 1, false), &exec);
        table.retract_destination(dest, &exec);
        assert_eq!(table.get_active_route(&dest), None);
    }

    #[test]
    fn landmark_entries_shape_local_addresses() {
        let table = RoutingTable::new(NodeId::default(), RouterConfig::default());
        table.set_network_size(50);
        let exec = ManualExecutor::new();
        let (pk, dest) = key(5);
        let mut path = RoutingPath::new();
        path.push_back(7);
        let ann = Announcement {
            destination: dest,
            public_key: pk,
            forward_path: vec![1],
            reverse_path: path,
            delegations: vec![],
            sa_key: sa(1),
            landmark: true,
            seqno: 1,
        };
        table.import(ann, &exec);
        let addrs = table.get_local_addresses();
        assert_eq!(addrs.len(), 1);
        assert_eq!(addrs[0].landmark_id(), dest);
    }

    #[test]
    fn being_a_landmark_yields_the_single_self_address() {
        let local = NodeId::from_bytes(&[1u8; 20]).unwrap();
        let table = RoutingTable::new(local, RouterConfig::default());
        let exec = ManualExecutor::new();
        table.set_landmark(true, &exec);
        let addrs = table.get_local_addresses();
        assert_eq!(addrs, vec![LandmarkAddress::landmark(local)]);
    }

    #[test]
    fn retract_vport_reselects_remaining_route() {
        let table = RoutingTable::new(NodeId::default(), RouterConfig::default());
        table.set_network_size(50);
        let exec = ManualExecutor::new();
        let (pk, dest) = key(6);
        table.import(announcement(dest, pk.clone(), vec![1], 1, false), &exec);
        table.import(
            Announcement {
                destination: dest,
                public_key: pk,
                forward_path: vec![2, 3],
                reverse_path: RoutingPath::new(),
                delegations: vec![],
                sa_key: sa(2),
                landmark: false,
                seqno: 1,
            },
            &exec,
        );
        assert_eq!(table.get_active_route(&dest), Some(1));
        table.retract_vport(1, None, &exec);
        assert_eq!(table.get_active_route(&dest), Some(2));
    }

    #[test]
    fn expire_drops_stale_entries_and_reselects() {
        let mut cfg = RouterConfig::default();
        cfg.neighbor_expiry_secs = 60;
        let table = RoutingTable::new(NodeId::default(), cfg);
        table.set_network_size(50);
        let exec = ManualExecutor::new();
        let (pk, dest) = key(7);
        table.import(announcement(dest, pk, vec![1], 1, false), &exec);
        assert_eq!(table.get_active_route(&dest), Some(1));

        let far_future = Instant::now() + std::time::Duration::from_secs(120);
        table.expire(far_future, &exec);
        assert_eq!(table.get_active_route(&dest), None);
    }

    #[test]
    fn expire_leaves_fresh_entries_in_place() {
        let table = RoutingTable::new(NodeId::default(), RouterConfig::default());
        table.set_network_size(50);
        let exec = ManualExecutor::new();
        let (pk, dest) = key(8);
        table.import(announcement(dest, pk, vec![1], 1, false), &exec);
        table.expire(Instant::now(), &exec);
        assert_eq!(table.get_active_route(&dest), Some(1));
    }
}
