// Copyright 2024 UniSphere Overlay Project.
//
// This library is free software: you can redistribute it and/or modify
// it under the terms of the GNU General Public License as published by
// the Free Software Foundation, either version 3 of the License, or
// (at your option) any later version.

//! Component H: the compact router (spec §4.H), grounded on
//! `original_source/src/social/social_provider.h`/`.cpp`. Ties the social
//! identity, routing table, name database and sloppy-group manager
//! together: self-announcement, announce verification and import,
//! path re-export, message forwarding, and landmark-status maintenance.

pub mod rpc;
pub mod wire;

use crate::address::{LandmarkAddress, RoutingPath, Vport};
use crate::config::RouterConfig;
use crate::error::{Error, ProtocolError};
use crate::identity::{NodeId, PeerPrivateKey, PeerPublicKey, SigningPublicKey};
use crate::ndb::NameDatabase;
use crate::rib::{Announcement, EntryRef, RoutingTable};
use crate::rng::MainRng;
use crate::signal::SubscriptionId;
use crate::sloppy_group::{self, SloppyGroupManager, SloppyPeer};
use crate::social::SocialIdentity;
use crate::time::Executor;
use crate::transport::Transport;
use bytes::Bytes;
use parking_lot::{Mutex, ReentrantMutex};
use std::cell::RefCell;
use std::collections::HashMap;
use std::sync::atomic::{AtomicBool, AtomicU16, Ordering};
use std::sync::{Arc, Weak};
use std::time::{Duration, Instant};
use tracing::warn;
use wire::{tag, AggregatePathAnnounce, InterplexHello, PathAnnounce, RoutedMessage, SocialRetract};

/// How long a neighbor's path announces sit in the aggregation buffer
/// before being flushed as one batch (spec §4.H aggregation buffer).
pub const AGGREGATION_INTERVAL: Duration = Duration::from_secs(5);
/// Minimum spacing between proactive per-peer SA refreshes.
pub const SA_REFRESH_MIN_INTERVAL: Duration = Duration::from_secs(30);
/// Spacing used once a link has been stable for a while, to cut refresh
/// chatter on quiescent links.
pub const SA_REFRESH_MAX_INTERVAL: Duration = Duration::from_secs(300);

struct AggregationBuffers {
    /// Per-neighbor, per-origin-pubkey pending announce. A second
    /// announce for the same origin before the buffer flushes overwrites
    /// the first rather than queuing both (spec §4.H: "per-origin-pubkey
    /// overwrite").
    pending: HashMap<NodeId, HashMap<[u8; 32], PathAnnounce>>,
    armed: std::collections::HashSet<NodeId>,
}

struct RefreshTimestamps {
    last_refresh: HashMap<NodeId, Instant>,
}

/// The compact router: owns the social identity, routing table, name
/// database and sloppy-group manager for one local node, and drives the
/// protocol between them.
pub struct CompactRouter {
    local_id: NodeId,
    local_key: PeerPrivateKey,
    config: RouterConfig,
    pub identity: Arc<SocialIdentity>,
    pub rib: Arc<RoutingTable>,
    pub ndb: Arc<NameDatabase>,
    pub sloppy: Arc<SloppyGroupManager>,
    transport: Arc<dyn Transport>,
    executor: Arc<dyn Executor>,
    rng: Mutex<MainRng>,
    seqno: AtomicU16,
    is_landmark: AtomicBool,
    aggregation: ReentrantMutex<RefCell<AggregationBuffers>>,
    refresh: ReentrantMutex<RefCell<RefreshTimestamps>>,
    signal_subscriptions: Mutex<Vec<SubscriptionId>>,
    rpc_client: Mutex<Option<Arc<dyn rpc::RpcClient>>>,
}

impl CompactRouter {
    pub fn new(
        local_key: PeerPrivateKey,
        config: RouterConfig,
        transport: Arc<dyn Transport>,
        executor: Arc<dyn Executor>,
        rng: MainRng,
    ) -> Arc<Self> {
        let local_id = local_key.public_key().node_id();
        let router = Arc::new(Self {
            local_id,
            local_key,
            config: config.clone(),
            identity: Arc::new(SocialIdentity::new(local_id)),
            rib: Arc::new(RoutingTable::new(local_id, config.clone())),
            ndb: Arc::new(NameDatabase::new(config.clone())),
            sloppy: Arc::new(SloppyGroupManager::new(local_id, config)),
            transport,
            executor,
            rng: Mutex::new(rng),
            seqno: AtomicU16::new(0),
            is_landmark: AtomicBool::new(false),
            aggregation: ReentrantMutex::new(RefCell::new(AggregationBuffers {
                pending: HashMap::new(),
                armed: std::collections::HashSet::new(),
            })),
            refresh: ReentrantMutex::new(RefCell::new(RefreshTimestamps {
                last_refresh: HashMap::new(),
            })),
            signal_subscriptions: Mutex::new(Vec::new()),
            rpc_client: Mutex::new(None),
        });
        router.wire_signals();
        router
    }

    pub fn local_id(&self) -> NodeId {
        self.local_id
    }

    pub fn is_landmark(&self) -> bool {
        self.is_landmark.load(Ordering::Relaxed)
    }

    /// Wires in the embedder's RPC client, forwarding it to the name
    /// database as well: used for landmark address publication
    /// ([`Self::publish_local_address`]) and sloppy-group-scoped remote
    /// lookups ([`crate::ndb::NameDatabase::remote_lookup_sloppy_group`]).
    /// A router left without one still routes and gossips normally; it
    /// just never publishes to or queries a landmark over RPC.
    pub fn set_rpc_client(&self, client: Arc<dyn rpc::RpcClient>) {
        self.ndb.set_rpc_client(client.clone());
        *self.rpc_client.lock() = Some(client);
    }

    /// Subscribes to the routing table's signals, breaking the ownership
    /// cycle (router -> rib -> signal -> closure -> router) with a `Weak`
    /// reference that upgrades back to the router when the signal fires.
    fn wire_signals(self: &Arc<Self>) {
        let weak: Weak<Self> = Arc::downgrade(self);
        let export_sub = self.rib.export.subscribe(move |entry: &EntryRef| {
            if let Some(router) = weak.upgrade() {
                router.reexport_entry(entry);
            }
        });
        let weak = Arc::downgrade(self);
        let retraction_sub = self.rib.retraction.subscribe(move |destination: &NodeId| {
            if let Some(router) = weak.upgrade() {
                router.broadcast_retraction(*destination);
            }
        });
        let weak = Arc::downgrade(self);
        let address_sub = self.rib.address_changed.subscribe(move |_addrs: &crate::address::LandmarkAddressList| {
            if let Some(router) = weak.upgrade() {
                router.publish_local_address();
            }
        });
        let mut subs = self.signal_subscriptions.lock();
        subs.push(export_sub);
        subs.push(retraction_sub);
        subs.push(address_sub);
    }

    /// Starts the router's periodic maintenance: self-announcement,
    /// sloppy-group full updates, and expiry sweeps.
    pub fn start(self: &Arc<Self>) {
        self.schedule_self_announce();
        self.schedule_sloppy_group_update();
        self.schedule_maintenance();
    }

    fn schedule_self_announce(self: &Arc<Self>) {
        let weak = Arc::downgrade(self);
        let jitter = self.jittered(self.config.announce_interval_secs);
        self.executor.schedule(
            jitter,
            Box::new(move || {
                if let Some(router) = weak.upgrade() {
                    router.self_announce();
                    router.schedule_self_announce();
                }
            }),
        );
    }

    fn schedule_sloppy_group_update(self: &Arc<Self>) {
        let weak = Arc::downgrade(self);
        let jitter = self.jittered(sloppy_group::FULL_UPDATE_INTERVAL.as_secs());
        self.executor.schedule(
            jitter,
            Box::new(move || {
                if let Some(router) = weak.upgrade() {
                    router.sloppy_group_full_update();
                    router.schedule_sloppy_group_update();
                }
            }),
        );
    }

    fn schedule_maintenance(self: &Arc<Self>) {
        let weak = Arc::downgrade(self);
        self.executor.schedule(
            Duration::from_secs(self.config.neighbor_expiry_secs),
            Box::new(move || {
                if let Some(router) = weak.upgrade() {
                    router.run_maintenance();
                    router.schedule_maintenance();
                }
            }),
        );
    }

    fn run_maintenance(&self) {
        let now = Instant::now();
        self.rib.expire(now, self.executor.as_ref());
        self.ndb.expire(now);
        self.sloppy.expire(now);
    }

    fn jittered(&self, base_secs: u64) -> Duration {
        let mut rng = self.rng.lock();
        let frac = crate::rng::next_unit_f64(&mut rng);
        Duration::from_secs_f64(base_secs as f64 * (0.9 + 0.2 * frac))
    }

    /// Decides whether this node should act as a landmark: `sqrt(ln n / n)`
    /// probability, monotonic once true (a landmark never un-announces
    /// itself just because the coin flip would now go the other way).
    fn decide_landmark(&self) -> bool {
        if let Some(forced) = self.config.force_landmark {
            return forced;
        }
        if self.is_landmark.load(Ordering::Relaxed) {
            return true;
        }
        let n = self.rib.network_size().max(1) as f64;
        let probability = if n <= 1.0 { 1.0 } else { (n.ln() / n).sqrt() };
        let draw = crate::rng::next_unit_f64(&mut self.rng.lock());
        draw < probability
    }

    /// Self-announcement (spec §4.H, 4 steps): decide landmark status,
    /// bump the sequence number, build the base claim, and queue one
    /// [`PathAnnounce`] per peer link signed with that link's private SA.
    /// Each peer also receives a [`Self::full_update`] of every other
    /// active route this node currently holds, so a peer that missed
    /// earlier incremental exports (a fresh link, or one that dropped an
    /// export) re-converges within one announce cycle rather than waiting
    /// on the next incremental change per destination.
    pub fn self_announce(self: &Arc<Self>) {
        let landmark = self.decide_landmark();
        self.is_landmark.store(landmark, Ordering::Relaxed);
        self.rib.set_landmark(landmark, self.executor.as_ref());
        if landmark {
            self.ndb.register_landmark(self.local_id);
        }

        let seqno = self.seqno.fetch_add(1, Ordering::Relaxed);
        let peers = self.identity.peer_ids();
        for peer in peers {
            let sa_secret = {
                let mut rng = self.rng.lock();
                match self.identity.create_private_sa(&peer, &mut rng) {
                    Some(sa) => sa,
                    None => continue,
                }
            };
            let sa_public = sa_secret.public_key();
            let unsigned = UnsignedAnnounce {
                destination: self.local_id,
                public_key: self.local_key.public_key(),
                landmark,
                seqno,
                hop_count: 0,
                reverse_path: RoutingPath::new(),
                delegations: Vec::new(),
            };
            let signature = sa_secret.sign(&unsigned.canonical_bytes());
            let announce = unsigned.into_signed(sa_public.to_bytes(), signature);
            self.buffer_announce(peer, announce);
            self.send_sa_create(peer, sa_public);
            self.full_update(peer);
        }
    }

    /// Re-exports every active routing-table entry this node did not
    /// learn from `peer` itself, same split-horizon rule as
    /// [`Self::reexport_entry`] (spec §4.E `full_update`), grounded on
    /// `original_source/src/social/routing_table.cpp`'s
    /// `RoutingTable::fullUpdate`.
    fn full_update(self: &Arc<Self>, peer: NodeId) {
        let peer_vport = self.rib.get_vport_for_neighbor(peer);
        for entry in self.rib.active_entries_excluding_origin(peer_vport) {
            self.export_entry_to(peer, &entry);
        }
    }

    fn send_sa_create(&self, peer: NodeId, sa_public: SigningPublicKey) {
        let msg = wire::SocialSaCreate { sa_key: sa_public.to_bytes() };
        self.send(peer, tag::SOCIAL_SA_CREATE, &msg);
    }

    /// Buffers one neighbor's announce, overwriting any still-pending
    /// announce from the same origin, and arms the 5-second flush timer
    /// the first time this neighbor's buffer goes from empty to non-empty.
    fn buffer_announce(self: &Arc<Self>, peer: NodeId, announce: PathAnnounce) {
        let guard = self.aggregation.lock();
        let mut inner = guard.borrow_mut();
        let origin = announce.public_key.sign_subkey;
        let entry = inner.pending.entry(peer).or_default();
        entry.insert(origin, announce);
        let needs_arm = !inner.armed.contains(&peer);
        if needs_arm {
            inner.armed.insert(peer);
        }
        drop(inner);
        if needs_arm {
            let weak = Arc::downgrade(self);
            self.executor.schedule(
                AGGREGATION_INTERVAL,
                Box::new(move || {
                    if let Some(router) = weak.upgrade() {
                        router.flush_aggregation(peer);
                    }
                }),
            );
        }
    }

    fn flush_aggregation(&self, peer: NodeId) {
        let batch = {
            let guard = self.aggregation.lock();
            let mut inner = guard.borrow_mut();
            inner.armed.remove(&peer);
            inner
                .pending
                .remove(&peer)
                .map(|m| m.into_values().collect::<Vec<_>>())
                .unwrap_or_default()
        };
        if batch.is_empty() {
            return;
        }
        let msg = AggregatePathAnnounce { announces: batch };
        self.send(peer, tag::SOCIAL_ANNOUNCE, &msg);
    }

    /// Announce verification (spec §4.H, 4 steps): the signature over the
    /// canonical announce bytes must check out, non-landmark claims must
    /// carry a non-empty delegation chain, and no delegation entry may
    /// name an SA we ourselves hold on any link (that would mean the path
    /// looped back through us). Whether the sender still holds `sa_key` as
    /// a peer SA is checked by the caller, which reacts to a stale key
    /// differently from a bad signature (spec §8 scenario 5, "SA churn").
    fn verify_announce(&self, announce: &PathAnnounce, sa_key: &SigningPublicKey) -> Result<(), Error> {
        let unsigned = UnsignedAnnounce {
            destination: announce.destination,
            public_key: announce.public_key,
            landmark: announce.landmark,
            seqno: announce.seqno,
            hop_count: announce.hop_count,
            reverse_path: announce.reverse_path.clone(),
            delegations: announce.delegations.clone(),
        };
        sa_key
            .verify(&unsigned.canonical_bytes(), &announce.signature)
            .map_err(|_| ProtocolError::FailedSignature)?;

        if !announce.landmark && announce.delegations.is_empty() && announce.hop_count > 0 {
            return Err(ProtocolError::EmptyDelegationChain.into());
        }

        for delegation in &announce.delegations {
            if delegation.len() == 32 {
                let mut bytes = [0u8; 32];
                bytes.copy_from_slice(delegation);
                if let Ok(key) = SigningPublicKey::from_bytes(&bytes) {
                    if self.identity.any_peer_has_peer_sa(&key) {
                        return Err(ProtocolError::RoutingLoop.into());
                    }
                }
            }
        }
        Ok(())
    }

    /// Handles an inbound `Social_Announce` aggregate: verifies and
    /// imports every entry independently, so one bad entry in a batch
    /// does not sink its siblings. An announce signed with an SA we no
    /// longer recognize as the sender's is not a verification failure to
    /// log and drop silently: we tell the sender with `SA_Invalid` so it
    /// stops resending under a key we will never accept again.
    pub fn handle_aggregate(&self, sender: NodeId, aggregate: AggregatePathAnnounce) {
        let sender_vport = self.rib.get_vport_for_neighbor(sender);
        for announce in aggregate.announces {
            let sa_key = match SigningPublicKey::from_bytes(&announce.sa_key) {
                Ok(key) => key,
                Err(_) => {
                    warn!("dropping announce from {}: malformed SA key", sender);
                    continue;
                }
            };
            if !self.identity.has_peer_sa(&sender, &sa_key) {
                warn!("dropping announce from {}: stale SA key", sender);
                self.send(
                    sender,
                    tag::SOCIAL_SA_INVALID,
                    &wire::SocialSaInvalid { sa_key: announce.sa_key },
                );
                continue;
            }
            if let Err(e) = self.verify_announce(&announce, &sa_key) {
                warn!("dropping announce from {}: {}", sender, e);
                continue;
            }
            let mut delegations = announce.delegations.clone();
            delegations.push(announce.sa_key.to_vec());
            let ann = Announcement {
                destination: announce.destination,
                public_key: announce.public_key,
                forward_path: vec![sender_vport; (announce.hop_count as usize).max(1)],
                reverse_path: announce.reverse_path,
                delegations,
                sa_key,
                landmark: announce.landmark,
                seqno: announce.seqno,
            };
            if announce.landmark {
                self.ndb.register_landmark(ann.destination);
            }
            self.rib.import(ann, self.executor.as_ref());
        }
    }

    pub fn handle_retract(&self, _sender: NodeId, retract: SocialRetract) {
        self.ndb.unregister_landmark(&retract.destination);
        self.rib.retract_destination(retract.destination, self.executor.as_ref());
    }

    pub fn handle_hello(&self, hello: InterplexHello) -> Vport {
        self.rib.get_vport_for_neighbor(hello.sender)
    }

    /// A peer announces a freshly minted signing key for its link to us;
    /// remember it so its future announces verify.
    pub fn handle_sa_create(&self, sender: NodeId, msg: wire::SocialSaCreate) {
        if let Ok(key) = SigningPublicKey::from_bytes(&msg.sa_key) {
            self.identity.add_peer_sa(&sender, key);
        }
    }

    /// A peer tells us it no longer honors one of our private SAs for its
    /// link; drop it so we stop signing with a key that will only get
    /// rejected.
    pub fn handle_sa_invalid(&self, sender: NodeId, msg: wire::SocialSaInvalid) {
        if let Ok(key) = SigningPublicKey::from_bytes(&msg.sa_key) {
            self.identity.remove_private_sa(&sender, &key);
        }
    }

    /// A peer requests a link reset: mint a fresh private SA for it and
    /// announce the public half, same as the per-peer step of
    /// [`Self::self_announce`].
    pub fn handle_sa_flush(&self, sender: NodeId, _msg: wire::SocialSaFlush) {
        let sa_secret = {
            let mut rng = self.rng.lock();
            match self.identity.create_private_sa(&sender, &mut rng) {
                Some(sa) => sa,
                None => return,
            }
        };
        self.send_sa_create(sender, sa_secret.public_key());
    }

    /// Path re-export (spec §4.H, 2 steps): when the routing table selects
    /// a new active entry, re-announce it to every peer except the one it
    /// came from, with hop count incremented and our vport towards that
    /// peer prepended to the reverse path.
    fn reexport_entry(self: &Arc<Self>, entry: &EntryRef) {
        let origin_vport = entry.origin_vport();
        let origin_peer = self.rib.get_neighbor_for_vport(origin_vport);
        let peers = self.identity.peer_ids();
        for peer in peers {
            if Some(peer) == origin_peer {
                continue;
            }
            self.export_entry_to(peer, entry);
        }
    }

    /// Builds and buffers the [`PathAnnounce`] that re-exports `entry`
    /// towards `peer`: our vport to `peer` is prepended to the reverse
    /// path, the hop count grows by one, and our own SA for that link
    /// replaces the last delegation entry's author. Shared by
    /// [`Self::reexport_entry`] (incremental, triggered by the routing
    /// table's `export` signal) and [`Self::full_update`] (bulk, one
    /// destination at a time).
    fn export_entry_to(self: &Arc<Self>, peer: NodeId, entry: &EntryRef) {
        let peer_vport = self.rib.get_vport_for_neighbor(peer);
        let mut reverse_path = entry.reverse_path.clone();
        reverse_path.push_front(peer_vport);

        let sa_secret = {
            let mut rng = self.rng.lock();
            match self.identity.create_private_sa(&peer, &mut rng) {
                Some(sa) => sa,
                None => return,
            }
        };
        let mut delegations = entry.delegations.clone();
        delegations.push(entry.sa_key.to_bytes().to_vec());
        let unsigned = UnsignedAnnounce {
            destination: entry.destination,
            public_key: entry.public_key,
            landmark: entry.landmark,
            seqno: entry.seqno,
            hop_count: entry.cost + 1,
            reverse_path,
            delegations,
        };
        let signature = sa_secret.sign(&unsigned.canonical_bytes());
        let announce = unsigned.into_signed(sa_secret.public_key().to_bytes(), signature);
        self.buffer_announce(peer, announce);
    }

    fn broadcast_retraction(&self, destination: NodeId) {
        let msg = SocialRetract { destination };
        for peer in self.identity.peer_ids() {
            self.send(peer, tag::SOCIAL_RETRACT, &msg);
        }
    }

    /// Publishes this node's current address to its landmark caches (spec
    /// §4.F), grounded on
    /// `original_source/src/social/name_database.cpp`'s
    /// `publishLocalAddress`, which both stores the address locally
    /// (tagged `SloppyGroup`, so it's visible to this node's own sloppy-
    /// group gossip) and sends a `PublishAddress` RPC to each landmark
    /// cache target. Only a non-landmark node needs to publish: a
    /// landmark is itself the authority other nodes look it up from.
    fn publish_local_address(&self) {
        if self.is_landmark() {
            return;
        }
        let addresses = self.rib.get_local_addresses();
        let seqno = self.seqno.load(Ordering::Relaxed);
        self.ndb.store(crate::ndb::NameRecord::new(
            self.local_id,
            crate::ndb::RecordType::SloppyGroup,
            addresses.clone(),
            seqno,
            self.local_id,
            Instant::now(),
            None,
        ));

        let client = match self.rpc_client.lock().clone() {
            Some(client) => client,
            None => return,
        };
        for landmark in self.ndb.get_landmark_caches(&self.local_id, 0) {
            let request = rpc::RpcRequest::PublishAddress {
                node_id: self.local_id,
                addresses: addresses.clone(),
                seqno,
            };
            if let Err(e) = client.call(landmark, request) {
                warn!("publish to landmark {}: {}", landmark, e);
            }
        }
    }

    /// Periodic sloppy-group resync (spec §4.G step 1,
    /// `FULL_UPDATE_INTERVAL`): gossips this node's own address to its
    /// current sloppy-group relay as a `NameAnnounce`, with hop-distance
    /// tracking turned on so the receiving end's `messageDelivery`-
    /// equivalent check (spec design note on `track_hop_distance`)
    /// accepts it. Grounded on
    /// `original_source/src/social/sloppy_group.cpp`'s
    /// `announceFullRecords`/`nibExportRecord`.
    pub fn sloppy_group_full_update(self: &Arc<Self>) {
        let prefix = self.sloppy.prefix_len();
        let addresses = self.rib.get_local_addresses();
        let seqno = self.seqno.load(Ordering::Relaxed);
        self.sloppy.observe_local_peer(SloppyPeer {
            node_id: self.local_id,
            addresses: addresses.clone(),
            seqno,
            last_update: Instant::now(),
        });

        if let Some((relay, _)) = self.rib.get_sloppy_group_relay(&self.local_id, prefix) {
            if relay != self.local_id {
                self.send_name_announce(
                    relay,
                    vec![wire::NameAnnounce {
                        origin_id: self.local_id,
                        seqno,
                        addresses,
                    }],
                );
            }
        }
    }

    /// Wraps `announces` in an [`wire::AggregateNameAnnounce`] and sends it
    /// through [`Self::route`] addressed to `relay`'s sloppy-group
    /// component, tracking hop distance from the start (spec design note:
    /// scenarios relying on hop distance require the originating send to
    /// opt in).
    fn send_name_announce(self: &Arc<Self>, relay: NodeId, announces: Vec<wire::NameAnnounce>) {
        let payload = match bincode::serialize(&wire::AggregateNameAnnounce { announces }) {
            Ok(bytes) => bytes,
            Err(e) => {
                warn!("failed to serialize name announce: {}", e);
                return;
            }
        };
        let msg = RoutedMessage {
            destination: LandmarkAddress::landmark(relay),
            destination_node: relay,
            destination_comp: wire::component::SLOPPY_GROUP,
            source: LandmarkAddress::landmark(self.local_id),
            source_node: self.local_id,
            source_comp: wire::component::SLOPPY_GROUP,
            hop_count: self.config.default_message_hop_limit,
            delivery_mode: false,
            payload_type: wire::payload_type::NAME_ANNOUNCE,
            payload,
            hop_distance: Some(0),
        };
        self.route_and_send(msg);
    }

    /// Routes `msg` and carries out the resulting decision: forwards over
    /// the transport to the next hop's peer, or dispatches it to the
    /// local handler for its component/payload type. Shared by code
    /// originating a message locally (sloppy-group gossip) and
    /// [`Self::handle_routed`], the inbound entry point for a received
    /// `Social_Routed` message.
    fn route_and_send(self: &Arc<Self>, msg: RoutedMessage) {
        match self.route(msg) {
            RouteDecision::Forward(vport, msg) => {
                if let Some(next_peer) = self.rib.get_neighbor_for_vport(vport) {
                    self.send(next_peer, tag::SOCIAL_ROUTED, &msg);
                }
            }
            RouteDecision::DeliverLocally(msg) => self.dispatch_local_payload(msg),
            RouteDecision::Dropped | RouteDecision::NoRoute => {}
        }
    }

    /// Entry point for an inbound `Social_Routed` message (spec §6.1):
    /// re-enters the same routing decision an originating send would have
    /// made, so a message can be relayed onward just as easily as one
    /// this node itself originated.
    pub fn handle_routed(self: &Arc<Self>, msg: RoutedMessage) {
        self.route_and_send(msg);
    }

    fn dispatch_local_payload(&self, msg: RoutedMessage) {
        if msg.destination_comp == wire::component::SLOPPY_GROUP
            && msg.payload_type == wire::payload_type::NAME_ANNOUNCE
        {
            self.handle_name_announce(msg);
        }
    }

    /// Sloppy-group gossip delivery (spec §4.G), grounded on
    /// `original_source/src/social/sloppy_group.cpp`'s `messageDelivery`:
    /// drops an aggregate that didn't originate inside the local group
    /// ([`ProtocolError::ForeignAggregate`]) or that never tracked hop
    /// distance ([`ProtocolError::MissingHopDistance`]), stores every
    /// contained record that itself shares the group prefix, and admits
    /// the sender into the reverse view so this node becomes a relay
    /// target for the group's future gossip.
    fn handle_name_announce(&self, msg: RoutedMessage) {
        if !self.sloppy.shares_group(&msg.source_node) {
            warn!(
                "dropping sloppy-group aggregate from {}: {}",
                msg.source_node,
                ProtocolError::ForeignAggregate
            );
            return;
        }
        if msg.hop_distance.is_none() {
            warn!(
                "dropping sloppy-group aggregate from {}: {}",
                msg.source_node,
                ProtocolError::MissingHopDistance
            );
            return;
        }
        let aggregate: wire::AggregateNameAnnounce = match bincode::deserialize(&msg.payload) {
            Ok(a) => a,
            Err(e) => {
                warn!("dropping malformed sloppy-group aggregate from {}: {}", msg.source_node, e);
                return;
            }
        };
        let prefix = self.sloppy.prefix_len();
        let now = Instant::now();
        for announce in aggregate.announces {
            if !self.local_id.matches_prefix(&announce.origin_id, prefix) {
                continue;
            }
            self.ndb.store(crate::ndb::NameRecord::new(
                announce.origin_id,
                crate::ndb::RecordType::SloppyGroup,
                announce.addresses,
                announce.seqno,
                announce.origin_id,
                now,
                Some(msg.source_node),
            ));
        }
        self.sloppy.observe_reverse_peer(SloppyPeer {
            node_id: msg.source_node,
            addresses: vec![msg.source.clone()],
            seqno: 0,
            last_update: now,
        });
    }

    /// The message forwarding decision (spec §4.H `route`): a direct RIB
    /// hit on the destination node wins; otherwise follow the embedded
    /// landmark-relative address; failing that, fall back to a cached
    /// name-database address, and finally to a sloppy-group relay. A
    /// message delivered locally has its source address opportunistically
    /// cached (spec pseudocode: "cache msg.source_address into NDB as
    /// Cache type (if non-null)"), so a reply can route back without its
    /// own lookup.
    pub fn route(&self, mut msg: RoutedMessage) -> RouteDecision {
        if !msg.decrement_hop() {
            return RouteDecision::Dropped;
        }

        if msg.destination_node == self.local_id {
            if !msg.source.is_null() {
                self.ndb.store(crate::ndb::NameRecord::new(
                    msg.source_node,
                    crate::ndb::RecordType::Cache,
                    vec![msg.source.clone()],
                    0,
                    msg.source_node,
                    Instant::now(),
                    None,
                ));
            }
            return RouteDecision::DeliverLocally(msg);
        }

        if let Some(vport) = self.rib.get_active_route(&msg.destination_node) {
            return RouteDecision::Forward(vport, msg);
        }

        if msg.destination.size() > 0 {
            let next_vport = *msg.destination.path().front().expect("size > 0");
            msg.shift_destination();
            return RouteDecision::Forward(next_vport, msg);
        }

        if !msg.destination.is_null() {
            if let Some(vport) = self.rib.get_active_route(&msg.destination.landmark_id()) {
                return RouteDecision::Forward(vport, msg);
            }
        }

        if let Some(addresses) = self.ndb.lookup(&msg.destination_node) {
            if let Some(addr) = addresses.into_iter().next() {
                msg.destination = addr;
                if msg.destination.size() > 0 {
                    let next_vport = *msg.destination.path().front().expect("size > 0");
                    msg.shift_destination();
                    return RouteDecision::Forward(next_vport, msg);
                } else if let Some(vport) = self.rib.get_active_route(&msg.destination.landmark_id()) {
                    return RouteDecision::Forward(vport, msg);
                }
            }
        }

        let prefix = self.sloppy.prefix_len();
        if let Some((relay, vport)) = self.rib.get_sloppy_group_relay(&msg.destination_node, prefix) {
            msg.destination = LandmarkAddress::landmark(relay);
            return RouteDecision::Forward(vport, msg);
        }

        RouteDecision::NoRoute
    }

    fn send<T: serde::Serialize>(&self, to: NodeId, tag: u8, msg: &T) {
        match bincode::serialize(msg) {
            Ok(bytes) => self.transport.send(&to, tag, Bytes::from(bytes)),
            Err(e) => warn!("failed to serialize message tag {:#x}: {}", tag, e),
        }
    }

    pub fn rpc(&self, request: rpc::RpcRequest) -> rpc::RpcResult {
        rpc::handle(request, self.is_landmark(), &self.ndb)
    }
}

/// What [`CompactRouter::route`] decided to do with a message.
#[derive(Debug)]
pub enum RouteDecision {
    DeliverLocally(RoutedMessage),
    Forward(Vport, RoutedMessage),
    Dropped,
    NoRoute,
}

/// The fields of a [`PathAnnounce`] that get signed, kept apart from the
/// signature itself so signing and verification share one encoding.
struct UnsignedAnnounce {
    destination: NodeId,
    public_key: PeerPublicKey,
    landmark: bool,
    seqno: u16,
    hop_count: u32,
    reverse_path: RoutingPath,
    delegations: Vec<Vec<u8>>,
}

impl UnsignedAnnounce {
    fn canonical_bytes(&self) -> Vec<u8> {
        bincode::serialize(&(
            &self.destination,
            &self.public_key,
            self.landmark,
            self.seqno,
            self.hop_count,
            &self.reverse_path,
            &self.delegations,
        ))
        .expect("in-memory structures always serialize")
    }

    fn into_signed(self, sa_key: [u8; 32], signature: crate::identity::Signature) -> PathAnnounce {
        PathAnnounce {
            destination: self.destination,
            public_key: self.public_key,
            landmark: self.landmark,
            seqno: self.seqno,
            hop_count: self.hop_count,
            reverse_path: self.reverse_path,
            delegations: self.delegations,
            sa_key,
            signature,
        }
    }
}

#[allow(unused_imports)]
use LandmarkAddress as _LandmarkAddressImportGuard;

#[cfg(test)]
mod tests {
    use super::*;
    use crate::rng::new_seeded;
    use crate::transport::MockTransport;

    fn router(seed: u64) -> Arc<CompactRouter> {
        let mut rng = new_seeded(seed);
        let key = PeerPrivateKey::generate(&mut rng);
        let id = key.public_key().node_id();
        CompactRouter::new(
            key,
            RouterConfig::default(),
            Arc::new(MockTransport::new(id)),
            Arc::new(crate::time::ManualExecutor::new()),
            rng,
        )
    }

    #[test]
    fn fresh_router_is_not_a_landmark_when_forced_off() {
        let mut cfg = RouterConfig::default();
        cfg.force_landmark = Some(false);
        let mut rng = new_seeded(1);
        let key = PeerPrivateKey::generate(&mut rng);
        let r = CompactRouter::new(
            key,
            cfg,
            Arc::new(MockTransport::new(NodeId::default())),
            Arc::new(crate::time::ManualExecutor::new()),
            rng,
        );
        r.self_announce();
        assert!(!r.is_landmark());
    }

    #[test]
    fn forced_landmark_stays_landmark() {
        let mut cfg = RouterConfig::default();
        cfg.force_landmark = Some(true);
        let mut rng = new_seeded(2);
        let key = PeerPrivateKey::generate(&mut rng);
        let r = CompactRouter::new(
            key,
            cfg,
            Arc::new(MockTransport::new(NodeId::default())),
            Arc::new(crate::time::ManualExecutor::new()),
            rng,
        );
        r.self_announce();
        assert!(r.is_landmark());
    }

    /// Builds a minimal [`RoutedMessage`] for a test: no embedded L-R
    /// address, just a destination/source node pair and a hop budget.
    fn routed_message(destination_node: NodeId, source_node: NodeId, hop_count: u8) -> RoutedMessage {
        RoutedMessage {
            destination: LandmarkAddress::default(),
            destination_node,
            destination_comp: wire::component::RPC_ENGINE,
            source: LandmarkAddress::default(),
            source_node,
            source_comp: wire::component::RPC_ENGINE,
            hop_count,
            delivery_mode: false,
            payload_type: 0,
            payload: vec![],
            hop_distance: None,
        }
    }

    #[test]
    fn route_with_no_information_reports_no_route() {
        let r = router(3);
        let msg = routed_message(NodeId::from_bytes(&[9u8; 20]).unwrap(), r.local_id(), 10);
        assert!(matches!(r.route(msg), RouteDecision::NoRoute));
    }

    #[test]
    fn route_to_self_delivers_locally() {
        let r = router(4);
        let msg = routed_message(r.local_id(), r.local_id(), 10);
        assert!(matches!(r.route(msg), RouteDecision::DeliverLocally(_)));
    }

    #[test]
    fn route_to_self_caches_a_non_null_source_address() {
        let r = router(11);
        let origin = NodeId::from_bytes(&[4u8; 20]).unwrap();
        let mut msg = routed_message(r.local_id(), origin, 10);
        msg.source = LandmarkAddress::landmark(origin);
        assert!(matches!(r.route(msg), RouteDecision::DeliverLocally(_)));
        assert!(r.ndb.lookup(&origin).is_some());
    }

    #[test]
    fn zero_hop_limit_is_dropped_rather_than_forwarded() {
        let r = router(5);
        r.rib.set_network_size(50);
        let dest = NodeId::from_bytes(&[1u8; 20]).unwrap();
        let ann = Announcement {
            destination: dest,
            public_key: PeerPrivateKey::generate(&mut new_seeded(6)).public_key(),
            forward_path: vec![1],
            reverse_path: RoutingPath::new(),
            delegations: vec![],
            sa_key: crate::identity::SigningSecretKey::generate(&mut new_seeded(7)).public_key(),
            landmark: false,
            seqno: 1,
        };
        r.rib.import(ann, r.executor.as_ref());
        let msg = routed_message(dest, r.local_id(), 0);
        assert!(matches!(r.route(msg), RouteDecision::Dropped));
    }

    #[test]
    fn rib_hit_forwards_through_the_active_vport() {
        let r = router(8);
        r.rib.set_network_size(50);
        let dest = NodeId::from_bytes(&[2u8; 20]).unwrap();
        let ann = Announcement {
            destination: dest,
            public_key: PeerPrivateKey::generate(&mut new_seeded(9)).public_key(),
            forward_path: vec![3],
            reverse_path: RoutingPath::new(),
            delegations: vec![],
            sa_key: crate::identity::SigningSecretKey::generate(&mut new_seeded(10)).public_key(),
            landmark: false,
            seqno: 1,
        };
        r.rib.import(ann, r.executor.as_ref());
        let msg = routed_message(dest, r.local_id(), 10);
        match r.route(msg) {
            RouteDecision::Forward(vport, _) => assert_eq!(vport, 3),
            other => panic!("expected Forward, got {:?}", other),
        }
    }

    #[test]
    fn name_announce_from_outside_the_group_is_dropped() {
        let r = router(12);
        r.sloppy.set_network_size(10_000);
        // Flips the top bit of our own id: guaranteed to mismatch on any
        // prefix length of at least one bit, unlike a fixed foreign id
        // that might coincidentally share a short prefix with whichever
        // id this seed happens to generate.
        let mut foreign_bytes = *r.local_id().as_bytes();
        foreign_bytes[0] ^= 0x80;
        let foreign = NodeId::from_bytes(&foreign_bytes).unwrap();
        let mut msg = routed_message(r.local_id(), foreign, 10);
        msg.destination_comp = wire::component::SLOPPY_GROUP;
        msg.payload_type = wire::payload_type::NAME_ANNOUNCE;
        msg.hop_distance = Some(1);
        msg.payload = bincode::serialize(&wire::AggregateNameAnnounce { announces: vec![] }).unwrap();
        r.route_and_send(msg);
        assert!(r.sloppy.reverse_view().is_empty());
    }

    #[test]
    fn name_announce_without_tracked_hop_distance_is_dropped() {
        let r = router(13);
        let sender = r.local_id();
        let mut msg = routed_message(r.local_id(), sender, 10);
        msg.destination_comp = wire::component::SLOPPY_GROUP;
        msg.payload_type = wire::payload_type::NAME_ANNOUNCE;
        msg.hop_distance = None;
        msg.payload = bincode::serialize(&wire::AggregateNameAnnounce { announces: vec![] }).unwrap();
        r.route_and_send(msg);
        assert!(r.sloppy.reverse_view().is_empty());
    }

    #[test]
    fn name_announce_from_a_group_member_stores_records_and_admits_the_sender() {
        let r = router(14);
        r.sloppy.set_network_size(1);
        let sender = NodeId::from_bytes(&[1u8; 20]).unwrap();
        let origin = NodeId::from_bytes(&[2u8; 20]).unwrap();
        let mut msg = routed_message(r.local_id(), sender, 10);
        msg.destination_comp = wire::component::SLOPPY_GROUP;
        msg.payload_type = wire::payload_type::NAME_ANNOUNCE;
        msg.hop_distance = Some(1);
        msg.payload = bincode::serialize(&wire::AggregateNameAnnounce {
            announces: vec![wire::NameAnnounce {
                origin_id: origin,
                seqno: 1,
                addresses: vec![],
            }],
        })
        .unwrap();
        r.route_and_send(msg);
        assert!(r.ndb.lookup(&origin).is_some());
        assert_eq!(r.sloppy.reverse_view().len(), 1);
        assert_eq!(r.sloppy.reverse_view()[0].node_id, sender);
    }
}
