// Copyright 2024 UniSphere Overlay Project.
//
// This library is free software: you can redistribute it and/or modify
// it under the terms of the GNU General Public License as published by
// the Free Software Foundation, either version 3 of the License, or
// (at your option) any later version.

//! Wire message shapes and tags (spec §6.1), grounded on
//! `original_source/src/social/compact_router.h`'s message dispatch table
//! and `original_source/src/social/routed_message.h`/`.cpp`. Serialization
//! itself is left to `bincode`/`serde` at the transport boundary; this
//! module only defines the payload shapes and the tag byte that selects
//! among them.

use crate::address::{LandmarkAddress, RoutingPath};
use crate::identity::{NodeId, PeerPublicKey, Signature, SigningPublicKeyBytes};
use serde::{Deserialize, Serialize};

/// Top-level component a message is addressed to, carried ahead of the
/// message tag so a transport multiplexing several protocols on one link
/// can dispatch without decoding the payload (spec §6.3, `compact_router.h`
/// `Component`).
pub mod component {
    pub const NULL: u8 = 0x00;
    pub const RPC_ENGINE: u8 = 0x01;
    pub const SLOPPY_GROUP: u8 = 0x02;
}

/// Payload-type tags carried inside a [`RoutedMessage`] addressed to
/// [`component::SLOPPY_GROUP`] (spec §4.G, `SloppyGroupManagerPrivate::MessageType`).
pub mod payload_type {
    pub const NAME_ANNOUNCE: u32 = 0x01;
}

/// Message tags within the routing component (spec §6.1).
pub mod tag {
    pub const INTERPLEX_HELLO: u8 = 0x03;
    pub const SOCIAL_ANNOUNCE: u8 = 0x05;
    pub const SOCIAL_RETRACT: u8 = 0x06;
    pub const SOCIAL_REFRESH: u8 = 0x07;
    pub const SOCIAL_ROUTED: u8 = 0x08;
    pub const SOCIAL_SA_CREATE: u8 = 0x09;
    pub const SOCIAL_SA_INVALID: u8 = 0x0A;
    pub const SOCIAL_SA_FLUSH: u8 = 0x0B;
}

/// One destination's routing claim, either sent directly after a fresh
/// self-announcement or re-exported on a neighbor's behalf.
///
/// `hop_count` stands in for a full per-hop vport source route: this
/// table only ever forwards by next-hop vport (see
/// [`crate::rib::RoutingEntry`]), so nothing downstream of the immediate
/// next hop needs to be named on the wire. `hop_count` becomes the
/// imported entry's `cost`.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PathAnnounce {
    pub destination: NodeId,
    pub public_key: PeerPublicKey,
    pub landmark: bool,
    pub seqno: u16,
    pub hop_count: u32,
    pub reverse_path: RoutingPath,
    pub delegations: Vec<Vec<u8>>,
    pub sa_key: SigningPublicKeyBytes,
    pub signature: Signature,
}

/// A batch of [`PathAnnounce`]s flushed together from one neighbor's
/// 5-second aggregation buffer (spec §4.H aggregation buffer).
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AggregatePathAnnounce {
    pub announces: Vec<PathAnnounce>,
}

/// Withdraws a previously announced destination.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SocialRetract {
    pub destination: NodeId,
}

/// A neighbor-liveness / vport-handshake message (spec §6.1
/// `Interplex_Hello`).
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct InterplexHello {
    pub sender: NodeId,
}

/// Periodic full resend of every active route this node has for the
/// receiving neighbor (spec §4.H per-peer refresh, rate-limited).
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SocialRefresh {
    pub announces: Vec<PathAnnounce>,
}

/// A payload relayed along a landmark-relative address (spec §4.H
/// `route`, §6.1 `Social_Routed`), grounded on
/// `original_source/src/social/routed_message.h`.
///
/// `source`/`destination` carry the landmark id and reverse path;
/// `source_node`/`destination_node` the addressed node's real id, used for
/// the direct-RIB-hit and local-delivery checks that a landmark address
/// alone can't answer. `source_comp`/`destination_comp` are
/// [`component`] tags, letting one message carry a payload meant for the
/// RPC engine, the sloppy-group manager, or an embedder component above
/// `0x80` (spec §6.3).
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RoutedMessage {
    pub destination: LandmarkAddress,
    pub destination_node: NodeId,
    pub destination_comp: u8,
    pub source: LandmarkAddress,
    pub source_node: NodeId,
    pub source_comp: u8,
    pub hop_count: u8,
    pub delivery_mode: bool,
    pub payload_type: u32,
    pub payload: Vec<u8>,
    /// Hops traversed so far, tracked only when the sender opted in
    /// (spec design note: "`hop_distance` is only populated for messages
    /// that explicitly set `track_hop_distance`"). `None` means tracking
    /// was never requested; callers that depend on it (sloppy-group
    /// aggregate delivery) must treat `None` the same as a missing value,
    /// not as zero.
    pub hop_distance: Option<u32>,
}

impl RoutedMessage {
    /// Consumes one hop: decrements the remaining hop budget and, if hop
    /// distance tracking was requested, advances it. Returns `false` once
    /// the budget is exhausted (spec B2: a message whose hop count reaches
    /// zero is dropped, not forwarded).
    pub fn decrement_hop(&mut self) -> bool {
        if self.hop_count == 0 {
            return false;
        }
        self.hop_count -= 1;
        if let Some(distance) = self.hop_distance.as_mut() {
            *distance += 1;
        }
        true
    }

    /// Shifts the destination L-R address one hop forward, consistent with
    /// [`LandmarkAddress::shift`]. Used only while `delivery_mode` routes
    /// by embedded address rather than by a direct RIB hit.
    pub fn shift_destination(&mut self) {
        self.destination.shift();
    }
}

/// Announces a freshly created (or refreshed) security association to a
/// peer.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SocialSaCreate {
    pub sa_key: SigningPublicKeyBytes,
}

/// Tells a peer that a security association it holds for us is no longer
/// valid; the peer must remove it via
/// [`crate::social::SocialIdentity::remove_peer_sa`].
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SocialSaInvalid {
    pub sa_key: SigningPublicKeyBytes,
}

/// Instructs a peer to drop every peer SA it holds for us and start over
/// (link reset).
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SocialSaFlush;

/// One name record being gossiped to the rest of the sloppy group,
/// carried as the payload of a [`RoutedMessage`] addressed to
/// [`component::SLOPPY_GROUP`] with [`payload_type::NAME_ANNOUNCE`] (spec
/// §4.G), grounded on `original_source/src/social/sloppy_group.cpp`'s
/// `Protocol::NameAnnounce`.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct NameAnnounce {
    pub origin_id: NodeId,
    pub seqno: u16,
    pub addresses: Vec<LandmarkAddress>,
}

/// A batch of [`NameAnnounce`]s flushed together from one peer's 15-second
/// aggregation buffer, grounded on `sloppy_group.cpp`'s
/// `NameAggregationBuffer`/`Protocol::AggregateNameAnnounce`.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AggregateNameAnnounce {
    pub announces: Vec<NameAnnounce>,
}
