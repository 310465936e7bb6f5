// Copyright 2024 UniSphere Overlay Project.
//
// This library is free software: you can redistribute it and/or modify
// it under the terms of the GNU General Public License as published by
// the Free Software Foundation, either version 3 of the License, or
// (at your option) any later version.

//! RPC method surface (spec §6.3): `Core.Ping`, `Core.NameDb.PublishAddress`,
//! `Core.NameDb.LookupAddress`, `Core.NameDb.LookupSloppyGroup`. The
//! name-database methods are landmark-only; a non-landmark node answers
//! with `BadRequest` rather than silently dropping the call, so a
//! misbehaving or confused caller finds out.

use crate::address::LandmarkAddressList;
use crate::error::RpcError;
use crate::identity::NodeId;
use crate::ndb::{LookupType, NameRecord};

/// One of the RPC methods the core exposes to its embedder's RPC engine.
#[derive(Debug, Clone)]
pub enum RpcRequest {
    Ping,
    PublishAddress { node_id: NodeId, addresses: LandmarkAddressList, seqno: u16 },
    LookupAddress { node_id: NodeId },
    /// `Core.NameDb.LookupSloppyGroup`: asks a landmark to answer a
    /// sloppy-group-scoped query from its own name database, for a caller
    /// that is not itself a member of the group (spec §8 scenario 6),
    /// grounded on `original_source/src/social/name_database.cpp`'s
    /// `remoteLookupSloppyGroup`.
    LookupSloppyGroup {
        node_id: NodeId,
        prefix_len: usize,
        origin: NodeId,
        lookup_type: LookupType,
    },
}

#[derive(Debug, Clone)]
pub enum RpcResponse {
    Pong,
    Published,
    Address(Option<LandmarkAddressList>),
    Records(Vec<NameRecord>),
}

pub type RpcResult = Result<RpcResponse, RpcError>;

/// Handles one RPC call. `is_landmark` gates the name-database methods:
/// only a landmark node is an authoritative publication/lookup target.
pub fn handle(request: RpcRequest, is_landmark: bool, ndb: &crate::ndb::NameDatabase) -> RpcResult {
    match request {
        RpcRequest::Ping => Ok(RpcResponse::Pong),
        RpcRequest::PublishAddress { node_id, addresses, seqno } => {
            if !is_landmark {
                return Err(RpcError::BadRequest);
            }
            let record = crate::ndb::NameRecord::new(
                node_id,
                crate::ndb::RecordType::Authority,
                addresses,
                seqno,
                node_id,
                std::time::Instant::now(),
                None,
            );
            ndb.store(record);
            Ok(RpcResponse::Published)
        }
        RpcRequest::LookupAddress { node_id } => {
            if !is_landmark {
                return Err(RpcError::BadRequest);
            }
            Ok(RpcResponse::Address(ndb.lookup(&node_id)))
        }
        RpcRequest::LookupSloppyGroup { node_id, prefix_len, origin, lookup_type } => {
            if !is_landmark {
                return Err(RpcError::BadRequest);
            }
            Ok(RpcResponse::Records(ndb.lookup_sloppy_group(&node_id, prefix_len, &origin, lookup_type)))
        }
    }
}

/// Sends a [`RpcRequest`] to `landmark` over the embedder's RPC transport
/// and returns what it answered. Distinct from [`crate::transport::Transport`]:
/// plain message sends are fire-and-forget, but a remote sloppy-group
/// lookup or address publication needs an answer before the caller can
/// proceed. Defined here rather than as a free function so the name
/// database and the router can hold one behind a trait object, same as
/// `Transport`.
pub trait RpcClient: Send + Sync {
    fn call(&self, landmark: NodeId, request: RpcRequest) -> RpcResult;
}

/// In-process mock RPC client for tests: routes a call straight into the
/// registered landmark's own [`crate::ndb::NameDatabase`] via [`handle`],
/// skipping any real transport or async round trip.
#[derive(Default)]
pub struct MockRpcClient {
    landmarks: parking_lot::Mutex<std::collections::HashMap<NodeId, std::sync::Arc<crate::ndb::NameDatabase>>>,
}

impl MockRpcClient {
    pub fn new() -> Self {
        Self::default()
    }

    /// Registers `ndb` as the database a call to `landmark_id` is answered
    /// from. Only landmarks need registering; a call to an unregistered id
    /// fails with [`RpcError::MethodNotFound`].
    pub fn register(&self, landmark_id: NodeId, ndb: std::sync::Arc<crate::ndb::NameDatabase>) {
        self.landmarks.lock().insert(landmark_id, ndb);
    }
}

impl RpcClient for MockRpcClient {
    fn call(&self, landmark: NodeId, request: RpcRequest) -> RpcResult {
        let ndb = self.landmarks.lock().get(&landmark).cloned().ok_or(RpcError::MethodNotFound)?;
        handle(request, true, &ndb)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::RouterConfig;
    use crate::ndb::NameDatabase;

    #[test]
    fn ping_always_succeeds() {
        let ndb = NameDatabase::new(RouterConfig::default());
        assert!(matches!(handle(RpcRequest::Ping, false, &ndb), Ok(RpcResponse::Pong)));
    }

    #[test]
    fn name_db_methods_reject_non_landmarks() {
        let ndb = NameDatabase::new(RouterConfig::default());
        let req = RpcRequest::LookupAddress { node_id: NodeId::default() };
        assert!(matches!(handle(req, false, &ndb), Err(RpcError::BadRequest)));
    }

    #[test]
    fn publish_then_lookup_round_trips_on_a_landmark() {
        let ndb = NameDatabase::new(RouterConfig::default());
        let node_id = NodeId::from_bytes(&[7u8; 20]).unwrap();
        let publish = RpcRequest::PublishAddress {
            node_id,
            addresses: LandmarkAddressList::new(),
            seqno: 1,
        };
        assert!(matches!(handle(publish, true, &ndb), Ok(RpcResponse::Published)));
        let lookup = RpcRequest::LookupAddress { node_id };
        assert!(matches!(handle(lookup, true, &ndb), Ok(RpcResponse::Address(Some(_)))));
    }

    #[test]
    fn mock_rpc_client_answers_lookup_sloppy_group_from_the_registered_landmark() {
        use std::sync::Arc;

        let landmark_id = NodeId::from_bytes(&[1u8; 20]).unwrap();
        let member = NodeId::from_bytes(&[2u8; 20]).unwrap();
        let ndb = Arc::new(NameDatabase::new(RouterConfig::default()));
        ndb.store(NameRecord::new(
            member,
            crate::ndb::RecordType::SloppyGroup,
            LandmarkAddressList::new(),
            1,
            member,
            std::time::Instant::now(),
            None,
        ));

        let client = MockRpcClient::new();
        client.register(landmark_id, ndb);

        let response = client.call(
            landmark_id,
            RpcRequest::LookupSloppyGroup {
                node_id: member,
                prefix_len: 0,
                origin: NodeId::default(),
                lookup_type: LookupType::Closest,
            },
        );
        match response {
            Ok(RpcResponse::Records(records)) => {
                assert_eq!(records.len(), 1);
                assert_eq!(records[0].node_id, member);
            }
            other => panic!("expected Records, got {:?}", other),
        }
    }

    #[test]
    fn mock_rpc_client_rejects_unregistered_landmark() {
        let client = MockRpcClient::new();
        let result = client.call(NodeId::from_bytes(&[9u8; 20]).unwrap(), RpcRequest::Ping);
        assert!(matches!(result, Err(RpcError::MethodNotFound)));
    }
}
