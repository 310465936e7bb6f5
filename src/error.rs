// Copyright 2024 UniSphere Overlay Project.
//
// This library is free software: you can redistribute it and/or modify
// it under the terms of the GNU General Public License as published by
// the Free Software Foundation, either version 3 of the License, or
// (at your option) any later version.

//! Crate-wide error taxonomy.
//!
//! Only construction-time errors (category 4 below) are meant to propagate
//! out of the core to a caller. Protocol-violation, resource and transient
//! errors (categories 1-3) are logged and swallowed at their call site; the
//! variants still exist here so call sites have a single vocabulary to log
//! against.

use crate::identity::NodeId;
use thiserror::Error;

/// Errors that can be constructed anywhere in the core.
#[derive(Debug, Error)]
pub enum Error {
    /// Category 1: a received announcement or aggregate failed verification
    /// or carried an inadmissible claim. Always a silent drop at the call
    /// site; never propagated to a public API caller.
    #[error("protocol violation: {0}")]
    ProtocolViolation(#[from] ProtocolError),

    /// Category 2: a resource cap was reached. Eviction already happened;
    /// this variant exists for logging only.
    #[error("resource cap reached: {0}")]
    ResourceCap(&'static str),

    /// Category 3: no route/feasible entry existed when one was needed.
    #[error("no route to {0}")]
    NoRoute(NodeId),

    /// Category 4: fatal construction-time error. The router must not
    /// start with an inconsistent identity.
    #[error("construction error: {0}")]
    Construction(#[from] ConstructionError),

    /// A peer SA operation referenced a public key we do not hold.
    #[error("invalid security association")]
    InvalidSa,
}

/// Category 1 protocol-violation reasons, kept distinct for logging.
#[derive(Debug, Error, Clone, Eq, PartialEq)]
pub enum ProtocolError {
    #[error("signature verification failed")]
    FailedSignature,
    #[error("delegation chain was empty")]
    EmptyDelegationChain,
    #[error("announcement looped back through a locally held SA")]
    RoutingLoop,
    #[error("aggregate originated outside the local sloppy group")]
    ForeignAggregate,
    #[error("aggregate did not track hop distance")]
    MissingHopDistance,
    #[error("message is structurally invalid")]
    MalformedMessage,
}

/// Category 4 construction-time errors.
#[derive(Debug, Error, Clone, Eq, PartialEq)]
pub enum ConstructionError {
    #[error("duplicate node name in topology: {0}")]
    DuplicateNodeName(NodeId),
    #[error("invalid local identifier")]
    InvalidLocalIdentifier,
}

/// Category 5: RPC errors, surfaced to the RPC caller's failure callback by
/// the (external) RPC collaborator. Defined here because the NDB's RPC
/// client trait uses it as its `Result` error type.
#[derive(Debug, Error, Clone, Eq, PartialEq)]
pub enum RpcError {
    #[error("request timed out")]
    RequestTimedOut,
    #[error("method not found")]
    MethodNotFound,
    #[error("bad request")]
    BadRequest,
    #[error("bad response")]
    BadResponse,
}

/// Convenience alias used throughout the crate.
pub type Result<T, E = Error> = std::result::Result<T, E>;
