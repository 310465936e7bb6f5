// Copyright 2024 UniSphere Overlay Project.
//
// This library is free software: you can redistribute it and/or modify
// it under the terms of the GNU General Public License as published by
// the Free Software Foundation, either version 3 of the License, or
// (at your option) any later version.

//! Compact routing core for a fully decentralized social-graph overlay
//! network.
//!
//! Rather than a fixed-size namespace addressed by a global identifier,
//! this crate gives every node a compact, landmark-relative address:
//! a small set of well-connected neighbors act as _landmarks_, and every
//! other node's address is a path from a nearby landmark. Routing state
//! per node therefore grows sub-linearly with network size, at the cost
//! of per-destination addresses that are only stable while the
//! landmark-relative path they were minted from still holds.
//!
//! The pieces:
//!
//! - [`identity`]: 160-bit node identifiers derived from Ed25519 public
//!   keys, and the signing keys used for both node identity and the
//!   ephemeral per-link security associations.
//! - [`social`]: the social identity layer — peer link bookkeeping and
//!   security-association lifecycle (spec Component B/C).
//! - [`rib`]: the routing table (Component E): admission, the
//!   Feasible-Distance loop-avoidance rule, and active-route selection.
//! - [`ndb`]: the name database (Component F): landmark address caching
//!   and lookup.
//! - [`sloppy_group`]: consistent-hashing-based peer grouping used for
//!   lookup fallback when no direct route or cached address exists.
//! - [`router`]: the compact router (Component H) tying the above
//!   together: self-announcement, announce verification and import,
//!   path re-export, message forwarding and landmark-status
//!   maintenance.
//! - [`transport`]: the narrow send boundary the core needs from its
//!   embedder.
//!
//! # Concurrency
//!
//! Each component owns its state behind a [`parking_lot::ReentrantMutex`]
//! guarding a `RefCell`, following the same lock-ordering discipline as
//! the embedder's original reference implementation: a component never
//! calls "up" into a caller while holding its own lock. Components that
//! need to notify listeners use [`signal::Signal`], whose dispatch is
//! deferred onto a [`time::Executor`] rather than invoked synchronously,
//! so a subscriber can freely re-enter the component that just fired.
//!
//! # Errors
//!
//! Fallible operations return [`error::Error`] or one of its more
//! specific variants ([`error::ProtocolError`], [`error::RpcError`],
//! [`error::ConstructionError`]), built with `thiserror`.

#![forbid(unsafe_code)]
#![deny(bad_style, improper_ctypes, overflowing_literals, unconditional_recursion, unused_comparisons)]
#![warn(trivial_casts, trivial_numeric_casts, unused_import_braces, unused_qualifications)]

pub mod address;
pub mod config;
pub mod error;
pub mod identity;
pub mod ndb;
pub mod rib;
pub mod rng;
pub mod router;
pub mod signal;
pub mod sloppy_group;
pub mod social;
pub mod time;
pub mod transport;
pub mod vport;

pub use config::RouterConfig;
pub use error::{ConstructionError, Error, ProtocolError, Result, RpcError};
pub use identity::{NodeId, PeerPrivateKey, PeerPublicKey, NODE_ID_BITS, NODE_ID_LEN};
pub use router::CompactRouter;
pub use transport::Transport;
