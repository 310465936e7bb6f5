// Copyright 2024 UniSphere Overlay Project.
//
// This library is free software: you can redistribute it and/or modify
// it under the terms of the GNU General Public License as published by
// the Free Software Foundation, either version 3 of the License, or
// (at your option) any later version.

//! The narrow transport boundary the core needs from its embedder (spec
//! §6.2), grounded on `original_source/src/social/social_provider.h`'s
//! send interface. Connection setup, retry, and wire framing live outside
//! the core; this trait only needs to get a tagged payload to a named
//! neighbor.

use crate::identity::NodeId;
use bytes::Bytes;
use parking_lot::Mutex;
use std::collections::HashMap;
use std::sync::Arc;

/// Sends a tagged payload to a neighbor by node ID. Implementations own
/// whatever connection, retry, and framing logic the real network needs;
/// the core only calls `send` and does not wait for acknowledgement.
pub trait Transport: Send + Sync {
    fn send(&self, to: &NodeId, tag: u8, payload: Bytes);
}

/// In-process mock transport for tests: delivers synchronously into a
/// shared inbox per recipient, keyed by sender, rather than over a real
/// socket.
#[derive(Default)]
pub struct MockTransport {
    from: NodeId,
    inboxes: Mutex<HashMap<NodeId, Arc<Mutex<Vec<(NodeId, u8, Bytes)>>>>>,
}

impl MockTransport {
    pub fn new(from: NodeId) -> Self {
        Self {
            from,
            inboxes: Mutex::new(HashMap::new()),
        }
    }

    /// Registers the shared inbox a recipient's [`MockTransport`] drains
    /// from, so tests can wire up a small mesh of mock transports that
    /// all share the same routing table of inboxes.
    pub fn register(&self, node: NodeId, inbox: Arc<Mutex<Vec<(NodeId, u8, Bytes)>>>) {
        self.inboxes.lock().insert(node, inbox);
    }

    pub fn inbox_for(&self, node: NodeId) -> Arc<Mutex<Vec<(NodeId, u8, Bytes)>>> {
        self.inboxes
            .lock()
            .entry(node)
            .or_insert_with(|| Arc::new(Mutex::new(Vec::new())))
            .clone()
    }
}

impl Transport for MockTransport {
    fn send(&self, to: &NodeId, tag: u8, payload: Bytes) {
        let inbox = self.inbox_for(*to);
        inbox.lock().push((self.from, tag, payload));
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn id(byte: u8) -> NodeId {
        NodeId::from_bytes(&[byte; 20]).unwrap()
    }

    #[test]
    fn send_delivers_into_recipients_inbox() {
        let a = id(1);
        let b = id(2);
        let transport_a = MockTransport::new(a);
        let shared_inbox = transport_a.inbox_for(b);
        transport_a.send(&b, 0x04, Bytes::from_static(b"hello"));
        let msgs = shared_inbox.lock();
        assert_eq!(msgs.len(), 1);
        assert_eq!(msgs[0], (a, 0x04, Bytes::from_static(b"hello")));
    }
}
