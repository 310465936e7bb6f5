// Copyright 2024 UniSphere Overlay Project.
//
// This library is free software: you can redistribute it and/or modify
// it under the terms of the GNU General Public License as published by
// the Free Software Foundation, either version 3 of the License, or
// (at your option) any later version.

//! Component A: node identifiers and keys.

mod keys;
mod node_id;

pub use keys::{
    sign_open, BoxPublicKey, BoxSecretKey, InvalidSignature, PeerPrivateKey, PeerPublicKey,
    Signature, SigningPublicKey, SigningPublicKeyBytes, SigningSecretKey,
};
pub use node_id::{IdParseError, NodeId, NODE_ID_BITS, NODE_ID_LEN};
