// Copyright 2024 UniSphere Overlay Project.
//
// This library is free software: you can redistribute it and/or modify
// it under the terms of the GNU General Public License as published by
// the Free Software Foundation, either version 3 of the License, or
// (at your option) any later version.

//! Component D: social identity, contacts, and the per-peer security
//! association lifecycle.

mod contact;
mod identity;
mod peer;

pub use contact::{Contact, ContactAddress};
pub use identity::SocialIdentity;
pub use peer::Peer;
