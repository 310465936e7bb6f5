// Copyright 2024 UniSphere Overlay Project.
//
// This library is free software: you can redistribute it and/or modify
// it under the terms of the GNU General Public License as published by
// the Free Software Foundation, either version 3 of the License, or
// (at your option) any later version.

//! Component E: the routing table (RIB).

mod entry;
mod originator;
mod table;

pub use entry::{EntryRef, RoutingEntry};
pub use originator::RouteOriginator;
pub use table::{Announcement, RoutingTable};
