// Copyright 2024 UniSphere Overlay Project.
//
// This library is free software: you can redistribute it and/or modify
// it under the terms of the GNU General Public License as published by
// the Free Software Foundation, either version 3 of the License, or
// (at your option) any later version.

//! Configuration surface (spec §6.4). Parsing a config file is a CLI/
//! embedder concern outside the core; this struct only defines the
//! recognized options and their defaults.

use serde::{Deserialize, Serialize};

/// Options recognized by the compact routing core.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct RouterConfig {
    /// Multiplicative factor on `sqrt(n ln n)` for the vicinity size bound.
    pub vicinity_size_scale: f64,
    /// Minimum extended-vicinity bucket size.
    pub bucket_size_floor: usize,
    /// Self-announcement period, in seconds.
    pub announce_interval_secs: u64,
    /// Per-entry expiry timer, in seconds.
    pub neighbor_expiry_secs: u64,
    /// Route-originator expiry, in seconds.
    pub origin_expiry_secs: u64,
    /// Maximum number of Cache-type name records retained.
    pub ndb_cache_entries_max: usize,
    /// Maximum landmark addresses stored per node.
    pub ndb_stored_addresses_max: usize,
    /// Number of landmarks to publish the local address to.
    pub cache_redundancy: usize,
    /// Overrides the probabilistic landmark-selection draw.
    pub force_landmark: Option<bool>,
    /// Default hop limit stamped on outgoing routed messages.
    pub default_message_hop_limit: u8,
}

impl Default for RouterConfig {
    fn default() -> Self {
        Self {
            vicinity_size_scale: 1.0,
            bucket_size_floor: 4,
            announce_interval_secs: 10,
            neighbor_expiry_secs: 60,
            origin_expiry_secs: 300,
            ndb_cache_entries_max: 1024,
            ndb_stored_addresses_max: 3,
            cache_redundancy: 3,
            force_landmark: None,
            default_message_hop_limit: 30,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults_match_spec() {
        let cfg = RouterConfig::default();
        assert_eq!(cfg.announce_interval_secs, 10);
        assert_eq!(cfg.neighbor_expiry_secs, 60);
        assert_eq!(cfg.origin_expiry_secs, 300);
        assert_eq!(cfg.ndb_cache_entries_max, 1024);
        assert_eq!(cfg.ndb_stored_addresses_max, 3);
        assert_eq!(cfg.cache_redundancy, 3);
        assert_eq!(cfg.default_message_hop_limit, 30);
        assert_eq!(cfg.bucket_size_floor, 4);
    }
}
