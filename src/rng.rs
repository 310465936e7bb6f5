// Copyright 2024 UniSphere Overlay Project.
//
// This library is free software: you can redistribute it and/or modify
// it under the terms of the GNU General Public License as published by
// the Free Software Foundation, either version 3 of the License, or
// (at your option) any later version.

//! Deterministic RNG plumbing, grounded in the teacher's `rng.rs`/`id.rs`
//! `RngCompat` pattern: production code seeds from OS entropy, tests seed
//! a `ChaChaRng` explicitly so SA selection and landmark coin-flips are
//! reproducible.

use rand::{RngCore, SeedableRng};
use rand_chacha::ChaChaRng;

/// The RNG type threaded through the core (`select_peer_sa`, landmark
/// becomes-landmark draws, jittered timer delays).
pub type MainRng = ChaChaRng;

/// Seeds a new RNG from OS entropy.
pub fn new() -> MainRng {
    ChaChaRng::from_entropy()
}

/// Seeds a new RNG deterministically, for tests and reproducible scenarios.
pub fn new_seeded(seed: u64) -> MainRng {
    ChaChaRng::seed_from_u64(seed)
}

/// Draws a uniform `f64` in `[0, 1)`, used by the landmark-becomes-landmark
/// decision (`sqrt(ln n / n)` against a uniform draw).
pub fn next_unit_f64(rng: &mut MainRng) -> f64 {
    (rng.next_u64() >> 11) as f64 * (1.0 / (1u64 << 53) as f64)
}
