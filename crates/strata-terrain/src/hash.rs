//! Per-position randomness that does not depend on generation order.

use std::hash::{DefaultHasher, Hash, Hasher};

use glam::IVec3;
use rand::SeedableRng;
use rand_chacha::ChaCha8Rng;

/// Combines the world seed with a world-space block position.
///
/// Uses SipHash (std's `DefaultHasher`, fixed keys) so the result is the same
/// on every thread and every run.
pub fn position_hash(seed: u64, pos: IVec3) -> u64 {
    let mut hasher = DefaultHasher::new();
    seed.hash(&mut hasher);
    pos.x.hash(&mut hasher);
    pos.y.hash(&mut hasher);
    pos.z.hash(&mut hasher);
    hasher.finish()
}

/// A deterministic RNG for one world position.
pub fn position_rng(seed: u64, pos: IVec3) -> ChaCha8Rng {
    ChaCha8Rng::seed_from_u64(position_hash(seed, pos))
}
