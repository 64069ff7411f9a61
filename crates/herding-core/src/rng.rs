use crate::agent::Role;
use rand::SeedableRng;
use rand_chacha::ChaCha12Rng;

/// Create a deterministic RNG from a seed.
pub fn create_rng(seed: u64) -> ChaCha12Rng {
    ChaCha12Rng::seed_from_u64(seed)
}

/// Derive the spawn stream for one role so herd and shepherd placement never
/// share draws.
pub fn derive_role_rng(base_seed: u64, role: Role) -> ChaCha12Rng {
    let stream = match role {
        Role::Herd => 0,
        Role::Shepherd => 1,
    };
    ChaCha12Rng::seed_from_u64(
        base_seed.wrapping_add(stream * crate::constants::RNG_ROLE_STREAM_OFFSET),
    )
}
