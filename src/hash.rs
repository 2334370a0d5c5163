//! Shared procedural randomness for the update kernel and its host model.
//!
//! The respawn rule draws diameter, velocity, and lifetime from a hash of
//! the particle index and the accumulated simulation time. Those draws run
//! on the GPU, but the host keeps a bit-identical copy of the sequence so
//! the update rule can be exercised as a pure function in tests. The hash
//! constants below are therefore a versioned contract: the Rust functions
//! and [`RANDOM_WGSL`] must never diverge.

/// Avalanche hash over a `u32`.
///
/// All arithmetic wraps, matching WGSL's modular `u32` semantics.
#[inline]
pub fn hash(n: u32) -> u32 {
    let mut x = n;
    x ^= x >> 17;
    x = x.wrapping_mul(0xed5a_d4bb);
    x ^= x >> 11;
    x = x.wrapping_mul(0xac4c_1b51);
    x ^= x >> 15;
    x = x.wrapping_mul(0x3184_8bab);
    x ^= x >> 14;
    x
}

/// Random float in `[0, 1]` derived from a seed.
#[inline]
pub fn rand(seed: u32) -> f32 {
    hash(seed) as f32 / 4294967295.0
}

/// Random float in `[min, max]` derived from a seed.
#[inline]
pub fn rand_range(seed: u32, min: f32, max: f32) -> f32 {
    min + rand(seed) * (max - min)
}

/// Seed for one particle's respawn draws.
///
/// A pure function of the particle's identity and the accumulated time at
/// the moment of respawn; no mutable generator state exists anywhere.
#[inline]
pub fn respawn_seed(index: u32, accumulated_time: f32) -> u32 {
    hash(index ^ hash(accumulated_time.to_bits()))
}

/// WGSL mirror of the functions above, prepended to the update kernel.
pub const RANDOM_WGSL: &str = r#"
fn hash(n: u32) -> u32 {
    var x = n;
    x = x ^ (x >> 17u);
    x = x * 0xed5ad4bbu;
    x = x ^ (x >> 11u);
    x = x * 0xac4c1b51u;
    x = x ^ (x >> 15u);
    x = x * 0x31848babu;
    x = x ^ (x >> 14u);
    return x;
}

fn rand(seed: u32) -> f32 {
    return f32(hash(seed)) / 4294967295.0;
}

fn rand_range(seed: u32, min_val: f32, max_val: f32) -> f32 {
    return min_val + rand(seed) * (max_val - min_val);
}

fn respawn_seed(index: u32, accumulated_time: f32) -> u32 {
    return hash(index ^ hash(bitcast<u32>(accumulated_time)));
}
"#;
