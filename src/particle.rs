//! The particle record and its layout contract.
//!
//! The same 32-byte record is read by the host, captured by the update
//! kernel, and consumed as vertex input by the render pass. Field order and
//! byte offsets are part of the engine's capture contract: the update pass
//! declares that it writes exactly these fields, in this order, and the
//! declaration is checked against [`Particle::FIELDS`] before the program
//! is linked.

use bytemuck::{Pod, Zeroable};
use glam::Vec3;

/// One simulated particle, in the exact layout shared with the GPU.
#[repr(C)]
#[derive(Copy, Clone, Debug, PartialEq, Pod, Zeroable)]
pub struct Particle {
    /// World-space location.
    pub position: [f32; 3],
    /// Visual size driver, in points.
    pub diameter: f32,
    /// World-space velocity.
    pub velocity: [f32; 3],
    /// Remaining seconds; `<= 0` marks the particle due for respawn.
    pub life_time: f32,
}

/// Description of one field of the particle record.
#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub struct FieldDesc {
    /// Field name, as used in capture declarations.
    pub name: &'static str,
    /// Byte offset inside the record.
    pub offset: u32,
    /// Number of f32 components.
    pub components: u32,
}

impl Particle {
    /// Byte stride of one record.
    pub const STRIDE: usize = std::mem::size_of::<Particle>();

    /// The capture contract: every field the update pass writes, in record
    /// order. A declaration that diverges from this table in count, order,
    /// or naming is rejected before the link.
    pub const FIELDS: [FieldDesc; 4] = [
        FieldDesc { name: "position", offset: 0, components: 3 },
        FieldDesc { name: "diameter", offset: 12, components: 1 },
        FieldDesc { name: "velocity", offset: 16, components: 3 },
        FieldDesc { name: "life_time", offset: 28, components: 1 },
    ];

    /// Capture field names in record order.
    pub fn field_names() -> Vec<&'static str> {
        Self::FIELDS.iter().map(|f| f.name).collect()
    }

    /// Seed records for a fresh buffer pair.
    ///
    /// Every particle starts at the spawn point with zero velocity and a
    /// distinct non-positive lifetime, `-(i * stagger_step)`, so respawns are
    /// staggered in time instead of the whole system resetting on one frame.
    pub fn seed(count: u32, spawn_position: Vec3, stagger_step: f32) -> Vec<Particle> {
        (0..count)
            .map(|i| Particle {
                position: spawn_position.to_array(),
                diameter: 1.0,
                velocity: [0.0; 3],
                life_time: -(i as f32) * stagger_step,
            })
            .collect()
    }
}
