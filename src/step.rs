//! The per-particle update rule, as a pure host-side function.
//!
//! The rule that actually runs each frame is the WGSL kernel generated in
//! [`crate::shaders`]; this module is its bit-exact software model. Keeping
//! the rule as a pure function of `(index, particle, params)` lets the
//! simulation logic be tested without a GPU context, and the shared hash
//! sequence in [`crate::hash`] keeps the two implementations in lockstep.
//!
//! The rule is order-independent: no particle reads another particle's
//! state, so the GPU may evaluate all of them in parallel in any order.

use std::ops::Range;

use glam::Vec3;

use crate::hash::{rand_range, respawn_seed};
use crate::particle::Particle;

/// Parameters consumed by one update step.
///
/// `delta_time` and `accumulated_time` change every frame; the rest are the
/// simulation's configured constants.
#[derive(Clone, Debug)]
pub struct UpdateParams {
    /// Clamped frame delta, seconds.
    pub delta_time: f32,
    /// Sum of all clamped deltas so far, seconds.
    pub accumulated_time: f32,
    /// Where respawned particles appear.
    pub spawn_position: Vec3,
    /// Constant acceleration applied to live particles.
    pub gravity: Vec3,
    /// Diameter drawn at respawn, in points.
    pub diameter_range: Range<f32>,
    /// Upward (y) speed drawn at respawn.
    pub upward_speed_range: Range<f32>,
    /// Lateral (x/z) speed drawn at respawn, symmetric around zero.
    pub lateral_speed: f32,
    /// Lifetime drawn at respawn, seconds.
    pub life_time_range: Range<f32>,
}

impl UpdateParams {
    /// Upper lifetime bound, used by the render stage to normalize the
    /// fade-out alpha.
    #[inline]
    pub fn max_life_time(&self) -> f32 {
        self.life_time_range.end
    }
}

/// Advance one particle by one time step.
///
/// Mirrors the generated kernel exactly: decrement the lifetime first, then
/// either respawn (lifetime ran out) or integrate velocity and position.
pub fn update_particle(index: u32, particle: Particle, params: &UpdateParams) -> Particle {
    let mut out = particle;
    out.life_time -= params.delta_time;

    if out.life_time <= 0.0 {
        let s = respawn_seed(index, params.accumulated_time);
        out.position = params.spawn_position.to_array();
        out.diameter = rand_range(s, params.diameter_range.start, params.diameter_range.end);
        out.velocity = [
            rand_range(s.wrapping_add(1), -params.lateral_speed, params.lateral_speed),
            rand_range(
                s.wrapping_add(2),
                params.upward_speed_range.start,
                params.upward_speed_range.end,
            ),
            rand_range(s.wrapping_add(3), -params.lateral_speed, params.lateral_speed),
        ];
        out.life_time = rand_range(
            s.wrapping_add(4),
            params.life_time_range.start,
            params.life_time_range.end,
        );
    } else {
        let velocity = Vec3::from_array(out.velocity) + params.gravity * params.delta_time;
        let position = Vec3::from_array(out.position) + velocity * params.delta_time;
        out.velocity = velocity.to_array();
        out.position = position.to_array();
    }

    out
}

/// Apply the rule to every particle in `src`, writing results to `dst`.
///
/// `src` is never mutated; this is the software model of the capture pass
/// writing into the other half of the buffer pair.
pub fn step_slice(params: &UpdateParams, src: &[Particle], dst: &mut [Particle]) {
    assert_eq!(src.len(), dst.len(), "buffer pair halves must match in capacity");
    for (i, (p, out)) in src.iter().zip(dst.iter_mut()).enumerate() {
        *out = update_particle(i as u32, *p, params);
    }
}

/// Fade-out factor derived from a particle's remaining lifetime.
///
/// Computed in the render stage from the captured `life_time`; it is not
/// part of the stored record.
#[inline]
pub fn alpha_factor(life_time: f32, max_life_time: f32) -> f32 {
    (life_time / max_life_time).clamp(0.0, 1.0)
}

#[cfg(test)]
mod tests {
    use super::*;
    use bytemuck::Zeroable;

    fn test_params(delta_time: f32) -> UpdateParams {
        UpdateParams {
            delta_time,
            accumulated_time: 2.5,
            spawn_position: Vec3::new(0.0, -0.8, 0.0),
            gravity: Vec3::new(0.0, -0.5, 0.0),
            diameter_range: 8.0..24.0,
            upward_speed_range: 1.0..2.0,
            lateral_speed: 0.25,
            life_time_range: 3.0..5.0,
        }
    }

    fn live_particle() -> Particle {
        Particle {
            position: [0.1, 0.2, 0.3],
            diameter: 12.0,
            velocity: [0.0, 1.5, 0.0],
            life_time: 2.0,
        }
    }

    #[test]
    fn test_live_particle_integrates() {
        let params = test_params(0.016);
        let before = live_particle();
        let after = update_particle(7, before, &params);

        // Lifetime decreases by exactly the delta; nothing else touches it.
        assert_eq!(after.life_time, before.life_time - 0.016);
        // Velocity picks up gravity, position picks up the new velocity.
        let expected_v = Vec3::from_array(before.velocity) + params.gravity * 0.016;
        let expected_p = Vec3::from_array(before.position) + expected_v * 0.016;
        assert_eq!(after.velocity, expected_v.to_array());
        assert_eq!(after.position, expected_p.to_array());
        // Diameter is untouched outside respawn.
        assert_eq!(after.diameter, before.diameter);
    }

    #[test]
    fn test_expired_particle_respawns() {
        let params = test_params(0.016);
        let mut expired = live_particle();
        expired.life_time = 0.0;
        let after = update_particle(3, expired, &params);

        assert_eq!(after.position, params.spawn_position.to_array());
        assert!(params.diameter_range.contains(&after.diameter));
        assert!(after.velocity[1] > 0.0, "respawn velocity must be biased upward");
        assert!(after.velocity[0].abs() <= params.lateral_speed);
        assert!(after.velocity[2].abs() <= params.lateral_speed);
        assert!(
            after.life_time >= params.life_time_range.start
                && after.life_time <= params.life_time_range.end
        );
    }

    #[test]
    fn test_decrement_happens_before_respawn_check() {
        // A particle with a sliver of life left expires this frame.
        let params = test_params(0.016);
        let mut nearly_dead = live_particle();
        nearly_dead.life_time = 0.01;
        let after = update_particle(0, nearly_dead, &params);
        assert_eq!(after.position, params.spawn_position.to_array());
    }

    #[test]
    fn test_respawn_is_deterministic() {
        let params = test_params(0.016);
        let mut expired = live_particle();
        expired.life_time = -0.5;

        let a = update_particle(11, expired, &params);
        let b = update_particle(11, expired, &params);
        assert_eq!(a, b, "same identity and accumulated time must draw identically");
    }

    #[test]
    fn test_respawn_desynchronizes_particles() {
        let params = test_params(0.016);
        let mut expired = live_particle();
        expired.life_time = -0.5;

        let a = update_particle(11, expired, &params);
        let b = update_particle(12, expired, &params);
        assert_ne!(a.velocity, b.velocity, "neighbors must not respawn in phase");
    }

    #[test]
    fn test_step_slice_leaves_source_untouched() {
        let params = test_params(0.016);
        let src: Vec<Particle> = (0..16).map(|_| live_particle()).collect();
        let snapshot = src.clone();
        let mut dst = vec![Particle::zeroed(); 16];

        step_slice(&params, &src, &mut dst);

        assert_eq!(src, snapshot);
        for (i, p) in dst.iter().enumerate() {
            assert_eq!(*p, update_particle(i as u32, src[i], &params));
        }
    }

    #[test]
    fn test_alpha_factor_clamps() {
        assert_eq!(alpha_factor(5.0, 5.0), 1.0);
        assert_eq!(alpha_factor(2.5, 5.0), 0.5);
        assert_eq!(alpha_factor(-1.0, 5.0), 0.0);
        assert_eq!(alpha_factor(9.0, 5.0), 1.0);
    }
}
