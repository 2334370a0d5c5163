//! Integration tests driving the software model of the update step over a
//! ping-pong buffer pair, without a GPU context.
//!
//! The GPU kernel runs the identical rule (same hash constants, same
//! integration, same respawn draws), so these tests pin the simulation
//! semantics the render path depends on.

use plume::buffers::BufferPair;
use plume::engine::EngineConfig;
use plume::particle::Particle;
use plume::step::{step_slice, update_particle};
use plume::time::{clamp_delta, FrameTiming, NOMINAL_DELTA};

fn frame_params(config: &EngineConfig, delta: f32, accumulated: f32) -> plume::UpdateParams {
    config.update_params(FrameTiming { delta, accumulated })
}

#[test]
fn test_first_update_respawns_every_seeded_particle() {
    // Four particles seeded due for respawn at lifetimes 0, -0.25, -0.5,
    // -0.75, stepping once with the nominal delta.
    let config = EngineConfig::default();
    let seeded = Particle::seed(4, config.spawn_position, config.stagger_step);
    let lifetimes: Vec<f32> = seeded.iter().map(|p| p.life_time).collect();
    assert_eq!(lifetimes, vec![0.0, -0.25, -0.5, -0.75]);

    let mut pair = BufferPair::new(seeded.clone(), seeded.clone());
    let params = frame_params(&config, 0.016, 0.016);

    {
        let (src, dst) = pair.split();
        step_slice(&params, src, dst);
    }
    pair.flip();

    for (i, p) in pair.current().iter().enumerate() {
        assert_eq!(
            p.position,
            config.spawn_position.to_array(),
            "particle {} did not respawn at the spawn point",
            i
        );
        assert!(
            p.life_time >= config.life_time_range.start
                && p.life_time <= config.life_time_range.end,
            "particle {} lifetime {} outside configured range",
            i,
            p.life_time
        );
        assert!(p.velocity[1] > 0.0, "particle {} not moving upward", i);
    }

    // The read-side buffer still holds the pre-update data: the step never
    // mutates its input.
    assert_eq!(*pair.other(), seeded);
}

#[test]
fn test_pair_stepping_matches_straight_line_model() {
    // A thousand frames through the ping-pong pair must equal the same
    // frames evolved through a plain sequence of states.
    let config = EngineConfig::default();
    let seeded = Particle::seed(64, config.spawn_position, config.stagger_step);

    let mut pair = BufferPair::new(seeded.clone(), seeded.clone());
    let mut reference = seeded;
    let mut accumulated = 0.0f32;

    for _ in 0..1000 {
        accumulated += NOMINAL_DELTA;
        let params = frame_params(&config, NOMINAL_DELTA, accumulated);

        {
            let (src, dst) = pair.split();
            step_slice(&params, src, dst);
        }
        pair.flip();

        let mut next = reference.clone();
        step_slice(&params, &reference, &mut next);
        reference = next;

        assert_eq!(*pair.current(), reference);
    }
}

#[test]
fn test_identical_runs_stay_in_lockstep() {
    // Two independent simulations fed the same timing sequence never
    // diverge: there is no hidden random state anywhere in the rule.
    let config = EngineConfig::default();
    let seeded = Particle::seed(32, config.spawn_position, config.stagger_step);

    let mut a = BufferPair::new(seeded.clone(), seeded.clone());
    let mut b = BufferPair::new(seeded.clone(), seeded);

    let deltas = [0.016f32, 0.02, 0.033, 0.016, 0.05];
    let mut accumulated = 0.0f32;
    for _ in 0..200 {
        for &delta in &deltas {
            accumulated += delta;
            let params = frame_params(&config, delta, accumulated);
            for pair in [&mut a, &mut b] {
                let (src, dst) = pair.split();
                step_slice(&params, src, dst);
                pair.flip();
            }
        }
    }

    assert_eq!(*a.current(), *b.current());
}

#[test]
fn test_respawned_particles_live_then_fall() {
    // After respawn a particle integrates: gravity bends the velocity down
    // while the lifetime drains by exactly the delta each frame.
    let config = EngineConfig::default();
    let params = frame_params(&config, 0.016, 5.0);

    let expired = Particle {
        position: [0.4, 0.1, -0.2],
        diameter: 10.0,
        velocity: [0.0, -0.3, 0.0],
        life_time: -0.1,
    };
    let respawned = update_particle(9, expired, &params);
    let life_after_respawn = respawned.life_time;

    let later_params = frame_params(&config, 0.016, 5.016);
    let aged = update_particle(9, respawned, &later_params);

    assert_eq!(aged.life_time, life_after_respawn - 0.016);
    assert!(
        aged.velocity[1] < respawned.velocity[1],
        "gravity must pull the upward velocity down"
    );
    assert_ne!(aged.position, respawned.position);
    assert_eq!(aged.diameter, respawned.diameter);
}

#[test]
fn test_clamped_deltas_keep_the_simulation_moving() {
    // A hostile timing source (zero, negative, huge deltas) still advances
    // the simulation by nominal steps once clamped.
    let config = EngineConfig::default();
    let seeded = Particle::seed(8, config.spawn_position, config.stagger_step);
    let mut pair = BufferPair::new(seeded.clone(), seeded);

    let mut accumulated = 0.0f32;
    for raw in [0.0f32, -0.5, 5.0, 0.0, -1.0, 10.0] {
        let delta = clamp_delta(raw);
        assert_eq!(delta, NOMINAL_DELTA);
        accumulated += delta;
        let params = frame_params(&config, delta, accumulated);
        let (src, dst) = pair.split();
        step_slice(&params, src, dst);
        pair.flip();
    }

    // Six nominal steps respawned particle 0 on the first frame; its
    // lifetime must have drained five deltas since.
    let p0 = pair.current()[0];
    assert!(p0.life_time > 0.0);
    assert!(
        p0.life_time < config.life_time_range.end,
        "lifetime should have drained below the drawn maximum"
    );
}

#[test]
fn test_simultaneous_respawns_desynchronize() {
    // Every seeded particle is already due, so the whole population
    // respawns on the very first step. The per-index hash draws must give
    // them pairwise distinct lifetimes, so from then on their deaths are
    // spread out instead of the system resetting in lockstep.
    let config = EngineConfig::default();
    let seeded = Particle::seed(16, config.spawn_position, config.stagger_step);
    let mut pair = BufferPair::new(seeded.clone(), seeded);

    let params = frame_params(&config, NOMINAL_DELTA, NOMINAL_DELTA);
    {
        let (src, dst) = pair.split();
        step_slice(&params, src, dst);
    }
    pair.flip();

    let lifetimes: Vec<f32> = pair.current().iter().map(|p| p.life_time).collect();
    for (i, &a) in lifetimes.iter().enumerate() {
        assert!(a > 0.0, "particle {} did not respawn", i);
        for (j, &b) in lifetimes.iter().enumerate().skip(i + 1) {
            assert_ne!(a, b, "particles {} and {} drew the same lifetime", i, j);
        }
    }
}
