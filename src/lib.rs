//! # plume
//!
//! A GPU-driven point-sprite particle engine built on a ping-pong buffer
//! pair: every frame a compute pass reads the current particle buffer,
//! advances each particle independently, and captures the results into the
//! other buffer, which then becomes the one rendered. Respawns are
//! procedural and deterministic, driven by a hash of the particle index and
//! the accumulated simulation time, so the whole simulation state lives on
//! the GPU.
//!
//! ## Lifecycle
//!
//! ```ignore
//! use plume::engine::{EngineConfig, ParticleEngine};
//!
//! let mut engine = ParticleEngine::new(EngineConfig::default());
//! engine.init(&gpu)?;
//! engine.init_particle_buffers(&gpu)?;   // allocate, declare captures, link
//! engine.init_vertex_layout()?;
//! engine.init_uniform_blocks(&gpu)?;     // blocks + bindings, engine ready
//!
//! // per display refresh:
//! engine.render_frame(&gpu)?;
//!
//! engine.cleanup();
//! ```
//!
//! Setup is guarded by an explicit state machine
//! (`Unlinked -> CapturesDeclared -> Linked -> BindingsAcquired -> Ready`);
//! out-of-order calls fail with a typed error instead of corrupting GPU
//! state, and per-frame calls before setup completes are logged no-ops.
//!
//! ## Testing without a GPU
//!
//! The per-particle update rule is mirrored as a pure host function in
//! [`step`], sharing its hash sequence with the generated kernel through
//! [`hash`], and the ping-pong protocol is generic in
//! [`buffers::BufferPair`]. Simulation logic is testable entirely on the
//! CPU; the GPU path runs the identical rule.

pub mod app;
pub mod buffers;
pub mod engine;
pub mod error;
pub mod gpu;
pub mod hash;
pub mod particle;
pub mod program;
pub mod shaders;
pub mod step;
pub mod texture;
pub mod time;
pub mod uniforms;

pub use buffers::BufferPair;
pub use engine::{EngineConfig, ParticleEngine};
pub use error::{EngineError, GpuError, TextureError};
pub use glam::Vec3;
pub use particle::Particle;
pub use step::{step_slice, update_particle, UpdateParams};
pub use time::{clamp_delta, FrameClock};
