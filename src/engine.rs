//! The particle engine: one instance owning every GPU resource and the
//! lifecycle contract tying them together.
//!
//! The host integration layer drives the engine strictly in this order:
//!
//! 1. [`ParticleEngine::init`]
//! 2. [`ParticleEngine::init_particle_buffers`]
//! 3. [`ParticleEngine::init_vertex_layout`]
//! 4. [`ParticleEngine::init_uniform_blocks`]
//! 5. [`ParticleEngine::resize`] (any time after init)
//! 6. [`ParticleEngine::render_frame`] (per display refresh)
//! 7. [`ParticleEngine::cleanup`]
//!
//! Setup failures return an error and poison the instance. Per-frame calls
//! arriving before setup completes, or after a failure, are logged no-ops:
//! the display callback invokes them unconditionally, so they must never
//! crash or touch the buffer pair in a half-configured state.

use std::ops::Range;
use std::path::PathBuf;

use glam::Vec3;
use log::{debug, info, warn};

use crate::buffers::ParticleBuffers;
use crate::error::EngineError;
use crate::gpu::GpuContext;
use crate::particle::Particle;
use crate::program::{vertex_attributes, FrameBindings, ParticleProgram};
use crate::shaders::{self, RespawnRanges, WORKGROUP_SIZE};
use crate::step::UpdateParams;
use crate::texture::SpriteTexture;
use crate::time::{FrameClock, FrameTiming};
use crate::uniforms::{ParamBlocks, SimParams, ViewParams};

/// Engine configuration; the defaults match the classic fountain setup.
#[derive(Clone, Debug)]
pub struct EngineConfig {
    /// Number of simulated particles.
    pub particle_count: u32,
    /// Respawn point.
    pub spawn_position: Vec3,
    /// Constant acceleration applied to live particles.
    pub gravity: Vec3,
    /// Diameter drawn at respawn, in points.
    pub diameter_range: Range<f32>,
    /// Upward speed drawn at respawn.
    pub upward_speed_range: Range<f32>,
    /// Lateral speed bound at respawn, symmetric around zero.
    pub lateral_speed: f32,
    /// Lifetime drawn at respawn, seconds.
    pub life_time_range: Range<f32>,
    /// Seed-time lifetime gap between adjacent particles, seconds.
    pub stagger_step: f32,
    /// Diameter points to clip-space size factor.
    pub point_scale: f32,
    /// Camera position for the view block.
    pub camera_position: Vec3,
    /// Optional sprite image modulating particle color.
    pub sprite: Option<PathBuf>,
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            particle_count: 1000,
            spawn_position: Vec3::new(0.0, -0.8, 0.0),
            gravity: Vec3::new(0.0, -0.5, 0.0),
            diameter_range: 8.0..24.0,
            upward_speed_range: 1.0..2.0,
            lateral_speed: 0.25,
            life_time_range: 3.0..5.0,
            stagger_step: 0.25,
            point_scale: 0.002,
            camera_position: Vec3::new(0.0, 0.3, 2.5),
            sprite: None,
        }
    }
}

impl EngineConfig {
    /// The update parameters for one frame of this configuration.
    pub fn update_params(&self, timing: FrameTiming) -> UpdateParams {
        UpdateParams {
            delta_time: timing.delta,
            accumulated_time: timing.accumulated,
            spawn_position: self.spawn_position,
            gravity: self.gravity,
            diameter_range: self.diameter_range.clone(),
            upward_speed_range: self.upward_speed_range.clone(),
            lateral_speed: self.lateral_speed,
            life_time_range: self.life_time_range.clone(),
        }
    }

    fn respawn_ranges(&self) -> RespawnRanges {
        RespawnRanges {
            diameter: self.diameter_range.clone(),
            upward_speed: self.upward_speed_range.clone(),
            lateral_speed: self.lateral_speed,
            life_time: self.life_time_range.clone(),
        }
    }

    /// Upper lifetime bound, normalizes the fade-out alpha.
    #[inline]
    pub fn max_life_time(&self) -> f32 {
        self.life_time_range.end
    }
}

/// One renderer instance owning all of its GPU handles.
pub struct ParticleEngine {
    config: EngineConfig,
    program: ParticleProgram,
    buffers: Option<ParticleBuffers>,
    vertex_stride: Option<u64>,
    blocks: Option<ParamBlocks>,
    bindings: Option<FrameBindings>,
    sprite: Option<SpriteTexture>,
    clock: FrameClock,
}

impl ParticleEngine {
    /// An engine with nothing initialized.
    pub fn new(config: EngineConfig) -> Self {
        Self {
            config,
            program: ParticleProgram::new(),
            buffers: None,
            vertex_stride: None,
            blocks: None,
            bindings: None,
            sprite: None,
            clock: FrameClock::new(),
        }
    }

    /// The active configuration.
    #[inline]
    pub fn config(&self) -> &EngineConfig {
        &self.config
    }

    /// Whether the full setup sequence has completed.
    #[inline]
    pub fn is_ready(&self) -> bool {
        self.program.is_ready()
            && self.buffers.is_some()
            && self.vertex_stride.is_some()
            && self.blocks.is_some()
            && self.bindings.is_some()
    }

    /// Step 1: generate shader sources and compile the program.
    pub fn init(&mut self, gpu: &GpuContext) -> Result<(), EngineError> {
        info!("initializing particle engine, {} particles", self.config.particle_count);
        let sources = shaders::generate(&self.config.respawn_ranges(), self.config.point_scale);
        self.program.compile(gpu.device(), &sources)
    }

    /// Step 2: allocate and seed the buffer pair, declare the captured
    /// fields, and link the program.
    pub fn init_particle_buffers(&mut self, gpu: &GpuContext) -> Result<(), EngineError> {
        let seeded = Particle::seed(
            self.config.particle_count,
            self.config.spawn_position,
            self.config.stagger_step,
        );
        let buffers = ParticleBuffers::new(gpu.device(), &seeded)?;

        self.program
            .declare_captures(&["position", "diameter", "velocity", "life_time"])?;
        self.program.link(gpu.device(), gpu.surface_format())?;

        self.buffers = Some(buffers);
        info!(
            "buffer pair allocated: 2 x {} bytes",
            seeded.len() * Particle::STRIDE
        );
        Ok(())
    }

    /// Step 3: derive how the render pass reads particle fields from
    /// whichever buffer of the pair is bound.
    pub fn init_vertex_layout(&mut self) -> Result<(), EngineError> {
        if self.buffers.is_none() {
            return Err(EngineError::OutOfOrder {
                operation: "init_vertex_layout (buffers not allocated)",
                state: self.program.state(),
            });
        }
        let attributes = vertex_attributes();
        debug_assert_eq!(attributes.len(), Particle::FIELDS.len());
        self.vertex_stride = Some(Particle::STRIDE as u64);
        debug!("vertex layout: {} attributes, stride {}", attributes.len(), Particle::STRIDE);
        Ok(())
    }

    /// Step 4: create the parameter blocks, push the initial constants, and
    /// acquire bind groups against the current link generation.
    pub fn init_uniform_blocks(&mut self, gpu: &GpuContext) -> Result<(), EngineError> {
        let buffers = self.buffers.as_ref().ok_or(EngineError::OutOfOrder {
            operation: "init_uniform_blocks (buffers not allocated)",
            state: self.program.state(),
        })?;

        let blocks = ParamBlocks::create(gpu.device());
        let sprite =
            SpriteTexture::load_or_white(gpu.device(), gpu.queue(), self.config.sprite.as_ref());

        // Initial constants: everything the kernel needs that is not
        // per-frame. Delta and accumulated time follow on the first frame.
        blocks.sim.write_all(
            gpu.queue(),
            &SimParams {
                delta_time: 0.0,
                accumulated_time: 0.0,
                max_life_time: self.config.max_life_time(),
                aspect: gpu.aspect(),
                spawn_position: self.config.spawn_position.to_array(),
                _pad0: 0.0,
                gravity: self.config.gravity.to_array(),
                _pad1: 0.0,
            },
        );
        blocks.view.write_all(
            gpu.queue(),
            &ViewParams::looking_at_origin(self.config.camera_position, gpu.aspect()),
        );

        let bindings = self
            .program
            .acquire_bindings(gpu.device(), buffers, &blocks, &sprite)?;
        self.program.mark_ready()?;

        self.blocks = Some(blocks);
        self.sprite = Some(sprite);
        self.bindings = Some(bindings);
        info!("uniform blocks created, engine ready");
        Ok(())
    }

    /// Update the aspect-dependent uniforms after a surface resize.
    ///
    /// Valid any time after `init`; silently ignored before the blocks
    /// exist since the initial constants pick up the aspect on creation.
    pub fn resize(&mut self, gpu: &GpuContext, width: u32, height: u32) {
        debug!("resize to {}x{}", width, height);
        if let Some(blocks) = &self.blocks {
            let aspect = width as f32 / height.max(1) as f32;
            blocks.write_aspect(gpu.queue(), aspect);
            blocks.view.write_all(
                gpu.queue(),
                &ViewParams::looking_at_origin(self.config.camera_position, aspect),
            );
        }
    }

    /// Run one frame: push per-frame uniforms, record the update pass over
    /// the buffer pair, flip, and draw the new current buffer.
    ///
    /// Safe to call in any state; until setup completes this is a logged
    /// no-op. Surface errors bubble up so the driver can reconfigure.
    pub fn render_frame(&mut self, gpu: &GpuContext) -> Result<(), wgpu::SurfaceError> {
        if !self.is_ready() {
            warn!("render_frame before setup completed; skipping");
            return Ok(());
        }
        let buffers = self.buffers.as_mut().expect("checked by is_ready");
        let blocks = self.blocks.as_ref().expect("checked by is_ready");
        let bindings = self.bindings.as_ref().expect("checked by is_ready");

        // A re-link without reacquired bindings must not reach the GPU.
        if let Err(e) = self.program.verify_bindings(bindings) {
            warn!("skipping frame: {}", e);
            return Ok(());
        }

        let timing = self.clock.tick();
        blocks.write_frame_timing(gpu.queue(), timing.delta, timing.accumulated);

        let output = gpu.surface().get_current_texture()?;
        let view = output
            .texture
            .create_view(&wgpu::TextureViewDescriptor::default());

        let mut encoder = gpu
            .device()
            .create_command_encoder(&wgpu::CommandEncoderDescriptor {
                label: Some("Frame Encoder"),
            });

        // Update pass: read current, write other. No rasterized output.
        {
            let mut pass = encoder.begin_compute_pass(&wgpu::ComputePassDescriptor {
                label: Some("Update Pass"),
                timestamp_writes: None,
            });
            pass.set_pipeline(self.program.compute_pipeline().expect("linked"));
            pass.set_bind_group(0, bindings.update_for(buffers.current_index()), &[]);
            let workgroups = buffers.count().div_ceil(WORKGROUP_SIZE);
            pass.dispatch_workgroups(workgroups, 1, 1);
        }

        // The update output becomes current before the draw is recorded.
        // Pass order inside this encoder is the completion barrier: the
        // draw's vertex fetch waits on the capture writes.
        buffers.flip();

        {
            let mut pass = encoder.begin_render_pass(&wgpu::RenderPassDescriptor {
                label: Some("Render Pass"),
                color_attachments: &[Some(wgpu::RenderPassColorAttachment {
                    view: &view,
                    resolve_target: None,
                    depth_slice: None,
                    ops: wgpu::Operations {
                        load: wgpu::LoadOp::Clear(wgpu::Color {
                            r: 0.02,
                            g: 0.02,
                            b: 0.05,
                            a: 1.0,
                        }),
                        store: wgpu::StoreOp::Store,
                    },
                })],
                depth_stencil_attachment: Some(wgpu::RenderPassDepthStencilAttachment {
                    view: gpu.depth_view(),
                    depth_ops: Some(wgpu::Operations {
                        load: wgpu::LoadOp::Clear(1.0),
                        store: wgpu::StoreOp::Store,
                    }),
                    stencil_ops: None,
                }),
                timestamp_writes: None,
                occlusion_query_set: None,
            });

            pass.set_pipeline(self.program.render_pipeline().expect("linked"));
            pass.set_bind_group(0, bindings.render(), &[]);
            pass.set_vertex_buffer(0, buffers.current().slice(..));
            pass.draw(0..6, 0..buffers.count());
        }

        gpu.queue().submit(std::iter::once(encoder.finish()));
        output.present();

        Ok(())
    }

    /// Release every GPU resource; the engine reverts to uninitialized.
    pub fn cleanup(&mut self) {
        self.bindings = None;
        self.blocks = None;
        self.sprite = None;
        self.buffers = None;
        self.vertex_stride = None;
        self.program = ParticleProgram::new();
        self.clock.reset();
        info!("particle engine resources released");
    }
}
