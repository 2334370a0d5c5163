//! Program setup: capture declaration, linking, and binding lifetimes.
//!
//! The update pass captures particle fields into the write-side buffer, and
//! which fields it writes is a declared contract: the declaration must name
//! the particle record's fields in record order, and the program must be
//! (re)linked after declaring before any per-frame work. Bindings acquired
//! from a link are tied to that link's generation; a later re-link
//! invalidates them and they must be reacquired.
//!
//! Rather than trusting call-order discipline, the setup sequence is an
//! explicit state machine:
//!
//! `Unlinked -> CapturesDeclared -> Linked -> BindingsAcquired -> Ready`
//!
//! Out-of-order calls are rejected with a typed error. A failed link is
//! terminal: the program parks in `Failed` and every per-frame operation
//! becomes a no-op at the engine layer.

use log::info;

use crate::buffers::ParticleBuffers;
use crate::error::EngineError;
use crate::particle::Particle;
use crate::shaders::ShaderSources;
use crate::texture::SpriteTexture;
use crate::uniforms::ParamBlocks;

const DEPTH_FORMAT: wgpu::TextureFormat = wgpu::TextureFormat::Depth32Float;

/// Setup progress of the program object.
#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub enum LinkState {
    /// Shader sources may be compiled; nothing is declared or linked.
    Unlinked,
    /// The capture list is declared and validated; a link must follow.
    CapturesDeclared,
    /// Pipelines exist for the current generation.
    Linked,
    /// Bind groups exist for the current generation.
    BindingsAcquired,
    /// Initial constants are pushed; per-frame work may begin.
    Ready,
    /// A link failed. Terminal.
    Failed,
}

/// Bind groups tied to one link generation.
///
/// `update` holds one group per buffer-pair orientation: entry `i` reads
/// slot `i` and writes the other slot, so the per-frame choice is just an
/// index by `current_index()`.
pub struct FrameBindings {
    update: [wgpu::BindGroup; 2],
    render: wgpu::BindGroup,
    generation: u32,
}

impl FrameBindings {
    /// The update bind group that reads the given slot.
    #[inline]
    pub fn update_for(&self, current_index: usize) -> &wgpu::BindGroup {
        &self.update[current_index]
    }

    /// The render bind group.
    #[inline]
    pub fn render(&self) -> &wgpu::BindGroup {
        &self.render
    }

    /// Link generation these bindings were built against.
    #[inline]
    pub fn generation(&self) -> u32 {
        self.generation
    }
}

/// The engine's single program object: shader modules, pipelines, and the
/// setup state machine guarding them.
pub struct ParticleProgram {
    state: LinkState,
    generation: u32,
    captures: Vec<&'static str>,
    update_module: Option<wgpu::ShaderModule>,
    render_module: Option<wgpu::ShaderModule>,
    compute_layout: Option<wgpu::BindGroupLayout>,
    render_layout: Option<wgpu::BindGroupLayout>,
    compute_pipeline: Option<wgpu::ComputePipeline>,
    render_pipeline: Option<wgpu::RenderPipeline>,
}

impl ParticleProgram {
    /// A program with nothing compiled, declared, or linked.
    pub fn new() -> Self {
        Self {
            state: LinkState::Unlinked,
            generation: 0,
            captures: Vec::new(),
            update_module: None,
            render_module: None,
            compute_layout: None,
            render_layout: None,
            compute_pipeline: None,
            render_pipeline: None,
        }
    }

    /// Current setup state.
    #[inline]
    pub fn state(&self) -> LinkState {
        self.state
    }

    /// Current link generation; bumped by every successful link.
    #[inline]
    pub fn generation(&self) -> u32 {
        self.generation
    }

    /// Whether per-frame work is allowed.
    #[inline]
    pub fn is_ready(&self) -> bool {
        self.state == LinkState::Ready
    }

    fn ensure(&self, operation: &'static str, allowed: &[LinkState]) -> Result<(), EngineError> {
        if allowed.contains(&self.state) {
            Ok(())
        } else {
            Err(EngineError::OutOfOrder {
                operation,
                state: self.state,
            })
        }
    }

    /// Compile both shader modules, surfacing validation diagnostics.
    pub fn compile(
        &mut self,
        device: &wgpu::Device,
        sources: &ShaderSources,
    ) -> Result<(), EngineError> {
        self.ensure("compile", &[LinkState::Unlinked])?;

        device.push_error_scope(wgpu::ErrorFilter::Validation);
        let update = device.create_shader_module(wgpu::ShaderModuleDescriptor {
            label: Some("Update Kernel"),
            source: wgpu::ShaderSource::Wgsl(sources.update.as_str().into()),
        });
        let render = device.create_shader_module(wgpu::ShaderModuleDescriptor {
            label: Some("Render Shader"),
            source: wgpu::ShaderSource::Wgsl(sources.render.as_str().into()),
        });
        if let Some(e) = pollster::block_on(device.pop_error_scope()) {
            self.state = LinkState::Failed;
            return Err(EngineError::ShaderCompile(e.to_string()));
        }

        self.update_module = Some(update);
        self.render_module = Some(render);
        Ok(())
    }

    /// Declare which particle fields the update pass captures.
    ///
    /// The list must match [`Particle::FIELDS`] in count, order, and naming;
    /// anything else is a fatal setup error caught here, before the link.
    pub fn declare_captures(&mut self, fields: &[&str]) -> Result<(), EngineError> {
        self.ensure("declare_captures", &[LinkState::Unlinked])?;
        if self.update_module.is_none() {
            return Err(EngineError::OutOfOrder {
                operation: "declare_captures (program not compiled)",
                state: self.state,
            });
        }
        validate_captures(fields)?;
        self.captures = Particle::field_names();
        self.state = LinkState::CapturesDeclared;
        Ok(())
    }

    /// The declared capture list, in record order.
    pub fn captures(&self) -> &[&'static str] {
        &self.captures
    }

    /// Build (or rebuild) the pipelines for the declared captures.
    ///
    /// Legal after declaring captures, and again at any later point; every
    /// successful link bumps the generation, invalidating previously
    /// acquired bindings. A failed link is terminal for this instance.
    pub fn link(
        &mut self,
        device: &wgpu::Device,
        surface_format: wgpu::TextureFormat,
    ) -> Result<(), EngineError> {
        self.ensure(
            "link",
            &[
                LinkState::CapturesDeclared,
                LinkState::Linked,
                LinkState::BindingsAcquired,
                LinkState::Ready,
            ],
        )?;
        let update_module = self.update_module.as_ref().expect("compiled before declare");
        let render_module = self.render_module.as_ref().expect("compiled before declare");

        device.push_error_scope(wgpu::ErrorFilter::Validation);

        let compute_layout = device.create_bind_group_layout(&wgpu::BindGroupLayoutDescriptor {
            label: Some("Update Bind Group Layout"),
            entries: &[
                wgpu::BindGroupLayoutEntry {
                    binding: 0,
                    visibility: wgpu::ShaderStages::COMPUTE,
                    ty: wgpu::BindingType::Buffer {
                        ty: wgpu::BufferBindingType::Storage { read_only: true },
                        has_dynamic_offset: false,
                        min_binding_size: None,
                    },
                    count: None,
                },
                wgpu::BindGroupLayoutEntry {
                    binding: 1,
                    visibility: wgpu::ShaderStages::COMPUTE,
                    ty: wgpu::BindingType::Buffer {
                        ty: wgpu::BufferBindingType::Storage { read_only: false },
                        has_dynamic_offset: false,
                        min_binding_size: None,
                    },
                    count: None,
                },
                wgpu::BindGroupLayoutEntry {
                    binding: 2,
                    visibility: wgpu::ShaderStages::COMPUTE,
                    ty: wgpu::BindingType::Buffer {
                        ty: wgpu::BufferBindingType::Uniform,
                        has_dynamic_offset: false,
                        min_binding_size: None,
                    },
                    count: None,
                },
            ],
        });

        let render_layout = device.create_bind_group_layout(&wgpu::BindGroupLayoutDescriptor {
            label: Some("Render Bind Group Layout"),
            entries: &[
                wgpu::BindGroupLayoutEntry {
                    binding: 0,
                    visibility: wgpu::ShaderStages::VERTEX | wgpu::ShaderStages::FRAGMENT,
                    ty: wgpu::BindingType::Buffer {
                        ty: wgpu::BufferBindingType::Uniform,
                        has_dynamic_offset: false,
                        min_binding_size: None,
                    },
                    count: None,
                },
                wgpu::BindGroupLayoutEntry {
                    binding: 1,
                    visibility: wgpu::ShaderStages::VERTEX,
                    ty: wgpu::BindingType::Buffer {
                        ty: wgpu::BufferBindingType::Uniform,
                        has_dynamic_offset: false,
                        min_binding_size: None,
                    },
                    count: None,
                },
                wgpu::BindGroupLayoutEntry {
                    binding: 2,
                    visibility: wgpu::ShaderStages::FRAGMENT,
                    ty: wgpu::BindingType::Texture {
                        sample_type: wgpu::TextureSampleType::Float { filterable: true },
                        view_dimension: wgpu::TextureViewDimension::D2,
                        multisampled: false,
                    },
                    count: None,
                },
                wgpu::BindGroupLayoutEntry {
                    binding: 3,
                    visibility: wgpu::ShaderStages::FRAGMENT,
                    ty: wgpu::BindingType::Sampler(wgpu::SamplerBindingType::Filtering),
                    count: None,
                },
            ],
        });

        let compute_pipeline_layout =
            device.create_pipeline_layout(&wgpu::PipelineLayoutDescriptor {
                label: Some("Update Pipeline Layout"),
                bind_group_layouts: &[&compute_layout],
                push_constant_ranges: &[],
            });

        let compute_pipeline = device.create_compute_pipeline(&wgpu::ComputePipelineDescriptor {
            label: Some("Update Pipeline"),
            layout: Some(&compute_pipeline_layout),
            module: update_module,
            entry_point: Some("update_main"),
            compilation_options: Default::default(),
            cache: None,
        });

        let render_pipeline_layout =
            device.create_pipeline_layout(&wgpu::PipelineLayoutDescriptor {
                label: Some("Render Pipeline Layout"),
                bind_group_layouts: &[&render_layout],
                push_constant_ranges: &[],
            });

        let attributes = vertex_attributes();
        let render_pipeline = device.create_render_pipeline(&wgpu::RenderPipelineDescriptor {
            label: Some("Render Pipeline"),
            layout: Some(&render_pipeline_layout),
            vertex: wgpu::VertexState {
                module: render_module,
                entry_point: Some("vs_main"),
                buffers: &[wgpu::VertexBufferLayout {
                    array_stride: Particle::STRIDE as wgpu::BufferAddress,
                    step_mode: wgpu::VertexStepMode::Instance,
                    attributes: &attributes,
                }],
                compilation_options: Default::default(),
            },
            fragment: Some(wgpu::FragmentState {
                module: render_module,
                entry_point: Some("fs_main"),
                targets: &[Some(wgpu::ColorTargetState {
                    format: surface_format,
                    blend: Some(wgpu::BlendState::ALPHA_BLENDING),
                    write_mask: wgpu::ColorWrites::ALL,
                })],
                compilation_options: Default::default(),
            }),
            primitive: wgpu::PrimitiveState {
                topology: wgpu::PrimitiveTopology::TriangleList,
                strip_index_format: None,
                front_face: wgpu::FrontFace::Ccw,
                cull_mode: None,
                polygon_mode: wgpu::PolygonMode::Fill,
                unclipped_depth: false,
                conservative: false,
            },
            depth_stencil: Some(wgpu::DepthStencilState {
                format: DEPTH_FORMAT,
                depth_write_enabled: true,
                depth_compare: wgpu::CompareFunction::Less,
                stencil: wgpu::StencilState::default(),
                bias: wgpu::DepthBiasState::default(),
            }),
            multisample: wgpu::MultisampleState::default(),
            multiview: None,
            cache: None,
        });

        if let Some(e) = pollster::block_on(device.pop_error_scope()) {
            self.state = LinkState::Failed;
            return Err(EngineError::PipelineBuild(e.to_string()));
        }

        self.compute_layout = Some(compute_layout);
        self.render_layout = Some(render_layout);
        self.compute_pipeline = Some(compute_pipeline);
        self.render_pipeline = Some(render_pipeline);
        self.generation += 1;
        self.state = LinkState::Linked;
        info!("program linked, generation {}", self.generation);
        Ok(())
    }

    /// Build bind groups against the current link generation.
    ///
    /// Must be called after every link; the returned bindings carry the
    /// generation and are rejected by [`Self::verify_bindings`] once a
    /// re-link has happened.
    pub fn acquire_bindings(
        &mut self,
        device: &wgpu::Device,
        buffers: &ParticleBuffers,
        blocks: &ParamBlocks,
        sprite: &SpriteTexture,
    ) -> Result<FrameBindings, EngineError> {
        self.ensure(
            "acquire_bindings",
            &[LinkState::Linked, LinkState::BindingsAcquired, LinkState::Ready],
        )?;
        let compute_layout = self.compute_layout.as_ref().expect("linked");
        let render_layout = self.render_layout.as_ref().expect("linked");
        let slots = buffers.slots();

        device.push_error_scope(wgpu::ErrorFilter::Validation);

        // One update group per pair orientation: group i reads slot i.
        let update = [0usize, 1].map(|i| {
            device.create_bind_group(&wgpu::BindGroupDescriptor {
                label: Some("Update Bind Group"),
                layout: compute_layout,
                entries: &[
                    wgpu::BindGroupEntry {
                        binding: 0,
                        resource: slots[i].as_entire_binding(),
                    },
                    wgpu::BindGroupEntry {
                        binding: 1,
                        resource: slots[1 - i].as_entire_binding(),
                    },
                    wgpu::BindGroupEntry {
                        binding: 2,
                        resource: blocks.sim.as_binding(),
                    },
                ],
            })
        });

        let render = device.create_bind_group(&wgpu::BindGroupDescriptor {
            label: Some("Render Bind Group"),
            layout: render_layout,
            entries: &[
                wgpu::BindGroupEntry {
                    binding: 0,
                    resource: blocks.sim.as_binding(),
                },
                wgpu::BindGroupEntry {
                    binding: 1,
                    resource: blocks.view.as_binding(),
                },
                wgpu::BindGroupEntry {
                    binding: 2,
                    resource: wgpu::BindingResource::TextureView(sprite.view()),
                },
                wgpu::BindGroupEntry {
                    binding: 3,
                    resource: wgpu::BindingResource::Sampler(sprite.sampler()),
                },
            ],
        });

        if let Some(e) = pollster::block_on(device.pop_error_scope()) {
            self.state = LinkState::Failed;
            return Err(EngineError::BindingCreation(e.to_string()));
        }

        self.state = LinkState::BindingsAcquired;
        Ok(FrameBindings {
            update,
            render,
            generation: self.generation,
        })
    }

    /// Reject bindings acquired against an older link generation.
    pub fn verify_bindings(&self, bindings: &FrameBindings) -> Result<(), EngineError> {
        check_generation(self.generation, bindings.generation)
    }

    /// Mark setup complete; per-frame work may begin.
    pub fn mark_ready(&mut self) -> Result<(), EngineError> {
        self.ensure("mark_ready", &[LinkState::BindingsAcquired])?;
        self.state = LinkState::Ready;
        Ok(())
    }

    /// The compute pipeline, if linked.
    pub fn compute_pipeline(&self) -> Option<&wgpu::ComputePipeline> {
        self.compute_pipeline.as_ref()
    }

    /// The render pipeline, if linked.
    pub fn render_pipeline(&self) -> Option<&wgpu::RenderPipeline> {
        self.render_pipeline.as_ref()
    }
}

impl Default for ParticleProgram {
    fn default() -> Self {
        Self::new()
    }
}

/// Compare a binding generation against the program's link generation.
fn check_generation(expected: u32, actual: u32) -> Result<(), EngineError> {
    if actual == expected {
        Ok(())
    } else {
        Err(EngineError::StaleBindings { expected, actual })
    }
}

/// Check a capture declaration against the particle record.
pub(crate) fn validate_captures(declared: &[&str]) -> Result<(), EngineError> {
    let expected = Particle::field_names();
    if declared.len() != expected.len()
        || declared.iter().zip(expected.iter()).any(|(d, e)| d != e)
    {
        return Err(EngineError::CaptureMismatch {
            expected,
            declared: declared.iter().map(|s| s.to_string()).collect(),
        });
    }
    Ok(())
}

/// Vertex attributes describing how the render pass reads the particle
/// record from whichever buffer of the pair is bound.
pub fn vertex_attributes() -> Vec<wgpu::VertexAttribute> {
    Particle::FIELDS
        .iter()
        .enumerate()
        .map(|(location, field)| wgpu::VertexAttribute {
            offset: field.offset as wgpu::BufferAddress,
            shader_location: location as u32,
            format: match field.components {
                3 => wgpu::VertexFormat::Float32x3,
                _ => wgpu::VertexFormat::Float32,
            },
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_fresh_program_is_unlinked() {
        let program = ParticleProgram::new();
        assert_eq!(program.state(), LinkState::Unlinked);
        assert_eq!(program.generation(), 0);
        assert!(!program.is_ready());
    }

    #[test]
    fn test_declare_requires_compiled_program() {
        let mut program = ParticleProgram::new();
        let err = program
            .declare_captures(&["position", "diameter", "velocity", "life_time"])
            .unwrap_err();
        assert!(matches!(err, EngineError::OutOfOrder { .. }));
    }

    #[test]
    fn test_captures_must_match_record_order() {
        // Swapped fields: the interleaved capture would land diameter bytes
        // in the velocity slot.
        let err = validate_captures(&["position", "velocity", "diameter", "life_time"]).unwrap_err();
        assert!(matches!(err, EngineError::CaptureMismatch { .. }));
    }

    #[test]
    fn test_captures_must_be_complete() {
        assert!(validate_captures(&["position", "diameter", "velocity"]).is_err());
        assert!(validate_captures(&[
            "position", "diameter", "velocity", "life_time", "extra"
        ])
        .is_err());
        assert!(validate_captures(&["position", "diameter", "velocity", "life_time"]).is_ok());
    }

    #[test]
    fn test_stale_bindings_are_rejected() {
        // Bindings from generation 1 against a program relinked to 2.
        let err = check_generation(2, 1).unwrap_err();
        assert!(matches!(
            err,
            EngineError::StaleBindings { expected: 2, actual: 1 }
        ));
        assert!(check_generation(2, 2).is_ok());
    }

    #[test]
    fn test_vertex_attributes_cover_the_record() {
        let attrs = vertex_attributes();
        assert_eq!(attrs.len(), 4);
        assert_eq!(attrs[0].offset, 0);
        assert_eq!(attrs[0].format, wgpu::VertexFormat::Float32x3);
        assert_eq!(attrs[1].offset, 12);
        assert_eq!(attrs[1].format, wgpu::VertexFormat::Float32);
        assert_eq!(attrs[2].offset, 16);
        assert_eq!(attrs[3].offset, 28);
    }
}
