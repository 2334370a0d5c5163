//! Windowed driver for the particle engine.
//!
//! Owns the window and the engine, and invokes the engine's lifecycle
//! contract in order once the surface exists. The redraw handler calls
//! `render_frame` unconditionally every refresh; the engine itself guards
//! against running before setup completes.

use std::sync::Arc;

use log::error;
use winit::{
    application::ApplicationHandler,
    event::WindowEvent,
    event_loop::{ActiveEventLoop, ControlFlow, EventLoop},
    window::{Window, WindowId},
};

use crate::engine::{EngineConfig, ParticleEngine};
use crate::error::EngineError;
use crate::gpu::GpuContext;

/// Application state driving one [`ParticleEngine`].
pub struct App {
    config: EngineConfig,
    window: Option<Arc<Window>>,
    gpu: Option<GpuContext>,
    engine: Option<ParticleEngine>,
}

impl App {
    /// An app that will build its engine from the given configuration.
    pub fn new(config: EngineConfig) -> Self {
        Self {
            config,
            window: None,
            gpu: None,
            engine: None,
        }
    }

    /// Create the event loop and run until the window closes.
    pub fn run(config: EngineConfig) -> Result<(), winit::error::EventLoopError> {
        let event_loop = EventLoop::new()?;
        event_loop.set_control_flow(ControlFlow::Poll);

        let mut app = App::new(config);
        event_loop.run_app(&mut app)
    }

    fn setup_engine(&mut self, gpu: &GpuContext) -> Result<ParticleEngine, EngineError> {
        let mut engine = ParticleEngine::new(self.config.clone());
        engine.init(gpu)?;
        engine.init_particle_buffers(gpu)?;
        engine.init_vertex_layout()?;
        engine.init_uniform_blocks(gpu)?;
        Ok(engine)
    }
}

impl ApplicationHandler for App {
    fn resumed(&mut self, event_loop: &ActiveEventLoop) {
        if self.window.is_some() {
            return;
        }

        let window_attrs = Window::default_attributes()
            .with_title("plume")
            .with_inner_size(winit::dpi::LogicalSize::new(1280, 720));

        let window = match event_loop.create_window(window_attrs) {
            Ok(w) => Arc::new(w),
            Err(e) => {
                error!("failed to create window: {}", e);
                event_loop.exit();
                return;
            }
        };

        let gpu = match pollster::block_on(GpuContext::new(window.clone())) {
            Ok(gpu) => gpu,
            Err(e) => {
                error!("failed to acquire GPU context: {}", e);
                event_loop.exit();
                return;
            }
        };

        match self.setup_engine(&gpu) {
            Ok(engine) => {
                self.engine = Some(engine);
            }
            Err(e) => {
                // The engine stays unset; redraws become no-ops.
                error!("engine setup failed: {}", e);
            }
        }

        self.window = Some(window);
        self.gpu = Some(gpu);
    }

    fn window_event(&mut self, event_loop: &ActiveEventLoop, _id: WindowId, event: WindowEvent) {
        match event {
            WindowEvent::CloseRequested => {
                if let Some(engine) = &mut self.engine {
                    engine.cleanup();
                }
                event_loop.exit();
            }
            WindowEvent::Resized(size) => {
                if let Some(gpu) = &mut self.gpu {
                    gpu.resize(size.width, size.height);
                    if let Some(engine) = &mut self.engine {
                        engine.resize(gpu, size.width, size.height);
                    }
                }
            }
            WindowEvent::RedrawRequested => {
                if let (Some(gpu), Some(engine)) = (&mut self.gpu, &mut self.engine) {
                    match engine.render_frame(gpu) {
                        Ok(()) => {}
                        Err(wgpu::SurfaceError::Lost) | Err(wgpu::SurfaceError::Outdated) => {
                            let (width, height) = gpu.surface_size();
                            gpu.resize(width, height);
                        }
                        Err(wgpu::SurfaceError::OutOfMemory) => {
                            error!("surface out of memory, exiting");
                            event_loop.exit();
                        }
                        Err(e) => error!("render error: {:?}", e),
                    }
                }
                if let Some(window) = &self.window {
                    window.request_redraw();
                }
            }
            _ => {}
        }
    }
}
