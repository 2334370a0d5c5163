//! Error types for the particle engine.
//!
//! Setup errors are returned to the caller and poison the engine instance;
//! per-frame errors are logged and absorbed, because a display callback has
//! no caller able to meaningfully react mid-loop.

use std::fmt;

use crate::program::LinkState;

/// Errors that can occur during GPU context acquisition.
#[derive(Debug)]
pub enum GpuError {
    /// Failed to create a surface for rendering.
    SurfaceCreation(wgpu::CreateSurfaceError),
    /// No compatible GPU adapter found.
    NoAdapter,
    /// Failed to create GPU device.
    DeviceCreation(wgpu::RequestDeviceError),
}

impl fmt::Display for GpuError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            GpuError::SurfaceCreation(e) => write!(f, "Failed to create GPU surface: {}", e),
            GpuError::NoAdapter => write!(f, "No compatible GPU adapter found. Ensure your system has a GPU with Vulkan/Metal/DX12 support."),
            GpuError::DeviceCreation(e) => write!(f, "Failed to create GPU device: {}", e),
        }
    }
}

impl std::error::Error for GpuError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            GpuError::SurfaceCreation(e) => Some(e),
            GpuError::DeviceCreation(e) => Some(e),
            _ => None,
        }
    }
}

impl From<wgpu::CreateSurfaceError> for GpuError {
    fn from(e: wgpu::CreateSurfaceError) -> Self {
        GpuError::SurfaceCreation(e)
    }
}

impl From<wgpu::RequestDeviceError> for GpuError {
    fn from(e: wgpu::RequestDeviceError) -> Self {
        GpuError::DeviceCreation(e)
    }
}

/// Errors that can occur while setting up or re-linking the particle engine.
///
/// All of these are fatal to the engine instance: after one is returned, the
/// engine refuses per-frame work (as a logged no-op) until re-initialized.
#[derive(Debug)]
pub enum EngineError {
    /// Shader source failed validation when the program was compiled.
    ShaderCompile(String),
    /// Pipeline creation ("link") failed; contains the diagnostic text.
    PipelineBuild(String),
    /// The declared capture list does not match the particle record layout.
    CaptureMismatch {
        expected: Vec<&'static str>,
        declared: Vec<String>,
    },
    /// A lifecycle operation was invoked out of order.
    OutOfOrder {
        operation: &'static str,
        state: LinkState,
    },
    /// Bind groups were built against an older link generation and must be
    /// reacquired after the re-link.
    StaleBindings { expected: u32, actual: u32 },
    /// Bind group creation failed, typically a block size mismatch between
    /// the host mirror struct and the pipeline's expectation.
    BindingCreation(String),
    /// GPU buffer allocation failed.
    Allocation(String),
    /// GPU context acquisition failed.
    Gpu(GpuError),
}

impl fmt::Display for EngineError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            EngineError::ShaderCompile(msg) => write!(f, "Shader compilation failed: {}", msg),
            EngineError::PipelineBuild(msg) => write!(f, "Program link failed: {}", msg),
            EngineError::CaptureMismatch { expected, declared } => write!(
                f,
                "Capture declaration {:?} does not match particle record fields {:?}",
                declared, expected
            ),
            EngineError::OutOfOrder { operation, state } => write!(
                f,
                "Operation '{}' is not valid in program state {:?}",
                operation, state
            ),
            EngineError::StaleBindings { expected, actual } => write!(
                f,
                "Bindings were acquired against link generation {} but the program is at generation {}; reacquire them",
                actual, expected
            ),
            EngineError::BindingCreation(msg) => write!(f, "Bind group creation failed: {}", msg),
            EngineError::Allocation(msg) => write!(f, "GPU allocation failed: {}", msg),
            EngineError::Gpu(e) => write!(f, "GPU error: {}", e),
        }
    }
}

impl std::error::Error for EngineError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            EngineError::Gpu(e) => Some(e),
            _ => None,
        }
    }
}

impl From<GpuError> for EngineError {
    fn from(e: GpuError) -> Self {
        EngineError::Gpu(e)
    }
}

/// Errors that can occur during sprite texture loading.
///
/// Texture failures are recoverable: the engine falls back to untextured
/// point sprites.
#[derive(Debug)]
pub enum TextureError {
    /// Failed to decode the image file.
    ImageLoad(image::ImageError),
    /// Failed to read the file from disk.
    Io(std::io::Error),
}

impl fmt::Display for TextureError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            TextureError::ImageLoad(e) => write!(f, "Failed to load sprite image: {}", e),
            TextureError::Io(e) => write!(f, "Failed to read sprite file: {}", e),
        }
    }
}

impl std::error::Error for TextureError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            TextureError::ImageLoad(e) => Some(e),
            TextureError::Io(e) => Some(e),
        }
    }
}

impl From<image::ImageError> for TextureError {
    fn from(e: image::ImageError) -> Self {
        TextureError::ImageLoad(e)
    }
}

impl From<std::io::Error> for TextureError {
    fn from(e: std::io::Error) -> Self {
        TextureError::Io(e)
    }
}
