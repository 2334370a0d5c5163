//! GPU-resident parameter blocks.
//!
//! Each block is a uniform buffer with a fixed byte layout, mirrored on the
//! host by a `#[repr(C)]` Pod struct with explicit padding. Per-frame and
//! on-resize updates are partial writes at constant byte offsets: the
//! offsets below must match the WGSL block declarations exactly, because an
//! offset error does not fail, it corrupts an unrelated field silently.
//! The layout tests at the bottom of this module pin every offset.

use bytemuck::{bytes_of, Pod, Zeroable};
use glam::{Mat4, Vec3};

/// Simulation parameters consumed by the update kernel and the fade-out
/// alpha in the render stage. Binding 0 of the shared parameter group.
///
/// Layout (std140-style): four scalars packed into the first 16 bytes,
/// then two 16-byte-aligned vec3 slots.
#[repr(C)]
#[derive(Copy, Clone, Debug, Pod, Zeroable)]
pub struct SimParams {
    /// Clamped frame delta, seconds. Offset 0.
    pub delta_time: f32,
    /// Accumulated simulation time, seconds. Offset 4.
    pub accumulated_time: f32,
    /// Upper lifetime bound, normalizes the fade-out alpha. Offset 8.
    pub max_life_time: f32,
    /// Surface width over height. Offset 12.
    pub aspect: f32,
    /// Respawn point. Offset 16.
    pub spawn_position: [f32; 3],
    pub _pad0: f32,
    /// Constant acceleration. Offset 32.
    pub gravity: [f32; 3],
    pub _pad1: f32,
}

impl SimParams {
    pub const OFFSET_DELTA_TIME: u64 = 0;
    pub const OFFSET_ACCUMULATED_TIME: u64 = 4;
    pub const OFFSET_MAX_LIFE_TIME: u64 = 8;
    pub const OFFSET_ASPECT: u64 = 12;
    pub const OFFSET_SPAWN_POSITION: u64 = 16;
    pub const OFFSET_GRAVITY: u64 = 32;

    /// WGSL declaration matching this struct byte for byte.
    pub const WGSL: &'static str = r#"
struct SimParams {
    delta_time: f32,
    accumulated_time: f32,
    max_life_time: f32,
    aspect: f32,
    spawn_position: vec3<f32>,
    gravity: vec3<f32>,
}
"#;
}

/// View parameters for the render stage, kept in a separate block from the
/// simulation parameters. Binding 1 of the shared parameter group.
#[repr(C)]
#[derive(Copy, Clone, Debug, Pod, Zeroable)]
pub struct ViewParams {
    /// Combined view-projection matrix. Offset 0.
    pub view_proj: [[f32; 4]; 4],
    /// Camera world position. Offset 64.
    pub camera_position: [f32; 3],
    pub _pad: f32,
}

impl ViewParams {
    pub const OFFSET_VIEW_PROJ: u64 = 0;
    pub const OFFSET_CAMERA_POSITION: u64 = 64;

    /// WGSL declaration matching this struct byte for byte.
    pub const WGSL: &'static str = r#"
struct ViewParams {
    view_proj: mat4x4<f32>,
    camera_position: vec3<f32>,
}
"#;

    /// Build the block contents for a camera orbiting the origin.
    pub fn looking_at_origin(camera_position: Vec3, aspect: f32) -> Self {
        let view = Mat4::look_at_rh(camera_position, Vec3::ZERO, Vec3::Y);
        let proj = Mat4::perspective_rh(45.0_f32.to_radians(), aspect, 0.1, 100.0);
        Self {
            view_proj: (proj * view).to_cols_array_2d(),
            camera_position: camera_position.to_array(),
            _pad: 0.0,
        }
    }
}

/// One GPU-resident parameter block.
pub struct ParamBlock {
    buffer: wgpu::Buffer,
    size: u64,
    label: &'static str,
}

impl ParamBlock {
    /// Allocate a uniform buffer of exactly the mirrored struct's size.
    pub fn create(device: &wgpu::Device, label: &'static str, size: u64) -> Self {
        let buffer = device.create_buffer(&wgpu::BufferDescriptor {
            label: Some(label),
            size,
            usage: wgpu::BufferUsages::UNIFORM | wgpu::BufferUsages::COPY_DST,
            mapped_at_creation: false,
        });
        Self { buffer, size, label }
    }

    /// Upload the whole block.
    pub fn write_all<T: Pod>(&self, queue: &wgpu::Queue, value: &T) {
        self.write(queue, 0, value);
    }

    /// Partial write at a constant byte offset.
    ///
    /// The caller owns offset correctness relative to the block's declared
    /// layout; nothing here can detect a field-level mismatch.
    pub fn write<T: Pod>(&self, queue: &wgpu::Queue, offset: u64, value: &T) {
        let bytes = bytes_of(value);
        debug_assert!(
            offset + bytes.len() as u64 <= self.size,
            "write of {} bytes at offset {} overruns block '{}' ({} bytes)",
            bytes.len(),
            offset,
            self.label,
            self.size
        );
        queue.write_buffer(&self.buffer, offset, bytes);
    }

    /// Block size in bytes.
    #[inline]
    pub fn size(&self) -> u64 {
        self.size
    }

    /// Binding resource for bind group construction.
    #[inline]
    pub fn as_binding(&self) -> wgpu::BindingResource<'_> {
        self.buffer.as_entire_binding()
    }
}

/// The two parameter blocks owned by one engine instance.
pub struct ParamBlocks {
    pub sim: ParamBlock,
    pub view: ParamBlock,
}

impl ParamBlocks {
    /// Allocate both blocks, sized from their host mirror structs.
    pub fn create(device: &wgpu::Device) -> Self {
        Self {
            sim: ParamBlock::create(device, "SimParams", std::mem::size_of::<SimParams>() as u64),
            view: ParamBlock::create(device, "ViewParams", std::mem::size_of::<ViewParams>() as u64),
        }
    }

    /// Per-frame partial writes: delta time and accumulated time.
    pub fn write_frame_timing(&self, queue: &wgpu::Queue, delta: f32, accumulated: f32) {
        self.sim.write(queue, SimParams::OFFSET_DELTA_TIME, &delta);
        self.sim.write(queue, SimParams::OFFSET_ACCUMULATED_TIME, &accumulated);
    }

    /// On-resize partial write: the aspect ratio.
    pub fn write_aspect(&self, queue: &wgpu::Queue, aspect: f32) {
        self.sim.write(queue, SimParams::OFFSET_ASPECT, &aspect);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::mem::{offset_of, size_of};

    #[test]
    fn test_sim_params_offsets_are_pinned() {
        assert_eq!(offset_of!(SimParams, delta_time) as u64, SimParams::OFFSET_DELTA_TIME);
        assert_eq!(
            offset_of!(SimParams, accumulated_time) as u64,
            SimParams::OFFSET_ACCUMULATED_TIME
        );
        assert_eq!(
            offset_of!(SimParams, max_life_time) as u64,
            SimParams::OFFSET_MAX_LIFE_TIME
        );
        assert_eq!(offset_of!(SimParams, aspect) as u64, SimParams::OFFSET_ASPECT);
        assert_eq!(
            offset_of!(SimParams, spawn_position) as u64,
            SimParams::OFFSET_SPAWN_POSITION
        );
        assert_eq!(offset_of!(SimParams, gravity) as u64, SimParams::OFFSET_GRAVITY);
        // vec3 slots are 16-byte aligned in the declared layout; the struct
        // must end on the 16-byte boundary after the gravity slot.
        assert_eq!(size_of::<SimParams>(), 48);
    }

    #[test]
    fn test_view_params_offsets_are_pinned() {
        assert_eq!(offset_of!(ViewParams, view_proj) as u64, ViewParams::OFFSET_VIEW_PROJ);
        assert_eq!(
            offset_of!(ViewParams, camera_position) as u64,
            ViewParams::OFFSET_CAMERA_POSITION
        );
        assert_eq!(size_of::<ViewParams>(), 80);
    }

    #[test]
    fn test_wgsl_declarations_name_every_field() {
        for field in ["delta_time", "accumulated_time", "max_life_time", "aspect", "spawn_position", "gravity"] {
            assert!(SimParams::WGSL.contains(field), "SimParams WGSL lost '{}'", field);
        }
        for field in ["view_proj", "camera_position"] {
            assert!(ViewParams::WGSL.contains(field), "ViewParams WGSL lost '{}'", field);
        }
    }

    #[test]
    fn test_view_params_places_camera() {
        let v = ViewParams::looking_at_origin(Vec3::new(0.0, 0.5, 2.5), 1.5);
        assert_eq!(v.camera_position, [0.0, 0.5, 2.5]);
        // The matrix must be a real transform, not zeroed memory.
        assert_ne!(v.view_proj, [[0.0; 4]; 4]);
    }
}
