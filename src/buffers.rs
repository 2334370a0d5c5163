//! The ping-pong particle buffer pair.
//!
//! Two equally-sized buffers hold the particle records; exactly one is
//! "current" at any time. Each update step reads the current buffer, writes
//! the other, then flips. The alternation removes the read/write race by
//! construction: the pass never touches the buffer it is reading.
//!
//! [`BufferPair`] is generic over the payload so the flip protocol can be
//! exercised in tests with plain vectors or tags; [`ParticleBuffers`] is the
//! GPU instantiation used at runtime.

use bytemuck::cast_slice;
use wgpu::util::DeviceExt;

use crate::error::EngineError;
use crate::particle::Particle;

/// Two slots and an index saying which one is current.
#[derive(Debug)]
pub struct BufferPair<B> {
    slots: [B; 2],
    current: usize,
}

impl<B> BufferPair<B> {
    /// Create a pair; slot 0 starts as current.
    pub fn new(a: B, b: B) -> Self {
        Self { slots: [a, b], current: 0 }
    }

    /// The buffer that is authoritative for rendering.
    #[inline]
    pub fn current(&self) -> &B {
        &self.slots[self.current]
    }

    /// The buffer the next update step will write.
    #[inline]
    pub fn other(&self) -> &B {
        &self.slots[1 - self.current]
    }

    /// Mutable access to the write-side buffer, for host-side models.
    #[inline]
    pub fn other_mut(&mut self) -> &mut B {
        &mut self.slots[1 - self.current]
    }

    /// Read side and write side at once, for host-side models that step
    /// the pair in place.
    pub fn split(&mut self) -> (&B, &mut B) {
        let (a, b) = self.slots.split_at_mut(1);
        if self.current == 0 {
            (&a[0], &mut b[0])
        } else {
            (&b[0], &mut a[0])
        }
    }

    /// Index of the current slot, `0` or `1`.
    #[inline]
    pub fn current_index(&self) -> usize {
        self.current
    }

    /// Make the just-written buffer current. O(1), no data movement.
    #[inline]
    pub fn flip(&mut self) {
        self.current = 1 - self.current;
    }
}

/// The GPU buffer pair holding `count` particle records per slot.
pub struct ParticleBuffers {
    pair: BufferPair<wgpu::Buffer>,
    count: u32,
}

impl ParticleBuffers {
    /// Allocate both buffers and upload the seeded records into each.
    ///
    /// The usage flags declare the contents as GPU-authored and read back as
    /// vertex input every frame, not static geometry. Allocation failure is
    /// fatal to the engine and is surfaced through a device error scope.
    pub fn new(device: &wgpu::Device, seeded: &[Particle]) -> Result<Self, EngineError> {
        let usage = wgpu::BufferUsages::STORAGE
            | wgpu::BufferUsages::VERTEX
            | wgpu::BufferUsages::COPY_DST;

        device.push_error_scope(wgpu::ErrorFilter::OutOfMemory);
        let a = device.create_buffer_init(&wgpu::util::BufferInitDescriptor {
            label: Some("Particle Buffer A"),
            contents: cast_slice(seeded),
            usage,
        });
        let b = device.create_buffer_init(&wgpu::util::BufferInitDescriptor {
            label: Some("Particle Buffer B"),
            contents: cast_slice(seeded),
            usage,
        });
        if let Some(e) = pollster::block_on(device.pop_error_scope()) {
            return Err(EngineError::Allocation(e.to_string()));
        }

        Ok(Self {
            pair: BufferPair::new(a, b),
            count: seeded.len() as u32,
        })
    }

    /// Number of particle records in each slot.
    #[inline]
    pub fn count(&self) -> u32 {
        self.count
    }

    /// The render-side buffer.
    #[inline]
    pub fn current(&self) -> &wgpu::Buffer {
        self.pair.current()
    }

    /// The update-target buffer.
    #[inline]
    pub fn other(&self) -> &wgpu::Buffer {
        self.pair.other()
    }

    /// Index of the current slot, used to pick the matching bind group.
    #[inline]
    pub fn current_index(&self) -> usize {
        self.pair.current_index()
    }

    /// Flip after an update pass has been recorded.
    #[inline]
    pub fn flip(&mut self) {
        self.pair.flip();
    }

    /// Both raw buffers in slot order, for bind group construction.
    #[inline]
    pub fn slots(&self) -> [&wgpu::Buffer; 2] {
        if self.pair.current_index() == 0 {
            [self.pair.current(), self.pair.other()]
        } else {
            [self.pair.other(), self.pair.current()]
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_flip_alternates() {
        let mut pair = BufferPair::new('a', 'b');
        assert_eq!(*pair.current(), 'a');
        assert_eq!(*pair.other(), 'b');
        pair.flip();
        assert_eq!(*pair.current(), 'b');
        assert_eq!(*pair.other(), 'a');
        pair.flip();
        assert_eq!(*pair.current(), 'a');
    }

    #[test]
    fn test_update_never_aliases_across_frames() {
        // Simulate 1000 frames of the update protocol with tagged slots,
        // checking the non-aliasing invariant each frame: the buffer read by
        // the update is the current one, the buffer written is the other,
        // and after the flip the written buffer is what rendering sees.
        let mut pair = BufferPair::new(0u32, 1u32);
        for _ in 0..1000 {
            let read_tag = *pair.current();
            let write_tag = *pair.other();
            assert_ne!(read_tag, write_tag, "update pass would read its own output");
            pair.flip();
            assert_eq!(
                *pair.current(),
                write_tag,
                "render must see the update's output buffer"
            );
            assert_eq!(
                *pair.other(),
                read_tag,
                "last frame's input becomes the next write target"
            );
        }
    }
}
