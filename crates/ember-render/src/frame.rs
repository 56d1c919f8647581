// SPDX-License-Identifier: CEPL-1.0
use ember_core::PresentError;

use crate::backend::ResourceFactory;
use crate::handle::{FenceHandle, SemaphoreHandle};

pub const DEFAULT_FRAMES_IN_FLIGHT: usize = 2;

/// Synchronization objects of one in-flight frame.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct FrameSlot {
    /// Signalled by acquire, waited by submit.
    pub image_available: SemaphoreHandle,
    /// Signalled by submit, waited by present.
    pub render_finished: SemaphoreHandle,
    /// Signalled when the GPU retires this slot's submission.
    pub in_flight: FenceHandle,
}

/// Ring of frame slots indexed by `frame_counter mod len`.
///
/// Created once and reused; the slot fence is the back-pressure that keeps
/// the CPU at most `len` frames ahead of the GPU.
#[derive(Debug)]
pub struct FrameRing {
    slots: Vec<FrameSlot>,
}

impl FrameRing {
    pub fn new<B: ResourceFactory>(device: &mut B, count: usize) -> Result<Self, PresentError> {
        let mut ring = FrameRing {
            slots: Vec::with_capacity(count),
        };
        for _ in 0..count {
            match Self::create_slot(device) {
                Ok(slot) => ring.slots.push(slot),
                Err(e) => {
                    ring.destroy(device);
                    return Err(e);
                }
            }
        }
        Ok(ring)
    }

    fn create_slot<B: ResourceFactory>(device: &mut B) -> Result<FrameSlot, PresentError> {
        let image_available = device
            .create_semaphore()
            .map_err(PresentError::construction("image-available semaphore"))?;
        let render_finished = match device.create_semaphore() {
            Ok(s) => s,
            Err(e) => {
                device.destroy_semaphore(image_available);
                return Err(PresentError::construction("render-finished semaphore")(e));
            }
        };
        // Signalled so the first wait on each slot returns immediately.
        let in_flight = match device.create_fence(true) {
            Ok(f) => f,
            Err(e) => {
                device.destroy_semaphore(render_finished);
                device.destroy_semaphore(image_available);
                return Err(PresentError::construction("in-flight fence")(e));
            }
        };
        Ok(FrameSlot {
            image_available,
            render_finished,
            in_flight,
        })
    }

    pub fn len(&self) -> usize {
        self.slots.len()
    }

    pub fn is_empty(&self) -> bool {
        self.slots.is_empty()
    }

    pub fn index(&self, frame: u64) -> usize {
        (frame % self.slots.len() as u64) as usize
    }

    pub fn slot(&self, frame: u64) -> FrameSlot {
        self.slots[self.index(frame)]
    }

    pub fn fences(&self) -> impl Iterator<Item = FenceHandle> + '_ {
        self.slots.iter().map(|s| s.in_flight)
    }

    pub fn destroy<B: ResourceFactory>(self, device: &mut B) {
        for slot in self.slots {
            device.destroy_fence(slot.in_flight);
            device.destroy_semaphore(slot.render_finished);
            device.destroy_semaphore(slot.image_available);
        }
    }
}

/// For each swap-chain image, the fence of the slot that last submitted
/// work targeting it.
#[derive(Debug, Default)]
pub struct ImagesInFlight {
    fences: Vec<Option<FenceHandle>>,
}

impl ImagesInFlight {
    pub fn new(image_count: usize) -> Self {
        Self {
            fences: vec![None; image_count],
        }
    }

    /// Records `fence` as the owner of `image` and returns the previous
    /// owner when it belongs to a different slot; the caller must wait on it
    /// before submitting.
    pub fn claim(&mut self, image: u32, fence: FenceHandle) -> Option<FenceHandle> {
        let entry = &mut self.fences[image as usize];
        let previous = entry.replace(fence);
        previous.filter(|prev| *prev != fence)
    }

    pub fn len(&self) -> usize {
        self.fences.len()
    }

    pub fn is_empty(&self) -> bool {
        self.fences.is_empty()
    }
}
