// SPDX-License-Identifier: CEPL-1.0
//! The narrow capability interface between the presentation core and a
//! graphics backend.
use std::time::Duration;

use ember_core::{DeviceError, Extent2D};

use crate::format::{PixelFormat, PresentMode, SurfaceFormat, SurfaceSupport};
use crate::handle::{
    CommandBufferHandle, FenceHandle, FramebufferHandle, ImageHandle, ImageViewHandle,
    SemaphoreHandle, SwapchainHandle,
};
use crate::probe::QueueFamilyIndices;

/// Column-major 4x4 matrix pushed to the vertex stage.
pub type CameraTransform = [[f32; 4]; 4];

pub const IDENTITY_TRANSFORM: CameraTransform = [
    [1.0, 0.0, 0.0, 0.0],
    [0.0, 1.0, 0.0, 0.0],
    [0.0, 0.0, 1.0, 0.0],
    [0.0, 0.0, 0.0, 1.0],
];

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum SharingMode {
    Exclusive,
    /// Images are shared between exactly these two queue families.
    Concurrent([u32; 2]),
}

#[derive(Clone, Copy, Debug, PartialEq)]
pub struct SwapchainDesc {
    pub surface_format: SurfaceFormat,
    pub present_mode: PresentMode,
    pub image_count: u32,
    pub extent: Extent2D,
    pub sharing: SharingMode,
    /// Previous chain, passed so the presentation engine can hand images over.
    pub old_swapchain: Option<SwapchainHandle>,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum AcquireOutcome {
    Acquired { image_index: u32, suboptimal: bool },
    OutOfDate,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum PresentOutcome {
    Presented,
    Suboptimal,
    OutOfDate,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct Submission {
    pub command_buffer: CommandBufferHandle,
    /// Waited at color-attachment output.
    pub wait: SemaphoreHandle,
    pub signal: SemaphoreHandle,
    pub fence: FenceHandle,
}

/// What a per-image command buffer renders into.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct DrawTarget {
    pub image_index: u32,
    pub framebuffer: FramebufferHandle,
    pub extent: Extent2D,
}

/// Read-only queries against the device/surface pair.
pub trait SurfaceProbe {
    fn queue_families(&self) -> QueueFamilyIndices;
    fn surface_support(&self) -> Result<SurfaceSupport, DeviceError>;
}

/// One-shot construct/destroy pairs. Implementations keep no per-frame state.
pub trait ResourceFactory {
    fn create_swapchain(&mut self, desc: &SwapchainDesc) -> Result<SwapchainHandle, DeviceError>;
    fn swapchain_images(&self, swapchain: SwapchainHandle) -> Result<Vec<ImageHandle>, DeviceError>;
    fn destroy_swapchain(&mut self, swapchain: SwapchainHandle);

    fn create_image_view(
        &mut self,
        image: ImageHandle,
        format: PixelFormat,
    ) -> Result<ImageViewHandle, DeviceError>;
    fn destroy_image_view(&mut self, view: ImageViewHandle);

    /// (Re)builds the targets that depend on the chain's format or extent
    /// (render pass, pipeline, depth attachment) before framebuffers are made.
    fn prepare_targets(&mut self, format: SurfaceFormat, extent: Extent2D) -> Result<(), DeviceError>;

    fn create_framebuffer(
        &mut self,
        view: ImageViewHandle,
        extent: Extent2D,
    ) -> Result<FramebufferHandle, DeviceError>;
    fn destroy_framebuffer(&mut self, framebuffer: FramebufferHandle);

    fn allocate_command_buffers(&mut self, count: u32) -> Result<Vec<CommandBufferHandle>, DeviceError>;
    fn free_command_buffers(&mut self, buffers: &[CommandBufferHandle]);
    fn record_draw(
        &mut self,
        command_buffer: CommandBufferHandle,
        target: &DrawTarget,
        camera: &CameraTransform,
    ) -> Result<(), DeviceError>;

    fn create_semaphore(&mut self) -> Result<SemaphoreHandle, DeviceError>;
    fn destroy_semaphore(&mut self, semaphore: SemaphoreHandle);
    fn create_fence(&mut self, signaled: bool) -> Result<FenceHandle, DeviceError>;
    fn destroy_fence(&mut self, fence: FenceHandle);
}

/// Queue-side operations of the frame protocol.
pub trait PresentQueue {
    /// `None` waits without bound.
    fn wait_for_fence(&mut self, fence: FenceHandle, timeout: Option<Duration>) -> Result<(), DeviceError>;
    fn reset_fence(&mut self, fence: FenceHandle) -> Result<(), DeviceError>;
    fn acquire_next_image(
        &mut self,
        swapchain: SwapchainHandle,
        signal: SemaphoreHandle,
        timeout: Option<Duration>,
    ) -> Result<AcquireOutcome, DeviceError>;
    fn submit(&mut self, submission: &Submission) -> Result<(), DeviceError>;
    fn present(
        &mut self,
        swapchain: SwapchainHandle,
        image_index: u32,
        wait: SemaphoreHandle,
    ) -> Result<PresentOutcome, DeviceError>;
    fn wait_idle(&mut self) -> Result<(), DeviceError>;
}

pub trait Backend: SurfaceProbe + ResourceFactory + PresentQueue {}

impl<T: SurfaceProbe + ResourceFactory + PresentQueue> Backend for T {}
