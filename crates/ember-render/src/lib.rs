// SPDX-License-Identifier: CEPL-1.0
//! Backend-agnostic presentation core: swap-chain lifecycle, frame-slot
//! synchronization, and the capability interface a graphics backend
//! implements to drive them.
mod backend;
mod engine;
mod format;
mod frame;
mod handle;
pub mod mock;
pub mod probe;
pub mod swapchain;

pub use backend::{
    AcquireOutcome, Backend, CameraTransform, DrawTarget, PresentOutcome, PresentQueue,
    ResourceFactory, SharingMode, Submission, SurfaceProbe, SwapchainDesc, IDENTITY_TRANSFORM,
};
pub use ember_core::{DeviceError, Extent2D, PresentError};
pub use engine::{EngineState, FrameStatus, PresentConfig, PresentationEngine};
pub use format::{
    ColorSpace, PixelFormat, PresentMode, SurfaceCapabilities, SurfaceFormat, SurfaceSupport,
};
pub use frame::{FrameRing, FrameSlot, ImagesInFlight, DEFAULT_FRAMES_IN_FLIGHT};
pub use handle::{
    CommandBufferHandle, FenceHandle, FramebufferHandle, ImageHandle, ImageViewHandle,
    SemaphoreHandle, SwapchainHandle,
};
pub use probe::{QueueCapabilities, QueueFamilyIndices, QueueFamilyInfo, PresentableQueues};
pub use swapchain::{Swapchain, SwapchainPolicy};
