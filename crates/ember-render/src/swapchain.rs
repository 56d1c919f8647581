// SPDX-License-Identifier: CEPL-1.0
//! Swap-chain construction: creation policy and the chain bundle
//! (images, one view and one framebuffer per image).
use ember_core::{Extent2D, PresentError};
use tracing::{debug, info};

use crate::backend::{Backend, ResourceFactory, SharingMode, SwapchainDesc};
use crate::format::{PresentMode, SurfaceCapabilities, SurfaceFormat, SurfaceSupport};
use crate::handle::{FramebufferHandle, ImageHandle, ImageViewHandle, SwapchainHandle};
use crate::probe::{PresentableQueues, QueueFamilyIndices};

#[derive(Clone, Copy, Debug, PartialEq)]
pub struct SwapchainPolicy {
    pub preferred_format: SurfaceFormat,
    pub present_mode: PresentMode,
}

impl Default for SwapchainPolicy {
    fn default() -> Self {
        Self {
            preferred_format: SurfaceFormat::BGRA8_UNORM_SRGB,
            present_mode: PresentMode::Fifo,
        }
    }
}

/// Preferred pair if reported, else whatever the surface lists first.
pub fn choose_surface_format(formats: &[SurfaceFormat], preferred: SurfaceFormat) -> Option<SurfaceFormat> {
    formats
        .iter()
        .copied()
        .find(|f| *f == preferred)
        .or_else(|| formats.first().copied())
}

/// Requested mode if the surface offers it; FIFO otherwise.
pub fn choose_present_mode(modes: &[PresentMode], wanted: PresentMode) -> PresentMode {
    if modes.contains(&wanted) {
        wanted
    } else {
        PresentMode::Fifo
    }
}

/// One more than the minimum, clamped to the maximum when there is one.
pub fn choose_image_count(caps: &SurfaceCapabilities) -> u32 {
    let want = caps.min_image_count + 1;
    if caps.max_image_count == 0 {
        want
    } else {
        want.min(caps.max_image_count)
    }
}

pub fn choose_extent(caps: &SurfaceCapabilities, want: Extent2D) -> Extent2D {
    match caps.current_extent {
        Some(current) => current,
        None => want.clamp(caps.min_extent, caps.max_extent),
    }
}

pub fn sharing_mode(queues: PresentableQueues) -> SharingMode {
    if queues.graphics == queues.present {
        SharingMode::Exclusive
    } else {
        SharingMode::Concurrent([queues.graphics, queues.present])
    }
}

/// Applies the creation policy to what the device reported.
pub fn describe(
    support: &SurfaceSupport,
    queues: QueueFamilyIndices,
    policy: &SwapchainPolicy,
    want: Extent2D,
    old_swapchain: Option<SwapchainHandle>,
) -> Result<SwapchainDesc, PresentError> {
    let queues = queues.presentable()?;
    let surface_format = choose_surface_format(&support.formats, policy.preferred_format)
        .ok_or_else(|| PresentError::CapabilityNotFound("surface format".into()))?;
    if support.present_modes.is_empty() {
        return Err(PresentError::CapabilityNotFound("present mode".into()));
    }
    let present_mode = choose_present_mode(&support.present_modes, policy.present_mode);

    let extent = choose_extent(&support.capabilities, want);
    if extent.is_zero() {
        return Err(PresentError::ZeroExtent(extent));
    }

    Ok(SwapchainDesc {
        surface_format,
        present_mode,
        image_count: choose_image_count(&support.capabilities),
        extent,
        sharing: sharing_mode(queues),
        old_swapchain,
    })
}

/// A live swap chain and its per-image objects. Never partially updated:
/// resizing retires the whole bundle and builds a new one.
#[derive(Debug)]
pub struct Swapchain {
    handle: SwapchainHandle,
    surface_format: SurfaceFormat,
    present_mode: PresentMode,
    extent: Extent2D,
    images: Vec<ImageHandle>,
    views: Vec<ImageViewHandle>,
    framebuffers: Vec<FramebufferHandle>,
}

impl Swapchain {
    pub fn build<B: Backend>(
        device: &mut B,
        policy: &SwapchainPolicy,
        want: Extent2D,
        old_swapchain: Option<SwapchainHandle>,
    ) -> Result<Self, PresentError> {
        let support = device
            .surface_support()
            .map_err(PresentError::construction("surface query"))?;
        let desc = describe(&support, device.queue_families(), policy, want, old_swapchain)?;
        debug!(
            "swap chain request: {} images, {:?}/{:?}, {:?}, {}, {:?}",
            desc.image_count,
            desc.surface_format.format,
            desc.surface_format.color_space,
            desc.present_mode,
            desc.extent,
            desc.sharing
        );

        let handle = device
            .create_swapchain(&desc)
            .map_err(PresentError::construction("swap chain"))?;

        let mut chain = Swapchain {
            handle,
            surface_format: desc.surface_format,
            present_mode: desc.present_mode,
            extent: desc.extent,
            images: Vec::new(),
            views: Vec::new(),
            framebuffers: Vec::new(),
        };

        // No partial chains: undo whatever got built before the failure.
        if let Err(e) = chain.populate(device) {
            chain.destroy(device);
            return Err(e);
        }

        info!(
            "swap chain ready ({}, {} images, {:?}, {:?})",
            chain.extent,
            chain.images.len(),
            chain.surface_format.format,
            chain.present_mode
        );
        Ok(chain)
    }

    fn populate<B: ResourceFactory>(&mut self, device: &mut B) -> Result<(), PresentError> {
        self.images = device
            .swapchain_images(self.handle)
            .map_err(PresentError::construction("swap chain images"))?;

        for &image in &self.images {
            let view = device
                .create_image_view(image, self.surface_format.format)
                .map_err(PresentError::construction("swap chain image view"))?;
            self.views.push(view);
        }

        device
            .prepare_targets(self.surface_format, self.extent)
            .map_err(PresentError::construction("render targets"))?;

        for &view in &self.views {
            let fb = device
                .create_framebuffer(view, self.extent)
                .map_err(PresentError::construction("framebuffer"))?;
            self.framebuffers.push(fb);
        }
        Ok(())
    }

    /// Destroys framebuffers and views, handing back the chain itself so it
    /// can serve as the recreation hint before being destroyed.
    pub fn retire<B: ResourceFactory>(mut self, device: &mut B) -> SwapchainHandle {
        for fb in self.framebuffers.drain(..) {
            device.destroy_framebuffer(fb);
        }
        for view in self.views.drain(..) {
            device.destroy_image_view(view);
        }
        self.handle
    }

    pub fn destroy<B: ResourceFactory>(self, device: &mut B) {
        let handle = self.retire(device);
        device.destroy_swapchain(handle);
    }

    pub fn handle(&self) -> SwapchainHandle {
        self.handle
    }

    pub fn surface_format(&self) -> SurfaceFormat {
        self.surface_format
    }

    pub fn present_mode(&self) -> PresentMode {
        self.present_mode
    }

    pub fn extent(&self) -> Extent2D {
        self.extent
    }

    pub fn image_count(&self) -> usize {
        self.images.len()
    }

    pub fn images(&self) -> &[ImageHandle] {
        &self.images
    }

    pub fn views(&self) -> &[ImageViewHandle] {
        &self.views
    }

    pub fn framebuffers(&self) -> &[FramebufferHandle] {
        &self.framebuffers
    }
}
