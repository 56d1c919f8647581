// SPDX-License-Identifier: CEPL-1.0
//! Vulkan implementation of the presentation backend traits.
//!
//! The backend owns everything whose lifetime is the device's (instance,
//! surface, device, command pool, pipeline layout) plus the format- and
//! extent-dependent render targets. Swap chains, views, framebuffers,
//! command buffers and sync objects are created on request and owned by the
//! presentation engine.
mod commands;
mod convert;
mod depth;
mod device;
mod instance;
mod pipeline;

use std::path::PathBuf;
use std::time::Duration;

use anyhow::{Context, Result};
use ash::khr::{surface, swapchain};
use ash::vk::{self, Handle};
use ember_core::{DeviceError, Extent2D};
use ember_render::{
    AcquireOutcome, CameraTransform, CommandBufferHandle, DrawTarget, FenceHandle,
    FramebufferHandle, ImageHandle, ImageViewHandle, PixelFormat, PresentOutcome, PresentQueue,
    QueueFamilyIndices, ResourceFactory, SemaphoreHandle, SharingMode, Submission, SurfaceFormat,
    SurfaceProbe, SurfaceSupport, SwapchainDesc, SwapchainHandle,
};
use raw_window_handle::{HasDisplayHandle, HasWindowHandle};
use tracing::{debug, error, info, warn};

pub use device::DeviceInfo;
pub use pipeline::ShaderLoadError;

use crate::convert::device_error;
use crate::depth::DepthBuffer;
use crate::instance::InstanceBundle;
use crate::pipeline::{PushConstants, ShaderSet};

#[derive(Clone, Debug, PartialEq)]
pub struct VkConfig {
    pub app_name: String,
    /// Enable the Khronos validation layer when it is installed.
    pub validation: bool,
    pub depth: bool,
    pub clear_color: [f32; 4],
    pub vertex_shader: PathBuf,
    pub fragment_shader: PathBuf,
}

impl Default for VkConfig {
    fn default() -> Self {
        Self {
            app_name: "ember".into(),
            validation: cfg!(debug_assertions),
            depth: true,
            clear_color: [0.02, 0.02, 0.04, 1.0],
            vertex_shader: PathBuf::from("assets/shaders/triangle.vert.spv"),
            fragment_shader: PathBuf::from("assets/shaders/triangle.frag.spv"),
        }
    }
}

/// Format- and extent-dependent objects, rebuilt by `prepare_targets`.
struct Targets {
    color_format: vk::Format,
    render_pass: vk::RenderPass,
    pipeline: vk::Pipeline,
    depth: Option<DepthBuffer>,
}

pub struct VkBackend {
    instance: InstanceBundle,
    surface_loader: surface::Instance,
    surface: vk::SurfaceKHR,

    phys: vk::PhysicalDevice,
    info: DeviceInfo,
    queues: QueueFamilyIndices,
    device: ash::Device,
    graphics_queue: vk::Queue,
    present_queue: vk::Queue,
    swapchain_loader: swapchain::Device,

    shaders: ShaderSet,
    pipeline_layout: vk::PipelineLayout,
    depth_format: Option<vk::Format>,
    targets: Option<Targets>,
    cmd_pool: vk::CommandPool,
    clear_color: [f32; 4],
}

fn image_handle(i: vk::Image) -> ImageHandle {
    ImageHandle::from_raw(convert::raw(i))
}

fn vk_of<H: Handle>(raw: u64) -> H {
    convert::from_raw(raw)
}

/// Recovers the `vk::Result` behind an anyhow chain built with `.context()`.
fn anyhow_to_device(op: &'static str, e: anyhow::Error) -> DeviceError {
    match e.downcast_ref::<vk::Result>() {
        Some(r) => device_error(op, *r),
        None => {
            error!("vk: {op}: {e:#}");
            DeviceError::Native {
                op,
                code: vk::Result::ERROR_UNKNOWN.as_raw(),
            }
        }
    }
}

impl VkBackend {
    pub fn new<W>(window: &W, cfg: &VkConfig) -> Result<Self>
    where
        W: HasWindowHandle + HasDisplayHandle,
    {
        // Fail on a bad shader path before touching the driver.
        let shaders = ShaderSet::load(&cfg.vertex_shader, &cfg.fragment_shader)?;

        let dh = window
            .display_handle()
            .map_err(|e| anyhow::anyhow!("{e}"))?
            .as_raw();
        let wh = window
            .window_handle()
            .map_err(|e| anyhow::anyhow!("{e}"))?
            .as_raw();

        unsafe {
            let instance = instance::create_instance(&cfg.app_name, dh, cfg.validation)?;
            let (surface_loader, surface) = match instance::create_surface(&instance, dh, wh) {
                Ok(s) => s,
                Err(e) => {
                    destroy_instance(&instance);
                    return Err(e);
                }
            };

            let logical = device::pick_physical_device(&instance.instance, &surface_loader, surface)
                .and_then(|sel| {
                    device::create_logical_device(&instance.instance, sel.phys, sel.queues)
                        .map(|dev| (sel, dev))
                });
            let (selected, logical) = match logical {
                Ok(pair) => pair,
                Err(e) => {
                    surface_loader.destroy_surface(surface, None);
                    destroy_instance(&instance);
                    return Err(e);
                }
            };

            let swapchain_loader = swapchain::Device::new(&instance.instance, &logical.device);
            let depth_format = if cfg.depth {
                let f = depth::pick_depth_format(&instance.instance, selected.phys);
                if f.is_none() {
                    warn!("vk: no depth attachment format; rendering without depth");
                }
                f
            } else {
                None
            };

            // From here Drop owns cleanup; null handles are skipped by the driver.
            let mut backend = VkBackend {
                instance,
                surface_loader,
                surface,
                phys: selected.phys,
                info: selected.info,
                queues: selected.queues,
                device: logical.device,
                graphics_queue: logical.graphics_queue,
                present_queue: logical.present_queue,
                swapchain_loader,
                shaders,
                pipeline_layout: vk::PipelineLayout::null(),
                depth_format,
                targets: None,
                cmd_pool: vk::CommandPool::null(),
                clear_color: cfg.clear_color,
            };

            backend.pipeline_layout = pipeline::create_pipeline_layout(&backend.device)?;
            let graphics = backend
                .queues
                .graphics
                .context("graphics queue family vanished")?;
            backend.cmd_pool = commands::create_command_pool(&backend.device, graphics)?;

            info!(
                "vk: backend ready on {} (depth={:?})",
                backend.info, backend.depth_format
            );
            Ok(backend)
        }
    }

    pub fn device_info(&self) -> &DeviceInfo {
        &self.info
    }

    /// Applies to command buffers recorded after the call.
    pub fn set_clear_color(&mut self, rgba: [f32; 4]) {
        self.clear_color = rgba;
    }

    unsafe fn destroy_targets(&mut self) {
        if let Some(t) = self.targets.take() {
            self.device.destroy_pipeline(t.pipeline, None);
            self.device.destroy_render_pass(t.render_pass, None);
            if let Some(depth) = t.depth {
                depth.destroy(&self.device);
            }
        }
    }

    unsafe fn build_targets(&self, color_format: vk::Format, extent: vk::Extent2D) -> Result<Targets> {
        let render_pass = pipeline::create_render_pass(&self.device, color_format, self.depth_format)?;
        let pipeline = match pipeline::create_pipeline(
            &self.device,
            render_pass,
            self.pipeline_layout,
            &self.shaders,
            self.depth_format.is_some(),
        ) {
            Ok(p) => p,
            Err(e) => {
                self.device.destroy_render_pass(render_pass, None);
                return Err(e);
            }
        };
        let depth = match self.depth_format {
            Some(format) => {
                match DepthBuffer::new(&self.instance.instance, &self.device, self.phys, extent, format) {
                    Ok(d) => Some(d),
                    Err(e) => {
                        self.device.destroy_pipeline(pipeline, None);
                        self.device.destroy_render_pass(render_pass, None);
                        return Err(e);
                    }
                }
            }
            None => None,
        };
        Ok(Targets {
            color_format,
            render_pass,
            pipeline,
            depth,
        })
    }
}

unsafe fn destroy_instance(bundle: &InstanceBundle) {
    if let Some(debug) = &bundle.debug {
        debug.destroy();
    }
    bundle.instance.destroy_instance(None);
}

impl SurfaceProbe for VkBackend {
    fn queue_families(&self) -> QueueFamilyIndices {
        self.queues
    }

    fn surface_support(&self) -> Result<SurfaceSupport, DeviceError> {
        unsafe {
            let caps = self
                .surface_loader
                .get_physical_device_surface_capabilities(self.phys, self.surface)
                .map_err(|r| device_error("vkGetPhysicalDeviceSurfaceCapabilitiesKHR", r))?;
            let formats = self
                .surface_loader
                .get_physical_device_surface_formats(self.phys, self.surface)
                .map_err(|r| device_error("vkGetPhysicalDeviceSurfaceFormatsKHR", r))?;
            let modes = self
                .surface_loader
                .get_physical_device_surface_present_modes(self.phys, self.surface)
                .map_err(|r| device_error("vkGetPhysicalDeviceSurfacePresentModesKHR", r))?;

            Ok(SurfaceSupport {
                capabilities: convert::capabilities(&caps),
                formats: formats.into_iter().map(convert::surface_format).collect(),
                present_modes: modes.into_iter().filter_map(convert::present_mode).collect(),
            })
        }
    }
}

impl ResourceFactory for VkBackend {
    fn create_swapchain(&mut self, desc: &SwapchainDesc) -> Result<SwapchainHandle, DeviceError> {
        unsafe {
            let caps = self
                .surface_loader
                .get_physical_device_surface_capabilities(self.phys, self.surface)
                .map_err(|r| device_error("vkGetPhysicalDeviceSurfaceCapabilitiesKHR", r))?;
            // Prefer IDENTITY if supported, otherwise the current transform to avoid extra blits.
            let pre_transform = if caps
                .supported_transforms
                .contains(vk::SurfaceTransformFlagsKHR::IDENTITY)
            {
                vk::SurfaceTransformFlagsKHR::IDENTITY
            } else {
                caps.current_transform
            };

            let (sharing_mode, families): (vk::SharingMode, &[u32]) = match &desc.sharing {
                SharingMode::Exclusive => (vk::SharingMode::EXCLUSIVE, &[]),
                SharingMode::Concurrent(pair) => (vk::SharingMode::CONCURRENT, pair.as_slice()),
            };

            let info = vk::SwapchainCreateInfoKHR {
                s_type: vk::StructureType::SWAPCHAIN_CREATE_INFO_KHR,
                surface: self.surface,
                min_image_count: desc.image_count,
                image_format: convert::vk_format(desc.surface_format.format),
                image_color_space: convert::vk_color_space(desc.surface_format.color_space),
                image_extent: convert::vk_extent(desc.extent),
                image_array_layers: 1,
                image_usage: vk::ImageUsageFlags::COLOR_ATTACHMENT,
                image_sharing_mode: sharing_mode,
                queue_family_index_count: families.len() as u32,
                p_queue_family_indices: families.as_ptr(),
                pre_transform,
                composite_alpha: vk::CompositeAlphaFlagsKHR::OPAQUE,
                present_mode: convert::vk_present_mode(desc.present_mode),
                clipped: vk::TRUE,
                old_swapchain: desc
                    .old_swapchain
                    .map_or(vk::SwapchainKHR::null(), |h| vk_of(h.as_raw())),
                ..Default::default()
            };

            let sc = self
                .swapchain_loader
                .create_swapchain(&info, None)
                .map_err(|r| device_error("vkCreateSwapchainKHR", r))?;
            Ok(SwapchainHandle::from_raw(convert::raw(sc)))
        }
    }

    fn swapchain_images(&self, swapchain: SwapchainHandle) -> Result<Vec<ImageHandle>, DeviceError> {
        unsafe {
            let images = self
                .swapchain_loader
                .get_swapchain_images(vk_of(swapchain.as_raw()))
                .map_err(|r| device_error("vkGetSwapchainImagesKHR", r))?;
            Ok(images.into_iter().map(image_handle).collect())
        }
    }

    fn destroy_swapchain(&mut self, swapchain: SwapchainHandle) {
        unsafe {
            self.swapchain_loader
                .destroy_swapchain(vk_of(swapchain.as_raw()), None);
        }
    }

    fn create_image_view(
        &mut self,
        image: ImageHandle,
        format: PixelFormat,
    ) -> Result<ImageViewHandle, DeviceError> {
        // View format MUST match the swap chain image format.
        let info = vk::ImageViewCreateInfo {
            s_type: vk::StructureType::IMAGE_VIEW_CREATE_INFO,
            image: vk_of(image.as_raw()),
            view_type: vk::ImageViewType::TYPE_2D,
            format: convert::vk_format(format),
            subresource_range: vk::ImageSubresourceRange {
                aspect_mask: vk::ImageAspectFlags::COLOR,
                base_mip_level: 0,
                level_count: 1,
                base_array_layer: 0,
                layer_count: 1,
            },
            ..Default::default()
        };
        unsafe {
            let view = self
                .device
                .create_image_view(&info, None)
                .map_err(|r| device_error("vkCreateImageView", r))?;
            Ok(ImageViewHandle::from_raw(convert::raw(view)))
        }
    }

    fn destroy_image_view(&mut self, view: ImageViewHandle) {
        unsafe {
            self.device
                .destroy_image_view(vk_of(view.as_raw()), None);
        }
    }

    fn prepare_targets(&mut self, format: SurfaceFormat, extent: Extent2D) -> Result<(), DeviceError> {
        let color_format = convert::vk_format(format.format);
        let vk_extent = convert::vk_extent(extent);
        // Nothing references the old targets: framebuffers and command
        // buffers were released before the chain was rebuilt.
        unsafe {
            if let Some(t) = self.targets.as_mut().filter(|t| t.color_format == color_format) {
                if let Some(old) = t.depth.take() {
                    old.destroy(&self.device);
                }
                if let Some(depth_format) = self.depth_format {
                    let depth = DepthBuffer::new(
                        &self.instance.instance,
                        &self.device,
                        self.phys,
                        vk_extent,
                        depth_format,
                    )
                    .map_err(|e| anyhow_to_device("depth buffer", e))?;
                    t.depth = Some(depth);
                }
                debug!("vk: depth target resized to {extent}");
                return Ok(());
            }

            self.destroy_targets();
            let targets = self
                .build_targets(color_format, vk_extent)
                .map_err(|e| anyhow_to_device("prepare render targets", e))?;
            debug!(
                "vk: render targets for {:?} at {} (depth={})",
                color_format,
                extent,
                targets.depth.is_some()
            );
            self.targets = Some(targets);
        }
        Ok(())
    }

    fn create_framebuffer(
        &mut self,
        view: ImageViewHandle,
        extent: Extent2D,
    ) -> Result<FramebufferHandle, DeviceError> {
        let Some(targets) = &self.targets else {
            return Err(DeviceError::Native {
                op: "vkCreateFramebuffer",
                code: vk::Result::ERROR_INITIALIZATION_FAILED.as_raw(),
            });
        };
        let mut attachments: Vec<vk::ImageView> = vec![vk_of(view.as_raw())];
        if let Some(depth) = &targets.depth {
            attachments.push(depth.view);
        }
        let info = vk::FramebufferCreateInfo {
            s_type: vk::StructureType::FRAMEBUFFER_CREATE_INFO,
            render_pass: targets.render_pass,
            attachment_count: attachments.len() as u32,
            p_attachments: attachments.as_ptr(),
            width: extent.width,
            height: extent.height,
            layers: 1,
            ..Default::default()
        };
        unsafe {
            let fb = self
                .device
                .create_framebuffer(&info, None)
                .map_err(|r| device_error("vkCreateFramebuffer", r))?;
            Ok(FramebufferHandle::from_raw(convert::raw(fb)))
        }
    }

    fn destroy_framebuffer(&mut self, framebuffer: FramebufferHandle) {
        unsafe {
            self.device
                .destroy_framebuffer(vk_of(framebuffer.as_raw()), None);
        }
    }

    fn allocate_command_buffers(&mut self, count: u32) -> Result<Vec<CommandBufferHandle>, DeviceError> {
        let info = vk::CommandBufferAllocateInfo {
            s_type: vk::StructureType::COMMAND_BUFFER_ALLOCATE_INFO,
            command_pool: self.cmd_pool,
            level: vk::CommandBufferLevel::PRIMARY,
            command_buffer_count: count,
            ..Default::default()
        };
        unsafe {
            let bufs = self
                .device
                .allocate_command_buffers(&info)
                .map_err(|r| device_error("vkAllocateCommandBuffers", r))?;
            Ok(bufs
                .into_iter()
                .map(|b| CommandBufferHandle::from_raw(convert::raw(b)))
                .collect())
        }
    }

    fn free_command_buffers(&mut self, buffers: &[CommandBufferHandle]) {
        let bufs: Vec<vk::CommandBuffer> = buffers.iter().map(|b| vk_of(b.as_raw())).collect();
        unsafe {
            self.device.free_command_buffers(self.cmd_pool, &bufs);
        }
    }

    fn record_draw(
        &mut self,
        command_buffer: CommandBufferHandle,
        target: &DrawTarget,
        camera: &CameraTransform,
    ) -> Result<(), DeviceError> {
        let Some(targets) = &self.targets else {
            return Err(DeviceError::Native {
                op: "record_draw",
                code: vk::Result::ERROR_INITIALIZATION_FAILED.as_raw(),
            });
        };
        let state = commands::DrawState {
            render_pass: targets.render_pass,
            pipeline: targets.pipeline,
            layout: self.pipeline_layout,
            framebuffer: vk_of(target.framebuffer.as_raw()),
            extent: convert::vk_extent(target.extent),
            clear_color: self.clear_color,
            depth: targets.depth.is_some(),
        };
        let push = PushConstants {
            view_projection: *camera,
        };
        unsafe {
            commands::record_draw(&self.device, vk_of(command_buffer.as_raw()), &state, &push)
                .map_err(|r| device_error("record command buffer", r))
        }
    }

    fn create_semaphore(&mut self) -> Result<SemaphoreHandle, DeviceError> {
        let info = vk::SemaphoreCreateInfo::default();
        unsafe {
            let s = self
                .device
                .create_semaphore(&info, None)
                .map_err(|r| device_error("vkCreateSemaphore", r))?;
            Ok(SemaphoreHandle::from_raw(convert::raw(s)))
        }
    }

    fn destroy_semaphore(&mut self, semaphore: SemaphoreHandle) {
        unsafe {
            self.device
                .destroy_semaphore(vk_of(semaphore.as_raw()), None);
        }
    }

    fn create_fence(&mut self, signaled: bool) -> Result<FenceHandle, DeviceError> {
        let info = vk::FenceCreateInfo {
            s_type: vk::StructureType::FENCE_CREATE_INFO,
            flags: if signaled {
                vk::FenceCreateFlags::SIGNALED
            } else {
                vk::FenceCreateFlags::empty()
            },
            ..Default::default()
        };
        unsafe {
            let f = self
                .device
                .create_fence(&info, None)
                .map_err(|r| device_error("vkCreateFence", r))?;
            Ok(FenceHandle::from_raw(convert::raw(f)))
        }
    }

    fn destroy_fence(&mut self, fence: FenceHandle) {
        unsafe {
            self.device.destroy_fence(vk_of(fence.as_raw()), None);
        }
    }
}

impl PresentQueue for VkBackend {
    fn wait_for_fence(&mut self, fence: FenceHandle, timeout: Option<Duration>) -> Result<(), DeviceError> {
        let f: vk::Fence = vk_of(fence.as_raw());
        unsafe {
            self.device
                .wait_for_fences(&[f], true, convert::timeout_ns(timeout))
                .map_err(|r| device_error("vkWaitForFences", r))
        }
    }

    fn reset_fence(&mut self, fence: FenceHandle) -> Result<(), DeviceError> {
        let f: vk::Fence = vk_of(fence.as_raw());
        unsafe {
            self.device
                .reset_fences(&[f])
                .map_err(|r| device_error("vkResetFences", r))
        }
    }

    fn acquire_next_image(
        &mut self,
        swapchain: SwapchainHandle,
        signal: SemaphoreHandle,
        timeout: Option<Duration>,
    ) -> Result<AcquireOutcome, DeviceError> {
        let acquired = unsafe {
            self.swapchain_loader.acquire_next_image(
                vk_of(swapchain.as_raw()),
                convert::timeout_ns(timeout),
                vk_of(signal.as_raw()),
                vk::Fence::null(),
            )
        };
        match acquired {
            Ok((image_index, suboptimal)) => Ok(AcquireOutcome::Acquired {
                image_index,
                suboptimal,
            }),
            Err(vk::Result::ERROR_OUT_OF_DATE_KHR) => Ok(AcquireOutcome::OutOfDate),
            Err(r) => Err(device_error("vkAcquireNextImageKHR", r)),
        }
    }

    fn submit(&mut self, submission: &Submission) -> Result<(), DeviceError> {
        let wait: vk::Semaphore = vk_of(submission.wait.as_raw());
        let signal: vk::Semaphore = vk_of(submission.signal.as_raw());
        let cmd: vk::CommandBuffer = vk_of(submission.command_buffer.as_raw());
        let wait_stages = [vk::PipelineStageFlags::COLOR_ATTACHMENT_OUTPUT];
        let info = vk::SubmitInfo {
            s_type: vk::StructureType::SUBMIT_INFO,
            wait_semaphore_count: 1,
            p_wait_semaphores: &wait,
            p_wait_dst_stage_mask: wait_stages.as_ptr(),
            command_buffer_count: 1,
            p_command_buffers: &cmd,
            signal_semaphore_count: 1,
            p_signal_semaphores: &signal,
            ..Default::default()
        };
        unsafe {
            self.device
                .queue_submit(
                    self.graphics_queue,
                    std::slice::from_ref(&info),
                    vk_of(submission.fence.as_raw()),
                )
                .map_err(|r| device_error("vkQueueSubmit", r))
        }
    }

    fn present(
        &mut self,
        swapchain: SwapchainHandle,
        image_index: u32,
        wait: SemaphoreHandle,
    ) -> Result<PresentOutcome, DeviceError> {
        let wait: vk::Semaphore = vk_of(wait.as_raw());
        let sc: vk::SwapchainKHR = vk_of(swapchain.as_raw());
        let info = vk::PresentInfoKHR {
            s_type: vk::StructureType::PRESENT_INFO_KHR,
            wait_semaphore_count: 1,
            p_wait_semaphores: &wait,
            swapchain_count: 1,
            p_swapchains: &sc,
            p_image_indices: &image_index,
            ..Default::default()
        };
        match unsafe { self.swapchain_loader.queue_present(self.present_queue, &info) } {
            Ok(false) => Ok(PresentOutcome::Presented),
            Ok(true) => Ok(PresentOutcome::Suboptimal),
            Err(vk::Result::ERROR_OUT_OF_DATE_KHR) => Ok(PresentOutcome::OutOfDate),
            Err(r) => Err(device_error("vkQueuePresentKHR", r)),
        }
    }

    fn wait_idle(&mut self) -> Result<(), DeviceError> {
        unsafe {
            self.device
                .device_wait_idle()
                .map_err(|r| device_error("vkDeviceWaitIdle", r))
        }
    }
}

// STRICT TEARDOWN ORDER:
// - device_wait_idle()
// - Pipeline + render pass + depth BEFORE pipeline layout
// - Command pool (frees any remaining buffers) BEFORE device
// - Device BEFORE surface; debug messenger, then instance last.
// Swap chains and per-frame sync belong to the engine and are already gone.
impl Drop for VkBackend {
    fn drop(&mut self) {
        unsafe {
            if let Err(e) = self.device.device_wait_idle() {
                warn!("vk: device_wait_idle during teardown: {e:?}");
            }
            self.destroy_targets();
            self.device
                .destroy_pipeline_layout(self.pipeline_layout, None);
            self.device.destroy_command_pool(self.cmd_pool, None);
            self.device.destroy_device(None);
            self.surface_loader.destroy_surface(self.surface, None);
            destroy_instance(&self.instance);
        }
        debug!("vk: backend destroyed");
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn context_chain_keeps_vk_result() {
        let e = Err::<(), _>(vk::Result::ERROR_DEVICE_LOST)
            .context("create_graphics_pipelines")
            .unwrap_err();
        assert_eq!(anyhow_to_device("pipeline", e), DeviceError::DeviceLost);

        let e = anyhow::anyhow!("no device-local memory type for depth image");
        assert!(matches!(
            anyhow_to_device("depth buffer", e),
            DeviceError::Native { op: "depth buffer", .. }
        ));
    }

    #[test]
    fn default_config_points_at_bundled_shaders() {
        let cfg = VkConfig::default();
        assert!(cfg.vertex_shader.ends_with("triangle.vert.spv"));
        assert!(cfg.fragment_shader.ends_with("triangle.frag.spv"));
        assert!(cfg.depth);
    }
}
