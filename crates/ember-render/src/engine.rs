// SPDX-License-Identifier: CEPL-1.0
//! The frame-advance state machine.
//!
//! Per frame `f`, slot `s = f mod F`:
//! wait(s.fence) → acquire(signal s.image_available) → reset(s.fence) →
//! submit(wait image_available, signal render_finished + s.fence) →
//! present(wait render_finished) → `f += 1`.
//!
//! An out-of-date acquire or an out-of-date/suboptimal present moves the
//! engine to `Stale`; it then drains the device, tears the chain down and
//! rebuilds it with the old chain as hint. A zero-sized window pauses the
//! loop instead of rebuilding.
use std::fmt;
use std::time::Duration;

use ember_core::{DeviceError, Extent2D, PresentError};
use tracing::{debug, info, trace, warn};

use crate::backend::{
    AcquireOutcome, Backend, CameraTransform, DrawTarget, PresentOutcome, Submission,
    IDENTITY_TRANSFORM,
};
use crate::format::{PresentMode, SurfaceFormat};
use crate::frame::{FrameRing, ImagesInFlight, DEFAULT_FRAMES_IN_FLIGHT};
use crate::handle::{CommandBufferHandle, FenceHandle};
use crate::swapchain::{choose_extent, Swapchain, SwapchainPolicy};

#[derive(Clone, Debug, PartialEq)]
pub struct PresentConfig {
    pub frames_in_flight: usize,
    /// Consecutive stale recreations tolerated before giving up.
    pub max_stale_retries: u32,
    /// Bound for fence waits and acquires; `None` waits forever.
    pub fence_timeout: Option<Duration>,
    pub policy: SwapchainPolicy,
    pub camera: CameraTransform,
}

impl Default for PresentConfig {
    fn default() -> Self {
        Self {
            frames_in_flight: DEFAULT_FRAMES_IN_FLIGHT,
            max_stale_retries: 3,
            fence_timeout: None,
            policy: SwapchainPolicy::default(),
            camera: IDENTITY_TRANSFORM,
        }
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum EngineState {
    Idle,
    Acquiring,
    Rendering,
    Presenting,
    Stale,
    /// Window has no area; nothing is acquired or submitted.
    Paused,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum FrameStatus {
    Presented { frame: u64, image_index: u32 },
    /// The chain went stale and was rebuilt; the frame will be retried.
    Recovered,
    Paused,
}

enum Rebuild {
    Done,
    Paused,
}

pub struct PresentationEngine<B: Backend> {
    device: B,
    config: PresentConfig,
    extent_source: Box<dyn FnMut() -> Extent2D>,

    swapchain: Option<Swapchain>,
    command_buffers: Vec<CommandBufferHandle>,
    frames: FrameRing,
    images_in_flight: ImagesInFlight,

    frame: u64,
    state: EngineState,
    resize_pending: bool,
    consecutive_stale: u32,
    recreations: u64,
}

impl<B: Backend> fmt::Debug for PresentationEngine<B> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("PresentationEngine")
            .field("frame", &self.frame)
            .field("state", &self.state)
            .field("swapchain", &self.swapchain)
            .field("frames_in_flight", &self.frames.len())
            .field("recreations", &self.recreations)
            .finish_non_exhaustive()
    }
}

impl<B: Backend> PresentationEngine<B> {
    /// Builds the first chain, the frame ring and the per-image command
    /// buffers. `extent_source` is consulted only when the chain is rebuilt.
    pub fn init(
        mut device: B,
        extent: Extent2D,
        extent_source: impl FnMut() -> Extent2D + 'static,
        mut config: PresentConfig,
    ) -> Result<Self, PresentError> {
        if extent.is_zero() {
            return Err(PresentError::ZeroExtent(extent));
        }
        if config.frames_in_flight == 0 {
            warn!("frames_in_flight = 0 requested; using 1");
            config.frames_in_flight = 1;
        }

        let swapchain = Swapchain::build(&mut device, &config.policy, extent, None)?;

        let frames = match FrameRing::new(&mut device, config.frames_in_flight) {
            Ok(frames) => frames,
            Err(e) => {
                swapchain.destroy(&mut device);
                return Err(e);
            }
        };

        let command_buffers = match record_all(&mut device, &swapchain, &config.camera) {
            Ok(bufs) => bufs,
            Err(e) => {
                frames.destroy(&mut device);
                swapchain.destroy(&mut device);
                return Err(e);
            }
        };

        info!(
            "presentation ready: {} frames in flight, {} images",
            frames.len(),
            swapchain.image_count()
        );

        Ok(Self {
            images_in_flight: ImagesInFlight::new(swapchain.image_count()),
            device,
            config,
            extent_source: Box::new(extent_source),
            swapchain: Some(swapchain),
            command_buffers,
            frames,
            frame: 0,
            state: EngineState::Idle,
            resize_pending: false,
            consecutive_stale: 0,
            recreations: 0,
        })
    }

    /// Runs one iteration of the frame protocol.
    pub fn advance_frame(&mut self) -> Result<FrameStatus, PresentError> {
        if self.state == EngineState::Paused || self.resize_pending || self.swapchain.is_none() {
            if let Rebuild::Paused = self.rebuild()? {
                return Ok(FrameStatus::Paused);
            }
        }

        let (swapchain, extent) = match &self.swapchain {
            Some(sc) => (sc.handle(), sc.extent()),
            None => return Ok(FrameStatus::Paused),
        };
        let slot = self.frames.slot(self.frame);

        // 1. Back-pressure: this slot's previous submission must have retired.
        self.wait_fence(slot.in_flight)?;

        // 2. Acquire.
        self.transition(EngineState::Acquiring);
        let outcome = self
            .device
            .acquire_next_image(swapchain, slot.image_available, self.config.fence_timeout)
            .map_err(|e| self.fence_error("acquire next image", e))?;
        let (image_index, acquired_suboptimal) = match outcome {
            AcquireOutcome::Acquired {
                image_index,
                suboptimal,
            } => (image_index, suboptimal),
            AcquireOutcome::OutOfDate => return self.handle_stale("acquire"),
        };

        if let Some(previous) = self.images_in_flight.claim(image_index, slot.in_flight) {
            trace!("image {image_index} still owned by another slot; waiting");
            self.wait_fence(previous)?;
        }

        // 3. Submit. The fence is reset only once an image is in hand, so an
        // out-of-date acquire never leaves an unsignalled fence behind.
        self.transition(EngineState::Rendering);
        self.device
            .reset_fence(slot.in_flight)
            .map_err(PresentError::device("reset fence"))?;
        let submission = Submission {
            command_buffer: self.command_buffers[image_index as usize],
            wait: slot.image_available,
            signal: slot.render_finished,
            fence: slot.in_flight,
        };
        self.device
            .submit(&submission)
            .map_err(PresentError::device("queue submit"))?;

        // 4. Present.
        self.transition(EngineState::Presenting);
        let presented = self
            .device
            .present(swapchain, image_index, slot.render_finished)
            .map_err(PresentError::device("queue present"))?;

        // 5. Advance.
        let frame = self.frame;
        self.frame += 1;
        trace!("frame {frame} presented image {image_index} at {extent}");

        match presented {
            PresentOutcome::Presented if !acquired_suboptimal => {
                self.consecutive_stale = 0;
                self.transition(EngineState::Idle);
                Ok(FrameStatus::Presented { frame, image_index })
            }
            PresentOutcome::Presented | PresentOutcome::Suboptimal => {
                self.handle_stale("present (suboptimal)")
            }
            PresentOutcome::OutOfDate => self.handle_stale("present"),
        }
    }

    /// Window-size notification from the frame driver. A zero size pauses
    /// frame advance; any other change schedules a rebuild.
    pub fn notify_resized(&mut self, extent: Extent2D) {
        if extent.is_zero() {
            if self.state != EngineState::Paused {
                info!("surface extent {extent}: pausing");
            }
            self.transition(EngineState::Paused);
            return;
        }
        let current = self.swapchain.as_ref().map(|sc| sc.extent());
        if current != Some(extent) || self.state == EngineState::Paused {
            debug!("surface extent {extent}: rebuild scheduled");
            self.resize_pending = true;
        }
    }

    /// Replaces the camera transform and re-records every per-image
    /// command buffer. While a rebuild is pending the transform is only
    /// stored; the rebuild records it.
    pub fn set_camera(&mut self, camera: CameraTransform) -> Result<(), PresentError> {
        self.config.camera = camera;
        if self.resize_pending || self.state == EngineState::Paused {
            return Ok(());
        }
        let Some(swapchain) = &self.swapchain else {
            return Ok(());
        };
        // Re-recording a pending command buffer is undefined.
        self.device
            .wait_idle()
            .map_err(PresentError::device("device wait idle"))?;
        for (i, (&cmd, &fb)) in self
            .command_buffers
            .iter()
            .zip(swapchain.framebuffers())
            .enumerate()
        {
            let target = DrawTarget {
                image_index: i as u32,
                framebuffer: fb,
                extent: swapchain.extent(),
            };
            self.device
                .record_draw(cmd, &target, &self.config.camera)
                .map_err(PresentError::device("record command buffer"))?;
        }
        Ok(())
    }

    /// Drains the device, destroys everything the engine owns and returns
    /// the backend for its own teardown.
    pub fn shutdown(mut self) -> B {
        if let Err(e) = self.device.wait_idle() {
            warn!("device wait idle failed during shutdown: {e}");
        }
        if !self.command_buffers.is_empty() {
            self.device.free_command_buffers(&self.command_buffers);
        }
        if let Some(swapchain) = self.swapchain.take() {
            swapchain.destroy(&mut self.device);
        }
        self.frames.destroy(&mut self.device);
        info!("presentation shut down after {} frames", self.frame);
        self.device
    }

    pub fn frame_counter(&self) -> u64 {
        self.frame
    }

    pub fn state(&self) -> EngineState {
        self.state
    }

    pub fn frames_in_flight(&self) -> usize {
        self.frames.len()
    }

    pub fn recreations(&self) -> u64 {
        self.recreations
    }

    pub fn swapchain(&self) -> Option<&Swapchain> {
        self.swapchain.as_ref()
    }

    pub fn image_count(&self) -> usize {
        self.swapchain.as_ref().map_or(0, Swapchain::image_count)
    }

    pub fn extent(&self) -> Option<Extent2D> {
        self.swapchain.as_ref().map(Swapchain::extent)
    }

    pub fn surface_format(&self) -> Option<SurfaceFormat> {
        self.swapchain.as_ref().map(Swapchain::surface_format)
    }

    pub fn present_mode(&self) -> Option<PresentMode> {
        self.swapchain.as_ref().map(Swapchain::present_mode)
    }

    pub fn command_buffers(&self) -> &[CommandBufferHandle] {
        &self.command_buffers
    }

    pub fn device(&self) -> &B {
        &self.device
    }

    pub fn device_mut(&mut self) -> &mut B {
        &mut self.device
    }

    fn transition(&mut self, next: EngineState) {
        if self.state != next {
            trace!("{:?} -> {:?} (frame {})", self.state, next, self.frame);
            self.state = next;
        }
    }

    fn wait_fence(&mut self, fence: FenceHandle) -> Result<(), PresentError> {
        self.device
            .wait_for_fence(fence, self.config.fence_timeout)
            .map_err(|e| self.fence_error("fence wait", e))
    }

    fn fence_error(&self, op: &'static str, e: DeviceError) -> PresentError {
        match (e, self.config.fence_timeout) {
            (DeviceError::Timeout, Some(limit)) => PresentError::FenceTimeout(limit),
            (e, _) => PresentError::Device { op, source: e },
        }
    }

    fn handle_stale(&mut self, origin: &str) -> Result<FrameStatus, PresentError> {
        self.transition(EngineState::Stale);
        self.consecutive_stale += 1;
        if self.consecutive_stale > self.config.max_stale_retries {
            return Err(PresentError::PersistentlyStale {
                attempts: self.consecutive_stale - 1,
            });
        }
        info!(
            "swap chain out of date at {origin} (frame {}, attempt {}); recreating",
            self.frame, self.consecutive_stale
        );
        match self.rebuild()? {
            Rebuild::Done => Ok(FrameStatus::Recovered),
            Rebuild::Paused => Ok(FrameStatus::Paused),
        }
    }

    fn rebuild(&mut self) -> Result<Rebuild, PresentError> {
        let extent = (self.extent_source)();
        if extent.is_zero() {
            if self.state != EngineState::Paused {
                info!("surface extent {extent}: pausing");
            }
            self.transition(EngineState::Paused);
            return Ok(Rebuild::Paused);
        }

        // A surface with no area keeps the current chain alive until it grows.
        let support = self
            .device
            .surface_support()
            .map_err(PresentError::construction("surface query"))?;
        let surface_extent = choose_extent(&support.capabilities, extent);
        if surface_extent.is_zero() {
            if self.state != EngineState::Paused {
                info!("surface extent {surface_extent}: pausing");
            }
            self.transition(EngineState::Paused);
            return Ok(Rebuild::Paused);
        }

        // Destroying a chain whose images are still in use is undefined.
        self.device
            .wait_idle()
            .map_err(PresentError::device("device wait idle"))?;

        // Command buffers reference the old framebuffers by index; they are
        // never carried across a rebuild.
        if !self.command_buffers.is_empty() {
            self.device.free_command_buffers(&self.command_buffers);
            self.command_buffers.clear();
        }

        let old = self.swapchain.take().map(|sc| sc.retire(&mut self.device));
        let built = Swapchain::build(&mut self.device, &self.config.policy, extent, old);
        if let Some(old) = old {
            self.device.destroy_swapchain(old);
        }
        let swapchain = match built {
            Ok(sc) => sc,
            // The surface itself reports no area even though the window does.
            Err(PresentError::ZeroExtent(extent)) => {
                info!("surface extent {extent}: pausing");
                self.transition(EngineState::Paused);
                return Ok(Rebuild::Paused);
            }
            Err(e) => return Err(e),
        };

        self.images_in_flight = ImagesInFlight::new(swapchain.image_count());
        self.command_buffers = match record_all(&mut self.device, &swapchain, &self.config.camera) {
            Ok(bufs) => bufs,
            Err(e) => {
                swapchain.destroy(&mut self.device);
                return Err(e);
            }
        };
        self.swapchain = Some(swapchain);
        self.resize_pending = false;
        self.recreations += 1;
        self.transition(EngineState::Idle);
        Ok(Rebuild::Done)
    }
}

fn record_all<B: Backend>(
    device: &mut B,
    swapchain: &Swapchain,
    camera: &CameraTransform,
) -> Result<Vec<CommandBufferHandle>, PresentError> {
    let count = swapchain.image_count() as u32;
    let buffers = device
        .allocate_command_buffers(count)
        .map_err(PresentError::construction("command buffers"))?;

    for (i, (&cmd, &fb)) in buffers.iter().zip(swapchain.framebuffers()).enumerate() {
        let target = DrawTarget {
            image_index: i as u32,
            framebuffer: fb,
            extent: swapchain.extent(),
        };
        if let Err(e) = device.record_draw(cmd, &target, camera) {
            device.free_command_buffers(&buffers);
            return Err(PresentError::construction("command buffer recording")(e));
        }
    }
    Ok(buffers)
}
