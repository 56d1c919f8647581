// SPDX-License-Identifier: CEPL-1.0
//! In-memory backend with a virtual GPU clock.
//!
//! Submissions retire `gpu_latency` after the previous one (the queue is
//! serial). Waiting on a fence advances the clock to its retirement time.
//! Misuse of the sync protocol (double-signalled semaphores, resetting a
//! pending fence, destroying something the GPU still uses) is recorded in
//! [`MockDevice::violations`] instead of panicking, so tests can assert on it.
use std::collections::{HashMap, VecDeque};
use std::time::Duration;

use ember_core::{DeviceError, Extent2D};
use tracing::trace;

use crate::backend::{
    AcquireOutcome, CameraTransform, DrawTarget, PresentOutcome, PresentQueue, ResourceFactory,
    Submission, SurfaceProbe, SwapchainDesc,
};
use crate::format::{
    PixelFormat, PresentMode, SurfaceCapabilities, SurfaceFormat, SurfaceSupport,
};
use crate::handle::{
    CommandBufferHandle, FenceHandle, FramebufferHandle, ImageHandle, ImageViewHandle,
    SemaphoreHandle, SwapchainHandle,
};
use crate::probe::QueueFamilyIndices;

#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum ObjectKind {
    Swapchain,
    ImageView,
    Framebuffer,
    CommandBuffer,
    Semaphore,
    Fence,
}

/// Scripted result for the next acquire.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum AcquireScript {
    OutOfDate,
    Suboptimal,
    Fail(DeviceError),
}

/// Scripted result for the next present.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum PresentScript {
    Suboptimal,
    OutOfDate,
    Fail(DeviceError),
}

#[derive(Clone, Debug, PartialEq)]
pub enum Call {
    CreateSwapchain(SwapchainDesc),
    DestroySwapchain(SwapchainHandle),
    PrepareTargets(SurfaceFormat, Extent2D),
    AllocateCommandBuffers(u32),
    FreeCommandBuffers(usize),
    RecordDraw { image_index: u32 },
    WaitFence(FenceHandle),
    ResetFence(FenceHandle),
    Acquire(AcquireOutcome),
    Submit(Submission),
    Present { image_index: u32, outcome: PresentOutcome },
    WaitIdle,
}

#[derive(Clone, Debug, Default, PartialEq)]
pub struct MockStats {
    pub submits: u64,
    pub presents: u64,
    /// Highest number of submissions not yet retired at any submit.
    pub max_outstanding: usize,
    /// Longest single fence wait.
    pub max_block: Duration,
    pub total_block: Duration,
    pub recordings: u64,
    pub last_camera: Option<CameraTransform>,
}

#[derive(Clone, Copy, Debug, PartialEq)]
enum FenceState {
    Signaled,
    Unsignaled,
    Pending { retire_at: Duration },
    /// Submitted to a GPU that stopped making progress.
    Hung,
}

#[derive(Debug)]
struct ChainState {
    images: Vec<ImageHandle>,
    extent: Extent2D,
    next_image: u32,
    retired: bool,
}

#[derive(Debug)]
pub struct MockDevice {
    queues: QueueFamilyIndices,
    support: SurfaceSupport,
    gpu_latency: Duration,
    hung: bool,

    now: Duration,
    gpu_free_at: Duration,
    next_id: u64,

    live: HashMap<u64, ObjectKind>,
    chains: HashMap<u64, ChainState>,
    fences: HashMap<u64, FenceState>,
    /// Semaphores with a signal operation that has not been waited yet.
    signaled_semaphores: HashMap<u64, bool>,
    /// Command buffer → fence of the submission that last used it.
    cmd_in_use: HashMap<u64, FenceHandle>,

    acquire_script: VecDeque<AcquireScript>,
    present_script: VecDeque<PresentScript>,
    fail_swapchains: u32,
    fail_framebuffers: u32,
    fail_command_buffers: u32,

    calls: Vec<Call>,
    violations: Vec<String>,
    stats: MockStats,
}

impl Default for MockDevice {
    fn default() -> Self {
        Self::new(Self::standard_support(), Self::shared_queues())
    }
}

impl MockDevice {
    pub fn new(support: SurfaceSupport, queues: QueueFamilyIndices) -> Self {
        Self {
            queues,
            support,
            gpu_latency: Duration::from_millis(4),
            hung: false,
            now: Duration::ZERO,
            gpu_free_at: Duration::ZERO,
            next_id: 1,
            live: HashMap::new(),
            chains: HashMap::new(),
            fences: HashMap::new(),
            signaled_semaphores: HashMap::new(),
            cmd_in_use: HashMap::new(),
            acquire_script: VecDeque::new(),
            present_script: VecDeque::new(),
            fail_swapchains: 0,
            fail_framebuffers: 0,
            fail_command_buffers: 0,
            calls: Vec::new(),
            violations: Vec::new(),
            stats: MockStats::default(),
        }
    }

    /// min 2 / max 8 images, free-sized surface, BGRA8 sRGB, FIFO + mailbox.
    pub fn standard_support() -> SurfaceSupport {
        SurfaceSupport {
            capabilities: SurfaceCapabilities {
                min_image_count: 2,
                max_image_count: 8,
                current_extent: None,
                min_extent: Extent2D::new(1, 1),
                max_extent: Extent2D::new(4096, 4096),
            },
            formats: vec![
                SurfaceFormat::BGRA8_UNORM_SRGB,
                SurfaceFormat {
                    format: PixelFormat::Rgba8Unorm,
                    ..SurfaceFormat::BGRA8_UNORM_SRGB
                },
            ],
            present_modes: vec![PresentMode::Fifo, PresentMode::Mailbox],
        }
    }

    pub fn shared_queues() -> QueueFamilyIndices {
        QueueFamilyIndices {
            graphics: Some(0),
            compute: Some(0),
            present: Some(0),
        }
    }

    pub fn with_gpu_latency(mut self, latency: Duration) -> Self {
        self.gpu_latency = latency;
        self
    }

    pub fn set_queue_families(&mut self, queues: QueueFamilyIndices) {
        self.queues = queues;
    }

    pub fn support_mut(&mut self) -> &mut SurfaceSupport {
        &mut self.support
    }

    /// Pins the surface to `extent`; chains of any other size go out of date.
    pub fn set_surface_extent(&mut self, extent: Extent2D) {
        self.support.capabilities.current_extent = Some(extent);
    }

    /// Submissions made from now on never retire.
    pub fn hang_gpu(&mut self) {
        self.hung = true;
    }

    pub fn script_acquire(&mut self, outcome: AcquireScript) {
        self.acquire_script.push_back(outcome);
    }

    pub fn script_present(&mut self, outcome: PresentScript) {
        self.present_script.push_back(outcome);
    }

    pub fn fail_next_swapchains(&mut self, count: u32) {
        self.fail_swapchains = count;
    }

    pub fn fail_next_framebuffers(&mut self, count: u32) {
        self.fail_framebuffers = count;
    }

    pub fn fail_next_command_buffers(&mut self, count: u32) {
        self.fail_command_buffers = count;
    }

    pub fn now(&self) -> Duration {
        self.now
    }

    pub fn calls(&self) -> &[Call] {
        &self.calls
    }

    pub fn clear_calls(&mut self) {
        self.calls.clear();
    }

    pub fn violations(&self) -> &[String] {
        &self.violations
    }

    pub fn stats(&self) -> &MockStats {
        &self.stats
    }

    pub fn live_objects(&self) -> usize {
        self.live.len()
    }

    pub fn live_count(&self, kind: ObjectKind) -> usize {
        self.live.values().filter(|k| **k == kind).count()
    }

    /// Descriptors of every swap chain created so far, oldest first.
    pub fn swapchain_requests(&self) -> Vec<SwapchainDesc> {
        self.calls
            .iter()
            .filter_map(|c| match c {
                Call::CreateSwapchain(desc) => Some(*desc),
                _ => None,
            })
            .collect()
    }

    pub fn count_calls(&self, pred: impl Fn(&Call) -> bool) -> usize {
        self.calls.iter().filter(|c| pred(c)).count()
    }

    fn alloc(&mut self, kind: ObjectKind) -> u64 {
        let id = self.next_id;
        self.next_id += 1;
        self.live.insert(id, kind);
        id
    }

    fn release(&mut self, id: u64, kind: ObjectKind) {
        match self.live.remove(&id) {
            Some(k) if k == kind => {}
            Some(k) => self.violation(format!("{kind:?} destroy on object {id} of kind {k:?}")),
            None => self.violation(format!("{kind:?} {id} destroyed twice or never created")),
        }
    }

    fn violation(&mut self, msg: String) {
        trace!("mock violation: {msg}");
        self.violations.push(msg);
    }

    fn fence_state(&self, fence: FenceHandle) -> Option<FenceState> {
        self.fences.get(&fence.as_raw()).map(|s| match *s {
            FenceState::Pending { retire_at } if retire_at <= self.now => FenceState::Signaled,
            other => other,
        })
    }

    fn outstanding(&self) -> usize {
        self.fences
            .values()
            .filter(|s| match s {
                FenceState::Pending { retire_at } => *retire_at > self.now,
                FenceState::Hung => true,
                _ => false,
            })
            .count()
    }

    fn in_use(&self, cmd: CommandBufferHandle) -> bool {
        self.cmd_in_use
            .get(&cmd.as_raw())
            .and_then(|f| self.fence_state(*f))
            .is_some_and(|s| matches!(s, FenceState::Pending { .. } | FenceState::Hung))
    }

    fn wait_semaphore(&mut self, sem: SemaphoreHandle, op: &str) {
        let raw = sem.as_raw();
        match self.signaled_semaphores.get(&raw).copied() {
            Some(true) => {
                self.signaled_semaphores.insert(raw, false);
            }
            Some(false) => self.violation(format!("{op} waits on semaphore {raw} with no pending signal")),
            None => self.violation(format!("{op} waits on unknown semaphore {raw}")),
        }
    }

    fn signal_semaphore(&mut self, sem: SemaphoreHandle, op: &str) {
        let raw = sem.as_raw();
        match self.signaled_semaphores.get(&raw).copied() {
            Some(false) => {
                self.signaled_semaphores.insert(raw, true);
            }
            Some(true) => self.violation(format!("{op} signals semaphore {raw} that is already signalled")),
            None => self.violation(format!("{op} signals unknown semaphore {raw}")),
        }
    }

    fn chain_out_of_date(&self, extent: Extent2D) -> bool {
        self.support
            .capabilities
            .current_extent
            .is_some_and(|current| current != extent)
    }
}

impl SurfaceProbe for MockDevice {
    fn queue_families(&self) -> QueueFamilyIndices {
        self.queues
    }

    fn surface_support(&self) -> Result<SurfaceSupport, DeviceError> {
        Ok(self.support.clone())
    }
}

impl ResourceFactory for MockDevice {
    fn create_swapchain(&mut self, desc: &SwapchainDesc) -> Result<SwapchainHandle, DeviceError> {
        self.calls.push(Call::CreateSwapchain(*desc));
        if self.fail_swapchains > 0 {
            self.fail_swapchains -= 1;
            return Err(DeviceError::OutOfMemory);
        }
        if let Some(old) = desc.old_swapchain {
            match self.chains.get_mut(&old.as_raw()) {
                Some(chain) => chain.retired = true,
                None => self.violation(format!("old swap chain {} is not alive", old.as_raw())),
            }
        }

        let id = self.alloc(ObjectKind::Swapchain);
        let mut images = Vec::with_capacity(desc.image_count as usize);
        for _ in 0..desc.image_count {
            images.push(ImageHandle::from_raw(self.next_id));
            self.next_id += 1;
        }
        self.chains.insert(
            id,
            ChainState {
                images,
                extent: desc.extent,
                next_image: 0,
                retired: false,
            },
        );
        Ok(SwapchainHandle::from_raw(id))
    }

    fn swapchain_images(&self, swapchain: SwapchainHandle) -> Result<Vec<ImageHandle>, DeviceError> {
        self.chains
            .get(&swapchain.as_raw())
            .map(|c| c.images.clone())
            .ok_or(DeviceError::Native {
                op: "swapchain_images",
                code: -1,
            })
    }

    fn destroy_swapchain(&mut self, swapchain: SwapchainHandle) {
        self.calls.push(Call::DestroySwapchain(swapchain));
        if self.outstanding() > 0 {
            self.violation(format!("swap chain {} destroyed while GPU busy", swapchain.as_raw()));
        }
        self.chains.remove(&swapchain.as_raw());
        self.release(swapchain.as_raw(), ObjectKind::Swapchain);
    }

    fn create_image_view(
        &mut self,
        _image: ImageHandle,
        _format: PixelFormat,
    ) -> Result<ImageViewHandle, DeviceError> {
        Ok(ImageViewHandle::from_raw(self.alloc(ObjectKind::ImageView)))
    }

    fn destroy_image_view(&mut self, view: ImageViewHandle) {
        self.release(view.as_raw(), ObjectKind::ImageView);
    }

    fn prepare_targets(&mut self, format: SurfaceFormat, extent: Extent2D) -> Result<(), DeviceError> {
        self.calls.push(Call::PrepareTargets(format, extent));
        Ok(())
    }

    fn create_framebuffer(
        &mut self,
        _view: ImageViewHandle,
        _extent: Extent2D,
    ) -> Result<FramebufferHandle, DeviceError> {
        if self.fail_framebuffers > 0 {
            self.fail_framebuffers -= 1;
            return Err(DeviceError::OutOfMemory);
        }
        Ok(FramebufferHandle::from_raw(self.alloc(ObjectKind::Framebuffer)))
    }

    fn destroy_framebuffer(&mut self, framebuffer: FramebufferHandle) {
        self.release(framebuffer.as_raw(), ObjectKind::Framebuffer);
    }

    fn allocate_command_buffers(&mut self, count: u32) -> Result<Vec<CommandBufferHandle>, DeviceError> {
        self.calls.push(Call::AllocateCommandBuffers(count));
        if self.fail_command_buffers > 0 {
            self.fail_command_buffers -= 1;
            return Err(DeviceError::OutOfMemory);
        }
        Ok((0..count)
            .map(|_| CommandBufferHandle::from_raw(self.alloc(ObjectKind::CommandBuffer)))
            .collect())
    }

    fn free_command_buffers(&mut self, buffers: &[CommandBufferHandle]) {
        self.calls.push(Call::FreeCommandBuffers(buffers.len()));
        for &cmd in buffers {
            if self.in_use(cmd) {
                self.violation(format!("command buffer {} freed while pending", cmd.as_raw()));
            }
            self.cmd_in_use.remove(&cmd.as_raw());
            self.release(cmd.as_raw(), ObjectKind::CommandBuffer);
        }
    }

    fn record_draw(
        &mut self,
        command_buffer: CommandBufferHandle,
        target: &DrawTarget,
        camera: &CameraTransform,
    ) -> Result<(), DeviceError> {
        self.calls.push(Call::RecordDraw {
            image_index: target.image_index,
        });
        if self.in_use(command_buffer) {
            self.violation(format!("command buffer {} re-recorded while pending", command_buffer.as_raw()));
        }
        self.stats.recordings += 1;
        self.stats.last_camera = Some(*camera);
        Ok(())
    }

    fn create_semaphore(&mut self) -> Result<SemaphoreHandle, DeviceError> {
        let id = self.alloc(ObjectKind::Semaphore);
        self.signaled_semaphores.insert(id, false);
        Ok(SemaphoreHandle::from_raw(id))
    }

    fn destroy_semaphore(&mut self, semaphore: SemaphoreHandle) {
        self.signaled_semaphores.remove(&semaphore.as_raw());
        self.release(semaphore.as_raw(), ObjectKind::Semaphore);
    }

    fn create_fence(&mut self, signaled: bool) -> Result<FenceHandle, DeviceError> {
        let id = self.alloc(ObjectKind::Fence);
        let state = if signaled {
            FenceState::Signaled
        } else {
            FenceState::Unsignaled
        };
        self.fences.insert(id, state);
        Ok(FenceHandle::from_raw(id))
    }

    fn destroy_fence(&mut self, fence: FenceHandle) {
        if let Some(FenceState::Pending { .. } | FenceState::Hung) = self.fence_state(fence) {
            self.violation(format!("fence {} destroyed while pending", fence.as_raw()));
        }
        self.fences.remove(&fence.as_raw());
        self.release(fence.as_raw(), ObjectKind::Fence);
    }
}

impl PresentQueue for MockDevice {
    fn wait_for_fence(&mut self, fence: FenceHandle, timeout: Option<Duration>) -> Result<(), DeviceError> {
        self.calls.push(Call::WaitFence(fence));
        let Some(state) = self.fence_state(fence) else {
            self.violation(format!("wait on unknown fence {}", fence.as_raw()));
            return Err(DeviceError::Native {
                op: "wait_for_fence",
                code: -1,
            });
        };
        match state {
            FenceState::Signaled => Ok(()),
            FenceState::Pending { retire_at } => {
                let blocked = retire_at - self.now;
                if let Some(limit) = timeout.filter(|t| blocked > *t) {
                    self.now += limit;
                    return Err(DeviceError::Timeout);
                }
                self.now = retire_at;
                self.stats.max_block = self.stats.max_block.max(blocked);
                self.stats.total_block += blocked;
                Ok(())
            }
            FenceState::Unsignaled | FenceState::Hung => {
                if state == FenceState::Unsignaled {
                    self.violation(format!("wait on fence {} that was never submitted", fence.as_raw()));
                }
                match timeout {
                    Some(limit) => {
                        self.now += limit;
                        Err(DeviceError::Timeout)
                    }
                    // A real driver would block forever.
                    None => Err(DeviceError::DeviceLost),
                }
            }
        }
    }

    fn reset_fence(&mut self, fence: FenceHandle) -> Result<(), DeviceError> {
        self.calls.push(Call::ResetFence(fence));
        match self.fence_state(fence) {
            Some(FenceState::Pending { .. } | FenceState::Hung) => {
                self.violation(format!("fence {} reset while pending", fence.as_raw()));
            }
            None => {
                return Err(DeviceError::Native {
                    op: "reset_fence",
                    code: -1,
                })
            }
            _ => {}
        }
        self.fences.insert(fence.as_raw(), FenceState::Unsignaled);
        Ok(())
    }

    fn acquire_next_image(
        &mut self,
        swapchain: SwapchainHandle,
        signal: SemaphoreHandle,
        _timeout: Option<Duration>,
    ) -> Result<AcquireOutcome, DeviceError> {
        let scripted = self.acquire_script.pop_front();
        if let Some(AcquireScript::Fail(e)) = scripted {
            return Err(e);
        }

        let raw = swapchain.as_raw();
        let Some((retired, extent, count, next)) = self
            .chains
            .get(&raw)
            .map(|c| (c.retired, c.extent, c.images.len() as u32, c.next_image))
        else {
            self.violation(format!("acquire on dead swap chain {raw}"));
            return Err(DeviceError::SurfaceLost);
        };
        if retired {
            self.violation(format!("acquire on retired swap chain {raw}"));
            return Ok(AcquireOutcome::OutOfDate);
        }
        let count = count.max(1);
        let image_index = next % count;

        let outcome = if scripted == Some(AcquireScript::OutOfDate) || self.chain_out_of_date(extent) {
            AcquireOutcome::OutOfDate
        } else {
            if let Some(chain) = self.chains.get_mut(&raw) {
                chain.next_image = (image_index + 1) % count;
            }
            self.signal_semaphore(signal, "acquire");
            AcquireOutcome::Acquired {
                image_index,
                suboptimal: scripted == Some(AcquireScript::Suboptimal),
            }
        };
        self.calls.push(Call::Acquire(outcome));
        Ok(outcome)
    }

    fn submit(&mut self, submission: &Submission) -> Result<(), DeviceError> {
        self.calls.push(Call::Submit(*submission));
        if self.live.get(&submission.command_buffer.as_raw()) != Some(&ObjectKind::CommandBuffer) {
            self.violation(format!("submit of dead command buffer {}", submission.command_buffer.as_raw()));
        }
        if self.in_use(submission.command_buffer) {
            self.violation(format!("command buffer {} submitted while pending", submission.command_buffer.as_raw()));
        }
        match self.fence_state(submission.fence) {
            Some(FenceState::Unsignaled) => {}
            other => self.violation(format!(
                "submit with fence {} in state {other:?}",
                submission.fence.as_raw()
            )),
        }
        self.wait_semaphore(submission.wait, "submit");
        self.signal_semaphore(submission.signal, "submit");

        let state = if self.hung {
            FenceState::Hung
        } else {
            let retire_at = self.now.max(self.gpu_free_at) + self.gpu_latency;
            self.gpu_free_at = retire_at;
            FenceState::Pending { retire_at }
        };
        self.fences.insert(submission.fence.as_raw(), state);
        self.cmd_in_use
            .insert(submission.command_buffer.as_raw(), submission.fence);

        self.stats.submits += 1;
        self.stats.max_outstanding = self.stats.max_outstanding.max(self.outstanding());
        Ok(())
    }

    fn present(
        &mut self,
        swapchain: SwapchainHandle,
        image_index: u32,
        wait: SemaphoreHandle,
    ) -> Result<PresentOutcome, DeviceError> {
        // The wait is consumed whatever the outcome.
        self.wait_semaphore(wait, "present");

        let scripted = self.present_script.pop_front();
        let Some((extent, count)) = self
            .chains
            .get(&swapchain.as_raw())
            .map(|c| (c.extent, c.images.len()))
        else {
            self.violation(format!("present on dead swap chain {}", swapchain.as_raw()));
            return Err(DeviceError::SurfaceLost);
        };
        if image_index as usize >= count {
            self.violation(format!("present of image {image_index} out of range"));
        }

        let outcome = match scripted {
            Some(PresentScript::Fail(e)) => return Err(e),
            Some(PresentScript::OutOfDate) => PresentOutcome::OutOfDate,
            Some(PresentScript::Suboptimal) => PresentOutcome::Suboptimal,
            None if self.chain_out_of_date(extent) => PresentOutcome::OutOfDate,
            None => PresentOutcome::Presented,
        };
        if outcome != PresentOutcome::OutOfDate {
            self.stats.presents += 1;
        }
        self.calls.push(Call::Present {
            image_index,
            outcome,
        });
        Ok(outcome)
    }

    fn wait_idle(&mut self) -> Result<(), DeviceError> {
        self.calls.push(Call::WaitIdle);
        if self.fences.values().any(|s| *s == FenceState::Hung) {
            return Err(DeviceError::DeviceLost);
        }
        self.now = self.now.max(self.gpu_free_at);
        Ok(())
    }
}
