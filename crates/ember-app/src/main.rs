// SPDX-License-Identifier: CEPL-1.0
#![deny(unsafe_op_in_unsafe_fn)]
mod config;

use std::path::PathBuf;
use std::sync::Arc;
use std::time::Instant;

use anyhow::{Context, Result};
use clap::Parser;
use ember_core::{init_tracing, Extent2D};
use ember_math::Camera;
use ember_platform::{extent_source, framebuffer_extent};
use ember_render::{Backend, EngineState, FrameStatus, PresentationEngine};
use ember_render_vk::VkBackend;
use tracing::{debug, error, info};

use ember_platform::winit::{
    application::ApplicationHandler,
    dpi::PhysicalSize,
    event::WindowEvent,
    event_loop::{ActiveEventLoop, ControlFlow, EventLoop},
    window::{Window, WindowId},
};

use crate::config::AppCfg;

#[derive(Parser, Debug)]
#[command(author, version, about, long_about = None)]
struct Args {
    /// Config file; defaults to ./ember.toml
    #[arg(long)]
    config: Option<PathBuf>,
    /// Enable VK_LAYER_KHRONOS_validation and route its messages to the log
    #[arg(long)]
    validation: bool,
    /// Override render.frames_in_flight
    #[arg(long)]
    frames_in_flight: Option<usize>,
}

struct App {
    cfg: AppCfg,
    validation: bool,
    window: Option<Arc<Window>>,
    engine: Option<PresentationEngine<VkBackend>>,
    fatal: Option<anyhow::Error>,

    frames: u32,
    last_fps_instant: Instant,
}

impl App {
    fn start(&mut self, event_loop: &ActiveEventLoop) -> Result<()> {
        let w = &self.cfg.window;
        let attrs = Window::default_attributes()
            .with_title(w.title.clone())
            .with_inner_size(PhysicalSize::new(w.width, w.height));
        let window = Arc::new(event_loop.create_window(attrs).context("create_window")?);

        let backend = VkBackend::new(window.as_ref(), &self.cfg.vk_config(self.validation))
            .context("vulkan backend")?;

        let extent = framebuffer_extent(&window);
        let mut present = self.cfg.present_config();
        present.camera = self.cfg.camera.camera().transform(extent.aspect());
        let engine = PresentationEngine::init(backend, extent, extent_source(window.clone()), present)
            .context("presentation init")?;

        info!(
            "presenting {} images at {} ({:?}, {:?}), {} frames in flight",
            engine.image_count(),
            extent,
            engine.surface_format(),
            engine.present_mode(),
            engine.frames_in_flight()
        );
        window.request_redraw();
        self.window = Some(window);
        self.engine = Some(engine);
        Ok(())
    }

    fn fail(&mut self, event_loop: &ActiveEventLoop, err: anyhow::Error) {
        error!("fatal: {err:#}");
        self.fatal = Some(err);
        self.teardown();
        event_loop.exit();
    }

    // STRICT TEARDOWN ORDER: engine objects, then the backend (via Drop), then the window.
    fn teardown(&mut self) {
        if let Some(engine) = self.engine.take() {
            drop(engine.shutdown());
        }
        self.window = None;
    }

    fn resized(&mut self, event_loop: &ActiveEventLoop, size: PhysicalSize<u32>) {
        let extent = Extent2D::new(size.width, size.height);
        let Some(engine) = &mut self.engine else {
            return;
        };
        if let Err(e) = apply_resize(engine, &self.cfg.camera.camera(), extent) {
            self.fail(event_loop, e);
            return;
        }
        if !extent.is_zero() {
            if let Some(w) = &self.window {
                w.request_redraw();
            }
        }
    }

    fn redraw(&mut self, event_loop: &ActiveEventLoop) {
        let Some(engine) = &mut self.engine else {
            return;
        };
        match engine.advance_frame() {
            Ok(FrameStatus::Presented { frame, image_index }) => {
                debug!("frame {frame} presented image {image_index}");
                self.frames = self.frames.saturating_add(1);
            }
            Ok(FrameStatus::Recovered) => info!("swap chain rebuilt ({} so far)", engine.recreations()),
            Ok(FrameStatus::Paused) => {}
            Err(e) => self.fail(event_loop, anyhow::Error::new(e).context("advance_frame")),
        }
    }
}

/// Forwards a window resize to the engine and refreshes the camera aspect.
fn apply_resize<B: Backend>(
    engine: &mut PresentationEngine<B>,
    camera: &Camera,
    extent: Extent2D,
) -> Result<()> {
    engine.notify_resized(extent);
    if extent.is_zero() {
        info!("minimized; presentation paused");
        return Ok(());
    }
    // Only stored while the rebuild scheduled above is pending.
    engine
        .set_camera(camera.transform(extent.aspect()))
        .context("set_camera")
}

impl ApplicationHandler for App {
    fn resumed(&mut self, event_loop: &ActiveEventLoop) {
        if self.window.is_some() || self.fatal.is_some() {
            return;
        }
        if let Err(e) = self.start(event_loop) {
            self.fail(event_loop, e);
        }
    }

    fn window_event(&mut self, event_loop: &ActiveEventLoop, window_id: WindowId, event: WindowEvent) {
        if let Some(window) = &self.window {
            if window_id != window.id() {
                return;
            }
        }

        match event {
            WindowEvent::CloseRequested => {
                info!("CloseRequested");
                self.teardown();
                event_loop.exit();
            }
            WindowEvent::Resized(size) => self.resized(event_loop, size),
            WindowEvent::RedrawRequested => self.redraw(event_loop),
            _ => {}
        }
    }

    fn about_to_wait(&mut self, event_loop: &ActiveEventLoop) {
        let Some(engine) = &self.engine else {
            return;
        };

        if engine.state() == EngineState::Paused {
            // Nothing to draw until a non-zero resize arrives.
            event_loop.set_control_flow(ControlFlow::Wait);
            self.frames = 0;
        } else {
            event_loop.set_control_flow(ControlFlow::Poll);
            if let Some(w) = &self.window {
                w.request_redraw();
            }
        }

        let now = Instant::now();
        if now.duration_since(self.last_fps_instant).as_secs_f32() >= 1.0 {
            info!("fps ~ {} (frame {})", self.frames, engine.frame_counter());
            self.frames = 0;
            self.last_fps_instant = now;
        }
    }
}

fn main() -> Result<()> {
    init_tracing();
    let args = Args::parse();

    let mut cfg = config::load(args.config.as_deref());
    if let Some(n) = args.frames_in_flight {
        cfg.render.frames_in_flight = n;
    }

    let event_loop: EventLoop<()> = EventLoop::new()?;
    let mut app = App {
        cfg,
        validation: args.validation,
        window: None,
        engine: None,
        fatal: None,
        frames: 0,
        last_fps_instant: Instant::now(),
    };

    event_loop.run_app(&mut app)?;
    match app.fatal.take() {
        Some(e) => Err(e),
        None => Ok(()),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use ember_render::mock::{Call, MockDevice};
    use ember_render::{PresentConfig, PresentError};

    fn engine() -> PresentationEngine<MockDevice> {
        let extent = Extent2D::new(800, 600);
        PresentationEngine::init(MockDevice::default(), extent, move || extent, PresentConfig::default())
            .unwrap()
    }

    #[test]
    fn device_loss_during_camera_update_is_fatal() {
        let mut engine = engine();
        engine.device_mut().hang_gpu();
        engine.advance_frame().unwrap();

        let err = apply_resize(&mut engine, &Camera::default(), Extent2D::new(800, 600)).unwrap_err();
        let present = err.downcast_ref::<PresentError>().expect("engine error");
        assert!(present.is_device_loss());
    }

    #[test]
    fn resize_defers_recording_to_rebuild() {
        let mut engine = engine();
        engine.advance_frame().unwrap();
        engine.device_mut().clear_calls();

        apply_resize(&mut engine, &Camera::default(), Extent2D::new(1024, 768)).unwrap();
        let calls = engine
            .device()
            .count_calls(|c| matches!(c, Call::WaitIdle | Call::RecordDraw { .. }));
        assert_eq!(calls, 0);
    }

    #[test]
    fn minimize_pauses_without_touching_the_device() {
        let mut engine = engine();
        engine.device_mut().clear_calls();
        apply_resize(&mut engine, &Camera::default(), Extent2D::new(0, 0)).unwrap();
        assert_eq!(engine.state(), EngineState::Paused);
        assert!(engine.device().calls().is_empty());
    }
}
