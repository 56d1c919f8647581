// SPDX-License-Identifier: CEPL-1.0
use std::fs;
use std::path::{Path, PathBuf};
use std::time::Duration;

use ember_math::{Camera, Vec3};
use ember_render::{
    ColorSpace, PixelFormat, PresentConfig, PresentMode, SurfaceFormat, SwapchainPolicy,
    DEFAULT_FRAMES_IN_FLIGHT, IDENTITY_TRANSFORM,
};
use ember_render_vk::VkConfig;
use serde::Deserialize;
use tracing::{info, warn};

pub const DEFAULT_CONFIG_PATH: &str = "ember.toml";

#[derive(Debug, Deserialize, Default, Clone, PartialEq)]
pub struct AppCfg {
    #[serde(default)]
    pub window: WindowCfg,
    #[serde(default)]
    pub render: RenderCfg,
    #[serde(default)]
    pub camera: CameraCfg,
}

#[derive(Debug, Deserialize, Clone, PartialEq)]
#[serde(default)]
pub struct WindowCfg {
    pub title: String,
    pub width: u32,
    pub height: u32,
}

impl Default for WindowCfg {
    fn default() -> Self {
        WindowCfg {
            title: "ember".into(),
            width: 1280,
            height: 720,
        }
    }
}

#[derive(Debug, Clone, Copy, Deserialize, Default, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum PresentModeCfg {
    #[default]
    Fifo,
    Mailbox,
    Immediate,
    FifoRelaxed,
}

impl From<PresentModeCfg> for PresentMode {
    fn from(m: PresentModeCfg) -> Self {
        match m {
            PresentModeCfg::Fifo => PresentMode::Fifo,
            PresentModeCfg::Mailbox => PresentMode::Mailbox,
            PresentModeCfg::Immediate => PresentMode::Immediate,
            PresentModeCfg::FifoRelaxed => PresentMode::FifoRelaxed,
        }
    }
}

#[derive(Debug, Clone, Copy, Deserialize, Default, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum FormatCfg {
    #[default]
    Bgra8Unorm,
    Bgra8Srgb,
    Rgba8Unorm,
    Rgba8Srgb,
}

impl From<FormatCfg> for SurfaceFormat {
    fn from(f: FormatCfg) -> Self {
        let format = match f {
            FormatCfg::Bgra8Unorm => PixelFormat::Bgra8Unorm,
            FormatCfg::Bgra8Srgb => PixelFormat::Bgra8Srgb,
            FormatCfg::Rgba8Unorm => PixelFormat::Rgba8Unorm,
            FormatCfg::Rgba8Srgb => PixelFormat::Rgba8Srgb,
        };
        SurfaceFormat {
            format,
            color_space: ColorSpace::SrgbNonlinear,
        }
    }
}

#[derive(Debug, Deserialize, Clone, PartialEq)]
#[serde(default)]
pub struct RenderCfg {
    pub clear_color: [f32; 4],
    pub frames_in_flight: usize,
    pub max_stale_retries: u32,
    /// 0 waits without bound.
    pub fence_timeout_ms: u64,
    pub present_mode: PresentModeCfg,
    pub preferred_format: FormatCfg,
    pub depth: bool,
    pub vertex_shader: PathBuf,
    pub fragment_shader: PathBuf,
}

impl Default for RenderCfg {
    fn default() -> Self {
        let vk = VkConfig::default();
        RenderCfg {
            clear_color: vk.clear_color,
            frames_in_flight: DEFAULT_FRAMES_IN_FLIGHT,
            max_stale_retries: 3,
            fence_timeout_ms: 0,
            present_mode: PresentModeCfg::Fifo,
            preferred_format: FormatCfg::Bgra8Unorm,
            depth: vk.depth,
            vertex_shader: vk.vertex_shader,
            fragment_shader: vk.fragment_shader,
        }
    }
}

#[derive(Debug, Deserialize, Clone, PartialEq)]
#[serde(default)]
pub struct CameraCfg {
    pub eye: [f32; 3],
    pub target: [f32; 3],
    pub fov_y_degrees: f32,
    pub near: f32,
    pub far: f32,
}

impl Default for CameraCfg {
    fn default() -> Self {
        let cam = Camera::default();
        CameraCfg {
            eye: cam.eye.to_array(),
            target: cam.target.to_array(),
            fov_y_degrees: cam.fov_y.to_degrees(),
            near: cam.near,
            far: cam.far,
        }
    }
}

impl CameraCfg {
    pub fn camera(&self) -> Camera {
        Camera {
            eye: Vec3::from_array(self.eye),
            target: Vec3::from_array(self.target),
            fov_y: self.fov_y_degrees.to_radians(),
            near: self.near,
            far: self.far,
            ..Camera::default()
        }
    }
}

impl AppCfg {
    pub fn present_config(&self) -> PresentConfig {
        let r = &self.render;
        PresentConfig {
            frames_in_flight: r.frames_in_flight,
            max_stale_retries: r.max_stale_retries,
            fence_timeout: (r.fence_timeout_ms > 0).then(|| Duration::from_millis(r.fence_timeout_ms)),
            policy: SwapchainPolicy {
                preferred_format: r.preferred_format.into(),
                present_mode: r.present_mode.into(),
            },
            camera: IDENTITY_TRANSFORM,
        }
    }

    pub fn vk_config(&self, validation: bool) -> VkConfig {
        VkConfig {
            app_name: self.window.title.clone(),
            validation,
            depth: self.render.depth,
            clear_color: self.render.clear_color,
            vertex_shader: self.render.vertex_shader.clone(),
            fragment_shader: self.render.fragment_shader.clone(),
        }
    }
}

pub fn parse(text: &str) -> Result<AppCfg, toml::de::Error> {
    toml::from_str(text)
}

/// Reads `path`, or `ember.toml` when none is given. A missing file yields
/// defaults; a malformed one is reported and ignored.
pub fn load(path: Option<&Path>) -> AppCfg {
    let path = path.unwrap_or_else(|| Path::new(DEFAULT_CONFIG_PATH));
    match fs::read_to_string(path) {
        Ok(s) => match parse(&s) {
            Ok(cfg) => {
                info!("config loaded from {}", path.display());
                cfg
            }
            Err(e) => {
                warn!("ignoring malformed {}: {e}", path.display());
                AppCfg::default()
            }
        },
        Err(_) => AppCfg::default(),
    }
}
