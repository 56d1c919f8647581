// SPDX-License-Identifier: CEPL-1.0
//! ash ↔ ember-render type mapping.
use ash::vk::{self, Handle};
use ember_core::{DeviceError, Extent2D};
use ember_render::{
    ColorSpace, PixelFormat, PresentMode, QueueCapabilities, SurfaceCapabilities, SurfaceFormat,
};

pub fn device_error(op: &'static str, r: vk::Result) -> DeviceError {
    match r {
        vk::Result::ERROR_OUT_OF_HOST_MEMORY | vk::Result::ERROR_OUT_OF_DEVICE_MEMORY => {
            DeviceError::OutOfMemory
        }
        vk::Result::ERROR_DEVICE_LOST => DeviceError::DeviceLost,
        vk::Result::ERROR_SURFACE_LOST_KHR => DeviceError::SurfaceLost,
        vk::Result::TIMEOUT | vk::Result::NOT_READY => DeviceError::Timeout,
        other => DeviceError::Native {
            op,
            code: other.as_raw(),
        },
    }
}

/// `None` maps to `u64::MAX`, the driver's "no timeout".
pub fn timeout_ns(timeout: Option<std::time::Duration>) -> u64 {
    timeout.map_or(u64::MAX, |d| u64::try_from(d.as_nanos()).unwrap_or(u64::MAX))
}

pub fn pixel_format(f: vk::Format) -> PixelFormat {
    match f {
        vk::Format::B8G8R8A8_UNORM => PixelFormat::Bgra8Unorm,
        vk::Format::B8G8R8A8_SRGB => PixelFormat::Bgra8Srgb,
        vk::Format::R8G8B8A8_UNORM => PixelFormat::Rgba8Unorm,
        vk::Format::R8G8B8A8_SRGB => PixelFormat::Rgba8Srgb,
        vk::Format::A2B10G10R10_UNORM_PACK32 => PixelFormat::A2Bgr10Unorm,
        vk::Format::R16G16B16A16_SFLOAT => PixelFormat::Rgba16Float,
        other => PixelFormat::Other(other.as_raw()),
    }
}

pub fn vk_format(f: PixelFormat) -> vk::Format {
    match f {
        PixelFormat::Bgra8Unorm => vk::Format::B8G8R8A8_UNORM,
        PixelFormat::Bgra8Srgb => vk::Format::B8G8R8A8_SRGB,
        PixelFormat::Rgba8Unorm => vk::Format::R8G8B8A8_UNORM,
        PixelFormat::Rgba8Srgb => vk::Format::R8G8B8A8_SRGB,
        PixelFormat::A2Bgr10Unorm => vk::Format::A2B10G10R10_UNORM_PACK32,
        PixelFormat::Rgba16Float => vk::Format::R16G16B16A16_SFLOAT,
        PixelFormat::Other(raw) => vk::Format::from_raw(raw),
    }
}

pub fn color_space(cs: vk::ColorSpaceKHR) -> ColorSpace {
    match cs {
        vk::ColorSpaceKHR::SRGB_NONLINEAR => ColorSpace::SrgbNonlinear,
        other => ColorSpace::Other(other.as_raw()),
    }
}

pub fn vk_color_space(cs: ColorSpace) -> vk::ColorSpaceKHR {
    match cs {
        ColorSpace::SrgbNonlinear => vk::ColorSpaceKHR::SRGB_NONLINEAR,
        ColorSpace::Other(raw) => vk::ColorSpaceKHR::from_raw(raw),
    }
}

pub fn surface_format(f: vk::SurfaceFormatKHR) -> SurfaceFormat {
    SurfaceFormat {
        format: pixel_format(f.format),
        color_space: color_space(f.color_space),
    }
}

/// Vendor modes the core has no name for are dropped.
pub fn present_mode(m: vk::PresentModeKHR) -> Option<PresentMode> {
    match m {
        vk::PresentModeKHR::IMMEDIATE => Some(PresentMode::Immediate),
        vk::PresentModeKHR::MAILBOX => Some(PresentMode::Mailbox),
        vk::PresentModeKHR::FIFO => Some(PresentMode::Fifo),
        vk::PresentModeKHR::FIFO_RELAXED => Some(PresentMode::FifoRelaxed),
        _ => None,
    }
}

pub fn vk_present_mode(m: PresentMode) -> vk::PresentModeKHR {
    match m {
        PresentMode::Immediate => vk::PresentModeKHR::IMMEDIATE,
        PresentMode::Mailbox => vk::PresentModeKHR::MAILBOX,
        PresentMode::Fifo => vk::PresentModeKHR::FIFO,
        PresentMode::FifoRelaxed => vk::PresentModeKHR::FIFO_RELAXED,
    }
}

pub fn extent(e: vk::Extent2D) -> Extent2D {
    Extent2D::new(e.width, e.height)
}

pub fn vk_extent(e: Extent2D) -> vk::Extent2D {
    vk::Extent2D {
        width: e.width,
        height: e.height,
    }
}

pub fn capabilities(caps: &vk::SurfaceCapabilitiesKHR) -> SurfaceCapabilities {
    // u32::MAX width means the swap chain decides the size.
    let current = (caps.current_extent.width != u32::MAX).then(|| extent(caps.current_extent));
    SurfaceCapabilities {
        min_image_count: caps.min_image_count,
        max_image_count: caps.max_image_count,
        current_extent: current,
        min_extent: extent(caps.min_image_extent),
        max_extent: extent(caps.max_image_extent),
    }
}

pub fn queue_capabilities(flags: vk::QueueFlags) -> QueueCapabilities {
    let mut caps = QueueCapabilities::empty();
    caps.set(QueueCapabilities::GRAPHICS, flags.contains(vk::QueueFlags::GRAPHICS));
    caps.set(QueueCapabilities::COMPUTE, flags.contains(vk::QueueFlags::COMPUTE));
    caps.set(QueueCapabilities::TRANSFER, flags.contains(vk::QueueFlags::TRANSFER));
    caps.set(
        QueueCapabilities::SPARSE_BINDING,
        flags.contains(vk::QueueFlags::SPARSE_BINDING),
    );
    caps
}

pub fn raw<H: Handle>(h: H) -> u64 {
    h.as_raw()
}

pub fn from_raw<H: Handle>(raw: u64) -> H {
    H::from_raw(raw)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn format_names_round_trip() {
        for f in [
            vk::Format::B8G8R8A8_UNORM,
            vk::Format::R8G8B8A8_SRGB,
            vk::Format::R16G16B16A16_SFLOAT,
            vk::Format::D32_SFLOAT,
        ] {
            assert_eq!(vk_format(pixel_format(f)), f);
        }
        assert_eq!(pixel_format(vk::Format::D32_SFLOAT), PixelFormat::Other(126));
    }

    #[test]
    fn free_sized_surface_has_no_current_extent() {
        let caps = vk::SurfaceCapabilitiesKHR {
            min_image_count: 2,
            max_image_count: 0,
            current_extent: vk::Extent2D {
                width: u32::MAX,
                height: u32::MAX,
            },
            min_image_extent: vk::Extent2D { width: 1, height: 1 },
            max_image_extent: vk::Extent2D {
                width: 8192,
                height: 8192,
            },
            ..Default::default()
        };
        let c = capabilities(&caps);
        assert_eq!(c.current_extent, None);
        assert_eq!(c.max_image_count, 0);

        let fixed = vk::SurfaceCapabilitiesKHR {
            current_extent: vk::Extent2D {
                width: 640,
                height: 480,
            },
            ..caps
        };
        assert_eq!(capabilities(&fixed).current_extent, Some(Extent2D::new(640, 480)));
    }

    #[test]
    fn error_mapping() {
        assert_eq!(
            device_error("x", vk::Result::ERROR_OUT_OF_DEVICE_MEMORY),
            DeviceError::OutOfMemory
        );
        assert_eq!(device_error("x", vk::Result::TIMEOUT), DeviceError::Timeout);
        assert_eq!(
            device_error("vkQueueSubmit", vk::Result::ERROR_INITIALIZATION_FAILED),
            DeviceError::Native {
                op: "vkQueueSubmit",
                code: -3
            }
        );
    }

    #[test]
    fn queue_flags_map_bit_for_bit() {
        let caps = queue_capabilities(vk::QueueFlags::GRAPHICS | vk::QueueFlags::TRANSFER);
        assert_eq!(caps, QueueCapabilities::GRAPHICS | QueueCapabilities::TRANSFER);
        assert!(queue_capabilities(vk::QueueFlags::PROTECTED).is_empty());
    }

    #[test]
    fn unknown_present_modes_are_dropped() {
        assert_eq!(
            present_mode(vk::PresentModeKHR::SHARED_DEMAND_REFRESH),
            None
        );
        assert_eq!(vk_present_mode(PresentMode::Mailbox), vk::PresentModeKHR::MAILBOX);
    }

    #[test]
    fn unbounded_timeout() {
        assert_eq!(timeout_ns(None), u64::MAX);
        assert_eq!(timeout_ns(Some(std::time::Duration::from_millis(2))), 2_000_000);
    }
}
