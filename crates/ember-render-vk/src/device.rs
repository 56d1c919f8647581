// SPDX-License-Identifier: CEPL-1.0
//! Physical device selection and logical device creation.
use std::ffi::CStr;
use std::fmt;

use anyhow::{anyhow, Context, Result};
use ash::khr::{surface, swapchain};
use ash::{vk, Instance};
use ember_render::probe;
use ember_render::{QueueFamilyIndices, QueueFamilyInfo};
use tracing::{debug, info};

use crate::convert;

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct DeviceInfo {
    pub name: String,
    pub device_type: vk::PhysicalDeviceType,
    pub api_version: u32,
    pub driver_version: u32,
    pub vendor_id: u32,
    pub extensions: Vec<String>,
}

impl fmt::Display for DeviceInfo {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{} ({:?}, Vulkan {}.{}.{}, vendor {:04x})",
            self.name,
            self.device_type,
            vk::api_version_major(self.api_version),
            vk::api_version_minor(self.api_version),
            vk::api_version_patch(self.api_version),
            self.vendor_id
        )
    }
}

/// Preference among otherwise suitable devices; higher wins.
pub fn device_type_rank(t: vk::PhysicalDeviceType) -> u32 {
    match t {
        vk::PhysicalDeviceType::DISCRETE_GPU => 4,
        vk::PhysicalDeviceType::INTEGRATED_GPU => 3,
        vk::PhysicalDeviceType::VIRTUAL_GPU => 2,
        vk::PhysicalDeviceType::CPU => 1,
        _ => 0,
    }
}

pub struct Selected {
    pub phys: vk::PhysicalDevice,
    pub info: DeviceInfo,
    pub queues: QueueFamilyIndices,
}

unsafe fn device_info(instance: &Instance, phys: vk::PhysicalDevice) -> DeviceInfo {
    let props = instance.get_physical_device_properties(phys);
    DeviceInfo {
        name: CStr::from_ptr(props.device_name.as_ptr())
            .to_string_lossy()
            .into_owned(),
        device_type: props.device_type,
        api_version: props.api_version,
        driver_version: props.driver_version,
        vendor_id: props.vendor_id,
        extensions: device_extensions(instance, phys),
    }
}

unsafe fn device_extensions(instance: &Instance, phys: vk::PhysicalDevice) -> Vec<String> {
    instance
        .enumerate_device_extension_properties(phys)
        .unwrap_or_default()
        .iter()
        .map(|e| CStr::from_ptr(e.extension_name.as_ptr()).to_string_lossy().into_owned())
        .collect()
}

/// Queue families of `phys` with present support resolved against `surface`.
pub unsafe fn queue_families(
    instance: &Instance,
    surface_loader: &surface::Instance,
    surface: vk::SurfaceKHR,
    phys: vk::PhysicalDevice,
) -> Vec<QueueFamilyInfo> {
    instance
        .get_physical_device_queue_family_properties(phys)
        .iter()
        .enumerate()
        .map(|(i, q)| QueueFamilyInfo {
            capabilities: convert::queue_capabilities(q.queue_flags),
            queue_count: q.queue_count,
            present_support: surface_loader
                .get_physical_device_surface_support(phys, i as u32, surface)
                .unwrap_or(false),
        })
        .collect()
}

fn has_swapchain_extension(info: &DeviceInfo) -> bool {
    let wanted = swapchain::NAME.to_string_lossy();
    probe::count_matching(&info.extensions, &[wanted.as_ref()]) == 1
}

unsafe fn has_surface_formats(
    surface_loader: &surface::Instance,
    surface: vk::SurfaceKHR,
    phys: vk::PhysicalDevice,
) -> bool {
    let formats = surface_loader
        .get_physical_device_surface_formats(phys, surface)
        .unwrap_or_default();
    let modes = surface_loader
        .get_physical_device_surface_present_modes(phys, surface)
        .unwrap_or_default();
    !formats.is_empty() && !modes.is_empty()
}

/// First best-ranked device that can draw and present to `surface`.
pub unsafe fn pick_physical_device(
    instance: &Instance,
    surface_loader: &surface::Instance,
    surface: vk::SurfaceKHR,
) -> Result<Selected> {
    let mut best: Option<(u32, Selected)> = None;
    for phys in instance
        .enumerate_physical_devices()
        .context("enumerate_physical_devices")?
    {
        let info = device_info(instance, phys);
        let families = queue_families(instance, surface_loader, surface, phys);
        let queues = QueueFamilyIndices::from_families(&families);

        if queues.presentable().is_err() {
            debug!("vk: skipping {}: no graphics/present queue family", info.name);
            continue;
        }
        if !has_swapchain_extension(&info) {
            debug!("vk: skipping {}: no VK_KHR_swapchain", info.name);
            continue;
        }
        if !has_surface_formats(surface_loader, surface, phys) {
            debug!("vk: skipping {}: surface reports no formats", info.name);
            continue;
        }

        let rank = device_type_rank(info.device_type);
        if best.as_ref().map_or(true, |(r, _)| rank > *r) {
            best = Some((rank, Selected { phys, info, queues }));
        }
    }

    let (_, selected) = best.ok_or_else(|| anyhow!("no suitable physical device"))?;
    info!("vk: using {}", selected.info);
    Ok(selected)
}

pub struct LogicalDevice {
    pub device: ash::Device,
    pub graphics_queue: vk::Queue,
    pub present_queue: vk::Queue,
}

/// One queue per distinct family in `queues`.
pub unsafe fn create_logical_device(
    instance: &Instance,
    phys: vk::PhysicalDevice,
    queues: QueueFamilyIndices,
) -> Result<LogicalDevice> {
    let resolved = queues
        .presentable()
        .map_err(|e| anyhow!("{e}"))?;

    let priorities = [1.0_f32];
    let queue_infos: Vec<vk::DeviceQueueCreateInfo> = queues
        .unique()
        .into_iter()
        .map(|family| vk::DeviceQueueCreateInfo {
            s_type: vk::StructureType::DEVICE_QUEUE_CREATE_INFO,
            queue_family_index: family,
            queue_count: 1,
            p_queue_priorities: priorities.as_ptr(),
            ..Default::default()
        })
        .collect();

    let device_exts = [swapchain::NAME.as_ptr()];
    let features = vk::PhysicalDeviceFeatures::default();
    let dinfo = vk::DeviceCreateInfo {
        s_type: vk::StructureType::DEVICE_CREATE_INFO,
        queue_create_info_count: queue_infos.len() as u32,
        p_queue_create_infos: queue_infos.as_ptr(),
        enabled_extension_count: device_exts.len() as u32,
        pp_enabled_extension_names: device_exts.as_ptr(),
        p_enabled_features: &features,
        ..Default::default()
    };

    let device = instance
        .create_device(phys, &dinfo, None)
        .context("create_device")?;
    let graphics_queue = device.get_device_queue(resolved.graphics, 0);
    let present_queue = device.get_device_queue(resolved.present, 0);
    debug!(
        "vk: device queues graphics={} present={} ({} families)",
        resolved.graphics,
        resolved.present,
        queue_infos.len()
    );
    Ok(LogicalDevice {
        device,
        graphics_queue,
        present_queue,
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn discrete_beats_integrated() {
        assert!(
            device_type_rank(vk::PhysicalDeviceType::DISCRETE_GPU)
                > device_type_rank(vk::PhysicalDeviceType::INTEGRATED_GPU)
        );
        assert_eq!(device_type_rank(vk::PhysicalDeviceType::OTHER), 0);
    }

    #[test]
    fn info_display() {
        let info = DeviceInfo {
            name: "Test GPU".into(),
            device_type: vk::PhysicalDeviceType::DISCRETE_GPU,
            api_version: vk::make_api_version(0, 1, 3, 250),
            driver_version: 0,
            vendor_id: 0x10de,
            extensions: vec!["VK_KHR_swapchain".into()],
        };
        assert_eq!(info.to_string(), "Test GPU (DISCRETE_GPU, Vulkan 1.3.250, vendor 10de)");
        assert!(has_swapchain_extension(&info));
        let bare = DeviceInfo {
            extensions: Vec::new(),
            ..info
        };
        assert!(!has_swapchain_extension(&bare));
    }
}
