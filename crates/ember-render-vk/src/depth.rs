// SPDX-License-Identifier: CEPL-1.0
use anyhow::{anyhow, Context, Result};
use ash::{vk, Instance};

const DEPTH_CANDIDATES: [vk::Format; 4] = [
    vk::Format::D32_SFLOAT,
    vk::Format::D24_UNORM_S8_UINT,
    vk::Format::D32_SFLOAT_S8_UINT,
    vk::Format::D16_UNORM,
];

/// First candidate usable as an optimally tiled depth attachment.
pub fn choose_depth_format(
    supports: impl Fn(vk::Format) -> vk::FormatFeatureFlags,
) -> Option<vk::Format> {
    DEPTH_CANDIDATES.into_iter().find(|&f| {
        supports(f).contains(vk::FormatFeatureFlags::DEPTH_STENCIL_ATTACHMENT)
    })
}

pub unsafe fn pick_depth_format(instance: &Instance, phys: vk::PhysicalDevice) -> Option<vk::Format> {
    choose_depth_format(|f| {
        instance
            .get_physical_device_format_properties(phys, f)
            .optimal_tiling_features
    })
}

pub fn find_memory_type(
    props: &vk::PhysicalDeviceMemoryProperties,
    type_bits: u32,
    required: vk::MemoryPropertyFlags,
) -> Option<u32> {
    (0..props.memory_type_count).find(|&i| {
        (type_bits & (1 << i)) != 0
            && props.memory_types[i as usize]
                .property_flags
                .contains(required)
    })
}

#[derive(Debug)]
pub struct DepthBuffer {
    image: vk::Image,
    memory: vk::DeviceMemory,
    pub view: vk::ImageView,
}

impl DepthBuffer {
    pub unsafe fn new(
        instance: &Instance,
        device: &ash::Device,
        phys: vk::PhysicalDevice,
        extent: vk::Extent2D,
        format: vk::Format,
    ) -> Result<Self> {
        let img_ci = vk::ImageCreateInfo {
            s_type: vk::StructureType::IMAGE_CREATE_INFO,
            image_type: vk::ImageType::TYPE_2D,
            format,
            extent: vk::Extent3D {
                width: extent.width,
                height: extent.height,
                depth: 1,
            },
            mip_levels: 1,
            array_layers: 1,
            samples: vk::SampleCountFlags::TYPE_1,
            tiling: vk::ImageTiling::OPTIMAL,
            usage: vk::ImageUsageFlags::DEPTH_STENCIL_ATTACHMENT,
            sharing_mode: vk::SharingMode::EXCLUSIVE,
            ..Default::default()
        };
        let image = device.create_image(&img_ci, None).context("create depth image")?;

        let mem_req = device.get_image_memory_requirements(image);
        let mem_props = instance.get_physical_device_memory_properties(phys);
        let Some(memory_type_index) = find_memory_type(
            &mem_props,
            mem_req.memory_type_bits,
            vk::MemoryPropertyFlags::DEVICE_LOCAL,
        ) else {
            device.destroy_image(image, None);
            return Err(anyhow!("no device-local memory type for depth image"));
        };
        let alloc = vk::MemoryAllocateInfo {
            s_type: vk::StructureType::MEMORY_ALLOCATE_INFO,
            allocation_size: mem_req.size,
            memory_type_index,
            ..Default::default()
        };
        let memory = match device.allocate_memory(&alloc, None) {
            Ok(m) => m,
            Err(e) => {
                device.destroy_image(image, None);
                return Err(e).context("allocate depth memory");
            }
        };

        let view = device.bind_image_memory(image, memory, 0).and_then(|()| {
            let view_ci = vk::ImageViewCreateInfo {
                s_type: vk::StructureType::IMAGE_VIEW_CREATE_INFO,
                image,
                view_type: vk::ImageViewType::TYPE_2D,
                format,
                subresource_range: vk::ImageSubresourceRange {
                    aspect_mask: vk::ImageAspectFlags::DEPTH,
                    base_mip_level: 0,
                    level_count: 1,
                    base_array_layer: 0,
                    layer_count: 1,
                },
                ..Default::default()
            };
            device.create_image_view(&view_ci, None)
        });
        match view {
            Ok(view) => Ok(Self {
                image,
                memory,
                view,
            }),
            Err(e) => {
                device.destroy_image(image, None);
                device.free_memory(memory, None);
                Err(e).context("depth image view")
            }
        }
    }

    pub unsafe fn destroy(&self, device: &ash::Device) {
        device.destroy_image_view(self.view, None);
        device.destroy_image(self.image, None);
        device.free_memory(self.memory, None);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn depth_format_preference_order() {
        let only_d16 = |f| {
            if f == vk::Format::D16_UNORM {
                vk::FormatFeatureFlags::DEPTH_STENCIL_ATTACHMENT
            } else {
                vk::FormatFeatureFlags::empty()
            }
        };
        assert_eq!(choose_depth_format(only_d16), Some(vk::Format::D16_UNORM));
        assert_eq!(
            choose_depth_format(|_| vk::FormatFeatureFlags::DEPTH_STENCIL_ATTACHMENT),
            Some(vk::Format::D32_SFLOAT)
        );
        assert_eq!(choose_depth_format(|_| vk::FormatFeatureFlags::empty()), None);
    }

    #[test]
    fn memory_type_respects_mask_and_flags() {
        let mut props = vk::PhysicalDeviceMemoryProperties {
            memory_type_count: 3,
            ..Default::default()
        };
        props.memory_types[0].property_flags = vk::MemoryPropertyFlags::HOST_VISIBLE;
        props.memory_types[1].property_flags = vk::MemoryPropertyFlags::DEVICE_LOCAL;
        props.memory_types[2].property_flags = vk::MemoryPropertyFlags::DEVICE_LOCAL;

        let local = vk::MemoryPropertyFlags::DEVICE_LOCAL;
        assert_eq!(find_memory_type(&props, 0b111, local), Some(1));
        assert_eq!(find_memory_type(&props, 0b100, local), Some(2));
        assert_eq!(find_memory_type(&props, 0b001, local), None);
    }
}
