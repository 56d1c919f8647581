// SPDX-License-Identifier: CEPL-1.0
use anyhow::{Context, Result};
use ash::vk;

use crate::pipeline::PushConstants;

pub unsafe fn create_command_pool(device: &ash::Device, queue_family: u32) -> Result<vk::CommandPool> {
    let pool_info = vk::CommandPoolCreateInfo {
        s_type: vk::StructureType::COMMAND_POOL_CREATE_INFO,
        queue_family_index: queue_family,
        flags: vk::CommandPoolCreateFlags::RESET_COMMAND_BUFFER,
        ..Default::default()
    };
    device
        .create_command_pool(&pool_info, None)
        .context("create_command_pool")
}

/// Everything one recording needs from the backend's current targets.
pub struct DrawState {
    pub render_pass: vk::RenderPass,
    pub pipeline: vk::Pipeline,
    pub layout: vk::PipelineLayout,
    pub framebuffer: vk::Framebuffer,
    pub extent: vk::Extent2D,
    pub clear_color: [f32; 4],
    pub depth: bool,
}

pub fn clear_values(color: [f32; 4], depth: bool) -> Vec<vk::ClearValue> {
    let mut out = vec![vk::ClearValue {
        color: vk::ClearColorValue { float32: color },
    }];
    if depth {
        out.push(vk::ClearValue {
            depth_stencil: vk::ClearDepthStencilValue {
                depth: 1.0,
                stencil: 0,
            },
        });
    }
    out
}

/// Records clear + one triangle into `cmd`; the buffer is reset first.
pub unsafe fn record_draw(
    device: &ash::Device,
    cmd: vk::CommandBuffer,
    state: &DrawState,
    push: &PushConstants,
) -> Result<(), vk::Result> {
    device.reset_command_buffer(cmd, vk::CommandBufferResetFlags::empty())?;
    let begin = vk::CommandBufferBeginInfo {
        s_type: vk::StructureType::COMMAND_BUFFER_BEGIN_INFO,
        ..Default::default()
    };
    device.begin_command_buffer(cmd, &begin)?;

    let render_area = vk::Rect2D {
        offset: vk::Offset2D { x: 0, y: 0 },
        extent: state.extent,
    };
    let clears = clear_values(state.clear_color, state.depth);
    let rp_begin = vk::RenderPassBeginInfo {
        s_type: vk::StructureType::RENDER_PASS_BEGIN_INFO,
        render_pass: state.render_pass,
        framebuffer: state.framebuffer,
        render_area,
        clear_value_count: clears.len() as u32,
        p_clear_values: clears.as_ptr(),
        ..Default::default()
    };
    device.cmd_begin_render_pass(cmd, &rp_begin, vk::SubpassContents::INLINE);

    device.cmd_bind_pipeline(cmd, vk::PipelineBindPoint::GRAPHICS, state.pipeline);
    // Projection already flips Y for Vulkan clip space.
    let vp = vk::Viewport {
        x: 0.0,
        y: 0.0,
        width: state.extent.width as f32,
        height: state.extent.height as f32,
        min_depth: 0.0,
        max_depth: 1.0,
    };
    device.cmd_set_viewport(cmd, 0, std::slice::from_ref(&vp));
    device.cmd_set_scissor(cmd, 0, std::slice::from_ref(&render_area));
    device.cmd_push_constants(
        cmd,
        state.layout,
        vk::ShaderStageFlags::VERTEX,
        0,
        bytemuck::bytes_of(push),
    );
    device.cmd_draw(cmd, 3, 1, 0, 0);

    device.cmd_end_render_pass(cmd);
    device.end_command_buffer(cmd)
}
