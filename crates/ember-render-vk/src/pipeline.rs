// SPDX-License-Identifier: CEPL-1.0
//! Render pass, pipeline layout and the graphics pipeline for the
//! camera-transformed triangle.
use std::ffi::CStr;
use std::io::Cursor;
use std::path::{Path, PathBuf};

use anyhow::{anyhow, Context, Result};
use ash::util::read_spv;
use ash::vk;
use bytemuck::{Pod, Zeroable};
use ember_render::CameraTransform;
use thiserror::Error;

const SPIRV_MAGIC: u32 = 0x0723_0203;

#[derive(Debug, Error)]
pub enum ShaderLoadError {
    #[error("cannot read shader {path}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
    #[error("{path} is not SPIR-V")]
    NotSpirv { path: PathBuf },
}

/// Reads a compiled SPIR-V module from disk.
pub fn load_spirv(path: &Path) -> Result<Vec<u32>, ShaderLoadError> {
    let bytes = std::fs::read(path).map_err(|source| ShaderLoadError::Io {
        path: path.to_owned(),
        source,
    })?;
    let words = read_spv(&mut Cursor::new(&bytes[..])).map_err(|_| ShaderLoadError::NotSpirv {
        path: path.to_owned(),
    })?;
    if words.first() != Some(&SPIRV_MAGIC) {
        return Err(ShaderLoadError::NotSpirv {
            path: path.to_owned(),
        });
    }
    Ok(words)
}

#[repr(C)]
#[derive(Clone, Copy, Debug, Pod, Zeroable)]
pub struct PushConstants {
    pub view_projection: CameraTransform,
}

pub fn push_constant_range() -> vk::PushConstantRange {
    vk::PushConstantRange {
        stage_flags: vk::ShaderStageFlags::VERTEX,
        offset: 0,
        size: std::mem::size_of::<PushConstants>() as u32,
    }
}

/// Color attachment ends in PRESENT_SRC; depth is cleared and discarded.
pub fn attachments(color: vk::Format, depth: Option<vk::Format>) -> Vec<vk::AttachmentDescription> {
    let mut out = vec![vk::AttachmentDescription {
        format: color,
        samples: vk::SampleCountFlags::TYPE_1,
        load_op: vk::AttachmentLoadOp::CLEAR,
        store_op: vk::AttachmentStoreOp::STORE,
        stencil_load_op: vk::AttachmentLoadOp::DONT_CARE,
        stencil_store_op: vk::AttachmentStoreOp::DONT_CARE,
        initial_layout: vk::ImageLayout::UNDEFINED,
        final_layout: vk::ImageLayout::PRESENT_SRC_KHR,
        ..Default::default()
    }];
    if let Some(depth) = depth {
        out.push(vk::AttachmentDescription {
            format: depth,
            samples: vk::SampleCountFlags::TYPE_1,
            load_op: vk::AttachmentLoadOp::CLEAR,
            store_op: vk::AttachmentStoreOp::DONT_CARE,
            stencil_load_op: vk::AttachmentLoadOp::DONT_CARE,
            stencil_store_op: vk::AttachmentStoreOp::DONT_CARE,
            initial_layout: vk::ImageLayout::UNDEFINED,
            final_layout: vk::ImageLayout::DEPTH_STENCIL_ATTACHMENT_OPTIMAL,
            ..Default::default()
        });
    }
    out
}

pub unsafe fn create_render_pass(
    device: &ash::Device,
    color: vk::Format,
    depth: Option<vk::Format>,
) -> Result<vk::RenderPass> {
    let attachments = attachments(color, depth);
    let color_ref = vk::AttachmentReference {
        attachment: 0,
        layout: vk::ImageLayout::COLOR_ATTACHMENT_OPTIMAL,
    };
    let depth_ref = vk::AttachmentReference {
        attachment: 1,
        layout: vk::ImageLayout::DEPTH_STENCIL_ATTACHMENT_OPTIMAL,
    };
    let subpass = vk::SubpassDescription {
        pipeline_bind_point: vk::PipelineBindPoint::GRAPHICS,
        color_attachment_count: 1,
        p_color_attachments: &color_ref,
        p_depth_stencil_attachment: if depth.is_some() {
            &depth_ref
        } else {
            std::ptr::null()
        },
        ..Default::default()
    };

    // The acquire semaphore is waited at COLOR_ATTACHMENT_OUTPUT; the layout
    // transition out of UNDEFINED must not start before that.
    let stages = vk::PipelineStageFlags::COLOR_ATTACHMENT_OUTPUT
        | vk::PipelineStageFlags::EARLY_FRAGMENT_TESTS;
    let dependency = vk::SubpassDependency {
        src_subpass: vk::SUBPASS_EXTERNAL,
        dst_subpass: 0,
        src_stage_mask: stages,
        src_access_mask: vk::AccessFlags::empty(),
        dst_stage_mask: stages,
        dst_access_mask: vk::AccessFlags::COLOR_ATTACHMENT_WRITE
            | vk::AccessFlags::DEPTH_STENCIL_ATTACHMENT_WRITE,
        ..Default::default()
    };

    let ci = vk::RenderPassCreateInfo {
        s_type: vk::StructureType::RENDER_PASS_CREATE_INFO,
        attachment_count: attachments.len() as u32,
        p_attachments: attachments.as_ptr(),
        subpass_count: 1,
        p_subpasses: &subpass,
        dependency_count: 1,
        p_dependencies: &dependency,
        ..Default::default()
    };
    device
        .create_render_pass(&ci, None)
        .context("create_render_pass")
}

pub unsafe fn create_pipeline_layout(device: &ash::Device) -> Result<vk::PipelineLayout> {
    let range = push_constant_range();
    let ci = vk::PipelineLayoutCreateInfo {
        s_type: vk::StructureType::PIPELINE_LAYOUT_CREATE_INFO,
        push_constant_range_count: 1,
        p_push_constant_ranges: &range,
        ..Default::default()
    };
    device
        .create_pipeline_layout(&ci, None)
        .context("create_pipeline_layout")
}

unsafe fn shader_module(device: &ash::Device, code: &[u32]) -> Result<vk::ShaderModule> {
    let ci = vk::ShaderModuleCreateInfo {
        s_type: vk::StructureType::SHADER_MODULE_CREATE_INFO,
        p_code: code.as_ptr(),
        code_size: code.len() * 4,
        ..Default::default()
    };
    device
        .create_shader_module(&ci, None)
        .context("create_shader_module")
}

/// SPIR-V for both stages, loaded once at backend creation.
pub struct ShaderSet {
    pub vertex: Vec<u32>,
    pub fragment: Vec<u32>,
}

impl ShaderSet {
    pub fn load(vertex: &Path, fragment: &Path) -> Result<Self, ShaderLoadError> {
        Ok(Self {
            vertex: load_spirv(vertex)?,
            fragment: load_spirv(fragment)?,
        })
    }
}

pub unsafe fn create_pipeline(
    device: &ash::Device,
    render_pass: vk::RenderPass,
    layout: vk::PipelineLayout,
    shaders: &ShaderSet,
    depth: bool,
) -> Result<vk::Pipeline> {
    // STRICT: the render pass color format MUST match the swap chain format.
    // On format change, render pass and pipeline are rebuilt together.
    let vs = shader_module(device, &shaders.vertex)?;
    let fs = match shader_module(device, &shaders.fragment) {
        Ok(fs) => fs,
        Err(e) => {
            device.destroy_shader_module(vs, None);
            return Err(e);
        }
    };
    let entry: &CStr = c"main";

    let stages = [
        vk::PipelineShaderStageCreateInfo {
            s_type: vk::StructureType::PIPELINE_SHADER_STAGE_CREATE_INFO,
            stage: vk::ShaderStageFlags::VERTEX,
            module: vs,
            p_name: entry.as_ptr(),
            ..Default::default()
        },
        vk::PipelineShaderStageCreateInfo {
            s_type: vk::StructureType::PIPELINE_SHADER_STAGE_CREATE_INFO,
            stage: vk::ShaderStageFlags::FRAGMENT,
            module: fs,
            p_name: entry.as_ptr(),
            ..Default::default()
        },
    ];

    // Vertices come from gl_VertexIndex; no buffers bound.
    let vertex_input = vk::PipelineVertexInputStateCreateInfo {
        s_type: vk::StructureType::PIPELINE_VERTEX_INPUT_STATE_CREATE_INFO,
        ..Default::default()
    };
    let input_assembly = vk::PipelineInputAssemblyStateCreateInfo {
        s_type: vk::StructureType::PIPELINE_INPUT_ASSEMBLY_STATE_CREATE_INFO,
        topology: vk::PrimitiveTopology::TRIANGLE_LIST,
        ..Default::default()
    };
    let dyn_states = [vk::DynamicState::VIEWPORT, vk::DynamicState::SCISSOR];
    let dynamic_state = vk::PipelineDynamicStateCreateInfo {
        s_type: vk::StructureType::PIPELINE_DYNAMIC_STATE_CREATE_INFO,
        dynamic_state_count: dyn_states.len() as u32,
        p_dynamic_states: dyn_states.as_ptr(),
        ..Default::default()
    };
    let viewport_state = vk::PipelineViewportStateCreateInfo {
        s_type: vk::StructureType::PIPELINE_VIEWPORT_STATE_CREATE_INFO,
        viewport_count: 1,
        p_viewports: std::ptr::null(), // dynamic
        scissor_count: 1,
        p_scissors: std::ptr::null(), // dynamic
        ..Default::default()
    };
    let raster = vk::PipelineRasterizationStateCreateInfo {
        s_type: vk::StructureType::PIPELINE_RASTERIZATION_STATE_CREATE_INFO,
        polygon_mode: vk::PolygonMode::FILL,
        cull_mode: vk::CullModeFlags::NONE,
        front_face: vk::FrontFace::COUNTER_CLOCKWISE,
        line_width: 1.0,
        ..Default::default()
    };
    let multisample = vk::PipelineMultisampleStateCreateInfo {
        s_type: vk::StructureType::PIPELINE_MULTISAMPLE_STATE_CREATE_INFO,
        rasterization_samples: vk::SampleCountFlags::TYPE_1,
        ..Default::default()
    };
    let depth_stencil = vk::PipelineDepthStencilStateCreateInfo {
        s_type: vk::StructureType::PIPELINE_DEPTH_STENCIL_STATE_CREATE_INFO,
        depth_test_enable: vk::TRUE,
        depth_write_enable: vk::TRUE,
        depth_compare_op: vk::CompareOp::LESS_OR_EQUAL,
        ..Default::default()
    };
    let color_blend_att = vk::PipelineColorBlendAttachmentState {
        color_write_mask: vk::ColorComponentFlags::RGBA,
        blend_enable: vk::FALSE,
        ..Default::default()
    };
    let color_blend = vk::PipelineColorBlendStateCreateInfo {
        s_type: vk::StructureType::PIPELINE_COLOR_BLEND_STATE_CREATE_INFO,
        attachment_count: 1,
        p_attachments: &color_blend_att,
        ..Default::default()
    };

    let pipeline_info = vk::GraphicsPipelineCreateInfo {
        s_type: vk::StructureType::GRAPHICS_PIPELINE_CREATE_INFO,
        stage_count: stages.len() as u32,
        p_stages: stages.as_ptr(),
        p_vertex_input_state: &vertex_input,
        p_input_assembly_state: &input_assembly,
        p_viewport_state: &viewport_state,
        p_rasterization_state: &raster,
        p_multisample_state: &multisample,
        p_depth_stencil_state: if depth { &depth_stencil } else { std::ptr::null() },
        p_color_blend_state: &color_blend,
        p_dynamic_state: &dynamic_state,
        layout,
        render_pass,
        subpass: 0,
        ..Default::default()
    };

    let created = device.create_graphics_pipelines(
        vk::PipelineCache::null(),
        std::slice::from_ref(&pipeline_info),
        None,
    );
    device.destroy_shader_module(vs, None);
    device.destroy_shader_module(fs, None);

    match created {
        Ok(p) => p
            .into_iter()
            .next()
            .ok_or_else(|| anyhow!("create_graphics_pipelines returned nothing")),
        Err((_, err)) => Err(err).context("create_graphics_pipelines"),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    fn temp_file(name: &str, bytes: &[u8]) -> PathBuf {
        let path = std::env::temp_dir().join(format!("ember-{}-{name}", std::process::id()));
        let mut f = std::fs::File::create(&path).unwrap();
        f.write_all(bytes).unwrap();
        path
    }

    #[test]
    fn missing_file_is_io_error() {
        let err = load_spirv(Path::new("/definitely/not/here.spv")).unwrap_err();
        assert!(matches!(err, ShaderLoadError::Io { .. }));
    }

    #[test]
    fn glsl_text_is_rejected() {
        let path = temp_file("tri.vert", b"#version 450\nvoid main() {}\n");
        let err = load_spirv(&path).unwrap_err();
        assert!(matches!(err, ShaderLoadError::NotSpirv { .. }), "{err}");
        let _ = std::fs::remove_file(path);
    }

    #[test]
    fn spirv_header_is_accepted() {
        let mut bytes = Vec::new();
        for word in [SPIRV_MAGIC, 0x0001_0000, 0, 8, 0] {
            bytes.extend_from_slice(&word.to_le_bytes());
        }
        let path = temp_file("min.spv", &bytes);
        let words = load_spirv(&path).unwrap();
        assert_eq!(words.len(), 5);
        assert_eq!(words[0], SPIRV_MAGIC);
        let _ = std::fs::remove_file(path);
    }

    #[test]
    fn push_constants_fit_minimum_limit() {
        // 128 bytes is the guaranteed maxPushConstantsSize.
        assert_eq!(push_constant_range().size, 64);
        assert!(push_constant_range().size <= 128);
    }

    #[test]
    fn depth_attachment_is_optional() {
        let color_only = attachments(vk::Format::B8G8R8A8_UNORM, None);
        assert_eq!(color_only.len(), 1);
        assert_eq!(color_only[0].final_layout, vk::ImageLayout::PRESENT_SRC_KHR);

        let with_depth = attachments(vk::Format::B8G8R8A8_UNORM, Some(vk::Format::D32_SFLOAT));
        assert_eq!(with_depth.len(), 2);
        assert_eq!(with_depth[1].store_op, vk::AttachmentStoreOp::DONT_CARE);
    }
}
