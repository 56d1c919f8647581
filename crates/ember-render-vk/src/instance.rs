// SPDX-License-Identifier: CEPL-1.0
//! Loader, instance, debug messenger, surface.
use std::ffi::{c_char, CStr, CString};

use anyhow::{bail, Context, Result};
use ash::ext::debug_utils;
use ash::khr::surface;
use ash::{vk, Entry, Instance};
use ember_render::probe;
use raw_window_handle::{RawDisplayHandle, RawWindowHandle};
use tracing::{debug, error, info, trace, warn};

pub const VALIDATION_LAYER: &str = "VK_LAYER_KHRONOS_validation";

unsafe extern "system" fn debug_callback(
    severity: vk::DebugUtilsMessageSeverityFlagsEXT,
    types: vk::DebugUtilsMessageTypeFlagsEXT,
    data: *const vk::DebugUtilsMessengerCallbackDataEXT<'_>,
    _user: *mut std::os::raw::c_void,
) -> vk::Bool32 {
    if data.is_null() || (*data).p_message.is_null() {
        return vk::FALSE;
    }
    let msg = CStr::from_ptr((*data).p_message).to_string_lossy();
    let level = severity_level(severity);
    if level == tracing::Level::ERROR {
        error!(target: "vulkan", "[{types:?}] {msg}");
    } else if level == tracing::Level::WARN {
        warn!(target: "vulkan", "[{types:?}] {msg}");
    } else if level == tracing::Level::DEBUG {
        debug!(target: "vulkan", "[{types:?}] {msg}");
    } else {
        trace!(target: "vulkan", "[{types:?}] {msg}");
    }
    vk::FALSE
}

pub fn severity_level(severity: vk::DebugUtilsMessageSeverityFlagsEXT) -> tracing::Level {
    if severity.contains(vk::DebugUtilsMessageSeverityFlagsEXT::ERROR) {
        tracing::Level::ERROR
    } else if severity.contains(vk::DebugUtilsMessageSeverityFlagsEXT::WARNING) {
        tracing::Level::WARN
    } else if severity.contains(vk::DebugUtilsMessageSeverityFlagsEXT::INFO) {
        tracing::Level::DEBUG
    } else {
        tracing::Level::TRACE
    }
}

pub struct DebugMessenger {
    loader: debug_utils::Instance,
    messenger: vk::DebugUtilsMessengerEXT,
}

impl DebugMessenger {
    unsafe fn new(entry: &Entry, instance: &Instance) -> Result<Self> {
        let loader = debug_utils::Instance::new(entry, instance);
        let ci = vk::DebugUtilsMessengerCreateInfoEXT {
            s_type: vk::StructureType::DEBUG_UTILS_MESSENGER_CREATE_INFO_EXT,
            message_severity: vk::DebugUtilsMessageSeverityFlagsEXT::VERBOSE
                | vk::DebugUtilsMessageSeverityFlagsEXT::INFO
                | vk::DebugUtilsMessageSeverityFlagsEXT::WARNING
                | vk::DebugUtilsMessageSeverityFlagsEXT::ERROR,
            message_type: vk::DebugUtilsMessageTypeFlagsEXT::GENERAL
                | vk::DebugUtilsMessageTypeFlagsEXT::VALIDATION
                | vk::DebugUtilsMessageTypeFlagsEXT::PERFORMANCE,
            pfn_user_callback: Some(debug_callback),
            ..Default::default()
        };
        let messenger = loader
            .create_debug_utils_messenger(&ci, None)
            .context("create_debug_utils_messenger")?;
        Ok(Self { loader, messenger })
    }

    pub unsafe fn destroy(&self) {
        self.loader.destroy_debug_utils_messenger(self.messenger, None);
    }
}

unsafe fn c_names(raw: &[*const c_char]) -> Vec<String> {
    raw.iter()
        .map(|&p| CStr::from_ptr(p).to_string_lossy().into_owned())
        .collect()
}

unsafe fn available_layers(entry: &Entry) -> Result<Vec<String>> {
    let props = entry
        .enumerate_instance_layer_properties()
        .context("enumerate_instance_layer_properties")?;
    Ok(props
        .iter()
        .map(|p| CStr::from_ptr(p.layer_name.as_ptr()).to_string_lossy().into_owned())
        .collect())
}

unsafe fn available_extensions(entry: &Entry) -> Result<Vec<String>> {
    let props = entry
        .enumerate_instance_extension_properties(None)
        .context("enumerate_instance_extension_properties")?;
    Ok(props
        .iter()
        .map(|p| CStr::from_ptr(p.extension_name.as_ptr()).to_string_lossy().into_owned())
        .collect())
}

/// Instance plus the optional validation messenger.
pub struct InstanceBundle {
    pub entry: Entry,
    pub instance: Instance,
    pub debug: Option<DebugMessenger>,
}

pub unsafe fn create_instance(
    app_name: &str,
    display: RawDisplayHandle,
    validation: bool,
) -> Result<InstanceBundle> {
    // STRICT ORDER:
    // 1) Instance with WSI (+ debug) extensions
    // 2) Surface from THIS instance
    // 3) Physical device / queue selection AGAINST that surface
    let entry = Entry::load().context("load Vulkan loader")?;

    let required = ash_window::enumerate_required_extensions(display)
        .context("enumerate_required_extensions")?;
    let mut ext_ptrs = required.to_vec();

    let available = available_extensions(&entry)?;
    let required_names = c_names(required);
    let wanted: Vec<&str> = required_names.iter().map(String::as_str).collect();
    let missing = probe::missing(&available, &wanted);
    if !missing.is_empty() {
        bail!("instance extensions not available: {}", missing.join(", "));
    }

    let mut layer_names: Vec<CString> = Vec::new();
    let validation = validation && {
        let layers = available_layers(&entry)?;
        let ok = probe::count_matching(&layers, &[VALIDATION_LAYER]) == 1
            && probe::count_matching(&available, &["VK_EXT_debug_utils"]) == 1;
        if !ok {
            warn!("{VALIDATION_LAYER} or VK_EXT_debug_utils not installed; continuing without validation");
        }
        ok
    };
    if validation {
        layer_names.push(CString::new(VALIDATION_LAYER)?);
        ext_ptrs.push(debug_utils::NAME.as_ptr());
    }
    let layer_ptrs: Vec<*const c_char> = layer_names.iter().map(|l| l.as_ptr()).collect();

    let app = CString::new(app_name)?;
    let engine = c"ember";
    let app_info = vk::ApplicationInfo {
        s_type: vk::StructureType::APPLICATION_INFO,
        p_application_name: app.as_ptr(),
        application_version: 0,
        p_engine_name: engine.as_ptr(),
        engine_version: 0,
        api_version: vk::API_VERSION_1_1,
        ..Default::default()
    };

    let create_info = vk::InstanceCreateInfo {
        s_type: vk::StructureType::INSTANCE_CREATE_INFO,
        p_application_info: &app_info,
        enabled_extension_count: ext_ptrs.len() as u32,
        pp_enabled_extension_names: ext_ptrs.as_ptr(),
        enabled_layer_count: layer_ptrs.len() as u32,
        pp_enabled_layer_names: layer_ptrs.as_ptr(),
        ..Default::default()
    };
    let instance = entry
        .create_instance(&create_info, None)
        .context("create_instance")?;

    let debug = if validation {
        match DebugMessenger::new(&entry, &instance) {
            Ok(m) => Some(m),
            Err(e) => {
                instance.destroy_instance(None);
                return Err(e);
            }
        }
    } else {
        None
    };

    info!(
        "vk: instance created ({} extensions, validation={})",
        ext_ptrs.len(),
        validation
    );
    Ok(InstanceBundle {
        entry,
        instance,
        debug,
    })
}

pub unsafe fn create_surface(
    bundle: &InstanceBundle,
    display: RawDisplayHandle,
    window: RawWindowHandle,
) -> Result<(surface::Instance, vk::SurfaceKHR)> {
    let loader = surface::Instance::new(&bundle.entry, &bundle.instance);
    let surface = ash_window::create_surface(&bundle.entry, &bundle.instance, display, window, None)
        .context("ash_window::create_surface")?;
    Ok((loader, surface))
}
