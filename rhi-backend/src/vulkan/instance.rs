//! `VkInstance` bring-up. Out of this crate's scope is surface/window
//! creation itself; this module only creates the instance and, when the
//! `window` feature is enabled, the extensions needed to later create a
//! surface from a `raw-window-handle`.

use std::ffi::{CStr, CString};

use anyhow::{anyhow, Context};
use ash::vk;

pub struct Instance {
    pub entry: ash::Entry,
    pub vk_instance: ash::Instance,
    pub debug_utils: Option<(ash::ext::debug_utils::Instance, vk::DebugUtilsMessengerEXT)>,
}

unsafe extern "system" fn debug_callback(
    severity: vk::DebugUtilsMessageSeverityFlagsEXT,
    _types: vk::DebugUtilsMessageTypeFlagsEXT,
    data: *const vk::DebugUtilsMessengerCallbackDataEXT,
    _user_data: *mut std::ffi::c_void,
) -> vk::Bool32 {
    let message = unsafe { CStr::from_ptr((*data).p_message) }.to_string_lossy();
    if severity.contains(vk::DebugUtilsMessageSeverityFlagsEXT::ERROR) {
        log::error!(target: "vulkan", "{message}");
    } else if severity.contains(vk::DebugUtilsMessageSeverityFlagsEXT::WARNING) {
        log::warn!(target: "vulkan", "{message}");
    } else {
        log::debug!(target: "vulkan", "{message}");
    }
    vk::FALSE
}

impl Instance {
    pub fn new(app_name: &str, enable_validation: bool, extra_extensions: &[*const i8]) -> anyhow::Result<Self> {
        let entry = unsafe { ash::Entry::load() }.context("failed to load the Vulkan loader")?;

        let app_name_c = CString::new(app_name).unwrap_or_else(|_| CString::new("rhi").unwrap());
        let engine_name_c = CString::new("rhi").unwrap();
        let app_info = vk::ApplicationInfo::default()
            .application_name(&app_name_c)
            .engine_name(&engine_name_c)
            .api_version(vk::API_VERSION_1_2);

        let mut layer_names = Vec::new();
        let validation_layer = CString::new("VK_LAYER_KHRONOS_validation").unwrap();
        if enable_validation {
            layer_names.push(validation_layer.as_ptr());
        }

        let mut extensions: Vec<*const i8> = extra_extensions.to_vec();
        let debug_ext = ash::ext::debug_utils::NAME.as_ptr();
        if enable_validation {
            extensions.push(debug_ext);
        }

        let create_info = vk::InstanceCreateInfo::default()
            .application_info(&app_info)
            .enabled_layer_names(&layer_names)
            .enabled_extension_names(&extensions);

        let vk_instance = unsafe { entry.create_instance(&create_info, None) }
            .map_err(|err| anyhow!("vkCreateInstance failed: {err}"))?;

        let debug_utils = if enable_validation {
            let debug_utils_loader = ash::ext::debug_utils::Instance::new(&entry, &vk_instance);
            let messenger_info = vk::DebugUtilsMessengerCreateInfoEXT::default()
                .message_severity(
                    vk::DebugUtilsMessageSeverityFlagsEXT::ERROR
                        | vk::DebugUtilsMessageSeverityFlagsEXT::WARNING,
                )
                .message_type(
                    vk::DebugUtilsMessageTypeFlagsEXT::GENERAL
                        | vk::DebugUtilsMessageTypeFlagsEXT::VALIDATION
                        | vk::DebugUtilsMessageTypeFlagsEXT::PERFORMANCE,
                )
                .pfn_user_callback(Some(debug_callback));
            let messenger = unsafe {
                debug_utils_loader.create_debug_utils_messenger(&messenger_info, None)
            }
            .map_err(|err| anyhow!("create_debug_utils_messenger failed: {err}"))?;
            Some((debug_utils_loader, messenger))
        } else {
            None
        };

        Ok(Self {
            entry,
            vk_instance,
            debug_utils,
        })
    }
}

impl Drop for Instance {
    fn drop(&mut self) {
        unsafe {
            if let Some((loader, messenger)) = self.debug_utils.take() {
                loader.destroy_debug_utils_messenger(messenger, None);
            }
            self.vk_instance.destroy_instance(None);
        }
    }
}
