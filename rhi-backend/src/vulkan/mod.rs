//! The Vulkan backend: one module per subsystem, tied together by
//! `backend::VulkanBackend`, the single type that implements
//! `rhi_backend_traits::Backend`.

pub mod command;
pub mod descriptor;
pub mod device;
pub mod format_mapping;
pub mod instance;
pub mod memory;
pub mod phy_device;
pub mod pipeline;
pub mod queue;
pub mod render_pass;
pub mod resource_state;
pub mod resources;
pub mod staging;
pub mod swapchain;
pub mod upload;

#[cfg(feature = "window")]
pub mod window;

mod backend;

pub use backend::VulkanBackend;
