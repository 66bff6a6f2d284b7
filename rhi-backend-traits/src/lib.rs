//! The dispatch boundary between the backend-agnostic `rhi` façade and
//! a concrete backend implementation (`rhi-backend`'s Vulkan backend,
//! or a future OpenGL one).

pub mod backend;
pub mod error;

pub use backend::Backend;
pub use error::{DeviceError, DeviceResult};
