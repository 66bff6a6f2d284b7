//! Concrete backend implementations of `rhi_backend_traits::Backend`.
//!
//! `vulkan` is the real, complete backend. `opengl` is intentionally a
//! stub: it implements `init`/`shutdown` and nothing else, since no
//! full OpenGL implementation exists here to port.

#[cfg(feature = "vulkan")]
pub mod vulkan;

#[cfg(feature = "opengl")]
pub mod opengl;
