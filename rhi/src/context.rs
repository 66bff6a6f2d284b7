//! `RhiContext` — the non-singleton value design note #4 calls for:
//! everything the process-wide dispatch cell in [`crate::dispatch`]
//! points at, held instead by a value an application or test owns
//! directly. `rhi::init`/`rhi::api` are sugar over a context that
//! happens to live in a `OnceLock`; tests that need two independent
//! backends (or a backend they can drop and recreate) go through this
//! type instead.

use rhi_backend_traits::{Backend, DeviceError, DeviceResult};
use rhi_types::{GraphicsApi, InitDesc};

/// Owns one backend instance end to end. Dropping a `RhiContext` does
/// not call `shutdown` automatically — callers call it explicitly so
/// the idle-wait and teardown order are visible at the call site,
/// matching how `Backend::shutdown` is documented to be driven.
pub struct RhiContext {
    backend: Box<dyn Backend>,
}

impl RhiContext {
    /// Constructs and initializes a new backend according to
    /// `desc.api`. Does not touch the process-wide dispatch cell in
    /// [`crate::dispatch`].
    pub fn new(desc: &InitDesc) -> DeviceResult<Self> {
        let backend: Box<dyn Backend> = match desc.api {
            #[cfg(feature = "vulkan")]
            GraphicsApi::Vulkan => Box::new(rhi_backend::vulkan::VulkanBackend::new()),
            #[cfg(not(feature = "vulkan"))]
            GraphicsApi::Vulkan => {
                return Err(DeviceError::InitializationFailed(
                    "the vulkan feature is not enabled".to_string(),
                ))
            }

            #[cfg(feature = "opengl")]
            GraphicsApi::OpenGl => Box::new(rhi_backend::opengl::OpenGlBackend::new()),
            #[cfg(not(feature = "opengl"))]
            GraphicsApi::OpenGl => {
                return Err(DeviceError::InitializationFailed(
                    "the opengl feature is not enabled".to_string(),
                ))
            }

            GraphicsApi::None => {
                return Err(DeviceError::InitializationFailed(
                    "InitDesc::api must name a concrete backend".to_string(),
                ))
            }
        };
        backend.init(desc)?;
        Ok(Self { backend })
    }

    pub fn api(&self) -> GraphicsApi {
        self.backend.api()
    }

    pub fn shutdown(&self) {
        self.backend.shutdown();
    }

    pub fn backend(&self) -> &dyn Backend {
        self.backend.as_ref()
    }

    /// Binds this context as the process-wide dispatch target so
    /// `rhi::api` forwarders reach it. Fails if `rhi::init`/a prior
    /// `bind_global` already armed the dispatch cell.
    pub fn bind_global(self) -> Result<(), Self> {
        crate::dispatch::bind(self.backend).map_err(|backend| Self { backend })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn rejects_unbacked_api() {
        let desc = InitDesc {
            api: GraphicsApi::None,
            app_name: "test".to_string(),
            enable_validation: false,
            surface: None,
        };
        assert!(RhiContext::new(&desc).is_err());
    }
}
