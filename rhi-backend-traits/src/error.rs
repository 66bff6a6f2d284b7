//! Caller-visible error taxonomy for recoverable device/driver
//! failures. Contract violations are a `debug_assert!`/`assert!` in
//! `rhi-backend`, not a variant here, and resource exhaustion from a
//! pool is an invalid (`id == 0`) handle plus a `log::warn!`, never a
//! `Result`.

use thiserror::Error;

/// A recoverable device/driver-level failure, surfaced to callers that
/// need to react (e.g. `init` failing, a surface being lost outright).
/// Transient, per-frame failures (`OUT_OF_DATE_KHR`, `SUBOPTIMAL_KHR`)
/// are handled internally by the backend via a scheduled-resize retry
/// and do not reach this type.
#[derive(Debug, Error)]
pub enum DeviceError {
    #[error("no compatible physical device was found for the requested graphics API")]
    NoSuitableAdapter,

    #[error("device initialization failed: {0}")]
    InitializationFailed(String),

    #[error("the surface or swapchain was lost and cannot be recreated: {0}")]
    SurfaceLost(String),

    #[error("device was lost (driver crash or TDR): {0}")]
    DeviceLost(String),

    #[error("out of device memory while {context}")]
    OutOfDeviceMemory { context: String },

    #[error("backend call failed: {0}")]
    Backend(String),
}

pub type DeviceResult<T> = Result<T, DeviceError>;
