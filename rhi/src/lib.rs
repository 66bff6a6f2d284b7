//! Public façade for the RHI. Application code links against this
//! crate only: it calls [`init`], then the functions in
//! [`api`], then [`shutdown`]. `rhi_types` and `rhi_backend_traits`
//! are re-exported so callers never need to add those crates to their
//! own `Cargo.toml`.
//!
//! ```no_run
//! use rhi::rhi_types::{GraphicsApi, InitDesc};
//!
//! let desc = InitDesc {
//!     api: GraphicsApi::Vulkan,
//!     app_name: "demo".to_string(),
//!     enable_validation: cfg!(debug_assertions),
//!     surface: None,
//! };
//! rhi::init(&desc).expect("backend init failed");
//! // ... rhi::api::create_buffer(...), rhi::api::submit(...), ...
//! rhi::shutdown();
//! ```

pub mod api;
pub mod context;
mod dispatch;

pub use context::RhiContext;
pub use dispatch::{current_api, init, shutdown};

pub use rhi_backend_traits;
pub use rhi_types;
