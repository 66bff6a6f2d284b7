//! Frontend pixel/vertex formats.
//!
//! These are pure data — translating them to a concrete backend format
//! (e.g. `ash::vk::Format`) lives on the backend side, since that's the
//! only place that knows about the backend's enum. See `rhi-backend`'s
//! `vulkan::format_mapping` module.

/// Pixel format for textures, texture views and swapchain images.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub enum Format {
    #[default]
    Undefined,
    R8Unorm,
    Rg8Unorm,
    Rgba8Unorm,
    Rgba8Srgb,
    Bgra8Unorm,
    Bgra8Srgb,
    R16Sfloat,
    Rg16Sfloat,
    Rgba16Sfloat,
    R32Sfloat,
    Rg32Sfloat,
    Rgb32Sfloat,
    Rgba32Sfloat,
    D24UnormS8Uint,
    D32Sfloat,
    Bc1RgbaUnorm,
    Bc1RgbaSrgb,
    Bc3Unorm,
    Bc3Srgb,
}

impl Format {
    /// Whether this format carries a depth aspect.
    pub fn has_depth(self) -> bool {
        matches!(self, Format::D24UnormS8Uint | Format::D32Sfloat)
    }

    /// Whether this format carries a stencil aspect.
    pub fn has_stencil(self) -> bool {
        matches!(self, Format::D24UnormS8Uint)
    }

    pub fn is_depth_stencil(self) -> bool {
        self.has_depth() || self.has_stencil()
    }
}
