//! Concrete storage for the backend's resource types: `Buffer`,
//! `BufferView`, `Texture`, `TextureView`, `Shader`, `Sampler`. Each is
//! kept in a `rhi_types::ResourcePool` instantiated with its matching
//! tag type, living on `VulkanContext`.

use ash::vk;
use fnv::FnvHasher;
use rhi_types::{BufferHandle, Format, ResourceState, TextureHandle};
use std::hash::Hasher;

use super::memory::{AllocatedBuffer, AllocatedImage};
use super::resource_state::{AccessState, SparseTextureState};

pub struct VulkanBuffer {
    pub allocated: AllocatedBuffer,
    pub usage: rhi_types::BufferUsageFlags,
    pub access: AccessState,
    pub debug_name: String,
}

pub struct VulkanBufferView {
    pub buffer: BufferHandle,
    pub offset: u64,
    pub range: u64,
    pub content_hash: u64,
}

pub struct VulkanTexture {
    pub allocated: Option<AllocatedImage>,
    pub image: vk::Image,
    pub format: Format,
    pub width: u32,
    pub height: u32,
    pub mip_levels: u32,
    pub array_layers: u32,
    pub is_swapchain_owned: bool,
    pub state: SparseTextureState,
    pub debug_name: String,
}

pub struct VulkanTextureView {
    pub texture: TextureHandle,
    pub view: vk::ImageView,
    pub format: Format,
    pub base_mip_level: u32,
    pub mip_level_count: u32,
    pub base_array_layer: u32,
    pub array_layer_count: u32,
}

pub struct VulkanShader {
    pub module: vk::ShaderModule,
    pub stage: rhi_types::ShaderStage,
    pub entry_point: String,
}

pub struct VulkanSampler {
    pub sampler: vk::Sampler,
}

/// Content hash for `BufferView`/`ResourceGroup` caching: identical
/// `(buffer, offset, range)` or identical binding sets return the same
/// handle. Plain FNV-1a.
pub fn fnv1a_hash(bytes: &[u8]) -> u64 {
    let mut hasher = FnvHasher::with_key(0xcbf2_9ce4_8422_2325);
    hasher.write(bytes);
    hasher.finish()
}

pub fn buffer_view_content_hash(buffer: BufferHandle, offset: u64, range: u64) -> u64 {
    let mut bytes = Vec::with_capacity(24);
    bytes.extend_from_slice(&buffer.raw().to_le_bytes());
    bytes.extend_from_slice(&offset.to_le_bytes());
    bytes.extend_from_slice(&range.to_le_bytes());
    fnv1a_hash(&bytes)
}

/// Initial access state for a freshly created resource: no reads or
/// writes have touched it, so "no barrier is needed until the first
/// real transition" falls out of `needs_barrier` naturally once a real
/// state (e.g. `SHADER_RESOURCE`) is requested.
pub fn undefined_access_state(queue_family: u32) -> AccessState {
    AccessState {
        stage_mask: 0,
        access_mask: 0,
        queue_family,
    }
}

pub fn default_subresource_state() -> ResourceState {
    ResourceState::UNDEFINED
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn fnv1a_matches_known_vector_for_empty_input() {
        assert_eq!(fnv1a_hash(&[]), 0xcbf2_9ce4_8422_2325);
    }

    #[test]
    fn buffer_view_hash_is_deterministic_and_order_sensitive() {
        let h = rhi_types::Handle::from_raw(7);
        let a = buffer_view_content_hash(h, 0, 64);
        let b = buffer_view_content_hash(h, 0, 64);
        let c = buffer_view_content_hash(h, 64, 0);
        assert_eq!(a, b);
        assert_ne!(a, c);
    }
}
