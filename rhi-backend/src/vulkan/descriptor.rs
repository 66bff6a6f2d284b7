//! Concrete storage for the descriptor subsystem's two coexisting
//! binding models, plus the pure layout/sizing math behind them. The
//! native `vkCreateDescriptorPool`/`vkAllocateDescriptorSets` calls and
//! the `ResourcePool<T, Tag>` plumbing that assigns handles to these
//! values live in `backend.rs`, mirroring how `resources.rs` holds
//! concrete storage while pool bookkeeping stays at the backend layer.
//!
//! `UPDATE_AFTER_BIND`/`VARIABLE_DESCRIPTOR_COUNT` handling in layout
//! creation, per-type pool-size accumulation, and the persistent/
//! bindless/transient pool tiers all follow the same shape a classic
//! descriptor-set allocator uses, generalized to also cover the
//! descriptor-buffer (bindless) model.

use std::collections::HashMap;

use ash::vk;
use ash::vk::Handle as VkHandle;
use fnv::FnvHasher;
use rhi_types::{
    DescriptorHeapHandle, DescriptorHeapType, DescriptorPoolFlags, DescriptorPoolHandle,
    DescriptorType, ResourceGroupBinding, ResourceGroupBindingValue, SetLayoutBinding,
};
use std::hash::Hasher;

use super::memory::AllocatedBuffer;
use super::resources::fnv1a_hash;

pub const MAX_SET_LAYOUTS: usize = 16;
pub const MAX_PUSH_RANGES: usize = 8;

/// Conservative per-set size used when computing `DescriptorBuffer`
/// strides: every binding costs 64 bytes per array element, aligned up
/// to 256. This over-estimates real descriptor sizes (which vary by
/// type and device) but keeps stride computation independent of a live
/// device query.
const CONSERVATIVE_DESCRIPTOR_SIZE: u64 = 64;
const DESCRIPTOR_BUFFER_SET_ALIGNMENT: u64 = 256;

fn align_up(value: u64, align: u64) -> u64 {
    (value + align - 1) & !(align - 1)
}

pub struct VulkanSetLayout {
    pub native: vk::DescriptorSetLayout,
    pub bindings: Vec<SetLayoutBinding>,
    pub flags: DescriptorPoolFlags,
    /// Byte size of one set's worth of descriptors in the
    /// `DescriptorBuffer` model; meaningless for the classic model.
    pub stride_per_set: u64,
    /// `true` once any binding declares `count == u32::MAX`
    /// (runtime-sized / bindless).
    pub has_variable_count: bool,
}

/// Sums each binding's conservative per-descriptor cost and rounds up
/// to the descriptor-buffer set alignment. A binding with a runtime
/// (`u32::MAX`) count contributes zero extra bytes here — the caller
/// supplies the heap's actual variable-length capacity separately.
pub fn compute_stride_per_set(bindings: &[SetLayoutBinding]) -> u64 {
    let mut total = 0u64;
    for binding in bindings {
        if binding.count == u32::MAX {
            continue;
        }
        total += u64::from(binding.count) * CONSERVATIVE_DESCRIPTOR_SIZE;
    }
    align_up(total.max(1), DESCRIPTOR_BUFFER_SET_ALIGNMENT)
}

/// Builds the six-bucket `VkDescriptorPoolSize` table a classic pool
/// needs: each layout binding's `count` multiplied by the pool's
/// `capacity`, bucketed by descriptor type.
pub fn build_pool_sizes(bindings: &[SetLayoutBinding], capacity: u32) -> Vec<vk::DescriptorPoolSize> {
    let mut totals: HashMap<DescriptorType, u64> = HashMap::new();
    for binding in bindings {
        let count = if binding.count == u32::MAX { 1 } else { binding.count };
        *totals.entry(binding.descriptor_type).or_insert(0) += u64::from(count) * u64::from(capacity);
    }
    totals
        .into_iter()
        .filter(|&(_, count)| count > 0)
        .map(|(ty, count)| {
            vk::DescriptorPoolSize::default()
                .ty(super::format_mapping::descriptor_type_to_vk(ty))
                .descriptor_count(count.min(u64::from(u32::MAX)) as u32)
        })
        .collect()
}

/// `LINEAR` omits `FREE_DESCRIPTOR_SET`, `POOL` includes it.
/// `UPDATE_AFTER_BIND` on the layout forces the matching pool create
/// flag.
pub fn classic_pool_create_flags(pool_flags: DescriptorPoolFlags) -> vk::DescriptorPoolCreateFlags {
    let mut flags = vk::DescriptorPoolCreateFlags::empty();
    if pool_flags.contains(DescriptorPoolFlags::POOL) {
        flags |= vk::DescriptorPoolCreateFlags::FREE_DESCRIPTOR_SET;
    }
    if pool_flags.contains(DescriptorPoolFlags::UPDATE_AFTER_BIND) {
        flags |= vk::DescriptorPoolCreateFlags::UPDATE_AFTER_BIND;
    }
    flags
}

pub enum VulkanDescriptorPool {
    Sets {
        native: vk::DescriptorPool,
        layout_native: vk::DescriptorSetLayout,
        flags: DescriptorPoolFlags,
    },
    Buffer {
        heap: DescriptorHeapHandle,
        base_offset: u64,
        stride: u64,
        capacity: u32,
        write_ptr: u64,
        freelist: Vec<u32>,
        /// The layout's bindings, kept alongside the pool so a write
        /// against one of its sets can find each binding's byte offset
        /// without a separate set-layout lookup.
        bindings: Vec<SetLayoutBinding>,
    },
}

impl VulkanDescriptorPool {
    pub fn is_linear(&self) -> bool {
        match self {
            VulkanDescriptorPool::Sets { flags, .. } => flags.contains(DescriptorPoolFlags::LINEAR),
            VulkanDescriptorPool::Buffer { .. } => true,
        }
    }

    /// `LINEAR` bumps `write_ptr`; `POOL` pops the freelist.
    pub fn allocate_buffer_slot(&mut self) -> Option<u64> {
        match self {
            VulkanDescriptorPool::Buffer {
                base_offset,
                stride,
                capacity,
                write_ptr,
                freelist,
                ..
            } => {
                if !freelist.is_empty() {
                    let index = freelist.pop()?;
                    return Some(*base_offset + u64::from(index) * *stride);
                }
                let used_slots = *write_ptr / *stride;
                if used_slots >= u64::from(*capacity) {
                    return None;
                }
                let offset = *base_offset + *write_ptr;
                *write_ptr += *stride;
                Some(offset)
            }
            VulkanDescriptorPool::Sets { .. } => None,
        }
    }

    pub fn reset_linear(&mut self) {
        match self {
            VulkanDescriptorPool::Buffer { write_ptr, freelist, .. } => {
                *write_ptr = 0;
                freelist.clear();
            }
            VulkanDescriptorPool::Sets { .. } => {}
        }
    }
}

pub struct VulkanDescriptorHeap {
    pub buffer: AllocatedBuffer,
    pub mapped_ptr: Option<*mut u8>,
    pub device_address: u64,
    pub descriptor_size: u32,
    pub capacity: u32,
    pub heap_type: DescriptorHeapType,
}

// SAFETY: the mapped pointer is only dereferenced while the backend
// holds the descriptor subsystem's mutex.
unsafe impl Send for VulkanDescriptorHeap {}

impl VulkanDescriptorHeap {
    /// `(cpu_ptr_or_null, gpu_virtual_address, descriptor_byte_size)`
    /// for slot `index`.
    pub fn slot_ptr(&self, index: u32) -> (Option<*mut u8>, u64, u32) {
        let byte_offset = u64::from(index) * u64::from(self.descriptor_size);
        let cpu_ptr = self
            .mapped_ptr
            .map(|base| unsafe { base.add(byte_offset as usize) });
        let gpu_address = self.device_address + byte_offset;
        (cpu_ptr, gpu_address, self.descriptor_size)
    }
}

pub enum VulkanDescriptorSet {
    Native(vk::DescriptorSet),
    Buffer {
        pool: DescriptorPoolHandle,
        byte_offset: u64,
    },
}

/// Sums the conservative per-descriptor cost of every binding declared
/// before `target` in `bindings`, in the same order
/// `compute_stride_per_set` walks them. This is the byte offset of
/// `target` within one set's region of the descriptor buffer heap.
pub fn conservative_binding_offset(bindings: &[SetLayoutBinding], target: u32) -> Option<u64> {
    let mut offset = 0u64;
    for binding in bindings {
        if binding.binding == target {
            return Some(offset);
        }
        let count = if binding.count == u32::MAX { 1 } else { binding.count };
        offset += u64::from(count) * CONSERVATIVE_DESCRIPTOR_SIZE;
    }
    None
}

/// The classified binding model a `ResourceGroup` resolves to from its
/// layout's flags.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BindingModel {
    Static,
    Bindless,
    DynamicUniform,
    DynamicOffset,
    DescriptorBuffer,
}

/// `Static`/`Bindless` results are eligible for content-hash caching;
/// the dynamic variants bind fresh resources too often to benefit.
pub fn classify_binding_model(flags: DescriptorPoolFlags, has_variable_count: bool) -> BindingModel {
    if flags.contains(DescriptorPoolFlags::DESCRIPTOR_BUFFER) {
        return BindingModel::DescriptorBuffer;
    }
    if has_variable_count || flags.contains(DescriptorPoolFlags::UPDATE_AFTER_BIND) {
        return BindingModel::Bindless;
    }
    if flags.contains(DescriptorPoolFlags::LINEAR) {
        return BindingModel::DynamicOffset;
    }
    BindingModel::Static
}

pub fn is_cacheable(model: BindingModel) -> bool {
    matches!(model, BindingModel::Static | BindingModel::Bindless)
}

/// FNV-1a over a `ResourceGroup`'s bindings, order-sensitive, used to
/// cache `Static`/`Bindless` groups by content.
pub fn resource_group_content_hash(layout_native: vk::DescriptorSetLayout, bindings: &[ResourceGroupBinding]) -> u64 {
    let mut bytes = Vec::with_capacity(8 + bindings.len() * 24);
    bytes.extend_from_slice(&(layout_native.as_raw()).to_le_bytes());
    for binding in bindings {
        bytes.extend_from_slice(&binding.binding.to_le_bytes());
        match binding.value {
            ResourceGroupBindingValue::Buffer { buffer, offset, range } => {
                bytes.push(0);
                bytes.extend_from_slice(&buffer.raw().to_le_bytes());
                bytes.extend_from_slice(&offset.to_le_bytes());
                bytes.extend_from_slice(&range.to_le_bytes());
            }
            ResourceGroupBindingValue::Texture { view } => {
                bytes.push(1);
                bytes.extend_from_slice(&view.raw().to_le_bytes());
            }
        }
    }
    fnv1a_hash(&bytes)
}

/// Matches `fnv1a_hash` but keyed with `FnvHasher::with_key` directly
/// over a pre-built byte buffer, used by the three-tier pool manager to
/// key its persistent-pool LRU independent of `resources.rs`'s helper.
pub fn fnv1a_over_u32s(values: &[u32]) -> u64 {
    let mut hasher = FnvHasher::with_key(0xcbf2_9ce4_8422_2325);
    for value in values {
        hasher.write_u32(*value);
    }
    hasher.finish()
}

#[cfg(test)]
mod tests {
    use super::*;
    use rhi_types::ShaderStageFlags;

    fn binding(ty: DescriptorType, count: u32) -> SetLayoutBinding {
        SetLayoutBinding {
            binding: 0,
            descriptor_type: ty,
            count,
            stages: ShaderStageFlags::FRAGMENT,
        }
    }

    #[test]
    fn stride_sums_conservative_per_descriptor_cost() {
        let bindings = [binding(DescriptorType::UniformBuffer, 1), binding(DescriptorType::SampledImage, 2)];
        // (1 + 2) * 64 = 192, rounded up to 256.
        assert_eq!(compute_stride_per_set(&bindings), 256);
    }

    #[test]
    fn stride_ignores_variable_count_bindings() {
        let bindings = [binding(DescriptorType::SampledImage, u32::MAX)];
        assert_eq!(compute_stride_per_set(&bindings), DESCRIPTOR_BUFFER_SET_ALIGNMENT);
    }

    #[test]
    fn pool_sizes_multiply_binding_count_by_capacity() {
        let bindings = [binding(DescriptorType::UniformBuffer, 2)];
        let sizes = build_pool_sizes(&bindings, 10);
        assert_eq!(sizes.len(), 1);
        assert_eq!(sizes[0].descriptor_count, 20);
    }

    #[test]
    fn linear_pool_flags_omit_free_descriptor_set() {
        let flags = classic_pool_create_flags(DescriptorPoolFlags::LINEAR);
        assert!(!flags.contains(vk::DescriptorPoolCreateFlags::FREE_DESCRIPTOR_SET));
    }

    #[test]
    fn pool_flags_include_free_descriptor_set() {
        let flags = classic_pool_create_flags(DescriptorPoolFlags::POOL);
        assert!(flags.contains(vk::DescriptorPoolCreateFlags::FREE_DESCRIPTOR_SET));
    }

    #[test]
    fn classify_descriptor_buffer_takes_priority() {
        let flags = DescriptorPoolFlags::DESCRIPTOR_BUFFER | DescriptorPoolFlags::POOL;
        assert_eq!(classify_binding_model(flags, false), BindingModel::DescriptorBuffer);
    }

    #[test]
    fn classify_variable_count_is_bindless() {
        assert_eq!(classify_binding_model(DescriptorPoolFlags::POOL, true), BindingModel::Bindless);
    }

    #[test]
    fn classify_linear_without_variable_count_is_dynamic_offset() {
        assert_eq!(classify_binding_model(DescriptorPoolFlags::LINEAR, false), BindingModel::DynamicOffset);
    }

    #[test]
    fn classify_pool_without_variable_count_is_static() {
        assert_eq!(classify_binding_model(DescriptorPoolFlags::POOL, false), BindingModel::Static);
    }

    #[test]
    fn only_static_and_bindless_are_cacheable() {
        assert!(is_cacheable(BindingModel::Static));
        assert!(is_cacheable(BindingModel::Bindless));
        assert!(!is_cacheable(BindingModel::DynamicOffset));
        assert!(!is_cacheable(BindingModel::DescriptorBuffer));
    }

    #[test]
    fn content_hash_is_order_sensitive() {
        let layout = vk::DescriptorSetLayout::null();
        let a = [
            ResourceGroupBinding { binding: 0, value: ResourceGroupBindingValue::Texture { view: rhi_types::Handle::from_raw(1) } },
            ResourceGroupBinding { binding: 1, value: ResourceGroupBindingValue::Texture { view: rhi_types::Handle::from_raw(2) } },
        ];
        let b = [a[1], a[0]];
        assert_ne!(resource_group_content_hash(layout, &a), resource_group_content_hash(layout, &b));
    }

    #[test]
    fn buffer_pool_linear_bumps_write_ptr() {
        let mut pool = VulkanDescriptorPool::Buffer {
            heap: DescriptorHeapHandle::INVALID,
            base_offset: 0,
            stride: 256,
            capacity: 2,
            write_ptr: 0,
            freelist: Vec::new(),
            bindings: Vec::new(),
        };
        assert_eq!(pool.allocate_buffer_slot(), Some(0));
        assert_eq!(pool.allocate_buffer_slot(), Some(256));
        assert_eq!(pool.allocate_buffer_slot(), None);
    }

    #[test]
    fn buffer_pool_freelist_takes_priority_over_bump() {
        let mut pool = VulkanDescriptorPool::Buffer {
            heap: DescriptorHeapHandle::INVALID,
            base_offset: 1000,
            stride: 64,
            capacity: 4,
            write_ptr: 128,
            freelist: vec![3],
            bindings: Vec::new(),
        };
        assert_eq!(pool.allocate_buffer_slot(), Some(1000 + 3 * 64));
    }

    #[test]
    fn conservative_binding_offset_sums_preceding_bindings() {
        let bindings = [binding(DescriptorType::UniformBuffer, 1), binding(DescriptorType::SampledImage, 2)];
        let bindings = [
            SetLayoutBinding { binding: 0, ..bindings[0] },
            SetLayoutBinding { binding: 1, ..bindings[1] },
        ];
        assert_eq!(conservative_binding_offset(&bindings, 0), Some(0));
        assert_eq!(conservative_binding_offset(&bindings, 1), Some(64));
        assert_eq!(conservative_binding_offset(&bindings, 2), None);
    }
}
