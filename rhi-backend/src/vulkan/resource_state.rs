//! Per-resource access/layout/queue state, advisory only — barriers are
//! issued explicitly via `CommandList::barrier`; nothing here inserts
//! one automatically.

use std::collections::HashMap;

use ash::vk;
use rhi_types::ResourceState;

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct AccessState {
    pub stage_mask: u64,
    pub access_mask: u64,
    pub queue_family: u32,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct SubresourceState {
    pub depth: ResourceState,
    pub stencil: ResourceState,
    pub color: ResourceState,
}

/// Per-texture sparse state: a `global` default plus optional overrides
/// on individual subresources.
#[derive(Debug, Clone, Default)]
pub struct SparseTextureState {
    pub global: SubresourceState,
    overrides: HashMap<u32, SubresourceState>,
}

impl SparseTextureState {
    pub fn subresource_index(mip_level: u32, array_layer: u32, mip_levels: u32) -> u32 {
        array_layer * mip_levels + mip_level
    }

    pub fn get(&self, subresource: u32) -> SubresourceState {
        self.overrides.get(&subresource).copied().unwrap_or(self.global)
    }

    pub fn set(&mut self, subresource: u32, state: SubresourceState) {
        self.overrides.insert(subresource, state);
    }

    pub fn set_global(&mut self, state: SubresourceState) {
        self.global = state;
        self.overrides.clear();
    }
}

const WRITE_STATES: ResourceState = ResourceState::from_bits_truncate(
    ResourceState::UNORDERED_ACCESS.bits()
        | ResourceState::RENDER_TARGET.bits()
        | ResourceState::DEPTH_WRITE.bits()
        | ResourceState::TRANSFER_DST.bits(),
);

fn is_read_only(state: ResourceState) -> bool {
    !state.intersects(WRITE_STATES)
}

/// True if transitioning `old -> new` needs an explicit barrier: either
/// side writes, the two states imply different layouts, or the
/// transition crosses a queue family. A pure stage change between two
/// read-only states needs no barrier.
pub fn needs_barrier(old: ResourceState, new: ResourceState, old_queue_family: u32, new_queue_family: u32) -> bool {
    if old == new {
        return false;
    }
    let crosses_queue_family = old_queue_family != new_queue_family
        && old_queue_family != vk::QUEUE_FAMILY_IGNORED
        && new_queue_family != vk::QUEUE_FAMILY_IGNORED;
    if crosses_queue_family {
        return true;
    }
    if !is_read_only(old) || !is_read_only(new) {
        return true;
    }
    // both read-only: a layout-affecting difference still needs one.
    old != new
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn read_only_to_read_only_same_state_is_no_barrier() {
        assert!(!needs_barrier(
            ResourceState::SHADER_RESOURCE,
            ResourceState::SHADER_RESOURCE,
            0,
            0
        ));
    }

    #[test]
    fn write_state_always_needs_a_barrier() {
        assert!(needs_barrier(
            ResourceState::SHADER_RESOURCE,
            ResourceState::RENDER_TARGET,
            0,
            0
        ));
    }

    #[test]
    fn queue_family_change_needs_a_barrier_even_if_state_is_unchanged() {
        assert!(needs_barrier(
            ResourceState::SHADER_RESOURCE,
            ResourceState::SHADER_RESOURCE,
            0,
            1
        ));
    }

    #[test]
    fn ignored_queue_family_is_not_a_transition() {
        assert!(!needs_barrier(
            ResourceState::SHADER_RESOURCE,
            ResourceState::SHADER_RESOURCE,
            vk::QUEUE_FAMILY_IGNORED,
            1
        ));
    }

    #[test]
    fn sparse_state_falls_back_to_global_without_override() {
        let mut state = SparseTextureState::default();
        state.set_global(SubresourceState {
            color: ResourceState::SHADER_RESOURCE,
            ..Default::default()
        });
        assert_eq!(state.get(3).color, ResourceState::SHADER_RESOURCE);

        state.set(
            3,
            SubresourceState {
                color: ResourceState::RENDER_TARGET,
                ..Default::default()
            },
        );
        assert_eq!(state.get(3).color, ResourceState::RENDER_TARGET);
        assert_eq!(state.get(0).color, ResourceState::SHADER_RESOURCE);
    }
}
