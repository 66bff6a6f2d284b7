//! Pure argument types passed into `CommandList` encoding calls and
//! into `CommandQueue::submit`'s timeline return value.

use crate::format::Format;
use crate::handles::{BufferHandle, TextureHandle, TextureViewHandle};

/// A queue's timeline semaphore value at the moment a submission was
/// made. `Timeline(0)` never occurs — the first submission on a fresh
/// queue returns `Timeline(1)`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct Timeline(pub u64);

impl Timeline {
    pub const NONE: Timeline = Timeline(0);

    pub fn is_reached(self, completed: Timeline) -> bool {
        self.0 <= completed.0
    }
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ClearColor(pub [f32; 4]);

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ClearDepthStencil {
    pub depth: f32,
    pub stencil: u32,
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub enum ClearValue {
    Color(ClearColor),
    DepthStencil(ClearDepthStencil),
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Viewport {
    pub x: f32,
    pub y: f32,
    pub width: f32,
    pub height: f32,
    pub min_depth: f32,
    pub max_depth: f32,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Scissor {
    pub x: i32,
    pub y: i32,
    pub width: u32,
    pub height: u32,
}

/// A single attachment in a `begin_rendering` dynamic-rendering pass.
#[derive(Debug, Clone, Copy)]
pub struct RenderingAttachment {
    pub view: TextureViewHandle,
    pub load_clear: Option<ClearValue>,
}

#[derive(Debug, Clone)]
pub struct RenderingInfo<'a> {
    pub render_area: Scissor,
    pub color_attachments: &'a [RenderingAttachment],
    pub depth_attachment: Option<RenderingAttachment>,
}

/// Explicit synchronization-2 style barrier requests for
/// `CommandList::barrier`. `src`/`dst` are the access states being
/// transitioned between; `rhi-backend` resolves them to stage/access
/// masks via `needs_barrier`.
#[derive(Debug, Clone, Copy)]
pub struct MemoryBarrier {
    pub src: crate::enums::ResourceState,
    pub dst: crate::enums::ResourceState,
}

#[derive(Debug, Clone, Copy)]
pub struct BufferBarrier {
    pub buffer: BufferHandle,
    pub src: crate::enums::ResourceState,
    pub dst: crate::enums::ResourceState,
    pub offset: u64,
    pub size: u64,
}

#[derive(Debug, Clone, Copy)]
pub struct ImageBarrier {
    pub texture: TextureHandle,
    pub src: crate::enums::ResourceState,
    pub dst: crate::enums::ResourceState,
    pub base_mip_level: u32,
    pub mip_level_count: u32,
    pub base_array_layer: u32,
    pub array_layer_count: u32,
}

#[derive(Debug, Clone, Default)]
pub struct BarrierBatch<'a> {
    pub memory: &'a [MemoryBarrier],
    pub buffers: &'a [BufferBarrier],
    pub images: &'a [ImageBarrier],
}

/// Resolved texture format for a view whose descriptor requested
/// `Format::Undefined` ("inherit from texture").
pub fn resolve_view_format(requested: Format, texture_format: Format) -> Format {
    if requested == Format::Undefined {
        texture_format
    } else {
        requested
    }
}
