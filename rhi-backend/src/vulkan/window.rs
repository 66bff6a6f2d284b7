//! `window` feature: turns the opaque `RawSurfaceHandle` pair carried on
//! `InitDesc` into a `VkSurfaceKHR`, and reports the instance extensions
//! a platform surface needs so `Instance::new` can request them.
//!
//! Built on `ash-window`'s `enumerate_required_extensions`/
//! `create_surface` pair, the standard way `ash`-based engines bridge
//! `raw-window-handle` into `VK_KHR_surface`.

use std::ptr::NonNull;

use anyhow::{anyhow, Context as _};
use ash::khr;
use ash::vk;
use raw_window_handle::{RawDisplayHandle, RawWindowHandle, WaylandDisplayHandle, WaylandWindowHandle};
use rhi_types::RawSurfaceHandle;

/// Interprets the raw pointer pair as a Wayland `wl_display`/`wl_surface`
/// pair. `RawSurfaceHandle` is deliberately platform-opaque — this crate
/// never links against a windowing toolkit — so callers on other
/// platforms are expected to hand in the pointer shape their toolkit's
/// Wayland backend exposes, or to extend this match with their own
/// platform arm.
fn to_raw_handles(raw: RawSurfaceHandle) -> anyhow::Result<(RawDisplayHandle, RawWindowHandle)> {
    let display = NonNull::new(raw.display).context("RawSurfaceHandle::display was null")?;
    let window = NonNull::new(raw.window).context("RawSurfaceHandle::window was null")?;
    let display_handle = RawDisplayHandle::Wayland(WaylandDisplayHandle::new(display));
    let window_handle = RawWindowHandle::Wayland(WaylandWindowHandle::new(window));
    Ok((display_handle, window_handle))
}

/// Instance extensions required before a surface can be created from
/// `raw`. Must be passed to `Instance::new`'s `extra_extensions` before
/// `create_surface` is called against the resulting instance.
pub fn required_instance_extensions(raw: RawSurfaceHandle) -> anyhow::Result<Vec<*const i8>> {
    let (display_handle, _) = to_raw_handles(raw)?;
    let extensions = ash_window::enumerate_required_extensions(display_handle)
        .map_err(|err| anyhow!("enumerate_required_extensions failed: {err}"))?;
    Ok(extensions.to_vec())
}

pub fn create_surface(
    entry: &ash::Entry,
    instance: &ash::Instance,
    raw: RawSurfaceHandle,
) -> anyhow::Result<(khr::surface::Instance, vk::SurfaceKHR)> {
    let (display_handle, window_handle) = to_raw_handles(raw)?;
    let surface_loader = khr::surface::Instance::new(entry, instance);
    let surface = unsafe {
        ash_window::create_surface(entry, instance, display_handle, window_handle, None)
    }
    .map_err(|err| anyhow!("vkCreateSurfaceKHR failed: {err}"))?;
    Ok((surface_loader, surface))
}
