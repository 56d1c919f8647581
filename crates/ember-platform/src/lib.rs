// SPDX-License-Identifier: CEPL-1.0
pub use winit;

use ember_core::Extent2D;
use winit::window::Window;

/// Current framebuffer size of `window`; zero while minimized.
pub fn framebuffer_extent(window: &Window) -> Extent2D {
    let size = window.inner_size();
    Extent2D::new(size.width, size.height)
}

/// Builds the extent source handed to the presentation engine. Only called
/// while the swap chain is being rebuilt.
pub fn extent_source(window: std::sync::Arc<Window>) -> impl FnMut() -> Extent2D + 'static {
    move || {
        let extent = framebuffer_extent(&window);
        tracing::trace!("window extent queried: {extent}");
        extent
    }
}
