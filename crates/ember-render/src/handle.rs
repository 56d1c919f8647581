// SPDX-License-Identifier: CEPL-1.0
//! Opaque, kind-tagged GPU object handles.
//!
//! Backends store their native 64-bit handle value inside; the core only
//! moves them around and compares them. A fence can never be passed where a
//! semaphore is expected.

macro_rules! define_handle {
    ($(#[$meta:meta])* $name:ident) => {
        $(#[$meta])*
        #[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord)]
        pub struct $name(u64);

        impl $name {
            pub const fn from_raw(raw: u64) -> Self {
                Self(raw)
            }

            pub const fn as_raw(self) -> u64 {
                self.0
            }
        }
    };
}

define_handle!(
    /// Presentable image chain bound to a surface.
    SwapchainHandle
);
define_handle!(
    /// Image owned by a swap chain; never destroyed individually.
    ImageHandle
);
define_handle!(ImageViewHandle);
define_handle!(FramebufferHandle);
define_handle!(CommandBufferHandle);
define_handle!(
    /// GPU-side signal (image available, render finished).
    SemaphoreHandle
);
define_handle!(
    /// CPU-visible signal marking retirement of a submission.
    FenceHandle
);
