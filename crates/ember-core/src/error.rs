// SPDX-License-Identifier: CEPL-1.0
use std::time::Duration;

use thiserror::Error;

use crate::Extent2D;

/// Failure reported by a graphics backend call.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum DeviceError {
    #[error("out of host or device memory")]
    OutOfMemory,
    #[error("device lost")]
    DeviceLost,
    #[error("surface lost")]
    SurfaceLost,
    #[error("timed out waiting for the GPU")]
    Timeout,
    #[error("{op} returned {code}")]
    Native { op: &'static str, code: i32 },
}

/// Fatal conditions surfaced by the presentation engine.
///
/// Staleness of the swap chain is recovered internally and never appears here;
/// everything in this enum ends the frame loop.
#[derive(Debug, Error)]
pub enum PresentError {
    #[error("cannot build a swap chain for extent {0}")]
    ZeroExtent(Extent2D),

    #[error("required capability not found: {0}")]
    CapabilityNotFound(String),

    #[error("failed to construct {what}")]
    Construction {
        what: &'static str,
        #[source]
        source: DeviceError,
    },

    #[error("swap chain still stale after {attempts} consecutive recreations")]
    PersistentlyStale { attempts: u32 },

    #[error("fence wait exceeded {0:?}")]
    FenceTimeout(Duration),

    #[error("{op} failed")]
    Device {
        op: &'static str,
        #[source]
        source: DeviceError,
    },
}

impl PresentError {
    pub fn construction(what: &'static str) -> impl FnOnce(DeviceError) -> Self {
        move |source| PresentError::Construction { what, source }
    }

    pub fn device(op: &'static str) -> impl FnOnce(DeviceError) -> Self {
        move |source| PresentError::Device { op, source }
    }

    /// Timeouts are treated like a lost device: the GPU stopped making progress.
    pub fn is_device_loss(&self) -> bool {
        match self {
            PresentError::FenceTimeout(_) => true,
            PresentError::Device { source, .. } | PresentError::Construction { source, .. } => {
                matches!(source, DeviceError::DeviceLost | DeviceError::Timeout)
            }
            _ => false,
        }
    }
}
