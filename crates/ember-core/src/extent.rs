// SPDX-License-Identifier: CEPL-1.0
use std::fmt;

/// Size of a presentable surface in pixels.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Hash)]
pub struct Extent2D {
    pub width: u32,
    pub height: u32,
}

impl Extent2D {
    pub const fn new(width: u32, height: u32) -> Self {
        Self { width, height }
    }

    /// A minimized window reports a zero-sized framebuffer on most platforms.
    pub const fn is_zero(&self) -> bool {
        self.width == 0 || self.height == 0
    }

    pub fn clamp(self, min: Extent2D, max: Extent2D) -> Self {
        Self {
            width: self.width.clamp(min.width, max.width),
            height: self.height.clamp(min.height, max.height),
        }
    }

    pub fn aspect(&self) -> f32 {
        if self.height == 0 {
            1.0
        } else {
            self.width as f32 / self.height as f32
        }
    }
}

impl fmt::Display for Extent2D {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}x{}", self.width, self.height)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn zero_in_either_dimension() {
        assert!(Extent2D::new(0, 0).is_zero());
        assert!(Extent2D::new(800, 0).is_zero());
        assert!(Extent2D::new(0, 600).is_zero());
        assert!(!Extent2D::new(1, 1).is_zero());
    }

    #[test]
    fn clamp_to_surface_limits() {
        let want = Extent2D::new(4000, 10);
        let got = want.clamp(Extent2D::new(64, 64), Extent2D::new(2048, 2048));
        assert_eq!(got, Extent2D::new(2048, 64));
    }

    #[test]
    fn display_and_aspect() {
        let e = Extent2D::new(1280, 720);
        assert_eq!(e.to_string(), "1280x720");
        assert!((e.aspect() - 16.0 / 9.0).abs() < 1e-6);
        assert_eq!(Extent2D::new(10, 0).aspect(), 1.0);
    }
}
