#[cfg(feature = "serde-serialize")]
use serde::{Deserialize, Serialize};

/// The dimensions of an image in pixels.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[cfg_attr(feature = "serde-serialize", derive(Serialize, Deserialize))]
pub struct ImageSize {
    pub width: u32,
    pub height: u32,
}

impl ImageSize {
    pub fn new(width: u32, height: u32) -> Self {
        Self { width, height }
    }

    /// Number of pixels in the image.
    pub fn area(&self) -> f64 {
        f64::from(self.width) * f64::from(self.height)
    }
}
