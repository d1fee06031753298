//! Pixel format and resolution definitions

use serde::{Deserialize, Serialize};
use std::fmt;

/// Pixel layouts handled by the bridge
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum PixelFormat {
    /// Interleaved RGB, 3 bytes per pixel
    Rgb24,
    /// Planar Y, U, V with 2x2 chroma subsampling
    Yuv420,
}

impl fmt::Display for PixelFormat {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            PixelFormat::Rgb24 => "RGB24",
            PixelFormat::Yuv420 => "YUV420P",
        };
        write!(f, "{}", name)
    }
}

/// Resolution (width x height)
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Resolution {
    pub width: u32,
    pub height: u32,
}

impl Resolution {
    pub fn new(width: u32, height: u32) -> Self {
        Self { width, height }
    }

    /// Both sides non-zero
    pub fn is_valid(&self) -> bool {
        self.width > 0 && self.height > 0
    }

    /// Both sides divisible by two, so chroma planes cover the frame exactly
    pub fn is_even(&self) -> bool {
        self.width % 2 == 0 && self.height % 2 == 0
    }

    /// Get total pixels
    pub fn pixels(&self) -> usize {
        self.width as usize * self.height as usize
    }

    /// Interleaved RGB24 length
    pub fn rgb_len(&self) -> usize {
        self.pixels() * 3
    }

    /// Size of one 4:2:0 chroma plane. Odd sides round up.
    pub fn chroma(&self) -> Resolution {
        Resolution::new(self.width.div_ceil(2), self.height.div_ceil(2))
    }

    /// Y plane plus both chroma planes
    pub fn planar_len(&self) -> usize {
        self.pixels() + 2 * self.chroma().pixels()
    }
}

impl fmt::Display for Resolution {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}x{}", self.width, self.height)
    }
}
