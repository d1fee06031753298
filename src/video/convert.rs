//! Pixel format conversion between interleaved RGB24 and planar 4:2:0
//!
//! The forward transform reproduces the reference BPG harness bit for bit:
//! luma uses the BT.601 weights truncated to 8 bits, while the two chroma planes
//! are point samples of the green and blue channels taken from every even row
//! and column. They are not colour-difference signals. Changing that would
//! change every encoded stream, so it stays the default. [`ChromaMode::Bt601`]
//! selects real BT.601 colour differences instead, as the standalone encoder
//! computes them.

use serde::{Deserialize, Serialize};
use std::fmt;

use crate::error::{BridgeError, Result};
use crate::video::format::{PixelFormat, Resolution};

const KR: f64 = 0.299;
const KG: f64 = 0.587;
const KB: f64 = 0.114;

/// What the two chroma planes carry
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ChromaMode {
    /// U = green, V = blue, sampled as is
    #[default]
    Sampled,
    /// BT.601 colour differences offset by 128
    Bt601,
}

impl ChromaMode {
    /// (U, V) for one RGB pixel
    #[inline]
    fn sample(self, r: u8, g: u8, b: u8) -> (u8, u8) {
        match self {
            ChromaMode::Sampled => (g, b),
            ChromaMode::Bt601 => {
                let (r, g, b) = (f64::from(r), f64::from(g), f64::from(b));
                let u = (-0.14713 * r - 0.28886 * g + 0.436 * b) as i32 + 128;
                let v = (0.615 * r - 0.51499 * g - 0.10001 * b) as i32 + 128;
                (u.clamp(0, 255) as u8, v.clamp(0, 255) as u8)
            }
        }
    }

    /// Inverse of [`ChromaMode::sample`] given the pixel's luma
    #[inline]
    fn restore(self, luma: u8, u: u8, v: u8) -> [u8; 3] {
        let y = f64::from(luma);
        match self {
            ChromaMode::Sampled => {
                let (g, b) = (f64::from(u), f64::from(v));
                let r = (y - KG * g - KB * b) / KR;
                [r.ceil().clamp(0.0, 255.0) as u8, u, v]
            }
            ChromaMode::Bt601 => {
                let (u, v) = (f64::from(u) - 128.0, f64::from(v) - 128.0);
                let r = y + 1.13983 * v;
                let g = y - 0.39465 * u - 0.58060 * v;
                let b = y + 2.03211 * u;
                [r, g, b].map(|c| c.round().clamp(0.0, 255.0) as u8)
            }
        }
    }
}

impl fmt::Display for ChromaMode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ChromaMode::Sampled => write!(f, "sampled"),
            ChromaMode::Bt601 => write!(f, "bt601"),
        }
    }
}

/// Interleaved RGB24 image, row-major
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Raster {
    data: Vec<u8>,
    resolution: Resolution,
}

impl Raster {
    /// Wrap an RGB24 buffer, checking it against the resolution
    pub fn new(data: Vec<u8>, resolution: Resolution) -> Result<Self> {
        check_rgb_len(data.len(), resolution)?;
        Ok(Self { data, resolution })
    }

    /// A raster of one colour
    pub fn filled(resolution: Resolution, rgb: [u8; 3]) -> Result<Self> {
        let data = rgb
            .iter()
            .copied()
            .cycle()
            .take(resolution.rgb_len())
            .collect();
        Self::new(data, resolution)
    }

    pub fn as_bytes(&self) -> &[u8] {
        &self.data
    }

    pub fn into_bytes(self) -> Vec<u8> {
        self.data
    }

    pub fn resolution(&self) -> Resolution {
        self.resolution
    }

    pub fn format(&self) -> PixelFormat {
        PixelFormat::Rgb24
    }
}

/// Planar frame: Y plane followed by the U and V planes
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PlanarFrame {
    /// Raw buffer containing all planes
    data: Vec<u8>,
    resolution: Resolution,
    /// U plane offset (Y always starts at 0)
    u_offset: usize,
    /// V plane offset
    v_offset: usize,
}

impl PlanarFrame {
    /// Zeroed frame for the given resolution
    pub fn new(resolution: Resolution) -> Self {
        let y_size = resolution.pixels();
        let uv_size = resolution.chroma().pixels();

        Self {
            data: vec![0u8; y_size + uv_size * 2],
            resolution,
            u_offset: y_size,
            v_offset: y_size + uv_size,
        }
    }

    /// Take an existing planar buffer, e.g. one read back from a codec
    pub fn from_bytes(data: Vec<u8>, resolution: Resolution) -> Result<Self> {
        if !resolution.is_valid() {
            return Err(BridgeError::InvalidDimensions {
                width: resolution.width,
                height: resolution.height,
                len: data.len(),
            });
        }
        let expected = resolution.planar_len();
        if data.len() != expected {
            return Err(BridgeError::SizeMismatch {
                expected,
                actual: data.len(),
            });
        }
        let y_size = resolution.pixels();
        let uv_size = resolution.chroma().pixels();
        Ok(Self {
            data,
            resolution,
            u_offset: y_size,
            v_offset: y_size + uv_size,
        })
    }

    /// Get the raw buffer as bytes
    pub fn as_bytes(&self) -> &[u8] {
        &self.data
    }

    pub fn into_bytes(self) -> Vec<u8> {
        self.data
    }

    /// Get Y plane
    pub fn y_plane(&self) -> &[u8] {
        &self.data[..self.u_offset]
    }

    /// Get U plane
    pub fn u_plane(&self) -> &[u8] {
        &self.data[self.u_offset..self.v_offset]
    }

    /// Get V plane
    pub fn v_plane(&self) -> &[u8] {
        &self.data[self.v_offset..]
    }

    /// All three planes, mutable and disjoint
    pub fn planes_mut(&mut self) -> (&mut [u8], &mut [u8], &mut [u8]) {
        let (y, rest) = self.data.split_at_mut(self.u_offset);
        let (u, v) = rest.split_at_mut(self.v_offset - self.u_offset);
        (y, u, v)
    }

    pub fn len(&self) -> usize {
        self.data.len()
    }

    pub fn is_empty(&self) -> bool {
        self.data.is_empty()
    }

    pub fn resolution(&self) -> Resolution {
        self.resolution
    }

    pub fn format(&self) -> PixelFormat {
        PixelFormat::Yuv420
    }

    /// Rebuild an RGB24 buffer from the planes.
    ///
    /// Chroma is upsampled by nearest neighbour. With [`ChromaMode::Sampled`], G
    /// and B are read back from the U and V planes and R is the smallest value
    /// consistent with the truncated luma, so 2x2-constant rasters whose red
    /// channel satisfies that survive a forward/expand cycle unchanged.
    /// [`ChromaMode::Bt601`] uses the matching inverse matrix and is lossy.
    pub fn expand_to_rgb(&self, chroma: ChromaMode) -> Vec<u8> {
        let width = self.resolution.width as usize;
        let chroma_width = self.resolution.chroma().width as usize;
        let (y_plane, u_plane, v_plane) = (self.y_plane(), self.u_plane(), self.v_plane());

        let mut rgb = Vec::with_capacity(self.resolution.rgb_len());
        for (idx, &luma) in y_plane.iter().enumerate() {
            let (row, col) = (idx / width, idx % width);
            let c = (row / 2) * chroma_width + col / 2;
            rgb.extend_from_slice(&chroma.restore(luma, u_plane[c], v_plane[c]));
        }
        rgb
    }
}

/// RGB24 bytes handed back by a decoder
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DecodedRaster {
    data: Vec<u8>,
}

impl DecodedRaster {
    pub fn from_vec(data: Vec<u8>) -> Self {
        Self { data }
    }

    pub fn as_bytes(&self) -> &[u8] {
        &self.data
    }

    pub fn len(&self) -> usize {
        self.data.len()
    }

    pub fn is_empty(&self) -> bool {
        self.data.is_empty()
    }
}

/// Luma of one pixel, truncated to 8 bits
#[inline]
pub fn luma(r: u8, g: u8, b: u8) -> u8 {
    let y = KR * f64::from(r) + KG * f64::from(g) + KB * f64::from(b);
    y.clamp(0.0, 255.0) as u8
}

/// RGB24 raster → planar 4:2:0 frame with sampled G/B chroma
pub fn forward(raster: &Raster) -> Result<PlanarFrame> {
    forward_raw(raster.as_bytes(), raster.resolution())
}

/// Same as [`forward`] for a borrowed RGB24 buffer
pub fn forward_raw(rgb: &[u8], resolution: Resolution) -> Result<PlanarFrame> {
    forward_raw_with(rgb, resolution, ChromaMode::Sampled)
}

/// [`forward`] with a selectable chroma mode
pub fn forward_with(raster: &Raster, chroma: ChromaMode) -> Result<PlanarFrame> {
    forward_raw_with(raster.as_bytes(), raster.resolution(), chroma)
}

pub fn forward_raw_with(
    rgb: &[u8],
    resolution: Resolution,
    chroma_mode: ChromaMode,
) -> Result<PlanarFrame> {
    check_rgb_len(rgb.len(), resolution)?;

    let width = resolution.width as usize;
    let chroma = resolution.chroma();
    let mut frame = PlanarFrame::new(resolution);
    let (y_plane, u_plane, v_plane) = frame.planes_mut();

    for (dst, px) in y_plane.iter_mut().zip(rgb.chunks_exact(3)) {
        *dst = luma(px[0], px[1], px[2]);
    }

    // Even rows and columns only
    let row_stride = width * 3;
    let chroma_width = chroma.width as usize;
    for (cy, row) in rgb.chunks_exact(row_stride).step_by(2).enumerate() {
        let u_row = &mut u_plane[cy * chroma_width..(cy + 1) * chroma_width];
        let v_row = &mut v_plane[cy * chroma_width..(cy + 1) * chroma_width];
        for (cx, px) in row.chunks_exact(3).step_by(2).enumerate() {
            (u_row[cx], v_row[cx]) = chroma_mode.sample(px[0], px[1], px[2]);
        }
    }

    Ok(frame)
}

/// Decoder output → raster. Decoders already emit RGB24, so this only checks the length.
pub fn inverse(decoded: DecodedRaster, resolution: Resolution) -> Result<Raster> {
    if !resolution.is_valid() {
        return Err(BridgeError::InvalidDimensions {
            width: resolution.width,
            height: resolution.height,
            len: decoded.len(),
        });
    }
    let expected = resolution.rgb_len();
    if decoded.len() != expected {
        return Err(BridgeError::SizeMismatch {
            expected,
            actual: decoded.len(),
        });
    }
    Ok(Raster {
        data: decoded.data,
        resolution,
    })
}

fn check_rgb_len(len: usize, resolution: Resolution) -> Result<()> {
    if !resolution.is_valid() || len != resolution.rgb_len() {
        return Err(BridgeError::InvalidDimensions {
            width: resolution.width,
            height: resolution.height,
            len,
        });
    }
    Ok(())
}
