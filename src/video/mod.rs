//! Frame layouts and pixel conversion

pub mod convert;
pub mod format;

pub use convert::{forward, forward_with, inverse, ChromaMode, DecodedRaster, PlanarFrame, Raster};
pub use format::{PixelFormat, Resolution};
