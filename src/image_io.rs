//! Image files in and out of [`Raster`]s

use image::{DynamicImage, RgbImage};
use std::path::Path;
use tracing::debug;

use crate::error::{BridgeError, Result};
use crate::video::convert::Raster;
use crate::video::format::Resolution;

/// Decode any supported image file to RGB24, dropping alpha
pub fn load_raster(path: &Path) -> Result<Raster> {
    let img = image::open(path)?.to_rgb8();
    let resolution = Resolution::new(img.width(), img.height());
    debug!("Loaded {} ({})", path.display(), resolution);
    Raster::new(img.into_raw(), resolution)
}

/// Encode a raster; the format follows the file extension
pub fn save_raster(path: &Path, raster: &Raster) -> Result<()> {
    let resolution = raster.resolution();
    let img = RgbImage::from_raw(
        resolution.width,
        resolution.height,
        raster.as_bytes().to_vec(),
    )
    .ok_or(BridgeError::SizeMismatch {
        expected: resolution.rgb_len(),
        actual: raster.as_bytes().len(),
    })?;
    DynamicImage::ImageRgb8(img).save(path)?;
    debug!("Saved {} ({})", path.display(), resolution);
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_png_roundtrip_is_lossless() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("frame.png");
        let data: Vec<u8> = (0..6 * 4 * 3).map(|i| (i * 7 % 256) as u8).collect();
        let raster = Raster::new(data, Resolution::new(6, 4)).unwrap();

        save_raster(&path, &raster).unwrap();
        let loaded = load_raster(&path).unwrap();
        assert_eq!(loaded, raster);
    }

    #[test]
    fn test_missing_file() {
        let err = load_raster(Path::new("/nonexistent/input.png")).unwrap_err();
        assert!(matches!(err, BridgeError::Image(_)));
    }
}
