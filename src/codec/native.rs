//! Backend over the prebuilt BPG shared objects

use bpgcodec::{DecoderLibrary, EncoderLibrary, LibraryPaths};
use std::borrow::Cow;
use tracing::{debug, info};

use super::backend::CodecBackend;
use crate::error::{BridgeError, Result};
use crate::video::format::Resolution;

/// `bpgenc.so` + `bpgdec.so`, opened at runtime
pub struct NativeBackend {
    encoder: EncoderLibrary,
    decoder: DecoderLibrary,
}

impl NativeBackend {
    pub fn load(paths: &LibraryPaths) -> Result<Self> {
        let (encoder, decoder) = bpgcodec::open(paths)?;
        info!(
            "Native BPG codec loaded (encoder: {}, decoder: {})",
            encoder.path().display(),
            decoder.path().display()
        );
        Ok(Self { encoder, decoder })
    }
}

/// Lay a planar frame out the way `bpg_encode_bytes` reads it.
///
/// The encoder takes both chroma planes as `width / 2` by `height / 2` with V
/// starting right after U. Frames with an odd side carry rounded-up planes, so
/// their last chroma column or row is dropped here.
fn encoder_layout(planar: &[u8], height: i32, width: i32) -> Result<Cow<'_, [u8]>> {
    let resolution = match (u32::try_from(width), u32::try_from(height)) {
        (Ok(w), Ok(h)) if w > 0 && h > 0 => Resolution::new(w, h),
        _ => {
            return Err(BridgeError::EncodeFailed(format!(
                "invalid dimensions {}x{}",
                width, height
            )))
        }
    };
    if resolution.is_even() {
        return Ok(Cow::Borrowed(planar));
    }
    if planar.len() != resolution.planar_len() {
        return Err(BridgeError::EncodeFailed(format!(
            "planar frame is {} bytes, expected {} for {}",
            planar.len(),
            resolution.planar_len(),
            resolution
        )));
    }

    let luma_len = resolution.pixels();
    let chroma = resolution.chroma();
    let (src_w, src_h) = (chroma.width as usize, chroma.height as usize);
    let (dst_w, dst_h) = (
        resolution.width as usize / 2,
        resolution.height as usize / 2,
    );

    let mut packed = Vec::with_capacity(luma_len + 2 * dst_w * dst_h);
    packed.extend_from_slice(&planar[..luma_len]);
    let (u_plane, v_plane) = planar[luma_len..].split_at(src_w * src_h);
    for plane in [u_plane, v_plane] {
        for row in plane.chunks_exact(src_w).take(dst_h) {
            packed.extend_from_slice(&row[..dst_w]);
        }
    }
    debug!(
        "Repacked {} frame chroma from {} to {}x{}",
        resolution, chroma, dst_w, dst_h
    );
    Ok(Cow::Owned(packed))
}

// Safety: EncoderLibrary hands out the global buffer pointer and length as the
// C library reports them; DecoderLibrary returns the decoder's own allocation.
unsafe impl CodecBackend for NativeBackend {
    fn name(&self) -> &str {
        "native"
    }

    fn encode(&self, planar: &[u8], height: i32, width: i32) -> Result<()> {
        let frame = encoder_layout(planar, height, width)?;
        self.encoder.encode(&frame, height, width).map_err(|_| {
            BridgeError::EncodeFailed(format!(
                "native encoder rejected {} byte frame at {}x{}",
                planar.len(),
                width,
                height
            ))
        })
    }

    fn encoded_length(&self) -> usize {
        self.encoder.buffer_length()
    }

    fn encoded_ptr(&self) -> *const u8 {
        self.encoder.buffer()
    }

    fn release_encoded(&self) -> Result<()> {
        // free_memory tolerates null and always clears the length.
        unsafe {
            self.encoder.free(self.encoder.buffer());
        }
        Ok(())
    }

    fn decode(&self, stream: &[u8], height: i32, width: i32) -> *mut u8 {
        self.decoder.decode(stream, height, width)
    }

    fn release_decoded(&self, buffer: *mut u8) -> Result<()> {
        if buffer.is_null() {
            return Err(BridgeError::ReleaseFailed(
                "null decoder buffer".to_string(),
            ));
        }
        unsafe {
            self.decoder.free(buffer);
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::video::convert::forward_raw;
    use std::path::PathBuf;

    #[test]
    fn test_even_frame_passed_through() {
        let planar = vec![9u8; 24];
        let frame = encoder_layout(&planar, 4, 4).unwrap();
        assert!(matches!(frame, Cow::Borrowed(_)));
        assert_eq!(frame.len(), bpgcodec::planar_frame_len(4, 4));
    }

    #[test]
    fn test_odd_frame_repacked_for_encoder() {
        let resolution = Resolution::new(5, 3);
        let rgb: Vec<u8> = (0..15u8).flat_map(|i| [0, i, 100 + i]).collect();
        let planar = forward_raw(&rgb, resolution).unwrap();
        assert_eq!(planar.u_plane(), &[0u8, 2, 4, 10, 12, 14]);

        let frame = encoder_layout(planar.as_bytes(), 3, 5).unwrap();
        assert_eq!(frame.len(), bpgcodec::planar_frame_len(3, 5));
        assert_eq!(&frame[..15], planar.y_plane());
        // U at 15, V at 15 + (5 / 2) * (3 / 2)
        assert_eq!(&frame[15..17], &[0u8, 2]);
        assert_eq!(&frame[17..19], &[100u8, 102]);
    }

    #[test]
    fn test_odd_width_one() {
        let planar = forward_raw(&[10, 20, 30, 40, 50, 60, 70, 80, 90], Resolution::new(1, 3))
            .unwrap();
        let frame = encoder_layout(planar.as_bytes(), 3, 1).unwrap();
        assert_eq!(&frame[..], planar.y_plane());
    }

    #[test]
    fn test_layout_rejects_bad_frames() {
        assert!(matches!(
            encoder_layout(&[0u8; 20], 3, 5).unwrap_err(),
            BridgeError::EncodeFailed(_)
        ));
        assert!(encoder_layout(&[0u8; 24], -4, 4).is_err());
    }

    #[test]
    fn test_load_missing_libraries() {
        let paths = LibraryPaths {
            encoder: PathBuf::from("/nonexistent/bpgenc.so"),
            decoder: PathBuf::from("/nonexistent/bpgdec.so"),
        };
        let err = match NativeBackend::load(&paths) {
            Ok(_) => panic!("missing libraries must not load"),
            Err(e) => e,
        };
        match err {
            BridgeError::Library(msg) => assert!(msg.contains("/nonexistent/bpgenc.so")),
            other => panic!("unexpected error: {}", other),
        }
    }
}
