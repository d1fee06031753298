//! File-to-file round trip: load, convert, encode, decode, save

use bytes::Bytes;
use serde::Serialize;
use std::path::{Path, PathBuf};
use std::time::Instant;
use tracing::{debug, info};

use crate::codec::{container, CodecBackend, CodecBridge, EncodedStream};
use crate::config::OutputConfig;
use crate::error::{BridgeError, Result};
use crate::image_io;
use crate::video::convert::{self, ChromaMode, Raster};
use crate::video::format::Resolution;

/// Summary of one run, printable as JSON
#[derive(Debug, Clone, Serialize)]
pub struct RoundTripReport {
    pub input: PathBuf,
    pub output: Option<PathBuf>,
    pub stream: Option<PathBuf>,
    pub resolution: Resolution,
    pub planar_bytes: usize,
    pub encoded_bytes: usize,
    pub decoded_bytes: usize,
    /// Planar size over encoded size
    pub compression_ratio: f64,
    pub elapsed_ms: u64,
}

/// Drives a [`CodecBridge`] over image files
pub struct RoundTrip<'a, B: CodecBackend> {
    bridge: &'a CodecBridge<B>,
    output: OutputConfig,
    chroma: ChromaMode,
}

impl<'a, B: CodecBackend> RoundTrip<'a, B> {
    pub fn new(bridge: &'a CodecBridge<B>, output: OutputConfig) -> Self {
        Self {
            bridge,
            output,
            chroma: ChromaMode::default(),
        }
    }

    /// Convert frames with `chroma` instead of sampled G/B
    pub fn with_chroma(mut self, chroma: ChromaMode) -> Self {
        self.chroma = chroma;
        self
    }

    /// Forward-convert and encode an in-memory raster
    pub fn encode_raster(&self, raster: &Raster) -> Result<(usize, EncodedStream)> {
        let frame = convert::forward_with(raster, self.chroma)?;
        debug!(
            "Converted {} to {} ({} bytes, {} chroma)",
            raster.resolution(),
            frame.format(),
            frame.len(),
            self.chroma
        );
        let stream = self.bridge.encode(&frame)?;
        Ok((frame.len(), stream))
    }

    /// Decode a stream and return the displayable raster
    pub fn decode_stream(&self, stream: &[u8], resolution: Resolution) -> Result<Raster> {
        let decoded = self.bridge.decode_with(stream, resolution)?;
        convert::inverse(decoded, resolution)
    }

    /// Full round trip of `input` into `output`, optionally keeping the stream
    pub fn run(
        &self,
        input: &Path,
        output: &Path,
        stream_out: Option<&Path>,
    ) -> Result<RoundTripReport> {
        let start = Instant::now();
        self.check_writable(output)?;
        if let Some(path) = stream_out {
            self.check_writable(path)?;
        }

        let raster = image_io::load_raster(input)?;
        info!("Round trip {} ({})", input.display(), raster.resolution());

        let (planar_bytes, stream) = self.encode_raster(&raster)?;
        info!("Encoded {}", stream);
        if let Some(path) = stream_out {
            self.write_stream(path, stream.as_bytes())?;
        }

        let decoded = self.decode_stream(stream.as_bytes(), stream.resolution())?;
        image_io::save_raster(output, &decoded)?;
        info!("Saved round-tripped image to {}", output.display());

        Ok(RoundTripReport {
            input: input.to_path_buf(),
            output: Some(output.to_path_buf()),
            stream: stream_out.map(Path::to_path_buf),
            resolution: raster.resolution(),
            planar_bytes,
            encoded_bytes: stream.len(),
            decoded_bytes: decoded.as_bytes().len(),
            compression_ratio: ratio(planar_bytes, stream.len()),
            elapsed_ms: start.elapsed().as_millis() as u64,
        })
    }

    /// Image file → stream file
    pub fn encode_file(&self, input: &Path, stream_out: &Path) -> Result<RoundTripReport> {
        let start = Instant::now();
        self.check_writable(stream_out)?;

        let raster = image_io::load_raster(input)?;
        let (planar_bytes, stream) = self.encode_raster(&raster)?;
        self.write_stream(stream_out, stream.as_bytes())?;
        info!(
            "Encoded {} ({}) into {} ({} bytes)",
            input.display(),
            raster.resolution(),
            stream_out.display(),
            stream.len()
        );

        Ok(RoundTripReport {
            input: input.to_path_buf(),
            output: None,
            stream: Some(stream_out.to_path_buf()),
            resolution: raster.resolution(),
            planar_bytes,
            encoded_bytes: stream.len(),
            decoded_bytes: 0,
            compression_ratio: ratio(planar_bytes, stream.len()),
            elapsed_ms: start.elapsed().as_millis() as u64,
        })
    }

    /// Stream file → image file. The stream carries no dimensions, so the caller supplies them.
    pub fn decode_file(
        &self,
        stream_in: &Path,
        resolution: Resolution,
        output: &Path,
    ) -> Result<RoundTripReport> {
        let start = Instant::now();
        self.check_writable(output)?;

        let stream = self.read_stream(stream_in)?;
        let raster = self.decode_stream(&stream, resolution)?;
        image_io::save_raster(output, &raster)?;
        info!(
            "Decoded {} ({}) into {}",
            stream_in.display(),
            resolution,
            output.display()
        );

        Ok(RoundTripReport {
            input: stream_in.to_path_buf(),
            output: Some(output.to_path_buf()),
            stream: Some(stream_in.to_path_buf()),
            resolution,
            planar_bytes: resolution.planar_len(),
            encoded_bytes: stream.len(),
            decoded_bytes: raster.as_bytes().len(),
            compression_ratio: ratio(resolution.planar_len(), stream.len()),
            elapsed_ms: start.elapsed().as_millis() as u64,
        })
    }

    fn write_stream(&self, path: &Path, stream: &[u8]) -> Result<()> {
        if self.output.write_container {
            container::write_file(path, stream)
        } else {
            std::fs::write(path, stream)?;
            Ok(())
        }
    }

    fn read_stream(&self, path: &Path) -> Result<Bytes> {
        if self.output.write_container {
            container::read_file(path)
        } else {
            Ok(Bytes::from(std::fs::read(path)?))
        }
    }

    fn check_writable(&self, path: &Path) -> Result<()> {
        if !self.output.overwrite && path.exists() {
            return Err(BridgeError::Io(std::io::Error::new(
                std::io::ErrorKind::AlreadyExists,
                format!("{} already exists", path.display()),
            )));
        }
        Ok(())
    }
}

fn ratio(planar: usize, encoded: usize) -> f64 {
    if encoded == 0 {
        0.0
    } else {
        planar as f64 / encoded as f64
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::codec::PassthroughBackend;

    /// 2x2 blocks of black, red, green and blue
    fn block_raster() -> Raster {
        let blocks = [[0u8, 0, 0], [255, 0, 0], [0, 255, 0], [0, 0, 255]];
        let mut rgb = Vec::new();
        for y in 0..4usize {
            for x in 0..4usize {
                rgb.extend_from_slice(&blocks[(y / 2) * 2 + x / 2]);
            }
        }
        Raster::new(rgb, Resolution::new(4, 4)).unwrap()
    }

    #[test]
    fn test_round_trip_preserves_pixels() {
        let dir = tempfile::tempdir().unwrap();
        let input = dir.path().join("in.png");
        let output = dir.path().join("out.png");
        let stream_path = dir.path().join("out.bpg");
        let raster = block_raster();
        image_io::save_raster(&input, &raster).unwrap();

        let bridge = CodecBridge::new(PassthroughBackend::new());
        let pipeline = RoundTrip::new(&bridge, OutputConfig::default());
        let report = pipeline
            .run(&input, &output, Some(stream_path.as_path()))
            .unwrap();

        assert_eq!(report.resolution, Resolution::new(4, 4));
        assert_eq!(report.planar_bytes, 24);
        assert_eq!(report.encoded_bytes, 24);
        assert_eq!(report.decoded_bytes, 48);
        assert_eq!(image_io::load_raster(&output).unwrap(), raster);

        let file = std::fs::read(&stream_path).unwrap();
        assert_eq!(&file[..4], &container::BPG_MAGIC);
        let stats = bridge.stats();
        assert_eq!((stats.encoder_releases, stats.decoder_releases), (1, 1));
    }

    #[test]
    fn test_round_trip_bt601() {
        let dir = tempfile::tempdir().unwrap();
        let input = dir.path().join("in.png");
        let output = dir.path().join("out.png");
        let raster = Raster::filled(Resolution::new(6, 4), [100, 150, 200]).unwrap();
        image_io::save_raster(&input, &raster).unwrap();

        let bridge = CodecBridge::new(PassthroughBackend::with_chroma(ChromaMode::Bt601));
        let pipeline =
            RoundTrip::new(&bridge, OutputConfig::default()).with_chroma(ChromaMode::Bt601);
        pipeline.run(&input, &output, None).unwrap();

        let decoded = image_io::load_raster(&output).unwrap();
        for (got, want) in decoded.as_bytes().iter().zip(raster.as_bytes()) {
            assert!(got.abs_diff(*want) <= 2);
        }
    }

    #[test]
    fn test_failed_save_still_releases() {
        let dir = tempfile::tempdir().unwrap();
        let input = dir.path().join("in.png");
        image_io::save_raster(&input, &block_raster()).unwrap();

        let bridge = CodecBridge::new(PassthroughBackend::new());
        let pipeline = RoundTrip::new(&bridge, OutputConfig::default());
        let output = dir.path().join("missing-dir").join("out.png");
        assert!(pipeline.run(&input, &output, None).is_err());

        let stats = bridge.stats();
        assert_eq!((stats.encoder_releases, stats.decoder_releases), (1, 1));
        assert!(!bridge.backend().holds_encoded());
        assert_eq!(bridge.backend().outstanding_decodes(), 0);
    }

    #[test]
    fn test_encode_then_decode_files() {
        let dir = tempfile::tempdir().unwrap();
        let input = dir.path().join("in.png");
        let stream_path = dir.path().join("frame.bpg");
        let output = dir.path().join("out.png");
        let raster = Raster::filled(Resolution::new(8, 6), [255, 0, 0]).unwrap();
        image_io::save_raster(&input, &raster).unwrap();

        let bridge = CodecBridge::new(PassthroughBackend::new());
        let config = OutputConfig {
            write_container: false,
            overwrite: false,
        };
        let pipeline = RoundTrip::new(&bridge, config);

        let report = pipeline.encode_file(&input, &stream_path).unwrap();
        assert_eq!(report.encoded_bytes, 8 * 6 * 3 / 2);
        assert_eq!(std::fs::metadata(&stream_path).unwrap().len(), 72);

        pipeline
            .decode_file(&stream_path, Resolution::new(8, 6), &output)
            .unwrap();
        assert_eq!(image_io::load_raster(&output).unwrap(), raster);

        // overwrite disabled
        let err = pipeline.encode_file(&input, &stream_path).unwrap_err();
        assert!(matches!(err, BridgeError::Io(_)));
    }

    #[test]
    fn test_wrong_dimensions_fail_decode() {
        let bridge = CodecBridge::new(PassthroughBackend::new());
        let pipeline = RoundTrip::new(&bridge, OutputConfig::default());
        let (_, stream) = pipeline.encode_raster(&block_raster()).unwrap();

        let err = pipeline
            .decode_stream(stream.as_bytes(), Resolution::new(8, 8))
            .unwrap_err();
        assert!(matches!(err, BridgeError::DecodeFailed(_)));
    }
}
