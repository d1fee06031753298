use bytes::Bytes;
use parking_lot::Mutex;
use serde::Serialize;
use std::fmt::Display;
use std::slice;
use std::sync::atomic::{AtomicU64, Ordering};
use std::time::Instant;
use tracing::{debug, trace, warn};

use super::backend::CodecBackend;
use crate::error::{BridgeError, Result};
use crate::video::convert::{DecodedRaster, PlanarFrame};
use crate::video::format::Resolution;

/// Stream copied out of the encoder
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct EncodedStream {
    data: Bytes,
    resolution: Resolution,
}

impl EncodedStream {
    pub fn new(data: Bytes, resolution: Resolution) -> Self {
        Self { data, resolution }
    }

    pub fn as_bytes(&self) -> &[u8] {
        &self.data
    }

    pub fn resolution(&self) -> Resolution {
        self.resolution
    }

    pub fn len(&self) -> usize {
        self.data.len()
    }

    pub fn is_empty(&self) -> bool {
        self.data.is_empty()
    }
}

impl Display for EncodedStream {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "encoded len:{}, resolution:{}", self.data.len(), self.resolution)
    }
}

/// Bridge counters (lock-free)
#[derive(Debug, Default)]
pub struct BridgeStats {
    encodes: AtomicU64,
    decodes: AtomicU64,
    encode_failures: AtomicU64,
    decode_failures: AtomicU64,
    encoder_releases: AtomicU64,
    decoder_releases: AtomicU64,
    release_failures: AtomicU64,
    bytes_encoded: AtomicU64,
    bytes_decoded: AtomicU64,
}

impl BridgeStats {
    pub fn snapshot(&self) -> BridgeStatsSnapshot {
        BridgeStatsSnapshot {
            encodes: self.encodes.load(Ordering::Relaxed),
            decodes: self.decodes.load(Ordering::Relaxed),
            encode_failures: self.encode_failures.load(Ordering::Relaxed),
            decode_failures: self.decode_failures.load(Ordering::Relaxed),
            encoder_releases: self.encoder_releases.load(Ordering::Relaxed),
            decoder_releases: self.decoder_releases.load(Ordering::Relaxed),
            release_failures: self.release_failures.load(Ordering::Relaxed),
            bytes_encoded: self.bytes_encoded.load(Ordering::Relaxed),
            bytes_decoded: self.bytes_decoded.load(Ordering::Relaxed),
        }
    }

    fn bump(counter: &AtomicU64, by: u64) {
        counter.fetch_add(by, Ordering::Relaxed);
    }
}

/// Point-in-time copy of [`BridgeStats`]
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct BridgeStatsSnapshot {
    pub encodes: u64,
    pub decodes: u64,
    pub encode_failures: u64,
    pub decode_failures: u64,
    pub encoder_releases: u64,
    pub decoder_releases: u64,
    pub release_failures: u64,
    pub bytes_encoded: u64,
    pub bytes_decoded: u64,
}

/// Releases the encoder's output slot when dropped
struct EncoderBufferGuard<'a, B: CodecBackend> {
    backend: &'a B,
    stats: &'a BridgeStats,
}

impl<B: CodecBackend> Drop for EncoderBufferGuard<'_, B> {
    fn drop(&mut self) {
        BridgeStats::bump(&self.stats.encoder_releases, 1);
        match self.backend.release_encoded() {
            Ok(()) => trace!("{}: encoder buffer released", self.backend.name()),
            Err(e) => {
                BridgeStats::bump(&self.stats.release_failures, 1);
                warn!("{}: releasing encoder buffer failed: {}", self.backend.name(), e);
            }
        }
    }
}

/// Owns one decoder-allocated buffer and gives it back when dropped
struct DecoderBufferGuard<'a, B: CodecBackend> {
    backend: &'a B,
    stats: &'a BridgeStats,
    ptr: *mut u8,
}

impl<B: CodecBackend> Drop for DecoderBufferGuard<'_, B> {
    fn drop(&mut self) {
        BridgeStats::bump(&self.stats.decoder_releases, 1);
        match self.backend.release_decoded(self.ptr) {
            Ok(()) => trace!("{}: decoder buffer released", self.backend.name()),
            Err(e) => {
                BridgeStats::bump(&self.stats.release_failures, 1);
                warn!("{}: releasing decoder buffer failed: {}", self.backend.name(), e);
            }
        }
        self.ptr = std::ptr::null_mut();
    }
}

/// Synchronous encode/decode over a [`CodecBackend`]
///
/// Encoding holds a lock from the encode call until the output slot has been
/// copied and released, because the slot is shared by every caller of the
/// backend. Decoding takes no lock.
pub struct CodecBridge<B: CodecBackend> {
    backend: B,
    encode_lock: Mutex<()>,
    stats: BridgeStats,
}

impl<B: CodecBackend> CodecBridge<B> {
    pub fn new(backend: B) -> Self {
        Self {
            backend,
            encode_lock: Mutex::new(()),
            stats: BridgeStats::default(),
        }
    }

    pub fn backend(&self) -> &B {
        &self.backend
    }

    pub fn stats(&self) -> BridgeStatsSnapshot {
        self.stats.snapshot()
    }

    /// Encode a planar frame and return an owned copy of the stream
    pub fn encode(&self, frame: &PlanarFrame) -> Result<EncodedStream> {
        let resolution = frame.resolution();
        let (height, width) = ffi_dims(resolution, frame.len())?;

        let _single_flight = self.encode_lock.lock();
        let start = Instant::now();
        let _release = EncoderBufferGuard {
            backend: &self.backend,
            stats: &self.stats,
        };

        let result = self.copy_encoded(frame.as_bytes(), height, width);
        match &result {
            Ok(data) => {
                BridgeStats::bump(&self.stats.encodes, 1);
                BridgeStats::bump(&self.stats.bytes_encoded, data.len() as u64);
                debug!(
                    "{}: encoded {} frame ({} bytes) into {} bytes in {:?}",
                    self.backend.name(),
                    resolution,
                    frame.len(),
                    data.len(),
                    start.elapsed()
                );
            }
            Err(_) => BridgeStats::bump(&self.stats.encode_failures, 1),
        }
        result.map(|data| EncodedStream::new(data, resolution))
    }

    fn copy_encoded(&self, planar: &[u8], height: i32, width: i32) -> Result<Bytes> {
        self.backend.encode(planar, height, width).map_err(|e| match e {
            BridgeError::EncodeFailed(_) => e,
            other => BridgeError::EncodeFailed(other.to_string()),
        })?;

        let len = self.backend.encoded_length();
        let ptr = self.backend.encoded_ptr();
        if ptr.is_null() || len == 0 {
            return Err(BridgeError::EncodeFailed(format!(
                "{} produced no output for {}x{}",
                self.backend.name(),
                width,
                height
            )));
        }
        // Safety: the backend contract keeps `ptr` valid for `len` bytes until
        // release_encoded, which runs after this copy.
        let stream = unsafe { slice::from_raw_parts(ptr, len) };
        Ok(Bytes::copy_from_slice(stream))
    }

    /// Decode a stream produced by [`CodecBridge::encode`]
    pub fn decode(&self, stream: &EncodedStream) -> Result<DecodedRaster> {
        self.decode_with(stream.as_bytes(), stream.resolution())
    }

    /// Decode raw stream bytes whose dimensions are known out of band
    pub fn decode_with(&self, stream: &[u8], resolution: Resolution) -> Result<DecodedRaster> {
        let result = self.decode_inner(stream, resolution);
        match &result {
            Ok(decoded) => {
                BridgeStats::bump(&self.stats.decodes, 1);
                BridgeStats::bump(&self.stats.bytes_decoded, decoded.len() as u64);
            }
            Err(_) => BridgeStats::bump(&self.stats.decode_failures, 1),
        }
        result
    }

    fn decode_inner(&self, stream: &[u8], resolution: Resolution) -> Result<DecodedRaster> {
        let (height, width) = ffi_dims(resolution, stream.len())?;
        if stream.is_empty() {
            return Err(BridgeError::DecodeFailed("empty stream".to_string()));
        }
        let expected = rgb_len_checked(resolution).ok_or_else(|| {
            BridgeError::DecodeFailed(format!("{} output does not fit in memory", resolution))
        })?;

        let start = Instant::now();
        let ptr = self.backend.decode(stream, height, width);
        if ptr.is_null() {
            return Err(BridgeError::DecodeFailed(format!(
                "{} returned no buffer for {} byte stream at {}",
                self.backend.name(),
                stream.len(),
                resolution
            )));
        }
        let guard = DecoderBufferGuard {
            backend: &self.backend,
            stats: &self.stats,
            ptr,
        };

        // Safety: a non-null decode result is valid for height*width*3 bytes
        // until release_decoded, which the guard calls after this copy.
        let data = unsafe { slice::from_raw_parts(guard.ptr, expected) }.to_vec();
        drop(guard);

        debug!(
            "{}: decoded {} bytes into {} RGB24 in {:?}",
            self.backend.name(),
            stream.len(),
            resolution,
            start.elapsed()
        );
        Ok(DecodedRaster::from_vec(data))
    }
}

/// Dimensions as the C ABI takes them
fn ffi_dims(resolution: Resolution, len: usize) -> Result<(i32, i32)> {
    let invalid = || BridgeError::InvalidDimensions {
        width: resolution.width,
        height: resolution.height,
        len,
    };
    if !resolution.is_valid() {
        return Err(invalid());
    }
    let height = i32::try_from(resolution.height).map_err(|_| invalid())?;
    let width = i32::try_from(resolution.width).map_err(|_| invalid())?;
    Ok((height, width))
}

fn rgb_len_checked(resolution: Resolution) -> Option<usize> {
    (resolution.width as usize)
        .checked_mul(resolution.height as usize)?
        .checked_mul(3)
        .filter(|&len| len <= isize::MAX as usize)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::codec::PassthroughBackend;
    use crate::video::convert::{forward, inverse, Raster};
    use std::sync::atomic::AtomicUsize;

    /// Passthrough codec that counts releases and can be told to misbehave
    #[derive(Default)]
    struct CountingBackend {
        inner: PassthroughBackend,
        encoder_releases: AtomicUsize,
        decoder_releases: AtomicUsize,
        /// encode reports an error
        failing_encode: bool,
        /// encode "succeeds" but leaves the output slot empty
        empty_output: bool,
        /// release_encoded reports an error after freeing
        failing_release: bool,
    }

    unsafe impl CodecBackend for CountingBackend {
        fn name(&self) -> &str {
            "counting"
        }

        fn encode(&self, planar: &[u8], height: i32, width: i32) -> Result<()> {
            if self.failing_encode {
                return Err(BridgeError::Library("encoder crashed".to_string()));
            }
            if self.empty_output {
                return Ok(());
            }
            self.inner.encode(planar, height, width)
        }

        fn encoded_length(&self) -> usize {
            self.inner.encoded_length()
        }

        fn encoded_ptr(&self) -> *const u8 {
            self.inner.encoded_ptr()
        }

        fn release_encoded(&self) -> Result<()> {
            self.encoder_releases.fetch_add(1, Ordering::SeqCst);
            self.inner.release_encoded()?;
            if self.failing_release {
                return Err(BridgeError::ReleaseFailed("injected".to_string()));
            }
            Ok(())
        }

        fn decode(&self, stream: &[u8], height: i32, width: i32) -> *mut u8 {
            self.inner.decode(stream, height, width)
        }

        fn release_decoded(&self, buffer: *mut u8) -> Result<()> {
            self.decoder_releases.fetch_add(1, Ordering::SeqCst);
            self.inner.release_decoded(buffer)
        }
    }

    impl CountingBackend {
        fn releases(&self) -> (usize, usize) {
            (
                self.encoder_releases.load(Ordering::SeqCst),
                self.decoder_releases.load(Ordering::SeqCst),
            )
        }
    }

    /// 2x2 blocks of black, red, green and blue; survives the passthrough codec exactly
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
    fn test_encode_decode_release_once() {
        let bridge = CodecBridge::new(CountingBackend::default());
        let raster = block_raster();
        let frame = forward(&raster).unwrap();

        let stream = bridge.encode(&frame).unwrap();
        assert_eq!(stream.as_bytes(), frame.as_bytes());
        assert_eq!(bridge.backend().releases(), (1, 0));
        assert!(!bridge.backend().inner.holds_encoded());

        let decoded = bridge.decode(&stream).unwrap();
        assert_eq!(bridge.backend().releases(), (1, 1));
        assert_eq!(bridge.backend().inner.outstanding_decodes(), 0);

        let restored = inverse(decoded, raster.resolution()).unwrap();
        assert_eq!(restored, raster);

        let stats = bridge.stats();
        assert_eq!(stats.encodes, 1);
        assert_eq!(stats.decodes, 1);
        assert_eq!(stats.encoder_releases, 1);
        assert_eq!(stats.decoder_releases, 1);
        assert_eq!(stats.bytes_encoded, 24);
        assert_eq!(stats.bytes_decoded, 48);
    }

    #[test]
    fn test_encode_error_still_releases() {
        let bridge = CodecBridge::new(CountingBackend {
            failing_encode: true,
            ..Default::default()
        });
        let frame = forward(&block_raster()).unwrap();

        let err = bridge.encode(&frame).unwrap_err();
        match err {
            BridgeError::EncodeFailed(msg) => assert!(msg.contains("encoder crashed")),
            other => panic!("unexpected error: {}", other),
        }
        assert_eq!(bridge.backend().releases(), (1, 0));
        assert_eq!(bridge.stats().encode_failures, 1);
        assert_eq!(bridge.stats().encodes, 0);
    }

    #[test]
    fn test_empty_encoder_output() {
        let bridge = CodecBridge::new(CountingBackend {
            empty_output: true,
            ..Default::default()
        });
        let frame = forward(&block_raster()).unwrap();

        let err = bridge.encode(&frame).unwrap_err();
        assert!(matches!(err, BridgeError::EncodeFailed(_)));
        assert_eq!(bridge.backend().releases(), (1, 0));
        assert_eq!(bridge.stats().encode_failures, 1);
    }

    #[test]
    fn test_release_failure_keeps_result() {
        let bridge = CodecBridge::new(CountingBackend {
            failing_release: true,
            ..Default::default()
        });
        let frame = forward(&block_raster()).unwrap();

        let stream = bridge.encode(&frame).unwrap();
        assert_eq!(stream.len(), 24);
        assert_eq!(bridge.stats().release_failures, 1);
        assert_eq!(bridge.stats().encode_failures, 0);
    }

    #[test]
    fn test_undecodable_stream_not_released() {
        let bridge = CodecBridge::new(CountingBackend::default());

        let err = bridge
            .decode_with(&[1, 2, 3], Resolution::new(4, 4))
            .unwrap_err();
        assert!(matches!(err, BridgeError::DecodeFailed(_)));

        let err = bridge.decode_with(&[], Resolution::new(4, 4)).unwrap_err();
        assert!(matches!(err, BridgeError::DecodeFailed(_)));

        let err = bridge
            .decode_with(&[0; 24], Resolution::new(0, 4))
            .unwrap_err();
        assert!(matches!(err, BridgeError::InvalidDimensions { .. }));

        assert_eq!(bridge.backend().releases(), (0, 0));
        assert_eq!(bridge.stats().decode_failures, 3);
    }

    #[test]
    fn test_concurrent_encodes() {
        let bridge = CodecBridge::new(PassthroughBackend::new());
        let resolution = Resolution::new(16, 8);

        std::thread::scope(|s| {
            for shade in 0..8u8 {
                let bridge = &bridge;
                s.spawn(move || {
                    let raster =
                        Raster::filled(resolution, [shade * 30, shade, shade * 2]).unwrap();
                    let frame = forward(&raster).unwrap();
                    for _ in 0..50 {
                        let stream = bridge.encode(&frame).unwrap();
                        assert_eq!(stream.as_bytes(), frame.as_bytes());
                    }
                });
            }
        });

        assert_eq!(bridge.stats().encodes, 400);
        assert!(!bridge.backend().holds_encoded());
    }

    #[test]
    fn test_ffi_dims() {
        assert_eq!(ffi_dims(Resolution::new(640, 480), 0).unwrap(), (480, 640));
        assert!(matches!(
            ffi_dims(Resolution::new(0, 480), 12).unwrap_err(),
            BridgeError::InvalidDimensions { len: 12, .. }
        ));
        assert!(ffi_dims(Resolution::new(u32::MAX, 2), 0).is_err());
    }

    #[test]
    fn test_rgb_len_checked() {
        assert_eq!(rgb_len_checked(Resolution::new(4, 4)), Some(48));
        assert_eq!(
            rgb_len_checked(Resolution::new(i32::MAX as u32, i32::MAX as u32)),
            None
        );
    }

    #[test]
    fn test_encoded_stream_display() {
        let stream = EncodedStream::new(Bytes::from_static(b"abc"), Resolution::new(2, 2));
        assert_eq!(stream.to_string(), "encoded len:3, resolution:2x2");
        assert_eq!(stream.as_bytes(), b"abc");
    }
}
