//! In-process identity codec
//!
//! The "stream" is the planar frame itself and decoding expands it back to
//! RGB24. It mirrors the native buffer protocol exactly (one shared output slot,
//! caller-released decode buffers), which makes it usable both for dry runs
//! without the shared objects and as a test double for the bridge.

use parking_lot::Mutex;
use std::collections::HashMap;
use tracing::warn;

use super::backend::CodecBackend;
use crate::error::{BridgeError, Result};
use crate::video::convert::{ChromaMode, PlanarFrame};
use crate::video::format::Resolution;

#[derive(Default)]
pub struct PassthroughBackend {
    /// Shared output slot, as the native encoder's global buffer
    encoded: Mutex<Option<Box<[u8]>>>,
    /// Decode buffers handed out and not yet released, keyed by address
    outstanding: Mutex<HashMap<usize, Box<[u8]>>>,
    /// How decode reads the chroma planes back
    chroma: ChromaMode,
}

impl PassthroughBackend {
    pub fn new() -> Self {
        Self::default()
    }

    /// Decode frames that were converted with `chroma`
    pub fn with_chroma(chroma: ChromaMode) -> Self {
        Self {
            chroma,
            ..Self::default()
        }
    }

    /// Decode buffers not yet released
    pub fn outstanding_decodes(&self) -> usize {
        self.outstanding.lock().len()
    }

    /// Whether the output slot currently holds a stream
    pub fn holds_encoded(&self) -> bool {
        self.encoded.lock().is_some()
    }
}

fn resolution_of(height: i32, width: i32) -> Option<Resolution> {
    let res = Resolution::new(u32::try_from(width).ok()?, u32::try_from(height).ok()?);
    res.is_valid().then_some(res)
}

// Safety: the slot is only replaced by encode and release_encoded; decode
// buffers live in `outstanding` until release_decoded removes them.
unsafe impl CodecBackend for PassthroughBackend {
    fn name(&self) -> &str {
        "passthrough"
    }

    fn encode(&self, planar: &[u8], height: i32, width: i32) -> Result<()> {
        let expected = resolution_of(height, width)
            .map(|res| res.planar_len())
            .ok_or_else(|| {
                BridgeError::EncodeFailed(format!("invalid dimensions {}x{}", width, height))
            })?;
        if planar.len() != expected {
            return Err(BridgeError::EncodeFailed(format!(
                "planar frame is {} bytes, expected {}",
                planar.len(),
                expected
            )));
        }
        *self.encoded.lock() = Some(planar.to_vec().into_boxed_slice());
        Ok(())
    }

    fn encoded_length(&self) -> usize {
        self.encoded.lock().as_ref().map_or(0, |buf| buf.len())
    }

    fn encoded_ptr(&self) -> *const u8 {
        self.encoded
            .lock()
            .as_ref()
            .map_or(std::ptr::null(), |buf| buf.as_ptr())
    }

    fn release_encoded(&self) -> Result<()> {
        self.encoded.lock().take();
        Ok(())
    }

    fn decode(&self, stream: &[u8], height: i32, width: i32) -> *mut u8 {
        let Some(resolution) = resolution_of(height, width) else {
            warn!("passthrough: invalid dimensions {}x{}", width, height);
            return std::ptr::null_mut();
        };
        let frame = match PlanarFrame::from_bytes(stream.to_vec(), resolution) {
            Ok(frame) => frame,
            Err(e) => {
                warn!("passthrough: cannot decode stream: {}", e);
                return std::ptr::null_mut();
            }
        };

        let mut rgb = frame.expand_to_rgb(self.chroma).into_boxed_slice();
        let ptr = rgb.as_mut_ptr();
        self.outstanding.lock().insert(ptr as usize, rgb);
        ptr
    }

    fn release_decoded(&self, buffer: *mut u8) -> Result<()> {
        match self.outstanding.lock().remove(&(buffer as usize)) {
            Some(_) => Ok(()),
            None => Err(BridgeError::ReleaseFailed(format!(
                "unknown decoder buffer {:p}",
                buffer
            ))),
        }
    }
}
