//! The six-call contract of an external still-image codec

use crate::error::Result;

/// An encoder/decoder pair reached through raw buffers.
///
/// The encoder keeps its output in a single shared slot: [`encode`] fills it,
/// [`encoded_length`] and [`encoded_ptr`] read it back, [`release_encoded`]
/// frees it. The decoder instead returns a fresh buffer per call which the
/// caller gives back through [`release_decoded`].
///
/// Callers should go through [`CodecBridge`](super::CodecBridge), which
/// serializes the encoder slot and always releases both kinds of buffer.
///
/// # Safety
///
/// Implementors guarantee that after a successful [`encode`], [`encoded_ptr`]
/// is null or valid for reads of [`encoded_length`] bytes until the next
/// [`release_encoded`], and that a non-null pointer returned from [`decode`]
/// is valid for reads of `height * width * 3` bytes until it is passed to
/// [`release_decoded`].
///
/// [`encode`]: CodecBackend::encode
/// [`encoded_length`]: CodecBackend::encoded_length
/// [`encoded_ptr`]: CodecBackend::encoded_ptr
/// [`release_encoded`]: CodecBackend::release_encoded
/// [`decode`]: CodecBackend::decode
/// [`release_decoded`]: CodecBackend::release_decoded
pub unsafe trait CodecBackend: Send + Sync {
    /// Backend name for logs
    fn name(&self) -> &str;

    /// Encode one planar 4:2:0 frame into the shared output slot
    fn encode(&self, planar: &[u8], height: i32, width: i32) -> Result<()>;

    /// Length of the stream in the output slot
    fn encoded_length(&self) -> usize;

    /// Start of the stream in the output slot, null when empty
    fn encoded_ptr(&self) -> *const u8;

    /// Free the output slot
    fn release_encoded(&self) -> Result<()>;

    /// Decode a stream into a new RGB24 buffer, null on failure
    fn decode(&self, stream: &[u8], height: i32, width: i32) -> *mut u8;

    /// Free a buffer returned by [`CodecBackend::decode`]
    fn release_decoded(&self, buffer: *mut u8) -> Result<()>;
}
