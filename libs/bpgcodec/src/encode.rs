use crate::{
    common::{planar_frame_len, LoadError},
    loader::Library,
};
use log::{debug, error};
use std::{os::raw::c_int, path::Path};

type EncodeBytesFn = unsafe extern "C" fn(frame: *const u8, height: c_int, width: c_int);
type GetBufFn = unsafe extern "C" fn() -> *mut u8;
type GetBufLengthFn = unsafe extern "C" fn() -> libc::size_t;
type FreeMemoryFn = unsafe extern "C" fn(buf: *mut u8);

/// The encoder shared object.
///
/// `bpg_encode_bytes` does not return its output. It stores the stream in a
/// process-global buffer that is read back through `get_buf_length` and
/// `get_buf`, and stays alive until `free_memory` is called with it. Calls from
/// different threads must be serialized by the caller until the buffer has been
/// copied out and freed.
pub struct EncoderLibrary {
    encode_bytes: EncodeBytesFn,
    get_buf: GetBufFn,
    get_buf_length: GetBufLengthFn,
    free_memory: FreeMemoryFn,
    lib: Library,
}

impl EncoderLibrary {
    pub fn open(path: impl AsRef<Path>) -> Result<Self, LoadError> {
        let lib = Library::open(path.as_ref())?;
        unsafe {
            let encoder = EncoderLibrary {
                encode_bytes: lib.symbol("bpg_encode_bytes")?,
                get_buf: lib.symbol("get_buf")?,
                get_buf_length: lib.symbol("get_buf_length")?,
                free_memory: lib.symbol("free_memory")?,
                lib,
            };
            debug!("Encoder library loaded from {}", encoder.path().display());
            Ok(encoder)
        }
    }

    pub fn path(&self) -> &Path {
        self.lib.path()
    }

    /// Encode one planar Y/U/V frame into the library's global buffer.
    ///
    /// Fails without calling out when `frame` is shorter than the encoder reads.
    pub fn encode(&self, frame: &[u8], height: i32, width: i32) -> Result<(), ()> {
        let required = planar_frame_len(height, width);
        if required == 0 || frame.len() < required {
            error!(
                "bpg_encode_bytes: frame of {} bytes too small for {}x{} (need {})",
                frame.len(),
                width,
                height,
                required
            );
            return Err(());
        }
        unsafe {
            (self.encode_bytes)(frame.as_ptr(), height, width);
        }
        Ok(())
    }

    /// Length of the stream currently held in the global buffer.
    pub fn buffer_length(&self) -> usize {
        unsafe { (self.get_buf_length)() as usize }
    }

    /// Pointer to the global buffer, null when no stream is held.
    pub fn buffer(&self) -> *mut u8 {
        unsafe { (self.get_buf)() }
    }

    /// Free the global buffer and reset its length.
    ///
    /// # Safety
    ///
    /// `buf` must be null or the pointer most recently returned by
    /// [`EncoderLibrary::buffer`], and must not be used afterwards.
    pub unsafe fn free(&self, buf: *mut u8) {
        (self.free_memory)(buf);
    }
}
