use crate::{common::LoadError, loader::Library};
use log::{debug, warn};
use std::{os::raw::c_int, path::Path};

type DecodeBytesFn = unsafe extern "C" fn(
    stream: *const u8,
    len: libc::size_t,
    height: c_int,
    width: c_int,
) -> *mut u8;
type FreeMemoryFn = unsafe extern "C" fn(buf: *mut u8);

/// The decoder shared object.
///
/// `bpg_decode_bytes` returns a freshly allocated RGB24 buffer of exactly
/// `height * width * 3` bytes, or null on failure. The caller owns it and must
/// hand it back through [`DecoderLibrary::free`].
pub struct DecoderLibrary {
    decode_bytes: DecodeBytesFn,
    free_memory: FreeMemoryFn,
    lib: Library,
}

impl DecoderLibrary {
    pub fn open(path: impl AsRef<Path>) -> Result<Self, LoadError> {
        let lib = Library::open(path.as_ref())?;
        unsafe {
            let decoder = DecoderLibrary {
                decode_bytes: lib.symbol("bpg_decode_bytes")?,
                free_memory: lib.symbol("free_memory")?,
                lib,
            };
            debug!("Decoder library loaded from {}", decoder.path().display());
            Ok(decoder)
        }
    }

    pub fn path(&self) -> &Path {
        self.lib.path()
    }

    pub fn decode(&self, stream: &[u8], height: i32, width: i32) -> *mut u8 {
        if stream.is_empty() || height <= 0 || width <= 0 {
            warn!(
                "bpg_decode_bytes: refusing {} byte stream at {}x{}",
                stream.len(),
                width,
                height
            );
            return std::ptr::null_mut();
        }
        unsafe {
            (self.decode_bytes)(
                stream.as_ptr(),
                stream.len() as libc::size_t,
                height,
                width,
            )
        }
    }

    /// # Safety
    ///
    /// `buf` must have been returned by [`DecoderLibrary::decode`] and not freed yet.
    pub unsafe fn free(&self, buf: *mut u8) {
        (self.free_memory)(buf);
    }
}
