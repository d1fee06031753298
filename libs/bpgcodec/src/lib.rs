//! Runtime bindings for the prebuilt BPG encoder and decoder shared objects.
//!
//! The two libraries are opened with `dlopen` at runtime instead of being linked,
//! so the crate builds on machines that do not ship them. Each library exposes a
//! small C ABI; this crate resolves the symbols once and hands out typed calls.
//! Buffer ownership rules are documented on [`EncoderLibrary`] and
//! [`DecoderLibrary`]; enforcing them is left to the caller.

pub mod common;
pub mod decode;
pub mod encode;
mod loader;

pub use common::{planar_frame_len, LibraryPaths, LoadError, LoadErrorKind};
pub use decode::DecoderLibrary;
pub use encode::EncoderLibrary;

/// Open both libraries described by `paths`.
pub fn open(paths: &LibraryPaths) -> Result<(EncoderLibrary, DecoderLibrary), LoadError> {
    let encoder = EncoderLibrary::open(&paths.encoder)?;
    let decoder = DecoderLibrary::open(&paths.decoder)?;
    Ok((encoder, decoder))
}
