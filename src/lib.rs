//! bpg-bridge - planar 4:2:0 conversion and a safe bridge to native BPG codecs
//!
//! This crate converts RGB images into the planar frame layout the prebuilt
//! BPG encoder expects, drives the encoder/decoder shared objects through their
//! buffer-query C ABI, and writes the round-tripped image back to disk.

pub mod codec;
pub mod config;
pub mod error;
pub mod image_io;
pub mod pipeline;
pub mod video;

pub use error::{BridgeError, Result};
