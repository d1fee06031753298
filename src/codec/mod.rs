//! Encoder/decoder bridge
//!
//! [`CodecBridge`] turns the call-then-query protocol of an external codec into
//! plain `encode`/`decode` calls that return owned buffers. Backends:
//!
//! - [`NativeBackend`]: the prebuilt `bpgenc.so` / `bpgdec.so` pair
//! - [`PassthroughBackend`]: stores the planar frame as the stream, for dry runs

pub mod backend;
pub mod bridge;
pub mod container;
pub mod native;
pub mod passthrough;

pub use backend::CodecBackend;
pub use bridge::{BridgeStats, BridgeStatsSnapshot, CodecBridge, EncodedStream};
pub use native::NativeBackend;
pub use passthrough::PassthroughBackend;

use serde::{Deserialize, Serialize};
use std::fmt;

/// Which backend to drive
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum BackendKind {
    #[default]
    Native,
    Passthrough,
}

impl fmt::Display for BackendKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            BackendKind::Native => write!(f, "native"),
            BackendKind::Passthrough => write!(f, "passthrough"),
        }
    }
}
