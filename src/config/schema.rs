use bpgcodec::LibraryPaths;
use serde::{Deserialize, Serialize};

use crate::codec::BackendKind;
use crate::video::ChromaMode;

/// Main configuration
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct BridgeConfig {
    /// Codec backend settings
    pub codec: CodecConfig,
    /// Output file settings
    pub output: OutputConfig,
}

/// Codec backend configuration
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct CodecConfig {
    /// Backend to drive
    pub backend: BackendKind,
    /// Shared objects for the native backend
    pub libraries: LibraryPaths,
    /// Chroma content of the frames handed to the encoder
    pub chroma: ChromaMode,
}

/// Output configuration
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct OutputConfig {
    /// Prefix saved streams with the BPG magic
    pub write_container: bool,
    /// Replace existing output files
    pub overwrite: bool,
}

impl Default for OutputConfig {
    fn default() -> Self {
        Self {
            write_container: true,
            overwrite: true,
        }
    }
}
