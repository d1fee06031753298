use serde_derive::{Deserialize, Serialize};
use std::{
    fmt::{self, Display},
    path::PathBuf,
};

/// Locations of the encoder and decoder shared objects.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize, Serialize)]
#[serde(default)]
pub struct LibraryPaths {
    pub encoder: PathBuf,
    pub decoder: PathBuf,
}

impl Default for LibraryPaths {
    fn default() -> Self {
        Self {
            encoder: PathBuf::from("./bpgenc.so"),
            decoder: PathBuf::from("./bpgdec.so"),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum LoadErrorKind {
    /// Path contains an interior NUL byte
    InvalidPath,
    /// `dlopen` failed
    Open(String),
    /// `dlsym` could not resolve a required entry point
    Symbol { name: String, message: String },
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LoadError {
    pub path: PathBuf,
    pub kind: LoadErrorKind,
}

impl Display for LoadError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match &self.kind {
            LoadErrorKind::InvalidPath => {
                write!(f, "invalid library path: {}", self.path.display())
            }
            LoadErrorKind::Open(msg) => {
                write!(f, "failed to open {}: {}", self.path.display(), msg)
            }
            LoadErrorKind::Symbol { name, message } => write!(
                f,
                "missing symbol `{}` in {}: {}",
                name,
                self.path.display(),
                message
            ),
        }
    }
}

impl std::error::Error for LoadError {}

/// Number of bytes the native encoder reads for one planar 4:2:0 frame.
///
/// The encoder uses `width / 2` strides for both chroma planes, so odd trailing
/// rows and columns are never read.
pub fn planar_frame_len(height: i32, width: i32) -> usize {
    if height <= 0 || width <= 0 {
        return 0;
    }
    let (h, w) = (height as usize, width as usize);
    w * h + 2 * (w / 2) * (h / 2)
}
