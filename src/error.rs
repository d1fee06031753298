use thiserror::Error;

/// Crate-wide error type
#[derive(Error, Debug)]
pub enum BridgeError {
    #[error("Invalid dimensions {width}x{height} for a buffer of {len} bytes")]
    InvalidDimensions { width: u32, height: u32, len: usize },

    #[error("Size mismatch: expected {expected} bytes, got {actual}")]
    SizeMismatch { expected: usize, actual: usize },

    #[error("Encode failed: {0}")]
    EncodeFailed(String),

    #[error("Decode failed: {0}")]
    DecodeFailed(String),

    #[error("Buffer release failed: {0}")]
    ReleaseFailed(String),

    #[error("Codec library error: {0}")]
    Library(String),

    #[error("Container error: {0}")]
    Container(String),

    #[error("Configuration error: {0}")]
    Config(String),

    #[error("Image error: {0}")]
    Image(#[from] image::ImageError),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),
}

impl From<bpgcodec::LoadError> for BridgeError {
    fn from(err: bpgcodec::LoadError) -> Self {
        BridgeError::Library(err.to_string())
    }
}

/// Result type alias
pub type Result<T> = std::result::Result<T, BridgeError>;
