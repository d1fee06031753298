//! `.bpg` file framing: a 4-byte magic followed by the raw codec stream

use bytes::{BufMut, Bytes, BytesMut};
use std::path::Path;
use tracing::debug;

use crate::error::{BridgeError, Result};

/// "BPG\xFB"
pub const BPG_MAGIC: [u8; 4] = [0x42, 0x50, 0x47, 0xFB];

/// Prefix a codec stream with the magic
pub fn wrap(stream: &[u8]) -> Bytes {
    let mut buf = BytesMut::with_capacity(BPG_MAGIC.len() + stream.len());
    buf.put_slice(&BPG_MAGIC);
    buf.put_slice(stream);
    buf.freeze()
}

/// Strip and check the magic, returning the codec stream
pub fn unwrap(file: &[u8]) -> Result<&[u8]> {
    match file.strip_prefix(&BPG_MAGIC[..]) {
        Some(stream) => Ok(stream),
        None if file.len() < BPG_MAGIC.len() => Err(BridgeError::Container(format!(
            "file too short for BPG header ({} bytes)",
            file.len()
        ))),
        None => Err(BridgeError::Container(format!(
            "bad magic {:02x?}",
            &file[..BPG_MAGIC.len()]
        ))),
    }
}

/// Write `stream` as a `.bpg` file
pub fn write_file(path: &Path, stream: &[u8]) -> Result<()> {
    std::fs::write(path, wrap(stream))?;
    debug!("Wrote {} byte stream to {}", stream.len(), path.display());
    Ok(())
}

/// Read a `.bpg` file and return the codec stream
pub fn read_file(path: &Path) -> Result<Bytes> {
    let file = Bytes::from(std::fs::read(path)?);
    let stream_len = unwrap(&file)?.len();
    Ok(file.slice(BPG_MAGIC.len()..BPG_MAGIC.len() + stream_len))
}
