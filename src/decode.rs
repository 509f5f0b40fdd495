//! Artifact codec.
//!
//! Artifacts are single-frame zstd streams whose decompressed content is the raw
//! executable image. The decoder materializes the whole image in memory because the
//! replacer stages from a complete buffer.

use crate::core::{Result, SelfswapError};
use std::io::Read;

/// Compression level used by the packager unless told otherwise.
pub const DEFAULT_LEVEL: i32 = 4;

/// Decompress an artifact stream into the executable image.
///
/// # Errors
///
/// [`SelfswapError::Decode`] if the stream is not valid zstd or ends early.
pub fn decode_artifact(reader: impl Read) -> Result<Vec<u8>> {
    let mut decoder = zstd::stream::read::Decoder::new(reader)
        .map_err(|e| SelfswapError::decode("artifact", e))?;

    let mut image = Vec::new();
    decoder.read_to_end(&mut image).map_err(|e| SelfswapError::decode("artifact", e))?;

    Ok(image)
}

/// Compress an executable image into an artifact.
pub fn encode_artifact(image: &[u8], level: i32) -> Result<Vec<u8>> {
    zstd::stream::encode_all(image, level).map_err(SelfswapError::Io)
}
