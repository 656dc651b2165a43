//! Thin wrapper over the `hex` crate. The reference client's own encoder
//! emits uppercase hex, but the protocol's lowercase-no-separators
//! convention is what this crate's callers (and the decoder below) match.

use crate::error::{Error, Result};

/// Encode `data` as lowercase hex.
pub fn encode(data: &[u8]) -> String {
    hex::encode(data)
}

/// Decode a hex string (either case accepted).
pub fn decode(src: &str) -> Result<Vec<u8>> {
    hex::decode(src).map_err(|e| Error::InvalidArgument(format!("invalid hex: {e}")))
}
