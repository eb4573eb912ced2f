//! Versioned record codec
//!
//! Layout of an encoded record:
//!
//! ```text
//! +---------+---------------------------------+
//! | version | postcard body (fixed width)     |
//! +---------+---------------------------------+
//!   1 byte    Record::LEN - 1 bytes
//! ```
//!
//! The checksum trailer is appended by the engine, not here.

use coolmax_hal::BlockKind;
use serde::de::DeserializeOwned;
use serde::Serialize;

use super::engine::EngineConfig;

/// Current on-flash format version
pub const FORMAT_VERSION: u8 = 1;

/// Codec failure
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum CodecError {
    /// Output buffer shorter than the record
    BufferTooSmall,
    /// Body did not fit the fixed length
    Encode,
    /// Body could not be decoded
    Decode,
    /// Leading version byte not understood
    UnknownVersion(u8),
}

/// A configuration record with a fixed encoded length
pub trait Record: Serialize + DeserializeOwned + Clone + PartialEq {
    /// Block the record lives in
    const KIND: BlockKind;

    /// Encoded length including the version byte, excluding the trailer
    const LEN: usize;

    /// Literal defaults used when the stored copy is unusable
    fn defaults(config: &EngineConfig) -> Self;

    /// Encode into `out[..LEN]`, returning `LEN`
    fn encode(&self, out: &mut [u8]) -> Result<usize, CodecError> {
        if out.len() < Self::LEN {
            return Err(CodecError::BufferTooSmall);
        }
        let (version, body) = out[..Self::LEN].split_at_mut(1);
        version[0] = FORMAT_VERSION;
        let used = postcard::to_slice(self, body)
            .map_err(|_| CodecError::Encode)?
            .len();
        body[used..].fill(0);
        Ok(Self::LEN)
    }

    /// Decode from a payload of at least `LEN` bytes
    fn decode(payload: &[u8]) -> Result<Self, CodecError> {
        if payload.len() < Self::LEN {
            return Err(CodecError::BufferTooSmall);
        }
        match payload[0] {
            FORMAT_VERSION => {
                postcard::from_bytes(&payload[1..Self::LEN]).map_err(|_| CodecError::Decode)
            }
            other => Err(CodecError::UnknownVersion(other)),
        }
    }
}
