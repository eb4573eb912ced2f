//! Block integrity trailer
//!
//! Every configuration record is stored as `payload || crc16` with the
//! checksum in little-endian byte order. Platforms with a hardware CRC unit
//! implement [`Crc16::crc16`] with it; everyone else delegates to
//! [`crc16_ccitt`].

use crc::{Crc, CRC_16_IBM_3740};

/// Length of the checksum trailer appended to each stored block
pub const TRAILER_LEN: usize = 2;

/// Seed used for every block checksum
pub const CHECKSUM_SEED: u16 = 0x00FF;

const CCITT: Crc<u16> = Crc::<u16>::new(&CRC_16_IBM_3740);

/// Outcome of checking a block against its trailer
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum Verdict {
    /// Trailer matches the payload
    Pass,
    /// Trailer missing or does not match
    Fail,
}

pub trait Crc16 {
    fn crc16(init: u16, data: &[u8]) -> u16;

    /// Compute the checksum of `block[..len - 2]` and store it in the last
    /// two bytes. Blocks shorter than the trailer are left untouched.
    fn seal(block: &mut [u8]) {
        if block.len() < TRAILER_LEN {
            return;
        }
        let (payload, trailer) = block.split_at_mut(block.len() - TRAILER_LEN);
        trailer.copy_from_slice(&Self::crc16(CHECKSUM_SEED, payload).to_le_bytes());
    }

    /// Check a sealed block
    fn verify(block: &[u8]) -> Verdict {
        if block.len() < TRAILER_LEN {
            return Verdict::Fail;
        }
        let (payload, trailer) = block.split_at(block.len() - TRAILER_LEN);
        let stored = u16::from_le_bytes([trailer[0], trailer[1]]);
        if Self::crc16(CHECKSUM_SEED, payload) == stored {
            Verdict::Pass
        } else {
            Verdict::Fail
        }
    }
}

/// Software CRC-16/CCITT (polynomial 0x1021, MSB first) with a caller seed
pub fn crc16_ccitt(init: u16, data: &[u8]) -> u16 {
    let mut digest = CCITT.digest_with_initial(init);
    digest.update(data);
    digest.finalize()
}
