//! Factory calibration segment
//!
//! ```text
//! bytes 0..2    stored checksum (LE)
//! bytes 2..62   calibration words (LE), covered by the checksum
//! bytes 62..64  device trim bytes, not covered
//! ```
//!
//! The segment is valid when the XOR of the covered words plus the stored
//! checksum wraps to zero. An erased (all 0xFF) segment is never valid.

use coolmax_hal::SEGMENT_LEN;

const CHECKSUM_END: usize = 2;
const COVERED_END: usize = 62;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub struct CalibrationSegment([u8; SEGMENT_LEN]);

impl CalibrationSegment {
    pub const fn new(bytes: [u8; SEGMENT_LEN]) -> Self {
        Self(bytes)
    }

    /// Erased flash
    pub const fn blank() -> Self {
        Self([0xFF; SEGMENT_LEN])
    }

    pub fn as_bytes(&self) -> &[u8; SEGMENT_LEN] {
        &self.0
    }

    pub fn is_blank(&self) -> bool {
        self.0.iter().all(|&b| b == 0xFF)
    }

    pub fn stored_checksum(&self) -> u16 {
        u16::from_le_bytes([self.0[0], self.0[1]])
    }

    /// XOR of the covered words
    pub fn computed(&self) -> u16 {
        self.0[CHECKSUM_END..COVERED_END]
            .chunks_exact(2)
            .fold(0u16, |acc, word| acc ^ u16::from_le_bytes([word[0], word[1]]))
    }

    pub fn is_valid(&self) -> bool {
        !self.is_blank() && self.computed().wrapping_add(self.stored_checksum()) == 0
    }

    /// Rewrite the stored checksum so the segment validates
    pub fn seal(&mut self) {
        let stored = 0u16.wrapping_sub(self.computed());
        self.0[..CHECKSUM_END].copy_from_slice(&stored.to_le_bytes());
    }

    /// Full 64-byte comparison, trim bytes included
    pub fn differs_from(&self, other: &CalibrationSegment) -> bool {
        self.0 != other.0
    }
}

impl Default for CalibrationSegment {
    fn default() -> Self {
        Self::blank()
    }
}

#[cfg(test)]
pub(crate) fn sealed_segment(fill: u8) -> CalibrationSegment {
    let mut bytes = [0u8; SEGMENT_LEN];
    for (i, b) in bytes.iter_mut().enumerate() {
        *b = fill.wrapping_add(i as u8);
    }
    let mut segment = CalibrationSegment::new(bytes);
    segment.seal();
    segment
}
