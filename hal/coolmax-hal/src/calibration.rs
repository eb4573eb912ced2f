//! Factory calibration segment access
//!
//! The hardware calibration segment is a factory-programmed, write-locked
//! 64-byte region separate from the configuration blocks. Reading it is
//! always possible; rewriting it is a board capability that most ports do
//! not offer.

/// Size of the calibration segment, checksum header included
pub const SEGMENT_LEN: usize = 64;

/// Result of asking the board to rewrite the live calibration segment
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum RestoreOutcome {
    /// Segment was erased and reprogrammed from the backup
    Applied,
    /// The board does not rewrite its calibration segment
    Unsupported,
    /// The rewrite was attempted and the controller reported an error
    Failed,
}

pub trait CalibrationSource {
    /// Copy the live calibration segment into `segment`
    fn read_live_segment(&mut self, segment: &mut [u8; SEGMENT_LEN]);

    /// Erase and reprogram the live segment from a validated backup.
    ///
    /// The default does nothing and reports [`RestoreOutcome::Unsupported`],
    /// which keeps the device on whatever the live segment holds.
    fn restore_live_segment(&mut self, _segment: &[u8; SEGMENT_LEN]) -> RestoreOutcome {
        RestoreOutcome::Unsupported
    }
}
