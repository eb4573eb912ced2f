//! Per-block status bits
//!
//! A set bit means the last load or verified write of that block succeeded.

use coolmax_hal::BlockKind;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub struct StatusBits(u8);

impl StatusBits {
    const fn mask(kind: BlockKind) -> u8 {
        match kind {
            BlockKind::Factory => 1 << 0,
            BlockKind::User => 1 << 1,
            BlockKind::Events => 1 << 2,
            BlockKind::MiscState => 1 << 3,
            BlockKind::Persistent => 1 << 4,
            BlockKind::CalibrationBackup => 1 << 5,
            BlockKind::Telemetry => 0,
        }
    }

    /// Whether the block's last load or verify succeeded
    pub const fn get(self, kind: BlockKind) -> bool {
        self.0 & Self::mask(kind) != 0
    }

    /// Packed byte for telemetry
    pub const fn bits(self) -> u8 {
        self.0
    }

    /// Number of blocks currently marked good
    pub const fn count(self) -> u32 {
        self.0.count_ones()
    }

    pub(crate) fn set(&mut self, kind: BlockKind, ok: bool) {
        if ok {
            self.0 |= Self::mask(kind);
        } else {
            self.0 &= !Self::mask(kind);
        }
    }
}
