//! Flash driver abstractions
//!
//! A polled, byte-programmable NOR flash with an asynchronous erase. The
//! persistence engine never spins on these calls: it issues one operation
//! per tick and polls [`FlashDriver::is_idle`] between phases.

/// Identifies one statically addressed block of persisted data.
///
/// The numeric codes are what the communications layer uses to request
/// writes and what it receives back in completion notifications.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
#[repr(u8)]
pub enum BlockKind {
    /// Live telemetry snapshot (derived, never written to flash)
    Telemetry = 0,
    /// Factory configuration: identity and analog calibration pairs
    Factory = 1,
    /// User configuration: set points and comms settings
    User = 2,
    /// Event thresholds and flag modes
    Events = 3,
    /// Miscellaneous operating state
    MiscState = 4,
    /// Out-of-band persistent state (auto-on)
    Persistent = 0xFE,
    /// Flash copy of the factory calibration segment
    CalibrationBackup = 0xFF,
}

impl BlockKind {
    /// Every kind that lives in flash, in status-bit order.
    pub const DURABLE: [BlockKind; 6] = [
        BlockKind::Factory,
        BlockKind::User,
        BlockKind::Events,
        BlockKind::MiscState,
        BlockKind::Persistent,
        BlockKind::CalibrationBackup,
    ];

    /// Get the kind as a byte value
    pub fn as_u8(self) -> u8 {
        self as u8
    }

    /// Create a kind from a byte value
    pub fn from_u8(value: u8) -> Option<Self> {
        match value {
            0 => Some(BlockKind::Telemetry),
            1 => Some(BlockKind::Factory),
            2 => Some(BlockKind::User),
            3 => Some(BlockKind::Events),
            4 => Some(BlockKind::MiscState),
            0xFE => Some(BlockKind::Persistent),
            0xFF => Some(BlockKind::CalibrationBackup),
            _ => None,
        }
    }

    /// Whether other subsystems may ask for this block to be written.
    ///
    /// Persistent writes are flag-driven and the calibration backup is
    /// owned by the calibration guard, so neither is requestable.
    pub fn is_requestable(self) -> bool {
        matches!(
            self,
            BlockKind::Factory | BlockKind::User | BlockKind::Events | BlockKind::MiscState
        )
    }

    /// Whether the block has a home in flash
    pub fn is_durable(self) -> bool {
        !matches!(self, BlockKind::Telemetry)
    }
}

/// Errors from flash driver operations
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum FlashError {
    /// Flash controller reported a failure
    Flash,
    /// Address range outside the device
    OutOfBounds,
    /// Address or length violates alignment rules
    NotAligned,
    /// Controller is busy with another operation
    Busy,
}

/// Result of starting an erase
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum EraseStatus {
    /// Erase is running; completion is reported out of band
    Pending,
    /// Erase finished before the call returned
    Done,
}

/// Byte-programmable flash driver
///
/// Mirrors the controller sequence of the charge controller's flash unit:
/// an erase that may complete later, then an open / stream / close write,
/// then a synchronous read for verification.
pub trait FlashDriver {
    /// Erase the sectors covering `address..address + len`.
    ///
    /// Returning [`EraseStatus::Pending`] means the caller will be told
    /// about completion separately (the engine's `on_erase_complete`).
    fn erase(&mut self, address: u32, len: usize) -> Result<EraseStatus, FlashError>;

    /// Open a programmed write of `len` bytes at `address`
    fn start_write(&mut self, address: u32, len: usize) -> Result<(), FlashError>;

    /// Stream bytes into the open write
    fn write_bytes(&mut self, data: &[u8]) -> Result<(), FlashError>;

    /// Close the open write
    fn end_write(&mut self);

    /// Read `buffer.len()` bytes starting at `address + offset`
    fn read_bytes(&mut self, buffer: &mut [u8], address: u32, offset: usize)
        -> Result<(), FlashError>;

    /// Whether the controller has finished all outstanding operations
    fn is_idle(&self) -> bool;
}
