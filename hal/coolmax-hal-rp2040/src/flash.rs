//! Flash driver for RP2040
//!
//! Blocking QSPI flash access through `embassy-rp`. Erase and program run to
//! completion inside the call, so [`FlashDriver::erase`] always reports
//! [`EraseStatus::Done`] and the controller is always idle between ticks.
//!
//! Addresses handed to the driver are offsets from the start of flash.

use coolmax_hal::integrity::crc16_ccitt;
#[cfg(feature = "calibration-restore")]
use coolmax_hal::RestoreOutcome;
use coolmax_hal::{CalibrationSource, Crc16, EraseStatus, FlashDriver, FlashError, SEGMENT_LEN};
use embassy_rp::flash::{Blocking, Error, Flash, ERASE_SIZE};
use embassy_rp::peripherals::FLASH;
use embassy_rp::Peri;
use heapless::Vec;

/// 2MB flash on the controller board
pub const FLASH_SIZE: usize = 2 * 1024 * 1024;

/// Flash erase size for RP2040
pub const FLASH_ERASE_SIZE: usize = ERASE_SIZE;

/// Largest single programmed write (one flash page)
pub const STAGING_LEN: usize = 256;

fn map_error(error: Error) -> FlashError {
    match error {
        Error::OutOfBounds => FlashError::OutOfBounds,
        Error::Unaligned => FlashError::NotAligned,
        _ => FlashError::Flash,
    }
}

/// Round `address..address + len` out to whole erase sectors
fn sector_span(address: u32, len: usize) -> (u32, u32) {
    let sector = ERASE_SIZE as u32;
    let start = address - address % sector;
    let end = (address + len as u32).div_ceil(sector) * sector;
    (start, end)
}

struct OpenWrite {
    address: u32,
    len: usize,
}

/// RP2040 implementation of the persistence platform
pub struct Rp2040Flash<'d> {
    flash: Flash<'d, FLASH, Blocking, FLASH_SIZE>,
    /// Offset of the factory calibration segment
    calibration_offset: u32,
    open: Option<OpenWrite>,
    staged: Vec<u8, STAGING_LEN>,
    program_errors: u32,
}

impl<'d> Rp2040Flash<'d> {
    /// Create the driver; `calibration_offset` locates the live calibration
    /// segment, which sits in a sector of its own.
    pub fn new(flash: Peri<'d, FLASH>, calibration_offset: u32) -> Self {
        Self {
            flash: Flash::<_, Blocking, FLASH_SIZE>::new_blocking(flash),
            calibration_offset,
            open: None,
            staged: Vec::new(),
            program_errors: 0,
        }
    }

    /// Programs the controller rejected since boot
    pub fn program_errors(&self) -> u32 {
        self.program_errors
    }

    fn in_bounds(address: u32, len: usize) -> bool {
        (address as usize)
            .checked_add(len)
            .is_some_and(|end| end <= FLASH_SIZE)
    }
}

impl Crc16 for Rp2040Flash<'_> {
    fn crc16(init: u16, data: &[u8]) -> u16 {
        crc16_ccitt(init, data)
    }
}

impl FlashDriver for Rp2040Flash<'_> {
    fn erase(&mut self, address: u32, len: usize) -> Result<EraseStatus, FlashError> {
        if !Self::in_bounds(address, len) {
            return Err(FlashError::OutOfBounds);
        }
        let (start, end) = sector_span(address, len);
        self.flash.blocking_erase(start, end).map_err(map_error)?;
        Ok(EraseStatus::Done)
    }

    fn start_write(&mut self, address: u32, len: usize) -> Result<(), FlashError> {
        if self.open.is_some() {
            return Err(FlashError::Busy);
        }
        if len > STAGING_LEN || !Self::in_bounds(address, len) {
            return Err(FlashError::OutOfBounds);
        }
        self.staged.clear();
        self.open = Some(OpenWrite { address, len });
        Ok(())
    }

    fn write_bytes(&mut self, data: &[u8]) -> Result<(), FlashError> {
        let Some(open) = self.open.as_ref() else {
            return Err(FlashError::Flash);
        };
        if self.staged.len() + data.len() > open.len {
            return Err(FlashError::OutOfBounds);
        }
        self.staged
            .extend_from_slice(data)
            .map_err(|_| FlashError::OutOfBounds)
    }

    fn end_write(&mut self) {
        let Some(open) = self.open.take() else {
            return;
        };
        // Failures surface when the block is read back
        if self.flash.blocking_write(open.address, &self.staged).is_err() {
            self.program_errors = self.program_errors.wrapping_add(1);
        }
        self.staged.clear();
    }

    fn read_bytes(
        &mut self,
        buffer: &mut [u8],
        address: u32,
        offset: usize,
    ) -> Result<(), FlashError> {
        let start = address
            .checked_add(offset as u32)
            .ok_or(FlashError::OutOfBounds)?;
        self.flash.blocking_read(start, buffer).map_err(map_error)
    }

    fn is_idle(&self) -> bool {
        true
    }
}

impl CalibrationSource for Rp2040Flash<'_> {
    fn read_live_segment(&mut self, segment: &mut [u8; SEGMENT_LEN]) {
        if self
            .flash
            .blocking_read(self.calibration_offset, segment)
            .is_err()
        {
            // Reads as erased, which never validates
            segment.fill(0xFF);
        }
    }

    #[cfg(feature = "calibration-restore")]
    fn restore_live_segment(&mut self, segment: &[u8; SEGMENT_LEN]) -> RestoreOutcome {
        let (start, end) = sector_span(self.calibration_offset, SEGMENT_LEN);
        if self.flash.blocking_erase(start, end).is_err()
            || self
                .flash
                .blocking_write(self.calibration_offset, segment)
                .is_err()
        {
            return RestoreOutcome::Failed;
        }

        let mut check = [0u8; SEGMENT_LEN];
        match self.flash.blocking_read(self.calibration_offset, &mut check) {
            Ok(()) if check == *segment => RestoreOutcome::Applied,
            _ => RestoreOutcome::Failed,
        }
    }
}
