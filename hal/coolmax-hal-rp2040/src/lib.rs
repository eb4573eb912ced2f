//! RP2040-specific HAL for the charge controller persistence layer
//!
//! Implements the `coolmax-hal` platform traits on top of the RP2040's
//! external QSPI flash:
//!
//! - Block erase / program / read (`FlashDriver`)
//! - Software CRC-16 trailer (`Crc16`)
//! - Live calibration segment access (`CalibrationSource`), with the
//!   rewrite path behind the `calibration-restore` feature

#![no_std]

pub mod flash;

pub use flash::{Rp2040Flash, FLASH_ERASE_SIZE, FLASH_SIZE};

// Re-export the platform traits for convenience
pub use coolmax_hal::{CalibrationSource, Crc16, FlashDriver, Platform};
