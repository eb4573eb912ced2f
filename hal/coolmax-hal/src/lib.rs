//! Coolmax Hardware Abstraction Layer
//!
//! This crate defines the collaborator traits the persistence engine in
//! `coolmax-core` is written against. Chip-specific HALs (RP2040 today, the
//! MSP430 board through a port) implement them, and host tests
//! implement them with a simulated flash array.
//!
//! # Architecture
//!
//! ```text
//! ┌─────────────────────────────────────────┐
//! │  coolmax-firmware (embassy tasks)       │
//! └─────────────────────────────────────────┘
//!                     │
//!                     ▼
//! ┌─────────────────────────────────────────┐
//! │  coolmax-core (engine, store, guard)    │
//! └─────────────────────────────────────────┘
//!                     │
//!                     ▼
//! ┌─────────────────────────────────────────┐
//! │  coolmax-hal (this crate - traits)      │
//! └─────────────────────────────────────────┘
//!                     │
//!                     ▼
//!             ┌───────────────┐
//!             │ coolmax-hal-  │
//!             │    rp2040     │
//!             └───────────────┘
//! ```
//!
//! # Traits
//!
//! - [`flash::FlashDriver`] - erase / program / read / busy polling
//! - [`integrity::Crc16`] - block checksum trailer
//! - [`calibration::CalibrationSource`] - factory calibration segment access
//! - [`host::Host`] - write notifications and the persist-dirty flag

#![no_std]
#![deny(unsafe_code)]

pub mod calibration;
pub mod flash;
pub mod host;
pub mod integrity;

// Re-export key traits at crate root for convenience
pub use calibration::{CalibrationSource, RestoreOutcome, SEGMENT_LEN};
pub use flash::{BlockKind, EraseStatus, FlashDriver, FlashError};
pub use host::Host;
pub use integrity::{Crc16, Verdict, TRAILER_LEN};

/// Everything the persistence engine needs from the board side of the flash.
pub trait Platform: FlashDriver + Crc16 + CalibrationSource {}

impl<T: FlashDriver + Crc16 + CalibrationSource> Platform for T {}
