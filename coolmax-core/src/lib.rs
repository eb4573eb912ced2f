//! Board-agnostic configuration persistence for the charge controller
//!
//! This crate contains all persistence logic that does not depend on a
//! specific flash controller:
//!
//! - Record layouts and the versioned on-flash codec
//! - Config store with committed / pending copies and default fallback
//! - Single-slot write scheduler
//! - Erase / write / verify state machine with bounded retry
//! - Calibration segment guard (backup / restore decisions)
//!
//! Everything is driven from one periodic tick through
//! [`persist::PersistenceEngine`].

#![cfg_attr(not(test), no_std)]
#![deny(unsafe_code)]

pub mod calibration;
pub mod config;
pub mod persist;
pub mod status;
pub mod store;

#[cfg(test)]
mod testing;

pub use coolmax_hal::BlockKind;
