//! Firmware side of the persistence engine's host hooks

use defmt::*;
use portable_atomic::Ordering;

use coolmax_core::BlockKind;
use coolmax_hal::Host;

use crate::channels::{PERSIST_DIRTY, WRITE_COMPLETE};

/// Routes completions to the comms task and reads the persist-dirty flag
pub struct FirmwareHost;

impl Host for FirmwareHost {
    fn write_complete(&mut self, kind: BlockKind) {
        if WRITE_COMPLETE.try_send(kind).is_err() {
            warn!("Completion queue full, dropping {}", kind);
        }
    }

    fn persist_dirty(&self) -> bool {
        PERSIST_DIRTY.load(Ordering::Acquire)
    }

    fn clear_persist_dirty(&mut self) {
        PERSIST_DIRTY.store(false, Ordering::Release);
    }
}
