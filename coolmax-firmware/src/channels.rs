//! Inter-task communication channels
//!
//! Defines the static channels used between the persistence task and the
//! rest of the firmware. Uses embassy-sync primitives for async hand-off.

use embassy_sync::blocking_mutex::raw::CriticalSectionRawMutex;
use embassy_sync::channel::Channel;
use portable_atomic::{AtomicBool, Ordering};

use coolmax_core::BlockKind;

/// Channel capacity for persistence commands
const COMMAND_CHANNEL_SIZE: usize = 4;

/// Channel capacity for write-complete notifications
const COMPLETE_CHANNEL_SIZE: usize = 4;

/// Requests for the persistence task
#[derive(Debug, Clone, Copy, PartialEq, Eq, defmt::Format)]
pub enum PersistCommand {
    /// Commit the pending copy of a block
    Write(BlockKind),
    /// Commit by protocol code, as received over the comms link
    WriteCode(u8),
    /// Change the auto-on flag; written through the persist-dirty path
    SetAutoOn(bool),
}

/// Commands from the comms and control loops
pub static PERSIST_COMMANDS: Channel<CriticalSectionRawMutex, PersistCommand, COMMAND_CHANNEL_SIZE> =
    Channel::new();

/// Blocks whose write cycle finished (never Persistent)
pub static WRITE_COMPLETE: Channel<CriticalSectionRawMutex, BlockKind, COMPLETE_CHANNEL_SIZE> =
    Channel::new();

/// Set when the persistent state changed and should be written
pub static PERSIST_DIRTY: AtomicBool = AtomicBool::new(false);

pub fn mark_persist_dirty() {
    PERSIST_DIRTY.store(true, Ordering::Release);
}
