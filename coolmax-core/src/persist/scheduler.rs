//! Single-slot write scheduler

use coolmax_hal::BlockKind;

/// One write cycle: what to write, where, and how many tries are left
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub struct WriteRequest {
    pub kind: BlockKind,
    pub address: u32,
    /// Bytes erased, programmed and read back, trailer included
    pub len: usize,
    pub attempts_total: u8,
    pub attempts_left: u8,
    /// Read back and check after programming
    pub verify: bool,
}

impl WriteRequest {
    /// Cycles used so far, counting the current one
    pub fn attempts_used(&self) -> u8 {
        self.attempts_total - self.attempts_left + 1
    }
}

/// Holds at most one kind waiting to be written
///
/// A second request before dispatch replaces the first.
#[derive(Debug, Default)]
pub struct WriteScheduler {
    next: Option<BlockKind>,
}

impl WriteScheduler {
    pub const fn new() -> Self {
        Self { next: None }
    }

    /// Queue `kind`, replacing anything already waiting.
    ///
    /// Returns `false` for kinds other subsystems may not request.
    pub fn request(&mut self, kind: BlockKind) -> bool {
        if !kind.is_requestable() {
            return false;
        }
        self.next = Some(kind);
        true
    }

    /// Request by protocol code; unknown codes are rejected
    pub fn request_code(&mut self, code: u8) -> bool {
        BlockKind::from_u8(code).is_some_and(|kind| self.request(kind))
    }

    pub fn pending(&self) -> Option<BlockKind> {
        self.next
    }

    /// Remove the waiting kind for dispatch
    pub fn take(&mut self) -> Option<BlockKind> {
        self.next.take()
    }
}
