//! Host-side collaborators of the persistence engine

use crate::flash::BlockKind;

/// The rest of the firmware, as seen from the persistence engine.
pub trait Host {
    /// A write cycle for `kind` finished (verified or fell back to defaults).
    ///
    /// Fire-and-forget. Never called for [`BlockKind::Persistent`].
    fn write_complete(&mut self, kind: BlockKind);

    /// Whether the persistent state changed and should be written
    fn persist_dirty(&self) -> bool;

    fn clear_persist_dirty(&mut self);
}
