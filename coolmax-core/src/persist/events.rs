//! Events that drive the write cycle

/// Events that can trigger phase transitions
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum Event {
    /// A request was taken from the scheduler
    Dispatch,

    // Erase events
    /// Erase finished, either inline or reported later by the driver
    EraseDone,
    /// Driver accepted the erase and will report completion separately
    EraseDeferred,

    // Program events
    /// Image streamed and the write closed
    Programmed {
        /// Whether the block gets read back and checked
        verify: bool,
    },

    // Verification events
    /// Block read back into scratch
    ReadBack,
    /// Check failed with attempts left
    Retry,
    /// Result applied to the store
    Settled,
}
