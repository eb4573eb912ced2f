//! Write cycle phases
//!
//! One write moves through erase, program, read-back and verify. The phase
//! only changes through [`Phase::transition`]; the engine performs the flash
//! operation for the current phase and reports what happened as an event.

use super::events::Event;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum Phase {
    /// No write in flight
    #[default]
    Idle,
    /// Issue the erase
    Erasing,
    /// Erase running in the background
    WaitingForErase,
    /// Stream the sealed image
    Writing,
    /// Read the block back once the controller is idle
    CheckingFlash,
    /// Check the trailer and apply the result
    VerifyingAndApplying,
}

impl Phase {
    pub fn is_idle(&self) -> bool {
        matches!(self, Phase::Idle)
    }

    /// Phases that must wait for the controller before doing anything
    pub fn needs_idle_flash(&self) -> bool {
        matches!(self, Phase::CheckingFlash | Phase::VerifyingAndApplying)
    }

    /// Process an event and return the next phase
    pub fn transition(self, event: Event) -> Self {
        use Event::*;
        use Phase::*;

        match (self, event) {
            (Idle, Dispatch) => Erasing,

            // Erase
            (Erasing, EraseDone) => Writing,
            (Erasing, EraseDeferred) => WaitingForErase,
            (WaitingForErase, EraseDone) => Writing,

            // Program; unverified writes end here
            (Writing, Programmed { verify: true }) => CheckingFlash,
            (Writing, Programmed { verify: false }) => Idle,

            // Verify
            (CheckingFlash, ReadBack) => VerifyingAndApplying,
            (VerifyingAndApplying, Retry) => Erasing,
            (VerifyingAndApplying, Settled) => Idle,

            _ => self,
        }
    }
}
