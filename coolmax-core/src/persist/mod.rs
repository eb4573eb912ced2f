//! Write path
//!
//! The scheduler holds the next kind to write, the phase machine describes
//! where a write cycle is, and the engine performs the flash operations and
//! applies the verified result to the store.

pub mod engine;
pub mod events;
pub mod machine;
pub mod scheduler;

pub use engine::{BootReport, PersistenceEngine, WriteOutcome, WriteResult};
pub use events::Event;
pub use machine::Phase;
pub use scheduler::{WriteRequest, WriteScheduler};
