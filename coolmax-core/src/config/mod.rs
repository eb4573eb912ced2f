//! Configuration types
//!
//! Record layouts stored in flash, the versioned codec that turns them into
//! bytes, the engine's own settings, and identity fields derived from the
//! factory record.

pub mod codec;
pub mod engine;
pub mod identity;
pub mod records;

pub use codec::{CodecError, Record, FORMAT_VERSION};
pub use engine::{EngineConfig, FlashLayout, HardwareInfo, ModelVariant};
pub use identity::{DeviceIdentity, TelemetrySnapshot};
pub use records::*;
