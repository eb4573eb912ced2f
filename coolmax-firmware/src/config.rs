//! Storage configuration generated from storage.toml by build.rs

use coolmax_core::config::{EngineConfig, FlashLayout, HardwareInfo, ModelVariant};

include!(concat!(env!("OUT_DIR"), "/storage.rs"));

/// Engine settings for this board
pub fn engine_config() -> EngineConfig {
    EngineConfig {
        layout: LAYOUT,
        read_attempts: READ_ATTEMPTS,
        write_attempts: WRITE_ATTEMPTS,
        persistent_write_attempts: PERSISTENT_WRITE_ATTEMPTS,
        hardware: HardwareInfo {
            hardware_version: HARDWARE_VERSION,
            model: MODEL,
        },
    }
}
