//! Identity fields derived from the factory record
//!
//! Recomputed after the factory record loads and after every factory write.

use core::fmt::Write;

use heapless::String;

use super::engine::{EngineConfig, ModelVariant};
use super::records::{FactoryConfig, ID_LEN};

/// Firmware version reported in the system info record
pub const FIRMWARE_VERSION: &str = env!("CARGO_PKG_VERSION");

#[derive(Debug, Clone, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub struct DeviceIdentity {
    /// First four characters of the product id
    pub product_code: [u8; 4],
    /// Leading decimal digits of the serial text, 0 when blank
    pub serial_number: u32,
    pub product_id: [u8; ID_LEN],
    pub serial_text: [u8; ID_LEN],
    /// `V<n>.0`
    pub hardware_version: String<8>,
    pub firmware_version: &'static str,
    pub model: ModelVariant,
}

impl DeviceIdentity {
    pub fn derive(factory: &FactoryConfig, config: &EngineConfig) -> Self {
        let mut product_code = [0u8; 4];
        product_code.copy_from_slice(&factory.product_id[..4]);

        let mut hardware_version = String::new();
        // "V" + at most three digits + ".0" always fits
        let _ = write!(hardware_version, "V{}.0", config.hardware.hardware_version);

        Self {
            product_code,
            serial_number: parse_serial(&factory.serial_number),
            product_id: factory.product_id,
            serial_text: factory.serial_number,
            hardware_version,
            firmware_version: FIRMWARE_VERSION,
            model: config.hardware.model,
        }
    }

    pub fn model_name(&self) -> &'static str {
        self.model.name()
    }
}

/// Leading digits of a serial text, saturating
fn parse_serial(text: &[u8]) -> u32 {
    if text.first().copied().unwrap_or(0) == 0 {
        return 0;
    }
    text.iter()
        .take_while(|b| b.is_ascii_digit())
        .fold(0u32, |acc, b| {
            acc.saturating_mul(10).saturating_add(u32::from(b - b'0'))
        })
}

/// Ephemeral record sent over the comms link
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub struct TelemetrySnapshot {
    pub product_id: [u8; ID_LEN],
    pub serial_number: [u8; ID_LEN],
    /// Packed status bits
    pub status: u8,
}
