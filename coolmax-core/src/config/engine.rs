//! Persistence engine settings
//!
//! Flash addresses, attempt budgets, and the hardware facts the defaults
//! and identity strings depend on.

use coolmax_hal::BlockKind;

/// Default number of reads attempted when loading a block at boot
pub const DEFAULT_READ_ATTEMPTS: u8 = 2;

/// Default number of erase/write/verify cycles for a requested write
pub const DEFAULT_WRITE_ATTEMPTS: u8 = 2;

/// Persistent writes get a single cycle
pub const DEFAULT_PERSISTENT_WRITE_ATTEMPTS: u8 = 1;

/// Fixed flash addresses of every durable block
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub struct FlashLayout {
    pub factory: u32,
    pub user: u32,
    pub events: u32,
    pub misc_state: u32,
    pub persistent: u32,
    pub calibration_backup: u32,
}

impl FlashLayout {
    /// One 512-byte main-flash segment per block, top of the MSP430F247
    /// code space.
    pub const MSP430: FlashLayout = FlashLayout {
        factory: 0xE000,
        user: 0xE200,
        events: 0xE400,
        misc_state: 0xE600,
        persistent: 0xE800,
        calibration_backup: 0xEA00,
    };

    /// Flash address of a block, `None` for kinds that are never stored
    pub const fn address_of(&self, kind: BlockKind) -> Option<u32> {
        match kind {
            BlockKind::Factory => Some(self.factory),
            BlockKind::User => Some(self.user),
            BlockKind::Events => Some(self.events),
            BlockKind::MiscState => Some(self.misc_state),
            BlockKind::Persistent => Some(self.persistent),
            BlockKind::CalibrationBackup => Some(self.calibration_backup),
            BlockKind::Telemetry => None,
        }
    }
}

impl Default for FlashLayout {
    fn default() -> Self {
        Self::MSP430
    }
}

/// Power stage variant
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum ModelVariant {
    /// Medium-voltage power stage
    #[default]
    Mv,
    /// High-voltage power stage
    Hv,
    /// Model strap not recognised
    Unknown,
}

impl ModelVariant {
    /// Name reported in the system info record
    pub const fn name(self) -> &'static str {
        match self {
            ModelVariant::Mv => "MV",
            ModelVariant::Hv => "HV",
            ModelVariant::Unknown => "?V",
        }
    }
}

/// Board facts read from hardware straps at startup
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub struct HardwareInfo {
    /// Board revision (single digit)
    pub hardware_version: u8,
    pub model: ModelVariant,
}

impl Default for HardwareInfo {
    fn default() -> Self {
        Self {
            hardware_version: 1,
            model: ModelVariant::Mv,
        }
    }
}

/// Complete engine configuration
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub struct EngineConfig {
    pub layout: FlashLayout,
    /// Reads per block at boot before falling back to defaults
    pub read_attempts: u8,
    /// Erase/write/verify cycles per requested write
    pub write_attempts: u8,
    /// Cycles for a flag-driven persistent write
    pub persistent_write_attempts: u8,
    pub hardware: HardwareInfo,
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            layout: FlashLayout::default(),
            read_attempts: DEFAULT_READ_ATTEMPTS,
            write_attempts: DEFAULT_WRITE_ATTEMPTS,
            persistent_write_attempts: DEFAULT_PERSISTENT_WRITE_ATTEMPTS,
            hardware: HardwareInfo::default(),
        }
    }
}
