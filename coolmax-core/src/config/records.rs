//! Configuration records stored in flash
//!
//! Every record has a fixed encoded length (see [`Record::LEN`]) so that it
//! occupies the same bytes in its flash block no matter what it holds.
//! Integers that must stay fixed-width are encoded with
//! `postcard::fixint::le`; `f32` is always four little-endian bytes and
//! fieldless enums are a single variant-index byte.

use coolmax_hal::BlockKind;
use serde::{Deserialize, Serialize};

use super::codec::Record;
use super::engine::{EngineConfig, ModelVariant};

/// Length of the product id and serial number text fields
pub const ID_LEN: usize = 8;

/// Copy a short ASCII literal into a zero-padded id field
pub const fn id_field(text: &str) -> [u8; ID_LEN] {
    let bytes = text.as_bytes();
    assert!(bytes.len() <= ID_LEN);
    let mut out = [0u8; ID_LEN];
    let mut i = 0;
    while i < bytes.len() {
        out[i] = bytes[i];
        i += 1;
    }
    out
}

/// Linear calibration for one ADC input or DAC output
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub struct LinearCal {
    pub scale: f32,
    pub offset: f32,
}

impl LinearCal {
    /// Scale 1.0, offset 0.0
    pub const UNITY: LinearCal = LinearCal::new(1.0, 0.0);

    pub const fn new(scale: f32, offset: f32) -> Self {
        Self { scale, offset }
    }
}

impl Default for LinearCal {
    fn default() -> Self {
        Self::UNITY
    }
}

/// Factory configuration: identity and analog front-end calibration
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub struct FactoryConfig {
    /// Product id text, zero padded
    pub product_id: [u8; ID_LEN],
    /// Serial number text, zero padded
    pub serial_number: [u8; ID_LEN],
    pub out_volt_adc: LinearCal,
    pub pv_volt_adc: LinearCal,
    pub out_current_adc: LinearCal,
    pub pv_current_adc: LinearCal,
    pub mppt_sample_point_dac: LinearCal,
    pub pwm_error_minus_adc: LinearCal,
    pub rail_12v_adc: LinearCal,
    pub float_set_sense_adc: LinearCal,
    pub float_trim_dac: LinearCal,
    pub tmp_cmp_sense_adc: LinearCal,
    pub vin_lim_dac: LinearCal,
    /// Thermistor R-infinity
    pub therm_rinf: f32,
    /// Thermistor beta
    pub therm_beta: f32,
    /// Output over-current trip (A)
    pub over_current_set_point: f32,
}

impl Default for FactoryConfig {
    fn default() -> Self {
        Self {
            product_id: id_field("A001"),
            serial_number: id_field("0000"),
            out_volt_adc: LinearCal::UNITY,
            pv_volt_adc: LinearCal::UNITY,
            out_current_adc: LinearCal::UNITY,
            pv_current_adc: LinearCal::UNITY,
            // The sample-point DAC ships with a unit offset
            mppt_sample_point_dac: LinearCal::new(1.0, 1.0),
            pwm_error_minus_adc: LinearCal::UNITY,
            rail_12v_adc: LinearCal::UNITY,
            float_set_sense_adc: LinearCal::UNITY,
            float_trim_dac: LinearCal::UNITY,
            tmp_cmp_sense_adc: LinearCal::UNITY,
            vin_lim_dac: LinearCal::UNITY,
            therm_rinf: 0.0,
            therm_beta: 0.0,
            over_current_set_point: 50.0,
        }
    }
}

impl Record for FactoryConfig {
    const KIND: BlockKind = BlockKind::Factory;
    // version + 2 id fields + 11 cal pairs + 3 floats
    const LEN: usize = 1 + 2 * ID_LEN + 11 * 8 + 3 * 4;

    fn defaults(_config: &EngineConfig) -> Self {
        Self::default()
    }
}

/// How an event flag reacts when it trips
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum FlagMode {
    Disabled,
    /// Record in the event log
    #[default]
    Log,
    /// Drive the auxiliary relay
    Relay,
    LogAndRelay,
}

/// Trigger/reset pair with hysteresis time
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub struct EventThreshold {
    pub mode: FlagMode,
    #[serde(with = "postcard::fixint::le")]
    pub hyst_time_ms: u32,
    pub reset_val: f32,
    pub trigger_val: f32,
}

impl EventThreshold {
    pub const fn logged(hyst_time_ms: u32, reset_val: f32, trigger_val: f32) -> Self {
        Self {
            mode: FlagMode::Log,
            hyst_time_ms,
            reset_val,
            trigger_val,
        }
    }
}

/// Solar panel presence check
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub struct PanelCheck {
    pub mode: FlagMode,
    #[serde(with = "postcard::fixint::le")]
    pub check_time_ms: u32,
    pub trigger_val: f32,
}

/// Event thresholds and flag modes
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub struct EventsConfig {
    pub low_out_volt_warn: EventThreshold,
    pub low_out_volt_fault: EventThreshold,
    pub high_out_volt_fault: EventThreshold,
    pub high_out_current_fault: EventThreshold,
    pub high_discharge_current_fault: EventThreshold,
    pub high_battery_temp_fault: EventThreshold,
    pub input_breaker_open: FlagMode,
    pub output_breaker_open: FlagMode,
    pub temp_sensor_fault: FlagMode,
    pub pv_negative_current_shutdown: FlagMode,
    pub pv_high_current_shutdown: FlagMode,
    pub pv_high_volt_shutdown: FlagMode,
    pub high_out_current_shutdown: FlagMode,
    pub high_out_volt_shutdown: FlagMode,
    pub log_full: FlagMode,
    pub solar_panel_missing: PanelCheck,
}

impl Default for EventsConfig {
    fn default() -> Self {
        Self {
            low_out_volt_warn: EventThreshold::logged(10_000, 44.0, 42.0),
            low_out_volt_fault: EventThreshold::logged(10_000, 42.0, 40.0),
            high_out_volt_fault: EventThreshold::logged(10_000, 63.0, 65.0),
            high_out_current_fault: EventThreshold::logged(10_000, 60.0, 61.0),
            high_discharge_current_fault: EventThreshold::logged(10_000, 495.0, 500.0),
            high_battery_temp_fault: EventThreshold::logged(60_000, 95.0, 100.0),
            input_breaker_open: FlagMode::Log,
            output_breaker_open: FlagMode::Log,
            temp_sensor_fault: FlagMode::Log,
            pv_negative_current_shutdown: FlagMode::Log,
            pv_high_current_shutdown: FlagMode::Log,
            pv_high_volt_shutdown: FlagMode::Log,
            high_out_current_shutdown: FlagMode::Log,
            high_out_volt_shutdown: FlagMode::Log,
            log_full: FlagMode::Log,
            solar_panel_missing: PanelCheck {
                mode: FlagMode::Log,
                check_time_ms: 4_320_000,
                trigger_val: 20.0,
            },
        }
    }
}

impl Record for EventsConfig {
    const KIND: BlockKind = BlockKind::Events;
    // version + 6 thresholds (13) + 9 modes + panel check (9)
    const LEN: usize = 1 + 6 * 13 + 9 + 9;

    fn defaults(_config: &EngineConfig) -> Self {
        Self::default()
    }
}

/// Generator start relay driven by low output voltage
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub struct GensetRelay {
    pub mode: FlagMode,
    pub trigger_val: f32,
    pub reset_val: f32,
    #[serde(with = "postcard::fixint::le")]
    pub hyst_time_ms: u32,
    #[serde(with = "postcard::fixint::le")]
    pub hold_time_ms: u32,
}

/// CAN bit rate
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum CanBaud {
    Baud125k,
    Baud250k,
    #[default]
    Baud500k,
    Baud1000k,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub struct CommsConfig {
    pub modbus_address: u8,
    pub can_baud: CanBaud,
    #[serde(with = "postcard::fixint::le")]
    pub can_bus_id: u16,
    pub is_slave: bool,
}

/// Charge set points
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub struct SetPoints {
    pub pv_oc_volt: f32,
    pub pv_mp_volt: f32,
    pub float_volt: f32,
    pub bulk_volt: f32,
    /// Bulk hold time (hours)
    pub bulk_time: f32,
    pub bulk_reset_volt: f32,
    /// Temperature compensation (V/°C); zero disables the battery sensor
    pub temp_compensation: f32,
    pub nominal_volt: f32,
}

/// User configuration
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub struct UserConfig {
    pub low_out_volt_genset: GensetRelay,
    pub comms: CommsConfig,
    pub set_points: SetPoints,
}

impl Default for UserConfig {
    fn default() -> Self {
        Self {
            low_out_volt_genset: GensetRelay {
                mode: FlagMode::LogAndRelay,
                trigger_val: 38.0,
                reset_val: 55.0,
                hyst_time_ms: 10_000,
                hold_time_ms: 3_600_000,
            },
            comms: CommsConfig {
                modbus_address: 0x01,
                can_baud: CanBaud::Baud500k,
                can_bus_id: 0x600,
                is_slave: false,
            },
            set_points: SetPoints {
                pv_oc_volt: 120.0,
                pv_mp_volt: 96.0,
                float_volt: 56.4,
                bulk_volt: 60.9,
                bulk_time: 1.0,
                bulk_reset_volt: 50.4,
                temp_compensation: 0.0,
                nominal_volt: 48.0,
            },
        }
    }
}

impl Record for UserConfig {
    const KIND: BlockKind = BlockKind::User;
    // version + genset (17) + comms (5) + 8 set points
    const LEN: usize = 1 + 17 + 5 + 8 * 4;

    fn defaults(_config: &EngineConfig) -> Self {
        Self::default()
    }
}

/// Miscellaneous operating state
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub struct MiscState {
    pub toggle_switch_mode: u8,
    pub enable_smart_shutdown: bool,
    pub out_volt_cutoff_offset: f32,
    pub out_volt_cutoff_scale: f32,
}

impl MiscState {
    /// Defaults for a given power stage
    pub fn defaults_for(model: ModelVariant) -> Self {
        let (offset, scale) = match model {
            ModelVariant::Hv => (6.35, 0.11),
            ModelVariant::Mv | ModelVariant::Unknown => (5.0, 0.185),
        };
        Self {
            toggle_switch_mode: 1,
            enable_smart_shutdown: false,
            out_volt_cutoff_offset: offset,
            out_volt_cutoff_scale: scale,
        }
    }
}

impl Default for MiscState {
    fn default() -> Self {
        Self::defaults_for(ModelVariant::Mv)
    }
}

impl Record for MiscState {
    const KIND: BlockKind = BlockKind::MiscState;
    const LEN: usize = 1 + 1 + 1 + 2 * 4;

    fn defaults(config: &EngineConfig) -> Self {
        Self::defaults_for(config.hardware.model)
    }
}

/// State written out of band whenever the control loop marks it dirty
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub struct PersistentState {
    /// Resume charging automatically after power-up
    pub auto_on: bool,
}

impl Default for PersistentState {
    fn default() -> Self {
        Self { auto_on: true }
    }
}

impl Record for PersistentState {
    const KIND: BlockKind = BlockKind::Persistent;
    const LEN: usize = 1 + 1;

    fn defaults(_config: &EngineConfig) -> Self {
        Self::default()
    }
}
