//! Coolmax - Charge Controller Persistence Firmware
//!
//! Boots the persistence engine on an RP2040 board: loads every
//! configuration block from flash (falling back to defaults), reconciles the
//! factory calibration segment with its backup, then hands the engine to the
//! persistence task.

#![no_std]
#![no_main]

use defmt::*;
use embassy_executor::Spawner;
use static_cell::StaticCell;
use {defmt_rtt as _, panic_probe as _};

use coolmax_core::calibration::Decision;
use coolmax_core::persist::{BootReport, PersistenceEngine};
use coolmax_core::BlockKind;
use coolmax_hal::RestoreOutcome;
use coolmax_hal_rp2040::Rp2040Flash;

use crate::host::FirmwareHost;
use crate::tasks::Engine;

mod channels;
mod config;
mod host;
mod tasks;

// Engine must live forever for the persist task
static ENGINE: StaticCell<Engine> = StaticCell::new();

/// Main entry point
#[embassy_executor::main]
async fn main(spawner: Spawner) {
    info!("Coolmax firmware starting...");

    let p = embassy_rp::init(Default::default());
    info!("Peripherals initialized");

    let flash = Rp2040Flash::new(p.FLASH, config::CALIBRATION_SEGMENT);
    let (engine, report) =
        PersistenceEngine::boot(flash, FirmwareHost, config::engine_config());
    log_boot_report(&report);

    let identity = engine.store().identity();
    info!(
        "Model {} hw {} fw {} product {:a} serial {}",
        identity.model_name(),
        identity.hardware_version.as_str(),
        identity.firmware_version,
        identity.product_code,
        identity.serial_number
    );

    let engine = ENGINE.init(engine);

    spawner.spawn(tasks::comms_task()).unwrap();
    spawner.spawn(tasks::persist_task(engine)).unwrap();

    info!("All tasks spawned");
}

fn log_boot_report(report: &BootReport) {
    info!("Config status bits: {=u8:b}", report.status.bits());

    for kind in report.defaulted() {
        warn!("{} block unusable, defaults loaded", kind);
    }
    if !report.status.get(BlockKind::CalibrationBackup) {
        warn!("Calibration backup missing or corrupt");
    }

    let calibration = &report.calibration;
    match calibration.decision {
        Decision::InSync => info!("Calibration segment matches backup"),
        Decision::BackUp => info!("Backing up calibration segment"),
        Decision::Restore => match calibration.restore {
            Some(RestoreOutcome::Applied) => warn!("Calibration segment restored from backup"),
            Some(RestoreOutcome::Unsupported) => {
                warn!("Calibration segment invalid; board cannot restore it from backup")
            }
            Some(RestoreOutcome::Failed) | None => {
                error!("Calibration segment restore failed")
            }
        },
        Decision::Unrecoverable => error!("Calibration segment and backup both invalid"),
    }
}
