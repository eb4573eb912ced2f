//! Persistence task
//!
//! Owns the persistence engine. Advances it on a fixed tick and feeds it
//! commands from the rest of the firmware between ticks.

use defmt::*;
use embassy_futures::select::{select, Either};
use embassy_time::{Duration, Ticker};

use coolmax_core::persist::{PersistenceEngine, WriteOutcome, WriteResult};
use coolmax_core::BlockKind;
use coolmax_hal_rp2040::Rp2040Flash;

use crate::channels::{mark_persist_dirty, PersistCommand, PERSIST_COMMANDS};
use crate::config::TICK_INTERVAL_MS;
use crate::host::FirmwareHost;

/// Engine type for this board
pub type Engine = PersistenceEngine<Rp2040Flash<'static>, FirmwareHost>;

#[embassy_executor::task]
pub async fn persist_task(engine: &'static mut Engine) {
    info!("Persist task started");

    let mut ticker = Ticker::every(Duration::from_millis(TICK_INTERVAL_MS));

    loop {
        match select(ticker.next(), PERSIST_COMMANDS.receive()).await {
            Either::First(()) => {
                if let Some(outcome) = engine.tick() {
                    log_outcome(&outcome, engine);
                }
            }
            Either::Second(command) => handle_command(command, engine),
        }
    }
}

fn handle_command(command: PersistCommand, engine: &mut Engine) {
    match command {
        PersistCommand::Write(kind) => {
            if !engine.request_write(kind) {
                warn!("Rejected write request for {}", kind);
            }
        }
        PersistCommand::WriteCode(code) => {
            if !engine.request_write_code(code) {
                warn!("Rejected write request code {:#04x}", code);
            }
        }
        PersistCommand::SetAutoOn(auto_on) => {
            engine
                .store_mut()
                .persistent_mut()
                .pending_mut()
                .auto_on = auto_on;
            mark_persist_dirty();
        }
    }
}

fn log_outcome(outcome: &WriteOutcome, engine: &Engine) {
    match outcome.result {
        WriteResult::Verified => info!(
            "{} written and verified ({} attempts)",
            outcome.kind, outcome.attempts
        ),
        WriteResult::Unverified => info!("{} written", outcome.kind),
        WriteResult::Defaulted => warn!(
            "{} failed verification after {} attempts, defaults loaded",
            outcome.kind, outcome.attempts
        ),
    }

    if outcome.kind == BlockKind::Factory {
        let identity = engine.store().identity();
        info!(
            "Identity: product {:a}, serial {}",
            identity.product_code, identity.serial_number
        );
    }

    let errors = engine.platform().program_errors();
    if errors > 0 {
        warn!("Flash controller rejected {} programs since boot", errors);
    }
}
