//! Persistence engine
//!
//! Owns the platform, the host hooks, the config store and the single write
//! slot. Everything is advanced from [`PersistenceEngine::tick`]; nothing
//! blocks and nothing spins. A flash operation that never completes leaves
//! the engine parked in its current phase.

use coolmax_hal::{
    BlockKind, EraseStatus, Host, Platform, Verdict, SEGMENT_LEN, TRAILER_LEN,
};

use super::events::Event;
use super::machine::Phase;
use super::scheduler::{WriteRequest, WriteScheduler};
use crate::calibration::{reconcile, CalibrationReport, CalibrationSegment, Decision};
use crate::config::{EngineConfig, TelemetrySnapshot};
use crate::status::StatusBits;
use crate::store::{ConfigStore, BOOT_ORDER, MAX_BLOCK_LEN};

/// How a write cycle ended
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum WriteResult {
    /// Read back, checked, and applied to the committed copy
    Verified,
    /// Every attempt failed; the record now holds its defaults
    Defaulted,
    /// Programmed without read-back
    Unverified,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub struct WriteOutcome {
    pub kind: BlockKind,
    pub result: WriteResult,
    /// Erase/program cycles used
    pub attempts: u8,
}

/// Summary of the boot-time load
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub struct BootReport {
    pub status: StatusBits,
    pub calibration: CalibrationReport,
}

impl BootReport {
    /// Records that fell back to defaults
    pub fn defaulted(&self) -> impl Iterator<Item = BlockKind> {
        let status = self.status;
        BOOT_ORDER
            .into_iter()
            .filter(move |kind| !status.get(*kind))
    }
}

pub struct PersistenceEngine<P: Platform, H: Host> {
    platform: P,
    host: H,
    store: ConfigStore,
    phase: Phase,
    scheduler: WriteScheduler,
    active: Option<WriteRequest>,
    /// Sealed bytes being programmed; kept intact across retries
    image: [u8; MAX_BLOCK_LEN],
    /// Read-back buffer
    scratch: [u8; MAX_BLOCK_LEN],
}

impl<P: Platform, H: Host> PersistenceEngine<P, H> {
    /// Load every record, then reconcile the calibration segment.
    ///
    /// A calibration backup started here is carried out by subsequent ticks.
    pub fn boot(platform: P, host: H, config: EngineConfig) -> (Self, BootReport) {
        let mut engine = Self {
            platform,
            host,
            store: ConfigStore::new(config),
            phase: Phase::Idle,
            scheduler: WriteScheduler::new(),
            active: None,
            image: [0; MAX_BLOCK_LEN],
            scratch: [0; MAX_BLOCK_LEN],
        };

        for kind in BOOT_ORDER {
            engine
                .store
                .load(kind, &mut engine.platform, &mut engine.scratch);
        }

        let calibration = engine.reconcile_calibration();
        let report = BootReport {
            status: engine.store.status(),
            calibration,
        };
        (engine, report)
    }

    fn reconcile_calibration(&mut self) -> CalibrationReport {
        let mut live = [0u8; SEGMENT_LEN];
        self.platform.read_live_segment(&mut live);
        let live = CalibrationSegment::new(live);

        let address = self.store.config().layout.calibration_backup;
        let mut backup = [0xFFu8; SEGMENT_LEN];
        if self.platform.read_bytes(&mut backup, address, 0).is_err() {
            backup = [0xFF; SEGMENT_LEN];
        }
        let backup = CalibrationSegment::new(backup);

        let decision = reconcile(&live, &backup);
        self.store
            .mark(BlockKind::CalibrationBackup, backup.is_valid());

        let restore = match decision {
            Decision::BackUp => {
                self.start_backup(&live, address);
                None
            }
            Decision::Restore => Some(self.platform.restore_live_segment(backup.as_bytes())),
            Decision::InSync | Decision::Unrecoverable => None,
        };

        CalibrationReport {
            live_valid: live.is_valid(),
            backup_valid: backup.is_valid(),
            decision,
            restore,
        }
    }

    /// Raw segment copy: the segment carries its own checksum
    fn start_backup(&mut self, live: &CalibrationSegment, address: u32) {
        self.image[..SEGMENT_LEN].copy_from_slice(live.as_bytes());
        self.active = Some(WriteRequest {
            kind: BlockKind::CalibrationBackup,
            address,
            len: SEGMENT_LEN,
            attempts_total: 1,
            attempts_left: 1,
            verify: false,
        });
        self.phase = self.phase.transition(Event::Dispatch);
    }

    /// Ask for the pending copy of `kind` to be written.
    ///
    /// Only Factory, User, Events and MiscState are accepted. The kind
    /// replaces anything already waiting and is dispatched at once when no
    /// write is in flight.
    pub fn request_write(&mut self, kind: BlockKind) -> bool {
        if !self.scheduler.request(kind) {
            return false;
        }
        if self.phase.is_idle() {
            self.dispatch_next();
        }
        true
    }

    /// [`Self::request_write`] by protocol code
    pub fn request_write_code(&mut self, code: u8) -> bool {
        match BlockKind::from_u8(code) {
            Some(kind) => self.request_write(kind),
            None => false,
        }
    }

    /// Advance by one step. Returns the outcome when a write cycle ends.
    pub fn tick(&mut self) -> Option<WriteOutcome> {
        if self.phase.is_idle() && !self.dispatch_next() && self.host.persist_dirty() {
            self.host.clear_persist_dirty();
            self.dispatch(BlockKind::Persistent);
        }
        self.advance()
    }

    /// The driver finished an erase it reported as pending
    pub fn on_erase_complete(&mut self) {
        if self.phase == Phase::WaitingForErase {
            self.phase = self.phase.transition(Event::EraseDone);
        }
    }

    fn dispatch_next(&mut self) -> bool {
        match self.scheduler.take() {
            Some(kind) => self.dispatch(kind),
            None => false,
        }
    }

    /// Encode and seal the pending record, then start its cycle
    fn dispatch(&mut self, kind: BlockKind) -> bool {
        let config = *self.store.config();
        let (Some(payload_len), Some(address)) =
            (ConfigStore::payload_len(kind), config.layout.address_of(kind))
        else {
            return false;
        };
        if self.store.encode_pending(kind, &mut self.image).is_err() {
            return false;
        }
        let len = payload_len + TRAILER_LEN;
        P::seal(&mut self.image[..len]);

        let attempts = match kind {
            BlockKind::Persistent => config.persistent_write_attempts,
            _ => config.write_attempts,
        }
        .max(1);

        self.active = Some(WriteRequest {
            kind,
            address,
            len,
            attempts_total: attempts,
            attempts_left: attempts,
            verify: true,
        });
        self.phase = self.phase.transition(Event::Dispatch);
        true
    }

    fn advance(&mut self) -> Option<WriteOutcome> {
        let request = self.active?;
        if self.phase.needs_idle_flash() && !self.platform.is_idle() {
            return None;
        }

        match self.phase {
            Phase::Idle | Phase::WaitingForErase => None,
            Phase::Erasing => {
                // A driver error leaves us here for the next tick
                match self.platform.erase(request.address, request.len) {
                    Ok(EraseStatus::Done) => self.phase = self.phase.transition(Event::EraseDone),
                    Ok(EraseStatus::Pending) => {
                        self.phase = self.phase.transition(Event::EraseDeferred)
                    }
                    Err(_) => {}
                }
                None
            }
            Phase::Writing => {
                if self.platform.start_write(request.address, request.len).is_err() {
                    return None;
                }
                // Short writes show up as a failed check
                let _ = self.platform.write_bytes(&self.image[..request.len]);
                self.platform.end_write();
                self.phase = self.phase.transition(Event::Programmed {
                    verify: request.verify,
                });

                if request.verify {
                    return None;
                }
                self.active = None;
                Some(WriteOutcome {
                    kind: request.kind,
                    result: WriteResult::Unverified,
                    attempts: request.attempts_used(),
                })
            }
            Phase::CheckingFlash => {
                let block = &mut self.scratch[..request.len];
                block.fill(0);
                // An unreadable block stays zeroed and fails the check
                let _ = self.platform.read_bytes(block, request.address, 0);
                self.phase = self.phase.transition(Event::ReadBack);
                None
            }
            Phase::VerifyingAndApplying => self.verify_and_apply(request),
        }
    }

    fn verify_and_apply(&mut self, request: WriteRequest) -> Option<WriteOutcome> {
        let passed = P::verify(&self.scratch[..request.len]) == Verdict::Pass;

        if !passed && request.attempts_left > 1 {
            if let Some(active) = self.active.as_mut() {
                active.attempts_left -= 1;
            }
            self.phase = self.phase.transition(Event::Retry);
            return None;
        }

        let payload = &self.scratch[..request.len - TRAILER_LEN];
        let applied = self.store.apply(request.kind, passed.then_some(payload));

        self.phase = self.phase.transition(Event::Settled);
        self.active = None;
        if request.kind != BlockKind::Persistent {
            self.host.write_complete(request.kind);
        }

        Some(WriteOutcome {
            kind: request.kind,
            result: if applied {
                WriteResult::Verified
            } else {
                WriteResult::Defaulted
            },
            attempts: request.attempts_used(),
        })
    }

    pub fn phase(&self) -> Phase {
        self.phase
    }

    pub fn is_busy(&self) -> bool {
        !self.phase.is_idle()
    }

    pub fn status(&self) -> StatusBits {
        self.store.status()
    }

    /// Kind waiting for dispatch
    pub fn pending_write(&self) -> Option<BlockKind> {
        self.scheduler.pending()
    }

    /// Write cycle in flight
    pub fn active_write(&self) -> Option<&WriteRequest> {
        self.active.as_ref()
    }

    pub fn store(&self) -> &ConfigStore {
        &self.store
    }

    /// Mutable store access for staging pending edits
    pub fn store_mut(&mut self) -> &mut ConfigStore {
        &mut self.store
    }

    pub fn telemetry(&self) -> TelemetrySnapshot {
        self.store.telemetry()
    }

    pub fn platform(&self) -> &P {
        &self.platform
    }

    pub fn platform_mut(&mut self) -> &mut P {
        &mut self.platform
    }

    pub fn host(&self) -> &H {
        &self.host
    }

    pub fn host_mut(&mut self) -> &mut H {
        &mut self.host
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::calibration::segment::sealed_segment;
    use crate::config::{id_field, FlashLayout, Record, UserConfig};
    use crate::testing::{SimFlash, SimHost};
    use coolmax_hal::RestoreOutcome;

    type Engine = PersistenceEngine<SimFlash, SimHost>;

    fn boot(flash: SimFlash) -> (Engine, BootReport) {
        PersistenceEngine::boot(flash, SimHost::default(), EngineConfig::default())
    }

    fn run(engine: &mut Engine) -> Option<WriteOutcome> {
        (0..32).find_map(|_| engine.tick())
    }

    #[test]
    fn test_boot_with_valid_blocks() {
        let (engine, report) = boot(SimFlash::with_defaults());
        assert_eq!(report.status.count(), 5);
        assert_eq!(report.defaulted().count(), 0);
        assert_eq!(report.calibration.decision, Decision::Unrecoverable);
        assert_eq!(engine.phase(), Phase::Idle);
        assert!(engine.active_write().is_none());
    }

    #[test]
    fn test_boot_with_corrupt_factory() {
        let mut flash = SimFlash::with_defaults();
        flash.corrupt(FlashLayout::default().factory + 20);
        let (engine, report) = boot(flash);

        assert!(!report.status.get(BlockKind::Factory));
        assert!(report.defaulted().eq([BlockKind::Factory]));
        assert_eq!(&engine.store().identity().product_code, b"A001");
        assert_eq!(
            engine.store().factory().committed().over_current_set_point,
            50.0
        );
    }

    #[test]
    fn test_user_write_round_trip() {
        let (mut engine, _) = boot(SimFlash::new());
        engine.store_mut().user_mut().pending_mut().set_points.float_volt = 55.2;

        assert!(engine.request_write(BlockKind::User));
        assert_eq!(engine.phase(), Phase::Erasing);

        let outcome = run(&mut engine).unwrap();
        assert_eq!(
            outcome,
            WriteOutcome {
                kind: BlockKind::User,
                result: WriteResult::Verified,
                attempts: 1,
            }
        );
        assert_eq!(engine.phase(), Phase::Idle);
        assert!(engine.status().get(BlockKind::User));
        assert_eq!(engine.store().user().committed().set_points.float_volt, 55.2);
        assert_eq!(engine.host().notified, [BlockKind::User]);

        let stored = engine
            .platform()
            .bytes(FlashLayout::default().user, UserConfig::LEN);
        assert_eq!(
            &UserConfig::decode(stored).unwrap(),
            engine.store().user().committed()
        );
    }

    #[test]
    fn test_verify_failure_exhausts_attempts() {
        let mut flash = SimFlash::with_defaults();
        flash.corrupt_programs = u32::MAX;
        let (mut engine, _) = boot(flash);
        engine.store_mut().user_mut().pending_mut().comms.modbus_address = 9;

        engine.request_write(BlockKind::User);
        let outcome = run(&mut engine).unwrap();

        assert_eq!(outcome.result, WriteResult::Defaulted);
        assert_eq!(outcome.attempts, 2);
        assert_eq!(engine.platform().erase_calls, 2);
        assert_eq!(engine.platform().program_calls, 2);
        assert!(!engine.status().get(BlockKind::User));
        assert_eq!(engine.store().user().committed(), &UserConfig::default());
        assert_eq!(engine.host().notified, [BlockKind::User]);
    }

    #[test]
    fn test_recovers_after_one_bad_program() {
        let mut flash = SimFlash::new();
        flash.corrupt_programs = 1;
        let (mut engine, _) = boot(flash);

        engine.request_write(BlockKind::Events);
        let outcome = run(&mut engine).unwrap();

        assert_eq!(outcome.result, WriteResult::Verified);
        assert_eq!(outcome.attempts, 2);
        assert_eq!(engine.platform().erase_calls, 2);
        assert!(engine.status().get(BlockKind::Events));
    }

    #[test]
    fn test_last_request_wins_while_busy() {
        let (mut engine, _) = boot(SimFlash::new());
        engine.request_write(BlockKind::User);
        engine.tick();

        assert!(engine.request_write(BlockKind::Events));
        assert!(engine.request_write(BlockKind::MiscState));
        assert_eq!(engine.pending_write(), Some(BlockKind::MiscState));

        assert_eq!(run(&mut engine).unwrap().kind, BlockKind::User);
        assert_eq!(run(&mut engine).unwrap().kind, BlockKind::MiscState);
        assert_eq!(run(&mut engine), None);
        assert_eq!(
            engine.host().notified,
            [BlockKind::User, BlockKind::MiscState]
        );
        assert!(!engine.status().get(BlockKind::Events));
    }

    #[test]
    fn test_persistent_write_is_flag_driven() {
        let (mut engine, _) = boot(SimFlash::new());
        engine.store_mut().persistent_mut().pending_mut().auto_on = false;
        engine.host_mut().dirty = true;

        let outcome = run(&mut engine).unwrap();
        assert_eq!(outcome.kind, BlockKind::Persistent);
        assert_eq!(outcome.result, WriteResult::Verified);
        assert!(!engine.host().dirty);
        assert!(engine.host().notified.is_empty());
        assert!(!engine.store().persistent().committed().auto_on);
        assert!(engine.status().get(BlockKind::Persistent));
    }

    #[test]
    fn test_persistent_gets_one_attempt() {
        let mut flash = SimFlash::new();
        flash.corrupt_programs = u32::MAX;
        let (mut engine, _) = boot(flash);
        engine.store_mut().persistent_mut().pending_mut().auto_on = false;
        engine.host_mut().dirty = true;

        let outcome = run(&mut engine).unwrap();
        assert_eq!(outcome.result, WriteResult::Defaulted);
        assert_eq!(outcome.attempts, 1);
        assert_eq!(engine.platform().erase_calls, 1);
        assert!(engine.store().persistent().committed().auto_on);
        assert!(engine.host().notified.is_empty());
    }

    #[test]
    fn test_queued_request_runs_before_persistent() {
        let (mut engine, _) = boot(SimFlash::new());
        engine.host_mut().dirty = true;
        engine.request_write(BlockKind::User);

        assert_eq!(run(&mut engine).unwrap().kind, BlockKind::User);
        assert!(engine.host().dirty);
        assert_eq!(run(&mut engine).unwrap().kind, BlockKind::Persistent);
        assert!(!engine.host().dirty);
    }

    #[test]
    fn test_rejects_non_requestable_kinds() {
        let (mut engine, _) = boot(SimFlash::new());
        assert!(!engine.request_write(BlockKind::Persistent));
        assert!(!engine.request_write(BlockKind::CalibrationBackup));
        assert!(!engine.request_write(BlockKind::Telemetry));
        assert!(!engine.request_write_code(0x42));
        assert!(!engine.request_write_code(0xFF));
        assert_eq!(engine.phase(), Phase::Idle);

        assert!(engine.request_write_code(4));
        assert_eq!(engine.active_write().unwrap().kind, BlockKind::MiscState);
    }

    #[test]
    fn test_deferred_erase_waits_for_completion() {
        let mut flash = SimFlash::new();
        flash.defer_erase = true;
        let (mut engine, _) = boot(flash);

        engine.request_write(BlockKind::User);
        engine.tick();
        assert_eq!(engine.phase(), Phase::WaitingForErase);
        for _ in 0..10 {
            assert_eq!(engine.tick(), None);
        }
        assert_eq!(engine.phase(), Phase::WaitingForErase);

        engine.platform_mut().finish_erase();
        engine.on_erase_complete();
        assert_eq!(engine.phase(), Phase::Writing);
        assert_eq!(run(&mut engine).unwrap().result, WriteResult::Verified);
    }

    #[test]
    fn test_stray_erase_completion_ignored() {
        let (mut engine, _) = boot(SimFlash::new());
        engine.on_erase_complete();
        assert_eq!(engine.phase(), Phase::Idle);

        engine.request_write(BlockKind::User);
        engine.on_erase_complete();
        assert_eq!(engine.phase(), Phase::Erasing);
    }

    #[test]
    fn test_busy_flash_parks_without_timeout() {
        let (mut engine, _) = boot(SimFlash::new());
        engine.platform().busy_polls.set(1000);
        engine.request_write(BlockKind::User);

        for _ in 0..100 {
            assert_eq!(engine.tick(), None);
        }
        assert_eq!(engine.phase(), Phase::CheckingFlash);

        engine.platform().busy_polls.set(0);
        assert_eq!(run(&mut engine).unwrap().result, WriteResult::Verified);
    }

    #[test]
    fn test_driver_errors_retry_next_tick() {
        let mut flash = SimFlash::new();
        flash.reject_erase = 2;
        flash.reject_start_write = 1;
        let (mut engine, _) = boot(flash);

        engine.request_write(BlockKind::User);
        engine.tick();
        engine.tick();
        assert_eq!(engine.phase(), Phase::Erasing);
        engine.tick();
        assert_eq!(engine.phase(), Phase::Writing);
        engine.tick();
        assert_eq!(engine.phase(), Phase::Writing);

        let outcome = run(&mut engine).unwrap();
        assert_eq!(outcome.result, WriteResult::Verified);
        assert_eq!(outcome.attempts, 1);
        assert_eq!(engine.platform().program_calls, 1);
    }

    #[test]
    fn test_pending_edits_survive_in_flight_write() {
        let (mut engine, _) = boot(SimFlash::new());
        engine.store_mut().user_mut().pending_mut().set_points.bulk_volt = 61.0;
        engine.request_write(BlockKind::User);
        engine.tick();

        engine.store_mut().user_mut().pending_mut().set_points.bulk_volt = 62.0;
        run(&mut engine).unwrap();

        let user = engine.store().user();
        assert_eq!(user.committed().set_points.bulk_volt, 61.0);
        assert_eq!(user.pending().set_points.bulk_volt, 62.0);
        assert!(user.is_modified());
    }

    #[test]
    fn test_factory_write_refreshes_identity() {
        let (mut engine, _) = boot(SimFlash::new());
        {
            let factory = engine.store_mut().factory_mut().pending_mut();
            factory.product_id = id_field("D440");
            factory.serial_number = id_field("77");
        }
        engine.request_write(BlockKind::Factory);
        assert_eq!(run(&mut engine).unwrap().result, WriteResult::Verified);

        assert_eq!(&engine.store().identity().product_code, b"D440");
        assert_eq!(engine.store().identity().serial_number, 77);
        assert_eq!(&engine.telemetry().product_id[..4], b"D440");
        assert_eq!(engine.telemetry().status, engine.status().bits());
    }

    #[test]
    fn test_valid_live_segment_is_backed_up() {
        let live = sealed_segment(0x11);
        let mut flash = SimFlash::with_defaults();
        flash.live_segment = *live.as_bytes();
        let (mut engine, report) = boot(flash);

        assert_eq!(report.calibration.decision, Decision::BackUp);
        assert!(report.calibration.calibrated());
        assert!(!report.status.get(BlockKind::CalibrationBackup));
        assert_eq!(
            engine.active_write().unwrap().kind,
            BlockKind::CalibrationBackup
        );

        let outcome = run(&mut engine).unwrap();
        assert_eq!(
            outcome,
            WriteOutcome {
                kind: BlockKind::CalibrationBackup,
                result: WriteResult::Unverified,
                attempts: 1,
            }
        );
        let address = FlashLayout::default().calibration_backup;
        assert_eq!(
            engine.platform().bytes(address, SEGMENT_LEN),
            live.as_bytes()
        );
        assert!(engine.host().notified.is_empty());
    }

    #[test]
    fn test_stale_backup_is_replaced() {
        let mut flash = SimFlash::new();
        flash.live_segment = *sealed_segment(0x11).as_bytes();
        flash.program_raw(
            FlashLayout::default().calibration_backup,
            sealed_segment(0x22).as_bytes(),
        );
        let (_, report) = boot(flash);
        assert_eq!(report.calibration.decision, Decision::BackUp);
        assert!(report.status.get(BlockKind::CalibrationBackup));
    }

    #[test]
    fn test_matching_backup_is_left_alone() {
        let segment = sealed_segment(0x11);
        let mut flash = SimFlash::new();
        flash.live_segment = *segment.as_bytes();
        flash.program_raw(FlashLayout::default().calibration_backup, segment.as_bytes());
        let (engine, report) = boot(flash);

        assert_eq!(report.calibration.decision, Decision::InSync);
        assert!(report.status.get(BlockKind::CalibrationBackup));
        assert_eq!(engine.phase(), Phase::Idle);
    }

    #[test]
    fn test_restore_is_unsupported_by_default() {
        let backup = sealed_segment(0x33);
        let mut flash = SimFlash::new();
        flash.program_raw(FlashLayout::default().calibration_backup, backup.as_bytes());
        let (engine, report) = boot(flash);

        assert_eq!(report.calibration.decision, Decision::Restore);
        assert_eq!(report.calibration.restore, Some(RestoreOutcome::Unsupported));
        assert!(!report.calibration.calibrated());
        assert_eq!(engine.platform().live_segment, [0xFF; SEGMENT_LEN]);
    }

    #[test]
    fn test_restore_when_supported() {
        let backup = sealed_segment(0x33);
        let mut flash = SimFlash::new();
        flash.restore_supported = true;
        flash.program_raw(FlashLayout::default().calibration_backup, backup.as_bytes());
        let (engine, report) = boot(flash);

        assert_eq!(report.calibration.restore, Some(RestoreOutcome::Applied));
        assert!(report.calibration.calibrated());
        assert_eq!(engine.platform().restored, Some(*backup.as_bytes()));
    }

    #[test]
    fn test_request_during_backup_is_queued() {
        let mut flash = SimFlash::new();
        flash.live_segment = *sealed_segment(0x44).as_bytes();
        let (mut engine, _) = boot(flash);

        assert!(engine.request_write(BlockKind::User));
        assert_eq!(engine.pending_write(), Some(BlockKind::User));
        assert_eq!(
            engine.active_write().unwrap().kind,
            BlockKind::CalibrationBackup
        );

        assert_eq!(
            run(&mut engine).unwrap().kind,
            BlockKind::CalibrationBackup
        );
        let outcome = run(&mut engine).unwrap();
        assert_eq!(outcome.kind, BlockKind::User);
        assert_eq!(outcome.result, WriteResult::Verified);
    }
}
