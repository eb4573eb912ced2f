//! Config store
//!
//! Holds the committed and pending copy of every record, the status bits and
//! the derived identity. The committed copy is authoritative; flash is only
//! read at boot and when re-validating a block that was just written.

use coolmax_hal::{BlockKind, Crc16, FlashDriver, Verdict, TRAILER_LEN};

use crate::config::{
    CodecError, DeviceIdentity, EngineConfig, EventsConfig, FactoryConfig, MiscState,
    PersistentState, Record, TelemetrySnapshot, UserConfig,
};
use crate::status::StatusBits;

/// Largest sealed block, record plus trailer
pub const MAX_BLOCK_LEN: usize = 128;

const _: () = assert!(FactoryConfig::LEN + TRAILER_LEN <= MAX_BLOCK_LEN);
const _: () = assert!(EventsConfig::LEN + TRAILER_LEN <= MAX_BLOCK_LEN);
const _: () = assert!(UserConfig::LEN + TRAILER_LEN <= MAX_BLOCK_LEN);

/// Order in which records are loaded at boot
pub const BOOT_ORDER: [BlockKind; 5] = [
    BlockKind::Factory,
    BlockKind::User,
    BlockKind::Events,
    BlockKind::MiscState,
    BlockKind::Persistent,
];

/// A committed value and the pending edit that the next write will store
#[derive(Debug, Clone, PartialEq)]
pub struct Staged<T> {
    committed: T,
    pending: T,
}

impl<T: Clone + PartialEq> Staged<T> {
    fn new(value: T) -> Self {
        Self {
            pending: value.clone(),
            committed: value,
        }
    }

    /// Value currently in effect
    pub fn committed(&self) -> &T {
        &self.committed
    }

    /// Value the next write will store
    pub fn pending(&self) -> &T {
        &self.pending
    }

    pub fn pending_mut(&mut self) -> &mut T {
        &mut self.pending
    }

    /// Drop uncommitted edits
    pub fn discard_pending(&mut self) {
        self.pending = self.committed.clone();
    }

    /// Whether pending differs from committed
    pub fn is_modified(&self) -> bool {
        self.pending != self.committed
    }

    fn commit(&mut self, value: T) {
        self.committed = value;
    }

    fn reset(&mut self, value: T) {
        self.pending = value.clone();
        self.committed = value;
    }
}

/// Decode a verified payload into `slot`, or fall back to defaults
fn apply_record<R: Record>(
    slot: &mut Staged<R>,
    payload: Option<&[u8]>,
    config: &EngineConfig,
) -> bool {
    match payload.map(R::decode) {
        Some(Ok(value)) => {
            slot.commit(value);
            true
        }
        _ => {
            slot.reset(R::defaults(config));
            false
        }
    }
}

pub struct ConfigStore {
    config: EngineConfig,
    factory: Staged<FactoryConfig>,
    user: Staged<UserConfig>,
    events: Staged<EventsConfig>,
    misc_state: Staged<MiscState>,
    persistent: Staged<PersistentState>,
    status: StatusBits,
    identity: DeviceIdentity,
}

impl ConfigStore {
    /// Store holding defaults for every record, all status bits clear
    pub fn new(config: EngineConfig) -> Self {
        let factory = FactoryConfig::defaults(&config);
        let identity = DeviceIdentity::derive(&factory, &config);
        Self {
            factory: Staged::new(factory),
            user: Staged::new(UserConfig::defaults(&config)),
            events: Staged::new(EventsConfig::defaults(&config)),
            misc_state: Staged::new(MiscState::defaults(&config)),
            persistent: Staged::new(PersistentState::defaults(&config)),
            status: StatusBits::default(),
            identity,
            config,
        }
    }

    pub fn config(&self) -> &EngineConfig {
        &self.config
    }

    pub fn status(&self) -> StatusBits {
        self.status
    }

    pub fn identity(&self) -> &DeviceIdentity {
        &self.identity
    }

    pub fn factory(&self) -> &Staged<FactoryConfig> {
        &self.factory
    }

    pub fn factory_mut(&mut self) -> &mut Staged<FactoryConfig> {
        &mut self.factory
    }

    pub fn user(&self) -> &Staged<UserConfig> {
        &self.user
    }

    pub fn user_mut(&mut self) -> &mut Staged<UserConfig> {
        &mut self.user
    }

    pub fn events(&self) -> &Staged<EventsConfig> {
        &self.events
    }

    pub fn events_mut(&mut self) -> &mut Staged<EventsConfig> {
        &mut self.events
    }

    pub fn misc_state(&self) -> &Staged<MiscState> {
        &self.misc_state
    }

    pub fn misc_state_mut(&mut self) -> &mut Staged<MiscState> {
        &mut self.misc_state
    }

    pub fn persistent(&self) -> &Staged<PersistentState> {
        &self.persistent
    }

    pub fn persistent_mut(&mut self) -> &mut Staged<PersistentState> {
        &mut self.persistent
    }

    /// Record length (without trailer) for kinds stored as records
    pub const fn payload_len(kind: BlockKind) -> Option<usize> {
        match kind {
            BlockKind::Factory => Some(FactoryConfig::LEN),
            BlockKind::User => Some(UserConfig::LEN),
            BlockKind::Events => Some(EventsConfig::LEN),
            BlockKind::MiscState => Some(MiscState::LEN),
            BlockKind::Persistent => Some(PersistentState::LEN),
            BlockKind::CalibrationBackup | BlockKind::Telemetry => None,
        }
    }

    /// Load one record from flash at boot.
    ///
    /// Reads `len + 2` bytes into `scratch` and checks the trailer, trying
    /// again up to the configured read budget. Returns whether the stored
    /// copy was used; otherwise the record holds its defaults.
    pub fn load<F: FlashDriver + Crc16>(
        &mut self,
        kind: BlockKind,
        flash: &mut F,
        scratch: &mut [u8],
    ) -> bool {
        let (Some(len), Some(address)) = (
            Self::payload_len(kind),
            self.config.layout.address_of(kind),
        ) else {
            return false;
        };
        let total = len + TRAILER_LEN;
        if scratch.len() < total {
            return false;
        }
        let block = &mut scratch[..total];

        let mut verified = false;
        for _ in 0..self.config.read_attempts.max(1) {
            block.fill(0);
            if flash.read_bytes(block, address, 0).is_ok() && F::verify(block) == Verdict::Pass {
                verified = true;
                break;
            }
        }

        let ok = self.apply(kind, verified.then_some(&block[..len]));
        self.sync_pending(kind);
        ok
    }

    /// Apply a verified payload, or defaults when `payload` is `None` or
    /// does not decode. Updates the status bit and returns it.
    pub(crate) fn apply(&mut self, kind: BlockKind, payload: Option<&[u8]>) -> bool {
        let config = self.config;
        let ok = match kind {
            BlockKind::Factory => {
                let ok = apply_record(&mut self.factory, payload, &config);
                self.identity = DeviceIdentity::derive(self.factory.committed(), &config);
                ok
            }
            BlockKind::User => apply_record(&mut self.user, payload, &config),
            BlockKind::Events => apply_record(&mut self.events, payload, &config),
            BlockKind::MiscState => apply_record(&mut self.misc_state, payload, &config),
            BlockKind::Persistent => apply_record(&mut self.persistent, payload, &config),
            BlockKind::CalibrationBackup | BlockKind::Telemetry => return false,
        };
        self.status.set(kind, ok);
        ok
    }

    pub(crate) fn mark(&mut self, kind: BlockKind, ok: bool) {
        self.status.set(kind, ok);
    }

    /// Encode the pending copy of a record into `out`
    pub(crate) fn encode_pending(&self, kind: BlockKind, out: &mut [u8]) -> Result<usize, CodecError> {
        match kind {
            BlockKind::Factory => self.factory.pending().encode(out),
            BlockKind::User => self.user.pending().encode(out),
            BlockKind::Events => self.events.pending().encode(out),
            BlockKind::MiscState => self.misc_state.pending().encode(out),
            BlockKind::Persistent => self.persistent.pending().encode(out),
            BlockKind::CalibrationBackup | BlockKind::Telemetry => Err(CodecError::Encode),
        }
    }

    fn sync_pending(&mut self, kind: BlockKind) {
        match kind {
            BlockKind::Factory => self.factory.discard_pending(),
            BlockKind::User => self.user.discard_pending(),
            BlockKind::Events => self.events.discard_pending(),
            BlockKind::MiscState => self.misc_state.discard_pending(),
            BlockKind::Persistent => self.persistent.discard_pending(),
            BlockKind::CalibrationBackup | BlockKind::Telemetry => {}
        }
    }

    /// Snapshot for the comms link
    pub fn telemetry(&self) -> TelemetrySnapshot {
        TelemetrySnapshot {
            product_id: self.identity.product_id,
            serial_number: self.identity.serial_text,
            status: self.status.bits(),
        }
    }
}
