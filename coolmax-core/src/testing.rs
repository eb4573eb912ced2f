//! Simulated flash and host for unit tests

use core::cell::Cell;
use std::vec;
use std::vec::Vec;

use coolmax_hal::integrity::crc16_ccitt;
use coolmax_hal::{
    BlockKind, CalibrationSource, Crc16, EraseStatus, FlashDriver, FlashError, Host,
    RestoreOutcome, SEGMENT_LEN, TRAILER_LEN,
};

use crate::config::{
    EventsConfig, FactoryConfig, FlashLayout, MiscState, PersistentState, Record, UserConfig,
};

const MEMORY_LEN: usize = 0x1_0000;
const SECTOR_LEN: u32 = 512;

/// RAM-backed flash with knobs for failure injection
pub struct SimFlash {
    pub memory: Vec<u8>,
    pub live_segment: [u8; SEGMENT_LEN],
    /// Erase reports `Pending` and keeps the controller busy until
    /// [`SimFlash::finish_erase`]
    pub defer_erase: bool,
    erase_running: bool,
    /// Number of `is_idle` polls that report busy
    pub busy_polls: Cell<u32>,
    /// Programs to corrupt on close; `u32::MAX` corrupts every one
    pub corrupt_programs: u32,
    /// Number of `start_write` calls to reject
    pub reject_start_write: u32,
    /// Number of `erase` calls to reject
    pub reject_erase: u32,
    pub restore_supported: bool,
    pub restored: Option<[u8; SEGMENT_LEN]>,
    pub erase_calls: u32,
    pub program_calls: u32,
    pub read_calls: u32,
    open: Option<(u32, usize)>,
    staged: Vec<u8>,
}

impl SimFlash {
    pub fn new() -> Self {
        Self {
            memory: vec![0xFF; MEMORY_LEN],
            live_segment: [0xFF; SEGMENT_LEN],
            defer_erase: false,
            erase_running: false,
            busy_polls: Cell::new(0),
            corrupt_programs: 0,
            reject_start_write: 0,
            reject_erase: 0,
            restore_supported: false,
            restored: None,
            erase_calls: 0,
            program_calls: 0,
            read_calls: 0,
            open: None,
            staged: Vec::new(),
        }
    }

    /// Every record stored with its defaults at the default layout
    pub fn with_defaults() -> Self {
        let layout = FlashLayout::default();
        let mut flash = Self::new();
        flash.program_record(layout.factory, &FactoryConfig::default());
        flash.program_record(layout.user, &UserConfig::default());
        flash.program_record(layout.events, &EventsConfig::default());
        flash.program_record(layout.misc_state, &MiscState::default());
        flash.program_record(layout.persistent, &PersistentState::default());
        flash
    }

    /// Store a sealed record the way the engine would
    pub fn program_record<R: Record>(&mut self, address: u32, record: &R) {
        let mut image = vec![0u8; R::LEN + TRAILER_LEN];
        record.encode(&mut image).unwrap();
        Self::seal(&mut image);
        self.program_raw(address, &image);
    }

    pub fn program_raw(&mut self, address: u32, bytes: &[u8]) {
        let start = address as usize;
        self.memory[start..start + bytes.len()].copy_from_slice(bytes);
    }

    pub fn bytes(&self, address: u32, len: usize) -> &[u8] {
        &self.memory[address as usize..address as usize + len]
    }

    /// Invert one byte
    pub fn corrupt(&mut self, address: u32) {
        self.flip(address, 0xFF);
    }

    pub fn flip(&mut self, address: u32, mask: u8) {
        self.memory[address as usize] ^= mask;
    }

    pub fn finish_erase(&mut self) {
        self.erase_running = false;
    }
}

impl Crc16 for SimFlash {
    fn crc16(init: u16, data: &[u8]) -> u16 {
        crc16_ccitt(init, data)
    }
}

impl FlashDriver for SimFlash {
    fn erase(&mut self, address: u32, len: usize) -> Result<EraseStatus, FlashError> {
        if self.reject_erase > 0 {
            self.reject_erase -= 1;
            return Err(FlashError::Busy);
        }
        self.erase_calls += 1;
        let start = address - address % SECTOR_LEN;
        let end = (address + len as u32).div_ceil(SECTOR_LEN) * SECTOR_LEN;
        if end as usize > MEMORY_LEN {
            return Err(FlashError::OutOfBounds);
        }
        self.memory[start as usize..end as usize].fill(0xFF);
        if self.defer_erase {
            self.erase_running = true;
            Ok(EraseStatus::Pending)
        } else {
            Ok(EraseStatus::Done)
        }
    }

    fn start_write(&mut self, address: u32, len: usize) -> Result<(), FlashError> {
        if self.reject_start_write > 0 {
            self.reject_start_write -= 1;
            return Err(FlashError::Busy);
        }
        if address as usize + len > MEMORY_LEN {
            return Err(FlashError::OutOfBounds);
        }
        self.open = Some((address, len));
        self.staged.clear();
        Ok(())
    }

    fn write_bytes(&mut self, data: &[u8]) -> Result<(), FlashError> {
        if self.open.is_none() {
            return Err(FlashError::Flash);
        }
        self.staged.extend_from_slice(data);
        Ok(())
    }

    fn end_write(&mut self) {
        let Some((address, len)) = self.open.take() else {
            return;
        };
        self.program_calls += 1;
        let mut data = core::mem::take(&mut self.staged);
        data.truncate(len);
        if self.corrupt_programs > 0 && !data.is_empty() {
            data[0] ^= 0x5A;
            if self.corrupt_programs != u32::MAX {
                self.corrupt_programs -= 1;
            }
        }
        self.program_raw(address, &data);
    }

    fn read_bytes(
        &mut self,
        buffer: &mut [u8],
        address: u32,
        offset: usize,
    ) -> Result<(), FlashError> {
        self.read_calls += 1;
        let start = address as usize + offset;
        let Some(source) = self.memory.get(start..start + buffer.len()) else {
            return Err(FlashError::OutOfBounds);
        };
        buffer.copy_from_slice(source);
        Ok(())
    }

    fn is_idle(&self) -> bool {
        let polls = self.busy_polls.get();
        if polls > 0 {
            self.busy_polls.set(polls - 1);
            return false;
        }
        !self.erase_running
    }
}

impl CalibrationSource for SimFlash {
    fn read_live_segment(&mut self, segment: &mut [u8; SEGMENT_LEN]) {
        *segment = self.live_segment;
    }

    fn restore_live_segment(&mut self, segment: &[u8; SEGMENT_LEN]) -> RestoreOutcome {
        if !self.restore_supported {
            return RestoreOutcome::Unsupported;
        }
        self.live_segment = *segment;
        self.restored = Some(*segment);
        RestoreOutcome::Applied
    }
}

#[derive(Default)]
pub struct SimHost {
    pub notified: Vec<BlockKind>,
    pub dirty: bool,
}

impl Host for SimHost {
    fn write_complete(&mut self, kind: BlockKind) {
        self.notified.push(kind);
    }

    fn persist_dirty(&self) -> bool {
        self.dirty
    }

    fn clear_persist_dirty(&mut self) {
        self.dirty = false;
    }
}
