//! A simulated DMA engine receiving from a serial line.
//!
//! Bytes fed to the line are written into the DMA memory lazily, the next
//! time the remaining-count register is read, so the buffer is only ever
//! touched by the thread that polls it.

use super::*;
use std::{
    collections::VecDeque,
    sync::{Arc, Mutex, MutexGuard},
};

struct Engine {
    addr: usize,
    len: usize,
    pos: usize,
    state: DmaState,
    pending: VecDeque<u8>,
    pending_stop: Option<DmaState>,
    fail_starts: usize,
    starts: usize,
}

impl Engine {
    /// Play back the wire traffic, then apply a requested abort.
    fn transfer_pending(&mut self) {
        if self.state != DmaState::Active || self.len == 0 {
            self.pending.clear();
        }
        while let Some(b) = self.pending.pop_front() {
            // Safety: `addr..addr + len` is the receive buffer handed over by
            // `set_memory_buf_for_peripheral`, it lives as long as the channel.
            unsafe { (self.addr as *mut u8).add(self.pos).write_volatile(b) };
            self.pos += 1;
            if self.pos == self.len {
                self.pos = 0;
            }
        }
        if let Some(state) = self.pending_stop.take() {
            self.state = state;
        }
    }
}

pub struct MockDmaChannel {
    engine: Arc<Mutex<Engine>>,
}

impl MockDmaChannel {
    pub fn new() -> (Self, MockLine) {
        let engine = Arc::new(Mutex::new(Engine {
            addr: 0,
            len: 0,
            pos: 0,
            state: DmaState::Ready,
            pending: VecDeque::new(),
            pending_stop: None,
            fail_starts: 0,
            starts: 0,
        }));
        (
            Self {
                engine: Arc::clone(&engine),
            },
            MockLine { engine },
        )
    }

    fn engine(&self) -> MutexGuard<'_, Engine> {
        self.engine.lock().unwrap()
    }
}

impl DmaChannel for MockDmaChannel {
    fn start(&mut self) -> Result<(), DmaError> {
        let mut e = self.engine();
        e.starts += 1;
        if e.fail_starts > 0 {
            e.fail_starts -= 1;
            return Err(DmaError::Busy);
        }
        e.pos = 0;
        e.state = DmaState::Active;
        e.pending.clear();
        e.pending_stop = None;
        Ok(())
    }

    fn stop(&mut self) {
        let mut e = self.engine();
        e.pending.clear();
        e.pending_stop = None;
        e.state = DmaState::Ready;
    }

    fn set_peripheral_address(&mut self, _: usize, mem_to_periph: bool, _: bool, circular: bool) {
        assert!(!mem_to_periph);
        assert!(circular);
    }

    fn set_memory_address(&mut self, address: usize, increase: bool) {
        assert!(increase);
        self.engine().addr = address;
    }

    fn set_transfer_length(&mut self, len: usize) {
        self.engine().len = len;
    }

    fn get_unprocessed_len(&self) -> usize {
        let mut e = self.engine();
        e.transfer_pending();
        e.len - e.pos
    }

    fn state(&self) -> DmaState {
        let mut e = self.engine();
        e.transfer_pending();
        e.state
    }
}

/// The far end of the serial line, used by tests to inject traffic and faults.
#[derive(Clone)]
pub struct MockLine {
    engine: Arc<Mutex<Engine>>,
}

impl MockLine {
    /// Bytes arriving on the wire. They are lost while the engine is not active.
    pub fn feed(&self, data: &[u8]) {
        let mut e = self.engine.lock().unwrap();
        if e.state == DmaState::Active && e.pending_stop.is_none() {
            e.pending.extend(data);
        }
    }

    /// Abort the transfer, as the hardware does on a framing or overrun error.
    pub fn abort(&self) {
        self.engine.lock().unwrap().pending_stop = Some(DmaState::Ready);
    }

    /// Stop with an error state instead of plain abort.
    pub fn fail(&self) {
        self.engine.lock().unwrap().pending_stop = Some(DmaState::Error);
    }

    pub fn fail_next_starts(&self, n: usize) {
        self.engine.lock().unwrap().fail_starts = n;
    }

    pub fn starts(&self) -> usize {
        self.engine.lock().unwrap().starts
    }

    pub fn is_active(&self) -> bool {
        let e = self.engine.lock().unwrap();
        e.state == DmaState::Active && e.pending_stop.is_none()
    }
}
