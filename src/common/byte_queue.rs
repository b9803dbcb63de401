//! Bounded byte FIFO between one producer and one consumer, with
//! timeout-bounded blocking on both ends.

use crate::common::os::*;
use alloc::sync::Arc;
use core::sync::atomic::{AtomicBool, Ordering};
use rtrb::{Consumer, Producer, RingBuffer};

pub use rtrb::PushError;

pub struct ByteQueue;

impl ByteQueue {
    #[allow(clippy::new_ret_no_self)]
    pub fn new<OS: OsInterface>(capacity: usize) -> (QueueWriter<OS>, QueueReader<OS>) {
        let (w, r) = RingBuffer::<u8>::new(capacity);
        let (data_notifier, data_waiter) = OS::notifier();
        let (space_notifier, space_waiter) = OS::notifier();
        let closed = Arc::new(AtomicBool::new(false));
        (
            QueueWriter {
                w,
                data_notifier,
                space_waiter,
                closed: Arc::clone(&closed),
            },
            QueueReader {
                r,
                data_waiter,
                space_notifier,
                closed,
            },
        )
    }
}

// Producer -------------------------------------------------------------------

pub struct QueueWriter<OS: OsInterface> {
    w: Producer<u8>,
    data_notifier: OS::Notifier,
    space_waiter: OS::NotifyReceiver,
    closed: Arc<AtomicBool>,
}

impl<OS: OsInterface> QueueWriter<OS> {
    /// Insert a byte, waiting up to `timeout` for space.
    ///
    /// Fails at once, also in the middle of a wait, when the reader is gone.
    pub fn enqueue(&mut self, byte: u8, timeout: MicrosDurationU32) -> Result<(), PushError<u8>> {
        let Self {
            w,
            data_notifier,
            space_waiter,
            closed,
        } = self;
        let pushed = space_waiter.wait_with::<OS, _>(timeout, || {
            if closed.load(Ordering::Acquire) || w.is_abandoned() {
                return Some(false);
            }
            w.push(byte).ok().map(|()| true)
        });
        match pushed {
            Some(true) => {
                data_notifier.notify();
                Ok(())
            }
            _ => Err(PushError::Full(byte)),
        }
    }

    /// The reader has been dropped, nobody will consume anymore.
    #[inline]
    pub fn is_abandoned(&self) -> bool {
        self.closed.load(Ordering::Acquire) || self.w.is_abandoned()
    }
}

// Consumer -------------------------------------------------------------------

pub struct QueueReader<OS: OsInterface> {
    r: Consumer<u8>,
    data_waiter: OS::NotifyReceiver,
    space_notifier: OS::Notifier,
    closed: Arc<AtomicBool>,
}

impl<OS: OsInterface> QueueReader<OS> {
    /// Take the next byte, waiting up to `timeout` for one to arrive.
    pub fn try_dequeue(&mut self, timeout: MicrosDurationU32) -> Option<u8> {
        let r = &mut self.r;
        let byte = self
            .data_waiter
            .wait_with::<OS, _>(timeout, || r.pop().ok())?;
        self.space_notifier.notify();
        Some(byte)
    }

    /// Discard everything currently queued without blocking.
    /// Returns the number of discarded bytes.
    pub fn clear(&mut self) -> usize {
        let n = self.r.slots();
        if n > 0 {
            if let Ok(chunk) = self.r.read_chunk(n) {
                chunk.commit_all();
            }
            self.space_notifier.notify();
        }
        n
    }

    #[inline]
    pub fn len(&self) -> usize {
        self.r.slots()
    }

    #[inline]
    pub fn is_empty(&self) -> bool {
        self.r.is_empty()
    }

    #[inline]
    pub fn capacity(&self) -> usize {
        self.r.buffer().capacity()
    }

    /// The writer has been dropped, no more bytes will arrive.
    #[inline]
    pub fn is_abandoned(&self) -> bool {
        self.r.is_abandoned()
    }
}

impl<OS: OsInterface> Drop for QueueReader<OS> {
    fn drop(&mut self) {
        // Wake a writer blocked on a full queue.
        self.closed.store(true, Ordering::Release);
        self.space_notifier.notify();
    }
}
