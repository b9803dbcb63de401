//! DMA circular-buffer serial receiver.
//!
//! The DMA engine fills a circular buffer on its own. [`DmaRxDrain`] polls the
//! remaining-count register once per tick, copies the new bytes into a
//! [`ByteQueue`] and re-arms the engine when it aborted. [`SerialDmaRx`] reads
//! from that queue: single bytes, idle-gap framed packets or `embedded_io::Read`.

use super::*;
use crate::common::{byte_queue::*, dma::*};
use alloc::sync::Arc;
use core::sync::atomic::{AtomicBool, AtomicU32, Ordering};
use embedded_io::{ErrorType, Read, ReadReady};

#[derive(Default)]
struct Shared {
    stop: AtomicBool,
    received: AtomicU32,
    dropped: AtomicU32,
    dma_faults: AtomicU32,
}

/// Counters since the receiver was created.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub struct RxStats {
    /// Bytes moved from the DMA buffer into the queue.
    pub received: u32,
    /// Bytes lost because the queue stayed full.
    pub dropped: u32,
    /// DMA aborts detected by the drain loop.
    pub dma_faults: u32,
}

/// Result of a packet read. `len == 0` means no packet arrived.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub struct ReceivedPacket {
    /// Bytes written to the output buffer.
    pub len: usize,
    /// Bytes of the same packet that did not fit and were discarded.
    pub truncated: usize,
}

impl ReceivedPacket {
    #[inline]
    pub fn is_empty(&self) -> bool {
        self.len == 0
    }

    #[inline]
    pub fn is_truncated(&self) -> bool {
        self.truncated > 0
    }
}

/// What one drain iteration did.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub struct DrainReport {
    /// Bytes pushed into the queue.
    pub drained: usize,
    /// Bytes dropped on a full queue.
    pub dropped: usize,
    /// The engine was found stopped.
    pub fault_detected: bool,
    /// The engine was (re)started by this iteration.
    pub rearmed: bool,
}

// RX -------------------------------------------------------------------------

pub struct SerialDmaRx<OS: OsInterface> {
    r: QueueReader<OS>,
    shared: Arc<Shared>,
    silent_interval: MicrosDurationU32,
    read_timeout: MicrosDurationU32,
}

impl<OS: OsInterface> SerialDmaRx<OS> {
    /// Create the receiver and its drain task.
    ///
    /// The returned [`DmaRxDrain`] has to be driven by a dedicated task,
    /// see [`DmaRxDrain::run`]. `config.buf_size` must not be zero.
    pub fn new<CH: DmaChannel>(
        dma_ch: CH,
        peripheral_addr: usize,
        config: RxConfig,
    ) -> (Self, DmaRxDrain<OS, CH>) {
        debug_assert!(config.buf_size > 0);
        let (w, r) = ByteQueue::new::<OS>(config.buf_size);
        let rx = DmaCircularBufferRx::new(dma_ch, peripheral_addr, config.buf_size);
        let shared = Arc::new(Shared::default());
        (
            Self {
                r,
                shared: Arc::clone(&shared),
                silent_interval: config.silent_interval,
                read_timeout: config.read_timeout,
            },
            DmaRxDrain {
                rx,
                w,
                shared,
                armed: false,
                tick_period: config.tick_period,
                enqueue_timeout: config.enqueue_timeout,
            },
        )
    }

    /// Take one byte, waiting up to `timeout`.
    #[inline]
    pub fn get_byte(&mut self, timeout: MicrosDurationU32) -> Result<u8, Error> {
        self.r.try_dequeue(timeout).ok_or(Error::NoData)
    }

    /// Receive an idle-gap framed packet with the configured silent interval.
    #[inline]
    pub fn receive_packet(&mut self, buf: &mut [u8], timeout: MicrosDurationU32) -> ReceivedPacket {
        self.receive_packet_with(buf, timeout, self.silent_interval)
    }

    /// Wait up to `timeout` for the first byte, then keep collecting until no
    /// byte arrives for `silent_interval`.
    ///
    /// At most `buf.len() - 1` bytes are stored (one for a single-byte buffer),
    /// the rest of the packet is consumed and counted as truncated.
    pub fn receive_packet_with(
        &mut self,
        buf: &mut [u8],
        timeout: MicrosDurationU32,
        silent_interval: MicrosDurationU32,
    ) -> ReceivedPacket {
        let mut packet = ReceivedPacket::default();
        if buf.is_empty() {
            return packet;
        }
        let Some(first) = self.r.try_dequeue(timeout) else {
            return packet;
        };

        let max = buf.len().saturating_sub(1).max(1);
        buf[0] = first;
        packet.len = 1;
        while let Some(b) = self.r.try_dequeue(silent_interval) {
            if packet.len < max {
                buf[packet.len] = b;
                packet.len += 1;
            } else {
                packet.truncated += 1;
            }
        }
        packet
    }

    /// Discard every queued byte without blocking. Returns how many were dropped.
    #[inline]
    pub fn clear_queue(&mut self) -> usize {
        self.r.clear()
    }

    pub fn stats(&self) -> RxStats {
        RxStats {
            received: self.shared.received.load(Ordering::Relaxed),
            dropped: self.shared.dropped.load(Ordering::Relaxed),
            dma_faults: self.shared.dma_faults.load(Ordering::Relaxed),
        }
    }

    /// Stop the drain task and release the queue.
    ///
    /// The task notices at its next tick, stops the DMA channel and returns.
    pub fn shutdown(self) {}
}

impl<OS: OsInterface> Drop for SerialDmaRx<OS> {
    fn drop(&mut self) {
        self.shared.stop.store(true, Ordering::Release);
    }
}

impl<OS: OsInterface> ErrorType for SerialDmaRx<OS> {
    type Error = Error;
}

impl<OS: OsInterface> Read for SerialDmaRx<OS> {
    fn read(&mut self, buf: &mut [u8]) -> Result<usize, Self::Error> {
        if buf.is_empty() {
            return Ok(0);
        }

        buf[0] = self.get_byte(self.read_timeout)?;
        let mut n = 1;
        while n < buf.len() {
            match self.r.try_dequeue(0.micros()) {
                Some(b) => {
                    buf[n] = b;
                    n += 1;
                }
                None => break,
            }
        }
        Ok(n)
    }
}

impl<OS: OsInterface> ReadReady for SerialDmaRx<OS> {
    #[inline]
    fn read_ready(&mut self) -> Result<bool, Self::Error> {
        Ok(!self.r.is_empty())
    }
}

// Drain task -----------------------------------------------------------------

/// Moves bytes from the DMA circular buffer into the receive queue.
pub struct DmaRxDrain<OS: OsInterface, CH> {
    rx: DmaCircularBufferRx<CH>,
    w: QueueWriter<OS>,
    shared: Arc<Shared>,
    armed: bool,
    tick_period: MicrosDurationU32,
    enqueue_timeout: MicrosDurationU32,
}

impl<OS, CH> DmaRxDrain<OS, CH>
where
    OS: OsInterface,
    CH: DmaChannel,
{
    /// One drain iteration.
    ///
    /// Starts the engine on first use. Every byte written since the last call
    /// goes into the queue in arrival order. A stopped engine is counted as a
    /// fault and re-armed from buffer position 0; if that fails, the next
    /// call tries again and drains nothing until the engine runs.
    pub fn poll(&mut self) -> DrainReport {
        let mut report = DrainReport::default();
        if !self.armed {
            self.armed = self.rearm();
            report.rearmed = self.armed;
            if !self.armed {
                return report;
            }
        }

        self.drain(&mut report);

        let state = self.rx.state();
        if state != DmaState::Active {
            #[cfg(feature = "defmt")]
            defmt::warn!("DMA RX stopped ({}), re-arming", state);
            report.fault_detected = true;
            self.shared.dma_faults.fetch_add(1, Ordering::Relaxed);
            self.armed = self.rearm();
            report.rearmed = self.armed;
        }
        report
    }

    /// Poll once per tick until the receiver is shut down or dropped.
    pub fn run(&mut self) {
        let mut ticker = Ticker::<OS>::new(self.tick_period);
        while !self.is_stopped() {
            self.poll();
            ticker.wait();
        }
        self.rx.stop();
        self.armed = false;
    }

    /// Run on a dedicated thread.
    #[cfg(any(test, feature = "std"))]
    pub fn spawn(mut self) -> std::io::Result<std::thread::JoinHandle<()>>
    where
        CH: Send + 'static,
    {
        std::thread::Builder::new()
            .name("dma-rx-drain".into())
            .spawn(move || self.run())
    }

    #[inline]
    pub fn is_stopped(&self) -> bool {
        self.shared.stop.load(Ordering::Acquire) || self.w.is_abandoned()
    }

    fn drain(&mut self, report: &mut DrainReport) {
        let Self {
            rx,
            w,
            shared,
            enqueue_timeout,
            ..
        } = self;
        // Up to the buffer end, then the wrapped part.
        for _ in 0..2 {
            let Some(data) = rx.pop_slice(usize::MAX) else {
                break;
            };
            for (i, &b) in data.iter().enumerate() {
                // Nobody reads anymore, do not wait for queue space.
                if shared.stop.load(Ordering::Acquire) || w.is_abandoned() {
                    report.dropped += data.len() - i;
                    break;
                }
                match w.enqueue(b, *enqueue_timeout) {
                    Ok(()) => report.drained += 1,
                    Err(_) => report.dropped += 1,
                }
            }
        }

        if report.drained > 0 {
            self.shared
                .received
                .fetch_add(report.drained as u32, Ordering::Relaxed);
        }
        if report.dropped > 0 {
            #[cfg(feature = "defmt")]
            defmt::warn!("RX queue full, dropped {} bytes", report.dropped);
            self.shared
                .dropped
                .fetch_add(report.dropped as u32, Ordering::Relaxed);
        }
    }

    fn rearm(&mut self) -> bool {
        match self.rx.start() {
            Ok(()) => true,
            Err(_e) => {
                #[cfg(feature = "defmt")]
                defmt::warn!("DMA RX start failed: {}", _e);
                false
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::common::dma::mock::{MockDmaChannel, MockLine};
    use crate::common::os::{FakeOs, StdOs};
    use proptest::prelude::*;
    use std::vec::Vec;

    type FakeRx = SerialDmaRx<FakeOs>;
    type FakeDrain = DmaRxDrain<FakeOs, MockDmaChannel>;

    fn fake_rx(config: RxConfig) -> (FakeRx, FakeDrain, MockLine) {
        let (ch, line) = MockDmaChannel::new();
        let (rx, drain) = SerialDmaRx::new(ch, 0x4001_3804, config);
        (rx, drain, line)
    }

    fn take_all(rx: &mut FakeRx) -> Vec<u8> {
        let mut out = Vec::new();
        while let Ok(b) = rx.get_byte(0.micros()) {
            out.push(b);
        }
        out
    }

    #[test]
    fn first_poll_arms() {
        let (_rx, mut drain, line) = fake_rx(RxConfig::default());
        assert!(!line.is_active());
        let report = drain.poll();
        assert!(report.rearmed);
        assert!(!report.fault_detected);
        assert!(line.is_active());
        assert_eq!(line.starts(), 1);

        assert_eq!(drain.poll(), DrainReport::default());
        assert_eq!(line.starts(), 1);
    }

    #[test]
    fn in_order_across_wrap() {
        let (mut rx, mut drain, line) = fake_rx(RxConfig::default().buf_size(8));
        drain.poll();

        line.feed(&[1, 2, 3, 4, 5, 6]);
        assert_eq!(drain.poll().drained, 6);
        assert_eq!(take_all(&mut rx), [1, 2, 3, 4, 5, 6]);
        line.feed(&[7, 8, 9, 10, 11]);
        assert_eq!(drain.poll().drained, 5);
        assert_eq!(take_all(&mut rx), [7, 8, 9, 10, 11]);

        line.feed(&[12, 13]);
        drain.poll();
        assert_eq!(take_all(&mut rx), [12, 13]);
        assert_eq!(rx.stats().received, 13);
    }

    #[test]
    fn get_byte_timeout() {
        let (mut rx, mut drain, line) = fake_rx(RxConfig::default());
        drain.poll();

        let t = FakeOs::now_micros();
        assert_eq!(rx.get_byte(5.millis()), Err(Error::NoData));
        assert_eq!(FakeOs::now_micros() - t, 5_000);

        line.feed(&[0x42]);
        drain.poll();
        let t = FakeOs::now_micros();
        assert_eq!(rx.get_byte(5.millis()), Ok(0x42));
        assert_eq!(FakeOs::now_micros(), t);
    }

    #[test]
    fn packet_burst() {
        let (mut rx, mut drain, line) = fake_rx(RxConfig::default());
        drain.poll();

        let data: Vec<u8> = (0..40).collect();
        line.feed(&data);
        drain.poll();

        let mut buf = [0; 64];
        let t = FakeOs::now_micros();
        let packet = rx.receive_packet(&mut buf, 10.millis());
        assert_eq!(packet, ReceivedPacket { len: 40, truncated: 0 });
        assert_eq!(&buf[..40], &data[..]);
        // Only the trailing silent interval elapsed.
        assert_eq!(FakeOs::now_micros() - t, 3_000);
    }

    #[test]
    fn packet_truncated() {
        let (mut rx, mut drain, line) = fake_rx(RxConfig::default());
        drain.poll();

        let data: Vec<u8> = (100..120).collect();
        line.feed(&data);
        drain.poll();

        let mut buf = [0; 16];
        let packet = rx.receive_packet(&mut buf, 10.millis());
        assert!(packet.is_truncated());
        assert_eq!(packet, ReceivedPacket { len: 15, truncated: 5 });
        assert_eq!(&buf[..15], &data[..15]);
        // The rest of the packet was consumed.
        assert!(take_all(&mut rx).is_empty());
    }

    #[test]
    fn packet_single_byte_buffer() {
        let (mut rx, mut drain, line) = fake_rx(RxConfig::default());
        drain.poll();
        line.feed(&[7, 8]);
        drain.poll();

        let mut buf = [0; 1];
        let packet = rx.receive_packet(&mut buf, 10.millis());
        assert_eq!(packet, ReceivedPacket { len: 1, truncated: 1 });
        assert_eq!(buf, [7]);
    }

    #[test]
    fn packet_none() {
        let (mut rx, mut drain, _line) = fake_rx(RxConfig::default());
        drain.poll();

        let mut buf = [0; 16];
        let t = FakeOs::now_micros();
        let packet = rx.receive_packet(&mut buf, 20.millis());
        assert!(packet.is_empty());
        assert_eq!(FakeOs::now_micros() - t, 20_000);

        let t = FakeOs::now_micros();
        assert!(rx.receive_packet(&mut buf, 0.micros()).is_empty());
        assert_eq!(FakeOs::now_micros(), t);

        assert!(rx.receive_packet(&mut [], 20.millis()).is_empty());
    }

    #[test]
    fn packet_custom_silent_interval() {
        let (mut rx, mut drain, line) = fake_rx(RxConfig::default());
        drain.poll();
        line.feed(b"abc");
        drain.poll();

        let mut buf = [0; 8];
        let t = FakeOs::now_micros();
        let packet = rx.receive_packet_with(&mut buf, 1.millis(), 500.micros());
        assert_eq!(packet.len, 3);
        assert_eq!(&buf[..3], b"abc");
        assert_eq!(FakeOs::now_micros() - t, 500);
    }

    #[test]
    fn recover_from_abort() {
        let (mut rx, mut drain, line) = fake_rx(RxConfig::default().buf_size(16));
        drain.poll();

        line.feed(&[1, 2, 3]);
        line.abort();
        // Lost on the wire while the engine is down.
        line.feed(&[0xEE, 0xEE]);

        let report = drain.poll();
        assert_eq!(report.drained, 3);
        assert!(report.fault_detected);
        assert!(report.rearmed);
        assert!(line.is_active());

        line.feed(&[4, 5]);
        drain.poll();
        assert_eq!(take_all(&mut rx), [1, 2, 3, 4, 5]);
        assert_eq!(rx.stats().dma_faults, 1);
    }

    #[test]
    fn recover_from_error_state() {
        let (mut rx, mut drain, line) = fake_rx(RxConfig::default().buf_size(16));
        drain.poll();

        line.feed(&[1, 2, 3, 4, 5, 6]);
        drain.poll();
        line.fail();

        let report = drain.poll();
        assert!(report.fault_detected);
        assert!(report.rearmed);

        // Write position restarted at 0 along with the read cursor.
        line.feed(&[7, 8]);
        drain.poll();
        assert_eq!(take_all(&mut rx), [1, 2, 3, 4, 5, 6, 7, 8]);
    }

    #[test]
    fn rearm_retry() {
        let (mut rx, mut drain, line) = fake_rx(RxConfig::default().buf_size(16));
        drain.poll();

        line.feed(&[1, 2, 3]);
        drain.poll();
        line.abort();
        line.fail_next_starts(2);

        let report = drain.poll();
        assert!(report.fault_detected);
        assert!(!report.rearmed);

        line.feed(&[0xEE]);
        let report = drain.poll();
        assert_eq!(report, DrainReport::default());
        assert!(!line.is_active());

        let report = drain.poll();
        assert!(report.rearmed);
        assert!(!report.fault_detected);
        assert!(line.is_active());
        assert_eq!(line.starts(), 4);

        line.feed(&[4]);
        drain.poll();
        assert_eq!(take_all(&mut rx), [1, 2, 3, 4]);
        assert_eq!(rx.stats().dma_faults, 1);
    }

    #[test]
    fn initial_arm_failure() {
        let (_rx, mut drain, line) = fake_rx(RxConfig::default());
        line.fail_next_starts(1);
        assert_eq!(drain.poll(), DrainReport::default());
        assert!(drain.poll().rearmed);
        assert!(line.is_active());
    }

    #[test]
    fn clear_queue() {
        let (mut rx, mut drain, line) = fake_rx(RxConfig::default());
        drain.poll();
        line.feed(b"stale");
        drain.poll();

        assert_eq!(rx.clear_queue(), 5);
        assert_eq!(rx.get_byte(0.micros()), Err(Error::NoData));
        assert_eq!(rx.clear_queue(), 0);

        line.feed(b"x");
        drain.poll();
        assert_eq!(rx.get_byte(0.micros()), Ok(b'x'));
    }

    #[test]
    fn drop_on_full_queue() {
        let config = RxConfig::default()
            .buf_size(4)
            .enqueue_timeout(1.millis());
        let (mut rx, mut drain, line) = fake_rx(config);
        drain.poll();

        line.feed(&[1, 2, 3]);
        assert_eq!(drain.poll().drained, 3);

        line.feed(&[4, 5, 6]);
        let t = FakeOs::now_micros();
        let report = drain.poll();
        assert_eq!(report.drained, 1);
        assert_eq!(report.dropped, 2);
        assert_eq!(FakeOs::now_micros() - t, 2_000);

        assert_eq!(take_all(&mut rx), [1, 2, 3, 4]);
        assert_eq!(
            rx.stats(),
            RxStats {
                received: 4,
                dropped: 2,
                dma_faults: 0,
            }
        );
    }

    #[test]
    fn stop_drops_without_waiting() {
        let config = RxConfig::default()
            .buf_size(8)
            .enqueue_timeout(1000.millis());
        let (mut rx, mut drain, line) = fake_rx(config);
        drain.poll();
        line.feed(&[1, 2, 3, 4, 5, 6, 7]);
        drain.poll();
        assert_eq!(rx.get_byte(0.micros()), Ok(1));

        // Two bytes fit, the rest would block on a full queue.
        line.feed(&[8, 9, 10, 11, 12]);
        rx.shutdown();
        let t = FakeOs::now_micros();
        let report = drain.poll();
        assert_eq!(report.drained, 0);
        assert_eq!(report.dropped, 5);
        assert_eq!(FakeOs::now_micros(), t);
    }

    #[test]
    fn io_read() {
        let (mut rx, mut drain, line) = fake_rx(RxConfig::default().read_timeout(7.millis()));
        drain.poll();

        assert_eq!(rx.read_ready(), Ok(false));
        line.feed(b"hello");
        drain.poll();
        assert_eq!(rx.read_ready(), Ok(true));

        let mut buf = [0; 3];
        assert_eq!(rx.read(&mut buf), Ok(3));
        assert_eq!(&buf, b"hel");
        let mut buf = [0; 8];
        assert_eq!(rx.read(&mut buf), Ok(2));
        assert_eq!(&buf[..2], b"lo");
        assert_eq!(rx.read(&mut []), Ok(0));

        let t = FakeOs::now_micros();
        assert_eq!(rx.read(&mut buf), Err(Error::NoData));
        assert_eq!(FakeOs::now_micros() - t, 7_000);
    }

    #[test]
    fn stop_on_drop() {
        let (rx, mut drain, line) = fake_rx(RxConfig::default());
        drain.poll();
        assert!(line.is_active());
        assert!(!drain.is_stopped());

        drop(rx);
        assert!(drain.is_stopped());
        drain.run();
        assert!(!line.is_active());
    }

    #[test]
    fn threaded() {
        let config = RxConfig::default().silent_interval(50.millis());
        let (ch, line) = MockDmaChannel::new();
        let (mut rx, drain) = SerialDmaRx::<StdOs>::new(ch, 0x4000_4404, config);
        let handle = drain.spawn().unwrap();

        while !line.is_active() {
            std::thread::yield_now();
        }

        let data: Vec<u8> = (0..100).collect();
        line.feed(&data);
        let mut buf = [0; 128];
        let packet = rx.receive_packet(&mut buf, 1000.millis());
        assert_eq!(packet.len, 100);
        assert_eq!(&buf[..100], &data[..]);

        line.feed(&[0xA5]);
        assert_eq!(rx.get_byte(1000.millis()), Ok(0xA5));

        rx.shutdown();
        handle.join().unwrap();
        assert!(!line.is_active());
    }

    #[test]
    fn threaded_shutdown_on_full_queue() {
        let config = RxConfig::default()
            .buf_size(16)
            .enqueue_timeout(500.millis());
        let (ch, line) = MockDmaChannel::new();
        let (rx, drain) = SerialDmaRx::<StdOs>::new(ch, 0x4000_4404, config);
        let handle = drain.spawn().unwrap();
        while !line.is_active() {
            std::thread::yield_now();
        }

        line.feed(&[0x55; 15]);
        while rx.stats().received < 15 {
            std::thread::sleep(std::time::Duration::from_millis(1));
        }
        // One byte fits, the drain task blocks on the next one.
        line.feed(&[0xAA; 10]);
        std::thread::sleep(std::time::Duration::from_millis(20));

        let start = std::time::Instant::now();
        rx.shutdown();
        handle.join().unwrap();
        assert!(start.elapsed() < std::time::Duration::from_millis(200));
        assert!(!line.is_active());
    }

    proptest! {
        #[test]
        fn arbitrary_stream(
            chunks in prop::collection::vec(prop::collection::vec(any::<u8>(), 0..16), 0..40),
        ) {
            let (mut rx, mut drain, line) = fake_rx(RxConfig::default().buf_size(16));
            drain.poll();

            let mut out = Vec::new();
            for chunk in &chunks {
                line.feed(chunk);
                drain.poll();
                out.extend(take_all(&mut rx));
            }
            prop_assert_eq!(out, chunks.concat());
        }
    }
}
