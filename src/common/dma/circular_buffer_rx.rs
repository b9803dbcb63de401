use super::*;
use alloc::{boxed::Box, vec};

/// A buffer used for DMA cyclic data reception, continuously read by the user.
pub struct DmaCircularBufferRx<CH> {
    ch: CH,
    buf: CircularBuffer,
    peripheral_addr: usize,
}

impl<CH> DmaCircularBufferRx<CH>
where
    CH: DmaChannel,
{
    /// Configure the channel. Reception begins with [`start`](Self::start).
    pub fn new(mut ch: CH, peripheral_addr: usize, buf_size: usize) -> Self {
        let mut buf = CircularBuffer::new(buf_size);
        ch.stop();
        ch.set_memory_buf_for_peripheral(buf.as_mut_slice());
        ch.set_peripheral_address(peripheral_addr, false, false, true);
        Self {
            ch,
            buf,
            peripheral_addr,
        }
    }

    /// (Re)arm continuous reception from the start of the buffer.
    ///
    /// The read cursor only returns to 0 when the engine accepted the transfer.
    pub fn start(&mut self) -> Result<(), DmaError> {
        self.ch.stop();
        self.ch.set_memory_buf_for_peripheral(self.buf.as_mut_slice());
        self.ch
            .set_peripheral_address(self.peripheral_addr, false, false, true);
        self.ch.start()?;
        self.buf.read_idx = 0;
        Ok(())
    }

    #[inline]
    pub fn stop(&mut self) {
        self.ch.stop();
    }

    /// Next contiguous span written by the DMA since the last call.
    ///
    /// A span never crosses the buffer end, the wrapped part comes with the next call.
    #[inline]
    pub fn pop_slice(&mut self, max: usize) -> Option<&[u8]> {
        let unprocessed_len = self.ch.get_unprocessed_len();
        self.buf.pop_slice(unprocessed_len, max)
    }

    #[inline]
    pub fn state(&self) -> DmaState {
        self.ch.state()
    }

    #[inline]
    pub fn capacity(&self) -> usize {
        self.buf.recv_buf.len()
    }

    /// Position the next read starts from.
    #[inline]
    pub fn read_position(&self) -> usize {
        self.buf.read_idx
    }
}

pub struct CircularBuffer {
    recv_buf: Box<[u8]>,
    read_idx: usize,
}

impl CircularBuffer {
    fn new(buf_size: usize) -> Self {
        Self {
            recv_buf: vec![0u8; buf_size].into_boxed_slice(),
            read_idx: 0,
        }
    }

    fn pop_slice(&mut self, unprocessed_len: usize, max: usize) -> Option<&[u8]> {
        let dma_recv_idx = if unprocessed_len == 0 || unprocessed_len > self.recv_buf.len() {
            0
        } else {
            self.recv_buf.len() - unprocessed_len
        };

        if self.read_idx == dma_recv_idx || max == 0 {
            return None;
        }

        let end = if dma_recv_idx < self.read_idx {
            self.recv_buf.len()
        } else {
            dma_recv_idx
        };
        let end = end.min(self.read_idx.saturating_add(max));

        let start = self.read_idx;
        self.read_idx = if end == self.recv_buf.len() { 0 } else { end };
        Some(&self.recv_buf[start..end])
    }

    fn as_mut_slice(&mut self) -> &mut [u8] {
        &mut self.recv_buf
    }
}
