mod uart_dma;
pub use uart_dma::*;

use crate::common::os::*;
use core::fmt::Display;
use embedded_io as e_io;

/// UART receive error
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
#[non_exhaustive]
pub enum Error {
    /// Nothing was received within the timeout.
    NoData,
}

impl Display for Error {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        match self {
            Error::NoData => write!(f, "UART no data within timeout"),
        }
    }
}

impl core::error::Error for Error {}

impl e_io::Error for Error {
    #[inline]
    fn kind(&self) -> e_io::ErrorKind {
        match self {
            Error::NoData => e_io::ErrorKind::TimedOut,
        }
    }
}

/// Receiver settings. Time values are in scheduler time, see [`RxConfig::tick_period`].
#[derive(Clone, Copy, Debug)]
pub struct RxConfig {
    /// Size of the DMA circular buffer, also the byte queue capacity.
    pub buf_size: usize,
    /// Period of the drain loop.
    pub tick_period: MicrosDurationU32,
    /// Inter-byte silence that ends a packet.
    pub silent_interval: MicrosDurationU32,
    /// How long the drain loop waits for queue space before dropping a byte.
    pub enqueue_timeout: MicrosDurationU32,
    /// Wait for the first byte in [`embedded_io::Read::read`].
    pub read_timeout: MicrosDurationU32,
}

impl Default for RxConfig {
    fn default() -> RxConfig {
        RxConfig {
            buf_size: 256,
            tick_period: 1.millis(),
            silent_interval: 3.millis(),
            enqueue_timeout: 1000.millis(),
            read_timeout: 100.millis(),
        }
    }
}

impl RxConfig {
    pub fn buf_size(mut self, buf_size: usize) -> Self {
        self.buf_size = buf_size;
        self
    }

    pub fn tick_period(mut self, tick_period: MicrosDurationU32) -> Self {
        self.tick_period = tick_period;
        self
    }

    pub fn silent_interval(mut self, silent_interval: MicrosDurationU32) -> Self {
        self.silent_interval = silent_interval;
        self
    }

    pub fn enqueue_timeout(mut self, enqueue_timeout: MicrosDurationU32) -> Self {
        self.enqueue_timeout = enqueue_timeout;
        self
    }

    pub fn read_timeout(mut self, read_timeout: MicrosDurationU32) -> Self {
        self.read_timeout = read_timeout;
        self
    }
}
