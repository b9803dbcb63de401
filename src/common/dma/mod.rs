mod circular_buffer_rx;
#[cfg(test)]
pub(crate) mod mock;

pub use circular_buffer_rx::*;

use core::fmt::Display;

pub trait DmaChannel {
    /// Arm the transfer with the current configuration.
    fn start(&mut self) -> Result<(), DmaError>;
    fn stop(&mut self);

    fn set_peripheral_address(
        &mut self,
        address: usize,
        mem_to_periph: bool,
        increase: bool,
        circular: bool,
    );
    fn set_memory_address(&mut self, address: usize, increase: bool);
    fn set_transfer_length(&mut self, len: usize);
    fn set_memory_buf_for_peripheral(&mut self, buf: &mut [u8]) {
        self.set_memory_address(buf.as_mut_ptr() as usize, true);
        self.set_transfer_length(buf.len());
    }

    /// The remaining-count register: bytes left until the transfer wraps.
    fn get_unprocessed_len(&self) -> usize;
    fn state(&self) -> DmaState;
}

/// Operating state of a DMA engine.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum DmaState {
    /// A transfer is running.
    Active,
    /// Idle. For a circular transfer this means it was aborted.
    Ready,
    /// The engine stopped on a transfer error.
    Error,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
#[non_exhaustive]
pub enum DmaError {
    /// The channel is locked by another transfer.
    Busy,
    /// The channel refused the configuration or faulted while starting.
    Transfer,
}

impl Display for DmaError {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        match self {
            DmaError::Busy => write!(f, "DMA channel busy"),
            DmaError::Transfer => write!(f, "DMA transfer error"),
        }
    }
}

impl core::error::Error for DmaError {}
