//! Everspin MR25H10 1 Mbit SPI MRAM.
//!
//! The device has no pages and no erase cycle: every byte is written in
//! place at bus speed, so "erase" is just writing zeros.

mod mr25h10;

pub use mr25h10::*;

use core::fmt::{Debug, Display};

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum Error<E> {
    /// `addr + size` is beyond the end of the memory.
    OutOfRange,
    Spi(E),
}

impl<E: Debug> Display for Error<E> {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        match self {
            Error::OutOfRange => write!(f, "MRAM address out of range"),
            Error::Spi(e) => write!(f, "MRAM SPI error: {e:?}"),
        }
    }
}

impl<E: Debug> core::error::Error for Error<E> {}
