mod device;

pub use device::*;
pub use embedded_hal::spi::{MODE_0, MODE_3, Mode, Phase, Polarity};

use core::fmt::Display;
use embedded_hal::spi::{ErrorKind, ErrorType, Operation};

/// SPI error
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
#[non_exhaustive]
pub enum Error {
    /// Overrun occurred
    Overrun,
    /// Mode fault occurred
    ModeFault,
    /// CRC error
    Crc,
    ChipSelectFault,
    Other,
}

impl Error {
    /// Classify any bus error.
    pub fn from_bus<E: embedded_hal::spi::Error>(e: E) -> Self {
        match e.kind() {
            ErrorKind::Overrun => Self::Overrun,
            ErrorKind::ModeFault => Self::ModeFault,
            ErrorKind::FrameFormat => Self::Crc,
            ErrorKind::ChipSelectFault => Self::ChipSelectFault,
            _ => Self::Other,
        }
    }
}

impl embedded_hal::spi::Error for Error {
    fn kind(&self) -> ErrorKind {
        match *self {
            Self::Overrun => ErrorKind::Overrun,
            Self::ModeFault => ErrorKind::ModeFault,
            Self::Crc => ErrorKind::FrameFormat,
            Self::ChipSelectFault => ErrorKind::ChipSelectFault,
            Self::Other => ErrorKind::Other,
        }
    }
}

impl Display for Error {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        match self {
            Self::Overrun => write!(f, "SPI overrun"),
            Self::ModeFault => write!(f, "SPI mode fault"),
            Self::Crc => write!(f, "SPI CRC error"),
            Self::ChipSelectFault => write!(f, "SPI chip select fault"),
            Self::Other => write!(f, "SPI error"),
        }
    }
}

impl core::error::Error for Error {}
