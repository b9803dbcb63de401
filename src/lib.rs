#![cfg_attr(not(any(test, feature = "std")), no_std)]

extern crate alloc;

pub mod common;

pub use common::{byte_queue, dma, mram, os, prelude, spi, uart};
pub use uart::{RxConfig, SerialDmaRx};

pub use embedded_hal;
pub use embedded_io;
pub use embedded_storage;
pub use fugit;
