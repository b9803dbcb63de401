//! Platform independent drivers. Hardware access goes through
//! [`dma::DmaChannel`], `embedded-hal` traits and [`os::OsInterface`].

pub mod byte_queue;
pub mod dma;
pub mod mram;
pub mod os;
pub mod prelude;
pub mod spi;
pub mod uart;
