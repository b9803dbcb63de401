pub use super::{dma::DmaChannel as _, os::NotifyReceiver as _, os::OsInterface as _};
pub use embedded_hal::spi::SpiDevice as _;
pub use embedded_io::{Read as _, ReadReady as _};
pub use embedded_storage::{ReadStorage as _, Storage as _};
pub use fugit::ExtU32 as _;
