use super::*;
use crate::common::os::*;
use embedded_hal::spi::{Operation, SpiDevice};
use embedded_storage::{ReadStorage, Storage};

/// Memory size in bytes.
pub const MAX_SIZE: u32 = 0x20000;
/// Largest payload moved in one chip-select transaction.
pub const MAX_TRANSFER: usize = 0xFFFF;
/// Time the device needs after [`Mr25h10::wake`] before it accepts commands.
pub const WAKE_UP_TIME: MicrosDurationU32 = MicrosDurationU32::from_ticks(400);

pub mod cmd {
    /// Write enable
    pub const WREN: u8 = 0x06;
    /// Write disable
    pub const WRDI: u8 = 0x04;
    /// Read status register
    pub const RDSR: u8 = 0x05;
    /// Write status register
    pub const WRSR: u8 = 0x01;
    pub const READ: u8 = 0x03;
    pub const WRITE: u8 = 0x02;
    /// Enter sleep mode
    pub const SLEEP: u8 = 0xB9;
    /// Exit sleep mode
    pub const WAKE: u8 = 0xAB;
}

static ZERO_BLOCK: [u8; 256] = [0; 256];

/// MR25H10 on a [`SpiDevice`] (mode 0 or mode 3, up to 40 MHz).
///
/// The methods take `&self`, the bus is locked for the whole operation so
/// concurrent callers never interleave on the wire.
pub struct Mr25h10<OS: OsInterface, SPI> {
    spi: Mutex<OS, SPI>,
}

impl<OS, SPI> Mr25h10<OS, SPI>
where
    OS: OsInterface,
    SPI: SpiDevice<u8>,
{
    pub fn new(spi: SPI) -> Self {
        Self {
            spi: OS::mutex(spi),
        }
    }

    pub fn release(self) -> SPI {
        self.spi.into_inner()
    }

    #[inline]
    pub const fn capacity(&self) -> usize {
        MAX_SIZE as usize
    }

    pub fn read(&self, addr: u32, buf: &mut [u8]) -> Result<(), Error<SPI::Error>> {
        check_range(addr, buf.len())?;
        if buf.is_empty() {
            return Ok(());
        }

        let mut spi = self.spi.lock();
        let mut addr = addr;
        for chunk in buf.chunks_mut(MAX_TRANSFER) {
            spi.transaction(&mut [
                Operation::Write(&header(cmd::READ, addr)),
                Operation::Read(chunk),
            ])
            .map_err(Error::Spi)?;
            addr += chunk.len() as u32;
        }
        Ok(())
    }

    pub fn write(&self, addr: u32, data: &[u8]) -> Result<(), Error<SPI::Error>> {
        check_range(addr, data.len())?;
        if data.is_empty() {
            return Ok(());
        }

        let mut spi = self.spi.lock();
        write_enabled(&mut *spi, |spi| {
            let mut addr = addr;
            for chunk in data.chunks(MAX_TRANSFER) {
                spi.transaction(&mut [
                    Operation::Write(&header(cmd::WRITE, addr)),
                    Operation::Write(chunk),
                ])?;
                addr += chunk.len() as u32;
            }
            Ok(())
        })
        .map_err(Error::Spi)
    }

    /// Fill `size` bytes from `addr` with zeros.
    pub fn erase(&self, addr: u32, size: usize) -> Result<(), Error<SPI::Error>> {
        check_range(addr, size)?;
        if size == 0 {
            return Ok(());
        }

        let mut spi = self.spi.lock();
        write_enabled(&mut *spi, |spi| {
            let mut addr = addr;
            let mut remaining = size;
            while remaining > 0 {
                let n = remaining.min(ZERO_BLOCK.len());
                spi.transaction(&mut [
                    Operation::Write(&header(cmd::WRITE, addr)),
                    Operation::Write(&ZERO_BLOCK[..n]),
                ])?;
                addr += n as u32;
                remaining -= n;
            }
            Ok(())
        })
        .map_err(Error::Spi)
    }

    pub fn read_byte(&self, addr: u32) -> Result<u8, Error<SPI::Error>> {
        let mut b = [0];
        self.read(addr, &mut b)?;
        Ok(b[0])
    }

    pub fn write_byte(&self, addr: u32, byte: u8) -> Result<(), Error<SPI::Error>> {
        self.write(addr, &[byte])
    }

    pub fn read_status(&self) -> Result<u8, Error<SPI::Error>> {
        let mut frame = [cmd::RDSR, 0];
        self.spi
            .lock()
            .transfer_in_place(&mut frame)
            .map_err(Error::Spi)?;
        Ok(frame[1])
    }

    /// Only needed to change the block protection bits.
    pub fn write_status(&self, status: u8) -> Result<(), Error<SPI::Error>> {
        let mut spi = self.spi.lock();
        write_enabled(&mut *spi, |spi| spi.write(&[cmd::WRSR, status])).map_err(Error::Spi)
    }

    /// Enter the low power sleep mode. Only [`Mr25h10::wake`] is accepted afterwards.
    pub fn sleep(&self) -> Result<(), Error<SPI::Error>> {
        self.spi.lock().write(&[cmd::SLEEP]).map_err(Error::Spi)
    }

    /// Leave sleep mode and wait until the device is ready again.
    pub fn wake(&self) -> Result<(), Error<SPI::Error>> {
        let mut spi = self.spi.lock();
        spi.write(&[cmd::WAKE]).map_err(Error::Spi)?;
        OS::sleep(WAKE_UP_TIME);
        Ok(())
    }
}

fn check_range<E>(addr: u32, size: usize) -> Result<(), Error<E>> {
    let end = u64::from(addr).saturating_add(size as u64);
    if end > u64::from(MAX_SIZE) {
        #[cfg(feature = "defmt")]
        defmt::warn!("MRAM access out of range: {=u32:#x} + {}", addr, size);
        return Err(Error::OutOfRange);
    }
    Ok(())
}

#[inline]
fn header(op: u8, addr: u32) -> [u8; 4] {
    let [_, a2, a1, a0] = addr.to_be_bytes();
    [op, a2, a1, a0]
}

/// Run `f` between WREN and WRDI. WRDI is sent even if `f` failed.
fn write_enabled<SPI, U>(
    spi: &mut SPI,
    f: impl FnOnce(&mut SPI) -> Result<U, SPI::Error>,
) -> Result<U, SPI::Error>
where
    SPI: SpiDevice<u8>,
{
    spi.write(&[cmd::WREN])?;
    let result = f(spi);
    let disable = spi.write(&[cmd::WRDI]);
    let v = result?;
    disable?;
    Ok(v)
}

// embedded-storage ------------------------------------------------------------

impl<OS, SPI> ReadStorage for Mr25h10<OS, SPI>
where
    OS: OsInterface,
    SPI: SpiDevice<u8>,
{
    type Error = Error<SPI::Error>;

    fn read(&mut self, offset: u32, bytes: &mut [u8]) -> Result<(), Self::Error> {
        Mr25h10::read(self, offset, bytes)
    }

    fn capacity(&self) -> usize {
        MAX_SIZE as usize
    }
}

impl<OS, SPI> Storage for Mr25h10<OS, SPI>
where
    OS: OsInterface,
    SPI: SpiDevice<u8>,
{
    fn write(&mut self, offset: u32, bytes: &[u8]) -> Result<(), Self::Error> {
        Mr25h10::write(self, offset, bytes)
    }
}
