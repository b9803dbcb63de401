use super::*;
use crate::common::os::*;
use core::marker::PhantomData;
use embedded_hal::{
    digital::OutputPin,
    spi::{SpiBus, SpiDevice},
};
use fugit::NanosDurationU32;

// Sole device ------------------------------------------------------

/// A [`SpiDevice`] that owns the whole bus and its chip-select pin.
///
/// Chip select is asserted for the whole transaction and released
/// afterwards, also when an operation fails.
pub struct SpiSoleDevice<OS: OsInterface, CS, BUS> {
    bus: BUS,
    cs: CS,
    cs_delay: NanosDurationU32,
    _os: PhantomData<OS>,
}

impl<OS, CS, BUS> SpiSoleDevice<OS, CS, BUS>
where
    OS: OsInterface,
    BUS: SpiBus<u8>,
    CS: OutputPin,
{
    /// `cs_delay` is inserted after asserting and before releasing chip select.
    pub fn new(bus: BUS, cs: CS, cs_delay: NanosDurationU32) -> Self {
        Self {
            bus,
            cs,
            cs_delay,
            _os: PhantomData,
        }
    }

    pub fn release(self) -> (BUS, CS) {
        (self.bus, self.cs)
    }

    fn run(&mut self, operations: &mut [Operation<'_, u8>]) -> Result<(), BUS::Error> {
        for op in operations {
            match op {
                Operation::Read(buf) => self.bus.read(buf)?,
                Operation::Write(buf) => self.bus.write(buf)?,
                Operation::Transfer(read, write) => self.bus.transfer(read, write)?,
                Operation::TransferInPlace(buf) => self.bus.transfer_in_place(buf)?,
                Operation::DelayNs(ns) => {
                    self.bus.flush()?;
                    delay_ns::<OS>(*ns);
                }
            }
        }
        self.bus.flush()
    }
}

#[inline]
fn delay_ns<OS: OsInterface>(ns: u32) {
    if ns > 0 {
        OS::sleep(MicrosDurationU32::from_ticks(ns.div_ceil(1_000)));
    }
}

impl<OS, CS, BUS> SpiDevice<u8> for SpiSoleDevice<OS, CS, BUS>
where
    OS: OsInterface,
    BUS: SpiBus<u8>,
    CS: OutputPin,
{
    fn transaction(&mut self, operations: &mut [Operation<'_, u8>]) -> Result<(), Self::Error> {
        self.cs.set_low().map_err(|_| Error::ChipSelectFault)?;
        delay_ns::<OS>(self.cs_delay.ticks());
        let result = self.run(operations).map_err(Error::from_bus);
        delay_ns::<OS>(self.cs_delay.ticks());
        let cs = self.cs.set_high().map_err(|_| Error::ChipSelectFault);
        result.and(cs)
    }
}

impl<OS, CS, BUS> ErrorType for SpiSoleDevice<OS, CS, BUS>
where
    OS: OsInterface,
    BUS: SpiBus<u8>,
    CS: OutputPin,
{
    type Error = Error;
}
