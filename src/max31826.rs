//! MAX31826: 12-bit thermometer with 1Kb of lockable EEPROM behind the
//! same ROM id.
//!
//! The two functions share one bus device, so a running conversion blocks
//! EEPROM traffic and a pending EEPROM commit blocks conversions. The
//! wrappers here enforce that before delegating to the protocol layers.

use crate::{
    eeprom::{Eeprom, EepromProps},
    temp::{TempProps, TempSensor},
    Address, Clock, Device, Driver, Error, Slave, Transport,
};

pub const PAGE_SIZE: u16 = 8;
pub const PAGE_COUNT: u8 = 16;
pub const MEMORY_SIZE: u16 = PAGE_SIZE * PAGE_COUNT as u16;

const LOCK_LOW: u8 = 0x80;
const LOCK_HIGH: u8 = 0x81;

const CONVERSION_TIMES_MS: [u16; 1] = [150];

const TEMP_PROPS: TempProps = TempProps {
    conv_times_ms: &CONVERSION_TIMES_MS,
    granularity: 0.0625,
    // resolution is fixed at 12 bits, nothing to configure
    cfg_bytes: 0,
};

const EEPROM_PROPS: EepromProps = EepromProps {
    scratchpad_size: 8,
    max_write_address: LOCK_HIGH as u16,
    max_read_address: MEMORY_SIZE + 2,
    write_cycle_ms: 25,
};

/// Lockable halves of the EEPROM array.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum MemoryArea {
    /// Bytes `0x00..=0x3F`.
    Low,
    /// Bytes `0x40..=0x7F`.
    High,
}

pub struct Max31826 {
    temp: TempSensor,
    eeprom: Eeprom,
    location: u8,
}

impl Device for Max31826 {
    const FAMILY_CODE: u8 = 0x3B;

    fn address(&self) -> &Address {
        self.temp.slave().address()
    }

    fn from_address_unchecked(address: Address) -> Self {
        Max31826 {
            temp: TempSensor::new(Slave::new(address), TEMP_PROPS),
            eeprom: Eeprom::new(Slave::new(address), EEPROM_PROPS),
            location: 0,
        }
    }
}

impl Max31826 {
    /// Probe the device: capture its power mode and the hardware-strapped
    /// location code. Soft-disables the device on failure.
    pub fn init<T: Transport>(&mut self, driver: &mut Driver<T>) -> Result<(), Error<T::Error>> {
        self.temp.slave_mut().set_enabled(true);
        self.eeprom.slave_mut().set_enabled(true);
        let res = self.probe(driver);
        if res.is_err() {
            self.temp.slave_mut().set_enabled(false);
            self.eeprom.slave_mut().set_enabled(false);
        }
        res
    }

    fn probe<T: Transport>(&mut self, driver: &mut Driver<T>) -> Result<(), Error<T::Error>> {
        let parasite = driver.parasite_powered(Some(self.temp.slave().address()))?;
        self.temp.slave_mut().set_parasite_powered(parasite);
        self.eeprom.slave_mut().set_parasite_powered(parasite);

        self.temp.read_scratchpad(driver)?;
        self.location = self.temp.scratchpad()[4] & 0x0F;
        Ok(())
    }

    /// Location code strapped on the AD3..AD0 pins.
    pub fn location(&self) -> u8 {
        self.location
    }

    pub fn sensor(&self) -> &TempSensor {
        &self.temp
    }

    pub fn eeprom(&self) -> &Eeprom {
        &self.eeprom
    }

    /// Start a conversion unless an EEPROM commit is pending.
    pub fn start_conversion<T: Transport>(
        &mut self,
        driver: &mut Driver<T>,
        clock: &mut impl Clock,
    ) -> Result<(), Error<T::Error>> {
        if self.eeprom.slave().is_busy() {
            return Err(Error::Busy);
        }
        self.temp.start_conversion(driver, clock)
    }

    pub fn convert_handler<T: Transport>(
        &mut self,
        driver: &mut Driver<T>,
        clock: &mut impl Clock,
    ) -> Result<(), Error<T::Error>> {
        self.temp.convert_handler(driver, clock)
    }

    /// Blocking measurement, in Celsius.
    pub fn measure<T: Transport>(
        &mut self,
        driver: &mut Driver<T>,
        clock: &mut impl Clock,
    ) -> Result<f32, Error<T::Error>> {
        if self.eeprom.slave().is_busy() {
            self.eeprom.wait_idle(driver, clock)?;
        }
        self.temp.convert(driver, clock)
    }

    pub fn celsius(&self) -> f32 {
        self.temp.celsius()
    }

    /// Read from the EEPROM array, blocked while a conversion runs.
    pub fn read<T: Transport>(
        &mut self,
        driver: &mut Driver<T>,
        address: u16,
        buf: &mut [u8],
    ) -> Result<(), Error<T::Error>> {
        if self.temp.slave().is_busy() {
            return Err(Error::Busy);
        }
        self.eeprom.read_memory(driver, address, buf)
    }

    /// Write to the EEPROM array, blocked while a conversion runs.
    pub fn write<T: Transport>(
        &mut self,
        driver: &mut Driver<T>,
        clock: &mut impl Clock,
        address: u16,
        data: &[u8],
    ) -> Result<(), Error<T::Error>> {
        if self.temp.slave().is_busy() {
            return Err(Error::Busy);
        }
        if address >= MEMORY_SIZE {
            return Err(Error::Range);
        }
        if data.len() > (MEMORY_SIZE - address) as usize {
            return Err(Error::Overflow);
        }
        self.eeprom.write_memory(driver, clock, address, data)
    }

    /// Poll a pending EEPROM commit.
    pub fn write_cycle_handler<T: Transport>(
        &mut self,
        driver: &mut Driver<T>,
        clock: &mut impl Clock,
    ) -> Result<(), Error<T::Error>> {
        self.eeprom.write_cycle_handler(driver, clock)
    }

    /// Permanently lock half of the EEPROM array. Irreversible on the
    /// device, so there is no matching unlock.
    pub fn lock_memory<T: Transport>(
        &mut self,
        driver: &mut Driver<T>,
        area: MemoryArea,
    ) -> Result<(), Error<T::Error>> {
        if self.temp.slave().is_busy() {
            return Err(Error::Busy);
        }
        self.eeprom.slave().check_ready()?;

        driver.control_sequence(Some(self.eeprom.slave().address()))?;
        let lock = match area {
            MemoryArea::Low => LOCK_LOW,
            MemoryArea::High => LOCK_HIGH,
        };
        driver.write_bytes(&[lock, 0x55])
    }
}
