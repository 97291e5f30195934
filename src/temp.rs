//! Temperature-sensor protocol layer.
//!
//! Conversion is the long operation here: the part integrates for up to
//! 750 ms depending on resolution, drawing heavy current in parasite mode.
//! The layer mirrors the EEPROM discipline: start the conversion, mark the
//! device busy, then poll a handler against the resolution-indexed worst
//! case time. The result register is read back and cached once the deadline
//! passes.

use crate::{
    clock::elapsed_ms,
    crc::check_crc8,
    Clock, Driver, Error, Slave, TempCommand, Transport,
};
use byteorder::{ByteOrder, LittleEndian};

/// Scratchpad layout common to the Dallas temperature family:
/// temperature LSB/MSB, two alarm limits, configuration, reserved bytes,
/// trailing CRC8.
pub const SCRATCHPAD_SIZE: usize = 9;

const COPY_SETTLE_MS: u32 = 10;

/// Conversion timing and format of a concrete sensor.
#[derive(Debug, Clone, Copy)]
pub struct TempProps {
    /// Worst-case conversion time per resolution index.
    pub conv_times_ms: &'static [u16],
    /// Celsius per LSB of the result register.
    pub granularity: f32,
    /// Bytes after the temperature registers that Write Scratchpad
    /// transfers (alarm limits and configuration).
    pub cfg_bytes: usize,
}

/// One temperature sensor (or the thermometer side of a combo part).
pub struct TempSensor {
    slave: Slave,
    props: TempProps,
    scratch: [u8; SCRATCHPAD_SIZE],
    res_idx: usize,
    raw: i16,
    conv_started_at: u32,
    conv_done: bool,
}

impl TempSensor {
    pub fn new(slave: Slave, props: TempProps) -> Self {
        TempSensor {
            slave,
            props,
            scratch: [0; SCRATCHPAD_SIZE],
            res_idx: props.conv_times_ms.len() - 1,
            raw: 0,
            conv_started_at: 0,
            conv_done: true,
        }
    }

    pub fn slave(&self) -> &Slave {
        &self.slave
    }

    pub(crate) fn slave_mut(&mut self) -> &mut Slave {
        &mut self.slave
    }

    /// Raw scratchpad image from the last read.
    pub fn scratchpad(&self) -> &[u8; SCRATCHPAD_SIZE] {
        &self.scratch
    }

    pub(crate) fn scratchpad_mut(&mut self) -> &mut [u8; SCRATCHPAD_SIZE] {
        &mut self.scratch
    }

    /// Index into the conversion-time table used for the deadline.
    pub fn resolution_index(&self) -> usize {
        self.res_idx
    }

    pub(crate) fn set_resolution_index(&mut self, res_idx: usize) {
        self.res_idx = res_idx.min(self.props.conv_times_ms.len() - 1);
    }

    /// Raw result register of the last completed conversion.
    pub fn raw(&self) -> i16 {
        self.raw
    }

    pub fn celsius(&self) -> f32 {
        self.raw as f32 * self.props.granularity
    }

    pub fn fahrenheit(&self) -> f32 {
        self.celsius() * 1.8 + 32.0
    }

    pub fn kelvin(&self) -> f32 {
        self.celsius() + 273.15
    }

    /// Kick off a conversion and mark the device busy.
    ///
    /// In parasite mode the strong pull-up stays up until the handler sees
    /// the deadline pass, so no other bus traffic is allowed meanwhile.
    pub fn start_conversion<T: Transport>(
        &mut self,
        driver: &mut Driver<T>,
        clock: &mut impl Clock,
    ) -> Result<(), Error<T::Error>> {
        self.slave.check_ready()?;

        driver.control_sequence(Some(self.slave.address()))?;
        driver.write_command(TempCommand::ConvertT)?;
        if self.slave.is_parasite_powered() {
            driver.set_strong_pullup(true)?;
        }

        self.slave.set_busy(true);
        self.conv_done = false;
        self.conv_started_at = clock.now_ms();
        Ok(())
    }

    /// Poll the running conversion.
    ///
    /// `Err(Busy)` until the worst-case time for the current resolution has
    /// fully elapsed; then the pull-up drops, the result register is read
    /// back and cached, and the device goes idle. Idempotent once complete.
    pub fn convert_handler<T: Transport>(
        &mut self,
        driver: &mut Driver<T>,
        clock: &mut impl Clock,
    ) -> Result<(), Error<T::Error>> {
        if self.conv_done {
            return Ok(());
        }
        let deadline = self.props.conv_times_ms[self.res_idx] as u32;
        if elapsed_ms(clock.now_ms(), self.conv_started_at) <= deadline {
            return Err(Error::Busy);
        }

        if self.slave.is_parasite_powered() {
            driver.set_strong_pullup(false)?;
        }
        self.slave.set_busy(false);
        self.conv_done = true;
        self.read_scratchpad(driver)?;
        Ok(())
    }

    /// Blocking conversion: start, spin on the handler, return Celsius.
    pub fn convert<T: Transport>(
        &mut self,
        driver: &mut Driver<T>,
        clock: &mut impl Clock,
    ) -> Result<f32, Error<T::Error>> {
        self.start_conversion(driver, clock)?;
        loop {
            match self.convert_handler(driver, clock) {
                Ok(()) => return Ok(self.celsius()),
                Err(Error::Busy) => clock.yield_now(),
                Err(e) => return Err(e),
            }
        }
    }

    /// Read and cache the scratchpad, checking its trailing CRC8.
    pub fn read_scratchpad<T: Transport>(
        &mut self,
        driver: &mut Driver<T>,
    ) -> Result<(), Error<T::Error>> {
        self.slave.check_ready()?;

        driver.control_sequence(Some(self.slave.address()))?;
        driver.write_command(TempCommand::ReadScratchpad)?;

        let mut scratch = [0u8; SCRATCHPAD_SIZE];
        driver.read_bytes(&mut scratch)?;
        if !check_crc8(&scratch[..SCRATCHPAD_SIZE - 1], scratch[SCRATCHPAD_SIZE - 1]) {
            return Err(Error::CrcMismatch);
        }

        self.scratch = scratch;
        self.raw = LittleEndian::read_u16(&scratch[..2]) as i16;
        Ok(())
    }

    /// Push the cached alarm/configuration bytes to the device and persist
    /// them to its EEPROM backing.
    ///
    /// Blocks for the short copy settle time, then polls the recall status
    /// slot and reads the scratchpad back.
    pub fn write_scratchpad<T: Transport>(
        &mut self,
        driver: &mut Driver<T>,
        clock: &mut impl Clock,
    ) -> Result<(), Error<T::Error>> {
        self.slave.check_ready()?;
        if self.props.cfg_bytes == 0 {
            return Err(Error::Value);
        }

        driver.control_sequence(Some(self.slave.address()))?;
        driver.write_command(TempCommand::WriteScratchpad)?;
        driver.write_bytes(&self.scratch[2..2 + self.props.cfg_bytes])?;

        driver.control_sequence(Some(self.slave.address()))?;
        driver.write_command(TempCommand::CopyScratchpad)?;
        if self.slave.is_parasite_powered() {
            driver.set_strong_pullup(true)?;
        }
        let started = clock.now_ms();
        while elapsed_ms(clock.now_ms(), started) <= COPY_SETTLE_MS {
            clock.yield_now();
        }
        if self.slave.is_parasite_powered() {
            driver.set_strong_pullup(false)?;
        }

        // recall the persisted bytes; the device answers 0 slots until done
        driver.control_sequence(Some(self.slave.address()))?;
        driver.write_command(TempCommand::Recall)?;
        while !driver.read_bit()? {
            clock.yield_now();
        }

        self.read_scratchpad(driver)
    }
}
