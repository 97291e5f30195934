//! Scratchpad-based EEPROM protocol layer.
//!
//! All supported parts share the same three-phase write discipline: stage
//! data in a scratchpad (integrity-checked with an inverted CRC16 echo),
//! read it back to obtain the authorization bytes, then issue a copy that
//! burns the scratchpad into the array. The copy takes a device-specific
//! write cycle during which the part draws heavy current, so the layer
//! raises a strong pull-up and refuses further bus traffic until the cycle
//! deadline passes.

use crate::{
    clock::elapsed_ms,
    crc::crc16_accumulate,
    Clock, Driver, EepromCommand, Error, Slave, Transport,
};
use byteorder::{ByteOrder, LittleEndian};

/// Largest scratchpad among the supported parts.
pub const MAX_SCRATCHPAD: usize = 32;

/// Geometry and timing of a concrete EEPROM part.
#[derive(Debug, Clone, Copy)]
pub struct EepromProps {
    /// Scratchpad size in bytes, a power of two.
    pub scratchpad_size: usize,
    /// Highest address writable through the scratchpad.
    pub max_write_address: u16,
    /// Highest address readable with Read Memory.
    pub max_read_address: u16,
    /// Worst-case copy (programming) time.
    pub write_cycle_ms: u32,
}

/// Scratchpad image as read back from the device.
#[derive(Debug, Clone, Copy)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub struct Scratchpad {
    /// Target address latched by the last write.
    pub address: u16,
    /// Ending-offset / status byte, passed back verbatim as copy
    /// authorization.
    pub es: u8,
    /// Valid byte count.
    pub len: usize,
    pub data: [u8; MAX_SCRATCHPAD],
}

impl Default for Scratchpad {
    fn default() -> Self {
        Scratchpad {
            address: 0,
            es: 0,
            len: 0,
            data: [0; MAX_SCRATCHPAD],
        }
    }
}

/// One EEPROM device (or the EEPROM side of a combo part).
pub struct Eeprom {
    slave: Slave,
    props: EepromProps,
    scratch: Scratchpad,
    write_started_at: u32,
    write_done: bool,
}

impl Eeprom {
    pub fn new(slave: Slave, props: EepromProps) -> Self {
        Eeprom {
            slave,
            props,
            scratch: Scratchpad::default(),
            write_started_at: 0,
            write_done: true,
        }
    }

    pub fn slave(&self) -> &Slave {
        &self.slave
    }

    pub(crate) fn slave_mut(&mut self) -> &mut Slave {
        &mut self.slave
    }

    pub fn props(&self) -> &EepromProps {
        &self.props
    }

    /// Last scratchpad image read back from the device.
    pub fn scratchpad(&self) -> &Scratchpad {
        &self.scratch
    }

    fn check_span<E: core::fmt::Debug>(
        address: u16,
        len: usize,
        max: u16,
    ) -> Result<(), Error<E>> {
        if address > max {
            return Err(Error::Range);
        }
        if len > (max - address) as usize + 1 {
            return Err(Error::Overflow);
        }
        Ok(())
    }

    /// Read the scratchpad back, verifying the trailing inverted CRC16.
    ///
    /// The image is cached; [`Eeprom::copy_scratchpad`] reuses its header
    /// bytes as the copy authorization.
    pub fn read_scratchpad<T: Transport>(
        &mut self,
        driver: &mut Driver<T>,
    ) -> Result<&Scratchpad, Error<T::Error>> {
        self.slave.check_ready()?;

        driver.control_sequence(Some(self.slave.address()))?;
        driver.write_command(EepromCommand::ReadScratchpad)?;

        let mut head = [0u8; 3];
        driver.read_bytes(&mut head)?;
        let es = head[2];
        let len = (es as usize & (self.props.scratchpad_size - 1)) + 1;

        let mut data = [0u8; MAX_SCRATCHPAD];
        driver.read_bytes(&mut data[..len])?;
        let mut crc = [0u8; 2];
        driver.read_bytes(&mut crc)?;

        let mut running = crc16_accumulate(0, &[EepromCommand::ReadScratchpad as u8]);
        running = crc16_accumulate(running, &head);
        running = crc16_accumulate(running, &data[..len]);
        if !running != LittleEndian::read_u16(&crc) {
            return Err(Error::CrcMismatch);
        }

        self.scratch = Scratchpad {
            address: LittleEndian::read_u16(&head[..2]),
            es,
            len,
            data,
        };
        Ok(&self.scratch)
    }

    /// Stage `data` at `address` and verify the round trip.
    ///
    /// The device echoes an inverted CRC16 over the command, address and
    /// data; after that the scratchpad is read back and compared so a copy
    /// never burns corrupted bytes.
    pub fn write_scratchpad<T: Transport>(
        &mut self,
        driver: &mut Driver<T>,
        address: u16,
        data: &[u8],
    ) -> Result<(), Error<T::Error>> {
        self.slave.check_ready()?;
        if data.is_empty() || data.len() > self.props.scratchpad_size {
            return Err(Error::Overflow);
        }
        Self::check_span(address, data.len(), self.props.max_write_address)?;

        let header = [
            EepromCommand::WriteScratchpad as u8,
            address as u8,
            (address >> 8) as u8,
        ];
        driver.control_sequence(Some(self.slave.address()))?;
        driver.write_bytes(&header)?;
        driver.write_bytes(data)?;

        let mut echo = [0u8; 2];
        driver.read_bytes(&mut echo)?;
        let expected = !crc16_accumulate(crc16_accumulate(0, &header), data);
        if expected != LittleEndian::read_u16(&echo) {
            return Err(Error::CrcMismatch);
        }

        let scratch = self.read_scratchpad(driver)?;
        if scratch.address != address || scratch.data[..data.len()] != *data {
            return Err(Error::CrcMismatch);
        }
        Ok(())
    }

    /// Commit the staged scratchpad to the array.
    ///
    /// Raises the strong pull-up and marks the device busy; the write cycle
    /// completes through [`Eeprom::write_cycle_handler`].
    pub fn copy_scratchpad<T: Transport>(
        &mut self,
        driver: &mut Driver<T>,
        clock: &mut impl Clock,
    ) -> Result<(), Error<T::Error>> {
        self.slave.check_ready()?;

        let auth = [
            EepromCommand::CopyScratchpad as u8,
            self.scratch.address as u8,
            (self.scratch.address >> 8) as u8,
            self.scratch.es,
        ];
        driver.control_sequence(Some(self.slave.address()))?;
        driver.write_bytes(&auth)?;
        driver.set_strong_pullup(true)?;

        self.slave.set_busy(true);
        self.write_done = false;
        self.write_started_at = clock.now_ms();
        Ok(())
    }

    /// Poll the pending write cycle.
    ///
    /// Returns `Err(Busy)` until the programming time has fully elapsed,
    /// then drops the strong pull-up and clears the busy flag. Idempotent
    /// once complete.
    pub fn write_cycle_handler<T: Transport>(
        &mut self,
        driver: &mut Driver<T>,
        clock: &mut impl Clock,
    ) -> Result<(), Error<T::Error>> {
        if self.write_done {
            return Ok(());
        }
        if elapsed_ms(clock.now_ms(), self.write_started_at) > self.props.write_cycle_ms {
            driver.set_strong_pullup(false)?;
            self.write_done = true;
            self.slave.set_busy(false);
            Ok(())
        } else {
            Err(Error::Busy)
        }
    }

    /// Block until any pending write cycle has completed.
    pub fn wait_idle<T: Transport>(
        &mut self,
        driver: &mut Driver<T>,
        clock: &mut impl Clock,
    ) -> Result<(), Error<T::Error>> {
        loop {
            match self.write_cycle_handler(driver, clock) {
                Ok(()) => return Ok(()),
                Err(Error::Busy) => clock.yield_now(),
                Err(e) => return Err(e),
            }
        }
    }

    /// Read `buf.len()` bytes of the array starting at `address`.
    pub fn read_memory<T: Transport>(
        &mut self,
        driver: &mut Driver<T>,
        address: u16,
        buf: &mut [u8],
    ) -> Result<(), Error<T::Error>> {
        self.slave.check_ready()?;
        Self::check_span(address, buf.len(), self.props.max_read_address)?;
        if buf.is_empty() {
            return Ok(());
        }

        driver.control_sequence(Some(self.slave.address()))?;
        driver.write_bytes(&[
            EepromCommand::ReadMemory as u8,
            address as u8,
            (address >> 8) as u8,
        ])?;
        driver.read_bytes(buf)
    }

    /// Write `data` at an arbitrary address, window by window.
    ///
    /// The array is only writable in scratchpad-aligned windows, so
    /// unaligned or partial spans are read first and merged. Each window
    /// waits for the previous window's write cycle at the top of the loop;
    /// the final cycle is left pending and finishes through
    /// [`Eeprom::write_cycle_handler`] or the next operation's wait.
    pub fn write_memory<T: Transport>(
        &mut self,
        driver: &mut Driver<T>,
        clock: &mut impl Clock,
        address: u16,
        data: &[u8],
    ) -> Result<(), Error<T::Error>> {
        if !self.slave.is_enabled() {
            return Err(Error::Disabled);
        }
        Self::check_span(address, data.len(), self.props.max_write_address)?;

        let sp = self.props.scratchpad_size;
        let mut address = address;
        let mut data = data;

        while !data.is_empty() {
            self.wait_idle(driver, clock)?;

            let window = address & !(sp as u16 - 1);
            let offset = (address - window) as usize;
            let chunk = (sp - offset).min(data.len());

            let mut buf = [0u8; MAX_SCRATCHPAD];
            if offset != 0 || chunk != sp {
                // partial window: keep the bytes around the span
                self.read_memory(driver, window, &mut buf[..sp])?;
            }
            buf[offset..offset + chunk].copy_from_slice(&data[..chunk]);

            self.write_scratchpad(driver, window, &buf[..sp])?;
            self.copy_scratchpad(driver, clock)?;

            address += chunk as u16;
            data = &data[chunk..];
        }
        Ok(())
    }
}
