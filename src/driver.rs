use crate::{Address, Command, Error, OpCode, SearchState, Transport};

/// Bus master: owns the transport and the ROM search cursor.
///
/// All device layers borrow a `Driver` per transaction, so a single bus can
/// serve any mix of devices. The driver itself is stateless apart from the
/// search cursor; busy-tracking lives in the per-device handles.
pub struct Driver<T: Transport> {
    transport: T,
    pub(crate) search: SearchState,
}

impl<T: Transport> Driver<T> {
    pub fn new(transport: T) -> Self {
        Driver {
            transport,
            search: SearchState::default(),
        }
    }

    /// Give the transport back, e.g. to reuse the pins.
    pub fn release(self) -> T {
        self.transport
    }

    /// Reset the bus and require a presence pulse.
    ///
    /// `Err(NoPresence)` means the bus is electrically fine but nobody
    /// answered; transport faults come back as `Port` or `WireFault`
    /// depending on the backend.
    pub fn reset(&mut self) -> Result<(), Error<T::Error>> {
        if self.transport.reset()? {
            Ok(())
        } else {
            Err(Error::NoPresence)
        }
    }

    /// Reset variant that reports absence as `Ok(false)` instead of an error.
    pub fn reset_presence(&mut self) -> Result<bool, Error<T::Error>> {
        self.transport.reset()
    }

    pub(crate) fn write_bit(&mut self, bit: bool) -> Result<(), Error<T::Error>> {
        self.transport.write_bit(bit)
    }

    pub(crate) fn read_bit(&mut self) -> Result<bool, Error<T::Error>> {
        self.transport.read_bit()
    }

    pub fn write_byte(&mut self, byte: u8) -> Result<(), Error<T::Error>> {
        self.transport.write_byte(byte)
    }

    pub fn read_byte(&mut self) -> Result<u8, Error<T::Error>> {
        self.transport.read_byte()
    }

    pub fn write_bytes(&mut self, bytes: &[u8]) -> Result<(), Error<T::Error>> {
        for byte in bytes {
            self.write_byte(*byte)?;
        }
        Ok(())
    }

    pub fn read_bytes(&mut self, dst: &mut [u8]) -> Result<(), Error<T::Error>> {
        for slot in dst {
            *slot = self.read_byte()?;
        }
        Ok(())
    }

    pub fn write_command(&mut self, cmd: impl OpCode) -> Result<(), Error<T::Error>> {
        self.write_byte(cmd.op_code())
    }

    /// Address every device on the bus at once.
    pub fn skip(&mut self) -> Result<(), Error<T::Error>> {
        self.write_command(Command::SkipRom)
    }

    /// Address a single device by its ROM id.
    pub fn select(&mut self, addr: &Address) -> Result<(), Error<T::Error>> {
        self.write_command(Command::MatchRom)?;
        self.write_bytes(addr.as_ref())
    }

    /// Re-address the device selected by the previous transaction without
    /// retransmitting its ROM id.
    pub fn resume(&mut self) -> Result<(), Error<T::Error>> {
        self.reset()?;
        self.write_command(Command::Resume)
    }

    /// Reset, then select `addr` or skip when broadcasting.
    ///
    /// This is the opening of every function-command transaction.
    pub fn control_sequence(&mut self, addr: Option<&Address>) -> Result<(), Error<T::Error>> {
        self.reset()?;
        match addr {
            Some(addr) => self.select(addr),
            None => self.skip(),
        }
    }

    /// Read the ROM id of the only device on the bus.
    ///
    /// With more than one device present the wired-AND garbles the id, which
    /// the CRC check catches.
    pub fn read_rom(&mut self) -> Result<Address, Error<T::Error>> {
        self.reset()?;
        self.write_command(Command::ReadRom)?;
        let mut addr = Address::default();
        self.read_bytes(addr.as_mut())?;
        if addr.is_valid() {
            Ok(addr)
        } else {
            Err(Error::CrcMismatch)
        }
    }

    /// Whether any addressed device runs on parasite power.
    ///
    /// Parasite-powered devices pull the response slot low, so `true` means
    /// the caller must provide a strong pull-up during conversions and
    /// EEPROM commits.
    pub fn parasite_powered(&mut self, addr: Option<&Address>) -> Result<bool, Error<T::Error>> {
        self.control_sequence(addr)?;
        self.write_command(Command::ReadPowerSupply)?;
        Ok(!self.read_bit()?)
    }

    pub fn set_strong_pullup(&mut self, enable: bool) -> Result<(), Error<T::Error>> {
        self.transport.set_strong_pullup(enable)
    }
}
