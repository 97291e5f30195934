//! Binary-tree enumeration of ROM ids.
//!
//! One search pass walks all 64 id bits, reading each bit and its complement
//! from the wired-AND bus and writing back the branch taken. The cursor
//! remembers the last branch point so successive passes visit every device
//! exactly once. Scheme per Maxim application note 187.

use crate::{crc::crc8_accumulate, Address, Command, Driver, Error, Transport};

/// Search cursor carried between passes.
#[derive(Debug, Clone, Copy, Default)]
pub(crate) struct SearchState {
    rom: [u8; Address::BYTES as usize],
    last_discrepancy: u8,
    last_family_discrepancy: u8,
    last_device: bool,
}

impl SearchState {
    fn reset(&mut self) {
        *self = SearchState::default();
    }
}

impl<T: Transport> Driver<T> {
    /// Restart enumeration from the beginning and return the first device.
    pub fn search_first(&mut self) -> Result<Option<Address>, Error<T::Error>> {
        self.search.reset();
        self.search_pass(Command::SearchRom)
    }

    /// Continue the current enumeration.
    pub fn search_next(&mut self) -> Result<Option<Address>, Error<T::Error>> {
        self.search_pass(Command::SearchRom)
    }

    /// Restart enumeration over devices in alarm state only.
    pub fn search_first_alarmed(&mut self) -> Result<Option<Address>, Error<T::Error>> {
        self.search.reset();
        self.search_pass(Command::SearchRomAlarmed)
    }

    pub fn search_next_alarmed(&mut self) -> Result<Option<Address>, Error<T::Error>> {
        self.search_pass(Command::SearchRomAlarmed)
    }

    /// Enumerate the whole bus into `found`, returning the device count.
    ///
    /// Stops early when the slice fills up; check [`Driver::search_exhausted`]
    /// to tell a full scan from a truncated one.
    pub fn search_all(&mut self, found: &mut [Address]) -> Result<usize, Error<T::Error>> {
        let mut count = 0;
        while count < found.len() {
            match if count == 0 {
                self.search_first()?
            } else {
                self.search_next()?
            } {
                Some(addr) => {
                    found[count] = addr;
                    count += 1;
                }
                None => break,
            }
        }
        Ok(count)
    }

    /// Whether the previous pass reached the last device on the bus.
    pub fn search_exhausted(&self) -> bool {
        self.search.last_device
    }

    /// Direct the next [`Driver::search_next`] at devices of one family.
    ///
    /// The pass returns the first device of that family, or a device of a
    /// different family if none exists; the caller checks the family code.
    pub fn target_setup(&mut self, family_code: u8) {
        self.search.rom = [family_code, 0, 0, 0, 0, 0, 0, 0];
        self.search.last_discrepancy = Address::BITS;
        self.search.last_family_discrepancy = 0;
        self.search.last_device = false;
    }

    /// Skip the rest of the family the last found device belongs to.
    pub fn family_skip_setup(&mut self) {
        self.search.last_discrepancy = self.search.last_family_discrepancy;
        self.search.last_family_discrepancy = 0;
        // if there were no discrepancies outside the family byte, we are done
        if self.search.last_discrepancy == 0 {
            self.search.last_device = true;
        }
    }

    /// Check that the device with this ROM id is present and responding.
    ///
    /// Runs one targeted search pass without disturbing the enumeration
    /// cursor. An empty or aborted pass reads as absence, not an error.
    pub fn verify(&mut self, addr: &Address) -> Result<bool, Error<T::Error>> {
        let backup = self.search;

        self.search.rom = **addr;
        self.search.last_discrepancy = Address::BITS;
        self.search.last_family_discrepancy = 0;
        self.search.last_device = false;

        let present = match self.search_pass(Command::SearchRom) {
            Ok(Some(found)) => found == *addr,
            Ok(None) | Err(Error::NoPresence) => false,
            Err(e) => {
                self.search = backup;
                return Err(e);
            }
        };

        self.search = backup;
        Ok(present)
    }

    fn search_pass(&mut self, cmd: Command) -> Result<Option<Address>, Error<T::Error>> {
        if self.search.last_device {
            // drop the cursor but keep the flag, so a finished scan stays
            // observable until the next search_first
            self.search.rom = [0; Address::BYTES as usize];
            self.search.last_discrepancy = 0;
            self.search.last_family_discrepancy = 0;
            return Ok(None);
        }

        let found = self.search_bits(cmd);
        if found.is_err() {
            // an aborted pass must not leave a half-written prefix to replay
            self.search.reset();
        }
        found
    }

    fn search_bits(&mut self, cmd: Command) -> Result<Option<Address>, Error<T::Error>> {
        self.reset()?;
        self.write_command(cmd)?;

        let mut id_bit_number: u8 = 1;
        let mut last_zero: u8 = 0;
        let mut rom_byte: usize = 0;
        let mut rom_mask: u8 = 0x01;
        let mut crc: u8 = 0;

        while rom_byte < Address::BYTES as usize {
            let id_bit = self.read_bit()?;
            let cmp_id_bit = self.read_bit()?;

            // both slots read 1: every participant dropped out
            if id_bit && cmp_id_bit {
                return Err(Error::NoPresence);
            }

            let direction = if id_bit != cmp_id_bit {
                // all remaining devices agree on this bit
                id_bit
            } else {
                let dir = if id_bit_number < self.search.last_discrepancy {
                    // before the branch point: retrace the previous path
                    self.search.rom[rom_byte] & rom_mask != 0
                } else {
                    // at the branch point take 1, past it take 0
                    id_bit_number == self.search.last_discrepancy
                };
                if !dir {
                    last_zero = id_bit_number;
                    if last_zero < 9 {
                        self.search.last_family_discrepancy = last_zero;
                    }
                }
                dir
            };

            if direction {
                self.search.rom[rom_byte] |= rom_mask;
            } else {
                self.search.rom[rom_byte] &= !rom_mask;
            }
            self.write_bit(direction)?;

            id_bit_number += 1;
            rom_mask <<= 1;
            if rom_mask == 0 {
                crc = crc8_accumulate(crc, &self.search.rom[rom_byte..=rom_byte]);
                rom_byte += 1;
                rom_mask = 0x01;
            }
        }

        // CRC over all 8 bytes of a valid id folds to zero
        if crc != 0 {
            return Err(Error::CrcMismatch);
        }
        if self.search.rom[0] == 0 {
            self.search.reset();
            return Ok(None);
        }

        self.search.last_discrepancy = last_zero;
        if last_zero == 0 {
            self.search.last_device = true;
        }
        Ok(Some(Address::from(self.search.rom)))
    }
}
