//! DS28E07: 1024-bit EEPROM, 4 pages of 32 bytes plus an administrative
//! block of protection bytes and two user bytes.
//!
//! The protection bytes are lock-on-write: once a page protection byte
//! holds one of the two sentinel values it can never be rewritten, so the
//! driver refuses to touch a byte that is already locked instead of letting
//! the device silently ignore the write.

use crate::{
    eeprom::{Eeprom, EepromProps},
    Address, Clock, Device, Driver, Error, Slave, Transport,
};

pub const PAGE_SIZE: u16 = 0x20;
pub const PAGE_COUNT: u8 = 4;
pub const MEMORY_SIZE: u16 = PAGE_SIZE * PAGE_COUNT as u16;
pub const USER_BYTES: usize = 2;

const ADMIN_BASE: u16 = 0x80;
const ADMIN_SIZE: usize = 8;

const PROPS: EepromProps = EepromProps {
    scratchpad_size: 8,
    max_write_address: 0x87,
    max_read_address: 0x8F,
    write_cycle_ms: 12,
};

/// Page protection byte values. Any other value leaves the page (and the
/// byte itself) unlocked.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum PageProtection {
    NotSet,
    /// Page is read-only.
    WriteProtect,
    /// Page behaves as EPROM: bits can only be cleared.
    EepromMode,
}

impl PageProtection {
    fn from_byte(byte: u8) -> Self {
        match byte {
            0x55 => PageProtection::WriteProtect,
            0xAA => PageProtection::EepromMode,
            _ => PageProtection::NotSet,
        }
    }

    fn to_byte(self) -> u8 {
        match self {
            PageProtection::NotSet => 0x00,
            PageProtection::WriteProtect => 0x55,
            PageProtection::EepromMode => 0xAA,
        }
    }

    fn is_locked(self) -> bool {
        self != PageProtection::NotSet
    }
}

/// User byte protection values held in the factory byte.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum UserProtection {
    NotSet,
    /// User bytes explicitly writable, factory byte locked.
    Unprotect,
    /// User bytes and factory byte locked.
    Protect,
}

impl UserProtection {
    fn from_byte(byte: u8) -> Self {
        match byte {
            0x55 => UserProtection::Unprotect,
            0xAA => UserProtection::Protect,
            _ => UserProtection::NotSet,
        }
    }

    fn to_byte(self) -> u8 {
        match self {
            UserProtection::NotSet => 0x00,
            UserProtection::Unprotect => 0x55,
            UserProtection::Protect => 0xAA,
        }
    }
}

pub struct Ds28e07 {
    eeprom: Eeprom,
    admin: [u8; ADMIN_SIZE],
}

impl Device for Ds28e07 {
    const FAMILY_CODE: u8 = 0x2D;

    fn address(&self) -> &Address {
        self.eeprom.slave().address()
    }

    fn from_address_unchecked(address: Address) -> Self {
        Ds28e07 {
            eeprom: Eeprom::new(Slave::new(address), PROPS),
            admin: [0; ADMIN_SIZE],
        }
    }
}

impl Ds28e07 {
    /// Probe the device: capture its power mode and cache the
    /// administrative block. Soft-disables the device on failure.
    pub fn init<T: Transport>(&mut self, driver: &mut Driver<T>) -> Result<(), Error<T::Error>> {
        self.eeprom.slave_mut().set_enabled(true);
        let res = self.probe(driver);
        if res.is_err() {
            self.eeprom.slave_mut().set_enabled(false);
        }
        res
    }

    fn probe<T: Transport>(&mut self, driver: &mut Driver<T>) -> Result<(), Error<T::Error>> {
        let parasite = driver.parasite_powered(Some(self.eeprom.slave().address()))?;
        self.eeprom.slave_mut().set_parasite_powered(parasite);
        self.refresh_admin(driver)
    }

    pub fn eeprom(&self) -> &Eeprom {
        &self.eeprom
    }

    pub fn eeprom_mut(&mut self) -> &mut Eeprom {
        &mut self.eeprom
    }

    /// Re-read the administrative block into the cache.
    pub fn refresh_admin<T: Transport>(
        &mut self,
        driver: &mut Driver<T>,
    ) -> Result<(), Error<T::Error>> {
        let mut admin = [0u8; ADMIN_SIZE];
        self.eeprom.read_memory(driver, ADMIN_BASE, &mut admin)?;
        self.admin = admin;
        Ok(())
    }

    /// Cached protection state of one page.
    pub fn page_protection(&self, page: u8) -> Option<PageProtection> {
        if page >= PAGE_COUNT {
            return None;
        }
        Some(PageProtection::from_byte(self.admin[page as usize]))
    }

    pub fn copy_protection(&self) -> bool {
        // either sentinel in the copy byte locks the whole admin block
        matches!(self.admin[4], 0x55 | 0xAA)
    }

    pub fn user_protection(&self) -> UserProtection {
        UserProtection::from_byte(self.admin[5])
    }

    pub fn user_bytes(&self) -> [u8; USER_BYTES] {
        [self.admin[6], self.admin[7]]
    }

    /// Read from the data array.
    pub fn read<T: Transport>(
        &mut self,
        driver: &mut Driver<T>,
        address: u16,
        buf: &mut [u8],
    ) -> Result<(), Error<T::Error>> {
        self.eeprom.read_memory(driver, address, buf)
    }

    /// Write to the data array, refusing spans that touch a protected page.
    pub fn write<T: Transport>(
        &mut self,
        driver: &mut Driver<T>,
        clock: &mut impl Clock,
        address: u16,
        data: &[u8],
    ) -> Result<(), Error<T::Error>> {
        if address >= MEMORY_SIZE {
            return Err(Error::Range);
        }
        if data.len() > (MEMORY_SIZE - address) as usize {
            return Err(Error::Overflow);
        }

        let first_page = (address / PAGE_SIZE) as u8;
        let last_page = ((address + data.len().max(1) as u16 - 1) / PAGE_SIZE) as u8;
        for page in first_page..=last_page {
            if PageProtection::from_byte(self.admin[page as usize]).is_locked() {
                return Err(Error::Protect);
            }
        }

        self.eeprom.write_memory(driver, clock, address, data)
    }

    /// Lock one page. `EepromMode` fills the page with `0xFF` first so the
    /// bit-clearing semantics start from a blank state.
    pub fn protect_page<T: Transport>(
        &mut self,
        driver: &mut Driver<T>,
        clock: &mut impl Clock,
        page: u8,
        protection: PageProtection,
    ) -> Result<(), Error<T::Error>> {
        self.refresh_admin(driver)?;
        if self.copy_protection() {
            return Err(Error::Protect);
        }
        if page >= PAGE_COUNT {
            return Err(Error::Value);
        }
        if PageProtection::from_byte(self.admin[page as usize]).is_locked() {
            return Err(Error::Protect);
        }

        if protection == PageProtection::EepromMode {
            let blank = [0xFF; PAGE_SIZE as usize];
            self.eeprom
                .write_memory(driver, clock, PAGE_SIZE * page as u16, &blank)?;
        }

        self.admin[page as usize] = protection.to_byte();
        self.write_admin(driver, clock)
    }

    /// Lock the administrative block itself. Irreversible on the device.
    pub fn protect_copy<T: Transport>(
        &mut self,
        driver: &mut Driver<T>,
        clock: &mut impl Clock,
    ) -> Result<(), Error<T::Error>> {
        self.refresh_admin(driver)?;
        if self.copy_protection() {
            return Err(Error::Protect);
        }
        self.admin[4] = 0x55;
        self.write_admin(driver, clock)
    }

    /// Set the user byte protection mode.
    pub fn protect_user<T: Transport>(
        &mut self,
        driver: &mut Driver<T>,
        clock: &mut impl Clock,
        protection: UserProtection,
    ) -> Result<(), Error<T::Error>> {
        self.refresh_admin(driver)?;
        if self.copy_protection() || self.user_protection() == UserProtection::Protect {
            return Err(Error::Protect);
        }
        self.admin[5] = protection.to_byte();
        self.write_admin(driver, clock)
    }

    /// Write the two user bytes, subject to copy and user protection.
    pub fn write_user_bytes<T: Transport>(
        &mut self,
        driver: &mut Driver<T>,
        clock: &mut impl Clock,
        user: [u8; USER_BYTES],
    ) -> Result<(), Error<T::Error>> {
        self.refresh_admin(driver)?;
        if self.copy_protection() || self.user_protection() == UserProtection::Protect {
            return Err(Error::Protect);
        }
        self.admin[6] = user[0];
        self.admin[7] = user[1];
        self.write_admin(driver, clock)
    }

    fn write_admin<T: Transport>(
        &mut self,
        driver: &mut Driver<T>,
        clock: &mut impl Clock,
    ) -> Result<(), Error<T::Error>> {
        let admin = self.admin;
        self.eeprom.write_memory(driver, clock, ADMIN_BASE, &admin)
    }
}
