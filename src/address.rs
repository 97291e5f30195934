use crate::crc::{check_crc8, crc8_accumulate};
use core::{
    fmt::{Display, Formatter, Result as FmtResult},
    ops::{Deref, DerefMut},
    str::FromStr,
};

/// 8-byte ROM id: family code, 48-bit serial number (LSB first), CRC8.
#[derive(Debug, Clone, Copy, PartialOrd, PartialEq, Eq, Default)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
#[repr(transparent)]
pub struct Address {
    raw: [u8; Self::BYTES as usize],
}

impl From<[u8; Self::BYTES as usize]> for Address {
    fn from(raw: [u8; Self::BYTES as usize]) -> Self {
        Address { raw }
    }
}

impl From<Address> for [u8; Address::BYTES as usize] {
    fn from(addr: Address) -> [u8; Address::BYTES as usize] {
        addr.raw
    }
}

impl Deref for Address {
    type Target = [u8; Self::BYTES as usize];

    fn deref(&self) -> &Self::Target {
        &self.raw
    }
}

impl DerefMut for Address {
    fn deref_mut(&mut self) -> &mut Self::Target {
        &mut self.raw
    }
}

impl AsRef<[u8]> for Address {
    fn as_ref(&self) -> &[u8] {
        self.deref() as _
    }
}

impl AsMut<[u8]> for Address {
    fn as_mut(&mut self) -> &mut [u8] {
        self.deref_mut() as _
    }
}

impl Address {
    /// The length of a ROM id in bytes
    pub const BYTES: u8 = 8;

    /// The length of a ROM id in bits
    pub const BITS: u8 = Self::BYTES * 8;

    pub fn family_code(&self) -> u8 {
        self[0]
    }

    /// 48-bit serial number, bytes 1..=6 in LSB-first significance order.
    pub fn serial_number(&self) -> u64 {
        self[1..7]
            .iter()
            .rev()
            .fold(0u64, |sn, byte| (sn << 8) | *byte as u64)
    }

    pub fn crc8(&self) -> u8 {
        self[7]
    }

    /// Whether the trailing CRC8 matches the first seven bytes. Ids read
    /// off the bus must pass this before being accepted.
    pub fn is_valid(&self) -> bool {
        check_crc8(&self[..7], self[7])
    }

    /// Build an id from family code and serial number, computing the CRC8.
    pub fn new(family_code: u8, serial_number: u64) -> Self {
        let mut addr = Address::default();
        addr[0] = family_code;
        for (i, byte) in addr[1..7].iter_mut().enumerate() {
            *byte = (serial_number >> (8 * i)) as u8;
        }
        addr[7] = crc8_accumulate(0, &addr[..7]);
        addr
    }
}

/// Error type
#[derive(Debug)]
pub enum AddressError {
    NotEnough,
    Invalid,
}

fn hex_to_u8(c: char) -> Option<u8> {
    if c.is_ascii_digit() {
        Some((c as u32 - '0' as u32) as _)
    } else if ('a'..='f').contains(&c) {
        Some((c as u32 - 'a' as u32 + 10) as _)
    } else if ('A'..='F').contains(&c) {
        Some((c as u32 - 'A' as u32 + 10) as _)
    } else {
        None
    }
}

impl FromStr for Address {
    type Err = AddressError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let mut addr = Address::default();
        let mut chars = s.chars().filter(|c| !c.is_whitespace() && *c != ':');

        for i in 0..Self::BYTES as usize {
            match (chars.next(), chars.next()) {
                (Some(h), Some(l)) => match (hex_to_u8(h), hex_to_u8(l)) {
                    (Some(h), Some(l)) => {
                        addr[i] = (h << 4) | l;
                    }
                    _ => return Err(AddressError::Invalid),
                },
                _ => return Err(AddressError::NotEnough),
            }
        }

        Ok(addr)
    }
}

impl Display for Address {
    fn fmt(&self, f: &mut Formatter) -> FmtResult {
        write!(
            f,
            "{:02x}:{:02x}:{:02x}:{:02x}:{:02x}:{:02x}:{:02x}:{:02x}",
            self[0], self[1], self[2], self[3], self[4], self[5], self[6], self[7],
        )
    }
}
