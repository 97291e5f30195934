//! Dallas/Maxim checksum primitives.
//!
//! Both routines are bit-serial, LSB first, and take the running value as an
//! argument so a checksum can be chained across several buffers (command
//! header, address, payload) before the check byte arrives off the wire.
//! The scheme is described in Maxim application note 27.

/// Accumulate the Dallas CRC8 (polynomial feedback `0x8C`) over `data`.
///
/// Seed with `0` for a fresh computation.
pub fn crc8_accumulate(crc: u8, data: &[u8]) -> u8 {
    let mut crc = crc;
    for byte in data {
        let mut byte = *byte;
        for _ in 0..8 {
            let mix = (crc ^ byte) & 0x01;
            crc >>= 1;
            if mix != 0x00 {
                crc ^= 0x8C;
            }
            byte >>= 1;
        }
    }
    crc
}

/// Accumulate the Dallas CRC16 (polynomial feedback `0xA001`) over `data`.
pub fn crc16_accumulate(crc: u16, data: &[u8]) -> u16 {
    let mut crc = crc;
    for byte in data {
        let mut byte = *byte;
        for _ in 0..8 {
            let mix = ((crc as u8) ^ byte) & 0x01;
            crc >>= 1;
            if mix != 0x00 {
                crc ^= 0xA001;
            }
            byte >>= 1;
        }
    }
    crc
}

/// Check `data` against a trailing CRC8 byte.
pub fn check_crc8(data: &[u8], crc8: u8) -> bool {
    crc8_accumulate(0, data) == crc8
}

/// Check `data` against an *inverted* CRC16, as transmitted on the wire
/// after scratchpad transfers.
pub fn check_crc16(data: &[u8], icrc16: u16) -> bool {
    !crc16_accumulate(0, data) == icrc16
}
