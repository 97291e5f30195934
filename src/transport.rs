use crate::Error;
use core::fmt::Debug;

/// Capability set a physical 1-Wire backend must supply.
///
/// The protocol layers drive the bus exclusively through this trait; how the
/// time slots are produced (GPIO bit-banging, UART emulation, a bridge chip)
/// is the backend's business. Two properties of the electrical layer are
/// load-bearing and must be preserved by every implementation:
///
/// * the line is wired-AND: a `0` written or driven by any device dominates
///   a `1`, which is what the search algorithm's collision detection relies
///   on;
/// * `reset` samples the presence pulse, so `Ok(false)` means an idle but
///   empty bus, not a fault.
///
/// `Error` is the backend's native error; it surfaces to callers wrapped in
/// [`Error::Port`], while bus-level faults use the shared variants directly.
pub trait Transport {
    type Error: Debug;

    /// Drive a reset pulse and sample the presence response.
    fn reset(&mut self) -> Result<bool, Error<Self::Error>>;

    /// Emit one write slot.
    fn write_bit(&mut self, bit: bool) -> Result<(), Error<Self::Error>>;

    /// Emit one read slot and sample the line.
    fn read_bit(&mut self) -> Result<bool, Error<Self::Error>>;

    /// Hold the line in a high-drive state (or release it), powering
    /// parasitic devices through a long operation.
    ///
    /// Backends without a dedicated pull-up transistor may simply drive the
    /// data line high.
    fn set_strong_pullup(&mut self, enable: bool) -> Result<(), Error<Self::Error>>;

    /// Write a byte, LSB first.
    ///
    /// Backends with native byte framing may override this, as long as the
    /// observable slot order is identical.
    fn write_byte(&mut self, byte: u8) -> Result<(), Error<Self::Error>> {
        let mut byte = byte;
        for _ in 0..8 {
            self.write_bit(byte & 0x01 != 0)?;
            byte >>= 1;
        }
        Ok(())
    }

    /// Read a byte, LSB first.
    fn read_byte(&mut self) -> Result<u8, Error<Self::Error>> {
        let mut byte = 0;
        for mask in 0..8 {
            if self.read_bit()? {
                byte |= 1 << mask;
            }
        }
        Ok(byte)
    }
}
