use core::fmt::Debug;

/// Error type
///
/// `Port` wraps whatever the transport backend reports; everything else is
/// raised by the protocol layers themselves.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum Error<E: Sized + Debug> {
    /// Wire stuck low (short circuit or missing pull-up)
    WireFault,
    /// No presence pulse after reset, or a search pass aborted mid-scan
    NoPresence,
    /// ROM or scratchpad checksum mismatch
    CrcMismatch,
    /// Device bound to a driver of another family (expected, found)
    FamilyCodeMismatch(u8, u8),
    /// Peripheral soft-disabled after a failed init
    Disabled,
    /// A conversion or EEPROM commit is in flight on this device
    Busy,
    /// Address outside the device geometry
    Range,
    /// Address + length runs past the end of the device geometry
    Overflow,
    /// Write refused by a protection byte
    Protect,
    /// Caller-supplied parameter out of domain
    Value,
    /// Transport backend error
    Port(E),
}

impl<E: Sized + Debug> From<E> for Error<E> {
    fn from(e: E) -> Self {
        Error::Port(e)
    }
}
