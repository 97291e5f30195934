use crate::{Address, Error};
use core::fmt::Debug;

/// Per-device bookkeeping shared by all protocol layers.
///
/// A slave starts enabled and idle. Layers flip `busy` while a timed
/// operation (conversion, EEPROM commit) is in flight and `enabled` off when
/// initialization fails, after which every operation returns
/// [`Error::Disabled`] until the host re-initializes the device.
#[derive(Debug, Clone, Copy)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub struct Slave {
    address: Address,
    enabled: bool,
    busy: bool,
    parasite_powered: bool,
}

impl Slave {
    pub fn new(address: Address) -> Self {
        Slave {
            address,
            enabled: true,
            busy: false,
            parasite_powered: false,
        }
    }

    pub fn address(&self) -> &Address {
        &self.address
    }

    pub fn is_enabled(&self) -> bool {
        self.enabled
    }

    pub fn is_busy(&self) -> bool {
        self.busy
    }

    pub fn is_parasite_powered(&self) -> bool {
        self.parasite_powered
    }

    pub(crate) fn set_enabled(&mut self, enabled: bool) {
        self.enabled = enabled;
    }

    pub(crate) fn set_busy(&mut self, busy: bool) {
        self.busy = busy;
    }

    pub(crate) fn set_parasite_powered(&mut self, parasite: bool) {
        self.parasite_powered = parasite;
    }

    /// Gate for bus operations: enabled and not mid-operation.
    pub(crate) fn check_ready<E: Debug>(&self) -> Result<(), Error<E>> {
        if !self.enabled {
            return Err(Error::Disabled);
        }
        if self.busy {
            return Err(Error::Busy);
        }
        Ok(())
    }
}

/// Implemented by concrete device drivers bound to one chip family.
pub trait Device {
    const FAMILY_CODE: u8;

    fn address(&self) -> &Address;

    /// Bind to a ROM id, rejecting ids of a different family.
    fn from_address<E: Debug>(address: Address) -> Result<Self, Error<E>>
    where
        Self: Sized,
    {
        if address.family_code() != Self::FAMILY_CODE {
            return Err(Error::FamilyCodeMismatch(
                Self::FAMILY_CODE,
                address.family_code(),
            ));
        }
        Ok(Self::from_address_unchecked(address))
    }

    /// Bind without the family check, for devices strapped to report a
    /// configurable family code.
    fn from_address_unchecked(address: Address) -> Self
    where
        Self: Sized;
}
