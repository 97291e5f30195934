//! DS1825: digital thermometer with 4-bit hardware location pins.

use crate::{
    temp::{TempProps, TempSensor},
    Address, Clock, Device, Driver, Error, Slave, Transport,
};

const CONVERSION_TIMES_MS: [u16; 4] = [94, 188, 375, 750];

const PROPS: TempProps = TempProps {
    conv_times_ms: &CONVERSION_TIMES_MS,
    granularity: 0.0625,
    cfg_bytes: 3,
};

/// Conversion resolution, configuration register bits R1:R0.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
#[repr(u8)]
pub enum Resolution {
    Bits9 = 0,
    Bits10 = 1,
    Bits11 = 2,
    Bits12 = 3,
}

pub struct Ds1825 {
    temp: TempSensor,
    location: u8,
}

impl Device for Ds1825 {
    const FAMILY_CODE: u8 = 0x3B;

    fn address(&self) -> &Address {
        self.temp.slave().address()
    }

    fn from_address_unchecked(address: Address) -> Self {
        Ds1825 {
            temp: TempSensor::new(Slave::new(address), PROPS),
            location: 0,
        }
    }
}

impl Ds1825 {
    /// Probe the device and capture its power mode, resolution and the
    /// hardware-strapped location code.
    ///
    /// On failure the device is soft-disabled until the next `init`.
    pub fn init<T: Transport>(&mut self, driver: &mut Driver<T>) -> Result<(), Error<T::Error>> {
        self.temp.slave_mut().set_enabled(true);
        let res = self.probe(driver);
        if res.is_err() {
            self.temp.slave_mut().set_enabled(false);
        }
        res
    }

    fn probe<T: Transport>(&mut self, driver: &mut Driver<T>) -> Result<(), Error<T::Error>> {
        let parasite = driver.parasite_powered(Some(self.temp.slave().address()))?;
        self.temp.slave_mut().set_parasite_powered(parasite);

        self.temp.read_scratchpad(driver)?;
        let cfg = self.temp.scratchpad()[4];
        self.location = cfg & 0x0F;
        self.temp.set_resolution_index(((cfg >> 5) & 0x03) as usize);
        Ok(())
    }

    /// Location code strapped on the AD3..AD0 pins.
    pub fn location(&self) -> u8 {
        self.location
    }

    pub fn resolution(&self) -> Resolution {
        match self.temp.resolution_index() {
            0 => Resolution::Bits9,
            1 => Resolution::Bits10,
            2 => Resolution::Bits11,
            _ => Resolution::Bits12,
        }
    }

    /// Reconfigure the conversion resolution and persist it.
    pub fn set_resolution<T: Transport>(
        &mut self,
        driver: &mut Driver<T>,
        clock: &mut impl Clock,
        resolution: Resolution,
    ) -> Result<(), Error<T::Error>> {
        let cfg = (self.temp.scratchpad()[4] & !0x60) | ((resolution as u8) << 5);
        self.temp.scratchpad_mut()[4] = cfg;
        self.temp.set_resolution_index(resolution as usize);
        self.temp.write_scratchpad(driver, clock)
    }

    /// Program the high/low alarm thresholds (whole degrees Celsius) and
    /// persist them. Devices outside the window answer the alarm search.
    pub fn set_alarm_limits<T: Transport>(
        &mut self,
        driver: &mut Driver<T>,
        clock: &mut impl Clock,
        high: i8,
        low: i8,
    ) -> Result<(), Error<T::Error>> {
        if low > high {
            return Err(Error::Value);
        }
        self.temp.scratchpad_mut()[2] = high as u8;
        self.temp.scratchpad_mut()[3] = low as u8;
        self.temp.write_scratchpad(driver, clock)
    }

    pub fn sensor(&self) -> &TempSensor {
        &self.temp
    }

    pub fn sensor_mut(&mut self) -> &mut TempSensor {
        &mut self.temp
    }

    /// Blocking measurement, in Celsius.
    pub fn measure<T: Transport>(
        &mut self,
        driver: &mut Driver<T>,
        clock: &mut impl Clock,
    ) -> Result<f32, Error<T::Error>> {
        self.temp.convert(driver, clock)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn resolution_selects_conversion_time() {
        assert_eq!(CONVERSION_TIMES_MS[Resolution::Bits9 as usize], 94);
        assert_eq!(CONVERSION_TIMES_MS[Resolution::Bits12 as usize], 750);
    }

    #[test]
    fn granularity_scales_raw_readings() {
        // 0x0191 is 25.0625 degrees at 12-bit resolution
        assert!((0x0191 as f32 * PROPS.granularity - 25.0625).abs() < 1e-6);
        // sign-extended negative reading
        assert!(((0xFE6Fu16 as i16) as f32 * PROPS.granularity + 25.0625).abs() < 1e-6);
    }
}
