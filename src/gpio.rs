//! Bit-banged GPIO transport.
//!
//! Standard-speed slot timings over a single open-drain pin (or an
//! input/output pin pair). The delays are the conservative values from the
//! Dallas application material; a backend is free to tighten them if its
//! bus is short and clean.

use crate::{Error, Transport};
use embedded_hal::{
    delay::DelayNs,
    digital::{Error as PinError, ErrorType, InputPin, OutputPin},
};

/// Pin access used by [`GpioBus`].
///
/// Implemented for `(IO,)` (one bidirectional open-drain pin) and `(I, O)`
/// (separate sense and drive pins, e.g. through a level shifter).
pub trait IoWire {
    type Error: PinError;

    fn is_high(&mut self) -> Result<bool, Self::Error>;

    fn is_low(&mut self) -> Result<bool, Self::Error>;

    /// Drive the line low.
    fn set_low(&mut self) -> Result<(), Self::Error>;

    /// Release the line (or drive it high on a push-pull stage).
    fn set_high(&mut self) -> Result<(), Self::Error>;
}

/// Single line config wrapper
impl<IO> IoWire for (IO,)
where
    IO: ErrorType + OutputPin + InputPin,
{
    type Error = IO::Error;

    fn is_high(&mut self) -> Result<bool, Self::Error> {
        self.0.is_high()
    }

    fn is_low(&mut self) -> Result<bool, Self::Error> {
        self.0.is_low()
    }

    fn set_low(&mut self) -> Result<(), Self::Error> {
        self.0.set_low()
    }

    fn set_high(&mut self) -> Result<(), Self::Error> {
        self.0.set_high()
    }
}

/// Dual line config wrapper
impl<E, I, O> IoWire for (I, O)
where
    E: PinError,
    I: ErrorType<Error = E> + InputPin,
    O: ErrorType<Error = E> + OutputPin,
{
    type Error = E;

    fn is_high(&mut self) -> Result<bool, Self::Error> {
        self.0.is_high()
    }

    fn is_low(&mut self) -> Result<bool, Self::Error> {
        self.0.is_low()
    }

    fn set_low(&mut self) -> Result<(), Self::Error> {
        self.1.set_low()
    }

    fn set_high(&mut self) -> Result<(), Self::Error> {
        self.1.set_high()
    }
}

pub struct GpioBus<W: IoWire, D: DelayNs> {
    wire: W,
    delay: D,
}

impl<W: IoWire, D: DelayNs> GpioBus<W, D> {
    pub fn new(wire: W, delay: D) -> Self {
        GpioBus { wire, delay }
    }

    pub fn release(self) -> (W, D) {
        (self.wire, self.delay)
    }

    /// Wait for the released line to float high.
    ///
    /// A line that never rises is shorted or missing its pull-up resistor.
    fn ensure_wire_high(&mut self) -> Result<(), Error<W::Error>> {
        for _ in 0..125 {
            if self.wire.is_high()? {
                return Ok(());
            }
            self.delay.delay_us(2);
        }
        Err(Error::WireFault)
    }
}

impl<W: IoWire, D: DelayNs> Transport for GpioBus<W, D> {
    type Error = W::Error;

    fn reset(&mut self) -> Result<bool, Error<W::Error>> {
        self.wire.set_high()?;
        self.ensure_wire_high()?;

        self.wire.set_low()?;
        self.delay.delay_us(480);
        self.wire.set_high()?;

        // presence pulse window
        self.delay.delay_us(70);
        let presence = self.wire.is_low()?;
        self.delay.delay_us(410);

        Ok(presence)
    }

    fn write_bit(&mut self, bit: bool) -> Result<(), Error<W::Error>> {
        self.wire.set_low()?;
        self.delay.delay_us(if bit { 10 } else { 65 });
        self.wire.set_high()?;
        self.delay.delay_us(if bit { 55 } else { 5 });
        Ok(())
    }

    fn read_bit(&mut self) -> Result<bool, Error<W::Error>> {
        self.wire.set_low()?;
        self.delay.delay_us(3);
        self.wire.set_high()?;
        self.delay.delay_us(10);
        let bit = self.wire.is_high()?;
        self.delay.delay_us(47);
        Ok(bit)
    }

    fn set_strong_pullup(&mut self, enable: bool) -> Result<(), Error<W::Error>> {
        // the released line already idles high through its pull-up resistor;
        // keeping the pin driven high is what powers parasitic loads
        if enable {
            self.wire.set_high()?;
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use embedded_hal_mock::eh1::{
        delay::NoopDelay,
        digital::{Mock as PinMock, State as PinState, Transaction as PinTransaction},
    };
    use std::vec::Vec;

    #[test]
    fn reset_detects_presence() {
        let pin = PinMock::new(&[
            PinTransaction::set(PinState::High),
            PinTransaction::get(PinState::High),
            PinTransaction::set(PinState::Low),
            PinTransaction::set(PinState::High),
            PinTransaction::get(PinState::Low),
        ]);
        let mut bus = GpioBus::new((pin,), NoopDelay);
        assert!(bus.reset().unwrap());
        let (mut wire, _) = bus.release();
        wire.0.done();
    }

    #[test]
    fn reset_without_devices() {
        let pin = PinMock::new(&[
            PinTransaction::set(PinState::High),
            PinTransaction::get(PinState::High),
            PinTransaction::set(PinState::Low),
            PinTransaction::set(PinState::High),
            PinTransaction::get(PinState::High),
        ]);
        let mut bus = GpioBus::new((pin,), NoopDelay);
        assert!(!bus.reset().unwrap());
        let (mut wire, _) = bus.release();
        wire.0.done();
    }

    #[test]
    fn stuck_line_is_a_wire_fault() {
        let mut expectations = Vec::new();
        expectations.push(PinTransaction::set(PinState::High));
        expectations.extend((0..125).map(|_| PinTransaction::get(PinState::Low)));
        let pin = PinMock::new(&expectations);
        let mut bus = GpioBus::new((pin,), NoopDelay);
        assert_eq!(bus.reset(), Err(Error::WireFault));
        let (mut wire, _) = bus.release();
        wire.0.done();
    }

    #[test]
    fn byte_read_is_lsb_first() {
        // slots answered 1,0,1,0,0,1,0,1 assemble to 0xA5
        let expectations: Vec<_> = [true, false, true, false, false, true, false, true]
            .iter()
            .flat_map(|bit| {
                [
                    PinTransaction::set(PinState::Low),
                    PinTransaction::set(PinState::High),
                    PinTransaction::get(if *bit { PinState::High } else { PinState::Low }),
                ]
            })
            .collect();
        let pin = PinMock::new(&expectations);
        let mut bus = GpioBus::new((pin,), NoopDelay);
        assert_eq!(bus.read_byte().unwrap(), 0xA5);
        let (mut wire, _) = bus.release();
        wire.0.done();
    }

    #[test]
    fn read_bit_samples_after_release() {
        let pin = PinMock::new(&[
            PinTransaction::set(PinState::Low),
            PinTransaction::set(PinState::High),
            PinTransaction::get(PinState::High),
            PinTransaction::set(PinState::Low),
            PinTransaction::set(PinState::High),
            PinTransaction::get(PinState::Low),
        ]);
        let mut bus = GpioBus::new((pin,), NoopDelay);
        assert!(bus.read_bit().unwrap());
        assert!(!bus.read_bit().unwrap());
        let (mut wire, _) = bus.release();
        wire.0.done();
    }
}
