#![no_std]
#![doc = include_str!("../README.md")]

#[cfg(test)]
extern crate std;

mod address;
mod clock;
mod command;
pub mod crc;
mod device;
mod driver;
#[cfg(feature = "ds1825")]
pub mod ds1825;
#[cfg(feature = "ds28e07")]
pub mod ds28e07;
pub mod eeprom;
pub mod gpio;
#[cfg(feature = "max31826")]
pub mod max31826;
mod result;
mod search;
pub mod temp;
mod transport;

pub use address::{Address, AddressError};
pub use clock::Clock;
pub use command::{Command, EepromCommand, OpCode, TempCommand};
pub use device::{Device, Slave};
pub use driver::Driver;
pub use result::Error;
pub use transport::Transport;

pub(crate) use search::SearchState;
