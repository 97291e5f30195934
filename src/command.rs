pub trait OpCode {
    fn op_code(&self) -> u8;
}

/// ROM-level commands understood by every 1-Wire slave.
#[derive(Clone, Copy, Debug)]
#[repr(u8)]
pub enum Command {
    ReadRom = 0x33,
    MatchRom = 0x55,
    SkipRom = 0xCC,
    SearchRom = 0xF0,
    SearchRomAlarmed = 0xEC,
    Resume = 0xA5,
    OverdriveSkipRom = 0x3C,
    OverdriveMatchRom = 0x69,
    ReadPowerSupply = 0xB4,
}

impl OpCode for Command {
    fn op_code(&self) -> u8 {
        *self as _
    }
}

/// Function commands of the EEPROM device type.
#[derive(Clone, Copy, Debug)]
#[repr(u8)]
pub enum EepromCommand {
    WriteScratchpad = 0x0F,
    CopyScratchpad = 0x55,
    ReadScratchpad = 0xAA,
    ReadMemory = 0xF0,
}

impl OpCode for EepromCommand {
    fn op_code(&self) -> u8 {
        *self as _
    }
}

/// Function commands of the temperature-sensor device type.
#[derive(Clone, Copy, Debug)]
#[repr(u8)]
pub enum TempCommand {
    ConvertT = 0x44,
    WriteScratchpad = 0x4E,
    CopyScratchpad = 0x48,
    ReadScratchpad = 0xBE,
    Recall = 0xB8,
}

impl OpCode for TempCommand {
    fn op_code(&self) -> u8 {
        *self as _
    }
}
