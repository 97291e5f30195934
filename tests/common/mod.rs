//! Bus simulator used by the integration tests.
//!
//! Models a set of slaves behind a shared wired-AND line. ROM-level traffic
//! (reset, match, search, read-rom, power-supply) is emulated at bit
//! granularity so the search arbitration behaves like real silicon; function
//! command payloads are handled at byte granularity through the transport's
//! byte hooks.
#![allow(dead_code)]

use std::{cell::Cell, cell::RefCell, collections::VecDeque, rc::Rc, vec::Vec};

use onewire_master::{
    crc::{crc16_accumulate, crc8_accumulate},
    Address, Clock, Error, Transport,
};

const EEP_SCRATCHPAD: usize = 8;
const EEP_MEM_LEN: usize = 0x90;

pub struct SimDevice {
    pub rom: [u8; 8],
    pub parasite: bool,
    pub alarmed: bool,
    pub has_temp: bool,
    pub has_eeprom: bool,
    pub mem: Vec<u8>,
    pub temp_scratch: [u8; 9],
    pub raw_temp: i16,
    pub corrupt_temp_crc: bool,
    pub corrupt_eep_crc: bool,
    selected: bool,
    resume: bool,
    search_active: bool,
    scratch: Vec<u8>,
    scratch_addr: u16,
    scratch_es: u8,
}

impl SimDevice {
    fn base(rom: Address) -> Self {
        SimDevice {
            rom: *rom,
            parasite: false,
            alarmed: false,
            has_temp: false,
            has_eeprom: false,
            mem: Vec::new(),
            temp_scratch: [0; 9],
            raw_temp: 0,
            corrupt_temp_crc: false,
            corrupt_eep_crc: false,
            selected: false,
            resume: false,
            search_active: false,
            scratch: Vec::new(),
            scratch_addr: 0,
            scratch_es: 0,
        }
    }

    pub fn eeprom(rom: Address) -> Self {
        let mut dev = SimDevice::base(rom);
        dev.has_eeprom = true;
        dev.mem = vec![0; EEP_MEM_LEN];
        dev
    }

    pub fn temp(rom: Address, raw: i16) -> Self {
        let mut dev = SimDevice::base(rom);
        dev.has_temp = true;
        dev.raw_temp = raw;
        dev.refresh_temp_crc();
        dev
    }

    pub fn combo(rom: Address, raw: i16) -> Self {
        let mut dev = SimDevice::temp(rom, raw);
        dev.has_eeprom = true;
        dev.mem = vec![0; EEP_MEM_LEN];
        dev
    }

    pub fn refresh_temp_crc(&mut self) {
        self.temp_scratch[0] = self.raw_temp as u8;
        self.temp_scratch[1] = (self.raw_temp >> 8) as u8;
        self.temp_scratch[8] = crc8_accumulate(0, &self.temp_scratch[..8]);
    }

    fn rom_bit(&self, bit: u8) -> bool {
        self.rom[(bit / 8) as usize] & (1 << (bit % 8)) != 0
    }
}

enum Phase {
    Idle,
    RomCommand,
    MatchRom { index: usize },
    ReadRom { index: usize },
    Search { bit: u8, sub: u8 },
    Function,
    PowerSupply,
    EepWrite { target: usize, got: Vec<u8> },
    EepCopy { target: usize, got: Vec<u8> },
    EepReadAddr { target: usize, got: Vec<u8> },
    TempWrite { target: usize, idx: usize },
    Swallow,
}

pub struct SimState {
    pub devices: Vec<SimDevice>,
    pub strong_pullup: bool,
    pub resets: usize,
    phase: Phase,
    reply: VecDeque<u8>,
    reply_bits: VecDeque<bool>,
}

impl SimState {
    fn selected_target(&self) -> Option<usize> {
        self.devices.iter().position(|d| d.selected)
    }

    fn dispatch_function(&mut self, cmd: u8) {
        let Some(target) = self.selected_target() else {
            self.phase = Phase::Swallow;
            return;
        };

        let dev = &mut self.devices[target];
        self.phase = match cmd {
            0xB4 => Phase::PowerSupply,
            0x0F if dev.has_eeprom => Phase::EepWrite {
                target,
                got: Vec::new(),
            },
            0xAA if dev.has_eeprom => {
                let nb = (dev.scratch_es as usize & (EEP_SCRATCHPAD - 1)) + 1;
                let mut frame = vec![
                    0xAA,
                    dev.scratch_addr as u8,
                    (dev.scratch_addr >> 8) as u8,
                    dev.scratch_es,
                ];
                let mut data = dev.scratch.clone();
                data.resize(nb, 0xFF);
                frame.extend_from_slice(&data);
                let mut crc = !crc16_accumulate(0, &frame);
                if dev.corrupt_eep_crc {
                    crc ^= 0x0001;
                }
                self.reply.extend(&frame[1..]);
                self.reply.push_back(crc as u8);
                self.reply.push_back((crc >> 8) as u8);
                Phase::Swallow
            }
            0x55 if dev.has_eeprom => Phase::EepCopy {
                target,
                got: Vec::new(),
            },
            0xF0 if dev.has_eeprom => Phase::EepReadAddr {
                target,
                got: Vec::new(),
            },
            0x44 if dev.has_temp => {
                dev.refresh_temp_crc();
                Phase::Swallow
            }
            0xBE if dev.has_temp => {
                let mut frame = dev.temp_scratch;
                if dev.corrupt_temp_crc {
                    frame[8] ^= 0x01;
                }
                self.reply.extend(frame.iter());
                Phase::Swallow
            }
            0x4E if dev.has_temp => Phase::TempWrite { target, idx: 2 },
            0x48 if dev.has_temp => Phase::Swallow,
            0xB8 if dev.has_temp => {
                self.reply_bits.push_back(true);
                Phase::Swallow
            }
            _ => Phase::Swallow,
        };
    }

    fn finalize_pending(&mut self) {
        if let Phase::EepWrite { target, got } = &self.phase {
            // the CRC16 echo is transmitted once the master stops sending
            if got.len() >= 2 {
                let target = *target;
                let addr = got[0] as u16 | ((got[1] as u16) << 8);
                let data = got[2..].to_vec();
                let mut crc = crc16_accumulate(0, &[0x0F]);
                crc = crc16_accumulate(crc, got);
                crc = !crc;

                let dev = &mut self.devices[target];
                dev.scratch_addr = addr;
                dev.scratch_es =
                    ((addr as usize + data.len().max(1) - 1) & (EEP_SCRATCHPAD - 1)) as u8;
                dev.scratch = data;

                self.reply.push_back(crc as u8);
                self.reply.push_back((crc >> 8) as u8);
                self.phase = Phase::Swallow;
            }
        }
    }

    fn handle_write_byte(&mut self, byte: u8) {
        match &mut self.phase {
            Phase::RomCommand => match byte {
                0xCC => {
                    for dev in &mut self.devices {
                        dev.selected = true;
                    }
                    self.phase = Phase::Function;
                }
                0x55 => {
                    for dev in &mut self.devices {
                        dev.selected = true;
                    }
                    self.phase = Phase::MatchRom { index: 0 };
                }
                0xF0 | 0xEC => {
                    let alarm = byte == 0xEC;
                    for dev in &mut self.devices {
                        dev.search_active = !alarm || dev.alarmed;
                    }
                    self.phase = Phase::Search { bit: 0, sub: 0 };
                }
                0x33 => {
                    self.phase = Phase::ReadRom { index: 0 };
                }
                0xA5 => {
                    for dev in &mut self.devices {
                        dev.selected = dev.resume;
                    }
                    self.phase = Phase::Function;
                }
                _ => self.phase = Phase::Swallow,
            },
            Phase::MatchRom { index } => {
                let i = *index;
                for dev in &mut self.devices {
                    if dev.selected && dev.rom[i] != byte {
                        dev.selected = false;
                    }
                }
                *index += 1;
                if *index == 8 {
                    for dev in &mut self.devices {
                        dev.resume = dev.selected;
                    }
                    self.phase = Phase::Function;
                }
            }
            Phase::Function => self.dispatch_function(byte),
            Phase::EepWrite { got, .. } => got.push(byte),
            Phase::EepCopy { target, got } => {
                got.push(byte);
                if got.len() == 3 {
                    let target = *target;
                    let addr = got[0] as u16 | ((got[1] as u16) << 8);
                    let es = got[2];
                    let dev = &mut self.devices[target];
                    if addr == dev.scratch_addr && es == dev.scratch_es {
                        let start = addr as usize;
                        let end = (start + dev.scratch.len()).min(dev.mem.len());
                        let scratch = dev.scratch.clone();
                        dev.mem[start..end].copy_from_slice(&scratch[..end - start]);
                    }
                    self.phase = Phase::Swallow;
                }
            }
            Phase::EepReadAddr { target, got } => {
                got.push(byte);
                if got.len() == 2 {
                    let target = *target;
                    let addr = (got[0] as u16 | ((got[1] as u16) << 8)) as usize;
                    let tail = self.devices[target].mem[addr.min(EEP_MEM_LEN)..].to_vec();
                    self.reply.extend(tail.iter());
                    self.phase = Phase::Swallow;
                }
            }
            Phase::TempWrite { target, idx } => {
                if *idx < 8 {
                    let target = *target;
                    let i = *idx;
                    *idx += 1;
                    let dev = &mut self.devices[target];
                    dev.temp_scratch[i] = byte;
                    dev.temp_scratch[8] = crc8_accumulate(0, &dev.temp_scratch[..8]);
                }
            }
            _ => {}
        }
    }

    fn handle_read_bit(&mut self) -> bool {
        match &mut self.phase {
            Phase::Search { bit, sub } => {
                let b = *bit;
                let line = match *sub {
                    // true slot: low if any active device has a 0 here
                    0 => !self
                        .devices
                        .iter()
                        .any(|d| d.search_active && !d.rom_bit(b)),
                    // complement slot
                    _ => !self.devices.iter().any(|d| d.search_active && d.rom_bit(b)),
                };
                *sub += 1;
                line
            }
            Phase::PowerSupply => !self
                .devices
                .iter()
                .any(|d| d.selected && d.parasite),
            _ => self.reply_bits.pop_front().unwrap_or(true),
        }
    }

    fn handle_write_bit(&mut self, value: bool) {
        if let Phase::Search { bit, sub } = &mut self.phase {
            if *sub >= 2 {
                let b = *bit;
                for dev in &mut self.devices {
                    if dev.search_active && dev.rom_bit(b) != value {
                        dev.search_active = false;
                    }
                }
                *sub = 0;
                *bit += 1;
                if *bit == 64 {
                    self.phase = Phase::Idle;
                }
            }
        }
    }
}

/// Cloneable transport handle over the shared bus state.
#[derive(Clone)]
pub struct SimBus {
    state: Rc<RefCell<SimState>>,
}

impl SimBus {
    pub fn new() -> Self {
        SimBus {
            state: Rc::new(RefCell::new(SimState {
                devices: Vec::new(),
                strong_pullup: false,
                resets: 0,
                phase: Phase::Idle,
                reply: VecDeque::new(),
                reply_bits: VecDeque::new(),
            })),
        }
    }

    pub fn add(&self, dev: SimDevice) {
        self.state.borrow_mut().devices.push(dev);
    }

    pub fn with<R>(&self, f: impl FnOnce(&mut SimState) -> R) -> R {
        f(&mut self.state.borrow_mut())
    }

    pub fn resets(&self) -> usize {
        self.state.borrow().resets
    }

    pub fn strong_pullup(&self) -> bool {
        self.state.borrow().strong_pullup
    }
}

impl Transport for SimBus {
    type Error = core::convert::Infallible;

    fn reset(&mut self) -> Result<bool, Error<Self::Error>> {
        let mut state = self.state.borrow_mut();
        state.resets += 1;
        state.reply.clear();
        state.reply_bits.clear();
        for dev in &mut state.devices {
            dev.selected = false;
            dev.search_active = false;
        }
        let presence = !state.devices.is_empty();
        state.phase = if presence {
            Phase::RomCommand
        } else {
            Phase::Idle
        };
        Ok(presence)
    }

    fn write_bit(&mut self, bit: bool) -> Result<(), Error<Self::Error>> {
        self.state.borrow_mut().handle_write_bit(bit);
        Ok(())
    }

    fn read_bit(&mut self) -> Result<bool, Error<Self::Error>> {
        Ok(self.state.borrow_mut().handle_read_bit())
    }

    fn set_strong_pullup(&mut self, enable: bool) -> Result<(), Error<Self::Error>> {
        self.state.borrow_mut().strong_pullup = enable;
        Ok(())
    }

    fn write_byte(&mut self, byte: u8) -> Result<(), Error<Self::Error>> {
        self.state.borrow_mut().handle_write_byte(byte);
        Ok(())
    }

    fn read_byte(&mut self) -> Result<u8, Error<Self::Error>> {
        let mut guard = self.state.borrow_mut();
        let state = &mut *guard;
        if state.reply.is_empty() {
            state.finalize_pending();
        }
        if let Phase::ReadRom { index } = &mut state.phase {
            let i = *index;
            *index = (i + 1).min(7);
            let byte = state.devices.iter().fold(0xFF, |acc, dev| acc & dev.rom[i]);
            return Ok(byte);
        }
        Ok(state.reply.pop_front().unwrap_or(0xFF))
    }
}

/// Manually advanced millisecond clock. `yield_now` steps one millisecond so
/// blocking waits inside the library terminate.
#[derive(Clone)]
pub struct SimClock {
    now: Rc<Cell<u32>>,
}

impl SimClock {
    pub fn new() -> Self {
        SimClock {
            now: Rc::new(Cell::new(0)),
        }
    }

    pub fn advance(&self, ms: u32) {
        self.now.set(self.now.get().wrapping_add(ms));
    }
}

impl Clock for SimClock {
    fn now_ms(&mut self) -> u32 {
        self.now.get()
    }

    fn yield_now(&mut self) {
        self.now.set(self.now.get().wrapping_add(1));
    }
}
