//! The 1541's internal 6502 bus: RAM, ROM, and the two VIAs.
//!
//! `0x0000-0x17FF`: 2 KiB RAM, mirrored (the address decoder only looks at
//!   the low 11 bits below `0x1800`, where the VIAs take over).
//! `0x1800-0x1BFF`: VIA-A (serial bus interface), register select is the
//!   low 4 bits of the address, mirrored across the window.
//! `0x1C00-0x1FFF`: VIA-B (disk controller), same mirroring.
//! `0x8000-0x9FFF`: optional 8 KiB RAM expansion, only mapped once enabled.
//! `0xC000-0xFFFF`: 16 KiB ROM; writes are discarded.
//! Everything else floats: a read returns the high byte of the address.

use emu_core::{Bus, ReadResult};
use mos_via_6522::Via6522;

const ROM_BASE: u16 = 0xC000;
const ROM_LEN: usize = 0x4000;
const RAM_EXPANSION_BASE: u16 = 0x8000;
const RAM_EXPANSION_END: u16 = 0x9FFF;
const RAM_EXPANSION_LEN: usize = 0x2000;

pub struct Drive1541Bus {
    ram: [u8; 2048],
    ram_expansion: Option<Box<[u8; RAM_EXPANSION_LEN]>>,
    rom: Vec<u8>,
    pub via_a: Via6522,
    pub via_b: Via6522,
}

impl Drive1541Bus {
    pub fn new(rom: Vec<u8>) -> Result<Self, String> {
        if rom.len() != ROM_LEN {
            return Err(format!(
                "1541 ROM must be {ROM_LEN} bytes, got {}",
                rom.len()
            ));
        }
        Ok(Self {
            ram: [0; 2048],
            ram_expansion: None,
            rom,
            via_a: Via6522::new(),
            via_b: Via6522::new(),
        })
    }

    pub fn enable_ram_expansion(&mut self) {
        self.ram_expansion = Some(Box::new([0; RAM_EXPANSION_LEN]));
    }

    #[must_use]
    pub fn rom(&self) -> &[u8] {
        &self.rom
    }
}

impl Bus for Drive1541Bus {
    fn read(&mut self, address: u16) -> ReadResult {
        let value = match address {
            0x1800..=0x1BFF => self.via_a.read((address & 0x0F) as u8),
            0x1C00..=0x1FFF => self.via_b.read((address & 0x0F) as u8),
            0x0000..=0x17FF => self.ram[(address & 0x07FF) as usize],
            RAM_EXPANSION_BASE..=RAM_EXPANSION_END => match &self.ram_expansion {
                Some(exp) => exp[(address - RAM_EXPANSION_BASE) as usize],
                None => (address >> 8) as u8,
            },
            ROM_BASE..=0xFFFF => self.rom[(address - ROM_BASE) as usize],
            _ => (address >> 8) as u8,
        };
        ReadResult::new(value)
    }

    fn write(&mut self, address: u16, value: u8) {
        match address {
            0x1800..=0x1BFF => self.via_a.write((address & 0x0F) as u8, value),
            0x1C00..=0x1FFF => self.via_b.write((address & 0x0F) as u8, value),
            0x0000..=0x17FF => self.ram[(address & 0x07FF) as usize] = value,
            RAM_EXPANSION_BASE..=RAM_EXPANSION_END => {
                if let Some(exp) = &mut self.ram_expansion {
                    exp[(address - RAM_EXPANSION_BASE) as usize] = value;
                }
            }
            ROM_BASE..=0xFFFF => {}
            _ => {}
        }
    }
}
