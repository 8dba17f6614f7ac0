//! Backing store for BIOS, work RAM, cartridge ROM and SRAM.
//!
//! | Region | Address range           | Size    | Notes                        |
//! |--------|-------------------------|---------|------------------------------|
//! | BIOS   | `0x0000_0000-0000_3FFF` | 16 KiB  | read-only                    |
//! | WRAM   | `0x0200_0000-02FF_FFFF` | 256 KiB | mirrored every 0x40000       |
//! | IWRAM  | `0x0300_0000-03FF_FFFF` | 32 KiB  | mirrored every 0x8000        |
//! | ROM    | `0x0800_0000-0DFF_FFFF` | ≤32 MiB | three mirror windows         |
//! | SRAM   | `0x0E00_0000-0FFF_FFFF` | 64 KiB  | persisted save region        |
//!
//! Reads past the end of the loaded ROM return the gamepak open-bus value:
//! the ROM bus is halfword addressed, and an unanswered request leaves the
//! low 16 address bits on the data lines.

use std::collections::HashMap;

use serde::{Deserialize, Serialize};

use crate::bitwise::Bits;

use super::get_unmasked_address;

#[derive(Serialize, Deserialize)]
pub struct InternalMemory {
    /// From 0x00000000 to 0x00003FFF (16 KiB).
    bios_system_rom: Vec<u8>,

    /// From 0x02000000, 256 KiB, mirrored through the region.
    working_ram: Vec<u8>,

    /// From 0x03000000, 32 KiB, mirrored through the region.
    working_iram: Vec<u8>,

    /// Cartridge ROM, mapped three times from 0x08000000.
    pub rom: Vec<u8>,

    /// Cartridge SRAM from 0x0E000000; the only persisted state.
    sram: Vec<u8>,

    /// From 0x00004000 to 0x01FFFFFF and from 0x10000000 up: nothing
    /// decodes these, but written values are remembered so reads stay
    /// consistent.
    unused_region: HashMap<usize, u8>,
}

impl InternalMemory {
    #[must_use]
    pub fn new(bios: [u8; 0x4000], rom: &[u8]) -> Self {
        Self {
            bios_system_rom: bios.to_vec(),
            rom: rom.to_vec(),
            ..Self::default()
        }
    }

    /// The persisted save blob, indexed from cartridge address 0x0E000000.
    #[must_use]
    pub fn sram_data(&self) -> &[u8] {
        &self.sram
    }

    pub fn load_sram_data(&mut self, data: &[u8]) {
        let len = data.len().min(self.sram.len());
        self.sram[..len].copy_from_slice(&data[..len]);
    }

    fn read_rom(&self, offset: usize) -> u8 {
        if offset < self.rom.len() {
            return self.rom[offset];
        }

        // The gamepak bus transfers halfwords; addressing is by halfword
        // (offset >> 1) and an absent ROM leaves those address bits on the
        // data lines. The byte is selected by the address LSB.
        (((offset >> 1) & 0xFFFF) as u16).get_byte((offset & 1) as u8)
    }

    #[must_use]
    pub fn read_at(&self, address: usize) -> u8 {
        match address {
            0x0000_0000..=0x0000_3FFF => self.bios_system_rom[address],
            0x0200_0000..=0x02FF_FFFF => {
                self.working_ram
                    [get_unmasked_address(address, 0x00FF_0000, 0xFF00_FFFF, 16, 4) - 0x0200_0000]
            }
            0x0300_0000..=0x03FF_FFFF => {
                self.working_iram
                    [get_unmasked_address(address, 0x00FF_F000, 0xFF00_0FFF, 12, 8) - 0x0300_0000]
            }
            0x0800_0000..=0x09FF_FFFF => self.read_rom(address - 0x0800_0000),
            0x0A00_0000..=0x0BFF_FFFF => self.read_rom(address - 0x0A00_0000),
            0x0C00_0000..=0x0DFF_FFFF => self.read_rom(address - 0x0C00_0000),
            0x0E00_0000..=0x0FFF_FFFF => self.sram[address & 0xFFFF],
            _ => {
                tracing::debug!("read on unused memory {address:#010X}");
                self.unused_region.get(&address).map_or(0, |v| *v)
            }
        }
    }

    pub fn write_at(&mut self, address: usize, value: u8) {
        match address {
            // BIOS is read-only; some games poke it anyway.
            0x0000_0000..=0x0000_3FFF => {}
            0x0200_0000..=0x02FF_FFFF => {
                self.working_ram
                    [get_unmasked_address(address, 0x00FF_0000, 0xFF00_FFFF, 16, 4) - 0x0200_0000] =
                    value;
            }
            0x0300_0000..=0x03FF_FFFF => {
                self.working_iram
                    [get_unmasked_address(address, 0x00FF_F000, 0xFF00_0FFF, 12, 8) - 0x0300_0000] =
                    value;
            }
            0x0800_0000..=0x0DFF_FFFF => {
                tracing::debug!("attempted write to ROM at {address:#010X}");
            }
            0x0E00_0000..=0x0FFF_FFFF => self.sram[address & 0xFFFF] = value,
            _ => {
                tracing::debug!("write on unused memory {address:#010X} = {value:#04X}");
                self.unused_region.insert(address, value);
            }
        }
    }
}

impl Default for InternalMemory {
    /// Properly sized but empty regions, mainly for tests. Real use goes
    /// through [`InternalMemory::new`] with BIOS and ROM bytes.
    fn default() -> Self {
        Self {
            bios_system_rom: vec![0; 0x4000],
            working_ram: vec![0; 0x4_0000],
            working_iram: vec![0; 0x8000],
            rom: vec![0; 0x0200_0000],
            sram: vec![0; 0x1_0000],
            unused_region: HashMap::new(),
        }
    }
}
