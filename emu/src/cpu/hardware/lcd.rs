//! LCD register file and video memory.
//!
//! Only the surface the execution core consumes lives here: DISPCNT/DISPSTAT/
//! VCOUNT, the palette/VRAM/OAM byte stores, and the per-line bookkeeping the
//! bus drives from scheduler events. Pixel composition belongs to an external
//! renderer.

use serde::{Deserialize, Serialize};

use crate::bitwise::Bits;

/// A dot takes 4 CPU cycles; a line is 240 visible + 68 blanking dots.
pub const HDRAW_CYCLES: u64 = 240 * 4;
/// Full scanline length in cycles.
pub const LINE_CYCLES: u64 = 308 * 4;
/// Total lines per frame, visible and VBlank.
pub const LINES_PER_FRAME: u16 = 228;
/// First VBlank line.
pub const VBLANK_LINE: u16 = 160;

#[derive(Serialize, Deserialize)]
pub struct Lcd {
    pub dispcnt: u16,
    pub green_swap: u16,
    pub dispstat: u16,
    pub vcount: u16,

    /// From 0x05000000, 1 KiB, mirrored through the region.
    pub palette_ram: Vec<u8>,
    /// From 0x06000000, 96 KiB with the 0x18000..0x20000 fold-back mirror.
    pub video_ram: Vec<u8>,
    /// From 0x07000000, 1 KiB, mirrored through the region.
    pub obj_attributes: Vec<u8>,
}

impl Default for Lcd {
    fn default() -> Self {
        Self {
            dispcnt: 0,
            green_swap: 0,
            dispstat: 0,
            vcount: 0,
            palette_ram: vec![0; 0x400],
            video_ram: vec![0; 0x1_8000],
            obj_attributes: vec![0; 0x400],
        }
    }
}

impl Lcd {
    /// VRAM is 96 KiB mirrored in a 128 KiB window: the missing upper
    /// 32 KiB mirror the 0x10000..0x18000 half. The whole window then
    /// repeats through the region.
    #[must_use]
    pub fn vram_index(address: usize) -> usize {
        let offset = address & 0x1_FFFF;
        if offset >= 0x1_8000 {
            offset - 0x8000
        } else {
            offset
        }
    }

    /// Palette RAM and OAM are 1 KiB each, mirrored through their regions.
    #[must_use]
    pub const fn palette_index(address: usize) -> usize {
        address & 0x3FF
    }

    #[must_use]
    pub const fn oam_index(address: usize) -> usize {
        address & 0x3FF
    }

    pub fn set_hblank_flag(&mut self, value: bool) {
        self.dispstat.set_bit(1, value);
    }

    pub fn set_vblank_flag(&mut self, value: bool) {
        self.dispstat.set_bit(0, value);
    }

    pub fn set_vcount_flag(&mut self, value: bool) {
        self.dispstat.set_bit(2, value);
    }

    #[must_use]
    pub fn vblank_irq_enabled(&self) -> bool {
        self.dispstat.get_bit(3)
    }

    #[must_use]
    pub fn hblank_irq_enabled(&self) -> bool {
        self.dispstat.get_bit(4)
    }

    #[must_use]
    pub fn vcount_irq_enabled(&self) -> bool {
        self.dispstat.get_bit(5)
    }

    /// The line compared against VCOUNT for the match flag/interrupt.
    #[must_use]
    pub fn vcount_setting(&self) -> u16 {
        self.dispstat.get_bits(8..=15)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn vram_fold_back_mirror() {
        assert_eq!(Lcd::vram_index(0x0600_0000), 0);
        assert_eq!(Lcd::vram_index(0x0601_7FFF), 0x1_7FFF);
        // 0x18000..0x20000 maps onto 0x10000..0x18000.
        assert_eq!(Lcd::vram_index(0x0601_8000), 0x1_0000);
        assert_eq!(Lcd::vram_index(0x0601_FFFF), 0x1_7FFF);
        // The 128 KiB window repeats.
        assert_eq!(Lcd::vram_index(0x0602_0004), 0x4);
        assert_eq!(Lcd::vram_index(0x06FF_8000), 0x1_0000);
    }

    #[test]
    fn palette_and_oam_mirror_every_1k() {
        assert_eq!(Lcd::palette_index(0x0500_0000), 0);
        assert_eq!(Lcd::palette_index(0x0500_0400), 0);
        assert_eq!(Lcd::palette_index(0x05AB_C123), 0x123);
        assert_eq!(Lcd::oam_index(0x0700_07FE), 0x3FE);
    }

    #[test]
    fn dispstat_gates() {
        let mut lcd = Lcd::default();
        lcd.dispstat = 0b11_1000 | (42 << 8);

        assert!(lcd.vblank_irq_enabled());
        assert!(lcd.hblank_irq_enabled());
        assert!(lcd.vcount_irq_enabled());
        assert_eq!(lcd.vcount_setting(), 42);

        lcd.set_hblank_flag(true);
        assert!(lcd.dispstat.get_bit(1));
        lcd.set_hblank_flag(false);
        assert!(lcd.dispstat.is_bit_off(1));
    }
}
