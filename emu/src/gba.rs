//! The assembled machine.
//!
//! [`Gba`] owns the CPU, which in turn owns the bus with every hardware
//! block behind it. The embedding frontend drives it through [`Gba::step`]
//! or [`Gba::run_until`] and feeds input with [`Gba::set_button`];
//! everything else happens through memory-mapped hardware.

use crate::bus::Bus;
use crate::cpu::arm7tdmi::Arm7tdmi;
use crate::cpu::hardware::dma::DmaEvent;
use crate::cpu::hardware::internal_memory::InternalMemory;
use crate::cpu::hardware::interrupt_control::Interrupt;
use crate::cpu::hardware::keypad::GbaButton;

pub struct Gba {
    pub cpu: Arm7tdmi,
}

impl Gba {
    #[must_use]
    pub fn new(bios: [u8; 0x4000], cartridge: &[u8]) -> Self {
        Self {
            cpu: Arm7tdmi::new(Bus::with_memory(InternalMemory::new(bios, cartridge))),
        }
    }

    /// Execute one instruction and everything it brings due: scheduler
    /// events, DMA transfers, interrupt sampling.
    pub fn step(&mut self) {
        self.cpu.step();
    }

    /// Step until the machine clock reaches `cycle`.
    pub fn run_until(&mut self, cycle: u64) {
        while self.cpu.bus.scheduler.current_cycle() < cycle {
            self.step();
        }
    }

    /// Set an interrupt request flag. IE/IME decide whether the CPU takes
    /// it at the next instruction boundary.
    pub fn raise_interrupt(&mut self, interrupt: Interrupt) {
        self.cpu.bus.interrupt_control.request(interrupt);
    }

    /// Forward a DMA start condition to the pending channels.
    pub fn trigger_dma(&mut self, event: DmaEvent) {
        self.cpu.bus.dma_trigger(event);
    }

    /// Update one button and raise the keypad interrupt when KEYCNT's
    /// condition is met.
    pub fn set_button(&mut self, button: GbaButton, pressed: bool) {
        self.cpu.bus.keypad.set_button(button, pressed);
        if self.cpu.bus.keypad.interrupt_requested() {
            self.cpu.bus.interrupt_control.request(Interrupt::Keypad);
        }
    }

    /// The cartridge save region, as a raw blob indexed from 0x0E000000.
    #[must_use]
    pub fn save_data(&self) -> &[u8] {
        self.cpu.bus.internal_memory.sram_data()
    }

    pub fn load_save_data(&mut self, data: &[u8]) {
        self.cpu.bus.internal_memory.load_sram_data(data);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::cpu::cpu_modes::Mode;
    use crate::cpu::hardware::lcd;
    use pretty_assertions::assert_eq;

    fn gba() -> Gba {
        // A cartridge full of `MOV R0, R0` keeps the core busy.
        let rom: Vec<u8> = std::iter::repeat(0xE1A0_0000_u32.to_le_bytes())
            .take(0x100)
            .flatten()
            .collect();
        Gba::new([0; 0x4000], &rom)
    }

    #[test]
    fn run_until_advances_the_clock() {
        let mut gba = gba();

        gba.run_until(100);
        assert!(gba.cpu.bus.scheduler.current_cycle() >= 100);
    }

    #[test]
    fn halt_until_vblank_wakes_into_the_irq_handler() {
        let mut gba = gba();
        gba.cpu.bus.write_half_word(0x0400_0200, Interrupt::VBlank.mask());
        gba.cpu.bus.write_half_word(0x0400_0208, 1);
        gba.cpu.bus.lcd.dispstat = 1 << 3;

        // HALTCNT write parks the CPU.
        gba.cpu.bus.write_byte(0x0400_0301, 0);
        gba.step();
        assert!(gba.cpu.halted);

        // The scheduler reaches VBlank and the pending interrupt both
        // wakes the core and vectors it.
        gba.run_until(lcd::LINE_CYCLES * u64::from(lcd::VBLANK_LINE) + 8);

        assert!(!gba.cpu.halted);
        assert_eq!(gba.cpu.cpsr.mode(), Mode::Irq);
        assert!(gba.cpu.cpsr.irq_disable());
    }

    #[test]
    fn raised_interrupts_reach_the_cpu_when_gated() {
        let mut gba = gba();
        gba.cpu.bus.write_half_word(0x0400_0200, Interrupt::Keypad.mask());
        gba.cpu.bus.write_half_word(0x0400_0208, 1);

        gba.raise_interrupt(Interrupt::Keypad);
        gba.step();

        assert_eq!(gba.cpu.cpsr.mode(), Mode::Irq);
    }

    #[test]
    fn keypad_interrupt_condition() {
        let mut gba = gba();
        gba.cpu.bus.keypad.key_interrupt_control = (1 << 14) | GbaButton::Start as u16;

        gba.set_button(GbaButton::A, true);
        assert_eq!(gba.cpu.bus.interrupt_control.interrupt_request, 0);

        gba.set_button(GbaButton::Start, true);
        assert_eq!(
            gba.cpu.bus.interrupt_control.interrupt_request,
            Interrupt::Keypad.mask()
        );
    }

    #[test]
    fn save_data_round_trip() {
        let mut gba = gba();

        gba.cpu.bus.write_byte(0x0E00_0010, 0x5A);
        assert_eq!(gba.save_data()[0x10], 0x5A);

        gba.load_save_data(&[0xAA, 0xBB]);
        assert_eq!(gba.cpu.bus.read_byte(0x0E00_0000), 0xAA);
        assert_eq!(gba.cpu.bus.read_byte(0x0E00_0001), 0xBB);
    }
}
