use serde::{Deserialize, Serialize};

use crate::bitwise::Bits;

/// Interrupt sources with their IE/IF bit positions.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Interrupt {
    VBlank = 0,
    HBlank = 1,
    VCount = 2,
    Timer0 = 3,
    Timer1 = 4,
    Timer2 = 5,
    Timer3 = 6,
    Serial = 7,
    Dma0 = 8,
    Dma1 = 9,
    Dma2 = 10,
    Dma3 = 11,
    Keypad = 12,
    Gamepak = 13,
}

impl Interrupt {
    pub const fn timer(id: usize) -> Self {
        match id {
            0 => Self::Timer0,
            1 => Self::Timer1,
            2 => Self::Timer2,
            _ => Self::Timer3,
        }
    }

    pub const fn dma(channel: usize) -> Self {
        match channel {
            0 => Self::Dma0,
            1 => Self::Dma1,
            2 => Self::Dma2,
            _ => Self::Dma3,
        }
    }

    pub const fn mask(self) -> u16 {
        1 << (self as u16)
    }
}

/// IE/IF/IME plus the post-boot and power-down bytes that share the block.
#[derive(Default, Serialize, Deserialize)]
pub struct InterruptControl {
    pub interrupt_enable: u16,
    /// Request flags; software acknowledges by writing 1s.
    pub interrupt_request: u16,
    pub wait_state_control: u16,
    pub interrupt_master_enable: u16,
    pub post_boot_flag: u8,
    pub power_down_control: u8,
    pub internal_memory_control: u32,
    halt_requested: bool,
}

impl InterruptControl {
    /// Raise an interrupt request flag. Whether it reaches the CPU is gated
    /// by IE and IME at the instruction boundary.
    pub fn request(&mut self, interrupt: Interrupt) {
        self.interrupt_request |= interrupt.mask();
    }

    /// Acknowledge request bits (write-1-to-clear semantics of IF).
    pub fn acknowledge(&mut self, bits: u16) {
        self.interrupt_request &= !bits;
    }

    /// An enabled interrupt is pending. This is what wakes a halted CPU,
    /// independent of IME.
    #[must_use]
    pub const fn irq_line(&self) -> bool {
        self.interrupt_enable & self.interrupt_request != 0
    }

    /// The IRQ line is asserted and the master enable lets it through.
    #[must_use]
    pub fn pending(&self) -> bool {
        self.irq_line() && self.interrupt_master_enable.get_bit(0)
    }

    /// A HALTCNT write parks the CPU until the next interrupt.
    pub fn request_halt(&mut self) {
        self.halt_requested = true;
    }

    pub fn take_halt_request(&mut self) -> bool {
        std::mem::take(&mut self.halt_requested)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn gating_by_enable_and_master() {
        let mut control = InterruptControl::default();

        control.request(Interrupt::VBlank);
        assert!(!control.irq_line());
        assert!(!control.pending());

        control.interrupt_enable = Interrupt::VBlank.mask();
        assert!(control.irq_line());
        assert!(!control.pending());

        control.interrupt_master_enable = 1;
        assert!(control.pending());
    }

    #[test]
    fn write_one_to_clear() {
        let mut control = InterruptControl::default();
        control.request(Interrupt::Timer0);
        control.request(Interrupt::Dma3);

        control.acknowledge(Interrupt::Timer0.mask());
        assert_eq!(control.interrupt_request, Interrupt::Dma3.mask());
    }

    #[test]
    fn halt_request_is_consumed_once() {
        let mut control = InterruptControl::default();
        control.request_halt();
        assert!(control.take_halt_request());
        assert!(!control.take_halt_request());
    }
}
