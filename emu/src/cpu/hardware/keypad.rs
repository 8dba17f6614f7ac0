use serde::{Deserialize, Serialize};

use crate::bitwise::Bits;

/// GBA button bit positions in the KEYINPUT register (pressed bits read 0).
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum GbaButton {
    A = 1 << 0,
    B = 1 << 1,
    Select = 1 << 2,
    Start = 1 << 3,
    Right = 1 << 4,
    Left = 1 << 5,
    Up = 1 << 6,
    Down = 1 << 7,
    R = 1 << 8,
    L = 1 << 9,
}

#[derive(Serialize, Deserialize)]
pub struct Keypad {
    pub key_input: u16,
    pub key_interrupt_control: u16,
}

impl Default for Keypad {
    fn default() -> Self {
        Self::new()
    }
}

impl Keypad {
    /// All 10 buttons released (active-low, bits 0-9 set).
    #[must_use]
    pub const fn new() -> Self {
        Self {
            key_input: 0x03FF,
            key_interrupt_control: 0,
        }
    }

    /// GBA input is active-low: pressing a button clears its bit.
    pub const fn set_button(&mut self, button: GbaButton, pressed: bool) {
        if pressed {
            self.key_input &= !(button as u16);
        } else {
            self.key_input |= button as u16;
        }
    }

    /// KEYCNT gates the keypad interrupt: bits 0-9 select buttons, bit 14
    /// enables the IRQ, bit 15 picks the OR (any selected) or AND (all
    /// selected) condition.
    #[must_use]
    pub fn interrupt_requested(&self) -> bool {
        if self.key_interrupt_control.is_bit_off(14) {
            return false;
        }

        let selected = self.key_interrupt_control & 0x03FF;
        let pressed = !self.key_input & 0x03FF;

        if self.key_interrupt_control.get_bit(15) {
            selected != 0 && pressed & selected == selected
        } else {
            pressed & selected != 0
        }
    }
}
