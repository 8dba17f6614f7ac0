use serde::{Deserialize, Serialize};

/// Stack Pointer register index.
pub const REG_SP: usize = 0xD;

/// Link Register index (return address for subroutines).
pub const REG_LR: usize = 0xE;

/// Program Counter register index.
pub const REG_PROGRAM_COUNTER: u32 = 0xF;

/// The 16 registers visible in the current mode. Banked copies for the other
/// modes live in `register_bank` and get swapped in on mode changes.
///
/// Because of the 3-stage pipeline, R15 reads ahead of the executing
/// instruction: +8 in ARM state, +4 in THUMB state.
#[derive(Default, Serialize, Deserialize)]
pub struct Registers([u32; 16]);

impl Registers {
    pub fn program_counter(&self) -> usize {
        self.0[15] as usize
    }

    pub const fn set_program_counter(&mut self, new_value: u32) {
        self.0[15] = new_value;
    }

    pub fn set_register_at(&mut self, reg: usize, new_value: u32) {
        assert!(reg <= 15, "Invalid register index: {reg} (0x{reg:X})");
        self.0[reg] = new_value;
    }

    pub const fn register_at(&self, reg: usize) -> u32 {
        self.0[reg]
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn program_counter_is_r15() {
        let mut registers = Registers::default();
        registers.set_program_counter(0x0800_0000);

        assert_eq!(registers.register_at(15), 0x0800_0000);
        assert_eq!(registers.program_counter(), 0x0800_0000);
    }

    #[test]
    #[should_panic]
    fn out_of_range_register_write() {
        let mut registers = Registers::default();
        registers.set_register_at(16, 0);
    }
}
