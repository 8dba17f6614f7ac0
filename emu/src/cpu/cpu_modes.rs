use serde::{Deserialize, Serialize};

/// The CPU operating mode, stored in bits 0-4 of the CPSR/SPSR.
///
/// User is the only unprivileged mode. FIQ, IRQ, Supervisor, Abort and
/// Undefined are entered through exceptions and each carries its own banked
/// R13/R14 (FIQ also banks R8-R12); System is privileged but shares the User
/// bank. See `register_bank` for the storage.
#[derive(Debug, PartialEq, Eq, Clone, Copy, Serialize, Deserialize)]
pub enum Mode {
    /// Normal program execution (unprivileged).
    User = 0b10000,

    /// Fast interrupt handling. Unused on the GBA, which has no FIQ source,
    /// but the bank swap is still architecturally visible.
    Fiq = 0b10001,

    /// Interrupt handling: VBlank, HBlank, timers, DMA, keypad.
    Irq = 0b10010,

    /// Protected mode entered via Reset or SWI (BIOS calls).
    Supervisor = 0b10011,

    /// Entered after a failed instruction fetch or data access.
    Abort = 0b10111,

    /// Entered when an unknown instruction reaches execute.
    Undefined = 0b11011,

    /// Privileged mode sharing the User register bank.
    System = 0b11111,
}

impl From<Mode> for u32 {
    fn from(m: Mode) -> Self {
        m as Self
    }
}

impl TryFrom<u32> for Mode {
    type Error = String;

    fn try_from(n: u32) -> Result<Self, Self::Error> {
        match n {
            0b10000 => Ok(Self::User),
            0b10001 => Ok(Self::Fiq),
            0b10010 => Ok(Self::Irq),
            0b10011 => Ok(Self::Supervisor),
            0b10111 => Ok(Self::Abort),
            0b11011 => Ok(Self::Undefined),
            0b11111 => Ok(Self::System),
            _ => Err(format!("Unexpected value for Mode: {n:#07b}")),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn mode_bits_round_trip() {
        for mode in [
            Mode::User,
            Mode::Fiq,
            Mode::Irq,
            Mode::Supervisor,
            Mode::Abort,
            Mode::Undefined,
            Mode::System,
        ] {
            assert_eq!(Mode::try_from(mode as u32), Ok(mode));
        }
    }

    #[test]
    fn invalid_mode_bits_are_rejected() {
        assert!(Mode::try_from(0).is_err());
        assert!(Mode::try_from(0b10100).is_err());
    }
}
