use once_cell::sync::Lazy;

use crate::bitwise::Bits;

/// In ARM state every instruction carries a condition field in bits 31:28,
/// evaluated against the CPSR flags before execution. Instructions whose
/// condition does not hold are skipped. THUMB only exposes conditions on
/// the conditional-branch format.
#[derive(Debug, Eq, PartialEq, Copy, Clone)]
pub enum Condition {
    /// Z set (equal).
    EQ = 0x0,

    /// Z clear (not equal).
    NE = 0x1,

    /// C set (unsigned higher or same).
    CS = 0x2,

    /// C clear (unsigned lower).
    CC = 0x3,

    /// N set (negative).
    MI = 0x4,

    /// N clear (positive or zero).
    PL = 0x5,

    /// V set (overflow).
    VS = 0x6,

    /// V clear (no overflow).
    VC = 0x7,

    /// C set and Z clear (unsigned higher).
    HI = 0x8,

    /// C clear or Z set (unsigned lower or same).
    LS = 0x9,

    /// N equals V (greater or equal).
    GE = 0xA,

    /// N not equal to V (less than).
    LT = 0xB,

    /// Z clear and N equals V (greater than).
    GT = 0xC,

    /// Z set or N not equal to V (less than or equal).
    LE = 0xD,

    /// Always executed.
    AL = 0xE,

    /// Reserved on ARMv4T, must not be used by code.
    NV = 0xF,
}

/// One 16-bit truth mask per condition code, indexed by the NZCV nibble
/// `(CPSR >> 28) & 0xF`. Built once at startup from [`Condition::holds`].
pub(crate) static CONDITION_LUT: Lazy<[u16; 16]> = Lazy::new(|| {
    let mut lut = [0_u16; 16];
    for (code, mask) in lut.iter_mut().enumerate() {
        let condition = Condition::from(code as u8);
        for nzcv in 0..16_u8 {
            let flags = u16::from(nzcv);
            if condition.holds(
                flags.get_bit(3),
                flags.get_bit(2),
                flags.get_bit(1),
                flags.get_bit(0),
            ) {
                mask.set_bit_on(nzcv);
            }
        }
    }

    lut
});

impl Condition {
    /// Architectural truth value of this condition for the given flags.
    fn holds(self, n: bool, z: bool, c: bool, v: bool) -> bool {
        use Condition::{AL, CC, CS, EQ, GE, GT, HI, LE, LS, LT, MI, NE, NV, PL, VC, VS};
        match self {
            EQ => z,
            NE => !z,
            CS => c,
            CC => !c,
            MI => n,
            PL => !n,
            VS => v,
            VC => !v,
            HI => c && !z,
            LS => !c || z,
            GE => n == v,
            LT => n != v,
            GT => !z && (n == v),
            LE => z || (n != v),
            AL => true,
            NV => false,
        }
    }
}

impl From<u8> for Condition {
    fn from(item: u8) -> Self {
        match item {
            0x0 => Self::EQ,
            0x1 => Self::NE,
            0x2 => Self::CS,
            0x3 => Self::CC,
            0x4 => Self::MI,
            0x5 => Self::PL,
            0x6 => Self::VS,
            0x7 => Self::VC,
            0x8 => Self::HI,
            0x9 => Self::LS,
            0xA => Self::GE,
            0xB => Self::LT,
            0xC => Self::GT,
            0xD => Self::LE,
            0xE => Self::AL,
            0xF => Self::NV,
            _ => unreachable!(),
        }
    }
}

impl std::fmt::Display for Condition {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::EQ => f.write_str("EQ"),
            Self::NE => f.write_str("NE"),
            Self::CS => f.write_str("CS"),
            Self::CC => f.write_str("CC"),
            Self::MI => f.write_str("MI"),
            Self::PL => f.write_str("PL"),
            Self::VS => f.write_str("VS"),
            Self::VC => f.write_str("VC"),
            Self::HI => f.write_str("HI"),
            Self::LS => f.write_str("LS"),
            Self::GE => f.write_str("GE"),
            Self::LT => f.write_str("LT"),
            Self::GT => f.write_str("GT"),
            Self::LE => f.write_str("LE"),
            Self::AL => Ok(()),
            Self::NV => f.write_str("_NEVER"),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    /// The ARM ARM condition table, spelled out independently of
    /// `Condition::holds` so the LUT is checked against a second source.
    fn reference(code: u8, n: bool, z: bool, c: bool, v: bool) -> bool {
        match code {
            0x0 => z,
            0x1 => !z,
            0x2 => c,
            0x3 => !c,
            0x4 => n,
            0x5 => !n,
            0x6 => v,
            0x7 => !v,
            0x8 => c && !z,
            0x9 => !c || z,
            0xA => n == v,
            0xB => n != v,
            0xC => !z && n == v,
            0xD => z || n != v,
            0xE => true,
            0xF => false,
            _ => unreachable!(),
        }
    }

    #[test]
    fn lut_matches_architectural_truth() {
        for code in 0..16_u8 {
            for nzcv in 0..16_u8 {
                let flags = u16::from(nzcv);
                let expected = reference(
                    code,
                    flags.get_bit(3),
                    flags.get_bit(2),
                    flags.get_bit(1),
                    flags.get_bit(0),
                );

                assert_eq!(
                    CONDITION_LUT[code as usize].get_bit(nzcv),
                    expected,
                    "condition {code:#X} with NZCV {nzcv:#06b}"
                );
            }
        }
    }
}
