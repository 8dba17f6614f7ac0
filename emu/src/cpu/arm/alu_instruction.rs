//! ALU opcodes and the barrel shifter.
//!
//! Data processing instructions route their second operand through the
//! barrel shifter at no extra cost. The shifter's zero-amount encodings are
//! all special: `LSR #0` means `LSR #32`, `ASR #0` means `ASR #32` and
//! `ROR #0` is RRX (rotate through carry by one).

use serde::{Deserialize, Serialize};

use crate::bitwise::Bits;
use crate::cpu::flags::ShiftKind;

/// The 16 data processing operations, encoded in bits 24-21.
#[derive(Debug, Clone, Copy, Eq, PartialEq, Serialize, Deserialize)]
pub enum ArmModeAluInstruction {
    And = 0x0,
    Eor = 0x1,
    Sub = 0x2,
    Rsb = 0x3,
    Add = 0x4,
    Adc = 0x5,
    Sbc = 0x6,
    Rsc = 0x7,
    Tst = 0x8,
    Teq = 0x9,
    Cmp = 0xA,
    Cmn = 0xB,
    Orr = 0xC,
    Mov = 0xD,
    Bic = 0xE,
    Mvn = 0xF,
}

impl From<u32> for ArmModeAluInstruction {
    fn from(alu_op_code: u32) -> Self {
        match alu_op_code {
            0x0 => Self::And,
            0x1 => Self::Eor,
            0x2 => Self::Sub,
            0x3 => Self::Rsb,
            0x4 => Self::Add,
            0x5 => Self::Adc,
            0x6 => Self::Sbc,
            0x7 => Self::Rsc,
            0x8 => Self::Tst,
            0x9 => Self::Teq,
            0xA => Self::Cmp,
            0xB => Self::Cmn,
            0xC => Self::Orr,
            0xD => Self::Mov,
            0xE => Self::Bic,
            0xF => Self::Mvn,
            _ => unreachable!(),
        }
    }
}

/// How the carry flag is produced: logical operations take it from the
/// barrel shifter, arithmetic ones from the ALU itself.
#[derive(Eq, PartialEq, Debug)]
pub enum AluInstructionKind {
    Logical,
    Arithmetic,
}

pub trait Kind {
    fn kind(&self) -> AluInstructionKind;
}

impl Kind for ArmModeAluInstruction {
    fn kind(&self) -> AluInstructionKind {
        use ArmModeAluInstruction::*;
        match &self {
            And | Eor | Tst | Teq | Orr | Mov | Bic | Mvn => AluInstructionKind::Logical,
            Sub | Rsb | Add | Adc | Sbc | Rsc | Cmp | Cmn => AluInstructionKind::Arithmetic,
        }
    }
}

/// Result of an ALU or shifter operation together with the flags it
/// produces when the S bit asks for them.
#[allow(clippy::struct_excessive_bools)]
#[derive(Debug, Default)]
pub struct ArithmeticOpResult {
    pub result: u32,
    pub carry: bool,
    pub overflow: bool,
    pub sign: bool,
    pub zero: bool,
}

/// Run the barrel shifter.
///
/// `shift_amount` follows the immediate-form conventions: a zero amount
/// selects the special encodings (`LSL` unchanged, `LSR`/`ASR` #32, RRX).
/// Register-form callers must handle their own zero-amount case, which
/// leaves the operand and carry untouched.
///
/// Only `result` and `carry` are meaningful in the returned value.
pub fn shift(kind: ShiftKind, shift_amount: u32, rm: u32, carry: bool) -> ArithmeticOpResult {
    match kind {
        ShiftKind::Lsl => match shift_amount {
            // LSL#0: no shift, carry untouched.
            0 => ArithmeticOpResult {
                result: rm,
                carry,
                ..Default::default()
            },
            // Shift in u64 so an amount of exactly 32 is well defined and
            // bit 32 is the carry-out.
            1..=32 => {
                let wide = u64::from(rm) << shift_amount;
                ArithmeticOpResult {
                    result: wide as u32,
                    carry: wide & (1 << 32) != 0,
                    ..Default::default()
                }
            }
            // Everything is shifted out, including the carry.
            _ => ArithmeticOpResult::default(),
        },
        ShiftKind::Lsr => match shift_amount {
            // LSR#0 encodes LSR#32: zero result, carry = bit 31.
            0 => ArithmeticOpResult {
                result: 0,
                carry: rm.get_bit(31),
                ..Default::default()
            },
            1..=32 => {
                let wide = u64::from(rm) >> (shift_amount - 1);
                ArithmeticOpResult {
                    result: (wide >> 1) as u32,
                    carry: wide & 1 != 0,
                    ..Default::default()
                }
            }
            _ => ArithmeticOpResult::default(),
        },
        ShiftKind::Asr => match shift_amount {
            1..=31 => ArithmeticOpResult {
                result: ((rm as i32) >> shift_amount) as u32,
                carry: rm.get_bit((shift_amount - 1) as u8),
                ..Default::default()
            },
            // ASR#0 encodes ASR#32, and any amount past 31 saturates to
            // the sign bit.
            _ => ArithmeticOpResult {
                result: ((rm as i32) >> 31) as u32,
                carry: rm.get_bit(31),
                ..Default::default()
            },
        },
        ShiftKind::Ror => {
            // ROR by n >= 32 behaves as ROR by n mod 32, with a multiple
            // of 32 meaning ROR#32.
            let mut amount = shift_amount;
            if amount > 32 {
                amount %= 32;
                if amount == 0 {
                    amount = 32;
                }
            }

            match amount {
                // ROR#0 encodes RRX: the carry rotates in from the left.
                0 => ArithmeticOpResult {
                    result: (rm >> 1) | (u32::from(carry) << 31),
                    carry: rm.get_bit(0),
                    ..Default::default()
                },
                1..=31 => ArithmeticOpResult {
                    result: rm.rotate_right(amount),
                    carry: rm.get_bit((amount - 1) as u8),
                    ..Default::default()
                },
                // ROR#32: value unchanged, carry = bit 31.
                32 => ArithmeticOpResult {
                    result: rm,
                    carry: rm.get_bit(31),
                    ..Default::default()
                },
                _ => unreachable!(),
            }
        }
    }
}

/// PSR transfer operations (MRS/MSR).
#[derive(Copy, Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub enum PsrOpKind {
    /// `MRS Rd, CPSR/SPSR`
    Mrs { destination_register: u32 },
    /// `MSR CPSR/SPSR, Rm` — full register write.
    Msr { source_register: u32 },
    /// `MSR CPSR_<fields>, Rm/#imm` — masked field write. Field mask bits:
    /// 3=flags, 2/1=reserved, 0=control.
    MsrFlg {
        operand: AluSecondOperandInfo,
        field_mask: u32,
    },
}

impl TryFrom<u32> for PsrOpKind {
    type Error = String;

    fn try_from(op_code: u32) -> Result<Self, Self::Error> {
        if op_code.get_bits(23..=27) == 0b0_0010
            && op_code.get_bits(16..=21) == 0b00_1111
            && op_code.get_bits(0..=11) == 0
        {
            Ok(Self::Mrs {
                destination_register: op_code.get_bits(12..=15),
            })
        } else if op_code.get_bits(23..=27) == 0b0_0010
            && op_code.get_bits(12..=21) == 0b10_1001_1111
            && op_code.get_bits(4..=11) == 0
        {
            Ok(Self::Msr {
                source_register: op_code.get_bits(0..=3),
            })
        } else if op_code.get_bits(26..=27) == 0b00
            && op_code.get_bits(23..=24) == 0b10
            && op_code.get_bits(20..=21) == 0b10
            && op_code.get_bits(12..=15) == 0b1111
        {
            Ok(Self::MsrFlg {
                operand: if op_code.get_bit(25) {
                    AluSecondOperandInfo::Immediate {
                        base: op_code.get_bits(0..=7),
                        shift: op_code.get_bits(8..=11) * 2,
                    }
                } else {
                    AluSecondOperandInfo::Register {
                        shift_op: ShiftOperator::Immediate(0),
                        shift_kind: ShiftKind::Lsl,
                        register: op_code.get_bits(0..=3),
                    }
                },
                field_mask: op_code.get_bits(16..=19),
            })
        } else {
            Err(format!("invalid PSR operation opcode {op_code:#010X}"))
        }
    }
}

/// Which status register a PSR transfer touches.
#[derive(Copy, Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub enum PsrKind {
    Cpsr,
    Spsr,
}

impl From<bool> for PsrKind {
    fn from(value: bool) -> Self {
        if value {
            Self::Spsr
        } else {
            Self::Cpsr
        }
    }
}

impl std::fmt::Display for PsrKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Cpsr => write!(f, "CPSR"),
            Self::Spsr => write!(f, "SPSR"),
        }
    }
}

/// Where a register operand's shift amount comes from.
#[derive(Clone, Copy, Debug, Eq, PartialEq, Serialize, Deserialize)]
pub enum ShiftOperator {
    Immediate(u32),
    Register(u32),
}

/// The second operand of a data processing instruction: a shifted register
/// or an 8-bit immediate rotated right by an even amount.
#[derive(Clone, Copy, Debug, Eq, PartialEq, Serialize, Deserialize)]
pub enum AluSecondOperandInfo {
    Register {
        shift_op: ShiftOperator,
        shift_kind: ShiftKind,
        register: u32,
    },
    Immediate {
        base: u32,
        shift: u32,
    },
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    #[test]
    fn alu_instruction_kinds() {
        assert_eq!(
            ArmModeAluInstruction::from(0x9).kind(),
            AluInstructionKind::Logical
        );
        assert_eq!(
            ArmModeAluInstruction::from(0x2).kind(),
            AluInstructionKind::Arithmetic
        );
    }

    // Reference values worked out against the ARM7TDMI data sheet for
    // every shift type at the interesting amounts.
    #[test]
    fn lsl_edge_cases() {
        let value = 0x8000_0001;

        let r = shift(ShiftKind::Lsl, 0, value, true);
        assert_eq!((r.result, r.carry), (value, true));
        let r = shift(ShiftKind::Lsl, 0, value, false);
        assert_eq!((r.result, r.carry), (value, false));

        let r = shift(ShiftKind::Lsl, 1, value, false);
        assert_eq!((r.result, r.carry), (2, true));

        let r = shift(ShiftKind::Lsl, 31, value, false);
        assert_eq!((r.result, r.carry), (0x8000_0000, false));

        let r = shift(ShiftKind::Lsl, 32, value, false);
        assert_eq!((r.result, r.carry), (0, true));

        let r = shift(ShiftKind::Lsl, 33, value, true);
        assert_eq!((r.result, r.carry), (0, false));

        let r = shift(ShiftKind::Lsl, 64, value, true);
        assert_eq!((r.result, r.carry), (0, false));
    }

    #[test]
    fn lsr_edge_cases() {
        let value = 0x8000_0001;

        // LSR#0 is the immediate encoding of LSR#32.
        let r = shift(ShiftKind::Lsr, 0, value, false);
        assert_eq!((r.result, r.carry), (0, true));

        let r = shift(ShiftKind::Lsr, 1, value, false);
        assert_eq!((r.result, r.carry), (0x4000_0000, true));

        let r = shift(ShiftKind::Lsr, 31, value, false);
        assert_eq!((r.result, r.carry), (1, false));

        let r = shift(ShiftKind::Lsr, 32, value, false);
        assert_eq!((r.result, r.carry), (0, true));

        let r = shift(ShiftKind::Lsr, 33, value, true);
        assert_eq!((r.result, r.carry), (0, false));

        let r = shift(ShiftKind::Lsr, 64, value, true);
        assert_eq!((r.result, r.carry), (0, false));
    }

    #[test]
    fn asr_edge_cases() {
        let negative = 0x8000_0001;
        let positive = 0x4000_0001;

        // ASR#0 is the immediate encoding of ASR#32.
        let r = shift(ShiftKind::Asr, 0, negative, false);
        assert_eq!((r.result, r.carry), (0xFFFF_FFFF, true));
        let r = shift(ShiftKind::Asr, 0, positive, true);
        assert_eq!((r.result, r.carry), (0, false));

        let r = shift(ShiftKind::Asr, 1, negative, false);
        assert_eq!((r.result, r.carry), (0xC000_0000, true));

        let r = shift(ShiftKind::Asr, 31, negative, false);
        assert_eq!((r.result, r.carry), (0xFFFF_FFFF, false));

        let r = shift(ShiftKind::Asr, 32, negative, false);
        assert_eq!((r.result, r.carry), (0xFFFF_FFFF, true));

        let r = shift(ShiftKind::Asr, 33, negative, false);
        assert_eq!((r.result, r.carry), (0xFFFF_FFFF, true));

        let r = shift(ShiftKind::Asr, 64, positive, true);
        assert_eq!((r.result, r.carry), (0, false));
    }

    #[test]
    fn ror_edge_cases() {
        let value = 0x8000_0001;

        // ROR#0 is RRX: carry rotates in at the top.
        let r = shift(ShiftKind::Ror, 0, value, true);
        assert_eq!((r.result, r.carry), (0xC000_0000, true));
        let r = shift(ShiftKind::Ror, 0, value, false);
        assert_eq!((r.result, r.carry), (0x4000_0000, true));

        let r = shift(ShiftKind::Ror, 1, value, false);
        assert_eq!((r.result, r.carry), (0xC000_0000, true));

        let r = shift(ShiftKind::Ror, 31, value, false);
        assert_eq!((r.result, r.carry), (3, false));

        let r = shift(ShiftKind::Ror, 32, value, false);
        assert_eq!((r.result, r.carry), (value, true));

        // ROR#33 behaves as ROR#1.
        let r = shift(ShiftKind::Ror, 33, value, false);
        assert_eq!((r.result, r.carry), (0xC000_0000, true));

        // ROR#64 behaves as ROR#32.
        let r = shift(ShiftKind::Ror, 64, value, false);
        assert_eq!((r.result, r.carry), (value, true));
    }

    #[test]
    fn psr_op_decoding() {
        // MSR SPSR, R14
        let op = PsrOpKind::try_from(0b1110_00_0_1011_0_1001_1111_0000_0000_1110).unwrap();
        assert_eq!(
            op,
            PsrOpKind::Msr {
                source_register: 14
            }
        );

        // MRS R12, CPSR
        let op = PsrOpKind::try_from(0b1110_00010_0_001111_1100_0000_0000_0000).unwrap();
        assert_eq!(
            op,
            PsrOpKind::Mrs {
                destination_register: 12
            }
        );

        // MSR CPSR_f, #0xF0000000
        let op = PsrOpKind::try_from(0b1110_00_1_10_0_10_1000_1111_0010_1111_0000).unwrap();
        assert_eq!(
            op,
            PsrOpKind::MsrFlg {
                operand: AluSecondOperandInfo::Immediate {
                    base: 0xF0,
                    shift: 4
                },
                field_mask: 0b1000,
            }
        );
    }
}
