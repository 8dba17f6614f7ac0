//! Small decode enums shared by the ARM and THUMB instruction sets.

use crate::bitwise::Bits;
use serde::{Deserialize, Serialize};

/// Whether a data transfer moves a full word or a single byte.
#[derive(Debug, Default, PartialEq, Eq, Clone, Copy)]
pub enum ReadWriteKind {
    /// u32 in ARM state, u16 in THUMB state.
    #[default]
    Word,

    Byte,
}

impl From<bool> for ReadWriteKind {
    fn from(value: bool) -> Self {
        if value {
            Self::Byte
        } else {
            Self::Word
        }
    }
}

#[derive(Debug, PartialEq, Eq, Clone, Copy)]
pub enum LoadStoreKind {
    Store,
    Load,
}

impl From<bool> for LoadStoreKind {
    fn from(b: bool) -> Self {
        match b {
            false => Self::Store,
            true => Self::Load,
        }
    }
}

#[derive(Debug, PartialEq, Eq, Clone, Copy)]
pub enum Indexing {
    /// Add the offset after the transfer.
    Post,

    /// Add the offset before the transfer.
    Pre,
}

impl From<bool> for Indexing {
    fn from(state: bool) -> Self {
        match state {
            false => Self::Post,
            true => Self::Pre,
        }
    }
}

#[derive(Debug, PartialEq, Eq, Clone, Copy)]
pub enum Offsetting {
    /// Subtract the offset from the base.
    Down,

    /// Add the offset to the base.
    Up,
}

impl From<bool> for Offsetting {
    fn from(state: bool) -> Self {
        match state {
            false => Self::Down,
            true => Self::Up,
        }
    }
}

#[derive(Debug, PartialEq, Eq, Clone, Copy)]
pub enum OperandKind {
    Immediate,
    Register,
}

impl From<bool> for OperandKind {
    fn from(b: bool) -> Self {
        match b {
            false => Self::Register,
            true => Self::Immediate,
        }
    }
}

/// The four barrel-shifter operations.
#[derive(Debug, PartialEq, Eq, Clone, Copy, Serialize, Deserialize)]
pub enum ShiftKind {
    Lsl,
    Lsr,
    Asr,
    Ror,
}

impl From<u32> for ShiftKind {
    fn from(value: u32) -> Self {
        match value & 0b11 {
            0b00 => Self::Lsl,
            0b01 => Self::Lsr,
            0b10 => Self::Asr,
            0b11 => Self::Ror,
            _ => unreachable!(),
        }
    }
}

impl From<u16> for ShiftKind {
    fn from(value: u16) -> Self {
        Self::from(value as u32)
    }
}

impl std::fmt::Display for ShiftKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Lsl => f.write_str("LSL"),
            Self::Lsr => f.write_str("LSR"),
            Self::Asr => f.write_str("ASR"),
            Self::Ror => f.write_str("ROR"),
        }
    }
}

/// The operation of the THUMB move/compare/add/subtract-immediate format.
#[derive(Debug, PartialEq, Eq, Clone, Copy)]
pub enum Operation {
    Mov,
    Cmp,
    Add,
    Sub,
}

impl From<u16> for Operation {
    fn from(value: u16) -> Self {
        match value & 0b11 {
            0b00 => Self::Mov,
            0b01 => Self::Cmp,
            0b10 => Self::Add,
            0b11 => Self::Sub,
            _ => unreachable!(),
        }
    }
}

/// Offset source of an ARM halfword/signed data transfer.
#[derive(Debug, PartialEq, Eq, Clone, Copy)]
pub enum HalfwordDataTransferOffsetKind {
    Immediate { offset: u32 },
    Register { register: u32 },
}

impl HalfwordDataTransferOffsetKind {
    /// Bit 22 selects the immediate form; the 8-bit immediate is split
    /// across bits 11-8 and 3-0.
    pub fn from_opcode(op_code: u32) -> Self {
        if op_code.get_bit(22) {
            Self::Immediate {
                offset: (op_code.get_bits(8..=11) << 4) | op_code.get_bits(0..=3),
            }
        } else {
            Self::Register {
                register: op_code.get_bits(0..=3),
            }
        }
    }
}
