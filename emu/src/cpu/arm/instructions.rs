use logger::log;

use crate::bitwise::Bits;
use crate::cpu::arm::alu_instruction::{
    AluSecondOperandInfo, ArmModeAluInstruction, PsrKind, PsrOpKind, ShiftOperator,
};
use crate::cpu::arm::lookup::{arm_lookup_index, ArmInstructionClass, ARM_LOOKUP_TABLE};
use crate::cpu::arm7tdmi::HalfwordTransferKind;
use crate::cpu::condition::Condition;
use crate::cpu::flags::{
    HalfwordDataTransferOffsetKind, Indexing, LoadStoreKind, Offsetting, OperandKind,
    ReadWriteKind, ShiftKind,
};

/// Load or store side of a single data transfer.
#[derive(Debug, Eq, PartialEq, Copy, Clone)]
pub enum SingleDataTransferKind {
    Ldr,
    Str,
}

impl From<u32> for SingleDataTransferKind {
    fn from(op_code: u32) -> Self {
        if op_code.get_bit(20) {
            Self::Ldr
        } else {
            Self::Str
        }
    }
}

/// Offset of a single data transfer: a 12-bit immediate or a register with
/// an immediate shift.
#[derive(Clone, Copy, Debug, Eq, PartialEq)]
pub enum SingleDataTransferOffsetInfo {
    Immediate {
        offset: u32,
    },
    RegisterImmediate {
        shift_amount: u32,
        shift_kind: ShiftKind,
        reg_offset: u32,
    },
}

#[derive(Debug, Copy, Clone, PartialEq, Eq)]
pub enum ArmModeMultiplyVariant {
    Mul,
    Mla,
}

impl From<u32> for ArmModeMultiplyVariant {
    fn from(op_code: u32) -> Self {
        match op_code.get_bits(21..=24) {
            0b0000 => Self::Mul,
            0b0001 => Self::Mla,
            _ => unreachable!(),
        }
    }
}

#[derive(Debug, Copy, Clone, PartialEq, Eq)]
pub enum ArmModeMultiplyLongVariant {
    Umull,
    Umlal,
    Smull,
    Smlal,
}

impl From<u32> for ArmModeMultiplyLongVariant {
    fn from(op_code: u32) -> Self {
        match op_code.get_bits(21..=24) {
            0b0100 => Self::Umull,
            0b0101 => Self::Umlal,
            0b0110 => Self::Smull,
            0b0111 => Self::Smlal,
            _ => unreachable!(),
        }
    }
}

#[derive(Debug, PartialEq, Eq, Copy, Clone)]
pub enum ArmModeInstruction {
    DataProcessing {
        condition: Condition,
        alu_instruction: ArmModeAluInstruction,
        set_conditions: bool,
        op_kind: OperandKind,
        rn: u32,
        destination: u32,
        op2: AluSecondOperandInfo,
    },
    Multiply {
        variant: ArmModeMultiplyVariant,
        condition: Condition,
        should_set_codes: bool,
        rd_destination_register: u32,
        rn_accumulate_register: u32,
        rs_operand_register: u32,
        rm_operand_register: u32,
    },
    MultiplyLong {
        variant: ArmModeMultiplyLongVariant,
        condition: Condition,
        should_set_codes: bool,
        rdhi_destination_register: u32,
        rdlo_destination_register: u32,
        rs_operand_register: u32,
        rm_operand_register: u32,
    },
    PSRTransfer {
        condition: Condition,
        psr_kind: PsrKind,
        kind: PsrOpKind,
    },
    SingleDataSwap {
        condition: Condition,
        quantity: ReadWriteKind,
        base_register: u32,
        destination_register: u32,
        source_register: u32,
    },
    BranchAndExchange {
        condition: Condition,
        register: usize,
    },
    HalfwordDataTransfer {
        condition: Condition,
        indexing: Indexing,
        offsetting: Offsetting,
        write_back: bool,
        load_store_kind: LoadStoreKind,
        offset_kind: HalfwordDataTransferOffsetKind,
        base_register: u32,
        source_destination_register: u32,
        transfer_kind: HalfwordTransferKind,
    },
    SingleDataTransfer {
        condition: Condition,
        kind: SingleDataTransferKind,
        quantity: ReadWriteKind,
        write_back: bool,
        indexing: Indexing,
        rd: u32,
        base_register: u32,
        offset_info: SingleDataTransferOffsetInfo,
        offsetting: Offsetting,
    },
    BlockDataTransfer {
        condition: Condition,
        indexing: Indexing,
        offsetting: Offsetting,
        load_psr: bool,
        write_back: bool,
        load_store: LoadStoreKind,
        rn: u32,
        register_list: u32,
    },
    Branch {
        condition: Condition,
        link: bool,
        offset: u32,
    },
    SoftwareInterrupt {
        condition: Condition,
        comment: u32,
    },
    Undefined,
}

impl From<u32> for ArmModeInstruction {
    fn from(op_code: u32) -> Self {
        use ArmModeInstruction::*;

        let condition = Condition::from(op_code.get_bits(28..=31) as u8);

        match ARM_LOOKUP_TABLE[arm_lookup_index(op_code)] {
            ArmInstructionClass::BranchAndExchange => BranchAndExchange {
                condition,
                register: op_code.get_bits(0..=3) as usize,
            },
            ArmInstructionClass::SingleDataSwap => SingleDataSwap {
                condition,
                quantity: op_code.get_bit(22).into(),
                base_register: op_code.get_bits(16..=19),
                destination_register: op_code.get_bits(12..=15),
                source_register: op_code.get_bits(0..=3),
            },
            ArmInstructionClass::MultiplyLong => MultiplyLong {
                variant: ArmModeMultiplyLongVariant::from(op_code),
                condition,
                should_set_codes: op_code.get_bit(20),
                rdhi_destination_register: op_code.get_bits(16..=19),
                rdlo_destination_register: op_code.get_bits(12..=15),
                rs_operand_register: op_code.get_bits(8..=11),
                rm_operand_register: op_code.get_bits(0..=3),
            },
            ArmInstructionClass::Multiply => Multiply {
                variant: ArmModeMultiplyVariant::from(op_code),
                condition,
                should_set_codes: op_code.get_bit(20),
                rd_destination_register: op_code.get_bits(16..=19),
                rn_accumulate_register: op_code.get_bits(12..=15),
                rs_operand_register: op_code.get_bits(8..=11),
                rm_operand_register: op_code.get_bits(0..=3),
            },
            ArmInstructionClass::HalfwordDataTransfer => HalfwordDataTransfer {
                condition,
                indexing: op_code.get_bit(24).into(),
                offsetting: op_code.get_bit(23).into(),
                write_back: op_code.get_bit(21),
                load_store_kind: op_code.get_bit(20).into(),
                offset_kind: HalfwordDataTransferOffsetKind::from_opcode(op_code),
                base_register: op_code.get_bits(16..=19),
                source_destination_register: op_code.get_bits(12..=15),
                transfer_kind: (op_code.get_bits(5..=6) as u8).into(),
            },
            ArmInstructionClass::SoftwareInterrupt => SoftwareInterrupt {
                condition,
                comment: op_code.get_bits(0..=23),
            },
            ArmInstructionClass::BlockDataTransfer => BlockDataTransfer {
                condition,
                indexing: op_code.get_bit(24).into(),
                offsetting: op_code.get_bit(23).into(),
                load_psr: op_code.get_bit(22),
                write_back: op_code.get_bit(21),
                load_store: op_code.get_bit(20).into(),
                rn: op_code.get_bits(16..=19),
                register_list: op_code.get_bits(0..=15),
            },
            ArmInstructionClass::Branch => Branch {
                condition,
                link: op_code.get_bit(24),
                offset: op_code.get_bits(0..=23) << 2,
            },
            ArmInstructionClass::SingleDataTransfer => {
                // The I bit is inverted here compared to data processing:
                // set means register offset.
                let op_kind: OperandKind = (!op_code.get_bit(25)).into();

                let offset_info = match op_kind {
                    OperandKind::Immediate => SingleDataTransferOffsetInfo::Immediate {
                        offset: op_code.get_bits(0..=11),
                    },
                    OperandKind::Register => SingleDataTransferOffsetInfo::RegisterImmediate {
                        shift_amount: op_code.get_bits(7..=11),
                        shift_kind: op_code.get_bits(5..=6).into(),
                        reg_offset: op_code.get_bits(0..=3),
                    },
                };

                SingleDataTransfer {
                    condition,
                    kind: op_code.into(),
                    quantity: op_code.get_bit(22).into(),
                    write_back: op_code.get_bit(21),
                    indexing: op_code.get_bit(24).into(),
                    rd: op_code.get_bits(12..=15),
                    base_register: op_code.get_bits(16..=19),
                    offset_info,
                    offsetting: op_code.get_bit(23).into(),
                }
            }
            ArmInstructionClass::PsrTransfer => {
                PsrOpKind::try_from(op_code).map_or_else(
                    |err| {
                        log(format!("undefined PSR transfer encoding: {err}"));
                        Undefined
                    },
                    |kind| PSRTransfer {
                        condition,
                        psr_kind: PsrKind::from(op_code.get_bit(22)),
                        kind,
                    },
                )
            }
            ArmInstructionClass::DataProcessing => {
                let op_kind: OperandKind = op_code.get_bit(25).into();

                let op2 = match op_kind {
                    OperandKind::Immediate => AluSecondOperandInfo::Immediate {
                        base: op_code.get_bits(0..=7),
                        shift: op_code.get_bits(8..=11) * 2,
                    },
                    OperandKind::Register => {
                        let shift_op = if op_code.get_bit(4) {
                            ShiftOperator::Register(op_code.get_bits(8..=11))
                        } else {
                            ShiftOperator::Immediate(op_code.get_bits(7..=11))
                        };
                        AluSecondOperandInfo::Register {
                            shift_op,
                            shift_kind: op_code.get_bits(5..=6).into(),
                            register: op_code.get_bits(0..=3),
                        }
                    }
                };

                DataProcessing {
                    condition,
                    alu_instruction: op_code.get_bits(21..=24).into(),
                    set_conditions: op_code.get_bit(20),
                    op_kind,
                    rn: op_code.get_bits(16..=19),
                    destination: op_code.get_bits(12..=15),
                    op2,
                }
            }
            ArmInstructionClass::Undefined => {
                log(format!("undefined ARM instruction {op_code:#010X}"));
                Undefined
            }
        }
    }
}

impl std::fmt::Display for ArmModeInstruction {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{self:?}")
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    #[test]
    fn decode_branch() {
        let output = ArmModeInstruction::from(0b1110_1011_0000_0000_0000_0000_0111_1111);
        assert_eq!(
            ArmModeInstruction::Branch {
                condition: Condition::AL,
                link: true,
                offset: 508,
            },
            output
        );

        let output = ArmModeInstruction::from(0b0000_1010_0000_0000_0000_0000_0111_1111);
        assert_eq!(
            ArmModeInstruction::Branch {
                condition: Condition::EQ,
                link: false,
                offset: 508,
            },
            output
        );
    }

    #[test]
    fn decode_branch_and_exchange() {
        let output = ArmModeInstruction::from(0b1110_0001_0010_1111_1111_1111_0001_0001);
        assert_eq!(
            ArmModeInstruction::BranchAndExchange {
                condition: Condition::AL,
                register: 1
            },
            output
        );
    }

    #[test]
    fn decode_psr_transfer() {
        let output = ArmModeInstruction::from(0b1110_00_0_1011_0_1001_1111_0000_0000_1110);
        assert_eq!(
            ArmModeInstruction::PSRTransfer {
                condition: Condition::AL,
                psr_kind: PsrKind::Spsr,
                kind: PsrOpKind::Msr {
                    source_register: 14
                },
            },
            output
        );
    }

    #[test]
    fn decode_half_word_data_transfer() {
        let output = ArmModeInstruction::from(0b1110_0001_1100_0001_0000_0000_1011_0000);
        assert_eq!(
            ArmModeInstruction::HalfwordDataTransfer {
                condition: Condition::AL,
                indexing: Indexing::Pre,
                offsetting: Offsetting::Up,
                write_back: false,
                load_store_kind: LoadStoreKind::Store,
                offset_kind: HalfwordDataTransferOffsetKind::Immediate { offset: 0 },
                base_register: 1,
                source_destination_register: 0,
                transfer_kind: HalfwordTransferKind::UnsignedHalfwords,
            },
            output
        );
    }

    #[test]
    fn decode_single_data_swap() {
        let output = ArmModeInstruction::from(0xE102_0091);
        assert_eq!(
            ArmModeInstruction::SingleDataSwap {
                condition: Condition::AL,
                quantity: ReadWriteKind::Word,
                base_register: 2,
                destination_register: 0,
                source_register: 1,
            },
            output
        );
    }

    #[test]
    fn decode_data_processing_with_register_shift() {
        let output = ArmModeInstruction::from(0xE1A0_1251); // MOV R1, R1, ASR R2
        assert_eq!(
            ArmModeInstruction::DataProcessing {
                condition: Condition::AL,
                alu_instruction: ArmModeAluInstruction::Mov,
                set_conditions: false,
                op_kind: OperandKind::Register,
                rn: 0,
                destination: 1,
                op2: AluSecondOperandInfo::Register {
                    shift_op: ShiftOperator::Register(2),
                    shift_kind: ShiftKind::Asr,
                    register: 1,
                },
            },
            output
        );
    }

    #[test]
    fn decode_software_interrupt() {
        let output = ArmModeInstruction::from(0xEF00_00AB);
        assert_eq!(
            ArmModeInstruction::SoftwareInterrupt {
                condition: Condition::AL,
                comment: 0xAB,
            },
            output
        );
    }

    #[test]
    fn sh_zero_overlap_is_undefined() {
        assert_eq!(
            ArmModeInstruction::from(0xE170_0090),
            ArmModeInstruction::Undefined
        );
    }
}
