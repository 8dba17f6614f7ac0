//! The ARM7TDMI core.
//!
//! Fetch, decode and execute with the 3-stage pipeline modeled as a
//! two-entry prefetch queue: while an instruction executes, the next two
//! are already fetched and R15 points at the third. Writing R15 empties the
//! queue and moves R15 ahead again, so the next fill lands on the branch
//! target.

use std::collections::VecDeque;

use logger::log;

use crate::bus::Bus;
use crate::cpu::arm::instructions::ArmModeInstruction;
use crate::cpu::arm::mode::ArmModeOpcode;
use crate::cpu::cpu_modes::Mode;
use crate::cpu::psr::{CpuState, Psr};
use crate::cpu::register_bank::RegisterBank;
use crate::cpu::registers::{Registers, REG_LR, REG_SP};
use crate::cpu::thumb::instruction::ThumbModeInstruction;
use crate::cpu::thumb::mode::ThumbModeOpcode;
use crate::cpu::{arm, thumb};

pub struct Arm7tdmi {
    pub bus: Bus,

    pub cpsr: Psr,
    pub spsr: Psr,
    pub registers: Registers,
    pub register_bank: RegisterBank,

    /// Prefetched instruction words (halfwords in THUMB state), at most two.
    pipeline: VecDeque<u32>,

    /// Set by a HALTCNT write; cleared when an enabled interrupt arrives.
    pub halted: bool,
}

impl Default for Arm7tdmi {
    fn default() -> Self {
        Self::new(Bus::default())
    }
}

impl Arm7tdmi {
    /// Power-on state: System mode, ARM state, the BIOS-provided stack
    /// pointers, and the PC at the cartridge entry point.
    pub fn new(bus: Bus) -> Self {
        let mut cpsr = Psr::from(Mode::System);
        cpsr.set_cpu_state(CpuState::Arm);

        let mut cpu = Self {
            bus,
            cpsr,
            spsr: Psr::default(),
            registers: Registers::default(),
            register_bank: RegisterBank::default(),
            pipeline: VecDeque::with_capacity(2),
            halted: false,
        };

        cpu.registers.set_register_at(REG_SP, 0x0300_7F00);
        cpu.register_bank.r13_irq = 0x0300_7FA0;
        cpu.register_bank.r13_svc = 0x0300_7FE0;
        cpu.registers.set_program_counter(0x0800_0000);
        cpu.flush_pipeline();

        cpu
    }

    fn instruction_size(&self) -> u32 {
        if self.cpsr.state_bit() {
            thumb::operations::SIZE_OF_INSTRUCTION
        } else {
            arm::operations::SIZE_OF_INSTRUCTION
        }
    }

    /// Empty the prefetch queue and move R15 two fetches ahead, so the
    /// next [`Self::fill_pipeline`] starts at the instruction R15 was just
    /// written with.
    pub fn flush_pipeline(&mut self) {
        self.pipeline.clear();

        let size = self.instruction_size();
        let pc = self.registers.program_counter() as u32 & !(size - 1);
        self.registers.set_program_counter(pc.wrapping_add(size * 2));
    }

    /// Top up the prefetch queue. After this the queue holds exactly two
    /// entries and R15 points at the third.
    pub fn fill_pipeline(&mut self) {
        let size = self.instruction_size();
        let pc = self.registers.program_counter() as u32 & !(size - 1);
        self.registers.set_program_counter(pc);

        while self.pipeline.len() < 2 {
            let behind = (2 - self.pipeline.len() as u32) * size;
            let address = pc.wrapping_sub(behind) as usize;

            let fetched = match self.cpsr.cpu_state() {
                CpuState::Arm => self.bus.read_word(address),
                CpuState::Thumb => u32::from(self.bus.read_half_word(address)),
            };
            self.pipeline.push_back(fetched);
        }
    }

    /// Run one instruction and advance the machine clock.
    ///
    /// Interrupts are sampled here, between instructions, and a halted
    /// core only burns cycles until an enabled interrupt shows up.
    pub fn step(&mut self) {
        if self.bus.interrupt_control.take_halt_request() {
            self.halted = true;
        }

        if self.halted {
            if self.bus.interrupt_control.irq_line() {
                self.halted = false;
            } else {
                self.bus.tick(1);
                return;
            }
        }

        if self.bus.interrupt_control.pending() && !self.cpsr.irq_disable() {
            self.irq();
        }

        self.fill_pipeline();
        let Some(op_code) = self.pipeline.pop_front() else {
            return;
        };

        match self.cpsr.cpu_state() {
            CpuState::Arm => {
                let op_code: ArmModeOpcode = Self::decode(op_code);
                log(format!(
                    "PC: {:#010X} {}",
                    self.registers.program_counter() as u32 - 8,
                    op_code.instruction
                ));
                self.execute_arm(op_code);
            }
            CpuState::Thumb => {
                let op_code: ThumbModeOpcode = Self::decode(op_code as u16);
                log(format!(
                    "PC: {:#010X} {}",
                    self.registers.program_counter() as u32 - 4,
                    op_code.instruction
                ));
                self.execute_thumb(op_code);
            }
        }

        // A flush left the queue empty; otherwise move on to the next
        // prefetch slot.
        if !self.pipeline.is_empty() {
            let size = self.instruction_size();
            self.registers
                .set_program_counter(self.registers.program_counter() as u32 + size);
        }

        // Approximate timing: one cycle per instruction, plus whatever DMA
        // moved behind the CPU's back. Events fire only now, after the
        // instruction completed.
        let cycles = 1 + self.bus.take_pending_dma_cycles();
        self.bus.tick(cycles);
    }

    pub fn decode<T, V>(op_code: V) -> T
    where
        T: TryFrom<V>,
        <T as TryFrom<V>>::Error: std::fmt::Debug,
    {
        T::try_from(op_code).unwrap()
    }

    pub fn execute_arm(&mut self, op_code: ArmModeOpcode) {
        if !self.cpsr.can_execute(op_code.condition) {
            return;
        }

        match op_code.instruction {
            ArmModeInstruction::DataProcessing {
                condition: _,
                alu_instruction,
                set_conditions,
                op_kind,
                rn,
                destination,
                op2,
            } => self.data_processing(alu_instruction, set_conditions, op_kind, rn, destination, op2),
            ArmModeInstruction::Multiply {
                variant,
                condition: _,
                should_set_codes,
                rd_destination_register,
                rn_accumulate_register,
                rs_operand_register,
                rm_operand_register,
            } => self.multiply(
                variant,
                should_set_codes,
                rd_destination_register,
                rn_accumulate_register,
                rs_operand_register,
                rm_operand_register,
            ),
            ArmModeInstruction::MultiplyLong {
                variant,
                condition: _,
                should_set_codes,
                rdhi_destination_register,
                rdlo_destination_register,
                rs_operand_register,
                rm_operand_register,
            } => self.multiply_long(
                variant,
                should_set_codes,
                rdhi_destination_register,
                rdlo_destination_register,
                rs_operand_register,
                rm_operand_register,
            ),
            ArmModeInstruction::PSRTransfer {
                condition: _,
                psr_kind,
                kind,
            } => self.psr_transfer(kind, psr_kind),
            ArmModeInstruction::SingleDataSwap {
                condition: _,
                quantity,
                base_register,
                destination_register,
                source_register,
            } => self.single_data_swap(quantity, base_register, destination_register, source_register),
            ArmModeInstruction::BranchAndExchange {
                condition: _,
                register,
            } => self.branch_and_exchange(register),
            ArmModeInstruction::HalfwordDataTransfer {
                condition: _,
                indexing,
                offsetting,
                write_back,
                load_store_kind,
                offset_kind,
                base_register,
                source_destination_register,
                transfer_kind,
            } => self.half_word_data_transfer(
                indexing,
                offsetting,
                write_back,
                load_store_kind,
                offset_kind,
                base_register,
                source_destination_register,
                transfer_kind,
            ),
            ArmModeInstruction::SingleDataTransfer {
                condition: _,
                kind,
                quantity,
                write_back,
                indexing,
                rd,
                base_register,
                offset_info,
                offsetting,
            } => self.single_data_transfer(
                kind,
                quantity,
                write_back,
                indexing,
                rd,
                base_register,
                offset_info,
                offsetting,
            ),
            ArmModeInstruction::BlockDataTransfer {
                condition: _,
                indexing,
                offsetting,
                load_psr,
                write_back,
                load_store,
                rn,
                register_list,
            } => self.block_data_transfer(
                indexing,
                offsetting,
                load_psr,
                write_back,
                load_store,
                rn,
                register_list,
            ),
            ArmModeInstruction::Branch {
                condition: _,
                link,
                offset,
            } => self.branch(link, offset),
            ArmModeInstruction::SoftwareInterrupt {
                condition: _,
                comment: _,
            } => self.software_interrupt(),
            ArmModeInstruction::Undefined => {
                // Forgiving build: report and move on instead of trapping
                // into Undefined mode.
                log(format!("skipping undefined instruction {:#010X}", op_code.raw));
            }
        };
    }

    pub fn execute_thumb(&mut self, op_code: ThumbModeOpcode) {
        match op_code.instruction {
            ThumbModeInstruction::MoveShiftedRegister {
                shift_operation,
                offset5,
                source_register,
                destination_register,
            } => self.move_shifted_reg(
                shift_operation,
                offset5,
                source_register,
                destination_register,
            ),
            ThumbModeInstruction::AddSubtract {
                operation_kind,
                subtract,
                rn_offset3,
                source_register,
                destination_register,
            } => self.add_subtract(
                operation_kind,
                subtract,
                rn_offset3,
                source_register,
                destination_register,
            ),
            ThumbModeInstruction::MoveCompareAddSubtractImm {
                operation,
                destination_register,
                offset,
            } => self.move_compare_add_sub_imm(operation, destination_register, offset),
            ThumbModeInstruction::AluOp {
                alu_operation,
                source_register,
                destination_register,
            } => self.alu_op(alu_operation, source_register, destination_register),
            ThumbModeInstruction::HiRegisterOpBX {
                register_operation,
                source_register,
                destination_register,
            } => self.hi_reg_operation_branch_ex(
                register_operation,
                source_register,
                destination_register,
            ),
            ThumbModeInstruction::PCRelativeLoad {
                destination_register,
                immediate_value,
            } => self.pc_relative_load(destination_register, immediate_value),
            ThumbModeInstruction::LoadStoreRegisterOffset {
                load_store,
                byte_word,
                ro,
                base_register,
                destination_register,
            } => self.load_store_register_offset(
                load_store,
                byte_word,
                ro,
                base_register,
                destination_register,
            ),
            ThumbModeInstruction::LoadStoreSignExtByteHalfword {
                h,
                sign_extend_flag,
                offset_register,
                base_register,
                destination_register,
            } => self.load_store_sign_extend_byte_halfword(
                h,
                sign_extend_flag,
                offset_register,
                base_register,
                destination_register,
            ),
            ThumbModeInstruction::LoadStoreImmOffset {
                load_store,
                byte_word,
                offset,
                base_register,
                destination_register,
            } => self.load_store_immediate_offset(
                load_store,
                byte_word,
                offset,
                base_register,
                destination_register,
            ),
            ThumbModeInstruction::LoadStoreHalfword {
                load_store,
                offset,
                base_register,
                source_destination_register,
            } => self.load_store_halfword(
                load_store,
                offset,
                base_register,
                source_destination_register,
            ),
            ThumbModeInstruction::SPRelativeLoadStore {
                load_store,
                destination_register,
                word8,
            } => self.sp_relative_load_store(load_store, destination_register, word8),
            ThumbModeInstruction::LoadAddress {
                sp,
                destination_register,
                offset,
            } => self.load_address(sp, destination_register, offset),
            ThumbModeInstruction::AddOffsetSP { negative, word7 } => {
                self.add_offset_sp(negative, word7);
            }
            ThumbModeInstruction::PushPopReg {
                load_store,
                pc_lr,
                register_list,
            } => self.push_pop_register(load_store, pc_lr, register_list),
            ThumbModeInstruction::MultipleLoadStore {
                load_store,
                base_register,
                register_list,
            } => self.multiple_load_store(load_store, base_register, register_list),
            ThumbModeInstruction::CondBranch {
                condition,
                immediate_offset,
            } => self.cond_branch(condition, immediate_offset),
            ThumbModeInstruction::Swi => self.swi(),
            ThumbModeInstruction::UncondBranch { offset } => self.uncond_branch(offset),
            ThumbModeInstruction::LongBranchLink { h, offset } => self.long_branch_link(h, offset),
            ThumbModeInstruction::Undefined => {
                log(format!("skipping undefined instruction {:#06X}", op_code.raw));
            }
        };
    }

    /// Swap the banked registers when the operating mode changes. FIQ has
    /// R8-R12 banked on top of the R13/R14 every exception mode carries.
    pub fn swap_mode(&mut self, new_mode: Mode) {
        if self.cpsr.mode() == new_mode {
            return;
        }

        match self.cpsr.mode() {
            // Leaving FIQ stores R8-R14 and brings the shared bank back.
            Mode::Fiq => {
                self.register_bank.r8_fiq = self.registers.register_at(8);
                self.register_bank.r9_fiq = self.registers.register_at(9);
                self.register_bank.r10_fiq = self.registers.register_at(10);
                self.register_bank.r11_fiq = self.registers.register_at(11);
                self.register_bank.r12_fiq = self.registers.register_at(12);
                self.register_bank.r13_fiq = self.registers.register_at(13);
                self.register_bank.r14_fiq = self.registers.register_at(14);
                self.register_bank.spsr_fiq = self.spsr;

                self.registers.set_register_at(8, self.register_bank.r8_old);
                self.registers.set_register_at(9, self.register_bank.r9_old);
                self.registers
                    .set_register_at(10, self.register_bank.r10_old);
                self.registers
                    .set_register_at(11, self.register_bank.r11_old);
                self.registers
                    .set_register_at(12, self.register_bank.r12_old);
            }
            Mode::System | Mode::User => {
                self.register_bank.r13_old = self.registers.register_at(13);
                self.register_bank.r14_old = self.registers.register_at(14);
            }
            Mode::Supervisor => {
                self.register_bank.r13_svc = self.registers.register_at(13);
                self.register_bank.r14_svc = self.registers.register_at(14);
                self.register_bank.spsr_svc = self.spsr;
            }
            Mode::Abort => {
                self.register_bank.r13_abt = self.registers.register_at(13);
                self.register_bank.r14_abt = self.registers.register_at(14);
                self.register_bank.spsr_abt = self.spsr;
            }
            Mode::Irq => {
                self.register_bank.r13_irq = self.registers.register_at(13);
                self.register_bank.r14_irq = self.registers.register_at(14);
                self.register_bank.spsr_irq = self.spsr;
            }
            Mode::Undefined => {
                self.register_bank.r13_und = self.registers.register_at(13);
                self.register_bank.r14_und = self.registers.register_at(14);
                self.register_bank.spsr_und = self.spsr;
            }
        }

        match new_mode {
            // Entering FIQ saves the shared R8-R12 before loading its own.
            Mode::Fiq => {
                self.register_bank.r8_old = self.registers.register_at(8);
                self.register_bank.r9_old = self.registers.register_at(9);
                self.register_bank.r10_old = self.registers.register_at(10);
                self.register_bank.r11_old = self.registers.register_at(11);
                self.register_bank.r12_old = self.registers.register_at(12);

                self.registers.set_register_at(8, self.register_bank.r8_fiq);
                self.registers.set_register_at(9, self.register_bank.r9_fiq);
                self.registers
                    .set_register_at(10, self.register_bank.r10_fiq);
                self.registers
                    .set_register_at(11, self.register_bank.r11_fiq);
                self.registers
                    .set_register_at(12, self.register_bank.r12_fiq);
                self.registers
                    .set_register_at(13, self.register_bank.r13_fiq);
                self.registers
                    .set_register_at(14, self.register_bank.r14_fiq);

                self.spsr = self.register_bank.spsr_fiq;
            }
            Mode::System | Mode::User => {
                self.registers
                    .set_register_at(13, self.register_bank.r13_old);
                self.registers
                    .set_register_at(14, self.register_bank.r14_old);
            }
            Mode::Supervisor => {
                self.registers
                    .set_register_at(13, self.register_bank.r13_svc);
                self.registers
                    .set_register_at(14, self.register_bank.r14_svc);
                self.spsr = self.register_bank.spsr_svc;
            }
            Mode::Abort => {
                self.registers
                    .set_register_at(13, self.register_bank.r13_abt);
                self.registers
                    .set_register_at(14, self.register_bank.r14_abt);
                self.spsr = self.register_bank.spsr_abt;
            }
            Mode::Irq => {
                self.registers
                    .set_register_at(13, self.register_bank.r13_irq);
                self.registers
                    .set_register_at(14, self.register_bank.r14_irq);
                self.spsr = self.register_bank.spsr_irq;
            }
            Mode::Undefined => {
                self.registers
                    .set_register_at(13, self.register_bank.r13_und);
                self.registers
                    .set_register_at(14, self.register_bank.r14_und);
                self.spsr = self.register_bank.spsr_und;
            }
        }

        self.cpsr.set_mode(new_mode);
    }

    /// Take the IRQ exception: IRQ mode, ARM state, IRQs masked, vector
    /// 0x18. The link register compensates for the pipeline being ahead.
    pub fn irq(&mut self) {
        let lr = self.registers.program_counter() as u32
            - if self.cpsr.state_bit() { 0 } else { 4 };
        self.enter_exception(Mode::Irq, 0x18, lr);
    }

    pub(crate) fn enter_exception(&mut self, mode: Mode, vector: u32, lr: u32) {
        let old_cpsr = self.cpsr;
        self.swap_mode(mode);
        // The new mode's SPSR captures the interrupted CPSR.
        self.spsr = old_cpsr;

        self.cpsr.set_state_bit(false);
        self.cpsr.set_irq_disable(true);

        self.registers.set_register_at(REG_LR, lr);
        self.registers.set_program_counter(vector);
        self.flush_pipeline();
    }

    /// Exception return: the SPSR of the current mode becomes the CPSR
    /// again, restoring mode, state and flags at once.
    pub(crate) fn restore_cpsr_from_spsr(&mut self) {
        let spsr = self.spsr;
        self.swap_mode(spsr.mode());
        self.cpsr = spsr;
    }
}

/// Width/signedness selector of the halfword transfer family.
#[derive(Copy, Clone, Debug, Eq, PartialEq)]
pub enum HalfwordTransferKind {
    UnsignedHalfwords,
    SignedByte,
    SignedHalfwords,
}

impl From<u8> for HalfwordTransferKind {
    fn from(value: u8) -> Self {
        match value & 0b11 {
            0b01 => Self::UnsignedHalfwords,
            0b10 => Self::SignedByte,
            0b11 => Self::SignedHalfwords,
            _ => unreachable!(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::cpu::hardware::internal_memory::InternalMemory;
    use crate::cpu::hardware::interrupt_control::Interrupt;
    use pretty_assertions::assert_eq;

    fn cpu_with_rom(program: &[u32]) -> Arm7tdmi {
        let mut rom = vec![0_u8; 0x100];
        for (i, word) in program.iter().enumerate() {
            rom[i * 4..i * 4 + 4].copy_from_slice(&word.to_le_bytes());
        }

        Arm7tdmi::new(Bus::with_memory(InternalMemory::new([0; 0x4000], &rom)))
    }

    #[test]
    fn power_on_state() {
        let cpu = Arm7tdmi::default();

        assert_eq!(cpu.cpsr.mode(), Mode::System);
        assert_eq!(cpu.cpsr.cpu_state(), CpuState::Arm);
        assert!(!cpu.cpsr.irq_disable());
        assert_eq!(cpu.registers.register_at(REG_SP), 0x0300_7F00);
        assert_eq!(cpu.register_bank.r13_irq, 0x0300_7FA0);
        assert_eq!(cpu.register_bank.r13_svc, 0x0300_7FE0);
        // The flush leaves R15 two fetches past the entry point.
        assert_eq!(cpu.registers.program_counter(), 0x0800_0008);
    }

    #[test]
    fn reset_fetches_the_cartridge_entry() {
        // MOV R0, #5 at the cartridge entry point.
        let mut cpu = cpu_with_rom(&[0xE3A0_0005]);

        cpu.fill_pipeline();
        assert_eq!(cpu.registers.program_counter(), 0x0800_0008);

        cpu.step();
        assert_eq!(cpu.registers.register_at(0), 5);
    }

    #[test]
    fn pipeline_invariant_holds_across_steps() {
        // MOV R0, #1; MOV R1, #2; MOV R2, #3
        let mut cpu = cpu_with_rom(&[0xE3A0_0001, 0xE3A0_1002, 0xE3A0_2003]);

        for i in 0..3_u32 {
            cpu.fill_pipeline();
            // R15 = executing instruction + 8 once the pipeline is full.
            assert_eq!(
                cpu.registers.program_counter() as u32,
                0x0800_0000 + i * 4 + 8
            );
            cpu.step();
        }

        assert_eq!(cpu.registers.register_at(0), 1);
        assert_eq!(cpu.registers.register_at(1), 2);
        assert_eq!(cpu.registers.register_at(2), 3);
    }

    #[test]
    fn branching_refills_the_pipeline() {
        // B +8 (skips one instruction); MOV R0, #1; MOV R1, #2
        let mut cpu = cpu_with_rom(&[0xEA00_0000, 0xE3A0_0001, 0xE3A0_1002]);

        cpu.step();
        cpu.step();

        assert_eq!(cpu.registers.register_at(0), 0);
        assert_eq!(cpu.registers.register_at(1), 2);
    }

    #[test]
    fn swap_mode_round_trip_preserves_banks() {
        let mut cpu = Arm7tdmi::default();
        cpu.swap_mode(Mode::Supervisor);

        for i in 0..=15 {
            cpu.registers.set_register_at(i, i as u32);
        }
        cpu.spsr.set_carry_flag(true);

        cpu.swap_mode(Mode::System);
        cpu.registers.set_register_at(13, 100);
        cpu.registers.set_register_at(14, 200);

        cpu.swap_mode(Mode::Irq);
        assert_eq!(cpu.registers.register_at(13), 0x0300_7FA0);

        cpu.swap_mode(Mode::Supervisor);
        assert_eq!(cpu.registers.register_at(13), 13);
        assert_eq!(cpu.registers.register_at(14), 14);
        assert!(cpu.spsr.carry_flag());

        cpu.swap_mode(Mode::Fiq);
        assert_eq!(cpu.registers.register_at(8), 0);
        assert_eq!(cpu.registers.register_at(12), 0);
        assert_eq!(cpu.registers.register_at(13), 0);

        cpu.swap_mode(Mode::System);
        assert_eq!(cpu.registers.register_at(8), 8);
        assert_eq!(cpu.registers.register_at(12), 12);
        assert_eq!(cpu.registers.register_at(13), 100);
        assert_eq!(cpu.registers.register_at(14), 200);
    }

    #[test]
    fn irq_entry() {
        let mut cpu = Arm7tdmi::default();
        cpu.registers.set_program_counter(0x0800_0100);

        cpu.irq();

        assert_eq!(cpu.cpsr.mode(), Mode::Irq);
        assert!(cpu.cpsr.irq_disable());
        assert!(!cpu.cpsr.state_bit());
        assert_eq!(cpu.registers.register_at(REG_LR), 0x0800_00FC);
        assert_eq!(cpu.registers.register_at(REG_SP), 0x0300_7FA0);
        // Vector 0x18 plus the pipeline refill offset.
        assert_eq!(cpu.registers.program_counter(), 0x18 + 8);
        // The interrupted CPSR is in the IRQ SPSR.
        assert_eq!(cpu.spsr.mode(), Mode::System);
    }

    #[test]
    fn software_interrupt_enters_supervisor() {
        let mut cpu = cpu_with_rom(&[0xEF00_0001]); // SWI #1

        cpu.step();

        assert_eq!(cpu.cpsr.mode(), Mode::Supervisor);
        assert_eq!(cpu.registers.register_at(REG_SP), 0x0300_7FE0);
        // LR points back at the instruction after the SWI.
        assert_eq!(cpu.registers.register_at(REG_LR), 0x0800_0004);
        assert_eq!(cpu.registers.program_counter(), 0x08 + 8);
    }

    #[test]
    fn halt_parks_until_an_enabled_interrupt() {
        let mut cpu = Arm7tdmi::default();
        cpu.bus.interrupt_control.interrupt_enable = Interrupt::VBlank.mask();
        cpu.bus.interrupt_control.interrupt_master_enable = 1;
        cpu.bus.write_byte(0x0400_0301, 0);

        let pc_before = cpu.registers.program_counter();
        cpu.step();
        assert!(cpu.halted);
        cpu.step();
        assert!(cpu.halted);
        assert_eq!(cpu.registers.program_counter(), pc_before);

        cpu.bus.interrupt_control.request(Interrupt::VBlank);
        cpu.step();

        assert!(!cpu.halted);
        assert_eq!(cpu.cpsr.mode(), Mode::Irq);
        assert!(cpu.cpsr.irq_disable());
    }

    #[test]
    fn exception_return_restores_the_interrupted_mode() {
        let mut cpu = Arm7tdmi::default();
        cpu.cpsr.set_carry_flag(true);
        cpu.registers.set_program_counter(0x0800_0100);

        cpu.irq();
        assert_eq!(cpu.spsr.mode(), Mode::System);
        assert!(cpu.spsr.carry_flag());

        cpu.restore_cpsr_from_spsr();
        assert_eq!(cpu.cpsr.mode(), Mode::System);
        assert!(cpu.cpsr.carry_flag());
        assert!(!cpu.cpsr.irq_disable());
    }
}
