use logger::log;

use crate::bitwise::Bits;
use crate::cpu::arm::alu_instruction::{
    shift, AluInstructionKind, AluSecondOperandInfo, ArithmeticOpResult, ArmModeAluInstruction,
    Kind, PsrKind, PsrOpKind, ShiftOperator,
};
use crate::cpu::arm::instructions::{
    ArmModeMultiplyLongVariant, ArmModeMultiplyVariant, SingleDataTransferKind,
    SingleDataTransferOffsetInfo,
};
use crate::cpu::arm7tdmi::{Arm7tdmi, HalfwordTransferKind};
use crate::cpu::cpu_modes::Mode;
use crate::cpu::flags::{
    HalfwordDataTransferOffsetKind, Indexing, LoadStoreKind, Offsetting, OperandKind,
    ReadWriteKind,
};
use crate::cpu::registers::{REG_LR, REG_PROGRAM_COUNTER};

pub const SIZE_OF_INSTRUCTION: u32 = 4;

impl Arm7tdmi {
    #[allow(clippy::too_many_arguments)]
    pub fn data_processing(
        &mut self,
        alu_instruction: ArmModeAluInstruction,
        set_conditions: bool,
        op_kind: OperandKind,
        rn: u32,
        destination: u32,
        op2: AluSecondOperandInfo,
    ) {
        let offset = match rn {
            // When Rn is the PC its value needs the extra pipeline step a
            // register-specified shift costs.
            REG_PROGRAM_COUNTER => Self::pc_offset_alu(op_kind, op2),
            _ => 0,
        };
        let op1 = self
            .registers
            .register_at(rn as usize)
            .wrapping_add(offset);

        let op2 = self.get_operand(alu_instruction, set_conditions, op2);

        // With S set and Rd = PC the SPSR comes back instead of flag
        // computation (exception return); suppress normal flag writes.
        let s = set_conditions && destination != REG_PROGRAM_COUNTER;

        use ArmModeAluInstruction::*;
        let rd = destination as usize;
        match alu_instruction {
            And => self.and(rd, op1, op2, s),
            Eor => self.eor(rd, op1, op2, s),
            Sub => self.sub(rd, op1, op2, s),
            Rsb => self.sub(rd, op2, op1, s),
            Add => self.add(rd, op1, op2, s),
            Adc => self.adc(rd, op1, op2, s),
            Sbc => self.sbc(rd, op1, op2, s),
            Rsc => self.sbc(rd, op2, op1, s),
            Tst => self.tst(op1, op2),
            Teq => self.teq(op1, op2),
            Cmp => self.cmp(op1, op2),
            Cmn => self.cmn(op1, op2),
            Orr => self.orr(rd, op1, op2, s),
            Mov => self.mov(rd, op2, s),
            Bic => self.bic(rd, op1, op2, s),
            Mvn => self.mvn(rd, op2, s),
        };

        // Test instructions never write Rd, everything else branching
        // through R15 must refill the pipeline.
        if destination == REG_PROGRAM_COUNTER && !matches!(alu_instruction, Tst | Teq | Cmp | Cmn)
        {
            if set_conditions {
                self.restore_cpsr_from_spsr();
            }
            self.flush_pipeline();
        }
    }

    /// The PC reads 8 ahead of the executing instruction, or 12 when the
    /// operand shift amount comes from a register.
    fn pc_offset_alu(op_kind: OperandKind, op2: AluSecondOperandInfo) -> u32 {
        let register_shift = matches!(
            op2,
            AluSecondOperandInfo::Register {
                shift_op: ShiftOperator::Register(_),
                ..
            }
        );
        if op_kind == OperandKind::Register && register_shift {
            4
        } else {
            0
        }
    }

    /// Resolve the second operand through the barrel shifter, updating the
    /// carry flag for flag-setting logical instructions.
    pub fn get_operand(
        &mut self,
        alu_instruction: ArmModeAluInstruction,
        s: bool,
        op2: AluSecondOperandInfo,
    ) -> u32 {
        match op2 {
            AluSecondOperandInfo::Register {
                shift_op,
                shift_kind,
                register,
            } => {
                let offset = if register == REG_PROGRAM_COUNTER
                    && matches!(shift_op, ShiftOperator::Register(_))
                {
                    4
                } else {
                    0
                };
                let rm = self
                    .registers
                    .register_at(register as usize)
                    .wrapping_add(offset);

                let amount = match shift_op {
                    ShiftOperator::Immediate(amount) => amount,
                    ShiftOperator::Register(rs) => {
                        let amount = self.registers.register_at(rs as usize) & 0xFF;
                        // A zero amount from a register leaves operand and
                        // carry untouched, unlike the immediate encodings.
                        if amount == 0 {
                            return rm;
                        }
                        amount
                    }
                };

                let result = shift(shift_kind, amount, rm, self.cpsr.carry_flag());
                if alu_instruction.kind() == AluInstructionKind::Logical && s {
                    self.cpsr.set_carry_flag(result.carry);
                }

                result.result
            }
            AluSecondOperandInfo::Immediate { base, shift } => {
                if shift == 0 {
                    return base;
                }

                let result = base.rotate_right(shift);
                if alu_instruction.kind() == AluInstructionKind::Logical && s {
                    self.cpsr.set_carry_flag(result.get_bit(31));
                }

                result
            }
        }
    }

    // ------------------------------------------------------------------
    // Flag helpers: 33-bit arithmetic behind add/adc/sub/sbc
    // ------------------------------------------------------------------

    pub fn add_inner_op(first_op: u32, second_op: u32) -> ArithmeticOpResult {
        Self::adc_inner_op(first_op, second_op, false)
    }

    pub fn adc_inner_op(first_op: u32, second_op: u32, carry_in: bool) -> ArithmeticOpResult {
        let wide = u64::from(first_op) + u64::from(second_op) + u64::from(carry_in);
        let result = wide as u32;

        ArithmeticOpResult {
            result,
            carry: wide > u64::from(u32::MAX),
            overflow: ((!(first_op ^ second_op)) & (second_op ^ result)).get_bit(31),
            sign: result.get_bit(31),
            zero: result == 0,
        }
    }

    pub fn sub_inner_op(first_op: u32, second_op: u32) -> ArithmeticOpResult {
        let result = first_op.wrapping_sub(second_op);

        ArithmeticOpResult {
            result,
            carry: first_op >= second_op,
            overflow: ((first_op ^ second_op) & (first_op ^ result)).get_bit(31),
            sign: result.get_bit(31),
            zero: result == 0,
        }
    }

    pub fn sbc_inner_op(first_op: u32, second_op: u32, carry_in: bool) -> ArithmeticOpResult {
        let wide = u64::from(first_op)
            .wrapping_sub(u64::from(second_op))
            .wrapping_sub(1)
            .wrapping_add(u64::from(carry_in));
        let result = wide as u32;

        ArithmeticOpResult {
            result,
            carry: u64::from(first_op) >= u64::from(second_op) + 1 - u64::from(carry_in),
            overflow: ((first_op ^ second_op) & (first_op ^ result)).get_bit(31),
            sign: result.get_bit(31),
            zero: result == 0,
        }
    }

    // ------------------------------------------------------------------
    // Data processing operations
    // ------------------------------------------------------------------

    pub fn and(&mut self, rd: usize, rn: u32, op2: u32, s: bool) {
        let result = rn & op2;
        self.registers.set_register_at(rd, result);

        if s {
            self.cpsr.set_zero_flag(result == 0);
            self.cpsr.set_sign_flag(result.get_bit(31));
        }
    }

    pub fn eor(&mut self, rd: usize, rn: u32, op2: u32, s: bool) {
        let result = rn ^ op2;
        self.registers.set_register_at(rd, result);

        if s {
            self.cpsr.set_zero_flag(result == 0);
            self.cpsr.set_sign_flag(result.get_bit(31));
        }
    }

    pub fn sub(&mut self, rd: usize, rn: u32, op2: u32, s: bool) {
        let result = Self::sub_inner_op(rn, op2);
        self.registers.set_register_at(rd, result.result);

        if s {
            self.cpsr.set_flags(&result);
        }
    }

    pub fn add(&mut self, rd: usize, rn: u32, op2: u32, s: bool) {
        let result = Self::add_inner_op(rn, op2);
        self.registers.set_register_at(rd, result.result);

        if s {
            self.cpsr.set_flags(&result);
        }
    }

    pub fn adc(&mut self, rd: usize, rn: u32, op2: u32, s: bool) {
        let result = Self::adc_inner_op(rn, op2, self.cpsr.carry_flag());
        self.registers.set_register_at(rd, result.result);

        if s {
            self.cpsr.set_flags(&result);
        }
    }

    pub fn sbc(&mut self, rd: usize, rn: u32, op2: u32, s: bool) {
        let result = Self::sbc_inner_op(rn, op2, self.cpsr.carry_flag());
        self.registers.set_register_at(rd, result.result);

        if s {
            self.cpsr.set_flags(&result);
        }
    }

    pub fn tst(&mut self, rn: u32, op2: u32) {
        let result = rn & op2;
        self.cpsr.set_sign_flag(result.get_bit(31));
        self.cpsr.set_zero_flag(result == 0);
    }

    pub fn teq(&mut self, rn: u32, op2: u32) {
        let result = rn ^ op2;
        self.cpsr.set_sign_flag(result.get_bit(31));
        self.cpsr.set_zero_flag(result == 0);
    }

    pub fn cmp(&mut self, rn: u32, op2: u32) {
        let result = Self::sub_inner_op(rn, op2);
        self.cpsr.set_flags(&result);
    }

    pub fn cmn(&mut self, rn: u32, op2: u32) {
        let result = Self::add_inner_op(rn, op2);
        self.cpsr.set_flags(&result);
    }

    pub fn orr(&mut self, rd: usize, rn: u32, op2: u32, s: bool) {
        let result = rn | op2;
        self.registers.set_register_at(rd, result);

        if s {
            self.cpsr.set_zero_flag(result == 0);
            self.cpsr.set_sign_flag(result.get_bit(31));
        }
    }

    pub fn mov(&mut self, rd: usize, op2: u32, s: bool) {
        self.registers.set_register_at(rd, op2);

        if s {
            self.cpsr.set_zero_flag(op2 == 0);
            self.cpsr.set_sign_flag(op2.get_bit(31));
        }
    }

    pub fn bic(&mut self, rd: usize, rn: u32, op2: u32, s: bool) {
        let result = rn & !op2;
        self.registers.set_register_at(rd, result);

        if s {
            self.cpsr.set_zero_flag(result == 0);
            self.cpsr.set_sign_flag(result.get_bit(31));
        }
    }

    pub fn mvn(&mut self, rd: usize, op2: u32, s: bool) {
        let result = !op2;
        self.registers.set_register_at(rd, result);

        if s {
            self.cpsr.set_zero_flag(result == 0);
            self.cpsr.set_sign_flag(result.get_bit(31));
        }
    }

    // ------------------------------------------------------------------
    // PSR transfer
    // ------------------------------------------------------------------

    pub fn psr_transfer(&mut self, kind: PsrOpKind, psr_kind: PsrKind) {
        if matches!(self.cpsr.mode(), Mode::System | Mode::User) && psr_kind == PsrKind::Spsr {
            log("SPSR access in System/User mode has no effect");
            return;
        }

        match kind {
            PsrOpKind::Mrs {
                destination_register,
            } => {
                let psr = match psr_kind {
                    PsrKind::Cpsr => self.cpsr,
                    PsrKind::Spsr => self.spsr,
                };
                self.registers
                    .set_register_at(destination_register as usize, psr.into());
            }
            PsrOpKind::Msr { source_register } => {
                let rm = self.registers.register_at(source_register as usize);
                self.write_psr_fields(psr_kind, rm, 0b1001);
            }
            PsrOpKind::MsrFlg {
                operand,
                field_mask,
            } => {
                let op = match operand {
                    AluSecondOperandInfo::Register { register, .. } => {
                        self.registers.register_at(register as usize)
                    }
                    AluSecondOperandInfo::Immediate { base, shift } => base.rotate_right(shift),
                };
                self.write_psr_fields(psr_kind, op, field_mask);
            }
        }
    }

    /// Apply the selected PSR fields. Mask bit 3 covers the flags, bit 0
    /// the control byte; the two reserved fields are ignored. User mode
    /// may only touch the flags.
    fn write_psr_fields(&mut self, psr_kind: PsrKind, value: u32, field_mask: u32) {
        let current_mode = self.cpsr.mode();

        {
            let psr = match psr_kind {
                PsrKind::Cpsr => &mut self.cpsr,
                PsrKind::Spsr => &mut self.spsr,
            };

            if field_mask.get_bit(3) {
                psr.set_sign_flag(value.get_bit(31));
                psr.set_zero_flag(value.get_bit(30));
                psr.set_carry_flag(value.get_bit(29));
                psr.set_overflow_flag(value.get_bit(28));
            }

            if field_mask.get_bit(0) && current_mode != Mode::User {
                psr.set_irq_disable(value.get_bit(7));
                psr.set_fiq_disable(value.get_bit(6));
                if psr.state_bit() != value.get_bit(5) {
                    log("WARNING: MSR is changing the state bit, software should never do this");
                }
                psr.set_state_bit(value.get_bit(5));
            }
        }

        if field_mask.get_bit(0) && current_mode != Mode::User {
            if psr_kind == PsrKind::Cpsr {
                match Mode::try_from(value.get_bits(0..=4)) {
                    Ok(mode) => self.swap_mode(mode),
                    // Invalid mode bits leave the mode unchanged.
                    Err(err) => tracing::debug!("MSR with invalid mode bits: {err}"),
                }
            } else {
                // The BIOS writes raw values here, including invalid modes.
                self.spsr.set_mode_raw(value.get_bits(0..=4));
            }
        }
    }

    // ------------------------------------------------------------------
    // Multiplies
    // ------------------------------------------------------------------

    #[allow(clippy::similar_names)]
    pub fn multiply(
        &mut self,
        variant: ArmModeMultiplyVariant,
        should_set_codes: bool,
        rd: u32,
        rn: u32,
        rs: u32,
        rm: u32,
    ) {
        let rm_value = self.registers.register_at(rm as usize);
        let rs_value = self.registers.register_at(rs as usize);

        let mut result = rm_value.wrapping_mul(rs_value);
        if variant == ArmModeMultiplyVariant::Mla {
            result = result.wrapping_add(self.registers.register_at(rn as usize));
        }

        self.registers.set_register_at(rd as usize, result);

        // The carry flag is left in an unpredictable state by hardware;
        // this core leaves it alone.
        if should_set_codes {
            self.cpsr.set_sign_flag(result.get_bit(31));
            self.cpsr.set_zero_flag(result == 0);
        }
    }

    #[allow(clippy::similar_names)]
    pub fn multiply_long(
        &mut self,
        variant: ArmModeMultiplyLongVariant,
        should_set_codes: bool,
        rdhi: u32,
        rdlo: u32,
        rs: u32,
        rm: u32,
    ) {
        let rm_value = self.registers.register_at(rm as usize);
        let rs_value = self.registers.register_at(rs as usize);
        let accumulator = (u64::from(self.registers.register_at(rdhi as usize)) << 32)
            | u64::from(self.registers.register_at(rdlo as usize));

        use ArmModeMultiplyLongVariant::*;
        let result: u64 = match variant {
            Umull => u64::from(rm_value) * u64::from(rs_value),
            Umlal => u64::from(rm_value)
                .wrapping_mul(u64::from(rs_value))
                .wrapping_add(accumulator),
            Smull => (i64::from(rm_value as i32) * i64::from(rs_value as i32)) as u64,
            Smlal => i64::from(rm_value as i32)
                .wrapping_mul(i64::from(rs_value as i32))
                .wrapping_add(accumulator as i64) as u64,
        };

        self.registers
            .set_register_at(rdhi as usize, (result >> 32) as u32);
        self.registers
            .set_register_at(rdlo as usize, result as u32);

        if should_set_codes {
            self.cpsr.set_sign_flag(result & (1 << 63) != 0);
            self.cpsr.set_zero_flag(result == 0);
        }
    }

    // ------------------------------------------------------------------
    // Branches and swaps
    // ------------------------------------------------------------------

    pub fn branch_and_exchange(&mut self, register: usize) {
        let mut address = self.registers.register_at(register);
        let state = address.get_bit(0).into();
        self.cpsr.set_cpu_state(state);

        address.set_bit_off(0);
        if !self.cpsr.state_bit() {
            address.set_bit_off(1);
        }

        self.registers.set_program_counter(address);
        self.flush_pipeline();
    }

    pub fn branch(&mut self, is_link: bool, offset: u32) {
        // The offset field is 24 bits shifted left by 2 at decode time.
        let offset = offset.sign_extended(26);
        let pc = self.registers.program_counter() as u32;

        if is_link {
            // The PC reads 8 ahead; the return address is 4 behind it.
            self.registers
                .set_register_at(REG_LR, pc.wrapping_sub(SIZE_OF_INSTRUCTION));
        }

        self.registers.set_program_counter(pc.wrapping_add(offset));
        self.flush_pipeline();
    }

    pub fn single_data_swap(
        &mut self,
        quantity: ReadWriteKind,
        base_register: u32,
        destination_register: u32,
        source_register: u32,
    ) {
        let address = self.registers.register_at(base_register as usize) as usize;
        let source = self.registers.register_at(source_register as usize);

        // Read and write happen with the bus locked on hardware; nothing
        // can interleave here either.
        let value = match quantity {
            ReadWriteKind::Word => {
                let value = self.bus.read_word_rotate(address);
                self.bus.write_word(address, source);
                value
            }
            ReadWriteKind::Byte => {
                let value = u32::from(self.bus.read_byte(address));
                self.bus.write_byte(address, source as u8);
                value
            }
        };

        self.registers
            .set_register_at(destination_register as usize, value);
    }

    // ------------------------------------------------------------------
    // Data transfers
    // ------------------------------------------------------------------

    #[allow(clippy::too_many_arguments)]
    pub fn half_word_data_transfer(
        &mut self,
        indexing: Indexing,
        offsetting: Offsetting,
        write_back: bool,
        load_store_kind: LoadStoreKind,
        offset_kind: HalfwordDataTransferOffsetKind,
        base_register: u32,
        source_destination_register: u32,
        transfer_kind: HalfwordTransferKind,
    ) {
        let offset = match offset_kind {
            HalfwordDataTransferOffsetKind::Immediate { offset } => offset,
            HalfwordDataTransferOffsetKind::Register { register } => {
                self.registers.register_at(register as usize)
            }
        };

        let base = self.registers.register_at(base_register as usize);
        let stepped = match offsetting {
            Offsetting::Up => base.wrapping_add(offset),
            Offsetting::Down => base.wrapping_sub(offset),
        };
        let address = match indexing {
            Indexing::Pre => stepped,
            Indexing::Post => base,
        } as usize;

        // Post-indexing always writes the stepped base back; pre-indexing
        // only with the W bit. A load of the base register wins below.
        if indexing == Indexing::Post || write_back {
            self.registers
                .set_register_at(base_register as usize, stepped);
        }

        match load_store_kind {
            LoadStoreKind::Load => {
                let value = match transfer_kind {
                    HalfwordTransferKind::UnsignedHalfwords => self.bus.read_half_rotate(address),
                    HalfwordTransferKind::SignedByte => {
                        self.bus.read_byte(address) as i8 as i32 as u32
                    }
                    HalfwordTransferKind::SignedHalfwords => self.bus.read_half_signed(address),
                };
                self.registers
                    .set_register_at(source_destination_register as usize, value);

                if source_destination_register == REG_PROGRAM_COUNTER {
                    self.flush_pipeline();
                }
            }
            LoadStoreKind::Store => {
                let mut value = self
                    .registers
                    .register_at(source_destination_register as usize);
                // Storing the PC writes the instruction address + 12.
                if source_destination_register == REG_PROGRAM_COUNTER {
                    value = value.wrapping_add(4);
                }

                match transfer_kind {
                    HalfwordTransferKind::UnsignedHalfwords => {
                        self.bus.write_half_word(address, value as u16);
                    }
                    _ => log("signed halfword transfers cannot store"),
                }
            }
        }
    }

    #[allow(clippy::too_many_arguments)]
    pub fn single_data_transfer(
        &mut self,
        kind: SingleDataTransferKind,
        quantity: ReadWriteKind,
        write_back: bool,
        indexing: Indexing,
        rd: u32,
        base_register: u32,
        offset_info: SingleDataTransferOffsetInfo,
        offsetting: Offsetting,
    ) {
        let offset = match offset_info {
            SingleDataTransferOffsetInfo::Immediate { offset } => offset,
            SingleDataTransferOffsetInfo::RegisterImmediate {
                shift_amount,
                shift_kind,
                reg_offset,
            } => {
                let rm = self.registers.register_at(reg_offset as usize);
                // Immediate-form shift; the carry-out is not committed.
                shift(shift_kind, shift_amount, rm, self.cpsr.carry_flag()).result
            }
        };

        let base = self.registers.register_at(base_register as usize);
        let stepped = match offsetting {
            Offsetting::Up => base.wrapping_add(offset),
            Offsetting::Down => base.wrapping_sub(offset),
        };
        let address = match indexing {
            Indexing::Pre => stepped,
            Indexing::Post => base,
        } as usize;

        if indexing == Indexing::Post || write_back {
            self.registers
                .set_register_at(base_register as usize, stepped);
        }

        match kind {
            SingleDataTransferKind::Ldr => {
                let value = match quantity {
                    ReadWriteKind::Word => self.bus.read_word_rotate(address),
                    ReadWriteKind::Byte => u32::from(self.bus.read_byte(address)),
                };
                self.registers.set_register_at(rd as usize, value);

                if rd == REG_PROGRAM_COUNTER {
                    self.flush_pipeline();
                }
            }
            SingleDataTransferKind::Str => {
                let mut value = self.registers.register_at(rd as usize);
                if rd == REG_PROGRAM_COUNTER {
                    value = value.wrapping_add(4);
                }

                match quantity {
                    ReadWriteKind::Word => self.bus.write_word(address, value),
                    ReadWriteKind::Byte => self.bus.write_byte(address, value as u8),
                }
            }
        }
    }

    #[allow(clippy::too_many_arguments)]
    pub fn block_data_transfer(
        &mut self,
        indexing: Indexing,
        offsetting: Offsetting,
        load_psr: bool,
        write_back: bool,
        load_store: LoadStoreKind,
        rn: u32,
        register_list: u32,
    ) {
        let base = self.registers.register_at(rn as usize);
        let total = 4 * register_list.count_ones();

        // Transfers always walk the list low to high at ascending
        // addresses; only the window start depends on the addressing mode.
        let start = match (indexing, offsetting) {
            (Indexing::Pre, Offsetting::Up) => base.wrapping_add(4),
            (Indexing::Post, Offsetting::Up) => base,
            (Indexing::Pre, Offsetting::Down) => base.wrapping_sub(total),
            (Indexing::Post, Offsetting::Down) => base.wrapping_sub(total).wrapping_add(4),
        };
        let final_base = match offsetting {
            Offsetting::Up => base.wrapping_add(total),
            Offsetting::Down => base.wrapping_sub(total),
        };

        let mut address = start as usize;
        match load_store {
            LoadStoreKind::Load => {
                if write_back && register_list.is_bit_off(rn as u8) {
                    self.registers.set_register_at(rn as usize, final_base);
                }

                for reg in 0..=15_u8 {
                    if register_list.get_bit(reg) {
                        let value = self.bus.read_word(address);
                        self.registers.set_register_at(reg as usize, value);
                        address += 4;
                    }
                }

                if register_list.get_bit(15) {
                    if load_psr {
                        self.restore_cpsr_from_spsr();
                    }
                    self.flush_pipeline();
                }
            }
            LoadStoreKind::Store => {
                if load_psr {
                    log("STM with S bit set stores the user bank, which this core does not model");
                }

                for reg in 0..=15_u8 {
                    if register_list.get_bit(reg) {
                        let mut value = self.registers.register_at(reg as usize);
                        if u32::from(reg) == REG_PROGRAM_COUNTER {
                            value = value.wrapping_add(4);
                        }
                        self.bus.write_word(address, value);
                        address += 4;
                    }
                }

                if write_back {
                    self.registers.set_register_at(rn as usize, final_base);
                }
            }
        }
    }

    pub fn software_interrupt(&mut self) {
        // The return address is the instruction after the SWI.
        let lr = self.registers.program_counter() as u32 - SIZE_OF_INSTRUCTION;
        self.enter_exception(Mode::Supervisor, 0x08, lr);
    }
}
