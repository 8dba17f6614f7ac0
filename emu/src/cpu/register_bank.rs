//! Banked registers for the exception modes.
//!
//! R0-R7 and R15 are never banked. R13/R14 have a private copy in every
//! exception mode; FIQ additionally banks R8-R12. Each exception mode also
//! carries an SPSR that captures the CPSR at exception entry. The `_old`
//! fields hold the User/System view of R8-R14 while another bank is live.

use serde::{Deserialize, Serialize};

use crate::cpu::psr::Psr;

/// Storage for the registers that are swapped out of the active file.
#[derive(Default, Serialize, Deserialize)]
pub struct RegisterBank {
    pub r8_old: u32,
    pub r9_old: u32,
    pub r10_old: u32,
    pub r11_old: u32,
    pub r12_old: u32,
    pub r13_old: u32,
    pub r14_old: u32,

    pub r8_fiq: u32,
    pub r9_fiq: u32,
    pub r10_fiq: u32,
    pub r11_fiq: u32,
    pub r12_fiq: u32,
    pub r13_fiq: u32,
    pub r14_fiq: u32,

    pub r13_svc: u32,
    pub r14_svc: u32,

    pub r13_abt: u32,
    pub r14_abt: u32,

    pub r13_irq: u32,
    pub r14_irq: u32,

    pub r13_und: u32,
    pub r14_und: u32,

    pub spsr_fiq: Psr,
    pub spsr_svc: Psr,
    pub spsr_abt: Psr,
    pub spsr_irq: Psr,
    pub spsr_und: Psr,
}
