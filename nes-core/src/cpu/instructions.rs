//! The 6502 instruction set: a 256-entry opcode table driving a single
//! dispatch, plus the ALU helpers the operations share.
//!
//! Covers every documented instruction and the documented-illegal opcodes
//! (LAX, SAX, DCP, ISB, SLO, RLA, SRE, RRA, ANC, ALR, ARR, AXS, the
//! redundant SBC, and the extra NOP forms). Decimal mode is tracked as a
//! flag but does not affect ADC/SBC; the console's 6502 derivative has BCD
//! disabled in silicon.

use crate::bus;
use crate::bus::CpuBus;
use crate::cpu::{CpuRegisters, StatusFlags, StatusReadContext};
use crate::num::GetBit;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum AddressingMode {
    Implied,
    Accumulator,
    Immediate,
    ZeroPage,
    ZeroPageX,
    ZeroPageY,
    Absolute,
    AbsoluteX,
    AbsoluteY,
    Indirect,
    IndirectX,
    IndirectY,
    Relative,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum Operation {
    Adc,
    And,
    Asl,
    Bcc,
    Bcs,
    Beq,
    Bit,
    Bmi,
    Bne,
    Bpl,
    Brk,
    Bvc,
    Bvs,
    Clc,
    Cld,
    Cli,
    Clv,
    Cmp,
    Cpx,
    Cpy,
    Dec,
    Dex,
    Dey,
    Eor,
    Inc,
    Inx,
    Iny,
    Jmp,
    Jsr,
    Lda,
    Ldx,
    Ldy,
    Lsr,
    Nop,
    Ora,
    Pha,
    Php,
    Pla,
    Plp,
    Rol,
    Ror,
    Rti,
    Rts,
    Sbc,
    Sec,
    Sed,
    Sei,
    Sta,
    Stx,
    Sty,
    Tax,
    Tay,
    Tsx,
    Txa,
    Txs,
    Tya,
    // Documented-illegal operations
    Lax,
    Sax,
    Dcp,
    Isb,
    Slo,
    Rla,
    Sre,
    Rra,
    Anc,
    Alr,
    Arr,
    Axs,
}

#[derive(Debug, Clone, Copy)]
pub(crate) struct OpcodeEntry {
    pub(crate) mnemonic: &'static str,
    pub(crate) operation: Operation,
    pub(crate) mode: AddressingMode,
    pub(crate) cycles: u32,
    pub(crate) page_penalty: bool,
}

const fn op(
    mnemonic: &'static str,
    operation: Operation,
    mode: AddressingMode,
    cycles: u32,
    page_penalty: bool,
) -> OpcodeEntry {
    OpcodeEntry { mnemonic, operation, mode, cycles, page_penalty }
}

pub(crate) static OPCODE_TABLE: [OpcodeEntry; 256] = build_opcode_table();

#[allow(clippy::too_many_lines)]
const fn build_opcode_table() -> [OpcodeEntry; 256] {
    use AddressingMode::{
        Absolute, AbsoluteX, AbsoluteY, Accumulator, Immediate, Implied, Indirect, IndirectX,
        IndirectY, Relative, ZeroPage, ZeroPageX, ZeroPageY,
    };
    use Operation as Op;

    // Opcodes with no defined behavior (KIL and friends) never appear in the
    // conformance corpus; decode them as 2-cycle NOPs so execution stays
    // deterministic.
    let mut table = [op("*NOP", Op::Nop, Implied, 2, false); 256];

    table[0x00] = op("BRK", Op::Brk, Implied, 7, false);
    table[0x01] = op("ORA", Op::Ora, IndirectX, 6, false);
    table[0x05] = op("ORA", Op::Ora, ZeroPage, 3, false);
    table[0x06] = op("ASL", Op::Asl, ZeroPage, 5, false);
    table[0x08] = op("PHP", Op::Php, Implied, 3, false);
    table[0x09] = op("ORA", Op::Ora, Immediate, 2, false);
    table[0x0A] = op("ASL", Op::Asl, Accumulator, 2, false);
    table[0x0D] = op("ORA", Op::Ora, Absolute, 4, false);
    table[0x0E] = op("ASL", Op::Asl, Absolute, 6, false);
    table[0x10] = op("BPL", Op::Bpl, Relative, 2, true);
    table[0x11] = op("ORA", Op::Ora, IndirectY, 5, true);
    table[0x15] = op("ORA", Op::Ora, ZeroPageX, 4, false);
    table[0x16] = op("ASL", Op::Asl, ZeroPageX, 6, false);
    table[0x18] = op("CLC", Op::Clc, Implied, 2, false);
    table[0x19] = op("ORA", Op::Ora, AbsoluteY, 4, true);
    table[0x1D] = op("ORA", Op::Ora, AbsoluteX, 4, true);
    table[0x1E] = op("ASL", Op::Asl, AbsoluteX, 7, false);
    table[0x20] = op("JSR", Op::Jsr, Absolute, 6, false);
    table[0x21] = op("AND", Op::And, IndirectX, 6, false);
    table[0x24] = op("BIT", Op::Bit, ZeroPage, 3, false);
    table[0x25] = op("AND", Op::And, ZeroPage, 3, false);
    table[0x26] = op("ROL", Op::Rol, ZeroPage, 5, false);
    table[0x28] = op("PLP", Op::Plp, Implied, 4, false);
    table[0x29] = op("AND", Op::And, Immediate, 2, false);
    table[0x2A] = op("ROL", Op::Rol, Accumulator, 2, false);
    table[0x2C] = op("BIT", Op::Bit, Absolute, 4, false);
    table[0x2D] = op("AND", Op::And, Absolute, 4, false);
    table[0x2E] = op("ROL", Op::Rol, Absolute, 6, false);
    table[0x30] = op("BMI", Op::Bmi, Relative, 2, true);
    table[0x31] = op("AND", Op::And, IndirectY, 5, true);
    table[0x35] = op("AND", Op::And, ZeroPageX, 4, false);
    table[0x36] = op("ROL", Op::Rol, ZeroPageX, 6, false);
    table[0x38] = op("SEC", Op::Sec, Implied, 2, false);
    table[0x39] = op("AND", Op::And, AbsoluteY, 4, true);
    table[0x3D] = op("AND", Op::And, AbsoluteX, 4, true);
    table[0x3E] = op("ROL", Op::Rol, AbsoluteX, 7, false);
    table[0x40] = op("RTI", Op::Rti, Implied, 6, false);
    table[0x41] = op("EOR", Op::Eor, IndirectX, 6, false);
    table[0x45] = op("EOR", Op::Eor, ZeroPage, 3, false);
    table[0x46] = op("LSR", Op::Lsr, ZeroPage, 5, false);
    table[0x48] = op("PHA", Op::Pha, Implied, 3, false);
    table[0x49] = op("EOR", Op::Eor, Immediate, 2, false);
    table[0x4A] = op("LSR", Op::Lsr, Accumulator, 2, false);
    table[0x4C] = op("JMP", Op::Jmp, Absolute, 3, false);
    table[0x4D] = op("EOR", Op::Eor, Absolute, 4, false);
    table[0x4E] = op("LSR", Op::Lsr, Absolute, 6, false);
    table[0x50] = op("BVC", Op::Bvc, Relative, 2, true);
    table[0x51] = op("EOR", Op::Eor, IndirectY, 5, true);
    table[0x55] = op("EOR", Op::Eor, ZeroPageX, 4, false);
    table[0x56] = op("LSR", Op::Lsr, ZeroPageX, 6, false);
    table[0x58] = op("CLI", Op::Cli, Implied, 2, false);
    table[0x59] = op("EOR", Op::Eor, AbsoluteY, 4, true);
    table[0x5D] = op("EOR", Op::Eor, AbsoluteX, 4, true);
    table[0x5E] = op("LSR", Op::Lsr, AbsoluteX, 7, false);
    table[0x60] = op("RTS", Op::Rts, Implied, 6, false);
    table[0x61] = op("ADC", Op::Adc, IndirectX, 6, false);
    table[0x65] = op("ADC", Op::Adc, ZeroPage, 3, false);
    table[0x66] = op("ROR", Op::Ror, ZeroPage, 5, false);
    table[0x68] = op("PLA", Op::Pla, Implied, 4, false);
    table[0x69] = op("ADC", Op::Adc, Immediate, 2, false);
    table[0x6A] = op("ROR", Op::Ror, Accumulator, 2, false);
    table[0x6C] = op("JMP", Op::Jmp, Indirect, 5, false);
    table[0x6D] = op("ADC", Op::Adc, Absolute, 4, false);
    table[0x6E] = op("ROR", Op::Ror, Absolute, 6, false);
    table[0x70] = op("BVS", Op::Bvs, Relative, 2, true);
    table[0x71] = op("ADC", Op::Adc, IndirectY, 5, true);
    table[0x75] = op("ADC", Op::Adc, ZeroPageX, 4, false);
    table[0x76] = op("ROR", Op::Ror, ZeroPageX, 6, false);
    table[0x78] = op("SEI", Op::Sei, Implied, 2, false);
    table[0x79] = op("ADC", Op::Adc, AbsoluteY, 4, true);
    table[0x7D] = op("ADC", Op::Adc, AbsoluteX, 4, true);
    table[0x7E] = op("ROR", Op::Ror, AbsoluteX, 7, false);
    table[0x81] = op("STA", Op::Sta, IndirectX, 6, false);
    table[0x84] = op("STY", Op::Sty, ZeroPage, 3, false);
    table[0x85] = op("STA", Op::Sta, ZeroPage, 3, false);
    table[0x86] = op("STX", Op::Stx, ZeroPage, 3, false);
    table[0x88] = op("DEY", Op::Dey, Implied, 2, false);
    table[0x8A] = op("TXA", Op::Txa, Implied, 2, false);
    table[0x8C] = op("STY", Op::Sty, Absolute, 4, false);
    table[0x8D] = op("STA", Op::Sta, Absolute, 4, false);
    table[0x8E] = op("STX", Op::Stx, Absolute, 4, false);
    table[0x90] = op("BCC", Op::Bcc, Relative, 2, true);
    table[0x91] = op("STA", Op::Sta, IndirectY, 6, false);
    table[0x94] = op("STY", Op::Sty, ZeroPageX, 4, false);
    table[0x95] = op("STA", Op::Sta, ZeroPageX, 4, false);
    table[0x96] = op("STX", Op::Stx, ZeroPageY, 4, false);
    table[0x98] = op("TYA", Op::Tya, Implied, 2, false);
    table[0x99] = op("STA", Op::Sta, AbsoluteY, 5, false);
    table[0x9A] = op("TXS", Op::Txs, Implied, 2, false);
    table[0x9D] = op("STA", Op::Sta, AbsoluteX, 5, false);
    table[0xA0] = op("LDY", Op::Ldy, Immediate, 2, false);
    table[0xA1] = op("LDA", Op::Lda, IndirectX, 6, false);
    table[0xA2] = op("LDX", Op::Ldx, Immediate, 2, false);
    table[0xA4] = op("LDY", Op::Ldy, ZeroPage, 3, false);
    table[0xA5] = op("LDA", Op::Lda, ZeroPage, 3, false);
    table[0xA6] = op("LDX", Op::Ldx, ZeroPage, 3, false);
    table[0xA8] = op("TAY", Op::Tay, Implied, 2, false);
    table[0xA9] = op("LDA", Op::Lda, Immediate, 2, false);
    table[0xAA] = op("TAX", Op::Tax, Implied, 2, false);
    table[0xAC] = op("LDY", Op::Ldy, Absolute, 4, false);
    table[0xAD] = op("LDA", Op::Lda, Absolute, 4, false);
    table[0xAE] = op("LDX", Op::Ldx, Absolute, 4, false);
    table[0xB0] = op("BCS", Op::Bcs, Relative, 2, true);
    table[0xB1] = op("LDA", Op::Lda, IndirectY, 5, true);
    table[0xB4] = op("LDY", Op::Ldy, ZeroPageX, 4, false);
    table[0xB5] = op("LDA", Op::Lda, ZeroPageX, 4, false);
    table[0xB6] = op("LDX", Op::Ldx, ZeroPageY, 4, false);
    table[0xB8] = op("CLV", Op::Clv, Implied, 2, false);
    table[0xB9] = op("LDA", Op::Lda, AbsoluteY, 4, true);
    table[0xBA] = op("TSX", Op::Tsx, Implied, 2, false);
    table[0xBC] = op("LDY", Op::Ldy, AbsoluteX, 4, true);
    table[0xBD] = op("LDA", Op::Lda, AbsoluteX, 4, true);
    table[0xBE] = op("LDX", Op::Ldx, AbsoluteY, 4, true);
    table[0xC0] = op("CPY", Op::Cpy, Immediate, 2, false);
    table[0xC1] = op("CMP", Op::Cmp, IndirectX, 6, false);
    table[0xC4] = op("CPY", Op::Cpy, ZeroPage, 3, false);
    table[0xC5] = op("CMP", Op::Cmp, ZeroPage, 3, false);
    table[0xC6] = op("DEC", Op::Dec, ZeroPage, 5, false);
    table[0xC8] = op("INY", Op::Iny, Implied, 2, false);
    table[0xC9] = op("CMP", Op::Cmp, Immediate, 2, false);
    table[0xCA] = op("DEX", Op::Dex, Implied, 2, false);
    table[0xCC] = op("CPY", Op::Cpy, Absolute, 4, false);
    table[0xCD] = op("CMP", Op::Cmp, Absolute, 4, false);
    table[0xCE] = op("DEC", Op::Dec, Absolute, 6, false);
    table[0xD0] = op("BNE", Op::Bne, Relative, 2, true);
    table[0xD1] = op("CMP", Op::Cmp, IndirectY, 5, true);
    table[0xD5] = op("CMP", Op::Cmp, ZeroPageX, 4, false);
    table[0xD6] = op("DEC", Op::Dec, ZeroPageX, 6, false);
    table[0xD8] = op("CLD", Op::Cld, Implied, 2, false);
    table[0xD9] = op("CMP", Op::Cmp, AbsoluteY, 4, true);
    table[0xDD] = op("CMP", Op::Cmp, AbsoluteX, 4, true);
    table[0xDE] = op("DEC", Op::Dec, AbsoluteX, 7, false);
    table[0xE0] = op("CPX", Op::Cpx, Immediate, 2, false);
    table[0xE1] = op("SBC", Op::Sbc, IndirectX, 6, false);
    table[0xE4] = op("CPX", Op::Cpx, ZeroPage, 3, false);
    table[0xE5] = op("SBC", Op::Sbc, ZeroPage, 3, false);
    table[0xE6] = op("INC", Op::Inc, ZeroPage, 5, false);
    table[0xE8] = op("INX", Op::Inx, Implied, 2, false);
    table[0xE9] = op("SBC", Op::Sbc, Immediate, 2, false);
    table[0xEA] = op("NOP", Op::Nop, Implied, 2, false);
    table[0xEC] = op("CPX", Op::Cpx, Absolute, 4, false);
    table[0xED] = op("SBC", Op::Sbc, Absolute, 4, false);
    table[0xEE] = op("INC", Op::Inc, Absolute, 6, false);
    table[0xF0] = op("BEQ", Op::Beq, Relative, 2, true);
    table[0xF1] = op("SBC", Op::Sbc, IndirectY, 5, true);
    table[0xF5] = op("SBC", Op::Sbc, ZeroPageX, 4, false);
    table[0xF6] = op("INC", Op::Inc, ZeroPageX, 6, false);
    table[0xF8] = op("SED", Op::Sed, Implied, 2, false);
    table[0xF9] = op("SBC", Op::Sbc, AbsoluteY, 4, true);
    table[0xFD] = op("SBC", Op::Sbc, AbsoluteX, 4, true);
    table[0xFE] = op("INC", Op::Inc, AbsoluteX, 7, false);

    // Extra NOP encodings
    table[0x04] = op("*NOP", Op::Nop, ZeroPage, 3, false);
    table[0x0C] = op("*NOP", Op::Nop, Absolute, 4, false);
    table[0x14] = op("*NOP", Op::Nop, ZeroPageX, 4, false);
    table[0x1A] = op("*NOP", Op::Nop, Implied, 2, false);
    table[0x1C] = op("*NOP", Op::Nop, AbsoluteX, 4, true);
    table[0x34] = op("*NOP", Op::Nop, ZeroPageX, 4, false);
    table[0x3A] = op("*NOP", Op::Nop, Implied, 2, false);
    table[0x3C] = op("*NOP", Op::Nop, AbsoluteX, 4, true);
    table[0x44] = op("*NOP", Op::Nop, ZeroPage, 3, false);
    table[0x54] = op("*NOP", Op::Nop, ZeroPageX, 4, false);
    table[0x5A] = op("*NOP", Op::Nop, Implied, 2, false);
    table[0x5C] = op("*NOP", Op::Nop, AbsoluteX, 4, true);
    table[0x64] = op("*NOP", Op::Nop, ZeroPage, 3, false);
    table[0x74] = op("*NOP", Op::Nop, ZeroPageX, 4, false);
    table[0x7A] = op("*NOP", Op::Nop, Implied, 2, false);
    table[0x7C] = op("*NOP", Op::Nop, AbsoluteX, 4, true);
    table[0x80] = op("*NOP", Op::Nop, Immediate, 2, false);
    table[0x82] = op("*NOP", Op::Nop, Immediate, 2, false);
    table[0x89] = op("*NOP", Op::Nop, Immediate, 2, false);
    table[0xC2] = op("*NOP", Op::Nop, Immediate, 2, false);
    table[0xD4] = op("*NOP", Op::Nop, ZeroPageX, 4, false);
    table[0xDA] = op("*NOP", Op::Nop, Implied, 2, false);
    table[0xDC] = op("*NOP", Op::Nop, AbsoluteX, 4, true);
    table[0xE2] = op("*NOP", Op::Nop, Immediate, 2, false);
    table[0xF4] = op("*NOP", Op::Nop, ZeroPageX, 4, false);
    table[0xFA] = op("*NOP", Op::Nop, Implied, 2, false);
    table[0xFC] = op("*NOP", Op::Nop, AbsoluteX, 4, true);

    // LAX: LDA and LDX at once
    table[0xA3] = op("*LAX", Op::Lax, IndirectX, 6, false);
    table[0xA7] = op("*LAX", Op::Lax, ZeroPage, 3, false);
    table[0xAF] = op("*LAX", Op::Lax, Absolute, 4, false);
    table[0xB3] = op("*LAX", Op::Lax, IndirectY, 5, true);
    table[0xB7] = op("*LAX", Op::Lax, ZeroPageY, 4, false);
    table[0xBF] = op("*LAX", Op::Lax, AbsoluteY, 4, true);

    // SAX: store A & X
    table[0x83] = op("*SAX", Op::Sax, IndirectX, 6, false);
    table[0x87] = op("*SAX", Op::Sax, ZeroPage, 3, false);
    table[0x8F] = op("*SAX", Op::Sax, Absolute, 4, false);
    table[0x97] = op("*SAX", Op::Sax, ZeroPageY, 4, false);

    // DCP: DEC then CMP
    table[0xC3] = op("*DCP", Op::Dcp, IndirectX, 8, false);
    table[0xC7] = op("*DCP", Op::Dcp, ZeroPage, 5, false);
    table[0xCF] = op("*DCP", Op::Dcp, Absolute, 6, false);
    table[0xD3] = op("*DCP", Op::Dcp, IndirectY, 8, false);
    table[0xD7] = op("*DCP", Op::Dcp, ZeroPageX, 6, false);
    table[0xDB] = op("*DCP", Op::Dcp, AbsoluteY, 7, false);
    table[0xDF] = op("*DCP", Op::Dcp, AbsoluteX, 7, false);

    // ISB: INC then SBC
    table[0xE3] = op("*ISB", Op::Isb, IndirectX, 8, false);
    table[0xE7] = op("*ISB", Op::Isb, ZeroPage, 5, false);
    table[0xEF] = op("*ISB", Op::Isb, Absolute, 6, false);
    table[0xF3] = op("*ISB", Op::Isb, IndirectY, 8, false);
    table[0xF7] = op("*ISB", Op::Isb, ZeroPageX, 6, false);
    table[0xFB] = op("*ISB", Op::Isb, AbsoluteY, 7, false);
    table[0xFF] = op("*ISB", Op::Isb, AbsoluteX, 7, false);

    // SLO: ASL then ORA
    table[0x03] = op("*SLO", Op::Slo, IndirectX, 8, false);
    table[0x07] = op("*SLO", Op::Slo, ZeroPage, 5, false);
    table[0x0F] = op("*SLO", Op::Slo, Absolute, 6, false);
    table[0x13] = op("*SLO", Op::Slo, IndirectY, 8, false);
    table[0x17] = op("*SLO", Op::Slo, ZeroPageX, 6, false);
    table[0x1B] = op("*SLO", Op::Slo, AbsoluteY, 7, false);
    table[0x1F] = op("*SLO", Op::Slo, AbsoluteX, 7, false);

    // RLA: ROL then AND
    table[0x23] = op("*RLA", Op::Rla, IndirectX, 8, false);
    table[0x27] = op("*RLA", Op::Rla, ZeroPage, 5, false);
    table[0x2F] = op("*RLA", Op::Rla, Absolute, 6, false);
    table[0x33] = op("*RLA", Op::Rla, IndirectY, 8, false);
    table[0x37] = op("*RLA", Op::Rla, ZeroPageX, 6, false);
    table[0x3B] = op("*RLA", Op::Rla, AbsoluteY, 7, false);
    table[0x3F] = op("*RLA", Op::Rla, AbsoluteX, 7, false);

    // SRE: LSR then EOR
    table[0x43] = op("*SRE", Op::Sre, IndirectX, 8, false);
    table[0x47] = op("*SRE", Op::Sre, ZeroPage, 5, false);
    table[0x4F] = op("*SRE", Op::Sre, Absolute, 6, false);
    table[0x53] = op("*SRE", Op::Sre, IndirectY, 8, false);
    table[0x57] = op("*SRE", Op::Sre, ZeroPageX, 6, false);
    table[0x5B] = op("*SRE", Op::Sre, AbsoluteY, 7, false);
    table[0x5F] = op("*SRE", Op::Sre, AbsoluteX, 7, false);

    // RRA: ROR then ADC
    table[0x63] = op("*RRA", Op::Rra, IndirectX, 8, false);
    table[0x67] = op("*RRA", Op::Rra, ZeroPage, 5, false);
    table[0x6F] = op("*RRA", Op::Rra, Absolute, 6, false);
    table[0x73] = op("*RRA", Op::Rra, IndirectY, 8, false);
    table[0x77] = op("*RRA", Op::Rra, ZeroPageX, 6, false);
    table[0x7B] = op("*RRA", Op::Rra, AbsoluteY, 7, false);
    table[0x7F] = op("*RRA", Op::Rra, AbsoluteX, 7, false);

    table[0x0B] = op("*ANC", Op::Anc, Immediate, 2, false);
    table[0x2B] = op("*ANC", Op::Anc, Immediate, 2, false);
    table[0x4B] = op("*ALR", Op::Alr, Immediate, 2, false);
    table[0x6B] = op("*ARR", Op::Arr, Immediate, 2, false);
    table[0xCB] = op("*AXS", Op::Axs, Immediate, 2, false);
    table[0xEB] = op("*SBC", Op::Sbc, Immediate, 2, false);

    table
}

#[derive(Debug, Clone, Copy, Default)]
struct ResolvedAddress {
    address: u16,
    page_crossed: bool,
}

fn fetch_byte(registers: &mut CpuRegisters, bus: &mut CpuBus<'_>) -> u8 {
    let value = bus.read_address(registers.pc);
    registers.pc = registers.pc.wrapping_add(1);
    value
}

fn fetch_word(registers: &mut CpuRegisters, bus: &mut CpuBus<'_>) -> u16 {
    let lsb = fetch_byte(registers, bus);
    let msb = fetch_byte(registers, bus);
    u16::from_le_bytes([lsb, msb])
}

// 16-bit read through a zero page pointer; the pointer wraps within the zero
// page rather than spilling into the stack page.
fn read_zero_page_u16(bus: &mut CpuBus<'_>, pointer: u8) -> u16 {
    let lsb = bus.read_address(pointer.into());
    let msb = bus.read_address(pointer.wrapping_add(1).into());
    u16::from_le_bytes([lsb, msb])
}

// JMP ($xxFF) reads the high byte from $xx00: the pointer's low byte wraps
// without carrying into the high byte.
fn read_indirect_u16(bus: &mut CpuBus<'_>, pointer: u16) -> u16 {
    let lsb = bus.read_address(pointer);
    let msb_addr = (pointer & 0xFF00) | (pointer.wrapping_add(1) & 0x00FF);
    let msb = bus.read_address(msb_addr);
    u16::from_le_bytes([lsb, msb])
}

fn page_crossed(base: u16, indexed: u16) -> bool {
    base & 0xFF00 != indexed & 0xFF00
}

fn resolve_address(
    mode: AddressingMode,
    registers: &mut CpuRegisters,
    bus: &mut CpuBus<'_>,
) -> ResolvedAddress {
    match mode {
        AddressingMode::Implied | AddressingMode::Accumulator => ResolvedAddress::default(),
        AddressingMode::Immediate => {
            let address = registers.pc;
            registers.pc = registers.pc.wrapping_add(1);
            ResolvedAddress { address, page_crossed: false }
        }
        AddressingMode::ZeroPage => {
            let address = fetch_byte(registers, bus).into();
            ResolvedAddress { address, page_crossed: false }
        }
        AddressingMode::ZeroPageX => {
            let base = fetch_byte(registers, bus);
            ResolvedAddress { address: base.wrapping_add(registers.x).into(), page_crossed: false }
        }
        AddressingMode::ZeroPageY => {
            let base = fetch_byte(registers, bus);
            ResolvedAddress { address: base.wrapping_add(registers.y).into(), page_crossed: false }
        }
        AddressingMode::Absolute => {
            let address = fetch_word(registers, bus);
            ResolvedAddress { address, page_crossed: false }
        }
        AddressingMode::AbsoluteX => {
            let base = fetch_word(registers, bus);
            let address = base.wrapping_add(registers.x.into());
            ResolvedAddress { address, page_crossed: page_crossed(base, address) }
        }
        AddressingMode::AbsoluteY => {
            let base = fetch_word(registers, bus);
            let address = base.wrapping_add(registers.y.into());
            ResolvedAddress { address, page_crossed: page_crossed(base, address) }
        }
        AddressingMode::Indirect => {
            let pointer = fetch_word(registers, bus);
            ResolvedAddress { address: read_indirect_u16(bus, pointer), page_crossed: false }
        }
        AddressingMode::IndirectX => {
            let base = fetch_byte(registers, bus);
            let pointer = base.wrapping_add(registers.x);
            ResolvedAddress { address: read_zero_page_u16(bus, pointer), page_crossed: false }
        }
        AddressingMode::IndirectY => {
            let pointer = fetch_byte(registers, bus);
            let base = read_zero_page_u16(bus, pointer);
            let address = base.wrapping_add(registers.y.into());
            ResolvedAddress { address, page_crossed: page_crossed(base, address) }
        }
        AddressingMode::Relative => {
            let offset = fetch_byte(registers, bus) as i8;
            let address = registers.pc.wrapping_add(offset as u16);
            ResolvedAddress { address, page_crossed: page_crossed(registers.pc, address) }
        }
    }
}

pub(crate) fn push(registers: &mut CpuRegisters, bus: &mut CpuBus<'_>, value: u8) {
    bus.write_address(bus::CPU_STACK_START | u16::from(registers.sp), value);
    registers.sp = registers.sp.wrapping_sub(1);
}

fn pop(registers: &mut CpuRegisters, bus: &mut CpuBus<'_>) -> u8 {
    registers.sp = registers.sp.wrapping_add(1);
    bus.read_address(bus::CPU_STACK_START | u16::from(registers.sp))
}

pub(crate) fn push_u16(registers: &mut CpuRegisters, bus: &mut CpuBus<'_>, value: u16) {
    let [lsb, msb] = value.to_le_bytes();
    push(registers, bus, msb);
    push(registers, bus, lsb);
}

fn pop_u16(registers: &mut CpuRegisters, bus: &mut CpuBus<'_>) -> u16 {
    let lsb = pop(registers, bus);
    let msb = pop(registers, bus);
    u16::from_le_bytes([lsb, msb])
}

fn set_zero_negative(value: u8, flags: &mut StatusFlags) {
    flags.set_zero(value == 0).set_negative(value.bit(7));
}

fn add(accumulator: u8, value: u8, flags: &mut StatusFlags) -> u8 {
    let sum = u16::from(accumulator) + u16::from(value) + u16::from(flags.carry);
    let result = sum as u8;

    flags
        .set_carry(sum > 0xFF)
        .set_overflow((!(accumulator ^ value) & (accumulator ^ result)).bit(7));
    set_zero_negative(result, flags);
    result
}

// SBC is ADC with the operand complemented; the carry flag doubles as the
// (inverted) borrow.
fn subtract(accumulator: u8, value: u8, flags: &mut StatusFlags) -> u8 {
    add(accumulator, !value, flags)
}

fn and(accumulator: u8, value: u8, flags: &mut StatusFlags) -> u8 {
    let result = accumulator & value;
    set_zero_negative(result, flags);
    result
}

fn or(accumulator: u8, value: u8, flags: &mut StatusFlags) -> u8 {
    let result = accumulator | value;
    set_zero_negative(result, flags);
    result
}

fn xor(accumulator: u8, value: u8, flags: &mut StatusFlags) -> u8 {
    let result = accumulator ^ value;
    set_zero_negative(result, flags);
    result
}

fn compare(register: u8, value: u8, flags: &mut StatusFlags) {
    flags.set_carry(register >= value);
    set_zero_negative(register.wrapping_sub(value), flags);
}

fn bit_test(accumulator: u8, value: u8, flags: &mut StatusFlags) {
    flags
        .set_zero(accumulator & value == 0)
        .set_overflow(value.bit(6))
        .set_negative(value.bit(7));
}

fn shift_left(value: u8, flags: &mut StatusFlags) -> u8 {
    let result = value << 1;
    flags.set_carry(value.bit(7));
    set_zero_negative(result, flags);
    result
}

fn logical_shift_right(value: u8, flags: &mut StatusFlags) -> u8 {
    let result = value >> 1;
    flags.set_carry(value.bit(0));
    set_zero_negative(result, flags);
    result
}

fn rotate_left(value: u8, flags: &mut StatusFlags) -> u8 {
    let result = (value << 1) | u8::from(flags.carry);
    flags.set_carry(value.bit(7));
    set_zero_negative(result, flags);
    result
}

fn rotate_right(value: u8, flags: &mut StatusFlags) -> u8 {
    let result = (value >> 1) | (u8::from(flags.carry) << 7);
    flags.set_carry(value.bit(0));
    set_zero_negative(result, flags);
    result
}

fn increment(value: u8, flags: &mut StatusFlags) -> u8 {
    let result = value.wrapping_add(1);
    set_zero_negative(result, flags);
    result
}

fn decrement(value: u8, flags: &mut StatusFlags) -> u8 {
    let result = value.wrapping_sub(1);
    set_zero_negative(result, flags);
    result
}

fn branch(condition: bool, resolved: ResolvedAddress, registers: &mut CpuRegisters) -> u32 {
    if !condition {
        return 0;
    }

    registers.pc = resolved.address;
    if resolved.page_crossed {
        2
    } else {
        1
    }
}

/// Execute the instruction whose opcode byte has already been fetched,
/// returning the total cycle count including any page-cross or branch
/// penalties.
#[allow(clippy::too_many_lines)]
pub(crate) fn execute(opcode: u8, registers: &mut CpuRegisters, bus: &mut CpuBus<'_>) -> u32 {
    let entry = &OPCODE_TABLE[opcode as usize];
    let resolved = resolve_address(entry.mode, registers, bus);

    let penalty = |resolved: ResolvedAddress| u32::from(entry.page_penalty && resolved.page_crossed);

    let mut extra_cycles = 0;
    match entry.operation {
        Operation::Adc => {
            let value = bus.read_address(resolved.address);
            registers.accumulator = add(registers.accumulator, value, &mut registers.status);
            extra_cycles = penalty(resolved);
        }
        Operation::Sbc => {
            let value = bus.read_address(resolved.address);
            registers.accumulator = subtract(registers.accumulator, value, &mut registers.status);
            extra_cycles = penalty(resolved);
        }
        Operation::And => {
            let value = bus.read_address(resolved.address);
            registers.accumulator = and(registers.accumulator, value, &mut registers.status);
            extra_cycles = penalty(resolved);
        }
        Operation::Ora => {
            let value = bus.read_address(resolved.address);
            registers.accumulator = or(registers.accumulator, value, &mut registers.status);
            extra_cycles = penalty(resolved);
        }
        Operation::Eor => {
            let value = bus.read_address(resolved.address);
            registers.accumulator = xor(registers.accumulator, value, &mut registers.status);
            extra_cycles = penalty(resolved);
        }
        Operation::Bit => {
            let value = bus.read_address(resolved.address);
            bit_test(registers.accumulator, value, &mut registers.status);
        }
        Operation::Cmp => {
            let value = bus.read_address(resolved.address);
            compare(registers.accumulator, value, &mut registers.status);
            extra_cycles = penalty(resolved);
        }
        Operation::Cpx => {
            let value = bus.read_address(resolved.address);
            compare(registers.x, value, &mut registers.status);
        }
        Operation::Cpy => {
            let value = bus.read_address(resolved.address);
            compare(registers.y, value, &mut registers.status);
        }
        Operation::Lda => {
            registers.accumulator = bus.read_address(resolved.address);
            set_zero_negative(registers.accumulator, &mut registers.status);
            extra_cycles = penalty(resolved);
        }
        Operation::Ldx => {
            registers.x = bus.read_address(resolved.address);
            set_zero_negative(registers.x, &mut registers.status);
            extra_cycles = penalty(resolved);
        }
        Operation::Ldy => {
            registers.y = bus.read_address(resolved.address);
            set_zero_negative(registers.y, &mut registers.status);
            extra_cycles = penalty(resolved);
        }
        Operation::Sta => {
            bus.write_address(resolved.address, registers.accumulator);
        }
        Operation::Stx => {
            bus.write_address(resolved.address, registers.x);
        }
        Operation::Sty => {
            bus.write_address(resolved.address, registers.y);
        }
        Operation::Asl => {
            if entry.mode == AddressingMode::Accumulator {
                registers.accumulator = shift_left(registers.accumulator, &mut registers.status);
            } else {
                let value = bus.read_address(resolved.address);
                let result = shift_left(value, &mut registers.status);
                bus.write_address(resolved.address, result);
            }
        }
        Operation::Lsr => {
            if entry.mode == AddressingMode::Accumulator {
                registers.accumulator =
                    logical_shift_right(registers.accumulator, &mut registers.status);
            } else {
                let value = bus.read_address(resolved.address);
                let result = logical_shift_right(value, &mut registers.status);
                bus.write_address(resolved.address, result);
            }
        }
        Operation::Rol => {
            if entry.mode == AddressingMode::Accumulator {
                registers.accumulator = rotate_left(registers.accumulator, &mut registers.status);
            } else {
                let value = bus.read_address(resolved.address);
                let result = rotate_left(value, &mut registers.status);
                bus.write_address(resolved.address, result);
            }
        }
        Operation::Ror => {
            if entry.mode == AddressingMode::Accumulator {
                registers.accumulator = rotate_right(registers.accumulator, &mut registers.status);
            } else {
                let value = bus.read_address(resolved.address);
                let result = rotate_right(value, &mut registers.status);
                bus.write_address(resolved.address, result);
            }
        }
        Operation::Inc => {
            let value = bus.read_address(resolved.address);
            let result = increment(value, &mut registers.status);
            bus.write_address(resolved.address, result);
        }
        Operation::Dec => {
            let value = bus.read_address(resolved.address);
            let result = decrement(value, &mut registers.status);
            bus.write_address(resolved.address, result);
        }
        Operation::Inx => {
            registers.x = increment(registers.x, &mut registers.status);
        }
        Operation::Iny => {
            registers.y = increment(registers.y, &mut registers.status);
        }
        Operation::Dex => {
            registers.x = decrement(registers.x, &mut registers.status);
        }
        Operation::Dey => {
            registers.y = decrement(registers.y, &mut registers.status);
        }
        Operation::Tax => {
            registers.x = registers.accumulator;
            set_zero_negative(registers.x, &mut registers.status);
        }
        Operation::Tay => {
            registers.y = registers.accumulator;
            set_zero_negative(registers.y, &mut registers.status);
        }
        Operation::Txa => {
            registers.accumulator = registers.x;
            set_zero_negative(registers.accumulator, &mut registers.status);
        }
        Operation::Tya => {
            registers.accumulator = registers.y;
            set_zero_negative(registers.accumulator, &mut registers.status);
        }
        Operation::Tsx => {
            registers.x = registers.sp;
            set_zero_negative(registers.x, &mut registers.status);
        }
        Operation::Txs => {
            registers.sp = registers.x;
        }
        Operation::Pha => {
            let accumulator = registers.accumulator;
            push(registers, bus, accumulator);
        }
        Operation::Php => {
            let status = registers.status.to_byte(StatusReadContext::PushStack);
            push(registers, bus, status);
        }
        Operation::Pla => {
            registers.accumulator = pop(registers, bus);
            set_zero_negative(registers.accumulator, &mut registers.status);
        }
        Operation::Plp => {
            registers.status = StatusFlags::from_byte(pop(registers, bus));
        }
        Operation::Jmp => {
            registers.pc = resolved.address;
        }
        Operation::Jsr => {
            // The pushed return address is the last byte of the JSR operand,
            // one short of the next instruction; RTS compensates.
            let return_address = registers.pc.wrapping_sub(1);
            push_u16(registers, bus, return_address);
            registers.pc = resolved.address;
        }
        Operation::Rts => {
            registers.pc = pop_u16(registers, bus).wrapping_add(1);
        }
        Operation::Rti => {
            registers.status = StatusFlags::from_byte(pop(registers, bus));
            registers.pc = pop_u16(registers, bus);
        }
        Operation::Brk => {
            // The pushed address skips the byte after the BRK opcode
            let return_address = registers.pc.wrapping_add(1);
            registers.pc = return_address;
            push_u16(registers, bus, return_address);

            let status = registers.status.to_byte(StatusReadContext::Brk);
            push(registers, bus, status);

            registers.status.interrupt_disable = true;
            registers.pc = bus.read_address_u16(bus::CPU_IRQ_VECTOR);
        }
        Operation::Bcc => {
            extra_cycles = branch(!registers.status.carry, resolved, registers);
        }
        Operation::Bcs => {
            extra_cycles = branch(registers.status.carry, resolved, registers);
        }
        Operation::Beq => {
            extra_cycles = branch(registers.status.zero, resolved, registers);
        }
        Operation::Bne => {
            extra_cycles = branch(!registers.status.zero, resolved, registers);
        }
        Operation::Bmi => {
            extra_cycles = branch(registers.status.negative, resolved, registers);
        }
        Operation::Bpl => {
            extra_cycles = branch(!registers.status.negative, resolved, registers);
        }
        Operation::Bvs => {
            extra_cycles = branch(registers.status.overflow, resolved, registers);
        }
        Operation::Bvc => {
            extra_cycles = branch(!registers.status.overflow, resolved, registers);
        }
        Operation::Clc => {
            registers.status.carry = false;
        }
        Operation::Cld => {
            registers.status.decimal = false;
        }
        Operation::Cli => {
            registers.status.interrupt_disable = false;
        }
        Operation::Clv => {
            registers.status.overflow = false;
        }
        Operation::Sec => {
            registers.status.carry = true;
        }
        Operation::Sed => {
            registers.status.decimal = true;
        }
        Operation::Sei => {
            registers.status.interrupt_disable = true;
        }
        Operation::Nop => {
            extra_cycles = penalty(resolved);
        }
        Operation::Lax => {
            let value = bus.read_address(resolved.address);
            registers.accumulator = value;
            registers.x = value;
            set_zero_negative(value, &mut registers.status);
            extra_cycles = penalty(resolved);
        }
        Operation::Sax => {
            bus.write_address(resolved.address, registers.accumulator & registers.x);
        }
        Operation::Dcp => {
            let value = bus.read_address(resolved.address);
            let result = decrement(value, &mut registers.status);
            bus.write_address(resolved.address, result);
            compare(registers.accumulator, result, &mut registers.status);
        }
        Operation::Isb => {
            let value = bus.read_address(resolved.address);
            let result = increment(value, &mut registers.status);
            bus.write_address(resolved.address, result);
            registers.accumulator = subtract(registers.accumulator, result, &mut registers.status);
        }
        Operation::Slo => {
            let value = bus.read_address(resolved.address);
            let result = shift_left(value, &mut registers.status);
            bus.write_address(resolved.address, result);
            registers.accumulator = or(registers.accumulator, result, &mut registers.status);
        }
        Operation::Rla => {
            let value = bus.read_address(resolved.address);
            let result = rotate_left(value, &mut registers.status);
            bus.write_address(resolved.address, result);
            registers.accumulator = and(registers.accumulator, result, &mut registers.status);
        }
        Operation::Sre => {
            let value = bus.read_address(resolved.address);
            let result = logical_shift_right(value, &mut registers.status);
            bus.write_address(resolved.address, result);
            registers.accumulator = xor(registers.accumulator, result, &mut registers.status);
        }
        Operation::Rra => {
            let value = bus.read_address(resolved.address);
            let result = rotate_right(value, &mut registers.status);
            bus.write_address(resolved.address, result);
            registers.accumulator = add(registers.accumulator, result, &mut registers.status);
        }
        Operation::Anc => {
            // AND, then set carry the way ASL would from the result's bit 7
            let value = bus.read_address(resolved.address);
            registers.accumulator = and(registers.accumulator, value, &mut registers.status);
            registers.status.carry = registers.accumulator.bit(7);
        }
        Operation::Alr => {
            let value = bus.read_address(resolved.address);
            registers.accumulator = and(registers.accumulator, value, &mut registers.status);
            registers.accumulator =
                logical_shift_right(registers.accumulator, &mut registers.status);
        }
        Operation::Arr => {
            // AND then ROR, but C comes from bit 6 of the result and V from
            // bit 6 XOR bit 5, as if an ADC had happened in between
            let value = bus.read_address(resolved.address);
            registers.accumulator = and(registers.accumulator, value, &mut registers.status);
            registers.accumulator = rotate_right(registers.accumulator, &mut registers.status);
            registers
                .status
                .set_carry(registers.accumulator.bit(6))
                .set_overflow(registers.accumulator.bit(6) ^ registers.accumulator.bit(5));
        }
        Operation::Axs => {
            // X := (A & X) - imm, ignoring the incoming carry; flags as CMP
            let value = bus.read_address(resolved.address);
            let ax = registers.accumulator & registers.x;
            registers.status.set_carry(ax >= value);
            registers.x = ax.wrapping_sub(value);
            set_zero_negative(registers.x, &mut registers.status);
        }
    }

    entry.cycles + extra_cycles
}

#[cfg(test)]
mod tests;
