//! Opcode decode tables.
//!
//! A flat 256-entry table per CPU family maps every opcode to its
//! mnemonic, addressing mode, byte length and base cycle count. Indexed
//! reads across a page boundary, taken branches and CMOS decimal mode add
//! penalty cycles on top of the base count at execution time.
//!
//! The NMOS table assigns all 151 documented opcodes plus the full stable
//! and unstable illegal set. The CMOS table is derived from it: every
//! illegal entry becomes a NOP of the same length and cycle count, and the
//! twelve JAM opcodes become single-byte NOPs.

/// Addressing mode.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Mode {
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
    IndexedIndirect,
    IndirectIndexed,
    Relative,
}

/// Operation selector shared by the executor and the disassembler.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Op {
    Adc, And, Asl, Bcc, Bcs, Beq, Bit, Bmi, Bne, Bpl, Brk, Bvc, Bvs,
    Clc, Cld, Cli, Clv, Cmp, Cpx, Cpy, Dec, Dex, Dey, Eor, Inc, Inx,
    Iny, Jmp, Jsr, Lda, Ldx, Ldy, Lsr, Nop, Ora, Pha, Php, Pla, Plp,
    Rol, Ror, Rti, Rts, Sbc, Sec, Sed, Sei, Sta, Stx, Sty, Tax, Tay,
    Tsx, Txa, Txs, Tya,
    // Stable illegals.
    Slo, Rla, Sre, Rra, Sax, Lax, Dcp, Isc, Anc, Alr, Arr, Sbx,
    // Unstable illegals.
    Ane, Lxa, Sha, Shx, Shy, Tas, Las,
    // Processor lock-up.
    Jam,
}

/// One decode-table entry.
#[derive(Debug, Clone, Copy)]
pub struct Opcode {
    pub op: Op,
    pub mnemonic: &'static str,
    pub mode: Mode,
    pub bytes: u8,
    pub cycles: u8,
    pub illegal: bool,
}

const fn doc(op: Op, mnemonic: &'static str, mode: Mode, bytes: u8, cycles: u8) -> Opcode {
    Opcode {
        op,
        mnemonic,
        mode,
        bytes,
        cycles,
        illegal: false,
    }
}

const fn ill(op: Op, mnemonic: &'static str, mode: Mode, bytes: u8, cycles: u8) -> Opcode {
    Opcode {
        op,
        mnemonic,
        mode,
        bytes,
        cycles,
        illegal: true,
    }
}

/// Decode table for the NMOS parts (6502/6502A/6502C).
pub static NMOS: [Opcode; 256] = build_nmos();

/// Decode table for the CMOS 65C02: illegals demoted to NOPs.
pub static CMOS: [Opcode; 256] = build_cmos();

#[allow(clippy::too_many_lines)]
const fn build_nmos() -> [Opcode; 256] {
    use Mode::{
        Absolute as Abs, AbsoluteX as Abx, AbsoluteY as Aby, Accumulator as Acc,
        Immediate as Imm, Implied as Imp, IndexedIndirect as Izx, Indirect as Ind,
        IndirectIndexed as Izy, Relative as Rel, ZeroPage as Zp, ZeroPageX as Zpx,
        ZeroPageY as Zpy,
    };

    let mut t = [ill(Op::Jam, "JAM", Imp, 1, 2); 256];

    // $00-$1F
    t[0x00] = doc(Op::Brk, "BRK", Imp, 2, 7);
    t[0x01] = doc(Op::Ora, "ORA", Izx, 2, 6);
    t[0x03] = ill(Op::Slo, "SLO", Izx, 2, 8);
    t[0x04] = ill(Op::Nop, "NOP", Zp, 2, 3);
    t[0x05] = doc(Op::Ora, "ORA", Zp, 2, 3);
    t[0x06] = doc(Op::Asl, "ASL", Zp, 2, 5);
    t[0x07] = ill(Op::Slo, "SLO", Zp, 2, 5);
    t[0x08] = doc(Op::Php, "PHP", Imp, 1, 3);
    t[0x09] = doc(Op::Ora, "ORA", Imm, 2, 2);
    t[0x0A] = doc(Op::Asl, "ASL", Acc, 1, 2);
    t[0x0B] = ill(Op::Anc, "ANC", Imm, 2, 2);
    t[0x0C] = ill(Op::Nop, "NOP", Abs, 3, 4);
    t[0x0D] = doc(Op::Ora, "ORA", Abs, 3, 4);
    t[0x0E] = doc(Op::Asl, "ASL", Abs, 3, 6);
    t[0x0F] = ill(Op::Slo, "SLO", Abs, 3, 6);
    t[0x10] = doc(Op::Bpl, "BPL", Rel, 2, 2);
    t[0x11] = doc(Op::Ora, "ORA", Izy, 2, 5);
    t[0x13] = ill(Op::Slo, "SLO", Izy, 2, 8);
    t[0x14] = ill(Op::Nop, "NOP", Zpx, 2, 4);
    t[0x15] = doc(Op::Ora, "ORA", Zpx, 2, 4);
    t[0x16] = doc(Op::Asl, "ASL", Zpx, 2, 6);
    t[0x17] = ill(Op::Slo, "SLO", Zpx, 2, 6);
    t[0x18] = doc(Op::Clc, "CLC", Imp, 1, 2);
    t[0x19] = doc(Op::Ora, "ORA", Aby, 3, 4);
    t[0x1A] = ill(Op::Nop, "NOP", Imp, 1, 2);
    t[0x1B] = ill(Op::Slo, "SLO", Aby, 3, 7);
    t[0x1C] = ill(Op::Nop, "NOP", Abx, 3, 4);
    t[0x1D] = doc(Op::Ora, "ORA", Abx, 3, 4);
    t[0x1E] = doc(Op::Asl, "ASL", Abx, 3, 7);
    t[0x1F] = ill(Op::Slo, "SLO", Abx, 3, 7);

    // $20-$3F
    t[0x20] = doc(Op::Jsr, "JSR", Abs, 3, 6);
    t[0x21] = doc(Op::And, "AND", Izx, 2, 6);
    t[0x23] = ill(Op::Rla, "RLA", Izx, 2, 8);
    t[0x24] = doc(Op::Bit, "BIT", Zp, 2, 3);
    t[0x25] = doc(Op::And, "AND", Zp, 2, 3);
    t[0x26] = doc(Op::Rol, "ROL", Zp, 2, 5);
    t[0x27] = ill(Op::Rla, "RLA", Zp, 2, 5);
    t[0x28] = doc(Op::Plp, "PLP", Imp, 1, 4);
    t[0x29] = doc(Op::And, "AND", Imm, 2, 2);
    t[0x2A] = doc(Op::Rol, "ROL", Acc, 1, 2);
    t[0x2B] = ill(Op::Anc, "ANC", Imm, 2, 2);
    t[0x2C] = doc(Op::Bit, "BIT", Abs, 3, 4);
    t[0x2D] = doc(Op::And, "AND", Abs, 3, 4);
    t[0x2E] = doc(Op::Rol, "ROL", Abs, 3, 6);
    t[0x2F] = ill(Op::Rla, "RLA", Abs, 3, 6);
    t[0x30] = doc(Op::Bmi, "BMI", Rel, 2, 2);
    t[0x31] = doc(Op::And, "AND", Izy, 2, 5);
    t[0x33] = ill(Op::Rla, "RLA", Izy, 2, 8);
    t[0x34] = ill(Op::Nop, "NOP", Zpx, 2, 4);
    t[0x35] = doc(Op::And, "AND", Zpx, 2, 4);
    t[0x36] = doc(Op::Rol, "ROL", Zpx, 2, 6);
    t[0x37] = ill(Op::Rla, "RLA", Zpx, 2, 6);
    t[0x38] = doc(Op::Sec, "SEC", Imp, 1, 2);
    t[0x39] = doc(Op::And, "AND", Aby, 3, 4);
    t[0x3A] = ill(Op::Nop, "NOP", Imp, 1, 2);
    t[0x3B] = ill(Op::Rla, "RLA", Aby, 3, 7);
    t[0x3C] = ill(Op::Nop, "NOP", Abx, 3, 4);
    t[0x3D] = doc(Op::And, "AND", Abx, 3, 4);
    t[0x3E] = doc(Op::Rol, "ROL", Abx, 3, 7);
    t[0x3F] = ill(Op::Rla, "RLA", Abx, 3, 7);

    // $40-$5F
    t[0x40] = doc(Op::Rti, "RTI", Imp, 1, 6);
    t[0x41] = doc(Op::Eor, "EOR", Izx, 2, 6);
    t[0x43] = ill(Op::Sre, "SRE", Izx, 2, 8);
    t[0x44] = ill(Op::Nop, "NOP", Zp, 2, 3);
    t[0x45] = doc(Op::Eor, "EOR", Zp, 2, 3);
    t[0x46] = doc(Op::Lsr, "LSR", Zp, 2, 5);
    t[0x47] = ill(Op::Sre, "SRE", Zp, 2, 5);
    t[0x48] = doc(Op::Pha, "PHA", Imp, 1, 3);
    t[0x49] = doc(Op::Eor, "EOR", Imm, 2, 2);
    t[0x4A] = doc(Op::Lsr, "LSR", Acc, 1, 2);
    t[0x4B] = ill(Op::Alr, "ALR", Imm, 2, 2);
    t[0x4C] = doc(Op::Jmp, "JMP", Abs, 3, 3);
    t[0x4D] = doc(Op::Eor, "EOR", Abs, 3, 4);
    t[0x4E] = doc(Op::Lsr, "LSR", Abs, 3, 6);
    t[0x4F] = ill(Op::Sre, "SRE", Abs, 3, 6);
    t[0x50] = doc(Op::Bvc, "BVC", Rel, 2, 2);
    t[0x51] = doc(Op::Eor, "EOR", Izy, 2, 5);
    t[0x53] = ill(Op::Sre, "SRE", Izy, 2, 8);
    t[0x54] = ill(Op::Nop, "NOP", Zpx, 2, 4);
    t[0x55] = doc(Op::Eor, "EOR", Zpx, 2, 4);
    t[0x56] = doc(Op::Lsr, "LSR", Zpx, 2, 6);
    t[0x57] = ill(Op::Sre, "SRE", Zpx, 2, 6);
    t[0x58] = doc(Op::Cli, "CLI", Imp, 1, 2);
    t[0x59] = doc(Op::Eor, "EOR", Aby, 3, 4);
    t[0x5A] = ill(Op::Nop, "NOP", Imp, 1, 2);
    t[0x5B] = ill(Op::Sre, "SRE", Aby, 3, 7);
    t[0x5C] = ill(Op::Nop, "NOP", Abx, 3, 4);
    t[0x5D] = doc(Op::Eor, "EOR", Abx, 3, 4);
    t[0x5E] = doc(Op::Lsr, "LSR", Abx, 3, 7);
    t[0x5F] = ill(Op::Sre, "SRE", Abx, 3, 7);

    // $60-$7F
    t[0x60] = doc(Op::Rts, "RTS", Imp, 1, 6);
    t[0x61] = doc(Op::Adc, "ADC", Izx, 2, 6);
    t[0x63] = ill(Op::Rra, "RRA", Izx, 2, 8);
    t[0x64] = ill(Op::Nop, "NOP", Zp, 2, 3);
    t[0x65] = doc(Op::Adc, "ADC", Zp, 2, 3);
    t[0x66] = doc(Op::Ror, "ROR", Zp, 2, 5);
    t[0x67] = ill(Op::Rra, "RRA", Zp, 2, 5);
    t[0x68] = doc(Op::Pla, "PLA", Imp, 1, 4);
    t[0x69] = doc(Op::Adc, "ADC", Imm, 2, 2);
    t[0x6A] = doc(Op::Ror, "ROR", Acc, 1, 2);
    t[0x6B] = ill(Op::Arr, "ARR", Imm, 2, 2);
    t[0x6C] = doc(Op::Jmp, "JMP", Ind, 3, 5);
    t[0x6D] = doc(Op::Adc, "ADC", Abs, 3, 4);
    t[0x6E] = doc(Op::Ror, "ROR", Abs, 3, 6);
    t[0x6F] = ill(Op::Rra, "RRA", Abs, 3, 6);
    t[0x70] = doc(Op::Bvs, "BVS", Rel, 2, 2);
    t[0x71] = doc(Op::Adc, "ADC", Izy, 2, 5);
    t[0x73] = ill(Op::Rra, "RRA", Izy, 2, 8);
    t[0x74] = ill(Op::Nop, "NOP", Zpx, 2, 4);
    t[0x75] = doc(Op::Adc, "ADC", Zpx, 2, 4);
    t[0x76] = doc(Op::Ror, "ROR", Zpx, 2, 6);
    t[0x77] = ill(Op::Rra, "RRA", Zpx, 2, 6);
    t[0x78] = doc(Op::Sei, "SEI", Imp, 1, 2);
    t[0x79] = doc(Op::Adc, "ADC", Aby, 3, 4);
    t[0x7A] = ill(Op::Nop, "NOP", Imp, 1, 2);
    t[0x7B] = ill(Op::Rra, "RRA", Aby, 3, 7);
    t[0x7C] = ill(Op::Nop, "NOP", Abx, 3, 4);
    t[0x7D] = doc(Op::Adc, "ADC", Abx, 3, 4);
    t[0x7E] = doc(Op::Ror, "ROR", Abx, 3, 7);
    t[0x7F] = ill(Op::Rra, "RRA", Abx, 3, 7);

    // $80-$9F
    t[0x80] = ill(Op::Nop, "NOP", Imm, 2, 2);
    t[0x81] = doc(Op::Sta, "STA", Izx, 2, 6);
    t[0x82] = ill(Op::Nop, "NOP", Imm, 2, 2);
    t[0x83] = ill(Op::Sax, "SAX", Izx, 2, 6);
    t[0x84] = doc(Op::Sty, "STY", Zp, 2, 3);
    t[0x85] = doc(Op::Sta, "STA", Zp, 2, 3);
    t[0x86] = doc(Op::Stx, "STX", Zp, 2, 3);
    t[0x87] = ill(Op::Sax, "SAX", Zp, 2, 3);
    t[0x88] = doc(Op::Dey, "DEY", Imp, 1, 2);
    t[0x89] = ill(Op::Nop, "NOP", Imm, 2, 2);
    t[0x8A] = doc(Op::Txa, "TXA", Imp, 1, 2);
    t[0x8B] = ill(Op::Ane, "ANE", Imm, 2, 2);
    t[0x8C] = doc(Op::Sty, "STY", Abs, 3, 4);
    t[0x8D] = doc(Op::Sta, "STA", Abs, 3, 4);
    t[0x8E] = doc(Op::Stx, "STX", Abs, 3, 4);
    t[0x8F] = ill(Op::Sax, "SAX", Abs, 3, 4);
    t[0x90] = doc(Op::Bcc, "BCC", Rel, 2, 2);
    t[0x91] = doc(Op::Sta, "STA", Izy, 2, 6);
    t[0x93] = ill(Op::Sha, "SHA", Izy, 2, 6);
    t[0x94] = doc(Op::Sty, "STY", Zpx, 2, 4);
    t[0x95] = doc(Op::Sta, "STA", Zpx, 2, 4);
    t[0x96] = doc(Op::Stx, "STX", Zpy, 2, 4);
    t[0x97] = ill(Op::Sax, "SAX", Zpy, 2, 4);
    t[0x98] = doc(Op::Tya, "TYA", Imp, 1, 2);
    t[0x99] = doc(Op::Sta, "STA", Aby, 3, 5);
    t[0x9A] = doc(Op::Txs, "TXS", Imp, 1, 2);
    t[0x9B] = ill(Op::Tas, "TAS", Aby, 3, 5);
    t[0x9C] = ill(Op::Shy, "SHY", Abx, 3, 5);
    t[0x9D] = doc(Op::Sta, "STA", Abx, 3, 5);
    t[0x9E] = ill(Op::Shx, "SHX", Aby, 3, 5);
    t[0x9F] = ill(Op::Sha, "SHA", Aby, 3, 5);

    // $A0-$BF
    t[0xA0] = doc(Op::Ldy, "LDY", Imm, 2, 2);
    t[0xA1] = doc(Op::Lda, "LDA", Izx, 2, 6);
    t[0xA2] = doc(Op::Ldx, "LDX", Imm, 2, 2);
    t[0xA3] = ill(Op::Lax, "LAX", Izx, 2, 6);
    t[0xA4] = doc(Op::Ldy, "LDY", Zp, 2, 3);
    t[0xA5] = doc(Op::Lda, "LDA", Zp, 2, 3);
    t[0xA6] = doc(Op::Ldx, "LDX", Zp, 2, 3);
    t[0xA7] = ill(Op::Lax, "LAX", Zp, 2, 3);
    t[0xA8] = doc(Op::Tay, "TAY", Imp, 1, 2);
    t[0xA9] = doc(Op::Lda, "LDA", Imm, 2, 2);
    t[0xAA] = doc(Op::Tax, "TAX", Imp, 1, 2);
    t[0xAB] = ill(Op::Lxa, "LXA", Imm, 2, 2);
    t[0xAC] = doc(Op::Ldy, "LDY", Abs, 3, 4);
    t[0xAD] = doc(Op::Lda, "LDA", Abs, 3, 4);
    t[0xAE] = doc(Op::Ldx, "LDX", Abs, 3, 4);
    t[0xAF] = ill(Op::Lax, "LAX", Abs, 3, 4);
    t[0xB0] = doc(Op::Bcs, "BCS", Rel, 2, 2);
    t[0xB1] = doc(Op::Lda, "LDA", Izy, 2, 5);
    t[0xB3] = ill(Op::Lax, "LAX", Izy, 2, 5);
    t[0xB4] = doc(Op::Ldy, "LDY", Zpx, 2, 4);
    t[0xB5] = doc(Op::Lda, "LDA", Zpx, 2, 4);
    t[0xB6] = doc(Op::Ldx, "LDX", Zpy, 2, 4);
    t[0xB7] = ill(Op::Lax, "LAX", Zpy, 2, 4);
    t[0xB8] = doc(Op::Clv, "CLV", Imp, 1, 2);
    t[0xB9] = doc(Op::Lda, "LDA", Aby, 3, 4);
    t[0xBA] = doc(Op::Tsx, "TSX", Imp, 1, 2);
    t[0xBB] = ill(Op::Las, "LAS", Aby, 3, 4);
    t[0xBC] = doc(Op::Ldy, "LDY", Abx, 3, 4);
    t[0xBD] = doc(Op::Lda, "LDA", Abx, 3, 4);
    t[0xBE] = doc(Op::Ldx, "LDX", Aby, 3, 4);
    t[0xBF] = ill(Op::Lax, "LAX", Aby, 3, 4);

    // $C0-$DF
    t[0xC0] = doc(Op::Cpy, "CPY", Imm, 2, 2);
    t[0xC1] = doc(Op::Cmp, "CMP", Izx, 2, 6);
    t[0xC2] = ill(Op::Nop, "NOP", Imm, 2, 2);
    t[0xC3] = ill(Op::Dcp, "DCP", Izx, 2, 8);
    t[0xC4] = doc(Op::Cpy, "CPY", Zp, 2, 3);
    t[0xC5] = doc(Op::Cmp, "CMP", Zp, 2, 3);
    t[0xC6] = doc(Op::Dec, "DEC", Zp, 2, 5);
    t[0xC7] = ill(Op::Dcp, "DCP", Zp, 2, 5);
    t[0xC8] = doc(Op::Iny, "INY", Imp, 1, 2);
    t[0xC9] = doc(Op::Cmp, "CMP", Imm, 2, 2);
    t[0xCA] = doc(Op::Dex, "DEX", Imp, 1, 2);
    t[0xCB] = ill(Op::Sbx, "SBX", Imm, 2, 2);
    t[0xCC] = doc(Op::Cpy, "CPY", Abs, 3, 4);
    t[0xCD] = doc(Op::Cmp, "CMP", Abs, 3, 4);
    t[0xCE] = doc(Op::Dec, "DEC", Abs, 3, 6);
    t[0xCF] = ill(Op::Dcp, "DCP", Abs, 3, 6);
    t[0xD0] = doc(Op::Bne, "BNE", Rel, 2, 2);
    t[0xD1] = doc(Op::Cmp, "CMP", Izy, 2, 5);
    t[0xD3] = ill(Op::Dcp, "DCP", Izy, 2, 8);
    t[0xD4] = ill(Op::Nop, "NOP", Zpx, 2, 4);
    t[0xD5] = doc(Op::Cmp, "CMP", Zpx, 2, 4);
    t[0xD6] = doc(Op::Dec, "DEC", Zpx, 2, 6);
    t[0xD7] = ill(Op::Dcp, "DCP", Zpx, 2, 6);
    t[0xD8] = doc(Op::Cld, "CLD", Imp, 1, 2);
    t[0xD9] = doc(Op::Cmp, "CMP", Aby, 3, 4);
    t[0xDA] = ill(Op::Nop, "NOP", Imp, 1, 2);
    t[0xDB] = ill(Op::Dcp, "DCP", Aby, 3, 7);
    t[0xDC] = ill(Op::Nop, "NOP", Abx, 3, 4);
    t[0xDD] = doc(Op::Cmp, "CMP", Abx, 3, 4);
    t[0xDE] = doc(Op::Dec, "DEC", Abx, 3, 7);
    t[0xDF] = ill(Op::Dcp, "DCP", Abx, 3, 7);

    // $E0-$FF
    t[0xE0] = doc(Op::Cpx, "CPX", Imm, 2, 2);
    t[0xE1] = doc(Op::Sbc, "SBC", Izx, 2, 6);
    t[0xE2] = ill(Op::Nop, "NOP", Imm, 2, 2);
    t[0xE3] = ill(Op::Isc, "ISC", Izx, 2, 8);
    t[0xE4] = doc(Op::Cpx, "CPX", Zp, 2, 3);
    t[0xE5] = doc(Op::Sbc, "SBC", Zp, 2, 3);
    t[0xE6] = doc(Op::Inc, "INC", Zp, 2, 5);
    t[0xE7] = ill(Op::Isc, "ISC", Zp, 2, 5);
    t[0xE8] = doc(Op::Inx, "INX", Imp, 1, 2);
    t[0xE9] = doc(Op::Sbc, "SBC", Imm, 2, 2);
    t[0xEA] = doc(Op::Nop, "NOP", Imp, 1, 2);
    t[0xEB] = ill(Op::Sbc, "SBC", Imm, 2, 2);
    t[0xEC] = doc(Op::Cpx, "CPX", Abs, 3, 4);
    t[0xED] = doc(Op::Sbc, "SBC", Abs, 3, 4);
    t[0xEE] = doc(Op::Inc, "INC", Abs, 3, 6);
    t[0xEF] = ill(Op::Isc, "ISC", Abs, 3, 6);
    t[0xF0] = doc(Op::Beq, "BEQ", Rel, 2, 2);
    t[0xF1] = doc(Op::Sbc, "SBC", Izy, 2, 5);
    t[0xF3] = ill(Op::Isc, "ISC", Izy, 2, 8);
    t[0xF4] = ill(Op::Nop, "NOP", Zpx, 2, 4);
    t[0xF5] = doc(Op::Sbc, "SBC", Zpx, 2, 4);
    t[0xF6] = doc(Op::Inc, "INC", Zpx, 2, 6);
    t[0xF7] = ill(Op::Isc, "ISC", Zpx, 2, 6);
    t[0xF8] = doc(Op::Sed, "SED", Imp, 1, 2);
    t[0xF9] = doc(Op::Sbc, "SBC", Aby, 3, 4);
    t[0xFA] = ill(Op::Nop, "NOP", Imp, 1, 2);
    t[0xFB] = ill(Op::Isc, "ISC", Aby, 3, 7);
    t[0xFC] = ill(Op::Nop, "NOP", Abx, 3, 4);
    t[0xFD] = doc(Op::Sbc, "SBC", Abx, 3, 4);
    t[0xFE] = doc(Op::Inc, "INC", Abx, 3, 7);
    t[0xFF] = ill(Op::Isc, "ISC", Abx, 3, 7);

    t
}

const fn build_cmos() -> [Opcode; 256] {
    let mut t = build_nmos();
    let mut i = 0;
    while i < 256 {
        if t[i].illegal {
            // JAM opcodes shrink to single-byte NOPs; everything else keeps
            // its NMOS length and cycle count.
            let (mode, bytes, cycles) = if matches!(t[i].op, Op::Jam) {
                (Mode::Implied, 1, 2)
            } else {
                (t[i].mode, t[i].bytes, t[i].cycles)
            };
            t[i] = Opcode {
                op: Op::Nop,
                mnemonic: "NOP",
                mode,
                bytes,
                cycles,
                illegal: true,
            };
        }
        i += 1;
    }
    t
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn every_entry_is_assigned() {
        // The default fill is JAM; only the twelve real JAM opcodes may
        // remain after table construction.
        let jams: Vec<u8> = (0u16..256)
            .filter(|&i| matches!(NMOS[i as usize].op, Op::Jam))
            .map(|i| i as u8)
            .collect();
        assert_eq!(
            jams,
            vec![0x02, 0x12, 0x22, 0x32, 0x42, 0x52, 0x62, 0x72, 0x92, 0xB2, 0xD2, 0xF2]
        );
    }

    #[test]
    fn documented_count() {
        let count = NMOS.iter().filter(|e| !e.illegal).count();
        assert_eq!(count, 151);
    }

    #[test]
    fn cmos_has_no_illegal_semantics() {
        for entry in &CMOS {
            if entry.illegal {
                assert!(matches!(entry.op, Op::Nop));
            }
        }
    }

    #[test]
    fn cmos_keeps_nmos_lengths() {
        // ANC #imm stays a 2-byte 2-cycle NOP on CMOS.
        assert_eq!(CMOS[0x0B].bytes, 2);
        assert_eq!(CMOS[0x0B].cycles, 2);
        // SLO abs,X stays 3 bytes.
        assert_eq!(CMOS[0x1F].bytes, 3);
        // JAM opcodes become 1-byte NOPs.
        assert_eq!(CMOS[0x02].bytes, 1);
        assert!(matches!(CMOS[0x02].op, Op::Nop));
    }

    #[test]
    fn byte_counts_match_modes() {
        for entry in &NMOS {
            let expected = match entry.mode {
                Mode::Implied | Mode::Accumulator => 1,
                Mode::Absolute | Mode::AbsoluteX | Mode::AbsoluteY | Mode::Indirect => 3,
                _ => 2,
            };
            assert_eq!(entry.bytes, expected, "{} {:?}", entry.mnemonic, entry.mode);
        }
    }
}
