//! Table-driven disassembler.
//!
//! Shares the decode tables with the execution core, so every opcode —
//! documented or illegal — renders with its real mnemonic and length.
//! Used by crash reports to show the instructions around PC.

use crate::Variant;
use crate::decode::{self, Mode};

/// Disassemble one instruction at `addr`, reading bytes through `peek`.
///
/// Returns the formatted line and the address of the next instruction.
pub fn disassemble<F: FnMut(u16) -> u8>(
    variant: Variant,
    addr: u16,
    mut peek: F,
) -> (String, u16) {
    let table = if variant.is_cmos() {
        &decode::CMOS
    } else {
        &decode::NMOS
    };

    let opcode = peek(addr);
    let entry = &table[opcode as usize];
    let b1 = peek(addr.wrapping_add(1));
    let b2 = peek(addr.wrapping_add(2));
    let word = u16::from(b1) | (u16::from(b2) << 8);

    let operand = match entry.mode {
        Mode::Implied => String::new(),
        Mode::Accumulator => "A".to_string(),
        Mode::Immediate => format!("#${b1:02X}"),
        Mode::ZeroPage => format!("${b1:02X}"),
        Mode::ZeroPageX => format!("${b1:02X},X"),
        Mode::ZeroPageY => format!("${b1:02X},Y"),
        Mode::Absolute => format!("${word:04X}"),
        Mode::AbsoluteX => format!("${word:04X},X"),
        Mode::AbsoluteY => format!("${word:04X},Y"),
        Mode::Indirect => format!("(${word:04X})"),
        Mode::IndexedIndirect => format!("(${b1:02X},X)"),
        Mode::IndirectIndexed => format!("(${b1:02X}),Y"),
        Mode::Relative => {
            let target = addr.wrapping_add(2).wrapping_add(b1 as i8 as u16);
            format!("${target:04X}")
        }
    };

    let raw = match entry.bytes {
        1 => format!("{opcode:02X}      "),
        2 => format!("{opcode:02X} {b1:02X}   "),
        _ => format!("{opcode:02X} {b1:02X} {b2:02X}"),
    };

    let line = if operand.is_empty() {
        format!("${addr:04X}  {raw}  {}", entry.mnemonic)
    } else {
        format!("${addr:04X}  {raw}  {} {operand}", entry.mnemonic)
    };

    (line, addr.wrapping_add(u16::from(entry.bytes)))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn formats_absolute() {
        let bytes = [0x8D, 0x20, 0xD0]; // STA $D020
        let (line, next) = disassemble(Variant::Nmos6502, 0x0400, |a| {
            bytes.get((a - 0x0400) as usize).copied().unwrap_or(0)
        });
        assert!(line.contains("STA $D020"), "{line}");
        assert_eq!(next, 0x0403);
    }

    #[test]
    fn formats_branch_target() {
        let bytes = [0xD0, 0xFE]; // BNE *-0 (self)
        let (line, _) = disassemble(Variant::Nmos6502, 0x0400, |a| {
            bytes.get((a - 0x0400) as usize).copied().unwrap_or(0)
        });
        assert!(line.contains("BNE $0400"), "{line}");
    }

    #[test]
    fn illegal_mnemonics_render_on_nmos() {
        let bytes = [0xC7, 0x10]; // DCP $10
        let (line, _) = disassemble(Variant::Nmos6502, 0x0400, |a| {
            bytes.get((a - 0x0400) as usize).copied().unwrap_or(0)
        });
        assert!(line.contains("DCP $10"), "{line}");

        // The same bytes on CMOS render as NOP.
        let (line, _) = disassemble(Variant::Cmos65C02, 0x0400, |a| {
            bytes.get((a - 0x0400) as usize).copied().unwrap_or(0)
        });
        assert!(line.contains("NOP"), "{line}");
    }
}
