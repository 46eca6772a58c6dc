//! Undocumented opcode behavior across CPU variants.
//!
//! The stable illegals have fixed combined semantics; the unstable ones
//! (ANE/LXA and the SHA/SHX/SHY/TAS family) follow the widely documented
//! formulas with the variant-specific magic constant. On the CMOS 65C02
//! every one of these decodes as a NOP.

use emu_core::SimpleBus;
use mos_6502::{CpuError, Mos6502, Variant, flag};

fn setup_variant(variant: Variant, program: &[u8]) -> (Mos6502, SimpleBus) {
    let mut bus = SimpleBus::new();
    bus.poke(0xFFFC, 0x00);
    bus.poke(0xFFFD, 0x04);
    bus.load(0x0400, program);
    let mut cpu = Mos6502::new(variant);
    cpu.reset(&mut bus);
    (cpu, bus)
}

fn setup(program: &[u8]) -> (Mos6502, SimpleBus) {
    setup_variant(Variant::Nmos6502, program)
}

#[test]
fn slo_shifts_then_ors() {
    let (mut cpu, mut bus) = setup(&[0x07, 0x10]); // SLO $10
    bus.poke(0x0010, 0x81);
    cpu.regs.a = 0x01;
    cpu.step(&mut bus).expect("slo");
    assert_eq!(bus.peek(0x0010), 0x02);
    assert_eq!(cpu.regs.a, 0x03);
    assert!(cpu.regs.p.is_set(flag::C)); // bit 7 went out
}

#[test]
fn rla_rotates_then_ands() {
    let (mut cpu, mut bus) = setup(&[0x38, 0x27, 0x10]); // SEC; RLA $10
    bus.poke(0x0010, 0x40);
    cpu.regs.a = 0xFF;
    cpu.step(&mut bus).expect("sec");
    cpu.step(&mut bus).expect("rla");
    assert_eq!(bus.peek(0x0010), 0x81); // rotated with carry in
    assert_eq!(cpu.regs.a, 0x81);
}

#[test]
fn sre_shifts_right_then_eors() {
    let (mut cpu, mut bus) = setup(&[0x47, 0x10]); // SRE $10
    bus.poke(0x0010, 0x03);
    cpu.regs.a = 0xFF;
    cpu.step(&mut bus).expect("sre");
    assert_eq!(bus.peek(0x0010), 0x01);
    assert_eq!(cpu.regs.a, 0xFE);
    assert!(cpu.regs.p.is_set(flag::C)); // bit 0 went out
}

#[test]
fn rra_rotates_then_adds() {
    let (mut cpu, mut bus) = setup(&[0x67, 0x10]); // RRA $10
    bus.poke(0x0010, 0x02);
    cpu.regs.a = 0x10;
    cpu.step(&mut bus).expect("rra");
    assert_eq!(bus.peek(0x0010), 0x01);
    // ADC of the rotated value with the rotate's carry-out (0).
    assert_eq!(cpu.regs.a, 0x11);
}

#[test]
fn isc_increments_then_subtracts() {
    let (mut cpu, mut bus) = setup(&[0x38, 0xE7, 0x10]); // SEC; ISC $10
    bus.poke(0x0010, 0x0F);
    cpu.regs.a = 0x20;
    cpu.step(&mut bus).expect("sec");
    cpu.step(&mut bus).expect("isc");
    assert_eq!(bus.peek(0x0010), 0x10);
    assert_eq!(cpu.regs.a, 0x10);
}

#[test]
fn alr_ands_then_shifts() {
    let (mut cpu, mut bus) = setup(&[0x4B, 0xFF]); // ALR #$FF
    cpu.regs.a = 0x03;
    cpu.step(&mut bus).expect("alr");
    assert_eq!(cpu.regs.a, 0x01);
    assert!(cpu.regs.p.is_set(flag::C));
}

#[test]
fn arr_flag_quirks() {
    // ARR with C=1: A = ((A & imm) >> 1) | $80; C = bit 6, V = bit6 ^ bit5.
    let (mut cpu, mut bus) = setup(&[0x38, 0x6B, 0xFF]); // SEC; ARR #$FF
    cpu.regs.a = 0xC0;
    cpu.step(&mut bus).expect("sec");
    cpu.step(&mut bus).expect("arr");
    assert_eq!(cpu.regs.a, 0xE0);
    assert!(cpu.regs.p.is_set(flag::C)); // bit 6 set
    assert!(!cpu.regs.p.is_set(flag::V)); // bit6 == bit5
}

#[test]
fn sbx_subtracts_from_a_and_x() {
    let (mut cpu, mut bus) = setup(&[0xCB, 0x02]); // SBX #$02
    cpu.regs.a = 0x0F;
    cpu.regs.x = 0x07;
    cpu.step(&mut bus).expect("sbx");
    assert_eq!(cpu.regs.x, 0x05); // (A & X) - imm
    assert!(cpu.regs.p.is_set(flag::C));
}

#[test]
fn anc_copies_n_into_c() {
    for opcode in [0x0B, 0x2B] {
        let (mut cpu, mut bus) = setup(&[opcode, 0x80]);
        cpu.regs.a = 0xFF;
        cpu.step(&mut bus).expect("anc");
        assert_eq!(cpu.regs.a, 0x80);
        assert!(cpu.regs.p.is_set(flag::N));
        assert!(cpu.regs.p.is_set(flag::C));
    }
}

#[test]
fn ane_formula_with_magic_const() {
    // A = (A | CONST) & X & imm
    let cases = [
        (Variant::Nmos6502, 0x00u8, 0xFFu8, 0x55u8, 0x55u8),
        (Variant::Nmos6502A, 0xAA, 0xFF, 0xF0, 0xF0),
        (Variant::Nmos6502C, 0xAA, 0xFF, 0xF0, 0xE0), // CONST=$EE
    ];
    for (variant, a, x, imm, expected) in cases {
        let (mut cpu, mut bus) = setup_variant(variant, &[0x8B, imm]);
        cpu.regs.a = a;
        cpu.regs.x = x;
        cpu.step(&mut bus).expect("ane");
        assert_eq!(cpu.regs.a, expected, "{variant} ANE #{imm:02X}");
    }
}

#[test]
fn lxa_loads_a_and_x() {
    let (mut cpu, mut bus) = setup(&[0xAB, 0x55]); // LXA #$55
    cpu.regs.a = 0x00;
    cpu.step(&mut bus).expect("lxa");
    // (A | $FF) & imm = imm on the 6502.
    assert_eq!(cpu.regs.a, 0x55);
    assert_eq!(cpu.regs.x, 0x55);
}

#[test]
fn shx_and_shy_store_masked() {
    let (mut cpu, mut bus) = setup(&[0x9E, 0x00, 0x30]); // SHX $3000,Y
    cpu.regs.x = 0xFF;
    cpu.regs.y = 0x00;
    cpu.step(&mut bus).expect("shx");
    assert_eq!(bus.peek(0x3000), 0x31);

    let (mut cpu, mut bus) = setup(&[0x9C, 0x00, 0x30]); // SHY $3000,X
    cpu.regs.y = 0xFF;
    cpu.regs.x = 0x00;
    cpu.step(&mut bus).expect("shy");
    assert_eq!(bus.peek(0x3000), 0x31);
}

#[test]
fn las_loads_a_x_s_from_memory_and_s() {
    let (mut cpu, mut bus) = setup(&[0xBB, 0x00, 0x30]); // LAS $3000,Y
    bus.poke(0x3000, 0x0F);
    cpu.regs.s = 0x35;
    cpu.regs.y = 0x00;
    cpu.step(&mut bus).expect("las");
    assert_eq!(cpu.regs.a, 0x05);
    assert_eq!(cpu.regs.x, 0x05);
    assert_eq!(cpu.regs.s, 0x05);
}

#[test]
fn all_jam_opcodes_halt_nmos() {
    for opcode in [
        0x02u8, 0x12, 0x22, 0x32, 0x42, 0x52, 0x62, 0x72, 0x92, 0xB2, 0xD2, 0xF2,
    ] {
        let (mut cpu, mut bus) = setup(&[opcode]);
        let err = cpu.step(&mut bus).unwrap_err();
        assert_eq!(
            err,
            CpuError::Halted {
                opcode,
                address: 0x0400
            }
        );
        assert!(cpu.is_halted());
    }
}

#[test]
fn all_jam_opcodes_are_nops_on_cmos() {
    for opcode in [
        0x02u8, 0x12, 0x22, 0x32, 0x42, 0x52, 0x62, 0x72, 0x92, 0xB2, 0xD2, 0xF2,
    ] {
        let (mut cpu, mut bus) = setup_variant(Variant::Cmos65C02, &[opcode, 0xEA]);
        let consumed = cpu.step(&mut bus).expect("cmos nop");
        assert!(!cpu.is_halted());
        assert_eq!(cpu.regs.pc, 0x0401, "${opcode:02X} must be 1 byte");
        assert_eq!(consumed, 2);
    }
}

#[test]
fn reset_recovers_from_jam() {
    let (mut cpu, mut bus) = setup(&[0x02]);
    let _ = cpu.step(&mut bus);
    assert!(cpu.is_halted());
    cpu.reset(&mut bus);
    assert!(!cpu.is_halted());
    assert_eq!(cpu.regs.pc, 0x0400);
}

#[test]
fn cmos_demotes_every_illegal_to_nop() {
    // Sweep all NMOS-illegal opcodes on the 65C02: registers and memory
    // must be untouched, PC must advance by the table byte count.
    for opcode in 0u16..=0xFF {
        let entry = &mos_6502::decode::NMOS[opcode as usize];
        if !entry.illegal {
            continue;
        }
        let cmos = &mos_6502::decode::CMOS[opcode as usize];
        let (mut cpu, mut bus) = setup_variant(Variant::Cmos65C02, &[opcode as u8, 0x10, 0x02]);
        cpu.regs.a = 0x5A;
        cpu.regs.x = 0xA5;
        bus.poke(0x0010, 0x33);
        cpu.step(&mut bus).expect("cmos nop");
        assert_eq!(cpu.regs.a, 0x5A, "${opcode:02X} touched A");
        assert_eq!(cpu.regs.x, 0xA5, "${opcode:02X} touched X");
        assert_eq!(bus.peek(0x0010), 0x33, "${opcode:02X} wrote memory");
        assert_eq!(
            cpu.regs.pc,
            0x0400 + u16::from(cmos.bytes),
            "${opcode:02X} wrong CMOS length"
        );
    }
}
