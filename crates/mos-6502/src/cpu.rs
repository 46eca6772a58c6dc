//! 6502 CPU execution core.
//!
//! Instructions execute atomically against a cycle budget: each call to
//! [`Mos6502::execute`] is given a number of cycles, every memory access
//! bills one cycle, and a retiring instruction always consumes its full
//! documented cost even if that drives the budget negative. Execution
//! stops cleanly at the next instruction boundary and resumes from exactly
//! that state on the following call, which is what lets a host run the CPU
//! in frame-sized batches.
//!
//! After every retired instruction (or interrupt sequence) the consumed
//! cycle count is handed to [`Bus::tick`]; the machine advances its
//! peripherals there and reports the interrupt line levels back.

use emu_core::Bus;

use crate::decode::{self, Mode, Op, Opcode};
use crate::error::{CpuError, Stop};
use crate::flags::{C, D, I, N, V, Z};
use crate::{Registers, Variant};

/// Reset vector location.
pub const RESET_VECTOR: u16 = 0xFFFC;
/// NMI vector location.
pub const NMI_VECTOR: u16 = 0xFFFA;
/// IRQ/BRK vector location.
pub const IRQ_VECTOR: u16 = 0xFFFE;

/// Budget value for "run until something else stops you".
pub const INFINITE_CYCLES: u64 = u64::MAX;

/// The MOS 6502 CPU (6510 compatible; variant-selectable).
#[derive(Debug)]
pub struct Mos6502 {
    /// CPU registers.
    pub regs: Registers,

    variant: Variant,

    /// Remaining budget for the current `execute` call. Signed: an atomic
    /// instruction may overdraw by up to its own length.
    cycles: i64,

    /// Total cycles consumed since power-on. Monotone.
    cycles_executed: u64,

    /// Set by a JAM opcode on NMOS parts. Only reset clears it.
    halted: bool,
    halt_opcode: u8,

    /// IRQ line level (level-triggered; owned by the interrupt sources).
    irq_line: bool,

    /// NMI line level and the edge latch derived from it.
    nmi_line: bool,
    nmi_pending: bool,

    /// Penalty cycles accumulated by the current instruction (page cross,
    /// branch taken, CMOS decimal).
    penalty: u32,
}

impl Mos6502 {
    /// Create a CPU of the given variant in its post-reset register state.
    ///
    /// PC is not loaded until [`Self::reset`] runs against a bus.
    #[must_use]
    pub fn new(variant: Variant) -> Self {
        Self {
            regs: Registers::new(),
            variant,
            cycles: 0,
            cycles_executed: 0,
            halted: false,
            halt_opcode: 0,
            irq_line: false,
            nmi_line: false,
            nmi_pending: false,
            penalty: 0,
        }
    }

    /// The selected variant.
    #[must_use]
    pub fn variant(&self) -> Variant {
        self.variant
    }

    /// Total cycles consumed since power-on.
    #[must_use]
    pub fn cycles_executed(&self) -> u64 {
        self.cycles_executed
    }

    /// How far the last `execute` call overdrew its budget (0..=7).
    #[must_use]
    pub fn budget_overrun(&self) -> u64 {
        if self.cycles < 0 {
            self.cycles.unsigned_abs()
        } else {
            0
        }
    }

    /// Whether a JAM opcode has locked the processor.
    #[must_use]
    pub fn is_halted(&self) -> bool {
        self.halted
    }

    /// Set the IRQ line level. Level-triggered: the caller keeps it
    /// asserted until the source's ICR is acknowledged.
    pub fn set_irq_line(&mut self, asserted: bool) {
        self.irq_line = asserted;
    }

    /// Set the NMI line level. Edge-triggered: only a released→asserted
    /// transition latches a pending NMI.
    pub fn set_nmi_line(&mut self, asserted: bool) {
        if asserted && !self.nmi_line {
            self.nmi_pending = true;
        }
        self.nmi_line = asserted;
    }

    /// The SO pin: set the overflow flag directly. The 1541 wires its
    /// byte-ready signal here so the DOS can spin on BVC.
    pub fn set_overflow(&mut self) {
        self.regs.p.set(V);
    }

    /// Hardware reset: S to $FD, P to $34, PC from the reset vector,
    /// exactly 7 cycles. RAM is untouched.
    pub fn reset<B: Bus>(&mut self, bus: &mut B) {
        self.regs = Registers::new();
        self.halted = false;
        self.halt_opcode = 0;
        self.irq_line = false;
        self.nmi_line = false;
        self.nmi_pending = false;

        let start = self.cycles_executed;
        let lo = self.read(bus, RESET_VECTOR);
        let hi = self.read(bus, RESET_VECTOR.wrapping_add(1));
        self.regs.pc = u16::from(lo) | (u16::from(hi) << 8);
        self.top_up(start, 7);
        log::debug!("reset: PC=${:04X} ({})", self.regs.pc, self.variant);
    }

    /// Run until the cycle budget is exhausted, the optional instruction
    /// limit is reached, or a fault occurs.
    ///
    /// Budget exhaustion is the normal outcome (`Ok(Stop::CyclesExhausted)`)
    /// — call again to resume mid-stream. Chunked calls whose budgets sum
    /// to N reach the same state as one call of N, modulo a per-chunk
    /// overshoot bounded by the longest instruction.
    pub fn execute<B: Bus>(
        &mut self,
        bus: &mut B,
        cycles: u64,
        max_instructions: Option<u64>,
    ) -> Result<Stop, CpuError> {
        self.cycles = i64::try_from(cycles).unwrap_or(i64::MAX);
        let mut remaining = max_instructions;

        loop {
            if remaining == Some(0) {
                return Ok(Stop::InstructionLimit);
            }
            if self.cycles <= 0 {
                return Ok(Stop::CyclesExhausted);
            }

            let consumed = if self.nmi_pending {
                self.nmi_pending = false;
                self.service_interrupt(bus, NMI_VECTOR)
            } else if self.irq_line && !self.regs.p.is_set(I) {
                self.service_interrupt(bus, IRQ_VECTOR)
            } else if self.halted {
                return Err(CpuError::Halted {
                    opcode: self.halt_opcode,
                    address: self.regs.pc,
                });
            } else {
                self.step_instruction(bus)?
            };

            let signals = bus.tick(consumed)?;
            self.set_irq_line(signals.irq);
            self.set_nmi_line(signals.nmi);

            if let Some(n) = remaining.as_mut() {
                *n -= 1;
            }
        }
    }

    /// Execute exactly one instruction (servicing a pending interrupt
    /// first). Returns the cycles consumed.
    pub fn step<B: Bus>(&mut self, bus: &mut B) -> Result<u32, CpuError> {
        let before = self.cycles_executed;
        self.execute(bus, INFINITE_CYCLES, Some(1))?;
        Ok((self.cycles_executed - before) as u32)
    }

    // ------------------------------------------------------------------
    // Cycle accounting and memory protocol
    // ------------------------------------------------------------------

    fn spend(&mut self, n: u32) {
        self.cycles -= i64::from(n);
        self.cycles_executed += u64::from(n);
    }

    /// Spend whatever remains to bring the span since `start` up to
    /// `total` cycles (internal cycles not tied to a memory access).
    fn top_up(&mut self, start: u64, total: u64) {
        let used = self.cycles_executed - start;
        if used < total {
            self.spend((total - used) as u32);
        }
    }

    fn read<B: Bus>(&mut self, bus: &mut B, addr: u16) -> u8 {
        self.spend(1);
        bus.read(addr)
    }

    fn write<B: Bus>(&mut self, bus: &mut B, addr: u16, value: u8) {
        self.spend(1);
        bus.write(addr, value);
    }

    /// Read the byte at PC and advance PC by 1.
    fn fetch_byte<B: Bus>(&mut self, bus: &mut B) -> u8 {
        let value = self.read(bus, self.regs.pc);
        self.regs.pc = self.regs.pc.wrapping_add(1);
        value
    }

    /// Read a little-endian word at PC and advance PC by exactly 2.
    fn fetch_word<B: Bus>(&mut self, bus: &mut B) -> u16 {
        let lo = self.fetch_byte(bus);
        let hi = self.fetch_byte(bus);
        u16::from(lo) | (u16::from(hi) << 8)
    }

    fn push<B: Bus>(&mut self, bus: &mut B, value: u8) {
        let addr = self.regs.push();
        self.write(bus, addr, value);
    }

    fn pull<B: Bus>(&mut self, bus: &mut B) -> u8 {
        let addr = self.regs.pull();
        self.read(bus, addr)
    }

    // ------------------------------------------------------------------
    // Interrupts
    // ------------------------------------------------------------------

    /// 7-cycle interrupt sequence: push PCH, PCL, P (B clear), set I,
    /// load PC from `vector`.
    fn service_interrupt<B: Bus>(&mut self, bus: &mut B, vector: u16) -> u32 {
        let start = self.cycles_executed;
        let pc = self.regs.pc;
        self.push(bus, (pc >> 8) as u8);
        self.push(bus, pc as u8);
        let p = self.regs.p.to_byte_irq();
        self.push(bus, p);
        self.regs.p.set(I);
        let lo = self.read(bus, vector);
        let hi = self.read(bus, vector.wrapping_add(1));
        self.regs.pc = u16::from(lo) | (u16::from(hi) << 8);
        self.top_up(start, 7);
        log::trace!(
            "interrupt via ${vector:04X} -> ${:04X} (from ${pc:04X})",
            self.regs.pc
        );
        (self.cycles_executed - start) as u32
    }

    // ------------------------------------------------------------------
    // Instruction execution
    // ------------------------------------------------------------------

    fn decode_table(&self) -> &'static [Opcode; 256] {
        if self.variant.is_cmos() {
            &decode::CMOS
        } else {
            &decode::NMOS
        }
    }

    fn step_instruction<B: Bus>(&mut self, bus: &mut B) -> Result<u32, CpuError> {
        let pc0 = self.regs.pc;
        let start = self.cycles_executed;
        self.penalty = 0;

        let opcode = self.fetch_byte(bus);
        let entry = &self.decode_table()[opcode as usize];
        log::trace!("${pc0:04X}  {} ({opcode:02X})", entry.mnemonic);

        self.exec(bus, opcode, entry, pc0)?;

        let total = u64::from(entry.cycles) + u64::from(self.penalty);
        self.top_up(start, total);
        Ok((self.cycles_executed - start) as u32)
    }

    #[allow(clippy::too_many_lines)]
    fn exec<B: Bus>(
        &mut self,
        bus: &mut B,
        opcode: u8,
        entry: &Opcode,
        pc0: u16,
    ) -> Result<(), CpuError> {
        match entry.op {
            // Loads and stores
            Op::Lda => {
                let v = self.operand(bus, entry.mode);
                self.regs.a = v;
                self.regs.p.update_nz(v);
            }
            Op::Ldx => {
                let v = self.operand(bus, entry.mode);
                self.regs.x = v;
                self.regs.p.update_nz(v);
            }
            Op::Ldy => {
                let v = self.operand(bus, entry.mode);
                self.regs.y = v;
                self.regs.p.update_nz(v);
            }
            Op::Sta => {
                let addr = self.effective_addr(bus, entry.mode, false);
                let a = self.regs.a;
                self.write(bus, addr, a);
            }
            Op::Stx => {
                let addr = self.effective_addr(bus, entry.mode, false);
                let x = self.regs.x;
                self.write(bus, addr, x);
            }
            Op::Sty => {
                let addr = self.effective_addr(bus, entry.mode, false);
                let y = self.regs.y;
                self.write(bus, addr, y);
            }

            // ALU
            Op::Adc => {
                let v = self.operand(bus, entry.mode);
                self.adc(v);
            }
            Op::Sbc => {
                let v = self.operand(bus, entry.mode);
                self.sbc(v);
            }
            Op::And => {
                let v = self.operand(bus, entry.mode);
                self.regs.a &= v;
                self.regs.p.update_nz(self.regs.a);
            }
            Op::Ora => {
                let v = self.operand(bus, entry.mode);
                self.regs.a |= v;
                self.regs.p.update_nz(self.regs.a);
            }
            Op::Eor => {
                let v = self.operand(bus, entry.mode);
                self.regs.a ^= v;
                self.regs.p.update_nz(self.regs.a);
            }
            Op::Cmp => {
                let v = self.operand(bus, entry.mode);
                self.compare(self.regs.a, v);
            }
            Op::Cpx => {
                let v = self.operand(bus, entry.mode);
                self.compare(self.regs.x, v);
            }
            Op::Cpy => {
                let v = self.operand(bus, entry.mode);
                self.compare(self.regs.y, v);
            }
            Op::Bit => {
                let v = self.operand(bus, entry.mode);
                self.regs.p.set_if(Z, self.regs.a & v == 0);
                self.regs.p.set_if(N, v & 0x80 != 0);
                self.regs.p.set_if(V, v & 0x40 != 0);
            }

            // Shifts and rotates
            Op::Asl => self.shift(bus, entry.mode, Self::do_asl),
            Op::Lsr => self.shift(bus, entry.mode, Self::do_lsr),
            Op::Rol => self.shift(bus, entry.mode, Self::do_rol),
            Op::Ror => self.shift(bus, entry.mode, Self::do_ror),

            // Increments and decrements
            Op::Inc => {
                let addr = self.effective_addr(bus, entry.mode, false);
                self.rmw(bus, addr, |cpu, v| {
                    let r = v.wrapping_add(1);
                    cpu.regs.p.update_nz(r);
                    r
                });
            }
            Op::Dec => {
                let addr = self.effective_addr(bus, entry.mode, false);
                self.rmw(bus, addr, |cpu, v| {
                    let r = v.wrapping_sub(1);
                    cpu.regs.p.update_nz(r);
                    r
                });
            }
            Op::Inx => {
                self.regs.x = self.regs.x.wrapping_add(1);
                self.regs.p.update_nz(self.regs.x);
            }
            Op::Iny => {
                self.regs.y = self.regs.y.wrapping_add(1);
                self.regs.p.update_nz(self.regs.y);
            }
            Op::Dex => {
                self.regs.x = self.regs.x.wrapping_sub(1);
                self.regs.p.update_nz(self.regs.x);
            }
            Op::Dey => {
                self.regs.y = self.regs.y.wrapping_sub(1);
                self.regs.p.update_nz(self.regs.y);
            }

            // Transfers
            Op::Tax => {
                self.regs.x = self.regs.a;
                self.regs.p.update_nz(self.regs.x);
            }
            Op::Tay => {
                self.regs.y = self.regs.a;
                self.regs.p.update_nz(self.regs.y);
            }
            Op::Txa => {
                self.regs.a = self.regs.x;
                self.regs.p.update_nz(self.regs.a);
            }
            Op::Tya => {
                self.regs.a = self.regs.y;
                self.regs.p.update_nz(self.regs.a);
            }
            Op::Tsx => {
                self.regs.x = self.regs.s;
                self.regs.p.update_nz(self.regs.x);
            }
            Op::Txs => {
                // TXS does not affect flags.
                self.regs.s = self.regs.x;
            }

            // Stack
            Op::Pha => {
                let a = self.regs.a;
                self.push(bus, a);
            }
            Op::Php => {
                let p = self.regs.p.to_byte_brk();
                self.push(bus, p);
            }
            Op::Pla => {
                let v = self.pull(bus);
                self.regs.a = v;
                self.regs.p.update_nz(v);
            }
            Op::Plp => {
                let v = self.pull(bus);
                self.regs.p = self.regs.p.from_pull(v);
            }

            // Flow control
            Op::Jmp => {
                let addr = self.effective_addr(bus, entry.mode, false);
                self.regs.pc = addr;
            }
            Op::Jsr => {
                let target = self.fetch_word(bus);
                // Push the address of the JSR's last byte (PC+2 from the
                // opcode); PC already advanced past all three bytes.
                let ret = self.regs.pc.wrapping_sub(1);
                self.push(bus, (ret >> 8) as u8);
                self.push(bus, ret as u8);
                self.regs.pc = target;
            }
            Op::Rts => {
                let lo = self.pull(bus);
                let hi = self.pull(bus);
                self.regs.pc = (u16::from(lo) | (u16::from(hi) << 8)).wrapping_add(1);
            }
            Op::Rti => {
                let p = self.pull(bus);
                self.regs.p = self.regs.p.from_pull(p);
                let lo = self.pull(bus);
                let hi = self.pull(bus);
                // No +1: RTI restores the pushed PC exactly.
                self.regs.pc = u16::from(lo) | (u16::from(hi) << 8);
            }
            Op::Brk => {
                // 2-byte instruction: the signature byte is skipped.
                let ret = self.regs.pc.wrapping_add(1);
                self.push(bus, (ret >> 8) as u8);
                self.push(bus, ret as u8);
                let p = self.regs.p.to_byte_brk();
                self.push(bus, p);
                self.regs.p.set(I);
                let lo = self.read(bus, IRQ_VECTOR);
                let hi = self.read(bus, IRQ_VECTOR.wrapping_add(1));
                let vector = u16::from(lo) | (u16::from(hi) << 8);
                self.regs.pc = vector;
                if vector == 0x0000 {
                    return Err(CpuError::Break { address: pc0 });
                }
            }

            Op::Bpl => self.branch(bus, !self.regs.p.is_set(N)),
            Op::Bmi => self.branch(bus, self.regs.p.is_set(N)),
            Op::Bvc => self.branch(bus, !self.regs.p.is_set(V)),
            Op::Bvs => self.branch(bus, self.regs.p.is_set(V)),
            Op::Bcc => self.branch(bus, !self.regs.p.is_set(C)),
            Op::Bcs => self.branch(bus, self.regs.p.is_set(C)),
            Op::Bne => self.branch(bus, !self.regs.p.is_set(Z)),
            Op::Beq => self.branch(bus, self.regs.p.is_set(Z)),

            // Flag manipulation
            Op::Clc => self.regs.p.clear(C),
            Op::Sec => self.regs.p.set(C),
            Op::Cli => self.regs.p.clear(I),
            Op::Sei => self.regs.p.set(I),
            Op::Clv => self.regs.p.clear(V),
            Op::Cld => self.regs.p.clear(D),
            Op::Sed => self.regs.p.set(D),

            // NOPs, documented and otherwise: consume operand bytes only.
            Op::Nop => match entry.mode {
                Mode::Implied => {}
                Mode::Immediate => {
                    let _ = self.fetch_byte(bus);
                }
                _ => {
                    let addr = self.effective_addr(bus, entry.mode, true);
                    let _ = self.read(bus, addr);
                }
            },

            // Stable illegals
            Op::Slo => {
                let addr = self.effective_addr(bus, entry.mode, false);
                self.rmw(bus, addr, |cpu, v| {
                    let r = cpu.do_asl(v);
                    cpu.regs.a |= r;
                    cpu.regs.p.update_nz(cpu.regs.a);
                    r
                });
            }
            Op::Rla => {
                let addr = self.effective_addr(bus, entry.mode, false);
                self.rmw(bus, addr, |cpu, v| {
                    let r = cpu.do_rol(v);
                    cpu.regs.a &= r;
                    cpu.regs.p.update_nz(cpu.regs.a);
                    r
                });
            }
            Op::Sre => {
                let addr = self.effective_addr(bus, entry.mode, false);
                self.rmw(bus, addr, |cpu, v| {
                    let r = cpu.do_lsr(v);
                    cpu.regs.a ^= r;
                    cpu.regs.p.update_nz(cpu.regs.a);
                    r
                });
            }
            Op::Rra => {
                let addr = self.effective_addr(bus, entry.mode, false);
                self.rmw(bus, addr, |cpu, v| {
                    let r = cpu.do_ror(v);
                    cpu.adc(r);
                    r
                });
            }
            Op::Dcp => {
                let addr = self.effective_addr(bus, entry.mode, false);
                self.rmw(bus, addr, |cpu, v| {
                    let r = v.wrapping_sub(1);
                    cpu.compare(cpu.regs.a, r);
                    r
                });
            }
            Op::Isc => {
                let addr = self.effective_addr(bus, entry.mode, false);
                self.rmw(bus, addr, |cpu, v| {
                    let r = v.wrapping_add(1);
                    cpu.sbc(r);
                    r
                });
            }
            Op::Lax => {
                let v = self.operand(bus, entry.mode);
                self.regs.a = v;
                self.regs.x = v;
                self.regs.p.update_nz(v);
            }
            Op::Sax => {
                let addr = self.effective_addr(bus, entry.mode, false);
                let v = self.regs.a & self.regs.x;
                self.write(bus, addr, v);
            }
            Op::Anc => {
                let v = self.fetch_byte(bus);
                self.regs.a &= v;
                self.regs.p.update_nz(self.regs.a);
                self.regs.p.set_if(C, self.regs.a & 0x80 != 0);
            }
            Op::Alr => {
                let v = self.fetch_byte(bus);
                self.regs.a &= v;
                self.regs.p.set_if(C, self.regs.a & 0x01 != 0);
                self.regs.a >>= 1;
                self.regs.p.update_nz(self.regs.a);
            }
            Op::Arr => {
                let v = self.fetch_byte(bus);
                self.regs.a &= v;
                let carry_in = if self.regs.p.is_set(C) { 0x80 } else { 0 };
                self.regs.a = (self.regs.a >> 1) | carry_in;
                self.regs.p.update_nz(self.regs.a);
                // C = bit 6, V = bit 6 xor bit 5 of the result.
                self.regs.p.set_if(C, self.regs.a & 0x40 != 0);
                self.regs
                    .p
                    .set_if(V, (self.regs.a & 0x40 != 0) != (self.regs.a & 0x20 != 0));
            }
            Op::Sbx => {
                let v = self.fetch_byte(bus);
                let tmp = self.regs.a & self.regs.x;
                self.regs.p.set_if(C, tmp >= v);
                self.regs.x = tmp.wrapping_sub(v);
                self.regs.p.update_nz(self.regs.x);
            }

            // Unstable illegals
            Op::Ane => {
                let v = self.fetch_byte(bus);
                self.regs.a = (self.regs.a | self.variant.magic_const()) & self.regs.x & v;
                self.regs.p.update_nz(self.regs.a);
            }
            Op::Lxa => {
                let v = self.fetch_byte(bus);
                let r = (self.regs.a | self.variant.magic_const()) & v;
                self.regs.a = r;
                self.regs.x = r;
                self.regs.p.update_nz(r);
            }
            Op::Sha => {
                let addr = self.effective_addr(bus, entry.mode, false);
                let v = self.regs.a & self.regs.x & ((addr >> 8) as u8).wrapping_add(1);
                self.write(bus, addr, v);
            }
            Op::Shx => {
                let addr = self.effective_addr(bus, entry.mode, false);
                let v = self.regs.x & ((addr >> 8) as u8).wrapping_add(1);
                self.write(bus, addr, v);
            }
            Op::Shy => {
                let addr = self.effective_addr(bus, entry.mode, false);
                let v = self.regs.y & ((addr >> 8) as u8).wrapping_add(1);
                self.write(bus, addr, v);
            }
            Op::Tas => {
                let addr = self.effective_addr(bus, entry.mode, false);
                self.regs.s = self.regs.a & self.regs.x;
                let v = self.regs.s & ((addr >> 8) as u8).wrapping_add(1);
                self.write(bus, addr, v);
            }
            Op::Las => {
                let v = self.operand(bus, entry.mode);
                let r = v & self.regs.s;
                self.regs.a = r;
                self.regs.x = r;
                self.regs.s = r;
                self.regs.p.update_nz(r);
            }

            // Lock-up (NMOS only; the CMOS table never contains Jam)
            Op::Jam => {
                self.halted = true;
                self.halt_opcode = opcode;
                // PC stays on the JAM opcode.
                self.regs.pc = pc0;
                log::warn!("JAM ${opcode:02X} at ${pc0:04X}: CPU halted");
                return Err(CpuError::Halted {
                    opcode,
                    address: pc0,
                });
            }
        }
        Ok(())
    }

    // ------------------------------------------------------------------
    // Addressing
    // ------------------------------------------------------------------

    /// Read the operand value for a read-class instruction. Indexed modes
    /// add the page-cross penalty cycle.
    fn operand<B: Bus>(&mut self, bus: &mut B, mode: Mode) -> u8 {
        match mode {
            Mode::Immediate => self.fetch_byte(bus),
            Mode::Accumulator => self.regs.a,
            _ => {
                let addr = self.effective_addr(bus, mode, true);
                self.read(bus, addr)
            }
        }
    }

    /// Compute the effective address for the given mode. When
    /// `penalty_on_cross` is set, crossing a page in an indexed mode adds
    /// one penalty cycle (read-class instructions only; stores and RMW pay
    /// the fixed cost from the decode table).
    fn effective_addr<B: Bus>(&mut self, bus: &mut B, mode: Mode, penalty_on_cross: bool) -> u16 {
        match mode {
            Mode::ZeroPage => u16::from(self.fetch_byte(bus)),
            Mode::ZeroPageX => {
                let base = self.fetch_byte(bus);
                u16::from(base.wrapping_add(self.regs.x))
            }
            Mode::ZeroPageY => {
                let base = self.fetch_byte(bus);
                u16::from(base.wrapping_add(self.regs.y))
            }
            Mode::Absolute => self.fetch_word(bus),
            Mode::AbsoluteX => {
                let x = self.regs.x;
                self.indexed(bus, x, penalty_on_cross)
            }
            Mode::AbsoluteY => {
                let y = self.regs.y;
                self.indexed(bus, y, penalty_on_cross)
            }
            Mode::IndexedIndirect => {
                let ptr = self.fetch_byte(bus).wrapping_add(self.regs.x);
                let lo = self.read(bus, u16::from(ptr));
                let hi = self.read(bus, u16::from(ptr.wrapping_add(1)));
                u16::from(lo) | (u16::from(hi) << 8)
            }
            Mode::IndirectIndexed => {
                let ptr = self.fetch_byte(bus);
                let lo = self.read(bus, u16::from(ptr));
                let hi = self.read(bus, u16::from(ptr.wrapping_add(1)));
                let base = u16::from(lo) | (u16::from(hi) << 8);
                let addr = base.wrapping_add(u16::from(self.regs.y));
                if penalty_on_cross && (addr & 0xFF00) != (base & 0xFF00) {
                    self.penalty += 1;
                }
                addr
            }
            Mode::Indirect => {
                // JMP (ind). The NMOS part wraps the high-byte read within
                // the pointer's page; the 65C02 fixes the bug for one extra
                // cycle.
                let ptr = self.fetch_word(bus);
                let lo = self.read(bus, ptr);
                let hi_addr = if self.variant.is_cmos() {
                    self.penalty += 1;
                    ptr.wrapping_add(1)
                } else {
                    (ptr & 0xFF00) | (ptr.wrapping_add(1) & 0x00FF)
                };
                let hi = self.read(bus, hi_addr);
                u16::from(lo) | (u16::from(hi) << 8)
            }
            Mode::Implied | Mode::Accumulator | Mode::Immediate | Mode::Relative => {
                unreachable!("mode {mode:?} has no effective address")
            }
        }
    }

    fn indexed<B: Bus>(&mut self, bus: &mut B, index: u8, penalty_on_cross: bool) -> u16 {
        let base = self.fetch_word(bus);
        let addr = base.wrapping_add(u16::from(index));
        if penalty_on_cross && (addr & 0xFF00) != (base & 0xFF00) {
            self.penalty += 1;
        }
        addr
    }

    /// Branch: +1 cycle when taken, +2 when taken across a page boundary.
    fn branch<B: Bus>(&mut self, bus: &mut B, taken: bool) {
        let offset = self.fetch_byte(bus) as i8;
        if taken {
            let target = self.regs.pc.wrapping_add(offset as u16);
            self.penalty += 1;
            if (target & 0xFF00) != (self.regs.pc & 0xFF00) {
                self.penalty += 1;
            }
            self.regs.pc = target;
        }
    }

    /// Read-modify-write: read, dummy write-back of the original value,
    /// then write the result (the NMOS double-write).
    fn rmw<B: Bus>(&mut self, bus: &mut B, addr: u16, f: fn(&mut Self, u8) -> u8) {
        let v = self.read(bus, addr);
        self.write(bus, addr, v);
        let r = f(self, v);
        self.write(bus, addr, r);
    }

    fn shift<B: Bus>(&mut self, bus: &mut B, mode: Mode, f: fn(&mut Self, u8) -> u8) {
        if mode == Mode::Accumulator {
            let a = self.regs.a;
            self.regs.a = f(self, a);
        } else {
            let addr = self.effective_addr(bus, mode, false);
            self.rmw(bus, addr, f);
        }
    }

    // ------------------------------------------------------------------
    // ALU
    // ------------------------------------------------------------------

    fn compare(&mut self, reg: u8, val: u8) {
        self.regs.p.set_if(C, reg >= val);
        self.regs.p.update_nz(reg.wrapping_sub(val));
    }

    fn do_asl(&mut self, val: u8) -> u8 {
        self.regs.p.set_if(C, val & 0x80 != 0);
        let r = val << 1;
        self.regs.p.update_nz(r);
        r
    }

    fn do_lsr(&mut self, val: u8) -> u8 {
        self.regs.p.set_if(C, val & 0x01 != 0);
        let r = val >> 1;
        self.regs.p.update_nz(r);
        r
    }

    fn do_rol(&mut self, val: u8) -> u8 {
        let carry = u8::from(self.regs.p.is_set(C));
        self.regs.p.set_if(C, val & 0x80 != 0);
        let r = (val << 1) | carry;
        self.regs.p.update_nz(r);
        r
    }

    fn do_ror(&mut self, val: u8) -> u8 {
        let carry = if self.regs.p.is_set(C) { 0x80 } else { 0 };
        self.regs.p.set_if(C, val & 0x01 != 0);
        let r = (val >> 1) | carry;
        self.regs.p.update_nz(r);
        r
    }

    fn adc(&mut self, val: u8) {
        if self.regs.p.is_set(D) {
            if self.variant.is_cmos() {
                self.penalty += 1;
                self.adc_decimal_cmos(val);
            } else {
                self.adc_decimal_nmos(val);
            }
        } else {
            self.adc_binary(val);
        }
    }

    fn adc_binary(&mut self, val: u8) {
        let a = self.regs.a;
        let carry = u16::from(self.regs.p.is_set(C));
        let sum = u16::from(a) + u16::from(val) + carry;
        let result = sum as u8;

        self.regs.p.set_if(C, sum > 0xFF);
        self.regs
            .p
            .set_if(V, (a ^ result) & (val ^ result) & 0x80 != 0);
        self.regs.a = result;
        self.regs.p.update_nz(result);
    }

    /// NMOS decimal ADC: N/V/Z come from intermediate binary values (the
    /// widely documented "garbage" behaviour tests depend on).
    fn adc_decimal_nmos(&mut self, val: u8) {
        let a = self.regs.a;
        let carry = u8::from(self.regs.p.is_set(C));

        let mut lo = (a & 0x0F) + (val & 0x0F) + carry;
        if lo > 9 {
            lo += 6;
        }
        let mut hi = (a >> 4) + (val >> 4) + u8::from(lo > 0x0F);

        let bin_sum = u16::from(a) + u16::from(val) + u16::from(carry);
        let bin_result = bin_sum as u8;
        self.regs.p.set_if(Z, bin_result == 0);
        self.regs.p.set_if(N, hi & 0x08 != 0);
        self.regs
            .p
            .set_if(V, (a ^ bin_result) & (val ^ bin_result) & 0x80 != 0);

        if hi > 9 {
            hi += 6;
        }
        self.regs.p.set_if(C, hi > 0x0F);
        self.regs.a = (hi << 4) | (lo & 0x0F);
    }

    /// 65C02 decimal ADC: canonical N/Z from the decimal result.
    fn adc_decimal_cmos(&mut self, val: u8) {
        let a = self.regs.a;
        let carry = u8::from(self.regs.p.is_set(C));

        let mut lo = (a & 0x0F) + (val & 0x0F) + carry;
        let mut hi = (a >> 4) + (val >> 4);
        if lo > 9 {
            lo += 6;
            hi += 1;
        }

        let bin_sum = u16::from(a) + u16::from(val) + u16::from(carry);
        let bin_result = bin_sum as u8;
        self.regs
            .p
            .set_if(V, (a ^ bin_result) & (val ^ bin_result) & 0x80 != 0);

        if hi > 9 {
            hi += 6;
        }
        self.regs.p.set_if(C, hi > 0x0F);
        self.regs.a = (hi << 4) | (lo & 0x0F);
        self.regs.p.update_nz(self.regs.a);
    }

    fn sbc(&mut self, val: u8) {
        if self.regs.p.is_set(D) {
            if self.variant.is_cmos() {
                self.penalty += 1;
                self.sbc_decimal_cmos(val);
            } else {
                self.sbc_decimal_nmos(val);
            }
        } else {
            // SBC is ADC with the operand inverted.
            self.adc_binary(!val);
        }
    }

    /// NMOS decimal SBC: flags from the binary result.
    fn sbc_decimal_nmos(&mut self, val: u8) {
        let a = self.regs.a;
        let borrow: i16 = i16::from(!self.regs.p.is_set(C));

        let bin_result = i16::from(a) - i16::from(val) - borrow;
        self.regs.p.set_if(C, bin_result >= 0);
        self.regs.p.set_if(Z, (bin_result as u8) == 0);
        self.regs.p.set_if(N, bin_result & 0x80 != 0);
        self.regs.p.set_if(
            V,
            (i16::from(a) ^ bin_result) & (i16::from(a) ^ i16::from(val)) & 0x80 != 0,
        );

        let mut lo = i16::from(a & 0x0F) - i16::from(val & 0x0F) - borrow;
        let mut hi = i16::from(a >> 4) - i16::from(val >> 4);
        if lo < 0 {
            lo -= 6;
            hi -= 1;
        }
        if hi < 0 {
            hi -= 6;
        }
        self.regs.a = ((hi << 4) as u8) | ((lo & 0x0F) as u8);
    }

    /// 65C02 decimal SBC: canonical N/Z from the decimal result.
    fn sbc_decimal_cmos(&mut self, val: u8) {
        let a = self.regs.a;
        let borrow: i16 = i16::from(!self.regs.p.is_set(C));

        let bin_result = i16::from(a) - i16::from(val) - borrow;
        self.regs.p.set_if(C, bin_result >= 0);
        self.regs.p.set_if(
            V,
            (i16::from(a) ^ bin_result) & (i16::from(a) ^ i16::from(val)) & 0x80 != 0,
        );

        let mut lo = i16::from(a & 0x0F) - i16::from(val & 0x0F) - borrow;
        let mut hi = i16::from(a >> 4) - i16::from(val >> 4);
        if lo < 0 {
            lo -= 6;
            hi -= 1;
        }
        if hi < 0 {
            hi -= 6;
        }
        self.regs.a = ((hi << 4) as u8) | ((lo & 0x0F) as u8);
        self.regs.p.update_nz(self.regs.a);
    }
}
