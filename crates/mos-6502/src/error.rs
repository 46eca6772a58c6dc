//! Execution errors and stop conditions.

use emu_core::QuitRequest;
use thiserror::Error;

/// Why `execute` returned without an error.
///
/// `CyclesExhausted` is the normal mid-stream sentinel: the budget ran out
/// at an instruction boundary and the caller resumes with another call.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Stop {
    /// The cycle budget reached zero or below.
    CyclesExhausted,
    /// The requested instruction count was executed.
    InstructionLimit,
}

/// Faults raised by the execution loop.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum CpuError {
    /// A JAM opcode halted an NMOS part. Only reset recovers.
    #[error("CPU halted by JAM instruction ${opcode:02X} at ${address:04X}")]
    Halted { opcode: u8, address: u16 },

    /// BRK executed with no IRQ vector installed; the program effectively
    /// exited. The host decides whether this is fatal.
    #[error("BRK executed at ${address:04X} with no IRQ handler installed")]
    Break { address: u16 },

    /// Decode reached an unassigned entry. The table is total, so this is
    /// an assertion, not an expected runtime path.
    #[error("illegal opcode ${opcode:02X} at ${address:04X}")]
    IllegalInstruction { opcode: u8, address: u16 },

    /// A peripheral callback requested shutdown.
    #[error(transparent)]
    Quit(#[from] QuitRequest),
}
