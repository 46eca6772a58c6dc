//! Machine-level errors.

use std::path::PathBuf;

use format_d64::D64Error;
use mos_6502::CpuError;
use thiserror::Error;

/// ROM loading failures. The message names the expected file and directory
/// so a missing ROM is immediately actionable.
#[derive(Debug, Error)]
pub enum RomError {
    #[error("{description} ROM not found in {dir}; expected one of: {}", candidates.join(", "))]
    Missing {
        description: &'static str,
        dir: PathBuf,
        candidates: Vec<String>,
    },

    #[error("{description} ROM {path} is {actual} bytes (expected {expected})")]
    WrongSize {
        description: &'static str,
        path: PathBuf,
        expected: usize,
        actual: usize,
    },

    #[error("failed to read {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
}

/// Errors surfaced by the machine.
#[derive(Debug, Error)]
pub enum C64Error {
    #[error(transparent)]
    Rom(#[from] RomError),

    #[error(transparent)]
    Cpu(#[from] CpuError),

    #[error(transparent)]
    Disk(#[from] D64Error),

    #[error("no 1541 drive attached")]
    DriveNotAttached,

    #[error("PRG file too short: {0} bytes")]
    BadProgram(usize),

    #[error("1541 DOS ROM must be 16384 bytes, got {0}")]
    BadDriveRom(usize),
}
