//! Machine configuration and ROM loading.

use std::fs;
use std::path::{Path, PathBuf};

use mos_6502::Variant;
use mos_vic_ii::ChipModel;

use crate::error::RomError;

/// Kernal ROM size.
pub const KERNAL_SIZE: usize = 8192;
/// BASIC ROM size.
pub const BASIC_SIZE: usize = 8192;
/// Character generator ROM size.
pub const CHARGEN_SIZE: usize = 4096;
/// 1541 DOS ROM size.
pub const DRIVE_ROM_SIZE: usize = 16384;

/// How the 1541 runs relative to the host CPU. Both modes are per-cycle
/// lockstep; `Threaded` additionally maintains an atomic mirror of the IEC
/// lines so observers on other threads can read them without locks.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum DriveMode {
    #[default]
    Synchronous,
    Threaded,
}

/// System ROM images.
#[derive(Clone, Debug)]
pub struct RomSet {
    pub kernal: Vec<u8>,
    pub basic: Vec<u8>,
    pub chargen: Vec<u8>,
}

/// Well-known Kernal image filenames, most specific first.
const KERNAL_NAMES: &[&str] = &["kernal.901227-03.bin", "kernal.rom", "kernal"];
/// Well-known BASIC image filenames.
const BASIC_NAMES: &[&str] = &["basic.901226-01.bin", "basic.rom", "basic"];
/// Well-known character ROM filenames.
const CHARGEN_NAMES: &[&str] = &["characters.901225-01.bin", "chargen.rom", "chargen"];
/// Well-known 1541 DOS ROM filenames (16 KiB single images).
const DRIVE_ROM_NAMES: &[&str] = &[
    "1541-II.251968-03.bin",
    "1541.rom",
    "dos1541",
    "dos1541.rom",
];

impl RomSet {
    /// Load the three system ROMs from a directory by their well-known
    /// filenames. A missing or mis-sized file is fatal with a message
    /// naming the expected filename and directory.
    pub fn from_dir(dir: &Path) -> Result<Self, RomError> {
        Ok(Self {
            kernal: load_rom(dir, "Kernal", KERNAL_NAMES, KERNAL_SIZE)?,
            basic: load_rom(dir, "BASIC", BASIC_NAMES, BASIC_SIZE)?,
            chargen: load_rom(dir, "character", CHARGEN_NAMES, CHARGEN_SIZE)?,
        })
    }

    /// Load the 1541 DOS ROM from the same directory.
    pub fn drive_rom_from_dir(dir: &Path) -> Result<Vec<u8>, RomError> {
        load_rom(dir, "1541 DOS", DRIVE_ROM_NAMES, DRIVE_ROM_SIZE)
    }
}

fn load_rom(
    dir: &Path,
    description: &'static str,
    candidates: &[&str],
    expected: usize,
) -> Result<Vec<u8>, RomError> {
    for name in candidates {
        let path: PathBuf = dir.join(name);
        if !path.exists() {
            continue;
        }
        let data = fs::read(&path).map_err(|source| RomError::Io {
            path: path.clone(),
            source,
        })?;
        if data.len() != expected {
            return Err(RomError::WrongSize {
                description,
                path,
                expected,
                actual: data.len(),
            });
        }
        log::info!("loaded {description} ROM from {}", path.display());
        return Ok(data);
    }
    Err(RomError::Missing {
        description,
        dir: dir.to_path_buf(),
        candidates: candidates.iter().map(ToString::to_string).collect(),
    })
}

/// Configuration for constructing a C64.
#[derive(Clone)]
pub struct C64Config {
    /// VIC-II revision; fixes the region, CPU clock and refresh rate.
    pub model: ChipModel,
    /// CPU variant (the stock machine carries an NMOS 6510).
    pub cpu_variant: Variant,
    /// System ROM images.
    pub roms: RomSet,
    /// Throttle execution to the video refresh rate.
    pub throttle: bool,
    /// Drive runner selection.
    pub drive_mode: DriveMode,
}

impl C64Config {
    /// PAL machine with the given ROMs, throttled, synchronous drive.
    #[must_use]
    pub fn pal(roms: RomSet) -> Self {
        Self {
            model: ChipModel::Mos6569,
            cpu_variant: Variant::Nmos6502,
            roms,
            throttle: true,
            drive_mode: DriveMode::Synchronous,
        }
    }
}
