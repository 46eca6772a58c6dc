//! CRT cartridge container.
//!
//! A CRT file wraps cartridge ROM with a 64-byte header and one or more
//! CHIP packets:
//!
//! - Header: bytes 0-15 signature `"C64 CARTRIDGE   "`, 16-19 big-endian
//!   header length, 20-21 version, 22-23 big-endian hardware type, 24
//!   EXROM line, 25 GAME line, 32-63 zero-padded name.
//! - CHIP packet: `"CHIP"`, big-endian total length, chip type (0 = ROM),
//!   bank number, big-endian load address ($8000/$A000/$E000), big-endian
//!   ROM size, then the ROM bytes.
//!
//! Parsing deliberately accepts *unknown hardware types*: the machine
//! substitutes an on-screen error cartridge for those, so the container
//! layer reports what it found instead of refusing the file.

use thiserror::Error;

/// CRT file signature (16 bytes, trailing spaces).
pub const SIGNATURE: &[u8; 16] = b"C64 CARTRIDGE   ";

/// CHIP packet signature.
const CHIP_SIGNATURE: &[u8; 4] = b"CHIP";

/// Structural errors in a CRT container.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum CrtError {
    #[error("CRT file too short: {0} bytes")]
    TooShort(usize),
    #[error("bad CRT signature")]
    BadSignature,
    #[error("bad CRT header length {0}")]
    BadHeaderLength(usize),
    #[error("expected CHIP packet at offset {0}")]
    BadChipSignature(usize),
    #[error("CHIP packet at offset {0} extends past end of file")]
    TruncatedChip(usize),
    #[error("CHIP packet at offset {offset} has unexpected load address ${load_addr:04X}")]
    BadLoadAddress { offset: usize, load_addr: u16 },
    #[error("CRT file contains no CHIP packets")]
    NoChips,
}

/// One ROM image from a CHIP packet.
#[derive(Debug, Clone)]
pub struct Chip {
    /// Bank number from the packet header.
    pub bank: u16,
    /// Load address: $8000 (ROML) or $A000/$E000 (ROMH).
    pub load_addr: u16,
    /// ROM bytes.
    pub data: Vec<u8>,
}

/// A parsed CRT container.
#[derive(Debug, Clone)]
pub struct Crt {
    /// Hardware type word (0 = standard; higher values name mappers).
    pub hardware_type: u16,
    /// EXROM line byte (0 = asserted/low).
    pub exrom: u8,
    /// GAME line byte (0 = asserted/low).
    pub game: u8,
    /// Version word.
    pub version: u16,
    /// Cartridge name from the header.
    pub name: String,
    /// CHIP packets in file order.
    pub chips: Vec<Chip>,
}

impl Crt {
    /// ROML images ($8000), ordered by bank.
    #[must_use]
    pub fn roml_banks(&self) -> Vec<&Chip> {
        let mut banks: Vec<&Chip> = self
            .chips
            .iter()
            .filter(|c| c.load_addr == 0x8000)
            .collect();
        banks.sort_by_key(|c| c.bank);
        banks
    }

    /// ROMH images ($A000 or $E000), ordered by bank.
    #[must_use]
    pub fn romh_banks(&self) -> Vec<&Chip> {
        let mut banks: Vec<&Chip> = self
            .chips
            .iter()
            .filter(|c| c.load_addr == 0xA000 || c.load_addr == 0xE000)
            .collect();
        banks.sort_by_key(|c| c.bank);
        banks
    }
}

fn read_be_u16(data: &[u8], offset: usize) -> u16 {
    u16::from(data[offset]) << 8 | u16::from(data[offset + 1])
}

fn read_be_u32(data: &[u8], offset: usize) -> u32 {
    u32::from(data[offset]) << 24
        | u32::from(data[offset + 1]) << 16
        | u32::from(data[offset + 2]) << 8
        | u32::from(data[offset + 3])
}

/// Parse a CRT file.
pub fn parse(data: &[u8]) -> Result<Crt, CrtError> {
    if data.len() < 64 {
        return Err(CrtError::TooShort(data.len()));
    }
    if &data[0..16] != SIGNATURE {
        return Err(CrtError::BadSignature);
    }

    let header_len = read_be_u32(data, 0x10) as usize;
    if header_len < 0x20 || header_len > data.len() {
        return Err(CrtError::BadHeaderLength(header_len));
    }

    let version = read_be_u16(data, 0x14);
    let hardware_type = read_be_u16(data, 0x16);
    let exrom = data[0x18];
    let game = data[0x19];

    let name_bytes = &data[0x20..0x40];
    let end = name_bytes
        .iter()
        .position(|&b| b == 0)
        .unwrap_or(name_bytes.len());
    let name = String::from_utf8_lossy(&name_bytes[..end]).trim().to_string();

    let mut chips = Vec::new();
    let mut offset = header_len;
    while offset + 0x10 <= data.len() {
        if &data[offset..offset + 4] != CHIP_SIGNATURE {
            return Err(CrtError::BadChipSignature(offset));
        }
        let packet_len = read_be_u32(data, offset + 4) as usize;
        if packet_len < 0x10 || offset + packet_len > data.len() {
            return Err(CrtError::TruncatedChip(offset));
        }

        let bank = read_be_u16(data, offset + 0x0A);
        let load_addr = read_be_u16(data, offset + 0x0C);
        let rom_size = read_be_u16(data, offset + 0x0E) as usize;

        let rom_start = offset + 0x10;
        if rom_start + rom_size > data.len() {
            return Err(CrtError::TruncatedChip(offset));
        }
        if !matches!(load_addr, 0x8000 | 0xA000 | 0xE000) {
            return Err(CrtError::BadLoadAddress { offset, load_addr });
        }

        chips.push(Chip {
            bank,
            load_addr,
            data: data[rom_start..rom_start + rom_size].to_vec(),
        });
        offset += packet_len;
    }

    if chips.is_empty() {
        return Err(CrtError::NoChips);
    }

    Ok(Crt {
        hardware_type,
        exrom,
        game,
        version,
        name,
        chips,
    })
}

/// Build a CRT file from parts (test fixtures and cartridge authoring).
#[must_use]
pub fn build(hardware_type: u16, exrom: u8, game: u8, name: &str, chips: &[Chip]) -> Vec<u8> {
    let mut out = Vec::new();
    out.extend_from_slice(SIGNATURE);
    out.extend_from_slice(&0x40u32.to_be_bytes());
    out.extend_from_slice(&[0x01, 0x00]); // version 1.0
    out.extend_from_slice(&hardware_type.to_be_bytes());
    out.push(exrom);
    out.push(game);
    out.extend_from_slice(&[0; 6]);
    let mut name_bytes = [0u8; 32];
    for (dst, src) in name_bytes.iter_mut().zip(name.bytes()) {
        *dst = src;
    }
    out.extend_from_slice(&name_bytes);

    for chip in chips {
        out.extend_from_slice(CHIP_SIGNATURE);
        out.extend_from_slice(&((0x10 + chip.data.len()) as u32).to_be_bytes());
        out.extend_from_slice(&[0x00, 0x00]); // chip type: ROM
        out.extend_from_slice(&chip.bank.to_be_bytes());
        out.extend_from_slice(&chip.load_addr.to_be_bytes());
        out.extend_from_slice(&(chip.data.len() as u16).to_be_bytes());
        out.extend_from_slice(&chip.data);
    }
    out
}

#[cfg(test)]
mod tests {
    use super::*;

    fn chip(bank: u16, load_addr: u16, fill: u8) -> Chip {
        Chip {
            bank,
            load_addr,
            data: vec![fill; 8192],
        }
    }

    #[test]
    fn parse_standard_8k() {
        let file = build(0, 0, 1, "Test Cart", &[chip(0, 0x8000, 0xAA)]);
        let crt = parse(&file).expect("parse");
        assert_eq!(crt.hardware_type, 0);
        assert_eq!(crt.exrom, 0);
        assert_eq!(crt.game, 1);
        assert_eq!(crt.name, "Test Cart");
        assert_eq!(crt.roml_banks().len(), 1);
        assert!(crt.romh_banks().is_empty());
        assert_eq!(crt.roml_banks()[0].data[0], 0xAA);
    }

    #[test]
    fn parse_16k_split() {
        let file = build(
            0,
            0,
            0,
            "16K",
            &[chip(0, 0x8000, 0xBB), chip(0, 0xA000, 0xCC)],
        );
        let crt = parse(&file).expect("parse");
        assert_eq!(crt.roml_banks().len(), 1);
        assert_eq!(crt.romh_banks().len(), 1);
        assert_eq!(crt.romh_banks()[0].data[0], 0xCC);
    }

    #[test]
    fn parse_banked_sorts_by_bank() {
        let file = build(
            19,
            0,
            1,
            "Banked",
            &[chip(2, 0x8000, 2), chip(0, 0x8000, 0), chip(1, 0x8000, 1)],
        );
        let crt = parse(&file).expect("parse");
        let banks = crt.roml_banks();
        assert_eq!(banks.len(), 3);
        for (i, bank) in banks.iter().enumerate() {
            assert_eq!(bank.bank as usize, i);
            assert_eq!(bank.data[0] as usize, i);
        }
    }

    #[test]
    fn unknown_hardware_type_still_parses() {
        let file = build(57, 0, 1, "Mystery", &[chip(0, 0x8000, 0x11)]);
        let crt = parse(&file).expect("parse");
        assert_eq!(crt.hardware_type, 57);
    }

    #[test]
    fn ultimax_load_address() {
        let file = build(0, 1, 0, "Ultimax", &[chip(0, 0xE000, 0x55)]);
        let crt = parse(&file).expect("parse");
        assert_eq!(crt.romh_banks()[0].load_addr, 0xE000);
    }

    #[test]
    fn rejects_bad_signature() {
        let mut file = build(0, 0, 1, "X", &[chip(0, 0x8000, 0)]);
        file[0] = b'X';
        assert_eq!(parse(&file).unwrap_err(), CrtError::BadSignature);
    }

    #[test]
    fn rejects_truncated_chip() {
        let mut file = build(0, 0, 1, "X", &[chip(0, 0x8000, 0)]);
        file.truncate(file.len() - 100);
        assert!(matches!(
            parse(&file).unwrap_err(),
            CrtError::TruncatedChip(_)
        ));
    }

    #[test]
    fn rejects_empty_file() {
        assert_eq!(parse(&[0; 10]).unwrap_err(), CrtError::TooShort(10));
        let header_only = build(0, 0, 1, "X", &[]);
        assert_eq!(parse(&header_only).unwrap_err(), CrtError::NoChips);
    }

    #[test]
    fn rejects_bad_load_address() {
        let file = build(0, 0, 1, "X", &[chip(0, 0xC000, 0)]);
        assert!(matches!(
            parse(&file).unwrap_err(),
            CrtError::BadLoadAddress {
                load_addr: 0xC000,
                ..
            }
        ));
    }
}
