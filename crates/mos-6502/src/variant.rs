//! CPU variant selection.
//!
//! The NMOS revisions differ only in the magic constant their unstable
//! opcodes (ANE/LXA) leak onto the data bus. The CMOS 65C02 replaces every
//! undocumented opcode with a NOP of matching length, turns JAM opcodes into
//! single-byte NOPs, and fixes decimal-mode flags at the cost of one cycle.

use std::fmt;
use std::str::FromStr;

use thiserror::Error;

/// The supported 6502 family members.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum Variant {
    /// Original NMOS 6502 (and the 6510 used in the C64).
    #[default]
    Nmos6502,
    /// 6502A speed grade; behaviourally identical to the 6502.
    Nmos6502A,
    /// 6502C; unstable-opcode constant differs.
    Nmos6502C,
    /// CMOS 65C02.
    Cmos65C02,
}

impl Variant {
    /// Constant ORed into A by the unstable ANE/LXA opcodes.
    #[must_use]
    pub const fn magic_const(self) -> u8 {
        match self {
            Self::Nmos6502 | Self::Nmos6502A => 0xFF,
            Self::Nmos6502C => 0xEE,
            // Unused: every unstable opcode is a NOP on CMOS.
            Self::Cmos65C02 => 0x00,
        }
    }

    /// Whether this is the CMOS part.
    #[must_use]
    pub const fn is_cmos(self) -> bool {
        matches!(self, Self::Cmos65C02)
    }
}

impl fmt::Display for Variant {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            Self::Nmos6502 => "6502",
            Self::Nmos6502A => "6502A",
            Self::Nmos6502C => "6502C",
            Self::Cmos65C02 => "65C02",
        })
    }
}

/// Error for unrecognised variant names.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
#[error("unknown CPU variant {0:?} (expected 6502, 6502A, 6502C or 65C02)")]
pub struct UnknownVariant(pub String);

impl FromStr for Variant {
    type Err = UnknownVariant;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_uppercase().as_str() {
            "6502" => Ok(Self::Nmos6502),
            "6502A" => Ok(Self::Nmos6502A),
            "6502C" => Ok(Self::Nmos6502C),
            "65C02" => Ok(Self::Cmos65C02),
            _ => Err(UnknownVariant(s.to_string())),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parse_is_case_insensitive() {
        assert_eq!("6502".parse::<Variant>(), Ok(Variant::Nmos6502));
        assert_eq!("6502a".parse::<Variant>(), Ok(Variant::Nmos6502A));
        assert_eq!("65c02".parse::<Variant>(), Ok(Variant::Cmos65C02));
        assert!("z80".parse::<Variant>().is_err());
    }

    #[test]
    fn magic_const_per_variant() {
        assert_eq!(Variant::Nmos6502.magic_const(), 0xFF);
        assert_eq!(Variant::Nmos6502A.magic_const(), 0xFF);
        assert_eq!(Variant::Nmos6502C.magic_const(), 0xEE);
    }
}
