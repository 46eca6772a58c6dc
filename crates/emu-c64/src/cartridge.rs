//! Cartridge runtime: mapper state, EXROM/GAME lines, bank switching.
//!
//! The memory banking layer consults the attached cartridge for the ROML
//! ($8000-$9FFF) and ROMH ($A000-$BFFF / $E000-$FFFF in Ultimax) windows
//! and routes I/O-1 ($DE00) / I/O-2 ($DF00) accesses here for the
//! bank-switch protocols.
//!
//! A CRT file with an unsupported hardware type is not an error: the
//! loader substitutes a synthesised *error cartridge* whose autostart ROM
//! clears the screen, paints the border red and prints the diagnosis, so
//! a failing cartridge is observable on screen instead of crashing the
//! machine.

use format_crt::Crt;

/// ROML/ROMH bank size.
pub const BANK_SIZE: usize = 8192;
/// ROML window base.
pub const ROML_BASE: u16 = 0x8000;

/// Supported mapper hardware.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Mapper {
    /// Plain 8K (ROML) cartridge; no bank switching.
    Standard8k,
    /// Plain 16K (ROML+ROMH) cartridge.
    Standard16k,
    /// Ultimax: ROMH replaces the Kernal, most RAM hidden.
    Ultimax,
    /// Ocean type 1: up to 64 ROML banks, selected via $DE00.
    Ocean,
    /// Fun Play / Power Play: 16 ROML banks via $DE00.
    FunPlay,
    /// Magic Desk: up to 128 ROML banks via $DE00, bit 7 switches off.
    MagicDesk,
    /// Simons' BASIC: 16K, I/O-1 access toggles the ROMH half.
    SimonsBasic,
    /// Final Cartridge I: I/O-1 hides the ROM, I/O-2 restores it.
    FinalCartridgeI,
    /// Synthesised diagnostic cartridge for unsupported CRT types.
    ErrorCart,
}

/// An attached cartridge.
pub struct Cartridge {
    mapper: Mapper,
    /// EXROM line level (true = high/inactive).
    exrom: bool,
    /// GAME line level (true = high/inactive).
    game: bool,
    roml: Vec<Vec<u8>>,
    romh: Vec<Vec<u8>>,
    bank: u8,
    name: String,
}

impl Cartridge {
    fn new(mapper: Mapper, exrom: bool, game: bool, name: String) -> Self {
        Self {
            mapper,
            exrom,
            game,
            roml: Vec::new(),
            romh: Vec::new(),
            bank: 0,
            name,
        }
    }

    /// Plain 8K cartridge from a raw ROML image (EXROM low, GAME high).
    #[must_use]
    pub fn standard_8k(roml: Vec<u8>) -> Self {
        let mut cart = Self::new(Mapper::Standard8k, false, true, "8K".into());
        cart.roml.push(roml);
        cart
    }

    /// Plain 16K cartridge (EXROM low, GAME low).
    #[must_use]
    pub fn standard_16k(roml: Vec<u8>, romh: Vec<u8>) -> Self {
        let mut cart = Self::new(Mapper::Standard16k, false, false, "16K".into());
        cart.roml.push(roml);
        cart.romh.push(romh);
        cart
    }

    /// Ultimax cartridge: ROMH at $E000 (EXROM high, GAME low).
    #[must_use]
    pub fn ultimax(romh: Vec<u8>, roml: Option<Vec<u8>>) -> Self {
        let mut cart = Self::new(Mapper::Ultimax, true, false, "Ultimax".into());
        cart.romh.push(romh);
        if let Some(roml) = roml {
            cart.roml.push(roml);
        }
        cart
    }

    /// Build the runtime cartridge for a parsed CRT container. An
    /// unsupported hardware type yields the diagnostic error cartridge.
    #[must_use]
    pub fn from_crt(crt: &Crt) -> Self {
        let mapper = match crt.hardware_type {
            0 => {
                if crt.exrom != 0 && crt.game == 0 {
                    Mapper::Ultimax
                } else if crt.romh_banks().is_empty() {
                    Mapper::Standard8k
                } else {
                    Mapper::Standard16k
                }
            }
            4 => Mapper::SimonsBasic,
            5 => Mapper::Ocean,
            7 => Mapper::FunPlay,
            13 => Mapper::FinalCartridgeI,
            19 => Mapper::MagicDesk,
            other => {
                log::warn!(
                    "unsupported CRT hardware type {other} ({:?}); loading error cartridge",
                    crt.name
                );
                return Self::error_cart(&[
                    "UNSUPPORTED CARTRIDGE TYPE".to_string(),
                    format!("HARDWARE TYPE {other}"),
                    format!("NAME: {}", crt.name.to_uppercase()),
                ]);
            }
        };

        let (exrom, game) = match mapper {
            Mapper::Ultimax => (true, false),
            Mapper::Standard8k | Mapper::Ocean | Mapper::FunPlay | Mapper::MagicDesk => {
                (false, true)
            }
            _ => (false, false),
        };

        let mut cart = Self::new(mapper, exrom, game, crt.name.clone());
        for chip in crt.roml_banks() {
            cart.roml.push(chip.data.clone());
        }
        for chip in crt.romh_banks() {
            cart.romh.push(chip.data.clone());
        }
        log::info!(
            "attached cartridge {:?}: {mapper:?}, {} ROML / {} ROMH banks",
            cart.name,
            cart.roml.len(),
            cart.romh.len()
        );
        cart
    }

    /// Synthesise the diagnostic cartridge for an unloadable CRT.
    #[must_use]
    pub fn error_cart(lines: &[String]) -> Self {
        let mut cart = Self::new(Mapper::ErrorCart, false, true, "ERROR".into());
        cart.roml.push(build_error_rom(lines));
        cart
    }

    /// Cartridge name (CRT header or synthetic).
    #[must_use]
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Mapper type.
    #[must_use]
    pub fn mapper(&self) -> Mapper {
        self.mapper
    }

    /// EXROM line level (true = high/inactive).
    #[must_use]
    pub fn exrom(&self) -> bool {
        self.exrom
    }

    /// GAME line level (true = high/inactive).
    #[must_use]
    pub fn game(&self) -> bool {
        self.game
    }

    /// Current bank index.
    #[must_use]
    pub fn bank(&self) -> u8 {
        self.bank
    }

    /// ROML byte at the given window offset (0-8191).
    #[must_use]
    pub fn read_roml(&self, offset: u16) -> Option<u8> {
        self.roml
            .get(self.bank as usize)
            .and_then(|bank| bank.get(offset as usize))
            .copied()
    }

    /// ROMH byte at the given window offset (0-8191).
    #[must_use]
    pub fn read_romh(&self, offset: u16) -> Option<u8> {
        let bank = match self.mapper {
            // Single-ROMH cartridges always serve bank 0.
            Mapper::Standard16k | Mapper::SimonsBasic | Mapper::Ultimax
            | Mapper::FinalCartridgeI => 0,
            _ => self.bank as usize,
        };
        self.romh
            .get(bank)
            .and_then(|data| data.get(offset as usize))
            .copied()
    }

    /// Read from I/O-1 ($DE00-$DEFF). Some mappers switch on access.
    pub fn io1_read(&mut self, _addr: u16) -> Option<u8> {
        match self.mapper {
            Mapper::SimonsBasic => {
                // Reading I/O-1 selects the 8K configuration.
                self.game = true;
                None
            }
            Mapper::FinalCartridgeI => {
                // Any I/O-1 access hides the cartridge ROM.
                self.exrom = true;
                self.game = true;
                None
            }
            _ => None,
        }
    }

    /// Write to I/O-1: the common bank-switch port.
    pub fn io1_write(&mut self, _addr: u16, value: u8) {
        match self.mapper {
            Mapper::Ocean => {
                self.bank = value & 0x3F;
            }
            Mapper::FunPlay => {
                self.bank = value & 0x0F;
            }
            Mapper::MagicDesk => {
                self.bank = value & 0x7F;
                // Bit 7 parks the cartridge: EXROM released.
                self.exrom = value & 0x80 != 0;
            }
            Mapper::SimonsBasic => {
                // Writing I/O-1 pulls GAME for the full 16K configuration.
                self.game = false;
            }
            Mapper::FinalCartridgeI => {
                self.exrom = true;
                self.game = true;
            }
            _ => {}
        }
    }

    /// Read from I/O-2 ($DF00-$DFFF).
    pub fn io2_read(&mut self, _addr: u16) -> Option<u8> {
        match self.mapper {
            Mapper::FinalCartridgeI => {
                // Any I/O-2 access restores the 16K mapping.
                self.exrom = false;
                self.game = false;
                None
            }
            _ => None,
        }
    }

    /// Write to I/O-2.
    pub fn io2_write(&mut self, _addr: u16, _value: u8) {
        if self.mapper == Mapper::FinalCartridgeI {
            self.exrom = false;
            self.game = false;
        }
    }
}

/// ASCII to screen codes for the error display.
fn screen_code(ch: u8) -> u8 {
    match ch {
        b'A'..=b'Z' => ch - b'A' + 1,
        b'a'..=b'z' => ch - b'a' + 1,
        b'0'..=b'9' | b' ' | b'!' | b'.' | b',' | b':' | b'-' | b'+' | b'=' | b'$' => ch,
        _ => b' ',
    }
}

/// Build the 8K autostart ROM that reports a cartridge loading failure on
/// screen: CBM80 header, then code that clears the screen, sets a red
/// border, writes the diagnostic lines and spins.
#[must_use]
pub fn build_error_rom(lines: &[String]) -> Vec<u8> {
    let mut rom = vec![0u8; BANK_SIZE];

    // Autostart header at $8000: cold start, warm start, CBM80 signature.
    rom[0x0000] = 0x09; // cold start -> $8009
    rom[0x0001] = 0x80;
    rom[0x0002] = 0x09; // warm start -> $8009
    rom[0x0003] = 0x80;
    rom[0x0004] = 0xC3; // 'C' | $80
    rom[0x0005] = 0xC2; // 'B' | $80
    rom[0x0006] = 0xCD; // 'M' | $80
    rom[0x0007] = 0x38; // '8'
    rom[0x0008] = 0x30; // '0'

    let mut code: Vec<u8> = Vec::new();

    // SEI, LDX #$FF, TXS
    code.extend_from_slice(&[0x78, 0xA2, 0xFF, 0x9A]);

    // Clear the screen with spaces.
    code.extend_from_slice(&[0xA9, 0x20, 0xA2, 0x00]); // LDA #$20, LDX #$00
    code.extend_from_slice(&[
        0x9D, 0x00, 0x04, // STA $0400,X
        0x9D, 0x00, 0x05, // STA $0500,X
        0x9D, 0x00, 0x06, // STA $0600,X
        0x9D, 0x00, 0x07, // STA $0700,X
        0xE8, // INX
        0xD0, 0xF1, // BNE clear_loop
    ]);

    // Red border and background.
    code.extend_from_slice(&[0xA9, 0x02, 0x8D, 0x20, 0xD0, 0x8D, 0x21, 0xD0]);

    // Write each diagnostic line centred, white on red.
    for (line_no, text) in lines.iter().enumerate().take(12) {
        let text = text.as_bytes();
        let len = text.len().min(38);
        let start = (40 - len) / 2;
        let screen = 0x0400 + (line_no * 2 + 1) * 40 + start;
        let color = 0xD800 + (line_no * 2 + 1) * 40 + start;
        for (i, &ch) in text[..len].iter().enumerate() {
            let sc = screen_code(ch);
            let screen_addr = (screen + i) as u16;
            let color_addr = (color + i) as u16;
            code.extend_from_slice(&[
                0xA9,
                sc, // LDA #code
                0x8D,
                screen_addr as u8,
                (screen_addr >> 8) as u8, // STA screen
                0xA9,
                0x01, // LDA #white
                0x8D,
                color_addr as u8,
                (color_addr >> 8) as u8, // STA colour
            ]);
        }
    }

    // Spin forever: JMP to self.
    let loop_addr = ROML_BASE + 0x0009 + code.len() as u16;
    code.extend_from_slice(&[0x4C, loop_addr as u8, (loop_addr >> 8) as u8]);

    rom[0x0009..0x0009 + code.len()].copy_from_slice(&code);
    rom
}

#[cfg(test)]
mod tests {
    use super::*;
    use format_crt::{Chip, build, parse};

    fn crt_with(hardware_type: u16, exrom: u8, game: u8, chips: &[Chip]) -> Crt {
        parse(&build(hardware_type, exrom, game, "Test", chips)).expect("valid crt")
    }

    fn roml_chip(bank: u16, fill: u8) -> Chip {
        Chip {
            bank,
            load_addr: 0x8000,
            data: vec![fill; BANK_SIZE],
        }
    }

    #[test]
    fn standard_8k_lines() {
        let cart = Cartridge::standard_8k(vec![0xAA; BANK_SIZE]);
        assert!(!cart.exrom());
        assert!(cart.game());
        assert_eq!(cart.read_roml(0), Some(0xAA));
        assert_eq!(cart.read_romh(0), None);
    }

    #[test]
    fn standard_16k_lines() {
        let cart = Cartridge::standard_16k(vec![0xAA; BANK_SIZE], vec![0xBB; BANK_SIZE]);
        assert!(!cart.exrom());
        assert!(!cart.game());
        assert_eq!(cart.read_romh(0), Some(0xBB));
    }

    #[test]
    fn ultimax_from_crt() {
        let crt = crt_with(
            0,
            1,
            0,
            &[Chip {
                bank: 0,
                load_addr: 0xE000,
                data: vec![0x55; BANK_SIZE],
            }],
        );
        let cart = Cartridge::from_crt(&crt);
        assert_eq!(cart.mapper(), Mapper::Ultimax);
        assert!(cart.exrom());
        assert!(!cart.game());
        assert_eq!(cart.read_romh(0), Some(0x55));
    }

    #[test]
    fn ocean_bank_switch() {
        let chips: Vec<Chip> = (0..4).map(|b| roml_chip(b, b as u8)).collect();
        let crt = crt_with(5, 0, 1, &chips);
        let mut cart = Cartridge::from_crt(&crt);
        assert_eq!(cart.read_roml(0), Some(0));
        cart.io1_write(0xDE00, 2);
        assert_eq!(cart.bank(), 2);
        assert_eq!(cart.read_roml(0), Some(2));
        cart.io1_write(0xDE00, 0xFF);
        assert_eq!(cart.bank(), 0x3F);
    }

    #[test]
    fn magic_desk_bit7_parks() {
        let chips: Vec<Chip> = (0..3).map(|b| roml_chip(b, b as u8 + 0x20)).collect();
        let crt = crt_with(19, 0, 1, &chips);
        let mut cart = Cartridge::from_crt(&crt);
        cart.io1_write(0xDE00, 1);
        assert_eq!(cart.read_roml(0), Some(0x21));
        assert!(!cart.exrom());
        cart.io1_write(0xDE00, 0x80);
        assert!(cart.exrom(), "bit 7 releases EXROM");
        cart.io1_write(0xDE00, 0x02);
        assert!(!cart.exrom());
        assert_eq!(cart.bank(), 2);
    }

    #[test]
    fn fun_play_masks_to_16_banks() {
        let chips: Vec<Chip> = (0..16).map(|b| roml_chip(b, b as u8)).collect();
        let crt = crt_with(7, 0, 1, &chips);
        let mut cart = Cartridge::from_crt(&crt);
        cart.io1_write(0xDE00, 0x1F);
        assert_eq!(cart.bank(), 0x0F);
    }

    #[test]
    fn simons_basic_toggles_game() {
        let crt = crt_with(
            4,
            0,
            0,
            &[
                roml_chip(0, 0x11),
                Chip {
                    bank: 0,
                    load_addr: 0xA000,
                    data: vec![0x22; BANK_SIZE],
                },
            ],
        );
        let mut cart = Cartridge::from_crt(&crt);
        assert!(!cart.game(), "boots in 16K configuration");
        let _ = cart.io1_read(0xDE00);
        assert!(cart.game(), "read selects 8K");
        cart.io1_write(0xDE00, 0x01);
        assert!(!cart.game(), "write selects 16K");
    }

    #[test]
    fn final_cartridge_i_window_toggle() {
        let crt = crt_with(
            13,
            0,
            0,
            &[
                roml_chip(0, 0x11),
                Chip {
                    bank: 0,
                    load_addr: 0xA000,
                    data: vec![0x22; BANK_SIZE],
                },
            ],
        );
        let mut cart = Cartridge::from_crt(&crt);
        assert!(!cart.exrom());
        let _ = cart.io1_read(0xDE01);
        assert!(cart.exrom(), "I/O-1 access hides the ROM");
        assert!(cart.game());
        let _ = cart.io2_read(0xDF00);
        assert!(!cart.exrom(), "I/O-2 access restores it");
        assert!(!cart.game());
    }

    #[test]
    fn unknown_type_becomes_error_cart() {
        let crt = crt_with(57, 0, 1, &[roml_chip(0, 0x11)]);
        let cart = Cartridge::from_crt(&crt);
        assert_eq!(cart.mapper(), Mapper::ErrorCart);
        assert!(!cart.exrom());
        assert!(cart.game());
        // Autostart signature present.
        assert_eq!(cart.read_roml(4), Some(0xC3));
        assert_eq!(cart.read_roml(8), Some(0x30));
    }

    #[test]
    fn error_rom_has_autostart_and_code() {
        let rom = build_error_rom(&["SOMETHING BROKE".to_string()]);
        assert_eq!(rom.len(), BANK_SIZE);
        assert_eq!(&rom[4..9], &[0xC3, 0xC2, 0xCD, 0x38, 0x30]);
        // Cold start vector points at the stub.
        assert_eq!(rom[0], 0x09);
        assert_eq!(rom[1], 0x80);
        // First instruction is SEI.
        assert_eq!(rom[9], 0x78);
        // Somewhere the ROM paints the border red: LDA #$02 / STA $D020.
        let has_border_write = rom
            .windows(5)
            .any(|w| w == [0xA9, 0x02, 0x8D, 0x20, 0xD0]);
        assert!(has_border_write);
    }
}
