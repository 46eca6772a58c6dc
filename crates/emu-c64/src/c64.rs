//! Top-level C64 system.
//!
//! Owns the CPU, the bus with every chip, the optional 1541, and the frame
//! governor. The CPU runs in frame-sized cycle batches; peripherals advance
//! from the bus tick after every instruction, so a batch boundary is just a
//! resumable point, not a synchronisation barrier.

use std::sync::Arc;
use std::sync::atomic::AtomicBool;

use crossbeam_channel::{Receiver, Sender};
use emu_core::Bus;
use format_d64::D64;
use mos_6502::{CpuError, Mos6502, disassemble};
use mos_vic_ii::{ChipModel, FrameSnapshot};

use crate::bus::C64Bus;
use crate::cartridge::Cartridge;
use crate::config::{C64Config, DRIVE_ROM_SIZE, DriveMode};
use crate::drive::Drive1541;
use crate::error::C64Error;
use crate::governor::FrameGovernor;
use crate::memory::C64Memory;

/// Keyboard buffer location in zero page / low RAM.
const KEY_BUFFER: u16 = 0x0277;
/// Keyboard buffer count byte.
const KEY_COUNT: u16 = 0x00C6;
/// Kernal keyboard buffer capacity.
const KEY_BUFFER_SIZE: usize = 10;

/// The C64 machine.
pub struct C64 {
    cpu: Mos6502,
    bus: C64Bus,
    governor: FrameGovernor,
    model: ChipModel,
    cycles_per_frame: u32,
    drive_mode: DriveMode,
    frame_sender: Option<Sender<Arc<FrameSnapshot>>>,
}

impl C64 {
    /// Build and reset a machine from the configuration.
    #[must_use]
    pub fn new(config: &C64Config) -> Self {
        let timing = config.model.timing();
        let memory = C64Memory::new(&config.roms);
        let mut bus = C64Bus::new(memory, config.model);

        // CIA1 scans the keyboard: port A columns out, port B rows in.
        bus.write(0xDC02, 0xFF);
        bus.write(0xDC03, 0x00);
        bus.write(0xDC00, 0xFF);
        // CIA2 port A: VIC bank + IEC outputs.
        bus.write(0xDD02, 0x3F);
        bus.write(0xDD00, 0x03); // bank 0, all IEC lines released

        let mut cpu = Mos6502::new(config.cpu_variant);
        cpu.reset(&mut bus);

        log::info!(
            "C64 up: VIC {} ({} lines x {} cycles), CPU {}",
            config.model,
            timing.lines,
            timing.cycles_per_line,
            config.cpu_variant
        );

        Self {
            cpu,
            bus,
            governor: FrameGovernor::new(timing.refresh_hz, config.throttle),
            model: config.model,
            cycles_per_frame: timing.cycles_per_frame(),
            drive_mode: config.drive_mode,
            frame_sender: None,
        }
    }

    /// Hardware reset: CPU through $FFFC/$FFFD, drive too if attached.
    /// RAM is left as-is.
    pub fn reset(&mut self) {
        self.cpu.reset(&mut self.bus);
        if let Some(drive) = &mut self.bus.drive {
            drive.reset();
        }
    }

    /// Run one video frame's worth of cycles, publish the VBlank snapshot
    /// to any subscriber, and throttle to wall clock. Returns the cycles
    /// actually consumed (batch overshoot included).
    pub fn run_frame(&mut self) -> Result<u32, C64Error> {
        let start = self.cpu.cycles_executed();
        self.cpu
            .execute(&mut self.bus, u64::from(self.cycles_per_frame), None)?;
        let consumed = (self.cpu.cycles_executed() - start) as u32;

        if self.bus.vic.take_frame_complete() {
            if let (Some(sender), Some(snapshot)) =
                (&self.frame_sender, self.bus.vic.frame_snapshot())
            {
                // A slow renderer just misses frames; never block emulation.
                let _ = sender.try_send(snapshot);
            }
        }

        self.governor.throttle();
        Ok(consumed)
    }

    /// Run frames until at least `max_cycles` have executed, or an
    /// external `QuitRequest` stops the machine cleanly.
    pub fn run(&mut self, max_cycles: u64) -> Result<(), C64Error> {
        let target = self.cpu.cycles_executed().saturating_add(max_cycles);
        while self.cpu.cycles_executed() < target {
            match self.run_frame() {
                Ok(_) => {}
                Err(C64Error::Cpu(CpuError::Quit(_))) => {
                    log::info!("quit requested at PC=${:04X}", self.cpu.regs.pc);
                    return Ok(());
                }
                Err(err) => return Err(err),
            }
        }
        Ok(())
    }

    /// Execute a single instruction (or interrupt sequence).
    pub fn step(&mut self) -> Result<u32, C64Error> {
        Ok(self.cpu.step(&mut self.bus)?)
    }

    /// Step until `cond` holds on the CPU or `max_cycles` pass. Returns
    /// whether the condition was reached. This is how hosts watch for PC
    /// regions (BASIC entry, Kernal input loops).
    pub fn run_until<F>(&mut self, cond: F, max_cycles: u64) -> Result<bool, C64Error>
    where
        F: Fn(&Mos6502) -> bool,
    {
        let limit = self.cpu.cycles_executed().saturating_add(max_cycles);
        while self.cpu.cycles_executed() < limit {
            if cond(&self.cpu) {
                return Ok(true);
            }
            self.step()?;
        }
        Ok(cond(&self.cpu))
    }

    /// Total cycles executed since power-on.
    #[must_use]
    pub fn cycles_executed(&self) -> u64 {
        self.cpu.cycles_executed()
    }

    /// The VIC model this machine was built with.
    #[must_use]
    pub fn model(&self) -> ChipModel {
        self.model
    }

    /// The CPU.
    #[must_use]
    pub fn cpu(&self) -> &Mos6502 {
        &self.cpu
    }

    /// The CPU, mutable.
    pub fn cpu_mut(&mut self) -> &mut Mos6502 {
        &mut self.cpu
    }

    /// The bus with every chip on it.
    #[must_use]
    pub fn bus(&self) -> &C64Bus {
        &self.bus
    }

    /// The bus, mutable.
    pub fn bus_mut(&mut self) -> &mut C64Bus {
        &mut self.bus
    }

    /// Shutdown handle for signal handlers / front-ends.
    #[must_use]
    pub fn quit_handle(&self) -> Arc<AtomicBool> {
        self.bus.quit_handle()
    }

    /// Subscribe to VBlank snapshots. The renderer thread receives an
    /// `Arc<FrameSnapshot>` per frame and never touches live RAM.
    pub fn frame_receiver(&mut self) -> Receiver<Arc<FrameSnapshot>> {
        let (sender, receiver) = crossbeam_channel::bounded(4);
        self.frame_sender = Some(sender);
        receiver
    }

    // ------------------------------------------------------------------
    // Cartridges
    // ------------------------------------------------------------------

    /// Attach a cartridge.
    pub fn attach_cartridge(&mut self, cartridge: Cartridge) {
        self.bus.memory.attach_cartridge(cartridge);
    }

    /// Detach any cartridge.
    pub fn detach_cartridge(&mut self) -> Option<Cartridge> {
        self.bus.memory.detach_cartridge()
    }

    /// Load a CRT file. Never fails: structural damage or an unsupported
    /// mapper loads the diagnostic error cartridge instead, so the failure
    /// is visible on screen after reset.
    pub fn load_crt(&mut self, data: &[u8]) {
        let cartridge = match format_crt::parse(data) {
            Ok(crt) => Cartridge::from_crt(&crt),
            Err(err) => {
                log::warn!("broken CRT file: {err}");
                Cartridge::error_cart(&[
                    "CARTRIDGE FILE INVALID".to_string(),
                    err.to_string().to_uppercase(),
                ])
            }
        };
        self.attach_cartridge(cartridge);
    }

    // ------------------------------------------------------------------
    // Drive and disks
    // ------------------------------------------------------------------

    /// Attach a 1541 with the given 16K DOS ROM.
    pub fn attach_drive(&mut self, rom: Vec<u8>) -> Result<(), C64Error> {
        if rom.len() != DRIVE_ROM_SIZE {
            return Err(C64Error::BadDriveRom(rom.len()));
        }
        if self.drive_mode == DriveMode::Threaded {
            self.bus.iec.enable_mirror();
        }
        self.bus.drive = Some(Drive1541::new(rom));
        log::info!("1541 attached ({:?} runner)", self.drive_mode);
        Ok(())
    }

    /// Lock-free IEC line mirror; present when the drive runs in the
    /// `Threaded` configuration.
    #[must_use]
    pub fn iec_mirror(&self) -> Option<std::sync::Arc<crate::iec::IecMirror>> {
        self.bus.iec.mirror()
    }

    /// Insert a disk image into the attached drive.
    pub fn insert_disk(&mut self, disk: D64) -> Result<(), C64Error> {
        let drive = self.bus.drive.as_mut().ok_or(C64Error::DriveNotAttached)?;
        drive.insert_disk(disk);
        Ok(())
    }

    /// Eject the disk, with any writes applied.
    pub fn eject_disk(&mut self) -> Option<D64> {
        self.bus.drive.as_mut().and_then(Drive1541::eject_disk)
    }

    /// Place a PRG image (2-byte little-endian load address header) into
    /// RAM and fix the BASIC pointers the way LOAD would, so RUN works.
    /// Returns the load address.
    pub fn load_program(&mut self, data: &[u8]) -> Result<u16, C64Error> {
        if data.len() < 3 {
            return Err(C64Error::BadProgram(data.len()));
        }
        let load_addr = u16::from(data[0]) | (u16::from(data[1]) << 8);
        for (i, &byte) in data[2..].iter().enumerate() {
            self.bus
                .memory
                .ram_write(load_addr.wrapping_add(i as u16), byte);
        }
        let end = load_addr.wrapping_add((data.len() - 2) as u16);

        // VARTAB/ARYTAB/STREND all point at the byte after the program.
        for base in [0x2D_u16, 0x2F, 0x31] {
            self.bus.memory.ram_write(base, end as u8);
            self.bus.memory.ram_write(base + 1, (end >> 8) as u8);
        }
        log::info!("loaded {} bytes at ${load_addr:04X}", data.len() - 2);
        Ok(load_addr)
    }

    // ------------------------------------------------------------------
    // Input injection
    // ------------------------------------------------------------------

    /// Drop characters straight into the Kernal keyboard buffer, the way
    /// automated tests type `LOAD"NAME",8` + RETURN. At most 10 characters
    /// fit; lowercase is folded to the unshifted PETSCII letters.
    pub fn inject_keyboard_buffer(&mut self, text: &str) {
        let mut count = 0usize;
        for ch in text.chars() {
            if count >= KEY_BUFFER_SIZE {
                log::warn!("keyboard buffer full, dropping rest of {text:?}");
                break;
            }
            let petscii = match ch {
                '\n' | '\r' => 0x0D,
                'a'..='z' => ch as u8 - b'a' + b'A',
                _ if ch.is_ascii() => ch as u8,
                _ => continue,
            };
            self.bus
                .memory
                .ram_write(KEY_BUFFER + count as u16, petscii);
            count += 1;
        }
        self.bus.memory.ram_write(KEY_COUNT, count as u8);
    }

    /// Press or release a key at (column, row) in the matrix.
    pub fn set_key(&mut self, column: u8, row: u8, pressed: bool) {
        self.bus.keyboard.set_key(column, row, pressed);
    }

    // ------------------------------------------------------------------
    // Diagnostics
    // ------------------------------------------------------------------

    /// Text screen contents as 25 lines of 40 screen codes mapped to
    /// ASCII, for assertions and terminal dumps.
    #[must_use]
    pub fn screen_text(&self) -> Vec<String> {
        let mut lines = Vec::with_capacity(25);
        for row in 0..25u16 {
            let mut line = String::with_capacity(40);
            for col in 0..40u16 {
                let code = self.bus.memory.ram_read(0x0400 + row * 40 + col);
                line.push(screen_code_to_ascii(code));
            }
            lines.push(line);
        }
        lines
    }

    /// Crash report: registers, stack, disassembly around PC, key zero
    /// page bytes and the interrupt vectors.
    #[must_use]
    pub fn crash_report(&self) -> String {
        use std::fmt::Write;

        let regs = &self.cpu.regs;
        let mut out = String::new();
        let _ = writeln!(
            out,
            "PC=${:04X} A=${:02X} X=${:02X} Y=${:02X} S=${:02X} P=${:02X} cycles={}",
            regs.pc,
            regs.a,
            regs.x,
            regs.y,
            regs.s,
            regs.p.0,
            self.cpu.cycles_executed()
        );

        let _ = write!(out, "stack:");
        for offset in 1..=8u8 {
            let addr = 0x0100 | u16::from(regs.s.wrapping_add(offset));
            let _ = write!(out, " {:02X}", self.bus.memory.ram_read(addr));
        }
        let _ = writeln!(out);

        let _ = write!(out, "zero page:");
        for addr in 0..16u16 {
            let _ = write!(out, " {:02X}", self.bus.memory.ram_read(addr));
        }
        let _ = writeln!(out);

        let peek = |addr: u16| self.bus.memory.cpu_read(addr, 0);
        let _ = writeln!(
            out,
            "vectors: NMI=${:02X}{:02X} RESET=${:02X}{:02X} IRQ=${:02X}{:02X}",
            peek(0xFFFB),
            peek(0xFFFA),
            peek(0xFFFD),
            peek(0xFFFC),
            peek(0xFFFF),
            peek(0xFFFE)
        );

        let mut addr = regs.pc.saturating_sub(8);
        for _ in 0..8 {
            let (line, next) = disassemble(self.cpu.variant(), addr, peek);
            let marker = if addr == regs.pc { ">" } else { " " };
            let _ = writeln!(out, "{marker}{line}");
            addr = next;
        }
        out
    }
}

/// Screen code to printable ASCII (uppercase/graphics set).
fn screen_code_to_ascii(code: u8) -> char {
    match code & 0x7F {
        0x01..=0x1A => char::from(b'A' + (code & 0x7F) - 1),
        0x20..=0x3F => char::from(code & 0x7F),
        0x00 => '@',
        _ => ' ',
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::{BASIC_SIZE, CHARGEN_SIZE, KERNAL_SIZE, RomSet};
    use mos_6502::Variant;

    /// Synthetic Kernal: reset vector into a tight loop at $E000.
    fn make_config() -> C64Config {
        let mut kernal = vec![0xEA; KERNAL_SIZE]; // NOP sled
        kernal[0x1FFC] = 0x00; // reset vector -> $E000
        kernal[0x1FFD] = 0xE0;
        C64Config {
            model: ChipModel::Mos6569,
            cpu_variant: Variant::Nmos6502,
            roms: RomSet {
                kernal,
                basic: vec![0xBB; BASIC_SIZE],
                chargen: vec![0xCC; CHARGEN_SIZE],
            },
            throttle: false,
            drive_mode: DriveMode::Synchronous,
        }
    }

    #[test]
    fn boots_to_reset_vector() {
        let c64 = C64::new(&make_config());
        assert_eq!(c64.cpu().regs.pc, 0xE000);
        assert_eq!(c64.cpu().regs.s, 0xFD);
        assert_eq!(c64.cpu().regs.p.0, 0x34);
    }

    #[test]
    fn run_frame_consumes_roughly_one_frame() {
        let mut c64 = C64::new(&make_config());
        let consumed = c64.run_frame().expect("frame");
        let expected = c64.model().timing().cycles_per_frame();
        assert!(consumed >= expected && consumed < expected + 8, "{consumed}");
    }

    #[test]
    fn frames_are_published_to_subscriber() {
        let mut c64 = C64::new(&make_config());
        let receiver = c64.frame_receiver();
        c64.bus_mut().write(0x0400, 0x01); // 'A' on screen
        c64.run_frame().expect("frame");
        let snapshot = receiver.try_recv().expect("snapshot");
        assert_eq!(snapshot.ram[0x0400], 0x01);
    }

    #[test]
    fn keyboard_buffer_injection() {
        let mut c64 = C64::new(&make_config());
        c64.inject_keyboard_buffer("run\r");
        let mem = &c64.bus().memory;
        assert_eq!(mem.ram_read(0x0277), b'R');
        assert_eq!(mem.ram_read(0x0278), b'U');
        assert_eq!(mem.ram_read(0x0279), b'N');
        assert_eq!(mem.ram_read(0x027A), 0x0D);
        assert_eq!(mem.ram_read(0x00C6), 4);
    }

    #[test]
    fn keyboard_buffer_caps_at_ten() {
        let mut c64 = C64::new(&make_config());
        c64.inject_keyboard_buffer("ABCDEFGHIJKLMNOP");
        assert_eq!(c64.bus().memory.ram_read(0x00C6), 10);
    }

    #[test]
    fn screen_text_renders_codes() {
        let mut c64 = C64::new(&make_config());
        for (i, code) in [0x08u8, 0x05, 0x0C, 0x0C, 0x0F].iter().enumerate() {
            c64.bus_mut().memory.ram_write(0x0400 + i as u16, *code);
        }
        let lines = c64.screen_text();
        assert!(lines[0].starts_with("HELLO"));
    }

    #[test]
    fn load_program_places_bytes_and_pointers() {
        let mut c64 = C64::new(&make_config());
        // PRG: load at $0801, three bytes.
        let prg = [0x01, 0x08, 0xAA, 0xBB, 0xCC];
        let addr = c64.load_program(&prg).expect("load");
        assert_eq!(addr, 0x0801);
        assert_eq!(c64.bus().memory.ram_read(0x0801), 0xAA);
        assert_eq!(c64.bus().memory.ram_read(0x0803), 0xCC);
        // VARTAB points past the program end ($0804).
        assert_eq!(c64.bus().memory.ram_read(0x2D), 0x04);
        assert_eq!(c64.bus().memory.ram_read(0x2E), 0x08);

        assert!(matches!(
            c64.load_program(&[0x01]),
            Err(C64Error::BadProgram(1))
        ));
    }

    #[test]
    fn insert_disk_requires_drive() {
        let mut c64 = C64::new(&make_config());
        let disk = D64::blank(b"X", [0x30, 0x31]);
        assert!(matches!(
            c64.insert_disk(disk),
            Err(C64Error::DriveNotAttached)
        ));
    }

    #[test]
    fn attach_drive_validates_rom() {
        let mut c64 = C64::new(&make_config());
        assert!(matches!(
            c64.attach_drive(vec![0; 100]),
            Err(C64Error::BadDriveRom(100))
        ));
        let mut rom = vec![0xEA; DRIVE_ROM_SIZE];
        rom[0x3FFC] = 0x00;
        rom[0x3FFD] = 0xC0;
        c64.attach_drive(rom).expect("attach");
        assert!(c64.bus().drive.is_some());
    }

    #[test]
    fn drive_runs_in_lockstep_with_host() {
        let mut c64 = C64::new(&make_config());
        let mut rom = vec![0xEA; DRIVE_ROM_SIZE];
        rom[0x3FFC] = 0x00;
        rom[0x3FFD] = 0xC0;
        c64.attach_drive(rom).expect("attach");

        let host_before = c64.cpu().cycles_executed();
        let drive_before = c64
            .bus()
            .drive
            .as_ref()
            .map(|d| d.cpu().cycles_executed())
            .expect("drive");
        c64.run(1000).expect("run");
        let host_delta = c64.cpu().cycles_executed() - host_before;
        let drive_delta = c64
            .bus()
            .drive
            .as_ref()
            .map(|d| d.cpu().cycles_executed())
            .expect("drive")
            - drive_before;
        // 1:1 lockstep modulo one instruction of slack on each side.
        let diff = host_delta.abs_diff(drive_delta);
        assert!(diff <= 8, "host {host_delta} vs drive {drive_delta}");
    }

    #[test]
    fn crash_report_mentions_pc_and_vectors() {
        let c64 = C64::new(&make_config());
        let report = c64.crash_report();
        assert!(report.contains("PC=$E000"), "{report}");
        assert!(report.contains("RESET=$E000"), "{report}");
    }

    #[test]
    fn quit_request_stops_run_cleanly() {
        let mut c64 = C64::new(&make_config());
        c64.quit_handle().store(true, std::sync::atomic::Ordering::Relaxed);
        c64.run(1_000_000).expect("clean stop");
        // Far fewer cycles than requested actually ran.
        assert!(c64.cycles_executed() < 100);
    }
}
