//! C64 system bus: address decoding, chip wiring, and the per-instruction
//! peripheral tick.
//!
//! Implements [`emu_core::Bus`] for the host CPU. Reads and writes route
//! through the banking layer to RAM/ROM or to the chips in the $D000
//! window (VIC mirrored every $40, SID every $20, CIAs every $10, the
//! cartridge behind I/O-1/I/O-2). [`Bus::tick`] is the machine's heartbeat:
//! CIAs and the VIC advance by the cycles the instruction consumed, the
//! 1541 runs in 1:1 lockstep, CIA SDR bytes cross-trigger the peer's FLAG
//! pin, and the returned levels drive the CPU's IRQ (CIA1 ∨ VIC) and NMI
//! (CIA2) lines.

use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};

use emu_core::{Bus, BusSignals, QuitRequest};
use mos_cia_6526::Cia;
use mos_sid_6581::Sid6581;
use mos_vic_ii::{ChipModel, Vic};

use crate::drive::Drive1541;
use crate::iec::IecBus;
use crate::keyboard::KeyboardMatrix;
use crate::memory::C64Memory;

/// The C64 bus. Owns every subsystem; the CPU reaches them only through
/// the `Bus` trait.
pub struct C64Bus {
    pub memory: C64Memory,
    pub vic: Vic,
    pub sid: Sid6581,
    pub cia1: Cia,
    pub cia2: Cia,
    pub keyboard: KeyboardMatrix,
    pub iec: IecBus,
    pub drive: Option<Drive1541>,

    /// Joystick port 1 lines (CIA1 port B side), active low.
    joystick1: u8,
    /// Joystick port 2 lines (CIA1 port A side), active low.
    joystick2: u8,

    /// Last value seen on the data bus, for open-bus reads.
    open_bus: u8,

    /// Externally requested shutdown (Ctrl-C, window close).
    quit: Arc<AtomicBool>,
}

impl C64Bus {
    /// Wire up the bus for the given VIC model (fixes CIA timing too).
    #[must_use]
    pub fn new(memory: C64Memory, model: ChipModel) -> Self {
        let timing = model.timing();
        let tod_hz = match model {
            ChipModel::Mos6569 => 50,
            ChipModel::Mos6567R8 | ChipModel::Mos6567R56A => 60,
        };
        Self {
            memory,
            vic: Vic::new(model),
            sid: Sid6581::new(),
            cia1: Cia::with_timing(timing.cpu_hz, tod_hz),
            cia2: Cia::with_timing(timing.cpu_hz, tod_hz),
            keyboard: KeyboardMatrix::new(),
            iec: IecBus::new(),
            drive: None,
            joystick1: 0xFF,
            joystick2: 0xFF,
            open_bus: 0,
            quit: Arc::new(AtomicBool::new(false)),
        }
    }

    /// Handle for requesting shutdown from another thread or a signal
    /// handler; the next `tick` unwinds with `QuitRequest`.
    #[must_use]
    pub fn quit_handle(&self) -> Arc<AtomicBool> {
        Arc::clone(&self.quit)
    }

    /// Joystick port 2 (the common game port), active-low direction and
    /// fire bits.
    pub fn set_joystick2(&mut self, lines: u8) {
        self.joystick2 = lines;
    }

    /// Joystick port 1, active-low.
    pub fn set_joystick1(&mut self, lines: u8) {
        self.joystick1 = lines;
    }

    /// Propagate CIA2 port A to the VIC bank select and the IEC outputs.
    fn sync_cia2_port_a(&mut self) {
        let port_a = self.cia2.port_a_output();
        // Bits 0-1, inverted, select the VIC bank.
        self.vic.set_bank(!port_a & 0x03);
        // Bits 3-5 pull ATN/CLK/DATA low when set.
        self.iec.set_c64_outputs(port_a);
    }

    /// Keyboard rows and joystick lines into CIA1 before a port read.
    fn refresh_cia1_inputs(&mut self) {
        // Joystick 2 shares the column lines on port A.
        let columns = self.cia1.port_a_output() & self.joystick2;
        let rows = self.keyboard.scan(columns) & self.joystick1;
        self.cia1.set_port_a_input(self.joystick2);
        self.cia1.set_port_b_input(rows);
    }

    /// IEC line levels into CIA2 port A bits 6 (CLK) and 7 (DATA).
    fn refresh_cia2_inputs(&mut self) {
        self.cia2
            .set_port_a_input(self.iec.cia2_input_bits() | 0x3F);
    }

    /// A CIA shifted a byte out of its SDR: the peer's FLAG pin fires.
    fn cross_trigger_flags(&mut self) {
        if self.cia1.take_serial_event() {
            self.cia2.trigger_flag();
        }
        if self.cia2.take_serial_event() {
            self.cia1.trigger_flag();
        }
    }

    fn io_read(&mut self, addr: u16) -> u8 {
        match addr {
            0xD000..=0xD3FF => self.vic.read((addr & 0x3F) as u8),
            0xD400..=0xD7FF => self.sid.read((addr & 0x1F) as u8),
            0xD800..=0xDBFF => self.memory.colour_ram_read(addr - 0xD800, self.open_bus),
            0xDC00..=0xDCFF => {
                self.refresh_cia1_inputs();
                self.cia1.read((addr & 0x0F) as u8)
            }
            0xDD00..=0xDDFF => {
                self.refresh_cia2_inputs();
                self.cia2.read((addr & 0x0F) as u8)
            }
            0xDE00..=0xDEFF => {
                let open_bus = self.open_bus;
                self.memory
                    .cartridge_mut()
                    .and_then(|cart| cart.io1_read(addr))
                    .unwrap_or(open_bus)
            }
            0xDF00..=0xDFFF => {
                let open_bus = self.open_bus;
                self.memory
                    .cartridge_mut()
                    .and_then(|cart| cart.io2_read(addr))
                    .unwrap_or(open_bus)
            }
            _ => self.open_bus,
        }
    }

    fn io_write(&mut self, addr: u16, value: u8) {
        match addr {
            0xD000..=0xD3FF => self.vic.write((addr & 0x3F) as u8, value),
            0xD400..=0xD7FF => self.sid.write((addr & 0x1F) as u8, value),
            0xD800..=0xDBFF => self.memory.colour_ram_write(addr - 0xD800, value),
            0xDC00..=0xDCFF => {
                self.cia1.write((addr & 0x0F) as u8, value);
                self.cross_trigger_flags();
            }
            0xDD00..=0xDDFF => {
                self.cia2.write((addr & 0x0F) as u8, value);
                self.cross_trigger_flags();
                // Port A or DDR writes retarget the VIC bank and the IEC
                // lines immediately: the drive sees them on its next cycle.
                if matches!(addr & 0x0F, 0x00 | 0x02) {
                    self.sync_cia2_port_a();
                }
            }
            0xDE00..=0xDEFF => {
                if let Some(cart) = self.memory.cartridge_mut() {
                    cart.io1_write(addr, value);
                }
            }
            0xDF00..=0xDFFF => {
                if let Some(cart) = self.memory.cartridge_mut() {
                    cart.io2_write(addr, value);
                }
            }
            _ => {}
        }
    }
}

impl Bus for C64Bus {
    fn read(&mut self, address: u16) -> u8 {
        let value = if (0xD000..=0xDFFF).contains(&address) && self.memory.io_visible() {
            self.io_read(address)
        } else {
            self.memory.cpu_read(address, self.open_bus)
        };
        self.open_bus = value;
        value
    }

    fn write(&mut self, address: u16, value: u8) {
        self.open_bus = value;
        if (0xD000..=0xDFFF).contains(&address) && self.memory.io_visible() {
            self.io_write(address, value);
        } else {
            self.memory.cpu_write(address, value);
        }
    }

    fn tick(&mut self, cycles: u32) -> Result<BusSignals, QuitRequest> {
        if self.quit.load(Ordering::Relaxed) {
            return Err(QuitRequest);
        }

        self.cia1.update(cycles);
        self.cia2.update(cycles);
        self.vic.update(cycles, &self.memory);

        if let Some(drive) = &mut self.drive {
            drive.run(cycles, &mut self.iec);
            // The host reads the drive's response through CIA2 port A.
            self.refresh_cia2_inputs();
        }

        Ok(BusSignals {
            irq: self.cia1.irq_asserted() || self.vic.irq_asserted(),
            nmi: self.cia2.irq_asserted(),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::cartridge::{BANK_SIZE, Cartridge};
    use crate::config::{BASIC_SIZE, CHARGEN_SIZE, KERNAL_SIZE, RomSet};

    fn make_bus() -> C64Bus {
        let roms = RomSet {
            kernal: vec![0xEE; KERNAL_SIZE],
            basic: vec![0xBB; BASIC_SIZE],
            chargen: vec![0xCC; CHARGEN_SIZE],
        };
        C64Bus::new(C64Memory::new(&roms), ChipModel::Mos6569)
    }

    #[test]
    fn ram_and_rom_routing() {
        let mut bus = make_bus();
        bus.write(0x8000, 0xAB);
        assert_eq!(bus.read(0x8000), 0xAB);
        assert_eq!(bus.read(0xA000), 0xBB);
        assert_eq!(bus.read(0xE000), 0xEE);
    }

    #[test]
    fn vic_registers_and_mirror() {
        let mut bus = make_bus();
        bus.write(0xD020, 0x06);
        assert_eq!(bus.read(0xD020) & 0x0F, 0x06);
        // Mirrors every $40 bytes across $D000-$D3FF.
        assert_eq!(bus.read(0xD060) & 0x0F, 0x06);
        assert_eq!(bus.read(0xD3E0) & 0x0F, 0x06);
    }

    #[test]
    fn sid_mirror_every_20() {
        let mut bus = make_bus();
        bus.write(0xD418, 0x0F);
        assert_eq!(bus.read(0xD418), 0x0F);
        assert_eq!(bus.read(0xD438), 0x0F);
        assert_eq!(bus.read(0xD7F8), 0x0F);
    }

    #[test]
    fn cia_mirror_every_10() {
        let mut bus = make_bus();
        bus.write(0xDC04, 0x42);
        bus.write(0xDC05, 0x00); // load timer A while stopped
        assert_eq!(bus.read(0xDC14), 0x42, "counter low via mirror");
    }

    #[test]
    fn colour_ram_high_nibble_is_open_bus() {
        let mut bus = make_bus();
        bus.write(0xD800, 0xFF);
        // Preceding read leaves $EE (Kernal byte) on the bus.
        let _ = bus.read(0xE000);
        assert_eq!(bus.read(0xD800), 0xEF);
    }

    #[test]
    fn io_invisible_when_banked_out() {
        let mut bus = make_bus();
        bus.write(0xD020, 0x06);
        bus.write(0x0001, 0x30); // all-RAM configuration
        bus.write(0xD020, 0x0A); // lands in RAM now
        assert_eq!(bus.memory.ram_read(0xD020), 0x0A);
        bus.write(0x0001, 0x37);
        assert_eq!(bus.read(0xD020) & 0x0F, 0x06, "register kept its value");
    }

    #[test]
    fn banking_visible_within_instruction_sequence() {
        let mut bus = make_bus();
        // A write to $0001 must affect the very next access.
        assert_eq!(bus.read(0xA000), 0xBB);
        bus.write(0x0001, 0x35);
        assert_eq!(bus.read(0xA000), 0x00);
        bus.write(0x0001, 0x37);
        assert_eq!(bus.read(0xA000), 0xBB);
    }

    #[test]
    fn cia2_port_a_drives_vic_bank_and_iec() {
        let mut bus = make_bus();
        bus.write(0xDD02, 0x3F); // DDR A: bits 0-5 outputs
        bus.write(0xDD00, 0x01); // bank bits %01 -> bank 2
        assert_eq!(bus.vic.bank(), 2);
        assert!(bus.iec.atn(), "ATN released");
        bus.write(0xDD00, 0x01 | 0x08); // assert ATN
        assert!(!bus.iec.atn());
    }

    #[test]
    fn keyboard_scan_through_cia1() {
        let mut bus = make_bus();
        bus.write(0xDC02, 0xFF); // port A all output
        bus.write(0xDC03, 0x00); // port B all input
        bus.keyboard.set_key(1, 3, true);
        bus.write(0xDC00, !0x02); // select column 1
        assert_eq!(bus.read(0xDC01) & 0x08, 0, "row 3 low");
        bus.write(0xDC00, 0xFF); // deselect
        assert_eq!(bus.read(0xDC01), 0xFF);
    }

    #[test]
    fn joystick2_pulls_port_a_lines() {
        let mut bus = make_bus();
        bus.write(0xDC02, 0x00); // port A input
        bus.set_joystick2(!0x10); // fire pressed
        assert_eq!(bus.read(0xDC00) & 0x10, 0);
    }

    #[test]
    fn sdr_write_cross_triggers_peer_flag() {
        let mut bus = make_bus();
        // CIA2 enables its FLAG interrupt source.
        bus.write(0xDD0D, 0x90);
        // CIA1 shifts a byte out.
        bus.write(0xDC0E, 0x40); // SDR output mode
        bus.write(0xDC0C, 0xA5);
        assert!(bus.cia2.irq_asserted(), "peer FLAG fired -> NMI line");
        // And the other direction.
        bus.write(0xDC0D, 0x90);
        bus.write(0xDD0E, 0x40);
        bus.write(0xDD0C, 0x12);
        assert!(bus.cia1.irq_asserted());
    }

    #[test]
    fn tick_reports_cia1_irq_and_cia2_nmi() {
        let mut bus = make_bus();
        bus.write(0xDC0D, 0x81); // enable timer A
        bus.write(0xDC04, 0x04);
        bus.write(0xDC05, 0x00);
        bus.write(0xDC0E, 0x01); // start
        let signals = bus.tick(10).expect("tick");
        assert!(signals.irq);
        assert!(!signals.nmi);

        let mut bus = make_bus();
        bus.write(0xDD0D, 0x81);
        bus.write(0xDD04, 0x04);
        bus.write(0xDD05, 0x00);
        bus.write(0xDD0E, 0x01);
        let signals = bus.tick(10).expect("tick");
        assert!(signals.nmi);
        assert!(!signals.irq);
    }

    #[test]
    fn vic_raster_irq_reaches_irq_line() {
        let mut bus = make_bus();
        bus.write(0xD012, 1); // compare line 1
        bus.write(0xD01A, 0x01);
        let signals = bus.tick(63).expect("tick");
        assert!(signals.irq);
        // Acknowledge through $D019.
        bus.write(0xD019, 0x01);
        let signals = bus.tick(1).expect("tick");
        assert!(!signals.irq);
    }

    #[test]
    fn cartridge_io1_reaches_mapper() {
        let mut bus = make_bus();
        bus.memory
            .attach_cartridge(Cartridge::standard_8k(vec![0x5A; BANK_SIZE]));
        assert_eq!(bus.read(0x8000), 0x5A);
        // I/O-1 reads float the open bus for a standard cartridge.
        let _ = bus.read(0xE000); // puts $EE on the bus
        assert_eq!(bus.read(0xDE00), 0xEE);
    }

    #[test]
    fn quit_handle_unwinds_tick() {
        let mut bus = make_bus();
        let quit = bus.quit_handle();
        assert!(bus.tick(1).is_ok());
        quit.store(true, Ordering::Relaxed);
        assert_eq!(bus.tick(1).unwrap_err(), QuitRequest);
    }

    #[test]
    fn snapshot_published_after_full_frame() {
        let mut bus = make_bus();
        bus.write(0x0400, 0x08); // screen RAM
        bus.write(0xD800, 0x05); // colour RAM
        let frame = bus.vic.timing().cycles_per_frame();
        bus.tick(frame).expect("tick");
        assert!(bus.vic.take_frame_complete());
        let snap = bus.vic.frame_snapshot().expect("snapshot");
        assert_eq!(snap.ram[0x0400], 0x08);
        assert_eq!(snap.color[0], 0x05);
    }
}
