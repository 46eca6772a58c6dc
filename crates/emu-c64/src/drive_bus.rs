//! 1541 drive bus: address decoding for the drive's internal 6502.
//!
//! Address map (partial decode, so RAM and the VIAs mirror):
//!   $0000-$07FF  2K RAM (mirrored through $17FF)
//!   $1800-$1BFF  VIA1 — IEC serial interface (registers mirror every $10)
//!   $1C00-$1FFF  VIA2 — disk controller
//!   $C000-$FFFF  16K DOS ROM
//!
//! The bus owns both VIAs; its `tick` advances their timers for the
//! cycles the drive CPU just consumed and reports the combined IRQ level.

use emu_core::{Bus, BusSignals, QuitRequest};
use mos_via_6522::Via6522;

use crate::config::DRIVE_ROM_SIZE;

/// Bus seen by the 1541's 6502.
pub struct DriveBus {
    ram: [u8; 2048],
    rom: Vec<u8>,
    /// VIA1 ($1800): IEC serial bus interface.
    pub via1: Via6522,
    /// VIA2 ($1C00): disk controller.
    pub via2: Via6522,
}

impl DriveBus {
    /// Build the bus around a 16K DOS ROM. Size is validated by the
    /// machine before construction.
    #[must_use]
    pub fn new(rom: Vec<u8>) -> Self {
        assert!(rom.len() == DRIVE_ROM_SIZE, "1541 ROM must be 16384 bytes");
        Self {
            ram: [0; 2048],
            rom,
            via1: Via6522::new(),
            via2: Via6522::new(),
        }
    }

    /// DOS ROM bytes.
    #[must_use]
    pub fn rom(&self) -> &[u8] {
        &self.rom
    }
}

impl Bus for DriveBus {
    fn read(&mut self, address: u16) -> u8 {
        match address {
            0x1800..=0x1BFF => self.via1.read((address & 0x0F) as u8),
            0x1C00..=0x1FFF => self.via2.read((address & 0x0F) as u8),
            0xC000..=0xFFFF => self.rom[(address - 0xC000) as usize],
            _ => self.ram[(address & 0x07FF) as usize],
        }
    }

    fn write(&mut self, address: u16, value: u8) {
        match address {
            0x1800..=0x1BFF => self.via1.write((address & 0x0F) as u8, value),
            0x1C00..=0x1FFF => self.via2.write((address & 0x0F) as u8, value),
            0xC000..=0xFFFF => {} // ROM
            _ => self.ram[(address & 0x07FF) as usize] = value,
        }
    }

    fn tick(&mut self, cycles: u32) -> Result<BusSignals, QuitRequest> {
        self.via1.update(cycles);
        self.via2.update(cycles);
        Ok(BusSignals {
            irq: self.via1.irq_asserted() || self.via2.irq_asserted(),
            nmi: false,
        })
    }
}
