//! Memory and I/O bus interface.

use thiserror::Error;

/// Interrupt line levels reported by [`Bus::tick`].
///
/// `irq` is a level: the bus recomputes it from every source each tick and
/// the CPU samples it at instruction boundaries while I is clear. `nmi` is
/// also reported as a level; the CPU performs its own edge detection.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct BusSignals {
    /// IRQ line asserted.
    pub irq: bool,
    /// NMI line asserted.
    pub nmi: bool,
}

/// Externally requested shutdown.
///
/// Raised from [`Bus::tick`] (window close, Ctrl-C mapped by the front-end)
/// and unwinds the whole execution loop.
#[derive(Debug, Clone, Copy, Error, PartialEq, Eq)]
#[error("quit requested")]
pub struct QuitRequest;

/// Memory and I/O bus interface.
///
/// Components access memory and peripherals through this trait. The bus
/// handles address decoding and routing to the appropriate device.
pub trait Bus {
    /// Read a byte from the given address.
    fn read(&mut self, address: u16) -> u8;

    /// Write a byte to the given address.
    fn write(&mut self, address: u16, value: u8);

    /// Advance peripherals after an instruction (or interrupt sequence)
    /// retires. `cycles` is the exact count the CPU consumed.
    ///
    /// The default implementation does nothing and keeps both lines released,
    /// which is what a bare memory image wants.
    fn tick(&mut self, cycles: u32) -> Result<BusSignals, QuitRequest> {
        let _ = cycles;
        Ok(BusSignals::default())
    }
}

/// Flat 64K RAM with no peripherals. Used by CPU unit tests.
pub struct SimpleBus {
    ram: Box<[u8; 0x1_0000]>,
}

impl SimpleBus {
    #[must_use]
    pub fn new() -> Self {
        Self {
            ram: Box::new([0; 0x1_0000]),
        }
    }

    /// Copy `bytes` into RAM starting at `addr`.
    pub fn load(&mut self, addr: u16, bytes: &[u8]) {
        for (i, &b) in bytes.iter().enumerate() {
            self.ram[addr.wrapping_add(i as u16) as usize] = b;
        }
    }

    /// Read without side effects.
    #[must_use]
    pub fn peek(&self, addr: u16) -> u8 {
        self.ram[addr as usize]
    }

    /// Write directly, bypassing the bus protocol.
    pub fn poke(&mut self, addr: u16, value: u8) {
        self.ram[addr as usize] = value;
    }
}

impl Default for SimpleBus {
    fn default() -> Self {
        Self::new()
    }
}

impl Bus for SimpleBus {
    fn read(&mut self, address: u16) -> u8 {
        self.ram[address as usize]
    }

    fn write(&mut self, address: u16, value: u8) {
        self.ram[address as usize] = value;
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn simple_bus_round_trip() {
        let mut bus = SimpleBus::new();
        bus.write(0x1234, 0xAB);
        assert_eq!(bus.read(0x1234), 0xAB);
    }

    #[test]
    fn load_places_bytes() {
        let mut bus = SimpleBus::new();
        bus.load(0x0400, &[1, 2, 3]);
        assert_eq!(bus.peek(0x0400), 1);
        assert_eq!(bus.peek(0x0402), 3);
    }

    #[test]
    fn default_tick_keeps_lines_released() {
        let mut bus = SimpleBus::new();
        let signals = bus.tick(7).expect("tick");
        assert!(!signals.irq);
        assert!(!signals.nmi);
    }
}
