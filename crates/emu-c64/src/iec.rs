//! IEC serial bus between the C64 (CIA2) and the 1541 drive.
//!
//! Three open-collector lines: ATN, CLK, DATA. Each participant holds a
//! pull-down state per line and the wired-OR rule applies: a line is low
//! iff anyone pulls it low, and reads high only when everyone releases it.
//!
//! In the threaded runner configuration an atomic mirror of the line
//! levels is maintained so observers on other threads (debuggers, bus
//! monitors) can sample the bus without locks. The emulated behaviour is
//! identical in both configurations.

use std::sync::Arc;
use std::sync::atomic::{AtomicU8, Ordering};

/// Mirror bit: ATN line high.
pub const MIRROR_ATN: u8 = 0x01;
/// Mirror bit: CLK line high.
pub const MIRROR_CLK: u8 = 0x02;
/// Mirror bit: DATA line high.
pub const MIRROR_DATA: u8 = 0x04;

/// Lock-free snapshot of the line levels for cross-thread observers.
pub struct IecMirror {
    lines: AtomicU8,
}

impl IecMirror {
    fn new() -> Self {
        Self {
            lines: AtomicU8::new(MIRROR_ATN | MIRROR_CLK | MIRROR_DATA),
        }
    }

    /// Current line levels as mirror bits (1 = high).
    #[must_use]
    pub fn lines(&self) -> u8 {
        self.lines.load(Ordering::Acquire)
    }
}

/// The serial bus with its two participants.
pub struct IecBus {
    /// C64-side pull-downs: [ATN, CLK, DATA].
    c64_pulls: [bool; 3],
    /// Drive-side pull-downs: [ATN, CLK, DATA].
    drive_pulls: [bool; 3],
    mirror: Option<Arc<IecMirror>>,
}

impl IecBus {
    /// Bus with all lines released.
    #[must_use]
    pub fn new() -> Self {
        Self {
            c64_pulls: [false; 3],
            drive_pulls: [false; 3],
            mirror: None,
        }
    }

    /// Enable the atomic line mirror (threaded runner) and return a handle.
    pub fn enable_mirror(&mut self) -> Arc<IecMirror> {
        let mirror = Arc::new(IecMirror::new());
        self.mirror = Some(Arc::clone(&mirror));
        self.update();
        mirror
    }

    /// Handle to the atomic mirror, when enabled.
    #[must_use]
    pub fn mirror(&self) -> Option<Arc<IecMirror>> {
        self.mirror.clone()
    }

    /// C64 outputs from CIA2 port A: bit 3 = ATN out, bit 4 = CLK out,
    /// bit 5 = DATA out; a set bit pulls the line low.
    pub fn set_c64_outputs(&mut self, port_a: u8) {
        self.c64_pulls = [port_a & 0x08 != 0, port_a & 0x10 != 0, port_a & 0x20 != 0];
        self.update();
    }

    /// Drive-side CLK pull.
    pub fn set_drive_clk(&mut self, pull_low: bool) {
        self.drive_pulls[1] = pull_low;
        self.update();
    }

    /// Drive-side DATA pull.
    pub fn set_drive_data(&mut self, pull_low: bool) {
        self.drive_pulls[2] = pull_low;
        self.update();
    }

    /// ATN line level (true = high/released). Only the C64 drives ATN.
    #[must_use]
    pub fn atn(&self) -> bool {
        !self.c64_pulls[0] && !self.drive_pulls[0]
    }

    /// CLK line level.
    #[must_use]
    pub fn clk(&self) -> bool {
        !self.c64_pulls[1] && !self.drive_pulls[1]
    }

    /// DATA line level.
    #[must_use]
    pub fn data(&self) -> bool {
        !self.c64_pulls[2] && !self.drive_pulls[2]
    }

    /// Recompute the published line state. With the mirror disabled this
    /// is free; line levels are always derived on read.
    pub fn update(&mut self) {
        if let Some(mirror) = &self.mirror {
            let mut bits = 0;
            if self.atn() {
                bits |= MIRROR_ATN;
            }
            if self.clk() {
                bits |= MIRROR_CLK;
            }
            if self.data() {
                bits |= MIRROR_DATA;
            }
            mirror.lines.store(bits, Ordering::Release);
        }
    }

    /// CIA2 port A input bits: bit 6 = CLK in, bit 7 = DATA in
    /// (bit set = line high).
    #[must_use]
    pub fn cia2_input_bits(&self) -> u8 {
        let mut bits = 0;
        if self.clk() {
            bits |= 0x40;
        }
        if self.data() {
            bits |= 0x80;
        }
        bits
    }
}

impl Default for IecBus {
    fn default() -> Self {
        Self::new()
    }
}
