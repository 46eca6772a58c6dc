//! MOS 6569/6567 VIC-II video chip.
//!
//! Raster-driven scheduling without pixel rendering: the machine hands
//! [`Vic::update`] the CPU cycles elapsed since the previous call, the chip
//! advances whole raster lines, raises raster/collision/light-pen IRQs
//! through its interrupt latch, and at VBlank publishes an immutable
//! [`FrameSnapshot`] of the 16 KiB VIC bank plus colour RAM. A renderer
//! consumes snapshots on its own thread without ever touching live RAM.
//!
//! # Timing
//!
//! | Chip     | Lines | Cycles/line | CPU clock (Hz) | Refresh (Hz) |
//! |----------|-------|-------------|----------------|--------------|
//! | 6569     | 312   | 63          | 985,248        | 50.125       |
//! | 6567R8   | 263   | 65          | 1,022,727      | 59.826       |
//! | 6567R56A | 262   | 64          | 1,022,730      | 60.985       |

use std::fmt;
use std::str::FromStr;
use std::sync::Arc;

/// Interrupt latch bit: raster compare match.
pub const IRQ_RASTER: u8 = 0x01;
/// Interrupt latch bit: sprite-background collision.
pub const IRQ_SPRITE_BG: u8 = 0x02;
/// Interrupt latch bit: sprite-sprite collision.
pub const IRQ_SPRITE_SPRITE: u8 = 0x04;
/// Interrupt latch bit: light pen strobe.
pub const IRQ_LIGHTPEN: u8 = 0x08;

/// First raster line of the text display window.
pub const DISPLAY_START_LINE: u16 = 0x30;
/// One past the last raster line of the text display window.
pub const DISPLAY_END_LINE: u16 = 0xF8;

/// VIC-II silicon revision.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum ChipModel {
    /// 6569: PAL.
    #[default]
    Mos6569,
    /// 6567R8: NTSC.
    Mos6567R8,
    /// 6567R56A: early NTSC.
    Mos6567R56A,
}

/// Timing constants derived from the chip model.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Timing {
    pub lines: u16,
    pub cycles_per_line: u32,
    pub cpu_hz: u32,
    pub refresh_hz: f64,
    /// Full scan width in pixels (8 per cycle).
    pub total_width: u32,
    /// Full scan height in lines.
    pub total_height: u32,
}

impl Timing {
    /// CPU cycles in one complete frame.
    #[must_use]
    pub fn cycles_per_frame(&self) -> u32 {
        u32::from(self.lines) * self.cycles_per_line
    }
}

impl ChipModel {
    /// Timing table entry for this revision.
    #[must_use]
    pub fn timing(self) -> Timing {
        let (lines, cycles_per_line, cpu_hz, refresh_hz) = match self {
            Self::Mos6569 => (312, 63, 985_248, 50.125),
            Self::Mos6567R8 => (263, 65, 1_022_727, 59.826),
            Self::Mos6567R56A => (262, 64, 1_022_730, 60.985),
        };
        Timing {
            lines,
            cycles_per_line,
            cpu_hz,
            refresh_hz,
            total_width: cycles_per_line * 8,
            total_height: u32::from(lines),
        }
    }
}

impl fmt::Display for ChipModel {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            Self::Mos6569 => "6569",
            Self::Mos6567R8 => "6567R8",
            Self::Mos6567R56A => "6567R56A",
        })
    }
}

/// Error for unrecognised chip names.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct UnknownChip(pub String);

impl fmt::Display for UnknownChip {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "unknown VIC-II chip {:?} (expected 6569/PAL, 6567R8/NTSC or 6567R56A)",
            self.0
        )
    }
}

impl std::error::Error for UnknownChip {}

impl FromStr for ChipModel {
    type Err = UnknownChip;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_uppercase().as_str() {
            "6569" | "PAL" => Ok(Self::Mos6569),
            "6567R8" | "NTSC" => Ok(Self::Mos6567R8),
            "6567R56A" => Ok(Self::Mos6567R56A),
            _ => Err(UnknownChip(s.to_string())),
        }
    }
}

/// Memory as seen from the VIC's side of the bus.
///
/// The machine implements this over its RAM: a 16 KiB bank window with the
/// character ROM shadowed in banks 0 and 2, plus the 1 KiB colour RAM.
pub trait VideoMemory {
    /// Read within the 16 KiB bank window (`offset` masked to 14 bits).
    fn vic_read(&self, bank: u8, offset: u16) -> u8;

    /// Colour RAM low nibble at `offset` (0-1023).
    fn color_read(&self, offset: u16) -> u8;
}

/// Immutable copy of everything a renderer needs for one frame, published
/// atomically at VBlank.
pub struct FrameSnapshot {
    /// Frame counter at the time of the snapshot.
    pub frame: u64,
    /// VIC bank (0-3) the snapshot was taken from.
    pub bank: u8,
    /// The full 16 KiB bank as the VIC saw it.
    pub ram: Box<[u8; 0x4000]>,
    /// Colour RAM low nibbles.
    pub color: Box<[u8; 0x0400]>,
    /// Register file at VBlank (screen/char pointers, colours, control).
    pub registers: [u8; 0x40],
}

impl FrameSnapshot {
    /// Screen memory offset within the bank, from register $18 bits 4-7.
    #[must_use]
    pub fn screen_base(&self) -> u16 {
        u16::from((self.registers[0x18] >> 4) & 0x0F) * 0x0400
    }

    /// Character/bitmap offset within the bank, from register $18 bits 1-3.
    #[must_use]
    pub fn char_base(&self) -> u16 {
        u16::from((self.registers[0x18] >> 1) & 0x07) * 0x0800
    }
}

/// VIC-II chip state.
pub struct Vic {
    model: ChipModel,
    timing: Timing,

    /// Register file ($D000-$D03F window).
    regs: [u8; 0x40],

    /// Current raster line.
    raster: u16,
    /// Cycles consumed within the current line.
    line_cycles: u32,
    /// Raster compare value ($D012 + $D011 bit 7).
    raster_compare: u16,

    /// Interrupt latch ($D019 bits 0-3).
    irq_latch: u8,
    /// Interrupt enable mask ($D01A bits 0-3).
    irq_enable: u8,

    /// Sprite-sprite collision register ($D01E, clear on read).
    sprite_collision: u8,
    /// Sprite-background collision register ($D01F, clear on read).
    background_collision: u8,

    /// Light pen has latched this frame (one strobe per frame).
    lightpen_latched: bool,

    /// VIC bank (0-3) from CIA2 port A, already inverted.
    bank: u8,

    /// Completed frame count.
    frames: u64,
    /// One-shot VBlank event for the frame governor.
    frame_complete: bool,
    /// Snapshot published at the most recent VBlank.
    snapshot: Option<Arc<FrameSnapshot>>,
}

impl Vic {
    #[must_use]
    pub fn new(model: ChipModel) -> Self {
        Self {
            model,
            timing: model.timing(),
            regs: [0; 0x40],
            raster: 0,
            line_cycles: 0,
            raster_compare: 0,
            irq_latch: 0,
            irq_enable: 0,
            sprite_collision: 0,
            background_collision: 0,
            lightpen_latched: false,
            bank: 0,
            frames: 0,
            frame_complete: false,
            snapshot: None,
        }
    }

    /// Chip revision.
    #[must_use]
    pub fn model(&self) -> ChipModel {
        self.model
    }

    /// Derived timing constants.
    #[must_use]
    pub fn timing(&self) -> &Timing {
        &self.timing
    }

    /// Advance by `cycles` CPU cycles, completing raster lines as they
    /// fill up. Takes the VBlank snapshot through `mem` when the beam
    /// enters the last line.
    pub fn update<M: VideoMemory>(&mut self, cycles: u32, mem: &M) {
        self.line_cycles += cycles;
        while self.line_cycles >= self.timing.cycles_per_line {
            self.line_cycles -= self.timing.cycles_per_line;
            self.advance_line(mem);
        }
    }

    fn advance_line<M: VideoMemory>(&mut self, mem: &M) {
        self.raster += 1;
        if self.raster >= self.timing.lines {
            self.raster = 0;
            self.lightpen_latched = false;
        }

        if self.raster == self.raster_compare {
            self.irq_latch |= IRQ_RASTER;
        }

        // Entering the last line is VBlank: publish the frame.
        if self.raster == self.timing.lines - 1 {
            self.take_snapshot(mem);
            self.frames += 1;
            self.frame_complete = true;
        }
    }

    fn take_snapshot<M: VideoMemory>(&mut self, mem: &M) {
        let mut ram = Box::new([0u8; 0x4000]);
        for (offset, byte) in ram.iter_mut().enumerate() {
            *byte = mem.vic_read(self.bank, offset as u16);
        }
        let mut color = Box::new([0u8; 0x0400]);
        for (offset, nibble) in color.iter_mut().enumerate() {
            *nibble = mem.color_read(offset as u16);
        }
        self.snapshot = Some(Arc::new(FrameSnapshot {
            frame: self.frames,
            bank: self.bank,
            ram,
            color,
            registers: self.regs,
        }));
        log::trace!("VBlank snapshot: frame {} bank {}", self.frames, self.bank);
    }

    /// Whether the chip asserts its IRQ output.
    #[must_use]
    pub fn irq_asserted(&self) -> bool {
        self.irq_latch & self.irq_enable & 0x0F != 0
    }

    /// Read a register (6-bit select; the window mirrors every $40 bytes).
    pub fn read(&mut self, reg: u8) -> u8 {
        match reg & 0x3F {
            0x11 => {
                let raster_hi = if self.raster & 0x100 != 0 { 0x80 } else { 0 };
                (self.regs[0x11] & 0x7F) | raster_hi
            }
            0x12 => self.raster as u8,
            0x13 | 0x14 => self.regs[(reg & 0x3F) as usize],
            0x16 => self.regs[0x16] | 0xC0,
            0x18 => self.regs[0x18] | 0x01,
            0x19 => {
                let any = if self.irq_asserted() { 0x80 } else { 0 };
                self.irq_latch | 0x70 | any
            }
            0x1A => self.irq_enable | 0xF0,
            0x1E => {
                let v = self.sprite_collision;
                self.sprite_collision = 0;
                v
            }
            0x1F => {
                let v = self.background_collision;
                self.background_collision = 0;
                v
            }
            r @ 0x20..=0x2E => self.regs[r as usize] | 0xF0,
            0x2F..=0x3F => 0xFF,
            r => self.regs[r as usize],
        }
    }

    /// Write a register.
    pub fn write(&mut self, reg: u8, value: u8) {
        let r = (reg & 0x3F) as usize;
        self.regs[r] = value;

        match r {
            0x11 => {
                // Bit 7 is bit 8 of the raster compare latch.
                self.raster_compare =
                    (self.raster_compare & 0x00FF) | (u16::from(value & 0x80) << 1);
            }
            0x12 => {
                // Writes latch the compare value; the current raster is
                // only visible through reads.
                self.raster_compare = (self.raster_compare & 0x0100) | u16::from(value);
            }
            0x19 => {
                // Acknowledge: writing 1 clears the latch bit.
                self.irq_latch &= !(value & 0x0F);
            }
            0x1A => {
                self.irq_enable = value & 0x0F;
            }
            _ => {}
        }
    }

    /// Latched raster compare value (diagnostics).
    #[must_use]
    pub fn raster_compare(&self) -> u16 {
        self.raster_compare
    }

    /// Current raster line.
    #[must_use]
    pub fn raster_line(&self) -> u16 {
        self.raster
    }

    /// Cycles consumed within the current raster line.
    #[must_use]
    pub fn line_cycles(&self) -> u32 {
        self.line_cycles
    }

    /// Completed frame count.
    #[must_use]
    pub fn frame_count(&self) -> u64 {
        self.frames
    }

    /// Select the 16 KiB bank (0-3), already inverted from CIA2 port A.
    pub fn set_bank(&mut self, bank: u8) {
        self.bank = bank & 0x03;
    }

    /// Current VIC bank.
    #[must_use]
    pub fn bank(&self) -> u8 {
        self.bank
    }

    /// Check and clear the VBlank event.
    pub fn take_frame_complete(&mut self) -> bool {
        std::mem::take(&mut self.frame_complete)
    }

    /// The snapshot published at the most recent VBlank.
    #[must_use]
    pub fn frame_snapshot(&self) -> Option<Arc<FrameSnapshot>> {
        self.snapshot.clone()
    }

    /// Renderer-reported sprite-sprite collision (bit per sprite).
    pub fn report_sprite_collision(&mut self, mask: u8) {
        if mask != 0 {
            // First collision of a frame raises the interrupt source.
            if self.sprite_collision == 0 {
                self.irq_latch |= IRQ_SPRITE_SPRITE;
            }
            self.sprite_collision |= mask;
        }
    }

    /// Renderer-reported sprite-background collision (bit per sprite).
    pub fn report_background_collision(&mut self, mask: u8) {
        if mask != 0 {
            if self.background_collision == 0 {
                self.irq_latch |= IRQ_SPRITE_BG;
            }
            self.background_collision |= mask;
        }
    }

    /// Light pen strobe at the given beam position. Latches once per frame.
    pub fn report_lightpen(&mut self, x: u8, y: u8) {
        if !self.lightpen_latched {
            self.lightpen_latched = true;
            self.regs[0x13] = x;
            self.regs[0x14] = y;
            self.irq_latch |= IRQ_LIGHTPEN;
        }
    }
}
