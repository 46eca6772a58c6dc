//! Cycle-accurate Commodore 64 emulation core.
//!
//! The host CPU executes in frame-sized cycle batches against [`C64Bus`];
//! after every instruction the bus advances the VIC-II, both CIAs and the
//! optional 1541 drive (a full second 6502 in 1:1 lockstep over the IEC
//! bus) and reports the IRQ/NMI line levels. At VBlank the VIC publishes
//! an immutable snapshot of the visible 16K bank plus colour RAM for a
//! decoupled renderer.
//!
//! Rendering back-ends, input mapping and front-ends are external
//! collaborators: they consume [`mos_vic_ii::FrameSnapshot`]s, feed the
//! keyboard matrix, and drive the machine loop.

mod bus;
mod c64;
pub mod cartridge;
mod config;
mod drive;
mod drive_bus;
mod error;
mod governor;
mod iec;
mod keyboard;
mod memory;

pub use bus::C64Bus;
pub use c64::C64;
pub use cartridge::{Cartridge, Mapper};
pub use config::{C64Config, DriveMode, RomSet};
pub use drive::Drive1541;
pub use drive_bus::DriveBus;
pub use error::{C64Error, RomError};
pub use governor::FrameGovernor;
pub use iec::{IecBus, IecMirror};
pub use keyboard::KeyboardMatrix;
pub use memory::{C64Memory, DirtyGrid};
