//! Core bus traits and types for cycle-accurate emulation.
//!
//! A CPU core executes instructions against a [`Bus`]. After every retired
//! instruction the CPU hands the consumed cycle count back to the bus via
//! [`Bus::tick`], which is where a machine advances its peripherals and
//! reports the resulting interrupt line levels.

mod bus;

pub use bus::{Bus, BusSignals, QuitRequest, SimpleBus};
