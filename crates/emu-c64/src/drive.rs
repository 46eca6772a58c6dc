//! 1541 floppy drive: a second 6502 running the DOS ROM in lockstep with
//! the host CPU.
//!
//! The machine calls [`Drive1541::run`] from its bus tick with exactly the
//! cycles the host CPU just consumed, so the two processors stay
//! bit-synchronised across the bit-banged IEC protocol. The drive CPU
//! executes atomically like the host's; any overshoot is carried as debt
//! against the next batch.
//!
//! VIA wiring:
//!
//!   VIA1 ($1800): IEC interface
//!     Port B: bit 0 = DATA in, bit 1 = DATA out, bit 2 = CLK in,
//!             bit 3 = CLK out, bit 4 = ATNA, bit 7 = ATN in
//!     CA1:    ATN edge
//!     The ATNA XOR gate pulls DATA low whenever ATNA disagrees with the
//!     ATN level — the hardware "device present" acknowledge.
//!
//!   VIA2 ($1C00): disk controller
//!     Port A: GCR byte at the head
//!     Port B: bits 0-1 = stepper phase, bit 2 = motor, bit 3 = LED,
//!             bit 4 = write protect sense, bits 5-6 = density,
//!             bit 7 = SYNC detect (0 = in sync)
//!     CA1:    byte-ready (also raises the CPU's SO pin when CA2 allows)
//!     CB2:    read/write mode (0 = write)

use format_d64::D64;
use format_gcr as gcr;
use mos_6502::{Mos6502, Variant};

use crate::drive_bus::DriveBus;
use crate::iec::IecBus;

/// Half-track positions: tracks 1-35 as 0-68 plus the odd in-betweens.
const MAX_HALF_TRACK: u8 = 69;

/// The 1541 drive.
pub struct Drive1541 {
    cpu: Mos6502,
    bus: DriveBus,
    disk: Option<D64>,

    /// Head position in half-tracks; whole track = half_track/2 + 1.
    half_track: u8,
    /// GCR byte loop for the current track.
    gcr_track: Vec<u8>,
    gcr_position: usize,
    /// Cycle accumulator toward the next byte at the head.
    byte_accumulator: u32,

    motor_on: bool,
    led_on: bool,
    write_mode: bool,
    write_buffer: Vec<u8>,
    prev_stepper_phase: u8,

    /// Cycles the CPU overdrew on the previous batch.
    debt: u64,
    /// Drive CPU jammed; only reset recovers.
    faulted: bool,
}

impl Drive1541 {
    /// Build a drive around a 16K DOS ROM and reset it.
    #[must_use]
    pub fn new(rom: Vec<u8>) -> Self {
        let mut drive = Self {
            cpu: Mos6502::new(Variant::Nmos6502),
            bus: DriveBus::new(rom),
            disk: None,
            half_track: 34, // track 18, the directory track
            gcr_track: Vec::new(),
            gcr_position: 0,
            byte_accumulator: 0,
            motor_on: false,
            led_on: false,
            write_mode: false,
            write_buffer: Vec::new(),
            prev_stepper_phase: 0,
            debt: 0,
            faulted: false,
        };
        drive.reset();
        drive
    }

    /// Reset the drive CPU through the DOS ROM's reset vector.
    pub fn reset(&mut self) {
        self.cpu.reset(&mut self.bus);
        self.debt = 0;
        self.faulted = false;
        log::debug!("1541 reset: PC=${:04X}", self.cpu.regs.pc);
    }

    /// Insert a disk image; the current track is encoded immediately.
    pub fn insert_disk(&mut self, disk: D64) {
        self.disk = Some(disk);
        self.encode_current_track();
        log::info!("disk inserted, head on track {}", self.track());
    }

    /// Remove the disk, returning it (with any writes applied).
    pub fn eject_disk(&mut self) -> Option<D64> {
        self.gcr_track.clear();
        self.gcr_position = 0;
        self.disk.take()
    }

    /// Whether a disk is in the drive.
    #[must_use]
    pub fn has_disk(&self) -> bool {
        self.disk.is_some()
    }

    /// The inserted disk.
    #[must_use]
    pub fn disk(&self) -> Option<&D64> {
        self.disk.as_ref()
    }

    /// Current whole track under the head (1-35).
    #[must_use]
    pub fn track(&self) -> u8 {
        self.half_track / 2 + 1
    }

    /// Spindle motor state.
    #[must_use]
    pub fn motor_on(&self) -> bool {
        self.motor_on
    }

    /// Activity LED state.
    #[must_use]
    pub fn led_on(&self) -> bool {
        self.led_on
    }

    /// The drive CPU (diagnostics).
    #[must_use]
    pub fn cpu(&self) -> &Mos6502 {
        &self.cpu
    }

    /// The drive bus (diagnostics and tests).
    #[must_use]
    pub fn bus(&self) -> &DriveBus {
        &self.bus
    }

    /// Advance the drive by exactly `cycles` host CPU cycles, exchanging
    /// IEC line state before and after so the host sees the response on
    /// its next cycle.
    pub fn run(&mut self, cycles: u32, iec: &mut IecBus) {
        self.sync_inputs(iec);
        self.run_cpu(cycles);
        self.sync_outputs(iec);
        self.update_mechanics();
        self.rotate_disk(cycles);
    }

    /// Latch the IEC line levels into VIA1.
    fn sync_inputs(&mut self, iec: &IecBus) {
        let mut pb = 0u8;
        // Inverted senses: a low bus line reads as a set input bit.
        if !iec.data() {
            pb |= 0x01;
        }
        if !iec.clk() {
            pb |= 0x04;
        }
        // ATN in is the raw level on bit 7.
        if iec.atn() {
            pb |= 0x80;
        }
        self.bus.via1.set_port_b_input_bits(0x85, pb);

        // CA1 follows the asserted level for edge detection.
        self.bus.via1.set_ca1(!iec.atn());
    }

    fn run_cpu(&mut self, cycles: u32) {
        if self.faulted {
            return;
        }
        let budget = u64::from(cycles).saturating_sub(self.debt);
        if budget == 0 {
            self.debt -= u64::from(cycles);
            return;
        }
        match self.cpu.execute(&mut self.bus, budget, None) {
            Ok(_) => self.debt = self.cpu.budget_overrun(),
            Err(err) => {
                log::error!("1541 CPU fault: {err}");
                self.faulted = true;
            }
        }
    }

    /// Drive the IEC lines from VIA1 port B outputs.
    fn sync_outputs(&mut self, iec: &mut IecBus) {
        let pb = self.bus.via1.port_b_output();
        let atna = pb & 0x10 != 0;
        let atn_asserted = !iec.atn();
        // DATA: explicit output, or the ATNA mismatch auto-acknowledge.
        let data_pull = (pb & 0x02 != 0) || (atna != atn_asserted);
        iec.set_drive_data(data_pull);
        iec.set_drive_clk(pb & 0x08 != 0);
    }

    /// Decode VIA2 port B into motor, LED, stepper and write-mode state.
    fn update_mechanics(&mut self) {
        let pb = self.bus.via2.port_b_output();
        self.motor_on = pb & 0x04 != 0;
        self.led_on = pb & 0x08 != 0;

        let phase = pb & 0x03;
        if phase != self.prev_stepper_phase {
            self.step_head(phase);
        }

        // Write-protect sense (bit 4): set while a writable disk is in.
        let wp = if self.disk.is_some() { 0x10 } else { 0x00 };
        self.bus.via2.set_port_b_input_bits(0x10, wp);

        // CB2 low = write mode. Flush captured bytes on write -> read.
        let was_writing = self.write_mode;
        self.write_mode = self.bus.via2.cb2_output() == Some(false);
        if was_writing && !self.write_mode {
            self.flush_write_buffer();
        }
    }

    /// Cycles per byte from the density bits (VIA2 port B bits 5-6).
    fn cycles_per_byte(&self) -> u32 {
        match (self.bus.via2.port_b_output() >> 5) & 0x03 {
            0 => 256,
            1 => 240,
            2 => 224,
            _ => 208,
        }
    }

    /// Advance the disk under the head.
    fn rotate_disk(&mut self, cycles: u32) {
        if !self.motor_on || self.gcr_track.is_empty() {
            return;
        }
        self.byte_accumulator += cycles;
        let per_byte = self.cycles_per_byte();
        while self.byte_accumulator >= per_byte {
            self.byte_accumulator -= per_byte;
            self.next_byte();
        }
    }

    fn next_byte(&mut self) {
        if self.write_mode {
            let byte = self.bus.via2.port_a_output();
            if self.gcr_position < self.gcr_track.len() {
                self.gcr_track[self.gcr_position] = byte;
            }
            self.write_buffer.push(byte);
            self.byte_ready();
        } else {
            let byte = self.gcr_track[self.gcr_position];
            self.bus.via2.set_port_a_input(byte);

            // SYNC detect on bit 7, active-low.
            let in_sync = byte == 0xFF;
            self.bus
                .via2
                .set_port_b_input_bits(0x80, if in_sync { 0x00 } else { 0x80 });

            // Sync bytes do not produce byte-ready strobes.
            if !in_sync {
                self.byte_ready();
            }
        }

        self.gcr_position += 1;
        if self.gcr_position >= self.gcr_track.len() {
            self.gcr_position = 0;
        }
    }

    /// Byte-ready strobe: VIA2 CA1 edge plus the CPU SO pin when CA2
    /// (SO enable) is not held low.
    fn byte_ready(&mut self) {
        self.bus.via2.set_ca1(true);
        self.bus.via2.set_ca1(false);
        if self.bus.via2.ca2_output() != Some(false) {
            self.cpu.set_overflow();
        }
    }

    /// Step the head from a stepper phase change. Incrementing phase moves
    /// inward (higher tracks), decrementing outward.
    fn step_head(&mut self, new_phase: u8) {
        let delta = (i16::from(new_phase) - i16::from(self.prev_stepper_phase)).rem_euclid(4);
        self.prev_stepper_phase = new_phase;

        let old_track = self.track();
        match delta {
            1 => {
                if self.half_track < MAX_HALF_TRACK {
                    self.half_track += 1;
                }
            }
            3 => {
                if self.half_track > 0 {
                    self.half_track -= 1;
                }
            }
            _ => {} // 0 = no step, 2 = skipped phase
        }

        if self.track() != old_track {
            log::trace!("head stepped to track {}", self.track());
            self.encode_current_track();
        }
    }

    /// Build the GCR stream for the current head position. Odd half-track
    /// positions carry no sync marks, which is what the real head reads
    /// between tracks.
    fn encode_current_track(&mut self) {
        let on_half_track = self.half_track % 2 == 1;
        let track = self.track();

        if on_half_track || !(1..=35).contains(&track) {
            self.gcr_track = vec![0x00; 7692];
            self.gcr_position = 0;
            return;
        }

        if let Some(disk) = &self.disk {
            self.gcr_track = gcr::encode_track(disk, track);
            if self.gcr_position >= self.gcr_track.len() {
                self.gcr_position = 0;
            }
        } else {
            self.gcr_track.clear();
            self.gcr_position = 0;
        }
    }

    /// Decode the written GCR stream back into D64 sectors: walk the track
    /// for sync-framed header and data blocks and store every sector that
    /// decodes cleanly.
    fn flush_write_buffer(&mut self) {
        self.write_buffer.clear();
        let Some(disk) = &mut self.disk else {
            return;
        };
        let track = self.half_track / 2 + 1;

        let data = std::mem::take(&mut self.gcr_track);
        let mut pending_sector: Option<u8> = None;
        let mut i = 0;
        while i < data.len() {
            if data[i] != 0xFF {
                i += 1;
                continue;
            }
            // Skip the sync run, then try to decode what follows.
            while i < data.len() && data[i] == 0xFF {
                i += 1;
            }
            if i + 10 <= data.len() {
                if let Some((_, sector)) = gcr::decode_header(&data[i..i + 10]) {
                    pending_sector = Some(sector);
                    i += 10;
                    continue;
                }
            }
            if i + gcr::DATA_BLOCK_BYTES <= data.len() {
                if let Some(body) = gcr::decode_data_block(&data[i..i + gcr::DATA_BLOCK_BYTES]) {
                    if let Some(sector) = pending_sector.take() {
                        match disk.write_sector(track, sector, &body) {
                            Ok(()) => log::trace!("wrote track {track} sector {sector}"),
                            Err(err) => log::warn!("discarding written sector: {err}"),
                        }
                    }
                    i += gcr::DATA_BLOCK_BYTES;
                    continue;
                }
            }
        }
        self.gcr_track = data;

        // Freshly encode so the in-memory stream matches the image again.
        self.encode_current_track();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::DRIVE_ROM_SIZE;
    use format_d64::IMAGE_SIZE;

    fn make_rom() -> Vec<u8> {
        // NOP sled with the reset vector pointing at $C000.
        let mut rom = vec![0xEA; DRIVE_ROM_SIZE];
        rom[0x3FFC] = 0x00;
        rom[0x3FFD] = 0xC0;
        rom
    }

    fn make_drive() -> Drive1541 {
        Drive1541::new(make_rom())
    }

    fn blank_disk() -> D64 {
        D64::blank(b"TEST", [0x41, 0x42])
    }

    #[test]
    fn starts_on_directory_track() {
        let drive = make_drive();
        assert_eq!(drive.track(), 18);
        assert!(!drive.motor_on());
        assert!(!drive.has_disk());
        assert_eq!(drive.cpu().regs.pc, 0xC000);
    }

    #[test]
    fn insert_encodes_track() {
        let mut drive = make_drive();
        drive.insert_disk(blank_disk());
        assert!(drive.has_disk());
        assert_eq!(
            drive.gcr_track.len(),
            19 * gcr::SECTOR_BYTES,
            "track 18 has 19 sectors"
        );
        assert!(drive.eject_disk().is_some());
        assert!(!drive.has_disk());
    }

    #[test]
    fn runs_in_lockstep_with_debt_carry() {
        let mut drive = make_drive();
        let mut iec = IecBus::new();
        let before = drive.cpu().cycles_executed();
        // 100 one-cycle batches: the CPU can only retire whole
        // instructions, so debt carries between batches.
        for _ in 0..100 {
            drive.run(1, &mut iec);
        }
        let consumed = drive.cpu().cycles_executed() - before;
        assert!(consumed >= 94 && consumed <= 100, "consumed {consumed}");
    }

    #[test]
    fn atn_auto_acknowledge_pulls_data() {
        let mut drive = make_drive();
        let mut iec = IecBus::new();
        drive.run(2, &mut iec);
        assert!(iec.data(), "idle bus: DATA released");

        // C64 asserts ATN; ATNA is still 0, so the XOR pulls DATA low.
        iec.set_c64_outputs(0x08);
        drive.run(2, &mut iec);
        assert!(!iec.data(), "device-present acknowledge");

        // ATN released again: mismatch gone, DATA released.
        iec.set_c64_outputs(0x00);
        drive.run(2, &mut iec);
        assert!(iec.data());
    }

    #[test]
    fn motor_and_led_follow_via2() {
        let mut drive = make_drive();
        drive.bus.via2.write(0x02, 0x0C); // DDRB: motor + LED outputs
        drive.bus.via2.write(0x00, 0x04); // motor on
        drive.update_mechanics();
        assert!(drive.motor_on());
        assert!(!drive.led_on());
        drive.bus.via2.write(0x00, 0x08);
        drive.update_mechanics();
        assert!(!drive.motor_on());
        assert!(drive.led_on());
    }

    #[test]
    fn stepper_walks_half_tracks() {
        let mut drive = make_drive();
        drive.insert_disk(blank_disk());
        assert_eq!(drive.track(), 18);
        // Two inward steps = one whole track.
        drive.step_head(1);
        drive.step_head(2);
        assert_eq!(drive.track(), 19);
        assert_eq!(
            drive.gcr_track.len(),
            19 * gcr::SECTOR_BYTES,
            "track 19 still in the 19-sector zone"
        );
        // Two outward steps return.
        drive.step_head(1);
        drive.step_head(0);
        assert_eq!(drive.track(), 18);
    }

    #[test]
    fn zone_change_alters_track_length() {
        let mut drive = make_drive();
        drive.insert_disk(blank_disk());
        // Step outward from 18 to 17 (zone boundary).
        drive.step_head(3);
        drive.step_head(2);
        assert_eq!(drive.track(), 17);
        assert_eq!(drive.gcr_track.len(), 21 * gcr::SECTOR_BYTES);
    }

    #[test]
    fn rotation_presents_bytes_and_sync() {
        let mut drive = make_drive();
        drive.insert_disk(blank_disk());
        // Motor on via VIA2, density bits left at zone 0 (256 c/b).
        drive.bus.via2.write(0x02, 0x04);
        drive.bus.via2.write(0x00, 0x04);
        drive.update_mechanics();

        let mut iec = IecBus::new();
        // First track byte is sync ($FF): bit 7 of port B reads low.
        drive.run(256, &mut iec);
        let pb = drive.bus.via2.read(0x00);
        assert_eq!(pb & 0x80, 0, "sync detected, active low");
    }

    #[test]
    fn half_track_position_reads_no_sync() {
        let mut drive = make_drive();
        drive.insert_disk(blank_disk());
        drive.step_head(1); // odd half-track
        assert!(drive.gcr_track.iter().all(|&b| b == 0x00));
    }

    #[test]
    fn write_back_round_trip() {
        let mut drive = make_drive();
        drive.insert_disk(blank_disk());

        // Fabricate a written track: header + data for sector 3 with a
        // recognisable payload, as the head would have captured it.
        let mut body = [0u8; 256];
        body[0] = 0xDE;
        body[1] = 0xAD;
        let stream = gcr::encode_sector(18, 3, &body, [0x41, 0x42]);
        drive.gcr_track = stream;
        drive.write_buffer = vec![0x55];
        drive.flush_write_buffer();

        let disk = drive.disk().expect("disk");
        let sector = disk.sector(18, 3).expect("sector");
        assert_eq!(sector[0], 0xDE);
        assert_eq!(sector[1], 0xAD);
    }
}
