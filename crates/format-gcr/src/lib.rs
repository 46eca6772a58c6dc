//! GCR (Group Code Recording) encoding for 1541 disk surfaces.
//!
//! Every 4 data bits map to a 5-bit code with at most two consecutive
//! zeros, so the drive can recover its clock from the flux stream. A D64
//! track becomes a continuous byte loop of framed sectors:
//!
//! - Sync: 5 × $FF
//! - Header block: 10 GCR bytes (8 raw: $08, checksum, sector, track, id2, id1, $0F, $0F)
//! - Gap: 9 × $55
//! - Sync: 5 × $FF
//! - Data block: 325 GCR bytes (260 raw: $07, 256 data, checksum, $00, $00)
//! - Gap: 9 × $55
//!
//! Speed zones follow the drive's own density numbering (VIA2 port B
//! bits 5-6): zone 0 is the innermost, slowest band.
//!
//! | Zone | Tracks | Cycles/byte (~1 MHz) |
//! |------|--------|----------------------|
//! | 0    | 31-35  | 256                  |
//! | 1    | 25-30  | 240                  |
//! | 2    | 18-24  | 224                  |
//! | 3    | 1-17   | 208                  |

use format_d64::D64;

/// Bytes in an encoded sector (5+10+9+5+325+9).
pub const SECTOR_BYTES: usize = 363;
/// GCR bytes in an encoded data block.
pub const DATA_BLOCK_BYTES: usize = 325;
/// Bytes of sync mark in front of each block.
pub const SYNC_BYTES: usize = 5;

/// 4-bit nibble to 5-bit GCR code.
const GCR_ENCODE: [u8; 16] = [
    0x0A, 0x0B, 0x12, 0x13, 0x0E, 0x0F, 0x16, 0x17, //
    0x09, 0x19, 0x1A, 0x1B, 0x0D, 0x1D, 0x1E, 0x15,
];

/// 5-bit code back to a nibble; $FF marks invalid codes.
const GCR_DECODE: [u8; 32] = [
    0xFF, 0xFF, 0xFF, 0xFF, 0xFF, 0xFF, 0xFF, 0xFF, //
    0xFF, 0x08, 0x00, 0x01, 0xFF, 0x0C, 0x04, 0x05, //
    0xFF, 0xFF, 0x02, 0x03, 0xFF, 0x0F, 0x06, 0x07, //
    0xFF, 0x09, 0x0A, 0x0B, 0xFF, 0x0D, 0x0E, 0xFF,
];

/// Speed zone (0-3) for a track, in the drive's density numbering.
#[must_use]
pub fn speed_zone(track: u8) -> u8 {
    match track {
        31..=35 => 0,
        25..=30 => 1,
        18..=24 => 2,
        _ => 3,
    }
}

/// Drive CPU cycles per GCR byte at the zone's bit rate.
#[must_use]
pub fn cycles_per_byte(track: u8) -> u32 {
    match speed_zone(track) {
        0 => 256,
        1 => 240,
        2 => 224,
        _ => 208,
    }
}

/// Encode 4 raw bytes into 5 GCR bytes.
#[must_use]
pub fn encode_group(input: &[u8; 4]) -> [u8; 5] {
    let n: [u8; 8] = [
        GCR_ENCODE[(input[0] >> 4) as usize],
        GCR_ENCODE[(input[0] & 0x0F) as usize],
        GCR_ENCODE[(input[1] >> 4) as usize],
        GCR_ENCODE[(input[1] & 0x0F) as usize],
        GCR_ENCODE[(input[2] >> 4) as usize],
        GCR_ENCODE[(input[2] & 0x0F) as usize],
        GCR_ENCODE[(input[3] >> 4) as usize],
        GCR_ENCODE[(input[3] & 0x0F) as usize],
    ];

    // Pack 8 five-bit codes into 40 bits.
    [
        (n[0] << 3) | (n[1] >> 2),
        (n[1] << 6) | (n[2] << 1) | (n[3] >> 4),
        (n[3] << 4) | (n[4] >> 1),
        (n[4] << 7) | (n[5] << 2) | (n[6] >> 3),
        (n[6] << 5) | n[7],
    ]
}

/// Decode 5 GCR bytes into 4 raw bytes; `None` on an invalid code.
#[must_use]
pub fn decode_group(input: &[u8; 5]) -> Option<[u8; 4]> {
    let codes = [
        (input[0] >> 3) & 0x1F,
        ((input[0] << 2) | (input[1] >> 6)) & 0x1F,
        (input[1] >> 1) & 0x1F,
        ((input[1] << 4) | (input[2] >> 4)) & 0x1F,
        ((input[2] << 1) | (input[3] >> 7)) & 0x1F,
        (input[3] >> 2) & 0x1F,
        ((input[3] << 3) | (input[4] >> 5)) & 0x1F,
        input[4] & 0x1F,
    ];

    let mut nibbles = [0u8; 8];
    for (nibble, code) in nibbles.iter_mut().zip(codes) {
        let decoded = GCR_DECODE[code as usize];
        if decoded == 0xFF {
            return None;
        }
        *nibble = decoded;
    }

    Some([
        (nibbles[0] << 4) | nibbles[1],
        (nibbles[2] << 4) | nibbles[3],
        (nibbles[4] << 4) | nibbles[5],
        (nibbles[6] << 4) | nibbles[7],
    ])
}

/// Encode a sector header: $08, checksum, sector, track, id2, id1, $0F, $0F.
#[must_use]
pub fn encode_header(track: u8, sector: u8, disk_id: [u8; 2]) -> [u8; 10] {
    let checksum = sector ^ track ^ disk_id[0] ^ disk_id[1];
    let raw = [
        0x08, checksum, sector, track, disk_id[1], disk_id[0], 0x0F, 0x0F,
    ];
    let g0 = encode_group(&[raw[0], raw[1], raw[2], raw[3]]);
    let g1 = encode_group(&[raw[4], raw[5], raw[6], raw[7]]);
    let mut out = [0u8; 10];
    out[..5].copy_from_slice(&g0);
    out[5..].copy_from_slice(&g1);
    out
}

/// Decode a 10-byte GCR header into (track, sector) after validating the
/// marker and checksum.
#[must_use]
pub fn decode_header(gcr: &[u8]) -> Option<(u8, u8)> {
    if gcr.len() < 10 {
        return None;
    }
    let g0 = decode_group(&[gcr[0], gcr[1], gcr[2], gcr[3], gcr[4]])?;
    let g1 = decode_group(&[gcr[5], gcr[6], gcr[7], gcr[8], gcr[9]])?;
    if g0[0] != 0x08 {
        return None;
    }
    let (checksum, sector, track) = (g0[1], g0[2], g0[3]);
    let (id2, id1) = (g1[0], g1[1]);
    if checksum != sector ^ track ^ id1 ^ id2 {
        return None;
    }
    Some((track, sector))
}

/// Encode a 256-byte sector body into a 325-byte GCR data block.
#[must_use]
pub fn encode_data_block(data: &[u8]) -> Vec<u8> {
    assert!(data.len() == 256, "sector body must be 256 bytes");

    let mut checksum = 0u8;
    for &b in data {
        checksum ^= b;
    }

    let mut raw = Vec::with_capacity(260);
    raw.push(0x07);
    raw.extend_from_slice(data);
    raw.push(checksum);
    raw.push(0x00);
    raw.push(0x00);

    let mut gcr = Vec::with_capacity(DATA_BLOCK_BYTES);
    for chunk in raw.chunks_exact(4) {
        gcr.extend_from_slice(&encode_group(&[chunk[0], chunk[1], chunk[2], chunk[3]]));
    }
    gcr
}

/// Decode a 325-byte GCR data block back into 256 data bytes. Validates
/// the $07 marker and the XOR checksum.
#[must_use]
pub fn decode_data_block(gcr: &[u8]) -> Option<Vec<u8>> {
    if gcr.len() < DATA_BLOCK_BYTES {
        return None;
    }

    let mut raw = Vec::with_capacity(260);
    for chunk in gcr[..DATA_BLOCK_BYTES].chunks_exact(5) {
        let group = decode_group(&[chunk[0], chunk[1], chunk[2], chunk[3], chunk[4]])?;
        raw.extend_from_slice(&group);
    }

    if raw[0] != 0x07 {
        return None;
    }
    let data = &raw[1..257];
    let expected = raw[257];
    let mut checksum = 0u8;
    for &b in data {
        checksum ^= b;
    }
    if checksum != expected {
        return None;
    }
    Some(data.to_vec())
}

/// Encode one complete framed sector.
#[must_use]
pub fn encode_sector(track: u8, sector: u8, data: &[u8], disk_id: [u8; 2]) -> Vec<u8> {
    let mut out = Vec::with_capacity(SECTOR_BYTES);
    out.extend_from_slice(&[0xFF; SYNC_BYTES]);
    out.extend_from_slice(&encode_header(track, sector, disk_id));
    out.extend_from_slice(&[0x55; 9]);
    out.extend_from_slice(&[0xFF; SYNC_BYTES]);
    out.extend_from_slice(&encode_data_block(data));
    out.extend_from_slice(&[0x55; 9]);
    out
}

/// Encode an entire track from a D64 image as the byte loop the read head
/// sees.
#[must_use]
pub fn encode_track(d64: &D64, track: u8) -> Vec<u8> {
    let sectors = D64::sectors_per_track(track);
    let disk_id = d64.disk_id();
    let mut out = Vec::with_capacity(sectors as usize * SECTOR_BYTES);
    for sector in 0..sectors {
        let data = d64.sector(track, sector).expect("sector within geometry");
        out.extend_from_slice(&encode_sector(track, sector, data, disk_id));
    }
    out
}
