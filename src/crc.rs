//! Running CRC-32 used to verify binary images
//!
//! The firmware tooling embeds CRC values in the image containers it emits.
//! The polynomial is 0x04C11DB7, processed MSB-first a nibble at a time, with
//! the intermediate remainder threaded through the caller so a buffer that
//! arrives in chunks produces the same value as one processed whole.
//! Finalization shifts four zero bytes through the remainder; it is a separate
//! step so that it can be deferred until the last chunk has been seen.

const LUT_CRC32: [u32; 16] = [
    0x00000000,
    0x04c11db7,
    0x09823b6e,
    0x0d4326d9,
    0x130476dc,
    0x17c56b6b,
    0x1a864db2,
    0x1e475005,
    0x2608edb8,
    0x22c9f00f,
    0x2f8ad6d6,
    0x2b4bcb61,
    0x350c9b64,
    0x31cd86d3,
    0x3c8ea00a,
    0x384fbdbd,
];

/// Feeds one chunk of data into a running CRC-32 computation
///
/// `seed` is the value returned by the previous call, or 0 for the first
/// chunk. Pass `finalize = true` together with the last chunk; a call with an
/// empty buffer and `finalize = true` performs finalization only.
pub fn crc32_chunk(buf: &[u8], seed: u32, finalize: bool) -> u32 {
    let mut a = seed;

    for &byte in buf {
        let c = LUT_CRC32[(a >> 28) as usize & 0xf];
        a = (a << 4) | (byte >> 4) as u32;
        a ^= c;
        let c = LUT_CRC32[(a >> 28) as usize & 0xf];
        a = (a << 4) | (byte & 0xf) as u32;
        a ^= c;
    }

    if finalize {
        for _ in 0..4 {
            let c = LUT_CRC32[(a >> 28) as usize & 0xf];
            a <<= 4;
            a ^= c;
            let c = LUT_CRC32[(a >> 28) as usize & 0xf];
            a <<= 4;
            a ^= c;
        }
    }

    a
}
