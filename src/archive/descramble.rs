//! Legacy payload scrambling
//!
//! Scrambled entries were transformed in 8-byte blocks after compression.
//! Two block transforms exist:
//! - a single-round, zero-key DES-style transform (initial permutation, one
//!   Feistel round, final permutation), which is its own inverse
//! - a byte shuffle with a substitution on the last byte
//!
//! Header-scrambled entries (flag 5) only have their first 20 blocks
//! transformed. Fully scrambled entries (flag 3) additionally transform every
//! `gap`-th block after that and shuffle every 7th of the remaining blocks,
//! starting with the 8th, where `gap` follows from the entry's cycle. Bytes past the last whole
//! block are never touched.

use crate::archive::entry::EntryFlags;

/// Transform block size in bytes
pub const BLOCK_SIZE: usize = 8;

/// Number of leading blocks that are always DES-transformed
pub const HEADER_BLOCKS: usize = 20;

/// Shuffled blocks are this far apart among the non-DES blocks; the first
/// one follows seven untouched blocks
const SHUFFLE_PERIOD: u32 = 7;

const BIT_MASK: [u8; 8] = [0x80, 0x40, 0x20, 0x10, 0x08, 0x04, 0x02, 0x01];

const INITIAL_PERMUTATION: [u8; 64] = [
    58, 50, 42, 34, 26, 18, 10, 2, //
    60, 52, 44, 36, 28, 20, 12, 4, //
    62, 54, 46, 38, 30, 22, 14, 6, //
    64, 56, 48, 40, 32, 24, 16, 8, //
    57, 49, 41, 33, 25, 17, 9, 1, //
    59, 51, 43, 35, 27, 19, 11, 3, //
    61, 53, 45, 37, 29, 21, 13, 5, //
    63, 55, 47, 39, 31, 23, 15, 7,
];

const FINAL_PERMUTATION: [u8; 64] = [
    40, 8, 48, 16, 56, 24, 64, 32, //
    39, 7, 47, 15, 55, 23, 63, 31, //
    38, 6, 46, 14, 54, 22, 62, 30, //
    37, 5, 45, 13, 53, 21, 61, 29, //
    36, 4, 44, 12, 52, 20, 60, 28, //
    35, 3, 43, 11, 51, 19, 59, 27, //
    34, 2, 42, 10, 50, 18, 58, 26, //
    33, 1, 41, 9, 49, 17, 57, 25,
];

const P_BOX: [u8; 32] = [
    16, 7, 20, 21, 29, 12, 28, 17, //
    1, 15, 23, 26, 5, 18, 31, 10, //
    2, 8, 24, 14, 32, 27, 3, 9, //
    19, 13, 30, 6, 22, 11, 4, 25,
];

/// The eight DES S-boxes, each 4 rows of 16 columns
const S_BOXES: [[u8; 64]; 8] = [
    [
        14, 4, 13, 1, 2, 15, 11, 8, 3, 10, 6, 12, 5, 9, 0, 7, //
        0, 15, 7, 4, 14, 2, 13, 1, 10, 6, 12, 11, 9, 5, 3, 8, //
        4, 1, 14, 8, 13, 6, 2, 11, 15, 12, 9, 7, 3, 10, 5, 0, //
        15, 12, 8, 2, 4, 9, 1, 7, 5, 11, 3, 14, 10, 0, 6, 13,
    ],
    [
        15, 1, 8, 14, 6, 11, 3, 4, 9, 7, 2, 13, 12, 0, 5, 10, //
        3, 13, 4, 7, 15, 2, 8, 14, 12, 0, 1, 10, 6, 9, 11, 5, //
        0, 14, 7, 11, 10, 4, 13, 1, 5, 8, 12, 6, 9, 3, 2, 15, //
        13, 8, 10, 1, 3, 15, 4, 2, 11, 6, 7, 12, 0, 5, 14, 9,
    ],
    [
        10, 0, 9, 14, 6, 3, 15, 5, 1, 13, 12, 7, 11, 4, 2, 8, //
        13, 7, 0, 9, 3, 4, 6, 10, 2, 8, 5, 14, 12, 11, 15, 1, //
        13, 6, 4, 9, 8, 15, 3, 0, 11, 1, 2, 12, 5, 10, 14, 7, //
        1, 10, 13, 0, 6, 9, 8, 7, 4, 15, 14, 3, 11, 5, 2, 12,
    ],
    [
        7, 13, 14, 3, 0, 6, 9, 10, 1, 2, 8, 5, 11, 12, 4, 15, //
        13, 8, 11, 5, 6, 15, 0, 3, 4, 7, 2, 12, 1, 10, 14, 9, //
        10, 6, 9, 0, 12, 11, 7, 13, 15, 1, 3, 14, 5, 2, 8, 4, //
        3, 15, 0, 6, 10, 1, 13, 8, 9, 4, 5, 11, 12, 7, 2, 14,
    ],
    [
        2, 12, 4, 1, 7, 10, 11, 6, 8, 5, 3, 15, 13, 0, 14, 9, //
        14, 11, 2, 12, 4, 7, 13, 1, 5, 0, 15, 10, 3, 9, 8, 6, //
        4, 2, 1, 11, 10, 13, 7, 8, 15, 9, 12, 5, 6, 3, 0, 14, //
        11, 8, 12, 7, 1, 14, 2, 13, 6, 15, 0, 9, 10, 4, 5, 3,
    ],
    [
        12, 1, 10, 15, 9, 2, 6, 8, 0, 13, 3, 4, 14, 7, 5, 11, //
        10, 15, 4, 2, 7, 12, 9, 5, 6, 1, 13, 14, 0, 11, 3, 8, //
        9, 14, 15, 5, 2, 8, 12, 3, 7, 0, 4, 10, 1, 13, 11, 6, //
        4, 3, 2, 12, 9, 5, 15, 10, 11, 14, 1, 7, 6, 0, 8, 13,
    ],
    [
        4, 11, 2, 14, 15, 0, 8, 13, 3, 12, 9, 7, 5, 10, 6, 1, //
        13, 0, 11, 7, 4, 9, 1, 10, 14, 3, 5, 12, 2, 15, 8, 6, //
        1, 4, 11, 13, 12, 3, 7, 14, 10, 15, 6, 8, 0, 5, 9, 2, //
        6, 11, 13, 8, 1, 4, 10, 7, 9, 5, 0, 15, 14, 2, 3, 12,
    ],
    [
        13, 2, 8, 4, 6, 15, 11, 1, 10, 9, 3, 14, 5, 0, 12, 7, //
        1, 15, 13, 8, 10, 3, 7, 4, 12, 5, 6, 11, 0, 14, 9, 2, //
        7, 11, 4, 1, 9, 12, 14, 2, 0, 6, 10, 13, 15, 3, 5, 8, //
        2, 1, 14, 7, 4, 10, 8, 13, 15, 12, 9, 0, 3, 5, 6, 11,
    ],
];

/// Round count for a fully scrambled entry: the largest `k` with
/// `compressed_length >= 10^k`.
pub fn cycle_for_length(compressed_length: u32) -> u32 {
    let mut cycle = 0;
    let mut threshold: u64 = 10;
    while u64::from(compressed_length) >= threshold {
        cycle += 1;
        threshold *= 10;
    }
    cycle
}

/// Distance between DES-transformed blocks past the header region
pub fn block_gap(cycle: u32) -> usize {
    let digits = cycle as usize + 1;
    match digits {
        0..=2 => 1,
        3..=4 => digits + 1,
        5..=6 => digits + 9,
        _ => digits + 15,
    }
}

/// Reverse the scrambling selected by `flags`, in place
///
/// Unscrambled flags leave the buffer as it is.
pub fn descramble(data: &mut [u8], flags: EntryFlags, cycle: u32) {
    match flags {
        EntryFlags::Scrambled => descramble_mixed(data, cycle),
        EntryFlags::HeaderScrambled => descramble_header(data),
        EntryFlags::Placeholder | EntryFlags::Compressed => {}
    }
}

/// Reverse header-only scrambling (flag 5)
pub fn descramble_header(data: &mut [u8]) {
    for block in data.chunks_exact_mut(BLOCK_SIZE).take(HEADER_BLOCKS) {
        des_block(block);
    }
}

/// Reverse full scrambling (flag 3)
pub fn descramble_mixed(data: &mut [u8], cycle: u32) {
    let gap = block_gap(cycle);
    let mut since_shuffle = 0;

    for (index, block) in data.chunks_exact_mut(BLOCK_SIZE).enumerate() {
        if index < HEADER_BLOCKS || index % gap == 0 {
            des_block(block);
            continue;
        }

        if since_shuffle == SHUFFLE_PERIOD {
            unshuffle_block(block);
            since_shuffle = 0;
        }
        since_shuffle += 1;
    }
}

/// Apply the single-round DES transform to one 8-byte block
fn des_block(block: &mut [u8]) {
    let mut state = [0u8; BLOCK_SIZE];
    state.copy_from_slice(&block[..BLOCK_SIZE]);

    let mut state = permute(&state, &INITIAL_PERMUTATION);
    feistel_round(&mut state);
    let state = permute(&state, &FINAL_PERMUTATION);

    block[..BLOCK_SIZE].copy_from_slice(&state);
}

fn permute(src: &[u8; BLOCK_SIZE], table: &[u8; 64]) -> [u8; BLOCK_SIZE] {
    let mut out = [0u8; BLOCK_SIZE];
    for (i, &position) in table.iter().enumerate() {
        let j = (position - 1) as usize;
        if src[j >> 3] & BIT_MASK[j & 7] != 0 {
            out[i >> 3] |= BIT_MASK[i & 7];
        }
    }
    out
}

/// XOR the left half with P(S(E(right half))) under an all-zero subkey
fn feistel_round(state: &mut [u8; BLOCK_SIZE]) {
    let r = [state[4], state[5], state[6], state[7]];

    // Expansion: 32 bits into eight 6-bit groups
    let expanded = [
        ((r[3] << 5) | (r[0] >> 3)) & 0x3f,
        ((r[0] << 1) | (r[1] >> 7)) & 0x3f,
        ((r[0] << 5) | (r[1] >> 3)) & 0x3f,
        ((r[1] << 1) | (r[2] >> 7)) & 0x3f,
        ((r[1] << 5) | (r[2] >> 3)) & 0x3f,
        ((r[2] << 1) | (r[3] >> 7)) & 0x3f,
        ((r[2] << 5) | (r[3] >> 3)) & 0x3f,
        ((r[3] << 1) | (r[0] >> 7)) & 0x3f,
    ];

    let mut substituted = [0u8; 4];
    for (i, &group) in expanded.iter().enumerate() {
        let row = ((group >> 4) & 0b10) | (group & 0b01);
        let column = (group >> 1) & 0x0f;
        let nibble = S_BOXES[i][(row * 16 + column) as usize];
        substituted[i / 2] |= if i % 2 == 0 { nibble << 4 } else { nibble };
    }

    let mut permuted = [0u8; 4];
    for (i, &position) in P_BOX.iter().enumerate() {
        let j = (position - 1) as usize;
        if substituted[j >> 3] & BIT_MASK[j & 7] != 0 {
            permuted[i >> 3] |= BIT_MASK[i & 7];
        }
    }

    for (left, mask) in state[..4].iter_mut().zip(permuted) {
        *left ^= mask;
    }
}

fn unshuffle_block(block: &mut [u8]) {
    let src = [
        block[0], block[1], block[2], block[3], block[4], block[5], block[6], block[7],
    ];
    block[0] = src[3];
    block[1] = src[4];
    block[2] = src[6];
    block[3] = src[0];
    block[4] = src[1];
    block[5] = src[2];
    block[6] = src[5];
    block[7] = substitute(src[7]);
}

/// Last-byte substitution; every pair is swapped, so it is an involution
fn substitute(byte: u8) -> u8 {
    match byte {
        0x00 => 0x2b,
        0x2b => 0x00,
        0x01 => 0x68,
        0x68 => 0x01,
        0x48 => 0x77,
        0x77 => 0x48,
        0x60 => 0xff,
        0xff => 0x60,
        0x6c => 0x80,
        0x80 => 0x6c,
        0xb9 => 0xc0,
        0xc0 => 0xb9,
        0xeb => 0xfe,
        0xfe => 0xeb,
        other => other,
    }
}

/// Apply full scrambling; the exact inverse of [`descramble_mixed`].
///
/// Only used to build scrambled fixtures; saving never scrambles.
#[cfg(test)]
pub(crate) fn scramble_mixed(data: &mut [u8], cycle: u32) {
    let gap = block_gap(cycle);
    let mut since_shuffle = 0;

    for (index, block) in data.chunks_exact_mut(BLOCK_SIZE).enumerate() {
        if index < HEADER_BLOCKS || index % gap == 0 {
            des_block(block);
            continue;
        }

        if since_shuffle == SHUFFLE_PERIOD {
            let src = [
                block[0], block[1], block[2], block[3], block[4], block[5], block[6], block[7],
            ];
            block[3] = src[0];
            block[4] = src[1];
            block[6] = src[2];
            block[0] = src[3];
            block[1] = src[4];
            block[2] = src[5];
            block[5] = src[6];
            block[7] = substitute(src[7]);
            since_shuffle = 0;
        }
        since_shuffle += 1;
    }
}
