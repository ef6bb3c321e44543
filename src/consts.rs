/*
 * Copyright (c) 2023.
 *
 * This software is free software;
 *
 * You can redistribute it or modify it under terms of the MIT, Apache License or Zlib license
 */

//! Fixed tables of the codec
//!
//! All of these are dictated by the bitstream format: the DCT basis,
//! the coefficient scan order, the context maps for coefficient
//! coding, the quantization weights and the container preamble.

use crate::huffman::VlcElement;

/// Fixed 49-byte ISO-BMFF preamble for level-10 streams: signature box,
/// `ftyp`, a one-byte `jxll` level box and an open `jxlc` box header
#[rustfmt::skip]
pub(crate) const LEVEL10_HEADER: [u8; 49] = [
    0x00, 0x00, 0x00, 0x0c, b'J',  b'X',  b'L',  b' ',
    0x0d, 0x0a, 0x87, 0x0a, 0x00, 0x00, 0x00, 0x14,
    b'f',  b't',  b'y',  b'p',  b'j',  b'x',  b'l',  b' ',
    0x00, 0x00, 0x00, 0x00, b'j',  b'x',  b'l',  b' ',
    0x00, 0x00, 0x00, 0x09, b'j',  b'x',  b'l',  b'l', 0x0a,
    0x00, 0x00, 0x00, 0x00, b'j',  b'x',  b'l',  b'c',
];

/// Cosine basis for the row/column DCT passes,
/// `round(cos((k+1)(2n+1)*pi/16) * (2^16 - 1) * sqrt(1/2))`
#[rustfmt::skip]
pub(crate) const COSINE_LUT: [[i32; 8]; 7] = [
    [45450,  38531,  25745,   9040,  -9040, -25745, -38531, -45450],
    [42813,  17733, -17733, -42813, -42813, -17733,  17733,  42813],
    [38531,  -9040, -45450, -25745,  25745,  45450,   9040, -38531],
    [32767, -32767, -32767,  32767,  32767, -32767, -32767,  32767],
    [25745, -45450,   9040,  38531, -38531,  -9040,  45450, -25745],
    [17733, -42813,  42813, -17733, -17733,  42813, -42813,  17733],
    [9040,  -25745,  38531, -45450,  45450, -38531,  25745,  -9040],
];

/// Natural (zig-zag) coefficient scan order as (x, y) block offsets
#[rustfmt::skip]
pub(crate) const NATURAL_ORDER: [(u8, u8); 64] = [
    (0, 0), (1, 0), (0, 1), (0, 2), (1, 1), (2, 0), (3, 0), (2, 1),
    (1, 2), (0, 3), (0, 4), (1, 3), (2, 2), (3, 1), (4, 0), (5, 0),
    (4, 1), (3, 2), (2, 3), (1, 4), (0, 5), (0, 6), (1, 5), (2, 4),
    (3, 3), (4, 2), (5, 1), (6, 0), (7, 0), (6, 1), (5, 2), (4, 3),
    (3, 4), (2, 5), (1, 6), (0, 7), (1, 7), (2, 6), (3, 5), (4, 4),
    (5, 3), (6, 2), (7, 1), (7, 2), (6, 3), (5, 4), (4, 5), (3, 6),
    (2, 7), (3, 7), (4, 6), (5, 5), (6, 4), (7, 3), (7, 4), (6, 5),
    (5, 6), (4, 7), (5, 7), (6, 6), (7, 5), (7, 6), (6, 7), (7, 7),
];

/// Frequency band contribution to the per-coefficient context,
/// indexed by scan position
#[rustfmt::skip]
pub(crate) const COEFF_FREQ_CONTEXT: [usize; 64] = [
     0,  0,  1,  2,  3,  4,  5,  6,  7,  8,  9, 10, 11, 12, 13, 14,
    15, 15, 16, 16, 17, 17, 18, 18, 19, 19, 20, 20, 21, 21, 22, 22,
    23, 23, 23, 23, 24, 24, 24, 24, 25, 25, 25, 25, 26, 26, 26, 26,
    27, 27, 27, 27, 28, 28, 28, 28, 29, 29, 29, 29, 30, 30, 30, 30,
];

/// Remaining-non-zero-count contribution to the per-coefficient context
#[rustfmt::skip]
pub(crate) const COEFF_NUM_NONZERO_CONTEXT: [usize; 64] = [
      0,   0,  31,  62,  62,  93,  93,  93,  93, 123, 123, 123, 123, 152,
    152, 152, 152, 152, 152, 152, 152, 180, 180, 180, 180, 180, 180, 180,
    180, 180, 180, 180, 180, 206, 206, 206, 206, 206, 206, 206, 206, 206,
    206, 206, 206, 206, 206, 206, 206, 206, 206, 206, 206, 206, 206, 206,
    206, 206, 206, 206, 206, 206, 206, 206,
];

/// Default HF block context map, 13 entries per channel in Y, X, B order
#[rustfmt::skip]
pub(crate) const HF_BLOCK_CLUSTER_MAP: [usize; 39] = [
    0, 1, 2, 2,  3,  3,  4,  5,  6,  6,  6,  6,  6,
    7, 8, 9, 9, 10, 11, 12, 13, 14, 14, 14, 14, 14,
    7, 8, 9, 9, 10, 11, 12, 13, 14, 14, 14, 14, 14,
];

/// Per-position HF quantization weights, one row per XYB plane
#[rustfmt::skip]
pub(crate) const HF_QUANT_WEIGHTS: [[i32; 64]; 3] = [
    [
        1968, 1968, 1968, 1962, 1968, 1962, 1655, 1884, 1884, 1655, 1396, 1610, 1704, 1610, 1396, 1178,
        1367, 1493, 1493, 1367, 1178,  994, 1158, 1288, 1340, 1288, 1158,  994,  838,  980, 1103, 1178,
        1178, 1103,  980,  838,  828,  940, 1023, 1053, 1023,  940,  828,  799,  881,  928,  928,  881,
         799,  755,  809,  828,  809,  755,  662,  730,  730,  662,  491,  524,  491,  348,  348,  239,
    ],
    [
        279,  279,  279,  279,  279,  279,  244,  270,  270,  244,  214,  239,  250,  239,  214,  187,
        210,  225,  225,  210,  187,  164,  185,  201,  207,  201,  185,  164,  143,  162,  178,  187,
        187,  178,  162,  143,  142,  157,  168,  172,  168,  157,  142,  138,  149,  155,  155,  149,
        138,  132,  139,  142,  139,  132,  125,  129,  129,  125,  116,  118,  116,  107,  107,   98,
    ],
    [
        256,  146,  146,   84,  116,   84,   59,   78,   78,   59,   42,   56,   63,   56,   42,   42,
         42,   48,   48,   42,   42,   41,   42,   42,   42,   42,   42,   41,   29,   40,   42,   42,
         42,   42,   40,   29,   28,   37,   42,   42,   42,   37,   28,   26,   32,   36,   36,   32,
         26,   23,   27,   28,   27,   23,   19,   22,   22,   19,   14,   15,   14,   10,   10,    7,
    ],
];

/// Fixed HF multiplier, also announced in the LF group stream
pub(crate) const HF_MULT: i32 = 8;

/// Fixed prefix code over the per-bucket log counts of an
/// ANS distribution header, indexed by `1 + floor(log2(count))`
pub(crate) const ANS_DIST_PREFIX_LENGTHS: [VlcElement; 14] = [
    VlcElement { symbol: 17, length: 5 },
    VlcElement { symbol: 11, length: 4 },
    VlcElement { symbol: 15, length: 4 },
    VlcElement { symbol: 3, length: 4 },
    VlcElement { symbol: 9, length: 4 },
    VlcElement { symbol: 7, length: 4 },
    VlcElement { symbol: 4, length: 3 },
    VlcElement { symbol: 2, length: 3 },
    VlcElement { symbol: 5, length: 3 },
    VlcElement { symbol: 6, length: 3 },
    VlcElement { symbol: 0, length: 3 },
    VlcElement { symbol: 33, length: 6 },
    VlcElement { symbol: 1, length: 7 },
    VlcElement { symbol: 65, length: 7 },
];

/// Order in which meta-code lengths are emitted, as per the Brotli RFC
pub(crate) const PREFIX_ZIG_ZAG: [usize; 18] =
    [1, 2, 3, 4, 0, 5, 17, 6, 16, 7, 8, 9, 10, 11, 12, 13, 14, 15];

/// Fixed level-0 code for the meta-code lengths themselves,
/// indexed by meta-code length 0..=5
pub(crate) const PREFIX_LEVEL0_TABLE: [VlcElement; 6] = [
    VlcElement { symbol: 0, length: 2 },
    VlcElement { symbol: 7, length: 4 },
    VlcElement { symbol: 3, length: 3 },
    VlcElement { symbol: 2, length: 2 },
    VlcElement { symbol: 1, length: 2 },
    VlcElement { symbol: 15, length: 4 },
];
