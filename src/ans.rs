/*
 * Copyright (c) 2023.
 *
 * This software is free software;
 *
 * You can redistribute it or modify it under terms of the MIT, Apache License or Zlib license
 */

//! ANS histogram coding and the encoding state machine
//!
//! Frequencies are normalized to a 4096 sum, described in the
//! bitstream through one of three header shapes, and turned into a
//! Vose-style alias table. Encoding runs the state machine backwards
//! over the symbols, scheduling 16-bit flushes which the forward
//! output pass interleaves with the residue bits.

use alloc::vec;
use alloc::vec::Vec;

use crate::bit_writer::BitWriter;
use crate::consts::ANS_DIST_PREFIX_LENGTHS;
use crate::entropy::HybridSymbol;
use crate::errors::JxlEncodeError;
use crate::math::fllog2;

/// The ANS table size all frequency rows are normalized to
pub(crate) const ANS_TABLE_SIZE: u32 = 1 << 12;

/// The buckets of one token: the state region `[cutoff, bucket_size)`
/// of bucket `original[j]` maps to this token for every `j > 0`, plus
/// the region `[0, cutoff)` of the token's own bucket at `j == 0`
pub(crate) struct AliasEntry {
    pub cutoffs:   Vec<u32>,
    pub offsets:   Vec<u32>,
    pub originals: Vec<u32>,
}

/// u8 field coding used inside distribution headers: an all-zero flag,
/// then the floor-log2 in three bits and the low bits of the value
fn write_ans_u8(bw: &mut BitWriter, b: u32) {
    debug_assert!(b < 256);
    bw.put_bool(b != 0);
    if b == 0 {
        return;
    }
    let l = fllog2(b);
    bw.put_bits(3, u64::from(l));
    bw.put_bits(l, u64::from(b));
}

/// Normalize `frequencies` in place to sum exactly 4096 and write the
/// distribution header
///
/// Returns the bucket a "simple" single-symbol distribution collapsed
/// onto, which short-circuits alias construction.
pub(crate) fn write_ans_frequencies(
    bw: &mut BitWriter, frequencies: &mut [u32],
) -> Result<Option<usize>, JxlEncodeError> {
    let total: u64 = frequencies.iter().map(|&f| u64::from(f)).sum();
    let total = total.max(1);

    let mut new_total = 0u32;
    for freq in frequencies.iter_mut() {
        if *freq == 0 {
            continue;
        }
        *freq = ((u64::from(*freq) << 12) / total) as u32 & 0xFFFF;
        if *freq == 0 {
            // used symbols keep at least a sliver of probability
            *freq = 1;
        }
        new_total += *freq;
    }

    let mut j = frequencies.len() - 1;
    while new_total > ANS_TABLE_SIZE {
        let diff = new_total - ANS_TABLE_SIZE;
        if diff < frequencies[j] {
            frequencies[j] -= diff;
            new_total -= diff;
            break;
        }
        if frequencies[j] > 1 {
            new_total -= frequencies[j] - 1;
            frequencies[j] = 1;
        }
        if j == 0 {
            break;
        }
        j -= 1;
    }
    frequencies[0] += ANS_TABLE_SIZE - new_total;

    if frequencies[0] == ANS_TABLE_SIZE {
        // simple one-symbol distribution
        bw.put_bits(2, 0x1);
        write_ans_u8(bw, 0);
        return Ok(Some(0));
    }

    if frequencies.len() > 1 && frequencies[0] + frequencies[1] == ANS_TABLE_SIZE {
        // simple dual-peak distribution
        bw.put_bits(2, 0x3);
        write_ans_u8(bw, 0);
        write_ans_u8(bw, 1);
        bw.put_bits(12, u64::from(frequencies[0]));
        return Ok(None);
    }

    // flat-shape metadata: not simple, len = 3, shift = 13
    bw.put_bits(2, 0);
    bw.put_bits(3, 0x7);
    bw.put_bits(3, 0x6);
    write_ans_u8(bw, frequencies.len() as u32 - 3);

    let mut omit_pos = 0usize;
    let mut omit_log = 0u32;
    let mut log_counts = vec![0u32; frequencies.len()];
    for (k, &freq) in frequencies.iter().enumerate() {
        log_counts[k] = if freq != 0 { 1 + fllog2(freq) } else { 0 };
        let entry = ANS_DIST_PREFIX_LENGTHS[log_counts[k] as usize];
        bw.put_bits(entry.length, u64::from(entry.symbol));
        if log_counts[k] > omit_log {
            omit_log = log_counts[k];
            omit_pos = k;
        }
    }
    for (k, &freq) in frequencies.iter().enumerate() {
        if k == omit_pos || log_counts[k] <= 1 {
            continue;
        }
        bw.put_bits(log_counts[k] - 1, u64::from(freq));
    }
    Ok(None)
}

/// Build the alias table for one normalized frequency row
///
/// The `2^log_alphabet_size` buckets of size `2^(12 - log_alphabet_size)`
/// partition the 12-bit state so bucket mass matches each frequency.
pub(crate) fn build_alias_table(
    frequencies: &[u32], log_alphabet_size: u32, uniq_pos: Option<usize>,
) -> Result<Vec<AliasEntry>, JxlEncodeError> {
    let log_bucket_size = 12 - log_alphabet_size;
    let bucket_size = 1u32 << log_bucket_size;
    let table_size = 1usize << log_alphabet_size;
    let alphabet_size = frequencies.len();
    debug_assert!(alphabet_size <= table_size);

    let mut symbols = vec![0u32; table_size];
    let mut cutoffs = vec![0u32; table_size];
    let mut offsets = vec![0u32; table_size];

    if let Some(uniq) = uniq_pos {
        for i in 0..table_size {
            symbols[i] = uniq as u32;
            offsets[i] = i as u32 * bucket_size;
        }
    } else {
        let mut underfull: Vec<usize> = Vec::with_capacity(table_size);
        let mut overfull: Vec<usize> = Vec::with_capacity(table_size);
        for (pos, &freq) in frequencies.iter().enumerate() {
            cutoffs[pos] = freq;
            if freq < bucket_size {
                underfull.push(pos);
            } else if freq > bucket_size {
                overfull.push(pos);
            }
        }
        for i in alphabet_size..table_size {
            underfull.push(i);
        }

        while let Some(over) = overfull.pop() {
            let Some(under) = underfull.pop() else {
                return Err(JxlEncodeError::Internal("alias pairing ran out of buckets"));
            };
            let moved = bucket_size - cutoffs[under];
            cutoffs[over] -= moved;
            offsets[under] = cutoffs[over];
            symbols[under] = over as u32;
            if cutoffs[over] < bucket_size {
                underfull.push(over);
            } else if cutoffs[over] > bucket_size {
                overfull.push(over);
            }
        }

        for sym in 0..table_size {
            if cutoffs[sym] == bucket_size {
                symbols[sym] = sym as u32;
                cutoffs[sym] = 0;
                offsets[sym] = 0;
            } else {
                offsets[sym] -= cutoffs[sym];
            }
        }
    }

    let mut table: Vec<AliasEntry> = (0..alphabet_size)
        .map(|sym| AliasEntry {
            cutoffs:   vec![cutoffs[sym]],
            offsets:   vec![0],
            originals: vec![sym as u32],
        })
        .collect();

    for i in 0..table_size {
        let entry = &mut table[symbols[i] as usize];
        entry.cutoffs.push(cutoffs[i]);
        entry.offsets.push(offsets[i]);
        entry.originals.push(i as u32);
    }
    Ok(table)
}

/// Encode the symbols of a finalized stream
///
/// The state machine runs backwards scheduling 16-bit flushes, the
/// forward pass drains every flush due at or before a symbol's index
/// and then writes that symbol's residue bits.
pub(crate) fn write_ans_symbols(
    symbols: &[HybridSymbol], frequencies: &[u32], alias_tables: &[Vec<AliasEntry>],
    max_alphabet_size: usize, log_alphabet_size: u32, bw: &mut BitWriter,
) -> Result<(), JxlEncodeError> {
    let log_bucket_size = 12 - log_alphabet_size;
    let pos_mask = (1u32 << log_bucket_size) - 1;

    let mut flushes: Vec<(usize, u16)> = Vec::new();
    let mut state: u32 = 0x0013_0000;

    for p in (0..symbols.len()).rev() {
        let symbol = &symbols[p];
        let cluster = symbol.cluster as usize;
        let token = symbol.token as usize;
        let freq = frequencies[cluster * max_alphabet_size + token];
        if (state >> 20) >= freq {
            flushes.push((p, state as u16));
            state >>= 16;
        }

        let offset = state % freq;
        let entry = &alias_tables[cluster][token];
        let mut found = None;
        for j in 0..entry.cutoffs.len() {
            let pos = offset.wrapping_sub(entry.offsets[j]);
            if pos > pos_mask {
                continue;
            }
            let inside = if j > 0 { pos >= entry.cutoffs[j] } else { pos < entry.cutoffs[j] };
            if inside {
                found = Some((entry.originals[j], pos));
                break;
            }
        }
        let Some((bucket, pos)) = found else {
            return Err(JxlEncodeError::Internal("alias lookup exhausted"));
        };
        state = ((state / freq) << 12) | (bucket << log_bucket_size) | pos;
    }
    flushes.push((0, (state >> 16) as u16));
    flushes.push((0, state as u16));

    for (p, symbol) in symbols.iter().enumerate() {
        while let Some(&(index, value)) = flushes.last() {
            if p >= index {
                bw.put_bits(16, u64::from(value));
                flushes.pop();
            } else {
                break;
            }
        }
        bw.put_bits(symbol.residue_bits, u64::from(symbol.residue));
    }
    bw.status()
}
