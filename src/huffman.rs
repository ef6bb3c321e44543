/*
 * Copyright (c) 2023.
 *
 * This software is free software;
 *
 * You can redistribute it or modify it under terms of the MIT, Apache License or Zlib license
 */

//! Depth-bounded Huffman construction and canonical code assignment
//!
//! Trees are built in a flat arena of `2 * alphabet - 1` entries, child
//! links are arena indices. The per-step depth target
//! `max_depth - ceil_log2(nz - 1)` keeps every finished code within the
//! requested bound, 15 for data codes and 5 for the meta code over
//! code lengths.

use alloc::vec;
use alloc::vec::Vec;
use core::cmp::Ordering;

use crate::errors::JxlEncodeError;
use crate::math::{bitswap32, cllog2};

/// One prefix code: the bit pattern to emit LSB-first and its length
#[derive(Copy, Clone, Debug, Default)]
pub(crate) struct VlcElement {
    pub symbol: u32,
    pub length: u32,
}

#[derive(Clone, Default)]
struct FrequencyEntry {
    token:     i32,
    frequency: u32,
    depth:     i32,
    max_depth: i32,
    left:      Option<usize>,
    right:     Option<usize>,
}

/// Smaller entries merge first; zero frequencies always lose,
/// ties break towards the smaller token id with internal nodes last
fn entry_less(a: &FrequencyEntry, b: &FrequencyEntry) -> bool {
    if a.frequency != b.frequency {
        if b.frequency == 0 {
            return true;
        }
        if a.frequency == 0 {
            return false;
        }
        a.frequency < b.frequency
    } else {
        if b.token == 0 {
            return true;
        }
        if a.token == 0 {
            return false;
        }
        a.token < b.token
    }
}

/// Bump the depth of every node in the subtree by one and
/// recompute the subtree's maximum depth
fn collect(tree: &mut [FrequencyEntry], entry: usize) -> i32 {
    tree[entry].depth += 1;
    let mut deepest = tree[entry].depth;
    if let Some(left) = tree[entry].left {
        deepest = deepest.max(collect(tree, left));
    }
    if let Some(right) = tree[entry].right {
        deepest = deepest.max(collect(tree, right));
    }
    tree[entry].max_depth = deepest;
    deepest
}

/// Compute code lengths for `frequencies`, none exceeding `max_depth`
///
/// Unused symbols get length 0. The caller is expected to special-case
/// alphabets with fewer than two used symbols.
pub(crate) fn build_huffman_lengths(
    frequencies: &[u32], max_depth: i32, lengths: &mut [u32],
) -> Result<(), JxlEncodeError> {
    let alphabet_size = frequencies.len();
    debug_assert!(alphabet_size >= 1);
    debug_assert!(lengths.len() >= alphabet_size);

    let mut tree: Vec<FrequencyEntry> = vec![FrequencyEntry::default(); 2 * alphabet_size - 1];

    for (token, freq) in frequencies.iter().enumerate() {
        tree[token].frequency = *freq;
        tree[token].token = 1 + token as i32;
    }

    for k in 0..alphabet_size.saturating_sub(1) {
        let live = 2 * k..alphabet_size + k;

        let mut nz = 0_u32;
        for j in live.clone() {
            nz += u32::from(tree[j].frequency != 0);
        }
        let target = max_depth - if nz > 1 { cllog2(nz - 1) as i32 } else { 0 };

        let mut smallest: Option<usize> = None;
        let mut second: Option<usize> = None;
        for j in live {
            if tree[j].max_depth >= target {
                continue;
            }
            if smallest.map_or(true, |s| entry_less(&tree[j], &tree[s])) {
                second = smallest;
                smallest = Some(j);
            } else if second.map_or(true, |s| entry_less(&tree[j], &tree[s])) {
                second = Some(j);
            }
        }
        let (Some(first), Some(second)) = (smallest, second) else {
            return Err(JxlEncodeError::Internal("huffman merge ran out of candidates"));
        };
        if tree[second].frequency == 0 {
            break;
        }

        tree.swap(first, 2 * k);
        let second = if second == 2 * k { first } else { second };
        tree.swap(second, 2 * k + 1);

        let parent = alphabet_size + k;
        tree[parent].frequency = tree[2 * k].frequency + tree[2 * k + 1].frequency;
        tree[parent].left = Some(2 * k);
        tree[parent].right = Some(2 * k + 1);
        collect(&mut tree, parent);
    }

    for entry in &tree {
        if entry.token != 0 {
            lengths[(entry.token - 1) as usize] = entry.depth as u32;
        }
    }
    Ok(())
}

/// Sort for canonical assignment: by length then symbol,
/// unused symbols last
pub(crate) fn vlc_order(a: &VlcElement, b: &VlcElement) -> Ordering {
    if a.length == b.length {
        a.symbol.cmp(&b.symbol)
    } else if b.length == 0 {
        Ordering::Less
    } else if a.length == 0 {
        Ordering::Greater
    } else {
        a.length.cmp(&b.length)
    }
}

/// Assign canonical codes for `lengths`, writing the LSB-first bit
/// patterns into `table`
///
/// Each code reserves `2^(32 - length)` of a 32-bit code space; the
/// space must come out empty or exactly full.
pub(crate) fn build_prefix_table(
    lengths: &[u32], table: &mut [VlcElement],
) -> Result<(), JxlEncodeError> {
    let alphabet_size = lengths.len();
    let mut pre_table: Vec<VlcElement> = (0..alphabet_size)
        .map(|j| VlcElement { symbol: j as u32, length: lengths[j] })
        .collect();
    pre_table.sort_by(vlc_order);

    let mut code = 0u64;
    for entry in &pre_table {
        if entry.length == 0 {
            continue;
        }
        let s = entry.symbol as usize;
        table[s].symbol = bitswap32(code as u32);
        table[s].length = entry.length;
        code += 1u64 << (32 - entry.length);
    }

    if code != 0 && code != 1u64 << 32 {
        return Err(JxlEncodeError::Internal("code lengths do not form a prefix code"));
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use alloc::vec;

    use rand::rngs::StdRng;
    use rand::{Rng, SeedableRng};

    use super::*;

    fn check_lengths(freqs: &[u32], max_depth: i32) -> Vec<u32> {
        let mut lengths = vec![0u32; freqs.len()];
        build_huffman_lengths(freqs, max_depth, &mut lengths).unwrap();

        let mut kraft = 0u64;
        for (k, &len) in lengths.iter().enumerate() {
            assert!(len as i32 <= max_depth, "length {len} over bound {max_depth}");
            assert_eq!(len == 0, freqs[k] == 0, "symbol {k} usage mismatch");
            if len > 0 {
                kraft += 1u64 << (max_depth as u32 - len);
            }
        }
        assert_eq!(kraft, 1u64 << max_depth, "code space not exactly full");
        lengths
    }

    #[test]
    fn balanced_distribution() {
        let lengths = check_lengths(&[10, 10, 10, 10], 15);
        assert_eq!(lengths, vec![2, 2, 2, 2]);
    }

    #[test]
    fn skewed_distribution_respects_cap() {
        // an unbounded tree would give the tail very long codes
        let freqs: Vec<u32> = (0..18).map(|i| 1 << i).collect();
        check_lengths(&freqs, 15);
        check_lengths(&[1000, 500, 200, 10, 5, 2, 1, 1, 1, 1, 1, 1, 1, 1, 1, 1], 5);
    }

    #[test]
    fn unused_symbols_get_no_code() {
        let lengths = check_lengths(&[5, 0, 7, 0, 3], 15);
        assert_eq!(lengths[1], 0);
        assert_eq!(lengths[3], 0);
    }

    #[test]
    fn random_distributions_stay_bounded() {
        let mut rng = StdRng::seed_from_u64(0x6A78_6C31);
        for _ in 0..50 {
            let n = rng.gen_range(2..40);
            let mut freqs: Vec<u32> = (0..n).map(|_| rng.gen_range(0..10_000)).collect();
            // make sure at least two symbols are used
            freqs[0] = freqs[0].max(1);
            freqs[n - 1] = freqs[n - 1].max(1);
            check_lengths(&freqs, 15);
        }
    }

    #[test]
    fn canonical_codes_are_prefix_free() {
        let freqs = [50, 20, 20, 5, 3, 1, 1];
        let lengths = check_lengths(&freqs, 15);
        let mut table = vec![VlcElement::default(); freqs.len()];
        build_prefix_table(&lengths, &mut table).unwrap();

        for i in 0..table.len() {
            for j in 0..table.len() {
                if i == j || table[i].length == 0 || table[j].length == 0 {
                    continue;
                }
                let shorter = table[i].length.min(table[j].length);
                let mask = (1u32 << shorter) - 1;
                assert!(
                    table[i].symbol & mask != table[j].symbol & mask,
                    "codes {i} and {j} share a prefix"
                );
            }
        }
    }

    #[test]
    fn prefix_symbols_round_trip() {
        use crate::bit_writer::tests::BitReader;
        use crate::bit_writer::BitWriter;

        let mut rng = StdRng::seed_from_u64(0x7072_6669);
        let freqs = [900u32, 300, 120, 60, 30, 8, 2, 1, 1];
        let lengths = check_lengths(&freqs, 15);
        let mut table = vec![VlcElement::default(); freqs.len()];
        build_prefix_table(&lengths, &mut table).unwrap();

        let symbols: Vec<usize> = (0..512).map(|_| rng.gen_range(0..freqs.len())).collect();
        let mut bw = BitWriter::with_buffer(vec![0u8; 4096]);
        for &s in &symbols {
            bw.put_bits(table[s].length, u64::from(table[s].symbol));
        }
        bw.zero_pad();
        bw.status().unwrap();

        // decode by extending the LSB-first code one bit at a time
        let mut br = BitReader::new(bw.written());
        for &expected in &symbols {
            let mut acc = 0u32;
            let mut len = 0u32;
            let decoded = loop {
                acc |= (br.read(1) as u32) << len;
                len += 1;
                let hit = table
                    .iter()
                    .enumerate()
                    .find(|(_, e)| e.length == len && e.symbol == acc);
                if let Some((sym, _)) = hit {
                    break sym;
                }
                assert!(len <= 15, "no code matched");
            };
            assert_eq!(decoded, expected);
        }
    }

    #[test]
    fn degenerate_code_space_is_rejected() {
        // lengths that overfill the 32-bit code space
        let lengths = [1u32, 1, 1];
        let mut table = vec![VlcElement::default(); 3];
        assert!(build_prefix_table(&lengths, &mut table).is_err());
    }
}
