// Copyright (c) the JPEG XL Project Authors. All rights reserved.
//
// Use of this source code is governed by a BSD-style
// license that can be found in the LICENSE file.

use tracing::trace;

use crate::bit_reader::BitReader;
use crate::entropy_coding::decode::decode_varint8;
use crate::error::{Error, Result};
use crate::util::FloorLog2;

pub const ANS_LOG_TAB_SIZE: usize = 12;
pub const ANS_TAB_SIZE: usize = 1 << ANS_LOG_TAB_SIZE;
/// High half of the canonical final ANS state.
const ANS_SIGNATURE: u32 = 0x13;

/// Code length marker meaning "repeat the previous count".
const LOG_COUNT_RLE: u32 = ANS_LOG_TAB_SIZE as u32 + 1;

/// Static prefix code for population-count log values 0..=13, LSB first.
/// `(length, code)` per value.
const LOG_COUNT_CODES: [(u8, u8); 14] = [
    (5, 0b10001),
    (5, 0b01011),
    (4, 0b1111),
    (4, 0b0011),
    (4, 0b1001),
    (4, 0b0111),
    (3, 0b100),
    (3, 0b010),
    (3, 0b101),
    (3, 0b110),
    (3, 0b000),
    (5, 0b11011),
    (7, 0b0000001),
    (6, 0b100001),
];

fn read_log_count(br: &mut BitReader) -> Result<u32> {
    let peek = br.peek(7) as u8;
    for (value, &(len, code)) in LOG_COUNT_CODES.iter().enumerate() {
        if peek & ((1 << len) - 1) == code {
            br.consume(len as usize)?;
            return Ok(value as u32);
        }
    }
    Err(Error::InvalidAnsHistogram)
}

/// A distribution of `alphabet_size` values as equal as possible, summing to
/// `total`.
pub fn create_flat_histogram(alphabet_size: usize, total: u32) -> Vec<u32> {
    let total = total as u64;
    (0..alphabet_size as u64)
        .map(|i| (total * (i + 1) / alphabet_size as u64 - total * i / alphabet_size as u64) as u32)
        .collect()
}

fn population_count_precision(logcount: u32, shift: u32) -> u32 {
    let r = (logcount as i32).min(shift as i32 - ((ANS_LOG_TAB_SIZE as i32 - logcount as i32) >> 1));
    r.max(0) as u32
}

/// Reads one symbol distribution, as counts summing to [`ANS_TAB_SIZE`].
fn read_histogram(br: &mut BitReader) -> Result<Vec<u32>> {
    if br.read(1)? == 1 {
        // Simple code: one or two symbols.
        let num_symbols = br.read(1)? as usize + 1;
        let mut symbols = [0usize; 2];
        for symbol in symbols.iter_mut().take(num_symbols) {
            *symbol = decode_varint8(br)? as usize;
        }
        let max_symbol = symbols[..num_symbols].iter().copied().max().unwrap();
        let mut counts = vec![0u32; max_symbol + 1];
        if num_symbols == 1 {
            counts[symbols[0]] = ANS_TAB_SIZE as u32;
        } else {
            if symbols[0] == symbols[1] {
                return Err(Error::InvalidAnsHistogram);
            }
            counts[symbols[0]] = br.read(ANS_LOG_TAB_SIZE)? as u32;
            counts[symbols[1]] = ANS_TAB_SIZE as u32 - counts[symbols[0]];
        }
        return Ok(counts);
    }

    if br.read(1)? == 1 {
        // Flat histogram over a given alphabet size.
        let alphabet_size = br.read(8)? as usize + 1;
        return Ok(create_flat_histogram(alphabet_size, ANS_TAB_SIZE as u32));
    }

    let shift = {
        let upper_bound_log = (ANS_LOG_TAB_SIZE as u64 + 1).floor_log2();
        let mut log = 0;
        while log < upper_bound_log {
            if br.read(1)? == 0 {
                break;
            }
            log += 1;
        }
        let shift = (br.read(log)? as u32 | (1 << log)) - 1;
        if shift > ANS_LOG_TAB_SIZE as u32 + 1 {
            return Err(Error::InvalidAnsHistogram);
        }
        shift
    };

    let num_symbols = br.read(8)? as usize + 3;
    let mut logcounts = vec![0u32; num_symbols];
    let mut omit_log = 0;
    let mut omit_pos = None;
    for (i, logcount) in logcounts.iter_mut().enumerate() {
        *logcount = read_log_count(br)?;
        if *logcount < LOG_COUNT_RLE && *logcount > omit_log {
            omit_log = *logcount;
            omit_pos = Some(i);
        }
    }
    let Some(omit_pos) = omit_pos else {
        return Err(Error::InvalidAnsHistogram);
    };
    if logcounts.get(omit_pos + 1) == Some(&LOG_COUNT_RLE) {
        return Err(Error::InvalidAnsHistogram);
    }

    let mut counts = vec![0u32; num_symbols];
    let mut total_count: u32 = 0;
    let mut same: u32 = 0;
    for i in 0..num_symbols {
        if same > 0 {
            counts[i] = counts[i - 1];
            total_count += counts[i];
            same -= 1;
            continue;
        }
        if i == omit_pos {
            continue;
        }
        match logcounts[i] {
            0 => {}
            LOG_COUNT_RLE => {
                if i == 0 {
                    return Err(Error::InvalidAnsHistogram);
                }
                let run = decode_varint8(br)? as u32 + 4;
                counts[i] = counts[i - 1];
                total_count += counts[i];
                same = run - 1;
            }
            code => {
                let bitcount = population_count_precision(code - 1, shift);
                counts[i] =
                    (1 << (code - 1)) + ((br.read(bitcount as usize)? as u32) << (code - 1 - bitcount));
                total_count += counts[i];
            }
        }
        if total_count > ANS_TAB_SIZE as u32 {
            return Err(Error::InvalidAnsHistogram);
        }
    }
    let omitted = ANS_TAB_SIZE as u32 - total_count;
    if omitted == 0 {
        return Err(Error::InvalidAnsHistogram);
    }
    counts[omit_pos] = omitted;
    trace!(?counts, "read histogram");
    Ok(counts)
}

/// One bucket of the alias table: positions below `cutoff` belong to the
/// bucket's own symbol, positions at or above it to `right_value`, whose run
/// continues at `right_offset`.
#[derive(Clone, Copy, Debug)]
struct AliasEntry {
    cutoff: u16,
    right_value: u16,
    right_offset: u16,
    freq0: u16,
    freq1: u16,
}

#[derive(Debug)]
pub struct AliasTable {
    log_entry_size: usize,
    entries: Vec<AliasEntry>,
}

#[derive(Debug, PartialEq, Eq)]
pub struct AnsSymbol {
    pub value: u32,
    pub offset: u32,
    pub freq: u32,
}

impl AliasTable {
    /// Builds the alias table with Vose's method. The build is deterministic:
    /// spare mass is always paired starting from the largest symbol index, so
    /// the encoder-side build produces the identical table.
    pub fn build(counts: &[u32], log_alpha_size: usize) -> Result<AliasTable> {
        let table_size = 1usize << log_alpha_size;
        let log_entry_size = ANS_LOG_TAB_SIZE - log_alpha_size;
        let entry_size = 1u32 << log_entry_size;
        if counts.len() > table_size {
            return Err(Error::InvalidAnsHistogram);
        }
        if counts.iter().map(|&c| c as u64).sum::<u64>() != ANS_TAB_SIZE as u64 {
            return Err(Error::InvalidAnsHistogram);
        }

        let count = |i: usize| counts.get(i).copied().unwrap_or(0);

        if let Some(single) = (0..counts.len()).find(|&i| count(i) == ANS_TAB_SIZE as u32) {
            // Degenerate case: a single symbol spans the whole table.
            let entries = (0..table_size)
                .map(|i| AliasEntry {
                    cutoff: 0,
                    right_value: single as u16,
                    right_offset: (i as u32 * entry_size) as u16,
                    freq0: 0,
                    freq1: ANS_TAB_SIZE as u16,
                })
                .collect();
            return Ok(AliasTable {
                log_entry_size,
                entries,
            });
        }

        let mut cutoffs: Vec<u32> = (0..table_size).map(count).collect();
        let mut right_value = vec![0u32; table_size];
        let mut right_offset = vec![0u32; table_size];
        let mut underfull: Vec<usize> = vec![];
        let mut overfull: Vec<usize> = vec![];
        for (i, &c) in cutoffs.iter().enumerate() {
            match c.cmp(&entry_size) {
                std::cmp::Ordering::Less => underfull.push(i),
                std::cmp::Ordering::Greater => overfull.push(i),
                std::cmp::Ordering::Equal => right_value[i] = i as u32,
            }
        }
        while let Some(o) = overfull.pop() {
            // Mass conservation guarantees an underfull bucket exists.
            let u = underfull.pop().ok_or(Error::InvalidAnsHistogram)?;
            let by = entry_size - cutoffs[u];
            cutoffs[o] -= by;
            right_value[u] = o as u32;
            right_offset[u] = cutoffs[o];
            match cutoffs[o].cmp(&entry_size) {
                std::cmp::Ordering::Less => underfull.push(o),
                std::cmp::Ordering::Greater => overfull.push(o),
                std::cmp::Ordering::Equal => right_value[o] = o as u32,
            }
        }
        if !underfull.is_empty() {
            return Err(Error::InvalidAnsHistogram);
        }

        let entries = (0..table_size)
            .map(|i| AliasEntry {
                cutoff: cutoffs[i] as u16,
                right_value: right_value[i] as u16,
                right_offset: right_offset[i] as u16,
                freq0: count(i) as u16,
                freq1: count(right_value[i] as usize) as u16,
            })
            .collect();
        Ok(AliasTable {
            log_entry_size,
            entries,
        })
    }

    /// Maps a table slot `x` in `[0, ANS_TAB_SIZE)` to the symbol occupying
    /// it, the slot's index within that symbol's run, and the symbol's
    /// frequency.
    pub fn lookup(&self, x: u32) -> AnsSymbol {
        let bucket = (x as usize) >> self.log_entry_size;
        let pos = x & ((1 << self.log_entry_size) - 1);
        let entry = &self.entries[bucket];
        if pos < entry.cutoff as u32 {
            AnsSymbol {
                value: bucket as u32,
                offset: pos,
                freq: entry.freq0 as u32,
            }
        } else {
            AnsSymbol {
                value: entry.right_value as u32,
                offset: entry.right_offset as u32 + (pos - entry.cutoff as u32),
                freq: entry.freq1 as u32,
            }
        }
    }
}

#[derive(Debug)]
pub struct AnsCodes {
    tables: Vec<AliasTable>,
}

impl AnsCodes {
    pub fn decode(num: usize, log_alpha_size: usize, br: &mut BitReader) -> Result<AnsCodes> {
        let tables = (0..num)
            .map(|_| {
                let counts = read_histogram(br)?;
                AliasTable::build(&counts, log_alpha_size)
            })
            .collect::<Result<_>>()?;
        Ok(AnsCodes { tables })
    }
}

/// The rANS decoder state machine.
#[derive(Debug)]
pub struct AnsReader {
    state: u32,
}

impl AnsReader {
    pub fn init(br: &mut BitReader) -> Result<AnsReader> {
        Ok(AnsReader {
            state: br.read(32)? as u32,
        })
    }

    pub fn new_unused() -> AnsReader {
        AnsReader { state: 0 }
    }

    pub fn read(&mut self, codes: &AnsCodes, br: &mut BitReader, cluster: usize) -> Result<u32> {
        let slot = self.state & (ANS_TAB_SIZE as u32 - 1);
        let sym = codes.tables[cluster].lookup(slot);
        self.state = sym.freq * (self.state >> ANS_LOG_TAB_SIZE) + sym.offset;
        if self.state < (1 << 16) {
            self.state = (self.state << 16) | br.peek(16) as u32;
            br.consume(16)?;
        }
        Ok(sym.value)
    }

    pub fn check_final_state(self) -> Result<()> {
        if self.state == ANS_SIGNATURE << 16 {
            Ok(())
        } else {
            Err(Error::InvalidAnsState(self.state))
        }
    }
}

#[cfg(test)]
mod test {
    use rand::{Rng, SeedableRng};
    use rand_xorshift::XorShiftRng;

    use super::*;

    #[test]
    fn flat_histogram_mass() {
        for alphabet_size in [1usize, 2, 3, 5, 16, 17, 100, 256] {
            let counts = create_flat_histogram(alphabet_size, ANS_TAB_SIZE as u32);
            assert_eq!(counts.len(), alphabet_size);
            assert_eq!(counts.iter().sum::<u32>(), ANS_TAB_SIZE as u32);
            let max = counts.iter().max().unwrap();
            let min = counts.iter().min().unwrap();
            assert!(max - min <= 1);
        }
    }

    /// Every table slot must map to a symbol with a distinct in-run offset, so
    /// that lookup is a bijection between slots and (symbol, offset) pairs.
    fn check_bijection(counts: &[u32], log_alpha_size: usize) {
        let table = AliasTable::build(counts, log_alpha_size).unwrap();
        let mut seen = vec![vec![false; ANS_TAB_SIZE]; counts.len()];
        for x in 0..ANS_TAB_SIZE as u32 {
            let sym = table.lookup(x);
            let value = sym.value as usize;
            assert!(value < counts.len());
            assert_eq!(sym.freq, counts[value]);
            assert!(sym.offset < counts[value]);
            assert!(!seen[value][sym.offset as usize]);
            seen[value][sym.offset as usize] = true;
        }
        for (value, &count) in counts.iter().enumerate() {
            assert_eq!(
                seen[value].iter().filter(|&&s| s).count(),
                count as usize,
                "symbol {value} does not cover its run"
            );
        }
    }

    #[test]
    fn alias_table_uniform() {
        let counts = create_flat_histogram(16, ANS_TAB_SIZE as u32);
        check_bijection(&counts, 5);
    }

    #[test]
    fn alias_table_degenerate() {
        let mut counts = vec![0u32; 7];
        counts[3] = ANS_TAB_SIZE as u32;
        check_bijection(&counts, 5);
    }

    #[test]
    fn alias_table_random_histograms() {
        let mut rng = XorShiftRng::seed_from_u64(0x1bad5eed);
        for _ in 0..50 {
            let alphabet_size = rng.random_range(2..=32usize);
            // Start flat, then shuffle mass around; the sum stays 4096.
            let mut counts = create_flat_histogram(alphabet_size, ANS_TAB_SIZE as u32);
            for _ in 0..200 {
                let from = rng.random_range(0..alphabet_size);
                let to = rng.random_range(0..alphabet_size);
                let amount = rng.random_range(0..=counts[from]);
                counts[from] -= amount;
                counts[to] += amount;
            }
            check_bijection(&counts, 5);
        }
    }

    #[test]
    fn ans_stream_roundtrip_degenerate() {
        // A single-symbol alphabet never changes the decoder state, so a
        // stream holding just the initial state decodes any number of symbols
        // and passes the final-state audit.
        let counts = vec![ANS_TAB_SIZE as u32];
        let table = AliasTable::build(&counts, 5).unwrap();
        let codes = AnsCodes {
            tables: vec![table],
        };
        let bytes = (ANS_SIGNATURE << 16).to_le_bytes();
        let mut br = BitReader::new(&bytes);
        let mut reader = AnsReader::init(&mut br).unwrap();
        for _ in 0..10 {
            assert_eq!(reader.read(&codes, &mut br, 0).unwrap(), 0);
        }
        reader.check_final_state().unwrap();
    }

    #[test]
    fn log_count_code_is_prefix_free() {
        for (i, &(len_a, code_a)) in LOG_COUNT_CODES.iter().enumerate() {
            for (j, &(len_b, code_b)) in LOG_COUNT_CODES.iter().enumerate() {
                if i == j {
                    continue;
                }
                let len = len_a.min(len_b);
                assert!(
                    code_a & ((1 << len) - 1) != code_b & ((1 << len) - 1),
                    "codes for {i} and {j} collide"
                );
            }
        }
    }
}
