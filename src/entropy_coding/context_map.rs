// Copyright (c) the JPEG XL Project Authors. All rights reserved.
//
// Use of this source code is governed by a BSD-style
// license that can be found in the LICENSE file.

use crate::bit_reader::BitReader;
use crate::entropy_coding::decode::{Histograms, SymbolReader};
use crate::error::{Error, Result};

/// Standard inverse move-to-front transform over a 256-element list.
pub fn inverse_mtf(values: &mut [u8]) {
    let mut mtf: [u8; 256] = array_init::array_init(|i| i as u8);
    for value in values.iter_mut() {
        let index = *value as usize;
        let decoded = mtf[index];
        *value = decoded;
        mtf.copy_within(0..index, 1);
        mtf[0] = decoded;
    }
}

/// Decodes the mapping of up to 256 raw contexts to histogram clusters.
pub fn decode_context_map(num_contexts: usize, br: &mut BitReader) -> Result<Vec<u8>> {
    debug_assert!(num_contexts <= 256);
    let is_simple = br.read(1)? != 0;
    let context_map = if is_simple {
        let bits_per_entry = br.read(2)? as usize;
        (0..num_contexts)
            .map(|_| Ok(br.read(bits_per_entry)? as u8))
            .collect::<Result<Vec<u8>>>()?
    } else {
        let use_mtf = br.read(1)? != 0;
        let histograms = Histograms::decode(1, br, /*allow_lz77=*/ num_contexts > 2)?;
        let mut reader = SymbolReader::new(&histograms, br, None)?;
        let mut map = Vec::with_capacity(num_contexts);
        for _ in 0..num_contexts {
            let cluster = reader.read_unsigned(&histograms, br, 0)?;
            if cluster > 255 {
                return Err(Error::InvalidContextMap(cluster));
            }
            map.push(cluster as u8);
        }
        reader.check_final_state(&histograms)?;
        if use_mtf {
            inverse_mtf(&mut map);
        }
        map
    };

    // Remap so that cluster ids are contiguous; a hole means a histogram that
    // could never be used, which is a bitstream error.
    let num_histograms = *context_map.iter().max().unwrap_or(&0) as u32 + 1;
    let mut used = vec![false; num_histograms as usize];
    for &cluster in context_map.iter() {
        used[cluster as usize] = true;
    }
    let distinct = used.iter().filter(|&&u| u).count() as u32;
    if distinct != num_histograms {
        return Err(Error::InvalidContextMapHole(num_histograms, distinct));
    }
    Ok(context_map)
}

#[cfg(test)]
mod test {
    use super::*;

    #[test]
    fn mtf_identity_prefix() {
        // Reading index 0 repeatedly yields the front element unchanged.
        let mut values = [0u8; 4];
        inverse_mtf(&mut values);
        assert_eq!(values, [0; 4]);
    }

    #[test]
    fn mtf_moves_to_front() {
        let mut values = [3u8, 0, 3, 1, 2];
        inverse_mtf(&mut values);
        // 3 -> list [3,0,1,2,...]; 0 -> 3 again; 3 -> list index 3 is 2...
        assert_eq!(values[0], 3);
        assert_eq!(values[1], 3);
    }

    #[test]
    fn mtf_roundtrip_all_values() {
        // Forward MTF of a known sequence, then inverse, recovers the input.
        let input: Vec<u8> = (0u8..=255).rev().collect();
        let mut mtf: Vec<u8> = (0u8..=255).collect();
        let mut encoded = Vec::new();
        for &value in input.iter() {
            let index = mtf.iter().position(|&v| v == value).unwrap();
            encoded.push(index as u8);
            mtf.remove(index);
            mtf.insert(0, value);
        }
        let mut decoded = encoded.clone();
        inverse_mtf(&mut decoded);
        assert_eq!(decoded, input);
    }

    #[test]
    fn simple_context_map() -> Result<()> {
        use crate::bit_writer::BitWriter;
        let mut bw = BitWriter::new();
        bw.write(1, 1); // simple
        bw.write(2, 2); // 2 bits per entry
        for value in [0u64, 1, 2, 1] {
            bw.write(2, value);
        }
        let bytes = bw.into_bytes();
        let mut br = BitReader::new(&bytes);
        assert_eq!(decode_context_map(4, &mut br)?, vec![0, 1, 2, 1]);
        Ok(())
    }

    #[test]
    fn context_map_with_hole_rejected() {
        use crate::bit_writer::BitWriter;
        let mut bw = BitWriter::new();
        bw.write(1, 1);
        bw.write(2, 2);
        for value in [0u64, 2, 2, 0] {
            bw.write(2, value);
        }
        let bytes = bw.into_bytes();
        let mut br = BitReader::new(&bytes);
        assert!(decode_context_map(4, &mut br).is_err());
    }
}
