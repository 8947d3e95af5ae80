// Copyright (c) the JPEG XL Project Authors. All rights reserved.
//
// Use of this source code is governed by a BSD-style
// license that can be found in the LICENSE file.

use tracing::debug;

use crate::bit_reader::BitReader;
use crate::entropy_coding::ans::{AnsCodes, AnsReader};
use crate::entropy_coding::context_map::decode_context_map;
use crate::entropy_coding::huffman::{HuffmanCodes, HUFFMAN_MAX_BITS};
use crate::entropy_coding::hybrid_uint::HybridUint;
use crate::error::{Error, Result};
use crate::headers::encodings::{read_bool, read_u32, unpack_signed, U32};

/// Reads a value in `[0, 256)` with 1 to 11 bits.
pub fn decode_varint8(br: &mut BitReader) -> Result<u8> {
    if br.read(1)? != 0 {
        let nbits = br.read(3)? as usize;
        if nbits == 0 {
            Ok(1)
        } else {
            Ok(((1 << nbits) + br.read(nbits)?) as u8)
        }
    } else {
        Ok(0)
    }
}

/// Reads a value in `[0, 65536)` with 1 to 21 bits.
pub fn decode_varint16(br: &mut BitReader) -> Result<u16> {
    if br.read(1)? != 0 {
        let nbits = br.read(4)? as usize;
        if nbits == 0 {
            Ok(1)
        } else {
            Ok(((1 << nbits) + br.read(nbits)?) as u16)
        }
    } else {
        Ok(0)
    }
}

#[derive(Debug)]
pub struct Lz77Params {
    pub enabled: bool,
    pub min_symbol: u32,
    pub min_length: u32,
}

impl Lz77Params {
    fn read(br: &mut BitReader) -> Result<Lz77Params> {
        let enabled = read_bool(br)?;
        let (min_symbol, min_length) = if enabled {
            (
                read_u32(
                    br,
                    [
                        U32::Val(224),
                        U32::Val(512),
                        U32::Val(4096),
                        U32::BitsOffset { n: 15, off: 8 },
                    ],
                )?,
                read_u32(
                    br,
                    [
                        U32::Val(3),
                        U32::Val(4),
                        U32::BitsOffset { n: 2, off: 5 },
                        U32::BitsOffset { n: 8, off: 9 },
                    ],
                )?,
            )
        } else {
            (0, 0)
        };
        Ok(Lz77Params {
            enabled,
            min_symbol,
            min_length,
        })
    }
}

#[derive(Debug)]
enum Codes {
    Huffman(HuffmanCodes),
    Ans(AnsCodes),
}

/// Per-stream entropy decoding state: LZ77 parameters, the context map, and
/// one (alias table or prefix table, hybrid-uint config) pair per cluster.
#[derive(Debug)]
pub struct Histograms {
    lz77_params: Lz77Params,
    lz77_length_uint: Option<HybridUint>,
    context_map: Vec<u8>,
    log_alpha_size: usize,
    uint_configs: Vec<HybridUint>,
    codes: Codes,
}

impl Histograms {
    pub fn decode(num_contexts: usize, br: &mut BitReader, allow_lz77: bool) -> Result<Histograms> {
        let lz77_params = Lz77Params::read(br)?;
        if !allow_lz77 && lz77_params.enabled {
            return Err(Error::LZ77Disallowed);
        }
        let (num_contexts, lz77_length_uint) = if lz77_params.enabled {
            (num_contexts + 1, Some(HybridUint::decode(8, br)?))
        } else {
            (num_contexts, None)
        };

        let context_map = if num_contexts > 1 {
            decode_context_map(num_contexts, br)?
        } else {
            vec![0]
        };
        debug_assert_eq!(context_map.len(), num_contexts);

        let use_prefix_code = read_bool(br)?;
        let log_alpha_size = if use_prefix_code {
            HUFFMAN_MAX_BITS
        } else {
            br.read(2)? as usize + 5
        };
        let num_histograms = *context_map.iter().max().unwrap() as usize + 1;
        let uint_configs = (0..num_histograms)
            .map(|_| HybridUint::decode(log_alpha_size, br))
            .collect::<Result<_>>()?;

        let codes = if use_prefix_code {
            Codes::Huffman(HuffmanCodes::decode(num_histograms, br)?)
        } else {
            Codes::Ans(AnsCodes::decode(num_histograms, log_alpha_size, br)?)
        };
        debug!(
            num_contexts,
            num_histograms, use_prefix_code, log_alpha_size, "decoded histograms"
        );

        Ok(Histograms {
            lz77_params,
            lz77_length_uint,
            context_map,
            log_alpha_size,
            uint_configs,
            codes,
        })
    }

    pub fn num_histograms(&self) -> usize {
        *self.context_map.iter().max().unwrap() as usize + 1
    }

    pub fn log_alpha_size(&self) -> usize {
        self.log_alpha_size
    }

    fn map_context(&self, context: usize) -> usize {
        self.context_map[context] as usize
    }
}

const LOG_WINDOW_SIZE: u32 = 20;
const WINDOW_MASK: u32 = (1 << LOG_WINDOW_SIZE) - 1;

/// Rows above, offsets left, used to map special distance codes to window
/// distances when the image width is known.
#[rustfmt::skip]
const SPECIAL_DISTANCES: [(i8, u8); 120] = [
    ( 0, 1), ( 1, 0), ( 1, 1), (-1, 1), ( 0, 2), ( 2, 0), ( 1, 2), (-1, 2), ( 2, 1), (-2, 1),
    ( 2, 2), (-2, 2), ( 0, 3), ( 3, 0), ( 1, 3), (-1, 3), ( 3, 1), (-3, 1), ( 2, 3), (-2, 3),
    ( 3, 2), (-3, 2), ( 0, 4), ( 4, 0), ( 1, 4), (-1, 4), ( 4, 1), (-4, 1), ( 3, 3), (-3, 3),
    ( 2, 4), (-2, 4), ( 4, 2), (-4, 2), ( 0, 5), ( 3, 4), (-3, 4), ( 4, 3), (-4, 3), ( 5, 0),
    ( 1, 5), (-1, 5), ( 5, 1), (-5, 1), ( 2, 5), (-2, 5), ( 5, 2), (-5, 2), ( 4, 4), (-4, 4),
    ( 3, 5), (-3, 5), ( 5, 3), (-5, 3), ( 0, 6), ( 6, 0), ( 1, 6), (-1, 6), ( 6, 1), (-6, 1),
    ( 2, 6), (-2, 6), ( 6, 2), (-6, 2), ( 4, 5), (-4, 5), ( 5, 4), (-5, 4), ( 3, 6), (-3, 6),
    ( 6, 3), (-6, 3), ( 0, 7), ( 7, 0), ( 1, 7), (-1, 7), ( 5, 5), (-5, 5), ( 7, 1), (-7, 1),
    ( 4, 6), (-4, 6), ( 6, 4), (-6, 4), ( 2, 7), (-2, 7), ( 7, 2), (-7, 2), ( 3, 7), (-3, 7),
    ( 7, 3), (-7, 3), ( 5, 6), (-5, 6), ( 6, 5), (-6, 5), ( 8, 0), ( 4, 7), (-4, 7), ( 7, 4),
    (-7, 4), ( 8, 1), ( 8, 2), ( 6, 6), (-6, 6), ( 8, 3), ( 5, 7), (-5, 7), ( 7, 5), (-7, 5),
    ( 8, 4), ( 6, 7), (-6, 7), ( 7, 6), (-7, 6), ( 8, 5), ( 7, 7), (-7, 7), ( 8, 6), ( 8, 7),
];

#[derive(Debug)]
struct Lz77State {
    window: Vec<u32>,
    num_to_copy: u32,
    copy_pos: u32,
    num_decoded: u32,
    dist_multiplier: u32,
}

impl Lz77State {
    fn new(dist_multiplier: u32) -> Lz77State {
        Lz77State {
            window: Vec::new(),
            num_to_copy: 0,
            copy_pos: 0,
            num_decoded: 0,
            dist_multiplier,
        }
    }

    fn push_decoded(&mut self, value: u32) {
        let offset = (self.num_decoded & WINDOW_MASK) as usize;
        if let Some(slot) = self.window.get_mut(offset) {
            *slot = value;
        } else {
            debug_assert_eq!(self.window.len(), offset);
            self.window.push(value);
        }
        self.num_decoded += 1;
    }

    fn pull(&mut self) -> Option<u32> {
        let next_num_to_copy = self.num_to_copy.checked_sub(1)?;
        let value = self.window[(self.copy_pos & WINDOW_MASK) as usize];
        self.copy_pos += 1;
        self.num_to_copy = next_num_to_copy;
        Some(value)
    }
}

/// Reads hybrid-uint-coded symbols from one entropy-coded stream, including
/// the optional LZ77 back-reference layer.
#[derive(Debug)]
pub struct SymbolReader {
    ans_reader: AnsReader,
    lz77: Option<Lz77State>,
}

impl SymbolReader {
    pub fn new(
        histograms: &Histograms,
        br: &mut BitReader,
        image_width: Option<usize>,
    ) -> Result<SymbolReader> {
        let ans_reader = if matches!(histograms.codes, Codes::Ans(_)) {
            AnsReader::init(br)?
        } else {
            AnsReader::new_unused()
        };
        let lz77 = histograms
            .lz77_params
            .enabled
            .then(|| Lz77State::new(image_width.unwrap_or(0) as u32));
        Ok(SymbolReader { ans_reader, lz77 })
    }

    fn read_token(
        &mut self,
        histograms: &Histograms,
        br: &mut BitReader,
        cluster: usize,
    ) -> Result<u32> {
        match &histograms.codes {
            Codes::Huffman(hc) => hc.read(br, cluster),
            Codes::Ans(ans) => self.ans_reader.read(ans, br, cluster),
        }
    }

    fn read_uint_clustered(
        &mut self,
        histograms: &Histograms,
        br: &mut BitReader,
        cluster: usize,
    ) -> Result<u32> {
        let token = self.read_token(histograms, br, cluster)?;
        histograms.uint_configs[cluster].read(token, br)
    }

    /// Reads one value for the given raw context.
    pub fn read_unsigned(
        &mut self,
        histograms: &Histograms,
        br: &mut BitReader,
        context: usize,
    ) -> Result<u32> {
        let cluster = histograms.map_context(context);
        if self.lz77.is_none() {
            return self.read_uint_clustered(histograms, br, cluster);
        }

        let lz77 = self.lz77.as_mut().unwrap();
        if let Some(value) = lz77.pull() {
            lz77.push_decoded(value);
            return Ok(value);
        }

        let token = self.read_token(histograms, br, cluster)?;
        let min_symbol = histograms.lz77_params.min_symbol;
        if token < min_symbol {
            let value = histograms.uint_configs[cluster].read(token, br)?;
            let lz77 = self.lz77.as_mut().unwrap();
            lz77.push_decoded(value);
            return Ok(value);
        }

        // Back-reference: length from this token, distance from the dedicated
        // distance context (the last entry of the context map).
        let length_config = histograms.lz77_length_uint.as_ref().unwrap();
        let num_to_copy = length_config
            .read(token - min_symbol, br)?
            .checked_add(histograms.lz77_params.min_length)
            .ok_or(Error::ArithmeticOverflow)?;
        let dist_cluster = *histograms.context_map.last().unwrap() as usize;
        let distance_token = self.read_uint_clustered(histograms, br, dist_cluster)?;

        let lz77 = self.lz77.as_mut().unwrap();
        if lz77.num_decoded == 0 {
            return Err(Error::UnexpectedLz77Repeat);
        }
        lz77.num_to_copy = num_to_copy;
        let distance_minus_1 = if lz77.dist_multiplier == 0 {
            distance_token
        } else if let Some(distance) = distance_token.checked_sub(120) {
            distance
        } else {
            let (offset, dist) = SPECIAL_DISTANCES[distance_token as usize];
            (lz77.dist_multiplier * dist as u32)
                .checked_add_signed(offset as i32 - 1)
                .unwrap_or(0)
        };
        let distance = (distance_minus_1.min(WINDOW_MASK) + 1).min(lz77.num_decoded);
        lz77.copy_pos = lz77.num_decoded - distance;

        let value = lz77.pull().unwrap();
        lz77.push_decoded(value);
        Ok(value)
    }

    pub fn read_signed(
        &mut self,
        histograms: &Histograms,
        br: &mut BitReader,
        context: usize,
    ) -> Result<i32> {
        Ok(unpack_signed(self.read_unsigned(histograms, br, context)?))
    }

    /// Consumes the reader, checking the ANS final-state invariant.
    pub fn check_final_state(self, histograms: &Histograms) -> Result<()> {
        match &histograms.codes {
            Codes::Huffman(_) => Ok(()),
            Codes::Ans(_) => self.ans_reader.check_final_state(),
        }
    }
}

#[cfg(test)]
mod test {
    use super::*;
    use crate::bit_writer::BitWriter;

    #[test]
    fn varint8() -> Result<()> {
        let mut bw = BitWriter::new();
        bw.write(1, 0); // 0
        bw.write(1, 1); // prefix
        bw.write(3, 0); // 1
        bw.write(1, 1);
        bw.write(3, 3); // exponent 3
        bw.write(3, 5); // 8 + 5
        let bytes = bw.into_bytes();
        let mut br = BitReader::new(&bytes);
        assert_eq!(decode_varint8(&mut br)?, 0);
        assert_eq!(decode_varint8(&mut br)?, 1);
        assert_eq!(decode_varint8(&mut br)?, 13);
        Ok(())
    }

    #[test]
    fn varint16() -> Result<()> {
        let mut bw = BitWriter::new();
        bw.write(1, 1);
        bw.write(4, 10);
        bw.write(10, 1000);
        let bytes = bw.into_bytes();
        let mut br = BitReader::new(&bytes);
        assert_eq!(decode_varint16(&mut br)?, 1024 + 1000);
        Ok(())
    }

    #[test]
    fn lz77_params_disabled() -> Result<()> {
        let mut br = BitReader::new(&[0]);
        let params = Lz77Params::read(&mut br)?;
        assert!(!params.enabled);
        Ok(())
    }

    #[test]
    fn lz77_params_defaults() -> Result<()> {
        let mut bw = BitWriter::new();
        bw.write(1, 1); // enabled
        bw.write(2, 0); // min_symbol selector -> 224
        bw.write(2, 1); // min_length selector -> 4
        let bytes = bw.into_bytes();
        let mut br = BitReader::new(&bytes);
        let params = Lz77Params::read(&mut br)?;
        assert!(params.enabled);
        assert_eq!(params.min_symbol, 224);
        assert_eq!(params.min_length, 4);
        Ok(())
    }
}
