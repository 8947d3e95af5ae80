// Copyright (c) the JPEG XL Project Authors. All rights reserved.
//
// Use of this source code is governed by a BSD-style
// license that can be found in the LICENSE file.

use crate::bit_reader::BitReader;
use crate::bit_writer::BitWriter;
use crate::error::{Error, Result};
use crate::util::CeilLog2;

/// Configuration splitting an unsigned integer between an entropy-coded token
/// and raw trailing bits.
///
/// Values below `1 << split_exponent` are stored in the token directly; larger
/// values keep `msb_in_token` bits below the leading one and `lsb_in_token`
/// low bits in the token, with the bits in between read raw.
#[derive(Debug, Clone)]
pub struct HybridUint {
    split_token: u32,
    split_exponent: u32,
    msb_in_token: u32,
    lsb_in_token: u32,
}

impl HybridUint {
    pub fn new(split_exponent: u32, msb_in_token: u32, lsb_in_token: u32) -> Self {
        Self {
            split_token: 1 << split_exponent,
            split_exponent,
            msb_in_token,
            lsb_in_token,
        }
    }

    pub fn decode(log_alpha_size: usize, br: &mut BitReader) -> Result<HybridUint> {
        let split_exponent = br.read((log_alpha_size + 1).ceil_log2())? as u32;
        let msb_in_token;
        let lsb_in_token;
        if split_exponent != log_alpha_size as u32 {
            let nbits = (split_exponent + 1).ceil_log2();
            msb_in_token = br.read(nbits)? as u32;
            if msb_in_token > split_exponent {
                return Err(Error::InvalidUintConfig(split_exponent, msb_in_token, None));
            }
            let nbits = (split_exponent - msb_in_token + 1).ceil_log2();
            lsb_in_token = br.read(nbits)? as u32;
        } else {
            msb_in_token = 0;
            lsb_in_token = 0;
        }
        if lsb_in_token + msb_in_token > split_exponent {
            return Err(Error::InvalidUintConfig(
                split_exponent,
                msb_in_token,
                Some(lsb_in_token),
            ));
        }
        Ok(HybridUint::new(split_exponent, msb_in_token, lsb_in_token))
    }

    /// Expands a token into a value, reading the raw bits from `br`.
    pub fn read(&self, token: u32, br: &mut BitReader) -> Result<u32> {
        if token < self.split_token {
            return Ok(token);
        }
        let bits_in_token = self.lsb_in_token + self.msb_in_token;
        let nbits =
            self.split_exponent - bits_in_token + ((token - self.split_token) >> bits_in_token);
        // To match the behaviour of libjxl, nbits is limited to 31.
        if nbits > 31 {
            return Err(Error::IntegerTooLarge(nbits));
        }
        let low = (token & ((1 << self.lsb_in_token) - 1)) as u64;
        let token_nolow = token >> self.lsb_in_token;
        let bits = br.read(nbits as usize)?;
        let hi = ((token_nolow & ((1 << self.msb_in_token) - 1)) | (1 << self.msb_in_token)) as u64;
        Ok(((((hi << nbits) | bits) << self.lsb_in_token) | low) as u32)
    }

    /// Splits a value into `(token, nbits, bits)`; inverse of [`Self::read`].
    pub fn encode(&self, value: u32) -> (u32, u32, u32) {
        if value < self.split_token {
            return (value, 0, 0);
        }
        let bits_in_token = self.lsb_in_token + self.msb_in_token;
        let n = (31 - value.leading_zeros()) - bits_in_token;
        let token = self.split_token
            + ((n - (self.split_exponent - bits_in_token)) << bits_in_token)
            + (((value >> (n + self.lsb_in_token)) & ((1 << self.msb_in_token) - 1))
                << self.lsb_in_token)
            + (value & ((1 << self.lsb_in_token) - 1));
        let bits = (value >> self.lsb_in_token) & ((1 << n) - 1);
        (token, n, bits)
    }

    /// Writes the raw-bit part produced by [`Self::encode`].
    pub fn write_bits(&self, nbits: u32, bits: u32, bw: &mut BitWriter) {
        bw.write(nbits as usize, bits as u64);
    }
}
