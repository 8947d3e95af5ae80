// Copyright (c) the JPEG XL Project Authors. All rights reserved.
//
// Use of this source code is governed by a BSD-style
// license that can be found in the LICENSE file.

use crate::bit_reader::BitReader;
use crate::error::{Error, Result};

/// A single U32 distribution: either a constant or an offset bit read.
#[derive(Clone, Copy, Debug)]
pub enum U32 {
    Bits(usize),
    BitsOffset { n: usize, off: u32 },
    Val(u32),
}

impl U32 {
    pub fn read(&self, br: &mut BitReader) -> Result<u32> {
        match *self {
            U32::Bits(n) => Ok(br.read(n)? as u32),
            U32::BitsOffset { n, off } => Ok(br.read(n)? as u32 + off),
            U32::Val(val) => Ok(val),
        }
    }
}

/// Reads a 2-bit selector, then the selected distribution. The `(d0..d3)`
/// tuple must match the one used by the encoder for this field.
pub fn read_u32(br: &mut BitReader, distributions: [U32; 4]) -> Result<u32> {
    let selector = br.read(2)? as usize;
    distributions[selector].read(br)
}

/// Variable-length U64: 2-bit selector, then 0, 1..16, 17..272, or a
/// 12-bit head followed by continuation nibble-shifted octets.
pub fn read_u64(br: &mut BitReader) -> Result<u64> {
    match br.read(2)? {
        0 => Ok(0),
        1 => Ok(1 + br.read(4)?),
        2 => Ok(17 + br.read(8)?),
        _ => {
            let mut result: u64 = br.read(12)?;
            let mut shift = 12;
            while br.read(1)? == 1 {
                if shift == 60 {
                    return Ok(result | (br.read(4)? << shift));
                }
                result |= br.read(8)? << shift;
                shift += 8;
            }
            Ok(result)
        }
    }
}

/// 16 raw bits interpreted as IEEE half precision, widened to f32.
/// Inf and NaN (exponent 31) are rejected.
pub fn read_f16(br: &mut BitReader) -> Result<f32> {
    let ret = half::f16::from_bits(br.read(16)? as u16);
    if !ret.is_finite() {
        Err(Error::FloatNaNOrInf)
    } else {
        Ok(ret.to_f32())
    }
}

pub fn read_bool(br: &mut BitReader) -> Result<bool> {
    Ok(br.read(1)? != 0)
}

/// Maps a signed value to an unsigned one: `0, -1, 1, -2, 2, ...`.
#[inline]
pub fn pack_signed(value: i32) -> u32 {
    let value = value as i64;
    (if value >= 0 { 2 * value } else { -2 * value - 1 }) as u32
}

/// Inverse of [`pack_signed`].
#[inline]
pub fn unpack_signed(value: u32) -> i32 {
    let value = value as i64;
    (if value & 1 != 0 {
        -((value + 1) >> 1)
    } else {
        value >> 1
    }) as i32
}

/// Reads and skips the extension bundle: a u64 selector bitmap, one u64 size
/// per set bit, then that many bits of payload.
pub fn skip_extensions(br: &mut BitReader) -> Result<()> {
    let selector = read_u64(br)?;
    let mut total_size: u64 = 0;
    for i in 0..64 {
        if (selector & (1u64 << i)) != 0 {
            let size = read_u64(br)?;
            total_size = total_size.checked_add(size).ok_or(Error::SizeOverflow)?;
        }
    }
    let total_size = usize::try_from(total_size).map_err(|_| Error::SizeOverflow)?;
    br.skip_bits(total_size);
    Ok(())
}

#[cfg(test)]
mod test {
    use super::*;
    use crate::bit_writer::BitWriter;

    #[test]
    fn signed_pack_roundtrip() {
        for v in [0i32, 1, -1, 2, -2, 1000, -1000, i32::MAX, i32::MIN] {
            assert_eq!(unpack_signed(pack_signed(v)), v);
        }
        arbtest::arbtest(|u| {
            let v: i32 = u.arbitrary()?;
            assert_eq!(unpack_signed(pack_signed(v)), v);
            Ok(())
        });
    }

    #[test]
    fn signed_pack_order() {
        assert_eq!(pack_signed(0), 0);
        assert_eq!(pack_signed(-1), 1);
        assert_eq!(pack_signed(1), 2);
        assert_eq!(pack_signed(-2), 3);
        assert_eq!(pack_signed(2), 4);
    }

    #[test]
    fn u64_selector_2() -> crate::error::Result<()> {
        // selector=2, bits=100 -> 117.
        let mut bw = BitWriter::new();
        bw.write(2, 2);
        bw.write(8, 100);
        let bytes = bw.into_bytes();
        let mut br = BitReader::new(&bytes);
        assert_eq!(read_u64(&mut br)?, 117);
        Ok(())
    }

    #[test]
    fn u64_large() -> crate::error::Result<()> {
        let mut bw = BitWriter::new();
        bw.write(2, 3);
        bw.write(12, 0xabc);
        bw.write(1, 1);
        bw.write(8, 0xde);
        bw.write(1, 0);
        let bytes = bw.into_bytes();
        let mut br = BitReader::new(&bytes);
        assert_eq!(read_u64(&mut br)?, 0xdeabc);
        Ok(())
    }

    #[test]
    fn f16_one() -> crate::error::Result<()> {
        let bytes = 0x3c00u16.to_le_bytes();
        let mut br = BitReader::new(&bytes);
        assert_eq!(read_f16(&mut br)?, 1.0);
        Ok(())
    }

    #[test]
    fn f16_infinity_rejected() {
        let bytes = 0x7c00u16.to_le_bytes();
        let mut br = BitReader::new(&bytes);
        assert!(read_f16(&mut br).is_err());
    }

    #[test]
    fn u32_select() -> crate::error::Result<()> {
        let d = [
            U32::Val(0),
            U32::Bits(4),
            U32::BitsOffset { n: 5, off: 16 },
            U32::BitsOffset { n: 10, off: 48 },
        ];
        let mut bw = BitWriter::new();
        bw.write(2, 2);
        bw.write(5, 7);
        let bytes = bw.into_bytes();
        let mut br = BitReader::new(&bytes);
        assert_eq!(read_u32(&mut br, d)?, 23);
        Ok(())
    }
}
