// Copyright (c) the JPEG XL Project Authors. All rights reserved.
//
// Use of this source code is governed by a BSD-style
// license that can be found in the LICENSE file.

use num_derive::FromPrimitive;
use num_traits::FromPrimitive;

use crate::bit_reader::BitReader;
use crate::error::Result;
use crate::headers::encodings::{read_bool, read_u32, U32};

#[derive(Copy, Clone, PartialEq, Debug, FromPrimitive)]
enum AspectRatio {
    Unknown = 0,
    Ratio1Over1 = 1,
    Ratio12Over10 = 2,
    Ratio4Over3 = 3,
    Ratio3Over2 = 4,
    Ratio16Over9 = 5,
    Ratio5Over4 = 6,
    Ratio2Over1 = 7,
}

fn map_aspect_ratio(ysize: u32, ratio: AspectRatio) -> u32 {
    match ratio {
        AspectRatio::Unknown => unreachable!("xsize of an unknown ratio is read explicitly"),
        AspectRatio::Ratio1Over1 => ysize,
        AspectRatio::Ratio12Over10 => (ysize as u64 * 12 / 10) as u32,
        AspectRatio::Ratio4Over3 => (ysize as u64 * 4 / 3) as u32,
        AspectRatio::Ratio3Over2 => (ysize as u64 * 3 / 2) as u32,
        AspectRatio::Ratio16Over9 => (ysize as u64 * 16 / 9) as u32,
        AspectRatio::Ratio5Over4 => (ysize as u64 * 5 / 4) as u32,
        AspectRatio::Ratio2Over1 => ysize * 2,
    }
}

const LARGE_SIZE_DISTRIBUTIONS: [U32; 4] = [
    U32::BitsOffset { n: 9, off: 1 },
    U32::BitsOffset { n: 13, off: 1 },
    U32::BitsOffset { n: 18, off: 1 },
    U32::BitsOffset { n: 30, off: 1 },
];

/// The image dimensions, from the start of the codestream.
#[derive(Debug)]
pub struct SizeHeader {
    xsize: u32,
    ysize: u32,
}

impl SizeHeader {
    pub fn read(br: &mut BitReader) -> Result<SizeHeader> {
        let small = read_bool(br)?;
        let ysize = if small {
            8 * (br.read(5)? as u32 + 1)
        } else {
            read_u32(br, LARGE_SIZE_DISTRIBUTIONS)?
        };
        let ratio = AspectRatio::from_u64(br.read(3)?).unwrap();
        let xsize = if ratio == AspectRatio::Unknown {
            if small {
                8 * (br.read(5)? as u32 + 1)
            } else {
                read_u32(br, LARGE_SIZE_DISTRIBUTIONS)?
            }
        } else {
            map_aspect_ratio(ysize, ratio)
        };
        Ok(SizeHeader { xsize, ysize })
    }

    pub fn xsize(&self) -> u32 {
        self.xsize
    }

    pub fn ysize(&self) -> u32 {
        self.ysize
    }
}

#[cfg(test)]
mod test {
    use super::*;
    use crate::bit_writer::BitWriter;

    #[test]
    fn small_square() -> Result<()> {
        // small=1, ysize_div8-1=7 -> 64, ratio=1:1.
        let mut bw = BitWriter::new();
        bw.write(1, 1);
        bw.write(5, 7);
        bw.write(3, 1);
        let bytes = bw.into_bytes();
        let mut br = BitReader::new(&bytes);
        let size = SizeHeader::read(&mut br)?;
        assert_eq!(size.xsize(), 64);
        assert_eq!(size.ysize(), 64);
        Ok(())
    }

    #[test]
    fn large_custom_ratio() -> Result<()> {
        let mut bw = BitWriter::new();
        bw.write(1, 0); // not small
        bw.write(2, 1); // 13-bit selector
        bw.write(13, 499); // ysize = 500
        bw.write(3, 0); // custom ratio
        bw.write(2, 0); // 9-bit selector
        bw.write(9, 319); // xsize = 320
        let bytes = bw.into_bytes();
        let mut br = BitReader::new(&bytes);
        let size = SizeHeader::read(&mut br)?;
        assert_eq!(size.xsize(), 320);
        assert_eq!(size.ysize(), 500);
        Ok(())
    }

    #[test]
    fn ratio_16_9() -> Result<()> {
        let mut bw = BitWriter::new();
        bw.write(1, 1);
        bw.write(5, 17); // ysize = 144
        bw.write(3, 5); // 16:9
        let bytes = bw.into_bytes();
        let mut br = BitReader::new(&bytes);
        let size = SizeHeader::read(&mut br)?;
        assert_eq!(size.ysize(), 144);
        assert_eq!(size.xsize(), 256);
        Ok(())
    }
}
