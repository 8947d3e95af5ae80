// Copyright (c) the JPEG XL Project Authors. All rights reserved.
//
// Use of this source code is governed by a BSD-style
// license that can be found in the LICENSE file.

use num_derive::FromPrimitive;
use num_traits::FromPrimitive;

use crate::bit_reader::BitReader;
use crate::error::{Error, Result};
use crate::headers::encodings::{read_bool, read_f16, read_u32, skip_extensions, U32};
use crate::GROUP_DIM;

#[derive(Copy, Clone, PartialEq, Eq, Debug, FromPrimitive)]
pub enum FrameType {
    RegularFrame = 0,
    LfFrame = 1,
    ReferenceOnly = 2,
    SkipProgressive = 3,
}

#[derive(Copy, Clone, PartialEq, Eq, Debug, FromPrimitive)]
pub enum Encoding {
    VarDct = 0,
    Modular = 1,
}

/// Restoration filter parameters (Gaborish and EPF).
#[derive(Debug, Clone)]
pub struct LoopFilter {
    pub gab: bool,
    pub gab_x_weight1: f32,
    pub gab_x_weight2: f32,
    pub gab_y_weight1: f32,
    pub gab_y_weight2: f32,
    pub gab_b_weight1: f32,
    pub gab_b_weight2: f32,
    pub epf_iters: u32,
    pub epf_sharp_lut: [f32; 8],
    pub epf_channel_scale: [f32; 3],
    pub epf_quant_mul: f32,
    pub epf_pass0_sigma_scale: f32,
    pub epf_pass2_sigma_scale: f32,
    pub epf_border_sad_mul: f32,
    pub epf_sigma_for_modular: f32,
}

impl Default for LoopFilter {
    fn default() -> Self {
        let mut epf_sharp_lut = [0.0f32; 8];
        for (i, v) in epf_sharp_lut.iter_mut().enumerate() {
            *v = i as f32 / 7.0;
        }
        LoopFilter {
            gab: true,
            gab_x_weight1: 0.115169525,
            gab_x_weight2: 0.061248592,
            gab_y_weight1: 0.115169525,
            gab_y_weight2: 0.061248592,
            gab_b_weight1: 0.115169525,
            gab_b_weight2: 0.061248592,
            epf_iters: 2,
            epf_sharp_lut,
            epf_channel_scale: [40.0, 5.0, 3.5],
            epf_quant_mul: 0.46,
            epf_pass0_sigma_scale: 0.9,
            epf_pass2_sigma_scale: 6.5,
            epf_border_sad_mul: 2.0 / 3.0,
            epf_sigma_for_modular: 1.0,
        }
    }
}

impl LoopFilter {
    pub fn read(br: &mut BitReader) -> Result<LoopFilter> {
        let mut lf = LoopFilter::default();
        if read_bool(br)? {
            return Ok(lf);
        }
        lf.gab = read_bool(br)?;
        if lf.gab && read_bool(br)? {
            // Custom Gaborish weights.
            lf.gab_x_weight1 = read_f16(br)?;
            lf.gab_x_weight2 = read_f16(br)?;
            lf.gab_y_weight1 = read_f16(br)?;
            lf.gab_y_weight2 = read_f16(br)?;
            lf.gab_b_weight1 = read_f16(br)?;
            lf.gab_b_weight2 = read_f16(br)?;
        }
        lf.epf_iters = br.read(2)? as u32;
        if lf.epf_iters > 0 {
            if read_bool(br)? {
                for v in lf.epf_sharp_lut.iter_mut() {
                    *v = read_f16(br)?;
                }
            }
            if read_bool(br)? {
                for v in lf.epf_channel_scale.iter_mut() {
                    *v = read_f16(br)?;
                }
            }
            if read_bool(br)? {
                lf.epf_quant_mul = read_f16(br)?;
                lf.epf_pass0_sigma_scale = read_f16(br)?;
                lf.epf_pass2_sigma_scale = read_f16(br)?;
                lf.epf_border_sad_mul = read_f16(br)?;
                lf.epf_sigma_for_modular = read_f16(br)?;
            }
        }
        skip_extensions(br)?;
        Ok(lf)
    }
}

/// Per-frame parameters driving the decoder and the render pipeline.
#[derive(Debug)]
pub struct FrameHeader {
    pub frame_type: FrameType,
    pub encoding: Encoding,
    pub do_ycbcr: bool,
    pub upsampling: u32,
    pub loop_filter: LoopFilter,
    pub is_last: bool,
}

impl Default for FrameHeader {
    fn default() -> Self {
        FrameHeader {
            frame_type: FrameType::RegularFrame,
            encoding: Encoding::VarDct,
            do_ycbcr: false,
            upsampling: 1,
            loop_filter: LoopFilter::default(),
            is_last: true,
        }
    }
}

impl FrameHeader {
    pub fn read(br: &mut BitReader) -> Result<FrameHeader> {
        let all_default = read_bool(br)?;
        if all_default {
            return Ok(FrameHeader::default());
        }
        let frame_type = FrameType::from_u64(br.read(2)?).unwrap();
        let encoding = Encoding::from_u64(br.read(1)?).unwrap();
        let flags = crate::headers::encodings::read_u64(br)?;
        if flags != 0 {
            return Err(Error::Unsupported("frame flags"));
        }
        let do_ycbcr = read_bool(br)?;
        let upsampling = read_u32(
            br,
            [U32::Val(1), U32::Val(2), U32::Val(4), U32::Val(8)],
        )?;
        let loop_filter = LoopFilter::read(br)?;
        let is_last = read_bool(br)?;
        skip_extensions(br)?;
        Ok(FrameHeader {
            frame_type,
            encoding,
            do_ycbcr,
            upsampling,
            loop_filter,
            is_last,
        })
    }

    /// Number of groups covering a frame of the given size.
    pub fn num_groups(xsize: usize, ysize: usize) -> usize {
        xsize.div_ceil(GROUP_DIM) * ysize.div_ceil(GROUP_DIM)
    }
}

#[cfg(test)]
mod test {
    use super::*;

    #[test]
    fn all_default() -> Result<()> {
        let mut br = BitReader::new(&[1]);
        let header = FrameHeader::read(&mut br)?;
        assert_eq!(header.frame_type, FrameType::RegularFrame);
        assert_eq!(header.encoding, Encoding::VarDct);
        assert!(header.is_last);
        Ok(())
    }

    #[test]
    fn loop_filter_defaults() -> Result<()> {
        let mut br = BitReader::new(&[1]);
        let lf = LoopFilter::read(&mut br)?;
        assert!(lf.gab);
        assert_eq!(lf.epf_iters, 2);
        assert_eq!(lf.epf_sharp_lut[7], 1.0);
        Ok(())
    }
}
