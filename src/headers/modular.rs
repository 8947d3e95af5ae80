// Copyright (c) the JPEG XL Project Authors. All rights reserved.
//
// Use of this source code is governed by a BSD-style
// license that can be found in the LICENSE file.

use num_derive::FromPrimitive;
use num_traits::FromPrimitive;

use crate::bit_reader::BitReader;
use crate::error::{Error, Result};
use crate::headers::encodings::{read_bool, read_u32, U32};

#[derive(Copy, Clone, PartialEq, Eq, Debug, FromPrimitive)]
pub enum TransformId {
    Rct = 0,
    Palette = 1,
    Squeeze = 2,
    Invalid = 3,
}

const BEGIN_CHANNEL_DISTRIBUTIONS: [U32; 4] = [
    U32::Bits(3),
    U32::BitsOffset { n: 6, off: 8 },
    U32::BitsOffset { n: 10, off: 72 },
    U32::BitsOffset { n: 13, off: 1096 },
];

#[derive(Debug, Clone, Copy)]
pub struct SqueezeParams {
    pub horizontal: bool,
    pub in_place: bool,
    pub begin_channel: u32,
    pub num_channels: u32,
}

impl SqueezeParams {
    fn read(br: &mut BitReader) -> Result<SqueezeParams> {
        Ok(SqueezeParams {
            horizontal: read_bool(br)?,
            in_place: read_bool(br)?,
            begin_channel: read_u32(br, BEGIN_CHANNEL_DISTRIBUTIONS)?,
            num_channels: read_u32(
                br,
                [
                    U32::Val(1),
                    U32::Val(2),
                    U32::Val(3),
                    U32::BitsOffset { n: 4, off: 4 },
                ],
            )?,
        })
    }
}

/// One encoder-side transform, as serialized in the group header. The decoder
/// applies the inverses in reverse order.
#[derive(Debug)]
pub struct Transform {
    pub id: TransformId,
    pub begin_channel: u32,
    pub rct_type: u32,
    pub num_channels: u32,
    pub nb_colors: u32,
    pub nb_deltas: u32,
    pub predictor_id: u32,
    pub squeezes: Vec<SqueezeParams>,
}

impl Transform {
    fn read(br: &mut BitReader) -> Result<Transform> {
        let id = TransformId::from_u64(br.read(2)?).unwrap();
        let mut transform = Transform {
            id,
            begin_channel: 0,
            rct_type: 0,
            num_channels: 0,
            nb_colors: 0,
            nb_deltas: 0,
            predictor_id: 0,
            squeezes: vec![],
        };
        match id {
            TransformId::Rct => {
                transform.begin_channel = read_u32(br, BEGIN_CHANNEL_DISTRIBUTIONS)?;
                transform.rct_type = read_u32(
                    br,
                    [
                        U32::Val(6),
                        U32::Bits(2),
                        U32::BitsOffset { n: 4, off: 2 },
                        U32::BitsOffset { n: 6, off: 10 },
                    ],
                )?;
                if transform.rct_type >= 42 {
                    return Err(Error::InvalidTransform("rct_type out of range"));
                }
            }
            TransformId::Palette => {
                transform.begin_channel = read_u32(br, BEGIN_CHANNEL_DISTRIBUTIONS)?;
                transform.num_channels = read_u32(
                    br,
                    [
                        U32::Val(1),
                        U32::Val(3),
                        U32::Val(4),
                        U32::BitsOffset { n: 13, off: 1 },
                    ],
                )?;
                transform.nb_colors = read_u32(
                    br,
                    [
                        U32::Bits(8),
                        U32::BitsOffset { n: 10, off: 256 },
                        U32::BitsOffset { n: 12, off: 1280 },
                        U32::BitsOffset { n: 16, off: 5376 },
                    ],
                )?;
                transform.nb_deltas = read_u32(
                    br,
                    [
                        U32::Val(0),
                        U32::BitsOffset { n: 8, off: 1 },
                        U32::BitsOffset { n: 10, off: 257 },
                        U32::BitsOffset { n: 16, off: 1281 },
                    ],
                )?;
                transform.predictor_id = br.read(4)? as u32;
                if transform.predictor_id >= crate::frame::modular::Predictor::NUM_PREDICTORS {
                    return Err(Error::InvalidPredictor(transform.predictor_id));
                }
            }
            TransformId::Squeeze => {
                let num_squeezes = read_u32(
                    br,
                    [
                        U32::Val(0),
                        U32::BitsOffset { n: 4, off: 1 },
                        U32::BitsOffset { n: 6, off: 9 },
                        U32::BitsOffset { n: 8, off: 41 },
                    ],
                )?;
                transform.squeezes = (0..num_squeezes)
                    .map(|_| SqueezeParams::read(br))
                    .collect::<Result<_>>()?;
            }
            TransformId::Invalid => {
                return Err(Error::InvalidTransform("reserved transform id"));
            }
        }
        Ok(transform)
    }
}

/// Weighted predictor parameters; `all_default` selects the canonical
/// constants.
#[derive(Debug, Clone)]
pub struct WeightedHeader {
    pub p1: u32,
    pub p2: u32,
    pub p3a: u32,
    pub p3b: u32,
    pub p3c: u32,
    pub p3d: u32,
    pub p3e: u32,
    pub w: [u32; 4],
}

impl Default for WeightedHeader {
    fn default() -> Self {
        WeightedHeader {
            p1: 16,
            p2: 10,
            p3a: 7,
            p3b: 7,
            p3c: 7,
            p3d: 0,
            p3e: 0,
            w: [13, 12, 12, 12],
        }
    }
}

impl WeightedHeader {
    pub fn read(br: &mut BitReader) -> Result<WeightedHeader> {
        if read_bool(br)? {
            return Ok(WeightedHeader::default());
        }
        Ok(WeightedHeader {
            p1: br.read(5)? as u32,
            p2: br.read(5)? as u32,
            p3a: br.read(5)? as u32,
            p3b: br.read(5)? as u32,
            p3c: br.read(5)? as u32,
            p3d: br.read(5)? as u32,
            p3e: br.read(5)? as u32,
            w: [
                br.read(4)? as u32,
                br.read(4)? as u32,
                br.read(4)? as u32,
                br.read(4)? as u32,
            ],
        })
    }
}

/// Header of one modular sub-bitstream.
#[derive(Debug)]
pub struct GroupHeader {
    pub use_global_tree: bool,
    pub wp_header: WeightedHeader,
    pub transforms: Vec<Transform>,
}

impl GroupHeader {
    pub fn read(br: &mut BitReader) -> Result<GroupHeader> {
        let use_global_tree = read_bool(br)?;
        let wp_header = WeightedHeader::read(br)?;
        let num_transforms = read_u32(
            br,
            [
                U32::Val(0),
                U32::Val(1),
                U32::BitsOffset { n: 4, off: 2 },
                U32::BitsOffset { n: 8, off: 18 },
            ],
        )?;
        let transforms = (0..num_transforms)
            .map(|_| Transform::read(br))
            .collect::<Result<_>>()?;
        Ok(GroupHeader {
            use_global_tree,
            wp_header,
            transforms,
        })
    }
}

#[cfg(test)]
mod test {
    use super::*;
    use crate::bit_writer::BitWriter;

    #[test]
    fn minimal_group_header() -> Result<()> {
        let mut bw = BitWriter::new();
        bw.write(1, 1); // use_global_tree
        bw.write(1, 1); // wp all_default
        bw.write(2, 0); // no transforms
        let bytes = bw.into_bytes();
        let mut br = BitReader::new(&bytes);
        let header = GroupHeader::read(&mut br)?;
        assert!(header.use_global_tree);
        assert_eq!(header.wp_header.p1, 16);
        assert!(header.transforms.is_empty());
        Ok(())
    }

    #[test]
    fn rct_transform_header() -> Result<()> {
        let mut bw = BitWriter::new();
        bw.write(1, 0);
        bw.write(1, 1);
        bw.write(2, 1); // one transform
        bw.write(2, 0); // RCT
        bw.write(2, 0); // begin_channel selector: 3 bits
        bw.write(3, 0); // begin_channel = 0
        bw.write(2, 0); // rct_type = 6 (YCoCg)
        let bytes = bw.into_bytes();
        let mut br = BitReader::new(&bytes);
        let header = GroupHeader::read(&mut br)?;
        assert_eq!(header.transforms.len(), 1);
        assert_eq!(header.transforms[0].id, TransformId::Rct);
        assert_eq!(header.transforms[0].rct_type, 6);
        Ok(())
    }
}
