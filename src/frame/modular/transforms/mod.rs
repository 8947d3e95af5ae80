// Copyright (c) the JPEG XL Project Authors. All rights reserved.
//
// Use of this source code is governed by a BSD-style
// license that can be found in the LICENSE file.

mod palette;
mod rct;
mod squeeze;

pub use palette::*;
pub use rct::*;
pub use squeeze::*;

use num_traits::FromPrimitive;
use tracing::trace;

use super::{ModularChannel, ModularImage, Predictor};
use crate::error::{Error, Result};
use crate::headers::modular::{SqueezeParams, Transform, TransformId};

/// A transform recorded while reshaping the channel list, with the data
/// needed to run its inverse after sample decode.
#[derive(Debug)]
pub enum TransformStep {
    Rct {
        begin: usize,
        op: RctOp,
        perm: RctPermutation,
    },
    Palette {
        begin: usize,
        num_channels: usize,
        nb_colors: usize,
        nb_deltas: usize,
        predictor: Predictor,
    },
    Squeeze {
        steps: Vec<SqueezeParams>,
    },
}

fn check_equal_channels(img: &ModularImage, first: usize, num: usize) -> Result<()> {
    if first + num > img.channels.len() {
        return Err(Error::InvalidChannelRange(
            first,
            first + num,
            img.channels.len(),
        ));
    }
    for inc in 1..num {
        if !img.channels[first].same_shape(&img.channels[first + inc]) {
            return Err(Error::MixingDifferentChannels);
        }
    }
    Ok(())
}

/// Applies the encoder-side (forward) channel-list effects of the transforms,
/// so that the coded channels have the right shapes, and records the inverse
/// steps.
pub fn meta_apply_transforms(
    img: &mut ModularImage,
    transforms: &[Transform],
) -> Result<Vec<TransformStep>> {
    let mut steps = vec![];
    for transform in transforms {
        match transform.id {
            TransformId::Rct => {
                let begin = transform.begin_channel as usize;
                check_equal_channels(img, begin, 3)?;
                let op = RctOp::from_u32(transform.rct_type % 7).unwrap();
                let perm = RctPermutation::from_u32(transform.rct_type / 7).unwrap();
                steps.push(TransformStep::Rct { begin, op, perm });
                trace!(begin, ?op, ?perm, "meta-applied RCT");
            }
            TransformId::Palette => {
                let begin = transform.begin_channel as usize;
                let num_channels = transform.num_channels as usize;
                let nb_colors = transform.nb_colors as usize;
                let nb_deltas = transform.nb_deltas as usize;
                if begin < img.nb_meta_channels {
                    return Err(Error::InvalidTransform("palette of meta channels"));
                }
                check_equal_channels(img, begin, num_channels)?;
                let predictor = Predictor::from_u32(transform.predictor_id).unwrap();
                // The channel range collapses into one index channel, and the
                // palette becomes a new meta channel in front.
                img.channels.drain(begin + 1..begin + num_channels);
                img.channels.insert(
                    0,
                    ModularChannel::new(nb_colors + nb_deltas, num_channels, None)?,
                );
                img.nb_meta_channels += 1;
                steps.push(TransformStep::Palette {
                    begin,
                    num_channels,
                    nb_colors,
                    nb_deltas,
                    predictor,
                });
                trace!(begin, num_channels, nb_colors, "meta-applied palette");
            }
            TransformId::Squeeze => {
                let params = if transform.squeezes.is_empty() {
                    default_squeeze(img)
                } else {
                    transform.squeezes.clone()
                };
                meta_apply_squeeze(img, &params)?;
                steps.push(TransformStep::Squeeze { steps: params });
            }
            TransformId::Invalid => {
                unreachable!("header decoding rejects invalid transforms");
            }
        }
    }
    Ok(steps)
}

/// Runs the inverse transforms, in reverse encode order.
pub fn apply_inverse_transforms(img: &mut ModularImage, steps: &[TransformStep]) -> Result<()> {
    for step in steps.iter().rev() {
        match step {
            TransformStep::Rct { begin, op, perm } => {
                inverse_rct(img, *begin, *op, *perm)?;
            }
            TransformStep::Palette {
                begin,
                num_channels,
                nb_colors,
                nb_deltas,
                predictor,
            } => {
                inverse_palette(img, *begin, *num_channels, *nb_colors, *nb_deltas, *predictor)?;
            }
            TransformStep::Squeeze { steps } => {
                inverse_squeeze(img, steps)?;
            }
        }
    }
    Ok(())
}
