// Copyright (c) the JPEG XL Project Authors. All rights reserved.
//
// Use of this source code is governed by a BSD-style
// license that can be found in the LICENSE file.

use crate::color::tf::linear_to_srgb;
use crate::error::Result;
use crate::render::{ChannelMode, RenderPipelineStage};

/// Applies the sRGB transfer function to three linear channels.
pub struct FromLinearStage {
    first_channel: usize,
}

impl FromLinearStage {
    pub fn new(first_channel: usize) -> Self {
        Self { first_channel }
    }
}

impl std::fmt::Display for FromLinearStage {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let channel = self.first_channel;
        write!(
            f,
            "linear to sRGB for channels [{},{},{}]",
            channel,
            channel + 1,
            channel + 2
        )
    }
}

impl RenderPipelineStage for FromLinearStage {
    fn channel_mode(&self, c: usize) -> ChannelMode {
        if (self.first_channel..self.first_channel + 3).contains(&c) {
            ChannelMode::InPlace
        } else {
            ChannelMode::Ignored
        }
    }

    fn process_row(
        &self,
        _position: (usize, usize),
        xsize: usize,
        input_rows: &[Vec<&[f32]>],
        output_rows: &mut [Vec<&mut [f32]>],
        _thread_id: usize,
    ) -> Result<()> {
        for c in 0..3 {
            let row_out = &mut output_rows[c][0];
            row_out[..xsize].copy_from_slice(&input_rows[c][0][..xsize]);
            linear_to_srgb(&mut row_out[..xsize]);
        }
        Ok(())
    }
}

#[cfg(test)]
mod test {
    use super::*;
    use crate::color::tf::linear_to_srgb_exact;
    use crate::image::Image;
    use crate::render::test::run_single_stage;
    use crate::util::test::assert_almost_eq;

    #[test]
    fn matches_reference_curve() -> Result<()> {
        let values = [0.0f32, 0.0025, 0.18, 0.5, 1.0];
        let mut channels = vec![Image::new(5, 1)?, Image::new(5, 1)?, Image::new(5, 1)?];
        for c in 0..3 {
            channels[c].row_mut(0).copy_from_slice(&values);
        }
        run_single_stage(FromLinearStage::new(0), &mut channels)?;
        for c in 0..3 {
            for (i, &v) in values.iter().enumerate() {
                assert_almost_eq(channels[c].row(0)[i], linear_to_srgb_exact(v), 1e-3);
            }
        }
        Ok(())
    }
}
