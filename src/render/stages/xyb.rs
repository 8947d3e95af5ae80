// Copyright (c) the JPEG XL Project Authors. All rights reserved.
//
// Use of this source code is governed by a BSD-style
// license that can be found in the LICENSE file.

use crate::color::opsin::{xyb_to_linear_rgb, OpsinParams};
use crate::error::Result;
use crate::headers::image_metadata::OpsinInverseMatrix;
use crate::render::{ChannelMode, RenderPipelineStage};

/// Convert XYB to linear RGB, where 1.0 corresponds to `intensity_target`
/// nits.
pub struct XybToLinearStage {
    first_channel: usize,
    params: OpsinParams,
}

impl XybToLinearStage {
    pub fn new(
        first_channel: usize,
        opsin: &OpsinInverseMatrix,
        intensity_target: f32,
    ) -> Self {
        Self {
            first_channel,
            params: OpsinParams::init(opsin, intensity_target),
        }
    }
}

impl std::fmt::Display for XybToLinearStage {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let channel = self.first_channel;
        write!(
            f,
            "XYB to linear RGB for channels [{},{},{}]",
            channel,
            channel + 1,
            channel + 2
        )
    }
}

impl RenderPipelineStage for XybToLinearStage {
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
        for idx in 0..xsize {
            let [r, g, b] = xyb_to_linear_rgb(
                &self.params,
                input_rows[0][0][idx],
                input_rows[1][0][idx],
                input_rows[2][0][idx],
            );
            output_rows[0][0][idx] = r;
            output_rows[1][0][idx] = g;
            output_rows[2][0][idx] = b;
        }
        Ok(())
    }
}

#[cfg(test)]
mod test {
    use super::*;
    use crate::image::Image;
    use crate::render::test::run_single_stage;
    use crate::util::test::assert_all_almost_eq;

    #[test]
    fn black_stays_black() -> Result<()> {
        let mut channels = vec![Image::new(4, 1)?, Image::new(4, 1)?, Image::new(4, 1)?];
        let stage = XybToLinearStage::new(0, &OpsinInverseMatrix::default(), 255.0);
        run_single_stage(stage, &mut channels)?;
        for c in 0..3 {
            assert_all_almost_eq(channels[c].row(0), &[0.0; 4], 1e-2);
        }
        Ok(())
    }
}
