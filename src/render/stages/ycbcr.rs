// Copyright (c) the JPEG XL Project Authors. All rights reserved.
//
// Use of this source code is governed by a BSD-style
// license that can be found in the LICENSE file.

use crate::error::Result;
use crate::render::{ChannelMode, RenderPipelineStage};

/// Convert YCbCr to RGB.
pub struct YcbcrToRgbStage {
    first_channel: usize,
}

impl YcbcrToRgbStage {
    pub fn new(first_channel: usize) -> Self {
        Self { first_channel }
    }
}

impl std::fmt::Display for YcbcrToRgbStage {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let channel = self.first_channel;
        write!(
            f,
            "YCbCr to RGB for channels [{},{},{}]",
            channel,
            channel + 1,
            channel + 2
        )
    }
}

impl RenderPipelineStage for YcbcrToRgbStage {
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
        // Channels are stored in Cb Y Cr order, mimicking the XYB layout.
        for idx in 0..xsize {
            let cb = input_rows[0][0][idx];
            // Shift Y from [-0.5, 0.5] to [0, 1], matching the JPEG spec.
            let y = input_rows[1][0][idx] + 128.0 / 255.0;
            let cr = input_rows[2][0][idx];

            // Full-range BT.601 as defined by JFIF Clause 7:
            // https://www.itu.int/rec/T-REC-T.871-201105-I/en
            output_rows[0][0][idx] = cr.mul_add(1.402, y);
            output_rows[1][0][idx] = cr.mul_add(
                -0.299 * 1.402 / 0.587,
                cb.mul_add(-0.114 * 1.772 / 0.587, y),
            );
            output_rows[2][0][idx] = cb.mul_add(1.772, y);
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
    fn srgb_primaries() -> Result<()> {
        let mut input_y = Image::new(3, 1)?;
        let mut input_cb = Image::new(3, 1)?;
        let mut input_cr = Image::new(3, 1)?;
        input_y
            .row_mut(0)
            .copy_from_slice(&[-0.20296079, 0.08503921, -0.3879608]);
        input_cb
            .row_mut(0)
            .copy_from_slice(&[-0.16873589, -0.3312641, 0.5]);
        input_cr
            .row_mut(0)
            .copy_from_slice(&[0.5, -0.41868758, -0.08131241]);

        let mut channels = vec![input_cb, input_y, input_cr];
        run_single_stage(YcbcrToRgbStage::new(0), &mut channels)?;

        assert_all_almost_eq(channels[0].row(0), &[1.0, 0.0, 0.0], 1e-6);
        assert_all_almost_eq(channels[1].row(0), &[0.0, 1.0, 0.0], 1e-6);
        assert_all_almost_eq(channels[2].row(0), &[0.0, 0.0, 1.0], 1e-6);
        Ok(())
    }
}
