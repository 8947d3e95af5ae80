// Copyright (c) the JPEG XL Project Authors. All rights reserved.
//
// Use of this source code is governed by a BSD-style
// license that can be found in the LICENSE file.

use crate::error::Result;
use crate::render::{ChannelMode, RenderPipelineStage};

/// Apply Gabor-like filter to a channel: a normalized separable 3x3
/// convolution controlled by two weights.
#[derive(Debug)]
pub struct GaborishStage {
    channel: usize,
    kernel_top_bottom: [f32; 3],
    kernel_center: [f32; 3],
}

impl GaborishStage {
    pub fn new(channel: usize, weight1: f32, weight2: f32) -> Self {
        let weight_total = 1.0 + weight1 * 4.0 + weight2 * 4.0;
        let kernel_top_bottom = [weight2, weight1, weight2].map(|x| x / weight_total);
        let kernel_center = [weight1, 1.0, weight1].map(|x| x / weight_total);
        Self {
            channel,
            kernel_top_bottom,
            kernel_center,
        }
    }
}

impl std::fmt::Display for GaborishStage {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "Gaborish filter for channel {}", self.channel)
    }
}

impl RenderPipelineStage for GaborishStage {
    fn channel_mode(&self, c: usize) -> ChannelMode {
        if c == self.channel {
            ChannelMode::InOut
        } else {
            ChannelMode::Ignored
        }
    }

    fn border(&self) -> (usize, usize) {
        (1, 1)
    }

    fn process_row(
        &self,
        _position: (usize, usize),
        xsize: usize,
        input_rows: &[Vec<&[f32]>],
        output_rows: &mut [Vec<&mut [f32]>],
        _thread_id: usize,
    ) -> Result<()> {
        let rows = &input_rows[0];
        let row_out = &mut output_rows[0][0];
        let kernels = [
            self.kernel_top_bottom,
            self.kernel_center,
            self.kernel_top_bottom,
        ];
        for idx in 0..xsize {
            let mut sum = 0.0f32;
            for (row_in, kernel) in rows.iter().zip(kernels.iter()) {
                for (dx, weight) in kernel.iter().enumerate() {
                    sum += row_in[idx + dx] * weight;
                }
            }
            row_out[idx] = sum;
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
    fn checkerboard() -> Result<()> {
        let mut image = Image::new(2, 2)?;
        image.row_mut(0).copy_from_slice(&[0.0, 1.0]);
        image.row_mut(1).copy_from_slice(&[1.0, 0.0]);
        let mut channels = vec![image];

        let stage = GaborishStage::new(0, 0.115169525, 0.061248592);
        run_single_stage(stage, &mut channels)?;

        assert_all_almost_eq(channels[0].row(0), &[0.20686048, 0.7931395], 1e-6);
        assert_all_almost_eq(channels[0].row(1), &[0.7931395, 0.20686048], 1e-6);
        Ok(())
    }

    #[test]
    fn preserves_constant_image() -> Result<()> {
        let image = Image::new_with_value(5, 3, 0.7f32)?;
        let mut channels = vec![image];
        let stage = GaborishStage::new(0, 0.115169525, 0.061248592);
        run_single_stage(stage, &mut channels)?;
        for y in 0..3 {
            assert_all_almost_eq(channels[0].row(y), &[0.7; 5], 1e-6);
        }
        Ok(())
    }
}
