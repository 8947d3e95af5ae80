// Copyright (c) the JPEG XL Project Authors. All rights reserved.
//
// Use of this source code is governed by a BSD-style
// license that can be found in the LICENSE file.

use crate::error::{Error, Result};
use crate::render::{ChannelMode, RenderPipelineStage};

/// Default 2x kernel weights (the upper triangle of the 5x5 quadrant).
#[allow(clippy::excessive_precision)]
const DEFAULT_WEIGHTS_2: [f32; 15] = [
    -0.01716200, -0.03452303, -0.04022174, -0.02921014, -0.00624645, 0.14111091, 0.28896755,
    0.00278718, -0.01610267, 0.56661550, 0.03777607, -0.01986694, -0.03144731, -0.01185068,
    -0.00213539,
];

/// Upsamples one channel 2x/4x/8x: every output pixel is a 5x5 convolution of
/// the input, with a kernel selected by the output phase, clamped to the local
/// input range to avoid ringing.
pub struct UpsampleStage {
    channel: usize,
    factor_log2: usize,
    // kernels[dy][dx] is the 5x5 kernel of output phase (dx, dy).
    kernels: Vec<Vec<[[f32; 5]; 5]>>,
}

impl UpsampleStage {
    pub fn new(factor: u32, channel: usize) -> Result<UpsampleStage> {
        match factor {
            2 => Ok(Self::with_weights(2, channel, &DEFAULT_WEIGHTS_2)),
            4 | 8 => Err(Error::Unsupported(
                "default 4x/8x upsampling weights; supply custom weights",
            )),
            _ => Err(Error::InvalidEnum(factor, "upsampling factor")),
        }
    }

    /// Builds the kernel set from the triangular weight layout: weights store
    /// one quadrant of the phase space, mirrored into the other three.
    pub fn with_weights(factor: u32, channel: usize, weights: &[f32]) -> UpsampleStage {
        let n = factor as usize;
        let half = n / 2;
        debug_assert_eq!(weights.len(), {
            let m = 5 * half;
            m * (m + 1) / 2
        });
        let mut kernels = vec![vec![[[0.0f32; 5]; 5]; n]; n];
        for i in 0..5 * half {
            for j in 0..5 * half {
                let y = i.min(j);
                let x = i.max(j);
                let index = (5 * half * y).wrapping_sub(y * (y.wrapping_sub(1)) / 2) + x - y;
                let weight = weights[index];
                kernels[j / 5][i / 5][j % 5][i % 5] = weight;
                kernels[n - 1 - j / 5][i / 5][4 - j % 5][i % 5] = weight;
                kernels[j / 5][n - 1 - i / 5][j % 5][4 - i % 5] = weight;
                kernels[n - 1 - j / 5][n - 1 - i / 5][4 - j % 5][4 - i % 5] = weight;
            }
        }
        UpsampleStage {
            channel,
            factor_log2: (factor as usize).trailing_zeros() as usize,
            kernels,
        }
    }
}

impl std::fmt::Display for UpsampleStage {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let n = 1 << self.factor_log2;
        write!(f, "{n}x{n} upsampling of channel {}", self.channel)
    }
}

impl RenderPipelineStage for UpsampleStage {
    fn channel_mode(&self, c: usize) -> ChannelMode {
        if c == self.channel {
            ChannelMode::InOut
        } else {
            ChannelMode::Ignored
        }
    }

    fn border(&self) -> (usize, usize) {
        (2, 2)
    }

    fn shift(&self) -> usize {
        self.factor_log2
    }

    fn process_row(
        &self,
        _position: (usize, usize),
        xsize: usize,
        input_rows: &[Vec<&[f32]>],
        output_rows: &mut [Vec<&mut [f32]>],
        _thread_id: usize,
    ) -> Result<()> {
        let n = 1usize << self.factor_log2;
        let rows = &input_rows[0];
        for x in 0..xsize {
            // Range of the 5x5 input window, for the anti-ringing clamp.
            let mut min = f32::INFINITY;
            let mut max = f32::NEG_INFINITY;
            for row in rows.iter() {
                for dx in 0..5 {
                    min = min.min(row[x + dx]);
                    max = max.max(row[x + dx]);
                }
            }
            for dy in 0..n {
                for dx in 0..n {
                    let kernel = &self.kernels[dy][dx];
                    let mut sum = 0.0f32;
                    for (ky, row) in rows.iter().enumerate() {
                        for kx in 0..5 {
                            sum += row[x + kx] * kernel[ky][kx];
                        }
                    }
                    output_rows[0][dy][x * n + dx] = sum.clamp(min, max);
                }
            }
        }
        Ok(())
    }
}

#[cfg(test)]
mod test {
    use super::*;
    use crate::image::Image;
    use crate::render::test::run_single_stage;
    use crate::util::test::{assert_all_almost_eq, assert_almost_eq};

    #[test]
    fn default_kernel_has_unit_gain() {
        // Each phase kernel must sum to ~1 so constant images stay constant.
        let stage = UpsampleStage::new(2, 0).unwrap();
        for dy in 0..2 {
            for dx in 0..2 {
                let sum: f32 = stage.kernels[dy][dx]
                    .iter()
                    .flat_map(|row| row.iter())
                    .sum();
                assert_almost_eq(sum, 1.0, 1e-5);
            }
        }
    }

    #[test]
    fn doubles_dimensions() -> Result<()> {
        let mut channels = vec![Image::new_with_value(4, 3, 0.5f32)?];
        run_single_stage(UpsampleStage::new(2, 0)?, &mut channels)?;
        assert_eq!(channels[0].size(), (8, 6));
        for y in 0..6 {
            assert_all_almost_eq(channels[0].row(y), &[0.5; 8], 1e-5);
        }
        Ok(())
    }

    #[test]
    fn unsupported_factors_report() {
        assert!(UpsampleStage::new(4, 0).is_err());
        assert!(UpsampleStage::new(3, 0).is_err());
    }
}
