// Copyright (c) the JPEG XL Project Authors. All rights reserved.
//
// Use of this source code is governed by a BSD-style
// license that can be found in the LICENSE file.

use std::sync::Arc;

use crate::error::Result;
use crate::headers::frame_header::LoopFilter;
use crate::image::Image;
use crate::render::{ChannelMode, RenderPipelineStage};
use crate::util::mirror;
use crate::{BLOCK_DIM, MIN_SIGMA, SIGMA_PADDING};

/// Numerator of the stored inverse sigma; negative so that larger smoothing
/// strengths are more negative and the weight formula stays a single fma.
#[allow(clippy::excessive_precision)]
pub const INV_SIGMA_NUM: f32 = -1.1715728752538099;

/// Builds the per-block sigma image from the quant field and sharpness map,
/// with `SIGMA_PADDING` blocks of mirror padding on every side. Each entry
/// stores `INV_SIGMA_NUM / sigma` for its block.
pub fn compute_sigma(
    quant_field: &Image<i32>,
    sharpness: &Image<i32>,
    inv_global_scale: f32,
    lf: &LoopFilter,
) -> Result<Image<f32>> {
    let (bw, bh) = quant_field.size();
    debug_assert_eq!(quant_field.size(), sharpness.size());
    let mut sigma = Image::<f32>::new(bw + 2 * SIGMA_PADDING, bh + 2 * SIGMA_PADDING)?;
    for by in 0..bh + 2 * SIGMA_PADDING {
        let sy = mirror(by as i64 - SIGMA_PADDING as i64, bh);
        for bx in 0..bw + 2 * SIGMA_PADDING {
            let sx = mirror(bx as i64 - SIGMA_PADDING as i64, bw);
            let quant = quant_field.row(sy)[sx].max(1) as f32;
            let sharp = sharpness.row(sy)[sx].clamp(0, 7) as usize;
            let quant_step = lf.epf_quant_mul * inv_global_scale * quant;
            let sigma_value = quant_step * lf.epf_sharp_lut[sharp];
            sigma.row_mut(by)[bx] = if sigma_value > 0.0 {
                INV_SIGMA_NUM / sigma_value
            } else {
                f32::NEG_INFINITY
            };
        }
    }
    Ok(sigma)
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EpfPass {
    /// 5x5 plus-shaped kernel with windowed SADs; only used with 3 passes.
    Pass0,
    /// 3x3 plus-shaped kernel with windowed SADs.
    Pass1,
    /// 3x3 plus-shaped kernel with direct sample differences.
    Pass2,
}

/// Edge-preserving filter: weighted average of the plus-shaped neighborhood,
/// with weights decaying in the per-block sigma.
pub struct EpfStage {
    pass: EpfPass,
    lf: LoopFilter,
    sigma: Arc<Image<f32>>,
}

impl EpfStage {
    pub fn new(pass: EpfPass, lf: LoopFilter, sigma: Arc<Image<f32>>) -> EpfStage {
        EpfStage { pass, lf, sigma }
    }

    fn sigma_scale(&self) -> f32 {
        match self.pass {
            EpfPass::Pass0 => self.lf.epf_pass0_sigma_scale,
            EpfPass::Pass1 => 1.0,
            EpfPass::Pass2 => self.lf.epf_pass2_sigma_scale,
        }
    }

    /// Kernel taps: offsets with |dx| + |dy| <= 1 (or <= 2 for pass 0),
    /// center excluded.
    fn kernel(&self) -> &'static [(i64, i64)] {
        const PLUS_3X3: [(i64, i64); 4] = [(0, -1), (-1, 0), (1, 0), (0, 1)];
        const PLUS_5X5: [(i64, i64); 12] = [
            (0, -2),
            (-1, -1),
            (0, -1),
            (1, -1),
            (-2, 0),
            (-1, 0),
            (1, 0),
            (2, 0),
            (-1, 1),
            (0, 1),
            (1, 1),
            (0, 2),
        ];
        match self.pass {
            EpfPass::Pass0 => &PLUS_5X5,
            EpfPass::Pass1 | EpfPass::Pass2 => &PLUS_3X3,
        }
    }

    /// Sum of absolute differences between the 3x3-plus windows centered on
    /// the two positions, over the three channels with their scales.
    fn windowed_sad(
        &self,
        input_rows: &[Vec<&[f32]>],
        center: (usize, usize),
        other: (i64, i64),
        border: usize,
    ) -> f32 {
        const WINDOW: [(i64, i64); 5] = [(0, -1), (-1, 0), (0, 0), (1, 0), (0, 1)];
        let mut sad = 0.0f32;
        for (rows, scale) in input_rows.iter().zip(self.lf.epf_channel_scale) {
            let mut channel_sad = 0.0f32;
            for (dx, dy) in WINDOW {
                let center_v = rows[(center.1 as i64 + dy + border as i64) as usize]
                    [(center.0 as i64 + dx) as usize];
                let other_v = rows[(other.1 + dy + border as i64) as usize]
                    [(other.0 + dx) as usize];
                channel_sad += (center_v - other_v).abs();
            }
            sad += channel_sad * scale;
        }
        sad
    }

    /// Direct absolute difference between the two positions.
    fn direct_sad(
        &self,
        input_rows: &[Vec<&[f32]>],
        center: (usize, usize),
        other: (i64, i64),
        border: usize,
    ) -> f32 {
        let mut sad = 0.0f32;
        for (rows, scale) in input_rows.iter().zip(self.lf.epf_channel_scale) {
            let center_v = rows[center.1 + border][center.0];
            let other_v = rows[(other.1 + border as i64) as usize][other.0 as usize];
            sad += (center_v - other_v).abs() * scale;
        }
        sad
    }
}

impl std::fmt::Display for EpfStage {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "EPF {:?}", self.pass)
    }
}

impl RenderPipelineStage for EpfStage {
    fn channel_mode(&self, c: usize) -> ChannelMode {
        if c < 3 {
            ChannelMode::InOut
        } else {
            ChannelMode::Ignored
        }
    }

    fn border(&self) -> (usize, usize) {
        match self.pass {
            EpfPass::Pass0 => (3, 3),
            EpfPass::Pass1 => (2, 2),
            EpfPass::Pass2 => (1, 1),
        }
    }

    fn process_row(
        &self,
        position: (usize, usize),
        xsize: usize,
        input_rows: &[Vec<&[f32]>],
        output_rows: &mut [Vec<&mut [f32]>],
        _thread_id: usize,
    ) -> Result<()> {
        let (xpos, ypos) = position;
        let (border_x, border_y) = self.border();
        let row_sigma = self.sigma.row(ypos / BLOCK_DIM + SIGMA_PADDING);

        let scaled = self.sigma_scale() * 1.65;
        let border_mul = scaled * self.lf.epf_border_sad_mul;
        let row_at_block_edge = ypos % BLOCK_DIM == 0 || ypos % BLOCK_DIM == BLOCK_DIM - 1;

        for x in 0..xsize {
            let sigma = row_sigma[(x + xpos + SIGMA_PADDING * BLOCK_DIM) / BLOCK_DIM];
            if sigma < MIN_SIGMA {
                for (rows_in, rows_out) in input_rows.iter().zip(output_rows.iter_mut()) {
                    rows_out[0][x] = rows_in[border_y][x + border_x];
                }
                continue;
            }
            let col_at_block_edge =
                (x + xpos) % BLOCK_DIM == 0 || (x + xpos) % BLOCK_DIM == BLOCK_DIM - 1;
            let sad_mul = if row_at_block_edge || col_at_block_edge {
                border_mul
            } else {
                scaled
            };

            let center = (x + border_x, 0usize);
            let mut weight_sum = 1.0f32;
            let mut sums = [0.0f32; 3];
            for (c, rows_in) in input_rows.iter().enumerate() {
                sums[c] = rows_in[border_y][x + border_x];
            }
            for &(dx, dy) in self.kernel() {
                let other = (center.0 as i64 + dx, dy);
                let sad = match self.pass {
                    EpfPass::Pass0 | EpfPass::Pass1 => {
                        self.windowed_sad(input_rows, (center.0, 0), other, border_y)
                    }
                    EpfPass::Pass2 => self.direct_sad(input_rows, (center.0, 0), other, border_y),
                };
                let weight = (sad * sad_mul).mul_add(sigma, 1.0).max(0.0);
                weight_sum += weight;
                for (c, rows_in) in input_rows.iter().enumerate() {
                    sums[c] +=
                        weight * rows_in[(dy + border_y as i64) as usize][(center.0 as i64 + dx) as usize];
                }
            }
            let inv = 1.0 / weight_sum;
            for (c, rows_out) in output_rows.iter_mut().enumerate() {
                rows_out[0][x] = sums[c] * inv;
            }
        }
        Ok(())
    }
}

#[cfg(test)]
mod test {
    use super::*;
    use crate::render::test::run_single_stage;
    use crate::util::test::assert_all_almost_eq;

    fn flat_sigma(bw: usize, bh: usize, value: f32) -> Arc<Image<f32>> {
        Arc::new(
            Image::new_with_value(bw + 2 * SIGMA_PADDING, bh + 2 * SIGMA_PADDING, value).unwrap(),
        )
    }

    #[test]
    fn constant_image_is_fixed_point() -> Result<()> {
        let mut channels = vec![
            Image::new_with_value(16, 16, 0.25f32)?,
            Image::new_with_value(16, 16, 0.5f32)?,
            Image::new_with_value(16, 16, 0.75f32)?,
        ];
        let stage = EpfStage::new(EpfPass::Pass1, LoopFilter::default(), flat_sigma(2, 2, -0.5));
        run_single_stage(stage, &mut channels)?;
        for (c, want) in [0.25f32, 0.5, 0.75].iter().enumerate() {
            for y in 0..16 {
                assert_all_almost_eq(channels[c].row(y), &[*want; 16], 1e-5);
            }
        }
        Ok(())
    }

    #[test]
    fn disabled_sigma_is_identity() -> Result<()> {
        let mut image = Image::new(8, 8)?;
        for y in 0..8 {
            for x in 0..8 {
                image.row_mut(y)[x] = (x * y) as f32 / 64.0;
            }
        }
        let reference = image.clone();
        let mut channels = vec![image.clone(), image.clone(), image];
        // Sigma below MIN_SIGMA disables smoothing entirely.
        let stage = EpfStage::new(
            EpfPass::Pass2,
            LoopFilter::default(),
            flat_sigma(1, 1, MIN_SIGMA * 2.0),
        );
        run_single_stage(stage, &mut channels)?;
        for c in 0..3 {
            for y in 0..8 {
                assert_all_almost_eq(channels[c].row(y), reference.row(y), 0.0);
            }
        }
        Ok(())
    }

    #[test]
    fn sigma_image_has_padding() -> Result<()> {
        let quant = Image::new_with_value(2, 2, 8i32)?;
        let sharp = Image::new_with_value(2, 2, 7i32)?;
        let sigma = compute_sigma(&quant, &sharp, 1.0, &LoopFilter::default())?;
        assert_eq!(
            sigma.size(),
            (2 + 2 * SIGMA_PADDING, 2 + 2 * SIGMA_PADDING)
        );
        // Mirror padding: corners replicate the nearest block.
        assert_eq!(sigma.row(0)[0], sigma.row(SIGMA_PADDING)[SIGMA_PADDING]);
        // Values are negative inverse sigmas.
        assert!(sigma.row(0)[0] < 0.0);
        Ok(())
    }
}
