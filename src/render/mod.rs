// Copyright (c) the JPEG XL Project Authors. All rights reserved.
//
// Use of this source code is governed by a BSD-style
// license that can be found in the LICENSE file.

pub mod stages;

use std::fmt::Display;
use std::sync::Arc;

use tracing::debug;

use crate::error::{Error, Result};
use crate::headers::frame_header::FrameHeader;
use crate::headers::image_metadata::ImageMetadata;
use crate::image::Image;
use crate::util::mirror;

/// How a stage touches one channel.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ChannelMode {
    /// Read and written, same dimensions.
    InPlace,
    /// Read with borders, written possibly upsampled.
    InOut,
    /// Read only.
    Input,
    /// Written only.
    Output,
    /// Not touched by this stage.
    Ignored,
}

/// One render-pipeline stage: a pure function of its declared input rows and
/// static parameters.
///
/// Stages are driven row by row; `process_row` may be called concurrently on
/// disjoint `(ypos, thread_id)` pairs.
pub trait RenderPipelineStage: Display {
    fn channel_mode(&self, c: usize) -> ChannelMode;

    /// Extra input samples needed on each side, horizontally and vertically.
    fn border(&self) -> (usize, usize) {
        (0, 0)
    }

    /// log2 of the upsampling factor applied by this stage.
    fn shift(&self) -> usize {
        0
    }

    /// Processes one row. `input_rows[i]` holds `2 * border.1 + 1` rows of
    /// `xsize + 2 * border.0` samples for the i-th used channel;
    /// `output_rows[i]` holds `1 << shift` rows of `xsize << shift` samples.
    /// Channels are indexed in increasing channel order, skipping ignored
    /// ones; `Input` channels have empty output rows and `Output` channels
    /// empty input rows.
    fn process_row(
        &self,
        position: (usize, usize),
        xsize: usize,
        input_rows: &[Vec<&[f32]>],
        output_rows: &mut [Vec<&mut [f32]>],
        thread_id: usize,
    ) -> Result<()>;
}

/// Runs stages one after the other over full images, single-threaded.
/// Parallel callers can instead drive `process_row` per group and row.
pub struct SimpleRenderPipeline {
    stages: Vec<Box<dyn RenderPipelineStage>>,
}

impl SimpleRenderPipeline {
    pub fn new(stages: Vec<Box<dyn RenderPipelineStage>>) -> SimpleRenderPipeline {
        SimpleRenderPipeline { stages }
    }

    pub fn run(&self, channels: &mut Vec<Image<f32>>) -> Result<()> {
        for stage in &self.stages {
            debug!("running stage: {stage}");
            run_stage(stage.as_ref(), channels)?;
        }
        Ok(())
    }
}

fn mirrored_row(img: &Image<f32>, y: i64, border_x: usize) -> Vec<f32> {
    let row = img.row(mirror(y, img.ysize()));
    let xsize = img.xsize();
    let mut out = Vec::with_capacity(xsize + 2 * border_x);
    for dx in 0..border_x {
        out.push(row[mirror(dx as i64 - border_x as i64, xsize)]);
    }
    out.extend_from_slice(row);
    for dx in 0..border_x {
        out.push(row[mirror((xsize + dx) as i64, xsize)]);
    }
    out
}

fn run_stage(stage: &dyn RenderPipelineStage, channels: &mut Vec<Image<f32>>) -> Result<()> {
    let used: Vec<usize> = (0..channels.len())
        .filter(|&c| stage.channel_mode(c) != ChannelMode::Ignored)
        .collect();
    if used.is_empty() {
        return Ok(());
    }
    let in_size = channels[used[0]].size();
    for &c in &used {
        if stage.channel_mode(c) != ChannelMode::Output && channels[c].size() != in_size {
            return Err(Error::PipelineChannelCount(
                stage.to_string(),
                channels[c].xsize(),
                in_size.0,
            ));
        }
    }
    let (border_x, border_y) = stage.border();
    let shift = stage.shift();
    let out_rows_per_call = 1usize << shift;
    let out_xsize = in_size.0 << shift;

    // Freshly allocated output planes for every written channel.
    let mut outputs: Vec<Option<Image<f32>>> = Vec::new();
    for &c in &used {
        outputs.push(match stage.channel_mode(c) {
            ChannelMode::Input => None,
            _ => Some(Image::new(out_xsize, in_size.1 << shift)?),
        });
    }

    let mut out_buffers: Vec<Vec<Vec<f32>>> = used
        .iter()
        .map(|&c| match stage.channel_mode(c) {
            ChannelMode::Input => vec![],
            _ => vec![vec![0.0f32; out_xsize]; out_rows_per_call],
        })
        .collect();

    for y in 0..in_size.1 {
        let input_rows: Vec<Vec<Vec<f32>>> = used
            .iter()
            .map(|&c| {
                if stage.channel_mode(c) == ChannelMode::Output {
                    return vec![];
                }
                (-(border_y as i64)..=border_y as i64)
                    .map(|dy| mirrored_row(&channels[c], y as i64 + dy, border_x))
                    .collect()
            })
            .collect();
        let input_refs: Vec<Vec<&[f32]>> = input_rows
            .iter()
            .map(|rows| rows.iter().map(|r| r.as_slice()).collect())
            .collect();
        let mut output_refs: Vec<Vec<&mut [f32]>> = out_buffers
            .iter_mut()
            .map(|rows| rows.iter_mut().map(|r| r.as_mut_slice()).collect())
            .collect();
        stage.process_row((0, y), in_size.0, &input_refs, &mut output_refs, 0)?;
        for (i, out) in outputs.iter_mut().enumerate() {
            if let Some(out) = out {
                for dy in 0..out_rows_per_call {
                    out.row_mut((y << shift) + dy)
                        .copy_from_slice(&out_buffers[i][dy]);
                }
            }
        }
    }

    for (i, &c) in used.iter().enumerate() {
        if let Some(out) = outputs[i].take() {
            channels[c] = out;
        }
    }
    Ok(())
}

/// Assembles the stage list for a frame, in the fixed order Gaborish, EPF,
/// upsampling, color transform, transfer function.
pub fn build_pipeline_stages(
    frame_header: &FrameHeader,
    metadata: &ImageMetadata,
    sigma: Option<Arc<Image<f32>>>,
    output_srgb: bool,
) -> Result<Vec<Box<dyn RenderPipelineStage>>> {
    let lf = &frame_header.loop_filter;
    let mut stages: Vec<Box<dyn RenderPipelineStage>> = Vec::new();

    if lf.gab {
        for (channel, (w1, w2)) in [
            (lf.gab_x_weight1, lf.gab_x_weight2),
            (lf.gab_y_weight1, lf.gab_y_weight2),
            (lf.gab_b_weight1, lf.gab_b_weight2),
        ]
        .into_iter()
        .enumerate()
        {
            stages.push(Box::new(stages::GaborishStage::new(channel, w1, w2)));
        }
    }

    if lf.epf_iters > 0 {
        let sigma = sigma.ok_or(Error::InvalidTransform("EPF requires a sigma image"))?;
        if lf.epf_iters == 3 {
            stages.push(Box::new(stages::EpfStage::new(
                stages::EpfPass::Pass0,
                lf.clone(),
                sigma.clone(),
            )));
        }
        stages.push(Box::new(stages::EpfStage::new(
            stages::EpfPass::Pass1,
            lf.clone(),
            sigma.clone(),
        )));
        if lf.epf_iters >= 2 {
            stages.push(Box::new(stages::EpfStage::new(
                stages::EpfPass::Pass2,
                lf.clone(),
                sigma,
            )));
        }
    }

    if frame_header.upsampling > 1 {
        for channel in 0..3 {
            stages.push(Box::new(stages::UpsampleStage::new(
                frame_header.upsampling,
                channel,
            )?));
        }
    }

    if frame_header.do_ycbcr {
        stages.push(Box::new(stages::YcbcrToRgbStage::new(0)));
    } else if metadata.xyb_encoded {
        stages.push(Box::new(stages::XybToLinearStage::new(
            0,
            &metadata.opsin_inverse_matrix,
            metadata.intensity_target,
        )));
    }

    if output_srgb && metadata.xyb_encoded && !frame_header.do_ycbcr {
        stages.push(Box::new(stages::FromLinearStage::new(0)));
    }

    Ok(stages)
}

#[cfg(test)]
pub mod test {
    use super::*;

    /// Runs a single stage over the given planes.
    pub fn run_single_stage(
        stage: impl RenderPipelineStage + 'static,
        channels: &mut Vec<Image<f32>>,
    ) -> Result<()> {
        SimpleRenderPipeline::new(vec![Box::new(stage)]).run(channels)
    }
}
