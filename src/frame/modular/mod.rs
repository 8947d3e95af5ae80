// Copyright (c) the JPEG XL Project Authors. All rights reserved.
//
// Use of this source code is governed by a BSD-style
// license that can be found in the LICENSE file.

mod decode;
mod predict;
mod transforms;
mod tree;

pub use decode::*;
pub use predict::*;
pub use transforms::*;
pub use tree::*;

use crate::error::{Error, Result};
use crate::image::Image;

/// One channel of a modular image. Shifts express subsampling relative to the
/// frame origin; meta channels (palettes) carry no shift.
#[derive(Debug)]
pub struct ModularChannel {
    pub data: Image<i32>,
    pub shift: Option<(u32, u32)>,
}

impl ModularChannel {
    pub fn new(xsize: usize, ysize: usize, shift: Option<(u32, u32)>) -> Result<ModularChannel> {
        Ok(ModularChannel {
            data: Image::new(xsize, ysize)?,
            shift,
        })
    }

    pub fn is_meta(&self) -> bool {
        self.shift.is_none()
    }

    pub fn same_shape(&self, other: &ModularChannel) -> bool {
        self.data.size() == other.data.size() && self.shift == other.shift
    }
}

/// An ordered list of channels; the first `nb_meta_channels` are non-spatial.
#[derive(Debug)]
pub struct ModularImage {
    pub channels: Vec<ModularChannel>,
    pub nb_meta_channels: usize,
    pub bit_depth: u32,
}

impl ModularImage {
    pub fn new(
        xsize: usize,
        ysize: usize,
        num_channels: usize,
        bit_depth: u32,
    ) -> Result<ModularImage> {
        let channels = (0..num_channels)
            .map(|_| ModularChannel::new(xsize, ysize, Some((0, 0))))
            .collect::<Result<_>>()?;
        Ok(ModularImage {
            channels,
            nb_meta_channels: 0,
            bit_depth,
        })
    }

    pub fn channel(&self, index: usize) -> Result<&ModularChannel> {
        self.channels
            .get(index)
            .ok_or(Error::InvalidChannelRange(index, index + 1, self.channels.len()))
    }
}
