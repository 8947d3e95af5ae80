// Copyright (c) the JPEG XL Project Authors. All rights reserved.
//
// Use of this source code is governed by a BSD-style
// license that can be found in the LICENSE file.

#![deny(unsafe_code)]

pub mod api;
pub mod bit_reader;
pub mod bit_writer;
pub mod color;
pub mod entropy_coding;
pub mod error;
pub mod frame;
pub mod headers;
pub mod image;
pub mod jpeg;
pub mod render;
pub mod util;

/// Side of the square of pixels decoded as a single unit.
pub const GROUP_DIM: usize = 256;
pub const BLOCK_DIM: usize = 8;
pub const BLOCK_SIZE: usize = BLOCK_DIM * BLOCK_DIM;

/// Blocks of mirror padding around the sigma image consumed by the EPF.
pub const SIGMA_PADDING: usize = 2;

/// Sigma image values below this threshold disable smoothing for the block.
#[allow(clippy::excessive_precision)]
pub const MIN_SIGMA: f32 = -3.90524291751269967465540850526868;
