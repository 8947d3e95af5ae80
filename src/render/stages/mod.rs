// Copyright (c) the JPEG XL Project Authors. All rights reserved.
//
// Use of this source code is governed by a BSD-style
// license that can be found in the LICENSE file.

mod epf;
mod from_linear;
mod gaborish;
mod upsample;
mod xyb;
mod ycbcr;

pub use epf::*;
pub use from_linear::*;
pub use gaborish::*;
pub use upsample::*;
pub use xyb::*;
pub use ycbcr::*;
