// Copyright (c) the JPEG XL Project Authors. All rights reserved.
//
// Use of this source code is governed by a BSD-style
// license that can be found in the LICENSE file.

mod linalg;
mod log2;
mod mirror;
mod rational_poly;

pub use linalg::*;
pub use log2::*;
pub use mirror::*;
pub use rational_poly::*;

#[cfg(test)]
pub mod test;
