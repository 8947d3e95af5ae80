// Copyright (c) the JPEG XL Project Authors. All rights reserved.
//
// Use of this source code is governed by a BSD-style
// license that can be found in the LICENSE file.

use num_derive::FromPrimitive;

use super::ModularImage;
use crate::error::Result;

#[derive(Debug, FromPrimitive, PartialEq, Eq, Clone, Copy)]
pub enum RctPermutation {
    Rgb = 0,
    Gbr = 1,
    Brg = 2,
    Rbg = 3,
    Grb = 4,
    Bgr = 5,
}

#[derive(Debug, FromPrimitive, PartialEq, Eq, Clone, Copy)]
pub enum RctOp {
    Noop = 0,
    AddFirstToThird = 1,
    AddFirstToSecond = 2,
    AddFirstToSecondAndThird = 3,
    AddAvgToSecond = 4,
    AddFirstToThirdAndAvgToSecond = 5,
    YCoCg = 6,
}

fn permutation_indices(perm: RctPermutation) -> [usize; 3] {
    match perm {
        RctPermutation::Rgb => [0, 1, 2],
        RctPermutation::Gbr => [1, 2, 0],
        RctPermutation::Brg => [2, 0, 1],
        RctPermutation::Rbg => [0, 2, 1],
        RctPermutation::Grb => [1, 0, 2],
        RctPermutation::Bgr => [2, 1, 0],
    }
}

/// Undoes a reversible color transform on channels `begin..begin+3`.
/// All arithmetic is integer-exact, so the inverse loses nothing.
pub fn inverse_rct(
    img: &mut ModularImage,
    begin: usize,
    op: RctOp,
    perm: RctPermutation,
) -> Result<()> {
    let (xsize, ysize) = img.channels[begin].data.size();
    let perm = permutation_indices(perm);
    for y in 0..ysize {
        for x in 0..xsize {
            let first = img.channels[begin].data.row(y)[x] as i64;
            let second = img.channels[begin + 1].data.row(y)[x] as i64;
            let third = img.channels[begin + 2].data.row(y)[x] as i64;
            let values = if op == RctOp::YCoCg {
                let (y_val, co, cg) = (first, second, third);
                let tmp = y_val - (cg >> 1);
                let g = cg + tmp;
                let b = tmp - (co >> 1);
                let r = b + co;
                [r, g, b]
            } else {
                let op_type = op as u32;
                let mut third = third;
                let mut second = second;
                if op_type & 1 != 0 {
                    third += first;
                }
                if (op_type >> 1) == 1 {
                    second += first;
                } else if (op_type >> 1) == 2 {
                    second += (first + third) >> 1;
                }
                [first, second, third]
            };
            for (i, &value) in values.iter().enumerate() {
                img.channels[begin + perm[i]].data.row_mut(y)[x] = value as i32;
            }
        }
    }
    Ok(())
}

#[cfg(test)]
mod test {
    use super::*;
    use crate::frame::modular::ModularImage;

    fn image_with_channels(pixels: [[i32; 2]; 3]) -> ModularImage {
        let mut img = ModularImage::new(2, 1, 3, 8).unwrap();
        for (c, values) in pixels.iter().enumerate() {
            img.channels[c].data.row_mut(0).copy_from_slice(values);
        }
        img
    }

    fn forward_ycocg(r: i32, g: i32, b: i32) -> (i32, i32, i32) {
        let co = r - b;
        let tmp = b + (co >> 1);
        let cg = g - tmp;
        let y = tmp + (cg >> 1);
        (y, co, cg)
    }

    #[test]
    fn noop_is_identity() -> Result<()> {
        let mut img = image_with_channels([[1, 2], [3, 4], [5, 6]]);
        inverse_rct(&mut img, 0, RctOp::Noop, RctPermutation::Rgb)?;
        assert_eq!(img.channels[0].data.row(0), &[1, 2]);
        assert_eq!(img.channels[1].data.row(0), &[3, 4]);
        assert_eq!(img.channels[2].data.row(0), &[5, 6]);
        Ok(())
    }

    #[test]
    fn ycocg_roundtrip() -> Result<()> {
        for (r, g, b) in [(0, 0, 0), (255, 0, 0), (1, 2, 3), (-7, 100, 42)] {
            let (y, co, cg) = forward_ycocg(r, g, b);
            let mut img = image_with_channels([[y, y], [co, co], [cg, cg]]);
            inverse_rct(&mut img, 0, RctOp::YCoCg, RctPermutation::Rgb)?;
            assert_eq!(img.channels[0].data.row(0)[0], r);
            assert_eq!(img.channels[1].data.row(0)[0], g);
            assert_eq!(img.channels[2].data.row(0)[0], b);
        }
        Ok(())
    }

    #[test]
    fn linear_ops_invert_exactly() -> Result<()> {
        // Forward of op 3: second -= first, third -= first.
        let (r, g, b) = (13, -5, 77);
        let mut img = image_with_channels([[r, r], [g - r, g - r], [b - r, b - r]]);
        inverse_rct(&mut img, 0, RctOp::AddFirstToSecondAndThird, RctPermutation::Rgb)?;
        assert_eq!(img.channels[0].data.row(0)[0], r);
        assert_eq!(img.channels[1].data.row(0)[0], g);
        assert_eq!(img.channels[2].data.row(0)[0], b);
        Ok(())
    }

    #[test]
    fn permutation_reorders_output() -> Result<()> {
        let mut img = image_with_channels([[1, 1], [2, 2], [3, 3]]);
        inverse_rct(&mut img, 0, RctOp::Noop, RctPermutation::Gbr)?;
        // Values (1, 2, 3) land in channels (1, 2, 0).
        assert_eq!(img.channels[1].data.row(0)[0], 1);
        assert_eq!(img.channels[2].data.row(0)[0], 2);
        assert_eq!(img.channels[0].data.row(0)[0], 3);
        Ok(())
    }
}
