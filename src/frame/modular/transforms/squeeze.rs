// Copyright (c) the JPEG XL Project Authors. All rights reserved.
//
// Use of this source code is governed by a BSD-style
// license that can be found in the LICENSE file.

use super::{ModularChannel, ModularImage};
use crate::error::{Error, Result};
use crate::headers::modular::SqueezeParams;
use crate::image::Image;

const MAX_FIRST_PREVIEW_SIZE: usize = 8;

/// The squeeze schedule used when the bitstream carries no explicit one:
/// alternate horizontal and vertical halvings until the preview is small.
pub fn default_squeeze(img: &ModularImage) -> Vec<SqueezeParams> {
    let first = img.nb_meta_channels;
    let count = img.channels.len() - first;
    let mut w = img.channels[first].data.xsize();
    let mut h = img.channels[first].data.ysize();

    let mut params = vec![];
    let sp = SqueezeParams {
        begin_channel: first as u32,
        num_channels: count as u32,
        in_place: true,
        horizontal: false,
    };

    if count > 2 && img.channels[first + 1].data.size() == (w, h) {
        // 420 previews of the chroma channels.
        let chroma = SqueezeParams {
            horizontal: true,
            in_place: false,
            begin_channel: first as u32 + 1,
            num_channels: 2,
        };
        params.push(chroma);
        params.push(SqueezeParams {
            horizontal: false,
            ..chroma
        });
    }

    // Vertical first on tall images.
    if w <= h && h > MAX_FIRST_PREVIEW_SIZE {
        params.push(SqueezeParams {
            horizontal: false,
            ..sp
        });
        h = h.div_ceil(2);
    }
    while w > MAX_FIRST_PREVIEW_SIZE || h > MAX_FIRST_PREVIEW_SIZE {
        if w > MAX_FIRST_PREVIEW_SIZE {
            params.push(SqueezeParams {
                horizontal: true,
                ..sp
            });
            w = w.div_ceil(2);
        }
        if h > MAX_FIRST_PREVIEW_SIZE {
            params.push(SqueezeParams {
                horizontal: false,
                ..sp
            });
            h = h.div_ceil(2);
        }
    }

    params
}

fn check_squeeze_params(img: &ModularImage, params: &SqueezeParams) -> Result<()> {
    let begin = params.begin_channel as usize;
    let end = begin + params.num_channels as usize;
    if end > img.channels.len() || params.num_channels == 0 {
        return Err(Error::InvalidChannelRange(
            begin,
            end,
            img.channels.len(),
        ));
    }
    if img.channels[begin].is_meta() != img.channels[end - 1].is_meta() {
        return Err(Error::MixingDifferentChannels);
    }
    if img.channels[begin].is_meta() && !params.in_place {
        return Err(Error::MetaSqueezeRequiresInPlace);
    }
    Ok(())
}

/// Applies the channel-list effect of the forward squeeze: each squeezed
/// channel becomes its average half, and a residual channel is added.
pub fn meta_apply_squeeze(img: &mut ModularImage, params: &[SqueezeParams]) -> Result<()> {
    for step in params {
        check_squeeze_params(img, step)?;
        let begin = step.begin_channel as usize;
        let num = step.num_channels as usize;
        let residual_at = if step.in_place {
            begin + num
        } else {
            img.channels.len()
        };
        for ic in 0..num {
            let chan = &img.channels[begin + ic];
            let (w, h) = chan.data.size();
            let new_shift = match chan.shift {
                Some((hs, vs)) => {
                    if hs > 30 || vs > 30 {
                        return Err(Error::TooManySqueezes);
                    }
                    if step.horizontal {
                        Some((hs + 1, vs))
                    } else {
                        Some((hs, vs + 1))
                    }
                }
                None => None,
            };
            let (avg_size, res_size) = if step.horizontal {
                ((w.div_ceil(2), h), (w - w.div_ceil(2), h))
            } else {
                ((w, h.div_ceil(2)), (w, h - h.div_ceil(2)))
            };
            img.channels[begin + ic] = ModularChannel::new(avg_size.0, avg_size.1, new_shift)?;
            img.channels.insert(
                residual_at + ic,
                ModularChannel::new(res_size.0, res_size.1, new_shift)?,
            );
        }
    }
    Ok(())
}

/// Anti-overshoot correction for the inverse lifting step; clamped so the
/// reconstructed pair stays between its neighbors.
#[inline]
fn smooth_tendency(b: i64, a: i64, n: i64) -> i64 {
    let mut diff = 0;
    if b >= a && a >= n {
        diff = (4 * b - 3 * n - a + 6) / 12;
        //      2c = a<<1 + diff - diff&1 <= 2b  so diff - diff&1 <= 2b - 2a
        //      2d = a<<1 - diff - diff&1 >= 2n  so diff + diff&1 <= 2a - 2n
        if diff - (diff & 1) > 2 * (b - a) {
            diff = 2 * (b - a) + 1;
        }
        if diff + (diff & 1) > 2 * (a - n) {
            diff = 2 * (a - n);
        }
    } else if b <= a && a <= n {
        diff = (4 * b - 3 * n - a - 6) / 12;
        if diff + (diff & 1) < 2 * (b - a) {
            diff = 2 * (b - a) - 1;
        }
        if diff - (diff & 1) < 2 * (a - n) {
            diff = 2 * (a - n);
        }
    }
    diff
}

#[inline]
fn unsqueeze(avg: i32, res: i32, next_avg: i32, prev: i32) -> (i32, i32) {
    let tendency = smooth_tendency(prev as i64, avg as i64, next_avg as i64);
    let diff = res as i64 + tendency;
    let first = avg as i64 + diff / 2;
    (first as i32, (first - diff) as i32)
}

fn inverse_hsqueeze(avg: &Image<i32>, res: &Image<i32>) -> Result<Image<i32>> {
    let (avg_w, h) = avg.size();
    let res_w = res.xsize();
    let out_w = avg_w + res_w;
    debug_assert!(res_w == avg_w || res_w + 1 == avg_w);
    let mut out = Image::<i32>::new(out_w, h)?;

    for y in 0..h {
        let avg_row = avg.row(y);
        let res_row = res.row(y);
        let mut prev = 0;
        for x in 0..res_w {
            let next_avg = if x + 1 < avg_w { avg_row[x + 1] } else { avg_row[x] };
            let left = if x > 0 { prev } else { avg_row[x] };
            let (a, b) = unsqueeze(avg_row[x], res_row[x], next_avg, left);
            let out_row = out.row_mut(y);
            out_row[2 * x] = a;
            out_row[2 * x + 1] = b;
            prev = b;
        }
        if res_w < avg_w {
            // Odd output width: the last sample is the average itself.
            out.row_mut(y)[2 * res_w] = avg_row[res_w];
        }
    }
    Ok(out)
}

fn inverse_vsqueeze(avg: &Image<i32>, res: &Image<i32>) -> Result<Image<i32>> {
    let (w, avg_h) = avg.size();
    let res_h = res.ysize();
    let out_h = avg_h + res_h;
    debug_assert!(res_h == avg_h || res_h + 1 == avg_h);
    let mut out = Image::<i32>::new(w, out_h)?;

    for y in 0..res_h {
        for x in 0..w {
            let next_avg = if y + 1 < avg_h {
                avg.row(y + 1)[x]
            } else {
                avg.row(y)[x]
            };
            let top = if y > 0 { out.row(2 * y - 1)[x] } else { avg.row(y)[x] };
            let (a, b) = unsqueeze(avg.row(y)[x], res.row(y)[x], next_avg, top);
            out.row_mut(2 * y)[x] = a;
            out.row_mut(2 * y + 1)[x] = b;
        }
    }
    if res_h < avg_h {
        let (last, src) = (2 * res_h, avg.row(res_h).to_vec());
        out.row_mut(last).copy_from_slice(&src);
    }
    Ok(out)
}

/// Undoes a squeeze stage: recombines each average channel with its residual
/// and collapses the residual channel.
pub fn inverse_squeeze(img: &mut ModularImage, params: &[SqueezeParams]) -> Result<()> {
    for step in params.iter().rev() {
        let begin = step.begin_channel as usize;
        let num = step.num_channels as usize;
        let residual_at = if step.in_place {
            begin + num
        } else {
            img.channels.len() - num
        };
        for ic in (0..num).rev() {
            let residual = img.channels.remove(residual_at + ic);
            let avg = &img.channels[begin + ic];
            let out = if step.horizontal {
                inverse_hsqueeze(&avg.data, &residual.data)?
            } else {
                inverse_vsqueeze(&avg.data, &residual.data)?
            };
            let shift = avg.shift.map(|(hs, vs)| {
                if step.horizontal {
                    (hs - 1, vs)
                } else {
                    (hs, vs - 1)
                }
            });
            img.channels[begin + ic] = ModularChannel { data: out, shift };
        }
    }
    Ok(())
}

#[cfg(test)]
mod test {
    use super::*;
    use crate::frame::modular::ModularImage;
    use crate::headers::modular::{Transform, TransformId};

    #[test]
    fn constant_row_reconstructs_exactly() -> Result<()> {
        // Averages [5, 5] with zero residuals expand to [5, 5, 5, 5].
        let mut avg = Image::<i32>::new(2, 1)?;
        avg.row_mut(0).copy_from_slice(&[5, 5]);
        let res = Image::<i32>::new(2, 1)?;
        let out = inverse_hsqueeze(&avg, &res)?;
        assert_eq!(out.row(0), &[5, 5, 5, 5]);
        Ok(())
    }

    #[test]
    fn odd_width_keeps_tail() -> Result<()> {
        let mut avg = Image::<i32>::new(2, 1)?;
        avg.row_mut(0).copy_from_slice(&[4, 9]);
        let res = Image::<i32>::new(1, 1)?;
        let out = inverse_hsqueeze(&avg, &res)?;
        assert_eq!(out.xsize(), 3);
        assert_eq!(out.row(0)[2], 9);
        Ok(())
    }

    #[test]
    fn vertical_constant_column() -> Result<()> {
        let mut avg = Image::<i32>::new(1, 2)?;
        avg.row_mut(0)[0] = 7;
        avg.row_mut(1)[0] = 7;
        let res = Image::<i32>::new(1, 2)?;
        let out = inverse_vsqueeze(&avg, &res)?;
        for y in 0..4 {
            assert_eq!(out.row(y)[0], 7);
        }
        Ok(())
    }

    #[test]
    fn smooth_tendency_zero_on_flat() {
        assert_eq!(smooth_tendency(5, 5, 5), 0);
        assert_eq!(smooth_tendency(0, 0, 0), 0);
    }

    #[test]
    fn smooth_tendency_monotone_bounds() {
        // For b >= a >= n the correction must keep the reconstructed pair
        // within [n, b].
        for b in -20i64..20 {
            for a in -20i64..=b {
                for n in -20i64..=a {
                    let diff = smooth_tendency(b, a, n);
                    let first = a + diff / 2;
                    let second = first - diff;
                    assert!(first <= b && second >= n, "({b}, {a}, {n}) -> {diff}");
                }
            }
        }
    }

    #[test]
    fn meta_and_inverse_roundtrip_shapes() -> Result<()> {
        let mut img = ModularImage::new(13, 7, 1, 8)?;
        let transform = Transform {
            id: TransformId::Squeeze,
            begin_channel: 0,
            rct_type: 0,
            num_channels: 0,
            nb_colors: 0,
            nb_deltas: 0,
            predictor_id: 0,
            squeezes: vec![],
        };
        let steps = crate::frame::modular::meta_apply_transforms(&mut img, &[transform])?;
        assert!(img.channels.len() > 1);
        crate::frame::modular::apply_inverse_transforms(&mut img, &steps)?;
        assert_eq!(img.channels.len(), 1);
        assert_eq!(img.channels[0].data.size(), (13, 7));
        Ok(())
    }
}
