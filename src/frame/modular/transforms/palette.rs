// Copyright (c) the JPEG XL Project Authors. All rights reserved.
//
// Use of this source code is governed by a BSD-style
// license that can be found in the LICENSE file.

use super::{ModularChannel, ModularImage, Predictor};
use crate::error::{Error, Result};
use crate::frame::modular::PredictionData;
use crate::image::Image;

const RGB_CHANNELS: usize = 3;

// 5x5x5 color cube for the larger cube.
const LARGE_CUBE: usize = 5;

// Smaller interleaved color cube to fill the holes of the larger cube.
const SMALL_CUBE: usize = 4;
const SMALL_CUBE_BITS: usize = 2;
// SMALL_CUBE ** 3
const LARGE_CUBE_OFFSET: usize = SMALL_CUBE * SMALL_CUBE * SMALL_CUBE;

const DELTA_PALETTE: [[i32; 3]; 72] = [
    [0, 0, 0],
    [4, 4, 4],
    [11, 0, 0],
    [0, 0, -13],
    [0, -12, 0],
    [-10, -10, -10],
    [-18, -18, -18],
    [-27, -27, -27],
    [-18, -18, 0],
    [0, 0, -32],
    [-32, 0, 0],
    [-37, -37, -37],
    [0, -32, -32],
    [24, 24, 45],
    [50, 50, 50],
    [-45, -24, -24],
    [-24, -45, -45],
    [0, -24, -24],
    [-34, -34, 0],
    [-24, 0, -24],
    [-45, -45, -24],
    [64, 64, 64],
    [-32, 0, -32],
    [0, -32, 0],
    [-32, 0, 32],
    [-24, -45, -24],
    [45, 24, 45],
    [24, -24, -45],
    [-45, -24, 24],
    [80, 80, 80],
    [64, 0, 0],
    [0, 0, -64],
    [0, -64, -64],
    [-24, -24, 45],
    [96, 96, 96],
    [64, 64, 0],
    [45, -24, -24],
    [34, -34, 0],
    [112, 112, 112],
    [24, -45, -45],
    [45, 45, -24],
    [0, -32, 32],
    [24, -24, 45],
    [0, 96, 96],
    [45, -24, 24],
    [24, -45, -24],
    [-24, -45, 24],
    [0, -64, 0],
    [96, 0, 0],
    [128, 128, 128],
    [64, 0, 64],
    [144, 144, 144],
    [96, 96, 0],
    [-36, -36, 36],
    [45, -24, -45],
    [45, -45, -24],
    [0, 0, -96],
    [0, 128, 128],
    [0, 96, 0],
    [45, 24, -45],
    [-128, 0, 0],
    [24, -45, 24],
    [-45, 24, -45],
    [64, 0, -64],
    [64, -64, -64],
    [96, 0, 96],
    [45, -45, 24],
    [24, 45, -45],
    [64, 64, -64],
    [128, 128, 0],
    [0, 0, -128],
    [-24, 45, -45],
];

fn scale_cube(value: usize, denom: usize, bit_depth: usize) -> i32 {
    ((value * ((1 << bit_depth) - 1)) / denom) as i32
}

// Extends palette indices beyond the stored entries: negative indices map to
// the built-in delta table, indices past the palette to implicit color cubes.
// Indices below `nb_deltas` are deltas; adding the local prediction is the
// caller's job.
fn get_palette_value(
    palette: &Image<i32>,
    index: isize,
    c: usize,
    palette_size: usize,
    bit_depth: usize,
) -> i32 {
    if index < 0 {
        if c >= RGB_CHANNELS {
            return 0;
        }
        // Do not open the brackets, otherwise i32::MIN negation could
        // overflow.
        let mut index = (-(index + 1)) as usize;
        index %= 1 + 2 * (DELTA_PALETTE.len() - 1);
        const MULTIPLIER: [i32; 2] = [-1, 1];
        let mut result = DELTA_PALETTE[(index + 1) >> 1][c] * MULTIPLIER[index & 1];
        if bit_depth > 8 {
            result *= 1 << (bit_depth - 8);
        }
        result
    } else {
        let mut index = index as usize;
        if palette_size <= index && index < palette_size + LARGE_CUBE_OFFSET {
            if c >= RGB_CHANNELS {
                return 0;
            }
            index -= palette_size;
            index >>= c * SMALL_CUBE_BITS;
            scale_cube(index % SMALL_CUBE, SMALL_CUBE, bit_depth)
                + (1 << 0.max(bit_depth as isize - 3))
        } else if palette_size + LARGE_CUBE_OFFSET <= index {
            if c >= RGB_CHANNELS {
                return 0;
            }
            index -= palette_size + LARGE_CUBE_OFFSET;
            match c {
                1 => index /= LARGE_CUBE,
                2 => index /= LARGE_CUBE * LARGE_CUBE,
                _ => (),
            }
            scale_cube(index % LARGE_CUBE, LARGE_CUBE - 1, bit_depth)
        } else {
            palette.row(c)[index]
        }
    }
}

/// Expands the index channel at `begin` back into `num_channels` channels
/// using the palette meta channel, then drops the palette.
pub fn inverse_palette(
    img: &mut ModularImage,
    begin: usize,
    num_channels: usize,
    nb_colors: usize,
    nb_deltas: usize,
    predictor: Predictor,
) -> Result<()> {
    if predictor == Predictor::Weighted {
        return Err(Error::Unsupported("weighted predictor in delta palette"));
    }
    if img.nb_meta_channels == 0 {
        return Err(Error::InvalidTransform("palette inverse without palette"));
    }
    let palette = img.channels.remove(0);
    img.nb_meta_channels -= 1;
    let index_channel = &img.channels[begin];
    let (xsize, ysize) = index_channel.data.size();
    let shift = index_channel.shift;
    let bit_depth = (img.bit_depth as usize).min(24);

    let mut outputs = Vec::with_capacity(num_channels);
    for c in 0..num_channels {
        let mut out = Image::<i32>::new(xsize, ysize)?;
        let index_data = &img.channels[begin].data;
        if nb_deltas == 0 && predictor == Predictor::Zero {
            for y in 0..ysize {
                let index_row = index_data.row(y);
                let out_row = out.row_mut(y);
                for x in 0..xsize {
                    out_row[x] = get_palette_value(
                        &palette.data,
                        index_row[x] as isize,
                        c,
                        nb_colors,
                        bit_depth,
                    );
                }
            }
        } else {
            for y in 0..ysize {
                for x in 0..xsize {
                    let index = index_data.row(y)[x];
                    let entry = get_palette_value(
                        &palette.data,
                        index as isize,
                        c,
                        nb_colors + nb_deltas,
                        bit_depth,
                    );
                    let value = if index < nb_deltas as i32 {
                        let pred =
                            predictor.predict_one(PredictionData::get(&out, x, y), /*wp_pred=*/ 0);
                        (pred + entry as i64) as i32
                    } else {
                        entry
                    };
                    out.row_mut(y)[x] = value;
                }
            }
        }
        outputs.push(ModularChannel { data: out, shift });
    }

    img.channels
        .splice(begin..begin + 1, outputs);
    Ok(())
}

#[cfg(test)]
mod test {
    use super::*;
    use crate::frame::modular::ModularImage;

    #[test]
    fn direct_palette_expansion() -> Result<()> {
        // Palette with 4 colors of 3 components; 2x2 indices.
        let mut img = ModularImage::new(2, 2, 1, 8)?;
        let mut palette = ModularChannel::new(4, 3, None)?;
        let table = [[10, 40, 70, 100], [20, 50, 80, 110], [30, 60, 90, 120]];
        for (c, row) in table.iter().enumerate() {
            palette.data.row_mut(c).copy_from_slice(row);
        }
        img.channels.insert(0, palette);
        img.nb_meta_channels = 1;
        img.channels[1].data.row_mut(0).copy_from_slice(&[0, 1]);
        img.channels[1].data.row_mut(1).copy_from_slice(&[2, 3]);

        inverse_palette(&mut img, 0, 3, 4, 0, Predictor::Zero)?;
        assert_eq!(img.channels.len(), 3);
        assert_eq!(img.nb_meta_channels, 0);
        for c in 0..3 {
            assert_eq!(
                img.channels[c].data.row(0),
                &[table[c][0], table[c][1]],
            );
            assert_eq!(
                img.channels[c].data.row(1),
                &[table[c][2], table[c][3]],
            );
        }
        Ok(())
    }

    #[test]
    fn small_cube_values_in_range() {
        let palette = Image::<i32>::new(1, 3).unwrap();
        for index in 0..LARGE_CUBE_OFFSET {
            for c in 0..3 {
                let value = get_palette_value(&palette, index as isize, c, 0, 8);
                assert!((0..=255).contains(&value), "value {value} out of range");
            }
        }
    }

    #[test]
    fn delta_palette_first_entries() {
        let palette = Image::<i32>::new(1, 3).unwrap();
        // Index -1 maps to entry 0 of the delta table with positive sign.
        assert_eq!(get_palette_value(&palette, -1, 0, 0, 8), 0);
        // Index -2 maps to entry 1; -3 to entry 1, negated.
        assert_eq!(get_palette_value(&palette, -2, 0, 0, 8), 4);
        assert_eq!(get_palette_value(&palette, -3, 0, 0, 8), -4);
    }
}
