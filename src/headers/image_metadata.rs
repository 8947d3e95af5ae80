// Copyright (c) the JPEG XL Project Authors. All rights reserved.
//
// Use of this source code is governed by a BSD-style
// license that can be found in the LICENSE file.

use crate::bit_reader::BitReader;
use crate::error::{Error, Result};
use crate::headers::encodings::{read_bool, read_f16, read_u32, skip_extensions, U32};

/// Inverse opsin absorbance data carried in the image metadata. The default
/// matrix is the inverse of the encoder-side absorbance matrix.
#[derive(Debug, Clone)]
pub struct OpsinInverseMatrix {
    pub inverse_matrix: [f32; 9],
    pub opsin_biases: [f32; 3],
}

#[allow(clippy::excessive_precision)]
pub const DEFAULT_INVERSE_OPSIN_MATRIX: [f32; 9] = [
    11.031566901960783,
    -9.866943921568629,
    -0.16462299647058826,
    -3.254147380392157,
    4.418770392156863,
    -0.16462299647058826,
    -3.6588512862745097,
    2.7129230470588235,
    1.9459282392156863,
];

#[allow(clippy::excessive_precision)]
pub const DEFAULT_OPSIN_BIAS: f32 = -0.0037930732552754493;

impl Default for OpsinInverseMatrix {
    fn default() -> Self {
        OpsinInverseMatrix {
            inverse_matrix: DEFAULT_INVERSE_OPSIN_MATRIX,
            opsin_biases: [DEFAULT_OPSIN_BIAS; 3],
        }
    }
}

impl OpsinInverseMatrix {
    pub fn read(br: &mut BitReader) -> Result<OpsinInverseMatrix> {
        if read_bool(br)? {
            return Ok(OpsinInverseMatrix::default());
        }
        let mut inverse_matrix = [0.0f32; 9];
        for v in inverse_matrix.iter_mut() {
            *v = read_f16(br)?;
        }
        let mut opsin_biases = [0.0f32; 3];
        for v in opsin_biases.iter_mut() {
            *v = read_f16(br)?;
        }
        Ok(OpsinInverseMatrix {
            inverse_matrix,
            opsin_biases,
        })
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Orientation {
    Identity = 1,
    FlipHorizontal = 2,
    Rotate180 = 3,
    FlipVertical = 4,
    Transpose = 5,
    Rotate90Cw = 6,
    AntiTranspose = 7,
    Rotate90Ccw = 8,
}

/// Global image properties; `all_default` selects the canonical 8-bit sRGB
/// XYB-encoded configuration.
#[derive(Debug)]
pub struct ImageMetadata {
    pub orientation: Orientation,
    pub bits_per_sample: u32,
    pub modular_16bit_buffers: bool,
    pub num_extra_channels: u32,
    pub xyb_encoded: bool,
    pub intensity_target: f32,
    pub opsin_inverse_matrix: OpsinInverseMatrix,
}

impl Default for ImageMetadata {
    fn default() -> Self {
        ImageMetadata {
            orientation: Orientation::Identity,
            bits_per_sample: 8,
            modular_16bit_buffers: true,
            num_extra_channels: 0,
            xyb_encoded: true,
            intensity_target: 255.0,
            opsin_inverse_matrix: OpsinInverseMatrix::default(),
        }
    }
}

impl ImageMetadata {
    pub fn read(br: &mut BitReader) -> Result<ImageMetadata> {
        let all_default = read_bool(br)?;
        if all_default {
            return Ok(ImageMetadata::default());
        }
        let extra_fields = read_bool(br)?;
        let orientation = if extra_fields {
            match br.read(3)? + 1 {
                1 => Orientation::Identity,
                2 => Orientation::FlipHorizontal,
                3 => Orientation::Rotate180,
                4 => Orientation::FlipVertical,
                5 => Orientation::Transpose,
                6 => Orientation::Rotate90Cw,
                7 => Orientation::AntiTranspose,
                _ => Orientation::Rotate90Ccw,
            }
        } else {
            Orientation::Identity
        };

        let float_sample = read_bool(br)?;
        if float_sample {
            return Err(Error::Unsupported("float samples"));
        }
        let bits_per_sample = read_u32(
            br,
            [
                U32::Val(8),
                U32::Val(10),
                U32::Val(12),
                U32::BitsOffset { n: 6, off: 1 },
            ],
        )?;
        if bits_per_sample > 31 {
            return Err(Error::InvalidBitsPerSample(bits_per_sample));
        }

        let modular_16bit_buffers = read_bool(br)?;
        let num_extra_channels = read_u32(
            br,
            [
                U32::Val(0),
                U32::Val(1),
                U32::BitsOffset { n: 4, off: 2 },
                U32::BitsOffset { n: 12, off: 1 },
            ],
        )?;
        if num_extra_channels != 0 {
            return Err(Error::Unsupported("extra channels"));
        }
        let xyb_encoded = read_bool(br)?;

        // Only the default color encoding (8-bit sRGB) is handled here; ICC
        // profile parsing is the container's job.
        let color_encoding_default = read_bool(br)?;
        if !color_encoding_default {
            return Err(Error::Unsupported("custom color encoding"));
        }

        let intensity_target = if extra_fields {
            let value = read_f16(br)?;
            if value <= 0.0 {
                return Err(Error::InvalidIntensityTarget(value));
            }
            value
        } else {
            255.0
        };

        let opsin_inverse_matrix = if xyb_encoded {
            OpsinInverseMatrix::read(br)?
        } else {
            OpsinInverseMatrix::default()
        };

        skip_extensions(br)?;

        Ok(ImageMetadata {
            orientation,
            bits_per_sample,
            modular_16bit_buffers,
            num_extra_channels,
            xyb_encoded,
            intensity_target,
            opsin_inverse_matrix,
        })
    }
}

#[cfg(test)]
mod test {
    use super::*;

    #[test]
    fn all_default() -> Result<()> {
        let mut br = BitReader::new(&[1]);
        let metadata = ImageMetadata::read(&mut br)?;
        assert_eq!(metadata.orientation, Orientation::Identity);
        assert!(metadata.xyb_encoded);
        assert_eq!(metadata.bits_per_sample, 8);
        assert_eq!(metadata.intensity_target, 255.0);
        Ok(())
    }
}
