// Copyright (c) the JPEG XL Project Authors. All rights reserved.
//
// Use of this source code is governed by a BSD-style
// license that can be found in the LICENSE file.

use crate::headers::image_metadata::OpsinInverseMatrix;

/// The encoder-side opsin absorbance matrix; kept for validating the inverse
/// and for tests.
#[allow(clippy::excessive_precision)]
pub const OPSIN_ABSORBANCE_MATRIX: [f32; 9] = [
    0.30,
    0.622,
    0.078,
    0.23,
    0.692,
    0.078,
    0.24342268924547819,
    0.20476744424496821,
    0.55180986650955360,
];

/// Inverse opsin parameters ready for per-pixel use: the inverse matrix
/// scaled by `255 / intensity_target` with every entry broadcast across 4
/// lanes, and the negative absorbance biases with their cube roots.
#[derive(Debug, Clone)]
pub struct OpsinParams {
    pub inverse_matrix: [f32; 36],
    pub opsin_biases: [f32; 4],
    pub opsin_biases_cbrt: [f32; 4],
}

impl OpsinParams {
    pub fn init(opsin: &OpsinInverseMatrix, intensity_target: f32) -> OpsinParams {
        let scale = 255.0 / intensity_target;
        let mut inverse_matrix = [0.0f32; 36];
        for (i, &value) in opsin.inverse_matrix.iter().enumerate() {
            for lane in 0..4 {
                inverse_matrix[4 * i + lane] = value * scale;
            }
        }
        let mut opsin_biases = [1.0f32; 4];
        opsin_biases[..3].copy_from_slice(&opsin.opsin_biases);
        let opsin_biases_cbrt = opsin_biases.map(f32::cbrt);
        OpsinParams {
            inverse_matrix,
            opsin_biases,
            opsin_biases_cbrt,
        }
    }

    #[inline]
    fn matrix_entry(&self, row: usize, col: usize) -> f32 {
        self.inverse_matrix[4 * (3 * row + col)]
    }
}

/// Converts one XYB pixel to linear RGB, where 1.0 is `intensity_target`
/// nits: undo the mixing, cube to invert the cube-root "gamma", remove the
/// bias, then apply the inverse absorbance matrix.
#[inline]
pub fn xyb_to_linear_rgb(params: &OpsinParams, x: f32, y: f32, b: f32) -> [f32; 3] {
    let gamma_r = y + x - params.opsin_biases_cbrt[0];
    let gamma_g = y - x - params.opsin_biases_cbrt[1];
    let gamma_b = b - params.opsin_biases_cbrt[2];

    let mixed_r = gamma_r * gamma_r * gamma_r + params.opsin_biases[0];
    let mixed_g = gamma_g * gamma_g * gamma_g + params.opsin_biases[1];
    let mixed_b = gamma_b * gamma_b * gamma_b + params.opsin_biases[2];

    let mut rgb = [0.0f32; 3];
    for (row, value) in rgb.iter_mut().enumerate() {
        *value = params.matrix_entry(row, 0) * mixed_r
            + params.matrix_entry(row, 1) * mixed_g
            + params.matrix_entry(row, 2) * mixed_b;
    }
    rgb
}

/// In-place row variant of [`xyb_to_linear_rgb`].
pub fn xyb_to_linear_rgb_row(
    params: &OpsinParams,
    row_x: &mut [f32],
    row_y: &mut [f32],
    row_b: &mut [f32],
    xsize: usize,
) {
    for idx in 0..xsize {
        let [r, g, b] = xyb_to_linear_rgb(params, row_x[idx], row_y[idx], row_b[idx]);
        row_x[idx] = r;
        row_y[idx] = g;
        row_b[idx] = b;
    }
}
