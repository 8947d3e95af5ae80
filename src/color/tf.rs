// Copyright (c) the JPEG XL Project Authors. All rights reserved.
//
// Use of this source code is governed by a BSD-style
// license that can be found in the LICENSE file.

use crate::util::eval_rational_poly;

/// Converts the linear samples with the sRGB transfer curve.
// Max error ~5e-7
pub fn linear_to_srgb(samples: &mut [f32]) {
    #[allow(clippy::excessive_precision)]
    const P: [f32; 5] = [
        -5.135152395e-4,
        5.287254571e-3,
        3.903842876e-1,
        1.474205315,
        7.352629620e-1,
    ];

    #[allow(clippy::excessive_precision)]
    const Q: [f32; 5] = [
        1.004519624e-2,
        3.036675394e-1,
        1.340816930,
        9.258482155e-1,
        2.424867759e-2,
    ];

    for x in samples {
        let a = x.abs();
        *x = if a <= 0.0031308 {
            a * 12.92
        } else {
            eval_rational_poly(a.sqrt(), P, Q)
        }
        .copysign(*x);
    }
}

/// Converts samples in sRGB transfer curve to linear. Inverse of
/// `linear_to_srgb`.
pub fn srgb_to_linear(samples: &mut [f32]) {
    #[allow(clippy::excessive_precision)]
    const P: [f32; 5] = [
        2.200248328e-4,
        1.043637593e-2,
        1.624820318e-1,
        7.961564959e-1,
        8.210152774e-1,
    ];

    #[allow(clippy::excessive_precision)]
    const Q: [f32; 5] = [
        2.631846970e-1,
        1.076976492,
        4.987528350e-1,
        -5.512498495e-2,
        6.521209011e-3,
    ];

    for x in samples {
        let a = x.abs();
        *x = if a <= 0.04045 {
            a / 12.92
        } else {
            eval_rational_poly(a, P, Q)
        }
        .copysign(*x);
    }
}

/// Exact sRGB transfer function, sign-preserving; the polynomial
/// approximations are checked against this.
pub fn linear_to_srgb_exact(x: f32) -> f32 {
    let a = x.abs();
    let v = if a <= 0.0031308 {
        a * 12.92
    } else {
        1.055 * a.powf(1.0 / 2.4) - 0.055
    };
    v.copysign(x)
}

/// Exact inverse of [`linear_to_srgb_exact`].
pub fn srgb_to_linear_exact(x: f32) -> f32 {
    let a = x.abs();
    let v = if a <= 0.04045 {
        a / 12.92
    } else {
        ((a + 0.055) / 1.055).powf(2.4)
    };
    v.copysign(x)
}

/// Applies the sRGB transfer curve to a row of linear samples and quantizes
/// to 8 bits.
pub fn linear_to_srgb8_row(row_in: &[f32], row_out: &mut [u8]) {
    let mut scratch = row_in.to_vec();
    linear_to_srgb(&mut scratch);
    for (out, &v) in row_out.iter_mut().zip(scratch.iter()) {
        *out = (v * 255.0).round().clamp(0.0, 255.0) as u8;
    }
}

/// Quantizes a row of linear samples (e.g. alpha) to 8 bits without a
/// transfer curve.
pub fn linear_to_8bit_row(row_in: &[f32], row_out: &mut [u8]) {
    for (out, &v) in row_out.iter_mut().zip(row_in.iter()) {
        *out = (v * 255.0).round().clamp(0.0, 255.0) as u8;
    }
}

#[cfg(test)]
mod test {
    use super::*;
    use crate::util::test::assert_almost_eq;

    #[test]
    fn roundtrip_within_tolerance() {
        for i in 0..=1000 {
            let x = i as f32 / 1000.0;
            let mut v = [x];
            linear_to_srgb(&mut v);
            srgb_to_linear(&mut v);
            assert_almost_eq(v[0], x, 1e-3);

            let mut v = [x];
            srgb_to_linear(&mut v);
            linear_to_srgb(&mut v);
            assert_almost_eq(v[0], x, 1e-3);
        }
    }

    #[test]
    fn matches_exact_formulas() {
        for i in 0..=1000 {
            let x = i as f32 / 1000.0;
            let mut v = [x];
            linear_to_srgb(&mut v);
            assert_almost_eq(v[0], linear_to_srgb_exact(x), 1e-3);

            let mut v = [x];
            srgb_to_linear(&mut v);
            assert_almost_eq(v[0], srgb_to_linear_exact(x), 1e-3);
        }
    }

    #[test]
    fn odd_functions() {
        for x in [0.001f32, 0.01, 0.2, 0.9] {
            let mut pos = [x];
            let mut neg = [-x];
            linear_to_srgb(&mut pos);
            linear_to_srgb(&mut neg);
            assert_almost_eq(pos[0], -neg[0], 1e-7);
            assert_eq!(linear_to_srgb_exact(-x), -linear_to_srgb_exact(x));
            assert_eq!(srgb_to_linear_exact(-x), -srgb_to_linear_exact(x));
        }
    }

    #[test]
    fn srgb8_row_clamps() {
        let row = [-0.5f32, 0.0, 0.5, 1.0, 2.0];
        let mut out = [0u8; 5];
        linear_to_srgb8_row(&row, &mut out);
        assert_eq!(out[0], 0);
        assert_eq!(out[1], 0);
        assert_eq!(out[3], 255);
        assert_eq!(out[4], 255);
        // Mid-gray: linear 0.5 is sRGB ~188.
        assert_eq!(out[2], 188);
    }

    #[test]
    fn alpha_row_is_linear() {
        let row = [0.0f32, 0.5, 1.0];
        let mut out = [0u8; 3];
        linear_to_8bit_row(&row, &mut out);
        assert_eq!(out, [0, 128, 255]);
    }
}
