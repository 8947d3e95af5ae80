// Copyright (c) the JPEG XL Project Authors. All rights reserved.
//
// Use of this source code is governed by a BSD-style
// license that can be found in the LICENSE file.

pub fn assert_almost_eq(a: f32, b: f32, eps: f32) {
    assert!(
        (a - b).abs() <= eps,
        "assertion failed: {a} differs from {b} by more than {eps}"
    );
}

pub fn assert_all_almost_eq(a: &[f32], b: &[f32], eps: f32) {
    assert_eq!(a.len(), b.len());
    for (x, y) in a.iter().zip(b.iter()) {
        assert!(
            (x - y).abs() <= eps,
            "assertion failed: {a:?} differs from {b:?} by more than {eps}"
        );
    }
}
