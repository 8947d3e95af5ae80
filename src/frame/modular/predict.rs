// Copyright (c) the JPEG XL Project Authors. All rights reserved.
//
// Use of this source code is governed by a BSD-style
// license that can be found in the LICENSE file.

use num_derive::FromPrimitive;
use num_traits::FromPrimitive;

use crate::error::{Error, Result};
use crate::headers::modular::WeightedHeader;
use crate::image::Image;
use crate::util::FloorLog2;

#[repr(u8)]
#[derive(Debug, FromPrimitive, Clone, Copy, PartialEq, Eq)]
pub enum Predictor {
    Zero = 0,
    West = 1,
    North = 2,
    AverageWestAndNorth = 3,
    Select = 4,
    Gradient = 5,
    Weighted = 6,
    NorthEast = 7,
    NorthWest = 8,
    WestWest = 9,
    AverageWestAndNorthWest = 10,
    AverageNorthAndNorthWest = 11,
    AverageNorthAndNorthEast = 12,
    AverageAll = 13,
}

impl TryFrom<u32> for Predictor {
    type Error = Error;

    fn try_from(value: u32) -> Result<Self> {
        Self::from_u32(value).ok_or(Error::InvalidPredictor(value))
    }
}

/// Neighborhood of a pixel, with the usual edge substitutions applied.
#[derive(Debug, Clone, Copy)]
pub struct PredictionData {
    pub left: i32,
    pub top: i32,
    pub toptop: i32,
    pub topleft: i32,
    pub topright: i32,
    pub leftleft: i32,
    pub toprightright: i32,
}

impl PredictionData {
    pub fn get(img: &Image<i32>, x: usize, y: usize) -> PredictionData {
        let row = img.row(y);
        let top_row = if y > 0 { img.row(y - 1) } else { row };
        let xsize = img.xsize();
        let left = if x > 0 {
            row[x - 1]
        } else if y > 0 {
            top_row[x]
        } else {
            0
        };
        let top = if y > 0 { top_row[x] } else { left };
        let topleft = if x > 0 && y > 0 { top_row[x - 1] } else { left };
        let topright = if x + 1 < xsize && y > 0 {
            top_row[x + 1]
        } else {
            top
        };
        let leftleft = if x > 1 { row[x - 2] } else { left };
        let toptop = if y > 1 { img.row(y - 2)[x] } else { top };
        let toprightright = if x + 2 < xsize && y > 0 {
            top_row[x + 2]
        } else {
            topright
        };
        PredictionData {
            left,
            top,
            toptop,
            topleft,
            topright,
            leftleft,
            toprightright,
        }
    }
}

impl Predictor {
    pub const NUM_PREDICTORS: u32 = Predictor::AverageAll as u32 + 1;

    pub fn predict_one(&self, data: PredictionData, wp_pred: i64) -> i64 {
        let PredictionData {
            left,
            top,
            toptop,
            topleft,
            topright,
            leftleft,
            toprightright,
        } = data;
        let (left, top, toptop, topleft, topright, leftleft, toprightright) = (
            left as i64,
            top as i64,
            toptop as i64,
            topleft as i64,
            topright as i64,
            leftleft as i64,
            toprightright as i64,
        );
        match self {
            Predictor::Zero => 0,
            Predictor::West => left,
            Predictor::North => top,
            Predictor::Select => Self::select(left, top, topleft),
            Predictor::Gradient => Self::clamped_gradient(left, top, topleft),
            Predictor::Weighted => wp_pred,
            Predictor::WestWest => leftleft,
            Predictor::NorthEast => topright,
            Predictor::NorthWest => topleft,
            Predictor::AverageWestAndNorth => (top + left) / 2,
            Predictor::AverageWestAndNorthWest => (left + topleft) / 2,
            Predictor::AverageNorthAndNorthWest => (top + topleft) / 2,
            Predictor::AverageNorthAndNorthEast => (top + topright) / 2,
            Predictor::AverageAll => {
                (6 * top - 2 * toptop + 7 * left + leftleft + toprightright + 3 * topright + 8) / 16
            }
        }
    }

    fn select(left: i64, top: i64, topleft: i64) -> i64 {
        let p = left + top - topleft;
        if (p - left).abs() < (p - top).abs() {
            left
        } else {
            top
        }
    }

    fn clamped_gradient(left: i64, top: i64, topleft: i64) -> i64 {
        // Same code/logic as libjxl.
        let min = left.min(top);
        let max = left.max(top);
        let grad = left + top - topleft;
        let grad_clamp_max = if topleft < min { max } else { grad };
        if topleft > max {
            min
        } else {
            grad_clamp_max
        }
    }
}

const PRED_EXTRA_BITS: i64 = 3;
const PREDICTION_ROUND: i64 = ((1 << PRED_EXTRA_BITS) >> 1) - 1;
const NUM_WP_PREDICTORS: usize = 4;

/// State of the weighted predictor: four sub-predictors whose contributions
/// are weighted by their recent errors, tracked per column over two rows.
#[derive(Debug)]
pub struct WeightedPredictorState {
    header: WeightedHeader,
    xsize: usize,
    pred: i64,
    prediction: [i64; NUM_WP_PREDICTORS],
    pred_errors: [Vec<u32>; NUM_WP_PREDICTORS],
    error: Vec<i32>,
    divlookup: [i64; 64],
}

impl WeightedPredictorState {
    pub fn new(header: &WeightedHeader, xsize: usize) -> WeightedPredictorState {
        let row = vec![0u32; (xsize + 2) * 2];
        let mut divlookup = [0i64; 64];
        for (i, v) in divlookup.iter_mut().enumerate() {
            *v = (1i64 << 24) / (i as i64 + 1);
        }
        WeightedPredictorState {
            header: header.clone(),
            xsize,
            pred: 0,
            prediction: [0; NUM_WP_PREDICTORS],
            pred_errors: [row.clone(), row.clone(), row.clone(), row],
            error: vec![0i32; (xsize + 2) * 2],
            divlookup,
        }
    }

    // Approximates 4 + (maxweight << 24) / (x + 1).
    fn error_weight(&self, x: u64, maxweight: u32) -> u32 {
        let shift = ((x + 1).floor_log2() as i64 - 5).max(0) as u32;
        (4 + ((((maxweight as u64) << 24) / ((x >> shift) + 1)) >> shift)) as u32
    }

    /// Computes the weighted prediction for `(x, y)` and the error property
    /// fed to the MA tree (the neighbor tendency error of largest magnitude).
    pub fn predict_and_property(
        &mut self,
        x: usize,
        y: usize,
        data: &PredictionData,
    ) -> (i64, i32) {
        let xsize = self.xsize;
        let cur_row = if y & 1 == 1 { 0 } else { xsize + 2 };
        let prev_row = if y & 1 == 1 { xsize + 2 } else { 0 };
        let pos_n = prev_row + x;
        let pos_ne = if x + 1 < xsize { pos_n + 1 } else { pos_n };
        let pos_nw = if x > 0 { pos_n - 1 } else { pos_n };

        let mut weights = [0u32; NUM_WP_PREDICTORS];
        for i in 0..NUM_WP_PREDICTORS {
            let errors = self.pred_errors[i][pos_n] as u64
                + self.pred_errors[i][pos_ne] as u64
                + self.pred_errors[i][pos_nw] as u64;
            weights[i] = self.error_weight(errors, self.header.w[i]);
        }

        let n = (data.top as i64) << PRED_EXTRA_BITS;
        let w = (data.left as i64) << PRED_EXTRA_BITS;
        let ne = (data.topright as i64) << PRED_EXTRA_BITS;
        let nw = (data.topleft as i64) << PRED_EXTRA_BITS;
        let nn = (data.toptop as i64) << PRED_EXTRA_BITS;

        let te_w = if x == 0 {
            0
        } else {
            self.error[cur_row + x - 1] as i64
        };
        let te_n = self.error[pos_n] as i64;
        let te_nw = if x == 0 {
            te_n
        } else {
            self.error[pos_n - 1] as i64
        };
        let te_ne = if x + 1 < xsize {
            self.error[pos_n + 1] as i64
        } else {
            te_n
        };
        let sum_wn = te_n + te_w;

        let header = &self.header;
        self.prediction[0] = w + ne - n;
        self.prediction[1] = n - (((sum_wn + te_ne) * header.p1 as i64) >> 5);
        self.prediction[2] = w - (((sum_wn + te_nw) * header.p2 as i64) >> 5);
        self.prediction[3] = n
            - ((te_nw * header.p3a as i64
                + te_n * header.p3b as i64
                + te_ne * header.p3c as i64
                + (nn - n) * header.p3d as i64
                + (nw - w) * header.p3e as i64)
                >> 5);

        let sum_weights: u32 = weights.iter().sum();
        // Each weight is at least 4, so log_weight is at least 4.
        let log_weight = (sum_weights as u64).floor_log2() as u32;
        for weight in weights.iter_mut() {
            *weight >>= log_weight - 4;
        }
        let sum_weights: i64 = weights.iter().map(|&w| w as i64).sum();
        let mut s = (sum_weights >> 1) - 1;
        for i in 0..NUM_WP_PREDICTORS {
            s += self.prediction[i] * weights[i] as i64;
        }
        let mut pred = (s * self.divlookup[(sum_weights - 1) as usize]) >> 24;
        if ((te_n ^ te_w) | (te_n ^ te_nw)) <= 0 {
            let min = w.min(n).min(ne);
            let max = w.max(n).max(ne);
            pred = pred.clamp(min, max);
        }
        self.pred = pred;

        let mut max_error = te_w;
        for te in [te_n, te_nw, te_ne] {
            if te.abs() > max_error.abs() {
                max_error = te;
            }
        }
        ((pred + PREDICTION_ROUND) >> PRED_EXTRA_BITS, max_error as i32)
    }

    /// Accounts the decoded sample into the per-column error state.
    pub fn update_errors(&mut self, value: i64, x: usize, y: usize) {
        let xsize = self.xsize;
        let cur_row = if y & 1 == 1 { 0 } else { xsize + 2 };
        let prev_row = if y & 1 == 1 { xsize + 2 } else { 0 };
        let value = value << PRED_EXTRA_BITS;
        self.error[cur_row + x] = (self.pred - value) as i32;
        for i in 0..NUM_WP_PREDICTORS {
            let err = (((self.prediction[i] - value).abs() + PREDICTION_ROUND)
                >> PRED_EXTRA_BITS) as u32;
            self.pred_errors[i][cur_row + x] = err;
            // Adding the error to the NE slot spreads it to the E and EE
            // predictions of this row.
            self.pred_errors[i][prev_row + x + 1] =
                self.pred_errors[i][prev_row + x + 1].wrapping_add(err);
        }
    }
}

#[cfg(test)]
mod test {
    use super::*;

    fn flat_data(value: i32) -> PredictionData {
        PredictionData {
            left: value,
            top: value,
            toptop: value,
            topleft: value,
            topright: value,
            leftleft: value,
            toprightright: value,
        }
    }

    #[test]
    fn simple_predictors() {
        let data = PredictionData {
            left: 3,
            top: 10,
            toptop: 0,
            topleft: 5,
            topright: 7,
            leftleft: 1,
            toprightright: 9,
        };
        assert_eq!(Predictor::Zero.predict_one(data, 42), 0);
        assert_eq!(Predictor::West.predict_one(data, 42), 3);
        assert_eq!(Predictor::North.predict_one(data, 42), 10);
        assert_eq!(Predictor::AverageWestAndNorth.predict_one(data, 42), 6);
        assert_eq!(Predictor::Weighted.predict_one(data, 42), 42);
    }

    #[test]
    fn select_prefers_closer_neighbor() {
        // (L, T, TL) = (20, 10, 15): p = 15, |p-L| = 5 >= |p-T| = 5 -> T.
        let data = PredictionData {
            left: 20,
            top: 10,
            toptop: 0,
            topleft: 15,
            topright: 0,
            leftleft: 0,
            toprightright: 0,
        };
        assert_eq!(Predictor::Select.predict_one(data, 0), 10);
    }

    #[test]
    fn clamped_gradient_within_bounds() {
        for (left, top, topleft) in [
            (10i64, 20, 5),
            (10, 20, 30),
            (-5, 3, 1),
            (100, -100, 0),
            (7, 7, 7),
        ] {
            let grad = Predictor::clamped_gradient(left, top, topleft);
            assert!(grad >= left.min(top));
            assert!(grad <= left.max(top));
        }
    }

    #[test]
    fn weighted_predictor_flat_image() {
        // On a constant image with no accumulated errors, every sub-predictor
        // agrees and the weighted prediction is exact.
        let header = WeightedHeader::default();
        let mut state = WeightedPredictorState::new(&header, 8);
        for y in 1..3usize {
            for x in 1..7usize {
                let (pred, property) = state.predict_and_property(x, y, &flat_data(42));
                assert_eq!(pred, 42);
                assert_eq!(property, 0);
                state.update_errors(42, x, y);
            }
        }
    }
}
