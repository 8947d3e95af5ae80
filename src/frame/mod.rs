// Copyright (c) the JPEG XL Project Authors. All rights reserved.
//
// Use of this source code is governed by a BSD-style
// license that can be found in the LICENSE file.

pub mod modular;

use crate::GROUP_DIM;
use crate::image::Rect;

/// Geometry of the group grid covering a frame.
///
/// Groups decode independently: each owns its bit reader and entropy state,
/// sharing only the read-only global tree and code.
#[derive(Debug, Clone, Copy)]
pub struct GroupGeometry {
    xsize: usize,
    ysize: usize,
    group_dim: usize,
}

impl GroupGeometry {
    pub fn new(xsize: usize, ysize: usize) -> GroupGeometry {
        GroupGeometry {
            xsize,
            ysize,
            group_dim: GROUP_DIM,
        }
    }

    pub fn groups_per_row(&self) -> usize {
        self.xsize.div_ceil(self.group_dim)
    }

    pub fn num_groups(&self) -> usize {
        self.groups_per_row() * self.ysize.div_ceil(self.group_dim)
    }

    /// The pixel rectangle of the given group, clamped to the frame.
    pub fn group_rect(&self, group_id: usize) -> Rect {
        let gx = group_id % self.groups_per_row();
        let gy = group_id / self.groups_per_row();
        Rect::new(
            gx * self.group_dim,
            gy * self.group_dim,
            self.group_dim.min(self.xsize - gx * self.group_dim),
            self.group_dim.min(self.ysize - gy * self.group_dim),
        )
    }
}

#[cfg(test)]
mod test {
    use super::*;

    #[test]
    fn group_grid() {
        let geometry = GroupGeometry::new(300, 257);
        assert_eq!(geometry.groups_per_row(), 2);
        assert_eq!(geometry.num_groups(), 4);
        assert_eq!(geometry.group_rect(0), Rect::new(0, 0, 256, 256));
        assert_eq!(geometry.group_rect(1), Rect::new(256, 0, 44, 256));
        assert_eq!(geometry.group_rect(3), Rect::new(256, 256, 44, 1));
    }
}
