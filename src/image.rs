// Copyright (c) the JPEG XL Project Authors. All rights reserved.
//
// Use of this source code is governed by a BSD-style
// license that can be found in the LICENSE file.

use std::fmt::Debug;

use crate::error::{Error, Result};

mod private {
    pub trait Sealed {}
}

pub trait ImageDataType: private::Sealed + Copy + Default + Debug + 'static {}

macro_rules! impl_image_data_type {
    ($ty: ty) => {
        impl private::Sealed for $ty {}
        impl ImageDataType for $ty {}
    };
}

impl_image_data_type!(u8);
impl_image_data_type!(u16);
impl_image_data_type!(u32);
impl_image_data_type!(i16);
impl_image_data_type!(i32);
impl_image_data_type!(f32);

/// Rows are padded so that the row pitch in bytes is a multiple of this.
const ROW_ALIGN_BYTES: usize = 64;

/// A dense 2-D array with an explicit stride.
///
/// Rows are disjoint; `row` and `row_mut` alias the same storage.
#[derive(Clone)]
pub struct Image<T: ImageDataType> {
    size: (usize, usize),
    stride: usize,
    data: Vec<T>,
}

impl<T: ImageDataType> Debug for Image<T> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "Image<{}x{}>", self.size.0, self.size.1)
    }
}

impl<T: ImageDataType> Image<T> {
    pub fn new(xsize: usize, ysize: usize) -> Result<Image<T>> {
        // These limits let us not worry about overflows.
        if xsize as u64 >= i64::MAX as u64 / 4 || ysize as u64 >= i64::MAX as u64 / 4 {
            return Err(Error::ImageSizeTooLarge(xsize, ysize));
        }
        let elems_per_align = (ROW_ALIGN_BYTES / std::mem::size_of::<T>()).max(1);
        let stride = xsize
            .checked_next_multiple_of(elems_per_align)
            .ok_or(Error::ImageSizeTooLarge(xsize, ysize))?
            .max(elems_per_align);
        let total_size = stride
            .checked_mul(ysize)
            .ok_or(Error::ImageSizeTooLarge(xsize, ysize))?;
        let mut data = vec![];
        data.try_reserve_exact(total_size)?;
        data.resize(total_size, T::default());
        Ok(Image {
            size: (xsize, ysize),
            stride,
            data,
        })
    }

    pub fn new_with_value(xsize: usize, ysize: usize, value: T) -> Result<Image<T>> {
        let mut img = Self::new(xsize, ysize)?;
        img.data.fill(value);
        Ok(img)
    }

    pub fn size(&self) -> (usize, usize) {
        self.size
    }

    pub fn xsize(&self) -> usize {
        self.size.0
    }

    pub fn ysize(&self) -> usize {
        self.size.1
    }

    pub fn stride(&self) -> usize {
        self.stride
    }

    pub fn row(&self, y: usize) -> &[T] {
        debug_assert!(y < self.size.1);
        let start = y * self.stride;
        &self.data[start..start + self.size.0]
    }

    pub fn row_mut(&mut self, y: usize) -> &mut [T] {
        debug_assert!(y < self.size.1);
        let start = y * self.stride;
        &mut self.data[start..start + self.size.0]
    }

    /// Mutable access to two distinct rows at once.
    pub fn two_rows_mut(&mut self, y0: usize, y1: usize) -> (&mut [T], &mut [T]) {
        debug_assert!(y0 < y1 && y1 < self.size.1);
        let (a, b) = self.data.split_at_mut(y1 * self.stride);
        (
            &mut a[y0 * self.stride..y0 * self.stride + self.size.0],
            &mut b[..self.size.0],
        )
    }

    /// Copies the contents of `rect` within `other` into this image at `at`.
    pub fn copy_rect_from(&mut self, other: &Image<T>, rect: Rect, at: (usize, usize)) -> Result<()> {
        rect.check_within(other.size)?;
        Rect {
            x0: at.0,
            y0: at.1,
            xsize: rect.xsize,
            ysize: rect.ysize,
        }
        .check_within(self.size)?;
        for dy in 0..rect.ysize {
            let src = &other.row(rect.y0 + dy)[rect.x0..rect.x0 + rect.xsize];
            self.row_mut(at.1 + dy)[at.0..at.0 + rect.xsize].copy_from_slice(src);
        }
        Ok(())
    }
}

/// Three planes of equal dimensions.
#[derive(Debug)]
pub struct Image3<T: ImageDataType> {
    planes: [Image<T>; 3],
}

impl<T: ImageDataType> Image3<T> {
    pub fn new(xsize: usize, ysize: usize) -> Result<Image3<T>> {
        Ok(Image3 {
            planes: [
                Image::new(xsize, ysize)?,
                Image::new(xsize, ysize)?,
                Image::new(xsize, ysize)?,
            ],
        })
    }

    pub fn from_planes(planes: [Image<T>; 3]) -> Result<Image3<T>> {
        let size = planes[0].size();
        if planes.iter().any(|p| p.size() != size) {
            return Err(Error::MixingDifferentChannels);
        }
        Ok(Image3 { planes })
    }

    pub fn size(&self) -> (usize, usize) {
        self.planes[0].size()
    }

    pub fn plane(&self, c: usize) -> &Image<T> {
        &self.planes[c]
    }

    pub fn plane_mut(&mut self, c: usize) -> &mut Image<T> {
        &mut self.planes[c]
    }

    pub fn planes_mut(&mut self) -> &mut [Image<T>; 3] {
        &mut self.planes
    }
}

/// A rectangle within an image. Intersection and translation are total;
/// operations producing out-of-range rectangles yield empty ones.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Default)]
pub struct Rect {
    pub x0: usize,
    pub y0: usize,
    pub xsize: usize,
    pub ysize: usize,
}

impl Rect {
    pub fn new(x0: usize, y0: usize, xsize: usize, ysize: usize) -> Rect {
        Rect {
            x0,
            y0,
            xsize,
            ysize,
        }
    }

    pub fn is_empty(&self) -> bool {
        self.xsize == 0 || self.ysize == 0
    }

    pub fn x1(&self) -> usize {
        self.x0 + self.xsize
    }

    pub fn y1(&self) -> usize {
        self.y0 + self.ysize
    }

    pub fn intersection(&self, other: Rect) -> Rect {
        let x0 = self.x0.max(other.x0);
        let y0 = self.y0.max(other.y0);
        let x1 = self.x1().min(other.x1());
        let y1 = self.y1().min(other.y1());
        Rect {
            x0,
            y0,
            xsize: x1.saturating_sub(x0),
            ysize: y1.saturating_sub(y0),
        }
    }

    pub fn translate(&self, dx: i64, dy: i64) -> Rect {
        let x0 = self.x0 as i64 + dx;
        let y0 = self.y0 as i64 + dy;
        // A rectangle pushed past the origin is clipped to empty.
        if x0 < 0 || y0 < 0 {
            return Rect::default();
        }
        Rect {
            x0: x0 as usize,
            y0: y0 as usize,
            xsize: self.xsize,
            ysize: self.ysize,
        }
    }

    /// Clamps this rectangle to the given outer bounds.
    pub fn clamp(&self, xsize: usize, ysize: usize) -> Rect {
        self.intersection(Rect::new(0, 0, xsize, ysize))
    }

    fn check_within(&self, size: (usize, usize)) -> Result<()> {
        if self.x1() > size.0 || self.y1() > size.1 {
            Err(Error::RectOutOfBounds(
                self.xsize, self.ysize, self.x0, self.y0, size.0, size.1,
            ))
        } else {
            Ok(())
        }
    }
}

#[cfg(test)]
mod test {
    use super::*;

    #[test]
    fn row_pitch_is_aligned() -> Result<()> {
        let image = Image::<f32>::new(33, 4)?;
        assert!(image.stride() >= 33);
        assert_eq!(image.stride() * std::mem::size_of::<f32>() % 64, 0);
        Ok(())
    }

    #[test]
    fn huge_image() {
        assert!(Image::<u8>::new(1 << 62, 1 << 62).is_err());
    }

    #[test]
    fn rows_are_disjoint() -> Result<()> {
        let mut image = Image::<i32>::new(3, 2)?;
        image.row_mut(0).fill(1);
        image.row_mut(1).fill(2);
        assert_eq!(image.row(0), &[1, 1, 1]);
        assert_eq!(image.row(1), &[2, 2, 2]);
        Ok(())
    }

    #[test]
    fn rect_intersection() {
        let a = Rect::new(0, 0, 10, 10);
        let b = Rect::new(5, 5, 10, 10);
        assert_eq!(a.intersection(b), Rect::new(5, 5, 5, 5));
        let disjoint = Rect::new(20, 20, 2, 2);
        assert!(a.intersection(disjoint).is_empty());
    }

    #[test]
    fn rect_translate() {
        let r = Rect::new(2, 3, 4, 5);
        assert_eq!(r.translate(-1, 1), Rect::new(1, 4, 4, 5));
        assert!(r.translate(-10, 0).is_empty());
    }

    #[test]
    fn copy_rect() -> Result<()> {
        let mut src = Image::<u8>::new(4, 4)?;
        for y in 0..4 {
            for x in 0..4 {
                src.row_mut(y)[x] = (y * 4 + x) as u8;
            }
        }
        let mut dst = Image::<u8>::new(2, 2)?;
        dst.copy_rect_from(&src, Rect::new(1, 1, 2, 2), (0, 0))?;
        assert_eq!(dst.row(0), &[5, 6]);
        assert_eq!(dst.row(1), &[9, 10]);
        Ok(())
    }
}
