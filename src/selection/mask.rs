//! Coverage mask storage.
//!
//! A [`CoverageMask`] is a single-channel 8-bit raster: 0 = unselected,
//! 255 = fully selected. Rows are stored top to bottom in standard
//! (row-major) layout, so the row stride always equals the width.

use ndarray::{Array2, ArrayView2, ArrayView3, ArrayViewMut2};

use crate::error::{Result, SelectionError};

/// Owned 8-bit selection coverage raster.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct CoverageMask {
    data: Array2<u8>,
}

impl CoverageMask {
    /// Allocate an all-zero (nothing selected) mask.
    pub fn new(width: usize, height: usize) -> Self {
        Self {
            data: Array2::<u8>::zeros((height, width)),
        }
    }

    /// Allocate a mask with every pixel set to `value`.
    pub fn filled(width: usize, height: usize, value: u8) -> Self {
        Self {
            data: Array2::<u8>::from_elem((height, width), value),
        }
    }

    /// Wrap an existing (height, width) array.
    pub fn from_array(data: Array2<u8>) -> Self {
        let data = if data.is_standard_layout() {
            data
        } else {
            data.as_standard_layout().into_owned()
        };
        Self { data }
    }

    /// Copy a mask out of a strided byte buffer.
    ///
    /// # Arguments
    /// * `width` - Mask width in pixels
    /// * `height` - Mask height in pixels
    /// * `stride` - Bytes per row (must be >= width)
    /// * `data` - Row-major buffer of at least `stride * height` bytes
    pub fn from_raw(width: usize, height: usize, stride: usize, data: &[u8]) -> Result<Self> {
        if stride < width {
            return Err(SelectionError::InvalidMaskFormat(format!(
                "stride {} is smaller than width {}",
                stride, width
            )));
        }
        let required = stride * height;
        if data.len() < required {
            return Err(SelectionError::InvalidMaskFormat(format!(
                "buffer holds {} bytes, {}x{} with stride {} needs {}",
                data.len(),
                width,
                height,
                stride,
                required
            )));
        }

        let mut mask = Self::new(width, height);
        for (y, mut row) in mask.data.rows_mut().into_iter().enumerate() {
            let src = &data[y * stride..y * stride + width];
            for (dst, &v) in row.iter_mut().zip(src) {
                *dst = v;
            }
        }
        Ok(mask)
    }

    /// Copy a mask out of an image array shaped (height, width, channels).
    ///
    /// Only single-channel input is accepted.
    pub fn from_image_view(image: ArrayView3<u8>) -> Result<Self> {
        let (height, width, channels) = image.dim();
        if channels != 1 {
            return Err(SelectionError::InvalidMaskFormat(format!(
                "expected 1 channel, got {}",
                channels
            )));
        }
        let mut mask = Self::new(width, height);
        for y in 0..height {
            for x in 0..width {
                mask.data[[y, x]] = image[[y, x, 0]];
            }
        }
        Ok(mask)
    }

    #[inline]
    pub fn width(&self) -> usize {
        self.data.ncols()
    }

    #[inline]
    pub fn height(&self) -> usize {
        self.data.nrows()
    }

    /// Bytes between the starts of two consecutive rows.
    #[inline]
    pub fn stride(&self) -> usize {
        self.width()
    }

    /// True if the mask has exactly the given dimensions.
    #[inline]
    pub fn size_matches(&self, width: usize, height: usize) -> bool {
        self.width() == width && self.height() == height
    }

    /// Coverage at (x, y). Panics when out of range, like slice indexing.
    #[inline]
    pub fn get(&self, x: usize, y: usize) -> u8 {
        self.data[[y, x]]
    }

    /// Coverage at a possibly out-of-range position; outside reads as 0.
    #[inline]
    pub fn get_or_zero(&self, x: isize, y: isize) -> u8 {
        if x < 0 || y < 0 {
            return 0;
        }
        self.data.get((y as usize, x as usize)).copied().unwrap_or(0)
    }

    #[inline]
    pub fn set(&mut self, x: usize, y: usize, value: u8) {
        self.data[[y, x]] = value;
    }

    /// True if pixel (x, y) has any coverage.
    #[inline]
    pub fn is_selected(&self, x: usize, y: usize) -> bool {
        self.data[[y, x]] > 0
    }

    /// True if no pixel has any coverage.
    pub fn is_empty(&self) -> bool {
        self.data.iter().all(|&v| v == 0)
    }

    /// Number of pixels with non-zero coverage.
    pub fn selected_count(&self) -> usize {
        self.data.iter().filter(|&&v| v > 0).count()
    }

    pub fn view(&self) -> ArrayView2<'_, u8> {
        self.data.view()
    }

    pub fn view_mut(&mut self) -> ArrayViewMut2<'_, u8> {
        self.data.view_mut()
    }

    /// Row-major pixel bytes.
    pub fn as_slice(&self) -> &[u8] {
        self.data
            .as_slice()
            .expect("coverage mask is always in standard layout")
    }

    pub fn as_slice_mut(&mut self) -> &mut [u8] {
        self.data
            .as_slice_mut()
            .expect("coverage mask is always in standard layout")
    }

    pub fn into_array(self) -> Array2<u8> {
        self.data
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use ndarray::Array3;

    #[test]
    fn test_new_mask_is_empty() {
        let mask = CoverageMask::new(8, 4);
        assert_eq!(mask.width(), 8);
        assert_eq!(mask.height(), 4);
        assert_eq!(mask.stride(), 8);
        assert!(mask.is_empty());
        assert_eq!(mask.as_slice().len(), 32);
    }

    #[test]
    fn test_from_raw_skips_row_padding() {
        // 3x2 mask stored with a stride of 4
        let data = [1, 2, 3, 99, 4, 5, 6, 99];
        let mask = CoverageMask::from_raw(3, 2, 4, &data).unwrap();
        assert_eq!(mask.as_slice(), &[1, 2, 3, 4, 5, 6]);
    }

    #[test]
    fn test_from_raw_rejects_short_buffer() {
        let data = [0u8; 5];
        let err = CoverageMask::from_raw(3, 2, 3, &data).unwrap_err();
        assert!(matches!(err, SelectionError::InvalidMaskFormat(_)));
    }

    #[test]
    fn test_from_raw_rejects_small_stride() {
        let data = [0u8; 16];
        assert!(CoverageMask::from_raw(4, 2, 3, &data).is_err());
    }

    #[test]
    fn test_from_image_view_requires_single_channel() {
        let rgba = Array3::<u8>::zeros((4, 4, 4));
        assert!(CoverageMask::from_image_view(rgba.view()).is_err());

        let mut gray = Array3::<u8>::zeros((2, 3, 1));
        gray[[1, 2, 0]] = 255;
        let mask = CoverageMask::from_image_view(gray.view()).unwrap();
        assert_eq!(mask.get(2, 1), 255);
        assert_eq!(mask.selected_count(), 1);
    }

    #[test]
    fn test_get_or_zero_outside() {
        let mask = CoverageMask::filled(2, 2, 255);
        assert_eq!(mask.get_or_zero(-1, 0), 0);
        assert_eq!(mask.get_or_zero(0, 2), 0);
        assert_eq!(mask.get_or_zero(1, 1), 255);
    }

    #[test]
    fn test_clone_is_deep() {
        let mut a = CoverageMask::new(2, 2);
        let b = a.clone();
        a.set(0, 0, 255);
        assert_eq!(b.get(0, 0), 0);
    }
}
