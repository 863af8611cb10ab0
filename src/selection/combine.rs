//! Mask compositing.
//!
//! Folds a rasterized [`SelectionShape`] into an existing coverage mask with
//! one of four boolean-like modes, plus the two whole-mask operations that
//! selection commands need:
//! - **invert**: complement every pixel (select all when nothing exists yet)
//! - **bake_offset**: commit a pending move by shifting the mask content
//!
//! All operations are copy-on-combine: the input mask is never modified,
//! a new mask is returned. Rows are processed in parallel with rayon.
//!
//! Per-pixel formulas on 8-bit coverage (`s` = shape, `d` = existing):
//! - Replace:   `s`
//! - Add:       `s + d * (255 - s) / 255`  (over)
//! - Subtract:  `d * (255 - s) / 255`      (clear)
//! - Intersect: `d * s / 255`              (in)

use log::{debug, warn};
use rayon::prelude::*;

use super::mask::CoverageMask;
use super::shape::SelectionShape;

/// How a new shape merges with the current selection.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Hash)]
pub enum CombineMode {
    /// Discard the existing selection, keep only the new shape.
    #[default]
    Replace,
    /// Union.
    Add,
    /// Difference: existing minus shape.
    Subtract,
    /// Keep only pixels covered by both.
    Intersect,
}

impl CombineMode {
    pub fn label(&self) -> &'static str {
        match self {
            CombineMode::Replace => "Replace",
            CombineMode::Add => "Add",
            CombineMode::Subtract => "Subtract",
            CombineMode::Intersect => "Intersect",
        }
    }

    pub fn all() -> &'static [CombineMode] {
        &[
            CombineMode::Replace,
            CombineMode::Add,
            CombineMode::Subtract,
            CombineMode::Intersect,
        ]
    }

    /// Parse a mode name, case-insensitively ("union" and "exclude" are
    /// accepted as aliases).
    pub fn from_name(name: &str) -> Option<Self> {
        match name.to_ascii_lowercase().as_str() {
            "replace" => Some(CombineMode::Replace),
            "add" | "union" => Some(CombineMode::Add),
            "subtract" | "exclude" => Some(CombineMode::Subtract),
            "intersect" => Some(CombineMode::Intersect),
            _ => None,
        }
    }

    /// Mode from its position in [`CombineMode::all`].
    pub fn from_index(index: u8) -> Option<Self> {
        Self::all().get(index as usize).copied()
    }

    /// Combine one existing coverage value with one shape coverage value.
    #[inline]
    pub fn apply(self, existing: u8, shape: u8) -> u8 {
        match self {
            CombineMode::Replace => shape,
            CombineMode::Add => shape + mul_div_255(existing, 255 - shape),
            CombineMode::Subtract => mul_div_255(existing, 255 - shape),
            CombineMode::Intersect => mul_div_255(existing, shape),
        }
    }
}

/// `a * b / 255`, rounded, exact for 0 and 255.
#[inline]
fn mul_div_255(a: u8, b: u8) -> u8 {
    let t = a as u32 * b as u32 + 128;
    ((t + (t >> 8)) >> 8) as u8
}

/// Existing mask to combine against, reallocated when absent or mis-sized.
fn base_mask<'a>(
    existing: Option<&'a CoverageMask>,
    width: usize,
    height: usize,
) -> std::borrow::Cow<'a, CoverageMask> {
    match existing {
        Some(mask) if mask.size_matches(width, height) => std::borrow::Cow::Borrowed(mask),
        Some(mask) => {
            warn!(
                "Selection mask is {}x{} but image is {}x{}; starting from an empty mask",
                mask.width(),
                mask.height(),
                width,
                height
            );
            std::borrow::Cow::Owned(CoverageMask::new(width, height))
        }
        None => std::borrow::Cow::Owned(CoverageMask::new(width, height)),
    }
}

/// Fold a shape into an existing mask.
///
/// # Arguments
/// * `existing` - Current mask, or `None` when no mask has been allocated
/// * `shape` - Shape in image coordinates
/// * `mode` - Combine mode
/// * `width`, `height` - Image dimensions; a mask of any other size is
///   discarded and replaced by an empty one
///
/// # Returns
/// A new mask of exactly `width` x `height`.
pub fn combine(
    existing: Option<&CoverageMask>,
    shape: &SelectionShape,
    mode: CombineMode,
    width: usize,
    height: usize,
) -> CoverageMask {
    if width == 0 || height == 0 {
        return CoverageMask::new(width, height);
    }

    let coverage = shape.rasterize(width, height);
    if mode == CombineMode::Replace {
        return coverage;
    }

    let base = base_mask(existing, width, height);
    debug!("Combining {}x{} selection with mode {}", width, height, mode.label());

    let mut out = CoverageMask::new(width, height);
    out.as_slice_mut()
        .par_chunks_mut(width)
        .zip(base.as_slice().par_chunks(width))
        .zip(coverage.as_slice().par_chunks(width))
        .for_each(|((dst, existing), shape)| {
            for ((o, &d), &s) in dst.iter_mut().zip(existing).zip(shape) {
                *o = mode.apply(d, s);
            }
        });

    out
}

/// Complement a mask over the full image extent.
///
/// Without an existing mask this selects everything.
pub fn invert(existing: Option<&CoverageMask>, width: usize, height: usize) -> CoverageMask {
    let base = match existing {
        Some(_) => base_mask(existing, width, height),
        None => return CoverageMask::filled(width, height, 255),
    };
    if width == 0 || height == 0 {
        return CoverageMask::new(width, height);
    }

    let mut out = CoverageMask::new(width, height);
    out.as_slice_mut()
        .par_chunks_mut(width)
        .zip(base.as_slice().par_chunks(width))
        .for_each(|(dst, src)| {
            for (o, &v) in dst.iter_mut().zip(src) {
                *o = 255 - v;
            }
        });
    out
}

/// Shift mask content by (dx, dy).
///
/// Content moved past an edge is dropped; uncovered pixels become 0.
pub fn bake_offset(mask: &CoverageMask, dx: i32, dy: i32) -> CoverageMask {
    let width = mask.width();
    let height = mask.height();
    let mut out = CoverageMask::new(width, height);
    if width == 0 || height == 0 {
        return out;
    }
    if dx == 0 && dy == 0 {
        return mask.clone();
    }

    let src = mask.as_slice();
    let w = width as i64;
    let dx = dx as i64;
    let dy = dy as i64;

    // Destination columns that receive source content
    let x_start = dx.clamp(0, w) as usize;
    let x_end = (w + dx).clamp(0, w) as usize;

    out.as_slice_mut()
        .par_chunks_mut(width)
        .enumerate()
        .for_each(|(y, row)| {
            let sy = y as i64 - dy;
            if sy < 0 || sy >= height as i64 || x_start >= x_end {
                return;
            }
            let src_row = &src[sy as usize * width..(sy as usize + 1) * width];
            let sx_start = (x_start as i64 - dx) as usize;
            let len = x_end - x_start;
            row[x_start..x_end].copy_from_slice(&src_row[sx_start..sx_start + len]);
        });

    out
}

#[cfg(test)]
mod tests {
    use super::*;

    fn rect(x: i32, y: i32, w: i32, h: i32) -> SelectionShape {
        SelectionShape::rect(x, y, w, h)
    }

    #[test]
    fn test_mul_div_255_endpoints() {
        assert_eq!(mul_div_255(255, 255), 255);
        assert_eq!(mul_div_255(0, 255), 0);
        assert_eq!(mul_div_255(255, 0), 0);
        assert_eq!(mul_div_255(200, 255), 200);
        assert_eq!(mul_div_255(128, 128), 64);
    }

    #[test]
    fn test_replace_discards_existing() {
        let first = combine(None, &rect(0, 0, 4, 4), CombineMode::Replace, 10, 10);
        let second = combine(Some(&first), &rect(6, 6, 2, 2), CombineMode::Replace, 10, 10);
        assert_eq!(second.selected_count(), 4);
        assert!(!second.is_selected(0, 0));
    }

    #[test]
    fn test_add_is_union() {
        let a = combine(None, &rect(0, 0, 4, 4), CombineMode::Replace, 10, 10);
        let b = combine(Some(&a), &rect(2, 2, 4, 4), CombineMode::Add, 10, 10);
        assert_eq!(b.selected_count(), 16 + 16 - 4);
    }

    #[test]
    fn test_add_contained_shape_is_idempotent() {
        let a = combine(None, &rect(0, 0, 8, 8), CombineMode::Replace, 10, 10);
        let b = combine(Some(&a), &rect(2, 2, 3, 3), CombineMode::Add, 10, 10);
        assert_eq!(a, b);
    }

    #[test]
    fn test_subtract_removes_overlap() {
        let a = combine(None, &rect(0, 0, 4, 4), CombineMode::Replace, 10, 10);
        let b = combine(Some(&a), &rect(2, 0, 4, 4), CombineMode::Subtract, 10, 10);
        assert_eq!(b.selected_count(), 8);
        assert!(b.is_selected(1, 3));
        assert!(!b.is_selected(2, 0));
    }

    #[test]
    fn test_intersect_is_and() {
        let a = combine(None, &rect(0, 0, 6, 6), CombineMode::Replace, 10, 10);
        let b = combine(Some(&a), &rect(3, 3, 6, 6), CombineMode::Intersect, 10, 10);
        let sa = rect(0, 0, 6, 6).rasterize(10, 10);
        let sb = rect(3, 3, 6, 6).rasterize(10, 10);
        for y in 0..10 {
            for x in 0..10 {
                let expected = sa.is_selected(x, y) && sb.is_selected(x, y);
                assert_eq!(b.is_selected(x, y), expected, "pixel ({}, {})", x, y);
            }
        }
    }

    #[test]
    fn test_combine_against_missing_mask() {
        let added = combine(None, &rect(1, 1, 2, 2), CombineMode::Add, 5, 5);
        assert_eq!(added.selected_count(), 4);
        let subtracted = combine(None, &rect(1, 1, 2, 2), CombineMode::Subtract, 5, 5);
        assert!(subtracted.is_empty());
    }

    #[test]
    fn test_mismatched_mask_is_reallocated() {
        let _ = env_logger::builder().is_test(true).try_init();
        let stale = CoverageMask::filled(3, 3, 255);
        let out = combine(Some(&stale), &rect(0, 0, 1, 1), CombineMode::Add, 6, 4);
        assert_eq!(out.width(), 6);
        assert_eq!(out.height(), 4);
        assert_eq!(out.selected_count(), 1);
    }

    #[test]
    fn test_combine_does_not_modify_input() {
        let a = combine(None, &rect(0, 0, 4, 4), CombineMode::Replace, 8, 8);
        let before = a.clone();
        let _ = combine(Some(&a), &rect(0, 0, 8, 8), CombineMode::Subtract, 8, 8);
        assert_eq!(a, before);
    }

    #[test]
    fn test_double_invert_is_identity() {
        let mut mask = rect(1, 2, 3, 4).rasterize(7, 9);
        mask.set(6, 8, 77);
        let once = invert(Some(&mask), 7, 9);
        assert_eq!(once.get(6, 8), 178);
        assert!(!once.is_selected(1, 2));
        let twice = invert(Some(&once), 7, 9);
        assert_eq!(twice, mask);

        let empty = CoverageMask::new(5, 5);
        let full = invert(Some(&empty), 5, 5);
        assert_eq!(full.selected_count(), 25);
        assert_eq!(invert(Some(&full), 5, 5), empty);
    }

    #[test]
    fn test_invert_without_mask_selects_all() {
        let all = invert(None, 4, 3);
        assert_eq!(all.selected_count(), 12);
    }

    #[test]
    fn test_bake_offset_shifts_content() {
        let mask = rect(2, 2, 3, 3).rasterize(10, 10);
        let moved = bake_offset(&mask, 4, -1);
        assert_eq!(moved.selected_count(), 9);
        assert!(moved.is_selected(6, 1));
        assert!(moved.is_selected(8, 3));
        assert!(!moved.is_selected(2, 2));
    }

    #[test]
    fn test_bake_offset_clips_at_edges() {
        let mask = rect(0, 0, 4, 4).rasterize(6, 6);
        let moved = bake_offset(&mask, 4, 4);
        assert_eq!(moved.selected_count(), 4);
        let gone = bake_offset(&mask, -10, 0);
        assert!(gone.is_empty());
    }

    #[test]
    fn test_mode_names() {
        assert_eq!(CombineMode::from_name("Union"), Some(CombineMode::Add));
        assert_eq!(CombineMode::from_name("intersect"), Some(CombineMode::Intersect));
        assert_eq!(CombineMode::from_name("xor"), None);
        assert_eq!(CombineMode::from_index(2), Some(CombineMode::Subtract));
        assert_eq!(CombineMode::default(), CombineMode::Replace);
    }
}
