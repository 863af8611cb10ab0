//! Drawing through the selection mask.
//!
//! Canvases are RGBA8 arrays shaped (height, width, 4) with straight
//! (non-premultiplied) alpha. Mask coverage scales the alpha of whatever is
//! drawn; canvas pixels outside the mask extent get no coverage.

use ndarray::Array3;

use super::mask::CoverageMask;
use crate::error::{Result, SelectionError};

/// Check that a canvas is RGBA.
pub fn check_rgba(canvas: &Array3<u8>) -> Result<()> {
    let (_, _, channels) = canvas.dim();
    if channels != 4 {
        return Err(SelectionError::InvalidImageFormat(format!(
            "expected 4 channels (RGBA), got {}",
            channels
        )));
    }
    Ok(())
}

/// Porter-Duff "over" of a straight-alpha color onto a straight-alpha pixel.
#[inline]
pub fn blend_over(dst: &mut [u8; 4], src: [u8; 4]) {
    let src_a = src[3];
    if src_a == 0 {
        return;
    }
    if src_a == 255 {
        *dst = src;
        return;
    }

    let src_af = src_a as f32 / 255.0;
    let dst_af = dst[3] as f32 / 255.0;
    let out_a = src_af + dst_af * (1.0 - src_af);

    if out_a > 0.0 {
        for c in 0..3 {
            let v = (src[c] as f32 * src_af + dst[c] as f32 * dst_af * (1.0 - src_af)) / out_a;
            dst[c] = v.round().clamp(0.0, 255.0) as u8;
        }
        dst[3] = (out_a * 255.0).round() as u8;
    }
}

/// Scale an 8-bit alpha by an 8-bit coverage.
#[inline]
fn scale_alpha(alpha: u8, coverage: u8) -> u8 {
    ((alpha as u32 * coverage as u32 + 127) / 255) as u8
}

#[inline]
fn coverage_at(mask: &CoverageMask, x: usize, y: usize, inverse: bool) -> u8 {
    if x >= mask.width() || y >= mask.height() {
        return 0;
    }
    let m = mask.get(x, y);
    if inverse {
        255 - m
    } else {
        m
    }
}

/// Composite `layer` onto `canvas`, with each layer pixel's alpha scaled by
/// mask coverage (or by its complement when `inverse` is set).
pub fn composite_masked(
    canvas: &mut Array3<u8>,
    layer: &Array3<u8>,
    mask: &CoverageMask,
    inverse: bool,
) -> Result<()> {
    check_rgba(canvas)?;
    check_rgba(layer)?;
    if canvas.dim() != layer.dim() {
        return Err(SelectionError::InvalidImageFormat(format!(
            "layer {:?} does not match canvas {:?}",
            layer.dim(),
            canvas.dim()
        )));
    }

    let (height, width, _) = canvas.dim();
    for y in 0..height {
        for x in 0..width {
            let coverage = coverage_at(mask, x, y, inverse);
            let alpha = scale_alpha(layer[[y, x, 3]], coverage);
            if alpha == 0 {
                continue;
            }
            let src = [layer[[y, x, 0]], layer[[y, x, 1]], layer[[y, x, 2]], alpha];
            let mut dst = [
                canvas[[y, x, 0]],
                canvas[[y, x, 1]],
                canvas[[y, x, 2]],
                canvas[[y, x, 3]],
            ];
            blend_over(&mut dst, src);
            for c in 0..4 {
                canvas[[y, x, c]] = dst[c];
            }
        }
    }
    Ok(())
}

/// Erase canvas content under the mask.
///
/// Fully covered pixels become transparent black; partial coverage reduces
/// alpha proportionally. With no mask the whole canvas is cleared.
pub fn clear_masked(canvas: &mut Array3<u8>, mask: Option<&CoverageMask>) -> Result<()> {
    check_rgba(canvas)?;
    let Some(mask) = mask else {
        canvas.fill(0);
        return Ok(());
    };

    let (height, width, _) = canvas.dim();
    for y in 0..height.min(mask.height()) {
        for x in 0..width.min(mask.width()) {
            let coverage = mask.get(x, y);
            match coverage {
                0 => {}
                255 => {
                    for c in 0..4 {
                        canvas[[y, x, c]] = 0;
                    }
                }
                _ => {
                    canvas[[y, x, 3]] = scale_alpha(canvas[[y, x, 3]], 255 - coverage);
                }
            }
        }
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::selection::shape::SelectionShape;

    fn solid(width: usize, height: usize, rgba: [u8; 4]) -> Array3<u8> {
        let mut img = Array3::<u8>::zeros((height, width, 4));
        for y in 0..height {
            for x in 0..width {
                for c in 0..4 {
                    img[[y, x, c]] = rgba[c];
                }
            }
        }
        img
    }

    #[test]
    fn test_blend_over_opaque_replaces() {
        let mut dst = [10, 20, 30, 255];
        blend_over(&mut dst, [200, 0, 0, 255]);
        assert_eq!(dst, [200, 0, 0, 255]);
    }

    #[test]
    fn test_blend_over_transparent_is_noop() {
        let mut dst = [10, 20, 30, 40];
        blend_over(&mut dst, [200, 0, 0, 0]);
        assert_eq!(dst, [10, 20, 30, 40]);
    }

    #[test]
    fn test_blend_over_half_on_empty() {
        let mut dst = [0, 0, 0, 0];
        blend_over(&mut dst, [255, 0, 0, 128]);
        assert_eq!(dst, [255, 0, 0, 128]);
    }

    #[test]
    fn test_composite_masked_only_inside() {
        let mut canvas = solid(6, 6, [0, 0, 255, 255]);
        let layer = solid(6, 6, [255, 0, 0, 255]);
        let mask = SelectionShape::rect(1, 1, 2, 2).rasterize(6, 6);
        composite_masked(&mut canvas, &layer, &mask, false).unwrap();
        assert_eq!(canvas[[1, 1, 0]], 255);
        assert_eq!(canvas[[1, 1, 2]], 0);
        assert_eq!(canvas[[0, 0, 0]], 0);
        assert_eq!(canvas[[0, 0, 2]], 255);
    }

    #[test]
    fn test_composite_inverse_mask() {
        let mut canvas = solid(4, 4, [0, 0, 0, 255]);
        let layer = solid(4, 4, [0, 255, 0, 255]);
        let mask = SelectionShape::rect(0, 0, 2, 4).rasterize(4, 4);
        composite_masked(&mut canvas, &layer, &mask, true).unwrap();
        assert_eq!(canvas[[0, 0, 1]], 0);
        assert_eq!(canvas[[0, 3, 1]], 255);
    }

    #[test]
    fn test_canvas_larger_than_mask_gets_no_coverage() {
        let mut canvas = solid(4, 4, [0, 0, 0, 255]);
        let layer = solid(4, 4, [255, 255, 255, 255]);
        let mask = CoverageMask::filled(2, 2, 255);
        composite_masked(&mut canvas, &layer, &mask, false).unwrap();
        assert_eq!(canvas[[1, 1, 0]], 255);
        assert_eq!(canvas[[3, 3, 0]], 0);
    }

    #[test]
    fn test_clear_masked() {
        let mut canvas = solid(4, 4, [9, 9, 9, 255]);
        let mut mask = SelectionShape::rect(0, 0, 1, 4).rasterize(4, 4);
        mask.set(3, 0, 51);
        clear_masked(&mut canvas, Some(&mask)).unwrap();
        assert_eq!(canvas[[2, 0, 3]], 0);
        assert_eq!(canvas[[2, 0, 0]], 0);
        assert_eq!(canvas[[0, 3, 3]], 204);
        assert_eq!(canvas[[2, 2, 3]], 255);

        clear_masked(&mut canvas, None).unwrap();
        assert!(canvas.iter().all(|&v| v == 0));
    }

    #[test]
    fn test_rejects_non_rgba() {
        let mut gray = Array3::<u8>::zeros((2, 2, 1));
        assert!(matches!(
            clear_masked(&mut gray, None),
            Err(SelectionError::InvalidImageFormat(_))
        ));
    }
}
