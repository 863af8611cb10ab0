//! Marching ants overlay rendering.
//!
//! Outlines are stroked into a 1-bit style overlay at canvas size times zoom
//! scale. The overlay is cached and only redrawn when:
//! - the outlines change ([`OutlineRenderer::invalidate`])
//! - the canvas size changes
//! - the zoom scale changes
//!
//! Compositing the cached overlay onto the view is cheap.

use log::debug;
use ndarray::{Array2, Array3};

use super::contour::Outline;
use super::paint::{blend_over, check_rgba};
use crate::error::Result;

/// Overlay appearance.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct OutlineStyle {
    /// RGBA stroke color.
    pub color: [u8; 4],
}

impl Default for OutlineStyle {
    fn default() -> Self {
        Self {
            color: [255, 0, 0, 255],
        }
    }
}

/// Cached outline overlay.
#[derive(Clone, Debug)]
pub struct OutlineRenderer {
    style: OutlineStyle,
    overlay: Option<Array2<u8>>,
    canvas_size: (usize, usize),
    scale: f64,
    invalid: bool,
    redraws: usize,
}

impl Default for OutlineRenderer {
    fn default() -> Self {
        Self::new(OutlineStyle::default())
    }
}

/// Overlay size for a canvas at a zoom scale, rounded up.
fn overlay_size(canvas_width: usize, canvas_height: usize, scale: f64) -> (usize, usize) {
    if !scale.is_finite() || scale <= 0.0 {
        return (0, 0);
    }
    (
        (canvas_width as f64 * scale).ceil() as usize,
        (canvas_height as f64 * scale).ceil() as usize,
    )
}

impl OutlineRenderer {
    pub fn new(style: OutlineStyle) -> Self {
        Self {
            style,
            overlay: None,
            canvas_size: (0, 0),
            scale: 1.0,
            invalid: true,
            redraws: 0,
        }
    }

    pub fn style(&self) -> OutlineStyle {
        self.style
    }

    pub fn set_style(&mut self, style: OutlineStyle) {
        self.style = style;
    }

    /// Force a redraw on next use.
    pub fn invalidate(&mut self) {
        self.invalid = true;
    }

    /// True if the cached overlay can be reused for these parameters.
    pub fn is_cached(&self, canvas_width: usize, canvas_height: usize, scale: f64) -> bool {
        self.overlay.is_some()
            && !self.invalid
            && self.canvas_size == (canvas_width, canvas_height)
            && self.scale == scale
    }

    /// Number of times the overlay has been redrawn.
    pub fn redraw_count(&self) -> usize {
        self.redraws
    }

    /// Cached overlay (255 on the stroke, 0 elsewhere), if any.
    pub fn overlay(&self) -> Option<&Array2<u8>> {
        self.overlay.as_ref()
    }

    /// Bring the overlay up to date and return it.
    ///
    /// # Arguments
    /// * `outlines` - Outlines in image coordinates
    /// * `canvas_width`, `canvas_height` - Canvas size in image pixels
    /// * `scale` - Zoom factor; the overlay is `ceil(size * scale)`
    pub fn render(
        &mut self,
        outlines: &[Outline],
        canvas_width: usize,
        canvas_height: usize,
        scale: f64,
    ) -> &Array2<u8> {
        if !self.is_cached(canvas_width, canvas_height, scale) {
            let (ow, oh) = overlay_size(canvas_width, canvas_height, scale);
            let mut overlay = match self.overlay.take() {
                Some(mut existing) if existing.dim() == (oh, ow) => {
                    existing.fill(0);
                    existing
                }
                _ => Array2::<u8>::zeros((oh, ow)),
            };

            for outline in outlines {
                stroke_outline(&mut overlay, outline, scale);
            }

            debug!(
                "Redrew selection overlay {}x{} at scale {} ({} outline(s))",
                ow,
                oh,
                scale,
                outlines.len()
            );
            self.overlay = Some(overlay);
            self.canvas_size = (canvas_width, canvas_height);
            self.scale = scale;
            self.invalid = false;
            self.redraws += 1;
        }

        self.overlay.get_or_insert_with(|| Array2::zeros((0, 0)))
    }

    /// Render if needed, then paint the overlay onto `target` in the style
    /// color.
    ///
    /// `origin` places the overlay's top-left pixel in the target, so a
    /// pending selection move can be shown without redrawing.
    pub fn draw(
        &mut self,
        target: &mut Array3<u8>,
        outlines: &[Outline],
        canvas_width: usize,
        canvas_height: usize,
        scale: f64,
        origin: (isize, isize),
    ) -> Result<()> {
        check_rgba(target)?;
        let color = self.style.color;
        let overlay = self.render(outlines, canvas_width, canvas_height, scale);

        let (th, tw, _) = target.dim();
        for ((oy, ox), &v) in overlay.indexed_iter() {
            if v == 0 {
                continue;
            }
            let tx = ox as isize + origin.0;
            let ty = oy as isize + origin.1;
            if tx < 0 || ty < 0 || tx as usize >= tw || ty as usize >= th {
                continue;
            }
            let (tx, ty) = (tx as usize, ty as usize);
            let mut dst = [
                target[[ty, tx, 0]],
                target[[ty, tx, 1]],
                target[[ty, tx, 2]],
                target[[ty, tx, 3]],
            ];
            blend_over(&mut dst, color);
            for c in 0..4 {
                target[[ty, tx, c]] = dst[c];
            }
        }
        Ok(())
    }
}

/// Stroke one outline as 1 px axis-aligned lines.
///
/// Vertex (x, y) lands on overlay pixel `floor(x * scale), floor(y * scale)`,
/// i.e. the line runs half a pixel past the scaled corner.
fn stroke_outline(overlay: &mut Array2<u8>, outline: &Outline, scale: f64) {
    let to_px = |v: i32| (v as f64 * scale).floor() as i64;
    let mut points = outline.points();
    let Some(mut prev) = points.next() else {
        return;
    };
    for point in points {
        draw_line(
            overlay,
            (to_px(prev.0), to_px(prev.1)),
            (to_px(point.0), to_px(point.1)),
        );
        prev = point;
    }
}

/// Axis-aligned line between two overlay pixels, inclusive, clipped.
fn draw_line(overlay: &mut Array2<u8>, from: (i64, i64), to: (i64, i64)) {
    let (h, w) = overlay.dim();
    let (x0, x1) = (from.0.min(to.0), from.0.max(to.0));
    let (y0, y1) = (from.1.min(to.1), from.1.max(to.1));
    let x0 = x0.max(0);
    let y0 = y0.max(0);
    let x1 = x1.min(w as i64 - 1);
    let y1 = y1.min(h as i64 - 1);
    for y in y0..=y1 {
        for x in x0..=x1 {
            overlay[[y as usize, x as usize]] = 255;
        }
    }
}
