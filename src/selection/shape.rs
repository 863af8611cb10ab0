//! Selection shapes and their rasterization.
//!
//! Tools hand the selection a shape in image coordinates: an axis-aligned
//! rectangle or an arbitrary closed vector path (ellipse, lasso polygon, any
//! `kurbo::BezPath`). Every shape is rasterized the same way:
//! - curves are flattened to line segments
//! - open subpaths are implicitly closed
//! - the **even-odd** rule decides coverage at each pixel center
//!
//! Coverage is binary (0 or 255); the mask carries no anti-aliasing.

use kurbo::{flatten, Affine, BezPath, Ellipse, PathEl, Point, Rect, Shape};
use rayon::prelude::*;

use super::mask::CoverageMask;

/// Tolerance used when flattening curves into line segments.
const FLATTEN_TOLERANCE: f64 = 0.1;

/// Integer rectangle in image pixel coordinates.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Hash)]
pub struct IntRect {
    pub x: i32,
    pub y: i32,
    pub width: i32,
    pub height: i32,
}

impl IntRect {
    pub const fn new(x: i32, y: i32, width: i32, height: i32) -> Self {
        Self {
            x,
            y,
            width,
            height,
        }
    }

    /// The empty rectangle at the origin.
    pub const fn zero() -> Self {
        Self::new(0, 0, 0, 0)
    }

    /// Build a rectangle from two opposite corners given in any order.
    pub fn from_corners(x0: i32, y0: i32, x1: i32, y1: i32) -> Self {
        Self::new(x0.min(x1), y0.min(y1), (x1 - x0).abs(), (y1 - y0).abs())
    }

    #[inline]
    pub fn right(&self) -> i32 {
        self.x + self.width
    }

    #[inline]
    pub fn bottom(&self) -> i32 {
        self.y + self.height
    }

    #[inline]
    pub fn is_empty(&self) -> bool {
        self.width <= 0 || self.height <= 0
    }

    /// Pixel area (0 for empty rectangles).
    pub fn area(&self) -> i64 {
        if self.is_empty() {
            0
        } else {
            self.width as i64 * self.height as i64
        }
    }

    /// True if pixel (px, py) lies inside.
    pub fn contains(&self, px: i32, py: i32) -> bool {
        px >= self.x && px < self.right() && py >= self.y && py < self.bottom()
    }

    /// Smallest rectangle enclosing both. Empty rectangles are ignored.
    pub fn union(&self, other: &IntRect) -> IntRect {
        if self.is_empty() {
            return *other;
        }
        if other.is_empty() {
            return *self;
        }
        let x = self.x.min(other.x);
        let y = self.y.min(other.y);
        let right = self.right().max(other.right());
        let bottom = self.bottom().max(other.bottom());
        IntRect::new(x, y, right - x, bottom - y)
    }

    /// Overlapping part of both rectangles, or the zero rectangle.
    pub fn intersect(&self, other: &IntRect) -> IntRect {
        let x = self.x.max(other.x);
        let y = self.y.max(other.y);
        let right = self.right().min(other.right());
        let bottom = self.bottom().min(other.bottom());
        if right <= x || bottom <= y {
            IntRect::zero()
        } else {
            IntRect::new(x, y, right - x, bottom - y)
        }
    }

    pub fn translate(&self, dx: i32, dy: i32) -> IntRect {
        IntRect::new(self.x + dx, self.y + dy, self.width, self.height)
    }

    pub fn to_kurbo(&self) -> Rect {
        Rect::new(
            self.x as f64,
            self.y as f64,
            self.right() as f64,
            self.bottom() as f64,
        )
    }
}

/// A shape to fold into the selection mask.
#[derive(Clone, Debug, PartialEq)]
pub enum SelectionShape {
    /// Axis-aligned rectangle.
    Rect(IntRect),
    /// Closed vector path, filled with the even-odd rule.
    Path(BezPath),
}

impl SelectionShape {
    /// Rectangle from origin and size. Negative sizes are normalized.
    pub fn rect(x: i32, y: i32, width: i32, height: i32) -> Self {
        SelectionShape::Rect(IntRect::from_corners(x, y, x + width, y + height))
    }

    /// Ellipse inscribed in the given bounding box.
    pub fn ellipse(bounds: IntRect) -> Self {
        let ellipse = Ellipse::from_rect(bounds.to_kurbo());
        SelectionShape::Path(ellipse.to_path(FLATTEN_TOLERANCE))
    }

    /// Polygon through the given points (lasso). The last point connects
    /// back to the first.
    pub fn polygon(points: &[(f64, f64)]) -> Self {
        let mut path = BezPath::new();
        if let Some((&(x0, y0), rest)) = points.split_first() {
            path.move_to((x0, y0));
            for &(x, y) in rest {
                path.line_to((x, y));
            }
            path.close_path();
        }
        SelectionShape::Path(path)
    }

    pub fn path(path: BezPath) -> Self {
        SelectionShape::Path(path)
    }

    /// True for a path without any elements. Combining a null shape is a no-op.
    pub fn is_null(&self) -> bool {
        match self {
            SelectionShape::Rect(_) => false,
            SelectionShape::Path(path) => path.elements().is_empty(),
        }
    }

    /// Integer bounds covering the shape.
    pub fn bounds(&self) -> IntRect {
        match self {
            SelectionShape::Rect(rect) => *rect,
            SelectionShape::Path(path) => {
                if path.elements().is_empty() {
                    return IntRect::zero();
                }
                let bbox = path.bounding_box();
                let x0 = bbox.x0.floor() as i32;
                let y0 = bbox.y0.floor() as i32;
                let x1 = bbox.x1.ceil() as i32;
                let y1 = bbox.y1.ceil() as i32;
                IntRect::new(x0, y0, x1 - x0, y1 - y0)
            }
        }
    }

    /// Copy of the shape moved by (dx, dy).
    pub fn translated(&self, dx: f64, dy: f64) -> Self {
        match self {
            SelectionShape::Rect(rect) if dx.fract() == 0.0 && dy.fract() == 0.0 => {
                SelectionShape::Rect(rect.translate(dx as i32, dy as i32))
            }
            SelectionShape::Rect(rect) => {
                let path = rect.to_kurbo().to_path(FLATTEN_TOLERANCE);
                SelectionShape::Path(Affine::translate((dx, dy)) * path)
            }
            SelectionShape::Path(path) => {
                SelectionShape::Path(Affine::translate((dx, dy)) * path.clone())
            }
        }
    }

    /// Rasterize into a fresh mask of the given size (255 inside, 0 outside).
    pub fn rasterize(&self, width: usize, height: usize) -> CoverageMask {
        let mut mask = CoverageMask::new(width, height);
        if width == 0 || height == 0 {
            return mask;
        }

        let edges = self.edges();
        if edges.is_empty() {
            return mask;
        }

        mask.as_slice_mut()
            .par_chunks_mut(width)
            .enumerate()
            .for_each(|(y, row)| fill_row_even_odd(&edges, y, row));

        mask
    }

    /// Flattened, closed outline segments of the shape.
    fn edges(&self) -> Vec<Edge> {
        match self {
            SelectionShape::Rect(rect) => {
                if rect.is_empty() {
                    return Vec::new();
                }
                let r = rect.to_kurbo();
                vec![
                    Edge::new(Point::new(r.x0, r.y0), Point::new(r.x1, r.y0)),
                    Edge::new(Point::new(r.x1, r.y0), Point::new(r.x1, r.y1)),
                    Edge::new(Point::new(r.x1, r.y1), Point::new(r.x0, r.y1)),
                    Edge::new(Point::new(r.x0, r.y1), Point::new(r.x0, r.y0)),
                ]
            }
            SelectionShape::Path(path) => path_edges(path),
        }
    }
}

/// A straight segment of a flattened outline.
#[derive(Clone, Copy, Debug)]
struct Edge {
    p0: Point,
    p1: Point,
}

impl Edge {
    fn new(p0: Point, p1: Point) -> Self {
        Self { p0, p1 }
    }

    /// X coordinate where this edge crosses the horizontal line `y`, if it does.
    ///
    /// The edge covers `[min_y, max_y)` so a vertex shared by two edges is
    /// counted exactly once.
    #[inline]
    fn crossing(&self, y: f64) -> Option<f64> {
        let (y0, y1) = (self.p0.y, self.p1.y);
        if y0 == y1 {
            return None;
        }
        let (lo, hi) = if y0 < y1 { (y0, y1) } else { (y1, y0) };
        if y < lo || y >= hi {
            return None;
        }
        let t = (y - y0) / (y1 - y0);
        Some(self.p0.x + t * (self.p1.x - self.p0.x))
    }
}

/// Flatten a path into closed polygon edges.
fn path_edges(path: &BezPath) -> Vec<Edge> {
    let mut edges = Vec::new();
    let mut start: Option<Point> = None;
    let mut current = Point::ZERO;

    flatten(path.iter(), FLATTEN_TOLERANCE, |el| match el {
        PathEl::MoveTo(p) => {
            // Fill closes any open subpath.
            if let Some(s) = start {
                if current != s {
                    edges.push(Edge::new(current, s));
                }
            }
            start = Some(p);
            current = p;
        }
        PathEl::LineTo(p) => {
            if start.is_none() {
                start = Some(current);
            }
            edges.push(Edge::new(current, p));
            current = p;
        }
        PathEl::ClosePath => {
            if let Some(s) = start {
                if current != s {
                    edges.push(Edge::new(current, s));
                }
                current = s;
            }
        }
        // flatten only emits MoveTo, LineTo and ClosePath
        PathEl::QuadTo(_, p) | PathEl::CurveTo(_, _, p) => {
            edges.push(Edge::new(current, p));
            current = p;
        }
    });

    if let Some(s) = start {
        if current != s {
            edges.push(Edge::new(current, s));
        }
    }

    edges
}

/// Fill one mask row using the even-odd rule at pixel centers.
fn fill_row_even_odd(edges: &[Edge], y: usize, row: &mut [u8]) {
    let sample_y = y as f64 + 0.5;
    let mut crossings: Vec<f64> = edges.iter().filter_map(|e| e.crossing(sample_y)).collect();
    if crossings.len() < 2 {
        return;
    }
    crossings.sort_by(|a, b| a.total_cmp(b));

    let width = row.len() as i64;
    for span in crossings.chunks_exact(2) {
        // Pixel x is inside when span[0] <= x + 0.5 < span[1]
        let start = (span[0] - 0.5).ceil() as i64;
        let end = (span[1] - 0.5).ceil() as i64;
        let start = start.clamp(0, width) as usize;
        let end = end.clamp(0, width) as usize;
        for v in &mut row[start..end.max(start)] {
            *v = 255;
        }
    }
}
