//! Selection outline extraction.
//!
//! Turns a coverage mask into closed boundary paths made of unit steps along
//! pixel edges (marching squares on the pixel-corner lattice). The paths are
//! what the marching ants overlay strokes.
//!
//! How it works:
//! - The mask is upsampled 2x into a work buffer with a one pixel transparent
//!   border, and every sub-pixel is classified as transparent, edge or opaque
//!   (an opaque pixel with at least one transparent 8-neighbour is an edge).
//! - The buffer is scanned row by row. Each edge sub-pixel that is still set
//!   seeds a trace. While tracing, the work buffer is overwritten along the
//!   path so that later seeds on the same boundary are skipped.
//! - Each step looks at the 2x2 block of mask pixels around the current
//!   lattice vertex. The filled side is always kept on the left. The two
//!   saddle blocks (diagonal pairs) are resolved from the previous direction
//!   so diagonal neighbours stay joined.
//!
//! Coordinates: vertex (x, y) is the top-left corner of image pixel (x, y),
//! so outline points range over `[0, width] x [0, height]`.

use log::{debug, error, warn};
use ndarray::{Array2, ArrayView3};

use super::mask::CoverageMask;
use super::shape::IntRect;
use crate::error::{Result, SelectionError};

/// One unit step along a pixel edge.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum Direction {
    Up,
    Right,
    Left,
    Down,
}

impl Direction {
    /// (dx, dy) of the step in image coordinates (y grows downwards).
    #[inline]
    pub fn delta(self) -> (i32, i32) {
        match self {
            Direction::Up => (0, -1),
            Direction::Right => (1, 0),
            Direction::Left => (-1, 0),
            Direction::Down => (0, 1),
        }
    }

    /// Stable numeric code used by the flat export format.
    pub fn code(self) -> u8 {
        match self {
            Direction::Up => 0,
            Direction::Right => 1,
            Direction::Left => 2,
            Direction::Down => 3,
        }
    }

    pub fn as_char(self) -> char {
        match self {
            Direction::Up => 'U',
            Direction::Right => 'R',
            Direction::Left => 'L',
            Direction::Down => 'D',
        }
    }
}

/// A closed selection boundary.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Outline {
    initial_point: (i32, i32),
    path: Vec<Direction>,
    bounds: IntRect,
}

impl Outline {
    /// Pixel corner the path starts and ends at.
    pub fn initial_point(&self) -> (i32, i32) {
        self.initial_point
    }

    pub fn path(&self) -> &[Direction] {
        &self.path
    }

    /// Extent of all visited vertices (width = max x - min x).
    pub fn bounds(&self) -> IntRect {
        self.bounds
    }

    pub fn len(&self) -> usize {
        self.path.len()
    }

    pub fn is_empty(&self) -> bool {
        self.path.is_empty()
    }

    /// Visited vertices, starting and ending at the initial point.
    pub fn points(&self) -> impl Iterator<Item = (i32, i32)> + '_ {
        let start = self.initial_point;
        std::iter::once(start).chain(self.path.iter().scan(start, |pos, dir| {
            let (dx, dy) = dir.delta();
            pos.0 += dx;
            pos.1 += dy;
            Some(*pos)
        }))
    }

    /// True if the steps sum to zero.
    pub fn is_closed(&self) -> bool {
        let (sx, sy) = self
            .path
            .iter()
            .fold((0i64, 0i64), |(x, y), d| {
                let (dx, dy) = d.delta();
                (x + dx as i64, y + dy as i64)
            });
        sx == 0 && sy == 0
    }

    /// Corner vertices only: collinear runs are merged.
    pub fn corners(&self) -> Vec<(i32, i32)> {
        let mut corners = vec![self.initial_point];
        let mut pos = self.initial_point;
        for (i, dir) in self.path.iter().enumerate() {
            let (dx, dy) = dir.delta();
            pos = (pos.0 + dx, pos.1 + dy);
            let next = self.path.get(i + 1).or(self.path.first());
            if next != Some(dir) {
                corners.push(pos);
            }
        }
        corners
    }

    /// SVG path data tracing the outline through its corners.
    pub fn to_svg_path(&self) -> String {
        if self.path.is_empty() {
            return String::new();
        }
        let corners = self.corners();
        let mut svg = format!("M {},{} ", corners[0].0, corners[0].1);
        for &(x, y) in &corners[1..] {
            svg.push_str(&format!("L {},{} ", x, y));
        }
        svg.push('Z');
        svg
    }
}

/// Tracer tuning.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct TraceOptions {
    /// Maximum steps per outline. `None` picks a cap from the mask size
    /// that no legitimate boundary can reach.
    pub max_steps: Option<usize>,
}

impl TraceOptions {
    /// Effective step cap for a mask of the given size.
    pub fn step_limit(&self, width: usize, height: usize) -> usize {
        self.max_steps
            .unwrap_or_else(|| 2 * (width + 1) * (height + 1) + 4)
    }
}

/// Everything a trace produced, including recoverable faults.
#[derive(Clone, Debug, Default)]
pub struct TraceReport {
    pub outlines: Vec<Outline>,
    /// Traces abandoned with an error; the scan continued after each.
    pub faults: Vec<SelectionError>,
    /// Seeds whose starting block was uniform, so no path was produced.
    pub aborted_seeds: usize,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
#[repr(u8)]
enum PixelType {
    Transparent = 0,
    Edge = 127,
    Opaque = 255,
}

const NEIGHBOURS: [(isize, isize); 8] = [
    (-1, -1),
    (0, -1),
    (1, -1),
    (-1, 0),
    (1, 0),
    (-1, 1),
    (0, 1),
    (1, 1),
];

/// Classify a sample as transparent, edge or opaque from its 8-neighbourhood.
fn classify<F: Fn(isize, isize) -> u8>(sample: F, x: isize, y: isize) -> PixelType {
    if sample(x, y) == 0 {
        return PixelType::Transparent;
    }
    if NEIGHBOURS
        .iter()
        .any(|&(dx, dy)| sample(x + dx, y + dy) == 0)
    {
        PixelType::Edge
    } else {
        PixelType::Opaque
    }
}

// ============================================================================
// Marching squares step table
// ============================================================================

// Work buffer cells (row, col) overwritten after leaving a vertex, relative
// to the 2x2 sub-pixel block of the vertex's top-left pixel.
const ERASE_1: &[(usize, usize)] = &[(0, 1), (1, 0), (1, 1)];
const ERASE_2: &[(usize, usize)] = &[(0, 2), (1, 2), (1, 3)];
const ERASE_3: &[(usize, usize)] = &[(1, 0), (1, 1), (1, 2), (1, 3)];
const ERASE_4: &[(usize, usize)] = &[(2, 0), (2, 1), (3, 1)];
const ERASE_5: &[(usize, usize)] = &[(0, 1), (1, 1), (2, 1), (3, 1)];
const ERASE_6_FROM_DOWN_OR_LEFT: &[(usize, usize)] = &[(0, 2), (2, 1)];
const ERASE_6_FROM_UP_OR_RIGHT: &[(usize, usize)] = &[(1, 3), (3, 1)];
const ERASE_7: &[(usize, usize)] = &[(1, 1), (1, 2), (1, 3), (2, 1), (3, 1)];
const ERASE_8: &[(usize, usize)] = &[(2, 2), (2, 3), (3, 3)];
const ERASE_9_FROM_UP_OR_LEFT: &[(usize, usize)] = &[(1, 0), (1, 1), (2, 2), (3, 2)];
const ERASE_9_FROM_DOWN_OR_RIGHT: &[(usize, usize)] = &[(0, 1), (1, 1), (2, 2), (2, 3)];
const ERASE_10: &[(usize, usize)] = &[(0, 2), (1, 2), (2, 2), (3, 2)];
const ERASE_11: &[(usize, usize)] = &[(1, 0), (1, 1), (1, 2), (2, 2), (3, 2)];
const ERASE_12: &[(usize, usize)] = &[(2, 0), (2, 1), (2, 2), (2, 3)];
const ERASE_13: &[(usize, usize)] = &[(0, 1), (1, 1), (2, 1), (2, 2), (2, 3)];
const ERASE_14: &[(usize, usize)] = &[(0, 2), (1, 2), (2, 0), (2, 1), (2, 2)];

/// Next direction and erase pattern for a block case.
///
/// Case bits: 1 = top-left, 2 = top-right, 4 = bottom-left, 8 = bottom-right.
/// Returns `None` for uniform blocks (0 and 15), which have no boundary.
fn step_for_case(case: u8, previous: Direction) -> Option<(Direction, &'static [(usize, usize)])> {
    use Direction::*;

    let step = match case {
        1 => (Up, ERASE_1),
        2 => (Right, ERASE_2),
        3 => (Right, ERASE_3),
        4 => (Left, ERASE_4),
        5 => (Up, ERASE_5),
        6 => {
            let direction = if previous == Up { Right } else { Left };
            let erase = if matches!(previous, Down | Left) {
                ERASE_6_FROM_DOWN_OR_LEFT
            } else {
                ERASE_6_FROM_UP_OR_RIGHT
            };
            (direction, erase)
        }
        7 => (Right, ERASE_7),
        8 => (Down, ERASE_8),
        9 => {
            let direction = if previous == Right { Down } else { Up };
            let erase = if matches!(previous, Up | Left) {
                ERASE_9_FROM_UP_OR_LEFT
            } else {
                ERASE_9_FROM_DOWN_OR_RIGHT
            };
            (direction, erase)
        }
        10 => (Down, ERASE_10),
        11 => (Down, ERASE_11),
        12 => (Left, ERASE_12),
        13 => (Up, ERASE_13),
        14 => (Left, ERASE_14),
        _ => return None,
    };
    Some(step)
}

// ============================================================================
// Tracer
// ============================================================================

struct Tracer<'a> {
    mask: &'a CoverageMask,
    /// 2x upsampled classification buffer with a transparent border;
    /// padded pixel (x, y) owns cells (2y..2y+2, 2x..2x+2).
    work: Array2<u8>,
    step_limit: usize,
}

impl<'a> Tracer<'a> {
    fn new(mask: &'a CoverageMask, step_limit: usize) -> Self {
        let width = mask.width();
        let height = mask.height();
        let mut work = Array2::<u8>::zeros(((height + 2) * 2, (width + 2) * 2));

        // Upsample: every covered pixel becomes a 2x2 opaque block.
        for y in 0..height {
            for x in 0..width {
                let kind = classify(|sx, sy| mask.get_or_zero(sx, sy), x as isize, y as isize);
                let value = if kind == PixelType::Transparent {
                    PixelType::Transparent as u8
                } else {
                    PixelType::Opaque as u8
                };
                let (row, col) = ((y + 1) * 2, (x + 1) * 2);
                work[[row, col]] = value;
                work[[row, col + 1]] = value;
                work[[row + 1, col]] = value;
                work[[row + 1, col + 1]] = value;
            }
        }

        // Mark boundary sub-pixels in place.
        for y in 0..height {
            for x in 0..width {
                let (row, col) = ((y + 1) * 2, (x + 1) * 2);
                for (dr, dc) in [(0, 0), (0, 1), (1, 0), (1, 1)] {
                    let (r, c) = (row + dr, col + dc);
                    let kind = classify(
                        |sx, sy| {
                            if sx < 0 || sy < 0 {
                                return 0;
                            }
                            work.get((sy as usize, sx as usize)).copied().unwrap_or(0)
                        },
                        c as isize,
                        r as isize,
                    );
                    work[[r, c]] = kind as u8;
                }
            }
        }

        Self {
            mask,
            work,
            step_limit,
        }
    }

    /// Coverage of padded pixel (x, y); the border ring reads as empty.
    #[inline]
    fn padded(&self, x: usize, y: usize) -> bool {
        x > 0 && y > 0 && self.mask.get_or_zero(x as isize - 1, y as isize - 1) != 0
    }

    #[inline]
    fn group_case(&self, x: usize, y: usize) -> u8 {
        let mut case = 0;
        if self.padded(x, y) {
            case |= 1;
        }
        if self.padded(x + 1, y) {
            case |= 2;
        }
        if self.padded(x, y + 1) {
            case |= 4;
        }
        if self.padded(x + 1, y + 1) {
            case |= 8;
        }
        case
    }

    fn erase(&mut self, x: usize, y: usize, cells: &[(usize, usize)]) {
        let (row, col) = (y * 2, x * 2);
        for &(dr, dc) in cells {
            if let Some(cell) = self.work.get_mut((row + dr, col + dc)) {
                *cell = PixelType::Opaque as u8;
            }
        }
    }

    fn run(mut self) -> TraceReport {
        let width = self.mask.width();
        let height = self.mask.height();
        let mut report = TraceReport::default();

        for y in 1..=height {
            for x in 1..=width {
                if self.work[[y * 2, x * 2]] != PixelType::Edge as u8 {
                    continue;
                }
                let is_outside =
                    self.work[[(y - 1) * 2, (x - 1) * 2]] == PixelType::Transparent as u8;
                let (sx, sy) = if is_outside { (x - 1, y - 1) } else { (x, y) };

                match self.trace(sx, sy) {
                    Ok(Some(outline)) => report.outlines.push(outline),
                    Ok(None) => report.aborted_seeds += 1,
                    Err(fault) => {
                        error!("Selection outline trace failed: {}", fault);
                        report.faults.push(fault);
                    }
                }
            }
        }

        report
    }

    /// Follow one boundary from vertex (start_x, start_y) back to itself.
    ///
    /// Returns `Ok(None)` when the start vertex is not on a boundary.
    fn trace(&mut self, start_x: usize, start_y: usize) -> Result<Option<Outline>> {
        let case = self.group_case(start_x, start_y);
        if case == 0 || case == 15 {
            debug!("Seed ({}, {}) is not on a boundary, skipping", start_x, start_y);
            return Ok(None);
        }

        let max_x = self.mask.width();
        let max_y = self.mask.height();
        let mut path = Vec::new();
        let (mut x, mut y) = (start_x, start_y);
        let mut previous = Direction::Down;
        let mut bounds = (x, y, x, y);

        loop {
            if path.len() >= self.step_limit {
                return Err(SelectionError::UnboundedTrace {
                    x: start_x,
                    y: start_y,
                    steps: path.len(),
                });
            }

            let case = self.group_case(x, y);
            let (direction, erase) = step_for_case(case, previous)
                .ok_or(SelectionError::UnexpectedCase { case, x, y })?;
            self.erase(x, y, erase);
            path.push(direction);
            previous = direction;

            (x, y) = match direction {
                Direction::Up if y > 0 => (x, y - 1),
                Direction::Right if x < max_x => (x + 1, y),
                Direction::Left if x > 0 => (x - 1, y),
                Direction::Down if y < max_y => (x, y + 1),
                _ => return Err(SelectionError::UnexpectedCase { case, x, y }),
            };

            bounds.0 = bounds.0.min(x);
            bounds.1 = bounds.1.min(y);
            bounds.2 = bounds.2.max(x);
            bounds.3 = bounds.3.max(y);

            if x == start_x && y == start_y {
                break;
            }
        }

        let (min_x, min_y, max_x, max_y) = bounds;
        Ok(Some(Outline {
            initial_point: (start_x as i32, start_y as i32),
            path,
            bounds: IntRect::new(
                min_x as i32,
                min_y as i32,
                (max_x - min_x) as i32,
                (max_y - min_y) as i32,
            ),
        }))
    }
}

// ============================================================================
// Public API
// ============================================================================

/// Trace all selection boundaries, reporting faults instead of failing.
///
/// # Arguments
/// * `mask` - Coverage mask (0 = unselected, >0 = selected)
/// * `options` - Step cap override
///
/// # Returns
/// Outlines in seed scan order, plus any traces that had to be abandoned.
pub fn trace_mask(mask: &CoverageMask, options: &TraceOptions) -> TraceReport {
    if mask.width() == 0 || mask.height() == 0 {
        return TraceReport::default();
    }

    let step_limit = options.step_limit(mask.width(), mask.height());
    let report = Tracer::new(mask, step_limit).run();
    debug!(
        "Traced {} outline(s) from {}x{} mask ({} fault(s), {} aborted seed(s))",
        report.outlines.len(),
        mask.width(),
        mask.height(),
        report.faults.len(),
        report.aborted_seeds
    );
    report
}

/// Trace all selection boundaries with the default step cap.
///
/// Faults are logged and the affected outlines skipped.
pub fn extract_outlines(mask: &CoverageMask) -> Vec<Outline> {
    let report = trace_mask(mask, &TraceOptions::default());
    if !report.faults.is_empty() {
        warn!(
            "{} selection outline(s) could not be traced",
            report.faults.len()
        );
    }
    report.outlines
}

/// Trace boundaries of a single-channel image shaped (height, width, 1).
pub fn extract_outlines_from_image(image: ArrayView3<u8>) -> Result<Vec<Outline>> {
    let mask = CoverageMask::from_image_view(image)?;
    Ok(extract_outlines(&mask))
}

/// Trace boundaries of a strided 8-bit buffer.
pub fn extract_outlines_from_raw(
    width: usize,
    height: usize,
    stride: usize,
    data: &[u8],
) -> Result<Vec<Outline>> {
    let mask = CoverageMask::from_raw(width, height, stride, data)?;
    Ok(extract_outlines(&mask))
}

/// Flatten outlines to an i32 array for FFI.
///
/// Format: [num_outlines,
///          x_1, y_1, bx_1, by_1, bw_1, bh_1, num_steps_1, step, step, ...,
///          x_2, ...]
/// where each step is a [`Direction::code`].
pub fn outlines_to_flat(outlines: &[Outline]) -> Vec<i32> {
    let mut result = Vec::new();
    result.push(outlines.len() as i32);

    for outline in outlines {
        let (x, y) = outline.initial_point;
        let b = outline.bounds;
        result.extend_from_slice(&[x, y, b.x, b.y, b.width, b.height]);
        result.push(outline.path.len() as i32);
        result.extend(outline.path.iter().map(|d| d.code() as i32));
    }

    result
}
