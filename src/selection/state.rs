//! Per-document selection state.
//!
//! [`SelectionState`] owns the coverage mask, the derived outlines and
//! bounding box, the pending move offset and the overlay cache. Every
//! operation that changes the mask re-traces the outlines once and
//! invalidates the overlay.
//!
//! States:
//! - **Inactive**: nothing selected; drawing is unrestricted
//! - **Active**: a mask limits drawing
//! - **Moving**: active with a pending offset, committed by `end_move`

use log::{debug, warn};
use ndarray::Array3;

use super::combine::{self, CombineMode};
use super::contour::{trace_mask, Outline, TraceOptions};
use super::mask::CoverageMask;
use super::outline::{OutlineRenderer, OutlineStyle};
use super::paint;
use super::shape::{IntRect, SelectionShape};
use crate::error::{Result, SelectionError};

/// How the UI presents the selection.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Hash)]
pub enum DisplayStyle {
    /// Marching ants outline only.
    Outline,
    /// Outline plus a tint over unselected pixels.
    #[default]
    RedMask,
}

/// Initial settings for a [`SelectionState`].
#[derive(Clone, Debug, Default)]
pub struct SelectionConfig {
    pub combine_mode: CombineMode,
    pub display_style: DisplayStyle,
    pub trace: TraceOptions,
    pub outline: OutlineStyle,
}

/// Deep copy of the mask and active flag, for undo/redo.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct MaskSnapshot {
    mask: Option<CoverageMask>,
    active: bool,
}

impl MaskSnapshot {
    pub fn is_active(&self) -> bool {
        self.active
    }

    pub fn mask(&self) -> Option<&CoverageMask> {
        self.mask.as_ref()
    }
}

/// Selection of one document.
#[derive(Clone, Debug)]
pub struct SelectionState {
    image_width: usize,
    image_height: usize,
    mask: Option<CoverageMask>,
    active: bool,
    combine_mode: CombineMode,
    display_style: DisplayStyle,
    offset: (i32, i32),
    moving: bool,
    bounds: IntRect,
    outlines: Vec<Outline>,
    trace_options: TraceOptions,
    renderer: OutlineRenderer,
}

impl SelectionState {
    /// Inactive selection for an image of the given size.
    pub fn new(image_width: usize, image_height: usize) -> Self {
        Self::with_config(image_width, image_height, SelectionConfig::default())
    }

    pub fn with_config(image_width: usize, image_height: usize, config: SelectionConfig) -> Self {
        Self {
            image_width,
            image_height,
            mask: None,
            active: false,
            combine_mode: config.combine_mode,
            display_style: config.display_style,
            offset: (0, 0),
            moving: false,
            bounds: IntRect::zero(),
            outlines: Vec::new(),
            trace_options: config.trace,
            renderer: OutlineRenderer::new(config.outline),
        }
    }

    // ========================================================================
    // Accessors
    // ========================================================================

    pub fn image_size(&self) -> (usize, usize) {
        (self.image_width, self.image_height)
    }

    /// Record a new image size. A mask of the old size is replaced by an
    /// empty one on the next combine.
    pub fn set_image_size(&mut self, width: usize, height: usize) {
        if (width, height) != (self.image_width, self.image_height) {
            debug!(
                "Selection image size {}x{} -> {}x{}",
                self.image_width, self.image_height, width, height
            );
        }
        self.image_width = width;
        self.image_height = height;
    }

    pub fn is_active(&self) -> bool {
        self.active
    }

    pub fn is_moving(&self) -> bool {
        self.moving
    }

    pub fn mask(&self) -> Option<&CoverageMask> {
        self.mask.as_ref()
    }

    /// Union of all outline bounds; zero when nothing is selected.
    pub fn bounds(&self) -> IntRect {
        self.bounds
    }

    pub fn outlines(&self) -> &[Outline] {
        &self.outlines
    }

    pub fn combine_mode(&self) -> CombineMode {
        self.combine_mode
    }

    pub fn set_combine_mode(&mut self, mode: CombineMode) {
        self.combine_mode = mode;
    }

    pub fn display_style(&self) -> DisplayStyle {
        self.display_style
    }

    pub fn set_display_style(&mut self, style: DisplayStyle) {
        self.display_style = style;
    }

    pub fn offset_x(&self) -> i32 {
        self.offset.0
    }

    pub fn offset_y(&self) -> i32 {
        self.offset.1
    }

    /// Set the pending move offset directly (absolute, in image pixels).
    pub fn set_offset(&mut self, x: i32, y: i32) {
        self.offset = (x, y);
    }

    pub fn renderer(&self) -> &OutlineRenderer {
        &self.renderer
    }

    // ========================================================================
    // Mask changes
    // ========================================================================

    /// Re-trace outlines and bounds from the current mask.
    fn refresh(&mut self) {
        self.outlines.clear();
        self.bounds = IntRect::zero();

        if let Some(mask) = &self.mask {
            let report = trace_mask(mask, &self.trace_options);
            for fault in &report.faults {
                warn!("Dropped selection outline: {}", fault);
            }
            self.outlines = report.outlines;
            self.bounds = self
                .outlines
                .iter()
                .map(Outline::bounds)
                .filter(|b| !b.is_empty())
                .fold(IntRect::zero(), |acc, b| acc.union(&b));
        }

        self.renderer.invalidate();
    }

    /// Select the whole image.
    pub fn select_all(&mut self) {
        self.active = true;
        self.mask = Some(CoverageMask::filled(
            self.image_width,
            self.image_height,
            255,
        ));
        self.refresh();
    }

    /// Fold a shape into the selection with the current combine mode.
    ///
    /// A null shape leaves everything unchanged.
    pub fn select(&mut self, shape: &SelectionShape) {
        self.select_with_mode(shape, self.combine_mode);
    }

    /// Fold a shape into the selection with an explicit mode.
    pub fn select_with_mode(&mut self, shape: &SelectionShape, mode: CombineMode) {
        if shape.is_null() {
            debug!("Ignoring null selection shape");
            return;
        }

        let mask = combine::combine(
            self.mask.as_ref(),
            shape,
            mode,
            self.image_width,
            self.image_height,
        );
        self.active = true;
        self.mask = Some(mask);
        self.refresh();
    }

    /// Replace the selection with `shape`, whatever the current mode.
    pub fn set_selection(&mut self, shape: &SelectionShape) {
        self.select_with_mode(shape, CombineMode::Replace);
    }

    /// Drop the selection.
    pub fn deselect(&mut self) {
        self.active = false;
        self.mask = None;
        self.offset = (0, 0);
        self.moving = false;
        self.refresh();
    }

    /// Complement the selection. With nothing selected this selects all.
    pub fn invert(&mut self) {
        if !self.active {
            self.select_all();
            return;
        }
        let mask = combine::invert(self.mask.as_ref(), self.image_width, self.image_height);
        self.mask = Some(mask);
        self.refresh();
    }

    // ========================================================================
    // Moving
    // ========================================================================

    pub fn begin_move(&mut self) {
        self.moving = true;
        self.offset = (0, 0);
    }

    /// Accumulate a move delta.
    pub fn update_move(&mut self, dx: i32, dy: i32) {
        self.offset.0 += dx;
        self.offset.1 += dy;
    }

    /// Commit the pending offset into the mask.
    pub fn end_move(&mut self) {
        self.moving = false;
        let (dx, dy) = self.offset;
        self.offset = (0, 0);
        if dx == 0 && dy == 0 {
            return;
        }
        if let Some(mask) = &self.mask {
            self.mask = Some(combine::bake_offset(mask, dx, dy));
            self.refresh();
        }
    }

    // ========================================================================
    // Snapshots
    // ========================================================================

    /// Deep copy of the mask and active flag.
    pub fn copy_mask(&self) -> MaskSnapshot {
        MaskSnapshot {
            mask: self.mask.clone(),
            active: self.active,
        }
    }

    /// Restore a snapshot taken with [`copy_mask`](Self::copy_mask).
    pub fn set_mask(&mut self, snapshot: MaskSnapshot) {
        if let Some(mask) = &snapshot.mask {
            if !mask.size_matches(self.image_width, self.image_height) {
                debug!(
                    "Restoring {}x{} mask into {}x{} image",
                    mask.width(),
                    mask.height(),
                    self.image_width,
                    self.image_height
                );
            }
        }
        self.mask = snapshot.mask;
        self.active = snapshot.active;
        self.offset = (0, 0);
        self.moving = false;
        self.refresh();
    }

    // ========================================================================
    // Drawing
    // ========================================================================

    /// Paint the marching ants for the current outlines onto `target`.
    ///
    /// `target` is the view at `scale`; a pending move offset is applied.
    pub fn draw_outline(
        &mut self,
        target: &mut Array3<u8>,
        canvas_width: usize,
        canvas_height: usize,
        scale: f64,
    ) -> Result<()> {
        let origin = (
            (self.offset.0 as f64 * scale).round() as isize,
            (self.offset.1 as f64 * scale).round() as isize,
        );
        self.renderer.draw(
            target,
            &self.outlines,
            canvas_width,
            canvas_height,
            scale,
            origin,
        )
    }

    /// Run `paint` so that its output only lands inside the selection.
    ///
    /// Without an active selection `paint` draws directly onto `canvas`.
    pub fn draw_with_mask<F>(&self, canvas: &mut Array3<u8>, paint: F) -> Result<()>
    where
        F: FnOnce(&mut Array3<u8>),
    {
        self.draw_masked(canvas, paint, false)
    }

    /// Run `paint` so that its output only lands outside the selection.
    pub fn draw_with_inverse_mask<F>(&self, canvas: &mut Array3<u8>, paint: F) -> Result<()>
    where
        F: FnOnce(&mut Array3<u8>),
    {
        self.draw_masked(canvas, paint, true)
    }

    fn draw_masked<F>(&self, canvas: &mut Array3<u8>, paint: F, inverse: bool) -> Result<()>
    where
        F: FnOnce(&mut Array3<u8>),
    {
        paint::check_rgba(canvas)?;
        let mask = match (&self.mask, self.active) {
            (Some(mask), true) => mask,
            _ => {
                paint(canvas);
                return Ok(());
            }
        };

        let mut layer = Array3::<u8>::zeros(canvas.dim());
        paint(&mut layer);
        paint::composite_masked(canvas, &layer, mask, inverse)
    }

    /// Erase canvas content inside the selection, or everything when
    /// nothing is selected.
    pub fn clear_selection(&self, canvas: &mut Array3<u8>) -> Result<()> {
        let mask = if self.active { self.mask.as_ref() } else { None };
        paint::clear_masked(canvas, mask)
    }

    // ========================================================================
    // Not implemented
    // ========================================================================

    pub fn feather(&mut self, _radius: f64) -> Result<()> {
        Err(SelectionError::Unsupported("feather"))
    }

    pub fn expand(&mut self, _pixels: u32) -> Result<()> {
        Err(SelectionError::Unsupported("expand"))
    }

    pub fn contract(&mut self, _pixels: u32) -> Result<()> {
        Err(SelectionError::Unsupported("contract"))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use kurbo::BezPath;

    #[test]
    fn test_new_state_is_inactive() {
        let state = SelectionState::new(50, 50);
        assert!(!state.is_active());
        assert!(state.mask().is_none());
        assert!(state.outlines().is_empty());
        assert_eq!(state.bounds(), IntRect::zero());
        assert_eq!(state.combine_mode(), CombineMode::Replace);
        assert_eq!(state.display_style(), DisplayStyle::RedMask);
    }

    #[test]
    fn test_select_rect_bounds() {
        let mut state = SelectionState::new(50, 50);
        state.select(&SelectionShape::rect(10, 10, 20, 20));
        assert!(state.is_active());
        assert_eq!(state.outlines().len(), 1);
        assert_eq!(state.bounds(), IntRect::new(10, 10, 20, 20));
    }

    #[test]
    fn test_replace_then_subtract() {
        let mut state = SelectionState::new(100, 100);
        state.set_combine_mode(CombineMode::Replace);
        state.select(&SelectionShape::rect(10, 10, 20, 20));
        state.set_combine_mode(CombineMode::Subtract);
        state.select(&SelectionShape::rect(15, 15, 20, 20));

        let mask = state.mask().unwrap();
        assert_eq!(mask.selected_count(), 400 - 225);
        assert_eq!(state.outlines().len(), 1);
        assert_eq!(state.bounds(), IntRect::new(10, 10, 20, 20));
    }

    #[test]
    fn test_set_selection_ignores_mode() {
        let mut state = SelectionState::new(20, 20);
        state.select(&SelectionShape::rect(0, 0, 5, 5));
        state.set_combine_mode(CombineMode::Add);
        state.set_selection(&SelectionShape::rect(10, 10, 2, 2));
        assert_eq!(state.mask().unwrap().selected_count(), 4);
        assert_eq!(state.combine_mode(), CombineMode::Add);
    }

    #[test]
    fn test_null_shape_is_noop() {
        let mut state = SelectionState::new(20, 20);
        state.select(&SelectionShape::path(BezPath::new()));
        assert!(!state.is_active());
        assert!(state.mask().is_none());
    }

    #[test]
    fn test_select_all_and_deselect() {
        let mut state = SelectionState::new(8, 6);
        state.select_all();
        assert!(state.is_active());
        assert_eq!(state.bounds(), IntRect::new(0, 0, 8, 6));

        state.deselect();
        assert!(!state.is_active());
        assert!(state.outlines().is_empty());
        assert_eq!(state.bounds(), IntRect::zero());
    }

    #[test]
    fn test_invert_inactive_selects_all() {
        let mut state = SelectionState::new(8, 6);
        state.invert();
        assert!(state.is_active());
        assert_eq!(state.mask().unwrap().selected_count(), 48);
    }

    #[test]
    fn test_double_invert_restores_mask() {
        let mut state = SelectionState::new(30, 30);
        state.select(&SelectionShape::ellipse(IntRect::new(5, 5, 15, 10)));
        let before = state.mask().unwrap().clone();
        state.invert();
        assert_ne!(state.mask().unwrap(), &before);
        state.invert();
        assert_eq!(state.mask().unwrap(), &before);
    }

    #[test]
    fn test_inverted_rect_has_two_outlines() {
        let mut state = SelectionState::new(30, 30);
        state.select(&SelectionShape::rect(10, 10, 5, 5));
        state.invert();
        assert_eq!(state.outlines().len(), 2);
        assert_eq!(state.bounds(), IntRect::new(0, 0, 30, 30));
    }

    #[test]
    fn test_move_bakes_offset() {
        let mut state = SelectionState::new(50, 50);
        state.select(&SelectionShape::rect(10, 10, 20, 20));
        state.begin_move();
        assert!(state.is_moving());
        state.update_move(3, 0);
        state.update_move(2, -4);
        assert_eq!((state.offset_x(), state.offset_y()), (5, -4));
        // Outlines keep the committed position until the move ends
        assert_eq!(state.bounds(), IntRect::new(10, 10, 20, 20));

        state.end_move();
        assert!(!state.is_moving());
        assert_eq!((state.offset_x(), state.offset_y()), (0, 0));
        assert_eq!(state.bounds(), IntRect::new(15, 6, 20, 20));
    }

    #[test]
    fn test_snapshot_round_trip() {
        let mut state = SelectionState::new(20, 20);
        state.select(&SelectionShape::rect(2, 2, 5, 5));
        let snapshot = state.copy_mask();

        state.deselect();
        assert!(!state.is_active());

        state.set_mask(snapshot.clone());
        assert!(state.is_active());
        assert_eq!(state.mask(), snapshot.mask());
        assert_eq!(state.bounds(), IntRect::new(2, 2, 5, 5));
    }

    #[test]
    fn test_snapshot_is_independent() {
        let mut state = SelectionState::new(20, 20);
        state.select(&SelectionShape::rect(2, 2, 5, 5));
        let snapshot = state.copy_mask();
        state.set_combine_mode(CombineMode::Add);
        state.select(&SelectionShape::rect(10, 10, 5, 5));
        assert_eq!(snapshot.mask().unwrap().selected_count(), 25);
    }

    #[test]
    fn test_image_resize_reallocates_mask() {
        let _ = env_logger::builder().is_test(true).try_init();
        let mut state = SelectionState::new(10, 10);
        state.select(&SelectionShape::rect(0, 0, 5, 5));
        state.set_image_size(20, 15);
        state.set_combine_mode(CombineMode::Add);
        state.select(&SelectionShape::rect(12, 12, 2, 2));
        let mask = state.mask().unwrap();
        assert_eq!((mask.width(), mask.height()), (20, 15));
        assert_eq!(mask.selected_count(), 4);
    }

    #[test]
    fn test_draw_with_mask_limits_paint() {
        let mut state = SelectionState::new(6, 6);
        let fill_red = |img: &mut Array3<u8>| {
            for mut px in img.rows_mut() {
                px.assign(&ndarray::arr1(&[255, 0, 0, 255]));
            }
        };

        let mut canvas = Array3::<u8>::zeros((6, 6, 4));
        state.draw_with_mask(&mut canvas, fill_red).unwrap();
        assert_eq!(canvas[[5, 5, 0]], 255);

        state.select(&SelectionShape::rect(0, 0, 3, 6));
        let mut canvas = Array3::<u8>::zeros((6, 6, 4));
        state.draw_with_mask(&mut canvas, fill_red).unwrap();
        assert_eq!(canvas[[0, 0, 0]], 255);
        assert_eq!(canvas[[0, 5, 0]], 0);

        let mut canvas = Array3::<u8>::zeros((6, 6, 4));
        state.draw_with_inverse_mask(&mut canvas, fill_red).unwrap();
        assert_eq!(canvas[[0, 0, 0]], 0);
        assert_eq!(canvas[[0, 5, 0]], 255);
    }

    #[test]
    fn test_clear_selection() {
        let mut state = SelectionState::new(4, 4);
        state.select(&SelectionShape::rect(0, 0, 2, 2));
        let mut canvas = Array3::<u8>::from_elem((4, 4, 4), 200);
        state.clear_selection(&mut canvas).unwrap();
        assert_eq!(canvas[[0, 0, 3]], 0);
        assert_eq!(canvas[[3, 3, 3]], 200);

        state.deselect();
        state.clear_selection(&mut canvas).unwrap();
        assert_eq!(canvas[[3, 3, 3]], 0);
    }

    #[test]
    fn test_draw_outline_caches_overlay() {
        let mut state = SelectionState::new(10, 10);
        state.select(&SelectionShape::rect(2, 2, 4, 4));
        let mut view = Array3::<u8>::zeros((10, 10, 4));
        state.draw_outline(&mut view, 10, 10, 1.0).unwrap();
        state.draw_outline(&mut view, 10, 10, 1.0).unwrap();
        assert_eq!(state.renderer().redraw_count(), 1);
        assert_eq!(view[[2, 2, 0]], 255);

        state.invert();
        state.draw_outline(&mut view, 10, 10, 1.0).unwrap();
        assert_eq!(state.renderer().redraw_count(), 2);
    }

    #[test]
    fn test_unsupported_operations() {
        let mut state = SelectionState::new(4, 4);
        assert_eq!(state.feather(2.0), Err(SelectionError::Unsupported("feather")));
        assert!(matches!(state.expand(1), Err(SelectionError::Unsupported(_))));
        assert!(matches!(state.contract(1), Err(SelectionError::Unsupported(_))));
    }
}
