//! Pixel selection for image editing.
//!
//! This module provides the selection subsystem:
//! - **mask**: 8-bit coverage raster (0 = unselected, 255 = selected)
//! - **shape**: rectangles and vector paths, rasterized with the even-odd rule
//! - **combine**: Replace / Add / Subtract / Intersect, invert, move baking
//! - **contour**: marching squares boundary tracing for marching ants
//! - **outline**: cached overlay of the traced outlines at a zoom scale
//! - **paint**: drawing and clearing through the mask
//! - **state**: per-document selection state tying the above together

pub mod combine;
pub mod contour;
pub mod mask;
pub mod outline;
pub mod paint;
pub mod shape;
pub mod state;

pub use combine::CombineMode;
pub use contour::{extract_outlines, trace_mask, Direction, Outline, TraceOptions, TraceReport};
pub use mask::CoverageMask;
pub use outline::{OutlineRenderer, OutlineStyle};
pub use shape::{IntRect, SelectionShape};
pub use state::{DisplayStyle, MaskSnapshot, SelectionConfig, SelectionState};
