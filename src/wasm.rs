//! WebAssembly exports for selection masks.
//!
//! These functions are exposed to JavaScript via wasm-bindgen.
//!
//! Masks cross the boundary as flat row-major byte buffers
//! (length = width * height, one byte per pixel).

use wasm_bindgen::prelude::*;

use crate::selection::combine::{bake_offset, combine, invert};
use crate::selection::contour::{extract_outlines, outlines_to_flat};
use crate::selection::{CombineMode, CoverageMask, SelectionShape};

fn to_js_error(err: crate::SelectionError) -> JsValue {
    JsValue::from_str(&err.to_string())
}

fn mask_from(data: &[u8], width: usize, height: usize) -> Result<CoverageMask, JsValue> {
    CoverageMask::from_raw(width, height, width, data).map_err(to_js_error)
}

// ============================================================================
// Outline Tracing
// ============================================================================

/// Trace selection outlines.
///
/// # Arguments
/// * `data` - Flat mask bytes (length = width * height)
/// * `width` - Mask width in pixels
/// * `height` - Mask height in pixels
///
/// # Returns
/// Flat i32 array, see `outlines_to_flat` for the layout
#[wasm_bindgen]
pub fn trace_outlines_wasm(data: &[u8], width: usize, height: usize) -> Result<Vec<i32>, JsValue> {
    let mask = mask_from(data, width, height)?;
    Ok(outlines_to_flat(&extract_outlines(&mask)))
}

// ============================================================================
// Combining
// ============================================================================

/// Combine a rectangle into a mask.
///
/// # Arguments
/// * `mode` - 0 = replace, 1 = add, 2 = subtract, 3 = intersect
#[wasm_bindgen]
#[allow(clippy::too_many_arguments)]
pub fn combine_rect_wasm(
    data: &[u8],
    width: usize,
    height: usize,
    x: i32,
    y: i32,
    rect_width: i32,
    rect_height: i32,
    mode: u8,
) -> Result<Vec<u8>, JsValue> {
    let mode = CombineMode::from_index(mode)
        .ok_or_else(|| JsValue::from_str(&format!("Unknown combine mode: {}", mode)))?;
    let existing = mask_from(data, width, height)?;
    let shape = SelectionShape::rect(x, y, rect_width, rect_height);
    let result = combine(Some(&existing), &shape, mode, width, height);
    Ok(result.as_slice().to_vec())
}

/// Complement a mask.
#[wasm_bindgen]
pub fn invert_wasm(data: &[u8], width: usize, height: usize) -> Result<Vec<u8>, JsValue> {
    let existing = mask_from(data, width, height)?;
    Ok(invert(Some(&existing), width, height).as_slice().to_vec())
}

/// Shift mask content by (dx, dy).
#[wasm_bindgen]
pub fn bake_offset_wasm(
    data: &[u8],
    width: usize,
    height: usize,
    dx: i32,
    dy: i32,
) -> Result<Vec<u8>, JsValue> {
    let existing = mask_from(data, width, height)?;
    Ok(bake_offset(&existing, dx, dy).as_slice().to_vec())
}
