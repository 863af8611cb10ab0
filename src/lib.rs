//! Selection Mask Engine
//!
//! Selection masks for raster image editors, implemented in Rust with
//! Python bindings via PyO3 and WASM bindings for JavaScript.
//!
//! ## Mask Format
//! A selection is a single-channel 8-bit coverage raster:
//! - **0**: unselected
//! - **255**: fully selected
//!
//! Across the FFI boundary masks are passed as (height, width, 1) arrays
//! (Python) or flat row-major byte buffers (WASM).
//!
//! ## Outlines
//! Outlines are closed paths of unit steps along pixel edges, starting at a
//! pixel corner. Corner (x, y) is the top-left corner of pixel (x, y).

pub mod error;
pub mod selection;

#[cfg(feature = "wasm")]
pub mod wasm;

pub use error::{Result, SelectionError};

// Python bindings (only when python feature is enabled)
#[cfg(feature = "python")]
mod python {
    use ndarray::Array3;
    use numpy::{IntoPyArray, PyArray3, PyReadonlyArray3};
    use pyo3::exceptions::PyValueError;
    use pyo3::prelude::*;

    use crate::selection::combine::{bake_offset, combine, invert};
    use crate::selection::contour::extract_outlines;
    use crate::selection::{CombineMode, CoverageMask, SelectionShape};

    fn parse_mode(mode: &str) -> PyResult<CombineMode> {
        CombineMode::from_name(mode)
            .ok_or_else(|| PyValueError::new_err(format!("Unknown combine mode: {}", mode)))
    }

    fn to_image(mask: CoverageMask) -> Array3<u8> {
        let (height, width) = (mask.height(), mask.width());
        mask.into_array()
            .into_shape_with_order((height, width, 1))
            .expect("mask is contiguous")
    }

    // ========================================================================
    // Outline Tracing
    // ========================================================================

    /// Trace selection outlines of a (height, width, 1) mask.
    ///
    /// # Returns
    /// List of `((x, y), path, (bx, by, bw, bh))` where `path` is a string of
    /// `U`, `R`, `L`, `D` steps starting at pixel corner (x, y).
    #[pyfunction]
    pub fn trace_selection_outlines<'py>(
        mask: PyReadonlyArray3<'py, u8>,
    ) -> PyResult<Vec<((i32, i32), String, (i32, i32, i32, i32))>> {
        let mask = CoverageMask::from_image_view(mask.as_array())?;
        let outlines = extract_outlines(&mask)
            .into_iter()
            .map(|o| {
                let b = o.bounds();
                let path: String = o.path().iter().map(|d| d.as_char()).collect();
                (o.initial_point(), path, (b.x, b.y, b.width, b.height))
            })
            .collect();
        Ok(outlines)
    }

    // ========================================================================
    // Combining
    // ========================================================================

    /// Combine a rectangle into a (height, width, 1) mask.
    ///
    /// # Arguments
    /// * `mask` - Existing mask
    /// * `x`, `y`, `width`, `height` - Rectangle in pixels
    /// * `mode` - "replace", "add", "subtract" or "intersect"
    #[pyfunction]
    #[pyo3(signature = (mask, x, y, width, height, mode="replace"))]
    pub fn combine_selection_rect<'py>(
        py: Python<'py>,
        mask: PyReadonlyArray3<'py, u8>,
        x: i32,
        y: i32,
        width: i32,
        height: i32,
        mode: &str,
    ) -> PyResult<Bound<'py, PyArray3<u8>>> {
        let mode = parse_mode(mode)?;
        let existing = CoverageMask::from_image_view(mask.as_array())?;
        let shape = SelectionShape::rect(x, y, width, height);
        let result = combine(
            Some(&existing),
            &shape,
            mode,
            existing.width(),
            existing.height(),
        );
        Ok(to_image(result).into_pyarray(py))
    }

    /// Combine a polygon (lasso) into a (height, width, 1) mask.
    #[pyfunction]
    #[pyo3(signature = (mask, points, mode="replace"))]
    pub fn combine_selection_polygon<'py>(
        py: Python<'py>,
        mask: PyReadonlyArray3<'py, u8>,
        points: Vec<(f64, f64)>,
        mode: &str,
    ) -> PyResult<Bound<'py, PyArray3<u8>>> {
        let mode = parse_mode(mode)?;
        let existing = CoverageMask::from_image_view(mask.as_array())?;
        let shape = SelectionShape::polygon(&points);
        let result = if shape.is_null() {
            existing
        } else {
            combine(
                Some(&existing),
                &shape,
                mode,
                existing.width(),
                existing.height(),
            )
        };
        Ok(to_image(result).into_pyarray(py))
    }

    /// Complement a (height, width, 1) mask.
    #[pyfunction]
    pub fn invert_selection<'py>(
        py: Python<'py>,
        mask: PyReadonlyArray3<'py, u8>,
    ) -> PyResult<Bound<'py, PyArray3<u8>>> {
        let existing = CoverageMask::from_image_view(mask.as_array())?;
        let result = invert(Some(&existing), existing.width(), existing.height());
        Ok(to_image(result).into_pyarray(py))
    }

    /// Shift mask content by (dx, dy), dropping what leaves the mask.
    #[pyfunction]
    pub fn bake_selection_offset<'py>(
        py: Python<'py>,
        mask: PyReadonlyArray3<'py, u8>,
        dx: i32,
        dy: i32,
    ) -> PyResult<Bound<'py, PyArray3<u8>>> {
        let existing = CoverageMask::from_image_view(mask.as_array())?;
        Ok(to_image(bake_offset(&existing, dx, dy)).into_pyarray(py))
    }

    /// Python module definition
    #[pymodule]
    pub fn selection_mask(m: &Bound<'_, PyModule>) -> PyResult<()> {
        m.add_function(wrap_pyfunction!(trace_selection_outlines, m)?)?;
        m.add_function(wrap_pyfunction!(combine_selection_rect, m)?)?;
        m.add_function(wrap_pyfunction!(combine_selection_polygon, m)?)?;
        m.add_function(wrap_pyfunction!(invert_selection, m)?)?;
        m.add_function(wrap_pyfunction!(bake_selection_offset, m)?)?;
        Ok(())
    }
}

#[cfg(feature = "python")]
pub use python::selection_mask;
