//! Normalized difference vegetation index.

use gdal::spatial_ref::SpatialRef;
use rayon::prelude::*;

use crate::config::ZeroDenominator;
use crate::error::{Result, StageError};
use crate::model::Grid;

/// Checks that two bands share shape, geotransform and projection.
pub fn ensure_compatible<A: Copy, B: Copy>(a: &Grid<A>, b: &Grid<B>) -> Result<()> {
    if a.shape() != b.shape() {
        return Err(StageError::InputMismatch(format!(
            "shape {}x{} vs {}x{}",
            a.rows, a.cols, b.rows, b.cols
        )));
    }
    if !a.georef.transform.approx_eq(&b.georef.transform) {
        return Err(StageError::InputMismatch(format!(
            "geotransform {:?} vs {:?}",
            a.georef.transform.0, b.georef.transform.0
        )));
    }
    if !same_projection(&a.georef.projection, &b.georef.projection) {
        return Err(StageError::InputMismatch(
            "projections differ".to_string(),
        ));
    }
    Ok(())
}

/// Two WKT strings naming the same coordinate system compare equal even when
/// the text differs. Text GDAL cannot parse falls back to exact comparison.
/// A band with a projection never matches one without.
fn same_projection(a: &str, b: &str) -> bool {
    match (a.is_empty(), b.is_empty()) {
        (true, true) => true,
        (true, false) | (false, true) => false,
        (false, false) => match (SpatialRef::from_wkt(a), SpatialRef::from_wkt(b)) {
            (Ok(a_srs), Ok(b_srs)) => a_srs == b_srs,
            _ => a == b,
        },
    }
}

/// `(a - b) / (a + b)` for one cell. `None` when either input is missing
/// or the denominator is exactly zero.
pub fn normalized_difference(a: Option<f64>, b: Option<f64>) -> Option<f64> {
    let (a, b) = (a?, b?);
    let sum = a + b;
    if sum == 0.0 {
        return None;
    }
    Some((a - b) / sum).filter(|v| v.is_finite())
}

/// NDVI = (NIR - Red) / (NIR + Red), cell by cell.
pub fn compute_ndvi(nir: &Grid<f64>, red: &Grid<f64>, policy: ZeroDenominator) -> Result<Grid<f64>> {
    ensure_compatible(nir, red)?;

    if policy == ZeroDenominator::Fail {
        let zero = nir
            .cells
            .par_iter()
            .zip(red.cells.par_iter())
            .position_first(|pair| matches!(pair, (Some(n), Some(r)) if n + r == 0.0));
        if let Some(idx) = zero {
            return Err(StageError::DivisionEdgeCase {
                row: idx / nir.cols,
                col: idx % nir.cols,
            });
        }
    }

    let cells: Vec<Option<f64>> = nir
        .cells
        .par_iter()
        .zip(red.cells.par_iter())
        .map(|(&n, &r)| normalized_difference(n, r))
        .collect();

    Ok(nir.with_cells(cells))
}
