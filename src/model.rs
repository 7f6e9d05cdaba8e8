use crate::error::{Result, StageError};

/// Tolerance used when comparing geotransform coefficients of two grids.
pub const GEOTRANSFORM_TOLERANCE: f64 = 1e-9;

/// Affine transform in GDAL coefficient order:
/// `[origin_x, pixel_width, row_rotation, origin_y, col_rotation, pixel_height]`.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct GeoTransform(pub [f64; 6]);

impl GeoTransform {
    /// North-up transform with no rotation.
    pub fn north_up(origin_x: f64, origin_y: f64, pixel_width: f64, pixel_height: f64) -> Self {
        GeoTransform([origin_x, pixel_width, 0.0, origin_y, 0.0, pixel_height])
    }

    pub fn to_gdal(&self) -> [f64; 6] {
        self.0
    }

    /// Geographic coordinates of the centre of cell (row, col).
    pub fn cell_center(&self, row: usize, col: usize) -> (f64, f64) {
        let [ox, pw, rr, oy, cr, ph] = self.0;
        let c = col as f64 + 0.5;
        let r = row as f64 + 0.5;
        (ox + c * pw + r * rr, oy + c * cr + r * ph)
    }

    /// Bounding box `(min_x, min_y, max_x, max_y)` of a `rows` x `cols` grid.
    pub fn bounds(&self, rows: usize, cols: usize) -> (f64, f64, f64, f64) {
        let [ox, pw, rr, oy, cr, ph] = self.0;
        let corner = |r: f64, c: f64| (ox + c * pw + r * rr, oy + c * cr + r * ph);
        let corners = [
            corner(0.0, 0.0),
            corner(0.0, cols as f64),
            corner(rows as f64, 0.0),
            corner(rows as f64, cols as f64),
        ];

        corners.iter().fold(
            (f64::INFINITY, f64::INFINITY, f64::NEG_INFINITY, f64::NEG_INFINITY),
            |(min_x, min_y, max_x, max_y), &(x, y)| {
                (min_x.min(x), min_y.min(y), max_x.max(x), max_y.max(y))
            },
        )
    }

    pub fn approx_eq(&self, other: &GeoTransform) -> bool {
        self.0
            .iter()
            .zip(other.0.iter())
            .all(|(a, b)| (a - b).abs() <= GEOTRANSFORM_TOLERANCE)
    }
}

impl Default for GeoTransform {
    fn default() -> Self {
        GeoTransform::north_up(0.0, 0.0, 1.0, -1.0)
    }
}

/// Spatial reference of a grid. Carried through the stage untouched.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Georef {
    pub transform: GeoTransform,
    /// Projection as WKT; empty when the source had none.
    pub projection: String,
}

/// On-disk sentinel for cells without a value.
pub trait NoData: Copy {
    const NODATA: Self;

    fn nodata_f64() -> f64;
}

impl NoData for u8 {
    const NODATA: Self = 255;

    fn nodata_f64() -> f64 {
        255.0
    }
}

impl NoData for f64 {
    const NODATA: Self = -9999.0;

    fn nodata_f64() -> f64 {
        -9999.0
    }
}

/// Single-band georeferenced grid. Cells are row-major; `None` is no-data.
#[derive(Debug, Clone, PartialEq)]
pub struct Grid<T> {
    pub rows: usize,
    pub cols: usize,
    pub georef: Georef,
    pub cells: Vec<Option<T>>,
}

impl<T: Copy> Grid<T> {
    pub fn new(rows: usize, cols: usize, georef: Georef, cells: Vec<Option<T>>) -> Result<Self> {
        if cells.len() != rows * cols {
            return Err(StageError::InvalidParameter {
                name: "cells",
                value: cells.len().to_string(),
                reason: format!("expected {} cells for a {}x{} grid", rows * cols, rows, cols),
            });
        }
        Ok(Grid {
            rows,
            cols,
            georef,
            cells,
        })
    }

    /// (rows, cols)
    pub fn shape(&self) -> (usize, usize) {
        (self.rows, self.cols)
    }

    pub fn get(&self, row: usize, col: usize) -> Option<T> {
        if row >= self.rows || col >= self.cols {
            return None;
        }
        self.cells[row * self.cols + col]
    }

    pub fn valid_count(&self) -> usize {
        self.cells.iter().filter(|c| c.is_some()).count()
    }

    /// Builds a grid of the same shape and georef from new cell values.
    pub fn with_cells<U>(&self, cells: Vec<Option<U>>) -> Grid<U> {
        debug_assert_eq!(cells.len(), self.rows * self.cols);
        Grid {
            rows: self.rows,
            cols: self.cols,
            georef: self.georef.clone(),
            cells,
        }
    }
}

impl<T: NoData> Grid<T> {
    /// Cells with no-data replaced by the type's sentinel, ready for writing.
    pub fn to_sentinel_values(&self) -> Vec<T> {
        self.cells.iter().map(|c| c.unwrap_or(T::NODATA)).collect()
    }
}
