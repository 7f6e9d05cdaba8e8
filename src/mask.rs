//! Study-area masking.
//!
//! A cell is kept when its centre lies strictly inside the boundary.
//! Centres exactly on a polygon edge are treated as outside.

use geo::{coord, BoundingRect, Contains, Geometry, Intersects, MultiPolygon, Point, Polygon, Rect};
use rayon::prelude::*;
use tracing::warn;

use crate::config::MaskPolicy;
use crate::error::{Result, StageError};
use crate::model::Grid;

/// Polygonal study area used only as a clip mask.
#[derive(Debug, Clone, PartialEq)]
pub struct Boundary {
    polygons: MultiPolygon<f64>,
    extent: Rect<f64>,
}

impl Boundary {
    pub fn new(polygons: MultiPolygon<f64>) -> Result<Self> {
        let extent = polygons
            .bounding_rect()
            .ok_or_else(|| StageError::Mask("boundary has no polygons".to_string()))?;
        Ok(Boundary { polygons, extent })
    }

    /// Collects every polygonal part of `geometries`. Points and lines are
    /// ignored; a boundary without any polygon is an error.
    pub fn from_geometries<I>(geometries: I) -> Result<Self>
    where
        I: IntoIterator<Item = Geometry<f64>>,
    {
        let mut polygons = Vec::new();
        for geometry in geometries {
            collect_polygons(geometry, &mut polygons);
        }
        polygons.retain(|p| !p.exterior().0.is_empty());
        if polygons.is_empty() {
            return Err(StageError::Mask(
                "boundary contains no polygon geometry".to_string(),
            ));
        }
        Boundary::new(MultiPolygon::new(polygons))
    }

    pub fn polygons(&self) -> &MultiPolygon<f64> {
        &self.polygons
    }

    pub fn extent(&self) -> Rect<f64> {
        self.extent
    }

    pub fn contains_point(&self, x: f64, y: f64) -> bool {
        let (min, max) = (self.extent.min(), self.extent.max());
        if x < min.x || x > max.x || y < min.y || y > max.y {
            return false;
        }
        self.polygons.contains(&Point::new(x, y))
    }
}

fn collect_polygons(geometry: Geometry<f64>, out: &mut Vec<Polygon<f64>>) {
    match geometry {
        Geometry::Polygon(p) => out.push(p),
        Geometry::MultiPolygon(mp) => out.extend(mp.0),
        Geometry::Rect(r) => out.push(r.to_polygon()),
        Geometry::Triangle(t) => out.push(t.to_polygon()),
        Geometry::GeometryCollection(gc) => {
            for g in gc.0 {
                collect_polygons(g, out);
            }
        }
        _ => {}
    }
}

/// Sets every cell whose centre falls outside `boundary` to no-data.
///
/// When no cell centre falls inside, `MaskPolicy::Strict` fails and
/// `MaskPolicy::Permissive` returns an all no-data grid.
pub fn apply_mask<T>(grid: &Grid<T>, boundary: &Boundary, policy: MaskPolicy) -> Result<Grid<T>>
where
    T: Copy + Send + Sync,
{
    let transform = grid.georef.transform;
    let (min_x, min_y, max_x, max_y) = transform.bounds(grid.rows, grid.cols);
    let raster_extent = Rect::new(coord! { x: min_x, y: min_y }, coord! { x: max_x, y: max_y });

    let inside: Vec<bool> = if raster_extent.intersects(&boundary.extent()) {
        let cols = grid.cols.max(1);
        (0..grid.cells.len())
            .into_par_iter()
            .map(|i| {
                let (x, y) = transform.cell_center(i / cols, i % cols);
                boundary.contains_point(x, y)
            })
            .collect()
    } else {
        vec![false; grid.cells.len()]
    };

    if !grid.cells.is_empty() && !inside.iter().any(|&b| b) {
        let message = format!(
            "boundary extent {:?} does not overlap any cell of raster extent {:?}",
            boundary.extent(),
            raster_extent
        );
        match policy {
            MaskPolicy::Strict => return Err(StageError::Mask(message)),
            MaskPolicy::Permissive => warn!("{}; output will be entirely no-data", message),
        }
    }

    let cells = grid
        .cells
        .iter()
        .zip(inside.iter())
        .map(|(&cell, &keep)| if keep { cell } else { None })
        .collect();

    Ok(grid.with_cells(cells))
}
