use std::path::Path;

use gdal::spatial_ref::SpatialRef;
use gdal::vector::LayerAccess;
use gdal::Dataset;
use tracing::{info, warn};

use crate::error::{Result, StageError};
use crate::mask::Boundary;
use crate::model::{GeoTransform, Georef, Grid};

/// Boundary polygons together with the layer's projection, if declared.
#[derive(Debug, Clone)]
pub struct BoundaryLayer {
    pub boundary: Boundary,
    pub projection: Option<String>,
}

/// Reads band 1 of a raster as `f64`.
///
/// NaN samples and samples equal to the band's no-data value become `None`.
pub fn read_band(path: &Path) -> Result<Grid<f64>> {
    let dataset = Dataset::open(path).map_err(|e| StageError::load(path, e))?;

    if dataset.raster_count() > 1 {
        warn!(
            "{:?} has {} bands; only band 1 is used",
            path,
            dataset.raster_count()
        );
    }

    let (cols, rows) = dataset.raster_size();
    let band = dataset.rasterband(1).map_err(|e| StageError::load(path, e))?;
    let nodata = band.no_data_value();

    let buffer = band
        .read_as::<f64>((0, 0), (cols, rows), (cols, rows), None)
        .map_err(|e| StageError::load(path, e))?;

    let cells = buffer
        .data()
        .iter()
        .map(|&v| {
            if v.is_nan() || nodata.is_some_and(|nd| v == nd) {
                None
            } else {
                Some(v)
            }
        })
        .collect();

    let transform = dataset
        .geo_transform()
        .map_err(|e| StageError::load(path, format!("missing geotransform: {}", e)))?;

    let georef = Georef {
        transform: GeoTransform(transform),
        projection: dataset.projection(),
    };

    info!("Loaded band {:?} ({}x{})", path, rows, cols);

    Grid::new(rows, cols, georef, cells)
}

/// Reads every polygonal feature of the first layer of a vector dataset.
/// Attributes are ignored.
pub fn read_boundary(path: &Path) -> Result<BoundaryLayer> {
    let dataset = Dataset::open(path).map_err(|e| StageError::load(path, e))?;
    let mut layer = dataset.layer(0).map_err(|e| StageError::load(path, e))?;
    let projection = layer.spatial_ref().and_then(|srs| srs.to_wkt().ok());

    let mut geometries = Vec::new();
    for feature in layer.features() {
        let Some(geometry) = feature.geometry() else {
            continue;
        };
        let geometry = geometry
            .to_geo()
            .map_err(|e| StageError::Mask(format!("invalid boundary geometry: {}", e)))?;
        geometries.push(geometry);
    }

    info!("Loaded {} boundary features from {:?}", geometries.len(), path);

    Ok(BoundaryLayer {
        boundary: Boundary::from_geometries(geometries)?,
        projection,
    })
}

/// Whether two WKT strings describe the same coordinate system. Empty or
/// unparsable definitions are treated as unknown and compare equal.
pub fn same_crs(a: &str, b: &str) -> bool {
    if a.is_empty() || b.is_empty() {
        return true;
    }
    match (SpatialRef::from_wkt(a), SpatialRef::from_wkt(b)) {
        (Ok(a), Ok(b)) => a == b,
        _ => true,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::fs;
    use tempfile::TempDir;

    #[test]
    fn test_read_boundary_geojson() {
        let temp_dir = TempDir::new().unwrap();
        let path = temp_dir.path().join("study_area.geojson");
        fs::write(
            &path,
            r#"{"type":"FeatureCollection","features":[
                {"type":"Feature","properties":{"name":"a"},
                 "geometry":{"type":"Polygon","coordinates":[[[0,0],[2,0],[2,2],[0,2],[0,0]]]}},
                {"type":"Feature","properties":{"name":"b"},
                 "geometry":{"type":"Point","coordinates":[5,5]}}
            ]}"#,
        )
        .unwrap();

        let layer = match read_boundary(&path) {
            Ok(layer) => layer,
            Err(StageError::Load { reason, .. }) => {
                eprintln!("Skipping test: GeoJSON driver not available ({})", reason);
                return;
            }
            Err(e) => panic!("unexpected error: {}", e),
        };

        assert_eq!(layer.boundary.polygons().0.len(), 1);
        assert!(layer.boundary.contains_point(1.0, 1.0));
        assert!(!layer.boundary.contains_point(3.0, 1.0));
    }

    #[test]
    fn test_read_missing_band() {
        let err = read_band(Path::new("/nonexistent/nir.tif")).unwrap_err();
        assert!(matches!(err, StageError::Load { .. }));
    }

    #[test]
    fn test_same_crs_unknown_is_equal() {
        assert!(same_crs("", "anything"));
        assert!(same_crs("not wkt", "also not wkt"));
    }
}
