use std::fs;
use std::path::{Path, PathBuf};

use gdal::raster::{Buffer, GdalType};
use gdal::{DriverManager, Metadata};
use tempfile::TempDir;

use crate::error::{Result, StageError};
use crate::model::{Grid, NoData};

/// A GeoTIFF fully written to a scratch directory next to its destination,
/// waiting to be moved into place. Dropping it without committing removes
/// the scratch file.
#[derive(Debug)]
pub struct StagedRaster {
    scratch: TempDir,
    file_name: PathBuf,
    destination: PathBuf,
}

impl StagedRaster {
    pub fn destination(&self) -> &Path {
        &self.destination
    }

    /// Moves the staged file to its destination.
    pub fn commit(self) -> Result<PathBuf> {
        let staged = self.scratch.path().join(&self.file_name);
        fs::rename(&staged, &self.destination)
            .map_err(|e| StageError::persistence(&self.destination, e))?;
        Ok(self.destination)
    }
}

/// Writes single-band GeoTIFFs. No-data cells are written as the cell
/// type's sentinel, which is also recorded as the band's no-data value.
#[derive(Default)]
pub struct GeoTiffWriter {
    metadata: Vec<(String, String)>,
}

impl GeoTiffWriter {
    pub fn new() -> Self {
        Self::default()
    }

    /// Adds a dataset metadata item written with every raster.
    pub fn with_metadata(mut self, key: &str, value: impl Into<String>) -> Self {
        self.metadata.push((key.to_string(), value.into()));
        self
    }

    /// Writes and commits in one step.
    pub fn write<T>(&self, grid: &Grid<T>, output_path: &Path) -> Result<PathBuf>
    where
        T: GdalType + NoData + Copy,
    {
        self.stage(grid, output_path)?.commit()
    }

    /// Writes `grid` to a scratch file in the destination's directory.
    pub fn stage<T>(&self, grid: &Grid<T>, output_path: &Path) -> Result<StagedRaster>
    where
        T: GdalType + NoData + Copy,
    {
        let parent = match output_path.parent() {
            Some(p) if !p.as_os_str().is_empty() => p.to_path_buf(),
            _ => PathBuf::from("."),
        };
        let file_name = output_path
            .file_name()
            .map(PathBuf::from)
            .ok_or_else(|| StageError::persistence(output_path, "destination has no file name"))?;

        fs::create_dir_all(&parent).map_err(|e| StageError::persistence(output_path, e))?;
        let scratch = tempfile::Builder::new()
            .prefix(".ndvi-stage-")
            .tempdir_in(&parent)
            .map_err(|e| StageError::persistence(output_path, e))?;

        self.write_standard(grid, &scratch.path().join(&file_name))
            .map_err(|e| StageError::persistence(output_path, e))?;

        Ok(StagedRaster {
            scratch,
            file_name,
            destination: output_path.to_path_buf(),
        })
    }

    fn write_standard<T>(&self, grid: &Grid<T>, path: &Path) -> gdal::errors::Result<()>
    where
        T: GdalType + NoData + Copy,
    {
        let (rows, cols) = grid.shape();

        tracing::debug!("Writing {} x {} GeoTIFF to {:?}", cols, rows, path);

        let driver = DriverManager::get_driver_by_name("GTiff")?;
        let mut dataset = driver.create_with_band_type::<T, _>(path, cols, rows, 1)?;

        dataset.set_geo_transform(&grid.georef.transform.to_gdal())?;
        if !grid.georef.projection.is_empty() {
            dataset.set_projection(&grid.georef.projection)?;
        }

        for (key, value) in &self.metadata {
            dataset.set_metadata_item(key, value, "")?;
        }

        let mut band = dataset.rasterband(1)?;
        band.set_no_data_value(Some(T::nodata_f64()))?;

        // GDAL expects row-major order
        let mut buffer = Buffer::new((cols, rows), grid.to_sentinel_values());
        band.write((0, 0), (cols, rows), &mut buffer)?;

        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::{GeoTransform, Georef};
    use gdal::spatial_ref::SpatialRef;
    use gdal::Dataset;
    use tempfile::TempDir;

    fn gtiff_available() -> bool {
        DriverManager::get_driver_by_name("GTiff").is_ok()
    }

    fn score_grid() -> Grid<u8> {
        let projection = SpatialRef::from_epsg(32611).unwrap().to_wkt().unwrap();
        let georef = Georef {
            transform: GeoTransform::north_up(500000.0, 4000000.0, 30.0, -30.0),
            projection,
        };
        Grid::new(2, 3, georef, vec![Some(0), Some(1), None, Some(3), Some(4), Some(5)]).unwrap()
    }

    #[test]
    fn test_write_scores() {
        if !gtiff_available() {
            eprintln!("Skipping test: GTiff driver not available");
            return;
        }
        let temp_dir = TempDir::new().unwrap();
        let output_path = temp_dir.path().join("ndvi_scores.tif");

        let grid = score_grid();
        let writer = GeoTiffWriter::new().with_metadata("NDVI_STAGE_MASK", "INSIDE");
        writer.write(&grid, &output_path).unwrap();

        assert!(output_path.exists());

        let dataset = Dataset::open(&output_path).unwrap();
        assert_eq!(dataset.raster_size(), (3, 2));
        assert_eq!(dataset.geo_transform().unwrap(), grid.georef.transform.to_gdal());
        assert_eq!(
            dataset.metadata_item("NDVI_STAGE_MASK", "").as_deref(),
            Some("INSIDE")
        );

        let band = dataset.rasterband(1).unwrap();
        assert_eq!(band.no_data_value(), Some(255.0));
        let buffer = band.read_as::<u8>((0, 0), (3, 2), (3, 2), None).unwrap();
        assert_eq!(buffer.data(), &[0, 1, 255, 3, 4, 5]);
    }

    #[test]
    fn test_staged_raster_is_invisible_until_commit() {
        if !gtiff_available() {
            eprintln!("Skipping test: GTiff driver not available");
            return;
        }
        let temp_dir = TempDir::new().unwrap();
        let output_path = temp_dir.path().join("scores.tif");

        let staged = GeoTiffWriter::new().stage(&score_grid(), &output_path).unwrap();
        assert!(!output_path.exists());
        assert_eq!(staged.destination(), output_path.as_path());

        drop(staged);
        assert!(!output_path.exists());
        assert_eq!(fs::read_dir(temp_dir.path()).unwrap().count(), 0);
    }

    #[test]
    fn test_unwritable_destination() {
        let err = GeoTiffWriter::new()
            .write(&score_grid(), Path::new("/proc/ndvi/scores.tif"))
            .unwrap_err();
        assert!(matches!(err, StageError::Persistence { .. }));
    }
}
