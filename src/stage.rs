//! The NDVI stage: load, compute, reclassify, mask, persist.

use std::convert::Infallible;
use std::fmt;
use std::fs;
use std::path::PathBuf;
use std::str::FromStr;
use std::time::Instant;

use tracing::{info, warn};

use crate::classify::ScoreSummary;
use crate::config::StageConfig;
use crate::error::{Result, StageError};
use crate::mask::{apply_mask, Boundary};
use crate::model::Grid;
use crate::ndvi::compute_ndvi;
use crate::reader;
use crate::session::GdalSession;
use crate::writer::{GeoTiffWriter, StagedRaster};

const MEMORY_PREFIX: &str = "memory/";

/// Where the classified raster ends up.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum OutputTarget {
    GeoTiff(PathBuf),
    /// Kept in memory under a name; nothing is written and the grid is
    /// handed to the caller in [`StageOutput`].
    Memory(String),
}

impl FromStr for OutputTarget {
    type Err = Infallible;

    fn from_str(s: &str) -> std::result::Result<Self, Self::Err> {
        Ok(match s.strip_prefix(MEMORY_PREFIX) {
            Some(name) => OutputTarget::Memory(name.to_string()),
            None => OutputTarget::GeoTiff(PathBuf::from(s)),
        })
    }
}

impl fmt::Display for OutputTarget {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            OutputTarget::GeoTiff(path) => write!(f, "{}", path.display()),
            OutputTarget::Memory(name) => write!(f, "{}{}", MEMORY_PREFIX, name),
        }
    }
}

#[derive(Debug, Clone)]
pub struct StageInputs {
    pub nir: PathBuf,
    pub red: PathBuf,
    pub boundary: PathBuf,
    pub output: OutputTarget,
}

/// Intermediate and final grids of one run, before persistence.
#[derive(Debug, Clone)]
pub struct Processed {
    pub ndvi: Grid<f64>,
    pub scores: Grid<u8>,
}

#[derive(Debug, Clone)]
pub struct StageOutput {
    /// Masked scores, owned by the caller once the stage returns.
    pub scores: Grid<u8>,
    pub summary: ScoreSummary,
    /// Files moved into place, in commit order.
    pub written: Vec<PathBuf>,
}

pub struct NdviStage {
    config: StageConfig,
}

impl NdviStage {
    pub fn new(config: StageConfig) -> Self {
        NdviStage { config }
    }

    /// Compute, reclassify and mask without touching the filesystem.
    pub fn process(&self, nir: &Grid<f64>, red: &Grid<f64>, boundary: &Boundary) -> Result<Processed> {
        let ndvi = compute_ndvi(nir, red, self.config.zero_denominator)?;
        info!(
            "NDVI computed: {} of {} cells valid",
            ndvi.valid_count(),
            ndvi.cells.len()
        );

        let classified = self.config.remap.reclassify(&ndvi);
        let scores = apply_mask(&classified, boundary, self.config.mask_policy)?;

        Ok(Processed { ndvi, scores })
    }

    /// Runs the whole stage. Either every output is written or none is.
    pub fn run(&self, inputs: &StageInputs) -> Result<StageOutput> {
        if let (Some(ndvi_path), OutputTarget::GeoTiff(path)) = (&self.config.ndvi_output, &inputs.output) {
            if ndvi_path == path {
                return Err(StageError::InvalidParameter {
                    name: "ndvi_output",
                    value: ndvi_path.display().to_string(),
                    reason: "same path as the score output".to_string(),
                });
            }
        }

        let _session = GdalSession::acquire()?;
        let start_time = Instant::now();

        let nir = reader::read_band(&inputs.nir)?;
        let red = reader::read_band(&inputs.red)?;
        let layer = reader::read_boundary(&inputs.boundary)?;

        if let Some(projection) = &layer.projection {
            if !reader::same_crs(projection, &nir.georef.projection) {
                warn!(
                    "Boundary {:?} and bands use different coordinate systems; no reprojection is done",
                    inputs.boundary
                );
            }
        }

        let processed = self.process(&nir, &red, &layer.boundary)?;
        let summary = ScoreSummary::from_grid(&processed.scores);
        info!("Scores: {}", summary);

        let writer = GeoTiffWriter::new()
            .with_metadata("NDVI_STAGE_SCORES", self.config.remap.to_string())
            .with_metadata("NDVI_STAGE_MASK", "INSIDE");

        let mut staged = Vec::new();
        if let Some(ndvi_path) = &self.config.ndvi_output {
            staged.push(GeoTiffWriter::new().stage(&processed.ndvi, ndvi_path)?);
        }
        match &inputs.output {
            OutputTarget::GeoTiff(path) => staged.push(writer.stage(&processed.scores, path)?),
            OutputTarget::Memory(name) => info!("Keeping scores in memory as {:?}", name),
        }

        let written = commit_all(staged)?;
        for path in &written {
            info!("Written GeoTIFF: {:?}", path);
        }

        info!("NDVI stage finished in {:?}", start_time.elapsed());

        Ok(StageOutput {
            scores: processed.scores,
            summary,
            written,
        })
    }
}

/// Moves every staged raster into place. If one fails, the ones already
/// moved are removed again before the error is returned.
fn commit_all(staged: Vec<StagedRaster>) -> Result<Vec<PathBuf>> {
    let mut written = Vec::with_capacity(staged.len());
    for raster in staged {
        match raster.commit() {
            Ok(path) => written.push(path),
            Err(e) => {
                for path in &written {
                    if let Err(remove_err) = fs::remove_file(path) {
                        warn!("Failed to remove {:?} after commit error: {}", path, remove_err);
                    }
                }
                return Err(e);
            }
        }
    }
    Ok(written)
}
