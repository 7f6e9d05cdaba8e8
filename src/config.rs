use std::path::PathBuf;

use crate::classify::RemapRange;

/// What to do with cells where `NIR + Red == 0`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum ZeroDenominator {
    /// Mark the cell as no-data.
    #[default]
    NoData,
    /// Abort the stage with `StageError::DivisionEdgeCase`.
    Fail,
}

/// What to do when the boundary does not overlap the raster extent.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum MaskPolicy {
    /// Produce an all no-data output and log a warning.
    #[default]
    Permissive,
    /// Abort the stage with `StageError::Mask`.
    Strict,
}

#[derive(Debug, Clone)]
pub struct StageConfig {
    pub zero_denominator: ZeroDenominator,
    pub mask_policy: MaskPolicy,
    pub remap: RemapRange,
    /// Also write the continuous NDVI grid (unmasked) to this path.
    pub ndvi_output: Option<PathBuf>,
}

impl Default for StageConfig {
    fn default() -> Self {
        StageConfig {
            zero_denominator: ZeroDenominator::default(),
            mask_policy: MaskPolicy::default(),
            remap: RemapRange::fire_fuel(),
            ndvi_output: None,
        }
    }
}
