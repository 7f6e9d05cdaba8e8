use anyhow::{Context, Result};
use clap::Parser;
use ndvi_suitability::{
    MaskPolicy, NdviStage, OutputTarget, StageConfig, StageInputs, ZeroDenominator,
};
use rayon::ThreadPoolBuilder;
use std::path::PathBuf;
use tracing::info;

#[derive(Parser, Debug)]
#[command(author, version, about, long_about = None)]
struct Args {
    /// Near-infrared band raster
    #[arg(value_name = "NIR")]
    nir: PathBuf,

    /// Red band raster
    #[arg(value_name = "RED")]
    red: PathBuf,

    /// Study area boundary (any OGR-readable polygon dataset)
    #[arg(value_name = "BOUNDARY")]
    boundary: PathBuf,

    /// Output GeoTIFF path, or memory/<name> to skip writing
    #[arg(value_name = "OUTPUT")]
    output: String,

    /// Fail when the boundary does not cover any cell instead of writing an empty raster
    #[arg(long)]
    strict_mask: bool,

    /// Fail on cells where NIR + Red is zero instead of marking them no-data
    #[arg(long)]
    fail_on_zero_denominator: bool,

    /// Also write the continuous (unmasked) NDVI raster here
    #[arg(long, value_name = "PATH")]
    ndvi_output: Option<PathBuf>,

    /// Worker threads for cell-wise steps (default: CPU cores)
    #[arg(short, long)]
    threads: Option<usize>,
}

impl Args {
    fn config(&self) -> StageConfig {
        StageConfig {
            zero_denominator: if self.fail_on_zero_denominator {
                ZeroDenominator::Fail
            } else {
                ZeroDenominator::NoData
            },
            mask_policy: if self.strict_mask {
                MaskPolicy::Strict
            } else {
                MaskPolicy::Permissive
            },
            ndvi_output: self.ndvi_output.clone(),
            ..StageConfig::default()
        }
    }
}

fn main() -> Result<()> {
    tracing_subscriber::fmt::init();

    let args = Args::parse();

    if let Some(threads) = args.threads {
        ThreadPoolBuilder::new()
            .num_threads(threads)
            .build_global()
            .context("Failed to build thread pool")?;
    }

    let output: OutputTarget = match args.output.parse() {
        Ok(target) => target,
        Err(never) => match never {},
    };

    let inputs = StageInputs {
        nir: args.nir.clone(),
        red: args.red.clone(),
        boundary: args.boundary.clone(),
        output,
    };

    info!("Running NDVI stage -> {}", inputs.output);

    let stage = NdviStage::new(args.config());
    let result = stage
        .run(&inputs)
        .with_context(|| format!("NDVI stage failed for {}", inputs.output))?;

    info!(
        "{} of {} cells scored",
        result.summary.scored(),
        result.scores.cells.len()
    );

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_positional_arguments() {
        let args = Args::parse_from(["ndvi-stage", "b5.tif", "b4.tif", "area.shp", "memory/NDVI_TIF"]);
        assert_eq!(args.nir, PathBuf::from("b5.tif"));
        assert_eq!(args.boundary, PathBuf::from("area.shp"));

        let config = args.config();
        assert_eq!(config.mask_policy, MaskPolicy::Permissive);
        assert_eq!(config.zero_denominator, ZeroDenominator::NoData);
        assert!(config.ndvi_output.is_none());
    }

    #[test]
    fn test_flags() {
        let args = Args::parse_from([
            "ndvi-stage",
            "nir.tif",
            "red.tif",
            "area.geojson",
            "out.tif",
            "--strict-mask",
            "--fail-on-zero-denominator",
            "--ndvi-output",
            "ndvi.tif",
        ]);
        let config = args.config();
        assert_eq!(config.mask_policy, MaskPolicy::Strict);
        assert_eq!(config.zero_denominator, ZeroDenominator::Fail);
        assert_eq!(config.ndvi_output, Some(PathBuf::from("ndvi.tif")));
    }
}
