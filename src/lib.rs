pub mod classify;
pub mod config;
pub mod error;
pub mod mask;
pub mod model;
pub mod ndvi;
pub mod reader;
pub mod session;
pub mod stage;
pub mod writer;

pub use classify::{RemapEntry, RemapRange, ScoreSummary};
pub use config::{MaskPolicy, StageConfig, ZeroDenominator};
pub use error::{Result, StageError};
pub use mask::Boundary;
pub use model::{GeoTransform, Georef, Grid};
pub use session::GdalSession;
pub use stage::{NdviStage, OutputTarget, StageInputs, StageOutput};
pub use writer::GeoTiffWriter;
