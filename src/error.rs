use std::path::PathBuf;

use thiserror::Error;

/// Errors raised by the NDVI stage.
///
/// None of them is retried here; the caller decides whether to rerun the
/// whole stage.
#[derive(Error, Debug)]
pub enum StageError {
    #[error("Input bands are not compatible: {0}")]
    InputMismatch(String),

    #[error("Zero denominator at cell ({row}, {col}): NIR + Red == 0")]
    DivisionEdgeCase { row: usize, col: usize },

    #[error("Mask error: {0}")]
    Mask(String),

    #[error("Failed to persist {path:?}: {reason}")]
    Persistence { path: PathBuf, reason: String },

    #[error("Failed to load {path:?}: {reason}")]
    Load { path: PathBuf, reason: String },

    #[error("GDAL error: {0}")]
    Gdal(#[from] gdal::errors::GdalError),

    #[error("Invalid parameter: {name} = {value} ({reason})")]
    InvalidParameter {
        name: &'static str,
        value: String,
        reason: String,
    },
}

impl StageError {
    pub(crate) fn load(path: impl Into<PathBuf>, reason: impl ToString) -> Self {
        StageError::Load {
            path: path.into(),
            reason: reason.to_string(),
        }
    }

    pub(crate) fn persistence(path: impl Into<PathBuf>, reason: impl ToString) -> Self {
        StageError::Persistence {
            path: path.into(),
            reason: reason.to_string(),
        }
    }
}

pub type Result<T> = std::result::Result<T, StageError>;
