//! Error taxonomy for the extraction pipeline.
//!
//! Configuration and directory errors abort a run. Image and region errors
//! never leave the orchestrator: they are rendered into the output table.
use std::path::PathBuf;

use thiserror::Error;

#[derive(Debug, Error)]
pub enum ExtractError {
    #[error("ROI configuration not found: {}", .0.display())]
    ConfigNotFound(PathBuf),

    #[error("ROI configuration {} is invalid: {reason}", .path.display())]
    ConfigInvalid { path: PathBuf, reason: String },

    #[error("ROI configuration {} is not valid JSON: {source}", .path.display())]
    ConfigParse {
        path: PathBuf,
        #[source]
        source: serde_json::Error,
    },

    #[error("image directory does not exist: {}", .0.display())]
    ImageDirectoryMissing(PathBuf),

    #[error("image directory {} cannot be read: {source}", .path.display())]
    ImageDirectoryUnreadable {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("no .png/.jpg/.jpeg images found in {}", .0.display())]
    NoImages(PathBuf),

    #[error("cannot open image {}: {reason}", .path.display())]
    ImageOpen { path: PathBuf, reason: String },

    #[error("CSV output failed: {0}")]
    Csv(#[from] csv::Error),

    #[error("spreadsheet output failed: {0}")]
    Xlsx(#[from] rust_xlsxwriter::XlsxError),

    #[error(transparent)]
    Io(#[from] std::io::Error),
}

pub type Result<T> = std::result::Result<T, ExtractError>;
