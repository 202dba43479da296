use std::fmt;
use std::path::PathBuf;

use async_trait::async_trait;
use image::RgbImage;
use thiserror::Error;

use crate::region::TextRegion;

#[derive(Debug, Clone)]
pub enum OcrInput {
    /// Decoded three-channel pixels, the shape prepared crops are handed over in.
    Pixels(RgbImage),
    FilePath(PathBuf),
    Bytes(Vec<u8>),
}

/// Whether the recognizer localizes text lines itself before recognition.
///
/// Tightly cropped regions usually read fine with detection disabled, which is
/// also the faster mode.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum DetectionMode {
    Enabled,
    #[default]
    Disabled,
}

impl DetectionMode {
    pub fn from_flag(use_detection: bool) -> Self {
        if use_detection {
            Self::Enabled
        } else {
            Self::Disabled
        }
    }

    pub fn is_enabled(self) -> bool {
        matches!(self, Self::Enabled)
    }
}

impl fmt::Display for DetectionMode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Enabled => f.write_str("detection enabled"),
            Self::Disabled => f.write_str("detection disabled"),
        }
    }
}

#[derive(Debug, Clone, Default)]
pub struct OcrOutput {
    pub regions: Vec<TextRegion>,
}

impl OcrOutput {
    pub fn new(regions: Vec<TextRegion>) -> Self {
        Self { regions }
    }

    /// Joins every fragment, trimmed, with no separator, in recognizer order.
    pub fn concatenated_text(&self) -> String {
        self.regions.iter().map(|r| r.text.trim()).collect()
    }
}

#[derive(Debug, Error)]
pub enum OcrError {
    #[error("unsupported operation")]
    Unsupported,
    #[error("invalid input: {0}")]
    InvalidInput(String),
    #[error("engine error: {0}")]
    EngineError(String),
    #[error("invalid engine output: {0}")]
    InvalidOutput(String),
    #[error("io error: {0}")]
    Io(#[from] std::io::Error),
}

#[async_trait]
pub trait OcrEngine: Send + Sync {
    async fn recognize(&self, input: &OcrInput, mode: DetectionMode)
        -> Result<OcrOutput, OcrError>;
}
