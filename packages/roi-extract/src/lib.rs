//! # roi-extract
//!
//! Batch extraction of named fields from documents that share one layout, such as
//! ID cards or paper forms, using regions of interest drawn once on a template.
//!
//! ## Features
//!
//! - **ROI configuration**: named rectangles stored as ratios of the template size, with a
//!   name-keyed merge that keeps existing column positions
//! - **Strict cropping**: regions are clamped to the image and never padded; small crops are
//!   upscaled and contrast-stretched before recognition
//! - **Field cleanup**: identifier-like fields keep only `A-Z0-9`, name-like fields lose their
//!   whitespace, everything else passes through
//! - **Failure containment**: one row per image, with inline `[ERROR]` markers instead of
//!   aborting the batch
//! - **Text-safe output**: CSV and XLSX tables where every cell is a string
//!
//! ## Quick Start
//!
//! ```ignore
//! use std::path::Path;
//! use std::sync::Arc;
//! use roi_extract::prelude::*;
//!
//! let engine = Arc::new(CommandOcrEngine::new(CommandOcrConfig::new("ocr-wrapper"))?);
//! let orchestrator = BatchOrchestrator::new(engine, BatchOptions::default());
//!
//! let config = load_config("roi_config.json")?;
//! let images = list_images(Path::new("images"))?;
//! let rows = orchestrator.process(&images, &config).await;
//! let table = OcrTable::from_rows(&config.names(), &rows);
//! write_outputs(&table, &TableOptions::default())?;
//! ```

pub mod batch_orchestrator;
pub mod error;
pub mod image_listing;
pub mod recognition;
pub mod region_extractor;
pub mod roi_config;
pub mod table_writer;
pub mod text_normalizer;

// Re-export commonly used types at the root level
pub use batch_orchestrator::{BatchOptions, BatchOrchestrator, BatchSummary, OutputRow};
pub use error::ExtractError;
pub use image_listing::{is_image_file, list_images};
pub use recognition::{error_marker, read_text};
pub use region_extractor::{enhance_for_ocr, ExtractorOptions, PixelRect, PreparedRegion, RegionExtractor};
pub use roi_config::{
    load as load_config, rois_from_drawing, save as save_config, DrawnRect, Roi, RoiConfig,
    TemplateSize,
};
pub use table_writer::{write_outputs, OcrTable, TableOptions, WrittenTable};
pub use text_normalizer::{normalize, FieldRole};

/// Prelude module for convenient imports
///
/// Import everything you need with:
/// ```ignore
/// use roi_extract::prelude::*;
/// ```
pub mod prelude {
    pub use crate::{
        enhance_for_ocr, error_marker, list_images, load_config, normalize, read_text,
        rois_from_drawing, save_config, write_outputs, BatchOptions, BatchOrchestrator,
        BatchSummary, DrawnRect, ExtractError, ExtractorOptions, FieldRole, OcrTable, OutputRow,
        PixelRect, RegionExtractor, Roi, RoiConfig, TableOptions, TemplateSize,
    };
    pub use roi_ocr::{
        CommandOcrConfig, CommandOcrEngine, DetectionMode, OcrEngine, OcrError, OcrInput,
        OcrOutput, TextRegion,
    };
}
