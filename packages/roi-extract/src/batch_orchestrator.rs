//! Applies a ROI configuration to a batch of images and gathers one row per image.
//!
//! Failures are contained at the narrowest scope: an undecodable image yields
//! a row of error markers, a failing region yields one error cell. A batch of
//! N images therefore always produces N rows, in input order.
use std::collections::HashMap;
use std::fs;
use std::path::{Path, PathBuf};
use std::sync::Arc;

use futures::stream::{self, StreamExt};
use image::{DynamicImage, ImageReader};
use indicatif::{ProgressBar, ProgressStyle};
use roi_ocr::{DetectionMode, OcrEngine, OcrInput};

use crate::error::{ExtractError, Result};
use crate::image_listing::list_images;
use crate::recognition::{error_marker, is_error_marker, read_text};
use crate::region_extractor::{ExtractorOptions, PreparedRegion, RegionExtractor};
use crate::roi_config::{self, Roi, RoiConfig};
use crate::table_writer::{write_outputs, OcrTable, TableOptions, WrittenTable};
use crate::text_normalizer::normalize;

/// One record per processed image.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct OutputRow {
    pub filename: String,
    pub fields: HashMap<String, String>,
}

impl OutputRow {
    pub fn new(filename: impl Into<String>) -> Self {
        Self {
            filename: filename.into(),
            fields: HashMap::new(),
        }
    }

    /// A row for an image that could not be opened: every field carries the same marker.
    pub fn failed(filename: impl Into<String>, names: &[String], reason: &str) -> Self {
        let marker = error_marker(reason);
        let mut row = Self::new(filename);
        for name in names {
            row.insert(name.clone(), marker.clone());
        }
        row
    }

    pub fn insert(&mut self, name: impl Into<String>, value: impl Into<String>) {
        self.fields.insert(name.into(), value.into());
    }

    pub fn get(&self, name: &str) -> &str {
        self.fields.get(name).map(String::as_str).unwrap_or("")
    }

    /// Gives every configured name a value so all rows share one schema.
    pub fn backfill(&mut self, names: &[String]) {
        for name in names {
            self.fields.entry(name.clone()).or_default();
        }
    }
}

#[derive(Debug, Clone)]
pub struct BatchOptions {
    pub extractor: ExtractorOptions,
    pub detection: DetectionMode,
    /// Images processed at once. Rows keep input order regardless.
    pub jobs: usize,
    /// When set, raw and enhanced crops are saved here for inspection.
    pub debug_crops_dir: Option<PathBuf>,
    /// Prints the run overview and a progress bar.
    pub verbose: bool,
}

impl Default for BatchOptions {
    fn default() -> Self {
        Self {
            extractor: ExtractorOptions::default(),
            detection: DetectionMode::Disabled,
            jobs: 1,
            debug_crops_dir: None,
            verbose: false,
        }
    }
}

#[derive(Debug, Clone)]
pub struct BatchSummary {
    pub table: OcrTable,
    pub written: WrittenTable,
    pub failed_images: usize,
}

fn base_name(path: &Path) -> String {
    path.file_name()
        .map(|n| n.to_string_lossy().into_owned())
        .unwrap_or_else(|| path.display().to_string())
}

/// Keeps a ROI name usable as part of a single file name.
fn file_safe(name: &str) -> String {
    name.chars()
        .map(|c| match c {
            '/' | '\\' | ':' | '*' | '?' | '"' | '<' | '>' | '|' => '_',
            c if c.is_control() => '_',
            c => c,
        })
        .collect()
}

fn progress_bar(len: usize, visible: bool) -> ProgressBar {
    if !visible {
        return ProgressBar::hidden();
    }
    let bar = ProgressBar::new(len as u64);
    if let Ok(style) =
        ProgressStyle::with_template("Processing {bar:40.cyan/blue} {pos}/{len} [{elapsed_precise}] {msg}")
    {
        bar.set_style(style);
    }
    bar
}

pub struct BatchOrchestrator {
    engine: Arc<dyn OcrEngine>,
    extractor: RegionExtractor,
    options: BatchOptions,
}

impl BatchOrchestrator {
    /// The engine is created once by the caller and shared by every region of every image.
    pub fn new(engine: Arc<dyn OcrEngine>, options: BatchOptions) -> Self {
        Self {
            engine,
            extractor: RegionExtractor::new(options.extractor),
            options,
        }
    }

    pub fn options(&self) -> &BatchOptions {
        &self.options
    }

    /// Processes every image, returning rows in the order of `image_paths`.
    pub async fn process(&self, image_paths: &[PathBuf], config: &RoiConfig) -> Vec<OutputRow> {
        if let Some(dir) = &self.options.debug_crops_dir {
            if let Err(e) = fs::create_dir_all(dir) {
                log::warn!("[BATCH] cannot create debug crop directory {}: {}", dir.display(), e);
            }
        }

        let names = config.names();
        let progress = progress_bar(image_paths.len(), self.options.verbose);
        let rows = stream::iter(image_paths)
            .map(|path| {
                let progress = &progress;
                let names = &names;
                async move {
                    progress.set_message(base_name(path));
                    let row = self.process_image(path, config, names).await;
                    progress.inc(1);
                    row
                }
            })
            .buffered(self.options.jobs.max(1))
            .collect::<Vec<_>>()
            .await;
        progress.finish_and_clear();
        rows
    }

    /// Decodes by content, so a JPEG saved under a `.png` name still opens.
    async fn open_image(path: &Path) -> Result<DynamicImage> {
        let owned = path.to_path_buf();
        let decoded = tokio::task::spawn_blocking(move || -> std::result::Result<_, String> {
            ImageReader::open(&owned)
                .and_then(ImageReader::with_guessed_format)
                .map_err(|e| e.to_string())?
                .decode()
                .map_err(|e| e.to_string())
        })
        .await;
        let image_open = |reason: String| ExtractError::ImageOpen {
            path: path.to_path_buf(),
            reason,
        };
        match decoded {
            Ok(Ok(image)) => Ok(image),
            Ok(Err(reason)) => Err(image_open(reason)),
            Err(e) => Err(image_open(e.to_string())),
        }
    }

    async fn process_image(&self, path: &Path, config: &RoiConfig, names: &[String]) -> OutputRow {
        let filename = base_name(path);
        let image = match Self::open_image(path).await {
            Ok(image) => image,
            Err(ExtractError::ImageOpen { reason, .. }) => {
                log::warn!("[BATCH] {}: cannot open image: {}", filename, reason);
                return OutputRow::failed(filename, names, &reason);
            }
            Err(e) => {
                log::warn!("[BATCH] {}: {}", filename, e);
                return OutputRow::failed(filename, names, &e.to_string());
            }
        };
        log::debug!(
            "[BATCH] {}: {}x{}, {} regions",
            filename,
            image.width(),
            image.height(),
            config.rois.len()
        );

        let mut row = OutputRow::new(filename.clone());
        for roi in &config.rois {
            let value = self.read_region(&image, roi, &filename).await;
            row.insert(roi.name.clone(), value);
        }
        row.backfill(names);
        row
    }

    async fn read_region(&self, image: &DynamicImage, roi: &Roi, filename: &str) -> String {
        let prepared = self.extractor.prepare(image, roi);
        let input = match self.save_debug_crops(filename, roi, &prepared) {
            Some(saved) => OcrInput::FilePath(saved),
            None => OcrInput::Pixels(prepared.enhanced),
        };
        match read_text(self.engine.as_ref(), &input, self.options.detection).await {
            Ok(text) => normalize(&text, &roi.name),
            Err(e) => {
                log::warn!("[BATCH] {}: region '{}' failed: {}", filename, roi.name, e);
                error_marker(e)
            }
        }
    }

    /// Returns the path of the saved enhanced crop, which is then read from disk.
    fn save_debug_crops(&self, filename: &str, roi: &Roi, prepared: &PreparedRegion) -> Option<PathBuf> {
        let dir = self.options.debug_crops_dir.as_ref()?;
        let stem = Path::new(filename)
            .file_stem()
            .map(|s| s.to_string_lossy().into_owned())
            .unwrap_or_else(|| filename.to_string());
        let field = file_safe(&roi.name);
        let raw_path = dir.join(format!("{}_{}_raw.png", stem, field));
        let prep_path = dir.join(format!("{}_{}_prep.png", stem, field));
        if let Err(e) = prepared.crop.to_rgb8().save(&raw_path) {
            log::debug!("[BATCH] cannot save {}: {}", raw_path.display(), e);
        }
        match prepared.enhanced.save(&prep_path) {
            Ok(()) => Some(prep_path),
            Err(e) => {
                log::debug!("[BATCH] cannot save {}: {}", prep_path.display(), e);
                None
            }
        }
    }

    /// Loads the configuration, processes the directory and writes both tables.
    ///
    /// Only configuration, directory and output failures are returned as errors.
    pub async fn run_directory(
        &self,
        config_path: &Path,
        images_dir: &Path,
        table_options: &TableOptions,
    ) -> Result<BatchSummary> {
        let config = roi_config::load(config_path)?;
        let images = list_images(images_dir)?;
        let names = config.names();
        if self.options.verbose {
            println!("Found {} images. ROIs: {}", images.len(), names.join(", "));
        }

        let rows = self.process(&images, &config).await;
        let failed_images = rows
            .iter()
            .filter(|row| {
                !names.is_empty()
                    && names
                        .iter()
                        .all(|name| is_error_marker(row.get(name)))
            })
            .count();

        let table = OcrTable::from_rows(&names, &rows);
        let written = write_outputs(&table, table_options)?;
        Ok(BatchSummary {
            table,
            written,
            failed_images,
        })
    }
}
