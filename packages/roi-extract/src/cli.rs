//! Command line arguments backing the `roi-extract` binary.
use clap::{Parser, Subcommand};
use std::path::PathBuf;

use roi_extract::{BatchOptions, DrawnRect, ExtractorOptions, TableOptions};
use roi_ocr::{CommandOcrConfig, DetectionMode};

#[derive(Parser, Debug)]
#[command(
  name = "roi-extract",
  about = "Extract named fields from fixed-layout document scans into CSV and XLSX tables",
  version
)]
pub struct Args {
  #[command(subcommand)]
  pub command: Commands,
}

#[derive(Subcommand, Debug)]
pub enum Commands {
  /// Print version information
  Version,
  /// Read every ROI of every image in a directory and write the result tables
  Extract(ExtractArgs),
  /// Add or replace ROIs drawn on a template image, merging into the configuration
  Define {
    /// ROI configuration file to create or merge into
    #[arg(long, short = 'c', default_value = "roi_config.json")]
    config: PathBuf,

    /// Template image the rectangles were drawn on; defaults to the first image in --images
    #[arg(long, short = 't')]
    template: Option<PathBuf>,

    /// Directory whose first image serves as the template when --template is not given
    #[arg(long, short = 'i', default_value = "images")]
    images: PathBuf,

    /// Rectangle in template pixels as [NAME=]X1,Y1,X2,Y2; unnamed ones become field_<n>
    #[arg(long = "roi", short = 'r', required = true)]
    rois: Vec<DrawnRect>,

    /// Drop the fields of the existing configuration instead of merging
    #[arg(long)]
    discard_existing: bool,
  },
  /// Print the columns and rectangles of a ROI configuration
  Show {
    /// ROI configuration file
    #[arg(long, short = 'c', default_value = "roi_config.json")]
    config: PathBuf,
  },
}

#[derive(clap::Args, Debug)]
pub struct ExtractArgs {
  /// ROI configuration file
  #[arg(long, short = 'c', default_value = "roi_config.json")]
  pub config: PathBuf,

  /// Directory holding the .png/.jpg/.jpeg images to process
  #[arg(long, short = 'i', default_value = "images")]
  pub images: PathBuf,

  /// Directory the result tables are written to
  #[arg(long, short = 'o', default_value = "output")]
  pub output_dir: PathBuf,

  /// File name of the CSV table
  #[arg(long, default_value = "ocr_result.csv")]
  pub csv_name: String,

  /// File name of the spreadsheet table
  #[arg(long, default_value = "ocr_result.xlsx")]
  pub xlsx_name: String,

  /// External recognizer program (name on PATH or path); it must print its result as JSON on stdout
  #[arg(long)]
  pub ocr_program: String,

  /// Extra argument for the recognizer (repeatable); `{image}` marks where the crop path goes
  #[arg(long = "ocr-arg", allow_hyphen_values = true)]
  pub ocr_args: Vec<String>,

  /// Let the recognizer run its own text detection on every crop
  #[arg(long)]
  pub use_det: bool,

  /// Argument passed when detection is enabled (repeatable)
  #[arg(long = "det-enabled-arg", allow_hyphen_values = true)]
  pub det_enabled_args: Vec<String>,

  /// Argument passed when detection is disabled (repeatable)
  #[arg(long = "det-disabled-arg", allow_hyphen_values = true)]
  pub det_disabled_args: Vec<String>,

  /// Crops shorter than this many pixels are upscaled
  #[arg(long, default_value_t = ExtractorOptions::default().min_height)]
  pub min_height: u32,

  /// Crops narrower than this many pixels are upscaled
  #[arg(long, default_value_t = ExtractorOptions::default().min_width)]
  pub min_width: u32,

  /// Upscale factor for small crops
  #[arg(long, default_value_t = ExtractorOptions::default().upscale_factor)]
  pub upscale: u32,

  /// Number of images processed concurrently
  #[arg(long, short = 'j', default_value_t = 1)]
  pub jobs: usize,

  /// Save raw and enhanced crops to this directory
  #[arg(long)]
  pub debug_crops: Option<PathBuf>,

  /// Disable verbose output
  #[arg(long)]
  pub quiet: bool,
}

impl ExtractArgs {
  pub fn ocr_config(&self) -> CommandOcrConfig {
    let mut config = CommandOcrConfig::new(self.ocr_program.clone());
    config.args = self.ocr_args.clone();
    if !self.det_enabled_args.is_empty() {
      config.detection_enabled_args = self.det_enabled_args.clone();
    }
    if !self.det_disabled_args.is_empty() {
      config.detection_disabled_args = self.det_disabled_args.clone();
    }
    config
  }

  pub fn batch_options(&self) -> BatchOptions {
    BatchOptions {
      extractor: ExtractorOptions {
        min_height: self.min_height,
        min_width: self.min_width,
        upscale_factor: self.upscale,
      },
      detection: DetectionMode::from_flag(self.use_det),
      jobs: self.jobs.max(1),
      debug_crops_dir: self.debug_crops.clone(),
      verbose: !self.quiet,
    }
  }

  pub fn table_options(&self) -> TableOptions {
    TableOptions {
      output_dir: self.output_dir.clone(),
      csv_name: self.csv_name.clone(),
      xlsx_name: self.xlsx_name.clone(),
    }
  }
}

#[cfg(test)]
mod tests {
  use super::*;

  fn extract_args(extra: &[&str]) -> ExtractArgs {
    let argv = ["roi-extract", "extract"].iter().chain(extra.iter());
    match Args::parse_from(argv).command {
      Commands::Extract(args) => args,
      other => panic!("unexpected command: {:?}", other),
    }
  }

  #[test]
  fn test_extract_defaults() {
    let args = extract_args(&["--ocr-program", "ocr-wrapper"]);
    let batch = args.batch_options();
    assert_eq!(batch.extractor, ExtractorOptions::default());
    assert_eq!(batch.detection, DetectionMode::Disabled);
    assert_eq!(batch.jobs, 1);
    assert!(batch.verbose);
    assert_eq!(args.table_options(), TableOptions::default());
    assert_eq!(args.ocr_config(), CommandOcrConfig::new("ocr-wrapper"));
  }

  #[test]
  fn test_extract_requires_recognizer_program() {
    assert!(Args::try_parse_from(["roi-extract", "extract"]).is_err());
  }

  #[test]
  fn test_recognizer_arguments_accept_hyphens() {
    let args = extract_args(&[
      "--ocr-program",
      "sh",
      "--ocr-arg",
      "-c",
      "--ocr-arg",
      "cat",
      "--det-disabled-arg",
      "--fast",
      "--use-det",
      "--quiet",
    ]);
    let ocr = args.ocr_config();
    assert_eq!(ocr.args, vec!["-c", "cat"]);
    assert_eq!(ocr.detection_disabled_args, vec!["--fast"]);
    assert_eq!(ocr.detection_enabled_args, vec!["--use-det"]);
    assert!(args.batch_options().detection.is_enabled());
    assert!(!args.batch_options().verbose);
  }

  #[test]
  fn test_define_parses_rectangles() {
    let args = Args::parse_from([
      "roi-extract",
      "define",
      "--template",
      "images/a.png",
      "--roi",
      "name=10,10,90,30",
      "--roi",
      "5,5,6,6",
    ]);
    match args.command {
      Commands::Define {
        rois,
        discard_existing,
        template,
        ..
      } => {
        assert_eq!(rois.len(), 2);
        assert_eq!(rois[0].name.as_deref(), Some("name"));
        assert_eq!(template, Some(PathBuf::from("images/a.png")));
        assert!(!discard_existing);
      }
      other => panic!("unexpected command: {:?}", other),
    }
  }

  #[test]
  fn test_define_template_is_optional() {
    let args = Args::parse_from(["roi-extract", "define", "--images", "scans", "--roi", "1,2,3,4"]);
    match args.command {
      Commands::Define { template, images, .. } => {
        assert!(template.is_none());
        assert_eq!(images, PathBuf::from("scans"));
      }
      other => panic!("unexpected command: {:?}", other),
    }
  }
}
