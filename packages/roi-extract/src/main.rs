mod cli;

use std::path::{Path, PathBuf};
use std::sync::Arc;

use anyhow::{bail, Context, Result};
use clap::Parser;
use cli::{Args, Commands, ExtractArgs};
use roi_extract::roi_config::{self, RoiConfig, TemplateSize};
use roi_extract::{list_images, rois_from_drawing, BatchOrchestrator, DrawnRect};
use roi_ocr::{CommandOcrEngine, OcrEngine};

#[tokio::main]
async fn main() {
  env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("warn")).init();

  let args = Args::parse();

  let outcome = match args.command {
    Commands::Version => {
      println!("roi-extract {}", env!("CARGO_PKG_VERSION"));
      Ok(())
    }
    Commands::Extract(extract) => run_extract(extract).await,
    Commands::Define {
      config,
      template,
      images,
      rois,
      discard_existing,
    } => run_define(&config, template, &images, &rois, discard_existing),
    Commands::Show { config } => run_show(&config),
  };

  if let Err(e) = outcome {
    eprintln!("Error: {:#}", e);
    std::process::exit(1);
  }
}

async fn run_extract(args: ExtractArgs) -> Result<()> {
  let verbose = !args.quiet;
  if verbose {
    println!("Initializing recognizer '{}'", args.ocr_program);
  }
  let recognizer =
    CommandOcrEngine::new(args.ocr_config()).context("Failed to initialize the recognizer")?;
  let engine: Arc<dyn OcrEngine> = Arc::new(recognizer);

  let orchestrator = BatchOrchestrator::new(engine, args.batch_options());
  let summary = orchestrator
    .run_directory(&args.config, &args.images, &args.table_options())
    .await?;

  if verbose {
    if summary.failed_images > 0 {
      println!("{} images could not be opened", summary.failed_images);
    }
    println!(
      "All done! {} rows saved to {} and {}",
      summary.written.rows,
      summary.written.csv_path.display(),
      summary.written.xlsx_path.display()
    );
  }
  Ok(())
}

fn run_define(
  config_path: &Path,
  template: Option<PathBuf>,
  images_dir: &Path,
  rects: &[DrawnRect],
  discard_existing: bool,
) -> Result<()> {
  let template = match template {
    Some(template) => template,
    None => {
      let first = list_images(images_dir)?
        .into_iter()
        .next()
        .with_context(|| format!("No template image in {}", images_dir.display()))?;
      println!("Using {} as the template", first.display());
      first
    }
  };
  let template = template.as_path();
  let (width, height) = image::ImageReader::open(template)
    .and_then(|reader| reader.with_guessed_format())
    .map_err(anyhow::Error::from)
    .and_then(|reader| reader.into_dimensions().map_err(anyhow::Error::from))
    .with_context(|| format!("Failed to read template image {}", template.display()))?;
  if width == 0 || height == 0 {
    bail!("Template image {} has no pixels", template.display());
  }
  let template_size = TemplateSize { width, height };
  let template_name = template
    .file_name()
    .map(|n| n.to_string_lossy().into_owned())
    .unwrap_or_default();

  let existing = if discard_existing {
    None
  } else {
    roi_config::load_existing(config_path)
  };
  if let Some(existing) = &existing {
    println!(
      "Existing configuration {} has {} fields; new fields will be merged.",
      config_path.display(),
      existing.rois.len()
    );
  }

  let drawn = rois_from_drawing(rects, template_size);
  let merged = RoiConfig::merge(existing, &template_name, template_size, drawn);
  roi_config::save(config_path, &merged)
    .with_context(|| format!("Failed to save {}", config_path.display()))?;

  println!(
    "ROI configuration saved to {} ({} fields: {})",
    config_path.display(),
    merged.rois.len(),
    merged.names().join(", ")
  );
  Ok(())
}

fn run_show(config_path: &Path) -> Result<()> {
  let config = roi_config::load(config_path)?;
  println!(
    "Template: {} ({}x{})",
    config.template_image, config.template_size.width, config.template_size.height
  );
  println!("Columns: filename, {}", config.names().join(", "));
  for roi in &config.rois {
    println!(
      "  {}: x={:.4} y={:.4} w={:.4} h={:.4}",
      roi.name, roi.x, roi.y, roi.w, roi.h
    );
    if let Some(problem) = roi.bounds_problem() {
      println!("    clamped at extraction: {}", problem);
    }
  }
  Ok(())
}
