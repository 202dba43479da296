//! Integration tests for the roi-extract library API

use std::fs;
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;

use async_trait::async_trait;
use image::{ImageFormat, Rgb, RgbImage};
use roi_extract::prelude::*;

/// Returns the same text for every region, optionally only when detection is on.
struct StubEngine {
    text: &'static str,
    only_with_detection: bool,
    fail: bool,
    calls: AtomicUsize,
}

impl StubEngine {
    fn answering(text: &'static str) -> Self {
        Self {
            text,
            only_with_detection: false,
            fail: false,
            calls: AtomicUsize::new(0),
        }
    }

    fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl OcrEngine for StubEngine {
    async fn recognize(&self, input: &OcrInput, mode: DetectionMode) -> Result<OcrOutput, OcrError> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        match input {
            OcrInput::Pixels(_) => {}
            OcrInput::FilePath(path) => assert!(path.exists()),
            OcrInput::Bytes(_) => panic!("crops are never handed over as encoded bytes"),
        }
        if self.fail {
            return Err(OcrError::EngineError("recognizer crashed".to_string()));
        }
        if self.only_with_detection && !mode.is_enabled() {
            return Ok(OcrOutput::default());
        }
        Ok(OcrOutput::new(vec![TextRegion::new(self.text)]))
    }
}

fn sample_config() -> RoiConfig {
    let mut config = RoiConfig::new("template.png", TemplateSize { width: 100, height: 50 });
    config.upsert(Roi::new("id_number", 0.0, 0.0, 0.5, 0.5));
    config.upsert(Roi::new("name", 0.5, 0.5, 0.5, 0.5));
    config
}

fn write_images(dir: &Path) -> Vec<PathBuf> {
    let first = dir.join("a.png");
    let second = dir.join("b.jpg");
    let broken = dir.join("c.png");
    RgbImage::from_pixel(160, 90, Rgb([250, 250, 250])).save(&first).unwrap();
    RgbImage::from_fn(640, 400, |x, _| Rgb([(x % 200) as u8, 10, 10]))
        .save(&second)
        .unwrap();
    fs::write(&broken, b"\x89PNG truncated").unwrap();
    vec![first, broken, second]
}

#[test]
fn test_prelude_imports() {
    use roi_extract::prelude::*;

    assert_eq!(normalize("No.1234-ab", "card_number"), "1234AB");
    assert_eq!(normalize("张 三", "姓名"), "张三");
    assert_eq!(normalize("Room 1", "address"), "Room 1");
    assert_eq!(FieldRole::classify("工号"), FieldRole::Identifier);
    assert_eq!(error_marker("boom"), "[ERROR] boom");
}

#[test]
fn test_merge_keeps_existing_positions() {
    let size = TemplateSize { width: 10, height: 10 };
    let mut existing = RoiConfig::new("old.png", size);
    existing.upsert(Roi::new("A", 0.1, 0.1, 0.1, 0.1));
    existing.upsert(Roi::new("B", 0.2, 0.2, 0.1, 0.1));

    let merged = RoiConfig::merge(
        Some(existing),
        "new.png",
        TemplateSize { width: 20, height: 20 },
        vec![
            Roi::new("A", 0.5, 0.5, 0.2, 0.2),
            Roi::new("C", 0.0, 0.0, 1.0, 1.0),
        ],
    );

    assert_eq!(merged.names(), vec!["A", "B", "C"]);
    assert_eq!(merged.rois[0].x, 0.5);
    assert_eq!(merged.template_size.width, 20);
}

#[test]
fn test_config_save_then_load() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("nested").join("roi_config.json");
    save_config(&path, &sample_config()).unwrap();
    assert_eq!(load_config(&path).unwrap(), sample_config());
}

#[tokio::test]
async fn test_batch_yields_one_row_per_image_in_order() {
    let dir = tempfile::tempdir().unwrap();
    let images = write_images(dir.path());
    let engine = Arc::new(StubEngine::answering("No. 77-x"));
    let orchestrator = BatchOrchestrator::new(
        engine.clone(),
        BatchOptions {
            jobs: 3,
            ..Default::default()
        },
    );

    let rows = orchestrator.process(&images, &sample_config()).await;

    let filenames: Vec<&str> = rows.iter().map(|r| r.filename.as_str()).collect();
    assert_eq!(filenames, vec!["a.png", "c.png", "b.jpg"]);

    assert_eq!(rows[0].get("id_number"), "77X");
    assert_eq!(rows[0].get("name"), "No.77-x");
    assert_eq!(rows[2].get("id_number"), "77X");

    let broken = &rows[1];
    assert!(broken.get("id_number").starts_with("[ERROR]"));
    assert_eq!(broken.get("id_number"), broken.get("name"));

    // Two regions on each of the two readable images.
    assert_eq!(engine.calls(), 4);
}

#[tokio::test]
async fn test_image_format_follows_content_not_extension() {
    let dir = tempfile::tempdir().unwrap();
    let image = dir.path().join("photo.png");
    RgbImage::from_pixel(100, 60, Rgb([200, 200, 200]))
        .save_with_format(&image, ImageFormat::Jpeg)
        .unwrap();

    let engine = Arc::new(StubEngine::answering("No.5"));
    let orchestrator = BatchOrchestrator::new(engine.clone(), BatchOptions::default());
    let mut config = RoiConfig::new("t.png", TemplateSize::default());
    config.upsert(Roi::new("id", 0.0, 0.0, 1.0, 1.0));

    let rows = orchestrator.process(&[image], &config).await;

    assert_eq!(rows[0].get("id"), "5");
    assert_eq!(engine.calls(), 1);
}

#[tokio::test]
async fn test_debug_crops_stay_inside_their_directory() {
    let dir = tempfile::tempdir().unwrap();
    let image = dir.path().join("scan.png");
    RgbImage::from_pixel(40, 40, Rgb([120, 120, 120])).save(&image).unwrap();
    let crops = dir.path().join("crops");

    let engine = Arc::new(StubEngine::answering("x"));
    let orchestrator = BatchOrchestrator::new(
        engine,
        BatchOptions {
            debug_crops_dir: Some(crops.clone()),
            ..Default::default()
        },
    );
    let mut config = RoiConfig::new("t.png", TemplateSize::default());
    config.upsert(Roi::new("../id/number", 0.0, 0.0, 1.0, 1.0));

    let rows = orchestrator.process(&[image], &config).await;

    assert_eq!(rows[0].get("../id/number"), "X");
    assert!(crops.join("scan_.._id_number_raw.png").is_file());
    assert!(crops.join("scan_.._id_number_prep.png").is_file());
    assert!(!dir.path().join("id").exists());
}

#[tokio::test]
async fn test_empty_result_retries_with_detection() {
    let dir = tempfile::tempdir().unwrap();
    let image = dir.path().join("card.png");
    RgbImage::from_pixel(50, 50, Rgb([0, 0, 0])).save(&image).unwrap();

    let engine = Arc::new(StubEngine {
        only_with_detection: true,
        ..StubEngine::answering("Ada Lovelace")
    });
    let orchestrator = BatchOrchestrator::new(engine.clone(), BatchOptions::default());
    let mut config = RoiConfig::new("t.png", TemplateSize::default());
    config.upsert(Roi::new("name", 0.0, 0.0, 1.0, 1.0));

    let rows = orchestrator.process(&[image], &config).await;

    assert_eq!(rows[0].get("name"), "AdaLovelace");
    assert_eq!(engine.calls(), 2);
}

#[tokio::test]
async fn test_failing_engine_marks_each_field() {
    let dir = tempfile::tempdir().unwrap();
    let image = dir.path().join("card.png");
    RgbImage::from_pixel(30, 30, Rgb([9, 9, 9])).save(&image).unwrap();

    let engine = Arc::new(StubEngine {
        fail: true,
        ..StubEngine::answering("")
    });
    let orchestrator = BatchOrchestrator::new(engine, BatchOptions::default());

    let rows = orchestrator.process(&[image], &sample_config()).await;

    assert_eq!(rows.len(), 1);
    for name in ["id_number", "name"] {
        assert_eq!(rows[0].get(name), "[ERROR] engine error: recognizer crashed");
    }
}

#[tokio::test]
async fn test_run_directory_is_repeatable() {
    let dir = tempfile::tempdir().unwrap();
    let images_dir = dir.path().join("images");
    fs::create_dir(&images_dir).unwrap();
    write_images(&images_dir);
    let config_path = dir.path().join("roi_config.json");
    save_config(&config_path, &sample_config()).unwrap();

    let engine: Arc<dyn OcrEngine> = Arc::new(StubEngine::answering("id 42"));
    let orchestrator = BatchOrchestrator::new(engine, BatchOptions::default());
    let table_options = TableOptions {
        output_dir: dir.path().join("out"),
        ..Default::default()
    };

    let first = orchestrator
        .run_directory(&config_path, &images_dir, &table_options)
        .await
        .unwrap();
    let first_csv = fs::read_to_string(&first.written.csv_path).unwrap();
    let second = orchestrator
        .run_directory(&config_path, &images_dir, &table_options)
        .await
        .unwrap();
    let second_csv = fs::read_to_string(&second.written.csv_path).unwrap();

    assert_eq!(first.table, second.table);
    assert_eq!(first_csv, second_csv);
    assert_eq!(first.table.columns(), ["filename", "id_number", "name"]);
    assert_eq!(first.table.len(), 3);
    assert_eq!(first.failed_images, 1);
    assert!(first_csv.starts_with("filename,id_number,name\na.png,ID42,id42\n"));
    assert!(second.written.xlsx_path.exists());
}

#[tokio::test]
async fn test_run_directory_rejects_empty_directory() {
    let dir = tempfile::tempdir().unwrap();
    let config_path = dir.path().join("roi_config.json");
    save_config(&config_path, &sample_config()).unwrap();

    let engine: Arc<dyn OcrEngine> = Arc::new(StubEngine::answering("x"));
    let orchestrator = BatchOrchestrator::new(engine, BatchOptions::default());
    let result = orchestrator
        .run_directory(&config_path, dir.path(), &TableOptions::default())
        .await;

    assert!(matches!(result, Err(ExtractError::NoImages(_))));
}
