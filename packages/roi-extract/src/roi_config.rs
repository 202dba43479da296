//! Named regions of interest and the JSON configuration they are persisted in.
//!
//! Coordinates are ratios of the template image's width and height. They are
//! stored exactly as authored; clamping happens when a region is cropped.
use std::fmt;
use std::fs;
use std::path::Path;
use std::str::FromStr;

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

use crate::error::{ExtractError, Result};

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Roi {
    pub name: String,
    pub x: f64,
    pub y: f64,
    pub w: f64,
    pub h: f64,
}

impl Roi {
    pub fn new(name: impl Into<String>, x: f64, y: f64, w: f64, h: f64) -> Self {
        Self {
            name: name.into(),
            x,
            y,
            w,
            h,
        }
    }

    /// Describes why this rectangle will be altered by clamping, if it will be.
    pub fn bounds_problem(&self) -> Option<String> {
        let coords = [("x", self.x), ("y", self.y), ("w", self.w), ("h", self.h)];
        if let Some((axis, value)) = coords
            .iter()
            .find(|(_, v)| !v.is_finite() || *v < 0.0 || *v > 1.0)
        {
            return Some(format!("{} = {} is outside [0, 1]", axis, value));
        }
        if self.x + self.w > 1.0 {
            return Some(format!("x + w = {:.4} extends past the right edge", self.x + self.w));
        }
        if self.y + self.h > 1.0 {
            return Some(format!("y + h = {:.4} extends past the bottom edge", self.y + self.h));
        }
        None
    }
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct TemplateSize {
    pub width: u32,
    pub height: u32,
}

/// The ordered ROI set plus the template it was drawn on.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct RoiConfig {
    pub template_image: String,
    pub template_size: TemplateSize,
    pub rois: Vec<Roi>,
}

impl RoiConfig {
    pub fn new(template_image: impl Into<String>, template_size: TemplateSize) -> Self {
        Self {
            template_image: template_image.into(),
            template_size,
            rois: Vec::new(),
        }
    }

    /// Replaces the ROI with the same name in place, or appends a new one.
    pub fn upsert(&mut self, roi: Roi) {
        match self.rois.iter_mut().find(|existing| existing.name == roi.name) {
            Some(existing) => *existing = roi,
            None => self.rois.push(roi),
        }
    }

    /// Column names in output order.
    pub fn names(&self) -> Vec<String> {
        self.rois.iter().map(|roi| roi.name.clone()).collect()
    }

    pub fn is_empty(&self) -> bool {
        self.rois.is_empty()
    }

    /// Merges freshly drawn ROIs over an existing configuration.
    ///
    /// Existing entries keep their position, re-drawn names take the new
    /// rectangle, unseen names go to the end. The template size always comes
    /// from the image the new ROIs were drawn on.
    pub fn merge(
        existing: Option<RoiConfig>,
        template_image: &str,
        template_size: TemplateSize,
        drawn: Vec<Roi>,
    ) -> RoiConfig {
        let mut merged = match existing {
            Some(existing) if !existing.is_empty() => {
                let image = if existing.template_image.is_empty() {
                    template_image.to_string()
                } else {
                    existing.template_image
                };
                let mut merged = RoiConfig::new(image, template_size);
                for roi in existing.rois {
                    merged.upsert(roi);
                }
                merged
            }
            _ => RoiConfig::new(template_image, template_size),
        };
        for roi in drawn {
            merged.upsert(roi);
        }
        merged
    }
}

fn scalar_string(value: &Value) -> Option<String> {
    match value {
        Value::String(s) if !s.is_empty() => Some(s.clone()),
        Value::Number(n) => Some(n.to_string()),
        _ => None,
    }
}

fn lenient_number(entry: &Map<String, Value>, key: &str) -> f64 {
    match entry.get(key) {
        Some(Value::Number(n)) => n.as_f64().unwrap_or(0.0),
        Some(Value::String(s)) => s.trim().parse().unwrap_or(0.0),
        _ => 0.0,
    }
}

fn parse_template_size(value: Option<&Value>) -> TemplateSize {
    let dimension = |key: &str| {
        value
            .and_then(|v| v.get(key))
            .and_then(Value::as_u64)
            .map(|v| v.min(u32::MAX as u64) as u32)
            .unwrap_or(0)
    };
    TemplateSize {
        width: dimension("width"),
        height: dimension("height"),
    }
}

/// Builds a configuration from parsed JSON, skipping ROI entries without a name.
pub fn parse_config(path: &Path, root: Value) -> Result<RoiConfig> {
    let invalid = |reason: &str| ExtractError::ConfigInvalid {
        path: path.to_path_buf(),
        reason: reason.to_string(),
    };

    let root = root
        .as_object()
        .ok_or_else(|| invalid("top level must be an object"))?;
    let entries = root
        .get("rois")
        .and_then(Value::as_array)
        .ok_or_else(|| invalid("missing `rois` list"))?;
    if entries.is_empty() {
        return Err(invalid("`rois` list is empty"));
    }

    let mut config = RoiConfig::new(
        root.get("template_image")
            .and_then(Value::as_str)
            .unwrap_or_default(),
        parse_template_size(root.get("template_size")),
    );

    for entry in entries {
        let Some(entry) = entry.as_object() else {
            log::debug!("[CONFIG] skipping non-object ROI entry: {}", entry);
            continue;
        };
        let Some(name) = entry.get("name").and_then(scalar_string) else {
            log::debug!("[CONFIG] skipping ROI entry without a name");
            continue;
        };
        config.upsert(Roi::new(
            name,
            lenient_number(entry, "x"),
            lenient_number(entry, "y"),
            lenient_number(entry, "w"),
            lenient_number(entry, "h"),
        ));
    }

    if config.is_empty() {
        return Err(invalid("no ROI entry has a name"));
    }
    Ok(config)
}

/// Loads and validates a ROI configuration file.
pub fn load(path: impl AsRef<Path>) -> Result<RoiConfig> {
    let path = path.as_ref();
    if !path.exists() {
        return Err(ExtractError::ConfigNotFound(path.to_path_buf()));
    }
    let contents = fs::read_to_string(path)?;
    let root: Value = serde_json::from_str(&contents).map_err(|source| ExtractError::ConfigParse {
        path: path.to_path_buf(),
        source,
    })?;
    let config = parse_config(path, root)?;

    for roi in &config.rois {
        if let Some(problem) = roi.bounds_problem() {
            log::warn!(
                "[CONFIG] ROI '{}' will be clamped to the image: {}",
                roi.name,
                problem
            );
        }
    }
    log::info!(
        "[CONFIG] loaded {} ROIs from {}",
        config.rois.len(),
        path.display()
    );
    Ok(config)
}

/// Loads a prior configuration to merge into, treating anything unusable as absent.
pub fn load_existing(path: impl AsRef<Path>) -> Option<RoiConfig> {
    match load(path) {
        Ok(config) => Some(config),
        Err(ExtractError::ConfigNotFound(_)) => None,
        Err(e) => {
            log::warn!("[CONFIG] ignoring existing configuration: {}", e);
            None
        }
    }
}

/// Writes the configuration as pretty JSON, keeping non-ASCII names verbatim.
pub fn save(path: impl AsRef<Path>, config: &RoiConfig) -> Result<()> {
    let path = path.as_ref();
    if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
        fs::create_dir_all(parent)?;
    }
    let json = serde_json::to_string_pretty(config).map_err(std::io::Error::other)?;
    fs::write(path, json)?;
    log::info!(
        "[CONFIG] saved {} ROIs to {}",
        config.rois.len(),
        path.display()
    );
    Ok(())
}

pub fn default_field_name(index: usize) -> String {
    format!("field_{}", index)
}

/// A rectangle dragged on the template, in template pixels.
///
/// Parsed from `[NAME=]X1,Y1,X2,Y2`; the corners may be given in any order.
#[derive(Debug, Clone, PartialEq)]
pub struct DrawnRect {
    pub name: Option<String>,
    pub x1: f64,
    pub y1: f64,
    pub x2: f64,
    pub y2: f64,
}

impl DrawnRect {
    /// Normalizes the rectangle against the template size.
    pub fn to_roi(&self, name: String, template: TemplateSize) -> Roi {
        let width = f64::from(template.width.max(1));
        let height = f64::from(template.height.max(1));
        Roi::new(
            name,
            self.x1.min(self.x2) / width,
            self.y1.min(self.y2) / height,
            (self.x2 - self.x1).abs() / width,
            (self.y2 - self.y1).abs() / height,
        )
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DrawnRectParseError(String);

impl fmt::Display for DrawnRectParseError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "expected [NAME=]X1,Y1,X2,Y2, got '{}'", self.0)
    }
}

impl std::error::Error for DrawnRectParseError {}

impl FromStr for DrawnRect {
    type Err = DrawnRectParseError;

    fn from_str(s: &str) -> std::result::Result<Self, Self::Err> {
        let err = || DrawnRectParseError(s.to_string());
        let (name, coords) = match s.rsplit_once('=') {
            Some((name, coords)) => (Some(name.trim()), coords),
            None => (None, s),
        };
        let values = coords
            .split(',')
            .map(|v| v.trim().parse::<f64>())
            .collect::<std::result::Result<Vec<_>, _>>()
            .map_err(|_| err())?;
        let &[x1, y1, x2, y2] = values.as_slice() else {
            return Err(err());
        };
        if values.iter().any(|v| !v.is_finite()) {
            return Err(err());
        }
        Ok(Self {
            name: name.filter(|n| !n.is_empty()).map(str::to_string),
            x1,
            y1,
            x2,
            y2,
        })
    }
}

/// Turns one session's drawn rectangles into ROIs, naming unnamed ones `field_<n>`.
pub fn rois_from_drawing(rects: &[DrawnRect], template: TemplateSize) -> Vec<Roi> {
    let mut rois: Vec<Roi> = Vec::with_capacity(rects.len());
    for rect in rects {
        let name = rect
            .name
            .clone()
            .unwrap_or_else(|| default_field_name(rois.len() + 1));
        rois.push(rect.to_roi(name, template));
    }
    rois
}
