//! Normalizes the result shapes external recognizers print into [`TextRegion`]s.
//!
//! Recognizers disagree on how a fragment looks. All of these are accepted:
//!
//! - `{"text": "...", "score": 0.9, "box": [[x, y], ...]}`
//! - `[box, "text", score]`
//! - `["text", score]`
//! - `"text"`
//!
//! and the whole result may be `null`, a bare list of fragments, an object
//! holding the list under `result`/`results`, or a `[fragments, elapsed]` pair.
use serde_json::{Map, Value};

use crate::engine::OcrError;
use crate::region::{BoundingBox, TextRegion};

const TEXT_KEYS: &[&str] = &["text", "txt"];
const SCORE_KEYS: &[&str] = &["score", "confidence"];
const BOX_KEYS: &[&str] = &["box", "bbox", "dt_boxes"];
const RESULT_KEYS: &[&str] = &["result", "results"];

#[derive(Debug, Clone, PartialEq)]
pub enum RawFragment {
    Bare(String),
    Mapping(Map<String, Value>),
    Sequence(Vec<Value>),
}

impl RawFragment {
    pub fn from_value(value: Value) -> Option<Self> {
        match value {
            Value::String(s) => Some(Self::Bare(s)),
            Value::Object(map) => Some(Self::Mapping(map)),
            Value::Array(items) => Some(Self::Sequence(items)),
            _ => None,
        }
    }

    /// Returns `None` when no text can be found in the fragment.
    pub fn into_region(self) -> Option<TextRegion> {
        match self {
            Self::Bare(text) => Some(TextRegion::new(text)),
            Self::Mapping(map) => {
                let text = first_key(&map, TEXT_KEYS).and_then(scalar_text)?;
                if text.is_empty() {
                    return None;
                }
                let confidence = first_key(&map, SCORE_KEYS).and_then(as_score);
                let bounding_box = first_key(&map, BOX_KEYS).and_then(as_box);
                Some(
                    TextRegion::new(text)
                        .with_confidence(confidence)
                        .with_bounding_box(bounding_box),
                )
            }
            Self::Sequence(items) => sequence_region(&items),
        }
    }
}

fn sequence_region(items: &[Value]) -> Option<TextRegion> {
    if items.len() >= 2 {
        if let Value::String(text) = &items[1] {
            return Some(
                TextRegion::new(text.clone())
                    .with_bounding_box(as_box(&items[0]))
                    .with_confidence(items.get(2).and_then(as_score)),
            );
        }
        if let Value::String(text) = &items[0] {
            return Some(TextRegion::new(text.clone()).with_confidence(as_score(&items[1])));
        }
    }
    items
        .iter()
        .find_map(|item| item.as_str())
        .map(TextRegion::new)
}

fn first_key<'a>(map: &'a Map<String, Value>, keys: &[&str]) -> Option<&'a Value> {
    keys.iter().find_map(|key| map.get(*key))
}

fn scalar_text(value: &Value) -> Option<String> {
    match value {
        Value::String(s) => Some(s.clone()),
        Value::Number(n) => Some(n.to_string()),
        _ => None,
    }
}

fn as_score(value: &Value) -> Option<f32> {
    match value {
        Value::Number(n) => n.as_f64().map(|v| v as f32),
        Value::String(s) => s.trim().parse().ok(),
        _ => None,
    }
}

fn as_box(value: &Value) -> Option<BoundingBox> {
    let points = value
        .as_array()?
        .iter()
        .map(|point| {
            let pair = point.as_array()?;
            let x = pair.first()?.as_f64()?;
            let y = pair.get(1)?.as_f64()?;
            Some((x as f32, y as f32))
        })
        .collect::<Option<Vec<_>>>()?;
    BoundingBox::from_points(&points)
}

fn is_fragment_list(value: &Value) -> bool {
    match value {
        Value::Null => true,
        Value::Array(items) => items
            .iter()
            .all(|item| matches!(item, Value::Array(_) | Value::Object(_))),
        _ => false,
    }
}

fn is_elapsed(value: &Value) -> bool {
    match value {
        Value::Number(_) | Value::Null => true,
        Value::Array(items) => items.iter().all(Value::is_number),
        _ => false,
    }
}

/// Turns a recognizer's parsed output into regions, preserving fragment order.
pub fn parse_engine_output(value: Value) -> Result<Vec<TextRegion>, OcrError> {
    match value {
        Value::Null => Ok(Vec::new()),
        Value::Object(mut map) => {
            let key = RESULT_KEYS
                .iter()
                .find(|key| map.contains_key(**key))
                .ok_or_else(|| {
                    OcrError::InvalidOutput("object output has no result list".to_string())
                })?;
            let inner = map.remove(*key).unwrap_or(Value::Null);
            parse_engine_output(inner)
        }
        Value::Array(mut items) => {
            if items.len() == 2 && is_fragment_list(&items[0]) && is_elapsed(&items[1]) {
                let fragments = items.swap_remove(0);
                return parse_engine_output(fragments);
            }
            Ok(items
                .into_iter()
                .filter_map(|item| {
                    let region = RawFragment::from_value(item.clone()).and_then(RawFragment::into_region);
                    if region.is_none() {
                        log::debug!("[OCR] skipping fragment without text: {}", item);
                    }
                    region
                })
                .collect())
        }
        other => Err(OcrError::InvalidOutput(format!(
            "expected a list of fragments, got {}",
            other
        ))),
    }
}
