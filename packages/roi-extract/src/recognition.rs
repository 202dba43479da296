//! Reads the text of one prepared region through the injected engine.
use roi_ocr::{DetectionMode, OcrEngine, OcrError, OcrInput};

pub const ERROR_MARKER_PREFIX: &str = "[ERROR]";

/// The inline value recorded for a field or image that failed.
pub fn error_marker(reason: impl std::fmt::Display) -> String {
    format!("{} {}", ERROR_MARKER_PREFIX, reason)
}

pub fn is_error_marker(value: &str) -> bool {
    value.starts_with(ERROR_MARKER_PREFIX)
}

/// Concatenated text of every fragment the engine returns.
///
/// A result without fragments in detection-disabled mode is retried once with
/// detection enabled. Fragments that trim to nothing count as an answer.
/// A failing or empty retry yields an empty string, not an error;
/// only a failure of the first attempt is reported.
pub async fn read_text(
    engine: &dyn OcrEngine,
    input: &OcrInput,
    mode: DetectionMode,
) -> Result<String, OcrError> {
    let first = engine.recognize(input, mode).await?;
    if !first.regions.is_empty() || mode.is_enabled() {
        return Ok(first.concatenated_text());
    }

    log::debug!("[OCR] no fragments with {}, retrying with detection", mode);
    match engine.recognize(input, DetectionMode::Enabled).await {
        Ok(retry) => Ok(retry.concatenated_text()),
        Err(e) => {
            log::debug!("[OCR] detection retry failed: {}", e);
            Ok(String::new())
        }
    }
}
