//! Backend that shells out to an external recognizer once per region.
//!
//! The program is invoked as `<program> <args..> <mode args..> <image>` and is
//! expected to print its result as JSON on stdout (see [`crate::raw`] for the
//! accepted shapes). When one of `args` contains `{image}` the path is
//! substituted there instead of being appended.
//!
//! The mode arguments default to `--use-det`/`--no-det`. Recognizers with a
//! different command line are expected to be wrapped in a small script that
//! follows this protocol, or configured with their own mode arguments.
use std::env;
use std::ffi::OsString;
use std::io::{Cursor, Write};
use std::path::{Path, PathBuf};

use async_trait::async_trait;
use image::ImageFormat;
use tempfile::NamedTempFile;
use tokio::process::Command;

use crate::engine::{DetectionMode, OcrEngine, OcrError, OcrInput, OcrOutput};
use crate::raw::parse_engine_output;

const IMAGE_PLACEHOLDER: &str = "{image}";

#[derive(Debug, Clone, PartialEq)]
pub struct CommandOcrConfig {
    pub program: String,
    pub args: Vec<String>,
    pub detection_enabled_args: Vec<String>,
    pub detection_disabled_args: Vec<String>,
}

impl CommandOcrConfig {
    /// A recognizer invoked with no extra arguments and the default mode arguments.
    pub fn new(program: impl Into<String>) -> Self {
        Self {
            program: program.into(),
            args: Vec::new(),
            detection_enabled_args: vec!["--use-det".to_string()],
            detection_disabled_args: vec!["--no-det".to_string()],
        }
    }
}

#[cfg(unix)]
fn is_executable(path: &Path) -> bool {
    use std::os::unix::fs::PermissionsExt;
    path.metadata()
        .map(|m| m.is_file() && m.permissions().mode() & 0o111 != 0)
        .unwrap_or(false)
}

#[cfg(not(unix))]
fn is_executable(path: &Path) -> bool {
    path.is_file()
}

fn executable_candidate(base: PathBuf) -> Option<PathBuf> {
    if is_executable(&base) {
        return Some(base);
    }
    if cfg!(windows) && base.extension().is_none() {
        let with_exe = base.with_extension("exe");
        if is_executable(&with_exe) {
            return Some(with_exe);
        }
    }
    None
}

/// Locates `program` the way the shell would: paths are taken as given,
/// bare names are searched for on `PATH`.
pub fn resolve_program(program: &str) -> Option<PathBuf> {
    let path = Path::new(program);
    if path.is_absolute() || path.components().count() > 1 {
        return executable_candidate(path.to_path_buf());
    }
    let search = env::var_os("PATH")?;
    env::split_paths(&search).find_map(|dir| executable_candidate(dir.join(program)))
}

pub struct CommandOcrEngine {
    config: CommandOcrConfig,
    executable: PathBuf,
}

impl CommandOcrEngine {
    /// Fails when the program is empty or cannot be found, so a misconfigured
    /// recognizer stops a run before any image is read.
    pub fn new(config: CommandOcrConfig) -> Result<Self, OcrError> {
        if config.program.trim().is_empty() {
            return Err(OcrError::InvalidInput(
                "recognizer program must not be empty".to_string(),
            ));
        }
        let executable = resolve_program(&config.program).ok_or_else(|| {
            OcrError::EngineError(format!(
                "recognizer program '{}' was not found or is not executable",
                config.program
            ))
        })?;
        log::info!("[OCR] using external recognizer {}", executable.display());
        Ok(Self { config, executable })
    }

    pub fn config(&self) -> &CommandOcrConfig {
        &self.config
    }

    fn build_args(&self, image: &Path, mode: DetectionMode) -> Vec<OsString> {
        let mode_args = match mode {
            DetectionMode::Enabled => &self.config.detection_enabled_args,
            DetectionMode::Disabled => &self.config.detection_disabled_args,
        };
        let image = image.to_string_lossy();
        let mut substituted = false;
        let mut args: Vec<OsString> = self
            .config
            .args
            .iter()
            .chain(mode_args.iter())
            .map(|arg| {
                if arg.contains(IMAGE_PLACEHOLDER) {
                    substituted = true;
                    OsString::from(arg.replace(IMAGE_PLACEHOLDER, &image))
                } else {
                    OsString::from(arg)
                }
            })
            .collect();
        if !substituted {
            args.push(OsString::from(image.into_owned()));
        }
        args
    }

    async fn run(&self, image: &Path, mode: DetectionMode) -> Result<OcrOutput, OcrError> {
        let output = Command::new(&self.executable)
            .args(self.build_args(image, mode))
            .output()
            .await
            .map_err(|e| {
                OcrError::EngineError(format!("failed to run {}: {}", self.config.program, e))
            })?;

        if !output.status.success() {
            let stderr = String::from_utf8_lossy(&output.stderr);
            return Err(OcrError::EngineError(format!(
                "{} exited with {}: {}",
                self.config.program,
                output.status,
                stderr.trim()
            )));
        }

        let stdout = String::from_utf8_lossy(&output.stdout);
        let stdout = stdout.trim();
        if stdout.is_empty() {
            return Ok(OcrOutput::default());
        }
        let value = serde_json::from_str(stdout)
            .map_err(|e| OcrError::InvalidOutput(format!("stdout is not JSON: {}", e)))?;
        Ok(OcrOutput::new(parse_engine_output(value)?))
    }
}

fn write_temp_image(bytes: &[u8], extension: &str) -> Result<NamedTempFile, OcrError> {
    let mut file = tempfile::Builder::new()
        .prefix("roi-ocr-")
        .suffix(&format!(".{}", extension))
        .tempfile()?;
    file.write_all(bytes)?;
    file.flush()?;
    Ok(file)
}

#[async_trait]
impl OcrEngine for CommandOcrEngine {
    async fn recognize(
        &self,
        input: &OcrInput,
        mode: DetectionMode,
    ) -> Result<OcrOutput, OcrError> {
        match input {
            OcrInput::FilePath(path) => self.run(path, mode).await,
            OcrInput::Bytes(data) => {
                let extension = image::guess_format(data)
                    .ok()
                    .and_then(|format| format.extensions_str().first().copied())
                    .unwrap_or("img");
                let file = write_temp_image(data, extension)?;
                self.run(file.path(), mode).await
            }
            OcrInput::Pixels(pixels) => {
                let mut encoded = Vec::new();
                pixels
                    .write_to(&mut Cursor::new(&mut encoded), ImageFormat::Png)
                    .map_err(|e| OcrError::InvalidInput(format!("cannot encode crop: {}", e)))?;
                let file = write_temp_image(&encoded, "png")?;
                self.run(file.path(), mode).await
            }
        }
    }
}
