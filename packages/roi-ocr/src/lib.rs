pub mod command;
pub mod engine;
pub mod raw;
pub mod region;

pub use command::{resolve_program, CommandOcrConfig, CommandOcrEngine};
pub use engine::{DetectionMode, OcrEngine, OcrError, OcrInput, OcrOutput};
pub use raw::{parse_engine_output, RawFragment};
pub use region::{BoundingBox, TextRegion};
