//! Conversion engines and capability-based dispatch.
//!
//! Each engine declares the extension pairs it can handle; the registry
//! routes a (source, target) pair to the first engine that claims it.
//! The dispatcher sits in front of the registry and enforces the
//! category gate before any engine runs.

use std::collections::HashSet;
use std::fs;
use std::path::Path;
use std::sync::LazyLock;
use std::time::{Duration, Instant};

use chrono::Utc;
use regex::Regex;
use serde::Serialize;

use crate::error::{DispatchError, EngineError, Result};
use crate::formats::{category_for_extension, FileCategory};
use crate::job::{round2, ConversionOptions, ConvertedFileRecord, FileRecord};
use crate::sanitize::redact_filename;

pub mod audio;
pub(crate) mod command;
pub mod document;
pub mod image;
pub mod video;

pub use audio::AudioEngine;
pub use document::DocumentEngine;
pub use image::ImageEngine;
pub use video::VideoEngine;

// ─── Engine contract ────────────────────────────────────────────────────────

/// What an engine reports back after a successful conversion.
#[derive(Debug, Clone)]
pub struct ConversionOutcome {
    /// Tool that actually produced the output. May differ from the
    /// registry name when an engine fronts several tools.
    pub engine: &'static str,
    pub input_size: u64,
    pub output_size: u64,
}

pub trait ConversionEngine: Send + Sync {
    /// Stable identifier used in logs and availability listings.
    fn name(&self) -> &'static str;

    /// Whether this engine handles the pair. Extensions are lowercase,
    /// without the dot.
    fn can_convert(&self, source_ext: &str, target_ext: &str) -> bool;

    /// Whether the backing tool is usable right now. In-process engines
    /// always are; subprocess engines probe their binary.
    fn is_available(&self) -> bool;

    fn supported_pairs(&self) -> Vec<(&'static str, &'static str)>;

    fn convert(
        &self,
        input: &Path,
        output: &Path,
        target_ext: &str,
        options: &ConversionOptions,
    ) -> std::result::Result<ConversionOutcome, EngineError>;
}

// ─── Shared helpers ─────────────────────────────────────────────────────────

/// All ordered pairs over `formats` with the identity pairs removed.
pub(crate) fn cross_pairs(formats: &'static [&'static str]) -> Vec<(&'static str, &'static str)> {
    let mut pairs = Vec::with_capacity(formats.len() * formats.len().saturating_sub(1));
    for &from in formats {
        for &to in formats {
            if from != to {
                pairs.push((from, to));
            }
        }
    }
    pairs
}

pub(crate) fn file_size(path: &Path, engine: &'static str) -> std::result::Result<u64, EngineError> {
    fs::metadata(path)
        .map(|meta| meta.len())
        .map_err(|e| EngineError::Failed {
            engine,
            message: format!("could not stat '{}': {}", path.display(), e),
        })
}

static RE_BITRATE: LazyLock<Regex> = LazyLock::new(|| Regex::new(r"^\d+[kKmM]?$").unwrap());

/// Accepts ffmpeg-style bitrates: plain digits with an optional k/M suffix.
pub(crate) fn validate_bitrate<'a>(
    value: &'a str,
    field: &str,
) -> std::result::Result<&'a str, EngineError> {
    if RE_BITRATE.is_match(value) {
        Ok(value)
    } else {
        Err(EngineError::InvalidOptions(format!(
            "invalid {} '{}': expected digits with an optional k/M suffix",
            field, value
        )))
    }
}

/// Size reduction as a percentage of the input, two decimals. Negative
/// when the output grew; zero for an empty input.
pub fn compression_ratio(input_size: u64, output_size: u64) -> f64 {
    if input_size == 0 {
        return 0.0;
    }
    round2((1.0 - output_size as f64 / input_size as f64) * 100.0)
}

// ─── Registry ───────────────────────────────────────────────────────────────

/// One conversion pair an installed engine claims.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct SupportedConversion {
    pub from: &'static str,
    pub to: &'static str,
    pub engine: &'static str,
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct EngineAvailability {
    pub name: &'static str,
    pub available: bool,
}

pub struct EngineRegistry {
    engines: Vec<Box<dyn ConversionEngine>>,
}

impl EngineRegistry {
    pub fn new() -> Self {
        Self {
            engines: Vec::new(),
        }
    }

    /// The stock engine set. Registration order is part of the contract:
    /// when two engines claim the same pair, the earlier one wins.
    pub fn with_default_engines(timeout: Duration) -> Self {
        let mut registry = Self::new();
        registry.register(Box::new(ImageEngine::new()));
        registry.register(Box::new(VideoEngine::new(timeout)));
        registry.register(Box::new(AudioEngine::new(timeout)));
        registry.register(Box::new(DocumentEngine::new(timeout)));
        registry
    }

    pub fn register(&mut self, engine: Box<dyn ConversionEngine>) {
        self.engines.push(engine);
    }

    /// First engine claiming the pair, in registration order.
    pub fn find(&self, source_ext: &str, target_ext: &str) -> Option<&dyn ConversionEngine> {
        self.engines
            .iter()
            .find(|engine| engine.can_convert(source_ext, target_ext))
            .map(|engine| engine.as_ref())
    }

    /// Every claimable pair, deduplicated in favour of the engine that
    /// would actually run it. Optionally restricted to sources of one
    /// category. Sorted for stable output.
    pub fn supported_conversions(&self, category: Option<FileCategory>) -> Vec<SupportedConversion> {
        let mut seen = HashSet::new();
        let mut conversions = Vec::new();
        for engine in &self.engines {
            for (from, to) in engine.supported_pairs() {
                if let Some(category) = category {
                    if category_for_extension(from) != Some(category) {
                        continue;
                    }
                }
                if seen.insert((from, to)) {
                    conversions.push(SupportedConversion {
                        from,
                        to,
                        engine: engine.name(),
                    });
                }
            }
        }
        conversions.sort_by(|a, b| (a.from, a.to).cmp(&(b.from, b.to)));
        conversions
    }

    pub fn availability(&self) -> Vec<EngineAvailability> {
        self.engines
            .iter()
            .map(|engine| EngineAvailability {
                name: engine.name(),
                available: engine.is_available(),
            })
            .collect()
    }
}

impl Default for EngineRegistry {
    fn default() -> Self {
        Self::new()
    }
}

// ─── Dispatcher ─────────────────────────────────────────────────────────────

/// Routes a single file to an engine and shapes the result.
///
/// Availability is not checked here: a missing tool surfaces as
/// `ENGINE_UNAVAILABLE` from the engine itself, which keeps dispatch
/// from spawning a probe process per file.
pub struct Dispatcher {
    registry: EngineRegistry,
}

impl Dispatcher {
    pub fn new(registry: EngineRegistry) -> Self {
        Self { registry }
    }

    pub fn registry(&self) -> &EngineRegistry {
        &self.registry
    }

    pub fn dispatch(
        &self,
        file: &FileRecord,
        target_ext: &str,
        output_path: &Path,
        options: &ConversionOptions,
    ) -> Result<ConvertedFileRecord> {
        let target_ext = target_ext.trim_start_matches('.').to_ascii_lowercase();

        // Cross-category targets never reach an engine.
        match category_for_extension(&target_ext) {
            Some(category) if category == file.category => {}
            Some(category) => {
                return Err(DispatchError::CategoryMismatch {
                    source_category: file.category.to_string(),
                    target_category: category.to_string(),
                    target: target_ext,
                }
                .into())
            }
            None => {
                return Err(DispatchError::NoEngine {
                    from: file.extension.clone(),
                    to: target_ext,
                }
                .into())
            }
        }

        let engine = self
            .registry
            .find(&file.extension, &target_ext)
            .ok_or_else(|| DispatchError::NoEngine {
                from: file.extension.clone(),
                to: target_ext.clone(),
            })?;

        log::debug!(
            "Dispatching {} ({} -> {}) to engine '{}'",
            redact_filename(&file.original_name),
            file.extension,
            target_ext,
            engine.name()
        );

        let started = Instant::now();
        let outcome = engine.convert(&file.path, output_path, &target_ext, options)?;
        let elapsed = round2(started.elapsed().as_secs_f64());

        log::info!(
            "Converted {} to .{} via '{}' in {:.2}s",
            redact_filename(&file.original_name),
            target_ext,
            outcome.engine,
            elapsed
        );

        let stem = Path::new(&file.original_name)
            .file_stem()
            .and_then(|s| s.to_str())
            .unwrap_or(file.original_name.as_str());
        let stored_name = output_path
            .file_name()
            .map(|name| name.to_string_lossy().into_owned())
            .unwrap_or_else(|| format!("{}.{}", file.id, target_ext));

        Ok(ConvertedFileRecord {
            id: file.id.clone(),
            original_name: format!("{}.{}", stem, target_ext),
            stored_name,
            path: output_path.to_path_buf(),
            size: outcome.output_size,
            extension: target_ext,
            converted_at: Utc::now(),
            conversion_secs: elapsed,
            engine: outcome.engine.to_string(),
            compression_ratio: Some(compression_ratio(outcome.input_size, outcome.output_size)),
        })
    }
}
