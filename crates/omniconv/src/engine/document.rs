//! Document conversion via pandoc and LibreOffice.
//!
//! Pandoc handles markup-family pairs. LibreOffice covers the office
//! formats pandoc cannot read and is the only path that produces PDF.
//! PDF is target-only: nothing here reads PDF back.

use std::fs;
use std::path::Path;
use std::process::Command;
use std::time::Duration;

use super::{command, file_size, ConversionEngine, ConversionOutcome};
use crate::error::EngineError;
use crate::job::ConversionOptions;

/// Formats pandoc can both read and write.
const PANDOC_FORMATS: &[&str] = &["md", "html", "htm", "txt", "docx", "odt", "rtf", "epub"];

const LIBRE_SOURCES: &[&str] = &["doc", "docx", "odt", "rtf", "txt"];
const LIBRE_TARGETS: &[&str] = &["pdf", "docx", "odt", "rtf", "txt", "html"];

/// Pandoc finishes fast on realistic documents.
const PANDOC_TIMEOUT: Duration = Duration::from_secs(60);
/// LibreOffice startup alone can take tens of seconds.
const LIBRE_TIMEOUT: Duration = Duration::from_secs(120);

fn can_pandoc(source_ext: &str, target_ext: &str) -> bool {
    source_ext != target_ext
        && PANDOC_FORMATS.contains(&source_ext)
        && PANDOC_FORMATS.contains(&target_ext)
}

fn can_libre(source_ext: &str, target_ext: &str) -> bool {
    source_ext != target_ext
        && LIBRE_SOURCES.contains(&source_ext)
        && LIBRE_TARGETS.contains(&target_ext)
}

pub struct DocumentEngine {
    timeout: Duration,
}

impl DocumentEngine {
    pub fn new(timeout: Duration) -> Self {
        Self { timeout }
    }

    fn run_pandoc(
        &self,
        input: &Path,
        output: &Path,
        options: &ConversionOptions,
    ) -> Result<ConversionOutcome, EngineError> {
        let mut cmd = Command::new("pandoc");
        cmd.arg(input).arg("-o").arg(output);
        if let Some(template) = options.extra.get("template").and_then(|v| v.as_str()) {
            cmd.arg("--template").arg(template);
        }
        command::run_tool("pandoc", cmd, self.timeout.min(PANDOC_TIMEOUT))?;

        Ok(ConversionOutcome {
            engine: "pandoc",
            input_size: file_size(input, "pandoc")?,
            output_size: file_size(output, "pandoc")?,
        })
    }

    fn run_libreoffice(
        &self,
        input: &Path,
        output: &Path,
        target_ext: &str,
    ) -> Result<ConversionOutcome, EngineError> {
        // soffice names its output after the input stem inside --outdir.
        // Stage in a private directory next to the final output so the
        // rename stays on one filesystem.
        let parent = output.parent().unwrap_or(Path::new("."));
        let staging = parent.join(format!(".soffice-{}", uuid::Uuid::new_v4()));
        fs::create_dir_all(&staging).map_err(|e| EngineError::Failed {
            engine: "libreoffice",
            message: format!("could not create staging directory: {}", e),
        })?;

        let result = self.libreoffice_staged(input, output, target_ext, &staging);
        let _ = fs::remove_dir_all(&staging);
        result
    }

    fn libreoffice_staged(
        &self,
        input: &Path,
        output: &Path,
        target_ext: &str,
        staging: &Path,
    ) -> Result<ConversionOutcome, EngineError> {
        let mut cmd = Command::new("soffice");
        cmd.args(["--headless", "--convert-to", target_ext, "--outdir"])
            .arg(staging)
            .arg(input);
        command::run_tool("libreoffice", cmd, self.timeout.min(LIBRE_TIMEOUT))?;

        let stem = input
            .file_stem()
            .and_then(|s| s.to_str())
            .unwrap_or("output");
        let produced = staging.join(format!("{}.{}", stem, target_ext));
        // soffice exits zero even when it could not convert.
        if !produced.exists() {
            return Err(EngineError::Failed {
                engine: "libreoffice",
                message: format!("no output produced for '{}'", input.display()),
            });
        }
        fs::rename(&produced, output).map_err(|e| EngineError::Failed {
            engine: "libreoffice",
            message: format!("could not move output into place: {}", e),
        })?;

        Ok(ConversionOutcome {
            engine: "libreoffice",
            input_size: file_size(input, "libreoffice")?,
            output_size: file_size(output, "libreoffice")?,
        })
    }
}

impl ConversionEngine for DocumentEngine {
    fn name(&self) -> &'static str {
        "document"
    }

    fn can_convert(&self, source_ext: &str, target_ext: &str) -> bool {
        can_pandoc(source_ext, target_ext) || can_libre(source_ext, target_ext)
    }

    fn is_available(&self) -> bool {
        command::probe_tool("pandoc", "--version") || command::probe_tool("soffice", "--version")
    }

    fn supported_pairs(&self) -> Vec<(&'static str, &'static str)> {
        let mut pairs = Vec::new();
        for &from in PANDOC_FORMATS {
            for &to in PANDOC_FORMATS {
                if from != to {
                    pairs.push((from, to));
                }
            }
        }
        for &from in LIBRE_SOURCES {
            for &to in LIBRE_TARGETS {
                if from != to && !pairs.contains(&(from, to)) {
                    pairs.push((from, to));
                }
            }
        }
        pairs
    }

    fn convert(
        &self,
        input: &Path,
        output: &Path,
        target_ext: &str,
        options: &ConversionOptions,
    ) -> Result<ConversionOutcome, EngineError> {
        let _span = tracing::info_span!("engine.document").entered();

        let source_ext = input
            .extension()
            .and_then(|e| e.to_str())
            .map(|e| e.to_lowercase())
            .unwrap_or_default();

        if can_pandoc(&source_ext, target_ext) {
            self.run_pandoc(input, output, options)
        } else {
            self.run_libreoffice(input, output, target_ext)
        }
    }
}
