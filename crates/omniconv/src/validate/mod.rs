//! Format and security validation for incoming files.
//!
//! Validation is deterministic and strictly ordered: name checks, then
//! size, then extension, then content. The first failing check wins, so
//! every rejection carries exactly one machine code.

use std::path::Path;

use serde::Serialize;

use crate::config::{Config, ContentCheckPolicy};
use crate::error::ValidationError;
use crate::formats::{category_for_extension, is_dangerous_extension, FileCategory};
use crate::sanitize::redact_filename;

/// How many leading bytes of a file the content checks look at.
pub const SAMPLE_LEN: usize = 8192;

const MAX_FILENAME_LENGTH: usize = 255;

const DANGEROUS_NAME_CHARS: &[char] = &['<', '>', ':', '"', '|', '?', '*', '\0'];

/// Substrings that mark a filename as an injection attempt. Checked
/// case-insensitively.
const SCRIPT_PATTERNS: &[&str] = &[
    "<script",
    "javascript:",
    "vbscript:",
    "onload=",
    "onerror=",
];

/// What validation learned about an accepted file.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ValidationOutcome {
    pub category: FileCategory,
    /// Normalized (lowercased) extension without the dot.
    pub extension: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub mime_type: Option<String>,
    /// Content-sniffed type, when the leading bytes match a known signature.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub detected_type: Option<String>,
    pub size: u64,
}

/// Per-file entry in a batch validation result.
#[derive(Debug)]
pub struct FileValidation {
    pub name: String,
    pub result: Result<ValidationOutcome, ValidationError>,
}

/// Result of validating a whole submission.
#[derive(Debug)]
pub struct BatchValidation {
    pub files: Vec<FileValidation>,
    pub valid_count: usize,
    pub total_valid_bytes: u64,
}

pub struct FormatValidator {
    max_file_size: u64,
    max_files_per_batch: usize,
    content_check: ContentCheckPolicy,
}

impl FormatValidator {
    pub fn new(
        max_file_size: u64,
        max_files_per_batch: usize,
        content_check: ContentCheckPolicy,
    ) -> Self {
        Self {
            max_file_size,
            max_files_per_batch,
            content_check,
        }
    }

    pub fn from_config(config: &Config) -> Self {
        Self::new(
            config.max_file_size_bytes(),
            config.max_files_per_batch,
            config.content_check,
        )
    }

    /// Validates one file from its declared name, declared size, and a
    /// bounded sample of its leading bytes.
    pub fn validate(
        &self,
        sample: &[u8],
        name: &str,
        size: u64,
    ) -> Result<ValidationOutcome, ValidationError> {
        self.check_name(name)?;
        self.check_size(size)?;
        let (extension, category) = check_extension(name)?;
        let (mime_type, detected_type) = self.check_content(sample, name, &extension)?;

        Ok(ValidationOutcome {
            category,
            extension,
            mime_type,
            detected_type,
            size,
        })
    }

    /// Validates a whole submission. Per-file failures stay per-file;
    /// only batch-level limits reject the submission outright.
    pub fn validate_batch(
        &self,
        files: &[(&str, &[u8])],
    ) -> Result<BatchValidation, ValidationError> {
        if files.is_empty() {
            return Err(ValidationError::EmptyBatch);
        }
        if files.len() > self.max_files_per_batch {
            return Err(ValidationError::TooManyFiles {
                count: files.len(),
                limit: self.max_files_per_batch,
            });
        }

        // The byte budget counts every submitted file, including ones that
        // fail their own size check, so an oversized outlier rejects the
        // submission before any bytes are stored.
        let total_bytes: u64 = files.iter().map(|(_, bytes)| bytes.len() as u64).sum();
        let limit = self.max_file_size.saturating_mul(files.len() as u64);
        if total_bytes > limit {
            return Err(ValidationError::BatchSizeExceeded {
                size: total_bytes,
                limit,
            });
        }

        let mut results = Vec::with_capacity(files.len());
        let mut valid_count = 0;
        let mut total_valid_bytes = 0u64;

        for (name, bytes) in files {
            let size = bytes.len() as u64;
            let sample = &bytes[..bytes.len().min(SAMPLE_LEN)];
            let result = self.validate(sample, name, size);
            if result.is_ok() {
                valid_count += 1;
                total_valid_bytes += size;
            }
            results.push(FileValidation {
                name: name.to_string(),
                result,
            });
        }

        Ok(BatchValidation {
            files: results,
            valid_count,
            total_valid_bytes,
        })
    }

    fn check_name(&self, name: &str) -> Result<(), ValidationError> {
        if name.trim().is_empty() {
            return Err(ValidationError::EmptyFilename);
        }
        if name.chars().count() > MAX_FILENAME_LENGTH {
            return Err(ValidationError::FilenameTooLong {
                max: MAX_FILENAME_LENGTH,
            });
        }
        if name.contains(DANGEROUS_NAME_CHARS) {
            return Err(ValidationError::InvalidFilenameChars);
        }
        if name.contains("..") || name.contains('/') || name.contains('\\') {
            return Err(ValidationError::PathTraversal);
        }
        let lowered = name.to_lowercase();
        for pattern in SCRIPT_PATTERNS {
            if lowered.contains(pattern) {
                return Err(ValidationError::SuspiciousFilename {
                    reason: format!("contains '{}'", pattern),
                });
            }
        }
        Ok(())
    }

    fn check_size(&self, size: u64) -> Result<(), ValidationError> {
        if size == 0 {
            return Err(ValidationError::EmptyFile);
        }
        if size > self.max_file_size {
            return Err(ValidationError::FileTooLarge {
                size,
                limit: self.max_file_size,
            });
        }
        Ok(())
    }

    fn check_content(
        &self,
        sample: &[u8],
        name: &str,
        extension: &str,
    ) -> Result<(Option<String>, Option<String>), ValidationError> {
        // Executable headers are rejected regardless of policy.
        if sample.len() >= 2 && &sample[..2] == b"MZ" {
            return Err(ValidationError::ExecutableContent {
                format: "Windows executable".to_string(),
            });
        }
        if sample.len() >= 4 && &sample[..4] == b"\x7fELF" {
            return Err(ValidationError::ExecutableContent {
                format: "ELF executable".to_string(),
            });
        }

        let mime_type = mime_guess::from_ext(extension)
            .first()
            .map(|m| m.to_string());
        let detected = sniff_detected_type(sample);

        if let (Some(declared), Some(detected)) = (mime_type.as_deref(), detected) {
            // Compare top-level types only; container formats (docx and
            // friends are zip archives) make exact comparison useless.
            let declared_top = declared.split('/').next().unwrap_or("");
            let detected_top = detected.split('/').next().unwrap_or("");
            if declared_top != detected_top {
                match self.content_check {
                    ContentCheckPolicy::Enforce => {
                        return Err(ValidationError::MimeMismatch {
                            declared: extension.to_string(),
                            detected: detected.to_string(),
                        });
                    }
                    ContentCheckPolicy::Log => {
                        log::warn!(
                            "Content of '{}' looks like {} but is declared .{}",
                            redact_filename(name),
                            detected,
                            extension
                        );
                    }
                }
            }
        }

        Ok((mime_type, detected.map(|d| d.to_string())))
    }
}

fn check_extension(name: &str) -> Result<(String, FileCategory), ValidationError> {
    let extension = Path::new(name)
        .extension()
        .and_then(|e| e.to_str())
        .map(|e| e.to_lowercase())
        .filter(|e| !e.is_empty())
        .ok_or(ValidationError::NoExtension)?;

    // A dangerous extension smuggled before the final one ("doc.exe.png")
    // marks the whole name as suspicious.
    let lowered = name.to_lowercase();
    let parts: Vec<&str> = lowered.split('.').collect();
    if parts.len() > 2 {
        for inner in &parts[1..parts.len() - 1] {
            if is_dangerous_extension(inner) {
                return Err(ValidationError::SuspiciousFilename {
                    reason: format!("inner extension '.{}'", inner),
                });
            }
        }
    }

    if is_dangerous_extension(&extension) {
        return Err(ValidationError::DangerousExtension { ext: extension });
    }

    let category = category_for_extension(&extension)
        .ok_or_else(|| ValidationError::UnsupportedExtension {
            ext: extension.clone(),
        })?;

    Ok((extension, category))
}

/// Best-effort signature sniffing over the leading bytes.
fn sniff_detected_type(sample: &[u8]) -> Option<&'static str> {
    if sample.starts_with(b"\x89PNG\r\n\x1a\n") {
        return Some("image/png");
    }
    if sample.starts_with(b"\xff\xd8\xff") {
        return Some("image/jpeg");
    }
    if sample.starts_with(b"GIF87a") || sample.starts_with(b"GIF89a") {
        return Some("image/gif");
    }
    if sample.len() >= 12 && &sample[..4] == b"RIFF" {
        if &sample[8..12] == b"WEBP" {
            return Some("image/webp");
        }
        if &sample[8..12] == b"WAVE" {
            return Some("audio/wav");
        }
        if &sample[8..12] == b"AVI " {
            return Some("video/x-msvideo");
        }
    }
    // BMP's two-byte magic is weak; require the reserved zero bytes too.
    if sample.len() >= 14 && sample.starts_with(b"BM") && sample[6..10] == [0, 0, 0, 0] {
        return Some("image/bmp");
    }
    if sample.starts_with(b"%PDF") {
        return Some("application/pdf");
    }
    if sample.starts_with(b"PK\x03\x04") {
        return Some("application/zip");
    }
    if sample.starts_with(b"ID3")
        || sample.starts_with(b"\xff\xfb")
        || sample.starts_with(b"\xff\xf3")
    {
        return Some("audio/mpeg");
    }
    if sample.starts_with(b"OggS") {
        return Some("audio/ogg");
    }
    if sample.starts_with(b"fLaC") {
        return Some("audio/flac");
    }
    if sample.len() >= 12 && &sample[4..8] == b"ftyp" {
        if &sample[8..11] == b"M4A" {
            return Some("audio/mp4");
        }
        return Some("video/mp4");
    }
    if sample.starts_with(b"\x1a\x45\xdf\xa3") {
        return Some("video/webm");
    }
    None
}
