//! Video conversion via the ffmpeg command line tool.

use std::path::Path;
use std::process::Command;
use std::time::Duration;

use super::{command, cross_pairs, file_size, validate_bitrate, ConversionEngine, ConversionOutcome};
use crate::error::EngineError;
use crate::job::ConversionOptions;

const FORMATS: &[&str] = &["mp4", "avi", "mkv", "mov", "wmv", "flv", "webm", "m4v"];

/// Container-appropriate codec pair used when the caller does not pick one.
fn default_codecs(target_ext: &str) -> Option<(&'static str, &'static str)> {
    match target_ext {
        "mp4" | "m4v" | "mov" => Some(("libx264", "aac")),
        "webm" => Some(("libvpx-vp9", "libopus")),
        "avi" => Some(("libx264", "mp3")),
        _ => None,
    }
}

pub struct VideoEngine {
    timeout: Duration,
}

impl VideoEngine {
    pub fn new(timeout: Duration) -> Self {
        Self { timeout }
    }
}

impl ConversionEngine for VideoEngine {
    fn name(&self) -> &'static str {
        "ffmpeg"
    }

    fn can_convert(&self, source_ext: &str, target_ext: &str) -> bool {
        FORMATS.contains(&source_ext) && FORMATS.contains(&target_ext)
    }

    fn is_available(&self) -> bool {
        command::probe_tool("ffmpeg", "-version")
    }

    fn supported_pairs(&self) -> Vec<(&'static str, &'static str)> {
        cross_pairs(FORMATS)
    }

    fn convert(
        &self,
        input: &Path,
        output: &Path,
        target_ext: &str,
        options: &ConversionOptions,
    ) -> Result<ConversionOutcome, EngineError> {
        let _span = tracing::info_span!("engine.video").entered();

        let mut cmd = Command::new("ffmpeg");
        cmd.args(["-y", "-hide_banner", "-loglevel", "error"])
            .arg("-i")
            .arg(input);

        // A caller-supplied codec replaces the video codec only; the
        // container's default audio codec still applies.
        let defaults = default_codecs(target_ext);
        match (options.codec.as_deref(), defaults) {
            (Some(codec), Some((_, audio))) => {
                cmd.args(["-c:v", codec, "-c:a", audio]);
            }
            (Some(codec), None) => {
                cmd.args(["-c:v", codec]);
            }
            (None, Some((video, audio))) => {
                cmd.args(["-c:v", video, "-c:a", audio]);
            }
            (None, None) => {}
        }

        if let Some(crf) = crf_option(options)? {
            cmd.args(["-crf", &crf]);
        }
        if let Some(bitrate) = options.bitrate.as_deref() {
            cmd.arg("-b:v").arg(validate_bitrate(bitrate, "bitrate")?);
        }
        if let Some((width, height)) = options.resolution {
            if width == 0 || height == 0 {
                return Err(EngineError::InvalidOptions(
                    "resolution dimensions must be non-zero".to_string(),
                ));
            }
            cmd.arg("-s").arg(format!("{}x{}", width, height));
        }
        if let Some(fps) = options.frame_rate {
            if fps == 0 || fps > 300 {
                return Err(EngineError::InvalidOptions(format!(
                    "frame rate {} out of range 1-300",
                    fps
                )));
            }
            cmd.arg("-r").arg(fps.to_string());
        }
        if let Some(audio_bitrate) = audio_bitrate_option(options)? {
            cmd.arg("-b:a").arg(audio_bitrate);
        }

        cmd.arg(output);
        command::run_tool("ffmpeg", cmd, self.timeout)?;

        Ok(ConversionOutcome {
            engine: "ffmpeg",
            input_size: file_size(input, "ffmpeg")?,
            output_size: file_size(output, "ffmpeg")?,
        })
    }
}

fn crf_option(options: &ConversionOptions) -> Result<Option<String>, EngineError> {
    let Some(value) = options.extra.get("crf") else {
        return Ok(None);
    };
    match value.as_u64() {
        Some(crf) if crf <= 51 => Ok(Some(crf.to_string())),
        _ => Err(EngineError::InvalidOptions(format!(
            "crf '{}' must be an integer between 0 and 51",
            value
        ))),
    }
}

fn audio_bitrate_option(options: &ConversionOptions) -> Result<Option<String>, EngineError> {
    let Some(value) = options.extra.get("audioBitrate") else {
        return Ok(None);
    };
    match value.as_str() {
        Some(s) => Ok(Some(validate_bitrate(s, "audioBitrate")?.to_string())),
        None => Err(EngineError::InvalidOptions(
            "audioBitrate must be a string".to_string(),
        )),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_can_convert_within_formats() {
        let engine = VideoEngine::new(Duration::from_secs(300));
        assert!(engine.can_convert("mp4", "webm"));
        assert!(engine.can_convert("avi", "mkv"));
        assert!(!engine.can_convert("mp4", "mp3"));
        assert!(!engine.can_convert("png", "mp4"));
    }

    #[test]
    fn test_default_codecs() {
        assert_eq!(default_codecs("mp4"), Some(("libx264", "aac")));
        assert_eq!(default_codecs("webm"), Some(("libvpx-vp9", "libopus")));
        assert_eq!(default_codecs("avi"), Some(("libx264", "mp3")));
        assert_eq!(default_codecs("mkv"), None);
    }

    #[test]
    fn test_crf_option() {
        let mut options = ConversionOptions::default();
        assert_eq!(crf_option(&options).unwrap(), None);

        options
            .extra
            .insert("crf".to_string(), serde_json::json!(23));
        assert_eq!(crf_option(&options).unwrap(), Some("23".to_string()));

        options
            .extra
            .insert("crf".to_string(), serde_json::json!(99));
        assert!(crf_option(&options).is_err());

        options
            .extra
            .insert("crf".to_string(), serde_json::json!("high"));
        assert!(crf_option(&options).is_err());
    }

    #[test]
    fn test_invalid_options_rejected_before_spawn() {
        // Runs without ffmpeg installed: option validation comes first.
        let engine = VideoEngine::new(Duration::from_secs(300));
        let options = ConversionOptions {
            bitrate: Some("not-a-bitrate".to_string()),
            ..Default::default()
        };
        let err = engine
            .convert(
                Path::new("/tmp/in.mp4"),
                Path::new("/tmp/out.webm"),
                "webm",
                &options,
            )
            .unwrap_err();
        assert_eq!(err.code(), "INVALID_OPTIONS");
    }

    #[test]
    fn test_supported_pairs_cover_cross_product() {
        let pairs = VideoEngine::new(Duration::from_secs(1)).supported_pairs();
        assert_eq!(pairs.len(), FORMATS.len() * (FORMATS.len() - 1));
        assert!(pairs.contains(&("mp4", "webm")));
    }
}
