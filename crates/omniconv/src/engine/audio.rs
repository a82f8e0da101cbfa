//! Audio conversion via the ffmpeg command line tool.
//!
//! Kept separate from the video engine so the dispatch table stays
//! category-pure: this engine only ever sees audio-to-audio pairs.

use std::path::Path;
use std::process::Command;
use std::time::Duration;

use super::{command, cross_pairs, file_size, validate_bitrate, ConversionEngine, ConversionOutcome};
use crate::error::EngineError;
use crate::job::ConversionOptions;

const FORMATS: &[&str] = &["mp3", "wav", "flac", "aac", "ogg", "wma", "m4a"];

/// Encoder for each target. `None` leaves the choice to ffmpeg.
fn default_codec(target_ext: &str) -> Option<&'static str> {
    match target_ext {
        "mp3" => Some("libmp3lame"),
        "aac" => Some("aac"),
        "ogg" => Some("libvorbis"),
        "flac" => Some("flac"),
        "wav" => Some("pcm_s16le"),
        _ => None,
    }
}

pub struct AudioEngine {
    timeout: Duration,
}

impl AudioEngine {
    pub fn new(timeout: Duration) -> Self {
        Self { timeout }
    }
}

impl ConversionEngine for AudioEngine {
    fn name(&self) -> &'static str {
        "ffmpeg_audio"
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
        let _span = tracing::info_span!("engine.audio").entered();

        let mut cmd = Command::new("ffmpeg");
        cmd.args(["-y", "-hide_banner", "-loglevel", "error"])
            .arg("-i")
            .arg(input)
            // Embedded album art would otherwise become a video stream.
            .arg("-vn");

        let codec = options.codec.as_deref().or_else(|| default_codec(target_ext));
        if let Some(codec) = codec {
            cmd.args(["-c:a", codec]);
        }

        if let Some(bitrate) = options.bitrate.as_deref() {
            cmd.arg("-b:a").arg(validate_bitrate(bitrate, "bitrate")?);
        }
        if let Some(sample_rate) = sample_rate_option(options)? {
            cmd.arg("-ar").arg(sample_rate);
        }
        if let Some(channels) = channels_option(options)? {
            cmd.arg("-ac").arg(channels);
        }

        cmd.arg(output);
        command::run_tool("ffmpeg_audio", cmd, self.timeout)?;

        Ok(ConversionOutcome {
            engine: "ffmpeg_audio",
            input_size: file_size(input, "ffmpeg_audio")?,
            output_size: file_size(output, "ffmpeg_audio")?,
        })
    }
}

fn sample_rate_option(options: &ConversionOptions) -> Result<Option<String>, EngineError> {
    let Some(value) = options.extra.get("sampleRate") else {
        return Ok(None);
    };
    match value.as_u64() {
        Some(rate) if (8000..=192_000).contains(&rate) => Ok(Some(rate.to_string())),
        _ => Err(EngineError::InvalidOptions(format!(
            "sampleRate '{}' must be an integer between 8000 and 192000",
            value
        ))),
    }
}

fn channels_option(options: &ConversionOptions) -> Result<Option<String>, EngineError> {
    let Some(value) = options.extra.get("channels") else {
        return Ok(None);
    };
    match value.as_u64() {
        Some(channels) if (1..=8).contains(&channels) => Ok(Some(channels.to_string())),
        _ => Err(EngineError::InvalidOptions(format!(
            "channels '{}' must be an integer between 1 and 8",
            value
        ))),
    }
}
