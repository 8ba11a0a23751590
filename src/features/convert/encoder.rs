//! Encoders used by the conversion bridge
//!
//! `FfmpegEncoder` shells out to ffmpeg for both targets. `LibraryWavEncoder`
//! decodes with symphonia and writes 16-bit PCM with hound, so WAV output
//! works without any external tool.

use std::fs::File;
use std::io;
use std::path::{Path, PathBuf};
use std::process::{Command, Stdio};

use hound::{SampleFormat, WavSpec, WavWriter};
use symphonia::core::audio::SampleBuffer;
use symphonia::core::codecs::DecoderOptions;
use symphonia::core::errors::Error as SymphoniaError;
use symphonia::core::formats::FormatOptions;
use symphonia::core::io::{MediaSourceStream, MediaSourceStreamOptions};
use symphonia::core::meta::MetadataOptions;
use symphonia::core::probe::Hint;

use crate::error::{Result, TagfixError};

use super::TargetFormat;

pub trait Encoder: Send + Sync {
    fn name(&self) -> &str;

    /// Transcode `input` into a new file at `output`
    fn encode(&self, input: &Path, output: &Path, target: TargetFormat) -> Result<()>;
}

#[derive(Debug, Clone)]
pub struct FfmpegEncoder {
    program: PathBuf,
}

impl FfmpegEncoder {
    pub fn new(program: impl Into<PathBuf>) -> Self {
        Self {
            program: program.into(),
        }
    }

    /// The encoder if `program -version` runs successfully
    pub fn probe(program: impl Into<PathBuf>) -> Option<Self> {
        let encoder = Self::new(program);
        let status = Command::new(&encoder.program)
            .arg("-version")
            .stdout(Stdio::null())
            .stderr(Stdio::null())
            .status();
        match status {
            Ok(status) if status.success() => Some(encoder),
            Ok(status) => {
                tracing::debug!("{:?} -version exited with {}", encoder.program, status);
                None
            }
            Err(e) => {
                tracing::debug!("ffmpeg not available at {:?}: {}", encoder.program, e);
                None
            }
        }
    }

    fn codec(target: TargetFormat) -> &'static str {
        match target {
            TargetFormat::Wav => "pcm_s16le",
            TargetFormat::Flac => "flac",
        }
    }
}

impl Encoder for FfmpegEncoder {
    fn name(&self) -> &str {
        "ffmpeg"
    }

    fn encode(&self, input: &Path, output: &Path, target: TargetFormat) -> Result<()> {
        let result = Command::new(&self.program)
            .arg("-i")
            .arg(input)
            .args(["-acodec", Self::codec(target), "-y"])
            .arg(output)
            .stdin(Stdio::null())
            .output()
            .map_err(|e| match e.kind() {
                io::ErrorKind::NotFound => TagfixError::CapabilityMissing("ffmpeg".to_string()),
                _ => TagfixError::Io(e),
            })?;

        if !result.status.success() {
            let stderr = String::from_utf8_lossy(&result.stderr);
            let reason = stderr.lines().last().unwrap_or("ffmpeg failed").to_string();
            return Err(TagfixError::write(output.display(), reason));
        }
        Ok(())
    }
}

/// Decodes anything symphonia reads into a 16-bit PCM WAV
#[derive(Debug, Clone, Copy, Default)]
pub struct LibraryWavEncoder;

impl Encoder for LibraryWavEncoder {
    fn name(&self) -> &str {
        "built-in"
    }

    fn encode(&self, input: &Path, output: &Path, target: TargetFormat) -> Result<()> {
        if target != TargetFormat::Wav {
            return Err(TagfixError::CapabilityMissing(format!(
                "{} encoding needs ffmpeg",
                target
            )));
        }
        decode_to_wav(input, output)
    }
}

fn decode_to_wav(input: &Path, output: &Path) -> Result<()> {
    let file = File::open(input)?;
    let mss = MediaSourceStream::new(Box::new(file), MediaSourceStreamOptions::default());

    let mut hint = Hint::new();
    if let Some(ext) = input.extension().and_then(|e| e.to_str()) {
        hint.with_extension(ext);
    }

    let probed = symphonia::default::get_probe()
        .format(
            &hint,
            mss,
            &FormatOptions::default(),
            &MetadataOptions::default(),
        )
        .map_err(|e| TagfixError::parse(input, e))?;
    let mut format = probed.format;

    let track = format
        .default_track()
        .ok_or_else(|| TagfixError::parse(input, "no audio track"))?;
    let track_id = track.id;
    let mut decoder = symphonia::default::get_codecs()
        .make(&track.codec_params, &DecoderOptions::default())
        .map_err(|e| TagfixError::parse(input, e))?;

    let write_error = |e: hound::Error| TagfixError::write(output.display(), e);
    let mut writer = None;

    loop {
        let packet = match format.next_packet() {
            Ok(packet) => packet,
            Err(SymphoniaError::IoError(e)) if e.kind() == io::ErrorKind::UnexpectedEof => break,
            Err(SymphoniaError::ResetRequired) => {
                decoder.reset();
                continue;
            }
            Err(e) => return Err(TagfixError::parse(input, e)),
        };
        if packet.track_id() != track_id {
            continue;
        }

        let decoded = match decoder.decode(&packet) {
            Ok(decoded) => decoded,
            // Corrupt packet; skip.
            Err(SymphoniaError::DecodeError(e)) => {
                tracing::debug!("Skipping corrupt packet in {:?}: {}", input, e);
                continue;
            }
            Err(e) => return Err(TagfixError::parse(input, e)),
        };

        let spec = *decoded.spec();
        let mut samples = SampleBuffer::<i16>::new(decoded.capacity() as u64, spec);
        samples.copy_interleaved_ref(decoded);

        if writer.is_none() {
            let wav_spec = WavSpec {
                channels: spec.channels.count() as u16,
                sample_rate: spec.rate,
                bits_per_sample: 16,
                sample_format: SampleFormat::Int,
            };
            writer = Some(WavWriter::create(output, wav_spec).map_err(write_error)?);
        }
        if let Some(writer) = writer.as_mut() {
            for sample in samples.samples() {
                writer.write_sample(*sample).map_err(write_error)?;
            }
        }
    }

    match writer {
        Some(writer) => writer.finalize().map_err(write_error),
        None => Err(TagfixError::parse(input, "no audio decoded")),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::test_support::write_silent_wav;
    use tempfile::TempDir;

    #[test]
    fn test_probe_missing_ffmpeg() {
        assert!(FfmpegEncoder::probe("/nonexistent/tagfix-ffmpeg").is_none());
    }

    #[test]
    fn test_missing_ffmpeg_is_capability_missing() {
        let dir = TempDir::new().unwrap();
        let encoder = FfmpegEncoder::new("/nonexistent/tagfix-ffmpeg");
        let err = encoder
            .encode(
                &dir.path().join("in.mp3"),
                &dir.path().join("out.wav"),
                TargetFormat::Wav,
            )
            .unwrap_err();
        assert!(matches!(err, TagfixError::CapabilityMissing(_)));
    }

    #[test]
    fn test_library_encoder_decodes_wav() {
        let dir = TempDir::new().unwrap();
        let input = dir.path().join("in.wav");
        let output = dir.path().join("out.wav");
        write_silent_wav(&input);

        LibraryWavEncoder
            .encode(&input, &output, TargetFormat::Wav)
            .unwrap();

        let reader = hound::WavReader::open(&output).unwrap();
        assert_eq!(reader.spec().channels, 2);
        assert_eq!(reader.spec().sample_rate, 44_100);
        assert_eq!(reader.spec().bits_per_sample, 16);
        assert!(reader.duration() > 0);
    }

    #[test]
    fn test_library_encoder_refuses_flac() {
        let dir = TempDir::new().unwrap();
        let err = LibraryWavEncoder
            .encode(
                &dir.path().join("in.wav"),
                &dir.path().join("out.flac"),
                TargetFormat::Flac,
            )
            .unwrap_err();
        assert!(matches!(err, TagfixError::CapabilityMissing(_)));
    }

    #[test]
    fn test_library_encoder_rejects_garbage() {
        let dir = TempDir::new().unwrap();
        let input = dir.path().join("junk.mp3");
        std::fs::write(&input, b"not audio at all").unwrap();
        let err = LibraryWavEncoder
            .encode(&input, &dir.path().join("out.wav"), TargetFormat::Wav)
            .unwrap_err();
        assert!(matches!(err, TagfixError::ParseFailure { .. }));
    }
}
