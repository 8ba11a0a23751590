//! Conversion to WAV or FLAC
//!
//! Converted files land in a sibling folder named `<folder> - wav` (or
//! `- flac`). Tags and cover art are copied over on a best-effort basis, and
//! images and lyrics files next to the sources are copied along.

mod encoder;

pub use encoder::{Encoder, FfmpegEncoder, LibraryWavEncoder};

use std::collections::HashMap;
use std::fmt;
use std::fs;
use std::path::{Path, PathBuf};
use std::sync::Arc;

use crate::error::{Result, TagfixError};
use crate::features::dispatch::{AudioFile, AudioFormat};
use crate::features::settings::EncoderSettings;
use crate::features::tags::{TEXT_TAGS, TagSession};

/// Files copied next to converted audio
pub const SIDECAR_EXTENSIONS: &[&str] = &["jpg", "jpeg", "png", "gif", "bmp", "lrc", "txt"];

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum TargetFormat {
    Wav,
    Flac,
}

impl TargetFormat {
    pub fn extension(&self) -> &'static str {
        match self {
            Self::Wav => "wav",
            Self::Flac => "flac",
        }
    }
}

impl fmt::Display for TargetFormat {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.extension().to_uppercase())
    }
}

/// Encoders available in this session, probed once at startup
#[derive(Debug, Clone)]
pub struct Capabilities {
    /// Built-in symphonia + hound path (WAV only)
    pub library_wav: bool,
    pub ffmpeg: Option<FfmpegEncoder>,
}

impl Capabilities {
    pub fn probe(settings: &EncoderSettings) -> Self {
        let ffmpeg = FfmpegEncoder::probe(&settings.ffmpeg_path);
        tracing::info!(
            "Encoders: built-in WAV, ffmpeg {}",
            if ffmpeg.is_some() { "found" } else { "not found" }
        );
        Self {
            library_wav: true,
            ffmpeg,
        }
    }

    #[cfg(test)]
    pub fn none() -> Self {
        Self {
            library_wav: false,
            ffmpeg: None,
        }
    }

    pub fn can_encode(&self, target: TargetFormat) -> bool {
        self.encoder_for(target).is_ok()
    }

    /// Preferred encoder for a target format
    pub fn encoder_for(&self, target: TargetFormat) -> Result<Arc<dyn Encoder>> {
        match (target, self.library_wav, &self.ffmpeg) {
            (TargetFormat::Wav, true, _) => Ok(Arc::new(LibraryWavEncoder)),
            (_, _, Some(ffmpeg)) => Ok(Arc::new(ffmpeg.clone())),
            _ => Err(TagfixError::CapabilityMissing(format!(
                "no encoder for {} (install ffmpeg)",
                target
            ))),
        }
    }
}

/// `<dir>/<dir name> - wav`
pub fn output_dir(dir: &Path, target: TargetFormat) -> PathBuf {
    let name = dir
        .file_name()
        .map(|n| n.to_string_lossy().into_owned())
        .unwrap_or_else(|| "converted".to_string());
    dir.join(format!("{} - {}", name, target.extension()))
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ConversionStats {
    pub converted: usize,
    /// Sidecar files copied
    pub copied: usize,
    pub failed: usize,
    pub errors: Vec<String>,
}

/// Stateful converter; prepares each source folder the first time it is seen
pub struct Converter {
    target: TargetFormat,
    encoder: Arc<dyn Encoder>,
    /// Source dir -> output dir, `None` if it could not be created
    folders: HashMap<PathBuf, Option<PathBuf>>,
    stats: ConversionStats,
}

impl Converter {
    pub fn new(target: TargetFormat, encoder: Arc<dyn Encoder>) -> Self {
        Self {
            target,
            encoder,
            folders: HashMap::new(),
            stats: ConversionStats::default(),
        }
    }

    fn prepare_folder(&mut self, dir: &Path) -> Option<PathBuf> {
        if let Some(prepared) = self.folders.get(dir) {
            return prepared.clone();
        }

        let out_dir = output_dir(dir, self.target);
        let prepared = match fs::create_dir_all(&out_dir) {
            Ok(()) => {
                self.copy_sidecars(dir, &out_dir);
                Some(out_dir)
            }
            Err(e) => {
                let msg = format!("Could not create {}: {}", out_dir.display(), e);
                tracing::error!("{}", msg);
                self.stats.errors.push(msg);
                None
            }
        };
        self.folders.insert(dir.to_path_buf(), prepared.clone());
        prepared
    }

    fn copy_sidecars(&mut self, dir: &Path, out_dir: &Path) {
        let Ok(entries) = fs::read_dir(dir) else {
            return;
        };
        let mut sidecars: Vec<PathBuf> = entries
            .filter_map(|e| e.ok())
            .map(|e| e.path())
            .filter(|p| p.is_file() && is_sidecar(p))
            .collect();
        sidecars.sort();

        for path in sidecars {
            let Some(name) = path.file_name() else {
                continue;
            };
            match fs::copy(&path, out_dir.join(name)) {
                Ok(_) => self.stats.copied += 1,
                Err(e) => {
                    tracing::warn!("Failed to copy {:?}: {}", path, e);
                    self.stats
                        .errors
                        .push(format!("Could not copy {}: {}", path.display(), e));
                }
            }
        }
    }

    /// Convert one file, returning the new path
    pub fn convert_one(&mut self, file: &AudioFile) -> Result<PathBuf> {
        let out_dir = self.prepare_folder(file.dir()).ok_or_else(|| {
            TagfixError::write(file.path.display(), "output folder could not be created")
        })?;
        let output = out_dir.join(format!("{}.{}", file.stem(), self.target.extension()));

        match self.encoder.encode(&file.path, &output, self.target) {
            Ok(()) => {
                carry_tags(file, &output);
                self.stats.converted += 1;
                tracing::info!("Converted {:?} -> {:?}", file.path, output);
                Ok(output)
            }
            Err(e) => {
                self.stats.failed += 1;
                self.stats
                    .errors
                    .push(format!("{}: {}", file.file_name(), e));
                Err(e)
            }
        }
    }

    pub fn finish(self) -> ConversionStats {
        self.stats
    }
}

fn is_sidecar(path: &Path) -> bool {
    path.extension()
        .and_then(|e| e.to_str())
        .is_some_and(|e| SIDECAR_EXTENSIONS.contains(&e.to_ascii_lowercase().as_str()))
}

/// Copy text tags and the cover from `src` onto the file at `dst`
///
/// Failures are logged and otherwise ignored.
pub fn carry_tags(src: &AudioFile, dst: &Path) {
    if let Err(e) = try_carry_tags(src, dst) {
        tracing::warn!("Failed to copy tags to {:?}: {}", dst, e);
    }
}

fn try_carry_tags(src: &AudioFile, dst: &Path) -> Result<()> {
    let source = TagSession::open(src)?;
    let mut target = TagSession::open(&AudioFile::from_path(dst)?)?;

    for tag in TEXT_TAGS {
        if let Some(value) = source.get(*tag) {
            if let Err(e) = target.set(*tag, &value) {
                tracing::warn!("Failed to copy {} to {:?}: {}", tag, dst, e);
            }
        }
    }
    if let Some(cover) = source.get_cover() {
        target.set_cover(cover.data, &cover.mime)?;
    }
    target.save()
}

/// Re-encode a FLAC file in place, keeping its tags
pub fn reencode_flac(file: &AudioFile, encoder: &dyn Encoder) -> Result<()> {
    if file.format != AudioFormat::Flac {
        return Err(TagfixError::UnsupportedFormat(file.format.to_string()));
    }

    let temp = file.dir().join(format!(".{}.reencode.flac", file.stem()));
    if let Err(e) = encoder.encode(&file.path, &temp, TargetFormat::Flac) {
        let _ = fs::remove_file(&temp);
        return Err(e);
    }
    carry_tags(file, &temp);
    fs::rename(&temp, &file.path).map_err(|e| {
        let _ = fs::remove_file(&temp);
        TagfixError::write(file.path.display(), e)
    })?;
    tracing::info!("Re-encoded {:?}", file.path);
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::features::tags::CanonicalTag;
    use crate::test_support::write_silent_wav;
    use std::sync::Mutex;
    use tempfile::TempDir;

    /// Writes a fresh untagged WAV for every input
    struct SilentEncoder {
        calls: Mutex<Vec<PathBuf>>,
    }

    impl SilentEncoder {
        fn new() -> Arc<Self> {
            Arc::new(Self {
                calls: Mutex::new(Vec::new()),
            })
        }
    }

    impl Encoder for SilentEncoder {
        fn name(&self) -> &str {
            "silent"
        }

        fn encode(&self, input: &Path, output: &Path, _target: TargetFormat) -> Result<()> {
            self.calls.lock().unwrap().push(input.to_path_buf());
            if input.to_string_lossy().contains("broken") {
                return Err(TagfixError::write(output.display(), "encoder exploded"));
            }
            write_silent_wav(output);
            Ok(())
        }
    }

    fn tagged_wav(path: &Path, title: &str) -> AudioFile {
        write_silent_wav(path);
        let file = AudioFile::from_path(path).unwrap();
        let mut session = TagSession::open(&file).unwrap();
        session.set(CanonicalTag::Title, title).unwrap();
        session.set(CanonicalTag::Artist, "Artist").unwrap();
        session.set_cover(vec![0xFF, 0xD8, 0xFF, 0xE0], "image/jpeg").unwrap();
        session.save().unwrap();
        file
    }

    #[test]
    fn test_output_dir_name() {
        assert_eq!(
            output_dir(Path::new("/music/Album"), TargetFormat::Flac),
            PathBuf::from("/music/Album/Album - flac")
        );
    }

    #[test]
    fn test_capabilities() {
        let none = Capabilities::none();
        assert!(matches!(
            none.encoder_for(TargetFormat::Wav),
            Err(TagfixError::CapabilityMissing(_))
        ));

        let library_only = Capabilities {
            library_wav: true,
            ffmpeg: None,
        };
        assert_eq!(
            library_only.encoder_for(TargetFormat::Wav).unwrap().name(),
            "built-in"
        );
        assert!(!library_only.can_encode(TargetFormat::Flac));

        let with_ffmpeg = Capabilities {
            library_wav: true,
            ffmpeg: Some(FfmpegEncoder::new("ffmpeg")),
        };
        assert_eq!(with_ffmpeg.encoder_for(TargetFormat::Flac).unwrap().name(), "ffmpeg");
    }

    #[test]
    fn test_convert_copies_tags_and_sidecars() {
        let dir = TempDir::new().unwrap();
        let album = dir.path().join("Album");
        fs::create_dir(&album).unwrap();
        let a = tagged_wav(&album.join("01.wav"), "First");
        let b = tagged_wav(&album.join("02.wav"), "Second");
        fs::write(album.join("cover.jpg"), b"jpg").unwrap();
        fs::write(album.join("01.lrc"), b"[00:01.00]x").unwrap();
        fs::write(album.join("notes.nfo"), b"skip").unwrap();

        let mut converter = Converter::new(TargetFormat::Wav, SilentEncoder::new());
        for file in [&a, &b] {
            let output = converter.convert_one(file).unwrap();
            assert_eq!(output.file_stem(), file.path.file_stem());
        }

        let stats = converter.finish();
        assert_eq!(stats.converted, 2);
        assert_eq!(stats.copied, 2);
        assert_eq!(stats.failed, 0);

        let out = album.join("Album - wav");
        assert!(out.join("cover.jpg").exists());
        assert!(out.join("01.lrc").exists());
        assert!(!out.join("notes.nfo").exists());

        let converted = AudioFile::from_path(out.join("01.wav")).unwrap();
        let session = TagSession::open(&converted).unwrap();
        assert_eq!(session.get(CanonicalTag::Title), Some("First".to_string()));
        assert_eq!(session.get(CanonicalTag::Artist), Some("Artist".to_string()));
        assert_eq!(session.get_cover().unwrap().data, vec![0xFF, 0xD8, 0xFF, 0xE0]);
    }

    #[test]
    fn test_convert_counts_failures() {
        let dir = TempDir::new().unwrap();
        let good = tagged_wav(&dir.path().join("good.wav"), "Good");
        let broken = tagged_wav(&dir.path().join("broken.wav"), "Broken");

        let mut converter = Converter::new(TargetFormat::Flac, SilentEncoder::new());
        assert!(converter.convert_one(&good).is_ok());
        assert!(converter.convert_one(&broken).is_err());

        let stats = converter.finish();
        assert_eq!(stats.converted, 1);
        assert_eq!(stats.failed, 1);
        assert_eq!(stats.errors.len(), 1);
        assert!(stats.errors[0].contains("broken.wav"));
    }

    #[test]
    fn test_reencode_rejects_non_flac() {
        let dir = TempDir::new().unwrap();
        let wav = tagged_wav(&dir.path().join("a.wav"), "A");
        let encoder = SilentEncoder::new();
        assert!(matches!(
            reencode_flac(&wav, encoder.as_ref()),
            Err(TagfixError::UnsupportedFormat(_))
        ));
        assert!(encoder.calls.lock().unwrap().is_empty());
    }

    #[test]
    fn test_reencode_failure_keeps_original() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("broken.flac");
        fs::write(&path, b"original bytes").unwrap();
        let file = AudioFile::from_path(&path).unwrap();

        assert!(reencode_flac(&file, SilentEncoder::new().as_ref()).is_err());
        assert_eq!(fs::read(&path).unwrap(), b"original bytes");
        assert!(!dir.path().join(".broken.reencode.flac").exists());
    }
}
