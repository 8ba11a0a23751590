//! Format dispatch for user-supplied paths
//!
//! Handles:
//! - Input path normalization (quotes, `~`, relative paths)
//! - Extension based format detection
//! - Recursive folder scanning in deterministic order

use std::fmt;
use std::path::{Path, PathBuf};

use walkdir::WalkDir;

use crate::error::{Result, TagfixError};

/// Supported audio file extensions
pub const SUPPORTED_EXTENSIONS: &[&str] = &["flac", "mp3", "m4a", "ogg", "opus", "wma", "wav"];

/// Container format of an audio file, fixed at resolution time
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum AudioFormat {
    Flac,
    Mp3,
    M4a,
    Ogg,
    Opus,
    Wma,
    Wav,
}

impl AudioFormat {
    #[allow(dead_code)]
    pub fn all() -> &'static [AudioFormat] {
        &[
            AudioFormat::Flac,
            AudioFormat::Mp3,
            AudioFormat::M4a,
            AudioFormat::Ogg,
            AudioFormat::Opus,
            AudioFormat::Wma,
            AudioFormat::Wav,
        ]
    }

    /// Detect the format from a file extension (case-insensitive)
    pub fn from_extension(ext: &str) -> Option<Self> {
        match ext.to_ascii_lowercase().as_str() {
            "flac" => Some(Self::Flac),
            "mp3" => Some(Self::Mp3),
            "m4a" => Some(Self::M4a),
            "ogg" => Some(Self::Ogg),
            "opus" => Some(Self::Opus),
            "wma" => Some(Self::Wma),
            "wav" => Some(Self::Wav),
            _ => None,
        }
    }

    pub fn from_path(path: &Path) -> Option<Self> {
        path.extension()
            .and_then(|ext| ext.to_str())
            .and_then(Self::from_extension)
    }

    pub fn extension(&self) -> &'static str {
        match self {
            Self::Flac => "flac",
            Self::Mp3 => "mp3",
            Self::M4a => "m4a",
            Self::Ogg => "ogg",
            Self::Opus => "opus",
            Self::Wma => "wma",
            Self::Wav => "wav",
        }
    }
}

impl fmt::Display for AudioFormat {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.extension().to_uppercase())
    }
}

/// A resolved audio file: absolute path plus its format
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct AudioFile {
    pub path: PathBuf,
    pub format: AudioFormat,
}

impl AudioFile {
    /// Build from a path that is already known to be absolute and existing
    pub fn from_path(path: impl Into<PathBuf>) -> Result<Self> {
        let path = path.into();
        let format = AudioFormat::from_path(&path)
            .ok_or_else(|| TagfixError::UnsupportedFormat(extension_label(&path)))?;
        Ok(Self { path, format })
    }

    pub fn file_name(&self) -> String {
        self.path
            .file_name()
            .map(|n| n.to_string_lossy().into_owned())
            .unwrap_or_default()
    }

    pub fn stem(&self) -> String {
        self.path
            .file_stem()
            .map(|n| n.to_string_lossy().into_owned())
            .unwrap_or_default()
    }

    pub fn dir(&self) -> &Path {
        self.path.parent().unwrap_or_else(|| Path::new("."))
    }
}

fn extension_label(path: &Path) -> String {
    path.extension()
        .map(|e| format!(".{}", e.to_string_lossy()))
        .unwrap_or_else(|| path.display().to_string())
}

/// Check if a path has a supported audio extension
pub fn is_audio_file(path: &Path) -> bool {
    AudioFormat::from_path(path).is_some()
}

/// Strip quotes and whitespace, expand `~`, and make the path absolute
///
/// Handles drag-and-drop input such as `'/music/My Album'` or `"~/Music"`.
pub fn normalize_input_path(input: &str) -> PathBuf {
    let trimmed = input
        .trim()
        .trim_matches('"')
        .trim_matches('\'')
        .trim();
    if trimmed.is_empty() {
        return PathBuf::new();
    }

    let expanded = expand_tilde(trimmed);
    std::path::absolute(&expanded).unwrap_or(expanded)
}

fn expand_tilde(path: &str) -> PathBuf {
    if path == "~" {
        if let Some(home) = dirs::home_dir() {
            return home;
        }
    } else if let Some(rest) = path.strip_prefix("~/") {
        if let Some(home) = dirs::home_dir() {
            return home.join(rest);
        }
    }
    PathBuf::from(path)
}

/// Resolve a single file path to an [`AudioFile`]
pub fn resolve(input: &str) -> Result<AudioFile> {
    let path = normalize_input_path(input);
    if !path.exists() {
        return Err(TagfixError::NotFound(path));
    }
    AudioFile::from_path(path)
}

/// Resolve a file or folder to the list of audio files it names
///
/// Folders are scanned recursively and returned sorted by full path.
pub fn resolve_targets(input: &str) -> Result<Vec<AudioFile>> {
    let path = normalize_input_path(input);
    if !path.exists() {
        return Err(TagfixError::NotFound(path));
    }

    if path.is_dir() {
        let files = discover_audio_files(&path)
            .into_iter()
            .filter_map(|p| AudioFile::from_path(p).ok())
            .collect();
        return Ok(files);
    }

    Ok(vec![resolve(input)?])
}

/// Scan a directory for audio files
///
/// Returns every supported file below `root`, sorted by the full path string
/// so `a b/x.mp3` comes before `a/x.mp3`
pub fn discover_audio_files(root: &Path) -> Vec<PathBuf> {
    let mut files: Vec<PathBuf> = WalkDir::new(root)
        .follow_links(true)
        .into_iter()
        .filter_map(|e| match e {
            Ok(entry) => Some(entry),
            Err(err) => {
                tracing::warn!("Skipping unreadable entry: {}", err);
                None
            }
        })
        .filter(|e| e.file_type().is_file())
        .map(|e| e.into_path())
        .filter(|p| is_audio_file(p))
        .collect();

    files.sort_by(|a, b| a.as_os_str().cmp(b.as_os_str()));
    files
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::fs;
    use tempfile::TempDir;

    #[test]
    fn test_format_from_extension_case_insensitive() {
        assert_eq!(AudioFormat::from_extension("FLAC"), Some(AudioFormat::Flac));
        assert_eq!(AudioFormat::from_extension("Mp3"), Some(AudioFormat::Mp3));
        assert_eq!(AudioFormat::from_extension("aac"), None);
    }

    #[test]
    fn test_normalize_strips_quotes_and_whitespace() {
        let path = normalize_input_path("  '/music/My Album'  ");
        assert_eq!(path, PathBuf::from("/music/My Album"));

        let path = normalize_input_path("\"/music/x.mp3\"");
        assert_eq!(path, PathBuf::from("/music/x.mp3"));
    }

    #[test]
    fn test_normalize_makes_absolute() {
        let path = normalize_input_path("some/relative.flac");
        assert!(path.is_absolute());
        assert!(path.ends_with("some/relative.flac"));
    }

    #[test]
    fn test_normalize_expands_tilde() {
        if let Some(home) = dirs::home_dir() {
            assert_eq!(normalize_input_path("~/Music"), home.join("Music"));
        }
    }

    #[test]
    fn test_normalize_empty() {
        assert_eq!(normalize_input_path("   "), PathBuf::new());
    }

    #[test]
    fn test_resolve_missing_path() {
        let err = resolve_targets("/definitely/not/here").unwrap_err();
        assert!(matches!(err, TagfixError::NotFound(_)));
    }

    #[test]
    fn test_resolve_unsupported_file() {
        let dir = TempDir::new().unwrap();
        let notes = dir.path().join("notes.txt");
        fs::write(&notes, "hello").unwrap();

        let err = resolve(notes.to_str().unwrap()).unwrap_err();
        assert!(matches!(err, TagfixError::UnsupportedFormat(_)));
    }

    #[test]
    fn test_scan_filters_and_sorts() {
        let dir = TempDir::new().unwrap();
        fs::create_dir(dir.path().join("disc2")).unwrap();
        for name in ["b.flac", "a.mp3", "cover.jpg", "notes.txt", "disc2/c.OGG", "x.aac"] {
            fs::write(dir.path().join(name), b"data").unwrap();
        }

        let files = resolve_targets(dir.path().to_str().unwrap()).unwrap();
        let names: Vec<_> = files
            .iter()
            .map(|f| f.path.strip_prefix(dir.path()).unwrap().to_path_buf())
            .collect();

        assert_eq!(
            names,
            vec![
                PathBuf::from("a.mp3"),
                PathBuf::from("b.flac"),
                PathBuf::from("disc2/c.OGG"),
            ]
        );
        assert_eq!(files[2].format, AudioFormat::Ogg);
    }

    #[test]
    fn test_scan_orders_by_full_path_string() {
        let dir = TempDir::new().unwrap();
        for folder in ["a", "a b", "a-c"] {
            fs::create_dir(dir.path().join(folder)).unwrap();
            fs::write(dir.path().join(folder).join("x.mp3"), b"data").unwrap();
        }

        let names: Vec<_> = discover_audio_files(dir.path())
            .iter()
            .map(|p| p.strip_prefix(dir.path()).unwrap().to_path_buf())
            .collect();
        assert_eq!(
            names,
            vec![
                PathBuf::from("a b/x.mp3"),
                PathBuf::from("a-c/x.mp3"),
                PathBuf::from("a/x.mp3"),
            ]
        );
    }

    #[test]
    fn test_resolve_single_file() {
        let dir = TempDir::new().unwrap();
        let song = dir.path().join("song.wav");
        fs::write(&song, b"RIFF").unwrap();

        let files = resolve_targets(song.to_str().unwrap()).unwrap();
        assert_eq!(files.len(), 1);
        assert_eq!(files[0].format, AudioFormat::Wav);
        assert_eq!(files[0].stem(), "song");
    }
}
