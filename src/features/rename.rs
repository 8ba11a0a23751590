//! Pattern based file renaming
//!
//! Patterns use tag placeholders such as `{tracknumber} - {title}`. The
//! original extension is always kept.

use std::fs;
use std::path::{Path, PathBuf};

use crate::error::{Result, TagfixError};
use crate::features::dispatch::AudioFile;
use crate::features::tags::{CanonicalTag, TagSession};

/// Tags usable as `{placeholder}` in a pattern
pub const PLACEHOLDERS: &[CanonicalTag] = &[
    CanonicalTag::Title,
    CanonicalTag::Artist,
    CanonicalTag::Album,
    CanonicalTag::AlbumArtist,
    CanonicalTag::Genre,
    CanonicalTag::Date,
    CanonicalTag::TrackNumber,
    CanonicalTag::DiscNumber,
];

pub const DEFAULT_PATTERN: &str = "{tracknumber} - {title}";

/// Shown for placeholders whose tag is missing
const MISSING_VALUE: &str = "Unknown";

const ILLEGAL_CHARS: &[char] = &['/', '\\', ':', '*', '?', '"', '<', '>', '|'];

/// Replace characters that are not allowed in file names
pub fn sanitize_filename(name: &str) -> String {
    name.chars()
        .map(|c| if ILLEGAL_CHARS.contains(&c) || c.is_control() { '_' } else { c })
        .collect::<String>()
        .trim()
        .to_string()
}

fn pad_position(value: &str) -> String {
    match value.trim().parse::<u32>() {
        Ok(n) => format!("{:02}", n),
        Err(_) => value.to_string(),
    }
}

/// Expand a pattern into a file name without extension
pub fn format_name(pattern: &str, lookup: impl Fn(CanonicalTag) -> Option<String>) -> String {
    let mut name = pattern.to_string();
    for tag in PLACEHOLDERS {
        let placeholder = format!("{{{}}}", tag.as_str());
        if !name.contains(&placeholder) {
            continue;
        }
        let value = lookup(*tag)
            .filter(|v| !v.trim().is_empty())
            .map(|v| if tag.is_position() { pad_position(&v) } else { v })
            .unwrap_or_else(|| MISSING_VALUE.to_string());
        name = name.replace(&placeholder, &value);
    }
    sanitize_filename(&name)
}

/// New file name (with extension) for a file under a pattern
pub fn preview_name(file: &AudioFile, pattern: &str) -> Result<String> {
    let session = TagSession::open(file)?;
    let stem = format_name(pattern, |tag| session.get(tag));
    if stem.is_empty() {
        return Err(TagfixError::write("filename", "pattern produced an empty name"));
    }
    Ok(format!("{}.{}", stem, extension_of(&file.path)))
}

fn extension_of(path: &Path) -> String {
    path.extension()
        .map(|e| e.to_string_lossy().into_owned())
        .unwrap_or_default()
}

/// Rename a file inside its folder
///
/// The old extension is appended when `new_name` has none. Existing files are
/// never overwritten.
pub fn rename_audio_file(old: &Path, new_name: &str) -> Result<PathBuf> {
    if !old.exists() {
        return Err(TagfixError::NotFound(old.to_path_buf()));
    }

    let mut name = sanitize_filename(new_name);
    if name.is_empty() {
        return Err(TagfixError::write("filename", "empty file name"));
    }
    if Path::new(&name).extension().is_none() {
        let ext = extension_of(old);
        if !ext.is_empty() {
            name = format!("{}.{}", name, ext);
        }
    }

    let dir = old.parent().unwrap_or_else(|| Path::new("."));
    let target = dir.join(&name);
    if target == old {
        return Ok(target);
    }
    if target.exists() {
        return Err(TagfixError::write(
            "filename",
            format!("'{}' already exists", name),
        ));
    }

    fs::rename(old, &target)?;
    tracing::info!("Renamed {:?} -> {:?}", old, target);
    Ok(target)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::test_support::write_silent_wav;
    use tempfile::TempDir;

    #[test]
    fn test_sanitize() {
        assert_eq!(sanitize_filename("AC/DC: Back?"), "AC_DC_ Back_");
        assert_eq!(sanitize_filename("  plain  "), "plain");
    }

    #[test]
    fn test_format_name_pads_and_fills() {
        let name = format_name("{discnumber}-{tracknumber} {artist} - {title}", |tag| match tag {
            CanonicalTag::TrackNumber => Some("3".to_string()),
            CanonicalTag::DiscNumber => Some("1".to_string()),
            CanonicalTag::Title => Some("Who <Me>".to_string()),
            _ => None,
        });
        assert_eq!(name, "01-03 Unknown - Who _Me_");
    }

    #[test]
    fn test_rename_keeps_extension() {
        let dir = TempDir::new().unwrap();
        let old = dir.path().join("track01.mp3");
        fs::write(&old, b"x").unwrap();

        let new = rename_audio_file(&old, "Intro").unwrap();
        assert_eq!(new, dir.path().join("Intro.mp3"));
        assert!(new.exists());
        assert!(!old.exists());
    }

    #[test]
    fn test_rename_refuses_to_overwrite() {
        let dir = TempDir::new().unwrap();
        let a = dir.path().join("a.flac");
        let b = dir.path().join("b.flac");
        fs::write(&a, b"a").unwrap();
        fs::write(&b, b"b").unwrap();

        assert!(matches!(
            rename_audio_file(&a, "b"),
            Err(TagfixError::WriteFailure { .. })
        ));
        assert_eq!(fs::read(&b).unwrap(), b"b");
        assert_eq!(rename_audio_file(&a, "a.flac").unwrap(), a);
    }

    #[test]
    fn test_preview_name_from_tags() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("x.wav");
        write_silent_wav(&path);
        let file = AudioFile::from_path(&path).unwrap();
        let mut session = TagSession::open(&file).unwrap();
        session.set(CanonicalTag::Title, "Song").unwrap();
        session.set(CanonicalTag::TrackNumber, "7").unwrap();
        session.save().unwrap();

        assert_eq!(preview_name(&file, DEFAULT_PATTERN).unwrap(), "07 - Song.wav");
    }
}
