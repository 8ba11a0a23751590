//! Lyrics files and embedded lyrics
//!
//! - Finding `.lrc`/`.txt` files in a folder tree and searching them by name
//! - Embedding file contents into audio tags
//! - Copying lyrics files next to audio files and extracting embedded lyrics

mod encoding;

pub use encoding::{contains_hangul, decode_string};

use std::fs;
use std::path::{Path, PathBuf};

use walkdir::WalkDir;

use crate::error::{Result, TagfixError};
use crate::features::dispatch::AudioFile;
use crate::features::tags::{CanonicalTag, TagSession};

/// Lyrics file extensions
pub const LYRICS_EXTENSIONS: &[&str] = &["lrc", "txt"];

/// How a file's embedded lyrics are stored
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LyricsStatus {
    None,
    Unsynced,
    /// At least one line starts with an LRC timestamp
    Synced,
}

impl LyricsStatus {
    pub fn of(lyrics: Option<&str>) -> Self {
        match lyrics {
            None => Self::None,
            Some(text) if text.trim().is_empty() => Self::None,
            Some(text) if is_synced(text) => Self::Synced,
            Some(_) => Self::Unsynced,
        }
    }

    pub fn label(&self) -> &'static str {
        match self {
            Self::None => "None",
            Self::Unsynced => "Unsynced",
            Self::Synced => "Synced",
        }
    }
}

/// Parse timestamp from LRC format: [mm:ss.xx] or [mm:ss:xx]
///
/// Returns the milliseconds. Metadata tags like `[ar:Artist]` are not timestamps.
pub fn parse_time(src: &str) -> Option<u64> {
    let inner = src.strip_prefix('[')?;
    let time_str = &inner[..inner.find(']')?];

    let parts: Vec<&str> = time_str.split([':', '.']).collect();
    let (min, sec, frac) = match parts.as_slice() {
        [min, sec] => (*min, *sec, None),
        [min, sec, frac] => (*min, *sec, Some(*frac)),
        _ => return None,
    };

    let min: u64 = min.parse().ok()?;
    let sec: u64 = sec.parse().ok()?;
    let ms = match frac {
        None => 0,
        Some(f) => {
            let value: u64 = f.parse().ok()?;
            match f.len() {
                1 => value * 100,
                2 => value * 10,
                3 => value,
                _ => return None,
            }
        }
    };
    Some(min * 60_000 + sec * 1000 + ms)
}

fn is_synced(text: &str) -> bool {
    text.lines().any(|line| parse_time(line.trim_start()).is_some())
}

fn is_lyrics_file(path: &Path) -> bool {
    path.extension()
        .and_then(|e| e.to_str())
        .is_some_and(|e| LYRICS_EXTENSIONS.contains(&e.to_ascii_lowercase().as_str()))
}

/// All lyrics files below `dir`, sorted
pub fn find_lyrics_files(dir: &Path) -> Result<Vec<PathBuf>> {
    if !dir.is_dir() {
        return Err(TagfixError::NotFound(dir.to_path_buf()));
    }

    let mut files: Vec<PathBuf> = WalkDir::new(dir)
        .follow_links(true)
        .into_iter()
        .filter_map(|e| e.ok())
        .filter(|e| e.file_type().is_file())
        .map(|e| e.into_path())
        .filter(|p| is_lyrics_file(p))
        .collect();
    files.sort_by(|a, b| a.as_os_str().cmp(b.as_os_str()));
    Ok(files)
}

/// Files whose name contains `term`, ignoring case
pub fn search_lyrics_files(files: &[PathBuf], term: &str) -> Vec<PathBuf> {
    let term = term.trim().to_lowercase();
    files
        .iter()
        .filter(|p| {
            p.file_name()
                .is_some_and(|n| n.to_string_lossy().to_lowercase().contains(&term))
        })
        .cloned()
        .collect()
}

pub fn read_lyrics_file(path: &Path) -> Result<String> {
    if !path.exists() {
        return Err(TagfixError::NotFound(path.to_path_buf()));
    }
    Ok(decode_string(&fs::read(path)?))
}

pub fn get_lyrics(file: &AudioFile) -> Result<Option<String>> {
    Ok(TagSession::open(file)?.get(CanonicalTag::Lyrics))
}

pub fn embed_lyrics(file: &AudioFile, text: &str) -> Result<()> {
    let mut session = TagSession::open(file)?;
    session.set(CanonicalTag::Lyrics, text)?;
    session.save()
}

/// Copy a lyrics file next to an audio file as `<audio stem>.<lyrics ext>`
pub fn copy_lyrics_for(lyrics_path: &Path, audio: &AudioFile) -> Result<PathBuf> {
    if !lyrics_path.exists() {
        return Err(TagfixError::NotFound(lyrics_path.to_path_buf()));
    }
    let ext = lyrics_path
        .extension()
        .map(|e| e.to_string_lossy().into_owned())
        .unwrap_or_else(|| "lrc".to_string());
    let target = audio.dir().join(format!("{}.{}", audio.stem(), ext));
    if target != lyrics_path {
        fs::copy(lyrics_path, &target)?;
    }
    Ok(target)
}

/// Write embedded lyrics to `<stem>.lrc` next to the audio file
///
/// Returns `None` when the file has no lyrics.
pub fn extract_lyrics_to_file(audio: &AudioFile) -> Result<Option<PathBuf>> {
    let Some(lyrics) = get_lyrics(audio)? else {
        return Ok(None);
    };
    let target = audio.dir().join(format!("{}.lrc", audio.stem()));
    fs::write(&target, lyrics)?;
    tracing::info!("Extracted lyrics to {:?}", target);
    Ok(Some(target))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::test_support::write_silent_wav;
    use tempfile::TempDir;

    #[test]
    fn test_parse_time() {
        assert_eq!(parse_time("[01:02.50]line"), Some(62_500));
        assert_eq!(parse_time("[00:10]"), Some(10_000));
        assert_eq!(parse_time("[00:01.123]"), Some(1_123));
        assert_eq!(parse_time("[ar:Someone]"), None);
        assert_eq!(parse_time("plain text"), None);
    }

    #[test]
    fn test_lyrics_status() {
        assert_eq!(LyricsStatus::of(None), LyricsStatus::None);
        assert_eq!(LyricsStatus::of(Some("  ")), LyricsStatus::None);
        assert_eq!(LyricsStatus::of(Some("just words")), LyricsStatus::Unsynced);
        assert_eq!(
            LyricsStatus::of(Some("[ti:Song]\n[00:12.00]words")),
            LyricsStatus::Synced
        );
    }

    #[test]
    fn test_find_and_search() {
        let dir = TempDir::new().unwrap();
        fs::create_dir(dir.path().join("sub")).unwrap();
        for name in ["b.lrc", "A Song.TXT", "sub/other song.lrc", "cover.jpg"] {
            fs::write(dir.path().join(name), "x").unwrap();
        }

        let files = find_lyrics_files(dir.path()).unwrap();
        assert_eq!(files.len(), 3);
        assert!(files.windows(2).all(|w| w[0].as_os_str() <= w[1].as_os_str()));

        let found = search_lyrics_files(&files, "SONG");
        assert_eq!(found.len(), 2);

        assert!(matches!(
            find_lyrics_files(&dir.path().join("missing")),
            Err(TagfixError::NotFound(_))
        ));
    }

    #[test]
    fn test_find_orders_by_full_path_string() {
        let dir = TempDir::new().unwrap();
        for folder in ["a", "a b"] {
            fs::create_dir(dir.path().join(folder)).unwrap();
            fs::write(dir.path().join(folder).join("x.lrc"), "x").unwrap();
        }

        let files = find_lyrics_files(dir.path()).unwrap();
        assert_eq!(
            files,
            vec![dir.path().join("a b/x.lrc"), dir.path().join("a/x.lrc")]
        );
    }

    #[test]
    fn test_embed_copy_and_extract() {
        let dir = TempDir::new().unwrap();
        let audio_path = dir.path().join("track.wav");
        write_silent_wav(&audio_path);
        let audio = AudioFile::from_path(&audio_path).unwrap();

        assert_eq!(extract_lyrics_to_file(&audio).unwrap(), None);

        let source = dir.path().join("downloaded.lrc");
        fs::write(&source, "[00:01.00]hello").unwrap();
        let copied = copy_lyrics_for(&source, &audio).unwrap();
        assert_eq!(copied, dir.path().join("track.lrc"));

        let text = read_lyrics_file(&copied).unwrap();
        embed_lyrics(&audio, &text).unwrap();
        assert_eq!(get_lyrics(&audio).unwrap(), Some("[00:01.00]hello".to_string()));

        fs::remove_file(&copied).unwrap();
        let extracted = extract_lyrics_to_file(&audio).unwrap().unwrap();
        assert_eq!(fs::read_to_string(extracted).unwrap(), "[00:01.00]hello");
    }
}
