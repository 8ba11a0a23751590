//! Canonical tag model and per-format adapters
//!
//! Every container format is reached through [`TagAdapter`]. The adapter for a
//! file is picked from a fixed table indexed by [`AudioFormat`], so call sites
//! never branch on extensions.

mod asf;
mod asf_container;
mod lofty_container;
mod mapping;

pub use asf_container::AsfContainer;
pub use lofty_container::LoftyContainer;
pub use mapping::is_supported;

use std::fmt;
use std::path::Path;
use std::str::FromStr;

use crate::error::{Result, TagfixError};
use crate::features::dispatch::{AudioFile, AudioFormat};

/// Format-independent tag names
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum CanonicalTag {
    Title,
    Artist,
    Album,
    AlbumArtist,
    Genre,
    Date,
    TrackNumber,
    DiscNumber,
    Comment,
    Lyrics,
    Cover,
}

/// Tags that may be set to one value across a whole batch
pub const GLOBAL_TAGS: &[CanonicalTag] = &[
    CanonicalTag::Artist,
    CanonicalTag::AlbumArtist,
    CanonicalTag::Album,
    CanonicalTag::Date,
    CanonicalTag::Genre,
];

/// Plain text tags, in the order they are copied during conversion
pub const TEXT_TAGS: &[CanonicalTag] = &[
    CanonicalTag::Title,
    CanonicalTag::Artist,
    CanonicalTag::Album,
    CanonicalTag::AlbumArtist,
    CanonicalTag::Date,
    CanonicalTag::Genre,
    CanonicalTag::Comment,
    CanonicalTag::TrackNumber,
    CanonicalTag::DiscNumber,
];

impl CanonicalTag {
    #[allow(dead_code)]
    pub fn all() -> &'static [CanonicalTag] {
        &[
            Self::Title,
            Self::Artist,
            Self::Album,
            Self::AlbumArtist,
            Self::Genre,
            Self::Date,
            Self::TrackNumber,
            Self::DiscNumber,
            Self::Comment,
            Self::Lyrics,
            Self::Cover,
        ]
    }

    /// Name used by the console menu and the CSV header
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Title => "title",
            Self::Artist => "artist",
            Self::Album => "album",
            Self::AlbumArtist => "albumartist",
            Self::Genre => "genre",
            Self::Date => "date",
            Self::TrackNumber => "tracknumber",
            Self::DiscNumber => "discnumber",
            Self::Comment => "comment",
            Self::Lyrics => "lyrics",
            Self::Cover => "cover",
        }
    }

    /// Human readable label
    pub fn label(&self) -> &'static str {
        match self {
            Self::Title => "Title",
            Self::Artist => "Artist",
            Self::Album => "Album",
            Self::AlbumArtist => "Album Artist",
            Self::Genre => "Genre",
            Self::Date => "Date",
            Self::TrackNumber => "Track Number",
            Self::DiscNumber => "Disc Number",
            Self::Comment => "Comment",
            Self::Lyrics => "Lyrics",
            Self::Cover => "Cover",
        }
    }

    pub fn is_global_eligible(&self) -> bool {
        GLOBAL_TAGS.contains(self)
    }

    /// Track and disc numbers only expose their first numeric component
    pub fn is_position(&self) -> bool {
        matches!(self, Self::TrackNumber | Self::DiscNumber)
    }
}

impl fmt::Display for CanonicalTag {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for CanonicalTag {
    type Err = TagfixError;

    fn from_str(s: &str) -> Result<Self> {
        let key = s.trim().to_ascii_lowercase().replace(['_', ' '], "");
        Self::all()
            .iter()
            .find(|tag| tag.as_str() == key)
            .copied()
            .ok_or_else(|| TagfixError::write(s, "unknown tag name"))
    }
}

/// An embedded picture
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CoverArt {
    pub data: Vec<u8>,
    pub mime: String,
}

/// Lifecycle of a parsed container
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ContainerState {
    /// Nothing read yet
    Unopened,
    /// Parsed, but the file carries no tag of the adapter's type
    OpenedNoTags,
    /// Parsed with a tag present
    OpenedWithTags,
}

/// Uniform access to one file's tag container
pub trait TagAdapter: Send {
    fn state(&self) -> ContainerState;

    /// Parse the file; moves out of [`ContainerState::Unopened`]
    fn load(&mut self) -> Result<()>;

    /// Create an empty tag when the file has none
    fn ensure_tags(&mut self) -> Result<()>;

    fn get(&self, tag: CanonicalTag) -> Option<String>;

    /// Set a text tag. On error the container is left unchanged.
    fn set(&mut self, tag: CanonicalTag, value: &str) -> Result<()>;

    /// First embedded picture
    fn get_cover(&self) -> Option<CoverArt>;

    /// Replace every picture with a single front cover
    fn set_cover(&mut self, data: Vec<u8>, mime: &str) -> Result<()>;

    fn save(&mut self) -> Result<()>;
}

type AdapterFactory = fn(&Path, AudioFormat) -> Box<dyn TagAdapter>;

fn lofty_adapter(path: &Path, format: AudioFormat) -> Box<dyn TagAdapter> {
    Box::new(LoftyContainer::new(path, format))
}

fn asf_adapter(path: &Path, _format: AudioFormat) -> Box<dyn TagAdapter> {
    Box::new(AsfContainer::new(path))
}

const ADAPTERS: &[(AudioFormat, AdapterFactory)] = &[
    (AudioFormat::Flac, lofty_adapter),
    (AudioFormat::Mp3, lofty_adapter),
    (AudioFormat::M4a, lofty_adapter),
    (AudioFormat::Ogg, lofty_adapter),
    (AudioFormat::Opus, lofty_adapter),
    (AudioFormat::Wav, lofty_adapter),
    (AudioFormat::Wma, asf_adapter),
];

/// Build an unopened adapter for a file
pub fn adapter_for(file: &AudioFile) -> Result<Box<dyn TagAdapter>> {
    ADAPTERS
        .iter()
        .find(|(format, _)| *format == file.format)
        .map(|(_, factory)| factory(&file.path, file.format))
        .ok_or_else(|| TagfixError::UnsupportedFormat(file.format.to_string()))
}

/// Open and parse a file's tag container
pub fn open(file: &AudioFile) -> Result<Box<dyn TagAdapter>> {
    let mut adapter = adapter_for(file)?;
    adapter.load()?;
    Ok(adapter)
}

/// Exclusive edit session on one file
pub struct TagSession {
    adapter: Box<dyn TagAdapter>,
    dirty: bool,
}

impl TagSession {
    pub fn open(file: &AudioFile) -> Result<Self> {
        Ok(Self {
            adapter: open(file)?,
            dirty: false,
        })
    }

    pub fn state(&self) -> ContainerState {
        self.adapter.state()
    }

    pub fn get(&self, tag: CanonicalTag) -> Option<String> {
        self.adapter.get(tag)
    }

    pub fn has(&self, tag: CanonicalTag) -> bool {
        match tag {
            CanonicalTag::Cover => self.adapter.get_cover().is_some(),
            _ => self.get(tag).is_some_and(|v| !v.is_empty()),
        }
    }

    pub fn set(&mut self, tag: CanonicalTag, value: &str) -> Result<()> {
        self.adapter.set(tag, value)?;
        self.dirty = true;
        Ok(())
    }

    pub fn get_cover(&self) -> Option<CoverArt> {
        self.adapter.get_cover()
    }

    pub fn set_cover(&mut self, data: Vec<u8>, mime: &str) -> Result<()> {
        self.adapter.set_cover(data, mime)?;
        self.dirty = true;
        Ok(())
    }

    /// Persist pending changes; a clean session is not rewritten
    pub fn save(&mut self) -> Result<()> {
        if self.dirty {
            self.adapter.save()?;
            self.dirty = false;
        }
        Ok(())
    }
}

/// Parse the first numeric component of a track or disc value ("3/12" -> 3)
pub fn parse_position(tag: CanonicalTag, value: &str) -> Result<u32> {
    let first = value.split('/').next().unwrap_or_default().trim();
    first
        .parse::<u32>()
        .map_err(|e| TagfixError::write(tag, format!("'{}' is not a number ({})", value, e)))
}

/// Normalize a stored track or disc value for display ("03/12" -> "3")
pub(crate) fn display_position(raw: &str) -> Option<String> {
    let first = raw.split('/').next()?.trim();
    if first.is_empty() {
        return None;
    }
    Some(
        first
            .parse::<u32>()
            .map(|n| n.to_string())
            .unwrap_or_else(|_| first.to_string()),
    )
}
