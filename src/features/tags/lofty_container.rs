//! Tag adapter for the formats lofty can read and write
//!
//! FLAC, OGG and Opus use Vorbis comments, M4A uses iTunes atoms, MP3 and WAV
//! use ID3v2. Only the tag of the format's own type is read or written.

use std::path::{Path, PathBuf};

use lofty::config::WriteOptions;
use lofty::file::TaggedFileExt;
use lofty::picture::{MimeType, Picture, PictureType};
use lofty::probe::Probe;
use lofty::tag::{ItemValue, Tag, TagExt, TagItem, TagType};

use crate::error::{Result, TagfixError};
use crate::features::dispatch::AudioFormat;

use super::mapping::{TagFamily, lofty_key, lofty_total_key};
use super::{
    CanonicalTag, ContainerState, CoverArt, TagAdapter, display_position, parse_position,
};

/// Description stored with every embedded cover
pub const COVER_DESCRIPTION: &str = "Cover";

/// Language written to ID3 comment and lyrics frames
const ID3_LANGUAGE: [u8; 3] = *b"eng";

pub struct LoftyContainer {
    path: PathBuf,
    family: TagFamily,
    tag_type: TagType,
    state: ContainerState,
    tag: Option<Tag>,
}

impl LoftyContainer {
    pub fn new(path: &Path, format: AudioFormat) -> Self {
        Self {
            path: path.to_path_buf(),
            family: TagFamily::of(format),
            tag_type: tag_type_for(format),
            state: ContainerState::Unopened,
            tag: None,
        }
    }

    fn require_open(&self, tag: CanonicalTag) -> Result<()> {
        if self.state == ContainerState::Unopened {
            return Err(TagfixError::write(tag, "container is not opened"));
        }
        Ok(())
    }

    fn tag_mut(&mut self) -> Result<&mut Tag> {
        self.ensure_tags()?;
        let path = self.path.clone();
        self.tag
            .as_mut()
            .ok_or_else(|| TagfixError::parse(path, "tag missing after creation"))
    }
}

/// Tag type written for each lofty-backed format
pub fn tag_type_for(format: AudioFormat) -> TagType {
    match format {
        AudioFormat::Mp3 | AudioFormat::Wav => TagType::Id3v2,
        AudioFormat::M4a => TagType::Mp4Ilst,
        _ => TagType::VorbisComments,
    }
}

/// Read a canonical text tag from a lofty tag
pub(crate) fn read_text(tag: &Tag, canonical: CanonicalTag) -> Option<String> {
    let key = lofty_key(canonical)?;
    let raw = tag.get_string(&key)?;
    if canonical.is_position() {
        return display_position(raw);
    }
    (!raw.is_empty()).then(|| raw.to_string())
}

/// Write a canonical text tag into a lofty tag
///
/// Track and disc numbers are validated before anything is touched and are
/// stored without a total.
pub(crate) fn write_text(
    tag: &mut Tag,
    family: TagFamily,
    canonical: CanonicalTag,
    value: &str,
) -> Result<()> {
    let key = lofty_key(canonical)
        .ok_or_else(|| TagfixError::write(canonical, "not a text tag"))?;

    let value = if canonical.is_position() {
        parse_position(canonical, value)?.to_string()
    } else {
        value.to_string()
    };

    let needs_language = family == TagFamily::Id3
        && matches!(canonical, CanonicalTag::Comment | CanonicalTag::Lyrics);

    let inserted = if needs_language {
        let mut item = TagItem::new(key, ItemValue::Text(value));
        item.set_lang(ID3_LANGUAGE);
        item.set_description(String::new());
        tag.insert(item)
    } else {
        tag.insert_text(key, value)
    };

    if !inserted {
        return Err(TagfixError::write(
            canonical,
            format!("not supported by {:?}", tag.tag_type()),
        ));
    }

    if let Some(total) = lofty_total_key(canonical) {
        tag.remove_key(&total);
    }
    Ok(())
}

pub(crate) fn read_cover(tag: &Tag) -> Option<CoverArt> {
    let picture = tag.pictures().first()?;
    Some(CoverArt {
        data: picture.data().to_vec(),
        mime: picture
            .mime_type()
            .map(|m| m.as_str().to_string())
            .unwrap_or_else(|| "image/jpeg".to_string()),
    })
}

pub(crate) fn write_cover(tag: &mut Tag, data: Vec<u8>, mime: &str) {
    while tag.picture_count() > 0 {
        tag.remove_picture(0);
    }
    tag.push_picture(Picture::new_unchecked(
        PictureType::CoverFront,
        Some(MimeType::from_str(mime)),
        Some(COVER_DESCRIPTION.to_string()),
        data,
    ));
}

impl TagAdapter for LoftyContainer {
    fn state(&self) -> ContainerState {
        self.state
    }

    fn load(&mut self) -> Result<()> {
        let tagged_file = Probe::open(&self.path)
            .and_then(|probe| probe.read())
            .map_err(|e| TagfixError::parse(&self.path, e))?;

        self.tag = tagged_file.tag(self.tag_type).cloned();
        self.state = if self.tag.is_some() {
            ContainerState::OpenedWithTags
        } else {
            ContainerState::OpenedNoTags
        };
        tracing::debug!("Opened {:?} as {:?}", self.path, self.state);
        Ok(())
    }

    fn ensure_tags(&mut self) -> Result<()> {
        match self.state {
            ContainerState::Unopened => Err(TagfixError::parse(&self.path, "container is not opened")),
            ContainerState::OpenedWithTags => Ok(()),
            ContainerState::OpenedNoTags => {
                self.tag = Some(Tag::new(self.tag_type));
                self.state = ContainerState::OpenedWithTags;
                Ok(())
            }
        }
    }

    fn get(&self, tag: CanonicalTag) -> Option<String> {
        read_text(self.tag.as_ref()?, tag)
    }

    fn set(&mut self, tag: CanonicalTag, value: &str) -> Result<()> {
        self.require_open(tag)?;
        if tag.is_position() {
            parse_position(tag, value)?;
        }
        let family = self.family;
        write_text(self.tag_mut()?, family, tag, value)
    }

    fn get_cover(&self) -> Option<CoverArt> {
        read_cover(self.tag.as_ref()?)
    }

    fn set_cover(&mut self, data: Vec<u8>, mime: &str) -> Result<()> {
        self.require_open(CanonicalTag::Cover)?;
        write_cover(self.tag_mut()?, data, mime);
        Ok(())
    }

    fn save(&mut self) -> Result<()> {
        let Some(tag) = self.tag.as_ref() else {
            return Ok(());
        };
        tag.save_to_path(&self.path, WriteOptions::default())
            .map_err(|e| TagfixError::write(self.path.display(), e))?;
        tracing::debug!("Saved tags to {:?}", self.path);
        Ok(())
    }
}
