//! Tag adapter for WMA files
//!
//! Attributes are edited in an in-memory [`AsfHeader`]. Saving rewrites the
//! header in front of the untouched media data through a temporary sibling
//! file that replaces the original.

use std::fs;
use std::path::{Path, PathBuf};

use crate::error::{Result, TagfixError};

use super::asf::{AsfHeader, AsfPicture, AsfValue, PICTURE_ATTRIBUTE};
use super::lofty_container::COVER_DESCRIPTION;
use super::mapping::asf_attribute;
use super::{
    CanonicalTag, ContainerState, CoverArt, TagAdapter, display_position, parse_position,
};

/// Front cover in ID3/ASF picture type numbering
const FRONT_COVER: u8 = 3;

pub struct AsfContainer {
    path: PathBuf,
    state: ContainerState,
    header: Option<AsfHeader>,
}

impl AsfContainer {
    pub fn new(path: &Path) -> Self {
        Self {
            path: path.to_path_buf(),
            state: ContainerState::Unopened,
            header: None,
        }
    }

    fn header_mut(&mut self, tag: CanonicalTag) -> Result<&mut AsfHeader> {
        if self.state == ContainerState::Unopened {
            return Err(TagfixError::write(tag, "container is not opened"));
        }
        self.ensure_tags()?;
        self.header
            .as_mut()
            .ok_or_else(|| TagfixError::write(tag, "container is not opened"))
    }
}

impl TagAdapter for AsfContainer {
    fn state(&self) -> ContainerState {
        self.state
    }

    fn load(&mut self) -> Result<()> {
        let bytes = fs::read(&self.path)?;
        let header = AsfHeader::parse(&bytes).map_err(|e| TagfixError::parse(&self.path, e))?;
        self.state = if header.attributes.is_empty() {
            ContainerState::OpenedNoTags
        } else {
            ContainerState::OpenedWithTags
        };
        self.header = Some(header);
        tracing::debug!("Opened {:?} as {:?}", self.path, self.state);
        Ok(())
    }

    fn ensure_tags(&mut self) -> Result<()> {
        match self.state {
            ContainerState::Unopened => Err(TagfixError::parse(&self.path, "container is not opened")),
            ContainerState::OpenedWithTags => Ok(()),
            ContainerState::OpenedNoTags => {
                self.state = ContainerState::OpenedWithTags;
                Ok(())
            }
        }
    }

    fn get(&self, tag: CanonicalTag) -> Option<String> {
        let name = asf_attribute(tag)?;
        if tag == CanonicalTag::Cover {
            return None;
        }
        let raw = self.header.as_ref()?.get(name)?.as_text()?;
        if tag.is_position() {
            return display_position(&raw);
        }
        (!raw.is_empty()).then_some(raw)
    }

    fn set(&mut self, tag: CanonicalTag, value: &str) -> Result<()> {
        if tag == CanonicalTag::Cover {
            return Err(TagfixError::write(tag, "not a text tag"));
        }
        let Some(name) = asf_attribute(tag) else {
            tracing::debug!("WMA has no {} attribute, ignoring", tag);
            return Ok(());
        };
        let value = if tag.is_position() {
            AsfValue::Unicode(parse_position(tag, value)?.to_string())
        } else {
            AsfValue::Unicode(value.to_string())
        };
        self.header_mut(tag)?.set(name, value);
        Ok(())
    }

    fn get_cover(&self) -> Option<CoverArt> {
        let picture = self.header.as_ref()?.pictures().into_iter().next()?;
        Some(CoverArt {
            data: picture.data,
            mime: picture.mime,
        })
    }

    fn set_cover(&mut self, data: Vec<u8>, mime: &str) -> Result<()> {
        let picture = AsfPicture {
            pic_type: FRONT_COVER,
            mime: mime.to_string(),
            description: COVER_DESCRIPTION.to_string(),
            data,
        };
        let bytes = picture
            .to_bytes()
            .map_err(|e| TagfixError::write(CanonicalTag::Cover, e))?;
        self.header_mut(CanonicalTag::Cover)?
            .set(PICTURE_ATTRIBUTE, AsfValue::Bytes(bytes));
        Ok(())
    }

    fn save(&mut self) -> Result<()> {
        let Some(header) = self.header.as_ref() else {
            return Ok(());
        };

        let original = fs::read(&self.path)?;
        let start = usize::try_from(header.original_len())
            .ok()
            .filter(|len| *len <= original.len())
            .ok_or_else(|| TagfixError::parse(&self.path, "header length changed on disk"))?;
        let body = &original[start..];

        let mut output = header
            .to_bytes(body.len() as u64)
            .map_err(|e| TagfixError::write(self.path.display(), e))?;
        output.extend_from_slice(body);

        let temp = temp_sibling(&self.path);
        fs::write(&temp, &output)?;
        if let Err(e) = fs::rename(&temp, &self.path) {
            let _ = fs::remove_file(&temp);
            return Err(TagfixError::write(self.path.display(), e));
        }

        // Later saves must skip the header that is now on disk
        self.header = Some(
            AsfHeader::parse(&output).map_err(|e| TagfixError::parse(&self.path, e))?,
        );
        tracing::debug!("Saved tags to {:?}", self.path);
        Ok(())
    }
}

fn temp_sibling(path: &Path) -> PathBuf {
    let name = path
        .file_name()
        .map(|n| n.to_string_lossy().into_owned())
        .unwrap_or_default();
    path.with_file_name(format!(".{}.tagfix-tmp", name))
}
