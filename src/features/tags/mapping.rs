//! Canonical tag to native key table
//!
//! One row per canonical tag. lofty resolves its item keys to ID3 frames,
//! Vorbis fields and MP4 atoms; WMA attributes are named here directly.
//! `None` means the tag has no representation there.

use lofty::tag::ItemKey;

use crate::features::dispatch::AudioFormat;

use super::CanonicalTag;

/// Native tag layout shared by several container formats
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TagFamily {
    /// ID3v2 frames (MP3, WAV)
    Id3,
    /// Vorbis comments (FLAC, OGG, Opus)
    Vorbis,
    /// iTunes-style atoms (M4A)
    Mp4,
    /// ASF attributes (WMA)
    Asf,
}

impl TagFamily {
    pub fn of(format: AudioFormat) -> Self {
        match format {
            AudioFormat::Mp3 | AudioFormat::Wav => Self::Id3,
            AudioFormat::Flac | AudioFormat::Ogg | AudioFormat::Opus => Self::Vorbis,
            AudioFormat::M4a => Self::Mp4,
            AudioFormat::Wma => Self::Asf,
        }
    }
}

struct Row {
    tag: CanonicalTag,
    /// Key for every lofty-backed family; lofty maps it to the frame, field
    /// or atom of the tag type being written
    lofty: Option<ItemKey>,
    /// Companion total removed whenever a position is written
    lofty_total: Option<ItemKey>,
    asf: Option<&'static str>,
}

const TABLE: &[Row] = &[
    Row {
        tag: CanonicalTag::Title,
        lofty: Some(ItemKey::TrackTitle),
        lofty_total: None,
        asf: Some("Title"),
    },
    Row {
        tag: CanonicalTag::Artist,
        lofty: Some(ItemKey::TrackArtist),
        lofty_total: None,
        asf: Some("Author"),
    },
    Row {
        tag: CanonicalTag::Album,
        lofty: Some(ItemKey::AlbumTitle),
        lofty_total: None,
        asf: Some("WM/AlbumTitle"),
    },
    Row {
        tag: CanonicalTag::AlbumArtist,
        lofty: Some(ItemKey::AlbumArtist),
        lofty_total: None,
        asf: Some("WM/AlbumArtist"),
    },
    Row {
        tag: CanonicalTag::Genre,
        lofty: Some(ItemKey::Genre),
        lofty_total: None,
        asf: Some("WM/Genre"),
    },
    Row {
        tag: CanonicalTag::Date,
        lofty: Some(ItemKey::RecordingDate),
        lofty_total: None,
        asf: Some("WM/Year"),
    },
    Row {
        tag: CanonicalTag::TrackNumber,
        lofty: Some(ItemKey::TrackNumber),
        lofty_total: Some(ItemKey::TrackTotal),
        asf: Some("WM/TrackNumber"),
    },
    Row {
        tag: CanonicalTag::DiscNumber,
        lofty: Some(ItemKey::DiscNumber),
        lofty_total: Some(ItemKey::DiscTotal),
        asf: Some("WM/PartOfSet"),
    },
    Row {
        tag: CanonicalTag::Comment,
        lofty: Some(ItemKey::Comment),
        lofty_total: None,
        asf: Some("Description"),
    },
    Row {
        tag: CanonicalTag::Lyrics,
        lofty: Some(ItemKey::Lyrics),
        lofty_total: None,
        asf: None,
    },
    // Pictures live outside the text items in lofty
    Row {
        tag: CanonicalTag::Cover,
        lofty: None,
        lofty_total: None,
        asf: Some("WM/Picture"),
    },
];

fn row(tag: CanonicalTag) -> Option<&'static Row> {
    TABLE.iter().find(|row| row.tag == tag)
}

/// lofty item key of a text tag
pub fn lofty_key(tag: CanonicalTag) -> Option<ItemKey> {
    row(tag)?.lofty.clone()
}

/// lofty key of the total paired with a track or disc number
pub fn lofty_total_key(tag: CanonicalTag) -> Option<ItemKey> {
    row(tag)?.lofty_total.clone()
}

/// ASF attribute name, or `None` when WMA cannot store the tag
pub fn asf_attribute(tag: CanonicalTag) -> Option<&'static str> {
    row(tag)?.asf
}

/// Whether a format can store the tag at all
pub fn is_supported(format: AudioFormat, tag: CanonicalTag) -> bool {
    let Some(row) = row(tag) else {
        return false;
    };
    match TagFamily::of(format) {
        TagFamily::Asf => row.asf.is_some(),
        _ => tag == CanonicalTag::Cover || row.lofty.is_some(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_every_tag_has_a_row() {
        for tag in CanonicalTag::all() {
            assert!(TABLE.iter().any(|row| row.tag == *tag), "{tag} missing");
        }
    }

    #[test]
    fn test_keys() {
        assert_eq!(lofty_key(CanonicalTag::Album), Some(ItemKey::AlbumTitle));
        assert_eq!(lofty_key(CanonicalTag::Cover), None);
        assert_eq!(
            lofty_total_key(CanonicalTag::DiscNumber),
            Some(ItemKey::DiscTotal)
        );
        assert_eq!(lofty_total_key(CanonicalTag::Title), None);
        assert_eq!(asf_attribute(CanonicalTag::Artist), Some("Author"));
        assert_eq!(asf_attribute(CanonicalTag::Lyrics), None);
    }

    #[test]
    fn test_wma_has_no_lyrics() {
        assert!(!is_supported(AudioFormat::Wma, CanonicalTag::Lyrics));
        assert!(is_supported(AudioFormat::Wma, CanonicalTag::Cover));
        assert!(is_supported(AudioFormat::Wav, CanonicalTag::Lyrics));
    }
}
