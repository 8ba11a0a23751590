//! MusicBrainz search and Cover Art Archive images

use serde::Deserialize;

pub const RELEASE_URL: &str = "https://musicbrainz.org/ws/2/release";
pub const RECORDING_URL: &str = "https://musicbrainz.org/ws/2/recording";
pub const COVER_ART_URL: &str = "https://coverartarchive.org/release";

#[derive(Debug, Deserialize)]
pub struct ReleaseSearch {
    #[serde(default)]
    pub releases: Vec<Release>,
}

#[derive(Debug, Deserialize)]
pub struct Release {
    pub id: String,
    pub title: Option<String>,
    pub date: Option<String>,
    #[serde(rename = "artist-credit", default)]
    pub artist_credit: Vec<ArtistCredit>,
}

#[derive(Debug, Deserialize)]
pub struct ArtistCredit {
    pub name: String,
    #[serde(default)]
    pub joinphrase: String,
}

#[derive(Debug, Deserialize)]
pub struct RecordingSearch {
    #[serde(default)]
    pub recordings: Vec<Recording>,
}

#[derive(Debug, Deserialize)]
pub struct Recording {
    pub title: String,
    #[serde(rename = "first-release-date")]
    pub first_release_date: Option<String>,
    #[serde(rename = "artist-credit", default)]
    pub artist_credit: Vec<ArtistCredit>,
    #[serde(default)]
    pub releases: Vec<Release>,
}

/// Album details for a recording found by title and artist
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RecordingMatch {
    pub title: String,
    pub artist: Option<String>,
    pub album: Option<String>,
    pub album_artist: Option<String>,
    pub date: Option<String>,
}

fn quote(value: &str) -> String {
    format!("\"{}\"", value.trim().replace('\\', "\\\\").replace('"', "\\\""))
}

pub fn release_query(artist: &str, album: &str) -> String {
    format!("artist:{} AND release:{}", quote(artist), quote(album))
}

pub fn recording_query(title: &str, artist: &str) -> String {
    if artist.trim().is_empty() {
        return format!("recording:{}", quote(title));
    }
    format!("recording:{} AND artist:{}", quote(title), quote(artist))
}

/// Cover Art Archive front image; `front-500` when the 500px size is wanted
pub fn cover_art_url(release_id: &str, force_500px: bool) -> String {
    if force_500px {
        format!("{}/{}/front-500", COVER_ART_URL, release_id)
    } else {
        format!("{}/{}/front", COVER_ART_URL, release_id)
    }
}

fn credit_name(credits: &[ArtistCredit]) -> Option<String> {
    if credits.is_empty() {
        return None;
    }
    Some(
        credits
            .iter()
            .map(|c| format!("{}{}", c.name, c.joinphrase))
            .collect::<String>()
            .trim()
            .to_string(),
    )
}

impl RecordingSearch {
    pub fn best_match(&self) -> Option<RecordingMatch> {
        let recording = self.recordings.first()?;
        let release = recording.releases.first();
        let date = release
            .and_then(|r| r.date.clone())
            .or_else(|| recording.first_release_date.clone())
            .filter(|d| !d.is_empty());

        Some(RecordingMatch {
            title: recording.title.clone(),
            artist: credit_name(&recording.artist_credit),
            album: release.and_then(|r| r.title.clone()),
            album_artist: release
                .and_then(|r| credit_name(&r.artist_credit))
                .or_else(|| credit_name(&recording.artist_credit)),
            date,
        })
    }
}
