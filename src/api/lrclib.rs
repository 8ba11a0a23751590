//! LRCLIB lyrics search

use serde::Deserialize;

pub const SEARCH_URL: &str = "https://lrclib.net/api/search";

#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct LyricsEntry {
    #[serde(default)]
    pub artist_name: String,
    #[serde(default)]
    pub track_name: String,
    pub album_name: Option<String>,
    pub plain_lyrics: Option<String>,
    pub synced_lyrics: Option<String>,
}

pub fn search_term(artist: &str, title: &str, album: &str) -> String {
    [artist, title, album]
        .iter()
        .map(|s| s.trim())
        .filter(|s| !s.is_empty())
        .collect::<Vec<_>>()
        .join(" ")
}

fn non_empty(text: &Option<String>) -> Option<&str> {
    text.as_deref().filter(|t| !t.trim().is_empty())
}

/// Pick lyrics from search results, synced first when preferred
pub fn pick_lyrics(entries: &[LyricsEntry], prefer_synced: bool) -> Option<String> {
    let synced = entries.iter().find(|e| non_empty(&e.synced_lyrics).is_some());
    let plain = entries.iter().find(|e| non_empty(&e.plain_lyrics).is_some());
    let synced = synced.map(|e| (e, &e.synced_lyrics));
    let plain = plain.map(|e| (e, &e.plain_lyrics));
    let (entry, text) = if prefer_synced {
        synced.or(plain)
    } else {
        plain.or(synced)
    }?;
    tracing::debug!(
        "LRCLIB match: {} - {} ({})",
        entry.artist_name,
        entry.track_name,
        entry.album_name.as_deref().unwrap_or("no album")
    );
    non_empty(text).map(str::to_string)
}

#[cfg(test)]
mod tests {
    use super::*;

    const SAMPLE: &str = r#"[
        {"id": 1, "artistName": "A", "trackName": "T", "albumName": null,
         "plainLyrics": "plain words", "syncedLyrics": null},
        {"id": 2, "artistName": "A", "trackName": "T", "albumName": "B",
         "plainLyrics": "plain again", "syncedLyrics": "[00:01.00]synced"}
    ]"#;

    #[test]
    fn test_pick_prefers_synced() {
        let entries: Vec<LyricsEntry> = serde_json::from_str(SAMPLE).unwrap();
        assert_eq!(pick_lyrics(&entries, true).unwrap(), "[00:01.00]synced");
        assert_eq!(pick_lyrics(&entries, false).unwrap(), "plain words");
        assert_eq!(entries[1].album_name.as_deref(), Some("B"));
    }

    #[test]
    fn test_pick_nothing() {
        assert!(pick_lyrics(&[], true).is_none());
    }

    #[test]
    fn test_search_term_skips_blanks() {
        assert_eq!(search_term("IU", " Blueming ", ""), "IU Blueming");
    }
}
