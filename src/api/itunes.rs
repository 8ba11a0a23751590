//! iTunes Search API album artwork

use serde::Deserialize;

pub const SEARCH_URL: &str = "https://itunes.apple.com/search";

#[derive(Debug, Deserialize)]
pub struct SearchResponse {
    #[serde(default)]
    pub results: Vec<AlbumResult>,
}

#[derive(Debug, Deserialize)]
pub struct AlbumResult {
    #[serde(rename = "collectionName")]
    pub collection_name: Option<String>,
    #[serde(rename = "artworkUrl100")]
    pub artwork_url100: Option<String>,
}

/// Query parameters for an album search
pub fn search_query(artist: &str, album: &str) -> Vec<(&'static str, String)> {
    vec![
        ("term", format!("{} {}", artist.trim(), album.trim())),
        ("entity", "album".to_string()),
        ("limit", "1".to_string()),
    ]
}

/// Swap the 100px thumbnail size in an artwork URL for the size we want
pub fn artwork_url(url100: &str, force_500px: bool) -> String {
    let size = if force_500px { "500x500bb" } else { "1000x1000bb" };
    url100.replace("100x100bb", size)
}

/// Artwork URL of the first result
pub fn first_artwork(response: &SearchResponse, force_500px: bool) -> Option<String> {
    response
        .results
        .iter()
        .find_map(|r| r.artwork_url100.as_deref())
        .map(|url| artwork_url(url, force_500px))
}
