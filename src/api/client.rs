//! Shared HTTP client for every lookup service

use std::fmt;
use std::time::Duration;

use reqwest::Client;
use serde::de::DeserializeOwned;

use crate::error::{Result, TagfixError};
use crate::features::settings::{CoverSource, Settings};

use super::musicbrainz::{RecordingMatch, RecordingSearch, ReleaseSearch};
use super::{itunes, lrclib, musicbrainz};

#[derive(Clone)]
pub struct LookupClient {
    client: Client,
    cover_source: CoverSource,
    force_500px: bool,
    prefer_synced: bool,
}

impl fmt::Debug for LookupClient {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("LookupClient")
            .field("client", &"<HttpClient>")
            .field("cover_source", &self.cover_source)
            .finish()
    }
}

fn network(e: impl ToString) -> TagfixError {
    TagfixError::NetworkFailure(e.to_string())
}

impl LookupClient {
    pub fn new(settings: &Settings) -> Result<Self> {
        let client = Client::builder()
            .user_agent(settings.network.user_agent.clone())
            .timeout(Duration::from_secs(settings.network.timeout_secs))
            .build()
            .map_err(network)?;
        Ok(Self {
            client,
            cover_source: settings.covers.source,
            force_500px: settings.covers.force_500px,
            prefer_synced: settings.lyrics.prefer_synced,
        })
    }

    async fn get_json<T: DeserializeOwned>(&self, url: &str, query: &[(&str, String)]) -> Result<T> {
        let response = self
            .client
            .get(url)
            .query(query)
            .send()
            .await
            .map_err(network)?;
        if !response.status().is_success() {
            return Err(network(format!("{} returned {}", url, response.status())));
        }
        response.json::<T>().await.map_err(network)
    }

    async fn get_bytes(&self, url: &str) -> Result<Vec<u8>> {
        let response = self.client.get(url).send().await.map_err(network)?;
        if !response.status().is_success() {
            return Err(network(format!("{} returned {}", url, response.status())));
        }
        Ok(response.bytes().await.map_err(network)?.to_vec())
    }

    async fn itunes_cover(&self, artist: &str, album: &str) -> Result<Option<Vec<u8>>> {
        let response: itunes::SearchResponse = self
            .get_json(itunes::SEARCH_URL, &itunes::search_query(artist, album))
            .await?;
        if let Some(name) = response.results.first().and_then(|r| r.collection_name.as_deref()) {
            tracing::debug!("iTunes matched album '{}'", name);
        }
        match itunes::first_artwork(&response, self.force_500px) {
            Some(url) => Ok(Some(self.get_bytes(&url).await?)),
            None => Ok(None),
        }
    }

    async fn musicbrainz_cover(&self, artist: &str, album: &str) -> Result<Option<Vec<u8>>> {
        let query = [
            ("query", musicbrainz::release_query(artist, album)),
            ("fmt", "json".to_string()),
            ("limit", "1".to_string()),
        ];
        let search: ReleaseSearch = self.get_json(musicbrainz::RELEASE_URL, &query).await?;
        let Some(release) = search.releases.first() else {
            return Ok(None);
        };

        let sized = musicbrainz::cover_art_url(&release.id, self.force_500px);
        match self.get_bytes(&sized).await {
            Ok(data) => Ok(Some(data)),
            Err(e) if self.force_500px => {
                tracing::debug!("Sized cover unavailable ({}), trying full size", e);
                let full = musicbrainz::cover_art_url(&release.id, false);
                Ok(Some(self.get_bytes(&full).await?))
            }
            Err(e) => Err(e),
        }
    }

    /// Album cover from the configured source, falling back to the other one
    pub async fn fetch_cover(&self, artist: &str, album: &str) -> Option<Vec<u8>> {
        let order = match self.cover_source {
            CoverSource::Itunes => [CoverSource::Itunes, CoverSource::MusicBrainz],
            CoverSource::MusicBrainz => [CoverSource::MusicBrainz, CoverSource::Itunes],
        };

        for source in order {
            let result = match source {
                CoverSource::Itunes => self.itunes_cover(artist, album).await,
                CoverSource::MusicBrainz => self.musicbrainz_cover(artist, album).await,
            };
            match result {
                Ok(Some(data)) => {
                    tracing::info!("Found cover for {} - {} on {}", artist, album, source);
                    return Some(data);
                }
                Ok(None) => tracing::debug!("No cover for {} - {} on {}", artist, album, source),
                Err(e) => tracing::warn!("Failed to fetch cover from {}: {}", source, e),
            }
        }
        None
    }

    pub async fn fetch_lyrics(&self, artist: &str, title: &str, album: &str) -> Option<String> {
        let query = [("q", lrclib::search_term(artist, title, album))];
        match self
            .get_json::<Vec<lrclib::LyricsEntry>>(lrclib::SEARCH_URL, &query)
            .await
        {
            Ok(entries) => lrclib::pick_lyrics(&entries, self.prefer_synced),
            Err(e) => {
                tracing::warn!("Failed to fetch lyrics: {}", e);
                None
            }
        }
    }

    /// Album details for a track, used to fill missing tags
    pub async fn lookup_recording(&self, title: &str, artist: &str) -> Option<RecordingMatch> {
        let query = [
            ("query", musicbrainz::recording_query(title, artist)),
            ("fmt", "json".to_string()),
            ("limit", "1".to_string()),
        ];
        match self
            .get_json::<RecordingSearch>(musicbrainz::RECORDING_URL, &query)
            .await
        {
            Ok(search) => search.best_match(),
            Err(e) => {
                tracing::warn!("Failed to look up recording: {}", e);
                None
            }
        }
    }
}
