//! Online lookup services
//!
//! Cover art from iTunes and MusicBrainz/Cover Art Archive, lyrics from
//! LRCLIB, and recording metadata from MusicBrainz. Lookups never fail the
//! caller: network and decoding errors are logged and reported as no result.

mod client;
pub mod itunes;
pub mod lrclib;
pub mod musicbrainz;

pub use client::LookupClient;
