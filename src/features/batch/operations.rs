//! Batch operations and their per-file outcomes

use std::fmt;
use std::path::{Path, PathBuf};
use std::sync::Arc;

use tokio::runtime::Handle;
use tokio::sync::{mpsc, watch};

use crate::api::LookupClient;
use crate::error::{Result, TagfixError};
use crate::features::convert::{self, Capabilities, Converter, Encoder, TargetFormat};
use crate::features::cover::{self, CoverCache, CoverStatus};
use crate::features::csv_io::CsvRow;
use crate::features::dispatch::{AudioFile, AudioFormat};
use crate::features::lyrics;
use crate::features::rename;
use crate::features::romanize::{self, Romanizer};
use crate::features::tags::{CanonicalTag, TagSession, is_supported};

use super::plan::EditPlan;
use super::progress::{BatchEvent, BatchResult, BatchStatus, BatchSummary};
use super::runner::run_items;

/// Tags touched by case conversion
pub const CASE_TAGS: &[CanonicalTag] = &[
    CanonicalTag::Title,
    CanonicalTag::Artist,
    CanonicalTag::Album,
    CanonicalTag::AlbumArtist,
];

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CaseMode {
    Title,
    Upper,
    Lower,
}

impl CaseMode {
    pub fn apply(&self, value: &str) -> String {
        match self {
            Self::Upper => value.to_uppercase(),
            Self::Lower => value.to_lowercase(),
            Self::Title => title_case(value),
        }
    }
}

/// Capitalize the first letter of every whitespace separated word
fn title_case(value: &str) -> String {
    let mut out = String::with_capacity(value.len());
    let mut word_start = true;
    for c in value.chars() {
        if c.is_whitespace() {
            word_start = true;
            out.push(c);
        } else if word_start {
            out.extend(c.to_uppercase());
            word_start = false;
        } else {
            out.extend(c.to_lowercase());
        }
    }
    out
}

/// Work a batch performs on every item
#[derive(Debug, Clone)]
pub enum Operation {
    ApplyEdits(EditPlan),
    FetchCover,
    FetchLyrics,
    RomanizeLyrics,
    /// Rename by pattern, e.g. `{tracknumber} - {title}`
    Rename(String),
    Convert(TargetFormat),
    ReencodeFlac,
    ResizeCover,
    CaseConvert(CaseMode),
    CsvImport(Vec<CsvRow>),
    AutoTag { skip_existing: bool },
    /// Embed one already prepared JPEG into every file
    EmbedCover(Arc<Vec<u8>>),
    EmbedLyrics(String),
    ExtractLyrics,
    /// Save embedded covers as JPEG; `None` writes next to each file
    ExportCovers(Option<PathBuf>),
}

impl Operation {
    fn needs_lookup(&self) -> bool {
        matches!(
            self,
            Self::FetchCover | Self::FetchLyrics | Self::AutoTag { .. }
        )
    }
}

impl fmt::Display for Operation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::ApplyEdits(_) => f.write_str("Save tags"),
            Self::FetchCover => f.write_str("Fetch covers"),
            Self::FetchLyrics => f.write_str("Fetch lyrics"),
            Self::RomanizeLyrics => f.write_str("Romanize lyrics"),
            Self::Rename(_) => f.write_str("Rename files"),
            Self::Convert(target) => write!(f, "Convert to {}", target),
            Self::ReencodeFlac => f.write_str("Re-encode FLAC"),
            Self::ResizeCover => f.write_str("Resize covers"),
            Self::CaseConvert(_) => f.write_str("Convert case"),
            Self::CsvImport(_) => f.write_str("Import CSV"),
            Self::AutoTag { .. } => f.write_str("Auto-tag"),
            Self::EmbedCover(_) => f.write_str("Embed cover"),
            Self::EmbedLyrics(_) => f.write_str("Embed lyrics"),
            Self::ExtractLyrics => f.write_str("Extract lyrics"),
            Self::ExportCovers(_) => f.write_str("Export covers"),
        }
    }
}

/// Shared services an operation may use
#[derive(Clone)]
pub struct OperationContext {
    pub lookup: Option<LookupClient>,
    pub runtime: Option<Handle>,
    pub capabilities: Capabilities,
    pub romanizer: Arc<dyn Romanizer>,
    pub cover_cache: Option<CoverCache>,
    /// Also fetch missing lyrics while auto-tagging
    pub auto_lyrics: bool,
}

impl fmt::Debug for OperationContext {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("OperationContext")
            .field("lookup", &self.lookup)
            .field("capabilities", &self.capabilities)
            .field("cover_cache", &self.cover_cache)
            .field("auto_lyrics", &self.auto_lyrics)
            .finish()
    }
}

impl OperationContext {
    /// Context with no encoders, lookups or cache
    #[cfg(test)]
    pub fn offline() -> Self {
        Self {
            lookup: None,
            runtime: None,
            capabilities: Capabilities::none(),
            romanizer: Arc::new(romanize::HangulRomanizer),
            cover_cache: None,
            auto_lyrics: false,
        }
    }

    fn lookup(&self) -> Result<(&LookupClient, &Handle)> {
        match (&self.lookup, &self.runtime) {
            (Some(client), Some(runtime)) => Ok((client, runtime)),
            _ => Err(TagfixError::CapabilityMissing(
                "online lookups are unavailable".to_string(),
            )),
        }
    }
}

/// An operation whose capabilities have been checked
pub struct Job {
    operation: Operation,
    context: OperationContext,
    encoder: Option<Arc<dyn Encoder>>,
}

impl Job {
    /// Resolve everything the operation needs before any file is touched
    pub fn prepare(operation: Operation, context: OperationContext) -> Result<Self> {
        let encoder = match &operation {
            Operation::Convert(target) => Some(context.capabilities.encoder_for(*target)?),
            Operation::ReencodeFlac => {
                Some(context.capabilities.encoder_for(TargetFormat::Flac)?)
            }
            _ => None,
        };
        if operation.needs_lookup() {
            context.lookup()?;
        }
        if matches!(operation, Operation::RomanizeLyrics) {
            context.romanizer.check()?;
        }
        Ok(Self {
            operation,
            context,
            encoder,
        })
    }

    pub fn operation(&self) -> &Operation {
        &self.operation
    }

    /// Number of items the job will process for `files`
    pub fn item_count(&self, files: &[AudioFile]) -> usize {
        match &self.operation {
            Operation::CsvImport(rows) => rows.len(),
            _ => files.len(),
        }
    }

    pub fn run(
        &self,
        files: &[AudioFile],
        cancel: &watch::Receiver<bool>,
        events: &mpsc::UnboundedSender<BatchEvent>,
    ) -> (Vec<BatchResult>, BatchSummary) {
        tracing::info!("{} started", self.operation);
        let outcome = match &self.operation {
            Operation::CsvImport(rows) => run_items(rows, cancel, events, import_row),
            Operation::Convert(target) => self.run_conversion(*target, files, cancel, events),
            _ => run_items(files, cancel, events, |file| self.process(file)),
        };
        tracing::info!("{} finished: {}", self.operation, outcome.1.message());
        outcome
    }

    fn encoder(&self) -> Result<&dyn Encoder> {
        self.encoder
            .as_deref()
            .ok_or_else(|| TagfixError::CapabilityMissing("no encoder prepared".to_string()))
    }

    fn run_conversion(
        &self,
        target: TargetFormat,
        files: &[AudioFile],
        cancel: &watch::Receiver<bool>,
        events: &mpsc::UnboundedSender<BatchEvent>,
    ) -> (Vec<BatchResult>, BatchSummary) {
        let mut ordered = files.to_vec();
        ordered.sort_by(|a, b| a.dir().cmp(b.dir()).then_with(|| a.path.cmp(&b.path)));

        let Some(encoder) = self.encoder.clone() else {
            return run_items(&ordered, cancel, events, |_| {
                Err(TagfixError::CapabilityMissing(format!("no encoder for {}", target)))
            });
        };
        let mut converter = Converter::new(target, encoder);
        let outcome = run_items(&ordered, cancel, events, |file| {
            let output = converter.convert_one(file)?;
            Ok(BatchResult::new(
                &file.path,
                BatchStatus::Success,
                format!("Converted to {}", display_name(&output)),
            ))
        });

        let stats = converter.finish();
        tracing::info!(
            "Converted {} files, copied {} sidecar files, {} failed",
            stats.converted,
            stats.copied,
            stats.failed
        );
        let _ = events.send(BatchEvent::Conversion(stats));
        outcome
    }

    fn process(&self, file: &AudioFile) -> Result<BatchResult> {
        match &self.operation {
            Operation::ApplyEdits(plan) => plan.apply(file),
            Operation::FetchCover => self.fetch_cover(file),
            Operation::FetchLyrics => self.fetch_lyrics(file),
            Operation::RomanizeLyrics => romanize_file(file, self.context.romanizer.as_ref()),
            Operation::Rename(pattern) => rename_file(file, pattern),
            Operation::ReencodeFlac => reencode_file(file, self.encoder()?),
            Operation::ResizeCover => resize_cover(file),
            Operation::CaseConvert(mode) => convert_case(file, *mode),
            Operation::AutoTag { skip_existing } => self.auto_tag(file, *skip_existing),
            Operation::EmbedCover(data) => embed_cover(file, data),
            Operation::EmbedLyrics(text) => embed_lyrics(file, text),
            Operation::ExtractLyrics => extract_lyrics(file),
            Operation::ExportCovers(out_dir) => export_cover(file, out_dir.as_deref()),
            Operation::Convert(_) | Operation::CsvImport(_) => Err(TagfixError::write(
                file.path.display(),
                "operation does not run per file",
            )),
        }
    }

    fn fetch_cover(&self, file: &AudioFile) -> Result<BatchResult> {
        let mut session = TagSession::open(file)?;
        let existing = session.get_cover();
        if cover::cover_status(existing.as_ref().map(|c| c.data.as_slice()))
            == CoverStatus::Standard500
        {
            return Ok(BatchResult::new(
                &file.path,
                BatchStatus::Skipped,
                "Cover already 500x500",
            ));
        }

        let artist = session
            .get(CanonicalTag::AlbumArtist)
            .or_else(|| session.get(CanonicalTag::Artist));
        let (Some(artist), Some(album)) = (artist, session.get(CanonicalTag::Album)) else {
            return Ok(BatchResult::new(
                &file.path,
                BatchStatus::Missing,
                "Missing artist or album tag",
            ));
        };

        let cached = self
            .context
            .cover_cache
            .as_ref()
            .and_then(|cache| cache.get(&artist, &album));
        let data = match cached {
            Some(data) => {
                tracing::debug!("Using cached cover for {} - {}", artist, album);
                data
            }
            None => {
                let (client, runtime) = self.context.lookup()?;
                let Some(raw) = runtime.block_on(client.fetch_cover(&artist, &album)) else {
                    return Ok(BatchResult::new(
                        &file.path,
                        BatchStatus::Missing,
                        "No cover found",
                    ));
                };
                let prepared = cover::prepare_cover(&raw)?;
                if let Some(cache) = &self.context.cover_cache {
                    if let Err(e) = cache.put(&artist, &album, &prepared) {
                        tracing::warn!("Failed to cache cover: {}", e);
                    }
                }
                prepared
            }
        };

        session.set_cover(data, "image/jpeg")?;
        session.save()?;
        Ok(BatchResult::new(
            &file.path,
            BatchStatus::Updated,
            "Cover embedded",
        ))
    }

    fn fetch_lyrics(&self, file: &AudioFile) -> Result<BatchResult> {
        if let Some(skipped) = lyrics_unsupported(file) {
            return Ok(skipped);
        }
        let mut session = TagSession::open(file)?;
        if session.has(CanonicalTag::Lyrics) {
            return Ok(BatchResult::new(
                &file.path,
                BatchStatus::Skipped,
                "Lyrics already present",
            ));
        }

        let (Some(artist), Some(title)) = (
            session.get(CanonicalTag::Artist),
            session.get(CanonicalTag::Title),
        ) else {
            return Ok(BatchResult::new(
                &file.path,
                BatchStatus::Missing,
                "Missing artist or title tag",
            ));
        };
        let album = session.get(CanonicalTag::Album).unwrap_or_default();

        let (client, runtime) = self.context.lookup()?;
        match runtime.block_on(client.fetch_lyrics(&artist, &title, &album)) {
            Some(lyrics) => {
                session.set(CanonicalTag::Lyrics, &lyrics)?;
                session.save()?;
                Ok(BatchResult::new(
                    &file.path,
                    BatchStatus::Updated,
                    "Lyrics embedded",
                ))
            }
            None => Ok(BatchResult::new(
                &file.path,
                BatchStatus::Missing,
                "No lyrics found",
            )),
        }
    }

    fn auto_tag(&self, file: &AudioFile, skip_existing: bool) -> Result<BatchResult> {
        let mut session = TagSession::open(file)?;
        if skip_existing && session.has(CanonicalTag::Album) && session.has(CanonicalTag::Date) {
            return Ok(BatchResult::new(
                &file.path,
                BatchStatus::Skipped,
                "Album and date already set",
            ));
        }

        let (Some(title), Some(artist)) = (
            session.get(CanonicalTag::Title),
            session.get(CanonicalTag::Artist),
        ) else {
            return Ok(BatchResult::new(
                &file.path,
                BatchStatus::Missing,
                "Missing title or artist tag",
            ));
        };

        let (client, runtime) = self.context.lookup()?;
        let Some(found) = runtime.block_on(client.lookup_recording(&title, &artist)) else {
            return Ok(BatchResult::new(
                &file.path,
                BatchStatus::Missing,
                "No match found",
            ));
        };

        tracing::debug!(
            "Matched {:?} to '{}' by {}",
            file.path,
            found.title,
            found.artist.as_deref().unwrap_or("unknown artist")
        );
        let candidates = [
            (CanonicalTag::Album, found.album),
            (CanonicalTag::Date, found.date),
            (CanonicalTag::AlbumArtist, found.album_artist),
        ];
        let mut changed = 0;
        for (tag, value) in candidates {
            let Some(value) = value.filter(|v| !v.is_empty()) else {
                continue;
            };
            if skip_existing && session.has(tag) {
                continue;
            }
            if session.get(tag).as_deref() != Some(value.as_str()) {
                session.set(tag, &value)?;
                changed += 1;
            }
        }

        if self.context.auto_lyrics
            && is_supported(file.format, CanonicalTag::Lyrics)
            && !session.has(CanonicalTag::Lyrics)
        {
            let album = session.get(CanonicalTag::Album).unwrap_or_default();
            if let Some(lyrics) = runtime.block_on(client.fetch_lyrics(&artist, &title, &album)) {
                session.set(CanonicalTag::Lyrics, &lyrics)?;
                changed += 1;
            }
        }

        if changed == 0 {
            return Ok(BatchResult::new(
                &file.path,
                BatchStatus::Skipped,
                "Tags already match",
            ));
        }
        session.save()?;
        Ok(BatchResult::new(
            &file.path,
            BatchStatus::Updated,
            format!("Updated {} tags", changed),
        ))
    }
}

fn display_name(path: &Path) -> String {
    path.file_name()
        .map(|n| n.to_string_lossy().into_owned())
        .unwrap_or_else(|| path.display().to_string())
}

fn lyrics_unsupported(file: &AudioFile) -> Option<BatchResult> {
    (!is_supported(file.format, CanonicalTag::Lyrics)).then(|| {
        BatchResult::new(
            &file.path,
            BatchStatus::Skipped,
            format!("{} files cannot store lyrics", file.format),
        )
    })
}

fn embed_cover(file: &AudioFile, data: &[u8]) -> Result<BatchResult> {
    cover::set_cover(file, data.to_vec(), "image/jpeg")?;
    Ok(BatchResult::new(
        &file.path,
        BatchStatus::Updated,
        "Cover embedded",
    ))
}

fn embed_lyrics(file: &AudioFile, text: &str) -> Result<BatchResult> {
    if let Some(skipped) = lyrics_unsupported(file) {
        return Ok(skipped);
    }
    lyrics::embed_lyrics(file, text)?;
    Ok(BatchResult::new(
        &file.path,
        BatchStatus::Updated,
        "Lyrics embedded",
    ))
}

fn extract_lyrics(file: &AudioFile) -> Result<BatchResult> {
    match lyrics::extract_lyrics_to_file(file)? {
        Some(path) => Ok(BatchResult::new(
            &file.path,
            BatchStatus::Success,
            format!("Saved {}", display_name(&path)),
        )),
        None => Ok(BatchResult::new(
            &file.path,
            BatchStatus::Skipped,
            "No embedded lyrics",
        )),
    }
}

fn export_cover(file: &AudioFile, out_dir: Option<&Path>) -> Result<BatchResult> {
    let out_dir = out_dir.unwrap_or_else(|| file.dir());
    match cover::export_cover(file, out_dir)? {
        Some(path) => Ok(BatchResult::new(
            &file.path,
            BatchStatus::Success,
            format!("Saved {}", path.display()),
        )),
        None => Ok(BatchResult::new(&file.path, BatchStatus::Skipped, "No cover")),
    }
}

fn romanize_file(file: &AudioFile, romanizer: &dyn Romanizer) -> Result<BatchResult> {
    let mut session = TagSession::open(file)?;
    let Some(lyrics) = session.get(CanonicalTag::Lyrics).filter(|l| !l.trim().is_empty()) else {
        return Ok(BatchResult::new(&file.path, BatchStatus::Skipped, "No lyrics"));
    };
    let Some(romanized) = romanize::romanize_lyrics(romanizer, &lyrics) else {
        return Ok(BatchResult::new(
            &file.path,
            BatchStatus::Skipped,
            "Nothing to romanize",
        ));
    };
    session.set(CanonicalTag::Lyrics, &romanized)?;
    session.save()?;
    Ok(BatchResult::new(
        &file.path,
        BatchStatus::Updated,
        "Lyrics romanized",
    ))
}

fn rename_file(file: &AudioFile, pattern: &str) -> Result<BatchResult> {
    let name = rename::preview_name(file, pattern)?;
    if name == file.file_name() {
        return Ok(BatchResult::new(
            &file.path,
            BatchStatus::Skipped,
            "Name unchanged",
        ));
    }
    if file.dir().join(&name).exists() {
        return Ok(BatchResult::new(
            &file.path,
            BatchStatus::Error,
            format!("'{}' already exists", name),
        ));
    }
    rename::rename_audio_file(&file.path, &name)?;
    Ok(BatchResult::new(
        &file.path,
        BatchStatus::Renamed,
        format!("Renamed to {}", name),
    ))
}

fn reencode_file(file: &AudioFile, encoder: &dyn Encoder) -> Result<BatchResult> {
    if file.format != AudioFormat::Flac {
        return Ok(BatchResult::new(
            &file.path,
            BatchStatus::Skipped,
            "Not a FLAC file",
        ));
    }
    convert::reencode_flac(file, encoder)?;
    Ok(BatchResult::new(
        &file.path,
        BatchStatus::Success,
        format!("Re-encoded with {}", encoder.name()),
    ))
}

fn resize_cover(file: &AudioFile) -> Result<BatchResult> {
    let mut session = TagSession::open(file)?;
    let Some(existing) = session.get_cover() else {
        return Ok(BatchResult::new(&file.path, BatchStatus::Missing, "No cover"));
    };
    if cover::cover_status(Some(&existing.data)) == CoverStatus::Standard500 {
        return Ok(BatchResult::new(
            &file.path,
            BatchStatus::Skipped,
            "Cover already 500x500",
        ));
    }

    let resized = cover::prepare_cover(&existing.data)?;
    session.set_cover(resized, "image/jpeg")?;
    session.save()?;
    Ok(BatchResult::new(
        &file.path,
        BatchStatus::Updated,
        "Cover resized to 500x500",
    ))
}

fn convert_case(file: &AudioFile, mode: CaseMode) -> Result<BatchResult> {
    let mut session = TagSession::open(file)?;
    let mut changed = 0;
    for tag in CASE_TAGS {
        let Some(value) = session.get(*tag) else {
            continue;
        };
        let converted = mode.apply(&value);
        if converted != value {
            session.set(*tag, &converted)?;
            changed += 1;
        }
    }

    if changed == 0 {
        return Ok(BatchResult::new(
            &file.path,
            BatchStatus::Skipped,
            "Case unchanged",
        ));
    }
    session.save()?;
    Ok(BatchResult::new(
        &file.path,
        BatchStatus::Updated,
        format!("Updated {} tags", changed),
    ))
}

fn import_row(row: &CsvRow) -> Result<BatchResult> {
    if !row.path.exists() {
        return Ok(BatchResult::new(
            &row.path,
            BatchStatus::Missing,
            "File not found",
        ));
    }
    if row.values.is_empty() {
        return Ok(BatchResult::new(&row.path, BatchStatus::Skipped, "No values"));
    }

    let file = AudioFile::from_path(&row.path)?;
    let mut session = TagSession::open(&file)?;
    for (tag, value) in &row.values {
        session.set(*tag, value)?;
    }
    session.save()?;
    Ok(BatchResult::new(
        &row.path,
        BatchStatus::Updated,
        format!("Updated {} tags", row.values.len()),
    ))
}
