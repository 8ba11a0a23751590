//! Spreadsheet round trip of text tags
//!
//! Empty cells on import mean "keep the current value".

use std::collections::BTreeMap;
use std::path::{Path, PathBuf};

use crate::error::{Result, TagfixError};
use crate::features::batch::BatchItem;
use crate::features::dispatch::AudioFile;
use crate::features::tags::{CanonicalTag, TagSession};

pub const PATH_COLUMN: &str = "path";

/// Tag columns after `path`, in header order
pub const CSV_TAGS: &[CanonicalTag] = &[
    CanonicalTag::Title,
    CanonicalTag::Artist,
    CanonicalTag::Album,
    CanonicalTag::AlbumArtist,
    CanonicalTag::Genre,
    CanonicalTag::Date,
    CanonicalTag::TrackNumber,
    CanonicalTag::DiscNumber,
    CanonicalTag::Comment,
    CanonicalTag::Lyrics,
];

/// One imported row: the target file and its non-empty cells
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CsvRow {
    pub path: PathBuf,
    pub values: BTreeMap<CanonicalTag, String>,
}

impl BatchItem for CsvRow {
    fn key(&self) -> &Path {
        &self.path
    }
}

fn csv_error(path: &Path, e: csv::Error) -> TagfixError {
    TagfixError::parse(path, e)
}

/// Write one row per file; files that cannot be read get an empty row
pub fn export(files: &[AudioFile], out: &Path) -> Result<usize> {
    let mut writer = csv::Writer::from_path(out).map_err(|e| csv_error(out, e))?;

    let mut header = vec![PATH_COLUMN];
    header.extend(CSV_TAGS.iter().map(|t| t.as_str()));
    writer.write_record(&header).map_err(|e| csv_error(out, e))?;

    for file in files {
        let session = match TagSession::open(file) {
            Ok(session) => Some(session),
            Err(e) => {
                tracing::warn!("Failed to read {:?} for export: {}", file.path, e);
                None
            }
        };
        let mut record = vec![file.path.to_string_lossy().into_owned()];
        for tag in CSV_TAGS {
            let value = session.as_ref().and_then(|s| s.get(*tag)).unwrap_or_default();
            record.push(value);
        }
        writer.write_record(&record).map_err(|e| csv_error(out, e))?;
    }

    writer.flush()?;
    tracing::info!("Exported {} files to {:?}", files.len(), out);
    Ok(files.len())
}

/// Read rows back, keeping only non-empty cells of known columns
pub fn import(path: &Path) -> Result<Vec<CsvRow>> {
    if !path.exists() {
        return Err(TagfixError::NotFound(path.to_path_buf()));
    }
    let mut reader = csv::Reader::from_path(path).map_err(|e| csv_error(path, e))?;
    let headers = reader.headers().map_err(|e| csv_error(path, e))?.clone();

    let path_index = headers
        .iter()
        .position(|h| h.trim().eq_ignore_ascii_case(PATH_COLUMN))
        .ok_or_else(|| TagfixError::parse(path, "missing 'path' column"))?;
    let columns: Vec<(usize, CanonicalTag)> = headers
        .iter()
        .enumerate()
        .filter_map(|(i, h)| {
            let tag = h.parse::<CanonicalTag>().ok()?;
            CSV_TAGS.contains(&tag).then_some((i, tag))
        })
        .collect();

    let mut rows = Vec::new();
    for record in reader.records() {
        let record = record.map_err(|e| csv_error(path, e))?;
        let Some(file) = record.get(path_index).map(str::trim).filter(|p| !p.is_empty()) else {
            continue;
        };
        let values = columns
            .iter()
            .filter_map(|(i, tag)| {
                let cell = record.get(*i)?;
                (!cell.trim().is_empty()).then(|| (*tag, cell.to_string()))
            })
            .collect();
        rows.push(CsvRow {
            path: PathBuf::from(file),
            values,
        });
    }

    tracing::debug!("Imported {} rows from {:?}", rows.len(), path);
    Ok(rows)
}
