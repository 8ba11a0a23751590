//! Global and per-file edits for one batch

use std::collections::BTreeMap;
use std::path::{Path, PathBuf};

use crate::error::{Result, TagfixError};
use crate::features::dispatch::AudioFile;
use crate::features::tags::{CanonicalTag, TagSession};

use super::progress::{BatchResult, BatchStatus};

/// Edits partitioned into values applied to every file and values for one file
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct EditPlan {
    global: BTreeMap<CanonicalTag, String>,
    per_file: BTreeMap<PathBuf, BTreeMap<CanonicalTag, String>>,
}

impl EditPlan {
    /// Set a value for every file; only global-eligible tags are accepted
    pub fn set_global(&mut self, tag: CanonicalTag, value: impl Into<String>) -> Result<()> {
        if !tag.is_global_eligible() {
            return Err(TagfixError::write(tag, "cannot be set for all files at once"));
        }
        self.global.insert(tag, value.into());
        Ok(())
    }

    pub fn set_for_file(&mut self, path: &Path, tag: CanonicalTag, value: impl Into<String>) {
        self.per_file
            .entry(path.to_path_buf())
            .or_default()
            .insert(tag, value.into());
    }

    pub fn for_file(&self, path: &Path) -> Option<&BTreeMap<CanonicalTag, String>> {
        self.per_file.get(path)
    }

    pub fn is_empty(&self) -> bool {
        self.global.is_empty() && self.per_file.values().all(|edits| edits.is_empty())
    }

    /// Open the file once, write global values then its own values, and save
    pub fn apply(&self, file: &AudioFile) -> Result<BatchResult> {
        let own = self.for_file(&file.path);
        let count = self.global.len() + own.map_or(0, |edits| edits.len());
        if count == 0 {
            return Ok(BatchResult::new(
                &file.path,
                BatchStatus::Skipped,
                "No changes",
            ));
        }

        let mut session = TagSession::open(file)?;
        for (tag, value) in self.global.iter().chain(own.into_iter().flatten()) {
            session.set(*tag, value)?;
        }
        session.save()?;
        Ok(BatchResult::new(
            &file.path,
            BatchStatus::Updated,
            format!("Updated {} tags", count),
        ))
    }
}
