//! Batch outcomes, summaries and progress events

use std::fmt;
use std::path::PathBuf;

use crate::features::convert::ConversionStats;

/// Terminal status of one batch item
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BatchStatus {
    Success,
    Updated,
    Skipped,
    Failed,
    Found,
    Renamed,
    Missing,
    Error,
}

/// Coarse grouping used by the summary line
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StatusCategory {
    Success,
    Skipped,
    Error,
}

impl BatchStatus {
    pub fn category(&self) -> StatusCategory {
        match self {
            Self::Success | Self::Updated | Self::Found | Self::Renamed => StatusCategory::Success,
            Self::Skipped => StatusCategory::Skipped,
            Self::Failed | Self::Missing | Self::Error => StatusCategory::Error,
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Success => "Success",
            Self::Updated => "Updated",
            Self::Skipped => "Skipped",
            Self::Failed => "Failed",
            Self::Found => "Found",
            Self::Renamed => "Renamed",
            Self::Missing => "Missing",
            Self::Error => "Error",
        }
    }
}

impl fmt::Display for BatchStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// One record per processed item
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BatchResult {
    pub path: PathBuf,
    pub status: BatchStatus,
    pub message: String,
}

impl BatchResult {
    pub fn new(path: impl Into<PathBuf>, status: BatchStatus, message: impl Into<String>) -> Self {
        Self {
            path: path.into(),
            status,
            message: message.into(),
        }
    }
}

/// Counts for a finished (or canceled) batch
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct BatchSummary {
    pub total: usize,
    pub succeeded: usize,
    pub skipped: usize,
    pub failed: usize,
    /// `(processed, submitted)` when the batch stopped early
    pub canceled: Option<(usize, usize)>,
}

impl BatchSummary {
    #[allow(dead_code)]
    pub fn from_results(results: &[BatchResult]) -> Self {
        let mut summary = Self::default();
        for result in results {
            summary.record(result.status);
        }
        summary
    }

    pub fn record(&mut self, status: BatchStatus) {
        self.total += 1;
        match status.category() {
            StatusCategory::Success => self.succeeded += 1,
            StatusCategory::Skipped => self.skipped += 1,
            StatusCategory::Error => self.failed += 1,
        }
    }

    fn classification(&self) -> String {
        let total = self.total;
        if total == 0 {
            return "Done (No files processed)".to_string();
        }
        if self.skipped == total {
            return format!("Skipped, {} files already up to date.", total);
        }
        if self.succeeded == total {
            return format!("Done, updated {} files.", total);
        }
        if self.failed == total {
            return format!("Failed, {} errors occurred.", total);
        }

        let mut parts = Vec::new();
        if self.succeeded > 0 {
            parts.push(format!("Updated {}", self.succeeded));
        }
        if self.skipped > 0 {
            parts.push(format!("Skipped {}", self.skipped));
        }
        if self.failed > 0 {
            parts.push(format!("Failed {}", self.failed));
        }
        format!("Done. {}", parts.join(", "))
    }

    /// One-line summary shown when a batch ends
    pub fn message(&self) -> String {
        match self.canceled {
            Some((processed, submitted)) => format!(
                "Canceled after {} of {} files. {}",
                processed,
                submitted,
                self.classification()
            ),
            None => self.classification(),
        }
    }
}

/// Progress update sent while a batch runs
#[derive(Debug, Clone)]
pub enum BatchEvent {
    Started { total: usize },
    Progress { current: usize, total: usize },
    Result(BatchResult),
    Finished(BatchSummary),
    /// Totals of a conversion batch, sent after `Finished`
    Conversion(ConversionStats),
}
